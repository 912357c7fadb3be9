use crate::db::Store;
use crate::engine::{Engine, ReconcileOutcome, Reconciled};
use crate::error::{ProvisionError, ProvisionResult};
use crate::models::{Inventory, Pod, PodRequest, PodSpec, PodState};
use crate::topology::Fabric;

/// Runs the engine against stored pods and persists what it produced.
/// Callers serialize requests per pod.
#[derive(Clone)]
pub struct PodService {
    store: Store,
    engine: Engine,
}

impl PodService {
    pub fn new(store: Store, engine: Engine) -> Self {
        Self { store, engine }
    }

    pub async fn list_pods(&self) -> ProvisionResult<Vec<Pod>> {
        self.store.list_pods().await.map_err(ProvisionError::from_storage)
    }

    /// Provision a new pod. The name and any inventory device ids must not be taken.
    pub async fn create_pod(&self, spec: &PodSpec, inventory: &Inventory) -> ProvisionResult<Fabric> {
        let existing = self
            .store
            .get_pod_by_name(&spec.name)
            .await
            .map_err(ProvisionError::from_storage)?;
        if existing.is_some() {
            return Err(ProvisionError::config(format!("pod '{}' already exists", spec.name)));
        }
        for id in inventory.spines.iter().chain(&inventory.leafs).filter_map(|d| d.id.as_deref()) {
            let owner = self
                .store
                .find_device_pod(id)
                .await
                .map_err(ProvisionError::from_storage)?;
            if let Some(owner) = owner {
                return Err(ProvisionError::config(format!(
                    "pod '{}': device id '{}' already belongs to pod {}",
                    spec.name, id, owner
                )));
            }
        }

        let fabric = self.engine.provision(spec, inventory)?;
        self.store
            .save_fabric(&fabric)
            .await
            .map_err(ProvisionError::from_storage)?;
        tracing::info!("Created pod {} ({})", fabric.pod().name, fabric.pod().id);
        Ok(fabric)
    }

    /// Reconcile an existing pod. Nothing is written when the pass changed nothing.
    pub async fn update_pod(&self, pod_id: &str, spec: &PodSpec, inventory: &Inventory) -> ProvisionResult<Reconciled> {
        let current = self.get_fabric(pod_id).await?;
        let reconciled = self.engine.reconcile(&current, spec, inventory)?;

        if reconciled.fabric.is_dirty() {
            self.store
                .save_fabric(&reconciled.fabric)
                .await
                .map_err(ProvisionError::from_storage)?;
        }
        Ok(reconciled)
    }

    /// Create or update the pod named in the request
    pub async fn apply(&self, request: &PodRequest) -> ProvisionResult<Reconciled> {
        let existing = self
            .store
            .get_pod_by_name(&request.pod.name)
            .await
            .map_err(ProvisionError::from_storage)?;

        match existing {
            Some(pod) => self.update_pod(&pod.id, &request.pod, &request.inventory).await,
            None => {
                let fabric = self.create_pod(&request.pod, &request.inventory).await?;
                Ok(Reconciled {
                    fabric,
                    outcome: ReconcileOutcome::Created,
                })
            }
        }
    }

    pub async fn get_fabric(&self, pod_id: &str) -> ProvisionResult<Fabric> {
        self.store
            .load_fabric(pod_id)
            .await
            .map_err(ProvisionError::from_storage)
    }

    /// Record a lifecycle transition made by the configuration pipeline
    pub async fn set_state(&self, pod_id: &str, state: PodState) -> ProvisionResult<Pod> {
        let pod = self
            .store
            .update_pod_state(pod_id, state)
            .await
            .map_err(ProvisionError::from_storage)?;
        tracing::info!("Pod {} is now {}", pod.name, state.as_str());
        Ok(pod)
    }

    pub async fn delete_pod(&self, pod_id: &str) -> ProvisionResult<()> {
        self.store
            .delete_pod(pod_id)
            .await
            .map_err(ProvisionError::from_storage)?;
        tracing::info!("Deleted pod {}", pod_id);
        Ok(())
    }
}
