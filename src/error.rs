use std::fmt;

use thiserror::Error;

/// Address pools carved out of a pod's prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPool {
    Loopback,
    Irb,
    InterConnect,
    Management,
}

impl AddressPool {
    pub fn prefix_field(&self) -> &'static str {
        match self {
            AddressPool::Loopback => "loopbackPrefix",
            AddressPool::Irb => "vlanPrefix",
            AddressPool::InterConnect => "interConnectPrefix",
            AddressPool::Management => "managementPrefix",
        }
    }
}

impl fmt::Display for AddressPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix_field())
    }
}

/// Errors that can occur while validating, reconciling or allocating a pod.
///
/// Validation runs before any mutation, so a returned error means nothing was applied.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Missing mandatory field, malformed value or unknown family/role pair
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Inventory size or role counts disagree with the pod
    #[error("Capacity mismatch: {0}")]
    Capacity(String),

    /// Prefix too small for the pool it feeds
    #[error("Pod '{pod}': {pool} {prefix} is too small, minimum required: {minimum}")]
    AddressSpace {
        pod: String,
        pool: AddressPool,
        prefix: String,
        minimum: String,
    },

    /// Referenced pod or device does not exist
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Persistence collaborator failure
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ProvisionError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }
}

impl ProvisionError {
    /// Convert a store error, turning a typed `NotFoundError` into `NotFound`
    pub fn from_storage(err: anyhow::Error) -> Self {
        if let Some(nf) = err.downcast_ref::<crate::db::NotFoundError>() {
            return Self::not_found(&nf.resource, &nf.id);
        }
        Self::Storage(err)
    }
}

pub type ProvisionResult<T> = std::result::Result<T, ProvisionError>;
