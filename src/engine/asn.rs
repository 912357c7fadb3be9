use crate::error::{ProvisionError, ProvisionResult};
use crate::models::DeviceRole;
use crate::topology::Fabric;

/// Sequential AS numbers per role in device order, starting at the pod's
/// `spine_as` / `leaf_as`. The last number handed out is recorded on the pod.
pub fn allocate_asns(fabric: &mut Fabric) -> ProvisionResult<()> {
    let pod = fabric.pod().clone();

    for (role, base) in [(DeviceRole::Spine, pod.spine_as), (DeviceRole::Leaf, pod.leaf_as)] {
        let devices = fabric.devices_by_role(role);
        let mut last = None;
        for (i, device) in devices.into_iter().enumerate() {
            let asn = asn_at(base, i).ok_or_else(|| {
                ProvisionError::config(format!("pod '{}': {} AS range starting at {} overflows", pod.name, role, base))
            })?;
            fabric.set_asn(device, asn);
            last = Some(asn);
        }
        if let Some(last) = last {
            fabric.set_allocated_asn(role, last);
        }
    }

    tracing::debug!(
        "Pod {}: spine AS {}.., leaf AS {}..",
        pod.name,
        pod.spine_as,
        pod.leaf_as
    );
    Ok(())
}

/// Inclusive AS range a role occupies, `None` on overflow
pub(crate) fn asn_range(base: u32, count: u32) -> Option<(u32, u32)> {
    if count == 0 {
        return None;
    }
    base.checked_add(count - 1).map(|last| (base, last))
}

fn asn_at(base: u32, i: usize) -> Option<u32> {
    u32::try_from(i).ok().and_then(|i| base.checked_add(i))
}
