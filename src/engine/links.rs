use crate::error::{ProvisionError, ProvisionResult};
use crate::models::{DeviceRole, IfdIx, InterfaceRole};
use crate::topology::Fabric;

/// Cable the complete bipartite spine-leaf mesh: spine `j`'s `i`-th downlink
/// connects to leaf `i`'s `j`-th uplink. Returns `(spine_ifd, leaf_ifd)` pairs.
pub fn synthesize(fabric: &mut Fabric) -> ProvisionResult<Vec<(IfdIx, IfdIx)>> {
    let spines = fabric.devices_by_role(DeviceRole::Spine);
    let leaves = fabric.devices_by_role(DeviceRole::Leaf);

    let spine_downlinks: Vec<Vec<IfdIx>> = spines
        .iter()
        .map(|&s| fabric.ifds_with_role(s, InterfaceRole::Downlink))
        .collect();

    let mut links = Vec::with_capacity(spines.len() * leaves.len());
    for (i, &leaf) in leaves.iter().enumerate() {
        let uplinks = fabric.ifds_with_role(leaf, InterfaceRole::Uplink);
        for (j, &spine) in spines.iter().enumerate() {
            let spine_ifd = *spine_downlinks[j].get(i).ok_or_else(|| {
                ProvisionError::capacity(format!(
                    "spine {} has {} downlinks, {} leaves need cabling",
                    fabric.device(spine).name,
                    spine_downlinks[j].len(),
                    leaves.len()
                ))
            })?;
            let leaf_ifd = *uplinks.get(j).ok_or_else(|| {
                ProvisionError::capacity(format!(
                    "leaf {} has {} uplinks, {} spines need cabling",
                    fabric.device(leaf).name,
                    uplinks.len(),
                    spines.len()
                ))
            })?;
            fabric.connect(spine_ifd, leaf_ifd)?;
            links.push((spine_ifd, leaf_ifd));
        }
    }

    tracing::debug!(
        "Pod {}: cabled {} spine-leaf links",
        fabric.pod().name,
        links.len()
    );
    Ok(links)
}
