use crate::catalog::{DeviceSkuCatalog, PortSet};
use crate::error::{ProvisionError, ProvisionResult};
use crate::models::DeviceRole;

/// Ordered uplink and downlink port names for a device.
///
/// A leaf whose family is not known yet gets placeholder uplinks
/// `uplink-0 .. uplink-(spine_count-1)` and no downlinks. A known leaf family
/// offering fewer uplinks than there are spines is padded with placeholders.
pub fn resolve(
    catalog: &DeviceSkuCatalog,
    family: Option<&str>,
    role: DeviceRole,
    variant: Option<&str>,
    spine_count: usize,
) -> ProvisionResult<PortSet> {
    let Some(family) = family else {
        return match role {
            DeviceRole::Leaf => Ok(PortSet {
                uplink_ports: placeholder_uplinks(&[], spine_count),
                downlink_ports: Vec::new(),
            }),
            DeviceRole::Spine => Err(ProvisionError::config("spine device without a family")),
        };
    };

    let ports = catalog.lookup(family, role, variant).ok_or_else(|| {
        ProvisionError::config(format!("device family {} cannot act as {}", family, role))
    })?;

    match role {
        DeviceRole::Spine => Ok(ports.clone()),
        DeviceRole::Leaf => {
            let mut uplink_ports = ports.uplink_ports.clone();
            let padding = placeholder_uplinks(&uplink_ports, spine_count);
            if !padding.is_empty() {
                tracing::debug!(
                    "Family {} offers {} uplinks for {} spines, padding with {:?}",
                    family,
                    uplink_ports.len(),
                    spine_count,
                    padding
                );
            }
            uplink_ports.extend(padding);
            Ok(PortSet {
                uplink_ports,
                downlink_ports: ports.downlink_ports.clone(),
            })
        }
    }
}

/// `uplink-N` names needed to bring `existing` up to `wanted`, numbered from
/// the first unused index.
fn placeholder_uplinks(existing: &[String], wanted: usize) -> Vec<String> {
    let mut names = Vec::new();
    let mut n = existing.len();
    while existing.len() + names.len() < wanted {
        let name = format!("uplink-{}", n);
        if !existing.contains(&name) {
            names.push(name);
        }
        n += 1;
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::catalog;

    #[test]
    fn test_unknown_leaf_gets_placeholders() {
        let ports = resolve(&catalog(), None, DeviceRole::Leaf, None, 2).unwrap();
        assert_eq!(ports.uplink_ports, vec!["uplink-0", "uplink-1"]);
        assert!(ports.downlink_ports.is_empty());
    }

    #[test]
    fn test_known_leaf_uses_catalog_order() {
        let ports = resolve(&catalog(), Some("qfx5100-48s-6q"), DeviceRole::Leaf, None, 2).unwrap();
        assert_eq!(&ports.uplink_ports[..2], ["et-0/0/48", "et-0/0/49"]);
        assert_eq!(ports.downlink_ports.len(), 48);
    }

    #[test]
    fn test_short_uplink_list_is_padded() {
        // ex4300 offers four uplinks
        let ports = resolve(&catalog(), Some("ex4300-24p"), DeviceRole::Leaf, None, 6).unwrap();
        assert_eq!(ports.uplink_ports.len(), 6);
        assert_eq!(ports.uplink_ports[3], "et-0/1/3");
        assert_eq!(ports.uplink_ports[4], "uplink-4");
        assert_eq!(ports.uplink_ports[5], "uplink-5");
    }

    #[test]
    fn test_spine_family_must_be_known() {
        assert!(resolve(&catalog(), None, DeviceRole::Spine, None, 2).is_err());
        assert!(resolve(&catalog(), Some("ex4300-24p"), DeviceRole::Spine, None, 2).is_ok());
        assert!(resolve(&catalog(), Some("mystery"), DeviceRole::Spine, None, 2).is_err());
    }

    #[test]
    fn test_placeholder_numbering_skips_taken_names() {
        let existing = vec!["uplink-1".to_string()];
        assert_eq!(placeholder_uplinks(&existing, 3), vec!["uplink-2", "uplink-3"]);
    }
}
