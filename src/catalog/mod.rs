use std::collections::HashMap;

use anyhow::Context;
use serde::Deserialize;

use crate::error::{ProvisionError, ProvisionResult};
use crate::models::DeviceRole;

const BUILTIN_CATALOG: &str = include_str!("../../conf/device_families.json");

/// Ordered port names of one device family in one role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    pub uplink_ports: Vec<String>,
    pub downlink_ports: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    families: HashMap<String, FamilyEntry>,
    #[serde(default)]
    variants: HashMap<String, HashMap<String, FamilyEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FamilyEntry {
    ports: Option<String>,
    uplink_ports: Option<String>,
    downlink_ports: Option<String>,
    spine: Option<RoleEntry>,
    leaf: Option<RoleEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleEntry {
    uplink_ports: Option<String>,
    downlink_ports: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct FamilySku {
    spine: Option<PortSet>,
    leaf: Option<PortSet>,
}

impl FamilySku {
    fn for_role(&self, role: DeviceRole) -> Option<&PortSet> {
        match role {
            DeviceRole::Spine => self.spine.as_ref(),
            DeviceRole::Leaf => self.leaf.as_ref(),
        }
    }
}

/// Immutable family/role -> port list lookup table. Loaded once at startup,
/// expanded eagerly and shared across pods behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct DeviceSkuCatalog {
    families: HashMap<String, FamilySku>,
    variants: HashMap<String, HashMap<String, FamilySku>>,
}

impl DeviceSkuCatalog {
    /// Catalog shipped with the crate
    pub fn builtin() -> ProvisionResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog document from disk
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read device catalog {}", path))?;
        let catalog = Self::from_json(&content)
            .with_context(|| format!("Invalid device catalog {}", path))?;
        Ok(catalog)
    }

    /// Parse and expand a catalog document. Malformed port ranges are
    /// configuration errors raised here, never at lookup time.
    pub fn from_json(content: &str) -> ProvisionResult<Self> {
        let file: CatalogFile = serde_json::from_str(content)
            .map_err(|e| ProvisionError::config(format!("device catalog: {}", e)))?;

        let mut families = HashMap::new();
        for (family, entry) in &file.families {
            families.insert(family.clone(), build_sku(family, entry)?);
        }

        let mut variants = HashMap::new();
        for (variant, entries) in &file.variants {
            let mut skus = HashMap::new();
            for (family, entry) in entries {
                skus.insert(family.clone(), build_sku(family, entry)?);
            }
            variants.insert(variant.clone(), skus);
        }

        tracing::debug!(
            "Loaded device catalog: {} families, {} topology variants",
            families.len(),
            variants.len()
        );
        Ok(Self { families, variants })
    }

    /// Ports of `family` acting as `role`. A topology-variant entry wins over the
    /// generic family entry when it defines the role.
    pub fn lookup(&self, family: &str, role: DeviceRole, variant: Option<&str>) -> Option<&PortSet> {
        variant
            .and_then(|v| self.variants.get(v))
            .and_then(|skus| skus.get(family))
            .and_then(|sku| sku.for_role(role))
            .or_else(|| self.families.get(family).and_then(|sku| sku.for_role(role)))
    }

    pub fn supports(&self, family: &str, role: DeviceRole, variant: Option<&str>) -> bool {
        self.lookup(family, role, variant).is_some()
    }
}

fn build_sku(family: &str, entry: &FamilyEntry) -> ProvisionResult<FamilySku> {
    let expand = |list: &Option<String>| -> ProvisionResult<Vec<String>> {
        match list {
            Some(s) => expand_port_list(s)
                .map_err(|e| ProvisionError::config(format!("family {}: {}", family, e))),
            None => Ok(Vec::new()),
        }
    };

    let spine = match &entry.spine {
        Some(role) => Some(PortSet {
            uplink_ports: expand(&role.uplink_ports)?,
            downlink_ports: expand(&role.downlink_ports)?,
        }),
        None => {
            let downlinks = expand(&entry.downlink_ports.clone().or_else(|| entry.ports.clone()))?;
            if downlinks.is_empty() {
                None
            } else {
                Some(PortSet {
                    uplink_ports: expand(&entry.uplink_ports)?,
                    downlink_ports: downlinks,
                })
            }
        }
    };

    let leaf = match &entry.leaf {
        Some(role) => Some(PortSet {
            uplink_ports: expand(&role.uplink_ports)?,
            downlink_ports: expand(&role.downlink_ports)?,
        }),
        None if entry.uplink_ports.is_some() => Some(PortSet {
            uplink_ports: expand(&entry.uplink_ports)?,
            downlink_ports: expand(&entry.downlink_ports)?,
        }),
        None => None,
    };

    Ok(FamilySku { spine, leaf })
}

/// Expand a comma-separated list of port names and ranges.
/// `"et-0/0/[48-49], xe-0/0/0"` -> `["et-0/0/48", "et-0/0/49", "xe-0/0/0"]`
pub fn expand_port_list(list: &str) -> Result<Vec<String>, String> {
    let mut ports = Vec::new();
    for part in list.split(',').map(str::trim) {
        if part.is_empty() {
            return Err(format!("empty entry in port list '{}'", list));
        }
        ports.extend(expand_port_range(part)?);
    }
    Ok(ports)
}

/// Expand a single `prefix-F/P/[start-end]` range or a plain port name.
pub fn expand_port_range(range: &str) -> Result<Vec<String>, String> {
    if !range.contains('[') && !range.contains(']') {
        return Ok(vec![range.to_string()]);
    }

    let re = regex_lite::Regex::new(r"^([A-Za-z0-9:/._-]+)\[(\d+)-(\d+)\]$")
        .map_err(|e| format!("port range pattern: {}", e))?;
    let caps = re
        .captures(range)
        .ok_or_else(|| format!("malformed port range '{}'", range))?;

    let prefix = &caps[1];
    let start: u32 = caps[2]
        .parse()
        .map_err(|_| format!("bad range start in '{}'", range))?;
    let end: u32 = caps[3]
        .parse()
        .map_err(|_| format!("bad range end in '{}'", range))?;
    if start > end {
        return Err(format!("range start exceeds end in '{}'", range));
    }

    Ok((start..=end).map(|n| format!("{}{}", prefix, n)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_port_range() {
        assert_eq!(
            expand_port_range("et-0/0/[48-50]").unwrap(),
            vec!["et-0/0/48", "et-0/0/49", "et-0/0/50"]
        );
        assert_eq!(expand_port_range("xe-0/0/[7-7]").unwrap(), vec!["xe-0/0/7"]);
        assert_eq!(expand_port_range("ge-0/0/1").unwrap(), vec!["ge-0/0/1"]);
    }

    #[test]
    fn test_malformed_ranges_are_rejected() {
        assert!(expand_port_range("et-0/0/[5-2]").is_err());
        assert!(expand_port_range("et-0/0/[0-]").is_err());
        assert!(expand_port_range("et-0/0/[a-b]").is_err());
        assert!(expand_port_range("et-0/0/0-3]").is_err());
        assert!(expand_port_list("et-0/0/[0-1],,xe-0/0/0").is_err());
    }

    #[test]
    fn test_expand_port_list() {
        let ports = expand_port_list("et-0/0/[0-1], xe-0/0/9").unwrap();
        assert_eq!(ports, vec!["et-0/0/0", "et-0/0/1", "xe-0/0/9"]);
    }

    #[test]
    fn test_builtin_catalog_lookup() {
        let catalog = DeviceSkuCatalog::builtin().unwrap();

        let leaf = catalog.lookup("qfx5100-48s-6q", DeviceRole::Leaf, None).unwrap();
        assert_eq!(leaf.uplink_ports.len(), 6);
        assert_eq!(leaf.uplink_ports[0], "et-0/0/48");
        assert_eq!(leaf.downlink_ports.len(), 48);

        let spine = catalog.lookup("qfx5100-24q-2p", DeviceRole::Spine, None).unwrap();
        assert_eq!(spine.downlink_ports.len(), 24);
        assert!(spine.uplink_ports.is_empty());

        // ports-only family cannot act as a leaf
        assert!(!catalog.supports("qfx5100-24q-2p", DeviceRole::Leaf, None));
        assert!(!catalog.supports("no-such-box", DeviceRole::Spine, None));
    }

    #[test]
    fn test_variant_overrides_generic_entry() {
        let catalog = DeviceSkuCatalog::builtin().unwrap();

        let spine = catalog
            .lookup("qfx5100-24q-2p", DeviceRole::Spine, Some("fiveStage"))
            .unwrap();
        assert_eq!(spine.downlink_ports.len(), 16);
        assert_eq!(spine.uplink_ports[0], "et-0/0/16");

        // family without a variant entry falls back to the generic one
        let leaf = catalog
            .lookup("qfx5100-48s-6q", DeviceRole::Leaf, Some("fiveStage"))
            .unwrap();
        assert_eq!(leaf.uplink_ports.len(), 6);
    }

    #[test]
    fn test_malformed_catalog_is_a_configuration_error() {
        let err = DeviceSkuCatalog::from_json(r#"{"families": {"bad": {"ports": "et-0/0/[9-1]"}}}"#)
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Configuration(_)));
        assert!(err.to_string().contains("bad"));
    }
}
