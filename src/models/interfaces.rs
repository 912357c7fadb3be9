use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Arena handle of a device inside a fabric. Equal to its persisted ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIx(pub usize);

/// Arena handle of a physical interface. Equal to its persisted sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IfdIx(pub usize);

/// Arena handle of a logical interface. Equal to its persisted sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IflIx(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceRole {
    Uplink,
    Downlink,
}

impl InterfaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceRole::Uplink => "uplink",
            InterfaceRole::Downlink => "downlink",
        }
    }
}

impl FromStr for InterfaceRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uplink" => Ok(InterfaceRole::Uplink),
            "downlink" => Ok(InterfaceRole::Downlink),
            other => Err(format!("unknown interface role: {}", other)),
        }
    }
}

/// InterfaceDefinition (IFD) is a physical port.
///
/// `peer` is a non-owning, symmetric reference to the IFD at the other end of
/// the cable. `layer_above` is the unit-0 logical interface configured on it.
/// Both are only changed through [`crate::topology::Fabric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDefinition {
    pub name: String,
    pub device: DeviceIx,
    pub role: InterfaceRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lldp_status: Option<String>,
    pub(crate) peer: Option<IfdIx>,
    pub(crate) layer_above: Option<IflIx>,
}

impl InterfaceDefinition {
    pub fn peer(&self) -> Option<IfdIx> {
        self.peer
    }

    pub fn layer_above(&self) -> Option<IflIx> {
        self.layer_above
    }
}

/// InterfaceLogical (IFL) is an addressable unit: `lo0.0`, `irb.1` or `<ifd>.0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceLogical {
    pub name: String,
    pub device: DeviceIx,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
}

/// Name of the unit-0 logical interface on a port
pub fn unit_zero_name(ifd_name: &str) -> String {
    format!("{}.0", ifd_name)
}
