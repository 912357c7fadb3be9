use std::collections::HashSet;

use crate::error::{AddressPool, ProvisionError, ProvisionResult};
use crate::models::*;

/// One recorded mutation of a fabric
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    PodUpdated,
    PodStateChanged { from: PodState, to: PodState },
    InventorySnapshotStored,
    BlockAllocated { pool: AddressPool, block: String },
    AsnRangeAllocated { role: DeviceRole, last: u32 },
    DeviceCreated(DeviceIx),
    DeviceUpdated(DeviceIx),
    ManagementIpChanged { device: DeviceIx, ip: Option<String> },
    AsnAssigned { device: DeviceIx, asn: u32 },
    IfdCreated(IfdIx),
    IflCreated(IflIx),
    IfdRenamed { ifd: IfdIx, from: String, to: String },
    IflRenamed { ifl: IflIx, from: String, to: String },
    Connected(IfdIx, IfdIx),
    IflAddressed { ifl: IflIx, address: Option<String> },
    IflMtuChanged { ifl: IflIx, mtu: Option<u32> },
}

/// One pod's device/interface subgraph.
///
/// Devices, IFDs and IFLs live in flat vectors addressed by [`DeviceIx`],
/// [`IfdIx`] and [`IflIx`]. An index equals the row's persisted sequence
/// number. Peer and layer-above links are only changed through the methods
/// here, and every mutation that actually changes a value is journaled.
#[derive(Debug, Clone)]
pub struct Fabric {
    pod: Pod,
    devices: Vec<Device>,
    ifds: Vec<InterfaceDefinition>,
    ifls: Vec<InterfaceLogical>,
    journal: Vec<Change>,
}

impl Fabric {
    /// Empty fabric for a pod that has no devices yet
    pub fn new(pod: Pod) -> Self {
        Self {
            pod,
            devices: Vec::new(),
            ifds: Vec::new(),
            ifls: Vec::new(),
            journal: Vec::new(),
        }
    }

    /// Rebuild a fabric from persisted rows already ordered by sequence number.
    pub fn from_parts(
        pod: Pod,
        devices: Vec<Device>,
        ifds: Vec<InterfaceDefinition>,
        ifls: Vec<InterfaceLogical>,
    ) -> ProvisionResult<Self> {
        let fabric = Self {
            pod,
            devices,
            ifds,
            ifls,
            journal: Vec::new(),
        };
        fabric.check_invariants()?;
        Ok(fabric)
    }

    pub fn pod(&self) -> &Pod {
        &self.pod
    }

    pub fn has_devices(&self) -> bool {
        !self.devices.is_empty()
    }

    // ---- journal ----

    pub fn changes(&self) -> &[Change] {
        &self.journal
    }

    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.journal)
    }

    pub fn is_dirty(&self) -> bool {
        !self.journal.is_empty()
    }

    fn record(&mut self, change: Change) {
        self.journal.push(change);
    }

    // ---- pod ----

    pub fn apply_pod_patch(&mut self, patch: &PodPatch) -> PatchEffect {
        let effect = self.pod.apply_patch(patch);
        if effect.changed {
            self.record(Change::PodUpdated);
        }
        effect
    }

    pub fn set_pod_state(&mut self, state: PodState) {
        if self.pod.state != state {
            let from = self.pod.state;
            self.pod.state = state;
            self.pod.updated_at = chrono::Utc::now();
            self.record(Change::PodStateChanged { from, to: state });
        }
    }

    pub fn set_inventory_data(&mut self, data: String) {
        if self.pod.inventory_data.as_deref() != Some(data.as_str()) {
            self.pod.inventory_data = Some(data);
            self.record(Change::InventorySnapshotStored);
        }
    }

    /// Record the block carved out of one of the pod's prefixes.
    /// Management addresses are handed out by walk and have no block.
    pub fn set_allocated_block(&mut self, pool: AddressPool, block: String) {
        let slot = match pool {
            AddressPool::Loopback => &mut self.pod.allocated_loopback_block,
            AddressPool::Irb => &mut self.pod.allocated_irb_block,
            AddressPool::InterConnect => &mut self.pod.allocated_inter_connect_block,
            AddressPool::Management => return,
        };
        if slot.as_deref() != Some(block.as_str()) {
            *slot = Some(block.clone());
            self.record(Change::BlockAllocated { pool, block });
        }
    }

    pub fn set_allocated_asn(&mut self, role: DeviceRole, last: u32) {
        let slot = match role {
            DeviceRole::Spine => &mut self.pod.allocated_spine_as,
            DeviceRole::Leaf => &mut self.pod.allocated_leaf_as,
        };
        if *slot != Some(last) {
            *slot = Some(last);
            self.record(Change::AsnRangeAllocated { role, last });
        }
    }

    // ---- devices ----

    pub fn add_device(&mut self, device: Device) -> DeviceIx {
        let ix = DeviceIx(self.devices.len());
        self.devices.push(device);
        self.record(Change::DeviceCreated(ix));
        ix
    }

    pub fn device(&self, ix: DeviceIx) -> &Device {
        &self.devices[ix.0]
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn ifds(&self) -> &[InterfaceDefinition] {
        &self.ifds
    }

    pub fn ifls(&self) -> &[InterfaceLogical] {
        &self.ifls
    }

    /// Devices of one role in creation order
    pub fn devices_by_role(&self, role: DeviceRole) -> Vec<DeviceIx> {
        self.devices
            .iter()
            .enumerate()
            .filter(|(_, d)| d.role == role)
            .map(|(i, _)| DeviceIx(i))
            .collect()
    }

    pub fn find_device_by_id(&self, id: &str) -> Option<DeviceIx> {
        self.devices.iter().position(|d| d.id == id).map(DeviceIx)
    }

    pub fn find_device_by_name(&self, role: DeviceRole, name: &str) -> Option<DeviceIx> {
        self.devices
            .iter()
            .position(|d| d.role == role && d.name == name)
            .map(DeviceIx)
    }

    pub fn apply_device_patch(&mut self, ix: DeviceIx, patch: &DevicePatch) -> ProvisionResult<DeviceChange> {
        let change = self.devices[ix.0].apply_patch(patch)?;
        if change.changed {
            self.record(Change::DeviceUpdated(ix));
        }
        Ok(change)
    }

    pub fn set_management_ip(&mut self, ix: DeviceIx, ip: Option<String>) {
        if self.devices[ix.0].management_ip != ip {
            self.devices[ix.0].management_ip = ip.clone();
            self.record(Change::ManagementIpChanged { device: ix, ip });
        }
    }

    pub fn set_asn(&mut self, ix: DeviceIx, asn: u32) {
        if self.devices[ix.0].asn != Some(asn) {
            self.devices[ix.0].asn = Some(asn);
            self.record(Change::AsnAssigned { device: ix, asn });
        }
    }

    // ---- physical interfaces ----

    pub fn add_ifd(&mut self, device: DeviceIx, name: &str, role: InterfaceRole) -> IfdIx {
        let ix = IfdIx(self.ifds.len());
        self.ifds.push(InterfaceDefinition {
            name: name.to_string(),
            device,
            role,
            lldp_status: None,
            peer: None,
            layer_above: None,
        });
        self.record(Change::IfdCreated(ix));
        ix
    }

    pub fn ifd(&self, ix: IfdIx) -> &InterfaceDefinition {
        &self.ifds[ix.0]
    }

    /// IFDs of a device in sequence order
    pub fn ifds_of(&self, device: DeviceIx) -> Vec<IfdIx> {
        self.ifds
            .iter()
            .enumerate()
            .filter(|(_, i)| i.device == device)
            .map(|(i, _)| IfdIx(i))
            .collect()
    }

    pub fn ifds_with_role(&self, device: DeviceIx, role: InterfaceRole) -> Vec<IfdIx> {
        self.ifds_of(device)
            .into_iter()
            .filter(|ix| self.ifds[ix.0].role == role)
            .collect()
    }

    /// Cable two ports together. Both ends must be free and sit on a spine
    /// and a leaf respectively.
    pub fn connect(&mut self, a: IfdIx, b: IfdIx) -> ProvisionResult<()> {
        let (ifd_a, ifd_b) = (&self.ifds[a.0], &self.ifds[b.0]);
        if ifd_a.device == ifd_b.device {
            return Err(ProvisionError::config(format!(
                "cannot connect {} to {} on the same device",
                ifd_a.name, ifd_b.name
            )));
        }
        let (dev_a, dev_b) = (&self.devices[ifd_a.device.0], &self.devices[ifd_b.device.0]);
        if dev_a.role == dev_b.role {
            return Err(ProvisionError::config(format!(
                "cannot connect {} {}:{} to {} {}:{}",
                dev_a.role, dev_a.name, ifd_a.name, dev_b.role, dev_b.name, ifd_b.name
            )));
        }
        for ifd in [ifd_a, ifd_b] {
            if ifd.peer.is_some() {
                return Err(ProvisionError::config(format!(
                    "interface {}:{} is already connected",
                    self.devices[ifd.device.0].name, ifd.name
                )));
            }
        }

        self.ifds[a.0].peer = Some(b);
        self.ifds[b.0].peer = Some(a);
        self.record(Change::Connected(a, b));
        Ok(())
    }

    pub fn rename_ifd(&mut self, ix: IfdIx, name: &str) {
        let ifd = &mut self.ifds[ix.0];
        if ifd.name != name {
            let from = std::mem::replace(&mut ifd.name, name.to_string());
            self.record(Change::IfdRenamed {
                ifd: ix,
                from,
                to: name.to_string(),
            });
        }
    }

    // ---- logical interfaces ----

    pub fn ifl(&self, ix: IflIx) -> &InterfaceLogical {
        &self.ifls[ix.0]
    }

    pub fn find_ifl(&self, device: DeviceIx, name: &str) -> Option<IflIx> {
        self.ifls
            .iter()
            .position(|l| l.device == device && l.name == name)
            .map(IflIx)
    }

    fn add_ifl(&mut self, device: DeviceIx, name: String) -> IflIx {
        let ix = IflIx(self.ifls.len());
        self.ifls.push(InterfaceLogical {
            name,
            device,
            ip_address: None,
            mtu: None,
        });
        self.record(Change::IflCreated(ix));
        ix
    }

    /// Device-level unit such as `lo0.0` or `irb.1`, created on first use
    pub fn upsert_device_ifl(&mut self, device: DeviceIx, name: &str) -> IflIx {
        match self.find_ifl(device, name) {
            Some(ix) => ix,
            None => self.add_ifl(device, name.to_string()),
        }
    }

    /// Unit 0 stacked on a physical port, created on first use
    pub fn upsert_unit_zero(&mut self, ifd: IfdIx) -> IflIx {
        if let Some(ix) = self.ifds[ifd.0].layer_above {
            return ix;
        }
        let device = self.ifds[ifd.0].device;
        let ix = self.add_ifl(device, unit_zero_name(&self.ifds[ifd.0].name));
        self.ifds[ifd.0].layer_above = Some(ix);
        ix
    }

    pub fn rename_ifl(&mut self, ix: IflIx, name: &str) {
        let ifl = &mut self.ifls[ix.0];
        if ifl.name != name {
            let from = std::mem::replace(&mut ifl.name, name.to_string());
            self.record(Change::IflRenamed {
                ifl: ix,
                from,
                to: name.to_string(),
            });
        }
    }

    pub fn set_ifl_address(&mut self, ix: IflIx, address: Option<String>) {
        if self.ifls[ix.0].ip_address != address {
            self.ifls[ix.0].ip_address = address.clone();
            self.record(Change::IflAddressed { ifl: ix, address });
        }
    }

    pub fn set_ifl_mtu(&mut self, ix: IflIx, mtu: Option<u32>) {
        if self.ifls[ix.0].mtu != mtu {
            self.ifls[ix.0].mtu = mtu;
            self.record(Change::IflMtuChanged { ifl: ix, mtu });
        }
    }

    /// Verify the structural invariants of the graph: indices in range,
    /// symmetric spine-leaf peers, unique names per scope.
    pub fn check_invariants(&self) -> ProvisionResult<()> {
        let broken = |msg: String| Err(ProvisionError::config(format!("pod '{}': {}", self.pod.name, msg)));

        let mut device_names = HashSet::new();
        let mut device_ids = HashSet::new();
        for device in &self.devices {
            if !device_names.insert(device.name.as_str()) {
                return broken(format!("duplicate device name {}", device.name));
            }
            if !device_ids.insert(device.id.as_str()) {
                return broken(format!("duplicate device id {}", device.id));
            }
        }

        let mut ifd_names = HashSet::new();
        for (i, ifd) in self.ifds.iter().enumerate() {
            if ifd.device.0 >= self.devices.len() {
                return broken(format!("interface {} references a missing device", ifd.name));
            }
            if !ifd_names.insert((ifd.device, ifd.name.as_str())) {
                return broken(format!(
                    "duplicate interface {} on {}",
                    ifd.name, self.devices[ifd.device.0].name
                ));
            }
            if let Some(peer) = ifd.peer {
                let Some(other) = self.ifds.get(peer.0) else {
                    return broken(format!("interface {} has a dangling peer", ifd.name));
                };
                if other.peer != Some(IfdIx(i)) {
                    return broken(format!("peer of {} is not symmetric", ifd.name));
                }
                if other.device.0 >= self.devices.len()
                    || self.devices[other.device.0].role == self.devices[ifd.device.0].role
                {
                    return broken(format!("interface {} is not cabled spine to leaf", ifd.name));
                }
            }
            if let Some(above) = ifd.layer_above {
                match self.ifls.get(above.0) {
                    Some(ifl) if ifl.device == ifd.device => {}
                    _ => return broken(format!("interface {} has an invalid logical unit", ifd.name)),
                }
            }
        }

        let mut ifl_names = HashSet::new();
        for ifl in &self.ifls {
            if ifl.device.0 >= self.devices.len() {
                return broken(format!("logical interface {} references a missing device", ifl.name));
            }
            if !ifl_names.insert((ifl.device, ifl.name.as_str())) {
                return broken(format!(
                    "duplicate logical interface {} on {}",
                    ifl.name, self.devices[ifl.device.0].name
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_spec;

    fn two_device_fabric() -> (Fabric, IfdIx, IfdIx) {
        let mut fabric = Fabric::new(Pod::from_spec(&sample_spec()));
        let leaf = fabric.add_device(Device::new("leaf-1", DeviceRole::Leaf, None));
        let spine = fabric.add_device(Device::new("spine-1", DeviceRole::Spine, None));
        let up = fabric.add_ifd(leaf, "uplink-0", InterfaceRole::Uplink);
        let down = fabric.add_ifd(spine, "et-0/0/0", InterfaceRole::Downlink);
        (fabric, up, down)
    }

    #[test]
    fn test_connect_is_symmetric() {
        let (mut fabric, up, down) = two_device_fabric();
        fabric.connect(down, up).unwrap();
        assert_eq!(fabric.ifd(up).peer(), Some(down));
        assert_eq!(fabric.ifd(down).peer(), Some(up));
        assert!(fabric.check_invariants().is_ok());
    }

    #[test]
    fn test_connect_rejects_bad_cabling() {
        let (mut fabric, up, down) = two_device_fabric();
        let leaf = fabric.ifd(up).device;
        let other_up = fabric.add_ifd(leaf, "uplink-1", InterfaceRole::Uplink);
        assert!(fabric.connect(up, other_up).is_err());

        let leaf2 = fabric.add_device(Device::new("leaf-2", DeviceRole::Leaf, None));
        let leaf2_up = fabric.add_ifd(leaf2, "uplink-0", InterfaceRole::Uplink);
        assert!(fabric.connect(up, leaf2_up).is_err());

        fabric.connect(up, down).unwrap();
        // spine port already taken
        assert!(fabric.connect(leaf2_up, down).is_err());
        assert_eq!(fabric.ifd(leaf2_up).peer(), None);
    }

    #[test]
    fn test_unchanged_writes_are_not_journaled() {
        let (mut fabric, up, _) = two_device_fabric();
        let ifl = fabric.upsert_unit_zero(up);
        assert_eq!(fabric.ifl(ifl).name, "uplink-0.0");
        assert_eq!(fabric.upsert_unit_zero(up), ifl);

        fabric.set_ifl_address(ifl, Some("192.168.0.1/31".to_string()));
        fabric.take_changes();

        fabric.set_ifl_address(ifl, Some("192.168.0.1/31".to_string()));
        fabric.rename_ifd(up, "uplink-0");
        fabric.set_pod_state(PodState::Unknown);
        assert!(!fabric.is_dirty());
    }

    #[test]
    fn test_duplicate_names_break_invariants() {
        let (mut fabric, _, _) = two_device_fabric();
        fabric.add_device(Device::new("leaf-1", DeviceRole::Leaf, None));
        assert!(fabric.check_invariants().is_err());
    }

    #[test]
    fn test_duplicate_ids_break_invariants() {
        let (mut fabric, _, _) = two_device_fabric();
        let mut twin = Device::new("leaf-2", DeviceRole::Leaf, None);
        twin.id = fabric.devices()[0].id.clone();
        fabric.add_device(twin);
        let err = fabric.check_invariants().unwrap_err();
        assert!(err.to_string().contains("duplicate device id"));
    }

    #[test]
    fn test_from_parts_rejects_one_sided_peer() {
        let (fabric, up, down) = two_device_fabric();
        let mut ifds = fabric.ifds().to_vec();
        ifds[up.0].peer = Some(down);
        let err = Fabric::from_parts(
            fabric.pod().clone(),
            fabric.devices().to_vec(),
            ifds,
            Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not symmetric"));
    }
}
