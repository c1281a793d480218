// Device registry

use super::LookupFlags;
use crate::device::Device;
use crate::enums::DeviceKind;

#[derive(Debug, Default)]
pub struct DeviceArray {
    devices: Vec<Device>,
}

impl DeviceArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, device: Device) {
        self.devices.push(device);
    }

    pub fn remove(&mut self, object_path: &str) -> Option<Device> {
        let idx = self.devices.iter().position(|d| d.object_path() == object_path)?;
        Some(self.devices.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }

    fn position_by_id_owner(&self, id: &str, owner: u32, flags: LookupFlags) -> Option<usize> {
        let exact = self
            .devices
            .iter()
            .position(|d| d.id() == id && d.owner() == owner);
        match (exact, flags) {
            (Some(idx), _) => Some(idx),
            (None, LookupFlags::OwnerOptional) => self.devices.iter().position(|d| d.id() == id),
            (None, LookupFlags::Exact) => None,
        }
    }

    pub fn get_by_id_owner(&self, id: &str, owner: u32, flags: LookupFlags) -> Option<&Device> {
        self.position_by_id_owner(id, owner, flags).map(|idx| &self.devices[idx])
    }

    pub fn get_by_id_owner_mut(&mut self, id: &str, owner: u32, flags: LookupFlags) -> Option<&mut Device> {
        let idx = self.position_by_id_owner(id, owner, flags)?;
        Some(&mut self.devices[idx])
    }

    pub fn get_by_object_path(&self, object_path: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.object_path() == object_path)
    }

    pub fn get_by_object_path_mut(&mut self, object_path: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.object_path() == object_path)
    }

    pub fn get_by_property(&self, key: &str, value: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.property_value(key).as_deref() == Some(value))
    }

    pub fn get_by_kind(&self, kind: DeviceKind) -> Vec<&Device> {
        self.devices.iter().filter(|d| d.kind() == kind).collect()
    }

    pub fn get_by_metadata(&self, key: &str, value: &str) -> Vec<&Device> {
        self.devices
            .iter()
            .filter(|d| d.metadata_item(key) == Some(value))
            .collect()
    }
}
