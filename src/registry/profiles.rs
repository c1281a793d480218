// Profile registry

use std::path::Path;

use super::LookupFlags;
use crate::enums::ProfileKind;
use crate::profile::Profile;

#[derive(Debug, Default)]
pub struct ProfileArray {
    profiles: Vec<Profile>,
}

impl ProfileArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, profile: Profile) {
        self.profiles.push(profile);
    }

    pub fn remove(&mut self, object_path: &str) -> Option<Profile> {
        let idx = self.profiles.iter().position(|p| p.object_path() == object_path)?;
        Some(self.profiles.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    fn position_by_id_owner(&self, id: &str, owner: u32, flags: LookupFlags) -> Option<usize> {
        let exact = self
            .profiles
            .iter()
            .position(|p| p.id() == id && p.owner() == owner);
        match (exact, flags) {
            (Some(idx), _) => Some(idx),
            (None, LookupFlags::OwnerOptional) => self.profiles.iter().position(|p| p.id() == id),
            (None, LookupFlags::Exact) => None,
        }
    }

    pub fn get_by_id_owner(&self, id: &str, owner: u32, flags: LookupFlags) -> Option<&Profile> {
        self.position_by_id_owner(id, owner, flags).map(|idx| &self.profiles[idx])
    }

    pub fn get_by_object_path(&self, object_path: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.object_path() == object_path)
    }

    pub fn get_by_object_path_mut(&mut self, object_path: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.object_path() == object_path)
    }

    pub fn get_by_filename(&self, filename: &Path) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.filename() == Some(filename))
    }

    pub fn get_by_property(&self, key: &str, value: &str) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.property_value(key).as_deref() == Some(value))
    }

    pub fn get_by_kind(&self, kind: ProfileKind) -> Vec<&Profile> {
        self.profiles.iter().filter(|p| p.kind() == kind).collect()
    }

    pub fn get_by_metadata(&self, key: &str, value: &str) -> Vec<&Profile> {
        self.profiles
            .iter()
            .filter(|p| p.metadata_item(key) == Some(value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::ObjectScope;

    #[test]
    fn test_owner_fallback() {
        let mut array = ProfileArray::new();
        array.add(Profile::new("prof", 1000, ObjectScope::Temp));

        assert!(array.get_by_id_owner("prof", 0, LookupFlags::Exact).is_none());
        assert_eq!(
            array.get_by_id_owner("prof", 0, LookupFlags::OwnerOptional).unwrap().owner(),
            1000
        );
    }

    #[test]
    fn test_metadata_and_property_lookup() {
        let mut a = Profile::new("a", 0, ObjectScope::Temp);
        a.set_metadata_item("MAPPING_device_id", "xrandr-HDMI-1");
        a.set_qualifier("RGB.Plain.300dpi");
        let mut b = Profile::new("b", 0, ObjectScope::Temp);
        b.set_metadata_item("MAPPING_device_id", "xrandr-HDMI-1");

        let mut array = ProfileArray::new();
        array.add(a);
        array.add(b);

        assert_eq!(array.get_by_metadata("MAPPING_device_id", "xrandr-HDMI-1").len(), 2);
        assert_eq!(array.get_by_property("Qualifier", "RGB.Plain.300dpi").unwrap().id(), "a");
        assert_eq!(array.get_by_property("ProfileId", "b").unwrap().id(), "b");
        assert!(array.get_by_filename(Path::new("/none.icc")).is_none());
        assert_eq!(array.get_by_kind(ProfileKind::Unknown).len(), 2);
    }
}
