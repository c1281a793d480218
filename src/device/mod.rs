// Color-managed device entity
// Owns the ordered association list for one device. Profiles are referenced by
// object path; the profile registry owns them.

pub mod qualifier;


use std::collections::BTreeMap;

use crate::constants::*;
use crate::db::{DeviceDb, MappingDb};
use crate::enums::{Colorspace, DeviceKind, DeviceMode, DeviceRelation, ObjectScope};
use crate::error::{ColordError, Result};
use crate::inhibit::Inhibit;
use crate::profile::Profile;
use crate::quirk::vendor_name;
use crate::registry::ProfileArray;
use crate::system::{now_micros, sanitize_object_path};

use qualifier::qualifier_matches;

/// One device to profile link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub profile_id: String,
    pub profile_path: String,
    pub relation: DeviceRelation,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct Device {
    id: String,
    object_path: String,
    owner: u32,
    scope: ObjectScope,
    kind: DeviceKind,
    mode: DeviceMode,
    seat: Option<String>,
    enabled: bool,
    embedded: bool,
    model: Option<String>,
    vendor: Option<String>,
    serial: Option<String>,
    colorspace: Colorspace,
    format: Option<String>,
    created: i64,
    modified: i64,
    metadata: BTreeMap<String, String>,
    associations: Vec<Association>,
    inhibit: Inhibit,
}

pub fn device_object_path(id: &str, owner: u32) -> String {
    if owner == 0 {
        format!("{}/{}", DEVICES_PATH, sanitize_object_path(id))
    } else {
        format!("{}/{}_{}", DEVICES_PATH, sanitize_object_path(id), owner)
    }
}

/// Printer drivers append " Series" to model names
fn fixup_model(kind: DeviceKind, model: &str) -> String {
    match kind {
        DeviceKind::Printer => model.strip_suffix(" Series").unwrap_or(model).to_string(),
        _ => model.to_string(),
    }
}

pub fn check_property_len(key: &str, value: &str) -> Result<()> {
    if key.len() > PROPERTY_KEY_LEN_MAX || value.len() > PROPERTY_VALUE_LEN_MAX {
        return Err(ColordError::InputInvalid(format!("property {} too long", key)));
    }
    Ok(())
}

/// Properties a client may set on a device. `Enabled` has its own call and its
/// own stored key.
pub fn check_device_property(key: &str, value: &str) -> Result<()> {
    check_property_len(key, value)?;
    if key == DEVICE_PROPERTY_ENABLED {
        return Err(ColordError::InputInvalid(format!(
            "property {} is set with SetEnabled",
            key
        )));
    }
    Ok(())
}

/// Hard before soft, newest first within each relation
fn sort_associations(associations: &mut [Association]) {
    associations.sort_by(|a, b| {
        let rank = |r: DeviceRelation| if r == DeviceRelation::Hard { 0 } else { 1 };
        rank(a.relation)
            .cmp(&rank(b.relation))
            .then(b.timestamp.cmp(&a.timestamp))
    });
}

impl Device {
    pub fn new(id: &str, owner: u32, scope: ObjectScope) -> Self {
        let now = now_micros();
        Self {
            id: id.to_string(),
            object_path: device_object_path(id, owner),
            owner,
            scope,
            kind: DeviceKind::Unknown,
            mode: DeviceMode::Unknown,
            seat: None,
            enabled: true,
            embedded: false,
            model: None,
            vendor: None,
            serial: None,
            colorspace: Colorspace::Unknown,
            format: None,
            created: now,
            modified: now,
            metadata: BTreeMap::new(),
            associations: Vec::new(),
            inhibit: Inhibit::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn owner(&self) -> u32 {
        self.owner
    }

    pub fn scope(&self) -> ObjectScope {
        self.scope
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: DeviceMode) {
        self.mode = mode;
    }

    pub fn seat(&self) -> Option<&str> {
        self.seat.as_deref()
    }

    pub fn set_seat(&mut self, seat: &str) {
        self.seat = Some(seat.to_string());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn modified(&self) -> i64 {
        self.modified
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn metadata_item(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata_item(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn inhibit(&self) -> &Inhibit {
        &self.inhibit
    }

    pub fn inhibit_mut(&mut self) -> &mut Inhibit {
        &mut self.inhibit
    }

    pub fn is_profiling(&self) -> bool {
        !self.inhibit.is_valid()
    }

    /// Profile paths as clients see them: nothing while profiling
    pub fn profiles_exposed(&self) -> Vec<String> {
        if self.is_profiling() {
            return Vec::new();
        }
        self.associations.iter().map(|a| a.profile_path.clone()).collect()
    }

    /// Value of a typed property or, failing that, a metadata entry
    pub fn property_value(&self, key: &str) -> Option<String> {
        match key {
            DEVICE_PROPERTY_ID => Some(self.id.clone()),
            DEVICE_PROPERTY_MODEL => self.model.clone(),
            DEVICE_PROPERTY_VENDOR => self.vendor.clone(),
            DEVICE_PROPERTY_SERIAL => self.serial.clone(),
            DEVICE_PROPERTY_FORMAT => self.format.clone(),
            DEVICE_PROPERTY_SEAT => self.seat.clone(),
            DEVICE_PROPERTY_KIND => Some(self.kind.to_string()),
            DEVICE_PROPERTY_COLORSPACE => Some(self.colorspace.to_string()),
            DEVICE_PROPERTY_MODE => Some(self.mode.to_string()),
            DEVICE_PROPERTY_SCOPE => Some(self.scope.to_string()),
            _ => self.metadata.get(key).cloned(),
        }
    }

    fn find_association(&self, profile_path: &str) -> Option<usize> {
        self.associations.iter().position(|a| a.profile_path == profile_path)
    }

    fn ensure_enabled(&self) -> Result<()> {
        if !self.enabled {
            return Err(ColordError::NotEnabled(format!("device {} is disabled", self.id)));
        }
        Ok(())
    }

    pub fn relation_for(&self, profile_path: &str) -> Result<DeviceRelation> {
        self.find_association(profile_path)
            .map(|idx| self.associations[idx].relation)
            .ok_or_else(|| {
                ColordError::ProfileDoesNotExist(format!(
                    "couldn't find profile {}",
                    profile_path
                ))
            })
    }

    /// Attach a profile on a client's behalf. Fails on a disabled device.
    pub fn add_profile(
        &mut self,
        relation: DeviceRelation,
        profile: &Profile,
        timestamp: i64,
        mapping: &MappingDb,
    ) -> Result<()> {
        self.ensure_enabled()?;
        self.attach_profile(relation, profile, timestamp, mapping)
    }

    /// Attach a profile whatever the enabled state, as history and metadata
    /// restores do. A hard add upgrades an existing soft link in place.
    pub fn attach_profile(
        &mut self,
        relation: DeviceRelation,
        profile: &Profile,
        timestamp: i64,
        mapping: &MappingDb,
    ) -> Result<()> {
        let existing = self.find_association(profile.object_path());
        if let Some(idx) = existing {
            let current = self.associations[idx].relation;
            if !(current == DeviceRelation::Soft && relation == DeviceRelation::Hard) {
                return Err(ColordError::ProfileAlreadyAdded(format!(
                    "profile object path '{}' has already been added",
                    profile.object_path()
                )));
            }
        }

        if relation == DeviceRelation::Hard {
            mapping.add_at(&self.id, profile.id(), timestamp)?;
        }

        match existing {
            Some(idx) => {
                log::debug!("Upgrading {} on {} to hard", profile.id(), self.id);
                let association = &mut self.associations[idx];
                association.relation = DeviceRelation::Hard;
                association.timestamp = timestamp;
            }
            None => {
                log::debug!("Adding {} profile {} to {}", relation, profile.id(), self.id);
                self.associations.push(Association {
                    profile_id: profile.id().to_string(),
                    profile_path: profile.object_path().to_string(),
                    relation,
                    timestamp,
                });
            }
        }
        sort_associations(&mut self.associations);
        self.modified = now_micros();
        Ok(())
    }

    /// Detach a profile and tombstone the pair so it is never auto-added again
    pub fn remove_profile(&mut self, profile_path: &str, mapping: &MappingDb) -> Result<()> {
        self.ensure_enabled()?;
        let idx = self.find_association(profile_path).ok_or_else(|| {
            ColordError::ProfileDoesNotExist(format!(
                "profile object path '{}' does not exist on '{}'",
                profile_path, self.object_path
            ))
        })?;

        mapping.clear_timestamp(&self.id, &self.associations[idx].profile_id)?;
        let removed = self.associations.remove(idx);
        log::debug!("Removed profile {} from {}", removed.profile_id, self.id);
        self.modified = now_micros();
        Ok(())
    }

    /// Drop a link to a profile that no longer exists. Not recorded in history.
    pub fn purge_profile(&mut self, profile_path: &str) -> bool {
        let before = self.associations.len();
        self.associations.retain(|a| a.profile_path != profile_path);
        before != self.associations.len()
    }

    /// Make the profile the first hard association
    pub fn make_default(&mut self, profile_path: &str, mapping: &MappingDb) -> Result<()> {
        self.ensure_enabled()?;
        let idx = self.find_association(profile_path).ok_or_else(|| {
            ColordError::ProfileDoesNotExist(format!(
                "profile object path '{}' has not been added",
                profile_path
            ))
        })?;

        let timestamp = now_micros();
        mapping.add_at(&self.id, &self.associations[idx].profile_id, timestamp)?;
        let association = &mut self.associations[idx];
        association.relation = DeviceRelation::Hard;
        association.timestamp = timestamp;
        sort_associations(&mut self.associations);
        self.modified = timestamp;
        Ok(())
    }

    /// First profile matching the patterns, in pattern order, hard links before soft
    pub fn find_profile_for_qualifiers(&self, patterns: &[String], profiles: &ProfileArray) -> Result<String> {
        if self.is_profiling() {
            return Err(ColordError::Profiling(format!(
                "profiling, so ignoring '{}'",
                patterns.join(",")
            )));
        }

        for pattern in patterns {
            for relation in [DeviceRelation::Hard, DeviceRelation::Soft] {
                for association in self.associations.iter().filter(|a| a.relation == relation) {
                    let Some(profile) = profiles.get_by_object_path(&association.profile_path) else {
                        continue;
                    };
                    if qualifier_matches(pattern, profile.qualifier()) {
                        log::debug!("Found {} for qualifier {}", profile.id(), pattern);
                        return Ok(association.profile_path.clone());
                    }
                }
            }
        }

        Err(ColordError::NothingMatched(format!(
            "nothing matched expression '{}'",
            patterns.join(",")
        )))
    }

    /// Returns true if the state changed. Stored for every scope.
    pub fn set_enabled(&mut self, enabled: bool, db: &DeviceDb) -> Result<bool> {
        if self.enabled == enabled {
            return Ok(false);
        }
        db.set_property(&self.id, DEVICE_PROPERTY_ENABLED, if enabled { "True" } else { "False" })?;
        self.enabled = enabled;
        self.modified = now_micros();
        Ok(true)
    }

    /// Restore the stored enabled state without writing it back
    pub fn load_enabled(&mut self, db: &DeviceDb) -> Result<()> {
        if let Some(value) = db.get_property(&self.id, DEVICE_PROPERTY_ENABLED)? {
            self.enabled = value != "False";
        }
        Ok(())
    }

    /// Apply a client property, storing it first for disk-scope devices.
    /// Returns the names of the properties that changed.
    pub fn set_property(&mut self, key: &str, value: &str, db: &DeviceDb) -> Result<Vec<&'static str>> {
        check_device_property(key, value)?;
        if self.scope == ObjectScope::Disk {
            db.set_property(&self.id, key, value)?;
        }
        self.apply_property(key, value)
    }

    /// Apply a property without storing it
    pub fn apply_property(&mut self, key: &str, value: &str) -> Result<Vec<&'static str>> {
        check_property_len(key, value)?;
        let changed = match key {
            DEVICE_PROPERTY_MODEL => {
                self.model = Some(fixup_model(self.kind, value));
                DEVICE_PROPERTY_MODEL
            }
            DEVICE_PROPERTY_VENDOR => {
                self.vendor = Some(vendor_name(value));
                DEVICE_PROPERTY_VENDOR
            }
            DEVICE_PROPERTY_SERIAL => {
                self.serial = Some(value.to_string());
                DEVICE_PROPERTY_SERIAL
            }
            DEVICE_PROPERTY_KIND => {
                self.kind = DeviceKind::from_str_lossy(value);
                if let Some(model) = self.model.take() {
                    self.model = Some(fixup_model(self.kind, &model));
                }
                DEVICE_PROPERTY_KIND
            }
            DEVICE_PROPERTY_COLORSPACE => {
                self.colorspace = Colorspace::from_str_lossy(value);
                DEVICE_PROPERTY_COLORSPACE
            }
            DEVICE_PROPERTY_FORMAT => {
                self.format = Some(value.to_string());
                DEVICE_PROPERTY_FORMAT
            }
            DEVICE_PROPERTY_MODE => {
                self.mode = DeviceMode::from_str_lossy(value);
                DEVICE_PROPERTY_MODE
            }
            DEVICE_PROPERTY_SEAT => {
                self.seat = Some(value.to_string());
                DEVICE_PROPERTY_SEAT
            }
            DEVICE_PROPERTY_EMBEDDED => {
                self.embedded = !value.eq_ignore_ascii_case("false");
                DEVICE_PROPERTY_EMBEDDED
            }
            _ => {
                self.set_metadata_item(key, value);
                DEVICE_PROPERTY_METADATA
            }
        };

        self.modified = now_micros();
        Ok(vec![changed, DEVICE_PROPERTY_MODIFIED])
    }
}
