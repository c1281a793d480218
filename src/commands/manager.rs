// Manager calls
// Enumeration, lookup, and creation and deletion of devices and profiles.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::views::{DaemonProperties, SensorView};
use crate::auth::{self, Caller};
use crate::constants::*;
use crate::daemon::{ordered_properties, Daemon};
use crate::device::{check_device_property, check_property_len, Device};
use crate::enums::{DeviceKind, DeviceMode, ObjectScope, ProfileKind, StandardSpace};
use crate::error::{ColordError, Result};
use crate::profile::store::is_system_wide_path;
use crate::profile::Profile;
use crate::registry::LookupFlags;
use crate::system::cmdline_for_pid;

/// Root sees everything; everyone else sees system objects and their own
fn visible_to(owner: u32, caller: &Caller) -> bool {
    caller.uid == 0 || owner == 0 || owner == caller.uid
}

fn parse_scope(scope: &str) -> Result<ObjectScope> {
    match ObjectScope::from_str_lossy(scope) {
        ObjectScope::Unknown => Err(ColordError::InputInvalid(format!("scope '{}' unknown", scope))),
        scope => Ok(scope),
    }
}

// -----------------------------------------------------------------------------
// Enumeration
// -----------------------------------------------------------------------------

pub fn get_devices(daemon: &Daemon, caller: &Caller) -> Vec<String> {
    daemon
        .devices
        .iter()
        .filter(|d| visible_to(d.owner(), caller))
        .map(|d| d.object_path().to_string())
        .collect()
}

pub fn get_devices_by_kind(daemon: &Daemon, caller: &Caller, kind: &str) -> Result<Vec<String>> {
    let parsed = DeviceKind::from_str_lossy(kind);
    if parsed == DeviceKind::Unknown {
        return Err(ColordError::InputInvalid(format!("device kind '{}' unknown", kind)));
    }
    Ok(daemon
        .devices
        .get_by_kind(parsed)
        .into_iter()
        .filter(|d| visible_to(d.owner(), caller))
        .map(|d| d.object_path().to_string())
        .collect())
}

pub fn get_profiles(daemon: &Daemon, caller: &Caller) -> Vec<String> {
    daemon
        .profiles
        .iter()
        .filter(|p| visible_to(p.owner(), caller))
        .map(|p| p.object_path().to_string())
        .collect()
}

/// An unrecognised kind matches nothing
pub fn get_profiles_by_kind(daemon: &Daemon, caller: &Caller, kind: &str) -> Vec<String> {
    let parsed = ProfileKind::from_str_lossy(kind);
    if parsed == ProfileKind::Unknown {
        return Vec::new();
    }
    daemon
        .profiles
        .get_by_kind(parsed)
        .into_iter()
        .filter(|p| visible_to(p.owner(), caller))
        .map(|p| p.object_path().to_string())
        .collect()
}

pub fn get_sensors(daemon: &Daemon) -> Vec<SensorView> {
    daemon.sensors.iter().map(SensorView::from).collect()
}

pub fn get_daemon_properties(daemon: &Daemon) -> DaemonProperties {
    DaemonProperties::new(&daemon.system_vendor, &daemon.system_model)
}

// -----------------------------------------------------------------------------
// Lookup
// -----------------------------------------------------------------------------

pub fn find_device_by_id(daemon: &Daemon, caller: &Caller, device_id: &str) -> Result<String> {
    daemon
        .devices
        .get_by_id_owner(device_id, caller.uid, LookupFlags::OwnerOptional)
        .map(|d| d.object_path().to_string())
        .ok_or_else(|| ColordError::NotFound(format!("device id '{}' does not exist", device_id)))
}

pub fn find_device_by_property(daemon: &Daemon, key: &str, value: &str) -> Result<String> {
    daemon
        .devices
        .get_by_property(key, value)
        .map(|d| d.object_path().to_string())
        .ok_or_else(|| ColordError::NotFound(format!("property match '{}'='{}' does not exist", key, value)))
}

pub fn find_profile_by_id(daemon: &Daemon, caller: &Caller, profile_id: &str) -> Result<String> {
    daemon
        .profiles
        .get_by_id_owner(profile_id, caller.uid, LookupFlags::OwnerOptional)
        .map(|p| p.object_path().to_string())
        .ok_or_else(|| ColordError::NotFound(format!("profile id '{}' does not exist", profile_id)))
}

/// Full path first, then a bare file name against every profile's basename
pub fn find_profile_by_filename(daemon: &Daemon, filename: &str) -> Result<String> {
    let wanted = Path::new(filename);
    let profile = daemon.profiles.get_by_filename(wanted).or_else(|| {
        if wanted.components().count() != 1 {
            return None;
        }
        let basename = wanted.file_name()?;
        daemon
            .profiles
            .iter()
            .find(|p| p.filename().and_then(|f| f.file_name()) == Some(basename))
    });
    profile
        .map(|p| p.object_path().to_string())
        .ok_or_else(|| ColordError::NotFound(format!("profile filename '{}' does not exist", filename)))
}

pub fn find_profile_by_property(daemon: &Daemon, key: &str, value: &str) -> Result<String> {
    daemon
        .profiles
        .get_by_property(key, value)
        .map(|p| p.object_path().to_string())
        .ok_or_else(|| ColordError::NotFound(format!("property match '{}'='{}' does not exist", key, value)))
}

pub fn find_sensor_by_id(daemon: &Daemon, sensor_id: &str) -> Result<String> {
    daemon
        .sensors
        .iter()
        .find(|s| s.id() == sensor_id)
        .map(|s| s.object_path().to_string())
        .ok_or_else(|| ColordError::NotFound(format!("sensor id '{}' does not exist", sensor_id)))
}

/// Highest-scoring profile that declares itself as the standard space
pub fn get_standard_space(daemon: &Daemon, standard_space: &str) -> Result<String> {
    if StandardSpace::from_str_lossy(standard_space) == StandardSpace::Unknown {
        return Err(ColordError::InputInvalid(format!(
            "standard space '{}' unknown",
            standard_space
        )));
    }
    daemon
        .profiles
        .get_by_metadata(PROFILE_METADATA_STANDARD_SPACE, standard_space)
        .into_iter()
        .max_by_key(|p| p.score(&daemon.canonical))
        .map(|p| p.object_path().to_string())
        .ok_or_else(|| ColordError::NotFound(format!("profile space '{}' does not exist", standard_space)))
}

// -----------------------------------------------------------------------------
// Devices
// -----------------------------------------------------------------------------

pub fn create_device(
    daemon: &mut Daemon,
    caller: &Caller,
    device_id: &str,
    scope: &str,
    properties: &BTreeMap<String, String>,
) -> Result<String> {
    auth::check(daemon.authorizer.as_ref(), ACTION_CREATE_DEVICE, caller)?;

    if device_id.is_empty() {
        return Err(ColordError::InputInvalid("device id cannot be blank".to_string()));
    }
    let scope = parse_scope(scope)?;
    let kind_name = properties
        .get(DEVICE_PROPERTY_KIND)
        .ok_or_else(|| ColordError::InputInvalid("required device type not specified".to_string()))?;
    let kind = DeviceKind::from_str_lossy(kind_name);
    if kind == DeviceKind::Unknown {
        return Err(ColordError::InputInvalid(format!("device kind '{}' unknown", kind_name)));
    }
    for (key, value) in properties {
        check_device_property(key, value)?;
    }

    let mut id = device_id.to_string();
    if kind == DeviceKind::Display && daemon.always_use_xrandr_name {
        let name = properties.get(DEVICE_METADATA_XRANDR_NAME).ok_or_else(|| {
            ColordError::InputInvalid(format!("{} required for display devices", DEVICE_METADATA_XRANDR_NAME))
        })?;
        id = format!("xrandr-{}", name);
        log::debug!("Using {} instead of {}", id, device_id);
    }

    let existing = daemon
        .devices
        .get_by_id_owner(&id, caller.uid, LookupFlags::OwnerOptional)
        .map(|d| (d.object_path().to_string(), d.mode()));
    if let Some((object_path, mode)) = existing {
        if mode == DeviceMode::Virtual {
            daemon.promote_device(&object_path, properties)?;
            return Ok(object_path);
        }
        return Err(ColordError::AlreadyExists(format!("device id '{}' already exists", id)));
    }

    let mut device = Device::new(&id, caller.uid, scope);
    device.set_mode(DeviceMode::Physical);
    if scope == ObjectScope::Disk {
        daemon.device_db.add(&id)?;
    }
    for (key, value) in ordered_properties(properties) {
        device.set_property(key, value, &daemon.device_db)?;
    }
    if device.seat().is_none() {
        device.set_seat(DEFAULT_SEAT);
    }
    if let Some(cmdline) = cmdline_for_pid(caller.pid) {
        device.set_metadata_item(DEVICE_METADATA_OWNER_CMDLINE, &cmdline);
    }

    Ok(daemon.register_device(device, Some(&caller.sender)))
}

pub fn delete_device(daemon: &mut Daemon, caller: &Caller, object_path: &str) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_DELETE_DEVICE, caller)?;
    if daemon.devices.get_by_object_path(object_path).is_none() {
        return Err(ColordError::NotFound(format!(
            "device path '{}' not found",
            object_path
        )));
    }
    daemon.remove_device(object_path);
    Ok(())
}

// -----------------------------------------------------------------------------
// Profiles
// -----------------------------------------------------------------------------

pub fn create_profile(
    daemon: &mut Daemon,
    caller: &Caller,
    profile_id: &str,
    scope: &str,
    properties: &BTreeMap<String, String>,
    fd: Option<File>,
) -> Result<String> {
    auth::check(daemon.authorizer.as_ref(), ACTION_CREATE_PROFILE, caller)?;

    if profile_id.is_empty() {
        return Err(ColordError::InputInvalid("profile id cannot be blank".to_string()));
    }
    let scope = parse_scope(scope)?;
    if scope == ObjectScope::Disk {
        return Err(ColordError::NotSupported("disk profiles are not supported".to_string()));
    }
    if daemon
        .profiles
        .get_by_id_owner(profile_id, caller.uid, LookupFlags::Exact)
        .is_some()
    {
        return Err(ColordError::AlreadyExists(format!(
            "profile id '{}' already exists",
            profile_id
        )));
    }

    for (key, value) in properties {
        check_property_len(key, value)?;
    }

    let mut profile = Profile::new(profile_id, caller.uid, scope);
    let filename = properties.get(PROFILE_PROPERTY_FILENAME);
    if let Some(filename) = filename {
        profile.set_system_wide(is_system_wide_path(Path::new(filename)));
    }

    if let Some(mut file) = fd {
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        profile.load_from_bytes(&data, daemon.decoder.as_ref())?;
    }

    let may_open = daemon.config.profiles.fd_fallback;
    if let Some(filename) = filename {
        profile.set_property(PROFILE_PROPERTY_FILENAME, filename, daemon.decoder.as_ref(), may_open)?;
    }
    for (key, value) in properties {
        if key != PROFILE_PROPERTY_FILENAME && key != PROFILE_PROPERTY_TITLE {
            profile.set_property(key, value, daemon.decoder.as_ref(), may_open)?;
        }
    }

    // Nothing is stored until the profile is known to be valid
    if let Some(title) = properties.get(PROFILE_PROPERTY_TITLE) {
        daemon
            .profile_db
            .set_property(profile_id, PROFILE_PROPERTY_TITLE, caller.uid, title)?;
    }

    Ok(daemon.register_profile(profile, Some(&caller.sender)))
}

pub fn delete_profile(daemon: &mut Daemon, caller: &Caller, object_path: &str) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_CREATE_PROFILE, caller)?;
    if daemon.profiles.get_by_object_path(object_path).is_none() {
        return Err(ColordError::NotFound(format!(
            "profile path '{}' not found",
            object_path
        )));
    }
    daemon.remove_profile(object_path);
    Ok(())
}
