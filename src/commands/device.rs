// Device object calls

use super::views::DeviceView;
use crate::auth::{self, Caller};
use crate::constants::*;
use crate::daemon::Daemon;
use crate::device::Device;
use crate::enums::DeviceRelation;
use crate::error::{ColordError, Result};
use crate::profile::Profile;
use crate::registry::ProfileArray;
use crate::system::now_micros;
use crate::watch::WatchTarget;

fn device_not_found(object_path: &str) -> ColordError {
    ColordError::NotFound(format!("device object path '{}' does not exist", object_path))
}

fn find_device<'a>(daemon: &'a Daemon, object_path: &str) -> Result<&'a Device> {
    daemon
        .devices
        .get_by_object_path(object_path)
        .ok_or_else(|| device_not_found(object_path))
}

fn find_profile<'a>(profiles: &'a ProfileArray, profile_path: &str) -> Result<&'a Profile> {
    profiles.get_by_object_path(profile_path).ok_or_else(|| {
        ColordError::ProfileDoesNotExist(format!("profile object path '{}' does not exist", profile_path))
    })
}

pub fn get_device(daemon: &Daemon, object_path: &str) -> Result<DeviceView> {
    find_device(daemon, object_path).map(DeviceView::from)
}

pub fn add_profile(
    daemon: &mut Daemon,
    caller: &Caller,
    object_path: &str,
    relation: &str,
    profile_path: &str,
) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_MODIFY_DEVICE, caller)?;
    let parsed = DeviceRelation::from_str_lossy(relation);
    if parsed == DeviceRelation::Unknown {
        return Err(ColordError::InputInvalid(format!("relation '{}' unknown", relation)));
    }

    let profile = find_profile(&daemon.profiles, profile_path)?;
    let device = daemon
        .devices
        .get_by_object_path_mut(object_path)
        .ok_or_else(|| device_not_found(object_path))?;
    device.add_profile(parsed, profile, now_micros(), &daemon.mapping)?;

    daemon.emit_device_changed(object_path, &[DEVICE_PROPERTY_PROFILES]);
    Ok(())
}

pub fn remove_profile(daemon: &mut Daemon, caller: &Caller, object_path: &str, profile_path: &str) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_MODIFY_DEVICE, caller)?;
    let device = daemon
        .devices
        .get_by_object_path_mut(object_path)
        .ok_or_else(|| device_not_found(object_path))?;
    device.remove_profile(profile_path, &daemon.mapping)?;

    daemon.emit_device_changed(object_path, &[DEVICE_PROPERTY_PROFILES]);
    Ok(())
}

pub fn make_profile_default(
    daemon: &mut Daemon,
    caller: &Caller,
    object_path: &str,
    profile_path: &str,
) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_MODIFY_DEVICE, caller)?;
    let device = daemon
        .devices
        .get_by_object_path_mut(object_path)
        .ok_or_else(|| device_not_found(object_path))?;
    device.make_default(profile_path, &daemon.mapping)?;

    daemon.emit_device_changed(object_path, &[DEVICE_PROPERTY_PROFILES]);
    Ok(())
}

pub fn get_profile_for_qualifiers(daemon: &Daemon, object_path: &str, qualifiers: &[String]) -> Result<String> {
    if qualifiers.is_empty() {
        return Err(ColordError::InputInvalid("no qualifiers given".to_string()));
    }
    find_device(daemon, object_path)?.find_profile_for_qualifiers(qualifiers, &daemon.profiles)
}

pub fn get_profile_relation(daemon: &Daemon, object_path: &str, profile_path: &str) -> Result<DeviceRelation> {
    find_device(daemon, object_path)?.relation_for(profile_path)
}

pub fn set_enabled(daemon: &mut Daemon, caller: &Caller, object_path: &str, enabled: bool) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_MODIFY_DEVICE, caller)?;
    let device = daemon
        .devices
        .get_by_object_path_mut(object_path)
        .ok_or_else(|| device_not_found(object_path))?;
    if device.set_enabled(enabled, &daemon.device_db)? {
        log::info!("Device {} {}", object_path, if enabled { "enabled" } else { "disabled" });
        daemon.emit_device_changed(object_path, &[DEVICE_PROPERTY_ENABLED]);
    }
    Ok(())
}

pub fn set_property(daemon: &mut Daemon, caller: &Caller, object_path: &str, key: &str, value: &str) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_MODIFY_DEVICE, caller)?;
    let device = daemon
        .devices
        .get_by_object_path_mut(object_path)
        .ok_or_else(|| device_not_found(object_path))?;
    let changed = device.set_property(key, value, &daemon.device_db)?;

    daemon.emit_device_changed(object_path, &changed);
    Ok(())
}

pub fn profiling_inhibit(daemon: &mut Daemon, caller: &Caller, object_path: &str) -> Result<()> {
    auth::check(daemon.authorizer.as_ref(), ACTION_DEVICE_INHIBIT, caller)?;
    let device = daemon
        .devices
        .get_by_object_path_mut(object_path)
        .ok_or_else(|| device_not_found(object_path))?;
    device.inhibit_mut().add(&caller.sender)?;
    daemon.watcher.watch(
        &caller.sender,
        WatchTarget::Inhibit {
            device_path: object_path.to_string(),
        },
    );

    daemon.emit_device_changed(
        object_path,
        &[DEVICE_PROPERTY_PROFILING_INHIBITORS, DEVICE_PROPERTY_PROFILES],
    );
    Ok(())
}

pub fn profiling_uninhibit(daemon: &mut Daemon, caller: &Caller, object_path: &str) -> Result<()> {
    let device = daemon
        .devices
        .get_by_object_path_mut(object_path)
        .ok_or_else(|| device_not_found(object_path))?;
    device.inhibit_mut().remove(&caller.sender)?;
    daemon.watcher.cancel_target(
        &caller.sender,
        &WatchTarget::Inhibit {
            device_path: object_path.to_string(),
        },
    );

    daemon.emit_device_changed(
        object_path,
        &[DEVICE_PROPERTY_PROFILING_INHIBITORS, DEVICE_PROPERTY_PROFILES],
    );
    Ok(())
}
