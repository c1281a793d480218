// colord - Commands Module
// Client calls organized by the object they act on

pub mod device;
pub mod manager;
pub mod profile;
pub mod sensor;
pub mod views;


use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;

use crate::auth::Caller;
use crate::daemon::Daemon;
use crate::error::{ColordError, Result};

/// One client call. Object calls name their target by object path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Request {
    GetDevices,
    GetDevicesByKind { kind: String },
    GetProfiles,
    GetProfilesByKind { kind: String },
    GetSensors,
    FindDeviceById { device_id: String },
    FindDeviceByProperty { key: String, value: String },
    FindProfileById { profile_id: String },
    FindProfileByFilename { filename: String },
    FindProfileByProperty { key: String, value: String },
    FindSensorById { sensor_id: String },
    GetStandardSpace { standard_space: String },
    GetDaemonProperties,
    CreateDevice {
        device_id: String,
        scope: String,
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
    DeleteDevice { object_path: String },
    CreateProfile {
        profile_id: String,
        scope: String,
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
    DeleteProfile { object_path: String },

    GetDevice { object_path: String },
    DeviceAddProfile {
        object_path: String,
        relation: String,
        profile_path: String,
    },
    DeviceRemoveProfile { object_path: String, profile_path: String },
    DeviceMakeProfileDefault { object_path: String, profile_path: String },
    DeviceGetProfileForQualifiers { object_path: String, qualifiers: Vec<String> },
    DeviceGetProfileRelation { object_path: String, profile_path: String },
    DeviceSetEnabled { object_path: String, enabled: bool },
    DeviceSetProperty { object_path: String, key: String, value: String },
    DeviceProfilingInhibit { object_path: String },
    DeviceProfilingUninhibit { object_path: String },

    GetProfile { object_path: String },
    ProfileSetProperty { object_path: String, key: String, value: String },
    ProfileInstallSystemWide { object_path: String },

    GetSensor { object_path: String },
    SensorLock { object_path: String },
    SensorUnlock { object_path: String },
    SensorGetSample { object_path: String, cap: String },

    /// Start receiving signals on this connection
    Subscribe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Ok { value: Value },
    Error { name: String, message: String },
}

impl Response {
    pub fn error(err: &ColordError) -> Self {
        Response::Error {
            name: err.name().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }
}

impl From<Result<Value>> for Response {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Response::Ok { value },
            Err(e) => Response::error(&e),
        }
    }
}

fn json<T: Serialize>(result: Result<T>) -> Result<Value> {
    Ok(serde_json::to_value(result?)?)
}

/// Run one call against the daemon state
pub fn dispatch(daemon: &mut Daemon, caller: &Caller, request: Request, fd: Option<File>) -> Response {
    log::debug!("{} called {:?}", caller.sender, request);
    let result = match request {
        Request::GetDevices => json(Ok(manager::get_devices(daemon, caller))),
        Request::GetDevicesByKind { kind } => json(manager::get_devices_by_kind(daemon, caller, &kind)),
        Request::GetProfiles => json(Ok(manager::get_profiles(daemon, caller))),
        Request::GetProfilesByKind { kind } => json(Ok(manager::get_profiles_by_kind(daemon, caller, &kind))),
        Request::GetSensors => json(Ok(manager::get_sensors(daemon))),
        Request::FindDeviceById { device_id } => json(manager::find_device_by_id(daemon, caller, &device_id)),
        Request::FindDeviceByProperty { key, value } => {
            json(manager::find_device_by_property(daemon, &key, &value))
        }
        Request::FindProfileById { profile_id } => json(manager::find_profile_by_id(daemon, caller, &profile_id)),
        Request::FindProfileByFilename { filename } => {
            json(manager::find_profile_by_filename(daemon, &filename))
        }
        Request::FindProfileByProperty { key, value } => {
            json(manager::find_profile_by_property(daemon, &key, &value))
        }
        Request::FindSensorById { sensor_id } => json(manager::find_sensor_by_id(daemon, &sensor_id)),
        Request::GetStandardSpace { standard_space } => {
            json(manager::get_standard_space(daemon, &standard_space))
        }
        Request::GetDaemonProperties => json(Ok(manager::get_daemon_properties(daemon))),
        Request::CreateDevice {
            device_id,
            scope,
            properties,
        } => json(manager::create_device(daemon, caller, &device_id, &scope, &properties)),
        Request::DeleteDevice { object_path } => json(manager::delete_device(daemon, caller, &object_path)),
        Request::CreateProfile {
            profile_id,
            scope,
            properties,
        } => json(manager::create_profile(daemon, caller, &profile_id, &scope, &properties, fd)),
        Request::DeleteProfile { object_path } => json(manager::delete_profile(daemon, caller, &object_path)),

        Request::GetDevice { object_path } => json(device::get_device(daemon, &object_path)),
        Request::DeviceAddProfile {
            object_path,
            relation,
            profile_path,
        } => json(device::add_profile(daemon, caller, &object_path, &relation, &profile_path)),
        Request::DeviceRemoveProfile {
            object_path,
            profile_path,
        } => json(device::remove_profile(daemon, caller, &object_path, &profile_path)),
        Request::DeviceMakeProfileDefault {
            object_path,
            profile_path,
        } => json(device::make_profile_default(daemon, caller, &object_path, &profile_path)),
        Request::DeviceGetProfileForQualifiers {
            object_path,
            qualifiers,
        } => json(device::get_profile_for_qualifiers(daemon, &object_path, &qualifiers)),
        Request::DeviceGetProfileRelation {
            object_path,
            profile_path,
        } => json(device::get_profile_relation(daemon, &object_path, &profile_path)),
        Request::DeviceSetEnabled { object_path, enabled } => {
            json(device::set_enabled(daemon, caller, &object_path, enabled))
        }
        Request::DeviceSetProperty {
            object_path,
            key,
            value,
        } => json(device::set_property(daemon, caller, &object_path, &key, &value)),
        Request::DeviceProfilingInhibit { object_path } => {
            json(device::profiling_inhibit(daemon, caller, &object_path))
        }
        Request::DeviceProfilingUninhibit { object_path } => {
            json(device::profiling_uninhibit(daemon, caller, &object_path))
        }

        Request::GetProfile { object_path } => json(profile::get_profile(daemon, caller, &object_path)),
        Request::ProfileSetProperty {
            object_path,
            key,
            value,
        } => json(profile::set_property(daemon, caller, &object_path, &key, &value)),
        Request::ProfileInstallSystemWide { object_path } => {
            json(profile::install_system_wide(daemon, caller, &object_path))
        }

        Request::GetSensor { object_path } => json(sensor::get_sensor(daemon, &object_path)),
        Request::SensorLock { object_path } => json(sensor::lock(daemon, caller, &object_path)),
        Request::SensorUnlock { object_path } => json(sensor::unlock(daemon, caller, &object_path)),
        Request::SensorGetSample { object_path, cap } => {
            json(sensor::get_sample(daemon, caller, &object_path, &cap))
        }

        Request::Subscribe => Ok(Value::Null),
    };

    if let Err(e) = &result {
        log::debug!("Call from {} failed: {}: {}", caller.sender, e.name(), e);
    }
    result.into()
}
