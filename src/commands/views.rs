// Client-facing snapshots of daemon objects
// Field names serialize to the property names clients read.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::constants::DAEMON_VERSION;
use crate::db::ProfileDb;
use crate::device::Device;
use crate::enums::{
    Colorspace, DeviceKind, DeviceMode, ObjectScope, ProfileKind, ProfileWarning, SensorCap, SensorKind,
    SensorState,
};
use crate::error::Result;
use crate::profile::Profile;
use crate::sensor::Sensor;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceView {
    pub object_path: String,
    pub device_id: String,
    pub kind: DeviceKind,
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub serial: Option<String>,
    pub colorspace: Colorspace,
    pub format: Option<String>,
    pub mode: DeviceMode,
    pub scope: ObjectScope,
    pub owner: u32,
    pub seat: Option<String>,
    pub enabled: bool,
    pub embedded: bool,
    pub created: i64,
    pub modified: i64,
    pub profiles: Vec<String>,
    pub profiling_inhibitors: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl From<&Device> for DeviceView {
    fn from(device: &Device) -> Self {
        Self {
            object_path: device.object_path().to_string(),
            device_id: device.id().to_string(),
            kind: device.kind(),
            model: device.model().map(str::to_string),
            vendor: device.vendor().map(str::to_string),
            serial: device.serial().map(str::to_string),
            colorspace: device.colorspace(),
            format: device.format().map(str::to_string),
            mode: device.mode(),
            scope: device.scope(),
            owner: device.owner(),
            seat: device.seat().map(str::to_string),
            enabled: device.is_enabled(),
            embedded: device.is_embedded(),
            created: device.created(),
            modified: device.modified(),
            profiles: device.profiles_exposed(),
            profiling_inhibitors: device.inhibit().bus_names().to_vec(),
            metadata: device.metadata().clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileView {
    pub object_path: String,
    pub profile_id: String,
    pub filename: Option<String>,
    pub qualifier: Option<String>,
    pub format: Option<String>,
    pub title: Option<String>,
    pub kind: ProfileKind,
    pub colorspace: Colorspace,
    pub created: i64,
    pub has_vcgt: bool,
    pub is_system_wide: bool,
    pub scope: ObjectScope,
    pub owner: u32,
    pub warnings: Vec<ProfileWarning>,
    pub metadata: BTreeMap<String, String>,
}

impl ProfileView {
    /// Snapshot as seen by `uid`, whose title override applies
    pub fn for_viewer(profile: &Profile, uid: u32, db: &ProfileDb) -> Result<Self> {
        Ok(Self {
            object_path: profile.object_path().to_string(),
            profile_id: profile.id().to_string(),
            filename: profile.filename().map(|p| p.display().to_string()),
            qualifier: profile.qualifier().map(str::to_string),
            format: profile.format().map(str::to_string),
            title: profile.title_for(uid, db)?,
            kind: profile.kind(),
            colorspace: profile.colorspace(),
            created: profile.created(),
            has_vcgt: profile.has_vcgt(),
            is_system_wide: profile.is_system_wide(),
            scope: profile.scope(),
            owner: profile.owner(),
            warnings: profile.warnings().to_vec(),
            metadata: profile.metadata().clone(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensorView {
    pub object_path: String,
    pub sensor_id: String,
    pub kind: SensorKind,
    pub state: SensorState,
    pub serial: Option<String>,
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub native: bool,
    pub embedded: bool,
    pub locked: bool,
    pub capabilities: Vec<SensorCap>,
}

impl From<&Sensor> for SensorView {
    fn from(sensor: &Sensor) -> Self {
        Self {
            object_path: sensor.object_path().to_string(),
            sensor_id: sensor.id().to_string(),
            kind: sensor.kind(),
            state: sensor.state(),
            serial: sensor.serial().map(str::to_string),
            model: sensor.model().map(str::to_string),
            vendor: sensor.vendor().map(str::to_string),
            native: sensor.is_native(),
            embedded: sensor.is_embedded(),
            locked: sensor.is_locked(),
            capabilities: sensor.caps().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DaemonProperties {
    pub daemon_version: String,
    pub system_vendor: String,
    pub system_model: String,
}

impl DaemonProperties {
    pub fn new(system_vendor: &str, system_model: &str) -> Self {
        Self {
            daemon_version: DAEMON_VERSION.to_string(),
            system_vendor: system_vendor.to_string(),
            system_model: system_model.to_string(),
        }
    }
}
