// Daemon context
// Everything the reactor owns: stores, registries, sensors, liveness watches and
// policy. Built once at startup; handlers receive it by mutable reference.

pub mod reactor;

#[cfg(test)]
pub(crate) mod tests;

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use crate::auth::{Authorizer, Caller, PolicyAuthorizer};
use crate::commands::{self, Request, Response};
use crate::config::Config;
use crate::constants::*;
use crate::db::{get_mapping_db_path, get_storage_db_path, DeviceDb, MappingDb, ProfileDb};
use crate::device::Device;
use crate::enums::{DeviceMode, DeviceRelation, ObjectScope};
use crate::error::{ColordError, Result};
use crate::events::Signal;
use crate::plugin::{DeviceTemplate, PluginEvent, PluginHost};
use crate::profile::canonical::CanonicalScores;
use crate::profile::icc::IccDecoder;
use crate::profile::store::{ProfileStore, StoreChange};
use crate::profile::{Profile, ProfileDecoder};
use crate::registry::{DeviceArray, LookupFlags, ProfileArray};
use crate::sensor::Sensor;
use crate::system::{dmi_model, dmi_vendor, has_duplicate_edids, now_micros};
use crate::watch::{SenderWatcher, WatchId, WatchTarget};

/// Work items for the reactor thread
#[derive(Debug)]
pub enum DaemonEvent {
    Call {
        caller: Caller,
        request: Request,
        /// Descriptor passed alongside the call, e.g. profile contents
        fd: Option<File>,
        reply: Sender<Response>,
    },
    NameVanished(String),
    Plugin(PluginEvent),
    /// Paths under the profile directories that changed on disk
    ProfileFiles(Vec<PathBuf>),
    Shutdown,
}

/// The persistent stores
pub struct Stores {
    pub mapping: MappingDb,
    pub device_db: DeviceDb,
    pub profile_db: ProfileDb,
}

impl Stores {
    pub fn open(database_dir: &Path) -> Result<Self> {
        let storage = get_storage_db_path(database_dir);
        Ok(Self {
            mapping: MappingDb::open(&get_mapping_db_path(database_dir))?,
            device_db: DeviceDb::open(&storage)?,
            profile_db: ProfileDb::open(&storage)?,
        })
    }
}

pub struct Daemon {
    pub(crate) config: Config,
    pub(crate) mapping: MappingDb,
    pub(crate) device_db: DeviceDb,
    pub(crate) profile_db: ProfileDb,
    pub(crate) devices: DeviceArray,
    pub(crate) profiles: ProfileArray,
    pub(crate) sensors: Vec<Sensor>,
    pub(crate) watcher: SenderWatcher,
    pub(crate) authorizer: Box<dyn Authorizer>,
    pub(crate) decoder: Box<dyn ProfileDecoder>,
    pub(crate) canonical: CanonicalScores,
    pub(crate) store: ProfileStore,
    pub(crate) system_vendor: String,
    pub(crate) system_model: String,
    pub(crate) always_use_xrandr_name: bool,
    watch_ids: HashMap<String, WatchId>,
    signals: Sender<Signal>,
}

/// Soft-attach a profile that names the device in its metadata.
/// Returns true if the association was added.
fn auto_add_from_metadata(device: &mut Device, profile: &Profile, mapping: &MappingDb) -> bool {
    match mapping.get_timestamp(device.id(), profile.id()) {
        Ok(0) => {
            log::debug!(
                "Not doing metadata add {} to {} as tombstoned",
                profile.id(),
                device.id()
            );
            return false;
        }
        Ok(_) | Err(ColordError::NotFound(_)) => {}
        Err(e) => {
            log::warn!("Failed to get mapping timestamp: {}", e);
            return false;
        }
    }
    if !profile.warnings().is_empty() {
        log::debug!("Not doing metadata add {} as it has warnings", profile.id());
        return false;
    }

    match device.attach_profile(DeviceRelation::Soft, profile, now_micros(), mapping) {
        Ok(()) => {
            log::info!("Automatic metadata add {} to {}", profile.id(), device.id());
            true
        }
        Err(e) => {
            log::debug!("Failed to metadata add {} to {}: {}", profile.id(), device.id(), e);
            false
        }
    }
}

/// Hard-attach a profile the device was associated with before.
/// Returns true if the association was added.
fn auto_add_from_history(device: &mut Device, profile: &Profile, mapping: &MappingDb) -> bool {
    let timestamp = match mapping.get_timestamp(device.id(), profile.id()) {
        Ok(timestamp) => timestamp,
        Err(ColordError::NotFound(_)) => return false,
        Err(e) => {
            log::warn!("Failed to get mapping timestamp: {}", e);
            return false;
        }
    };
    match device.attach_profile(DeviceRelation::Hard, profile, timestamp, mapping) {
        Ok(()) => {
            log::info!("Automatic add {} to {}", profile.id(), device.id());
            true
        }
        Err(e) => {
            log::debug!("Failed to add {} to {}: {}", profile.id(), device.id(), e);
            false
        }
    }
}

/// Kind goes first so kind-specific property fixups apply
pub(crate) fn ordered_properties(properties: &std::collections::BTreeMap<String, String>) -> Vec<(&str, &str)> {
    let mut ordered: Vec<(&str, &str)> = properties
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    ordered.sort_by_key(|(k, _)| *k != DEVICE_PROPERTY_KIND);
    ordered
}

impl Daemon {
    pub fn new(
        config: Config,
        stores: Stores,
        authorizer: Box<dyn Authorizer>,
        decoder: Box<dyn ProfileDecoder>,
        signals: Sender<Signal>,
    ) -> Self {
        let canonical = CanonicalScores::auto_load(config.profiles.canonical_scores.as_deref());
        let store = ProfileStore::from_config(&config);
        let always_use_xrandr_name = config
            .daemon
            .always_use_xrandr_name
            .unwrap_or_else(|| has_duplicate_edids(Path::new(DRM_ROOT)));
        if always_use_xrandr_name {
            log::info!("Using XRANDR name for display device ids");
        }

        Self {
            config,
            mapping: stores.mapping,
            device_db: stores.device_db,
            profile_db: stores.profile_db,
            devices: DeviceArray::new(),
            profiles: ProfileArray::new(),
            sensors: Vec::new(),
            watcher: SenderWatcher::new(),
            authorizer,
            decoder,
            canonical,
            store,
            system_vendor: dmi_vendor(Path::new(DMI_ROOT)),
            system_model: dmi_model(Path::new(DMI_ROOT)),
            always_use_xrandr_name,
            watch_ids: HashMap::new(),
            signals,
        }
    }

    /// Open the stores from the config and use the stock policy and decoder
    pub fn open(config: Config, signals: Sender<Signal>) -> Result<Self> {
        let stores = Stores::open(&config.database_dir())?;
        let authorizer = Box::new(PolicyAuthorizer::from_config(&config.auth));
        Ok(Self::new(config, stores, authorizer, Box::new(IccDecoder), signals))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn devices(&self) -> &DeviceArray {
        &self.devices
    }

    pub fn profiles(&self) -> &ProfileArray {
        &self.profiles
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    // ---------------------------------------------------------------
    // Signals
    // ---------------------------------------------------------------

    pub(crate) fn emit(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            log::debug!("No signal listener");
        }
    }

    pub(crate) fn emit_device_changed(&self, object_path: &str, properties: &[&str]) {
        self.emit(Signal::properties_changed(object_path, properties));
        self.emit(Signal::DeviceChanged {
            object_path: object_path.to_string(),
        });
    }

    pub(crate) fn emit_profile_changed(&self, object_path: &str, properties: &[&str]) {
        self.emit(Signal::properties_changed(object_path, properties));
        self.emit(Signal::ProfileChanged {
            object_path: object_path.to_string(),
        });
    }

    fn watch(&mut self, sender: &str, target: WatchTarget, object_path: &str) {
        let id = self.watcher.watch(sender, target);
        self.watch_ids.insert(object_path.to_string(), id);
    }

    fn unwatch(&mut self, object_path: &str) {
        if let Some(id) = self.watch_ids.remove(object_path) {
            self.watcher.cancel(id);
        }
    }

    // ---------------------------------------------------------------
    // Devices
    // ---------------------------------------------------------------

    /// Add a device to the registry after restoring its state and history.
    /// Temp-scope devices die with `sender`.
    pub(crate) fn register_device(&mut self, mut device: Device, sender: Option<&str>) -> String {
        if let Err(e) = device.load_enabled(&self.device_db) {
            log::warn!("Failed to load enabled state for {}: {}", device.id(), e);
        }

        match self.mapping.get_profiles(device.id()) {
            Ok(profile_ids) => {
                for profile_id in profile_ids {
                    let Some(profile) =
                        self.profiles
                            .get_by_id_owner(&profile_id, device.owner(), LookupFlags::OwnerOptional)
                    else {
                        log::debug!("Profile {} for {} not yet available", profile_id, device.id());
                        continue;
                    };
                    auto_add_from_history(&mut device, profile, &self.mapping);
                }
            }
            Err(e) => log::warn!("Failed to get profiles for {}: {}", device.id(), e),
        }

        for profile in self
            .profiles
            .get_by_metadata(PROFILE_METADATA_MAPPING_DEVICE_ID, device.id())
        {
            auto_add_from_metadata(&mut device, profile, &self.mapping);
        }

        let object_path = device.object_path().to_string();
        if device.scope() == ObjectScope::Temp {
            if let Some(sender) = sender {
                let target = WatchTarget::Device {
                    object_path: object_path.clone(),
                };
                self.watch(sender, target, &object_path);
            }
        }

        log::info!("Device added: {}", device.id());
        self.devices.add(device);
        self.emit(Signal::DeviceAdded {
            object_path: object_path.clone(),
        });
        self.emit(Signal::Changed);
        object_path
    }

    /// Remove a device. Missing devices are ignored.
    pub(crate) fn remove_device(&mut self, object_path: &str) -> bool {
        self.unwatch(object_path);
        let Some(device) = self.devices.remove(object_path) else {
            log::debug!("Device {} already removed", object_path);
            return false;
        };

        if device.scope() == ObjectScope::Disk {
            if let Err(e) = self.device_db.remove(device.id()) {
                log::warn!("Failed to remove {} from the device store: {}", device.id(), e);
            }
        }

        log::info!("Device removed: {}", device.id());
        self.emit(Signal::DeviceRemoved {
            object_path: object_path.to_string(),
        });
        self.emit(Signal::Changed);
        true
    }

    /// Turn a replayed virtual device into a physical one and apply new properties
    pub(crate) fn promote_device(
        &mut self,
        object_path: &str,
        properties: &std::collections::BTreeMap<String, String>,
    ) -> Result<()> {
        let device = self
            .devices
            .get_by_object_path_mut(object_path)
            .ok_or_else(|| ColordError::NotFound(format!("device {} not found", object_path)))?;
        log::info!("Promoting virtual device {} to physical", device.id());
        device.set_mode(DeviceMode::Physical);
        for (key, value) in ordered_properties(properties) {
            device.set_property(key, value, &self.device_db)?;
        }
        self.emit_device_changed(object_path, &[DEVICE_PROPERTY_MODE]);
        Ok(())
    }

    /// Replay disk-scope devices as virtual root-owned devices
    fn load_disk_devices(&mut self) -> Result<()> {
        for id in self.device_db.get_devices()? {
            let mut device = Device::new(&id, 0, ObjectScope::Disk);
            device.set_mode(DeviceMode::Virtual);

            let mut properties = std::collections::BTreeMap::new();
            for key in self.device_db.get_properties(&id)? {
                if key == DEVICE_PROPERTY_ENABLED {
                    continue;
                }
                if let Some(value) = self.device_db.get_property(&id, &key)? {
                    properties.insert(key, value);
                }
            }
            for (key, value) in ordered_properties(&properties) {
                if let Err(e) = device.apply_property(key, value) {
                    log::warn!("Ignoring stored property {} of {}: {}", key, id, e);
                }
            }
            log::debug!("Replaying disk device {}", id);
            self.register_device(device, None);
        }
        Ok(())
    }

    fn device_from_template(template: &DeviceTemplate) -> Device {
        let mut device = Device::new(&template.id, 0, ObjectScope::Normal);
        device.set_mode(DeviceMode::Physical);
        device.set_seat(DEFAULT_SEAT);
        for (key, value) in ordered_properties(&template.properties) {
            if let Err(e) = device.apply_property(key, value) {
                log::warn!("Plugin property {} of {} rejected: {}", key, template.id, e);
            }
        }
        device
    }

    pub fn handle_plugin_event(&mut self, event: PluginEvent) {
        match event {
            PluginEvent::DeviceDiscovered(template) => {
                let existing = self
                    .devices
                    .get_by_id_owner(&template.id, 0, LookupFlags::Exact)
                    .map(|d| (d.object_path().to_string(), d.mode()));
                match existing {
                    Some((path, DeviceMode::Virtual)) => {
                        if let Err(e) = self.promote_device(&path, &template.properties) {
                            log::warn!("Failed to add device: {}", e);
                        }
                    }
                    Some((path, _)) => log::warn!("Failed to add device: {} already exists", path),
                    None => {
                        let device = Self::device_from_template(&template);
                        self.register_device(device, None);
                    }
                }
            }
            PluginEvent::DeviceLost { id } => {
                let path = self
                    .devices
                    .get_by_id_owner(&id, 0, LookupFlags::OwnerOptional)
                    .map(|d| d.object_path().to_string());
                match path {
                    Some(path) => {
                        self.remove_device(&path);
                    }
                    None => log::debug!("Plugin removed unknown device {}", id),
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Profiles
    // ---------------------------------------------------------------

    /// Add a profile to the registry and attach it wherever history or
    /// metadata says it belongs. Temp-scope profiles die with `sender`.
    pub(crate) fn register_profile(&mut self, profile: Profile, sender: Option<&str>) -> String {
        let mut changed = Vec::new();

        match self.mapping.get_devices(profile.id()) {
            Ok(device_ids) => {
                for device_id in device_ids {
                    let Some(device) =
                        self.devices
                            .get_by_id_owner_mut(&device_id, profile.owner(), LookupFlags::OwnerOptional)
                    else {
                        continue;
                    };
                    if auto_add_from_history(device, &profile, &self.mapping) {
                        changed.push(device.object_path().to_string());
                    }
                }
            }
            Err(e) => log::warn!("Failed to get devices for {}: {}", profile.id(), e),
        }

        if let Some(device_id) = profile.metadata_item(PROFILE_METADATA_MAPPING_DEVICE_ID) {
            if let Some(device) =
                self.devices
                    .get_by_id_owner_mut(device_id, profile.owner(), LookupFlags::OwnerOptional)
            {
                if auto_add_from_metadata(device, &profile, &self.mapping) {
                    changed.push(device.object_path().to_string());
                }
            }
        }

        let object_path = profile.object_path().to_string();
        if profile.scope() == ObjectScope::Temp {
            if let Some(sender) = sender {
                let target = WatchTarget::Profile {
                    object_path: object_path.clone(),
                };
                self.watch(sender, target, &object_path);
            }
        }

        log::info!("Profile added: {}", profile.id());
        self.profiles.add(profile);
        self.emit(Signal::ProfileAdded {
            object_path: object_path.clone(),
        });
        for path in changed {
            self.emit_device_changed(&path, &[DEVICE_PROPERTY_PROFILES]);
        }
        self.emit(Signal::Changed);
        object_path
    }

    /// Remove a profile, detaching it from every device first. History is kept.
    pub(crate) fn remove_profile(&mut self, object_path: &str) -> bool {
        self.unwatch(object_path);
        if self.profiles.get_by_object_path(object_path).is_none() {
            log::debug!("Profile {} already removed", object_path);
            return false;
        }

        let changed: Vec<String> = self
            .devices
            .iter_mut()
            .filter_map(|device| {
                device
                    .purge_profile(object_path)
                    .then(|| device.object_path().to_string())
            })
            .collect();
        for path in &changed {
            self.emit_device_changed(path, &[DEVICE_PROPERTY_PROFILES]);
        }

        if let Some(profile) = self.profiles.remove(object_path) {
            log::info!("Profile removed: {}", profile.id());
        }
        self.emit(Signal::ProfileRemoved {
            object_path: object_path.to_string(),
        });
        self.emit(Signal::Changed);
        true
    }

    /// Sync the registry with the profile directories
    /// Full scan of the profile directories, run at coldplug
    pub fn rescan_profiles(&mut self) {
        let changes = self.store.rescan(self.decoder.as_ref());
        self.apply_store_changes(changes);
    }

    /// Paths the profile monitor reported
    pub fn profile_files_changed(&mut self, paths: &[PathBuf]) {
        let changes = self.store.update(paths, self.decoder.as_ref());
        self.apply_store_changes(changes);
    }

    pub fn profile_dirs(&self) -> &[PathBuf] {
        self.store.dirs()
    }

    fn apply_store_changes(&mut self, changes: Vec<StoreChange>) {
        for change in changes {
            match change {
                StoreChange::Added(profile) => {
                    if self.profiles.get_by_object_path(profile.object_path()).is_some() {
                        log::debug!("Profile {} already registered", profile.id());
                        continue;
                    }
                    self.register_profile(profile, None);
                }
                StoreChange::Removed(path) => {
                    let object_path = self
                        .profiles
                        .iter()
                        .find(|p| {
                            p.filename() == Some(path.as_path())
                                && p.scope() == ObjectScope::Normal
                                && p.owner() == 0
                        })
                        .map(|p| p.object_path().to_string());
                    if let Some(object_path) = object_path {
                        self.remove_profile(&object_path);
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Sensors
    // ---------------------------------------------------------------

    pub(crate) fn add_sensor(&mut self, sensor: Sensor) {
        log::info!("Sensor added: {}", sensor.id());
        let object_path = sensor.object_path().to_string();
        self.sensors.push(sensor);
        self.emit(Signal::SensorAdded { object_path });
    }

    pub(crate) fn watch_sensor_lock(&mut self, sender: &str, object_path: &str) {
        self.watcher.watch(
            sender,
            WatchTarget::SensorLock {
                object_path: object_path.to_string(),
            },
        );
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Startup: profiles, replayed disk devices, plugins, then the dummy sensor
    pub fn coldplug(&mut self, plugins: &mut PluginHost) {
        self.rescan_profiles();
        if let Err(e) = self.load_disk_devices() {
            log::warn!("Failed to load disk devices: {}", e);
        }
        plugins.coldplug();
        if self.config.daemon.create_dummy_sensor {
            self.add_sensor(Sensor::dummy());
        }
        log::info!(
            "Coldplug done: {} devices, {} profiles, {} sensors",
            self.devices.len(),
            self.profiles.len(),
            self.sensors.len()
        );
    }

    /// A client connection closed: tear down everything tied to it
    pub fn name_vanished(&mut self, sender: &str) {
        for target in self.watcher.vanished(sender) {
            log::debug!("{} vanished, invalidating {:?}", sender, target);
            match target {
                WatchTarget::Device { object_path } => {
                    self.remove_device(&object_path);
                }
                WatchTarget::Profile { object_path } => {
                    self.remove_profile(&object_path);
                }
                WatchTarget::Inhibit { device_path } => {
                    let Some(device) = self.devices.get_by_object_path_mut(&device_path) else {
                        continue;
                    };
                    if device.inhibit_mut().remove(sender).is_ok() {
                        self.emit_device_changed(
                            &device_path,
                            &[DEVICE_PROPERTY_PROFILING_INHIBITORS, DEVICE_PROPERTY_PROFILES],
                        );
                    }
                }
                WatchTarget::SensorLock { object_path } => {
                    let Some(sensor) = self.sensors.iter_mut().find(|s| s.object_path() == object_path) else {
                        continue;
                    };
                    if sensor.locked_by() == Some(sender) {
                        if let Err(e) = sensor.unlock(sender) {
                            log::warn!("Failed to release {}: {}", object_path, e);
                        }
                    }
                }
            }
        }
    }

    pub fn handle_call(&mut self, caller: &Caller, request: Request, fd: Option<File>) -> Response {
        commands::dispatch(self, caller, request, fd)
    }
}
