// --- Daemon tests: registration, auto-add, coldplug and sender invalidation ---

use super::*;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver};
use tempfile::TempDir;

use crate::enums::{Colorspace, ProfileKind, ProfileWarning};
use crate::profile::ParsedProfile;

/// Grants everything
pub(crate) struct AllowAll;

impl Authorizer for AllowAll {
    fn is_authorized(&self, _action: &str, _caller: &Caller) -> bool {
        true
    }
}

/// Grants nothing
pub(crate) struct DenyAll;

impl Authorizer for DenyAll {
    fn is_authorized(&self, _action: &str, _caller: &Caller) -> bool {
        false
    }
}

/// Reads `key=value` lines: `title` and `warning` fill the parsed fields,
/// anything else lands in the metadata
pub(crate) struct TextDecoder;

impl ProfileDecoder for TextDecoder {
    fn decode(&self, data: &[u8]) -> Result<ParsedProfile> {
        let mut parsed = ParsedProfile {
            kind: ProfileKind::DisplayDevice,
            colorspace: Colorspace::Rgb,
            ..Default::default()
        };
        for line in String::from_utf8_lossy(data).lines() {
            match line.split_once('=') {
                Some(("title", value)) => parsed.title = Some(value.to_string()),
                Some(("warning", value)) => parsed.warnings.push(ProfileWarning::from_str_lossy(value)),
                Some((key, value)) => {
                    parsed.metadata.insert(key.to_string(), value.to_string());
                }
                None => {}
            }
        }
        Ok(parsed)
    }
}

pub(crate) struct TestDaemon {
    pub dir: TempDir,
    pub daemon: Daemon,
    pub signals: Receiver<Signal>,
}

impl TestDaemon {
    /// Everything emitted since the last drain
    pub fn drain(&self) -> Vec<Signal> {
        self.signals.try_iter().collect()
    }
}

pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.daemon.database_dir = Some(dir.join("db"));
    config.daemon.always_use_xrandr_name = Some(false);
    config.profiles.search_system = Vec::new();
    config.profiles.machine_dir = dir.join("icc");
    config
}

pub(crate) fn memory_stores() -> Stores {
    Stores {
        mapping: MappingDb::from_connection(Connection::open_in_memory().unwrap()).unwrap(),
        device_db: DeviceDb::from_connection(Connection::open_in_memory().unwrap()).unwrap(),
        profile_db: ProfileDb::from_connection(Connection::open_in_memory().unwrap()).unwrap(),
    }
}

fn build(dir: TempDir, stores: Stores, authorizer: Box<dyn Authorizer>) -> TestDaemon {
    let (tx, signals) = mpsc::channel();
    let config = test_config(dir.path());
    let daemon = Daemon::new(config, stores, authorizer, Box::new(TextDecoder), tx);
    TestDaemon { dir, daemon, signals }
}

pub(crate) fn setup_with(authorizer: Box<dyn Authorizer>) -> TestDaemon {
    build(TempDir::new().unwrap(), memory_stores(), authorizer)
}

pub(crate) fn setup() -> TestDaemon {
    setup_with(Box::new(AllowAll))
}

/// A parsed profile built from `TextDecoder` input
pub(crate) fn text_profile(id: &str, owner: u32, scope: ObjectScope, text: &str) -> Profile {
    let mut profile = Profile::new(id, owner, scope);
    profile.load_from_bytes(text.as_bytes(), &TextDecoder).unwrap();
    profile
}

fn display(id: &str, owner: u32, scope: ObjectScope) -> Device {
    let mut device = Device::new(id, owner, scope);
    device.apply_property(DEVICE_PROPERTY_KIND, "display").unwrap();
    device
}

fn attach(daemon: &mut Daemon, device_path: &str, profile_path: &str, relation: DeviceRelation) {
    let profile = daemon.profiles.get_by_object_path(profile_path).unwrap();
    let device = daemon.devices.get_by_object_path_mut(device_path).unwrap();
    device.add_profile(relation, profile, now_micros(), &daemon.mapping).unwrap();
}

fn associated(daemon: &Daemon, device_path: &str) -> Vec<(String, DeviceRelation)> {
    daemon
        .devices
        .get_by_object_path(device_path)
        .unwrap()
        .associations()
        .iter()
        .map(|a| (a.profile_id.clone(), a.relation))
        .collect()
}

// ---------------------------------------------------------------
// Temporary objects
// ---------------------------------------------------------------

#[test]
fn test_temp_objects_die_with_their_sender() {
    let mut t = setup();
    let d = &mut t.daemon;

    let device_path = d.register_device(display("dev1", 1000, ObjectScope::Temp), Some(":1.5"));
    let mut profile = text_profile("prof1", 1000, ObjectScope::Temp, "title=Screen");
    profile.set_qualifier("RGB.Plain.300dpi");
    let profile_path = d.register_profile(profile, Some(":1.5"));
    attach(d, &device_path, &profile_path, DeviceRelation::Hard);

    let device = d.devices.get_by_object_path(&device_path).unwrap();
    let found = device
        .find_profile_for_qualifiers(&["RGB.*.300dpi".to_string()], &d.profiles)
        .unwrap();
    assert_eq!(found, profile_path);

    t.drain();
    t.daemon.name_vanished(":1.5");
    assert!(t.daemon.devices.is_empty());
    assert!(t.daemon.profiles.is_empty());

    let signals = t.drain();
    assert!(signals.contains(&Signal::DeviceRemoved {
        object_path: device_path.clone()
    }));
    assert!(signals.contains(&Signal::ProfileRemoved {
        object_path: profile_path.clone()
    }));

    // A second disconnect has nothing left to do
    t.daemon.name_vanished(":1.5");
    assert!(t.drain().is_empty());
}

#[test]
fn test_vanished_temp_profile_leaves_no_dangling_association() {
    let mut t = setup();
    let d = &mut t.daemon;

    let device_path = d.register_device(display("dev1", 0, ObjectScope::Normal), None);
    let profile_path = d.register_profile(
        text_profile("prof1", 0, ObjectScope::Temp, "title=Screen"),
        Some(":1.7"),
    );
    attach(d, &device_path, &profile_path, DeviceRelation::Hard);
    t.drain();

    t.daemon.name_vanished(":1.7");
    assert!(associated(&t.daemon, &device_path).is_empty());
    assert!(t.drain().contains(&Signal::DeviceChanged {
        object_path: device_path.clone()
    }));

    // The pair is still remembered, not tombstoned
    assert!(t.daemon.mapping.get_timestamp("dev1", "prof1").unwrap() > 0);
}

#[test]
fn test_normal_objects_survive_sender() {
    let mut t = setup();
    t.daemon.register_device(display("dev1", 1000, ObjectScope::Normal), Some(":1.9"));
    t.daemon.name_vanished(":1.9");
    assert_eq!(t.daemon.devices.len(), 1);
}

#[test]
fn test_removed_device_cancels_its_watch() {
    let mut t = setup();
    let path = t
        .daemon
        .register_device(display("dev1", 1000, ObjectScope::Temp), Some(":1.3"));
    assert!(t.daemon.remove_device(&path));
    assert!(!t.daemon.remove_device(&path));
    t.drain();

    t.daemon.name_vanished(":1.3");
    assert!(t.drain().is_empty());
}

// ---------------------------------------------------------------
// History and metadata auto-add
// ---------------------------------------------------------------

#[test]
fn test_history_restores_hard_association_either_order() {
    let mut t = setup();
    t.daemon.mapping.add_at("dev1", "prof1", 1234).unwrap();

    // Device first, profile arrives later
    let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
    t.daemon
        .register_profile(text_profile("prof1", 0, ObjectScope::Normal, "title=A"), None);
    assert_eq!(
        associated(&t.daemon, &device_path),
        vec![("prof1".to_string(), DeviceRelation::Hard)]
    );
    let device = t.daemon.devices.get_by_object_path(&device_path).unwrap();
    assert_eq!(device.associations()[0].timestamp, 1234);

    // Profile first, device arrives later
    t.daemon.mapping.add_at("dev2", "prof1", 99).unwrap();
    let other = t.daemon.register_device(display("dev2", 0, ObjectScope::Normal), None);
    assert_eq!(
        associated(&t.daemon, &other),
        vec![("prof1".to_string(), DeviceRelation::Hard)]
    );
}

#[test]
fn test_metadata_adds_soft_association() {
    let mut t = setup();
    t.daemon.register_profile(
        text_profile("prof1", 0, ObjectScope::Normal, "MAPPING_device_id=dev1"),
        None,
    );
    let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
    assert_eq!(
        associated(&t.daemon, &device_path),
        vec![("prof1".to_string(), DeviceRelation::Soft)]
    );

    // Soft associations are not written to history
    assert!(matches!(
        t.daemon.mapping.get_timestamp("dev1", "prof1"),
        Err(ColordError::NotFound(_))
    ));
}

#[test]
fn test_metadata_add_skips_profiles_with_warnings() {
    let mut t = setup();
    let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
    t.daemon.register_profile(
        text_profile(
            "prof1",
            0,
            ObjectScope::Normal,
            "MAPPING_device_id=dev1\nwarning=primaries-invalid",
        ),
        None,
    );
    assert!(associated(&t.daemon, &device_path).is_empty());
}

#[test]
fn test_metadata_add_skips_tombstoned_pair() {
    let mut t = setup();
    t.daemon.mapping.add_at("dev1", "prof1", 10).unwrap();
    t.daemon.mapping.clear_timestamp("dev1", "prof1").unwrap();

    let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
    t.daemon.register_profile(
        text_profile("prof1", 0, ObjectScope::Normal, "MAPPING_device_id=dev1"),
        None,
    );
    assert!(associated(&t.daemon, &device_path).is_empty());
}

#[test]
fn test_tombstone_survives_restart() {
    let dir = TempDir::new().unwrap();
    let db_dir = dir.path().join("db");

    {
        let stores = Stores::open(&db_dir).unwrap();
        let mut t = build(TempDir::new().unwrap(), stores, Box::new(AllowAll));
        let kept = t.daemon.register_profile(text_profile("kept", 0, ObjectScope::Normal, "title=K"), None);
        let gone = t.daemon.register_profile(text_profile("gone", 0, ObjectScope::Normal, "title=G"), None);
        let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
        attach(&mut t.daemon, &device_path, &kept, DeviceRelation::Hard);
        attach(&mut t.daemon, &device_path, &gone, DeviceRelation::Hard);

        let device = t.daemon.devices.get_by_object_path_mut(&device_path).unwrap();
        device.remove_profile(&gone, &t.daemon.mapping).unwrap();
    }

    let stores = Stores::open(&db_dir).unwrap();
    let mut t = build(TempDir::new().unwrap(), stores, Box::new(AllowAll));
    t.daemon.register_profile(
        text_profile("gone", 0, ObjectScope::Normal, "MAPPING_device_id=dev1"),
        None,
    );
    t.daemon.register_profile(text_profile("kept", 0, ObjectScope::Normal, "title=K"), None);
    let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
    assert_eq!(
        associated(&t.daemon, &device_path),
        vec![("kept".to_string(), DeviceRelation::Hard)]
    );
}

#[test]
fn test_disabled_device_keeps_history_across_restart() {
    let dir = TempDir::new().unwrap();
    let db_dir = dir.path().join("db");

    {
        let stores = Stores::open(&db_dir).unwrap();
        let mut t = build(TempDir::new().unwrap(), stores, Box::new(AllowAll));
        let profile_path = t.daemon.register_profile(text_profile("p1", 0, ObjectScope::Normal, "title=P"), None);
        let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
        attach(&mut t.daemon, &device_path, &profile_path, DeviceRelation::Hard);

        let device = t.daemon.devices.get_by_object_path_mut(&device_path).unwrap();
        assert!(device.set_enabled(false, &t.daemon.device_db).unwrap());
    }

    let stores = Stores::open(&db_dir).unwrap();
    let mut t = build(TempDir::new().unwrap(), stores, Box::new(AllowAll));
    t.daemon.register_profile(text_profile("p1", 0, ObjectScope::Normal, "title=P"), None);
    let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);

    let device = t.daemon.devices.get_by_object_path_mut(&device_path).unwrap();
    assert!(!device.is_enabled());
    assert!(device.set_enabled(true, &t.daemon.device_db).unwrap());
    assert_eq!(
        associated(&t.daemon, &device_path),
        vec![("p1".to_string(), DeviceRelation::Hard)]
    );
}

// ---------------------------------------------------------------
// Coldplug and plugins
// ---------------------------------------------------------------

fn empty_host() -> PluginHost {
    let (tx, _rx) = mpsc::channel();
    PluginHost::new(crate::plugin::PluginContext::new(tx))
}

fn store_disk_device(daemon: &Daemon, id: &str) {
    daemon.device_db.add(id).unwrap();
    daemon.device_db.set_property(id, DEVICE_PROPERTY_KIND, "printer").unwrap();
    daemon.device_db.set_property(id, DEVICE_PROPERTY_MODEL, "LaserJet Series").unwrap();
    daemon.device_db.set_property(id, DEVICE_PROPERTY_ENABLED, "False").unwrap();
}

#[test]
fn test_coldplug_replays_disk_devices_as_virtual() {
    let mut t = setup();
    store_disk_device(&t.daemon, "cups-LaserJet");

    t.daemon.coldplug(&mut empty_host());
    let device = t
        .daemon
        .devices
        .get_by_id_owner("cups-LaserJet", 0, LookupFlags::Exact)
        .unwrap();
    assert_eq!(device.mode(), DeviceMode::Virtual);
    assert_eq!(device.scope(), ObjectScope::Disk);
    assert_eq!(device.model(), Some("LaserJet"));
    assert!(!device.is_enabled());
}

#[test]
fn test_plugin_discovery_promotes_virtual_device() {
    let mut t = setup();
    store_disk_device(&t.daemon, "cups-LaserJet");
    t.daemon.coldplug(&mut empty_host());
    let path = t.daemon.devices.iter().next().unwrap().object_path().to_string();
    t.drain();

    let template = DeviceTemplate::new("cups-LaserJet").with(DEVICE_PROPERTY_SERIAL, "XY123");
    t.daemon.handle_plugin_event(PluginEvent::DeviceDiscovered(template));

    assert_eq!(t.daemon.devices.len(), 1);
    let device = t.daemon.devices.get_by_object_path(&path).unwrap();
    assert_eq!(device.mode(), DeviceMode::Physical);
    assert_eq!(device.serial(), Some("XY123"));
    assert_eq!(
        t.daemon.device_db.get_property("cups-LaserJet", DEVICE_PROPERTY_SERIAL).unwrap(),
        Some("XY123".to_string())
    );
    assert!(t.drain().contains(&Signal::DeviceChanged { object_path: path }));
}

#[test]
fn test_plugin_discovery_registers_new_device() {
    let mut t = setup();
    let template = DeviceTemplate::new("cups-Canon-iP4200")
        .with(DEVICE_PROPERTY_MODEL, "iP4200 Series")
        .with(DEVICE_PROPERTY_KIND, "printer");
    t.daemon.handle_plugin_event(PluginEvent::DeviceDiscovered(template.clone()));

    let device = t.daemon.devices.iter().next().unwrap();
    assert_eq!(device.mode(), DeviceMode::Physical);
    assert_eq!(device.owner(), 0);
    assert_eq!(device.seat(), Some(DEFAULT_SEAT));
    assert_eq!(device.model(), Some("iP4200"));

    // A second physical report is rejected
    t.daemon.handle_plugin_event(PluginEvent::DeviceDiscovered(template));
    assert_eq!(t.daemon.devices.len(), 1);
}

#[test]
fn test_plugin_device_lost() {
    let mut t = setup();
    t.daemon
        .handle_plugin_event(PluginEvent::DeviceDiscovered(DeviceTemplate::new("sysfs-cam")));
    assert_eq!(t.daemon.devices.len(), 1);

    t.daemon.handle_plugin_event(PluginEvent::DeviceLost {
        id: "sysfs-cam".to_string(),
    });
    assert!(t.daemon.devices.is_empty());

    // Unknown ids are ignored
    t.daemon.handle_plugin_event(PluginEvent::DeviceLost {
        id: "sysfs-cam".to_string(),
    });
}

#[test]
fn test_coldplug_adds_dummy_sensor_when_configured() {
    let mut t = setup();
    t.daemon.config.daemon.create_dummy_sensor = true;
    t.daemon.coldplug(&mut empty_host());
    assert_eq!(t.daemon.sensors().len(), 1);
    assert!(t
        .drain()
        .iter()
        .any(|s| matches!(s, Signal::SensorAdded { .. })));
}

// ---------------------------------------------------------------
// Profile directory rescans
// ---------------------------------------------------------------

#[test]
fn test_rescan_tracks_machine_directory() {
    let mut t = setup();
    let icc_dir = t.dir.path().join("icc");
    std::fs::create_dir_all(&icc_dir).unwrap();
    let file = icc_dir.join("screen.icc");
    std::fs::write(&file, "title=Screen").unwrap();

    t.daemon.rescan_profiles();
    assert_eq!(t.daemon.profiles.len(), 1);
    let profile = t.daemon.profiles.iter().next().unwrap();
    assert_eq!(profile.filename(), Some(file.as_path()));
    assert!(profile.id().starts_with("icc-"));

    // Nothing changed, nothing re-registered
    t.drain();
    t.daemon.rescan_profiles();
    assert!(t.drain().is_empty());

    std::fs::remove_file(&file).unwrap();
    t.daemon.rescan_profiles();
    assert!(t.daemon.profiles.is_empty());
    assert!(t
        .drain()
        .iter()
        .any(|s| matches!(s, Signal::ProfileRemoved { .. })));
}

#[test]
fn test_monitored_changes_register_and_remove_profiles() {
    let mut t = setup();
    let icc_dir = t.dir.path().join("icc");
    std::fs::create_dir_all(&icc_dir).unwrap();
    t.daemon.rescan_profiles();
    assert!(t.daemon.profiles.is_empty());

    let file = icc_dir.join("screen.icc");
    std::fs::write(&file, "title=Screen\nMAPPING_device_id=dev1").unwrap();
    let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
    t.daemon.profile_files_changed(&[file.clone()]);
    assert_eq!(t.daemon.profiles.len(), 1);
    assert_eq!(associated(&t.daemon, &device_path).len(), 1);

    std::fs::remove_file(&file).unwrap();
    t.daemon.profile_files_changed(&[file]);
    assert!(t.daemon.profiles.is_empty());
    assert!(associated(&t.daemon, &device_path).is_empty());
}

#[test]
fn test_ordered_properties_puts_kind_first() {
    let mut properties = BTreeMap::new();
    properties.insert("Colorspace".to_string(), "rgb".to_string());
    properties.insert("Kind".to_string(), "camera".to_string());
    properties.insert("Embedded".to_string(), "true".to_string());
    let ordered = ordered_properties(&properties);
    assert_eq!(ordered[0], ("Kind", "camera"));
    assert_eq!(ordered.len(), 3);
}

// ---------------------------------------------------------------
// Inhibit and sensor locks
// ---------------------------------------------------------------

#[test]
fn test_inhibit_released_when_sender_vanishes() {
    let mut t = setup();
    let device_path = t.daemon.register_device(display("dev1", 0, ObjectScope::Normal), None);
    let profile_path = t
        .daemon
        .register_profile(text_profile("prof1", 0, ObjectScope::Normal, "title=A"), None);
    attach(&mut t.daemon, &device_path, &profile_path, DeviceRelation::Hard);

    let device = t.daemon.devices.get_by_object_path_mut(&device_path).unwrap();
    device.inhibit_mut().add(":1.4").unwrap();
    t.daemon.watcher.watch(
        ":1.4",
        WatchTarget::Inhibit {
            device_path: device_path.clone(),
        },
    );
    assert!(t.daemon.devices.get_by_object_path(&device_path).unwrap().profiles_exposed().is_empty());

    t.daemon.name_vanished(":1.4");
    let device = t.daemon.devices.get_by_object_path(&device_path).unwrap();
    assert!(!device.is_profiling());
    assert_eq!(device.profiles_exposed(), vec![profile_path]);
}

#[test]
fn test_sensor_lock_released_when_sender_vanishes() {
    let mut t = setup();
    t.daemon.add_sensor(Sensor::dummy());
    let path = t.daemon.sensors[0].object_path().to_string();

    t.daemon.sensors[0].lock(":1.2").unwrap();
    t.daemon.watch_sensor_lock(":1.2", &path);
    t.daemon.name_vanished(":1.2");
    assert!(!t.daemon.sensors[0].is_locked());
}
