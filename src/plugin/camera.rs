// Camera and webcam discovery
// Walks sysfs for usb and video4linux devices, reads their udev properties from
// the udev database and reports those tagged COLORD_DEVICE. Hotplug is picked up
// by a rescan thread.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::{DeviceTemplate, Plugin, PluginContext};
use crate::config::Config;
use crate::constants::*;
use crate::error::{ColordError, Result};

/// Where each subsystem lists its devices, relative to the sysfs root
const SUBSYSTEM_DIRS: [&str; 2] = ["bus/usb/devices", "class/video4linux"];

/// A sysfs device with its udev properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdevRecord {
    pub sysfs_path: PathBuf,
    pub device_file: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub embedded: bool,
}

fn parse_uevent(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn parse_udev_data(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.strip_prefix("E:"))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The first parent with a `removable` attribute decides
fn is_embedded(sysfs_path: &Path, sysfs_root: &Path) -> bool {
    for parent in sysfs_path.ancestors().skip(1) {
        if parent == sysfs_root || !parent.starts_with(sysfs_root) {
            break;
        }
        if let Ok(removable) = std::fs::read_to_string(parent.join("removable")) {
            return removable.trim() == "fixed";
        }
    }
    false
}

fn read_record(entry: &Path, sysfs_root: &Path, udev_data_dir: &Path) -> Option<UdevRecord> {
    let sysfs_path = std::fs::canonicalize(entry).ok()?;
    let uevent = parse_uevent(&std::fs::read_to_string(sysfs_path.join("uevent")).ok()?);
    let major = uevent.get("MAJOR")?;
    let minor = uevent.get("MINOR")?;

    let data_file = udev_data_dir.join(format!("c{}:{}", major, minor));
    let properties = parse_udev_data(&std::fs::read_to_string(data_file).ok()?);

    let root = std::fs::canonicalize(sysfs_root).unwrap_or_else(|_| sysfs_root.to_path_buf());
    Some(UdevRecord {
        embedded: is_embedded(&sysfs_path, &root),
        device_file: uevent.get("DEVNAME").map(|name| format!("/dev/{}", name)),
        sysfs_path,
        properties,
    })
}

/// Every usb and video4linux device the udev database knows about
pub fn scan_devices(sysfs_root: &Path, udev_data_dir: &Path) -> Vec<UdevRecord> {
    let mut records = Vec::new();
    for subdir in SUBSYSTEM_DIRS {
        let dir = sysfs_root.join(subdir);
        let Ok(entries) = std::fs::read_dir(&dir) else {
            log::debug!("Camera: no {}", dir.display());
            continue;
        };
        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        paths.sort();
        records.extend(paths.iter().filter_map(|p| read_record(p, sysfs_root, udev_data_dir)));
    }
    records
}

fn clean_name(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '_' | '\r' | '\n') { ' ' } else { c })
        .collect::<String>()
        .trim_end()
        .to_string()
}

fn device_id(record: &UdevRecord) -> String {
    let mut id = String::from("sysfs");
    for key in ["ID_VENDOR", "ID_MODEL"] {
        if let Some(value) = record.properties.get(key) {
            id.push('-');
            id.push_str(value);
        }
    }
    if id.len() == 5 {
        if let Some(file) = &record.device_file {
            id.push('-');
            id.push_str(file);
        }
    }
    id
}

/// The device to report for a record, if it is tagged for color management
pub fn template_for_record(record: &UdevRecord) -> Option<DeviceTemplate> {
    if !record.properties.contains_key("COLORD_DEVICE") {
        return None;
    }

    let kind = if record.properties.contains_key("ID_GPHOTO2") {
        "camera"
    } else {
        "webcam"
    };
    let seat = record
        .properties
        .get("ID_SEAT")
        .map(String::as_str)
        .unwrap_or(DEFAULT_SEAT);

    let mut template = DeviceTemplate::new(&device_id(record))
        .with(DEVICE_PROPERTY_KIND, kind)
        .with(DEVICE_PROPERTY_COLORSPACE, "rgb")
        .with(DEVICE_PROPERTY_SERIAL, &record.sysfs_path.display().to_string())
        .with(DEVICE_PROPERTY_SEAT, seat);
    if let Some(model) = record.properties.get("ID_MODEL") {
        template = template.with(DEVICE_PROPERTY_MODEL, &clean_name(model));
    }
    if let Some(vendor) = record.properties.get("ID_VENDOR") {
        template = template.with(DEVICE_PROPERTY_VENDOR, &clean_name(vendor));
    }
    if record.embedded {
        template = template.with(DEVICE_PROPERTY_EMBEDDED, "true");
    }
    Some(template)
}

/// sysfs path -> reported device id
type Known = Arc<Mutex<BTreeMap<PathBuf, String>>>;

/// Report added and removed devices since the last pass
fn sync_devices(sysfs_root: &Path, udev_data_dir: &Path, known: &Known, ctx: &PluginContext) -> Result<()> {
    let found: Vec<(PathBuf, DeviceTemplate)> = scan_devices(sysfs_root, udev_data_dir)
        .iter()
        .filter_map(|r| template_for_record(r).map(|t| (r.sysfs_path.clone(), t)))
        .collect();

    let mut known = known
        .lock()
        .map_err(|_| ColordError::Internal("camera device table poisoned".to_string()))?;

    let present: BTreeSet<&PathBuf> = found.iter().map(|(p, _)| p).collect();
    let gone: Vec<PathBuf> = known.keys().filter(|p| !present.contains(p)).cloned().collect();
    for path in gone {
        if let Some(id) = known.remove(&path) {
            log::debug!("Camera: remove {}", path.display());
            ctx.device_lost(&id);
        }
    }

    for (path, template) in found {
        if known.contains_key(&path) {
            continue;
        }
        known.insert(path, template.id.clone());
        ctx.device_discovered(template);
    }
    Ok(())
}

pub struct CameraPlugin {
    sysfs_root: PathBuf,
    udev_data_dir: PathBuf,
    interval: Duration,
    known: Known,
    stop: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl CameraPlugin {
    pub fn new(sysfs_root: &Path, udev_data_dir: &Path, interval: Duration) -> Self {
        Self {
            sysfs_root: sysfs_root.to_path_buf(),
            udev_data_dir: udev_data_dir.to_path_buf(),
            interval,
            known: Arc::new(Mutex::new(BTreeMap::new())),
            stop: Arc::new(AtomicBool::new(false)),
            watcher: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.plugins.sysfs_root,
            &config.plugins.udev_data_dir,
            Duration::from_secs(config.daemon.rescan_interval_secs.max(1)),
        )
    }

    fn spawn_watcher(&mut self, ctx: &PluginContext) -> Result<()> {
        let sysfs_root = self.sysfs_root.clone();
        let udev_data_dir = self.udev_data_dir.clone();
        let interval = self.interval;
        let known = Arc::clone(&self.known);
        let stop = Arc::clone(&self.stop);
        let ctx = ctx.clone();

        let handle = std::thread::Builder::new()
            .name("camera-watch".into())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    std::thread::sleep(interval);
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    if let Err(e) = sync_devices(&sysfs_root, &udev_data_dir, &known, &ctx) {
                        log::error!("Camera: rescan failed: {}", e);
                    }
                }
            })?;
        self.watcher = Some(handle);
        Ok(())
    }
}

impl Plugin for CameraPlugin {
    fn name(&self) -> &'static str {
        "camera"
    }

    fn description(&self) -> &'static str {
        "Add cameras and webcams tagged for color management"
    }

    fn coldplug(&mut self, ctx: &PluginContext) -> Result<()> {
        sync_devices(&self.sysfs_root, &self.udev_data_dir, &self.known, ctx)?;
        self.spawn_watcher(ctx)
    }

    fn destroy(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.watcher.take() {
            if handle.join().is_err() {
                log::error!("Camera: watcher thread panicked");
            }
        }
    }
}
