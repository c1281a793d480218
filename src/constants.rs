// colord Constants
// Names below are part of the client-visible surface. Do not rename.

pub const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

// Object paths
pub const OBJECT_PATH_ROOT: &str = "/org/freedesktop/ColorManager";
pub const DEVICES_PATH: &str = "/org/freedesktop/ColorManager/devices";
pub const PROFILES_PATH: &str = "/org/freedesktop/ColorManager/profiles";
pub const SENSORS_PATH: &str = "/org/freedesktop/ColorManager/sensors";

// Authorization actions
pub const ACTION_CREATE_DEVICE: &str = "org.freedesktop.color-manager.create-device";
pub const ACTION_DELETE_DEVICE: &str = "org.freedesktop.color-manager.delete-device";
pub const ACTION_CREATE_PROFILE: &str = "org.freedesktop.color-manager.create-profile";
pub const ACTION_MODIFY_DEVICE: &str = "org.freedesktop.color-manager.modify-device";
pub const ACTION_MODIFY_PROFILE: &str = "org.freedesktop.color-manager.modify-profile";
pub const ACTION_DEVICE_INHIBIT: &str = "org.freedesktop.color-manager.device-inhibit";
pub const ACTION_SENSOR_LOCK: &str = "org.freedesktop.color-manager.sensor-lock";
pub const ACTION_INSTALL_SYSTEM_WIDE: &str = "org.freedesktop.color-manager.install-system-wide";

// Device properties
pub const DEVICE_PROPERTY_MODEL: &str = "Model";
pub const DEVICE_PROPERTY_KIND: &str = "Kind";
pub const DEVICE_PROPERTY_VENDOR: &str = "Vendor";
pub const DEVICE_PROPERTY_SERIAL: &str = "Serial";
pub const DEVICE_PROPERTY_COLORSPACE: &str = "Colorspace";
pub const DEVICE_PROPERTY_FORMAT: &str = "Format";
pub const DEVICE_PROPERTY_MODE: &str = "Mode";
pub const DEVICE_PROPERTY_PROFILES: &str = "Profiles";
pub const DEVICE_PROPERTY_CREATED: &str = "Created";
pub const DEVICE_PROPERTY_MODIFIED: &str = "Modified";
pub const DEVICE_PROPERTY_METADATA: &str = "Metadata";
pub const DEVICE_PROPERTY_ID: &str = "DeviceId";
pub const DEVICE_PROPERTY_SCOPE: &str = "Scope";
pub const DEVICE_PROPERTY_OWNER: &str = "Owner";
pub const DEVICE_PROPERTY_SEAT: &str = "Seat";
pub const DEVICE_PROPERTY_PROFILING_INHIBITORS: &str = "ProfilingInhibitors";
pub const DEVICE_PROPERTY_ENABLED: &str = "Enabled";
pub const DEVICE_PROPERTY_EMBEDDED: &str = "Embedded";

// Device metadata
pub const DEVICE_METADATA_XRANDR_NAME: &str = "XRANDR_name";
pub const DEVICE_METADATA_OUTPUT_EDID_MD5: &str = "OutputEdidMd5";
pub const DEVICE_METADATA_OUTPUT_PRIORITY: &str = "OutputPriority";
pub const DEVICE_METADATA_OWNER_CMDLINE: &str = "OwnerCmdline";

// Profile properties
pub const PROFILE_PROPERTY_FILENAME: &str = "Filename";
pub const PROFILE_PROPERTY_QUALIFIER: &str = "Qualifier";
pub const PROFILE_PROPERTY_FORMAT: &str = "Format";
pub const PROFILE_PROPERTY_COLORSPACE: &str = "Colorspace";
pub const PROFILE_PROPERTY_TITLE: &str = "Title";
pub const PROFILE_PROPERTY_KIND: &str = "Kind";
pub const PROFILE_PROPERTY_CREATED: &str = "Created";
pub const PROFILE_PROPERTY_HAS_VCGT: &str = "HasVcgt";
pub const PROFILE_PROPERTY_IS_SYSTEM_WIDE: &str = "IsSystemWide";
pub const PROFILE_PROPERTY_METADATA: &str = "Metadata";
pub const PROFILE_PROPERTY_ID: &str = "ProfileId";
pub const PROFILE_PROPERTY_SCOPE: &str = "Scope";
pub const PROFILE_PROPERTY_OWNER: &str = "Owner";
pub const PROFILE_PROPERTY_WARNINGS: &str = "Warnings";

// Profile metadata
pub const PROFILE_METADATA_STANDARD_SPACE: &str = "STANDARD_space";
pub const PROFILE_METADATA_EDID_MD5: &str = "EDID_md5";
pub const PROFILE_METADATA_FILE_CHECKSUM: &str = "FILE_checksum";
pub const PROFILE_METADATA_DATA_SOURCE: &str = "DATA_source";
pub const PROFILE_METADATA_MAPPING_FORMAT: &str = "MAPPING_format";
pub const PROFILE_METADATA_MAPPING_QUALIFIER: &str = "MAPPING_qualifier";
pub const PROFILE_METADATA_MAPPING_DEVICE_ID: &str = "MAPPING_device_id";

// Sensor properties
pub const SENSOR_PROPERTY_LOCKED: &str = "Locked";

// Storage
pub const DEFAULT_DATABASE_DIR: &str = "/var/lib/colord";
pub const MAPPING_DB_FILENAME: &str = "mapping.db";
pub const STORAGE_DB_FILENAME: &str = "storage.db";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/colord.toml";
pub const DEFAULT_SOCKET_PATH: &str = "/run/colord/colord.sock";
pub const SOCKET_FILENAME: &str = "colord.sock";

// Profile search
pub const SYSTEM_PROFILE_DIRS: [&str; 3] = [
    "/usr/share/color/icc",
    "/usr/local/share/color/icc",
    "/Library/ColorSync/Profiles/Displays",
];
pub const MACHINE_PROFILE_DIR: &str = "/var/lib/color/icc";
pub const SYSTEM_WIDE_PREFIXES: [&str; 2] = ["/usr/share/color", "/var/lib/color"];
pub const CANONICAL_PROFILES_FILE: &str = "resources/canonical-profiles.json";
pub const DEFAULT_RESCAN_INTERVAL_SECS: u64 = 5;

// System
pub const DEFAULT_SEAT: &str = "seat0";
pub const DMI_ROOT: &str = "/sys/class/dmi/id";
pub const DRM_ROOT: &str = "/sys/class/drm";

// Limits
pub const PROPERTY_KEY_LEN_MAX: usize = 128;
pub const PROPERTY_VALUE_LEN_MAX: usize = 4096;
pub const IPC_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

// Sensor samples carry this for channels a measurement did not produce
pub const SAMPLE_NO_VALUE: f64 = -1.0;
