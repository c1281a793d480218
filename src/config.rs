// Daemon configuration
// Loaded from a TOML file; every field has a default so a missing file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_CONFIG_PATH, DEFAULT_DATABASE_DIR, DEFAULT_RESCAN_INTERVAL_SECS, DEFAULT_SOCKET_PATH,
    MACHINE_PROFILE_DIR, SOCKET_FILENAME, SYSTEM_PROFILE_DIRS,
};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub daemon: DaemonConfig,
    pub profiles: ProfilesConfig,
    pub plugins: PluginsConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory holding mapping.db and storage.db
    pub database_dir: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub create_dummy_sensor: bool,
    /// `None` enables it automatically when two outputs report the same EDID
    pub always_use_xrandr_name: Option<bool>,
    /// How often the camera plugin rescans sysfs
    pub rescan_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            database_dir: None,
            socket_path: None,
            create_dummy_sensor: false,
            always_use_xrandr_name: None,
            rescan_interval_secs: DEFAULT_RESCAN_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    pub search_system: Vec<PathBuf>,
    pub machine_dir: PathBuf,
    /// Allow loading a client-named file without a passed descriptor
    pub fd_fallback: bool,
    pub canonical_scores: Option<PathBuf>,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            search_system: SYSTEM_PROFILE_DIRS.iter().map(PathBuf::from).collect(),
            machine_dir: PathBuf::from(MACHINE_PROFILE_DIR),
            fd_fallback: false,
            canonical_scores: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    pub disabled: Vec<String>,
    pub sysfs_root: PathBuf,
    pub udev_data_dir: PathBuf,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            sysfs_root: PathBuf::from("/sys"),
            udev_data_dir: PathBuf::from("/run/udev/data"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Actions granted to unprivileged callers
    pub allowed_actions: Vec<String>,
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        Self::load(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Resolved database directory. Unprivileged runs use the per-user data dir.
    pub fn database_dir(&self) -> PathBuf {
        if let Some(dir) = &self.daemon.database_dir {
            return dir.clone();
        }
        if nix::unistd::getuid().is_root() {
            return PathBuf::from(DEFAULT_DATABASE_DIR);
        }
        directories::ProjectDirs::from("org", "freedesktop", "colord")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_DIR))
    }

    pub fn socket_path(&self) -> PathBuf {
        if let Some(path) = &self.daemon.socket_path {
            return path.clone();
        }
        if nix::unistd::getuid().is_root() {
            return PathBuf::from(DEFAULT_SOCKET_PATH);
        }
        directories::BaseDirs::new()
            .and_then(|dirs| dirs.runtime_dir().map(|d| d.join(SOCKET_FILENAME)))
            .unwrap_or_else(|| std::env::temp_dir().join(SOCKET_FILENAME))
    }

    pub fn plugin_disabled(&self, name: &str) -> bool {
        self.plugins.disabled.iter().any(|p| p == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert!(!config.daemon.create_dummy_sensor);
        assert_eq!(config.daemon.rescan_interval_secs, DEFAULT_RESCAN_INTERVAL_SECS);
        assert_eq!(config.profiles.search_system.len(), 3);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("colord.toml");
        std::fs::write(
            &path,
            "[daemon]\ncreate_dummy_sensor = true\n\n[plugins]\ndisabled = [\"camera\"]\n",
        )
        .unwrap();
        let config = Config::load(&path).unwrap();
        assert!(config.daemon.create_dummy_sensor);
        assert!(config.plugin_disabled("camera"));
        assert_eq!(config.profiles.machine_dir, PathBuf::from(MACHINE_PROFILE_DIR));
    }

    #[test]
    fn test_bad_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("colord.toml");
        std::fs::write(&path, "[daemon\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
