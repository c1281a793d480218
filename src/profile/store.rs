// Profile directory store
// Scans the system and machine ICC directories and reports which files appeared
// or vanished, either against the previous full scan or for a batch of paths
// the file monitor saw change.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{Profile, ProfileDecoder};
use crate::config::Config;
use crate::constants::{PROFILE_METADATA_FILE_CHECKSUM, SYSTEM_WIDE_PREFIXES};
use crate::enums::ObjectScope;

#[derive(Debug)]
pub enum StoreChange {
    Added(Profile),
    Removed(PathBuf),
}

/// Files under these prefixes are readable by everyone and count as installed
pub fn is_system_wide_path(path: &Path) -> bool {
    SYSTEM_WIDE_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

#[derive(Debug, Default)]
pub struct ProfileStore {
    dirs: Vec<PathBuf>,
    /// filename -> checksum of every profile handed out
    known: BTreeMap<PathBuf, String>,
    /// Files whose checksum is already provided by a newer file
    shadowed: BTreeSet<PathBuf>,
}

impl ProfileStore {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            ..Default::default()
        }
    }

    /// System directories first, then the machine directory
    pub fn from_config(config: &Config) -> Self {
        let mut dirs = config.profiles.search_system.clone();
        dirs.push(config.profiles.machine_dir.clone());
        Self::new(dirs)
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    fn is_watched(&self, path: &Path) -> bool {
        self.dirs.iter().any(|dir| path.starts_with(dir))
    }

    fn is_temp_file(path: &Path) -> bool {
        path.to_string_lossy().contains(".goutputstream")
    }

    fn walk_files(dir: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read profile directory entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if Self::is_temp_file(path) {
                log::debug!("Ignoring temporary file {}", path.display());
                continue;
            }
            files.push(path.to_path_buf());
        }
        files
    }

    fn scan_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in &self.dirs {
            if !dir.exists() {
                log::debug!("Profile directory {} does not exist", dir.display());
                continue;
            }
            files.extend(Self::walk_files(dir));
        }
        files
    }

    fn load(path: &Path, decoder: &dyn ProfileDecoder) -> Option<Profile> {
        let mut profile = Profile::new("", 0, ObjectScope::Normal);
        profile.set_system_wide(is_system_wide_path(path));
        if let Err(e) = profile.load_from_file(path, decoder, true) {
            log::warn!("Failed to add profile '{}': {}", path.display(), e);
            return None;
        }
        let checksum = profile.checksum()?.to_string();
        profile.set_metadata_item(PROFILE_METADATA_FILE_CHECKSUM, &checksum);
        profile.set_id(&format!("icc-{}", checksum));
        Some(profile)
    }

    fn forget(&mut self, path: &Path, changes: &mut Vec<StoreChange>) {
        if self.known.remove(path).is_some() {
            log::debug!("{} removed, so invalidating", path.display());
            changes.push(StoreChange::Removed(path.to_path_buf()));
        }
    }

    /// Parse a file not handed out yet, replacing an older file with the same checksum
    fn admit(&mut self, path: &Path, decoder: &dyn ProfileDecoder, changes: &mut Vec<StoreChange>) {
        let Some(profile) = Self::load(path, decoder) else {
            return;
        };
        let checksum = profile.checksum().unwrap_or_default().to_string();

        let duplicate = self
            .known
            .iter()
            .find(|(_, known)| **known == checksum)
            .map(|(path, _)| path.clone());
        if let Some(old) = duplicate {
            log::debug!("{} duplicates {}, replacing", path.display(), old.display());
            self.known.remove(&old);
            self.shadowed.insert(old.clone());
            changes.push(StoreChange::Removed(old));
        }

        log::debug!("Parsed new profile '{}'", path.display());
        self.known.insert(path.to_path_buf(), checksum);
        changes.push(StoreChange::Added(profile));
    }

    /// Diff the directories against the previous scan
    pub fn rescan(&mut self, decoder: &dyn ProfileDecoder) -> Vec<StoreChange> {
        let found = self.scan_files();
        let present: BTreeSet<&PathBuf> = found.iter().collect();
        let mut changes = Vec::new();

        let vanished: Vec<PathBuf> = self
            .known
            .keys()
            .filter(|path| !present.contains(path))
            .cloned()
            .collect();
        for path in vanished {
            self.forget(&path, &mut changes);
        }
        self.shadowed.retain(|path| present.contains(path));

        for path in &found {
            if self.known.contains_key(path) || self.shadowed.contains(path) {
                continue;
            }
            self.admit(path, decoder, &mut changes);
        }

        changes
    }

    /// Re-examine paths reported by the file monitor. A path may be a file or
    /// a directory, and may no longer exist.
    pub fn update(&mut self, paths: &[PathBuf], decoder: &dyn ProfileDecoder) -> Vec<StoreChange> {
        let mut changes = Vec::new();
        let paths: BTreeSet<&PathBuf> = paths.iter().filter(|p| self.is_watched(p)).collect();

        for path in paths {
            if path.is_dir() {
                for file in Self::walk_files(path) {
                    if !self.known.contains_key(&file) && !self.shadowed.contains(&file) {
                        self.admit(&file, decoder, &mut changes);
                    }
                }
                continue;
            }

            if !path.is_file() {
                let gone: Vec<PathBuf> = self.known.keys().filter(|k| k.starts_with(path)).cloned().collect();
                for file in gone {
                    self.forget(&file, &mut changes);
                }
                self.shadowed.retain(|file| !file.starts_with(path));
                continue;
            }

            if Self::is_temp_file(path) || self.shadowed.contains(path) {
                continue;
            }
            if let Some(checksum) = self.known.get(path.as_path()).cloned() {
                // Rewritten in place: only a new checksum makes a new profile
                match Self::load(path, decoder) {
                    Some(profile) if profile.checksum() == Some(checksum.as_str()) => continue,
                    Some(_) => self.forget(path, &mut changes),
                    None => {
                        self.forget(path, &mut changes);
                        continue;
                    }
                }
            }
            self.admit(path, decoder, &mut changes);
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::icc::{build_test_profile, IccDecoder};
    use tempfile::TempDir;

    fn write_profile(dir: &Path, name: &str, title: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, build_test_profile(b"mntr", b"RGB ", Some(title), &[], None)).unwrap();
        path
    }

    fn added(changes: &[StoreChange]) -> Vec<String> {
        changes
            .iter()
            .filter_map(|c| match c {
                StoreChange::Added(p) => Some(p.filename().unwrap().display().to_string()),
                StoreChange::Removed(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_scan_adds_then_removes() {
        let dir = TempDir::new().unwrap();
        let a = write_profile(dir.path(), "a.icc", "A");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write_profile(&dir.path().join("nested"), "b.icc", "B");

        let mut store = ProfileStore::new(vec![dir.path().to_path_buf()]);
        let changes = store.rescan(&IccDecoder);
        assert_eq!(added(&changes).len(), 2);

        if let StoreChange::Added(profile) = &changes[0] {
            assert!(profile.id().starts_with("icc-"));
            assert_eq!(
                profile.metadata_item(PROFILE_METADATA_FILE_CHECKSUM),
                profile.checksum()
            );
            assert!(!profile.is_system_wide());
        }

        assert!(store.rescan(&IccDecoder).is_empty());

        std::fs::remove_file(&a).unwrap();
        let changes = store.rescan(&IccDecoder);
        assert!(matches!(&changes[..], [StoreChange::Removed(p)] if *p == a));
    }

    #[test]
    fn test_duplicate_checksum_replaces_without_flapping() {
        let dir = TempDir::new().unwrap();
        write_profile(dir.path(), "a.icc", "Same");
        let mut store = ProfileStore::new(vec![dir.path().to_path_buf()]);
        store.rescan(&IccDecoder);

        std::fs::copy(dir.path().join("a.icc"), dir.path().join("b.icc")).unwrap();
        let changes = store.rescan(&IccDecoder);
        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], StoreChange::Removed(p) if p.ends_with("a.icc")));
        assert!(matches!(&changes[1], StoreChange::Added(_)));

        assert!(store.rescan(&IccDecoder).is_empty());
    }

    #[test]
    fn test_ignores_junk_and_temp_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README"), b"not a profile").unwrap();
        write_profile(dir.path(), ".goutputstream-XYZ", "Temp");
        let mut store = ProfileStore::new(vec![dir.path().to_path_buf(), dir.path().join("missing")]);
        assert!(store.rescan(&IccDecoder).is_empty());
    }

    #[test]
    fn test_update_follows_reported_paths() {
        let dir = TempDir::new().unwrap();
        let mut store = ProfileStore::new(vec![dir.path().to_path_buf()]);
        assert!(store.rescan(&IccDecoder).is_empty());

        let a = write_profile(dir.path(), "a.icc", "A");
        let changes = store.update(&[a.clone(), a.clone()], &IccDecoder);
        assert_eq!(added(&changes), vec![a.display().to_string()]);

        // Same contents rewritten: nothing to report
        write_profile(dir.path(), "a.icc", "A");
        assert!(store.update(&[a.clone()], &IccDecoder).is_empty());

        // New contents at the same path replace the profile
        write_profile(dir.path(), "a.icc", "A2");
        let changes = store.update(&[a.clone()], &IccDecoder);
        assert!(matches!(&changes[..], [StoreChange::Removed(p), StoreChange::Added(_)] if *p == a));

        std::fs::remove_file(&a).unwrap();
        let changes = store.update(&[a.clone()], &IccDecoder);
        assert!(matches!(&changes[..], [StoreChange::Removed(p)] if *p == a));
    }

    #[test]
    fn test_update_walks_new_and_removed_directories() {
        let dir = TempDir::new().unwrap();
        let mut store = ProfileStore::new(vec![dir.path().to_path_buf()]);
        let nested = dir.path().join("vendor");
        std::fs::create_dir(&nested).unwrap();
        write_profile(&nested, "x.icc", "X");
        write_profile(&nested, "y.icc", "Y");

        let changes = store.update(&[nested.clone()], &IccDecoder);
        assert_eq!(added(&changes).len(), 2);

        std::fs::remove_dir_all(&nested).unwrap();
        let changes = store.update(&[nested.clone()], &IccDecoder);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| matches!(c, StoreChange::Removed(_))));

        // Paths outside the store are ignored
        let other = TempDir::new().unwrap();
        let outside = write_profile(other.path(), "z.icc", "Z");
        assert!(store.update(&[outside], &IccDecoder).is_empty());
    }

    #[test]
    fn test_system_wide_prefixes() {
        assert!(is_system_wide_path(Path::new("/usr/share/color/icc/sRGB.icc")));
        assert!(is_system_wide_path(Path::new("/var/lib/color/icc/x.icc")));
        assert!(!is_system_wide_path(Path::new("/home/user/.local/share/icc/x.icc")));
    }
}
