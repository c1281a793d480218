// Profile directory monitor
// Reports paths under the profile directories that were created, changed or
// removed. The store decides what each path means.

use notify::event::{EventKind, ModifyKind};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;

use crate::error::Result;

/// Keeps the watches alive; dropping it stops the reports
pub struct ProfileMonitor {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

/// Paths worth a store update, or nothing for reads and metadata-only changes
fn changed_paths(event: Event) -> Option<Vec<PathBuf>> {
    match event.kind {
        EventKind::Create(_)
        | EventKind::Remove(_)
        | EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Name(_))
        | EventKind::Modify(ModifyKind::Any) => Some(event.paths),
        _ => None,
    }
}

impl ProfileMonitor {
    /// Watch each existing directory recursively. `on_change` runs on the
    /// watcher's thread.
    pub fn start<F>(dirs: &[PathBuf], on_change: F) -> Result<Self>
    where
        F: Fn(Vec<PathBuf>) + Send + 'static,
    {
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if let Some(paths) = changed_paths(event) {
                        if !paths.is_empty() {
                            on_change(paths);
                        }
                    }
                }
                Err(e) => log::warn!("Profile monitor error: {}", e),
            },
            Config::default(),
        )?;

        let mut watched = Vec::new();
        for dir in dirs {
            if !dir.is_dir() {
                log::debug!("Not monitoring missing directory {}", dir.display());
                continue;
            }
            match watcher.watch(dir, RecursiveMode::Recursive) {
                Ok(()) => {
                    log::debug!("Monitoring {}", dir.display());
                    watched.push(dir.clone());
                }
                Err(e) => log::warn!("Unable to monitor {}: {}", dir.display(), e),
            }
        }

        Ok(Self {
            _watcher: watcher,
            watched,
        })
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_changed_paths_filters_kinds() {
        let create = event(EventKind::Create(CreateKind::File), "/icc/a.icc");
        assert_eq!(changed_paths(create), Some(vec![PathBuf::from("/icc/a.icc")]));
        let remove = event(EventKind::Remove(RemoveKind::File), "/icc/a.icc");
        assert!(changed_paths(remove).is_some());
        let write = event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), "/icc/a.icc");
        assert!(changed_paths(write).is_some());

        let chmod = event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)), "/icc/a.icc");
        assert!(changed_paths(chmod).is_none());
        assert!(changed_paths(event(EventKind::Access(AccessKind::Any), "/icc/a.icc")).is_none());
    }

    #[test]
    fn test_reports_new_file() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = mpsc::channel();
        let monitor = ProfileMonitor::start(
            &[dir.path().to_path_buf(), dir.path().join("missing")],
            move |paths| {
                let _ = tx.send(paths);
            },
        )
        .unwrap();
        assert_eq!(monitor.watched(), [dir.path().to_path_buf()]);

        let file = dir.path().join("screen.icc");
        std::fs::write(&file, b"profile").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while !seen && Instant::now() < deadline {
            if let Ok(paths) = rx.recv_timeout(Duration::from_millis(200)) {
                seen = paths.iter().any(|p| p.file_name() == file.file_name());
            }
        }
        assert!(seen);
    }
}
