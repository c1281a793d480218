// Sender lifecycle monitor
// Ties objects to the client connection that created them. When the connection
// goes away every watch on it resolves into one invalidation target.

use std::collections::BTreeMap;

pub type WatchId = u64;

/// What to tear down when a sender vanishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    Device { object_path: String },
    Profile { object_path: String },
    Inhibit { device_path: String },
    SensorLock { object_path: String },
}

#[derive(Debug, Default)]
pub struct SenderWatcher {
    next_id: WatchId,
    watches: BTreeMap<String, Vec<(WatchId, WatchTarget)>>,
}

impl SenderWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&mut self, sender: &str, target: WatchTarget) -> WatchId {
        self.next_id += 1;
        let id = self.next_id;
        log::debug!("Watching {} for {:?}", sender, target);
        self.watches
            .entry(sender.to_string())
            .or_default()
            .push((id, target));
        id
    }

    /// Cancel a single watch. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: WatchId) -> bool {
        let mut found = false;
        self.watches.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|(watch_id, _)| *watch_id != id);
            found |= entries.len() != before;
            !entries.is_empty()
        });
        found
    }

    /// Cancel the first watch on `sender` matching `target`
    pub fn cancel_target(&mut self, sender: &str, target: &WatchTarget) -> bool {
        let id = self
            .watches
            .get(sender)
            .and_then(|entries| entries.iter().find(|(_, t)| t == target).map(|(id, _)| *id));
        match id {
            Some(id) => self.cancel(id),
            None => false,
        }
    }

    /// Drain every watch on a sender. An unknown sender yields nothing.
    pub fn vanished(&mut self, sender: &str) -> Vec<WatchTarget> {
        self.watches
            .remove(sender)
            .map(|entries| entries.into_iter().map(|(_, target)| target).collect())
            .unwrap_or_default()
    }

    pub fn is_watched(&self, sender: &str) -> bool {
        self.watches.contains_key(sender)
    }
}
