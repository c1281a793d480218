// Canonical profile score table
// Loads resources/canonical-profiles.json: well-known profiles, identified by
// checksum, that should win standard-space lookups. The daemon works without it.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants::CANONICAL_PROFILES_FILE;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct CanonicalEntry {
    checksum: String,
    #[serde(default)]
    title: Option<String>,
    score: u32,
}

#[derive(Debug, Default, Clone)]
pub struct CanonicalScores {
    scores: HashMap<String, u32>,
}

impl CanonicalScores {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the table from a JSON file. A missing file gives an empty table.
    pub fn load(json_path: &Path) -> Result<Self> {
        if !json_path.exists() {
            return Ok(Self::empty());
        }

        let content = std::fs::read_to_string(json_path)?;
        let entries: Vec<CanonicalEntry> = serde_json::from_str(&content)?;

        let mut scores = HashMap::new();
        for entry in entries {
            log::debug!(
                "Canonical profile {} ({}) scores {}",
                entry.checksum,
                entry.title.as_deref().unwrap_or("untitled"),
                entry.score
            );
            scores.insert(entry.checksum.to_lowercase(), entry.score);
        }
        Ok(Self { scores })
    }

    /// Try the configured path, then the known install locations
    pub fn auto_load(configured: Option<&Path>) -> Self {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = configured {
            candidates.push(path.to_path_buf());
        }
        candidates.push(PathBuf::from(CANONICAL_PROFILES_FILE));
        if let Some(dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
            candidates.push(dir.join(CANONICAL_PROFILES_FILE));
        }
        candidates.push(PathBuf::from("/usr/share/colord").join(CANONICAL_PROFILES_FILE));

        for path in &candidates {
            if !path.exists() {
                continue;
            }
            match Self::load(path) {
                Ok(table) => {
                    log::info!("Loaded {} canonical profile scores from {}", table.len(), path.display());
                    return table;
                }
                Err(e) => log::warn!("Failed to parse {}: {}", path.display(), e),
            }
        }
        Self::empty()
    }

    pub fn score_for(&self, checksum: &str) -> Option<u32> {
        self.scores.get(&checksum.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    #[cfg(test)]
    pub fn with_entries(entries: &[(&str, u32)]) -> Self {
        Self {
            scores: entries.iter().map(|(c, s)| (c.to_lowercase(), *s)).collect(),
        }
    }
}
