// Color profile entity
// A profile is registered once its id is known; parsed fields are filled from a
// decoder exactly once, from a passed descriptor or from its file.

pub mod canonical;
pub mod icc;
pub mod monitor;
pub mod store;

#[cfg(test)]
mod tests;

use md5::{Digest, Md5};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::db::ProfileDb;
use crate::enums::{Colorspace, ObjectScope, ProfileKind, ProfileWarning};
use crate::error::{ColordError, Result};
use crate::system::sanitize_object_path;

use canonical::CanonicalScores;

/// Decodes raw profile bytes. Implementations must not touch the filesystem.
pub trait ProfileDecoder: Send {
    fn decode(&self, data: &[u8]) -> Result<ParsedProfile>;
}

/// Decoder output, applied to a profile in one step
#[derive(Debug, Clone, Default)]
pub struct ParsedProfile {
    pub title: Option<String>,
    pub kind: ProfileKind,
    pub colorspace: Colorspace,
    /// Header profile id as lowercase hex, when the header carries one
    pub checksum: Option<String>,
    pub warnings: Vec<ProfileWarning>,
    pub has_vcgt: bool,
    pub created: i64,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    id: String,
    object_path: String,
    owner: u32,
    scope: ObjectScope,
    filename: Option<PathBuf>,
    qualifier: Option<String>,
    format: Option<String>,
    title: Option<String>,
    kind: ProfileKind,
    colorspace: Colorspace,
    checksum: Option<String>,
    warnings: Vec<ProfileWarning>,
    has_vcgt: bool,
    is_system_wide: bool,
    created: i64,
    metadata: BTreeMap<String, String>,
    #[serde(skip)]
    parsed: bool,
}

/// Object path for an id; non-root owners get their uid appended
pub fn profile_object_path(id: &str, owner: u32) -> String {
    if owner == 0 {
        format!("{}/{}", PROFILES_PATH, sanitize_object_path(id))
    } else {
        format!("{}/{}_{}", PROFILES_PATH, sanitize_object_path(id), owner)
    }
}

/// `edid-<md5>.icc` names carry the EDID checksum of the display they were made for
fn fake_edid_md5(filename: &Path) -> Option<String> {
    let basename = filename.file_name()?.to_str()?;
    if basename.len() != 41 {
        return None;
    }
    let re = regex::Regex::new(r"^edid-([0-9a-fA-F]{32})\.[A-Za-z]{3}$").ok()?;
    re.captures(basename).map(|caps| caps[1].to_string())
}

/// Make decoder titles presentable: drop a trailing " (2010-...)" and any file extension
pub fn fixup_title(title: &str) -> String {
    let mut out = match title.find(" (201") {
        Some(idx) => title[..idx].to_string(),
        None => title.to_string(),
    };
    let extensions = [".icc", ".ICC", ".icm", ".ICM"];
    if out.len() > 4 && extensions.iter().any(|ext| out.ends_with(ext)) {
        out.truncate(out.len() - 4);
    }
    out
}

impl Profile {
    pub fn new(id: &str, owner: u32, scope: ObjectScope) -> Self {
        Self {
            id: id.to_string(),
            object_path: profile_object_path(id, owner),
            owner,
            scope,
            filename: None,
            qualifier: None,
            format: None,
            title: None,
            kind: ProfileKind::Unknown,
            colorspace: Colorspace::Unknown,
            checksum: None,
            warnings: Vec::new(),
            has_vcgt: false,
            is_system_wide: false,
            created: 0,
            metadata: BTreeMap::new(),
            parsed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: &str) {
        self.id = id.to_string();
        self.object_path = profile_object_path(id, self.owner);
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn owner(&self) -> u32 {
        self.owner
    }

    pub fn scope(&self) -> ObjectScope {
        self.scope
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn set_qualifier(&mut self, qualifier: &str) {
        self.qualifier = Some(qualifier.to_string());
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn set_format(&mut self, format: &str) {
        self.format = Some(format.to_string());
    }

    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn warnings(&self) -> &[ProfileWarning] {
        &self.warnings
    }

    pub fn has_vcgt(&self) -> bool {
        self.has_vcgt
    }

    pub fn is_system_wide(&self) -> bool {
        self.is_system_wide
    }

    pub fn set_system_wide(&mut self, system_wide: bool) {
        self.is_system_wide = system_wide;
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn metadata_item(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata_item(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Value of a typed property or, failing that, a metadata entry
    pub fn property_value(&self, key: &str) -> Option<String> {
        match key {
            PROFILE_PROPERTY_ID => Some(self.id.clone()),
            PROFILE_PROPERTY_FILENAME => self.filename.as_ref().map(|p| p.display().to_string()),
            PROFILE_PROPERTY_QUALIFIER => self.qualifier.clone(),
            PROFILE_PROPERTY_FORMAT => self.format.clone(),
            PROFILE_PROPERTY_TITLE => self.title.clone(),
            PROFILE_PROPERTY_KIND => Some(self.kind.to_string()),
            PROFILE_PROPERTY_COLORSPACE => Some(self.colorspace.to_string()),
            _ => self.metadata.get(key).cloned(),
        }
    }

    /// Decoder title, without any per-user override
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Title as seen by `uid`: a stored override wins over the decoder title
    pub fn title_for(&self, uid: u32, db: &ProfileDb) -> Result<Option<String>> {
        if let Some(title) = db.get_property(&self.id, PROFILE_PROPERTY_TITLE, uid)? {
            return Ok(Some(title));
        }
        Ok(self.title.clone())
    }

    /// 2 for system-wide installs, the canonical table for well-known profiles, else 1
    pub fn score(&self, canonical: &CanonicalScores) -> u32 {
        if self.is_system_wide {
            return 2;
        }
        self.checksum
            .as_deref()
            .and_then(|checksum| canonical.score_for(checksum))
            .unwrap_or(1)
    }

    /// Point the profile at a file and parse it unless already parsed.
    /// Non-system files are only opened by the daemon when `may_open` is set.
    pub fn load_from_file(&mut self, path: &Path, decoder: &dyn ProfileDecoder, may_open: bool) -> Result<()> {
        self.filename = Some(path.to_path_buf());

        if !self.metadata.contains_key(PROFILE_METADATA_EDID_MD5) {
            if let Some(md5) = fake_edid_md5(path) {
                self.metadata.insert(PROFILE_METADATA_EDID_MD5.to_string(), md5);
            }
        }

        if self.parsed {
            log::debug!("profile '{}' already set", self.object_path);
            return Ok(());
        }

        if !self.is_system_wide && !may_open {
            return Err(ColordError::Internal(format!(
                "Failed to open {} as client did not send FD and fd fallback is disabled",
                path.display()
            )));
        }

        let data = std::fs::read(path)?;
        self.load_from_bytes(&data, decoder)
    }

    /// Parse profile contents. A profile is only ever parsed once.
    pub fn load_from_bytes(&mut self, data: &[u8], decoder: &dyn ProfileDecoder) -> Result<()> {
        if self.parsed {
            return Err(ColordError::Internal(format!(
                "profile '{}' already set",
                self.object_path
            )));
        }
        let parsed = decoder.decode(data)?;
        self.apply_parsed(parsed, data);
        Ok(())
    }

    fn apply_parsed(&mut self, parsed: ParsedProfile, data: &[u8]) {
        self.title = parsed.title.as_deref().map(fixup_title);
        self.kind = parsed.kind;
        self.colorspace = parsed.colorspace;
        self.warnings = parsed.warnings;
        self.has_vcgt = parsed.has_vcgt;
        self.created = parsed.created;
        self.metadata.extend(parsed.metadata);

        if let Some(format) = self.metadata.get(PROFILE_METADATA_MAPPING_FORMAT).cloned() {
            self.format = Some(format);
        }
        if let Some(qualifier) = self.metadata.get(PROFILE_METADATA_MAPPING_QUALIFIER).cloned() {
            self.qualifier = Some(qualifier);
        }
        if self.colorspace == Colorspace::Rgb && self.qualifier.is_none() {
            self.format = Some("ColorSpace..".to_string());
            self.qualifier = Some("RGB..".to_string());
        }

        self.checksum = parsed.checksum.or_else(|| {
            self.metadata
                .get(PROFILE_METADATA_FILE_CHECKSUM)
                .filter(|value| value.len() == 32)
                .cloned()
        });
        if self.checksum.is_none() {
            log::debug!("{} has no profile id nor {}, hashing contents", self.id, PROFILE_METADATA_FILE_CHECKSUM);
            self.checksum = Some(format!("{:x}", Md5::digest(data)));
        }

        self.parsed = true;
    }

    /// Apply a client property. Returns the names of the properties that changed.
    pub fn set_property(
        &mut self,
        key: &str,
        value: &str,
        decoder: &dyn ProfileDecoder,
        may_open: bool,
    ) -> Result<Vec<&'static str>> {
        if key.len() > PROPERTY_KEY_LEN_MAX || value.len() > PROPERTY_VALUE_LEN_MAX {
            return Err(ColordError::InputInvalid(format!("property {} too long", key)));
        }
        match key {
            PROFILE_PROPERTY_FILENAME => {
                self.load_from_file(Path::new(value), decoder, may_open)?;
                Ok(vec![
                    PROFILE_PROPERTY_FILENAME,
                    PROFILE_PROPERTY_TITLE,
                    PROFILE_PROPERTY_KIND,
                    PROFILE_PROPERTY_COLORSPACE,
                    PROFILE_PROPERTY_HAS_VCGT,
                    PROFILE_PROPERTY_METADATA,
                    PROFILE_PROPERTY_QUALIFIER,
                    PROFILE_PROPERTY_FORMAT,
                    PROFILE_PROPERTY_CREATED,
                ])
            }
            PROFILE_PROPERTY_QUALIFIER => {
                self.set_qualifier(value);
                Ok(vec![PROFILE_PROPERTY_QUALIFIER])
            }
            PROFILE_PROPERTY_FORMAT => {
                self.set_format(value);
                Ok(vec![PROFILE_PROPERTY_FORMAT])
            }
            PROFILE_PROPERTY_COLORSPACE => {
                self.colorspace = Colorspace::from_str_lossy(value);
                Ok(vec![PROFILE_PROPERTY_COLORSPACE])
            }
            _ => {
                self.set_metadata_item(key, value);
                Ok(vec![PROFILE_PROPERTY_METADATA])
            }
        }
    }

    /// Copy the profile file into the machine profile directory
    pub fn install_system_wide(&self, machine_dir: &Path) -> Result<PathBuf> {
        let filename = self
            .filename
            .as_deref()
            .ok_or_else(|| ColordError::Internal("icc filename not set".to_string()))?;

        if filename.starts_with(machine_dir) || filename.starts_with(SYSTEM_WIDE_PREFIXES[1]) {
            return Err(ColordError::AlreadyInstalled(format!(
                "file {} already installed in /var",
                filename.display()
            )));
        }
        if filename.starts_with(SYSTEM_WIDE_PREFIXES[0]) {
            return Err(ColordError::AlreadyInstalled(format!(
                "file {} already installed in /usr",
                filename.display()
            )));
        }

        let basename = filename
            .file_name()
            .ok_or_else(|| ColordError::InputInvalid(format!("{} has no file name", filename.display())))?;
        std::fs::create_dir_all(machine_dir)?;
        let dest = machine_dir.join(basename);
        std::fs::copy(filename, &dest)
            .map_err(|e| ColordError::Internal(format!("failed to copy: {}", e)))?;
        log::info!("Installed {} as {}", filename.display(), dest.display());
        Ok(dest)
    }
}
