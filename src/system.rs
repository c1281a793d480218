// Host introspection helpers
// DMI identity, caller command lines, EDID duplicates and object path naming.

use std::collections::HashSet;
use std::path::Path;

use crate::quirk;

/// Replace everything outside [A-Za-z0-9_] so the id can be used as an object path element
pub fn sanitize_object_path(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Wall clock in microseconds, the unit used by the mapping store
pub fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

fn read_dmi_value(root: &Path, names: &[&str]) -> Option<String> {
    for name in names {
        let Ok(raw) = std::fs::read_to_string(root.join(name)) else {
            continue;
        };
        let line = raw.split(['\n', '\r']).next().unwrap_or_default();
        let cleaned: String = line
            .chars()
            .map(|c| if c == '\t' || c == '_' { ' ' } else { c })
            .collect();
        let cleaned = cleaned.trim_end();
        if !cleaned.is_empty() {
            return Some(cleaned.to_string());
        }
    }
    None
}

/// Machine vendor from DMI, normalized through the vendor quirk table
pub fn dmi_vendor(root: &Path) -> String {
    read_dmi_value(root, &["sys_vendor", "chassis_vendor", "board_vendor"])
        .map(|v| quirk::vendor_name(&v))
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn dmi_model(root: &Path) -> String {
    // ThinkPads keep the common name in the version field
    if let Some(version) = read_dmi_value(root, &["product_version"]) {
        if version.contains("ThinkPad") {
            return version;
        }
    }
    read_dmi_value(root, &["product_name", "board_name"]).unwrap_or_else(|| "Unknown".to_string())
}

/// Command line of a process with NUL separators turned into spaces
pub fn cmdline_for_pid(pid: u32) -> Option<String> {
    let raw = std::fs::read(format!("/proc/{}/cmdline", pid)).ok()?;
    let text: String = String::from_utf8_lossy(&raw)
        .chars()
        .map(|c| if c == '\0' { ' ' } else { c })
        .collect();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// True when two connected outputs report byte-identical EDID blobs
pub fn has_duplicate_edids(drm_root: &Path) -> bool {
    let Ok(entries) = std::fs::read_dir(drm_root) else {
        return false;
    };
    let mut seen = HashSet::new();
    for entry in entries.flatten() {
        let Ok(blob) = std::fs::read(entry.path().join("edid")) else {
            continue;
        };
        if blob.is_empty() {
            continue;
        }
        let digest = blake3::hash(&blob);
        if !seen.insert(digest) {
            log::info!("Duplicate EDID found on {}", entry.path().display());
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_object_path() {
        assert_eq!(sanitize_object_path("xrandr-Dell U2410"), "xrandr_Dell_U2410");
        assert_eq!(sanitize_object_path("icc_abc123"), "icc_abc123");
    }

    #[test]
    fn test_dmi_cleanup_and_quirks() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sys_vendor"), "LENOVO\n").unwrap();
        std::fs::write(dir.path().join("product_name"), "Think_Pad\tX1\nextra\n").unwrap();
        assert_eq!(dmi_vendor(dir.path()), "Lenovo");
        assert_eq!(dmi_model(dir.path()), "Think Pad X1");

        std::fs::write(dir.path().join("product_version"), "ThinkPad T480\n").unwrap();
        assert_eq!(dmi_model(dir.path()), "ThinkPad T480");
    }

    #[test]
    fn test_dmi_empty_falls_through() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sys_vendor"), "  \n").unwrap();
        std::fs::write(dir.path().join("board_vendor"), "Hughski Ltd.\n").unwrap();
        assert_eq!(dmi_vendor(dir.path()), "Hughski");
        assert_eq!(dmi_model(dir.path()), "Unknown");
    }

    #[test]
    fn test_duplicate_edids() {
        let dir = TempDir::new().unwrap();
        for (name, edid) in [("card0-DP-1", b"abc".as_slice()), ("card0-DP-2", b"xyz".as_slice())] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
            std::fs::write(dir.path().join(name).join("edid"), edid).unwrap();
        }
        assert!(!has_duplicate_edids(dir.path()));

        std::fs::create_dir(dir.path().join("card0-HDMI-1")).unwrap();
        std::fs::write(dir.path().join("card0-HDMI-1").join("edid"), b"abc").unwrap();
        assert!(has_duplicate_edids(dir.path()));
    }

    #[test]
    fn test_cmdline_for_self() {
        let cmdline = cmdline_for_pid(std::process::id());
        assert!(cmdline.is_some());
    }
}
