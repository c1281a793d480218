// --- Profile entity tests: parsing fixups, checksums, titles, install ---

use super::icc::{build_test_profile, IccDecoder};
use super::*;
use rusqlite::Connection;
use tempfile::TempDir;

/// Decoder returning a fixed result, for exercising the parsed-field rules
struct StaticDecoder(ParsedProfile);

impl ProfileDecoder for StaticDecoder {
    fn decode(&self, _data: &[u8]) -> Result<ParsedProfile> {
        Ok(self.0.clone())
    }
}

fn rgb_parsed(title: &str) -> ParsedProfile {
    ParsedProfile {
        title: Some(title.to_string()),
        kind: ProfileKind::DisplayDevice,
        colorspace: Colorspace::Rgb,
        ..Default::default()
    }
}

// ---------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------

#[test]
fn test_title_fixups() {
    assert_eq!(fixup_title("Dell U2410 (2012-04-01)"), "Dell U2410");
    assert_eq!(fixup_title("sRGB.icc"), "sRGB");
    assert_eq!(fixup_title("WIDE.ICM"), "WIDE");
    assert_eq!(fixup_title(".icc"), ".icc");
    assert_eq!(fixup_title("Plain"), "Plain");
}

#[test]
fn test_rgb_gets_generic_qualifier() {
    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_bytes(b"x", &StaticDecoder(rgb_parsed("Screen"))).unwrap();
    assert_eq!(profile.qualifier(), Some("RGB.."));
    assert_eq!(profile.format(), Some("ColorSpace.."));
    assert_eq!(profile.title(), Some("Screen"));
    assert!(profile.is_parsed());
}

#[test]
fn test_mapping_metadata_seeds_format_and_qualifier() {
    let mut parsed = rgb_parsed("Print");
    parsed.metadata.insert(PROFILE_METADATA_MAPPING_FORMAT.into(), "ColorModel.OutputMode.OutputResolution".into());
    parsed.metadata.insert(PROFILE_METADATA_MAPPING_QUALIFIER.into(), "RGB.Plain.300dpi".into());

    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_bytes(b"x", &StaticDecoder(parsed)).unwrap();
    assert_eq!(profile.qualifier(), Some("RGB.Plain.300dpi"));
    assert_eq!(profile.format(), Some("ColorModel.OutputMode.OutputResolution"));
}

#[test]
fn test_parsed_fields_set_once() {
    let decoder = StaticDecoder(rgb_parsed("Screen"));
    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_bytes(b"x", &decoder).unwrap();

    let err = profile.load_from_bytes(b"x", &decoder).unwrap_err();
    assert_eq!(err.name(), "Internal");
    assert!(err.to_string().contains("already set"));
}

#[test]
fn test_checksum_precedence() {
    let mut with_id = rgb_parsed("a");
    with_id.checksum = Some("11111111111111111111111111111111".into());
    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_bytes(b"x", &StaticDecoder(with_id)).unwrap();
    assert_eq!(profile.checksum(), Some("11111111111111111111111111111111"));

    let mut with_md = rgb_parsed("b");
    with_md.metadata.insert(PROFILE_METADATA_FILE_CHECKSUM.into(), "22222222222222222222222222222222".into());
    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_bytes(b"x", &StaticDecoder(with_md)).unwrap();
    assert_eq!(profile.checksum(), Some("22222222222222222222222222222222"));

    let mut short_md = rgb_parsed("c");
    short_md.metadata.insert(PROFILE_METADATA_FILE_CHECKSUM.into(), "short".into());
    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_bytes(b"contents", &StaticDecoder(short_md)).unwrap();
    assert_eq!(profile.checksum(), Some("98bf7d8c15784f0a3d63204441e1e2aa"));
}

// ---------------------------------------------------------------
// Files
// ---------------------------------------------------------------

#[test]
fn test_edid_filename_sets_md5() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("edid-f467c2e85a0abdef9415d5028e240631.icc");
    std::fs::write(&path, build_test_profile(b"mntr", b"RGB ", Some("Auto"), &[], None)).unwrap();

    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_file(&path, &IccDecoder, true).unwrap();
    assert_eq!(
        profile.metadata_item(PROFILE_METADATA_EDID_MD5),
        Some("f467c2e85a0abdef9415d5028e240631")
    );
    assert_eq!(profile.filename(), Some(path.as_path()));
}

#[test]
fn test_file_open_requires_fallback_for_user_files() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mine.icc");
    std::fs::write(&path, build_test_profile(b"mntr", b"RGB ", Some("Mine"), &[], None)).unwrap();

    let mut profile = Profile::new("p", 1000, ObjectScope::Temp);
    assert!(profile.load_from_file(&path, &IccDecoder, false).is_err());
    assert!(!profile.is_parsed());

    profile.load_from_file(&path, &IccDecoder, true).unwrap();
    assert_eq!(profile.title(), Some("Mine"));
}

#[test]
fn test_filename_after_fd_does_not_reparse() {
    let data = build_test_profile(b"mntr", b"RGB ", Some("From fd"), &[], None);
    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_bytes(&data, &IccDecoder).unwrap();

    profile
        .load_from_file(Path::new("/nonexistent/display.icc"), &IccDecoder, false)
        .unwrap();
    assert_eq!(profile.title(), Some("From fd"));
    assert_eq!(profile.filename(), Some(Path::new("/nonexistent/display.icc")));
}

#[test]
fn test_install_system_wide() {
    let dir = TempDir::new().unwrap();
    let machine = dir.path().join("machine");
    let src = dir.path().join("user.icc");
    std::fs::write(&src, b"profile").unwrap();

    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    assert_eq!(profile.install_system_wide(&machine).unwrap_err().to_string(), "icc filename not set");

    profile.filename = Some(src.clone());
    let dest = profile.install_system_wide(&machine).unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"profile");

    profile.filename = Some(dest);
    assert_eq!(profile.install_system_wide(&machine).unwrap_err().name(), "AlreadyInstalled");

    profile.filename = Some(PathBuf::from("/usr/share/color/icc/sRGB.icc"));
    let err = profile.install_system_wide(&machine).unwrap_err();
    assert!(err.to_string().ends_with("already installed in /usr"));
}

// ---------------------------------------------------------------
// Properties, titles and score
// ---------------------------------------------------------------

#[test]
fn test_set_property_routes_keys() {
    let decoder = StaticDecoder(rgb_parsed("x"));
    let mut profile = Profile::new("p", 0, ObjectScope::Temp);

    assert_eq!(profile.set_property("Qualifier", "RGB.Glossy.600dpi", &decoder, false).unwrap(), vec!["Qualifier"]);
    assert_eq!(profile.qualifier(), Some("RGB.Glossy.600dpi"));

    assert_eq!(profile.set_property("Colorspace", "cmyk", &decoder, false).unwrap(), vec!["Colorspace"]);
    assert_eq!(profile.colorspace(), Colorspace::Cmyk);

    assert_eq!(profile.set_property("Vendor", "ACME", &decoder, false).unwrap(), vec!["Metadata"]);
    assert_eq!(profile.metadata_item("Vendor"), Some("ACME"));

    let long = "x".repeat(PROPERTY_VALUE_LEN_MAX + 1);
    assert_eq!(profile.set_property("Format", &long, &decoder, false).unwrap_err().name(), "InputInvalid");
}

#[test]
fn test_title_override_per_uid() {
    let db = ProfileDb::from_connection(Connection::open_in_memory().unwrap()).unwrap();
    let mut profile = Profile::new("p", 0, ObjectScope::Temp);
    profile.load_from_bytes(b"x", &StaticDecoder(rgb_parsed("Decoder"))).unwrap();

    db.set_property("p", PROFILE_PROPERTY_TITLE, 1000, "Custom").unwrap();
    assert_eq!(profile.title_for(1000, &db).unwrap().as_deref(), Some("Custom"));
    assert_eq!(profile.title_for(1001, &db).unwrap().as_deref(), Some("Decoder"));
}

#[test]
fn test_score() {
    let mut parsed = rgb_parsed("x");
    parsed.checksum = Some("33333333333333333333333333333333".into());
    let mut profile = Profile::new("p", 0, ObjectScope::Normal);
    profile.load_from_bytes(b"x", &StaticDecoder(parsed)).unwrap();

    assert_eq!(profile.score(&CanonicalScores::empty()), 1);
    let table = CanonicalScores::with_entries(&[("33333333333333333333333333333333", 7)]);
    assert_eq!(profile.score(&table), 7);

    profile.set_system_wide(true);
    assert_eq!(profile.score(&table), 2);
}

#[test]
fn test_object_path_includes_owner() {
    assert_eq!(Profile::new("icc-abc", 0, ObjectScope::Normal).object_path(), "/org/freedesktop/ColorManager/profiles/icc_abc");
    assert_eq!(Profile::new("my-prof", 1000, ObjectScope::Temp).object_path(), "/org/freedesktop/ColorManager/profiles/my_prof_1000");
}
