// Minimal ICC decoder
// Reads the 128-byte header and the tag table: class, data colorspace, creation
// date, profile id, description, vcgt presence and the `meta` dictionary.

use std::collections::{BTreeMap, HashMap};

use super::{ParsedProfile, ProfileDecoder};
use crate::enums::{Colorspace, ProfileKind, ProfileWarning};
use crate::error::{ColordError, Result};

const HEADER_SIZE: usize = 128;
const TAG_ENTRY_SIZE: usize = 12;

pub struct IccDecoder;

fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn profile_kind(class: &[u8]) -> ProfileKind {
    match class {
        b"scnr" => ProfileKind::InputDevice,
        b"mntr" => ProfileKind::DisplayDevice,
        b"prtr" => ProfileKind::OutputDevice,
        b"link" => ProfileKind::Devicelink,
        b"spac" => ProfileKind::ColorspaceConversion,
        b"abst" => ProfileKind::Abstract,
        b"nmcl" => ProfileKind::NamedColor,
        _ => ProfileKind::Unknown,
    }
}

fn data_colorspace(space: &[u8]) -> Colorspace {
    match space {
        b"XYZ " => Colorspace::Xyz,
        b"Lab " => Colorspace::Lab,
        b"Luv " => Colorspace::Luv,
        b"YCbr" => Colorspace::Ycbcr,
        b"Yxy " => Colorspace::Yxy,
        b"RGB " => Colorspace::Rgb,
        b"GRAY" => Colorspace::Gray,
        b"HSV " => Colorspace::Hsv,
        b"CMYK" => Colorspace::Cmyk,
        b"CMY " => Colorspace::Cmy,
        _ => Colorspace::Unknown,
    }
}

fn creation_time(data: &[u8]) -> i64 {
    let field = |i: usize| be_u16(data, 24 + i * 2).map(u32::from);
    let (Some(year), Some(month), Some(day), Some(hour), Some(minute), Some(second)) =
        (field(0), field(1), field(2), field(3), field(4), field(5))
    else {
        return 0;
    };
    chrono::NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn profile_id(data: &[u8]) -> Option<String> {
    let id = data.get(84..100)?;
    if id.iter().all(|b| *b == 0) {
        return None;
    }
    Some(id.iter().map(|b| format!("{:02x}", b)).collect())
}

fn utf16be(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

fn ascii(data: &[u8]) -> String {
    String::from_utf8_lossy(data).trim_end_matches('\0').trim_end().to_string()
}

/// Text from a `desc`, `mluc` or `text` typed tag. `mluc` prefers English.
fn tag_text(tag: &[u8]) -> Option<String> {
    match tag.get(0..4)? {
        b"desc" => {
            let count = be_u32(tag, 8)? as usize;
            Some(ascii(tag.get(12..12 + count)?))
        }
        b"text" => Some(ascii(tag.get(8..)?)),
        b"mluc" => {
            let records = be_u32(tag, 8)? as usize;
            let record_size = be_u32(tag, 12)? as usize;
            if record_size < 12 {
                return None;
            }
            let mut chosen = None;
            for i in 0..records {
                let base = 16 + i * record_size;
                let lang = tag.get(base..base + 2)?;
                let len = be_u32(tag, base + 4)? as usize;
                let off = be_u32(tag, base + 8)? as usize;
                if chosen.is_none() || lang == b"en" {
                    chosen = Some((off, len));
                }
                if lang == b"en" {
                    break;
                }
            }
            let (off, len) = chosen?;
            Some(utf16be(tag.get(off..off + len)?))
        }
        _ => None,
    }
}

/// Entries of a `dict` typed tag, offsets relative to the tag start
fn tag_dict(tag: &[u8]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if tag.get(0..4) != Some(b"dict".as_slice()) {
        return out;
    }
    let (Some(count), Some(record_len)) = (be_u32(tag, 8), be_u32(tag, 12)) else {
        return out;
    };
    let record_len = record_len as usize;
    if !matches!(record_len, 16 | 24 | 32) {
        return out;
    }
    for i in 0..count as usize {
        let base = 16 + i * record_len;
        let fields = (
            be_u32(tag, base),
            be_u32(tag, base + 4),
            be_u32(tag, base + 8),
            be_u32(tag, base + 12),
        );
        let (Some(name_off), Some(name_len), Some(value_off), Some(value_len)) = fields else {
            break;
        };
        let name = tag.get(name_off as usize..(name_off + name_len) as usize);
        let value = tag.get(value_off as usize..(value_off + value_len) as usize);
        if let (Some(name), Some(value)) = (name, value) {
            out.insert(utf16be(name), utf16be(value));
        }
    }
    out
}

impl ProfileDecoder for IccDecoder {
    fn decode(&self, data: &[u8]) -> Result<ParsedProfile> {
        if data.len() < HEADER_SIZE + 4 {
            return Err(ColordError::InputInvalid("profile too small".to_string()));
        }
        if &data[36..40] != b"acsp" {
            return Err(ColordError::InputInvalid("not an ICC profile".to_string()));
        }
        let declared = be_u32(data, 0).unwrap_or(0) as usize;
        if declared > data.len() {
            return Err(ColordError::InputInvalid(format!(
                "profile truncated: header says {} bytes, got {}",
                declared,
                data.len()
            )));
        }

        let mut tags: HashMap<[u8; 4], &[u8]> = HashMap::new();
        let count = be_u32(data, HEADER_SIZE).unwrap_or(0) as usize;
        for i in 0..count {
            let entry = HEADER_SIZE + 4 + i * TAG_ENTRY_SIZE;
            let (Some(sig), Some(offset), Some(size)) = (
                data.get(entry..entry + 4),
                be_u32(data, entry + 4),
                be_u32(data, entry + 8),
            ) else {
                break;
            };
            let Some(body) = data.get(offset as usize..offset as usize + size as usize) else {
                log::debug!("Tag {} points outside the profile", String::from_utf8_lossy(sig));
                continue;
            };
            tags.insert([sig[0], sig[1], sig[2], sig[3]], body);
        }

        let title = tags.get(b"desc").and_then(|tag| tag_text(tag)).filter(|t| !t.is_empty());

        let mut warnings = Vec::new();
        if !tags.contains_key(b"cprt") {
            warnings.push(ProfileWarning::CopyrightMissing);
        }
        if title.is_none() {
            warnings.push(ProfileWarning::DescriptionMissing);
        }

        Ok(ParsedProfile {
            title,
            kind: profile_kind(&data[12..16]),
            colorspace: data_colorspace(&data[16..20]),
            checksum: profile_id(data),
            warnings,
            has_vcgt: tags.contains_key(b"vcgt"),
            created: creation_time(data),
            metadata: tags.get(b"meta").map(|tag| tag_dict(tag)).unwrap_or_default(),
        })
    }
}

/// Assemble a small but valid profile for tests
#[cfg(test)]
pub(crate) fn build_test_profile(
    class: &[u8; 4],
    space: &[u8; 4],
    description: Option<&str>,
    metadata: &[(&str, &str)],
    profile_id: Option<[u8; 16]>,
) -> Vec<u8> {
    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    let mut tags: Vec<([u8; 4], Vec<u8>)> = Vec::new();
    if let Some(text) = description {
        let mut tag = b"desc\0\0\0\0".to_vec();
        tag.extend(((text.len() + 1) as u32).to_be_bytes());
        tag.extend(text.as_bytes());
        tag.push(0);
        tags.push((*b"desc", tag));
    }
    let mut cprt = b"text\0\0\0\0".to_vec();
    cprt.extend(b"Public domain\0");
    tags.push((*b"cprt", cprt));
    if !metadata.is_empty() {
        let record_len = 16usize;
        let mut tag = b"dict\0\0\0\0".to_vec();
        tag.extend((metadata.len() as u32).to_be_bytes());
        tag.extend((record_len as u32).to_be_bytes());
        let mut strings: Vec<u8> = Vec::new();
        let strings_base = 16 + metadata.len() * record_len;
        for (name, value) in metadata {
            let name = utf16(name);
            let value = utf16(value);
            let name_off = strings_base + strings.len();
            strings.extend(&name);
            let value_off = strings_base + strings.len();
            strings.extend(&value);
            for n in [name_off, name.len(), value_off, value.len()] {
                tag.extend((n as u32).to_be_bytes());
            }
        }
        tag.extend(strings);
        tags.push((*b"meta", tag));
    }

    let table_len = 4 + tags.len() * TAG_ENTRY_SIZE;
    let mut body = Vec::new();
    let mut table = (tags.len() as u32).to_be_bytes().to_vec();
    for (sig, tag) in &tags {
        let offset = HEADER_SIZE + table_len + body.len();
        table.extend(sig);
        table.extend((offset as u32).to_be_bytes());
        table.extend((tag.len() as u32).to_be_bytes());
        body.extend(tag);
        while body.len() % 4 != 0 {
            body.push(0);
        }
    }

    let mut header = vec![0u8; HEADER_SIZE];
    let total = HEADER_SIZE + table.len() + body.len();
    header[0..4].copy_from_slice(&(total as u32).to_be_bytes());
    header[12..16].copy_from_slice(class);
    header[16..20].copy_from_slice(space);
    for (i, v) in [2014u16, 6, 15, 12, 30, 0].iter().enumerate() {
        header[24 + i * 2..26 + i * 2].copy_from_slice(&v.to_be_bytes());
    }
    header[36..40].copy_from_slice(b"acsp");
    if let Some(id) = profile_id {
        header[84..100].copy_from_slice(&id);
    }

    let mut out = header;
    out.extend(table);
    out.extend(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_header_and_tags() {
        let data = build_test_profile(
            b"mntr",
            b"RGB ",
            Some("Dell U2410 (2014-06-15)"),
            &[("MAPPING_device_id", "xrandr-DP-1"), ("DATA_source", "edid")],
            None,
        );
        let parsed = IccDecoder.decode(&data).unwrap();
        assert_eq!(parsed.kind, ProfileKind::DisplayDevice);
        assert_eq!(parsed.colorspace, Colorspace::Rgb);
        assert_eq!(parsed.title.as_deref(), Some("Dell U2410 (2014-06-15)"));
        assert!(parsed.warnings.is_empty());
        assert!(!parsed.has_vcgt);
        assert_eq!(parsed.checksum, None);
        assert_eq!(parsed.metadata.get("MAPPING_device_id").map(String::as_str), Some("xrandr-DP-1"));
        assert_eq!(parsed.metadata.get("DATA_source").map(String::as_str), Some("edid"));
        assert!(parsed.created > 0);
    }

    #[test]
    fn test_profile_id_becomes_checksum() {
        let mut id = [0u8; 16];
        id[0] = 0xab;
        id[15] = 0x01;
        let data = build_test_profile(b"prtr", b"CMYK", Some("Press"), &[], Some(id));
        let parsed = IccDecoder.decode(&data).unwrap();
        assert_eq!(parsed.checksum.as_deref(), Some("ab000000000000000000000000000001"));
        assert_eq!(parsed.kind, ProfileKind::OutputDevice);
        assert_eq!(parsed.colorspace, Colorspace::Cmyk);
    }

    #[test]
    fn test_missing_description_is_a_warning() {
        let data = build_test_profile(b"scnr", b"Lab ", None, &[], None);
        let parsed = IccDecoder.decode(&data).unwrap();
        assert_eq!(parsed.warnings, vec![ProfileWarning::DescriptionMissing]);
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_rejects_non_icc() {
        assert!(IccDecoder.decode(b"short").is_err());
        let mut data = build_test_profile(b"mntr", b"RGB ", Some("x"), &[], None);
        data[36..40].copy_from_slice(b"nope");
        assert!(IccDecoder.decode(&data).is_err());
    }

    #[test]
    fn test_mluc_prefers_english() {
        let mut tag = b"mluc\0\0\0\0".to_vec();
        tag.extend(2u32.to_be_bytes());
        tag.extend(12u32.to_be_bytes());
        let de: Vec<u8> = "Hallo".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let en: Vec<u8> = "Hello".encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let base = 16 + 2 * 12;
        tag.extend(b"deDE");
        tag.extend((de.len() as u32).to_be_bytes());
        tag.extend((base as u32).to_be_bytes());
        tag.extend(b"enUS");
        tag.extend((en.len() as u32).to_be_bytes());
        tag.extend(((base + de.len()) as u32).to_be_bytes());
        tag.extend(&de);
        tag.extend(&en);
        assert_eq!(tag_text(&tag).as_deref(), Some("Hello"));
    }
}
