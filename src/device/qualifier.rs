// Qualifier matching
// Qualifiers are three dotted parts, e.g. "RGB.Plain.300dpi". A "*" part on
// either side matches any value in that slot.

/// Does `pattern` select a profile carrying `qualifier`?
pub fn qualifier_matches(pattern: &str, qualifier: Option<&str>) -> bool {
    if pattern == "*" {
        return true;
    }
    let Some(qualifier) = qualifier else {
        return false;
    };

    let wanted: Vec<&str> = pattern.split('.').collect();
    let have: Vec<&str> = qualifier.split('.').collect();
    if wanted.len() != 3 || have.len() != 3 {
        return false;
    }

    wanted
        .iter()
        .zip(have.iter())
        .all(|(w, h)| *w == "*" || *h == "*" || w == h)
}
