//! Download filename conventions.

/// Prefix for individually downloaded images.
pub const INDIVIDUAL_PREFIX: &str = "creative-output";

/// Replace anything that is not safe in a filename with `-`, collapsing
/// runs and trimming the ends. Falls back to `image` for empty results.
pub fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = false;
    for c in raw.chars() {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `creative-output-<key>.jpg`
pub fn individual_filename(key: &str) -> String {
    format!("{INDIVIDUAL_PREFIX}-{}.jpg", sanitize_component(key))
}

/// Default album filename for a mode without an explicit one.
pub fn album_filename(mode_id: &str) -> String {
    format!("{}-album.jpg", sanitize_component(mode_id))
}
