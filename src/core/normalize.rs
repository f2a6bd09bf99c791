//! Normalisation of user-entered filenames and tag lists before they are sent
//! to the gateway.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::error::ClientError;

static FORBIDDEN_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static regex is valid"));

/// Trims the name and strips characters the storage backend rejects.
///
/// Returns a validation error if nothing usable is left.
pub fn sanitize_filename(raw: &str) -> Result<String, ClientError> {
    let cleaned = FORBIDDEN_FILENAME_CHARS.replace_all(raw.trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(ClientError::validation("Filename must not be empty"));
    }
    Ok(cleaned.to_string())
}

/// Parses a comma-separated tag string.
///
/// Entries are trimmed, empty entries dropped, and duplicates removed
/// case-insensitively keeping the first spelling and the original order.
pub fn parse_tags(csv: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    csv.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Renders tags back into the comma-separated form used by the edit form.
pub fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}
