//! Identity to filename mapping.
//!
//! Asset ownership is purely a naming convention: the file stem is computed
//! from the record key, so it can always be re-derived without metadata.

use crate::record_store::RecordKey;

/// Replaces every run of non-alphanumeric characters.
pub const SEPARATOR: char = '_';

/// Joins the sanitized title and author in a file stem.
pub const STEM_JOINER: char = '-';

/// Transliterates to lower-case ASCII alphanumerics, collapsing every other
/// run of characters into a single [`SEPARATOR`]. Leading and trailing runs
/// are dropped.
pub fn sanitize(input: &str) -> String {
    let ascii = deunicode::deunicode(input);
    let mut sanitized = String::with_capacity(ascii.len());
    let mut pending_separator = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !sanitized.is_empty() {
                sanitized.push(SEPARATOR);
            }
            pending_separator = false;
            sanitized.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    sanitized
}

/// File stem owned by `key`: `{sanitize(title)}-{sanitize(author)}`.
pub fn asset_stem(key: &RecordKey) -> String {
    format!(
        "{}{}{}",
        sanitize(&key.title),
        STEM_JOINER,
        sanitize(&key.author)
    )
}

/// True when `file_name` belongs to `stem`, whatever its extension.
pub fn is_owned_by(file_name: &str, stem: &str) -> bool {
    match file_name.strip_prefix(stem) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}

/// Lower-cased extension of an uploaded filename, dot included.
///
/// Anything that is not plain ASCII alphanumerics is dropped rather than
/// trusted as part of a path.
pub fn upload_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}
