//! Filename sanitising for patient display names.

use crate::constants::{MAX_BASENAME_CHARS, PLACEHOLDER_NAME};

/// Maps an arbitrary display name to a safe on-disk base name.
///
/// Every character outside `A-Z a-z 0-9 . _ - ` (space included) becomes `_`, and the result is
/// cut to at most 180 characters. An absent or empty name becomes `"patient"`.
///
/// The returned value never contains a path separator, so it always names a file directly
/// inside the save directory.
pub fn sanitize_filename(raw_name: Option<&str>) -> String {
    let name = match raw_name {
        Some(n) if !n.is_empty() => n,
        _ => PLACEHOLDER_NAME,
    };

    name.chars()
        .map(|c| if is_allowed(c) { c } else { '_' })
        .take(MAX_BASENAME_CHARS)
        .collect()
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ' ' | '-')
}
