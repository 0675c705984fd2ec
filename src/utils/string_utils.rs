//! String utility functions
//!
//! Filename sanitization for uploads and small formatting helpers.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_.-]").unwrap();
}

/// Reduces a client-supplied filename to a safe flat name
///
/// Path separators become word breaks, whitespace runs become `_`,
/// non-ASCII and other unsafe characters are dropped, and leading or
/// trailing dots and underscores are trimmed. The result may be empty.
///
/// # Arguments
///
/// * `name` - Filename as supplied by the client
///
/// # Returns
///
/// A name safe to join onto the staging directory
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name.chars().filter(|c| c.is_ascii()).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    UNSAFE_FILENAME_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Formats a byte count with a binary unit
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_filename_plain() {
        assert_eq!(secure_filename("ortho_2023.tif"), "ortho_2023.tif");
        assert_eq!(secure_filename("My cool map.tif"), "My_cool_map.tif");
    }

    #[test]
    fn test_secure_filename_strips_traversal() {
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("C:\\rasters\\dem.tif"), "C_rasters_dem.tif");
    }

    #[test]
    fn test_secure_filename_can_be_empty() {
        assert_eq!(secure_filename("../.."), "");
        assert_eq!(secure_filename("żółw"), "w");
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(100 * 1024 * 1024), "100.0 MiB");
    }
}
