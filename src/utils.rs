//! Small helpers shared by the pipeline stages.
//!
//! - Output directory naming and validation
//! - Whitespace cleanup for scraped text
//! - String truncation for log previews

use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Map a cafeteria id to a filesystem-safe directory name.
///
/// The id is trimmed and lower-cased and every character outside
/// `[a-z0-9_]` becomes `_`. The mapping is deterministic, so the same id
/// always lands in the same directory across runs.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_id("bistro-templergraben"), "bistro_templergraben");
/// assert_eq!(sanitize_id("Eupener Straße"), "eupener_stra_e");
/// ```
pub fn sanitize_id(id: &str) -> String {
    id.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn squash_whitespace(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s, " ").trim().to_string()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` bytes (moved back to the nearest char
/// boundary) with an ellipsis and the number of dropped bytes appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory (and parents) if needed, then writes and removes a
/// scratch file to catch read-only mounts and permission problems before any
/// real output is attempted.
///
/// # Arguments
///
/// * `path` - The directory to create and check
///
/// # Returns
///
/// `Ok(())` if the directory exists and accepts new files.
///
/// # Errors
///
/// Returns the underlying I/O error if:
/// - The directory cannot be created, e.g. because a file is in the way
/// - A file cannot be written into it (permissions, read-only filesystem)
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let check_path = path.join(".__write_check__");
    fs::write(&check_path, b"").await?;
    let _ = fs::remove_file(&check_path).await;
    debug!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_id() {
        assert_eq!(sanitize_id("bistro-templergraben"), "bistro_templergraben");
        assert_eq!(sanitize_id("eupener-strasse"), "eupener_strasse");
        assert_eq!(sanitize_id("kmac"), "kmac");
        assert_eq!(sanitize_id(" Vita "), "vita");
        assert_eq!(sanitize_id("../etc"), "___etc");
        assert_eq!(sanitize_id("Südpark"), "s_dpark");
    }

    #[test]
    fn test_sanitize_id_is_deterministic() {
        let ids = ["academica", "bistro-templergraben", "juelich"];
        let first: Vec<String> = ids.iter().map(|id| sanitize_id(id)).collect();
        let second: Vec<String> = ids.iter().map(|id| sanitize_id(id)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  Reis \n\t mit   Gemüse "), "Reis mit Gemüse");
        assert_eq!(squash_whitespace(""), "");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let result = truncate_for_log("ääää", 3);
        assert_eq!(result, "ä…(+6 bytes)");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_missing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join(".__write_check__").exists());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_fails_on_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();
        assert!(ensure_writable_dir(&file).await.is_err());
    }
}
