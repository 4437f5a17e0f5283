//! Utility functions for text handling and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Word truncation for ingested summaries
//! - String truncation for logging
//! - JSON error and code-fence handling for LLM responses
//! - File system validation for output directories

use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Keep the first `n` whitespace-separated words of `text`.
///
/// Words are re-joined with single spaces and `…` is appended when anything
/// was cut, so `"a b c"` truncated to 2 becomes `"a b…"`.
pub fn truncate_words(text: &str, n: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut out = words.iter().take(n).copied().collect::<Vec<_>>().join(" ");
    if words.len() > n {
        out.push('…');
    }
    out
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut after `max` bytes (backing off to the previous char
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the LLM response is cut off by the token budget, the JSON fails to
/// parse with an EOF error. Used to annotate retry logs.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````).
///
/// Models sometimes wrap JSON despite being told not to. Text without a
/// fence is returned trimmed.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> std::io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_words() {
        assert_eq!(truncate_words("a b c", 2), "a b…");
        assert_eq!(truncate_words("a b c", 3), "a b c");
        assert_eq!(truncate_words("  spridda   ord \n här ", 10), "spridda ord här");
        assert_eq!(truncate_words("", 5), "");
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
        // 'ö' is two bytes; cutting at 1 would split it
        let result = truncate_for_log("öl", 1);
        assert_eq!(result, "…(+3 bytes)");
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let err = serde_json::from_str::<serde_json::Value>(json_eof).unwrap_err();
        assert!(looks_truncated(&err));

        let err = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        assert!(!looks_truncated(&err));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(nested.to_str().unwrap()).await.unwrap();
        assert!(nested.is_dir());
    }
}
