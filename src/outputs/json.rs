//! JSON export of the analytics dashboard.
//!
//! Files are organized by the UTC date the dashboard was generated; a later
//! run on the same day replaces that day's file.

use crate::analytics::Dashboard;
use crate::error::Result;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`Dashboard`] to `{output_dir}/{date}/analytics.json`.
///
/// # Arguments
///
/// * `dashboard` - The aggregates to serialize
/// * `output_dir` - Base directory for JSON output
///
/// # Returns
///
/// The path written, or an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_dashboard(dashboard: &Dashboard, output_dir: &str) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(dashboard)?;

    let date = dashboard.generated_at.date_naive().to_string();
    let full_dir = PathBuf::from(output_dir).join(&date);
    info!(full_dir = %full_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_dir).await {
        error!(full_dir = %full_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_dir.join("analytics.json");
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote dashboard JSON");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::build_dashboard;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_write_dashboard_uses_dated_directory() {
        let dir = tempfile::tempdir().unwrap();
        let generated_at = Utc.with_ymd_and_hms(2026, 10, 18, 6, 30, 0).unwrap();
        let dashboard = build_dashboard(&[], &[], generated_at);

        let path = write_dashboard(&dashboard, dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("2026-10-18").join("analytics.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["total_articles"], 0);
        assert_eq!(written["sites"][0]["site"], "svt");
        assert!(written["domestic"]["avg_overall"].is_null());
    }
}
