//! JSON output of extraction results.
//!
//! Results are written to `{json_output_dir}/{YYYY-MM-DD}/{HHMMSS}.json` using
//! local time, so repeated runs on one day land side by side.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::error::Error;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path for a result file written at `at`.
pub fn output_path(json_output_dir: &str, at: DateTime<Local>) -> PathBuf {
    Path::new(json_output_dir)
        .join(at.format("%Y-%m-%d").to_string())
        .join(format!("{}.json", at.format("%H%M%S")))
}

/// Serialise `value` and write it under a date-based directory.
///
/// # Arguments
///
/// * `value` - Anything serialisable, usually a [`crate::models::BatchOutcome`]
/// * `json_output_dir` - Base directory for JSON output
///
/// # Returns
///
/// The path of the written file, or an error if directory creation or the
/// write fails.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_results<T: Serialize>(
    value: &T,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    let path = output_path(json_output_dir, Local::now());

    if let Some(full_json_dir) = path.parent() {
        info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
        if let Err(e) = fs::create_dir_all(full_json_dir).await {
            error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
            return Err(e.into());
        }
    }

    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON results file");
    Ok(path)
}

/// Create `path` if needed and check that files can be written into it.
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!(%path, "Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
