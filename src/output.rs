use crate::models::ListingBatch;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// `<dir>/<UTC timestamp>_output.json`
pub fn output_path(dir: &Path, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}_output.json", now.format("%Y-%m-%dT%H:%M:%S")))
}

/// Writes the batch as a pretty-printed JSON array and returns the file path.
pub fn write_batch(dir: &Path, batch: &ListingBatch) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let path = output_path(dir, Utc::now());
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    batch.serialize(&mut serializer).context("Failed to serialize listings")?;

    fs::write(&path, buffer)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!("Wrote {} listings to {}", batch.len(), path.display());
    Ok(path)
}

pub fn read_batch(path: &Path) -> Result<ListingBatch> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse listings from {}", path.display()))
}
