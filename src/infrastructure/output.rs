//! Output writers: merged update catalog and the minimal download list

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::domain::catalog::{MergedEntry, RawEntry};

/// One downloadable URL with just enough context to name it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub title: String,
    pub version: Option<String>,
    pub url: String,
}

/// Flattens merged entries to one record per update URL.
///
/// Empty URLs are skipped, empty versions become `None` and exact
/// `(title, version, url)` repeats are dropped keeping the first.
pub fn minimal_downloads(entries: &[MergedEntry]) -> Vec<DownloadRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for merged in entries {
        let title = merged.entry.display_title();
        for update in &merged.updates {
            if update.url.trim().is_empty() {
                continue;
            }
            let record = DownloadRecord {
                title: title.to_string(),
                version: update.version.clone().filter(|v| !v.is_empty()),
                url: update.url.clone(),
            };
            if seen.insert(record.clone()) {
                records.push(record);
            }
        }
    }
    records
}

/// Write any serializable value as pretty JSON, creating parent directories.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        }
    }

    let body = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub async fn write_merged(path: &Path, entries: &[MergedEntry]) -> Result<()> {
    write_json(path, entries).await?;
    let update_count: usize = entries.iter().map(|e| e.updates.len()).sum();
    info!(
        "💾 Wrote {} entries ({} updates) to {}",
        entries.len(),
        update_count,
        path.display()
    );
    Ok(())
}

pub async fn write_downloads(path: &Path, entries: &[MergedEntry]) -> Result<usize> {
    let records = minimal_downloads(entries);
    write_json(path, &records).await?;
    info!("💾 Wrote {} download records to {}", records.len(), path.display());
    Ok(records.len())
}

/// Read a previously scraped catalog (JSON array of entries)
pub async fn read_catalog(path: &Path) -> Result<Vec<RawEntry>> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    let entries: Vec<RawEntry> = serde_json::from_str(&body)
        .with_context(|| format!("Catalog {} is not a JSON array of entries", path.display()))?;
    info!("📂 Loaded {} catalog entries from {}", entries.len(), path.display());
    Ok(entries)
}
