pub mod broadcast;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::db::Database;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub files: usize,
    pub segments: usize,
    /// Files already recorded as ingested.
    pub already_ingested: usize,
    /// Files with an invalid name or unreadable content.
    pub rejected: usize,
    /// Individual segment entries dropped for missing fields.
    pub skipped_segments: usize,
}

impl IngestStats {
    fn merge(&mut self, other: IngestStats) {
        self.files += other.files;
        self.segments += other.segments;
        self.already_ingested += other.already_ingested;
        self.rejected += other.rejected;
        self.skipped_segments += other.skipped_segments;
    }
}

/// Ingest one or more paths (files, directories, or glob patterns).
pub fn ingest_paths(db: &Database, paths: &[String], dry_run: bool) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for path_str in paths {
        let path = Path::new(path_str);
        if path.is_dir() {
            stats.merge(ingest_directory(db, path, dry_run)?);
        } else if path.is_file() {
            stats.merge(ingest_file(db, path, dry_run)?);
        } else {
            // Try glob pattern
            let mut matches: Vec<_> = glob::glob(path_str)
                .with_context(|| format!("Invalid path or glob pattern: {path_str}"))?
                .filter_map(|r| r.ok())
                .collect();

            if matches.is_empty() {
                bail!("No files found matching: {path_str}");
            }
            matches.sort();

            for entry in matches {
                if entry.is_file() {
                    stats.merge(ingest_file(db, &entry, dry_run)?);
                }
            }
        }
    }

    Ok(stats)
}

fn ingest_directory(db: &Database, dir: &Path, dry_run: bool) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            stats.merge(ingest_directory(db, &path, dry_run)?);
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            stats.merge(ingest_file(db, &path, dry_run)?);
        }
    }

    Ok(stats)
}

/// Ingest a single broadcast file. Bad files are logged and counted, not
/// fatal; database failures are.
fn ingest_file(db: &Database, path: &Path, dry_run: bool) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    if db.file_ingested(filename)? {
        info!("Skipping already ingested: {filename}");
        stats.already_ingested = 1;
        return Ok(stats);
    }

    let meta = match broadcast::parse_file_name(filename) {
        Ok(meta) => meta,
        Err(e) => {
            warn!("{e:#}");
            stats.rejected = 1;
            return Ok(stats);
        }
    };

    let parsed = match std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read: {}", path.display()))
        .and_then(|content| broadcast::parse_broadcast(&content, &meta))
    {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("{}: {e:#}", path.display());
            stats.rejected = 1;
            return Ok(stats);
        }
    };

    stats.skipped_segments = parsed.skipped;
    if parsed.segments.is_empty() {
        warn!("No usable segments in {filename}");
        stats.rejected = 1;
        return Ok(stats);
    }

    if dry_run {
        println!(
            "  [dry-run] Would ingest: {filename} ({} {}, {} segments)",
            meta.station,
            meta.started_at,
            parsed.segments.len()
        );
    } else {
        db.insert_file_segments(filename, &parsed.segments)?;
        info!("Inserted {} segments from {filename}", parsed.segments.len());
    }

    stats.files = 1;
    stats.segments = parsed.segments.len();
    Ok(stats)
}
