//! End-to-end pipeline run: discover export files, validate, merge, extract,
//! upsert and load.

use super::dimensions::DimensionSet;
use super::load::{upsert_dimensions, FactLoader};
use super::merge::merge_chronological;
use super::record::{validate_events, PlaybackRecord};
use crate::store::HistoryStore;
use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

lazy_static! {
    /// Numeric sequence suffix of an export filename, e.g. `..._3.json`.
    static ref FILE_SEQUENCE_RE: Regex = Regex::new(r"_(\d+)\.json$").unwrap();
}

/// Final counts of one pipeline run. Partial success (failed files or
/// batches) shows up as count discrepancies, not as an error.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct LoadSummary {
    pub files_processed: usize,
    pub failed_files: usize,
    pub total_records: usize,
    pub total_valid: usize,
    pub rejected_records: usize,
    pub total_loaded: usize,
    pub failed_batches: usize,
    pub tracks: usize,
    pub episodes: usize,
    pub audiobook_chapters: usize,
}

/// Select the audio export files in a directory, ordered by their numeric
/// sequence suffix (files without a parseable suffix sort first as sequence
/// 0, then by name so runs are deterministic). Video exports sharing the
/// directory are excluded.
pub fn discover_export_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(data_dir)
        .with_context(|| format!("Failed to read data directory: {:?}", data_dir))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file()
            && name.ends_with(".json")
            && name.contains("Audio")
            && !name.contains("Video")
        {
            files.push(path);
        }
    }

    files.sort_by_key(|path| {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        (file_sequence(&name), name)
    });
    Ok(files)
}

fn file_sequence(filename: &str) -> u64 {
    FILE_SEQUENCE_RE
        .captures(filename)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0)
}

/// Drives one run-to-completion ingestion pass over a data directory.
pub struct Pipeline<'a> {
    store: &'a dyn HistoryStore,
    batch_size: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn HistoryStore, batch_size: usize) -> Self {
        Self { store, batch_size }
    }

    /// Run the pipeline over every export file in `data_dir`.
    ///
    /// Only whole-run-fatal conditions (missing directory) return an error;
    /// per-file and per-batch failures are counted in the summary and the
    /// run continues.
    pub fn run(&self, data_dir: &Path) -> Result<LoadSummary> {
        if !data_dir.is_dir() {
            bail!("Data directory does not exist: {:?}", data_dir);
        }

        let files = discover_export_files(data_dir)?;
        info!(
            "Found {} audio export files to process (ignoring video files)",
            files.len()
        );

        let mut summary = LoadSummary::default();
        let mut pool: Vec<PlaybackRecord> = Vec::new();

        for path in &files {
            match self.read_file(path) {
                Ok(events) => {
                    let (valid, rejected) = validate_events(&events);
                    info!(
                        "{}: {} records, {} valid, {} rejected",
                        path.display(),
                        events.len(),
                        valid.len(),
                        rejected
                    );
                    summary.files_processed += 1;
                    summary.total_records += events.len();
                    summary.rejected_records += rejected;
                    pool.extend(valid);
                }
                Err(e) => {
                    summary.failed_files += 1;
                    error!("Failed to process {}: {}", path.display(), e);
                }
            }
        }
        summary.total_valid = pool.len();

        if pool.is_empty() {
            warn!("No valid records found across all files");
            return Ok(summary);
        }

        info!("Sorting {} records globally by timestamp", pool.len());
        let pool = merge_chronological(pool);

        let dimensions = DimensionSet::collect(&pool);
        summary.tracks = dimensions.tracks.len();
        summary.episodes = dimensions.episodes.len();
        summary.audiobook_chapters = dimensions.audiobook_chapters.len();

        upsert_dimensions(self.store, &dimensions);

        let loaded = FactLoader::new(self.batch_size).load(self.store, &pool);
        summary.total_loaded = loaded.loaded;
        summary.failed_batches = loaded.failed_batches;

        info!(
            "Load complete: {} files, {} records seen, {} valid, {} loaded",
            summary.files_processed,
            summary.total_records,
            summary.total_valid,
            summary.total_loaded
        );
        Ok(summary)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<serde_json::Value>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read export file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Export file is not a JSON array: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteHistoryStore;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn event(ts: &str, track: &str) -> serde_json::Value {
        json!({
            "ts": ts,
            "platform": "ios",
            "ms_played": 5000,
            "conn_country": "us",
            "ip_addr": "1.2.3.4",
            "spotify_track_uri": format!("spotify:track:{}", track),
            "master_metadata_track_name": track,
            "reason_start": "trackdone",
            "reason_end": "trackdone",
            "shuffle": false,
            "skipped": false,
            "offline": false,
            "incognito_mode": false
        })
    }

    fn write_export(dir: &Path, name: &str, events: &[serde_json::Value]) {
        fs::write(dir.join(name), serde_json::to_string(events).unwrap()).unwrap();
    }

    #[test]
    fn test_file_sequence_parsing() {
        assert_eq!(file_sequence("history_Audio_2.json"), 2);
        assert_eq!(file_sequence("history_Audio_12.json"), 12);
        assert_eq!(file_sequence("history_Audio.json"), 0);
        assert_eq!(file_sequence("history_Audio_x.json"), 0);
    }

    #[test]
    fn test_discovery_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        write_export(dir.path(), "history_Audio_2.json", &[]);
        write_export(dir.path(), "history_Audio_1.json", &[]);
        write_export(dir.path(), "history_Audio_10.json", &[]);
        write_export(dir.path(), "history_Video_1.json", &[]);
        write_export(dir.path(), "notes.json", &[]);
        fs::write(dir.path().join("history_Audio_3.txt"), "x").unwrap();

        let files = discover_export_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "history_Audio_1.json",
                "history_Audio_2.json",
                "history_Audio_10.json"
            ]
        );
    }

    #[test]
    fn test_run_missing_directory_is_fatal() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let pipeline = Pipeline::new(&store, 100);
        let result = pipeline.run(Path::new("/nonexistent/streamfacts/data"));
        assert!(result.is_err());
    }

    #[test]
    fn test_run_skips_unparseable_file() {
        let dir = TempDir::new().unwrap();
        write_export(
            dir.path(),
            "history_Audio_1.json",
            &[event("2024-01-01T10:00:00Z", "aaa")],
        );
        fs::write(dir.path().join("history_Audio_2.json"), "{ not json").unwrap();

        let store = SqliteHistoryStore::in_memory().unwrap();
        let summary = Pipeline::new(&store, 100).run(dir.path()).unwrap();

        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.failed_files, 1);
        assert_eq!(summary.total_loaded, 1);
    }

    #[test]
    fn test_run_merges_across_files_chronologically() {
        let dir = TempDir::new().unwrap();
        // File 1 holds the later events, file 2 the earlier ones.
        write_export(
            dir.path(),
            "history_Audio_1.json",
            &[
                event("2024-02-01T00:00:00Z", "feb"),
                event("2024-04-01T00:00:00Z", "apr"),
            ],
        );
        write_export(
            dir.path(),
            "history_Audio_2.json",
            &[
                event("2024-01-01T00:00:00Z", "jan"),
                event("2024-03-01T00:00:00Z", "mar"),
            ],
        );

        let store = SqliteHistoryStore::in_memory().unwrap();
        let summary = Pipeline::new(&store, 100).run(dir.path()).unwrap();

        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.total_valid, 4);
        assert_eq!(summary.total_loaded, 4);
        assert_eq!(summary.tracks, 4);
        assert_eq!(summary.failed_batches, 0);
        assert_eq!(store.count_facts().unwrap(), 4);
    }

    #[test]
    fn test_run_empty_directory() {
        let dir = TempDir::new().unwrap();
        let store = SqliteHistoryStore::in_memory().unwrap();
        let summary = Pipeline::new(&store, 100).run(dir.path()).unwrap();
        assert_eq!(summary, LoadSummary::default());
    }
}
