//! Persistence side of the pipeline: dimension upserts and batched fact
//! loading.

use super::dimensions::DimensionSet;
use super::record::{ContentKind, PlaybackRecord};
use crate::store::{FactRow, HistoryStore};
use tracing::{error, info};

/// Default number of fact rows per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Upsert outcome per dimension kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DimensionLoadCounts {
    pub tracks_attempted: usize,
    pub tracks_inserted: usize,
    pub episodes_attempted: usize,
    pub episodes_inserted: usize,
    pub chapters_attempted: usize,
    pub chapters_inserted: usize,
}

/// Persist each extracted entity that is not already present under its
/// natural key. Existing rows are left untouched; conflicts from concurrent
/// runs are absorbed by the store's insert-if-absent contract.
pub fn upsert_dimensions<S: HistoryStore + ?Sized>(
    store: &S,
    dimensions: &DimensionSet,
) -> DimensionLoadCounts {
    let mut counts = DimensionLoadCounts::default();

    for track in dimensions.tracks.values() {
        counts.tracks_attempted += 1;
        match store.insert_track_if_absent(track) {
            Ok(true) => counts.tracks_inserted += 1,
            Ok(false) => {}
            Err(e) => error!("Error adding track {}: {}", track.spotify_uri, e),
        }
    }
    info!(
        "Tracks: {} attempted, {} inserted, {} skipped",
        counts.tracks_attempted,
        counts.tracks_inserted,
        counts.tracks_attempted - counts.tracks_inserted
    );

    for episode in dimensions.episodes.values() {
        counts.episodes_attempted += 1;
        match store.insert_episode_if_absent(episode) {
            Ok(true) => counts.episodes_inserted += 1,
            Ok(false) => {}
            Err(e) => error!("Error adding episode {}: {}", episode.spotify_uri, e),
        }
    }
    info!(
        "Episodes: {} attempted, {} inserted, {} skipped",
        counts.episodes_attempted,
        counts.episodes_inserted,
        counts.episodes_attempted - counts.episodes_inserted
    );

    for chapter in dimensions.audiobook_chapters.values() {
        counts.chapters_attempted += 1;
        match store.insert_chapter_if_absent(chapter) {
            Ok(true) => counts.chapters_inserted += 1,
            Ok(false) => {}
            Err(e) => error!(
                "Error adding audiobook chapter {}: {}",
                chapter.chapter_uri, e
            ),
        }
    }
    info!(
        "Audiobook chapters: {} attempted, {} inserted, {} skipped",
        counts.chapters_attempted,
        counts.chapters_inserted,
        counts.chapters_attempted - counts.chapters_inserted
    );

    counts
}

/// Build a fact row from a record, nullifying foreign keys structurally: a
/// record carries only the URI matching its own content kind. This is a
/// shape mapping, not an existence check against the dimension tables.
fn fact_row(record: &PlaybackRecord) -> FactRow {
    let kind = record.content_kind();
    FactRow {
        ts: record.ts.to_rfc3339(),
        platform: record.platform.clone(),
        ms_played: record.ms_played,
        conn_country: record.conn_country.clone(),
        ip_addr: record.ip_addr.to_string(),
        master_metadata_track_name: record.master_metadata_track_name.clone(),
        master_metadata_album_artist_name: record.master_metadata_album_artist_name.clone(),
        master_metadata_album_album_name: record.master_metadata_album_album_name.clone(),
        spotify_track_uri: match kind {
            ContentKind::Track => record.spotify_track_uri.clone(),
            _ => None,
        },
        episode_name: record.episode_name.clone(),
        episode_show_name: record.episode_show_name.clone(),
        spotify_episode_uri: match kind {
            ContentKind::Episode => record.spotify_episode_uri.clone(),
            _ => None,
        },
        audiobook_title: record.audiobook_title.clone(),
        audiobook_uri: record.audiobook_uri.clone(),
        audiobook_chapter_uri: match kind {
            ContentKind::AudiobookChapter => record.audiobook_chapter_uri.clone(),
            _ => None,
        },
        audiobook_chapter_title: record.audiobook_chapter_title.clone(),
        reason_start: record.reason_start.clone(),
        reason_end: record.reason_end.clone(),
        shuffle: record.shuffle,
        skipped: record.skipped,
        offline: record.offline,
        offline_timestamp: record.offline_timestamp,
        incognito_mode: record.incognito_mode,
    }
}

/// Result of one fact-loading pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FactLoadResult {
    pub loaded: usize,
    pub failed_batches: usize,
}

/// Loads chronologically merged records in fixed-size transactional batches.
pub struct FactLoader {
    batch_size: usize,
}

impl FactLoader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Persist the records batch by batch, in sequence order.
    ///
    /// A failed batch is rolled back by the store, logged with its index and
    /// size, and never retried; its records are simply not counted as
    /// loaded. Later batches still run.
    pub fn load<S: HistoryStore + ?Sized>(
        &self,
        store: &S,
        records: &[PlaybackRecord],
    ) -> FactLoadResult {
        let total_batches = records.len().div_ceil(self.batch_size);
        let mut result = FactLoadResult::default();

        for (batch_index, batch) in records.chunks(self.batch_size).enumerate() {
            let rows: Vec<FactRow> = batch.iter().map(fact_row).collect();
            match store.insert_fact_batch(&rows) {
                Ok(()) => {
                    result.loaded += rows.len();
                    info!(
                        "Loaded batch {}/{} ({}/{} records)",
                        batch_index + 1,
                        total_batches,
                        result.loaded,
                        records.len()
                    );
                }
                Err(e) => {
                    result.failed_batches += 1;
                    error!(
                        "Error loading batch {} ({} records): {}",
                        batch_index + 1,
                        rows.len(),
                        e
                    );
                }
            }
        }

        result
    }
}

impl Default for FactLoader {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
