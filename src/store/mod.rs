//! Storage for the streaming-history star schema.

mod schema;
mod sqlite;

pub use schema::HISTORY_SCHEMA_SQL;
pub use sqlite::SqliteHistoryStore;

use crate::etl::{AudiobookChapterDimension, EpisodeDimension, TrackDimension};
use anyhow::Result;

/// One row of the fact table, ready for insertion. Foreign keys have already
/// been resolved structurally by the loader: only the URI matching the
/// record's content kind is set.
#[derive(Debug, Clone)]
pub struct FactRow {
    pub ts: String,
    pub platform: String,
    pub ms_played: i64,
    pub conn_country: String,
    pub ip_addr: String,
    pub master_metadata_track_name: Option<String>,
    pub master_metadata_album_artist_name: Option<String>,
    pub master_metadata_album_album_name: Option<String>,
    pub spotify_track_uri: Option<String>,
    pub episode_name: Option<String>,
    pub episode_show_name: Option<String>,
    pub spotify_episode_uri: Option<String>,
    pub audiobook_title: Option<String>,
    pub audiobook_uri: Option<String>,
    pub audiobook_chapter_uri: Option<String>,
    pub audiobook_chapter_title: Option<String>,
    pub reason_start: String,
    pub reason_end: String,
    pub shuffle: bool,
    pub skipped: bool,
    pub offline: bool,
    pub offline_timestamp: Option<i64>,
    pub incognito_mode: bool,
}

/// Trait for history storage operations.
pub trait HistoryStore: Send + Sync {
    // ==================== Dimension Operations ====================

    /// Insert a track if its URI is not already present.
    /// Returns true if a row was written. An existing row is left untouched.
    fn insert_track_if_absent(&self, track: &TrackDimension) -> Result<bool>;

    /// Insert an episode if its URI is not already present.
    fn insert_episode_if_absent(&self, episode: &EpisodeDimension) -> Result<bool>;

    /// Insert an audiobook chapter if its URI is not already present.
    fn insert_chapter_if_absent(&self, chapter: &AudiobookChapterDimension) -> Result<bool>;

    /// Get a track by its URI.
    fn get_track(&self, spotify_uri: &str) -> Result<Option<TrackDimension>>;

    /// Get an episode by its URI.
    fn get_episode(&self, spotify_uri: &str) -> Result<Option<EpisodeDimension>>;

    /// Get an audiobook chapter by its URI.
    fn get_chapter(&self, chapter_uri: &str) -> Result<Option<AudiobookChapterDimension>>;

    // ==================== Fact Operations ====================

    /// Insert a batch of fact rows in a single transaction. Either the whole
    /// batch lands or none of it does.
    fn insert_fact_batch(&self, rows: &[FactRow]) -> Result<()>;

    /// Number of fact rows in the store.
    fn count_facts(&self) -> Result<usize>;

    /// Number of rows per dimension table: (tracks, episodes, chapters).
    fn dimension_counts(&self) -> Result<(usize, usize, usize)>;
}
