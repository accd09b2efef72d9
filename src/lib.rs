//! Streamfacts Library
//!
//! Ingests personal Spotify streaming-history exports into a relational star
//! schema: validated playback facts plus deduplicated track, episode and
//! audiobook-chapter dimensions, ready for aggregate analytics.

pub mod config;
pub mod etl;
pub mod metadata;
pub mod store;

// Re-export commonly used types for convenience
pub use etl::{LoadSummary, Pipeline};
pub use store::{HistoryStore, SqliteHistoryStore};
