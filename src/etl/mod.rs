//! Ingestion pipeline for Spotify streaming-history exports.
//!
//! Batch, run-to-completion flow:
//! 1. Discover the audio export files in a directory and order them by their
//!    numeric filename suffix
//! 2. Validate and classify every raw event, pooling all valid records
//! 3. Merge the full pool into one chronologically ordered sequence
//! 4. Extract deduplicated dimension entities and upsert them
//! 5. Load the fact rows in fixed-size transactional batches
//!
//! A bad record, file, or batch never aborts the run; everything short of a
//! missing data directory degrades into summary count discrepancies.

mod dimensions;
mod load;
mod merge;
mod pipeline;
mod record;

pub use dimensions::{
    AudiobookChapterDimension, DimensionError, DimensionSet, EpisodeDimension, TrackDimension,
};
pub use load::{
    upsert_dimensions, DimensionLoadCounts, FactLoadResult, FactLoader, DEFAULT_BATCH_SIZE,
};
pub use merge::merge_chronological;
pub use pipeline::{discover_export_files, LoadSummary, Pipeline};
pub use record::{
    validate_events, ContentKind, PlaybackRecord, RawPlaybackEvent, RecordValidationError,
};
