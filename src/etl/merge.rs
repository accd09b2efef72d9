//! Chronological ordering of records pooled from multiple export files.

use super::record::PlaybackRecord;

/// Sort pooled records into non-decreasing timestamp order.
///
/// The sort is stable, so records with equal timestamps keep their encounter
/// order (file order, then in-file order). Export chunks overlap and are not
/// guaranteed to be sorted, which is why the pipeline merges the full
/// cross-file pool instead of concatenating per-file sorts.
pub fn merge_chronological(mut records: Vec<PlaybackRecord>) -> Vec<PlaybackRecord> {
    records.sort_by_key(|r| r.ts);
    records
}
