//! Dimension entities and their extraction from validated records.
//!
//! Each entity is keyed by its Spotify URI. Attribute values are taken from
//! the first record seen for a given key; later records with the same key
//! only contribute fact rows.

use super::record::{ContentKind, PlaybackRecord};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DimensionError {
    #[error("invalid {kind} URI '{uri}'")]
    InvalidUri { kind: &'static str, uri: String },
}

/// Drops display values that are empty or whitespace only.
fn normalize_display(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// A unique music track. Natural key: `spotify:track:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDimension {
    pub spotify_uri: String,
    pub name: Option<String>,
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
}

impl TrackDimension {
    pub fn new(
        spotify_uri: &str,
        name: Option<&String>,
        artist_name: Option<&String>,
        album_name: Option<&String>,
    ) -> Result<Self, DimensionError> {
        if !spotify_uri.starts_with("spotify:track:") {
            return Err(DimensionError::InvalidUri {
                kind: "track",
                uri: spotify_uri.to_string(),
            });
        }
        Ok(Self {
            spotify_uri: spotify_uri.to_string(),
            name: normalize_display(name),
            artist_name: normalize_display(artist_name),
            album_name: normalize_display(album_name),
        })
    }
}

/// A unique podcast episode. Natural key: `spotify:episode:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeDimension {
    pub spotify_uri: String,
    pub name: Option<String>,
    pub show_name: Option<String>,
}

impl EpisodeDimension {
    pub fn new(
        spotify_uri: &str,
        name: Option<&String>,
        show_name: Option<&String>,
    ) -> Result<Self, DimensionError> {
        if !spotify_uri.starts_with("spotify:episode:") {
            return Err(DimensionError::InvalidUri {
                kind: "episode",
                uri: spotify_uri.to_string(),
            });
        }
        Ok(Self {
            spotify_uri: spotify_uri.to_string(),
            name: normalize_display(name),
            show_name: normalize_display(show_name),
        })
    }
}

/// A unique audiobook chapter. Natural key: chapter URI (any `spotify:` URI,
/// the export is not consistent about the namespace here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudiobookChapterDimension {
    pub chapter_uri: String,
    pub chapter_title: Option<String>,
    pub audiobook_title: Option<String>,
    pub audiobook_uri: Option<String>,
}

impl AudiobookChapterDimension {
    pub fn new(
        chapter_uri: &str,
        chapter_title: Option<&String>,
        audiobook_title: Option<&String>,
        audiobook_uri: Option<&String>,
    ) -> Result<Self, DimensionError> {
        if !chapter_uri.starts_with("spotify:") {
            return Err(DimensionError::InvalidUri {
                kind: "audiobook chapter",
                uri: chapter_uri.to_string(),
            });
        }
        Ok(Self {
            chapter_uri: chapter_uri.to_string(),
            chapter_title: normalize_display(chapter_title),
            audiobook_title: normalize_display(audiobook_title),
            audiobook_uri: audiobook_uri.cloned(),
        })
    }
}

/// Deduplicated dimension entities extracted from one pipeline run.
#[derive(Debug, Default)]
pub struct DimensionSet {
    pub tracks: HashMap<String, TrackDimension>,
    pub episodes: HashMap<String, EpisodeDimension>,
    pub audiobook_chapters: HashMap<String, AudiobookChapterDimension>,
}

impl DimensionSet {
    /// One pass over the records, first-seen attribute values win.
    ///
    /// Records whose identifier fails the URI format check produce no
    /// dimension entity (their fact rows are still loaded); missing display
    /// text never suppresses entity creation.
    pub fn collect(records: &[PlaybackRecord]) -> Self {
        let mut set = Self::default();
        for record in records {
            match record.content_kind() {
                ContentKind::Track => {
                    let Some(uri) = record.spotify_track_uri.as_ref() else {
                        continue;
                    };
                    if !set.tracks.contains_key(uri) {
                        match TrackDimension::new(
                            uri,
                            record.master_metadata_track_name.as_ref(),
                            record.master_metadata_album_artist_name.as_ref(),
                            record.master_metadata_album_album_name.as_ref(),
                        ) {
                            Ok(track) => {
                                set.tracks.insert(uri.clone(), track);
                            }
                            Err(e) => warn!("Skipping track dimension: {}", e),
                        }
                    }
                }
                ContentKind::Episode => {
                    let Some(uri) = record.spotify_episode_uri.as_ref() else {
                        continue;
                    };
                    if !set.episodes.contains_key(uri) {
                        match EpisodeDimension::new(
                            uri,
                            record.episode_name.as_ref(),
                            record.episode_show_name.as_ref(),
                        ) {
                            Ok(episode) => {
                                set.episodes.insert(uri.clone(), episode);
                            }
                            Err(e) => warn!("Skipping episode dimension: {}", e),
                        }
                    }
                }
                ContentKind::AudiobookChapter => {
                    let Some(uri) = record.audiobook_chapter_uri.as_ref() else {
                        continue;
                    };
                    if !set.audiobook_chapters.contains_key(uri) {
                        match AudiobookChapterDimension::new(
                            uri,
                            record.audiobook_chapter_title.as_ref(),
                            record.audiobook_title.as_ref(),
                            record.audiobook_uri.as_ref(),
                        ) {
                            Ok(chapter) => {
                                set.audiobook_chapters.insert(uri.clone(), chapter);
                            }
                            Err(e) => warn!("Skipping audiobook chapter dimension: {}", e),
                        }
                    }
                }
                ContentKind::Untyped => {}
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::record::PlaybackRecord;
    use serde_json::json;

    fn record(overrides: serde_json::Value) -> PlaybackRecord {
        let mut event = json!({
            "ts": "2024-01-01T10:00:00Z",
            "platform": "ios",
            "ms_played": 5000,
            "conn_country": "US",
            "ip_addr": "1.2.3.4",
            "reason_start": "trackdone",
            "reason_end": "trackdone",
            "shuffle": false,
            "skipped": false,
            "offline": false,
            "incognito_mode": false
        });
        for (k, v) in overrides.as_object().unwrap() {
            event[k] = v.clone();
        }
        PlaybackRecord::from_value(&event).unwrap()
    }

    #[test]
    fn test_track_uri_prefix_enforced() {
        assert!(TrackDimension::new("spotify:track:abc", None, None, None).is_ok());
        let err = TrackDimension::new("spotify:episode:abc", None, None, None).unwrap_err();
        assert!(err.to_string().contains("track"));
    }

    #[test]
    fn test_episode_uri_prefix_enforced() {
        assert!(EpisodeDimension::new("spotify:episode:abc", None, None).is_ok());
        assert!(EpisodeDimension::new("spotify:track:abc", None, None).is_err());
    }

    #[test]
    fn test_chapter_uri_prefix_enforced() {
        assert!(AudiobookChapterDimension::new("spotify:chapter:abc", None, None, None).is_ok());
        assert!(AudiobookChapterDimension::new("chapter:abc", None, None, None).is_err());
    }

    #[test]
    fn test_blank_display_fields_become_null() {
        let name = "   ".to_string();
        let track =
            TrackDimension::new("spotify:track:abc", Some(&name), None, None).unwrap();
        assert_eq!(track.name, None);
    }

    #[test]
    fn test_collect_dedupes_first_seen_wins() {
        let records = vec![
            record(json!({
                "spotify_track_uri": "spotify:track:abc",
                "master_metadata_track_name": "First Title"
            })),
            record(json!({
                "spotify_track_uri": "spotify:track:abc",
                "master_metadata_track_name": "Second Title"
            })),
            record(json!({
                "spotify_track_uri": "spotify:track:def",
                "master_metadata_track_name": "Other"
            })),
        ];
        let set = DimensionSet::collect(&records);
        assert_eq!(set.tracks.len(), 2);
        assert_eq!(
            set.tracks["spotify:track:abc"].name.as_deref(),
            Some("First Title")
        );
    }

    #[test]
    fn test_collect_splits_by_kind() {
        let records = vec![
            record(json!({ "spotify_track_uri": "spotify:track:abc" })),
            record(json!({
                "spotify_episode_uri": "spotify:episode:ep1",
                "episode_name": "Pilot",
                "episode_show_name": "A Show"
            })),
            record(json!({
                "audiobook_chapter_uri": "spotify:chapter:ch1",
                "audiobook_chapter_title": "Chapter One",
                "audiobook_title": "A Book",
                "audiobook_uri": "spotify:audiobook:bk1"
            })),
            // Untyped record, excluded from extraction.
            record(json!({})),
        ];
        let set = DimensionSet::collect(&records);
        assert_eq!(set.tracks.len(), 1);
        assert_eq!(set.episodes.len(), 1);
        assert_eq!(set.audiobook_chapters.len(), 1);
        assert_eq!(
            set.episodes["spotify:episode:ep1"].show_name.as_deref(),
            Some("A Show")
        );
        assert_eq!(
            set.audiobook_chapters["spotify:chapter:ch1"]
                .audiobook_uri
                .as_deref(),
            Some("spotify:audiobook:bk1")
        );
    }

    #[test]
    fn test_collect_keeps_entity_with_missing_display_fields() {
        let records = vec![record(json!({ "spotify_track_uri": "spotify:track:abc" }))];
        let set = DimensionSet::collect(&records);
        let track = &set.tracks["spotify:track:abc"];
        assert_eq!(track.name, None);
        assert_eq!(track.artist_name, None);
        assert_eq!(track.album_name, None);
    }

    #[test]
    fn test_collect_skips_malformed_identifier() {
        let records = vec![record(json!({ "spotify_track_uri": "not-a-uri" }))];
        let set = DimensionSet::collect(&records);
        assert!(set.tracks.is_empty());
    }
}
