//! Validation of raw streaming-history events.
//!
//! Each element of an export file is validated independently: one malformed
//! event is rejected with a reason and an index, it never aborts the batch.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::net::IpAddr;
use thiserror::Error;
use tracing::warn;

/// Errors that can reject a single raw event.
#[derive(Debug, Error)]
pub enum RecordValidationError {
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid country code '{0}'")]
    InvalidCountryCode(String),

    #[error("invalid ip address '{0}'")]
    InvalidIpAddress(String),

    #[error("negative playback duration {0}")]
    NegativeDuration(i64),
}

/// One event as it appears in the export JSON, before validation.
///
/// Required keys are non-optional so a missing one fails deserialization of
/// that event only; content-specific keys are optional by design.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlaybackEvent {
    pub ts: String,
    pub platform: String,
    pub ms_played: i64,
    pub conn_country: String,
    pub ip_addr: String,
    #[serde(default)]
    pub master_metadata_track_name: Option<String>,
    #[serde(default)]
    pub master_metadata_album_artist_name: Option<String>,
    #[serde(default)]
    pub master_metadata_album_album_name: Option<String>,
    #[serde(default)]
    pub spotify_track_uri: Option<String>,
    #[serde(default)]
    pub episode_name: Option<String>,
    #[serde(default)]
    pub episode_show_name: Option<String>,
    #[serde(default)]
    pub spotify_episode_uri: Option<String>,
    #[serde(default)]
    pub audiobook_title: Option<String>,
    #[serde(default)]
    pub audiobook_uri: Option<String>,
    #[serde(default)]
    pub audiobook_chapter_uri: Option<String>,
    #[serde(default)]
    pub audiobook_chapter_title: Option<String>,
    pub reason_start: String,
    pub reason_end: String,
    pub shuffle: bool,
    pub skipped: bool,
    pub offline: bool,
    #[serde(default)]
    pub offline_timestamp: Option<i64>,
    pub incognito_mode: bool,
}

/// The kind of content a playback record refers to.
///
/// Derived from which URI field is set. If more than one is (which the export
/// format does not produce, but nothing enforces), track wins over episode,
/// episode over audiobook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Track,
    Episode,
    AudiobookChapter,
    Untyped,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Track => "track",
            ContentKind::Episode => "episode",
            ContentKind::AudiobookChapter => "audiobook_chapter",
            ContentKind::Untyped => "untyped",
        }
    }
}

/// A validated playback event. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct PlaybackRecord {
    pub ts: DateTime<Utc>,
    pub platform: String,
    pub ms_played: i64,
    /// Two-letter country code, uppercased.
    pub conn_country: String,
    pub ip_addr: IpAddr,
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

impl PlaybackRecord {
    /// Validate one raw event. Pure: the same input always yields the same
    /// record or the same rejection.
    pub fn from_raw(raw: RawPlaybackEvent) -> Result<Self, RecordValidationError> {
        let ts = DateTime::parse_from_rfc3339(&raw.ts)
            .map_err(|_| RecordValidationError::InvalidTimestamp(raw.ts.clone()))?
            .with_timezone(&Utc);

        if raw.conn_country.chars().count() != 2 {
            return Err(RecordValidationError::InvalidCountryCode(raw.conn_country));
        }
        let conn_country = raw.conn_country.to_uppercase();

        let ip_addr: IpAddr = raw
            .ip_addr
            .parse()
            .map_err(|_| RecordValidationError::InvalidIpAddress(raw.ip_addr.clone()))?;

        if raw.ms_played < 0 {
            return Err(RecordValidationError::NegativeDuration(raw.ms_played));
        }

        Ok(Self {
            ts,
            platform: raw.platform,
            ms_played: raw.ms_played,
            conn_country,
            ip_addr,
            master_metadata_track_name: raw.master_metadata_track_name,
            master_metadata_album_artist_name: raw.master_metadata_album_artist_name,
            master_metadata_album_album_name: raw.master_metadata_album_album_name,
            spotify_track_uri: raw.spotify_track_uri,
            episode_name: raw.episode_name,
            episode_show_name: raw.episode_show_name,
            spotify_episode_uri: raw.spotify_episode_uri,
            audiobook_title: raw.audiobook_title,
            audiobook_uri: raw.audiobook_uri,
            audiobook_chapter_uri: raw.audiobook_chapter_uri,
            audiobook_chapter_title: raw.audiobook_chapter_title,
            reason_start: raw.reason_start,
            reason_end: raw.reason_end,
            shuffle: raw.shuffle,
            skipped: raw.skipped,
            offline: raw.offline,
            offline_timestamp: raw.offline_timestamp,
            incognito_mode: raw.incognito_mode,
        })
    }

    /// Validate one raw JSON value.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, RecordValidationError> {
        let raw: RawPlaybackEvent = serde_json::from_value(value.clone())?;
        Self::from_raw(raw)
    }

    /// Classify this record by which identifier field is populated.
    pub fn content_kind(&self) -> ContentKind {
        if self.spotify_track_uri.is_some() {
            ContentKind::Track
        } else if self.spotify_episode_uri.is_some() {
            ContentKind::Episode
        } else if self.audiobook_chapter_uri.is_some() {
            ContentKind::AudiobookChapter
        } else {
            ContentKind::Untyped
        }
    }
}

/// Validate a slice of raw JSON events, returning the valid records and the
/// number of rejects. Each rejection is logged at warning level with its
/// position in the input array.
pub fn validate_events(events: &[serde_json::Value]) -> (Vec<PlaybackRecord>, usize) {
    let mut valid = Vec::with_capacity(events.len());
    let mut rejected = 0usize;

    for (index, event) in events.iter().enumerate() {
        match PlaybackRecord::from_value(event) {
            Ok(record) => valid.push(record),
            Err(e) => {
                rejected += 1;
                warn!("Rejected record {}: {}", index, e);
            }
        }
    }

    (valid, rejected)
}
