//! SQLite implementation of the history store.

use super::schema::HISTORY_SCHEMA_SQL;
use super::{FactRow, HistoryStore};
use crate::etl::{AudiobookChapterDimension, EpisodeDimension, TrackDimension};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQLite implementation of HistoryStore.
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open or create a history database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open history database: {:?}", path))?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(HISTORY_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<TrackDimension> {
        Ok(TrackDimension {
            spotify_uri: row.get("spotify_uri")?,
            name: row.get("name")?,
            artist_name: row.get("artist_name")?,
            album_name: row.get("album_name")?,
        })
    }

    fn row_to_episode(row: &rusqlite::Row) -> rusqlite::Result<EpisodeDimension> {
        Ok(EpisodeDimension {
            spotify_uri: row.get("spotify_uri")?,
            name: row.get("name")?,
            show_name: row.get("show_name")?,
        })
    }

    fn row_to_chapter(row: &rusqlite::Row) -> rusqlite::Result<AudiobookChapterDimension> {
        Ok(AudiobookChapterDimension {
            chapter_uri: row.get("chapter_uri")?,
            chapter_title: row.get("chapter_title")?,
            audiobook_title: row.get("audiobook_title")?,
            audiobook_uri: row.get("audiobook_uri")?,
        })
    }
}

impl HistoryStore for SqliteHistoryStore {
    // ==================== Dimension Operations ====================

    fn insert_track_if_absent(&self, track: &TrackDimension) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        // INSERT OR IGNORE absorbs natural-key conflicts, including races
        // with a concurrent run.
        let changed = conn.execute(
            r#"
            INSERT OR IGNORE INTO tracks (spotify_uri, name, artist_name, album_name)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                track.spotify_uri,
                track.name,
                track.artist_name,
                track.album_name,
            ],
        )?;
        Ok(changed == 1)
    }

    fn insert_episode_if_absent(&self, episode: &EpisodeDimension) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"
            INSERT OR IGNORE INTO episodes (spotify_uri, name, show_name)
            VALUES (?1, ?2, ?3)
            "#,
            params![episode.spotify_uri, episode.name, episode.show_name],
        )?;
        Ok(changed == 1)
    }

    fn insert_chapter_if_absent(&self, chapter: &AudiobookChapterDimension) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"
            INSERT OR IGNORE INTO audiobook_chapters
                (chapter_uri, chapter_title, audiobook_title, audiobook_uri)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                chapter.chapter_uri,
                chapter.chapter_title,
                chapter.audiobook_title,
                chapter.audiobook_uri,
            ],
        )?;
        Ok(changed == 1)
    }

    fn get_track(&self, spotify_uri: &str) -> Result<Option<TrackDimension>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM tracks WHERE spotify_uri = ?1",
                params![spotify_uri],
                Self::row_to_track,
            )
            .optional()?;
        Ok(result)
    }

    fn get_episode(&self, spotify_uri: &str) -> Result<Option<EpisodeDimension>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM episodes WHERE spotify_uri = ?1",
                params![spotify_uri],
                Self::row_to_episode,
            )
            .optional()?;
        Ok(result)
    }

    fn get_chapter(&self, chapter_uri: &str) -> Result<Option<AudiobookChapterDimension>> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM audiobook_chapters WHERE chapter_uri = ?1",
                params![chapter_uri],
                Self::row_to_chapter,
            )
            .optional()?;
        Ok(result)
    }

    // ==================== Fact Operations ====================

    fn insert_fact_batch(&self, rows: &[FactRow]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO playback_facts (
                    ts, platform, ms_played, conn_country, ip_addr,
                    master_metadata_track_name, master_metadata_album_artist_name,
                    master_metadata_album_album_name, spotify_track_uri,
                    episode_name, episode_show_name, spotify_episode_uri,
                    audiobook_title, audiobook_uri, audiobook_chapter_uri,
                    audiobook_chapter_title,
                    reason_start, reason_end, shuffle, skipped, offline,
                    offline_timestamp, incognito_mode
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                    ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23
                )
                "#,
            )?;
            for row in rows {
                stmt.execute(params![
                    row.ts,
                    row.platform,
                    row.ms_played,
                    row.conn_country,
                    row.ip_addr,
                    row.master_metadata_track_name,
                    row.master_metadata_album_artist_name,
                    row.master_metadata_album_album_name,
                    row.spotify_track_uri,
                    row.episode_name,
                    row.episode_show_name,
                    row.spotify_episode_uri,
                    row.audiobook_title,
                    row.audiobook_uri,
                    row.audiobook_chapter_uri,
                    row.audiobook_chapter_title,
                    row.reason_start,
                    row.reason_end,
                    row.shuffle as i32,
                    row.skipped as i32,
                    row.offline as i32,
                    row.offline_timestamp,
                    row.incognito_mode as i32,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count_facts(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM playback_facts", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    fn dimension_counts(&self) -> Result<(usize, usize, usize)> {
        let conn = self.conn.lock().unwrap();
        let tracks: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |r| r.get(0))?;
        let episodes: i64 = conn.query_row("SELECT COUNT(*) FROM episodes", [], |r| r.get(0))?;
        let chapters: i64 =
            conn.query_row("SELECT COUNT(*) FROM audiobook_chapters", [], |r| r.get(0))?;
        Ok((tracks as usize, episodes as usize, chapters as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(uri: &str, name: &str) -> TrackDimension {
        TrackDimension {
            spotify_uri: uri.to_string(),
            name: Some(name.to_string()),
            artist_name: None,
            album_name: None,
        }
    }

    fn fact(uri: Option<&str>) -> FactRow {
        FactRow {
            ts: "2024-01-01T10:00:00+00:00".to_string(),
            platform: "ios".to_string(),
            ms_played: 5000,
            conn_country: "US".to_string(),
            ip_addr: "1.2.3.4".to_string(),
            master_metadata_track_name: None,
            master_metadata_album_artist_name: None,
            master_metadata_album_album_name: None,
            spotify_track_uri: uri.map(|s| s.to_string()),
            episode_name: None,
            episode_show_name: None,
            spotify_episode_uri: None,
            audiobook_title: None,
            audiobook_uri: None,
            audiobook_chapter_uri: None,
            audiobook_chapter_title: None,
            reason_start: "trackdone".to_string(),
            reason_end: "trackdone".to_string(),
            shuffle: false,
            skipped: false,
            offline: false,
            offline_timestamp: None,
            incognito_mode: false,
        }
    }

    #[test]
    fn test_insert_track_if_absent() {
        let store = SqliteHistoryStore::in_memory().unwrap();

        let inserted = store
            .insert_track_if_absent(&track("spotify:track:abc", "First"))
            .unwrap();
        assert!(inserted);

        // Second insert under the same key is a no-op, first values survive.
        let inserted = store
            .insert_track_if_absent(&track("spotify:track:abc", "Second"))
            .unwrap();
        assert!(!inserted);

        let stored = store.get_track("spotify:track:abc").unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("First"));
    }

    #[test]
    fn test_get_missing_dimension_is_none() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        assert!(store.get_track("spotify:track:missing").unwrap().is_none());
        assert!(store
            .get_episode("spotify:episode:missing")
            .unwrap()
            .is_none());
        assert!(store
            .get_chapter("spotify:chapter:missing")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_episode_and_chapter_upsert() {
        let store = SqliteHistoryStore::in_memory().unwrap();

        let episode = EpisodeDimension {
            spotify_uri: "spotify:episode:ep1".to_string(),
            name: Some("Pilot".to_string()),
            show_name: Some("A Show".to_string()),
        };
        assert!(store.insert_episode_if_absent(&episode).unwrap());
        assert!(!store.insert_episode_if_absent(&episode).unwrap());

        let chapter = AudiobookChapterDimension {
            chapter_uri: "spotify:chapter:ch1".to_string(),
            chapter_title: Some("Chapter One".to_string()),
            audiobook_title: Some("A Book".to_string()),
            audiobook_uri: Some("spotify:audiobook:bk1".to_string()),
        };
        assert!(store.insert_chapter_if_absent(&chapter).unwrap());
        assert!(!store.insert_chapter_if_absent(&chapter).unwrap());

        assert_eq!(store.dimension_counts().unwrap(), (0, 1, 1));
    }

    #[test]
    fn test_fact_batch_is_transactional() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store
            .insert_track_if_absent(&track("spotify:track:abc", "Song"))
            .unwrap();

        let mut bad = fact(Some("spotify:track:abc"));
        bad.ms_played = -1; // violates the check constraint
        let rows = vec![fact(Some("spotify:track:abc")), bad];

        assert!(store.insert_fact_batch(&rows).is_err());
        // The whole batch rolled back, including the valid first row.
        assert_eq!(store.count_facts().unwrap(), 0);

        store.insert_fact_batch(&[fact(Some("spotify:track:abc"))]).unwrap();
        assert_eq!(store.count_facts().unwrap(), 1);
    }

    #[test]
    fn test_fact_with_missing_parent_fails() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let rows = vec![fact(Some("spotify:track:unknown"))];
        assert!(store.insert_fact_batch(&rows).is_err());
    }

    #[test]
    fn test_fact_with_null_fk_is_accepted() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store.insert_fact_batch(&[fact(None)]).unwrap();
        assert_eq!(store.count_facts().unwrap(), 1);
    }
}
