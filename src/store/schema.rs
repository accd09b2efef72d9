//! Database schema for the streaming-history star schema.
//!
//! Three dimension tables keyed by Spotify URI plus one append-mostly fact
//! table. Check constraints mirror the validator rules as a backstop; the
//! validator remains the primary enforcement point.

/// SQL schema for the history database.
pub const HISTORY_SCHEMA_SQL: &str = r#"
-- Music track dimension
CREATE TABLE IF NOT EXISTS tracks (
    spotify_uri TEXT PRIMARY KEY CHECK (spotify_uri LIKE 'spotify:track:%'),
    name TEXT,
    artist_name TEXT,
    album_name TEXT,
    created_at INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int))
);

-- Podcast episode dimension
CREATE TABLE IF NOT EXISTS episodes (
    spotify_uri TEXT PRIMARY KEY CHECK (spotify_uri LIKE 'spotify:episode:%'),
    name TEXT,
    show_name TEXT,
    created_at INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int))
);

-- Audiobook chapter dimension
CREATE TABLE IF NOT EXISTS audiobook_chapters (
    chapter_uri TEXT PRIMARY KEY CHECK (chapter_uri LIKE 'spotify:%'),
    chapter_title TEXT,
    audiobook_title TEXT,
    audiobook_uri TEXT,
    created_at INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int))
);

-- One row per playback event
CREATE TABLE IF NOT EXISTS playback_facts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ts TEXT NOT NULL,
    platform TEXT NOT NULL,
    ms_played INTEGER NOT NULL CHECK (ms_played >= 0),
    conn_country TEXT NOT NULL CHECK (length(conn_country) = 2),
    ip_addr TEXT NOT NULL,

    -- Track fields (music playback only)
    master_metadata_track_name TEXT,
    master_metadata_album_artist_name TEXT,
    master_metadata_album_album_name TEXT,
    spotify_track_uri TEXT REFERENCES tracks(spotify_uri),

    -- Episode fields (podcast playback only)
    episode_name TEXT,
    episode_show_name TEXT,
    spotify_episode_uri TEXT REFERENCES episodes(spotify_uri),

    -- Audiobook fields (audiobook playback only)
    audiobook_title TEXT,
    audiobook_uri TEXT,
    audiobook_chapter_uri TEXT REFERENCES audiobook_chapters(chapter_uri),
    audiobook_chapter_title TEXT,

    -- Playback metadata
    reason_start TEXT NOT NULL,
    reason_end TEXT NOT NULL,
    shuffle INTEGER NOT NULL,
    skipped INTEGER NOT NULL,
    offline INTEGER NOT NULL,
    offline_timestamp INTEGER,
    incognito_mode INTEGER NOT NULL,

    created_at INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int))
);

-- Indexes for the analytics layer this schema feeds
CREATE INDEX IF NOT EXISTS idx_playback_facts_ts ON playback_facts(ts);
CREATE INDEX IF NOT EXISTS idx_playback_facts_platform ON playback_facts(platform);
CREATE INDEX IF NOT EXISTS idx_playback_facts_country ON playback_facts(conn_country);
CREATE INDEX IF NOT EXISTS idx_playback_facts_track_uri ON playback_facts(spotify_track_uri);
CREATE INDEX IF NOT EXISTS idx_playback_facts_episode_uri ON playback_facts(spotify_episode_uri);
CREATE INDEX IF NOT EXISTS idx_playback_facts_chapter_uri ON playback_facts(audiobook_chapter_uri);
CREATE INDEX IF NOT EXISTS idx_playback_facts_ms_played ON playback_facts(ms_played);
CREATE INDEX IF NOT EXISTS idx_playback_facts_ts_platform ON playback_facts(ts, platform);
CREATE INDEX IF NOT EXISTS idx_playback_facts_country_ts ON playback_facts(conn_country, ts);
"#;
