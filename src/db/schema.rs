use anyhow::Result;
use rusqlite::Connection;

pub const SCHEMA_VERSION: &str = "2";

/// English stemming over unicode61 word splitting: "elections" finds "election".
pub const FTS_TOKENIZER: &str = "porter unicode61";

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Version tracking
        CREATE TABLE IF NOT EXISTS wavesearch_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One row per utterance; id order is broadcast order
        CREATE TABLE IF NOT EXISTS segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            station TEXT NOT NULL,
            state TEXT NOT NULL,
            speaker TEXT,
            dt TEXT NOT NULL,
            start_time REAL NOT NULL DEFAULT 0,
            end_time REAL NOT NULL DEFAULT 0,
            text TEXT NOT NULL DEFAULT '',
            source_file TEXT
        );

        -- Ingestion checkpoint
        CREATE TABLE IF NOT EXISTS ingested_files (
            name TEXT PRIMARY KEY,
            segments INTEGER NOT NULL DEFAULT 0,
            ingested_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );

        -- Indexes for common filters
        CREATE INDEX IF NOT EXISTS idx_segments_station ON segments(station);
        CREATE INDEX IF NOT EXISTS idx_segments_state ON segments(state);
        CREATE INDEX IF NOT EXISTS idx_segments_speaker ON segments(speaker);
        CREATE INDEX IF NOT EXISTS idx_segments_dt ON segments(dt, id);


        -- segments insert
        CREATE TRIGGER IF NOT EXISTS segments_ai AFTER INSERT ON segments BEGIN
            INSERT INTO segments_fts(rowid, text) VALUES (new.id, new.text);
        END;

        -- segments delete
        CREATE TRIGGER IF NOT EXISTS segments_ad AFTER DELETE ON segments BEGIN
            INSERT INTO segments_fts(segments_fts, rowid, text)
            VALUES ('delete', old.id, old.text);
        END;

        -- segments update
        CREATE TRIGGER IF NOT EXISTS segments_au AFTER UPDATE OF text ON segments BEGIN
            INSERT INTO segments_fts(segments_fts, rowid, text)
            VALUES ('delete', old.id, old.text);
            INSERT INTO segments_fts(rowid, text) VALUES (new.id, new.text);
        END;
        ",
    )?;

    conn.execute_batch(&fts_table_sql())?;

    conn.execute(
        "INSERT OR REPLACE INTO wavesearch_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

/// FTS5 virtual table in content-sync mode over `segments.text`.
pub fn fts_table_sql() -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS segments_fts USING fts5(
            text,
            content='segments',
            content_rowid='id',
            tokenize='{FTS_TOKENIZER}'
        );"
    )
}
