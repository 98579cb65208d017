pub mod migrations;
pub mod models;
pub mod schema;
pub mod store;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::error::StoreError;
use models::*;
use store::Session;

pub struct Database {
    conn: Mutex<Connection>,
    pub path: PathBuf,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Performance pragmas
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;",
        )?;

        let db = Self::init(conn, path.to_path_buf())?;
        info!("Opened database: {}", path.display());
        Ok(db)
    }

    /// Fresh private in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        rusqlite::vtab::array::load_module(&conn).context("Failed to register rarray module")?;
        schema::create_schema(&conn)?;
        migrations::run_migrations(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Default database path: ~/.wavesearch/wavesearch.db
    pub fn default_db_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".wavesearch").join("wavesearch.db"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    /// Acquire the connection for one request. Released when the session drops.
    pub fn session(&self) -> Result<Session<'_>, StoreError> {
        Ok(Session::new(self.lock()?))
    }

    /// Insert segments in one transaction, in slice order (ids ascend with it).
    pub fn insert_segments(&self, segments: &[NewSegment]) -> Result<usize> {
        self.insert_batch(None, segments)
    }

    /// Insert one broadcast file's segments and record the file as ingested,
    /// atomically.
    pub fn insert_file_segments(&self, file_name: &str, segments: &[NewSegment]) -> Result<usize> {
        self.insert_batch(Some(file_name), segments)
    }

    fn insert_batch(&self, file_name: Option<&str>, segments: &[NewSegment]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO segments (station, state, speaker, dt, start_time, end_time, text, source_file)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for seg in segments {
                stmt.execute(rusqlite::params![
                    seg.station,
                    seg.state,
                    seg.speaker,
                    seg.dt,
                    seg.start_time,
                    seg.end_time,
                    seg.text,
                    file_name,
                ])?;
            }
        }

        if let Some(name) = file_name {
            tx.execute(
                "INSERT OR REPLACE INTO ingested_files (name, segments) VALUES (?1, ?2)",
                rusqlite::params![name, segments.len() as i64],
            )?;
        }

        tx.commit()?;
        Ok(segments.len())
    }

    /// Check if a broadcast file has already been ingested.
    pub fn file_ingested(&self, file_name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM ingested_files WHERE name = ?1",
                [file_name],
                |r| r.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };

        let segments = count("SELECT COUNT(*) FROM segments")?;
        let stations = count("SELECT COUNT(DISTINCT station) FROM segments")?;
        let states = count("SELECT COUNT(DISTINCT state) FROM segments")?;
        let speakers = count("SELECT COUNT(DISTINCT speaker) FROM segments")?;
        let ingested_files = count("SELECT COUNT(*) FROM ingested_files")?;

        let (first_dt, last_dt): (Option<String>, Option<String>) =
            conn.query_row("SELECT MIN(dt), MAX(dt) FROM segments", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })?;

        let mut stmt = conn
            .prepare("SELECT station, COUNT(*) FROM segments GROUP BY station ORDER BY station")?;
        let station_rows = stmt.query_map([], |row| {
            Ok(StationCount {
                station: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        let mut by_station = Vec::new();
        for row in station_rows {
            by_station.push(row?);
        }

        let db_size_bytes = std::fs::metadata(&self.path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(DbStats {
            segments,
            stations,
            states,
            speakers,
            ingested_files,
            first_dt,
            last_dt,
            by_station,
            db_size_bytes,
        })
    }

    /// Stored schema version, if recorded.
    pub fn schema_version(&self) -> Result<Option<String>> {
        let conn = self.lock()?;
        let version = conn
            .query_row(
                "SELECT value FROM wavesearch_meta WHERE key = 'schema_version'",
                [],
                |r| r.get(0),
            )
            .optional()?;
        Ok(version)
    }

    pub fn migrations(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        migrations::applied_migrations(&conn)
    }

    /// Rebuild the FTS5 index from scratch.
    pub fn reindex(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("INSERT INTO segments_fts(segments_fts) VALUES('rebuild');")?;
        info!("FTS5 index rebuilt");
        Ok(())
    }
}
