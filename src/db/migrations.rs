use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use super::schema;

/// Run all pending migrations in id order. Each one is recorded in
/// `wavesearch_migrations` and applied at most once.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS wavesearch_migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );",
    )?;

    run_migration(conn, 1, "add_station_dt_index", |c| {
        c.execute_batch("CREATE INDEX IF NOT EXISTS idx_segments_station_dt ON segments(station, dt);")?;
        Ok(())
    })?;

    // Databases created before stemming was enabled carry a unicode61-only index.
    run_migration(conn, 2, "fts_porter_tokenizer", |c| {
        c.execute_batch("DROP TABLE IF EXISTS segments_fts;")?;
        c.execute_batch(&schema::fts_table_sql())?;
        c.execute_batch("INSERT INTO segments_fts(segments_fts) VALUES('rebuild');")?;
        Ok(())
    })?;

    Ok(())
}

fn run_migration<F>(conn: &Connection, id: i64, name: &str, f: F) -> Result<()>
where
    F: FnOnce(&Connection) -> Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM wavesearch_migrations WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;

    if already_applied {
        return Ok(());
    }

    f(conn)?;

    conn.execute(
        "INSERT INTO wavesearch_migrations (id, name) VALUES (?1, ?2)",
        rusqlite::params![id, name],
    )?;

    info!("Applied migration {id}: {name}");
    Ok(())
}

/// Names of applied migrations, in order.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM wavesearch_migrations ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}
