use rusqlite::{Connection, Result};
use std::fs;
use std::path::Path;

const DB_SCHEMA_VERSION: i64 = 2;

/// Create or upgrade the feedback schema. Statements run one after another on
/// the same connection, so the indices never race the table they cover.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("feedback database reports newer schema version {version}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS feedbacks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user TEXT NOT NULL,
            text TEXT NOT NULL CHECK (length(text) >= 1 AND length(text) <= 280),
            key TEXT NOT NULL,
            parent TEXT NOT NULL,
            child TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0 CHECK (resolved = 0 OR resolved = 1),
            approved INTEGER NOT NULL DEFAULT 0 CHECK (approved = 0 OR approved = 1),
            created TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(key)
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_user_parent_child ON feedbacks(user, parent, child);
        CREATE INDEX IF NOT EXISTS idx_resolved ON feedbacks(resolved);
        CREATE INDEX IF NOT EXISTS idx_approved ON feedbacks(approved);
        ",
    )
}

/// Open the database file, creating its directory when missing. The schema is
/// left to [`initialize_schema`].
pub fn open_database(db_path: &Path) -> crate::error::Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(Connection::open(db_path)?)
}
