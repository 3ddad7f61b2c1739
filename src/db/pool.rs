use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

use crate::error::AppResult;

pub type DbPool = Pool<SqliteConnectionManager>;

const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA foreign_keys = ON;
     PRAGMA busy_timeout = 5000;";

fn ensure_parent_dir(database_path: &Path) -> std::io::Result<()> {
    match database_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Opens a standalone connection with the same pragmas pooled connections get.
/// The connection is closed when dropped.
pub fn open_connection(database_path: &Path) -> AppResult<Connection> {
    ensure_parent_dir(database_path)?;
    let conn = Connection::open(database_path)?;
    conn.execute_batch(CONNECTION_PRAGMAS)?;
    Ok(conn)
}

pub fn create_pool(database_path: &Path, max_size: u32) -> AppResult<DbPool> {
    ensure_parent_dir(database_path)?;

    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));

    Ok(Pool::builder().max_size(max_size).build(manager)?)
}
