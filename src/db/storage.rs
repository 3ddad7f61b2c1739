use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{trace, warn};

use crate::db::pool::{create_pool, open_connection, DbPool};
use crate::error::{AppError, AppResult};

/// Where records live and how a connection to them is obtained.
///
/// Both strategies hand out one connection per operation; `PerOperation`
/// opens and closes the database file around every call, `Pooled` checks a
/// connection out of an r2d2 pool and returns it afterwards.
#[derive(Clone)]
pub enum Storage {
    PerOperation(PathBuf),
    Pooled { path: PathBuf, pool: DbPool },
}

impl Storage {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Storage::PerOperation(path.into())
    }

    pub fn pooled(path: impl Into<PathBuf>, max_size: u32) -> AppResult<Self> {
        let path = path.into();
        let pool = create_pool(&path, max_size)?;
        Ok(Storage::Pooled { path, pool })
    }

    pub fn path(&self) -> &Path {
        match self {
            Storage::PerOperation(path) => path,
            Storage::Pooled { path, .. } => path,
        }
    }

    /// Same connection strategy, different database file.
    pub fn relocate(&self, path: impl Into<PathBuf>) -> AppResult<Self> {
        match self {
            Storage::PerOperation(_) => Ok(Storage::file(path)),
            Storage::Pooled { pool, .. } => Storage::pooled(path, pool.max_size()),
        }
    }

    /// Runs `f` against a connection that is released as soon as `f` returns.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> AppResult<T>,
    ) -> AppResult<T> {
        match self {
            Storage::PerOperation(path) => {
                trace!(db = %path.display(), "Opening connection");
                let conn = open_connection(path)?;
                let result = f(&conn);
                match conn.close() {
                    Ok(()) => result,
                    Err((_, e)) => {
                        warn!(db = %path.display(), error = %e, "Failed to close connection");
                        result.and(Err(AppError::Database(e)))
                    }
                }
            }
            Storage::Pooled { pool, .. } => {
                let conn = pool.get()?;
                f(&conn)
            }
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::PerOperation(path) => f.debug_tuple("PerOperation").field(path).finish(),
            Storage::Pooled { path, pool } => f
                .debug_struct("Pooled")
                .field("path", path)
                .field("max_size", &pool.max_size())
                .finish(),
        }
    }
}
