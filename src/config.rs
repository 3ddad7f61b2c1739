use std::env;
use std::path::PathBuf;

use crate::db::Storage;
use crate::error::{AppError, AppResult};

/// Default database file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "data/bookkeeper.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    /// `None` opens a fresh connection for every operation; `Some(n)` keeps
    /// a pool of up to `n` connections.
    pub pool_size: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            pool_size: None,
        }
    }
}

impl Config {
    /// Reads `BOOKKEEPER_DATABASE_PATH` and `BOOKKEEPER_POOL_SIZE`, after
    /// loading a `.env` file if one is present.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(
            env::var("BOOKKEEPER_DATABASE_PATH").ok(),
            env::var("BOOKKEEPER_POOL_SIZE").ok(),
        )
    }

    pub fn from_vars(database_url: Option<String>, pool_size: Option<String>) -> AppResult<Self> {
        let database_path = database_url
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                PathBuf::from(
                    v.strip_prefix("sqlite://")
                        .or_else(|| v.strip_prefix("sqlite:"))
                        .unwrap_or(&v),
                )
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let pool_size = match pool_size.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) => None,
                Ok(n) => Some(n),
                Err(_) => {
                    return Err(AppError::Validation(format!(
                        "BOOKKEEPER_POOL_SIZE must be a non-negative integer, got '{}'",
                        raw
                    )))
                }
            },
        };

        Ok(Self {
            database_path,
            pool_size,
        })
    }

    pub fn storage(&self) -> AppResult<Storage> {
        match self.pool_size {
            Some(size) => Storage::pooled(&self.database_path, size),
            None => Ok(Storage::file(&self.database_path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(None, None).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_strips_sqlite_prefix() {
        let config = Config::from_vars(Some("sqlite://tmp/books.db".into()), None).unwrap();
        assert_eq!(config.database_path, PathBuf::from("tmp/books.db"));

        let config = Config::from_vars(Some("sqlite:books.db".into()), None).unwrap();
        assert_eq!(config.database_path, PathBuf::from("books.db"));
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(
            Config::from_vars(None, Some("4".into())).unwrap().pool_size,
            Some(4)
        );
        assert_eq!(Config::from_vars(None, Some("0".into())).unwrap().pool_size, None);
        assert!(matches!(
            Config::from_vars(None, Some("many".into())),
            Err(AppError::Validation(_))
        ));
    }
}
