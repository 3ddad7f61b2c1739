//! Shared test utilities for integration tests.
//!
//! `TestDb` owns a temporary directory holding a fresh database file. The
//! directory (and the database) is removed when the `TestDb` is dropped.

#![allow(dead_code)]

use std::path::PathBuf;

use bookkeeper::db::Storage;
use bookkeeper::services::Bookkeeper;
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

pub struct TestDb {
    dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Path of a database file inside the temp dir.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Per-operation storage on the default test database.
    pub fn storage(&self) -> Storage {
        Storage::file(self.path("test.db"))
    }

    pub fn pooled_storage(&self, max_size: u32) -> Storage {
        Storage::pooled(self.path("pooled.db"), max_size).expect("Failed to create pool")
    }

    pub fn bookkeeper(&self) -> Bookkeeper {
        Bookkeeper::open(self.storage()).expect("Failed to open bookkeeper")
    }
}

impl Default for TestDb {
    fn default() -> Self {
        Self::new()
    }
}

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}
