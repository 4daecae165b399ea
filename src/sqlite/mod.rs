//! `SQLite` backend.
//!
//! [`SqliteStore`] implements every repository trait over one connection
//! pool. Reachability queries run the SQL rendered for each derived relation
//! with `?N` placeholders. Enable the `sqlx_sqlite` feature to use it.

mod account;
mod link;
mod mapping;
mod membership;
pub mod migrations;
mod reachability;
mod store;

use sqlx::SqlitePool;

use crate::StoreError;
use crate::repository::Status;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps a driver error to [`StoreError`], logging anything unexpected.
fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        if matches!(e, sqlx::Error::RowNotFound) {
            return StoreError::NotFound;
        }
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::AlreadyExists;
            }
        }
        log::error!(
            target: "storegraph",
            "msg=\"database error\", operation=\"{operation}\", error=\"{e}\""
        );
        StoreError::DatabaseError(e.to_string())
    }
}

fn parse_status(value: &str) -> Result<Status, StoreError> {
    Status::parse(value).ok_or_else(|| StoreError::Internal(format!("unknown status {value:?}")))
}

fn id(value: u64) -> i64 {
    value as i64
}
