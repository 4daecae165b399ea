//! `PostgreSQL` backend.
//!
//! [`PostgresStore`] implements every repository trait over one pool.
//! Mapping writes lock the parent row with `SELECT ... FOR UPDATE` so that
//! concurrent writers to the same application or organization serialize.
//! Enable the `sqlx_postgres` feature to use it.

mod account;
mod link;
mod mapping;
mod membership;
pub mod migrations;
mod reachability;
mod store;

use sqlx::PgPool;

use crate::StoreError;
use crate::repository::Status;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

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
