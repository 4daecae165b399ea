//! Postgres migrations, embedded at compile time from `migrations/core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use storegraph::postgres::migrations;
//! use sqlx::PgPool;
//!
//! async fn setup_database(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//!     migrations::run(pool).await
//! }
//! ```

use sqlx::PgPool;

/// Creates the directory, group, account, organization, application,
/// mapping and link tables.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations/core").run(pool).await
}
