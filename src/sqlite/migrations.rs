//! Embedded `SQLite` migrations.
//!
//! # Example
//!
//! ```rust,ignore
//! use storegraph::sqlite::migrations;
//! use sqlx::SqlitePool;
//!
//! async fn setup_database(pool: &SqlitePool) -> Result<(), sqlx::Error> {
//!     migrations::run(pool).await?;
//!     Ok(())
//! }
//! ```

use sqlx::{Executor, SqlitePool};

const CORE_MIGRATIONS: &[(&str, &str)] = &[
    (
        "20260301000001_create_directories_and_groups",
        include_str!("../../migrations_sqlite/core/20260301000001_create_directories_and_groups.sql"),
    ),
    (
        "20260301000002_create_accounts",
        include_str!("../../migrations_sqlite/core/20260301000002_create_accounts.sql"),
    ),
    (
        "20260301000003_create_organizations_applications_mappings",
        include_str!(
            "../../migrations_sqlite/core/20260301000003_create_organizations_applications_mappings.sql"
        ),
    ),
    (
        "20260301000004_create_account_links",
        include_str!("../../migrations_sqlite/core/20260301000004_create_account_links.sql"),
    ),
];

/// Runs every migration not yet recorded in `_storegraph_migrations`.
pub async fn run(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    pool.execute(
        r"
        CREATE TABLE IF NOT EXISTS _storegraph_migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        )
        ",
    )
    .await?;

    run_migrations(pool, CORE_MIGRATIONS).await
}

/// Statements are split on `;`, so migrations must not contain semicolons
/// inside string literals or comments.
async fn run_migrations(pool: &SqlitePool, migrations: &[(&str, &str)]) -> Result<(), sqlx::Error> {
    for (name, sql) in migrations {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _storegraph_migrations WHERE name = ?)")
                .bind(*name)
                .fetch_one(pool)
                .await?;

        if applied {
            continue;
        }

        let mut tx = pool.begin().await?;
        for statement in sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                (&mut *tx).execute(trimmed).await?;
            }
        }
        sqlx::query("INSERT INTO _storegraph_migrations (name) VALUES (?)")
            .bind(*name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::debug!(target: "storegraph", "msg=\"migration applied\", name={name}");
    }
    Ok(())
}
