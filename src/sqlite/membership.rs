use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::{SqliteStore, db_error, id};
use crate::StoreError;
use crate::repository::{GroupMembership, GroupMembershipRepository};

#[derive(FromRow)]
struct MembershipRecord {
    id: i64,
    tenant_id: i64,
    account_id: i64,
    group_id: i64,
    created_at: DateTime<Utc>,
}

impl From<MembershipRecord> for GroupMembership {
    fn from(row: MembershipRecord) -> Self {
        GroupMembership {
            id: row.id as u64,
            tenant_id: row.tenant_id as u64,
            account_id: row.account_id as u64,
            group_id: row.group_id as u64,
            created_at: row.created_at,
        }
    }
}

/// Adds a membership on `conn` after checking both rows share a directory.
pub(super) async fn insert_membership(
    conn: &mut SqliteConnection,
    tenant_id: u64,
    account_id: u64,
    group_id: u64,
) -> Result<GroupMembership, StoreError> {
    let directories: Option<(Option<i64>, Option<i64>)> = sqlx::query_as(
        "SELECT (SELECT directory_id FROM accounts WHERE id = ?1 AND tenant_id = ?3), \
                (SELECT directory_id FROM groups WHERE id = ?2 AND tenant_id = ?3)",
    )
    .bind(id(account_id))
    .bind(id(group_id))
    .bind(id(tenant_id))
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("add_membership"))?;

    match directories {
        Some((Some(account_directory), Some(group_directory))) => {
            if account_directory != group_directory {
                return Err(StoreError::validation(
                    "account and group belong to different directories",
                ));
            }
        }
        _ => return Err(StoreError::NotFound),
    }

    let row: MembershipRecord = sqlx::query_as(
        "INSERT INTO group_memberships (tenant_id, account_id, group_id, created_at) \
         VALUES (?, ?, ?, ?) RETURNING id, tenant_id, account_id, group_id, created_at",
    )
    .bind(id(tenant_id))
    .bind(id(account_id))
    .bind(id(group_id))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("add_membership"))?;

    Ok(row.into())
}

#[async_trait]
impl GroupMembershipRepository for SqliteStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn add_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<GroupMembership, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("add_membership"))?;
        insert_membership(&mut conn, tenant_id, account_id, group_id).await
    }

    async fn find_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<Option<GroupMembership>, StoreError> {
        let row: Option<MembershipRecord> = sqlx::query_as(
            "SELECT id, tenant_id, account_id, group_id, created_at FROM group_memberships \
             WHERE tenant_id = ? AND account_id = ? AND group_id = ?",
        )
        .bind(id(tenant_id))
        .bind(id(account_id))
        .bind(id(group_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_membership"))?;

        Ok(row.map(Into::into))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn remove_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "DELETE FROM group_memberships WHERE tenant_id = ? AND account_id = ? AND group_id = ?",
        )
        .bind(id(tenant_id))
        .bind(id(account_id))
        .bind(id(group_id))
        .execute(&self.pool)
        .await
        .map_err(db_error("remove_membership"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
