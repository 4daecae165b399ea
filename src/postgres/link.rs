use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use super::account::insert_account;
use super::membership::insert_membership;
use super::{PostgresStore, db_error, id, parse_status};
use crate::StoreError;
use crate::repository::{
    Account, AccountLink, AccountLinkRepository, AccountLinkingPolicy, CreateAccount,
    ProvisionTarget,
};

#[derive(FromRow)]
struct LinkRecord {
    id: i64,
    tenant_id: i64,
    left_account_id: i64,
    right_account_id: i64,
    created_at: DateTime<Utc>,
}

impl From<LinkRecord> for AccountLink {
    fn from(row: LinkRecord) -> Self {
        AccountLink {
            id: row.id as u64,
            tenant_id: row.tenant_id as u64,
            left_account_id: row.left_account_id as u64,
            right_account_id: row.right_account_id as u64,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct PolicyRecord {
    tenant_id: i64,
    application_id: i64,
    status: String,
    automatic_provisioning: String,
}

impl TryFrom<PolicyRecord> for AccountLinkingPolicy {
    type Error = StoreError;

    fn try_from(row: PolicyRecord) -> Result<Self, Self::Error> {
        Ok(AccountLinkingPolicy {
            tenant_id: row.tenant_id as u64,
            application_id: row.application_id as u64,
            status: parse_status(&row.status)?,
            automatic_provisioning: parse_status(&row.automatic_provisioning)?,
        })
    }
}

async fn insert_link(
    conn: &mut PgConnection,
    tenant_id: u64,
    account_id: u64,
    other_account_id: u64,
) -> Result<AccountLink, StoreError> {
    if account_id == other_account_id {
        return Err(StoreError::validation("an account cannot be linked to itself"));
    }

    let found: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM accounts WHERE tenant_id = $1 AND id IN ($2, $3)",
    )
    .bind(id(tenant_id))
    .bind(id(account_id))
    .bind(id(other_account_id))
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("create_link"))?;
    if found != 2 {
        return Err(StoreError::NotFound);
    }

    let (left, right) = AccountLink::normalize(account_id, other_account_id);
    let row: LinkRecord = sqlx::query_as(
        "INSERT INTO account_links (tenant_id, left_account_id, right_account_id) VALUES ($1, $2, $3) \
         RETURNING id, tenant_id, left_account_id, right_account_id, created_at",
    )
    .bind(id(tenant_id))
    .bind(id(left))
    .bind(id(right))
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("create_link"))?;

    Ok(row.into())
}

#[async_trait]
impl AccountLinkRepository for PostgresStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn create_link(
        &self,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
    ) -> Result<AccountLink, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("create_link"))?;
        insert_link(&mut conn, tenant_id, account_id, other_account_id).await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_link(
        &self,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
    ) -> Result<(), StoreError> {
        let (left, right) = AccountLink::normalize(account_id, other_account_id);
        let result = sqlx::query(
            "DELETE FROM account_links WHERE tenant_id = $1 AND left_account_id = $2 AND right_account_id = $3",
        )
        .bind(id(tenant_id))
        .bind(id(left))
        .bind(id(right))
        .execute(&self.pool)
        .await
        .map_err(db_error("delete_link"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn find_linked_account_ids(
        &self,
        tenant_id: u64,
        account_id: u64,
    ) -> Result<Vec<u64>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT CASE WHEN left_account_id = $2 THEN right_account_id ELSE left_account_id END AS other \
             FROM account_links WHERE tenant_id = $1 AND (left_account_id = $2 OR right_account_id = $2) \
             ORDER BY other",
        )
        .bind(id(tenant_id))
        .bind(id(account_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("find_linked_account_ids"))?;

        Ok(ids.into_iter().map(|v| v as u64).collect())
    }

    async fn find_linking_policy(
        &self,
        tenant_id: u64,
        application_id: u64,
    ) -> Result<Option<AccountLinkingPolicy>, StoreError> {
        let row: Option<PolicyRecord> = sqlx::query_as(
            "SELECT tenant_id, application_id, status, automatic_provisioning \
             FROM account_linking_policies WHERE tenant_id = $1 AND application_id = $2",
        )
        .bind(id(tenant_id))
        .bind(id(application_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_linking_policy"))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn save_linking_policy(
        &self,
        policy: AccountLinkingPolicy,
    ) -> Result<AccountLinkingPolicy, StoreError> {
        // the INSERT ... SELECT yields no row when the application is missing
        let result = sqlx::query(
            "INSERT INTO account_linking_policies (application_id, tenant_id, status, automatic_provisioning) \
             SELECT id, tenant_id, $3, $4 FROM applications WHERE id = $1 AND tenant_id = $2 \
             ON CONFLICT (application_id) DO UPDATE \
             SET status = EXCLUDED.status, automatic_provisioning = EXCLUDED.automatic_provisioning, updated_at = NOW()",
        )
        .bind(id(policy.application_id))
        .bind(id(policy.tenant_id))
        .bind(policy.status.as_str())
        .bind(policy.automatic_provisioning.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("save_linking_policy"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(policy)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, source), fields(source_account_id = source.id), err)
    )]
    async fn provision_linked_account(
        &self,
        source: &Account,
        target: ProvisionTarget,
    ) -> Result<Account, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("provision_linked_account"))?;

        let account = insert_account(&mut tx, &CreateAccount::copy_of(source, target.directory_id)).await?;
        if let Some(group_id) = target.group_id {
            insert_membership(&mut tx, source.tenant_id, account.id, group_id).await?;
        }
        insert_link(&mut tx, source.tenant_id, source.id, account.id).await?;

        tx.commit()
            .await
            .map_err(db_error("provision_linked_account"))?;

        Ok(account)
    }
}
