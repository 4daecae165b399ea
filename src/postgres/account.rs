use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection};

use super::{PostgresStore, db_error, id, parse_status};
use crate::StoreError;
use crate::repository::{
    Account, AccountRepository, AccountStoreRepository, CreateAccount, NodeRef, Status, login_key,
};

const ACCOUNT_COLUMNS: &str = "id, tenant_id, directory_id, email, username, given_name, middle_name, surname, hashed_password, status, created_at, updated_at";

#[derive(FromRow)]
pub(super) struct AccountRecord {
    id: i64,
    tenant_id: i64,
    directory_id: i64,
    email: String,
    username: String,
    given_name: String,
    middle_name: Option<String>,
    surname: String,
    hashed_password: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRecord> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRecord) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id as u64,
            tenant_id: row.tenant_id as u64,
            directory_id: row.directory_id as u64,
            email: row.email,
            username: row.username,
            given_name: row.given_name,
            middle_name: row.middle_name,
            surname: row.surname,
            hashed_password: row.hashed_password,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(super) async fn insert_account(
    conn: &mut PgConnection,
    data: &CreateAccount,
) -> Result<Account, StoreError> {
    let directory_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM directories WHERE id = $1 AND tenant_id = $2)",
    )
    .bind(id(data.directory_id))
    .bind(id(data.tenant_id))
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("insert_account"))?;

    if !directory_exists {
        return Err(StoreError::validation(format!(
            "directory {} does not exist",
            data.directory_id
        )));
    }

    let row: AccountRecord = sqlx::query_as(&format!(
        "INSERT INTO accounts (tenant_id, directory_id, email, username, email_key, username_key, given_name, middle_name, surname, hashed_password, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(id(data.tenant_id))
    .bind(id(data.directory_id))
    .bind(&data.email)
    .bind(&data.username)
    .bind(login_key(&data.email))
    .bind(login_key(&data.username))
    .bind(&data.given_name)
    .bind(&data.middle_name)
    .bind(&data.surname)
    .bind(&data.hashed_password)
    .bind(data.status.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("insert_account"))?;

    row.try_into()
}

#[async_trait]
impl AccountRepository for PostgresStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn create_account(&self, data: CreateAccount) -> Result<Account, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("create_account"))?;
        insert_account(&mut conn, &data).await
    }

    async fn find_account(&self, tenant_id: u64, account_id: u64) -> Result<Option<Account>, StoreError> {
        let row: Option<AccountRecord> = sqlx::query_as(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(id(account_id))
        .bind(id(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_account"))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn set_account_status(
        &self,
        tenant_id: u64,
        account_id: u64,
        status: Status,
    ) -> Result<(), StoreError> {
        self.set_status(tenant_id, NodeRef::account(account_id), status)
            .await
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_account(&self, tenant_id: u64, account_id: u64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1 AND tenant_id = $2")
            .bind(id(account_id))
            .bind(id(tenant_id))
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_account"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }
}
