use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Status;
use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub tenant_id: u64,
    pub directory_id: u64,
    pub email: String,
    pub username: String,
    pub given_name: String,
    pub middle_name: Option<String>,
    pub surname: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Case-folded email or username. Backends store it next to the original
/// value and compare logins and uniqueness against it.
pub fn login_key(value: &str) -> String {
    value.to_lowercase()
}

#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub tenant_id: u64,
    pub directory_id: u64,
    pub email: String,
    pub username: String,
    pub given_name: String,
    pub middle_name: Option<String>,
    pub surname: String,
    pub hashed_password: String,
    pub status: Status,
}

impl CreateAccount {
    /// A copy of `source`'s profile and password hash, placed in another
    /// directory.
    pub fn copy_of(source: &Account, directory_id: u64) -> Self {
        Self {
            tenant_id: source.tenant_id,
            directory_id,
            email: source.email.clone(),
            username: source.username.clone(),
            given_name: source.given_name.clone(),
            middle_name: source.middle_name.clone(),
            surname: source.surname.clone(),
            hashed_password: source.hashed_password.clone(),
            status: Status::Enabled,
        }
    }
}

#[cfg(any(test, feature = "mocks"))]
impl CreateAccount {
    pub fn mock(tenant_id: u64, directory_id: u64, email: &str, hashed_password: &str) -> Self {
        let username = email.split('@').next().unwrap_or(email).to_owned();
        Self {
            tenant_id,
            directory_id,
            email: email.to_owned(),
            username,
            given_name: "Test".to_owned(),
            middle_name: None,
            surname: "User".to_owned(),
            hashed_password: hashed_password.to_owned(),
            status: Status::Enabled,
        }
    }
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Creates an account. Email and username are unique per directory.
    async fn create_account(&self, data: CreateAccount) -> Result<Account, StoreError>;
    async fn find_account(&self, tenant_id: u64, id: u64) -> Result<Option<Account>, StoreError>;
    async fn set_account_status(
        &self,
        tenant_id: u64,
        id: u64,
        status: Status,
    ) -> Result<(), StoreError>;
    /// Deletes an account with its group memberships and account links.
    async fn delete_account(&self, tenant_id: u64, id: u64) -> Result<(), StoreError>;
}
