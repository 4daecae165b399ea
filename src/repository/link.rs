use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Account, AccountStoreRef, Status};
use crate::StoreError;

/// An undirected link between two accounts. Stored with
/// `left_account_id < right_account_id` so each pair has one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    pub id: u64,
    pub tenant_id: u64,
    pub left_account_id: u64,
    pub right_account_id: u64,
    pub created_at: DateTime<Utc>,
}

impl AccountLink {
    /// Orders a pair the way it is stored.
    pub fn normalize(a: u64, b: u64) -> (u64, u64) {
        if a <= b { (a, b) } else { (b, a) }
    }

    /// The account on the other side of the link from `account_id`.
    pub fn other(&self, account_id: u64) -> Option<u64> {
        if self.left_account_id == account_id {
            Some(self.right_account_id)
        } else if self.right_account_id == account_id {
            Some(self.left_account_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLinkingPolicy {
    pub tenant_id: u64,
    pub application_id: u64,
    pub status: Status,
    pub automatic_provisioning: Status,
}

impl AccountLinkingPolicy {
    /// Policy assumed for applications that never saved one.
    pub fn disabled(tenant_id: u64, application_id: u64) -> Self {
        Self {
            tenant_id,
            application_id,
            status: Status::Disabled,
            automatic_provisioning: Status::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status.is_enabled()
    }

    pub fn provisions_automatically(&self) -> bool {
        self.automatic_provisioning.is_enabled()
    }
}

/// Where a provisioned account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionTarget {
    pub directory_id: u64,
    /// Group the new account joins, when the default store is a group.
    pub group_id: Option<u64>,
}

impl ProvisionTarget {
    /// The store that receives the account, for events and logs.
    pub fn store(&self) -> AccountStoreRef {
        match self.group_id {
            Some(id) => AccountStoreRef::Group(id),
            None => AccountStoreRef::Directory(self.directory_id),
        }
    }
}

#[async_trait]
pub trait AccountLinkRepository: Send + Sync {
    /// Links two accounts of the same tenant. Linking an account to itself
    /// is a [`StoreError::Validation`] error.
    async fn create_link(
        &self,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
    ) -> Result<AccountLink, StoreError>;
    async fn delete_link(
        &self,
        tenant_id: u64,
        account_id: u64,
        other_account_id: u64,
    ) -> Result<(), StoreError>;
    /// Ids of every account linked to `account_id`, ascending.
    async fn find_linked_account_ids(
        &self,
        tenant_id: u64,
        account_id: u64,
    ) -> Result<Vec<u64>, StoreError>;
    async fn find_linking_policy(
        &self,
        tenant_id: u64,
        application_id: u64,
    ) -> Result<Option<AccountLinkingPolicy>, StoreError>;
    async fn save_linking_policy(
        &self,
        policy: AccountLinkingPolicy,
    ) -> Result<AccountLinkingPolicy, StoreError>;
    /// Copies `source` into `target`, adds the group membership if any, and
    /// links the copy to `source`, all in one transaction.
    async fn provision_linked_account(
        &self,
        source: &Account,
        target: ProvisionTarget,
    ) -> Result<Account, StoreError>;
}
