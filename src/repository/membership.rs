use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A row joining an account to a group. Both must live in the same
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub id: u64,
    pub tenant_id: u64,
    pub account_id: u64,
    pub group_id: u64,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait GroupMembershipRepository: Send + Sync {
    /// Adds `account_id` to `group_id`.
    ///
    /// Fails with [`StoreError::Validation`] if the account and group belong
    /// to different directories and [`StoreError::AlreadyExists`] if the
    /// membership exists.
    async fn add_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<GroupMembership, StoreError>;
    async fn find_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<Option<GroupMembership>, StoreError>;
    async fn remove_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<(), StoreError>;
}
