use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountStoreRef, MappingParent};
use crate::StoreError;

/// Attaches one account store to an application or organization.
///
/// `list_index` orders a parent's mappings; it is dense and 0-based. At most
/// one mapping per parent has each default flag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStoreMapping {
    pub id: u64,
    pub tenant_id: u64,
    pub parent: MappingParent,
    pub account_store: AccountStoreRef,
    pub list_index: u32,
    pub is_default_account_store: bool,
    pub is_default_group_store: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateMapping {
    pub tenant_id: u64,
    pub parent: MappingParent,
    pub account_store: AccountStoreRef,
    /// Position in the parent's list. Appends when `None`.
    pub list_index: Option<u32>,
    pub is_default_account_store: bool,
    pub is_default_group_store: bool,
}

impl CreateMapping {
    pub fn new(tenant_id: u64, parent: MappingParent, account_store: AccountStoreRef) -> Self {
        Self {
            tenant_id,
            parent,
            account_store,
            list_index: None,
            is_default_account_store: false,
            is_default_group_store: false,
        }
    }

    #[must_use]
    pub fn default_account_store(mut self) -> Self {
        self.is_default_account_store = true;
        self
    }

    #[must_use]
    pub fn default_group_store(mut self) -> Self {
        self.is_default_group_store = true;
        self
    }

    #[must_use]
    pub fn at(mut self, list_index: u32) -> Self {
        self.list_index = Some(list_index);
        self
    }
}

/// Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateMapping {
    pub list_index: Option<u32>,
    pub is_default_account_store: Option<bool>,
    pub is_default_group_store: Option<bool>,
}

#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// Creates a mapping and rebalances its siblings' default flags, list
    /// order and the parent's default pointers in one transaction.
    async fn create_mapping(&self, data: CreateMapping)
    -> Result<AccountStoreMapping, StoreError>;
    async fn update_mapping(
        &self,
        tenant_id: u64,
        id: u64,
        changes: UpdateMapping,
    ) -> Result<AccountStoreMapping, StoreError>;
    /// Deletes a mapping, clearing any parent default pointer at it and
    /// closing the gap in the list order.
    async fn delete_mapping(&self, tenant_id: u64, id: u64) -> Result<(), StoreError>;
    async fn find_mapping(
        &self,
        tenant_id: u64,
        id: u64,
    ) -> Result<Option<AccountStoreMapping>, StoreError>;
    /// The parent's mappings ordered by `list_index`.
    async fn list_mappings(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Vec<AccountStoreMapping>, StoreError>;
    async fn find_default_account_store(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Option<AccountStoreMapping>, StoreError>;
    async fn find_default_group_store(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Option<AccountStoreMapping>, StoreError>;
}
