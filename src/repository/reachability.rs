use async_trait::async_trait;

use super::{Account, Group, NodeRef, Status};
use crate::StoreError;
use crate::query::{CollectionQuery, DerivedRelation, Page};

/// Executes derived relations against stored data.
///
/// Every call reads current rows. Results are never cached, so a status
/// change or a removed membership is visible to the next call.
#[async_trait]
pub trait ReachabilityRepository: Send + Sync {
    /// Accounts reachable from `root_id` through `relation`, filtered, sorted
    /// and paginated by `query`.
    ///
    /// Fails with [`StoreError::Validation`] if the relation's destination is
    /// not [`NodeType::Account`](crate::topology::NodeType::Account).
    async fn list_accounts(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<Page<Account>, StoreError>;

    /// Groups reachable from `root_id` through `relation`.
    async fn list_groups(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<Page<Group>, StoreError>;

    /// Number of destination rows reachable from `root_id` that match
    /// `query`'s filter. Pagination is ignored.
    async fn count(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<u64, StoreError>;

    async fn is_reachable(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        target_id: u64,
    ) -> Result<bool, StoreError>;

    /// Status of a single node, or `None` if it does not exist or its type
    /// has no status.
    async fn find_status(&self, tenant_id: u64, node: NodeRef)
    -> Result<Option<Status>, StoreError>;
}
