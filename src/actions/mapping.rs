use chrono::Utc;

use crate::StoreError;
use crate::events::{StoreEvent, dispatch};
use crate::repository::{AccountStoreMapping, CreateMapping, MappingRepository, UpdateMapping};

/// Maps an account store into an application or organization.
///
/// Placement, default flags and the parent's default pointers are settled by
/// the repository in one write; see [`crate::invariants`].
pub struct AssignAccountStoreAction<M: MappingRepository> {
    mapping_repository: M,
}

impl<M: MappingRepository> AssignAccountStoreAction<M> {
    pub fn new(mapping_repository: M) -> Self {
        AssignAccountStoreAction { mapping_repository }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "assign_account_store", skip_all, err)
    )]
    pub async fn execute(&self, data: CreateMapping) -> Result<AccountStoreMapping, StoreError> {
        let mapping = self.mapping_repository.create_mapping(data).await?;

        dispatch(StoreEvent::MappingCreated {
            tenant_id: mapping.tenant_id,
            mapping_id: mapping.id,
            parent: mapping.parent,
            store: mapping.account_store,
            at: Utc::now(),
        })
        .await;

        log::info!(
            target: "storegraph",
            "msg=\"account store mapped\", mapping_id={}, parent={}, store={}, list_index={}",
            mapping.id,
            mapping.parent,
            mapping.account_store,
            mapping.list_index
        );

        Ok(mapping)
    }
}

pub struct UpdateMappingAction<M: MappingRepository> {
    mapping_repository: M,
}

impl<M: MappingRepository> UpdateMappingAction<M> {
    pub fn new(mapping_repository: M) -> Self {
        UpdateMappingAction { mapping_repository }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "update_mapping", skip_all, err)
    )]
    pub async fn execute(
        &self,
        tenant_id: u64,
        mapping_id: u64,
        changes: UpdateMapping,
    ) -> Result<AccountStoreMapping, StoreError> {
        let mapping = self
            .mapping_repository
            .update_mapping(tenant_id, mapping_id, changes)
            .await?;

        dispatch(StoreEvent::MappingUpdated {
            tenant_id,
            mapping_id,
            parent: mapping.parent,
            at: Utc::now(),
        })
        .await;

        log::info!(
            target: "storegraph",
            "msg=\"mapping updated\", mapping_id={mapping_id}, list_index={}, default_account_store={}, default_group_store={}",
            mapping.list_index,
            mapping.is_default_account_store,
            mapping.is_default_group_store
        );

        Ok(mapping)
    }
}

pub struct RemoveMappingAction<M: MappingRepository> {
    mapping_repository: M,
}

impl<M: MappingRepository> RemoveMappingAction<M> {
    pub fn new(mapping_repository: M) -> Self {
        RemoveMappingAction { mapping_repository }
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "remove_mapping", skip_all, err)
    )]
    pub async fn execute(&self, tenant_id: u64, mapping_id: u64) -> Result<(), StoreError> {
        let mapping = self
            .mapping_repository
            .find_mapping(tenant_id, mapping_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        self.mapping_repository
            .delete_mapping(tenant_id, mapping_id)
            .await?;

        dispatch(StoreEvent::MappingDeleted {
            tenant_id,
            mapping_id,
            parent: mapping.parent,
            at: Utc::now(),
        })
        .await;

        log::info!(
            target: "storegraph",
            "msg=\"mapping removed\", mapping_id={mapping_id}, parent={}",
            mapping.parent
        );

        Ok(())
    }
}
