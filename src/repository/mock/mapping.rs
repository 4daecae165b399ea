use async_trait::async_trait;
use chrono::Utc;

use super::MockStore;
use crate::StoreError;
use crate::invariants::{plan_create, plan_update};
use crate::repository::{
    AccountStoreMapping, CreateMapping, MappingParent, MappingRepository, UpdateMapping,
};

#[async_trait]
impl MappingRepository for MockStore {
    async fn create_mapping(
        &self,
        data: CreateMapping,
    ) -> Result<AccountStoreMapping, StoreError> {
        let id = self.next_id();
        let now = Utc::now();
        let mut tables = self.write()?;

        if !tables.parent_exists(data.tenant_id, data.parent) {
            return Err(StoreError::NotFound);
        }
        if !tables.store_exists(data.tenant_id, data.account_store) {
            return Err(StoreError::validation(format!(
                "{} does not exist",
                data.account_store
            )));
        }

        let siblings = tables.siblings(data.tenant_id, data.parent);
        let plan = plan_create(&siblings, &data)?;

        tables.apply_siblings(&plan, now);
        let mapping = AccountStoreMapping {
            id,
            tenant_id: data.tenant_id,
            parent: data.parent,
            account_store: data.account_store,
            list_index: plan.list_index,
            is_default_account_store: plan.is_default_account_store,
            is_default_group_store: plan.is_default_group_store,
            created_at: now,
            updated_at: now,
        };
        tables.mappings.insert(id, mapping.clone());
        tables.apply_pointers(data.parent, &plan, id, now);

        Ok(mapping)
    }

    async fn update_mapping(
        &self,
        tenant_id: u64,
        id: u64,
        changes: UpdateMapping,
    ) -> Result<AccountStoreMapping, StoreError> {
        let now = Utc::now();
        let mut tables = self.write()?;

        let current = tables
            .mapping(tenant_id, id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        let siblings = tables.siblings(tenant_id, current.parent);
        let plan = plan_update(&siblings, &current, &changes)?;

        tables.apply_siblings(&plan, now);
        let updated = match tables.mappings.get_mut(&id) {
            Some(mapping) => {
                mapping.list_index = plan.list_index;
                mapping.is_default_account_store = plan.is_default_account_store;
                mapping.is_default_group_store = plan.is_default_group_store;
                mapping.updated_at = now;
                mapping.clone()
            }
            None => return Err(StoreError::NotFound),
        };
        tables.apply_pointers(current.parent, &plan, id, now);

        Ok(updated)
    }

    async fn delete_mapping(&self, tenant_id: u64, id: u64) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.mapping(tenant_id, id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.remove_mapping(id, Utc::now());
        Ok(())
    }

    async fn find_mapping(
        &self,
        tenant_id: u64,
        id: u64,
    ) -> Result<Option<AccountStoreMapping>, StoreError> {
        Ok(self.read()?.mapping(tenant_id, id).cloned())
    }

    async fn list_mappings(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Vec<AccountStoreMapping>, StoreError> {
        Ok(self.read()?.siblings(tenant_id, parent))
    }

    async fn find_default_account_store(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Option<AccountStoreMapping>, StoreError> {
        let tables = self.read()?;
        let pointer = match parent {
            MappingParent::Application(id) => tables
                .application(tenant_id, id)
                .and_then(|a| a.default_account_store_mapping_id),
            MappingParent::Organization(id) => tables
                .organization(tenant_id, id)
                .and_then(|o| o.default_account_store_mapping_id),
        };
        Ok(pointer.and_then(|id| tables.mapping(tenant_id, id).cloned()))
    }

    async fn find_default_group_store(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Option<AccountStoreMapping>, StoreError> {
        let tables = self.read()?;
        let pointer = match parent {
            MappingParent::Application(id) => tables
                .application(tenant_id, id)
                .and_then(|a| a.default_group_store_mapping_id),
            MappingParent::Organization(id) => tables
                .organization(tenant_id, id)
                .and_then(|o| o.default_group_store_mapping_id),
        };
        Ok(pointer.and_then(|id| tables.mapping(tenant_id, id).cloned()))
    }
}
