//! In-memory backend.
//!
//! All tables live behind one lock, so every trait method is atomic in the
//! same way a database transaction would be.

#![allow(clippy::significant_drop_tightening)]

mod link;
mod mapping;
mod reachability;
mod tables;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use self::tables::Tables;
use crate::StoreError;
use crate::repository::{
    Account, AccountRepository, AccountStoreRef, AccountStoreRepository, Application,
    CreateAccount, CreateApplication, CreateDirectory, CreateGroup, CreateOrganization, Directory,
    Group, GroupMembership, GroupMembershipRepository, MappingParent, NodeRef, Organization,
    Status,
};
use crate::topology::NodeType;

/// In-memory implementation of every repository trait.
///
/// Clones share the same tables.
#[derive(Clone)]
pub struct MockStore {
    tables: Arc<RwLock<Tables>>,
    next_id: Arc<AtomicU64>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Internal("lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Internal("lock poisoned".into()))
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountRepository for MockStore {
    async fn create_account(&self, data: CreateAccount) -> Result<Account, StoreError> {
        let id = self.next_id();
        self.write()?.insert_account(id, data, Utc::now())
    }

    async fn find_account(&self, tenant_id: u64, id: u64) -> Result<Option<Account>, StoreError> {
        Ok(self.read()?.account(tenant_id, id).cloned())
    }

    async fn set_account_status(
        &self,
        tenant_id: u64,
        id: u64,
        status: Status,
    ) -> Result<(), StoreError> {
        self.set_status(tenant_id, NodeRef::account(id), status).await
    }

    async fn delete_account(&self, tenant_id: u64, id: u64) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.account(tenant_id, id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.remove_account(id);
        Ok(())
    }
}

#[async_trait]
impl AccountStoreRepository for MockStore {
    async fn create_directory(&self, data: CreateDirectory) -> Result<Directory, StoreError> {
        let now = Utc::now();
        let directory = Directory {
            id: self.next_id(),
            tenant_id: data.tenant_id,
            name: data.name,
            description: data.description,
            status: data.status,
            created_at: now,
            updated_at: now,
        };

        self.write()?
            .directories
            .insert(directory.id, directory.clone());
        Ok(directory)
    }

    async fn find_directory(
        &self,
        tenant_id: u64,
        id: u64,
    ) -> Result<Option<Directory>, StoreError> {
        Ok(self.read()?.directory(tenant_id, id).cloned())
    }

    async fn create_group(&self, data: CreateGroup) -> Result<Group, StoreError> {
        let mut tables = self.write()?;
        if tables.directory(data.tenant_id, data.directory_id).is_none() {
            return Err(StoreError::validation(format!(
                "directory {} does not exist",
                data.directory_id
            )));
        }
        let taken = tables
            .groups
            .values()
            .any(|g| g.directory_id == data.directory_id && g.name.eq_ignore_ascii_case(&data.name));
        if taken {
            return Err(StoreError::AlreadyExists);
        }

        let now = Utc::now();
        let group = Group {
            id: self.next_id(),
            tenant_id: data.tenant_id,
            directory_id: data.directory_id,
            name: data.name,
            description: data.description,
            status: data.status,
            created_at: now,
            updated_at: now,
        };
        tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn find_group(&self, tenant_id: u64, id: u64) -> Result<Option<Group>, StoreError> {
        Ok(self.read()?.group(tenant_id, id).cloned())
    }

    async fn create_organization(
        &self,
        data: CreateOrganization,
    ) -> Result<Organization, StoreError> {
        let mut tables = self.write()?;
        let taken = tables
            .organizations
            .values()
            .any(|o| o.tenant_id == data.tenant_id && o.name_key == data.name_key);
        if taken {
            return Err(StoreError::AlreadyExists);
        }

        let now = Utc::now();
        let organization = Organization {
            id: self.next_id(),
            tenant_id: data.tenant_id,
            name: data.name,
            name_key: data.name_key,
            status: data.status,
            default_account_store_mapping_id: None,
            default_group_store_mapping_id: None,
            created_at: now,
            updated_at: now,
        };
        tables
            .organizations
            .insert(organization.id, organization.clone());
        Ok(organization)
    }

    async fn find_organization(
        &self,
        tenant_id: u64,
        id: u64,
    ) -> Result<Option<Organization>, StoreError> {
        Ok(self.read()?.organization(tenant_id, id).cloned())
    }

    async fn create_application(
        &self,
        data: CreateApplication,
    ) -> Result<Application, StoreError> {
        let now = Utc::now();
        let application = Application {
            id: self.next_id(),
            tenant_id: data.tenant_id,
            name: data.name,
            status: data.status,
            default_account_store_mapping_id: None,
            default_group_store_mapping_id: None,
            created_at: now,
            updated_at: now,
        };

        self.write()?
            .applications
            .insert(application.id, application.clone());
        Ok(application)
    }

    async fn find_application(
        &self,
        tenant_id: u64,
        id: u64,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self.read()?.application(tenant_id, id).cloned())
    }

    async fn set_status(
        &self,
        tenant_id: u64,
        node: NodeRef,
        status: Status,
    ) -> Result<(), StoreError> {
        if status == Status::Unverified && node.node != NodeType::Account {
            return Err(StoreError::validation(format!(
                "{} cannot be unverified",
                node.node
            )));
        }

        let now = Utc::now();
        let mut tables = self.write()?;
        let (slot, updated_at) = match node.node {
            NodeType::Account => match tables.accounts.get_mut(&node.id) {
                Some(r) if r.tenant_id == tenant_id => (&mut r.status, &mut r.updated_at),
                _ => return Err(StoreError::NotFound),
            },
            NodeType::Group => match tables.groups.get_mut(&node.id) {
                Some(r) if r.tenant_id == tenant_id => (&mut r.status, &mut r.updated_at),
                _ => return Err(StoreError::NotFound),
            },
            NodeType::Directory => match tables.directories.get_mut(&node.id) {
                Some(r) if r.tenant_id == tenant_id => (&mut r.status, &mut r.updated_at),
                _ => return Err(StoreError::NotFound),
            },
            NodeType::Organization => match tables.organizations.get_mut(&node.id) {
                Some(r) if r.tenant_id == tenant_id => (&mut r.status, &mut r.updated_at),
                _ => return Err(StoreError::NotFound),
            },
            NodeType::Application => match tables.applications.get_mut(&node.id) {
                Some(r) if r.tenant_id == tenant_id => (&mut r.status, &mut r.updated_at),
                _ => return Err(StoreError::NotFound),
            },
            NodeType::GroupMembership
            | NodeType::OrganizationMapping
            | NodeType::ApplicationMapping => {
                return Err(StoreError::validation(format!(
                    "{} has no status",
                    node.node
                )));
            }
        };

        *slot = status;
        *updated_at = now;
        Ok(())
    }

    async fn delete_account_store(
        &self,
        tenant_id: u64,
        store: AccountStoreRef,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tables = self.write()?;
        if !tables.store_exists(tenant_id, store) {
            return Err(StoreError::NotFound);
        }

        tables.remove_mappings_of(tenant_id, store, now);

        match store {
            AccountStoreRef::Directory(id) => {
                let groups: Vec<u64> = tables
                    .groups
                    .values()
                    .filter(|g| g.directory_id == id)
                    .map(|g| g.id)
                    .collect();
                for group in groups {
                    tables.remove_group(tenant_id, group, now);
                }

                let accounts: Vec<u64> = tables
                    .accounts
                    .values()
                    .filter(|a| a.directory_id == id)
                    .map(|a| a.id)
                    .collect();
                for account in accounts {
                    tables.remove_account(account);
                }

                tables.directories.remove(&id);
            }
            AccountStoreRef::Group(id) => tables.remove_group(tenant_id, id, now),
            AccountStoreRef::Organization(id) => {
                tables.organizations.remove(&id);
            }
        }

        Ok(())
    }

    async fn delete_application(&self, tenant_id: u64, id: u64) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.application(tenant_id, id).is_none() {
            return Err(StoreError::NotFound);
        }

        tables
            .mappings
            .retain(|_, m| m.parent != MappingParent::Application(id));
        tables.policies.remove(&(tenant_id, id));
        tables.applications.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl GroupMembershipRepository for MockStore {
    async fn add_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<GroupMembership, StoreError> {
        let id = self.next_id();
        self.write()?
            .insert_membership(id, tenant_id, account_id, group_id, Utc::now())
    }

    async fn find_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<Option<GroupMembership>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .memberships
            .values()
            .find(|m| m.tenant_id == tenant_id && m.account_id == account_id && m.group_id == group_id)
            .cloned())
    }

    async fn remove_membership(
        &self,
        tenant_id: u64,
        account_id: u64,
        group_id: u64,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let before = tables.memberships.len();
        tables.memberships.retain(|_, m| {
            !(m.tenant_id == tenant_id && m.account_id == account_id && m.group_id == group_id)
        });
        if tables.memberships.len() < before {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_account_email_unique_per_directory() {
        let store = MockStore::new();
        let d1 = store
            .create_directory(CreateDirectory::new(1, "one"))
            .await
            .unwrap();
        let d2 = store
            .create_directory(CreateDirectory::new(1, "two"))
            .await
            .unwrap();

        store
            .create_account(CreateAccount::mock(1, d1.id, "a@example.com", "h"))
            .await
            .unwrap();
        let dup = store
            .create_account(CreateAccount::mock(1, d1.id, "A@example.com", "h"))
            .await;
        assert_eq!(dup.unwrap_err(), StoreError::AlreadyExists);

        store
            .create_account(CreateAccount::mock(1, d2.id, "a@example.com", "h"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cross_tenant_references_rejected() {
        let store = MockStore::new();
        let dir = store
            .create_directory(CreateDirectory::new(1, "dir"))
            .await
            .unwrap();

        let err = store
            .create_group(CreateGroup::new(2, dir.id, "g"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        assert!(store.find_directory(2, dir.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_membership_requires_same_directory() {
        let store = MockStore::new();
        let d1 = store
            .create_directory(CreateDirectory::new(1, "one"))
            .await
            .unwrap();
        let d2 = store
            .create_directory(CreateDirectory::new(1, "two"))
            .await
            .unwrap();
        let account = store
            .create_account(CreateAccount::mock(1, d1.id, "a@example.com", "h"))
            .await
            .unwrap();
        let other_group = store
            .create_group(CreateGroup::new(1, d2.id, "g"))
            .await
            .unwrap();
        let group = store
            .create_group(CreateGroup::new(1, d1.id, "g"))
            .await
            .unwrap();

        assert!(store.add_membership(1, account.id, other_group.id).await.is_err());
        store.add_membership(1, account.id, group.id).await.unwrap();
        assert_eq!(
            store.add_membership(1, account.id, group.id).await.unwrap_err(),
            StoreError::AlreadyExists
        );

        store.remove_membership(1, account.id, group.id).await.unwrap();
        assert!(store.find_membership(1, account.id, group.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_status_rules() {
        let store = MockStore::new();
        let dir = store
            .create_directory(CreateDirectory::new(1, "dir"))
            .await
            .unwrap();
        let node = NodeRef::new(NodeType::Directory, dir.id);

        store.set_status(1, node, Status::Disabled).await.unwrap();
        assert_eq!(
            store.find_directory(1, dir.id).await.unwrap().unwrap().status,
            Status::Disabled
        );

        assert!(store.set_status(1, node, Status::Unverified).await.is_err());
        assert_eq!(
            store.set_status(2, node, Status::Enabled).await.unwrap_err(),
            StoreError::NotFound
        );
        assert!(matches!(
            store
                .set_status(1, NodeRef::new(NodeType::GroupMembership, 1), Status::Enabled)
                .await,
            Err(StoreError::Validation(_))
        ));
    }
}
