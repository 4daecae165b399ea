use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountStoreRef, NodeRef, Status};
use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub id: u64,
    pub tenant_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub tenant_id: u64,
    pub directory_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: u64,
    pub tenant_id: u64,
    pub name: String,
    /// Lowercase unique key used in URLs and subdomains.
    pub name_key: String,
    pub status: Status,
    pub default_account_store_mapping_id: Option<u64>,
    pub default_group_store_mapping_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: u64,
    pub tenant_id: u64,
    pub name: String,
    pub status: Status,
    pub default_account_store_mapping_id: Option<u64>,
    pub default_group_store_mapping_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateDirectory {
    pub tenant_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub status: Status,
}

impl CreateDirectory {
    pub fn new(tenant_id: u64, name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            description: None,
            status: Status::Enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroup {
    pub tenant_id: u64,
    pub directory_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub status: Status,
}

impl CreateGroup {
    pub fn new(tenant_id: u64, directory_id: u64, name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            directory_id,
            name: name.into(),
            description: None,
            status: Status::Enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateOrganization {
    pub tenant_id: u64,
    pub name: String,
    pub name_key: String,
    pub status: Status,
}

impl CreateOrganization {
    /// Derives `name_key` from `name`: lowercased, with runs of anything
    /// other than ASCII letters and digits collapsed to `-`.
    pub fn new(tenant_id: u64, name: impl Into<String>) -> Self {
        let name = name.into();
        let mut name_key = String::with_capacity(name.len());
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                name_key.push(c.to_ascii_lowercase());
            } else if !name_key.ends_with('-') && !name_key.is_empty() {
                name_key.push('-');
            }
        }
        while name_key.ends_with('-') {
            name_key.pop();
        }

        Self {
            tenant_id,
            name,
            name_key,
            status: Status::Enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateApplication {
    pub tenant_id: u64,
    pub name: String,
    pub status: Status,
}

impl CreateApplication {
    pub fn new(tenant_id: u64, name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            name: name.into(),
            status: Status::Enabled,
        }
    }
}

/// CRUD for the account stores (directories, groups, organizations) and for
/// applications.
#[async_trait]
pub trait AccountStoreRepository: Send + Sync {
    async fn create_directory(&self, data: CreateDirectory) -> Result<Directory, StoreError>;
    async fn find_directory(&self, tenant_id: u64, id: u64)
    -> Result<Option<Directory>, StoreError>;

    /// Creates a group. The owning directory must exist in the same tenant.
    async fn create_group(&self, data: CreateGroup) -> Result<Group, StoreError>;
    async fn find_group(&self, tenant_id: u64, id: u64) -> Result<Option<Group>, StoreError>;

    /// Creates an organization. `name_key` is unique per tenant.
    async fn create_organization(
        &self,
        data: CreateOrganization,
    ) -> Result<Organization, StoreError>;
    async fn find_organization(
        &self,
        tenant_id: u64,
        id: u64,
    ) -> Result<Option<Organization>, StoreError>;

    async fn create_application(&self, data: CreateApplication)
    -> Result<Application, StoreError>;
    async fn find_application(
        &self,
        tenant_id: u64,
        id: u64,
    ) -> Result<Option<Application>, StoreError>;

    /// Sets the status of any node type that carries one.
    ///
    /// Returns [`StoreError::Validation`] for node types without a status and
    /// [`StoreError::NotFound`] if the row does not exist.
    async fn set_status(
        &self,
        tenant_id: u64,
        node: NodeRef,
        status: Status,
    ) -> Result<(), StoreError>;

    /// Deletes an account store and everything that depends on it.
    ///
    /// Every mapping row that references the store is removed, and any
    /// default pointer at those rows is cleared, before the store itself.
    /// Deleting a directory also deletes its groups, accounts and their
    /// memberships.
    async fn delete_account_store(
        &self,
        tenant_id: u64,
        store: AccountStoreRef,
    ) -> Result<(), StoreError>;

    /// Deletes an application with its mappings and linking policy.
    async fn delete_application(&self, tenant_id: u64, id: u64) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_name_key() {
        assert_eq!(CreateOrganization::new(1, "Acme Corp").name_key, "acme-corp");
        assert_eq!(CreateOrganization::new(1, "  R&D -- Labs! ").name_key, "r-d-labs");
        assert_eq!(CreateOrganization::new(1, "Team42").name_key, "team42");
    }
}
