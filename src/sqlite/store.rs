use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::mapping::{mappings_of_store, remove_mapping, store_exists};
use super::{SqliteStore, db_error, id, parse_status};
use crate::StoreError;
use crate::repository::{
    AccountStoreRef, AccountStoreRepository, Application, CreateApplication, CreateDirectory,
    CreateGroup, CreateOrganization, Directory, Group, NodeRef, Organization, Status,
};
use crate::topology::NodeType;

const DIRECTORY_COLUMNS: &str = "id, tenant_id, name, description, status, created_at, updated_at";
const GROUP_COLUMNS: &str =
    "id, tenant_id, directory_id, name, description, status, created_at, updated_at";
const ORGANIZATION_COLUMNS: &str = "id, tenant_id, name, name_key, status, default_account_store_mapping_id, default_group_store_mapping_id, created_at, updated_at";
const APPLICATION_COLUMNS: &str = "id, tenant_id, name, status, default_account_store_mapping_id, default_group_store_mapping_id, created_at, updated_at";

#[derive(FromRow)]
struct DirectoryRecord {
    id: i64,
    tenant_id: i64,
    name: String,
    description: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DirectoryRecord> for Directory {
    type Error = StoreError;

    fn try_from(row: DirectoryRecord) -> Result<Self, Self::Error> {
        Ok(Directory {
            id: row.id as u64,
            tenant_id: row.tenant_id as u64,
            name: row.name,
            description: row.description,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
pub(super) struct GroupRecord {
    id: i64,
    tenant_id: i64,
    directory_id: i64,
    name: String,
    description: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GroupRecord> for Group {
    type Error = StoreError;

    fn try_from(row: GroupRecord) -> Result<Self, Self::Error> {
        Ok(Group {
            id: row.id as u64,
            tenant_id: row.tenant_id as u64,
            directory_id: row.directory_id as u64,
            name: row.name,
            description: row.description,
            status: parse_status(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrganizationRecord {
    id: i64,
    tenant_id: i64,
    name: String,
    name_key: String,
    status: String,
    default_account_store_mapping_id: Option<i64>,
    default_group_store_mapping_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrganizationRecord> for Organization {
    type Error = StoreError;

    fn try_from(row: OrganizationRecord) -> Result<Self, Self::Error> {
        Ok(Organization {
            id: row.id as u64,
            tenant_id: row.tenant_id as u64,
            name: row.name,
            name_key: row.name_key,
            status: parse_status(&row.status)?,
            default_account_store_mapping_id: row.default_account_store_mapping_id.map(|v| v as u64),
            default_group_store_mapping_id: row.default_group_store_mapping_id.map(|v| v as u64),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ApplicationRecord {
    id: i64,
    tenant_id: i64,
    name: String,
    status: String,
    default_account_store_mapping_id: Option<i64>,
    default_group_store_mapping_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRecord> for Application {
    type Error = StoreError;

    fn try_from(row: ApplicationRecord) -> Result<Self, Self::Error> {
        Ok(Application {
            id: row.id as u64,
            tenant_id: row.tenant_id as u64,
            name: row.name,
            status: parse_status(&row.status)?,
            default_account_store_mapping_id: row.default_account_store_mapping_id.map(|v| v as u64),
            default_group_store_mapping_id: row.default_group_store_mapping_id.map(|v| v as u64),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl AccountStoreRepository for SqliteStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn create_directory(&self, data: CreateDirectory) -> Result<Directory, StoreError> {
        let now = Utc::now();
        let row: DirectoryRecord = sqlx::query_as(&format!(
            "INSERT INTO directories (tenant_id, name, description, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {DIRECTORY_COLUMNS}"
        ))
        .bind(id(data.tenant_id))
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.status.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_directory"))?;

        row.try_into()
    }

    async fn find_directory(
        &self,
        tenant_id: u64,
        directory_id: u64,
    ) -> Result<Option<Directory>, StoreError> {
        let row: Option<DirectoryRecord> = sqlx::query_as(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directories WHERE id = ? AND tenant_id = ?"
        ))
        .bind(id(directory_id))
        .bind(id(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_directory"))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn create_group(&self, data: CreateGroup) -> Result<Group, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("create_group"))?;
        if !store_exists(
            &mut conn,
            data.tenant_id,
            AccountStoreRef::Directory(data.directory_id),
        )
        .await?
        {
            return Err(StoreError::validation(format!(
                "directory {} does not exist",
                data.directory_id
            )));
        }

        let now = Utc::now();
        let row: GroupRecord = sqlx::query_as(&format!(
            "INSERT INTO groups (tenant_id, directory_id, name, description, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {GROUP_COLUMNS}"
        ))
        .bind(id(data.tenant_id))
        .bind(id(data.directory_id))
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.status.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("create_group"))?;

        row.try_into()
    }

    async fn find_group(&self, tenant_id: u64, group_id: u64) -> Result<Option<Group>, StoreError> {
        let row: Option<GroupRecord> = sqlx::query_as(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE id = ? AND tenant_id = ?"
        ))
        .bind(id(group_id))
        .bind(id(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_group"))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn create_organization(
        &self,
        data: CreateOrganization,
    ) -> Result<Organization, StoreError> {
        let now = Utc::now();
        let row: OrganizationRecord = sqlx::query_as(&format!(
            "INSERT INTO organizations (tenant_id, name, name_key, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {ORGANIZATION_COLUMNS}"
        ))
        .bind(id(data.tenant_id))
        .bind(&data.name)
        .bind(&data.name_key)
        .bind(data.status.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_organization"))?;

        row.try_into()
    }

    async fn find_organization(
        &self,
        tenant_id: u64,
        organization_id: u64,
    ) -> Result<Option<Organization>, StoreError> {
        let row: Option<OrganizationRecord> = sqlx::query_as(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = ? AND tenant_id = ?"
        ))
        .bind(id(organization_id))
        .bind(id(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_organization"))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn create_application(&self, data: CreateApplication) -> Result<Application, StoreError> {
        let now = Utc::now();
        let row: ApplicationRecord = sqlx::query_as(&format!(
            "INSERT INTO applications (tenant_id, name, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {APPLICATION_COLUMNS}"
        ))
        .bind(id(data.tenant_id))
        .bind(&data.name)
        .bind(data.status.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("create_application"))?;

        row.try_into()
    }

    async fn find_application(
        &self,
        tenant_id: u64,
        application_id: u64,
    ) -> Result<Option<Application>, StoreError> {
        let row: Option<ApplicationRecord> = sqlx::query_as(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ? AND tenant_id = ?"
        ))
        .bind(id(application_id))
        .bind(id(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_application"))?;

        row.map(TryInto::try_into).transpose()
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn set_status(
        &self,
        tenant_id: u64,
        node: NodeRef,
        status: Status,
    ) -> Result<(), StoreError> {
        if !node.node.has_status() {
            return Err(StoreError::validation(format!("{} has no status", node.node)));
        }
        if status == Status::Unverified && node.node != NodeType::Account {
            return Err(StoreError::validation(format!(
                "{} cannot be unverified",
                node.node
            )));
        }

        let result = sqlx::query(&format!(
            "UPDATE {} SET status = ?, updated_at = ? WHERE id = ? AND tenant_id = ?",
            node.node.table()
        ))
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id(node.id))
        .bind(id(tenant_id))
        .execute(&self.pool)
        .await
        .map_err(db_error("set_status"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_account_store(
        &self,
        tenant_id: u64,
        store: AccountStoreRef,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("delete_account_store"))?;

        if !store_exists(&mut tx, tenant_id, store).await? {
            return Err(StoreError::NotFound);
        }

        let mut doomed = vec![store];
        if let AccountStoreRef::Organization(organization_id) = store {
            sqlx::query(
                "UPDATE organizations SET default_account_store_mapping_id = NULL, default_group_store_mapping_id = NULL \
                 WHERE id = ? AND tenant_id = ?",
            )
            .bind(id(organization_id))
            .bind(id(tenant_id))
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_account_store"))?;
        }
        if let AccountStoreRef::Directory(directory_id) = store {
            let groups: Vec<i64> =
                sqlx::query_scalar("SELECT id FROM groups WHERE directory_id = ? AND tenant_id = ?")
                    .bind(id(directory_id))
                    .bind(id(tenant_id))
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(db_error("delete_account_store"))?;
            doomed.extend(groups.into_iter().map(|g| AccountStoreRef::Group(g as u64)));
        }

        for store in doomed {
            for mapping in mappings_of_store(&mut tx, tenant_id, store).await? {
                remove_mapping(&mut tx, &mapping).await?;
            }
        }

        // owned groups, accounts, memberships, links and mappings cascade
        sqlx::query(&format!(
            "DELETE FROM {} WHERE id = ? AND tenant_id = ?",
            store.node_type().table()
        ))
        .bind(id(store.id()))
        .bind(id(tenant_id))
        .execute(&mut *tx)
        .await
        .map_err(db_error("delete_account_store"))?;

        tx.commit().await.map_err(db_error("delete_account_store"))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_application(&self, tenant_id: u64, application_id: u64) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("delete_application"))?;

        sqlx::query(
            "UPDATE applications SET default_account_store_mapping_id = NULL, default_group_store_mapping_id = NULL \
             WHERE id = ? AND tenant_id = ?",
        )
        .bind(id(application_id))
        .bind(id(tenant_id))
        .execute(&mut *tx)
        .await
        .map_err(db_error("delete_application"))?;

        let result = sqlx::query("DELETE FROM applications WHERE id = ? AND tenant_id = ?")
            .bind(id(application_id))
            .bind(id(tenant_id))
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_application"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit().await.map_err(db_error("delete_application"))
    }
}
