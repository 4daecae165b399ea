use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::{SqliteStore, db_error, id};
use crate::StoreError;
use crate::invariants::{MappingPlan, PointerChange, plan_create, plan_delete, plan_update};
use crate::repository::{
    AccountStoreMapping, AccountStoreRef, CreateMapping, MappingParent, MappingRepository,
    UpdateMapping,
};

const APPLICATION_MAPPINGS: &str = "SELECT 'application' AS parent_type, id, tenant_id, application_id AS parent_id, account_store_type, account_store_id, list_index, is_default_account_store, is_default_group_store, created_at, updated_at FROM account_store_mappings";
const ORGANIZATION_MAPPINGS: &str = "SELECT 'organization' AS parent_type, id, tenant_id, organization_id AS parent_id, account_store_type, account_store_id, list_index, is_default_account_store, is_default_group_store, created_at, updated_at FROM organization_account_store_mappings";

fn mappings_of(parent: MappingParent) -> &'static str {
    match parent {
        MappingParent::Application(_) => APPLICATION_MAPPINGS,
        MappingParent::Organization(_) => ORGANIZATION_MAPPINGS,
    }
}

#[derive(FromRow)]
struct MappingRecord {
    parent_type: String,
    id: i64,
    tenant_id: i64,
    parent_id: i64,
    account_store_type: String,
    account_store_id: i64,
    list_index: i64,
    is_default_account_store: bool,
    is_default_group_store: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MappingRecord> for AccountStoreMapping {
    type Error = StoreError;

    fn try_from(row: MappingRecord) -> Result<Self, Self::Error> {
        let parent = match row.parent_type.as_str() {
            "application" => MappingParent::Application(row.parent_id as u64),
            "organization" => MappingParent::Organization(row.parent_id as u64),
            other => return Err(StoreError::Internal(format!("unknown mapping parent {other:?}"))),
        };
        let account_store =
            AccountStoreRef::from_parts(&row.account_store_type, row.account_store_id as u64)
                .ok_or_else(|| {
                    StoreError::Internal(format!(
                        "unknown account store type {:?}",
                        row.account_store_type
                    ))
                })?;

        Ok(AccountStoreMapping {
            id: row.id as u64,
            tenant_id: row.tenant_id as u64,
            parent,
            account_store,
            list_index: u32::try_from(row.list_index).unwrap_or(u32::MAX),
            is_default_account_store: row.is_default_account_store,
            is_default_group_store: row.is_default_group_store,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert(rows: Vec<MappingRecord>) -> Result<Vec<AccountStoreMapping>, StoreError> {
    rows.into_iter().map(TryInto::try_into).collect()
}

async fn parent_exists(
    conn: &mut SqliteConnection,
    tenant_id: u64,
    parent: MappingParent,
) -> Result<bool, StoreError> {
    sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ? AND tenant_id = ?)",
        parent.node_type().table()
    ))
    .bind(id(parent.id()))
    .bind(id(tenant_id))
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("parent_exists"))
}

pub(super) async fn store_exists(
    conn: &mut SqliteConnection,
    tenant_id: u64,
    store: AccountStoreRef,
) -> Result<bool, StoreError> {
    sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ? AND tenant_id = ?)",
        store.node_type().table()
    ))
    .bind(id(store.id()))
    .bind(id(tenant_id))
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("store_exists"))
}

async fn siblings(
    conn: &mut SqliteConnection,
    tenant_id: u64,
    parent: MappingParent,
) -> Result<Vec<AccountStoreMapping>, StoreError> {
    let rows: Vec<MappingRecord> = sqlx::query_as(&format!(
        "{} WHERE {} = ? AND tenant_id = ? ORDER BY list_index, id",
        mappings_of(parent),
        parent.parent_column()
    ))
    .bind(id(parent.id()))
    .bind(id(tenant_id))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("list_mappings"))?;

    convert(rows)
}

async fn find(
    conn: &mut SqliteConnection,
    tenant_id: u64,
    mapping_id: u64,
) -> Result<Option<AccountStoreMapping>, StoreError> {
    let row: Option<MappingRecord> = sqlx::query_as(&format!(
        "{APPLICATION_MAPPINGS} WHERE id = ?1 AND tenant_id = ?2 \
         UNION ALL {ORGANIZATION_MAPPINGS} WHERE id = ?1 AND tenant_id = ?2"
    ))
    .bind(id(mapping_id))
    .bind(id(tenant_id))
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("find_mapping"))?;

    row.map(TryInto::try_into).transpose()
}

/// Every mapping, under any parent, whose account store is `store`.
pub(super) async fn mappings_of_store(
    conn: &mut SqliteConnection,
    tenant_id: u64,
    store: AccountStoreRef,
) -> Result<Vec<AccountStoreMapping>, StoreError> {
    let rows: Vec<MappingRecord> = sqlx::query_as(&format!(
        "{APPLICATION_MAPPINGS} WHERE tenant_id = ?1 AND account_store_type = ?2 AND account_store_id = ?3 \
         UNION ALL {ORGANIZATION_MAPPINGS} WHERE tenant_id = ?1 AND account_store_type = ?2 AND account_store_id = ?3"
    ))
    .bind(id(tenant_id))
    .bind(store.store_type())
    .bind(id(store.id()))
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("mappings_of_store"))?;

    convert(rows)
}

/// Writes the sibling side of `plan`: cleared default flags and new list
/// positions.
async fn apply_siblings(
    conn: &mut SqliteConnection,
    parent: MappingParent,
    plan: &MappingPlan,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let table = parent.mapping_node().table();

    for (column, ids) in [
        ("is_default_account_store", &plan.clear_default_account_store),
        ("is_default_group_store", &plan.clear_default_group_store),
    ] {
        for mapping_id in ids {
            sqlx::query(&format!(
                "UPDATE {table} SET {column} = 0, updated_at = ? WHERE id = ?"
            ))
            .bind(now)
            .bind(id(*mapping_id))
            .execute(&mut *conn)
            .await
            .map_err(db_error("apply_siblings"))?;
        }
    }

    for (mapping_id, list_index) in &plan.reindex {
        sqlx::query(&format!(
            "UPDATE {table} SET list_index = ?, updated_at = ? WHERE id = ?"
        ))
        .bind(i64::from(*list_index))
        .bind(now)
        .bind(id(*mapping_id))
        .execute(&mut *conn)
        .await
        .map_err(db_error("apply_siblings"))?;
    }

    Ok(())
}

/// Writes the parent side of `plan`. A pointer is only cleared while it
/// still names `target`.
async fn apply_pointers(
    conn: &mut SqliteConnection,
    tenant_id: u64,
    parent: MappingParent,
    plan: &MappingPlan,
    target: u64,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let table = parent.node_type().table();

    for (column, change) in [
        ("default_account_store_mapping_id", plan.default_account_store),
        ("default_group_store_mapping_id", plan.default_group_store),
    ] {
        let query = match change {
            PointerChange::Keep => continue,
            PointerChange::SetToTarget => format!(
                "UPDATE {table} SET {column} = ?1, updated_at = ?2 WHERE id = ?3 AND tenant_id = ?4"
            ),
            PointerChange::Clear => format!(
                "UPDATE {table} SET {column} = NULL, updated_at = ?2 WHERE id = ?3 AND tenant_id = ?4 AND {column} = ?1"
            ),
        };

        sqlx::query(&query)
            .bind(id(target))
            .bind(now)
            .bind(id(parent.id()))
            .bind(id(tenant_id))
            .execute(&mut *conn)
            .await
            .map_err(db_error("apply_pointers"))?;
    }

    Ok(())
}

/// Deletes `mapping`, clears the parent's pointers at it and closes the gap
/// in the parent's list order.
pub(super) async fn remove_mapping(
    conn: &mut SqliteConnection,
    mapping: &AccountStoreMapping,
) -> Result<(), StoreError> {
    let now = Utc::now();
    let siblings = siblings(conn, mapping.tenant_id, mapping.parent).await?;
    let plan = plan_delete(&siblings, mapping);

    apply_pointers(conn, mapping.tenant_id, mapping.parent, &plan, mapping.id, now).await?;
    sqlx::query(&format!(
        "DELETE FROM {} WHERE id = ?",
        mapping.parent.mapping_node().table()
    ))
    .bind(id(mapping.id))
    .execute(&mut *conn)
    .await
    .map_err(db_error("delete_mapping"))?;
    apply_siblings(conn, mapping.parent, &plan, now).await
}

async fn find_default(
    store: &SqliteStore,
    tenant_id: u64,
    parent: MappingParent,
    column: &str,
) -> Result<Option<AccountStoreMapping>, StoreError> {
    let mut conn = store
        .pool
        .acquire()
        .await
        .map_err(db_error("find_default_store"))?;

    let pointer: Option<Option<i64>> = sqlx::query_scalar(&format!(
        "SELECT {column} FROM {} WHERE id = ? AND tenant_id = ?",
        parent.node_type().table()
    ))
    .bind(id(parent.id()))
    .bind(id(tenant_id))
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error("find_default_store"))?;

    match pointer.flatten() {
        Some(mapping_id) => find(&mut conn, tenant_id, mapping_id as u64).await,
        None => Ok(None),
    }
}

#[async_trait]
impl MappingRepository for SqliteStore {
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, data), err))]
    async fn create_mapping(&self, data: CreateMapping) -> Result<AccountStoreMapping, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error("create_mapping"))?;

        if !parent_exists(&mut tx, data.tenant_id, data.parent).await? {
            return Err(StoreError::NotFound);
        }
        if !store_exists(&mut tx, data.tenant_id, data.account_store).await? {
            return Err(StoreError::validation(format!(
                "{} does not exist",
                data.account_store
            )));
        }

        let siblings = siblings(&mut tx, data.tenant_id, data.parent).await?;
        let plan = plan_create(&siblings, &data)?;
        apply_siblings(&mut tx, data.parent, &plan, now).await?;

        let mapping_id: i64 = sqlx::query_scalar("INSERT INTO mapping_ids DEFAULT VALUES RETURNING id")
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("create_mapping"))?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, tenant_id, {}, account_store_type, account_store_id, list_index, is_default_account_store, is_default_group_store, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            data.parent.mapping_node().table(),
            data.parent.parent_column()
        ))
        .bind(mapping_id)
        .bind(id(data.tenant_id))
        .bind(id(data.parent.id()))
        .bind(data.account_store.store_type())
        .bind(id(data.account_store.id()))
        .bind(i64::from(plan.list_index))
        .bind(plan.is_default_account_store)
        .bind(plan.is_default_group_store)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_error("create_mapping"))?;

        apply_pointers(&mut tx, data.tenant_id, data.parent, &plan, mapping_id as u64, now).await?;
        tx.commit().await.map_err(db_error("create_mapping"))?;

        Ok(AccountStoreMapping {
            id: mapping_id as u64,
            tenant_id: data.tenant_id,
            parent: data.parent,
            account_store: data.account_store,
            list_index: plan.list_index,
            is_default_account_store: plan.is_default_account_store,
            is_default_group_store: plan.is_default_group_store,
            created_at: now,
            updated_at: now,
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self, changes), err))]
    async fn update_mapping(
        &self,
        tenant_id: u64,
        mapping_id: u64,
        changes: UpdateMapping,
    ) -> Result<AccountStoreMapping, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_error("update_mapping"))?;

        let current = find(&mut tx, tenant_id, mapping_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        let siblings = siblings(&mut tx, tenant_id, current.parent).await?;
        let plan = plan_update(&siblings, &current, &changes)?;

        apply_siblings(&mut tx, current.parent, &plan, now).await?;
        sqlx::query(&format!(
            "UPDATE {} SET list_index = ?, is_default_account_store = ?, is_default_group_store = ?, updated_at = ? WHERE id = ?",
            current.parent.mapping_node().table()
        ))
        .bind(i64::from(plan.list_index))
        .bind(plan.is_default_account_store)
        .bind(plan.is_default_group_store)
        .bind(now)
        .bind(id(mapping_id))
        .execute(&mut *tx)
        .await
        .map_err(db_error("update_mapping"))?;
        apply_pointers(&mut tx, tenant_id, current.parent, &plan, mapping_id, now).await?;

        tx.commit().await.map_err(db_error("update_mapping"))?;

        Ok(AccountStoreMapping {
            list_index: plan.list_index,
            is_default_account_store: plan.is_default_account_store,
            is_default_group_store: plan.is_default_group_store,
            updated_at: now,
            ..current
        })
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), err))]
    async fn delete_mapping(&self, tenant_id: u64, mapping_id: u64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error("delete_mapping"))?;
        let mapping = find(&mut tx, tenant_id, mapping_id)
            .await?
            .ok_or(StoreError::NotFound)?;

        remove_mapping(&mut tx, &mapping).await?;
        tx.commit().await.map_err(db_error("delete_mapping"))
    }

    async fn find_mapping(
        &self,
        tenant_id: u64,
        mapping_id: u64,
    ) -> Result<Option<AccountStoreMapping>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("find_mapping"))?;
        find(&mut conn, tenant_id, mapping_id).await
    }

    async fn list_mappings(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Vec<AccountStoreMapping>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(db_error("list_mappings"))?;
        siblings(&mut conn, tenant_id, parent).await
    }

    async fn find_default_account_store(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Option<AccountStoreMapping>, StoreError> {
        find_default(self, tenant_id, parent, "default_account_store_mapping_id").await
    }

    async fn find_default_group_store(
        &self,
        tenant_id: u64,
        parent: MappingParent,
    ) -> Result<Option<AccountStoreMapping>, StoreError> {
        find_default(self, tenant_id, parent, "default_group_store_mapping_id").await
    }
}
