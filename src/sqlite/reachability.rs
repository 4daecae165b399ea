use async_trait::async_trait;
use sqlx::Sqlite;
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::sqlite::SqliteArguments;

use super::account::AccountRecord;
use super::store::GroupRecord;
use super::{SqliteStore, db_error, id, parse_status};
use crate::StoreError;
use crate::query::sql::{self, SqlParam};
use crate::query::{CollectionQuery, DerivedRelation, Dialect, Page, QueryPlan};
use crate::repository::{Account, Group, NodeRef, ReachabilityRepository, Status};
use crate::topology::NodeType;

fn bind_rows<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

fn bind_scalar<'q, O>(
    mut query: QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &'q [SqlParam],
) -> QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

impl SqliteStore {
    async fn count_rows(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        plan: &QueryPlan,
    ) -> Result<u64, StoreError> {
        let stmt = sql::select_count(relation, Dialect::Sqlite, tenant_id, root_id, plan);
        let count: i64 = bind_scalar(sqlx::query_scalar(&stmt.sql), &stmt.params)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count"))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl ReachabilityRepository for SqliteStore {
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, relation, query), fields(source = %relation.source()), err)
    )]
    async fn list_accounts(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<Page<Account>, StoreError> {
        relation.expect_destination(NodeType::Account)?;
        let plan = query.plan(NodeType::Account)?;

        let stmt = sql::select_page(relation, Dialect::Sqlite, tenant_id, root_id, &plan);
        let rows: Vec<AccountRecord> = bind_rows(sqlx::query_as(&stmt.sql), &stmt.params)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_accounts"))?;
        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Account>, _>>()?;

        Ok(Page {
            offset: plan.offset,
            limit: plan.limit,
            size: self.count_rows(tenant_id, relation, root_id, &plan).await?,
            items,
        })
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip(self, relation, query), fields(source = %relation.source()), err)
    )]
    async fn list_groups(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<Page<Group>, StoreError> {
        relation.expect_destination(NodeType::Group)?;
        let plan = query.plan(NodeType::Group)?;

        let stmt = sql::select_page(relation, Dialect::Sqlite, tenant_id, root_id, &plan);
        let rows: Vec<GroupRecord> = bind_rows(sqlx::query_as(&stmt.sql), &stmt.params)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_groups"))?;
        let items = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Group>, _>>()?;

        Ok(Page {
            offset: plan.offset,
            limit: plan.limit,
            size: self.count_rows(tenant_id, relation, root_id, &plan).await?,
            items,
        })
    }

    async fn count(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<u64, StoreError> {
        let plan = query.plan(relation.destination())?;
        self.count_rows(tenant_id, relation, root_id, &plan).await
    }

    async fn is_reachable(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        target_id: u64,
    ) -> Result<bool, StoreError> {
        let stmt = sql::select_reachable(relation, Dialect::Sqlite, tenant_id, root_id, target_id);
        let count: i64 = bind_scalar(sqlx::query_scalar(&stmt.sql), &stmt.params)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("is_reachable"))?;
        Ok(count > 0)
    }

    async fn find_status(
        &self,
        tenant_id: u64,
        node: NodeRef,
    ) -> Result<Option<Status>, StoreError> {
        if !node.node.has_status() {
            return Ok(None);
        }

        let status: Option<String> = sqlx::query_scalar(&format!(
            "SELECT status FROM {} WHERE id = ? AND tenant_id = ?",
            node.node.table()
        ))
        .bind(id(node.id))
        .bind(id(tenant_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_status"))?;

        status.as_deref().map(parse_status).transpose()
    }
}
