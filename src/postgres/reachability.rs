use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{FromRow, Postgres};
use sqlx::query::{QueryAs, QueryScalar};

use super::account::AccountRecord;
use super::store::GroupRecord;
use super::{PostgresStore, db_error, id, parse_status};
use crate::StoreError;
use crate::query::sql::{self, SqlParam, Statement};
use crate::query::{CollectionQuery, DerivedRelation, Dialect, Page, QueryPlan};
use crate::repository::{Account, Group, NodeRef, ReachabilityRepository, Status};
use crate::topology::NodeType;

fn bind_rows<'q, O>(stmt: &'q Statement) -> QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, PgRow>,
{
    stmt.params
        .iter()
        .fold(sqlx::query_as(&stmt.sql), |query, param| match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_str()),
        })
}

fn bind_scalar<'q>(stmt: &'q Statement) -> QueryScalar<'q, Postgres, i64, PgArguments> {
    stmt.params
        .iter()
        .fold(sqlx::query_scalar(&stmt.sql), |query, param| match param {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_str()),
        })
}

impl PostgresStore {
    async fn count_rows(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        plan: &QueryPlan,
    ) -> Result<u64, StoreError> {
        let stmt = sql::select_count(relation, Dialect::Postgres, tenant_id, root_id, plan);
        let count = bind_scalar(&stmt)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("count"))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl ReachabilityRepository for PostgresStore {
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

        let stmt = sql::select_page(relation, Dialect::Postgres, tenant_id, root_id, &plan);
        let rows: Vec<AccountRecord> = bind_rows(&stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_accounts"))?;
        let size = self.count_rows(tenant_id, relation, root_id, &plan).await?;

        Ok(Page {
            offset: plan.offset,
            limit: plan.limit,
            size,
            items: rows
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
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

        let stmt = sql::select_page(relation, Dialect::Postgres, tenant_id, root_id, &plan);
        let rows: Vec<GroupRecord> = bind_rows(&stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list_groups"))?;
        let size = self.count_rows(tenant_id, relation, root_id, &plan).await?;

        Ok(Page {
            offset: plan.offset,
            limit: plan.limit,
            size,
            items: rows
                .into_iter()
                .map(TryInto::try_into)
                .collect::<Result<_, _>>()?,
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
        let stmt = sql::select_reachable(relation, Dialect::Postgres, tenant_id, root_id, target_id);
        let count = bind_scalar(&stmt)
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
            "SELECT status FROM {} WHERE id = $1 AND tenant_id = $2",
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
