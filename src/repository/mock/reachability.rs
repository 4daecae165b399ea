use std::cmp::Ordering;
use std::collections::BTreeSet;

use async_trait::async_trait;

use super::MockStore;
use super::tables::{Record, Tables, Value};
use crate::StoreError;
use crate::query::{
    CollectionQuery, CompiledPath, Condition, DIRECTORY_COLUMN, DerivedRelation, Page, QueryPlan,
    STATUS_COLUMN, SortDirection,
};
use crate::repository::{Account, Group, NodeRef, ReachabilityRepository, Status};
use crate::topology::NodeType;

fn holds(tables: &Tables, row: &dyn Record, condition: &Condition) -> bool {
    match condition {
        Condition::Equals { column, value } => row.column(column) == Value::Text((*value).to_owned()),
        Condition::OwningDirectoryEnabled => match row.column(DIRECTORY_COLUMN) {
            Value::Int(id) => tables
                .directory(row.tenant_id(), id)
                .is_some_and(|d| d.status.is_enabled()),
            _ => false,
        },
    }
}

fn walk(tables: &Tables, tenant_id: u64, path: &CompiledPath, root_id: u64) -> Vec<u64> {
    let mut frontier: Vec<&dyn Record> = tables
        .rows(path.source)
        .into_iter()
        .filter(|r| r.id() == root_id && r.tenant_id() == tenant_id)
        .filter(|r| path.root_conditions.iter().all(|c| holds(tables, *r, c)))
        .collect();

    for step in &path.steps {
        if frontier.is_empty() {
            break;
        }
        frontier = tables
            .rows(step.node)
            .into_iter()
            .filter(|r| r.tenant_id() == tenant_id)
            .filter(|r| {
                let key = r.column(step.join.to_column);
                frontier
                    .iter()
                    .any(|prev| key.joins(&prev.column(step.join.from_column)))
            })
            .filter(|r| step.conditions.iter().all(|c| holds(tables, *r, c)))
            .collect();
    }

    frontier.iter().map(|r| r.id()).collect()
}

/// Ids of every destination row reachable from `root_id` along any path.
pub(super) fn reachable_ids(
    tables: &Tables,
    tenant_id: u64,
    relation: &DerivedRelation,
    root_id: u64,
) -> BTreeSet<u64> {
    relation
        .paths()
        .iter()
        .flat_map(|path| walk(tables, tenant_id, path, root_id))
        .collect()
}

fn matches(plan: &QueryPlan, row: &dyn Record) -> bool {
    let text = |column: &str| match row.column(column) {
        Value::Text(s) => Some(s.to_lowercase()),
        _ => None,
    };

    if let Some(login) = &plan.login {
        if !login
            .columns
            .iter()
            .any(|c| row.column(c) == Value::Text(login.value.clone()))
        {
            return false;
        }
    }

    if let Some(search) = &plan.search {
        if !search
            .columns
            .iter()
            .any(|c| text(c).is_some_and(|v| v.contains(&search.value)))
        {
            return false;
        }
    }

    if let Some(status) = plan.status {
        if row.column(STATUS_COLUMN) != Value::Text(status.as_str().to_owned()) {
            return false;
        }
    }

    true
}

fn compare(plan: &QueryPlan, a: &dyn Record, b: &dyn Record) -> Ordering {
    for (column, direction) in &plan.order {
        let ordering = a.column(column).cmp(&b.column(column));
        let ordering = match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn select<'a, T: Record + Clone + 'a>(
    rows: impl Iterator<Item = &'a T>,
    reachable: &BTreeSet<u64>,
    tenant_id: u64,
    plan: &QueryPlan,
) -> Page<T> {
    let mut selected: Vec<&T> = rows
        .filter(|r| r.tenant_id() == tenant_id && reachable.contains(&r.id()))
        .filter(|r| matches(plan, *r))
        .collect();
    selected.sort_by(|a, b| compare(plan, *a, *b));

    let size = selected.len() as u64;
    let items = selected
        .into_iter()
        .skip(usize::try_from(plan.offset).unwrap_or(usize::MAX))
        .take(plan.limit as usize)
        .cloned()
        .collect();

    Page {
        offset: plan.offset,
        limit: plan.limit,
        size,
        items,
    }
}

#[async_trait]
impl ReachabilityRepository for MockStore {
    async fn list_accounts(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<Page<Account>, StoreError> {
        relation.expect_destination(NodeType::Account)?;
        let plan = query.plan(NodeType::Account)?;

        let tables = self.read()?;
        let reachable = reachable_ids(&tables, tenant_id, relation, root_id);
        Ok(select(tables.accounts.values(), &reachable, tenant_id, &plan))
    }

    async fn list_groups(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<Page<Group>, StoreError> {
        relation.expect_destination(NodeType::Group)?;
        let plan = query.plan(NodeType::Group)?;

        let tables = self.read()?;
        let reachable = reachable_ids(&tables, tenant_id, relation, root_id);
        Ok(select(tables.groups.values(), &reachable, tenant_id, &plan))
    }

    async fn count(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        query: &CollectionQuery,
    ) -> Result<u64, StoreError> {
        let plan = query.plan(relation.destination())?;

        let tables = self.read()?;
        let reachable = reachable_ids(&tables, tenant_id, relation, root_id);
        let count = tables
            .rows(relation.destination())
            .into_iter()
            .filter(|r| r.tenant_id() == tenant_id && reachable.contains(&r.id()))
            .filter(|r| matches(&plan, *r))
            .count();

        Ok(count as u64)
    }

    async fn is_reachable(
        &self,
        tenant_id: u64,
        relation: &DerivedRelation,
        root_id: u64,
        target_id: u64,
    ) -> Result<bool, StoreError> {
        let tables = self.read()?;
        Ok(reachable_ids(&tables, tenant_id, relation, root_id).contains(&target_id))
    }

    async fn find_status(
        &self,
        tenant_id: u64,
        node: NodeRef,
    ) -> Result<Option<Status>, StoreError> {
        let tables = self.read()?;
        let status = match node.node {
            NodeType::Account => tables.account(tenant_id, node.id).map(|r| r.status),
            NodeType::Group => tables.group(tenant_id, node.id).map(|r| r.status),
            NodeType::Directory => tables.directory(tenant_id, node.id).map(|r| r.status),
            NodeType::Organization => tables.organization(tenant_id, node.id).map(|r| r.status),
            NodeType::Application => tables.application(tenant_id, node.id).map(|r| r.status),
            NodeType::GroupMembership
            | NodeType::OrganizationMapping
            | NodeType::ApplicationMapping => None,
        };
        Ok(status)
    }
}
