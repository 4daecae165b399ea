//! SQL rendering for compiled paths and derived relations.
//!
//! Every statement binds the root id as parameter 1 and the tenant id as
//! parameter 2. Filter and pagination parameters follow in order.

use std::fmt::Write;

use super::collection::{QueryPlan, SortDirection};
use super::compiler::{CompiledPath, Condition, DIRECTORY_COLUMN, STATUS_COLUMN};
use super::relation::DerivedRelation;
use crate::repository::Status;
use crate::topology::NodeType;

/// Alias of the destination table in outer queries.
pub const OUTER_ALIAS: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Placeholder for the `n`th bound parameter (1-based).
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::Sqlite => format!("?{n}"),
        }
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
}

impl SqlParam {
    /// Ids above `i64::MAX` cannot be stored; they bind `-1`, which no row has.
    pub fn id(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(-1))
    }
}

/// SQL text with its parameters in binding order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    fn new(tenant_id: u64, root_id: u64) -> Self {
        Self {
            sql: String::new(),
            params: vec![SqlParam::id(root_id), SqlParam::id(tenant_id)],
        }
    }

    fn bind(&mut self, dialect: Dialect, param: SqlParam) -> String {
        self.params.push(param);
        dialect.placeholder(self.params.len())
    }
}

fn condition_sql(alias: &str, condition: &Condition) -> String {
    match condition {
        Condition::Equals { column, value } => format!("{alias}.{column} = '{value}'"),
        Condition::OwningDirectoryEnabled => format!(
            "EXISTS (SELECT 1 FROM {dirs} od WHERE od.id = {alias}.{DIRECTORY_COLUMN} \
             AND od.tenant_id = {alias}.tenant_id AND od.{STATUS_COLUMN} = '{enabled}')",
            dirs = NodeType::Directory.table(),
            enabled = Status::Enabled.as_str(),
        ),
    }
}

/// Renders one path as `SELECT <leaf id> FROM ... JOIN ... WHERE <root>`.
pub fn render_path(path: &CompiledPath, dialect: Dialect) -> String {
    let mut sql = format!(
        "SELECT n{}.id FROM {} n0",
        path.steps.len(),
        path.source.table()
    );

    for (i, step) in path.steps.iter().enumerate() {
        let alias = format!("n{}", i + 1);
        let _ = write!(
            sql,
            " JOIN {table} {alias} ON {alias}.{to} = n{prev}.{from} AND {alias}.tenant_id = n{prev}.tenant_id",
            table = step.node.table(),
            to = step.join.to_column,
            from = step.join.from_column,
            prev = i,
        );
        for condition in &step.conditions {
            let _ = write!(sql, " AND {}", condition_sql(&alias, condition));
        }
    }

    let _ = write!(
        sql,
        " WHERE n0.id = {} AND n0.tenant_id = {}",
        dialect.placeholder(1),
        dialect.placeholder(2)
    );
    for condition in &path.root_conditions {
        let _ = write!(sql, " AND {}", condition_sql("n0", condition));
    }

    sql
}

/// Renders the membership predicate of a relation over [`OUTER_ALIAS`]:
/// `x.id IN (path UNION path ...)`, or a false constant without paths.
pub fn render_predicate(relation: &DerivedRelation, dialect: Dialect) -> String {
    if relation.is_empty() {
        return "1 = 0".to_owned();
    }

    let union = relation
        .paths()
        .iter()
        .map(|p| render_path(p, dialect))
        .collect::<Vec<_>>()
        .join(" UNION ");

    format!("{OUTER_ALIAS}.id IN ({union})")
}

fn where_clause(
    stmt: &mut Statement,
    relation: &DerivedRelation,
    dialect: Dialect,
    plan: &QueryPlan,
) {
    let _ = write!(
        stmt.sql,
        " WHERE {OUTER_ALIAS}.tenant_id = {} AND {}",
        dialect.placeholder(2),
        relation.sql_predicate(dialect)
    );

    if let Some(login) = &plan.login {
        let p = stmt.bind(dialect, SqlParam::Text(login.value.clone()));
        let alternatives: Vec<String> = login
            .columns
            .iter()
            .map(|c| format!("{OUTER_ALIAS}.{c} = {p}"))
            .collect();
        let _ = write!(stmt.sql, " AND ({})", alternatives.join(" OR "));
    }

    if let Some(search) = &plan.search {
        let p = stmt.bind(dialect, SqlParam::Text(search.like_pattern()));
        let alternatives: Vec<String> = search
            .columns
            .iter()
            .map(|c| format!("lower({OUTER_ALIAS}.{c}) LIKE {p} ESCAPE '\\'"))
            .collect();
        let _ = write!(stmt.sql, " AND ({})", alternatives.join(" OR "));
    }

    if let Some(status) = plan.status {
        let p = stmt.bind(dialect, SqlParam::Text(status.as_str().to_owned()));
        let _ = write!(stmt.sql, " AND {OUTER_ALIAS}.{STATUS_COLUMN} = {p}");
    }
}

/// `SELECT x.* ...` for one page of the relation's destination rows.
pub fn select_page(
    relation: &DerivedRelation,
    dialect: Dialect,
    tenant_id: u64,
    root_id: u64,
    plan: &QueryPlan,
) -> Statement {
    let mut stmt = Statement::new(tenant_id, root_id);
    stmt.sql = format!(
        "SELECT {OUTER_ALIAS}.* FROM {} {OUTER_ALIAS}",
        relation.destination().table()
    );
    where_clause(&mut stmt, relation, dialect, plan);

    let order: Vec<String> = plan
        .order
        .iter()
        .map(|(column, direction)| {
            let dir = match direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{OUTER_ALIAS}.{column} {dir}")
        })
        .collect();
    let _ = write!(stmt.sql, " ORDER BY {}", order.join(", "));

    let limit = stmt.bind(dialect, SqlParam::Int(i64::from(plan.limit)));
    let offset = i64::try_from(plan.offset).unwrap_or(i64::MAX);
    let offset = stmt.bind(dialect, SqlParam::Int(offset));
    let _ = write!(stmt.sql, " LIMIT {limit} OFFSET {offset}");

    stmt
}

/// `SELECT COUNT(*) ...` over the filtered relation.
pub fn select_count(
    relation: &DerivedRelation,
    dialect: Dialect,
    tenant_id: u64,
    root_id: u64,
    plan: &QueryPlan,
) -> Statement {
    let mut stmt = Statement::new(tenant_id, root_id);
    stmt.sql = format!(
        "SELECT COUNT(*) FROM {} {OUTER_ALIAS}",
        relation.destination().table()
    );
    where_clause(&mut stmt, relation, dialect, plan);
    stmt
}

/// `SELECT COUNT(*)` that is 1 when `target_id` is reachable and 0 otherwise.
pub fn select_reachable(
    relation: &DerivedRelation,
    dialect: Dialect,
    tenant_id: u64,
    root_id: u64,
    target_id: u64,
) -> Statement {
    let mut stmt = Statement::new(tenant_id, root_id);
    stmt.sql = format!(
        "SELECT COUNT(*) FROM {} {OUTER_ALIAS} WHERE {OUTER_ALIAS}.tenant_id = {} AND {}",
        relation.destination().table(),
        dialect.placeholder(2),
        relation.sql_predicate(dialect)
    );
    let p = stmt.bind(dialect, SqlParam::id(target_id));
    let _ = write!(stmt.sql, " AND {OUTER_ALIAS}.id = {p}");
    stmt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CollectionQuery, SortField, relation};

    #[test]
    fn test_render_direct_directory_path() {
        let rel = relation(NodeType::Application, NodeType::Account);
        let direct = rel
            .paths()
            .iter()
            .find(|p| p.steps.len() == 3 && p.steps[1].node == NodeType::Directory)
            .unwrap();

        assert_eq!(
            render_path(direct, Dialect::Postgres),
            "SELECT n3.id FROM applications n0 \
             JOIN account_store_mappings n1 ON n1.application_id = n0.id AND n1.tenant_id = n0.tenant_id \
             AND n1.account_store_type = 'directory' \
             JOIN directories n2 ON n2.id = n1.account_store_id AND n2.tenant_id = n1.tenant_id \
             AND n2.status = 'ENABLED' \
             JOIN accounts n3 ON n3.directory_id = n2.id AND n3.tenant_id = n2.tenant_id \
             WHERE n0.id = $1 AND n0.tenant_id = $2"
        );
    }

    #[test]
    fn test_sqlite_placeholders() {
        let rel = relation(NodeType::Directory, NodeType::Account);
        let sql = rel.sql_predicate(Dialect::Sqlite);
        assert!(sql.contains("n0.id = ?1 AND n0.tenant_id = ?2"));
        assert!(!sql.contains('$'));
        assert!(sql.contains("EXISTS (SELECT 1 FROM directories od"));
    }

    #[test]
    fn test_empty_relation_is_false() {
        let rel = relation(NodeType::Account, NodeType::Account);
        assert_eq!(rel.sql_predicate(Dialect::Postgres), "1 = 0");
    }

    #[test]
    fn test_select_page_binds_filters_in_order() {
        let rel = relation(NodeType::Application, NodeType::Account);
        let plan = CollectionQuery::new()
            .login("Jane@Example.com")
            .order_by(SortField::Email, SortDirection::Desc)
            .limit(10)
            .offset(20)
            .plan(NodeType::Account)
            .unwrap();

        let stmt = select_page(rel, Dialect::Postgres, 7, 3, &plan);

        assert_eq!(
            stmt.params,
            vec![
                SqlParam::Int(3),
                SqlParam::Int(7),
                SqlParam::Text("jane@example.com".to_owned()),
                SqlParam::Int(10),
                SqlParam::Int(20),
            ]
        );
        assert!(stmt.sql.starts_with("SELECT x.* FROM accounts x WHERE x.tenant_id = $2 AND x.id IN ("));
        assert!(stmt.sql.contains("(x.email_key = $3 OR x.username_key = $3)"));
        assert!(stmt.sql.ends_with("ORDER BY x.email DESC, x.id ASC LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn test_oversized_ids_bind_no_row() {
        let rel = relation(NodeType::Application, NodeType::Account);
        let stmt = select_reachable(rel, Dialect::Sqlite, 1, u64::MAX, u64::MAX);
        assert_eq!(stmt.params, vec![SqlParam::Int(-1), SqlParam::Int(1), SqlParam::Int(-1)]);
    }

    #[test]
    fn test_select_reachable() {
        let rel = relation(NodeType::Account, NodeType::Application);
        let stmt = select_reachable(rel, Dialect::Sqlite, 1, 5, 9);
        assert!(stmt.sql.starts_with("SELECT COUNT(*) FROM applications x WHERE x.tenant_id = ?2"));
        assert!(stmt.sql.ends_with("AND x.id = ?3"));
        assert_eq!(stmt.params.len(), 3);
    }
}
