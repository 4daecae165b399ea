//! Derived relations: the union of every compiled path between two types.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::compiler::{CompiledPath, compile};
use super::sql::{Dialect, render_predicate};
use crate::StoreError;
use crate::topology::{NodeType, Topology, find_paths, topology};

static RELATIONS: LazyLock<HashMap<(NodeType, NodeType), DerivedRelation>> =
    LazyLock::new(|| {
        let mut relations = HashMap::new();
        for source in NodeType::ALL {
            for destination in NodeType::ALL {
                relations.insert(
                    (source, destination),
                    DerivedRelation::build(topology(), source, destination),
                );
            }
        }
        log::debug!(
            target: "storegraph",
            "msg=\"derived relations compiled\", pairs={}, paths={}",
            relations.len(),
            relations.values().map(|r: &DerivedRelation| r.paths.len()).sum::<usize>()
        );
        relations
    });

static EMPTY: LazyLock<DerivedRelation> = LazyLock::new(|| DerivedRelation {
    source: NodeType::Account,
    destination: NodeType::Account,
    paths: Vec::new(),
    postgres: render_empty(),
    sqlite: render_empty(),
});

fn render_empty() -> String {
    "1 = 0".to_owned()
}

/// The cached relation from `source` to `destination` over the standard
/// topology.
///
/// All pairs are compiled together on first use and never change
/// afterwards, so the returned reference can be shared freely.
pub fn relation(source: NodeType, destination: NodeType) -> &'static DerivedRelation {
    RELATIONS.get(&(source, destination)).unwrap_or(&EMPTY)
}

/// "Every `destination` reachable from one `source` row", as a set of
/// compiled paths combined disjunctively.
///
/// A relation with no paths is valid and always empty.
#[derive(Debug, Clone)]
pub struct DerivedRelation {
    source: NodeType,
    destination: NodeType,
    paths: Vec<CompiledPath>,
    postgres: String,
    sqlite: String,
}

impl DerivedRelation {
    /// Compiles a relation over an arbitrary topology.
    pub fn build(topology: &Topology, source: NodeType, destination: NodeType) -> Self {
        let paths: Vec<CompiledPath> = find_paths(topology, source, destination)
            .iter()
            .filter_map(compile)
            .collect();

        let mut relation = Self {
            source,
            destination,
            paths,
            postgres: String::new(),
            sqlite: String::new(),
        };
        relation.postgres = render_predicate(&relation, Dialect::Postgres);
        relation.sqlite = render_predicate(&relation, Dialect::Sqlite);
        relation
    }

    pub fn source(&self) -> NodeType {
        self.source
    }

    pub fn destination(&self) -> NodeType {
        self.destination
    }

    pub fn paths(&self) -> &[CompiledPath] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Fails with [`StoreError::Validation`] unless the relation ends at `node`.
    pub fn expect_destination(&self, node: NodeType) -> Result<(), StoreError> {
        if self.destination == node {
            Ok(())
        } else {
            Err(StoreError::validation(format!(
                "relation leads to {}, not {node}",
                self.destination
            )))
        }
    }

    /// `x.id IN (...)` membership predicate, with the root id bound as
    /// parameter 1 and the tenant id as parameter 2.
    pub fn sql_predicate(&self, dialect: Dialect) -> &str {
        match dialect {
            Dialect::Postgres => &self.postgres,
            Dialect::Sqlite => &self.sqlite,
        }
    }
}
