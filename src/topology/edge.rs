//! Edges between topology node types.

use std::fmt;

use super::node::{Direction, NodeType};

/// Column shared by both mapping tables that names the mapped store's type.
pub const STORE_TYPE_COLUMN: &str = "account_store_type";

/// Whether an edge resolves to one row or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Equi-join between the source row and the target row of an edge:
/// `target.to_column = source.from_column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Join {
    pub from_column: &'static str,
    pub to_column: &'static str,
}

impl Join {
    pub const fn new(from_column: &'static str, to_column: &'static str) -> Self {
        Self {
            from_column,
            to_column,
        }
    }
}

/// Restricts an edge to mapping rows of one store type.
///
/// The condition always applies to the mapping side of the edge, whichever
/// end that is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discriminator {
    pub column: &'static str,
    pub value: &'static str,
}

impl Discriminator {
    pub const fn store_type(value: &'static str) -> Self {
        Self {
            column: STORE_TYPE_COLUMN,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// A real foreign-key relationship usable in membership paths.
    Structural(Join),
    /// A many-to-many view that duplicates a longer structural path.
    Aggregate { via: NodeType },
    /// A default-store pointer on an application or organization.
    DefaultPointer(Join),
}

/// A named, directed relationship from one node type to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub name: &'static str,
    pub from: NodeType,
    pub to: NodeType,
    pub cardinality: Cardinality,
    pub kind: EdgeKind,
    pub discriminator: Option<Discriminator>,
}

impl Edge {
    pub const fn one(name: &'static str, from: NodeType, to: NodeType, join: Join) -> Self {
        Self {
            name,
            from,
            to,
            cardinality: Cardinality::One,
            kind: EdgeKind::Structural(join),
            discriminator: None,
        }
    }

    pub const fn many(name: &'static str, from: NodeType, to: NodeType, join: Join) -> Self {
        Self {
            name,
            from,
            to,
            cardinality: Cardinality::Many,
            kind: EdgeKind::Structural(join),
            discriminator: None,
        }
    }

    pub const fn aggregate(name: &'static str, from: NodeType, to: NodeType, via: NodeType) -> Self {
        Self {
            name,
            from,
            to,
            cardinality: Cardinality::Many,
            kind: EdgeKind::Aggregate { via },
            discriminator: None,
        }
    }

    pub const fn default_pointer(name: &'static str, from: NodeType, to: NodeType, join: Join) -> Self {
        Self {
            name,
            from,
            to,
            cardinality: Cardinality::One,
            kind: EdgeKind::DefaultPointer(join),
            discriminator: None,
        }
    }

    /// Restrict this edge to mappings whose store type is `store_type`.
    #[must_use]
    pub const fn only(mut self, store_type: &'static str) -> Self {
        self.discriminator = Some(Discriminator::store_type(store_type));
        self
    }

    /// The join for a structural edge.
    pub fn join(&self) -> Option<Join> {
        match self.kind {
            EdgeKind::Structural(join) => Some(join),
            EdgeKind::Aggregate { .. } | EdgeKind::DefaultPointer(_) => None,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(self.kind, EdgeKind::Structural(_))
    }

    pub fn direction(&self) -> Option<Direction> {
        self.from.direction_to(self.to)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.from, self.name)?;
        if let Some(d) = self.discriminator {
            write!(f, "[{}]", d.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_sets_store_type_discriminator() {
        let edge = Edge::one(
            "directory",
            NodeType::ApplicationMapping,
            NodeType::Directory,
            Join::new("account_store_id", "id"),
        )
        .only("directory");

        let d = edge.discriminator.unwrap();
        assert_eq!(d.column, STORE_TYPE_COLUMN);
        assert_eq!(d.value, "directory");
        assert_eq!(edge.to_string(), "application_mapping.directory[directory]");
    }

    #[test]
    fn test_only_structural_edges_have_joins() {
        let pointer = Edge::default_pointer(
            "defaultAccountStoreMapping",
            NodeType::Application,
            NodeType::ApplicationMapping,
            Join::new("default_account_store_mapping_id", "id"),
        );
        let aggregate = Edge::aggregate(
            "groups",
            NodeType::Account,
            NodeType::Group,
            NodeType::GroupMembership,
        );

        assert!(pointer.join().is_none());
        assert!(aggregate.join().is_none());
        assert_eq!(pointer.direction(), Some(Direction::Down));
    }
}
