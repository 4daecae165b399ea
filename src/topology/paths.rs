//! Enumeration of membership paths between two node types.

use std::fmt;

use super::edge::{Edge, EdgeKind};
use super::node::NodeType;
use super::registry::Topology;

/// An ordered sequence of structural edges from a source type to a
/// destination type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    edges: Vec<Edge>,
}

impl Path {
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Node types visited after the source, in order. The last one is the
    /// destination.
    pub fn nodes(&self) -> impl Iterator<Item = NodeType> + '_ {
        self.edges.iter().map(|e| e.to)
    }

    pub fn passes_through(&self, node: NodeType) -> bool {
        let len = self.edges.len();
        self.edges
            .iter()
            .take(len.saturating_sub(1))
            .any(|e| e.to == node)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, edge) in self.edges.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{edge}")?;
        }
        Ok(())
    }
}

/// Finds every path from `source` to `destination` that moves monotonically
/// toward `destination` in hierarchy order.
///
/// The search is exhaustive over the pruned graph, so several paths between
/// the same two types are normal. Aggregate shortcuts and default-store
/// pointers are never followed. Returns no paths when `source` and
/// `destination` are the same type or either is outside the topology.
pub fn find_paths(topology: &Topology, source: NodeType, destination: NodeType) -> Vec<Path> {
    if !topology.contains(source) || !topology.contains(destination) {
        return Vec::new();
    }

    search(topology, source, destination)
        .into_iter()
        .map(|mut edges| {
            edges.reverse();
            Path { edges }
        })
        .collect()
}

// Paths come back leaf-first so each level can push instead of prepend.
fn search(topology: &Topology, source: NodeType, destination: NodeType) -> Vec<Vec<Edge>> {
    let Some(heading) = source.direction_to(destination) else {
        return Vec::new();
    };

    let mut found = Vec::new();

    for edge in topology.outgoing(source) {
        let target = edge.to;

        if !topology.contains(target) {
            continue;
        }
        if source.direction_to(target) != Some(heading) {
            continue;
        }
        if target != destination && target.direction_to(destination) != Some(heading) {
            continue;
        }
        if matches!(edge.kind, EdgeKind::Aggregate { .. } | EdgeKind::DefaultPointer(_)) {
            continue;
        }

        if target == destination {
            found.push(vec![*edge]);
        } else {
            for mut tail in search(topology, target, destination) {
                tail.push(*edge);
                found.push(tail);
            }
        }
    }

    found
}
