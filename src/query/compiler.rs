//! Compilation of topology paths into join plans with per-hop filters.

use std::fmt;

use crate::repository::Status;
use crate::topology::{Join, NodeType, Path};

pub const STATUS_COLUMN: &str = "status";
pub const DIRECTORY_COLUMN: &str = "directory_id";

/// A filter attached to one row of a compiled path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// `column = value`.
    Equals {
        column: &'static str,
        value: &'static str,
    },
    /// The directory named by the row's `directory_id` is enabled.
    OwningDirectoryEnabled,
}

impl Condition {
    pub const fn enabled() -> Self {
        Self::Equals {
            column: STATUS_COLUMN,
            value: Status::Enabled.as_str(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { column, value } => write!(f, "{column} = '{value}'"),
            Self::OwningDirectoryEnabled => write!(f, "directory.{STATUS_COLUMN} = 'ENABLED'"),
        }
    }
}

/// One hop of a compiled path: join the previous row to a row of `node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Name of the edge this hop follows.
    pub edge: &'static str,
    pub node: NodeType,
    pub join: Join,
    /// Filters on the row reached by this hop.
    pub conditions: Vec<Condition>,
}

/// A path with its filters resolved, ready to be rendered or evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPath {
    pub source: NodeType,
    pub destination: NodeType,
    /// Filters on the root row beyond its id.
    pub root_conditions: Vec<Condition>,
    pub steps: Vec<Step>,
}

impl CompiledPath {
    /// Whether any row strictly between the root and the leaf is of `node`.
    pub fn passes_through(&self, node: NodeType) -> bool {
        let len = self.steps.len();
        self.steps
            .iter()
            .take(len.saturating_sub(1))
            .any(|s| s.node == node)
    }
}

/// Compiles a path into a join plan.
///
/// Discriminators land on whichever end of their edge is the mapping row.
/// Every intermediate row that has a status must be enabled. A leaf account
/// or group must have an enabled owning directory unless the path already
/// crossed an (enabled) directory on the way. The root and the leaf are
/// otherwise unfiltered.
///
/// Returns `None` for an empty path or one containing a non-structural edge.
pub fn compile(path: &Path) -> Option<CompiledPath> {
    let first = path.edges().first()?;
    let source = first.from;

    let mut root_conditions = Vec::new();
    let mut steps: Vec<Step> = Vec::with_capacity(path.len());

    for edge in path.edges() {
        let join = edge.join()?;
        let mut step = Step {
            edge: edge.name,
            node: edge.to,
            join,
            conditions: Vec::new(),
        };

        if let Some(d) = edge.discriminator {
            let condition = Condition::Equals {
                column: d.column,
                value: d.value,
            };
            if edge.to.is_mapping() {
                step.conditions.push(condition);
            } else {
                match steps.last_mut() {
                    Some(prev) => prev.conditions.push(condition),
                    None => root_conditions.push(condition),
                }
            }
        }

        steps.push(step);
    }

    let crossed_directory = path.passes_through(NodeType::Directory);
    let last = steps.len().saturating_sub(1);
    for (i, step) in steps.iter_mut().enumerate() {
        if i < last {
            if step.node.has_status() {
                step.conditions.push(Condition::enabled());
            }
        } else if step.node.is_directory_owned() && !crossed_directory {
            step.conditions.push(Condition::OwningDirectoryEnabled);
        }
    }

    Some(CompiledPath {
        source,
        destination: steps.last()?.node,
        root_conditions,
        steps,
    })
}
