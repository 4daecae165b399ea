//! Static model of the account store graph.
//!
//! The topology describes which node types exist (accounts, groups,
//! directories, organizations, applications and the join rows between them)
//! and the directed edges that connect them. It holds no data; it is the
//! schema that membership paths are searched over.
//!
//! # Example
//!
//! ```rust
//! use storegraph::topology::{NodeType, find_paths, topology};
//!
//! let paths = find_paths(topology(), NodeType::Organization, NodeType::Account);
//! assert_eq!(paths.len(), 3);
//! ```

mod edge;
mod node;
mod paths;
mod registry;

pub use edge::{Cardinality, Discriminator, Edge, EdgeKind, Join, STORE_TYPE_COLUMN};
pub use node::{Direction, NodeType};
pub use paths::{Path, find_paths};
pub use registry::{Topology, topology};
