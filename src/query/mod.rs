//! Query compilation for membership paths.
//!
//! Each path from [`find_paths`](crate::topology::find_paths) is compiled
//! into a join plan carrying its status and store-type filters. All plans
//! for a `(source, destination)` pair form a [`DerivedRelation`], which the
//! storage backends render to SQL or evaluate in memory and then narrow with
//! a [`CollectionQuery`].
//!
//! Relations depend only on the static topology and are compiled once per
//! process. Data is never cached.

mod collection;
mod compiler;
mod relation;
pub mod sql;

pub use collection::{
    CollectionQuery, Filter, Page, QueryPlan, SortDirection, SortField, TextMatch,
};
pub use compiler::{CompiledPath, Condition, DIRECTORY_COLUMN, STATUS_COLUMN, Step, compile};
pub use relation::{DerivedRelation, relation};
pub use sql::Dialect;
