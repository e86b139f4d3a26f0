//! Graph queries over associations
//!
//! The algorithms here are storage-independent: a store loads the bounded
//! set of associations a query can reach, builds an `AdjacencyIndex` and
//! runs the query over it.

mod connected;
mod cycle;
mod index;
mod path;
mod types;

pub use connected::ConnectedQuery;
pub use cycle::CycleQuery;
pub use index::AdjacencyIndex;
pub use path::PathQuery;
pub use types::{ConnectedElement, Cycle, Direction, GraphPath, Reach};
