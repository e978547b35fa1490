//! Query-space partitioning.
//!
//! - `splitter`: pure interval splitting per dimension rules
//! - `planner`: picks the dimension to narrow for an overflowing query

pub mod planner;
pub mod splitter;

pub use planner::{PartitionPlanner, Plan};
pub use splitter::split;
