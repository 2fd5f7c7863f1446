//! Analysis modules.
//!
//! Aggregation of resolved submissions and the student roster.

pub mod aggregator;
pub mod roster;

pub use aggregator::{AggregateState, Aggregator};
pub use roster::ClassRoster;
