//! Causal graph types and the read-only query contract used by the planner.

pub mod cache;
pub mod fixture;
pub mod memory;
pub mod models;
pub mod port;

pub use cache::CachedGraph;
pub use memory::{GraphError, InMemoryGraph};
pub use port::GraphQueryPort;
