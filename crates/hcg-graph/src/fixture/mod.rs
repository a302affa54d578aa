//! Graph fixtures: a TOML description of states, processes, and
//! capabilities that builds an [`crate::memory::InMemoryGraph`].

pub mod format;
pub mod parser;

pub use format::{CapabilityToml, EntityToml, GraphToml, ProcessToml, StateToml};
pub use parser::{GraphFixture, GraphParseError, build_fixture, parse_graph_toml};
