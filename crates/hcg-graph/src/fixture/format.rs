//! TOML format types for graph fixture files.
//!
//! These types map directly to the `graph.toml` on-disk format and are
//! deserialized via `serde` + the `toml` crate. Nodes reference each other
//! by name; identifiers are derived from names when the graph is built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level structure of a `graph.toml` file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphToml {
    #[serde(default)]
    pub entities: Vec<EntityToml>,
    #[serde(default)]
    pub states: Vec<StateToml>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityToml>,
    #[serde(default)]
    pub processes: Vec<ProcessToml>,
}

/// A `[[entities]]` entry: something states can be about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityToml {
    pub name: String,
    /// Concept (type) of the entity, inherited by its states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
}

/// A `[[states]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateToml {
    pub name: String,
    /// Name of the entity this state describes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Overrides the entity's concept when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// A `[[capabilities]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityToml {
    pub name: String,
    /// The actor or service that performs processes bound to this capability.
    pub executor: String,
}

/// A `[[processes]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessToml {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Names of precondition states.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Names of effect states. Must not be empty.
    #[serde(default)]
    pub causes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_minimal_graph() {
        let toml_str = r#"
[[states]]
name = "done"

[[processes]]
name = "finish"
causes = ["done"]
"#;
        let graph: GraphToml = toml::from_str(toml_str).expect("should parse");
        assert!(graph.entities.is_empty());
        assert_eq!(graph.states.len(), 1);
        assert_eq!(graph.processes[0].causes, vec!["done"]);
        assert!(graph.processes[0].requires.is_empty());
        assert!(graph.processes[0].capability.is_none());
    }

    #[test]
    fn deserialize_state_properties() {
        let toml_str = r#"
[[entities]]
name = "block"
concept = "Block"

[[states]]
name = "BlockInBin"
entity = "block"

[states.properties]
location = "bin"
held = false
height_mm = 40
"#;
        let graph: GraphToml = toml::from_str(toml_str).expect("should parse");
        let props = &graph.states[0].properties;
        assert_eq!(props["location"], serde_json::json!("bin"));
        assert_eq!(props["held"], serde_json::json!(false));
        assert_eq!(props["height_mm"], serde_json::json!(40));
        assert_eq!(graph.entities[0].concept.as_deref(), Some("Block"));
    }
}
