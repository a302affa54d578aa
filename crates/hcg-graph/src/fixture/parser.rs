//! Graph fixture parser with validation.
//!
//! Parses a `graph.toml` string into a [`GraphToml`], validates it, and
//! builds a [`GraphFixture`]:
//! - The fixture contains at least one process.
//! - Names are unique within each node kind.
//! - Every entity, state, and capability reference resolves.
//! - Every process causes at least one state.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::format::GraphToml;
use crate::memory::{GraphError, InMemoryGraph};
use crate::models::{Capability, Id, Process, State};

/// Errors that can occur during fixture parsing and validation.
#[derive(Debug, Error)]
pub enum GraphParseError {
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("duplicate {kind} name: {name:?}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} {owner:?} references unknown {target_kind} {name:?}")]
    UnknownReference {
        kind: &'static str,
        owner: String,
        target_kind: &'static str,
        name: String,
    },

    #[error("process {0:?} causes no states")]
    NoEffects(String),

    #[error("graph must contain at least one process")]
    NoProcesses,

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// A validated fixture: the built graph plus name lookups.
#[derive(Debug, Clone)]
pub struct GraphFixture {
    pub graph: InMemoryGraph,
    entities: HashMap<String, Id>,
    concepts: HashMap<String, Id>,
    states: HashMap<String, Id>,
    processes: HashMap<String, Id>,
    capabilities: HashMap<String, Id>,
}

impl GraphFixture {
    pub fn entity_id(&self, name: &str) -> Option<Id> {
        self.entities.get(name).copied()
    }

    pub fn concept_id(&self, name: &str) -> Option<Id> {
        self.concepts.get(name).copied()
    }

    pub fn state_id(&self, name: &str) -> Option<Id> {
        self.states.get(name).copied()
    }

    pub fn process_id(&self, name: &str) -> Option<Id> {
        self.processes.get(name).copied()
    }

    pub fn capability_id(&self, name: &str) -> Option<Id> {
        self.capabilities.get(name).copied()
    }
}

/// Parse, validate, and build a `graph.toml` string.
pub fn parse_graph_toml(content: &str) -> Result<GraphFixture, GraphParseError> {
    let graph: GraphToml = toml::from_str(content)?;
    build_fixture(&graph)
}

/// Validate an already-deserialized [`GraphToml`] and build its graph.
pub fn build_fixture(toml: &GraphToml) -> Result<GraphFixture, GraphParseError> {
    validate(toml)?;

    let mut fixture = GraphFixture {
        graph: InMemoryGraph::new(),
        entities: HashMap::new(),
        concepts: HashMap::new(),
        states: HashMap::new(),
        processes: HashMap::new(),
        capabilities: HashMap::new(),
    };

    let mut entity_concepts: HashMap<&str, Option<Id>> = HashMap::new();
    for entity in &toml.entities {
        let concept = entity.concept.as_deref().map(|c| fixture.intern_concept(c));
        fixture
            .entities
            .insert(entity.name.clone(), Id::from_name("entity", &entity.name));
        entity_concepts.insert(entity.name.as_str(), concept);
    }

    for state_toml in &toml.states {
        let mut state = State::new(Id::from_name("state", &state_toml.name)).name(&state_toml.name);
        state.properties = state_toml.properties.clone();
        if let Some(entity) = &state_toml.entity {
            state = state.entity(fixture.entities[entity]);
        }
        let concept = match (&state_toml.concept, &state_toml.entity) {
            (Some(c), _) => Some(fixture.intern_concept(c)),
            (None, Some(entity)) => entity_concepts[entity.as_str()],
            (None, None) => None,
        };
        if let Some(concept) = concept {
            state = state.concept(concept);
        }
        let id = fixture.graph.add_state(state)?;
        fixture.states.insert(state_toml.name.clone(), id);
    }

    for cap in &toml.capabilities {
        let id = fixture.graph.add_capability(Capability::new(
            Id::from_name("capability", &cap.name),
            &cap.name,
            &cap.executor,
        ))?;
        fixture.capabilities.insert(cap.name.clone(), id);
    }

    for proc_toml in &toml.processes {
        let mut process = Process::new(Id::from_name("process", &proc_toml.name), &proc_toml.name);
        process.description = proc_toml.description.clone();
        process.estimated_duration_ms = proc_toml.estimated_duration_ms;
        let id = fixture.graph.add_process(process)?;
        fixture.processes.insert(proc_toml.name.clone(), id);

        for name in &proc_toml.requires {
            fixture.graph.add_requirement(id, fixture.states[name])?;
        }
        for name in &proc_toml.causes {
            fixture.graph.add_cause(id, fixture.states[name])?;
        }
        if let Some(cap) = &proc_toml.capability {
            fixture.graph.bind_capability(id, fixture.capabilities[cap])?;
        }
    }

    tracing::debug!(
        states = fixture.states.len(),
        processes = fixture.processes.len(),
        capabilities = fixture.capabilities.len(),
        "built graph fixture"
    );

    Ok(fixture)
}

impl GraphFixture {
    fn intern_concept(&mut self, name: &str) -> Id {
        *self
            .concepts
            .entry(name.to_owned())
            .or_insert_with(|| Id::from_name("concept", name))
    }
}

/// Validate the parsed fixture structure.
fn validate(graph: &GraphToml) -> Result<(), GraphParseError> {
    if graph.processes.is_empty() {
        return Err(GraphParseError::NoProcesses);
    }

    let entities = unique_names("entity", graph.entities.iter().map(|e| &e.name))?;
    let states = unique_names("state", graph.states.iter().map(|s| &s.name))?;
    let capabilities = unique_names("capability", graph.capabilities.iter().map(|c| &c.name))?;
    unique_names("process", graph.processes.iter().map(|p| &p.name))?;

    for state in &graph.states {
        if let Some(entity) = &state.entity {
            if !entities.contains(entity.as_str()) {
                return Err(GraphParseError::UnknownReference {
                    kind: "state",
                    owner: state.name.clone(),
                    target_kind: "entity",
                    name: entity.clone(),
                });
            }
        }
    }

    for process in &graph.processes {
        if process.causes.is_empty() {
            return Err(GraphParseError::NoEffects(process.name.clone()));
        }

        for name in process.requires.iter().chain(&process.causes) {
            if !states.contains(name.as_str()) {
                return Err(GraphParseError::UnknownReference {
                    kind: "process",
                    owner: process.name.clone(),
                    target_kind: "state",
                    name: name.clone(),
                });
            }
        }

        if let Some(cap) = &process.capability {
            if !capabilities.contains(cap.as_str()) {
                return Err(GraphParseError::UnknownReference {
                    kind: "process",
                    owner: process.name.clone(),
                    target_kind: "capability",
                    name: cap.clone(),
                });
            }
        }
    }

    Ok(())
}

fn unique_names<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a String>,
) -> Result<HashSet<&'a str>, GraphParseError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(GraphParseError::DuplicateName {
                kind,
                name: name.clone(),
            });
        }
    }
    Ok(seen)
}
