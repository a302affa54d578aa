//! In-memory causal graph.
//!
//! [`InMemoryGraph`] is populated once through its builder methods and then
//! served read-only through [`GraphQueryPort`]. Every query returns results
//! in insertion order, so candidate ordering is deterministic.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Capability, GoalTarget, Id, Process, State};
use crate::port::GraphQueryPort;

/// Errors raised while populating an [`InMemoryGraph`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown process {0}")]
    UnknownProcess(Id),

    #[error("unknown state {0}")]
    UnknownState(Id),

    #[error("unknown capability {0}")]
    UnknownCapability(Id),

    #[error("duplicate node id {0}")]
    DuplicateId(Id),
}

/// A causal graph held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryGraph {
    states: Vec<State>,
    processes: Vec<Process>,
    capabilities: Vec<Capability>,
    state_idx: HashMap<Id, usize>,
    process_idx: HashMap<Id, usize>,
    capability_idx: HashMap<Id, usize>,
    /// process -> precondition states, in edge insertion order
    requires: HashMap<Id, Vec<Id>>,
    /// process -> effect states, in edge insertion order
    causes: HashMap<Id, Vec<Id>>,
    /// state -> processes causing it, in edge insertion order
    caused_by: HashMap<Id, Vec<Id>>,
    bindings: HashMap<Id, Id>,
}

impl InMemoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unused(&self, id: Id) -> Result<(), GraphError> {
        if self.state_idx.contains_key(&id)
            || self.process_idx.contains_key(&id)
            || self.capability_idx.contains_key(&id)
        {
            return Err(GraphError::DuplicateId(id));
        }
        Ok(())
    }

    fn ensure_process(&self, id: Id) -> Result<(), GraphError> {
        if self.process_idx.contains_key(&id) {
            Ok(())
        } else {
            Err(GraphError::UnknownProcess(id))
        }
    }

    fn ensure_state(&self, id: Id) -> Result<(), GraphError> {
        if self.state_idx.contains_key(&id) {
            Ok(())
        } else {
            Err(GraphError::UnknownState(id))
        }
    }

    pub fn add_state(&mut self, state: State) -> Result<Id, GraphError> {
        self.ensure_unused(state.id)?;
        let id = state.id;
        self.state_idx.insert(id, self.states.len());
        self.states.push(state);
        Ok(id)
    }

    pub fn add_process(&mut self, process: Process) -> Result<Id, GraphError> {
        self.ensure_unused(process.id)?;
        let id = process.id;
        self.process_idx.insert(id, self.processes.len());
        self.processes.push(process);
        Ok(id)
    }

    pub fn add_capability(&mut self, capability: Capability) -> Result<Id, GraphError> {
        self.ensure_unused(capability.id)?;
        let id = capability.id;
        self.capability_idx.insert(id, self.capabilities.len());
        self.capabilities.push(capability);
        Ok(id)
    }

    /// Add a REQUIRES edge: `process` needs `state` to hold beforehand.
    pub fn add_requirement(&mut self, process: Id, state: Id) -> Result<(), GraphError> {
        self.ensure_process(process)?;
        self.ensure_state(state)?;
        let edges = self.requires.entry(process).or_default();
        if !edges.contains(&state) {
            edges.push(state);
        }
        Ok(())
    }

    /// Add a CAUSES edge: running `process` makes `state` hold.
    pub fn add_cause(&mut self, process: Id, state: Id) -> Result<(), GraphError> {
        self.ensure_process(process)?;
        self.ensure_state(state)?;
        let edges = self.causes.entry(process).or_default();
        if !edges.contains(&state) {
            edges.push(state);
            self.caused_by.entry(state).or_default().push(process);
        }
        Ok(())
    }

    /// Bind a process to the capability that executes it, replacing any
    /// previous binding.
    pub fn bind_capability(&mut self, process: Id, capability: Id) -> Result<(), GraphError> {
        self.ensure_process(process)?;
        if !self.capability_idx.contains_key(&capability) {
            return Err(GraphError::UnknownCapability(capability));
        }
        self.bindings.insert(process, capability);
        Ok(())
    }

    pub fn state(&self, id: Id) -> Option<&State> {
        self.state_idx.get(&id).map(|&i| &self.states[i])
    }

    pub fn process(&self, id: Id) -> Option<&Process> {
        self.process_idx.get(&id).map(|&i| &self.processes[i])
    }

    pub fn capability(&self, id: Id) -> Option<&Capability> {
        self.capability_idx.get(&id).map(|&i| &self.capabilities[i])
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn states_for(&self, edges: Option<&Vec<Id>>) -> Vec<State> {
        edges
            .into_iter()
            .flatten()
            .filter_map(|id| self.state(*id).cloned())
            .collect()
    }
}

#[async_trait]
impl GraphQueryPort for InMemoryGraph {
    async fn find_achieving_processes(&self, target: &GoalTarget) -> Result<Vec<(Process, State)>> {
        let mut found = Vec::new();
        for process in &self.processes {
            for state in self.states_for(self.causes.get(&process.id)) {
                if state.matches(target) {
                    found.push((process.clone(), state));
                }
            }
        }
        Ok(found)
    }

    async fn get_process_requirements(&self, process_id: Id) -> Result<Vec<State>> {
        Ok(self.states_for(self.requires.get(&process_id)))
    }

    async fn get_process_causes(&self, process_id: Id) -> Result<Vec<State>> {
        Ok(self.states_for(self.causes.get(&process_id)))
    }

    async fn find_processes_causing_state(&self, state_id: Id) -> Result<Vec<Process>> {
        Ok(self
            .caused_by
            .get(&state_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.process(*id).cloned())
            .collect())
    }

    async fn find_capability_for_process(&self, process_id: Id) -> Result<Option<Capability>> {
        Ok(self
            .bindings
            .get(&process_id)
            .and_then(|id| self.capability(*id))
            .cloned())
    }

    async fn find_process_by_id(&self, process_id: Id) -> Result<Option<Process>> {
        Ok(self.process(process_id).cloned())
    }

    async fn find_capability_by_id(&self, capability_id: Id) -> Result<Option<Capability>> {
        Ok(self.capability(capability_id).cloned())
    }
}
