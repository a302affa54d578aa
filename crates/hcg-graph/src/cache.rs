//! Memoizing [`GraphQueryPort`] adapter.
//!
//! The planner issues on the order of `branching_factor * depth` queries per
//! call and does no caching of its own. Wrapping a slow store in
//! [`CachedGraph`] answers repeated per-id lookups from memory. Only
//! successful responses are cached; errors always pass through.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Capability, GoalTarget, Id, Process, State};
use crate::port::GraphQueryPort;

#[derive(Debug)]
struct Memo<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone> Memo<K, V> {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn put(&self, key: K, value: V) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

/// Caches per-id lookups of an inner port.
///
/// `find_achieving_processes` and the validator lookups are forwarded
/// without caching.
#[derive(Debug)]
pub struct CachedGraph<P> {
    inner: P,
    requirements: Memo<Id, Vec<State>>,
    causes: Memo<Id, Vec<State>>,
    causing: Memo<Id, Vec<Process>>,
    capabilities: Memo<Id, Option<Capability>>,
}

impl<P: GraphQueryPort> CachedGraph<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            requirements: Memo::new(),
            causes: Memo::new(),
            causing: Memo::new(),
            capabilities: Memo::new(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Total number of memoized responses across all query kinds.
    pub fn cached_entries(&self) -> usize {
        self.requirements.len() + self.causes.len() + self.causing.len() + self.capabilities.len()
    }

    /// Drop every memoized response, e.g. after the underlying graph changed.
    pub fn invalidate(&self) {
        self.requirements.clear();
        self.causes.clear();
        self.causing.clear();
        self.capabilities.clear();
    }
}

#[async_trait]
impl<P: GraphQueryPort> GraphQueryPort for CachedGraph<P> {
    async fn find_achieving_processes(&self, target: &GoalTarget) -> Result<Vec<(Process, State)>> {
        self.inner.find_achieving_processes(target).await
    }

    async fn get_process_requirements(&self, process_id: Id) -> Result<Vec<State>> {
        if let Some(hit) = self.requirements.get(&process_id) {
            return Ok(hit);
        }
        let states = self.inner.get_process_requirements(process_id).await?;
        self.requirements.put(process_id, states.clone());
        Ok(states)
    }

    async fn get_process_causes(&self, process_id: Id) -> Result<Vec<State>> {
        if let Some(hit) = self.causes.get(&process_id) {
            return Ok(hit);
        }
        let states = self.inner.get_process_causes(process_id).await?;
        self.causes.put(process_id, states.clone());
        Ok(states)
    }

    async fn find_processes_causing_state(&self, state_id: Id) -> Result<Vec<Process>> {
        if let Some(hit) = self.causing.get(&state_id) {
            return Ok(hit);
        }
        let processes = self.inner.find_processes_causing_state(state_id).await?;
        self.causing.put(state_id, processes.clone());
        Ok(processes)
    }

    async fn find_capability_for_process(&self, process_id: Id) -> Result<Option<Capability>> {
        if let Some(hit) = self.capabilities.get(&process_id) {
            return Ok(hit);
        }
        let capability = self.inner.find_capability_for_process(process_id).await?;
        self.capabilities.put(process_id, capability.clone());
        Ok(capability)
    }

    async fn find_process_by_id(&self, process_id: Id) -> Result<Option<Process>> {
        self.inner.find_process_by_id(process_id).await
    }

    async fn find_capability_by_id(&self, capability_id: Id) -> Result<Option<Capability>> {
        self.inner.find_capability_by_id(capability_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryGraph;

    #[tokio::test]
    async fn caches_lookups_and_invalidates() {
        let mut graph = InMemoryGraph::new();
        let p = graph.add_process(Process::new(Id::generate(), "p")).unwrap();
        let s = graph.add_state(State::new(Id::generate())).unwrap();
        graph.add_cause(p, s).unwrap();

        let cached = CachedGraph::new(graph);
        assert_eq!(cached.cached_entries(), 0);

        let first = cached.get_process_causes(p).await.unwrap();
        let second = cached.get_process_causes(p).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.cached_entries(), 1);

        cached.find_processes_causing_state(s).await.unwrap();
        cached.find_capability_for_process(p).await.unwrap();
        assert_eq!(cached.cached_entries(), 3);

        cached.invalidate();
        assert_eq!(cached.cached_entries(), 0);
    }
}
