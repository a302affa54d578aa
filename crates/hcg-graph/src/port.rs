//! The `GraphQueryPort` trait -- the read-only contract the planner needs
//! from whatever owns the causal graph.
//!
//! The trait is object-safe so a planner can hold `Arc<dyn GraphQueryPort>`
//! as readily as a concrete store.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Capability, GoalTarget, Id, Process, State};

/// Read-only queries over the hybrid causal graph.
///
/// Every method is a pure read. Implementations report failures as
/// [`anyhow::Error`]; callers propagate them untouched.
#[async_trait]
pub trait GraphQueryPort: Send + Sync {
    /// Every `(process, effect_state)` pair where the process CAUSES a state
    /// matching `target`.
    ///
    /// The order is implementation-defined, but callers treat it as a
    /// ranked candidate list and try entries front to back.
    async fn find_achieving_processes(&self, target: &GoalTarget) -> Result<Vec<(Process, State)>>;

    /// The REQUIRES targets (preconditions) of a process.
    async fn get_process_requirements(&self, process_id: Id) -> Result<Vec<State>>;

    /// The CAUSES targets (effects) of a process.
    async fn get_process_causes(&self, process_id: Id) -> Result<Vec<State>>;

    /// Every process with a CAUSES edge to `state_id`.
    async fn find_processes_causing_state(&self, state_id: Id) -> Result<Vec<Process>>;

    /// The capability bound to a process, if any.
    async fn find_capability_for_process(&self, process_id: Id) -> Result<Option<Capability>>;

    /// Look up a process by id.
    async fn find_process_by_id(&self, process_id: Id) -> Result<Option<Process>>;

    /// Look up a capability by id.
    async fn find_capability_by_id(&self, capability_id: Id) -> Result<Option<Capability>>;
}

// Compile-time assertion: GraphQueryPort must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn GraphQueryPort) {}
};

#[async_trait]
impl<P: GraphQueryPort + ?Sized> GraphQueryPort for std::sync::Arc<P> {
    async fn find_achieving_processes(&self, target: &GoalTarget) -> Result<Vec<(Process, State)>> {
        (**self).find_achieving_processes(target).await
    }

    async fn get_process_requirements(&self, process_id: Id) -> Result<Vec<State>> {
        (**self).get_process_requirements(process_id).await
    }

    async fn get_process_causes(&self, process_id: Id) -> Result<Vec<State>> {
        (**self).get_process_causes(process_id).await
    }

    async fn find_processes_causing_state(&self, state_id: Id) -> Result<Vec<Process>> {
        (**self).find_processes_causing_state(state_id).await
    }

    async fn find_capability_for_process(&self, process_id: Id) -> Result<Option<Capability>> {
        (**self).find_capability_for_process(process_id).await
    }

    async fn find_process_by_id(&self, process_id: Id) -> Result<Option<Process>> {
        (**self).find_process_by_id(process_id).await
    }

    async fn find_capability_by_id(&self, capability_id: Id) -> Result<Option<Capability>> {
        (**self).find_capability_by_id(capability_id).await
    }
}
