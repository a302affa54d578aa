//! Shared test utilities for hcg integration tests.
//!
//! Provides ready-made causal graphs (the pick-and-place scenario, linear
//! chains of arbitrary length, a REQUIRES/CAUSES cycle) and port wrappers
//! that count or fail queries.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;

use hcg_graph::models::{
    Capability, Goal, GoalTarget, Id, Process, Provenance, ProvenanceSource, State,
};
use hcg_graph::{GraphQueryPort, InMemoryGraph};

/// A goal stamped as authored by a human.
pub fn goal_for(description: &str, target: GoalTarget) -> Goal {
    Goal::new(description, target, Provenance::new(ProvenanceSource::Human))
}

// ---------------------------------------------------------------------------
// Pick and place
// ---------------------------------------------------------------------------

/// The robot-arm scenario:
///
/// ```text
/// BlockOnTable -> MoveToBlock -> GripperAtBlock -> Grasp -> BlockGrasped
///     -> MoveToBin -> BlockAboveBin -> Release -> BlockInBin
/// ```
///
/// Every process is bound to the `arm-control` capability.
pub struct PickAndPlace {
    pub graph: InMemoryGraph,
    pub block: Id,
    pub block_on_table: Id,
    pub gripper_at_block: Id,
    pub block_grasped: Id,
    pub block_above_bin: Id,
    pub block_in_bin: Id,
    pub move_to_block: Id,
    pub grasp: Id,
    pub move_to_bin: Id,
    pub release: Id,
    pub arm: Id,
}

impl PickAndPlace {
    /// Goal: the block ends up in the bin.
    pub fn goal(&self) -> Goal {
        goal_for(
            "put the block in the bin",
            GoalTarget::new(self.block).property("location", "bin"),
        )
    }

    /// Only `BlockOnTable` holds.
    pub fn satisfied(&self) -> HashSet<Id> {
        HashSet::from([self.block_on_table])
    }

    /// The expected execution order.
    pub fn expected_sequence(&self) -> Vec<Id> {
        vec![self.move_to_block, self.grasp, self.move_to_bin, self.release]
    }
}

pub fn pick_and_place() -> PickAndPlace {
    let mut graph = InMemoryGraph::new();
    let block = Id::from_name("entity", "block");
    let gripper = Id::from_name("entity", "gripper");

    let mut state = |name: &str, entity: Id, key: &str, value: &str| {
        graph
            .add_state(
                State::new(Id::from_name("state", name))
                    .name(name)
                    .entity(entity)
                    .property(key, value),
            )
            .expect("fixture state ids are unique")
    };

    let block_on_table = state("BlockOnTable", block, "location", "table");
    let gripper_at_block = state("GripperAtBlock", gripper, "location", "block");
    let block_grasped = state("BlockGrasped", block, "location", "gripper");
    let block_above_bin = state("BlockAboveBin", block, "location", "above_bin");
    let block_in_bin = state("BlockInBin", block, "location", "bin");

    let arm = graph
        .add_capability(Capability::new(
            Id::from_name("capability", "arm-control"),
            "arm-control",
            "executor-service",
        ))
        .expect("fixture capability id is unique");

    let chain = [
        ("MoveToBlock", block_on_table, gripper_at_block, 1200),
        ("Grasp", gripper_at_block, block_grasped, 400),
        ("MoveToBin", block_grasped, block_above_bin, 1500),
        ("Release", block_above_bin, block_in_bin, 300),
    ];
    let mut ids = Vec::with_capacity(chain.len());
    for (name, requires, causes, duration) in chain {
        let id = graph
            .add_process(
                Process::new(Id::from_name("process", name), name).estimated_duration_ms(duration),
            )
            .expect("fixture process ids are unique");
        graph.add_requirement(id, requires).expect("state exists");
        graph.add_cause(id, causes).expect("state exists");
        graph.bind_capability(id, arm).expect("capability exists");
        ids.push(id);
    }

    PickAndPlace {
        graph,
        block,
        block_on_table,
        gripper_at_block,
        block_grasped,
        block_above_bin,
        block_in_bin,
        move_to_block: ids[0],
        grasp: ids[1],
        move_to_bin: ids[2],
        release: ids[3],
        arm,
    }
}

/// The pick-and-place scenario as a `graph.toml` fixture.
pub const PICK_AND_PLACE_TOML: &str = r#"
[[entities]]
name = "block"
concept = "Block"

[[entities]]
name = "gripper"

[[states]]
name = "BlockOnTable"
entity = "block"
properties = { location = "table" }

[[states]]
name = "GripperAtBlock"
entity = "gripper"
properties = { location = "block" }

[[states]]
name = "BlockGrasped"
entity = "block"
properties = { location = "gripper" }

[[states]]
name = "BlockAboveBin"
entity = "block"
properties = { location = "above_bin" }

[[states]]
name = "BlockInBin"
entity = "block"
properties = { location = "bin" }

[[capabilities]]
name = "arm-control"
executor = "executor-service"

[[processes]]
name = "MoveToBlock"
requires = ["BlockOnTable"]
causes = ["GripperAtBlock"]
capability = "arm-control"
estimated_duration_ms = 1200

[[processes]]
name = "Grasp"
requires = ["GripperAtBlock"]
causes = ["BlockGrasped"]
capability = "arm-control"
estimated_duration_ms = 400

[[processes]]
name = "MoveToBin"
requires = ["BlockGrasped"]
causes = ["BlockAboveBin"]
capability = "arm-control"
estimated_duration_ms = 1500

[[processes]]
name = "Release"
requires = ["BlockAboveBin"]
causes = ["BlockInBin"]
capability = "arm-control"
estimated_duration_ms = 300
"#;

// ---------------------------------------------------------------------------
// Linear chains
// ---------------------------------------------------------------------------

/// `len` processes in a row: process `i` requires `states[i]` and causes
/// `states[i + 1]`. Only `states[0]` is satisfied.
pub struct Chain {
    pub graph: InMemoryGraph,
    pub entity: Id,
    pub states: Vec<Id>,
    pub processes: Vec<Id>,
}

impl Chain {
    /// Goal: reach the last state of the chain.
    pub fn goal(&self) -> Goal {
        let last = self.states.len() - 1;
        goal_for(
            "reach the end of the chain",
            GoalTarget::new(self.entity).property("step", last),
        )
    }

    pub fn satisfied(&self) -> HashSet<Id> {
        HashSet::from([self.states[0]])
    }
}

pub fn linear_chain(len: usize) -> Chain {
    let mut graph = InMemoryGraph::new();
    let entity = Id::generate();

    let states: Vec<Id> = (0..=len)
        .map(|i| {
            graph
                .add_state(
                    State::new(Id::generate())
                        .name(format!("s{i}"))
                        .entity(entity)
                        .property("step", i),
                )
                .expect("fresh id")
        })
        .collect();

    let processes: Vec<Id> = (0..len)
        .map(|i| {
            let id = graph
                .add_process(Process::new(Id::generate(), format!("p{i}")))
                .expect("fresh id");
            graph.add_requirement(id, states[i]).expect("state exists");
            graph.add_cause(id, states[i + 1]).expect("state exists");
            id
        })
        .collect();

    Chain {
        graph,
        entity,
        states,
        processes,
    }
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

/// A graph with a REQUIRES/CAUSES cycle below the goal:
///
/// ```text
/// Finish requires X, causes Done
/// MakeX  requires Y, causes X
/// MakeY  requires X, causes Y
/// ```
pub struct Cycle {
    pub graph: InMemoryGraph,
    pub entity: Id,
    pub done: Id,
    pub x: Id,
    pub y: Id,
    pub finish: Id,
    pub make_x: Id,
    pub make_y: Id,
}

impl Cycle {
    pub fn goal(&self) -> Goal {
        goal_for("finish", GoalTarget::new(self.entity).property("done", true))
    }
}

pub fn cycle() -> Cycle {
    let mut graph = InMemoryGraph::new();
    let entity = Id::generate();

    let done = graph
        .add_state(State::new(Id::generate()).name("Done").entity(entity).property("done", true))
        .expect("fresh id");
    let x = graph.add_state(State::new(Id::generate()).name("X")).expect("fresh id");
    let y = graph.add_state(State::new(Id::generate()).name("Y")).expect("fresh id");

    let mut process = |name: &str, requires: Id, causes: Id| {
        let id = graph
            .add_process(Process::new(Id::generate(), name))
            .expect("fresh id");
        graph.add_requirement(id, requires).expect("state exists");
        graph.add_cause(id, causes).expect("state exists");
        id
    };

    let finish = process("Finish", x, done);
    let make_x = process("MakeX", y, x);
    let make_y = process("MakeY", x, y);

    Cycle {
        graph,
        entity,
        done,
        x,
        y,
        finish,
        make_x,
        make_y,
    }
}

// ---------------------------------------------------------------------------
// Port wrappers
// ---------------------------------------------------------------------------

/// Counts every query issued against the inner port.
pub struct CountingGraph<G> {
    pub inner: G,
    calls: AtomicUsize,
}

impl<G> CountingGraph<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<G: GraphQueryPort> GraphQueryPort for CountingGraph<G> {
    async fn find_achieving_processes(&self, target: &GoalTarget) -> Result<Vec<(Process, State)>> {
        self.tick();
        self.inner.find_achieving_processes(target).await
    }

    async fn get_process_requirements(&self, process_id: Id) -> Result<Vec<State>> {
        self.tick();
        self.inner.get_process_requirements(process_id).await
    }

    async fn get_process_causes(&self, process_id: Id) -> Result<Vec<State>> {
        self.tick();
        self.inner.get_process_causes(process_id).await
    }

    async fn find_processes_causing_state(&self, state_id: Id) -> Result<Vec<Process>> {
        self.tick();
        self.inner.find_processes_causing_state(state_id).await
    }

    async fn find_capability_for_process(&self, process_id: Id) -> Result<Option<Capability>> {
        self.tick();
        self.inner.find_capability_for_process(process_id).await
    }

    async fn find_process_by_id(&self, process_id: Id) -> Result<Option<Process>> {
        self.tick();
        self.inner.find_process_by_id(process_id).await
    }

    async fn find_capability_by_id(&self, capability_id: Id) -> Result<Option<Capability>> {
        self.tick();
        self.inner.find_capability_by_id(capability_id).await
    }
}

/// Error raised by [`FailingGraph`]; tests downcast to it to check that
/// store failures reach the caller untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUnavailable(pub &'static str);

impl std::fmt::Display for StoreUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "graph store unavailable during {}", self.0)
    }
}

impl std::error::Error for StoreUnavailable {}

/// Which query [`FailingGraph`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    AchievingProcesses,
    Requirements,
    Causes,
    CausingState,
    Capability,
    Lookup,
}

/// Delegates to the inner port except for one query kind, which errors.
pub struct FailingGraph<G> {
    pub inner: G,
    pub fail_on: FailOn,
}

impl<G> FailingGraph<G> {
    pub fn new(inner: G, fail_on: FailOn) -> Self {
        Self { inner, fail_on }
    }

    fn check(&self, kind: FailOn, op: &'static str) -> Result<()> {
        if self.fail_on == kind {
            bail!(StoreUnavailable(op));
        }
        Ok(())
    }
}

#[async_trait]
impl<G: GraphQueryPort> GraphQueryPort for FailingGraph<G> {
    async fn find_achieving_processes(&self, target: &GoalTarget) -> Result<Vec<(Process, State)>> {
        self.check(FailOn::AchievingProcesses, "find_achieving_processes")?;
        self.inner.find_achieving_processes(target).await
    }

    async fn get_process_requirements(&self, process_id: Id) -> Result<Vec<State>> {
        self.check(FailOn::Requirements, "get_process_requirements")?;
        self.inner.get_process_requirements(process_id).await
    }

    async fn get_process_causes(&self, process_id: Id) -> Result<Vec<State>> {
        self.check(FailOn::Causes, "get_process_causes")?;
        self.inner.get_process_causes(process_id).await
    }

    async fn find_processes_causing_state(&self, state_id: Id) -> Result<Vec<Process>> {
        self.check(FailOn::CausingState, "find_processes_causing_state")?;
        self.inner.find_processes_causing_state(state_id).await
    }

    async fn find_capability_for_process(&self, process_id: Id) -> Result<Option<Capability>> {
        self.check(FailOn::Capability, "find_capability_for_process")?;
        self.inner.find_capability_for_process(process_id).await
    }

    async fn find_process_by_id(&self, process_id: Id) -> Result<Option<Process>> {
        self.check(FailOn::Lookup, "find_process_by_id")?;
        self.inner.find_process_by_id(process_id).await
    }

    async fn find_capability_by_id(&self, capability_id: Id) -> Result<Option<Capability>> {
        self.check(FailOn::Lookup, "find_capability_by_id")?;
        self.inner.find_capability_by_id(capability_id).await
    }
}
