//! Integration tests for backward-chaining planning.
//!
//! Runs `Planner::plan` against the shared graphs in `hcg-test-utils`:
//! the pick-and-place scenario, linear chains for depth bounds, a
//! REQUIRES/CAUSES cycle, and port wrappers that count or fail queries.

use std::collections::HashSet;
use std::sync::Arc;

use hcg_graph::models::{Goal, GoalTarget, Id, Plan, PlanStatus, Process, ProvenanceSource, State};
use hcg_graph::{CachedGraph, GraphQueryPort, InMemoryGraph};
use hcg_planner::{
    GoalUnachievableError, PlanError, Planner, PlannerConfig, STEP_CONFIDENCE, SubgoalStrategy,
};
use hcg_test_utils::{
    CountingGraph, FailOn, FailingGraph, StoreUnavailable, cycle, goal_for, linear_chain,
    pick_and_place,
};

fn planner<P: GraphQueryPort>(graph: P) -> Planner<P> {
    Planner::new(graph, PlannerConfig::new())
}

fn unachievable(err: &PlanError) -> &GoalUnachievableError {
    err.as_unachievable()
        .unwrap_or_else(|| panic!("expected Unachievable, got {err:?}"))
}

// ===========================================================================
// Pick and place
// ===========================================================================

#[tokio::test]
async fn pick_and_place_orders_steps_by_causality() {
    let world = pick_and_place();
    let goal = world.goal();
    let satisfied = world.satisfied();
    let planner = planner(world.graph.clone());

    let plan = planner.plan(&goal, &satisfied, None).await.unwrap();

    assert_eq!(plan.process_sequence(), world.expected_sequence());
    assert_eq!(plan.goal_id, goal.id);
    assert_eq!(plan.status, PlanStatus::Pending);
    assert_eq!(plan.current_state_id, Some(world.block_on_table));
    assert_eq!(plan.expected_final_state_id, Some(world.block_in_bin));
    assert_eq!(plan.confidence, STEP_CONFIDENCE.powi(4));
    assert_eq!(plan.provenance.source, ProvenanceSource::PlannerService);

    for (position, step) in plan.steps.iter().enumerate() {
        assert_eq!(step.index, position);
        assert_eq!(step.capability_id, Some(world.arm));
        assert_eq!(step.confidence, STEP_CONFIDENCE);
        assert_eq!(step.provenance, plan.provenance);
    }

    let durations: Vec<Option<u64>> = plan.steps.iter().map(|s| s.estimated_duration_ms).collect();
    assert_eq!(durations, vec![Some(1200), Some(400), Some(1500), Some(300)]);

    let first = &plan.steps[0];
    assert_eq!(first.precondition_ids, vec![world.block_on_table]);
    assert_eq!(first.effect_ids, vec![world.gripper_at_block]);
}

#[tokio::test]
async fn every_precondition_is_produced_earlier_or_already_satisfied() {
    let world = pick_and_place();
    let satisfied = world.satisfied();
    let plan = planner(world.graph.clone())
        .plan(&world.goal(), &satisfied, None)
        .await
        .unwrap();

    let mut available: HashSet<Id> = satisfied.clone();
    for step in &plan.steps {
        for pre in &step.precondition_ids {
            assert!(
                available.contains(pre),
                "step {} needs {pre} before anything produces it",
                step.index
            );
        }
        available.extend(step.effect_ids.iter().copied());
    }
}

#[tokio::test]
async fn satisfied_intermediate_state_shortens_plan() {
    let world = pick_and_place();
    let satisfied = HashSet::from([world.block_grasped]);
    let plan = planner(world.graph.clone())
        .plan(&world.goal(), &satisfied, None)
        .await
        .unwrap();

    assert_eq!(plan.process_sequence(), vec![world.move_to_bin, world.release]);
    assert_eq!(plan.current_state_id, Some(world.block_grasped));
}

#[tokio::test]
async fn single_step_goal() {
    let world = pick_and_place();
    let satisfied = HashSet::from([world.block_above_bin]);
    let plan = planner(world.graph.clone())
        .plan(&world.goal(), &satisfied, None)
        .await
        .unwrap();

    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].index, 0);
    assert_eq!(plan.steps[0].process_id, world.release);
}

#[tokio::test]
async fn planning_is_deterministic_in_process_order() {
    let world = pick_and_place();
    let satisfied = world.satisfied();
    let planner = planner(world.graph.clone());

    let a = planner.plan(&world.goal(), &satisfied, None).await.unwrap();
    let b = planner.plan(&world.goal(), &satisfied, None).await.unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(a.process_sequence(), b.process_sequence());
}

// ===========================================================================
// Failures
// ===========================================================================

#[tokio::test]
async fn goal_without_achiever_is_unachievable() {
    let world = pick_and_place();
    let goal = goal_for(
        "put the block on the moon",
        GoalTarget::new(world.block).property("location", "moon"),
    );
    let err = planner(world.graph.clone())
        .plan(&goal, &world.satisfied(), None)
        .await
        .unwrap_err();

    assert!(
        matches!(
            unachievable(&err),
            GoalUnachievableError::NoAchievingProcess { goal_id, .. } if *goal_id == goal.id
        ),
        "got: {err}"
    );
}

#[tokio::test]
async fn unreachable_precondition_is_named() {
    let world = pick_and_place();
    let err = planner(world.graph.clone())
        .plan(&world.goal(), &HashSet::new(), None)
        .await
        .unwrap_err();

    let reason = unachievable(&err);
    assert!(
        matches!(reason, GoalUnachievableError::UnmetPrecondition { process_id, .. } if *process_id == world.move_to_block),
        "got: {reason}"
    );
    assert_eq!(reason.unmet_preconditions(), vec![world.block_on_table]);
    assert!(!reason.exceeded_depth());
    assert!(err.to_string().contains("BlockOnTable"), "got: {err}");
}

#[tokio::test]
async fn chain_of_exactly_max_depth_succeeds() {
    let chain = linear_chain(4);
    let plan = planner(chain.graph.clone())
        .plan(&chain.goal(), &chain.satisfied(), Some(4))
        .await
        .unwrap();
    assert_eq!(plan.process_sequence(), chain.processes);
}

#[tokio::test]
async fn chain_longer_than_max_depth_fails() {
    let chain = linear_chain(4);
    let err = planner(chain.graph.clone())
        .plan(&chain.goal(), &chain.satisfied(), Some(3))
        .await
        .unwrap_err();

    let reason = unachievable(&err);
    assert!(reason.exceeded_depth(), "got: {reason}");
    assert!(
        matches!(reason, GoalUnachievableError::MaxDepthExceeded { max_depth: 3, process_id, .. } if *process_id == chain.processes[0]),
        "got: {reason}"
    );
}

#[tokio::test]
async fn configured_default_depth_applies() {
    let chain = linear_chain(11);
    let planner = planner(chain.graph.clone());

    let err = planner
        .plan(&chain.goal(), &chain.satisfied(), None)
        .await
        .unwrap_err();
    assert!(unachievable(&err).exceeded_depth(), "got: {err}");

    let plan = planner
        .plan(&chain.goal(), &chain.satisfied(), Some(11))
        .await
        .unwrap();
    assert_eq!(plan.steps.len(), 11);
}

#[tokio::test]
async fn zero_max_depth_is_rejected() {
    let world = pick_and_place();
    let err = planner(world.graph.clone())
        .plan(&world.goal(), &world.satisfied(), Some(0))
        .await
        .unwrap_err();
    assert!(matches!(err, PlanError::InvalidMaxDepth(0)), "got: {err}");
}

#[tokio::test]
async fn cycle_terminates() {
    let world = cycle();
    let plan = planner(world.graph.clone())
        .plan(&world.goal(), &HashSet::new(), None)
        .await
        .unwrap();

    // The revisit of MakeX is skipped, so every process appears once.
    assert_eq!(
        plan.process_sequence(),
        vec![world.make_y, world.make_x, world.finish]
    );
    assert_eq!(plan.expected_final_state_id, Some(world.done));
}

#[tokio::test]
async fn cycle_respects_depth_bound() {
    let world = cycle();
    let err = planner(world.graph.clone())
        .plan(&world.goal(), &HashSet::new(), Some(3))
        .await
        .unwrap_err();
    assert!(unachievable(&err).exceeded_depth(), "got: {err}");
}

// ===========================================================================
// Candidates and subgoal strategies
// ===========================================================================

/// `Finish` causes `Done` and requires `X`. `X` is caused first by `Dead`
/// (which requires an unreachable state) and then by `Good` (which requires
/// the satisfied `Start`).
struct Fork {
    graph: InMemoryGraph,
    entity: Id,
    start: Id,
    finish: Id,
    good: Id,
}

fn fork() -> Fork {
    let mut graph = InMemoryGraph::new();
    let entity = Id::generate();
    let done = graph
        .add_state(State::new(Id::generate()).name("Done").entity(entity).property("done", true))
        .unwrap();
    let x = graph.add_state(State::new(Id::generate()).name("X")).unwrap();
    let start = graph.add_state(State::new(Id::generate()).name("Start")).unwrap();
    let nowhere = graph.add_state(State::new(Id::generate()).name("Nowhere")).unwrap();

    let finish = graph.add_process(Process::new(Id::generate(), "Finish")).unwrap();
    graph.add_requirement(finish, x).unwrap();
    graph.add_cause(finish, done).unwrap();

    let dead = graph.add_process(Process::new(Id::generate(), "Dead")).unwrap();
    graph.add_requirement(dead, nowhere).unwrap();
    graph.add_cause(dead, x).unwrap();

    let good = graph.add_process(Process::new(Id::generate(), "Good")).unwrap();
    graph.add_requirement(good, start).unwrap();
    graph.add_cause(good, x).unwrap();

    Fork {
        graph,
        entity,
        start,
        finish,
        good,
    }
}

impl Fork {
    fn goal(&self) -> Goal {
        goal_for("done", GoalTarget::new(self.entity).property("done", true))
    }
}

#[tokio::test]
async fn first_achiever_commits_to_first_subgoal_process() {
    let world = fork();
    let err = planner(world.graph.clone())
        .plan(&world.goal(), &HashSet::from([world.start]), None)
        .await
        .unwrap_err();
    assert!(
        matches!(unachievable(&err), GoalUnachievableError::UnmetPrecondition { .. }),
        "got: {err}"
    );
}

#[tokio::test]
async fn backtrack_tries_later_subgoal_processes() {
    let world = fork();
    let config = PlannerConfig::new().subgoal_strategy(SubgoalStrategy::Backtrack);
    let plan = Planner::new(world.graph.clone(), config)
        .plan(&world.goal(), &HashSet::from([world.start]), None)
        .await
        .unwrap();

    assert_eq!(plan.process_sequence(), vec![world.good, world.finish]);
    assert_eq!(plan.steps[0].index, 0);
    assert_eq!(plan.steps[1].index, 1);
}

#[tokio::test]
async fn backtrack_reports_every_failed_achiever() {
    let world = fork();
    let config = PlannerConfig::new().subgoal_strategy(SubgoalStrategy::Backtrack);
    let err = Planner::new(world.graph.clone(), config)
        .plan(&world.goal(), &HashSet::new(), None)
        .await
        .unwrap_err();

    let reason = unachievable(&err);
    assert!(
        matches!(reason, GoalUnachievableError::SubgoalExhausted { failures, .. } if failures.len() == 2),
        "got: {reason}"
    );
    assert_eq!(reason.unmet_preconditions().len(), 2);
}

#[tokio::test]
async fn later_candidate_is_tried_after_failure() {
    let mut graph = InMemoryGraph::new();
    let entity = Id::generate();
    let done = graph
        .add_state(State::new(Id::generate()).entity(entity).property("done", true))
        .unwrap();
    let nowhere = graph.add_state(State::new(Id::generate()).name("Nowhere")).unwrap();

    let blocked = graph.add_process(Process::new(Id::generate(), "Blocked")).unwrap();
    graph.add_requirement(blocked, nowhere).unwrap();
    graph.add_cause(blocked, done).unwrap();

    let direct = graph.add_process(Process::new(Id::generate(), "Direct")).unwrap();
    graph.add_cause(direct, done).unwrap();

    let goal = goal_for("done", GoalTarget::new(entity).property("done", true));
    let plan = planner(graph)
        .plan(&goal, &HashSet::new(), None)
        .await
        .unwrap();

    assert_eq!(plan.process_sequence(), vec![direct]);
    assert_eq!(plan.current_state_id, None);
}

#[tokio::test]
async fn all_candidates_failing_reports_each() {
    let mut graph = InMemoryGraph::new();
    let entity = Id::generate();
    let done = graph
        .add_state(State::new(Id::generate()).entity(entity).property("done", true))
        .unwrap();
    let a = graph.add_state(State::new(Id::generate()).name("A")).unwrap();
    let b = graph.add_state(State::new(Id::generate()).name("B")).unwrap();

    for (name, needs) in [("NeedsA", a), ("NeedsB", b)] {
        let p = graph.add_process(Process::new(Id::generate(), name)).unwrap();
        graph.add_requirement(p, needs).unwrap();
        graph.add_cause(p, done).unwrap();
    }

    let goal = goal_for("done", GoalTarget::new(entity).property("done", true));
    let err = planner(graph)
        .plan(&goal, &HashSet::new(), None)
        .await
        .unwrap_err();

    let reason = unachievable(&err);
    assert!(
        matches!(reason, GoalUnachievableError::CandidatesExhausted { failures, .. } if failures.len() == 2),
        "got: {reason}"
    );
    assert_eq!(reason.unmet_preconditions(), vec![a, b]);
}

// ===========================================================================
// Graph port behavior
// ===========================================================================

#[tokio::test]
async fn graph_errors_propagate_unchanged() {
    for (fail_on, op) in [
        (FailOn::AchievingProcesses, "find_achieving_processes"),
        (FailOn::Requirements, "get_process_requirements"),
        (FailOn::Causes, "get_process_causes"),
        (FailOn::CausingState, "find_processes_causing_state"),
        (FailOn::Capability, "find_capability_for_process"),
    ] {
        let world = pick_and_place();
        let graph = FailingGraph::new(world.graph.clone(), fail_on);
        let err = planner(graph)
            .plan(&world.goal(), &world.satisfied(), None)
            .await
            .unwrap_err();

        match err {
            PlanError::Graph(inner) => assert_eq!(
                inner.downcast_ref::<StoreUnavailable>(),
                Some(&StoreUnavailable(op)),
                "wrong error for {fail_on:?}"
            ),
            other => panic!("expected Graph error for {fail_on:?}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn cached_graph_answers_repeat_lookups() {
    let world = pick_and_place();
    let graph = CachedGraph::new(CountingGraph::new(world.graph.clone()));
    let planner = planner(graph);
    let satisfied = world.satisfied();

    let first = planner.plan(&world.goal(), &satisfied, None).await.unwrap();
    let after_first = planner.graph().inner().calls();
    assert!(planner.graph().cached_entries() > 0);

    let second = planner.plan(&world.goal(), &satisfied, None).await.unwrap();
    let after_second = planner.graph().inner().calls();

    assert_eq!(first.process_sequence(), second.process_sequence());
    // Only the uncached achiever lookup reaches the store again.
    assert_eq!(after_second - after_first, 1);
}

#[tokio::test]
async fn concurrent_plans_share_one_planner() {
    let world = pick_and_place();
    let expected = world.expected_sequence();
    let planner = Arc::new(planner(world.graph.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let planner = Arc::clone(&planner);
        let goal = world.goal();
        let satisfied = world.satisfied();
        handles.push(tokio::spawn(async move {
            planner.plan(&goal, &satisfied, None).await
        }));
    }

    for handle in handles {
        let plan = handle.await.unwrap().unwrap();
        assert_eq!(plan.process_sequence(), expected);
    }
}

#[tokio::test]
async fn plan_serializes_to_expected_shape() {
    let world = pick_and_place();
    let plan = planner(world.graph.clone())
        .plan(&world.goal(), &world.satisfied(), None)
        .await
        .unwrap();

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["status"], "pending");
    assert_eq!(json["provenance"]["source"], "planner-service");
    assert_eq!(json["steps"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["steps"][3]["index"], 3);
    assert_eq!(
        json["expected_final_state_id"],
        world.block_in_bin.to_string()
    );

    let back: Plan = serde_json::from_value(json).unwrap();
    assert_eq!(back, plan);
}
