//! Backward-chaining planner.
//!
//! Starting from the processes that cause a goal's target state, the planner
//! recursively satisfies each process's preconditions by finding processes
//! that cause them, until every precondition traces back to a state that is
//! already true. Steps are appended in post-order, so prerequisites always
//! precede the process that needs them.
//!
//! ```text
//! plan(goal)
//!   |
//!   find_achieving_processes(goal.target) --> [candidate, ...]
//!   |
//!   for each candidate (first success wins):
//!       backward_chain(candidate, depth = 1)
//!         |-- depth > max_depth          --> MaxDepthExceeded
//!         |-- already visited            --> done (cycle break)
//!         |-- for each precondition not yet satisfied:
//!         |       find_processes_causing_state --> backward_chain(first, depth + 1)
//!         `-- append step
//! ```
//!
//! # Limitation
//!
//! With the default [`SubgoalStrategy::FirstAchiever`], only the top-level
//! candidate list has fallback. Below it the planner commits to the first
//! process returned for each precondition, so a goal that is solvable via a
//! later achiever can be reported unachievable.
//! [`SubgoalStrategy::Backtrack`] lifts that restriction.

mod chain;

use std::collections::HashSet;

use tracing::{debug, info, warn};

use hcg_graph::GraphQueryPort;
use hcg_graph::models::{Goal, Id, Plan, PlanStatus, PlanStep, Provenance};

use crate::config::{PlannerConfig, SubgoalStrategy};
use crate::error::{GoalUnachievableError, PlanError};

use chain::Search;

/// Confidence assigned to every step until capability success rates are
/// tracked by the graph.
pub const STEP_CONFIDENCE: f64 = 1.0;

/// Backward-chaining planner over a [`GraphQueryPort`].
///
/// Holds no per-call state: every `plan()` invocation keeps its own visited
/// set and step list, so one `Planner` can serve concurrent calls as long as
/// the port tolerates concurrent readers.
#[derive(Debug)]
pub struct Planner<P> {
    graph: P,
    config: PlannerConfig,
}

impl<P: GraphQueryPort> Planner<P> {
    pub fn new(graph: P, config: PlannerConfig) -> Self {
        Self { graph, config }
    }

    pub fn graph(&self) -> &P {
        &self.graph
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Compute a plan that makes `goal.target` true, starting from
    /// `satisfied_states`.
    ///
    /// `max_depth` overrides the configured depth bound when set.
    ///
    /// Returns [`PlanError::Unachievable`] when no chain of processes reaches
    /// the goal within the depth bound, and [`PlanError::Graph`] carrying the
    /// store's own error when a query fails.
    pub async fn plan(
        &self,
        goal: &Goal,
        satisfied_states: &HashSet<Id>,
        max_depth: Option<u32>,
    ) -> Result<Plan, PlanError> {
        let max_depth = max_depth.unwrap_or(self.config.max_depth);
        if max_depth == 0 {
            return Err(PlanError::InvalidMaxDepth(max_depth));
        }

        if !goal.target.is_constrained() {
            warn!(
                goal_id = %goal.id,
                "goal target has neither a concept nor state properties; matching on entity alone"
            );
        }

        let candidates = self.graph.find_achieving_processes(&goal.target).await?;
        if candidates.is_empty() {
            return Err(GoalUnachievableError::NoAchievingProcess {
                goal_id: goal.id,
                description: goal.description.clone(),
            }
            .into());
        }

        debug!(
            goal_id = %goal.id,
            candidates = candidates.len(),
            max_depth,
            strategy = %self.config.subgoal_strategy,
            "planning goal"
        );

        let provenance = self.stamp(goal);
        let mut failures = Vec::new();

        for (process, target_state) in candidates {
            debug!(
                goal_id = %goal.id,
                process = %process.name,
                target_state = %target_state.label(),
                "trying candidate"
            );

            let mut search = Search::new(satisfied_states, max_depth, provenance.clone());
            let process_name = process.name.clone();

            match self.backward_chain(process, 1, &mut search).await {
                Ok(()) => {
                    let plan = assemble(goal, satisfied_states, search.into_steps(), provenance);
                    info!(
                        goal_id = %goal.id,
                        plan_id = %plan.id,
                        steps = plan.steps.len(),
                        confidence = plan.confidence,
                        "plan found"
                    );
                    return Ok(plan);
                }
                Err(PlanError::Unachievable(reason)) => {
                    warn!(
                        goal_id = %goal.id,
                        process = %process_name,
                        reason = %reason,
                        "candidate failed, trying next"
                    );
                    failures.push(reason);
                }
                Err(other) => return Err(other),
            }
        }

        Err(collapse(goal.id, failures).into())
    }

    fn stamp(&self, goal: &Goal) -> Provenance {
        let provenance = Provenance::new(self.config.source).tags(self.config.tags.clone());
        match goal.provenance.trace_id {
            Some(trace_id) => provenance.trace(trace_id),
            None => provenance,
        }
    }

    pub(crate) fn strategy(&self) -> SubgoalStrategy {
        self.config.subgoal_strategy
    }
}

/// Wrap candidate failures; a lone failure is reported as-is.
fn collapse(goal_id: Id, mut failures: Vec<GoalUnachievableError>) -> GoalUnachievableError {
    if failures.len() == 1 {
        return failures.remove(0);
    }
    GoalUnachievableError::CandidatesExhausted { goal_id, failures }
}

/// Index the steps and wrap them into a [`Plan`].
fn assemble(
    goal: &Goal,
    satisfied_states: &HashSet<Id>,
    mut steps: Vec<PlanStep>,
    provenance: Provenance,
) -> Plan {
    for (index, step) in steps.iter_mut().enumerate() {
        step.index = index;
    }

    let confidence = steps.iter().map(|s| s.confidence).product();
    let expected_final_state_id = steps.last().and_then(|s| s.effect_ids.first().copied());

    Plan {
        id: Id::generate(),
        goal_id: goal.id,
        steps,
        // Smallest id keeps the choice stable across runs.
        current_state_id: satisfied_states.iter().min().copied(),
        expected_final_state_id,
        status: PlanStatus::Pending,
        confidence,
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcg_graph::InMemoryGraph;
    use hcg_graph::models::{GoalTarget, Process, ProvenanceSource, State};

    fn step(effects: Vec<Id>, confidence: f64) -> PlanStep {
        PlanStep {
            id: Id::generate(),
            index: usize::MAX,
            process_id: Id::generate(),
            precondition_ids: vec![],
            effect_ids: effects,
            capability_id: None,
            estimated_duration_ms: None,
            confidence,
            provenance: Provenance::new(ProvenanceSource::PlannerService),
        }
    }

    fn goal() -> Goal {
        Goal::new(
            "test",
            GoalTarget::new(Id::generate()).property("k", 1),
            Provenance::new(ProvenanceSource::Human),
        )
    }

    #[test]
    fn assemble_indexes_steps_and_multiplies_confidence() {
        let last_effect = Id::generate();
        let steps = vec![
            step(vec![Id::generate()], 0.5),
            step(vec![Id::generate()], 0.8),
            step(vec![last_effect, Id::generate()], 1.0),
        ];
        let plan = assemble(
            &goal(),
            &HashSet::new(),
            steps,
            Provenance::new(ProvenanceSource::PlannerService),
        );

        let indices: Vec<usize> = plan.steps.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!((plan.confidence - 0.4).abs() < 1e-12);
        assert_eq!(plan.expected_final_state_id, Some(last_effect));
        assert_eq!(plan.current_state_id, None);
        assert_eq!(plan.status, PlanStatus::Pending);
    }

    #[test]
    fn assemble_picks_smallest_satisfied_state() {
        let a = Id::generate();
        let b = Id::generate();
        let plan = assemble(
            &goal(),
            &HashSet::from([a, b]),
            vec![step(vec![], 1.0)],
            Provenance::new(ProvenanceSource::PlannerService),
        );
        assert_eq!(plan.current_state_id, Some(a.min(b)));
        assert_eq!(plan.expected_final_state_id, None);
    }

    #[test]
    fn collapse_unwraps_single_failure() {
        let goal_id = Id::generate();
        let only = GoalUnachievableError::NoAchievingProcess {
            goal_id,
            description: "x".into(),
        };
        assert_eq!(collapse(goal_id, vec![only.clone()]), only);

        let many = collapse(goal_id, vec![only.clone(), only]);
        assert!(matches!(many, GoalUnachievableError::CandidatesExhausted { ref failures, .. } if failures.len() == 2));
    }

    #[tokio::test]
    async fn zero_depth_is_rejected() {
        let planner = Planner::new(InMemoryGraph::new(), PlannerConfig::new());
        let err = planner
            .plan(&goal(), &HashSet::new(), Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidMaxDepth(0)), "got: {err}");
    }

    #[tokio::test]
    async fn plan_inherits_goal_trace_id() {
        let entity = Id::generate();
        let mut graph = InMemoryGraph::new();
        let done = graph
            .add_state(State::new(Id::generate()).entity(entity).property("done", true))
            .unwrap();
        let p = graph.add_process(Process::new(Id::generate(), "finish")).unwrap();
        graph.add_cause(p, done).unwrap();

        let trace = Id::generate();
        let goal = Goal::new(
            "finish",
            GoalTarget::new(entity).property("done", true),
            Provenance::new(ProvenanceSource::Human).trace(trace),
        );
        let config = PlannerConfig::new().tags(vec!["unit".into()]);
        let plan = Planner::new(graph, config)
            .plan(&goal, &HashSet::new(), None)
            .await
            .unwrap();

        assert_eq!(plan.provenance.trace_id, Some(trace));
        assert_eq!(plan.provenance.source, ProvenanceSource::PlannerService);
        assert_eq!(plan.provenance.tags, vec!["unit"]);
        assert_eq!(plan.steps[0].provenance, plan.provenance);
    }
}
