//! The recursive backward chain.

use std::collections::HashSet;

use futures::future::BoxFuture;
use tracing::{debug, trace};

use hcg_graph::GraphQueryPort;
use hcg_graph::models::{Id, PlanStep, Process, Provenance, State};

use super::{Planner, STEP_CONFIDENCE};
use crate::config::SubgoalStrategy;
use crate::error::{GoalUnachievableError, PlanError};

/// Per-candidate search state, threaded through the recursion.
pub(super) struct Search<'s> {
    satisfied: &'s HashSet<Id>,
    max_depth: u32,
    provenance: Provenance,
    visited: HashSet<Id>,
    steps: Vec<PlanStep>,
}

impl<'s> Search<'s> {
    pub(super) fn new(satisfied: &'s HashSet<Id>, max_depth: u32, provenance: Provenance) -> Self {
        Self {
            satisfied,
            max_depth,
            provenance,
            visited: HashSet::new(),
            steps: Vec::new(),
        }
    }

    pub(super) fn into_steps(self) -> Vec<PlanStep> {
        self.steps
    }
}

impl<P: GraphQueryPort> Planner<P> {
    /// Chain backward from `process`, appending it and everything it needs
    /// to `search.steps` in execution order.
    ///
    /// Boxed so the recursion has a finite future size.
    pub(super) fn backward_chain<'a, 's: 'a>(
        &'a self,
        process: Process,
        depth: u32,
        search: &'a mut Search<'s>,
    ) -> BoxFuture<'a, Result<(), PlanError>> {
        Box::pin(self.expand(process, depth, search))
    }

    async fn expand(
        &self,
        process: Process,
        depth: u32,
        search: &mut Search<'_>,
    ) -> Result<(), PlanError> {
        if depth > search.max_depth {
            return Err(GoalUnachievableError::MaxDepthExceeded {
                max_depth: search.max_depth,
                process_id: process.id,
                process: process.name,
            }
            .into());
        }

        if !search.visited.insert(process.id) {
            trace!(process = %process.name, "already on the chain, skipping");
            return Ok(());
        }

        let requirements = self.graph.get_process_requirements(process.id).await?;
        let mut precondition_ids = Vec::with_capacity(requirements.len());

        for precondition in requirements {
            precondition_ids.push(precondition.id);
            if search.satisfied.contains(&precondition.id) {
                continue;
            }

            let achievers = self
                .graph
                .find_processes_causing_state(precondition.id)
                .await?;

            debug!(
                process = %process.name,
                precondition = %precondition.label(),
                achievers = achievers.len(),
                depth,
                "resolving precondition"
            );

            match self.strategy() {
                SubgoalStrategy::FirstAchiever => {
                    let Some(first) = achievers.into_iter().next() else {
                        return Err(unmet(&precondition, &process).into());
                    };
                    self.backward_chain(first, depth + 1, search).await?;
                }
                SubgoalStrategy::Backtrack => {
                    if achievers.is_empty() {
                        return Err(unmet(&precondition, &process).into());
                    }
                    self.chain_any(achievers, &precondition, depth + 1, search)
                        .await?;
                }
            }
        }

        let effect_ids = self
            .graph
            .get_process_causes(process.id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let capability = self.graph.find_capability_for_process(process.id).await?;

        search.steps.push(PlanStep {
            id: Id::generate(),
            // Assigned once the whole chain is known.
            index: 0,
            process_id: process.id,
            precondition_ids,
            effect_ids,
            capability_id: capability.map(|c| c.id),
            estimated_duration_ms: process.estimated_duration_ms,
            confidence: STEP_CONFIDENCE,
            provenance: search.provenance.clone(),
        });

        Ok(())
    }

    /// Try each achiever of `precondition` until one chains successfully,
    /// rolling `search` back after every failed attempt.
    async fn chain_any(
        &self,
        achievers: Vec<Process>,
        precondition: &State,
        depth: u32,
        search: &mut Search<'_>,
    ) -> Result<(), PlanError> {
        let mut failures = Vec::new();

        for achiever in achievers {
            let step_mark = search.steps.len();
            let visited_mark = search.visited.clone();
            let name = achiever.name.clone();

            match self.backward_chain(achiever, depth, search).await {
                Ok(()) => return Ok(()),
                Err(PlanError::Unachievable(reason)) => {
                    debug!(
                        precondition = %precondition.label(),
                        achiever = %name,
                        reason = %reason,
                        "achiever failed, backtracking"
                    );
                    search.steps.truncate(step_mark);
                    search.visited = visited_mark;
                    failures.push(reason);
                }
                Err(other) => return Err(other),
            }
        }

        if failures.len() == 1 {
            return Err(failures.remove(0).into());
        }
        Err(GoalUnachievableError::SubgoalExhausted {
            state_id: precondition.id,
            state: precondition.label(),
            failures,
        }
        .into())
    }
}

fn unmet(precondition: &State, process: &Process) -> GoalUnachievableError {
    GoalUnachievableError::UnmetPrecondition {
        state_id: precondition.id,
        state: precondition.label(),
        process_id: process.id,
    }
}
