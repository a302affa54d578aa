//! Planning failures.

use thiserror::Error;

use hcg_graph::models::Id;

/// The goal cannot be reached from the given satisfied states.
///
/// Callers can recover by relaxing the goal, raising the depth bound, or
/// planning from a different set of satisfied states;
/// [`GoalUnachievableError::exceeded_depth`] tells the last two apart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GoalUnachievableError {
    #[error("no process achieves goal {goal_id} ({description:?})")]
    NoAchievingProcess { goal_id: Id, description: String },

    #[error("precondition {state:?} ({state_id}) of process {process_id} has no achieving process")]
    UnmetPrecondition {
        state_id: Id,
        state: String,
        process_id: Id,
    },

    #[error("max depth {max_depth} exceeded at process {process:?} ({process_id})")]
    MaxDepthExceeded {
        max_depth: u32,
        process_id: Id,
        process: String,
    },

    #[error("every process achieving precondition {state:?} ({state_id}) failed: {}", join(.failures))]
    SubgoalExhausted {
        state_id: Id,
        state: String,
        failures: Vec<GoalUnachievableError>,
    },

    #[error("all {} candidate processes for goal {goal_id} failed: {}", .failures.len(), join(.failures))]
    CandidatesExhausted {
        goal_id: Id,
        failures: Vec<GoalUnachievableError>,
    },
}

impl GoalUnachievableError {
    /// Whether the depth bound cut off any part of the search.
    ///
    /// `true` suggests retrying with a larger `max_depth`; `false` means no
    /// amount of extra depth would have helped the branches that were tried.
    pub fn exceeded_depth(&self) -> bool {
        match self {
            Self::MaxDepthExceeded { .. } => true,
            Self::SubgoalExhausted { failures, .. } | Self::CandidatesExhausted { failures, .. } => {
                failures.iter().any(Self::exceeded_depth)
            }
            Self::NoAchievingProcess { .. } | Self::UnmetPrecondition { .. } => false,
        }
    }

    /// Every precondition state that had no achieving process anywhere in
    /// the failed search.
    pub fn unmet_preconditions(&self) -> Vec<Id> {
        match self {
            Self::UnmetPrecondition { state_id, .. } => vec![*state_id],
            Self::SubgoalExhausted { failures, .. } | Self::CandidatesExhausted { failures, .. } => {
                failures.iter().flat_map(Self::unmet_preconditions).collect()
            }
            Self::NoAchievingProcess { .. } | Self::MaxDepthExceeded { .. } => Vec::new(),
        }
    }
}

fn join(failures: &[GoalUnachievableError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by [`crate::Planner::plan`].
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Unachievable(#[from] GoalUnachievableError),

    #[error("max_depth must be at least 1, got {0}")]
    InvalidMaxDepth(u32),

    /// A graph query failed. The store's error is carried unchanged.
    #[error(transparent)]
    Graph(#[from] anyhow::Error),
}

impl PlanError {
    pub fn as_unachievable(&self) -> Option<&GoalUnachievableError> {
        match self {
            Self::Unachievable(e) => Some(e),
            _ => None,
        }
    }
}
