//! Backward-chaining planner over a hybrid causal graph.
//!
//! ```ignore
//! let planner = Planner::new(graph, PlannerConfig::from_env()?);
//! let plan = planner.plan(&goal, &satisfied_states, None).await?;
//! let (valid, errors) = planner.validate_plan(&plan).await?;
//! ```

pub mod config;
pub mod error;
pub mod planner;
pub mod validate;

pub use config::{ConfigError, PlannerConfig, SubgoalStrategy};
pub use error::{GoalUnachievableError, PlanError};
pub use planner::{Planner, STEP_CONFIDENCE};
pub use validate::validate_plan;
