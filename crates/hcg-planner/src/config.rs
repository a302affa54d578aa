use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hcg_graph::models::{ProvenanceSource, ProvenanceSourceParseError};

/// How the planner resolves an unsatisfied precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubgoalStrategy {
    /// Recurse into the first process that causes the precondition and
    /// never reconsider. A failure deep in that sub-chain fails the whole
    /// candidate even when another achiever would have worked.
    #[default]
    FirstAchiever,
    /// Try each process that causes the precondition in turn, rolling back
    /// partial work between attempts.
    Backtrack,
}

impl fmt::Display for SubgoalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FirstAchiever => "first_achiever",
            Self::Backtrack => "backtrack",
        };
        f.write_str(s)
    }
}

impl FromStr for SubgoalStrategy {
    type Err = SubgoalStrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_achiever" => Ok(Self::FirstAchiever),
            "backtrack" => Ok(Self::Backtrack),
            other => Err(SubgoalStrategyParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`SubgoalStrategy`] string.
#[derive(Debug, Clone)]
pub struct SubgoalStrategyParseError(pub String);

impl fmt::Display for SubgoalStrategyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid subgoal strategy: {:?}", self.0)
    }
}

impl std::error::Error for SubgoalStrategyParseError {}

/// Errors reading [`PlannerConfig`] from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidMaxDepth { var: &'static str, value: String },

    #[error("{var}: {source}")]
    InvalidSource {
        var: &'static str,
        source: ProvenanceSourceParseError,
    },

    #[error("{var}: {source}")]
    InvalidStrategy {
        var: &'static str,
        source: SubgoalStrategyParseError,
    },
}

/// Planner configuration.
///
/// Reads `HCG_MAX_DEPTH`, `HCG_PROVENANCE_SOURCE`, and
/// `HCG_SUBGOAL_STRATEGY` from the environment, falling back to the
/// defaults below when unset.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Longest process chain a plan may contain, counted in processes and
    /// not in REQUIRES hops. The process achieving the goal sits at depth 1,
    /// so `max_depth = N` allows N processes linked by N - 1 hops.
    pub max_depth: u32,
    /// Source stamped on every plan and step.
    pub source: ProvenanceSource,
    pub subgoal_strategy: SubgoalStrategy,
    /// Tags stamped on every plan and step.
    pub tags: Vec<String>,
}

impl PlannerConfig {
    pub const DEFAULT_MAX_DEPTH: u32 = 10;

    pub const MAX_DEPTH_VAR: &'static str = "HCG_MAX_DEPTH";
    pub const SOURCE_VAR: &'static str = "HCG_PROVENANCE_SOURCE";
    pub const STRATEGY_VAR: &'static str = "HCG_SUBGOAL_STRATEGY";

    /// Default configuration, ignoring the environment.
    pub fn new() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            source: ProvenanceSource::PlannerService,
            subgoal_strategy: SubgoalStrategy::FirstAchiever,
            tags: Vec::new(),
        }
    }

    /// Build a config from the environment.
    ///
    /// Unset variables keep their defaults; set but malformed variables are
    /// an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new().apply_env()
    }

    /// Override fields with whichever `HCG_*` variables are set. Callers
    /// with their own lower-priority layer (a config file) build it first
    /// and apply the environment on top.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        let mut config = self;

        if let Ok(value) = env::var(Self::MAX_DEPTH_VAR) {
            config.max_depth = parse_max_depth(&value).ok_or(ConfigError::InvalidMaxDepth {
                var: Self::MAX_DEPTH_VAR,
                value,
            })?;
        }

        if let Ok(value) = env::var(Self::SOURCE_VAR) {
            config.source = value.parse().map_err(|source| ConfigError::InvalidSource {
                var: Self::SOURCE_VAR,
                source,
            })?;
        }

        if let Ok(value) = env::var(Self::STRATEGY_VAR) {
            config.subgoal_strategy =
                value.parse().map_err(|source| ConfigError::InvalidStrategy {
                    var: Self::STRATEGY_VAR,
                    source,
                })?;
        }

        Ok(config)
    }

    pub fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn source(mut self, source: ProvenanceSource) -> Self {
        self.source = source;
        self
    }

    pub fn subgoal_strategy(mut self, strategy: SubgoalStrategy) -> Self {
        self.subgoal_strategy = strategy;
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a depth bound; zero and non-numeric input are rejected.
fn parse_max_depth(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|d| *d >= 1)
}
