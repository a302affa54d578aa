//! Configuration file management for hcg.
//!
//! Provides a TOML-based config file at `~/.config/hcg/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use hcg_graph::models::ProvenanceSource;
use hcg_planner::{PlannerConfig, SubgoalStrategy};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub planner: PlannerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlannerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ProvenanceSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgoal_strategy: Option<SubgoalStrategy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the hcg config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/hcg` or `~/.config/hcg`.
/// The platform-specific `dirs::config_dir()` is ignored so macOS users
/// find the file in the same place.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("hcg");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("hcg")
}

/// Return the path to the hcg config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file if one exists. A file that exists but cannot be
/// parsed is still an error.
fn load_config_if_present() -> Result<Option<ConfigFile>> {
    if !config_path().exists() {
        return Ok(None);
    }
    load_config().map(Some)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct HcgConfig {
    pub planner: PlannerConfig,
}

impl HcgConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - Max depth: `cli_max_depth` > `HCG_MAX_DEPTH` > `planner.max_depth` > 10
    /// - Source: `HCG_PROVENANCE_SOURCE` > `planner.source` > `planner-service`
    /// - Strategy: `HCG_SUBGOAL_STRATEGY` > `planner.subgoal_strategy` > `first_achiever`
    /// - Tags: `planner.tags`
    pub fn resolve(cli_max_depth: Option<u32>) -> Result<Self> {
        let file = load_config_if_present()?.unwrap_or_default().planner;

        let mut base = PlannerConfig::new().tags(file.tags);
        if let Some(depth) = file.max_depth {
            base.max_depth = depth;
        }
        if let Some(source) = file.source {
            base.source = source;
        }
        if let Some(strategy) = file.subgoal_strategy {
            base.subgoal_strategy = strategy;
        }

        let mut planner = base.apply_env()?;
        if let Some(depth) = cli_max_depth {
            planner.max_depth = depth;
        }
        if planner.max_depth == 0 {
            bail!("max_depth must be at least 1");
        }

        tracing::debug!(
            max_depth = planner.max_depth,
            source = %planner.source,
            strategy = %planner.subgoal_strategy,
            "resolved planner config"
        );

        Ok(Self { planner })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
