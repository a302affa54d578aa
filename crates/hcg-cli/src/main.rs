mod config;
mod plan_cmd;
mod validate_cmd;

use anyhow::bail;
use clap::{Parser, Subcommand};

use hcg_graph::models::ProvenanceSource;
use hcg_planner::{PlannerConfig, SubgoalStrategy};

use config::HcgConfig;
use plan_cmd::PlanOptions;

#[derive(Parser)]
#[command(name = "hcg", about = "Backward-chaining planner over a hybrid causal graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write an hcg config file
    Init {
        /// Default depth bound for planning
        #[arg(long)]
        max_depth: Option<u32>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Parse and validate a graph fixture
    Check {
        /// Path to the graph TOML file
        file: String,
    },
    /// Plan a goal against a graph fixture and print the plan as JSON
    Plan {
        /// Path to the graph TOML file
        file: String,
        /// Entity the goal is about
        #[arg(long)]
        entity: String,
        /// Concept the target state must belong to
        #[arg(long)]
        concept: Option<String>,
        /// Required state property as key=value (repeatable)
        #[arg(long = "property")]
        properties: Vec<String>,
        /// Name of a state that already holds (repeatable)
        #[arg(long)]
        satisfied: Vec<String>,
        /// Depth bound (overrides HCG_MAX_DEPTH and the config file)
        #[arg(long)]
        max_depth: Option<u32>,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Check a serialized plan against a graph fixture
    Validate {
        /// Path to the graph TOML file
        graph: String,
        /// Path to the plan JSON file
        plan: String,
    },
}

/// Execute the `hcg init` command: write config file.
fn cmd_init(max_depth: Option<u32>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let max_depth = max_depth.unwrap_or(PlannerConfig::DEFAULT_MAX_DEPTH);
    if max_depth == 0 {
        bail!("--max-depth must be at least 1");
    }

    let cfg = config::ConfigFile {
        planner: config::PlannerSection {
            max_depth: Some(max_depth),
            source: Some(ProvenanceSource::PlannerService),
            subgoal_strategy: Some(SubgoalStrategy::FirstAchiever),
            tags: Vec::new(),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  planner.max_depth = {max_depth}");
    println!("  planner.source = {}", ProvenanceSource::PlannerService);
    println!("  planner.subgoal_strategy = {}", SubgoalStrategy::FirstAchiever);

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { max_depth, force } => {
            cmd_init(max_depth, force)?;
        }
        Commands::Check { file } => {
            plan_cmd::run_check(&file)?;
        }
        Commands::Plan {
            file,
            entity,
            concept,
            properties,
            satisfied,
            max_depth,
            output,
        } => {
            let resolved = HcgConfig::resolve(max_depth)?;
            let options = PlanOptions {
                entity,
                concept,
                properties,
                satisfied,
                output,
            };
            plan_cmd::run_plan(&file, &options, resolved.planner).await?;
        }
        Commands::Validate { graph, plan } => {
            validate_cmd::run_validate(&graph, &plan).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that read or write process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
