//! CLI handlers for `hcg check` and `hcg plan`.
//!
//! Implements:
//! - `hcg check <graph.toml>` -- parse and validate a graph fixture
//! - `hcg plan <graph.toml> --entity <name> ...` -- plan a goal and print it as JSON

use std::collections::HashSet;
use std::io::Write;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use hcg_graph::fixture::{GraphFixture, parse_graph_toml};
use hcg_graph::models::{Goal, GoalTarget, Id, Provenance, ProvenanceSource};
use hcg_planner::{Planner, PlannerConfig};

/// Options for `hcg plan` beyond the graph path.
#[derive(Debug, Default)]
pub struct PlanOptions {
    pub entity: String,
    pub concept: Option<String>,
    /// `key=value` pairs; the value is parsed as JSON, falling back to a string.
    pub properties: Vec<String>,
    /// State names that already hold.
    pub satisfied: Vec<String>,
    pub output: Option<String>,
}

// -----------------------------------------------------------------------
// Shared helpers
// -----------------------------------------------------------------------

/// Read and build a graph fixture from disk.
pub fn load_fixture(file_path: &str) -> Result<GraphFixture> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("failed to read graph file: {file_path}"))?;
    parse_graph_toml(&content).with_context(|| format!("failed to parse graph file: {file_path}"))
}

/// Split a `key=value` argument. Values that parse as JSON keep their type
/// (`count=3`, `open=true`); anything else is taken as a string.
pub fn parse_property(arg: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = arg.split_once('=') else {
        bail!("invalid property {arg:?}: expected key=value");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid property {arg:?}: empty key");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    Ok((key.to_owned(), value))
}

/// Build a goal from entity, concept, and property names in `fixture`.
pub fn build_goal(fixture: &GraphFixture, options: &PlanOptions) -> Result<Goal> {
    let entity = fixture
        .entity_id(&options.entity)
        .with_context(|| format!("unknown entity: {}", options.entity))?;
    let mut target = GoalTarget::new(entity);

    if let Some(concept) = &options.concept {
        let concept_id = fixture
            .concept_id(concept)
            .with_context(|| format!("unknown concept: {concept}"))?;
        target = target.concept(concept_id);
    }

    for arg in &options.properties {
        let (key, value) = parse_property(arg)?;
        target = target.property(key, value);
    }

    let mut description = format!("reach {}", options.entity);
    if !options.properties.is_empty() {
        description.push_str(" with ");
        description.push_str(&options.properties.join(", "));
    }

    Ok(Goal::new(
        description,
        target,
        Provenance::new(ProvenanceSource::Human),
    ))
}

/// Resolve state names to ids.
pub fn resolve_states(fixture: &GraphFixture, names: &[String]) -> Result<HashSet<Id>> {
    names
        .iter()
        .map(|name| {
            fixture
                .state_id(name)
                .with_context(|| format!("unknown state: {name}"))
        })
        .collect()
}

// -----------------------------------------------------------------------
// hcg check <graph.toml>
// -----------------------------------------------------------------------

pub fn run_check(file_path: &str) -> Result<()> {
    let fixture = load_fixture(file_path)?;
    let graph = &fixture.graph;

    println!("Graph file is valid.");
    println!();
    println!("  States:       {}", graph.states().len());
    println!("  Processes:    {}", graph.processes().len());
    println!("  Capabilities: {}", graph.capabilities().len());

    Ok(())
}

// -----------------------------------------------------------------------
// hcg plan <graph.toml>
// -----------------------------------------------------------------------

/// Plan the goal described by `options` and write the plan as JSON to
/// `options.output` or stdout.
pub async fn run_plan(file_path: &str, options: &PlanOptions, config: PlannerConfig) -> Result<()> {
    let fixture = load_fixture(file_path)?;
    let goal = build_goal(&fixture, options)?;
    let satisfied = resolve_states(&fixture, &options.satisfied)?;

    let planner = Planner::new(fixture.graph, config);
    let plan = planner
        .plan(&goal, &satisfied, None)
        .await
        .with_context(|| format!("no plan for goal {:?}", goal.description))?;

    let json = serde_json::to_string_pretty(&plan).context("failed to serialize plan")?;

    match &options.output {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("cannot create output file: {path}"))?;
            writeln!(file, "{json}")?;
            println!("Plan {} ({} steps) written to {path}", plan.id, plan.steps.len());
        }
        None => println!("{json}"),
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
