//! CLI handler for `hcg validate <graph.toml> <plan.json>`.

use anyhow::{Context, Result, bail};

use hcg_graph::models::Plan;
use hcg_planner::validate_plan;

use crate::plan_cmd::load_fixture;

/// Validate a serialized plan against a graph fixture. Fails when the plan
/// does not validate so the process exits non-zero.
pub async fn run_validate(graph_path: &str, plan_path: &str) -> Result<()> {
    let fixture = load_fixture(graph_path)?;

    let content = std::fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read plan file: {plan_path}"))?;
    let plan: Plan = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse plan file: {plan_path}"))?;

    let (valid, errors) = validate_plan(&fixture.graph, &plan).await?;

    if valid {
        println!("Plan {} is valid ({} steps).", plan.id, plan.steps.len());
        return Ok(());
    }

    println!("Plan {} is invalid:", plan.id);
    for e in &errors {
        println!("  - {e}");
    }
    bail!("plan failed validation with {} error(s)", errors.len())
}
