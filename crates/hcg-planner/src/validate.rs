//! Post-hoc plan validation.
//!
//! Confirms that every process and capability a plan references still
//! exists in the graph, and that the plan's own bookkeeping is consistent
//! (contiguous indices, confidences in range, aggregate confidence equal to
//! the product of step confidences). It does not re-run the search or
//! re-check causal correctness.

use anyhow::Result;

use hcg_graph::GraphQueryPort;
use hcg_graph::models::Plan;

use crate::planner::Planner;

/// Allowed drift between the stored aggregate confidence and the recomputed
/// product.
const CONFIDENCE_EPSILON: f64 = 1e-9;

/// Validate `plan` against `graph`.
///
/// Returns `(errors.is_empty(), errors)`. Problems with the plan are
/// reported as messages; only a failing graph query is an `Err`.
pub async fn validate_plan<P>(graph: &P, plan: &Plan) -> Result<(bool, Vec<String>)>
where
    P: GraphQueryPort + ?Sized,
{
    let mut errors = Vec::new();

    for (position, step) in plan.steps.iter().enumerate() {
        if step.index != position {
            errors.push(format!(
                "step {} has index {} but sits at position {position}",
                step.id, step.index
            ));
        }

        if !(0.0..=1.0).contains(&step.confidence) {
            errors.push(format!(
                "step {} has confidence {} outside [0, 1]",
                step.index, step.confidence
            ));
        }

        if graph.find_process_by_id(step.process_id).await?.is_none() {
            errors.push(format!(
                "step {}: process {} not found",
                step.index, step.process_id
            ));
        }

        if let Some(capability_id) = step.capability_id {
            if graph.find_capability_by_id(capability_id).await?.is_none() {
                errors.push(format!(
                    "step {}: capability {capability_id} not found",
                    step.index
                ));
            }
        }
    }

    let product: f64 = plan.steps.iter().map(|s| s.confidence).product();
    if !plan.confidence.is_finite() {
        errors.push(format!("plan confidence {} is not a finite number", plan.confidence));
    } else if (product - plan.confidence).abs() > CONFIDENCE_EPSILON {
        errors.push(format!(
            "plan confidence {} does not match product of step confidences {product}",
            plan.confidence
        ));
    }

    if !errors.is_empty() {
        tracing::warn!(plan_id = %plan.id, errors = errors.len(), "plan failed validation");
    }

    Ok((errors.is_empty(), errors))
}

impl<P: GraphQueryPort> Planner<P> {
    /// Validate `plan` against this planner's graph. See [`validate_plan`].
    pub async fn validate_plan(&self, plan: &Plan) -> Result<(bool, Vec<String>)> {
        validate_plan(self.graph(), plan).await
    }
}
