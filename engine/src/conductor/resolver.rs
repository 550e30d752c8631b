//! Placeholder resolution
//!
//! Replaces `$stepN[.field…]` parameters with values from earlier step
//! results. Pure: no I/O and no mutation of the inputs.

use crate::conductor::error::RouteError;
use crate::conductor::types::{ParamValue, Parameters, ResolvedParams, StepRef, StepResult};
use serde_json::Value;

/// Resolve every parameter of a step against the results so far.
///
/// `prior` holds results of steps that already ran; a reference to any
/// other index (including the current step) is an error.
pub fn resolve(parameters: &Parameters, prior: &[StepResult]) -> Result<ResolvedParams, RouteError> {
    parameters
        .iter()
        .map(|(name, value)| {
            let resolved = match value {
                ParamValue::Literal(v) => v.clone(),
                ParamValue::Ref(step_ref) => lookup(step_ref, prior)
                    .map_err(|reason| RouteError::Resolution(format!("{} ({})", reason, name)))?,
            };
            Ok((name.clone(), resolved))
        })
        .collect()
}

/// Look up a single reference
pub fn lookup(step_ref: &StepRef, prior: &[StepResult]) -> Result<Value, String> {
    let result = prior
        .iter()
        .find(|r| r.index == step_ref.index)
        .ok_or_else(|| format!("{} refers to a step that has not run", step_ref))?;

    if !result.succeeded() {
        return Err(format!(
            "{} refers to step {}, which failed",
            step_ref, step_ref.index
        ));
    }

    let mut current = result.value.clone();
    for field in &step_ref.path {
        if let Value::String(text) = &current {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                current = parsed;
            }
        }
        current = match current {
            Value::Object(mut map) => map
                .remove(field)
                .ok_or_else(|| format!("{} has no field '{}'", step_ref, field))?,
            _ => {
                return Err(format!(
                    "{}: cannot read '{}' from a non-object value",
                    step_ref, field
                ))
            }
        };
    }

    Ok(current)
}
