//! Sequential execution of one plugin scenario file.

use serde_json::Value;

use crate::error::PlanError;
use crate::registry::StepRegistry;
use crate::step::{DynStep, StepCallError, StepContext, StepResult};

/// One validated `{id, config}` record of a plan.
pub struct Invocation<'r> {
    pub index: usize,
    pub step: &'r dyn DynStep,
    pub config: Value,
}

impl std::fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("index", &self.index)
            .field("step", &self.step.id())
            .field("config", &self.config)
            .finish()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Check the shape of every record and resolve every step id before anything
/// runs.
pub fn validate_plan<'r>(
    registry: &'r StepRegistry,
    source_label: &str,
    document: &Value,
) -> Result<Vec<Invocation<'r>>, PlanError> {
    let entries = document.as_array().ok_or_else(|| PlanError::NotAList {
        source_label: source_label.to_string(),
        found: type_name(document),
    })?;

    let mut invocations = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let invalid = |reason: String| PlanError::InvalidEntry {
            source_label: source_label.to_string(),
            index,
            reason,
        };
        let record = entry.as_object().ok_or_else(|| {
            invalid(format!(
                "expected a list of dict's, found {}",
                type_name(entry)
            ))
        })?;
        let id = match record.get("id") {
            Some(Value::String(id)) => id,
            Some(other) => {
                return Err(invalid(format!(
                    "expected 'id' to be a string, found {}",
                    type_name(other)
                )))
            }
            None => return Err(invalid("missing 'id' field".to_string())),
        };
        let config = record
            .get("config")
            .ok_or_else(|| invalid("missing 'config' field".to_string()))?;
        let step = registry.get(id).ok_or_else(|| PlanError::UnknownStep {
            source_label: source_label.to_string(),
            index,
            id: id.clone(),
            expected: registry.ids().join(", "),
        })?;
        invocations.push(Invocation {
            index,
            step,
            config: config.clone(),
        });
    }
    Ok(invocations)
}

/// Run a plan document step by step. The first step that reports one of its
/// failure outputs aborts the plan.
pub fn run_plan(
    registry: &StepRegistry,
    source_label: &str,
    document: &Value,
    context: &StepContext,
) -> Result<Vec<StepResult>, PlanError> {
    let invocations = validate_plan(registry, source_label, document)?;
    let mut results = Vec::with_capacity(invocations.len());

    for Invocation {
        index,
        step,
        config,
    } in invocations
    {
        let id = step.id();
        log::info!("Running step {index} in {source_label} ({id})");
        let result = step.call(config, context).map_err(|err| match err {
            StepCallError::Input(source) => PlanError::InvalidConfig {
                source_label: source_label.to_string(),
                index,
                id,
                source,
            },
            StepCallError::Output(source) => PlanError::Output {
                source_label: source_label.to_string(),
                index,
                id,
                source,
            },
        })?;
        log::info!("{}\n", result.render());

        if step.error_output_ids().contains(&result.output_id) {
            return Err(PlanError::StepFailed {
                source_label: source_label.to_string(),
                index,
                id,
                output_id: result.output_id,
            });
        }
        results.push(result);
    }
    Ok(results)
}
