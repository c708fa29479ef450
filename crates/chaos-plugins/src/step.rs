//! Typed plugin steps and their type-erased registry form.

use std::path::PathBuf;

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

/// Values the engine supplies to every step, overriding plan-provided ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepContext {
    pub kubeconfig_path: Option<PathBuf>,
}

/// Output of a step. Output enums are serialized untagged; the variant is
/// reported separately through `output_id`.
pub trait StepOutput: Serialize {
    fn output_id(&self) -> &'static str;
}

pub trait Step {
    type Input: DeserializeOwned + JsonSchema;
    type Output: StepOutput;

    fn id(&self) -> &'static str;

    /// Output ids that mark the invoking plan as failed.
    fn error_output_ids(&self) -> &'static [&'static str] {
        &["error"]
    }

    /// Fill context slots declared by the input type.
    fn inject_context(&self, _input: &mut Self::Input, _context: &StepContext) {}

    fn run(&self, input: Self::Input) -> Self::Output;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub output_id: &'static str,
    pub output_data: Value,
}

impl StepResult {
    /// Render as the `{output_id, output_data}` document that is logged for
    /// every executed step.
    pub fn render(&self) -> String {
        let document = json!({
            "output_id": self.output_id,
            "output_data": self.output_data,
        });
        serde_json::to_string_pretty(&document).unwrap_or_else(|_| document.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepCallError {
    #[error("invalid step input: {0}")]
    Input(#[source] serde_json::Error),
    #[error("failed to serialize step output: {0}")]
    Output(#[source] serde_json::Error),
}

/// Object-safe view of a [`Step`] used by the registry.
pub trait DynStep {
    fn id(&self) -> &'static str;
    fn error_output_ids(&self) -> &'static [&'static str];
    fn input_schema(&self) -> Value;
    fn call(&self, config: Value, context: &StepContext) -> Result<StepResult, StepCallError>;
}

struct Registered<S>(S);

impl<S: Step> DynStep for Registered<S> {
    fn id(&self) -> &'static str {
        self.0.id()
    }

    fn error_output_ids(&self) -> &'static [&'static str] {
        self.0.error_output_ids()
    }

    fn input_schema(&self) -> Value {
        let generator = SchemaSettings::draft2019_09()
            .with(|settings| settings.inline_subschemas = true)
            .into_generator();
        let root = generator.into_root_schema_for::<S::Input>();
        let mut schema = serde_json::to_value(root).unwrap_or_else(|_| json!({}));
        if let Some(object) = schema.as_object_mut() {
            for key in ["$schema", "title", "description", "definitions", "$defs"] {
                object.remove(key);
            }
        }
        schema
    }

    fn call(&self, config: Value, context: &StepContext) -> Result<StepResult, StepCallError> {
        let mut input: S::Input = serde_json::from_value(config).map_err(StepCallError::Input)?;
        self.0.inject_context(&mut input, context);
        let output = self.0.run(input);
        let output_id = output.output_id();
        let output_data = serde_json::to_value(&output).map_err(StepCallError::Output)?;
        Ok(StepResult {
            output_id,
            output_data,
        })
    }
}

pub fn register<S: Step + 'static>(step: S) -> Box<dyn DynStep> {
    Box::new(Registered(step))
}
