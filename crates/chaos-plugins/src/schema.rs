use serde_json::{json, Value};

use crate::registry::StepRegistry;

pub const SCHEMA_ID: &str = "https://github.com/chaosd/chaosd/plugin-scenarios/";
pub const SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

impl StepRegistry {
    /// JSON Schema document for plugin scenario files: a list whose items are
    /// one of the registered `{id, config}` shapes.
    pub fn schema_document(&self) -> Value {
        let alternatives = self
            .steps()
            .map(|step| {
                json!({
                    "type": "object",
                    "properties": {
                        "id": {
                            "type": "string",
                            "const": step.id(),
                        },
                        "config": step.input_schema(),
                    },
                    "required": ["id", "config"],
                })
            })
            .collect::<Vec<_>>();

        json!({
            "$id": SCHEMA_ID,
            "$schema": SCHEMA_DIALECT,
            "title": "Chaos plugin scenarios",
            "description": "Serial execution of registered plugin steps.",
            "type": "array",
            "minContains": 1,
            "items": {
                "oneOf": alternatives,
            },
        })
    }
}
