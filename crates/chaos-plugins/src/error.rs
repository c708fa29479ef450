#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate step ID: {id}")]
    DuplicateStep { id: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("invalid scenario configuration file: {source_label} expected list, found {found}")]
    NotAList {
        source_label: String,
        found: &'static str,
    },
    #[error("invalid scenario configuration file: {source_label} {reason} on step {index}")]
    InvalidEntry {
        source_label: String,
        index: usize,
        reason: String,
    },
    #[error("invalid step {index} in {source_label} ID: {id} expected one of: {expected}")]
    UnknownStep {
        source_label: String,
        index: usize,
        id: String,
        expected: String,
    },
    #[error("invalid config for step {index} in {source_label} ({id}): {source}")]
    InvalidConfig {
        source_label: String,
        index: usize,
        id: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize output of step {index} in {source_label} ({id}): {source}")]
    Output {
        source_label: String,
        index: usize,
        id: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("step {index} in {source_label} ({id}) failed")]
    StepFailed {
        source_label: String,
        index: usize,
        id: &'static str,
        output_id: &'static str,
    },
}
