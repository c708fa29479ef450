use std::path::PathBuf;

use chaos_core::{Distribution, ScenarioFileError};
use chaos_nodes::DispatchError;
use chaos_plugins::PlanError;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    ScenarioFile(#[from] ScenarioFileError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("{scenario_type} are currently supported only on {required}, configured distribution is {configured}")]
    UnsupportedDistribution {
        scenario_type: String,
        required: Distribution,
        configured: Distribution,
    },
    #[error("{scenario_type} failed: {source}")]
    Handler {
        scenario_type: String,
        #[source]
        source: HandlerError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("failed to open report file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install logger: {0}")]
    Apply(#[from] log::SetLoggerError),
}
