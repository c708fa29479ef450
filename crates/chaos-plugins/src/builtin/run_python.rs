//! `run-python`: run a script file and report its output.

use std::path::PathBuf;
use std::process::Command;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::step::{Step, StepOutput};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct RunPythonConfig {
    /// Path to the script to run.
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RunPythonOutput {
    Success {
        stdout: String,
    },
    Error {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

impl StepOutput for RunPythonOutput {
    fn output_id(&self) -> &'static str {
        match self {
            RunPythonOutput::Success { .. } => "success",
            RunPythonOutput::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPythonStep {
    pub interpreter: PathBuf,
}

impl Default for RunPythonStep {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
        }
    }
}

impl Step for RunPythonStep {
    type Input = RunPythonConfig;
    type Output = RunPythonOutput;

    fn id(&self) -> &'static str {
        "run-python"
    }

    fn run(&self, input: RunPythonConfig) -> RunPythonOutput {
        let output = match Command::new(&self.interpreter)
            .arg(&input.filename)
            .output()
        {
            Ok(output) => output,
            Err(err) => {
                return RunPythonOutput::Error {
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!(
                        "failed to start {} {}: {err}",
                        self.interpreter.display(),
                        input.filename
                    ),
                }
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            RunPythonOutput::Success { stdout }
        } else {
            RunPythonOutput::Error {
                exit_code: output.status.code(),
                stdout,
                stderr,
            }
        }
    }
}
