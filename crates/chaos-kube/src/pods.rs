use serde::{Deserialize, Serialize};

use crate::command::KubeCli;
use crate::error::KubeError;

const POD_COLUMNS: &str =
    "custom-columns=NAMESPACE:.metadata.namespace,NAME:.metadata.name,PHASE:.status.phase";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    pub phase: String,
}

impl PodRef {
    pub fn is_running(&self) -> bool {
        self.phase == "Running"
    }
}

impl std::fmt::Display for PodRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Pod listing and deletion backed by `kubectl`.
#[derive(Debug, Clone, Default)]
pub struct KubePods {
    pub cli: KubeCli,
}

impl KubePods {
    pub fn new(cli: KubeCli) -> Self {
        Self { cli }
    }

    /// Pods across all namespaces, optionally narrowed by a label selector.
    pub fn list(&self, label_selector: Option<&str>) -> Result<Vec<PodRef>, KubeError> {
        let mut args = vec!["get", "pods", "--all-namespaces"];
        if let Some(selector) = label_selector.filter(|selector| !selector.is_empty()) {
            args.push("-l");
            args.push(selector);
        }
        args.extend(["-o", POD_COLUMNS, "--no-headers"]);
        let output = self.cli.run(args)?;
        parse_pods(&output.stdout)
    }

    pub fn delete(&self, pod: &PodRef) -> Result<(), KubeError> {
        self.cli.run([
            "delete",
            "pod",
            pod.name.as_str(),
            "-n",
            pod.namespace.as_str(),
            "--wait=false",
        ])?;
        Ok(())
    }
}

pub fn parse_pods(stdout: &str) -> Result<Vec<PodRef>, KubeError> {
    let mut pods = Vec::new();
    for line in stdout.lines() {
        let fields = line.split_whitespace().collect::<Vec<_>>();
        match fields.as_slice() {
            [] => continue,
            [namespace, name, phase] => pods.push(PodRef {
                namespace: (*namespace).to_string(),
                name: (*name).to_string(),
                phase: (*phase).to_string(),
            }),
            _ => {
                return Err(KubeError::Parse {
                    context: format!("expected NAMESPACE NAME PHASE, got '{}'", line.trim()),
                })
            }
        }
    }
    Ok(pods)
}
