//! Scenario plan data model and scenario file loading.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const NODE_SCENARIOS: &str = "node_scenarios";
pub const PLUGIN_SCENARIOS: &str = "plugin_scenarios";
/// Removed scenario type; its configurations moved to plugin scenarios.
pub const POD_SCENARIOS: &str = "pod_scenarios";

#[derive(Debug, thiserror::Error)]
pub enum ScenarioFileError {
    #[error("failed to read scenario file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid scenario record in {source_label}: {source}")]
    Shape {
        source_label: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One scenario-type-specific entry: a path to a scenario file, or the
/// scenario document inlined into the run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScenarioEntry {
    Path(PathBuf),
    Inline(Value),
}

impl ScenarioEntry {
    /// Identifier recorded in the failure list for this entry.
    pub fn source_label(&self, index: usize) -> String {
        match self {
            ScenarioEntry::Path(path) => path.display().to_string(),
            ScenarioEntry::Inline(_) => format!("inline[{index}]"),
        }
    }

    /// Load the entry as a generic document. YAML is a superset of JSON, so
    /// both file formats go through the YAML parser.
    pub fn load_document(&self, index: usize) -> Result<(String, Value), ScenarioFileError> {
        let label = self.source_label(index);
        match self {
            ScenarioEntry::Path(path) => Ok((label, read_document(path)?)),
            ScenarioEntry::Inline(value) => Ok((label, value.clone())),
        }
    }
}

/// One named category of scenario entries processed together. Encoded as a
/// single-key table `{ <scenario_type> = [entries...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Vec<ScenarioEntry>>",
    into = "BTreeMap<String, Vec<ScenarioEntry>>"
)]
pub struct ScenarioGroup {
    pub scenario_type: String,
    pub entries: Vec<ScenarioEntry>,
}

impl TryFrom<BTreeMap<String, Vec<ScenarioEntry>>> for ScenarioGroup {
    type Error = String;

    fn try_from(raw: BTreeMap<String, Vec<ScenarioEntry>>) -> Result<Self, Self::Error> {
        if raw.len() != 1 {
            let keys = raw.keys().cloned().collect::<Vec<_>>().join(", ");
            return Err(format!(
                "scenario group must have exactly one scenario type key, found [{keys}]"
            ));
        }
        let (scenario_type, entries) = raw
            .into_iter()
            .next()
            .ok_or_else(|| "scenario group is empty".to_string())?;
        Ok(Self {
            scenario_type,
            entries,
        })
    }
}

impl From<ScenarioGroup> for BTreeMap<String, Vec<ScenarioEntry>> {
    fn from(group: ScenarioGroup) -> Self {
        let mut out = BTreeMap::new();
        out.insert(group.scenario_type, group.entries);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BmcInfo {
    pub bmc_addr: String,
    #[serde(default)]
    pub bmc_user: Option<String>,
    #[serde(default)]
    pub bmc_password: Option<String>,
}

/// One node-chaos unit from a node scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeScenarioConfig {
    #[serde(default)]
    pub cloud_type: Option<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub label_selector: Option<String>,
    #[serde(default = "default_instance_count")]
    pub instance_count: usize,
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// Seconds a provider may block waiting for a node state change.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default = "default_ssh_private_key")]
    pub ssh_private_key: String,
    #[serde(default)]
    pub helper_node_ip: Option<String>,
    #[serde(default)]
    pub bmc_info: BTreeMap<String, BmcInfo>,
    #[serde(default)]
    pub bmc_user: Option<String>,
    #[serde(default)]
    pub bmc_password: Option<String>,
}

impl NodeScenarioConfig {
    /// Explicit node names, one resolver call each. An absent name yields a
    /// single empty name so resolution falls through to the label selector.
    pub fn node_names(&self) -> Vec<String> {
        match self.node_name.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw
                .split(',')
                .map(|name| name.trim().to_string())
                .collect(),
            _ => vec![String::new()],
        }
    }

    pub fn label_selector(&self) -> &str {
        self.label_selector.as_deref().unwrap_or("")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn cloud_tag(&self) -> Option<&str> {
        self.cloud_type.as_deref()
    }
}

fn default_instance_count() -> usize {
    1
}

fn default_runs() -> u32 {
    1
}

fn default_timeout() -> u64 {
    120
}

fn default_ssh_private_key() -> String {
    "~/.ssh/id_rsa".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeScenarioDocument {
    pub node_scenarios: Vec<NodeScenarioConfig>,
}

pub fn read_document(path: &Path) -> Result<Value, ScenarioFileError> {
    let body = fs::read_to_string(path).map_err(|source| ScenarioFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&body).map_err(|source| ScenarioFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_node_scenarios(
    entry: &ScenarioEntry,
    index: usize,
) -> Result<Vec<NodeScenarioConfig>, ScenarioFileError> {
    let (source_label, document) = entry.load_document(index)?;
    let parsed: NodeScenarioDocument = serde_json::from_value(document)
        .map_err(|source| ScenarioFileError::Shape {
            source_label,
            source,
        })?;
    Ok(parsed.node_scenarios)
}
