//! Run configuration for the chaos engine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scenario::ScenarioGroup;
use crate::state::{IterationLimit, RunSignal};

pub const DEFAULT_STATUS_PORT: u16 = 8081;
pub const DEFAULT_WAIT_DURATION_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    #[default]
    Openshift,
    Kubernetes,
}

impl Distribution {
    pub fn as_str(self) -> &'static str {
        match self {
            Distribution::Openshift => "openshift",
            Distribution::Kubernetes => "kubernetes",
        }
    }
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub chaos: ChaosConfig,
    #[serde(default)]
    pub tunings: TuningsConfig,
    #[serde(default)]
    pub cerberus: CerberusConfig,
    #[serde(default)]
    pub performance_monitoring: PerformanceMonitoringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaosConfig {
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default = "default_kubeconfig_path")]
    pub kubeconfig_path: String,
    /// Poll the run-status service between scenario groups.
    #[serde(default)]
    pub publish_status: bool,
    #[serde(default = "default_port")]
    pub port: i64,
    #[serde(default = "default_signal_address")]
    pub signal_address: String,
    /// Signal the status service is seeded with.
    #[serde(default)]
    pub signal_state: RunSignal,
    #[serde(default)]
    pub scenarios: Vec<ScenarioGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningsConfig {
    #[serde(default = "default_wait_duration")]
    pub wait_duration: u64,
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    #[serde(default)]
    pub daemon_mode: bool,
}

impl Default for TuningsConfig {
    fn default() -> Self {
        Self {
            wait_duration: default_wait_duration(),
            iterations: default_iterations(),
            daemon_mode: false,
        }
    }
}

impl TuningsConfig {
    pub fn iteration_limit(&self) -> IterationLimit {
        if self.daemon_mode {
            IterationLimit::Unbounded
        } else {
            IterationLimit::Bounded(self.iterations)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CerberusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub check_application_routes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceMonitoringConfig {
    #[serde(default)]
    pub enable_alerts: bool,
    #[serde(default)]
    pub alert_profile: Option<String>,
    #[serde(default)]
    pub prometheus_url: Option<String>,
    #[serde(default)]
    pub prometheus_bearer_token: Option<String>,
    /// Run UUID supplied by the user; generated when absent.
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default = "default_kube_burner_binary")]
    pub kube_burner_binary: String,
}

impl Default for PerformanceMonitoringConfig {
    fn default() -> Self {
        Self {
            enable_alerts: false,
            alert_profile: None,
            prometheus_url: None,
            prometheus_bearer_token: None,
            uuid: None,
            kube_burner_binary: default_kube_burner_binary(),
        }
    }
}

impl ChaosConfig {
    /// Port for the run-status service. Out-of-range values fall back to the
    /// default; the flag reports whether that happened.
    pub fn effective_port(&self) -> (u16, bool) {
        match u16::try_from(self.port) {
            Ok(port) => (port, false),
            Err(_) => (DEFAULT_STATUS_PORT, true),
        }
    }

    pub fn kubeconfig(&self) -> PathBuf {
        expand_home(&self.kubeconfig_path)
    }
}

fn default_kubeconfig_path() -> String {
    "~/.kube/config".to_string()
}

fn default_port() -> i64 {
    i64::from(DEFAULT_STATUS_PORT)
}

fn default_signal_address() -> String {
    "0.0.0.0".to_string()
}

fn default_wait_duration() -> u64 {
    DEFAULT_WAIT_DURATION_SECS
}

fn default_iterations() -> u64 {
    1
}

fn default_kube_burner_binary() -> String {
    "kube-burner".to_string()
}

/// Expand a leading `~/` using `$HOME`.
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(raw)
}

pub fn parse_run_config(contents: &str) -> Result<RunConfig, toml::de::Error> {
    toml::from_str(contents)
}

pub fn load_run_config(path: impl AsRef<Path>) -> Result<RunConfig, ConfigError> {
    let path_ref = path.as_ref();
    let body = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_run_config(&body).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}
