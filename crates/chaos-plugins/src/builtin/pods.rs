//! Pod disruption steps: `kill-pods` and `wait-for-pods`.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chaos_kube::{KubeCli, KubePods, PodRef};
use rand::seq::SliceRandom;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::step::{Step, StepContext, StepOutput};

/// Pods to select: namespace and name are regular expressions matched against
/// the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct PodSelector {
    /// Regular expression for target pod namespaces.
    pub namespace_pattern: String,
    /// Regular expression for target pod names.
    #[serde(default)]
    pub name_pattern: Option<String>,
    /// Kubernetes label selector for the target pods.
    #[serde(default)]
    pub label_selector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct KillPodsConfig {
    #[serde(flatten)]
    pub selector: PodSelector,
    /// How many pods should we attempt to kill?
    #[serde(default = "default_count")]
    pub kill: usize,
    /// Path to your Kubeconfig file. Set by the engine.
    #[serde(default)]
    pub kubeconfig_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct WaitForPodsConfig {
    #[serde(flatten)]
    pub selector: PodSelector,
    /// How many running pods should we wait for?
    #[serde(default = "default_count")]
    pub count: usize,
    /// Seconds to wait before giving up.
    #[serde(default = "default_wait_timeout")]
    pub timeout: u64,
    /// Seconds between pod listings.
    #[serde(default = "default_backoff")]
    pub backoff: u64,
    /// Path to your Kubeconfig file. Set by the engine.
    #[serde(default)]
    pub kubeconfig_path: Option<String>,
}

fn default_count() -> usize {
    1
}

fn default_wait_timeout() -> u64 {
    180
}

fn default_backoff() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PodsOutput {
    Success { pods: Vec<PodRef> },
    Error { error: String },
}

impl StepOutput for PodsOutput {
    fn output_id(&self) -> &'static str {
        match self {
            PodsOutput::Success { .. } => "success",
            PodsOutput::Error { .. } => "error",
        }
    }
}

impl PodsOutput {
    fn error(message: impl Into<String>) -> Self {
        PodsOutput::Error {
            error: message.into(),
        }
    }
}

struct CompiledSelector {
    namespace: Regex,
    name: Option<Regex>,
}

impl PodSelector {
    fn compile(&self) -> Result<CompiledSelector, regex::Error> {
        let namespace = Regex::new(&format!("^(?:{})$", self.namespace_pattern))?;
        let name = self
            .name_pattern
            .as_deref()
            .map(|pattern| Regex::new(&format!("^(?:{pattern})$")))
            .transpose()?;
        Ok(CompiledSelector { namespace, name })
    }
}

impl CompiledSelector {
    fn matches(&self, pod: &PodRef) -> bool {
        self.namespace.is_match(&pod.namespace)
            && self
                .name
                .as_ref()
                .map_or(true, |name| name.is_match(&pod.name))
    }
}

/// Pods matching the namespace/name patterns, in listing order.
pub fn select_pods(pods: Vec<PodRef>, selector: &PodSelector) -> Result<Vec<PodRef>, String> {
    let compiled = selector
        .compile()
        .map_err(|err| format!("invalid pod pattern: {err}"))?;
    Ok(pods.into_iter().filter(|pod| compiled.matches(pod)).collect())
}

fn pod_client(kubectl: &Path, kubeconfig_path: Option<&str>) -> KubePods {
    let cli = KubeCli::new(kubectl);
    let cli = match kubeconfig_path {
        Some(path) if !path.is_empty() => cli.with_kubeconfig(path),
        _ => cli,
    };
    KubePods::new(cli)
}

fn kubeconfig_from(context: &StepContext) -> Option<String> {
    context
        .kubeconfig_path
        .as_ref()
        .map(|path| path.display().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillPodsStep {
    pub kubectl: PathBuf,
}

impl Default for KillPodsStep {
    fn default() -> Self {
        Self {
            kubectl: PathBuf::from("kubectl"),
        }
    }
}

impl Step for KillPodsStep {
    type Input = KillPodsConfig;
    type Output = PodsOutput;

    fn id(&self) -> &'static str {
        "kill-pods"
    }

    fn inject_context(&self, input: &mut KillPodsConfig, context: &StepContext) {
        input.kubeconfig_path = kubeconfig_from(context);
    }

    fn run(&self, input: KillPodsConfig) -> PodsOutput {
        let client = pod_client(&self.kubectl, input.kubeconfig_path.as_deref());
        let listed = match client.list(input.selector.label_selector.as_deref()) {
            Ok(pods) => pods,
            Err(err) => return PodsOutput::error(format!("failed to list pods: {err}")),
        };
        let candidates = match select_pods(listed, &input.selector) {
            Ok(pods) => pods,
            Err(message) => return PodsOutput::error(message),
        };
        if candidates.len() < input.kill {
            return PodsOutput::error(format!(
                "Not enough pods match the criteria, expected {} but found only {} pods",
                input.kill,
                candidates.len()
            ));
        }

        let victims = candidates
            .choose_multiple(&mut rand::thread_rng(), input.kill)
            .cloned()
            .collect::<Vec<_>>();
        for pod in &victims {
            log::info!("Killing pod {pod}");
            if let Err(err) = client.delete(pod) {
                return PodsOutput::error(format!("failed to delete pod {pod}: {err}"));
            }
        }
        PodsOutput::Success { pods: victims }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitForPodsStep {
    pub kubectl: PathBuf,
}

impl Default for WaitForPodsStep {
    fn default() -> Self {
        Self {
            kubectl: PathBuf::from("kubectl"),
        }
    }
}

impl Step for WaitForPodsStep {
    type Input = WaitForPodsConfig;
    type Output = PodsOutput;

    fn id(&self) -> &'static str {
        "wait-for-pods"
    }

    fn inject_context(&self, input: &mut WaitForPodsConfig, context: &StepContext) {
        input.kubeconfig_path = kubeconfig_from(context);
    }

    fn run(&self, input: WaitForPodsConfig) -> PodsOutput {
        let client = pod_client(&self.kubectl, input.kubeconfig_path.as_deref());
        // A timeout past the end of the clock waits without a deadline.
        let deadline = Instant::now().checked_add(Duration::from_secs(input.timeout));
        loop {
            let listed = match client.list(input.selector.label_selector.as_deref()) {
                Ok(pods) => pods,
                Err(err) => return PodsOutput::error(format!("failed to list pods: {err}")),
            };
            let running = match select_pods(listed, &input.selector) {
                Ok(pods) => pods.into_iter().filter(PodRef::is_running).collect::<Vec<_>>(),
                Err(message) => return PodsOutput::error(message),
            };
            if running.len() >= input.count {
                return PodsOutput::Success { pods: running };
            }
            if matches!(deadline, Some(deadline) if Instant::now() >= deadline) {
                return PodsOutput::error(format!(
                    "timeout while waiting for pods to come up: expected {} running pods, found {}",
                    input.count,
                    running.len()
                ));
            }
            thread::sleep(Duration::from_secs(input.backoff.max(1)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(namespace: &str, name: &str, phase: &str) -> PodRef {
        PodRef {
            namespace: namespace.to_string(),
            name: name.to_string(),
            phase: phase.to_string(),
        }
    }

    fn selector(namespace: &str, name: Option<&str>) -> PodSelector {
        PodSelector {
            namespace_pattern: namespace.to_string(),
            name_pattern: name.map(str::to_string),
            label_selector: None,
        }
    }

    #[test]
    fn select_pods_matches_whole_namespace_and_name() {
        let pods = vec![
            pod("openshift-etcd", "etcd-master-0", "Running"),
            pod("openshift-etcd-operator", "etcd-operator-1", "Running"),
            pod("openshift-etcd", "etcd-guard-0", "Running"),
        ];
        let selected = select_pods(pods, &selector("openshift-etcd", Some("etcd-master-.*")))
            .expect("valid patterns");
        assert_eq!(selected, vec![pod("openshift-etcd", "etcd-master-0", "Running")]);
    }

    #[test]
    fn invalid_pattern_is_reported_not_panicked() {
        let err = select_pods(Vec::new(), &selector("(", None)).expect_err("bad regex");
        assert!(err.starts_with("invalid pod pattern"));
    }

    #[test]
    fn kill_pods_config_defaults_and_flattened_selector() {
        let config: KillPodsConfig = serde_json::from_value(json!({
            "namespace_pattern": "^default$",
            "label_selector": "app=web",
        }))
        .expect("config");
        assert_eq!(config.kill, 1);
        assert_eq!(config.selector.label_selector.as_deref(), Some("app=web"));
        assert_eq!(config.kubeconfig_path, None);
    }

    #[test]
    fn kill_pods_reports_listing_failure_as_error_output() {
        let step = KillPodsStep {
            kubectl: PathBuf::from("/definitely/missing/kubectl"),
        };
        let output = step.run(KillPodsConfig {
            selector: selector("default", None),
            kill: 1,
            kubeconfig_path: None,
        });
        assert_eq!(output.output_id(), "error");
    }

    #[test]
    fn wait_for_pods_reports_listing_failure_as_error_output() {
        let step = WaitForPodsStep {
            kubectl: PathBuf::from("/definitely/missing/kubectl"),
        };
        let output = step.run(WaitForPodsConfig {
            selector: selector("default", None),
            count: 1,
            timeout: 0,
            backoff: 1,
            kubeconfig_path: None,
        });
        assert!(matches!(output, PodsOutput::Error { ref error } if error.starts_with("failed to list pods")));
    }

    #[test]
    fn wait_for_pods_with_unbounded_timeout_still_returns_output() {
        let registry = crate::StepRegistry::new(vec![crate::register(WaitForPodsStep {
            kubectl: PathBuf::from("/definitely/missing/kubectl"),
        })])
        .expect("registry");
        let plan = json!([{
            "id": "wait-for-pods",
            "config": {"namespace_pattern": "default", "timeout": u64::MAX}
        }]);

        let err = crate::run_plan(&registry, "inline[0]", &plan, &StepContext::default())
            .expect_err("listing failure ends the plan");

        assert!(matches!(
            err,
            crate::PlanError::StepFailed {
                id: "wait-for-pods",
                output_id: "error",
                ..
            }
        ));
    }

    #[test]
    fn engine_context_overrides_plan_kubeconfig() {
        let mut config: WaitForPodsConfig = serde_json::from_value(json!({
            "namespace_pattern": "default",
            "kubeconfig_path": "/from/plan",
        }))
        .expect("config");
        WaitForPodsStep::default().inject_context(
            &mut config,
            &StepContext {
                kubeconfig_path: Some(PathBuf::from("/from/engine")),
            },
        );
        assert_eq!(config.kubeconfig_path.as_deref(), Some("/from/engine"));
    }
}
