//! Pre-flight validation for run configuration and scenario records.

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::scenario::{NodeScenarioConfig, POD_SCENARIOS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.level == ValidationLevel::Error
    }
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

impl Validate for RunConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if !self.tunings.daemon_mode && self.tunings.iterations == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "tunings.iterations.zero",
                message: "iterations is 0 and daemon mode is off; nothing would run".to_string(),
            });
        }

        if self.chaos.scenarios.is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "chaos.scenarios.empty",
                message: "no scenario groups configured; iterations will be empty".to_string(),
            });
        }

        for group in &self.chaos.scenarios {
            if group.scenario_type == POD_SCENARIOS {
                issues.push(ValidationIssue {
                    level: ValidationLevel::Error,
                    code: "chaos.scenarios.pod_scenarios.removed",
                    message: "pod_scenarios have been removed; use plugin_scenarios with the kill-pods step instead".to_string(),
                });
            }
        }

        if self.chaos.publish_status && self.chaos.signal_address.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "chaos.signal_address.empty",
                message: "publish_status is enabled but signal_address is empty".to_string(),
            });
        }

        if self.cerberus.enabled
            && self
                .cerberus
                .url
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "cerberus.url.missing",
                message: "cerberus is enabled but no url is configured".to_string(),
            });
        }

        let monitoring = &self.performance_monitoring;
        if monitoring.enable_alerts
            && monitoring
                .alert_profile
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "performance_monitoring.alert_profile.missing",
                message: "alerts are enabled but alert_profile is not defined".to_string(),
            });
        }

        if monitoring.enable_alerts && monitoring.prometheus_url.is_none() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "performance_monitoring.prometheus_url.missing",
                message: "alerts are enabled without prometheus_url; the alert tool must discover it"
                    .to_string(),
            });
        }

        issues
    }
}

impl Validate for NodeScenarioConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.actions.is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "node_scenario.actions.empty",
                message: "node scenario has no actions".to_string(),
            });
        }

        if self.instance_count == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "node_scenario.instance_count.zero",
                message: "instance_count is 0; label selection will target no nodes".to_string(),
            });
        }

        if self.runs == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "node_scenario.runs.zero",
                message: "runs is 0; actions will not be performed".to_string(),
            });
        }

        let has_name = self
            .node_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        let has_selector = !self.label_selector().trim().is_empty();
        if has_name && has_selector {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "node_scenario.selection.ambiguous",
                message: "both node_name and label_selector are set; the selector is only a fallback"
                    .to_string(),
            });
        }

        issues
    }
}

pub fn error_issues(issues: &[ValidationIssue]) -> impl Iterator<Item = &ValidationIssue> {
    issues.iter().filter(|issue| issue.is_error())
}
