//! Post-run alert evaluation through `kube-burner check-alerts`.

use std::path::PathBuf;
use std::process::Command;

use chaos_core::PerformanceMonitoringConfig;

use crate::error::HealthError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertWindow {
    pub uuid: String,
    pub start_epoch: i64,
    pub end_epoch: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeBurnerAlerts {
    pub binary: PathBuf,
    pub prometheus_url: String,
    pub bearer_token: String,
    pub alert_profile: String,
}

impl KubeBurnerAlerts {
    /// `None` unless alerts are enabled and a profile is configured.
    pub fn from_config(config: &PerformanceMonitoringConfig) -> Option<Self> {
        if !config.enable_alerts {
            return None;
        }
        let profile = config.alert_profile.as_deref()?.trim();
        if profile.is_empty() {
            return None;
        }
        Some(Self {
            binary: PathBuf::from(&config.kube_burner_binary),
            prometheus_url: config.prometheus_url.clone().unwrap_or_default(),
            bearer_token: config.prometheus_bearer_token.clone().unwrap_or_default(),
            alert_profile: profile.to_string(),
        })
    }

    pub fn args(&self, window: &AlertWindow) -> Vec<String> {
        let mut args = vec!["check-alerts".to_string()];
        if !self.prometheus_url.is_empty() {
            args.push("-u".to_string());
            args.push(self.prometheus_url.clone());
        }
        if !self.bearer_token.is_empty() {
            args.push("-t".to_string());
            args.push(self.bearer_token.clone());
        }
        args.extend([
            "-a".to_string(),
            self.alert_profile.clone(),
            "--uuid".to_string(),
            window.uuid.clone(),
            "--start".to_string(),
            window.start_epoch.to_string(),
            "--end".to_string(),
            window.end_epoch.to_string(),
        ]);
        args
    }

    fn render(&self, args: &[String]) -> String {
        let mut rendered = vec![self.binary.display().to_string()];
        let mut mask_next = false;
        for arg in args {
            if mask_next {
                rendered.push("***".to_string());
            } else {
                rendered.push(arg.clone());
            }
            mask_next = arg == "-t";
        }
        rendered.join(" ")
    }

    /// Run the alert check. Returns the tool's stdout.
    pub fn check(&self, window: &AlertWindow) -> Result<String, HealthError> {
        let args = self.args(window);
        let command = self.render(&args);
        log::info!("Checking alerts: {command}");
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|source| HealthError::Spawn {
                command: command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(HealthError::CommandFailed {
                command,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitoring() -> PerformanceMonitoringConfig {
        PerformanceMonitoringConfig {
            enable_alerts: true,
            alert_profile: Some("config/alerts".to_string()),
            prometheus_url: Some("https://prometheus.local".to_string()),
            prometheus_bearer_token: Some("secret".to_string()),
            uuid: None,
            kube_burner_binary: "kube-burner".to_string(),
        }
    }

    fn window() -> AlertWindow {
        AlertWindow {
            uuid: "run-1".to_string(),
            start_epoch: 100,
            end_epoch: 200,
        }
    }

    #[test]
    fn disabled_or_profileless_config_builds_nothing() {
        let mut config = monitoring();
        config.alert_profile = Some("  ".to_string());
        assert!(KubeBurnerAlerts::from_config(&config).is_none());
        config.enable_alerts = false;
        config.alert_profile = Some("config/alerts".to_string());
        assert!(KubeBurnerAlerts::from_config(&config).is_none());
    }

    #[test]
    fn args_carry_prometheus_profile_and_window() {
        let alerts = KubeBurnerAlerts::from_config(&monitoring()).expect("alerts enabled");
        assert_eq!(
            alerts.args(&window()),
            vec![
                "check-alerts",
                "-u",
                "https://prometheus.local",
                "-t",
                "secret",
                "-a",
                "config/alerts",
                "--uuid",
                "run-1",
                "--start",
                "100",
                "--end",
                "200",
            ]
        );
    }

    #[test]
    fn rendered_command_masks_token() {
        let alerts = KubeBurnerAlerts::from_config(&monitoring()).expect("alerts enabled");
        let rendered = alerts.render(&alerts.args(&window()));
        assert!(rendered.starts_with("kube-burner check-alerts"));
        assert!(rendered.contains("-t ***"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let mut alerts = KubeBurnerAlerts::from_config(&monitoring()).expect("alerts enabled");
        alerts.binary = PathBuf::from("/definitely/missing/kube-burner");
        let err = alerts.check(&window()).expect_err("missing binary");
        assert!(matches!(err, HealthError::Spawn { .. }));
    }
}
