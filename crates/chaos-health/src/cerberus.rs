//! Cluster health verification around each injected action.

use std::time::Duration;

use chaos_core::CerberusConfig;
use serde::Deserialize;

use crate::error::HealthError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a health evaluation. Never fatal; callers log it and move on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    /// `None` when no check is configured.
    pub healthy: Option<bool>,
    pub failed_routes: Vec<String>,
    pub errors: Vec<String>,
}

impl HealthReport {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn is_failure(&self) -> bool {
        self.healthy == Some(false) || !self.failed_routes.is_empty() || !self.errors.is_empty()
    }
}

pub trait HealthCheck {
    /// Evaluate cluster health for the window `[start_epoch, end_epoch]`
    /// (seconds since the epoch).
    fn evaluate(&self, start_epoch: i64, end_epoch: i64) -> HealthReport;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHealthCheck;

impl HealthCheck for NoopHealthCheck {
    fn evaluate(&self, _start_epoch: i64, _end_epoch: i64) -> HealthReport {
        HealthReport::skipped()
    }
}

#[derive(Debug, Deserialize)]
struct HistoryDocument {
    history: History,
}

#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    failures: Vec<HistoryFailure>,
}

#[derive(Debug, Deserialize)]
struct HistoryFailure {
    component: String,
    name: String,
    #[serde(default)]
    timestamp: Option<String>,
}

/// `True` or `False` as served by the Cerberus root endpoint.
pub fn parse_health_body(body: &str) -> Option<bool> {
    match body.trim() {
        "True" => Some(true),
        "False" => Some(false),
        _ => None,
    }
}

/// Route names reported as failing in a Cerberus history document.
pub fn failed_routes(history: &str) -> Result<Vec<String>, serde_json::Error> {
    let document: HistoryDocument = serde_json::from_str(history)?;
    Ok(document
        .history
        .failures
        .into_iter()
        .filter(|failure| failure.component == "route")
        .map(|failure| match failure.timestamp {
            Some(at) => format!("{} ({at})", failure.name),
            None => failure.name,
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct CerberusClient {
    pub url: String,
    pub check_application_routes: bool,
    http: reqwest::blocking::Client,
}

impl CerberusClient {
    pub fn new(url: impl Into<String>, check_application_routes: bool) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            check_application_routes,
            http: reqwest::blocking::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    fn get(&self, url: &str) -> Result<String, HealthError> {
        let response = self.http.get(url).send().map_err(|source| HealthError::Http {
            url: url.to_string(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(HealthError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.text().map_err(|source| HealthError::Http {
            url: url.to_string(),
            source,
        })
    }

    fn cluster_health(&self) -> Result<bool, HealthError> {
        let body = self.get(&self.url)?;
        parse_health_body(&body).ok_or_else(|| HealthError::Body {
            url: self.url.clone(),
            body: body.trim().to_string(),
        })
    }

    fn route_failures(&self, window_secs: i64) -> Result<Vec<String>, HealthError> {
        let url = format!("{}/history?loopback={window_secs}", self.url);
        let body = self.get(&url)?;
        failed_routes(&body).map_err(|err| HealthError::Body {
            url,
            body: err.to_string(),
        })
    }
}

impl HealthCheck for CerberusClient {
    fn evaluate(&self, start_epoch: i64, end_epoch: i64) -> HealthReport {
        let mut report = HealthReport::default();
        match self.cluster_health() {
            Ok(healthy) => {
                report.healthy = Some(healthy);
                if healthy {
                    log::info!("Received cerberus status: cluster is healthy");
                } else {
                    log::error!("Received cerberus status: cluster is unhealthy");
                }
            }
            Err(err) => {
                log::error!("Failed to get cerberus status: {err}");
                report.errors.push(err.to_string());
            }
        }

        if self.check_application_routes {
            match self.route_failures((end_epoch - start_epoch).max(0)) {
                Ok(routes) if routes.is_empty() => {}
                Ok(routes) => {
                    log::error!(
                        "Application routes failed during the chaos window: {}",
                        routes.join(", ")
                    );
                    report.failed_routes = routes;
                }
                Err(err) => {
                    log::error!("Failed to get cerberus route history: {err}");
                    report.errors.push(err.to_string());
                }
            }
        }
        report
    }
}

/// Health check selected by the `[cerberus]` section.
pub fn health_check_from_config(config: &CerberusConfig) -> Box<dyn HealthCheck> {
    match config.url.as_deref().map(str::trim) {
        Some(url) if config.enabled && !url.is_empty() => {
            Box::new(CerberusClient::new(url, config.check_application_routes))
        }
        _ => Box::new(NoopHealthCheck),
    }
}
