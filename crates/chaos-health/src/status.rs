//! Run-signal sources polled by the controller between scenario groups.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chaos_core::{ChaosConfig, RunSignal};

use crate::error::HealthError;

const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

pub trait SignalSource {
    fn poll(&mut self) -> RunSignal;
}

/// Signal used when status publishing is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstantSignal(pub RunSignal);

impl SignalSource for ConstantSignal {
    fn poll(&mut self) -> RunSignal {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct StatusClient {
    pub url: String,
    last: RunSignal,
    http: reqwest::blocking::Client,
}

impl StatusClient {
    pub fn new(address: &str, port: u16, initial: RunSignal) -> Self {
        Self {
            url: format!("http://{address}:{port}/"),
            last: initial,
            http: reqwest::blocking::Client::builder()
                .timeout(STATUS_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn last(&self) -> RunSignal {
        self.last
    }

    fn fetch(&self) -> Result<RunSignal, HealthError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .map_err(|source| HealthError::Http {
                url: self.url.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(HealthError::Status {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let body = response.text().map_err(|source| HealthError::Http {
            url: self.url.clone(),
            source,
        })?;
        body.parse::<RunSignal>().map_err(|reason| HealthError::Body {
            url: self.url.clone(),
            body: reason,
        })
    }
}

impl SignalSource for StatusClient {
    fn poll(&mut self) -> RunSignal {
        match self.fetch() {
            Ok(signal) => {
                if signal != self.last {
                    log::info!("Run signal changed from {} to {signal}", self.last);
                }
                self.last = signal;
            }
            Err(err) => {
                log::error!(
                    "Failed to read run signal, keeping {}: {err}",
                    self.last
                );
            }
        }
        self.last
    }
}

/// Wraps a source so that SIGINT or SIGTERM turns every later poll into `STOP`.
#[derive(Debug)]
pub struct InterruptAware<S> {
    inner: S,
    interrupted: Arc<AtomicBool>,
}

impl<S: SignalSource> InterruptAware<S> {
    pub fn new(inner: S, interrupted: Arc<AtomicBool>) -> Self {
        Self { inner, interrupted }
    }

    /// Register SIGINT and SIGTERM handlers that set a shared flag.
    pub fn register(inner: S) -> Result<Self, HealthError> {
        let interrupted = Arc::new(AtomicBool::new(false));
        for signal in [
            signal_hook::consts::SIGINT,
            signal_hook::consts::SIGTERM,
        ] {
            signal_hook::flag::register(signal, Arc::clone(&interrupted))
                .map_err(|source| HealthError::SignalHandler { signal, source })?;
        }
        Ok(Self::new(inner, interrupted))
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

impl<S: SignalSource> SignalSource for InterruptAware<S> {
    fn poll(&mut self) -> RunSignal {
        if self.interrupted() {
            log::info!("Interrupt received, stopping after the current scenario group");
            return RunSignal::Stop;
        }
        self.inner.poll()
    }
}

/// Signal source selected by the `[chaos]` section.
pub fn signal_source_from_config(config: &ChaosConfig) -> Box<dyn SignalSource> {
    if config.publish_status {
        let (port, _) = config.effective_port();
        Box::new(StatusClient::new(
            &config.signal_address,
            port,
            config.signal_state,
        ))
    } else {
        Box::new(ConstantSignal(RunSignal::Run))
    }
}

impl SignalSource for Box<dyn SignalSource> {
    fn poll(&mut self) -> RunSignal {
        (**self).poll()
    }
}
