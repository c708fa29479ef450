//! Run signal and per-process run session state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Externally settable control value polled between scenario groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunSignal {
    #[default]
    Run,
    Pause,
    Stop,
}

impl RunSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            RunSignal::Run => "RUN",
            RunSignal::Pause => "PAUSE",
            RunSignal::Stop => "STOP",
        }
    }

    pub fn is_stop(self) -> bool {
        matches!(self, RunSignal::Stop)
    }

    pub fn is_pause(self) -> bool {
        matches!(self, RunSignal::Pause)
    }
}

impl std::fmt::Display for RunSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunSignal {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RUN" => Ok(RunSignal::Run),
            "PAUSE" => Ok(RunSignal::Pause),
            "STOP" => Ok(RunSignal::Stop),
            other => Err(format!(
                "invalid run signal '{other}'. valid values: RUN, PAUSE, STOP"
            )),
        }
    }
}

/// How many iterations a run is allowed to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationLimit {
    Bounded(u64),
    /// Daemon mode: only a `STOP` signal ends the run.
    Unbounded,
}

impl IterationLimit {
    pub fn allows(self, iteration: u64) -> bool {
        match self {
            IterationLimit::Bounded(limit) => iteration < limit,
            IterationLimit::Unbounded => true,
        }
    }
}

impl std::fmt::Display for IterationLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IterationLimit::Bounded(limit) => write!(f, "{limit}"),
            IterationLimit::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// Mutable state for one run. Owned by the run controller and discarded at
/// process exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSession {
    pub run_id: String,
    pub iteration: u64,
    pub signal: RunSignal,
    pub failed_scenarios: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunSession {
    pub fn new(run_id: impl Into<String>, signal: RunSignal, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            iteration: 0,
            signal,
            failed_scenarios: Vec::new(),
            started_at,
            ended_at: None,
        }
    }

    pub fn record_failure(&mut self, scenario: impl Into<String>) {
        self.failed_scenarios.push(scenario.into());
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_scenarios.is_empty()
    }

    /// Loop condition, re-evaluated once per completed iteration.
    pub fn should_continue(&self, limit: IterationLimit) -> bool {
        limit.allows(self.iteration) && !self.signal.is_stop()
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.ended_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_signal_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&RunSignal::Pause).unwrap();
        assert_eq!(json, "\"PAUSE\"");
        let decoded: RunSignal = serde_json::from_str("\"STOP\"").unwrap();
        assert_eq!(decoded, RunSignal::Stop);
    }

    #[test]
    fn run_signal_parses_case_insensitively() {
        assert_eq!("run".parse::<RunSignal>(), Ok(RunSignal::Run));
        assert_eq!(" Pause ".parse::<RunSignal>(), Ok(RunSignal::Pause));
        let err = "halt".parse::<RunSignal>().expect_err("unknown signal");
        assert!(err.contains("RUN, PAUSE, STOP"));
    }

    #[test]
    fn bounded_limit_stops_at_configured_count() {
        let limit = IterationLimit::Bounded(3);
        assert!(limit.allows(0));
        assert!(limit.allows(2));
        assert!(!limit.allows(3));
    }

    #[test]
    fn unbounded_limit_never_stops() {
        assert!(IterationLimit::Unbounded.allows(u64::MAX - 1));
    }

    #[test]
    fn session_stops_on_stop_signal_even_with_iterations_left() {
        let mut session = RunSession::new("run", RunSignal::Run, Utc::now());
        assert!(session.should_continue(IterationLimit::Unbounded));
        session.signal = RunSignal::Stop;
        assert!(!session.should_continue(IterationLimit::Unbounded));
    }

    #[test]
    fn session_tracks_failures_in_order() {
        let mut session = RunSession::new("run", RunSignal::Run, Utc::now());
        assert!(!session.has_failures());
        session.record_failure("a.yaml");
        session.record_failure("b.yaml");
        assert_eq!(session.failed_scenarios, vec!["a.yaml", "b.yaml"]);
        assert!(session.has_failures());
    }
}
