//! Iteration loop and run-signal state machine.

use std::collections::BTreeMap;
use std::time::Duration;

use chaos_core::{Distribution, RunSession, ScenarioGroup, TuningsConfig};
use chaos_health::{HealthCheck, SignalSource};

use crate::error::ControllerError;
use crate::handlers::ScenarioHandler;
use crate::pacing::{ActionPacer, Sleeper};

pub struct RunController {
    pub distribution: Distribution,
    pub tunings: TuningsConfig,
    handlers: BTreeMap<&'static str, Box<dyn ScenarioHandler>>,
    signals: Box<dyn SignalSource>,
    sleeper: Box<dyn Sleeper>,
    health: Box<dyn HealthCheck>,
}

impl RunController {
    pub fn new(
        distribution: Distribution,
        tunings: TuningsConfig,
        signals: Box<dyn SignalSource>,
        sleeper: Box<dyn Sleeper>,
        health: Box<dyn HealthCheck>,
    ) -> Self {
        Self {
            distribution,
            tunings,
            handlers: BTreeMap::new(),
            signals,
            sleeper,
            health,
        }
    }

    pub fn with_handler(mut self, handler: Box<dyn ScenarioHandler>) -> Self {
        self.handlers.insert(handler.scenario_type(), handler);
        self
    }

    pub fn handled_types(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    fn wait(&self) -> Duration {
        Duration::from_secs(self.tunings.wait_duration)
    }

    /// Poll the signal, sleeping through `PAUSE` until it turns into `RUN`
    /// or `STOP`.
    fn poll_signal(&mut self, session: &mut RunSession) {
        session.signal = self.signals.poll();
        while session.signal.is_pause() {
            log::info!(
                "Pausing run, waiting for {} seconds and will re-poll signal",
                self.tunings.wait_duration
            );
            self.sleeper.sleep(self.wait());
            session.signal = self.signals.poll();
        }
    }

    /// Run every configured group once per iteration until the iteration
    /// limit is reached or a `STOP` signal is observed. Handler errors end
    /// the run; plugin failures are accumulated in the session instead.
    pub fn run(
        &mut self,
        groups: &[ScenarioGroup],
        session: &mut RunSession,
    ) -> Result<(), ControllerError> {
        let limit = self.tunings.iteration_limit();
        log::info!("Starting run {} (iterations: {limit})", session.run_id);

        while session.should_continue(limit) {
            log::info!("Executing scenarios for iteration {}", session.iteration);
            for group in groups {
                self.poll_signal(session);
                if session.signal.is_stop() {
                    log::info!("Received STOP signal; ending run");
                    break;
                }

                let Some(handler) = self.handlers.get(group.scenario_type.as_str()) else {
                    log::info!(
                        "Scenario type {} is not handled by this engine, ignoring",
                        group.scenario_type
                    );
                    continue;
                };
                if group.entries.is_empty() {
                    continue;
                }
                if let Some(required) = handler.required_distribution() {
                    if required != self.distribution {
                        return Err(ControllerError::UnsupportedDistribution {
                            scenario_type: group.scenario_type.clone(),
                            required,
                            configured: self.distribution,
                        });
                    }
                }

                let pacer =
                    ActionPacer::new(self.wait(), self.sleeper.as_ref(), self.health.as_ref());
                handler
                    .run(&group.entries, session, &pacer)
                    .map_err(|source| ControllerError::Handler {
                        scenario_type: group.scenario_type.clone(),
                        source,
                    })?;
            }
            session.iteration += 1;
            log::info!("");
        }
        Ok(())
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("distribution", &self.distribution)
            .field("tunings", &self.tunings)
            .field("handlers", &self.handled_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use chaos_core::{RunSignal, ScenarioEntry};
    use chaos_health::NoopHealthCheck;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Replays scripted signals, then repeats the last one forever.
    struct ScriptedSignals {
        script: VecDeque<RunSignal>,
        last: RunSignal,
        polls: Rc<RefCell<usize>>,
    }

    impl ScriptedSignals {
        fn new(script: &[RunSignal], then: RunSignal) -> (Self, Rc<RefCell<usize>>) {
            let polls = Rc::new(RefCell::new(0));
            (
                Self {
                    script: script.iter().copied().collect(),
                    last: then,
                    polls: Rc::clone(&polls),
                },
                polls,
            )
        }
    }

    impl SignalSource for ScriptedSignals {
        fn poll(&mut self) -> RunSignal {
            *self.polls.borrow_mut() += 1;
            self.script.pop_front().unwrap_or(self.last)
        }
    }

    #[derive(Clone, Default)]
    struct SharedSleeper(Rc<RefCell<Vec<Duration>>>);

    impl Sleeper for SharedSleeper {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    struct CountingHandler {
        scenario_type: &'static str,
        required: Option<Distribution>,
        runs: Rc<RefCell<Vec<u64>>>,
    }

    impl ScenarioHandler for CountingHandler {
        fn scenario_type(&self) -> &'static str {
            self.scenario_type
        }

        fn required_distribution(&self) -> Option<Distribution> {
            self.required
        }

        fn run(
            &self,
            _entries: &[ScenarioEntry],
            session: &mut RunSession,
            pacer: &ActionPacer<'_>,
        ) -> Result<(), HandlerError> {
            pacer.pace(|| Ok::<_, HandlerError>(()))?;
            self.runs.borrow_mut().push(session.iteration);
            Ok(())
        }
    }

    fn tunings(iterations: u64, daemon_mode: bool) -> TuningsConfig {
        TuningsConfig {
            wait_duration: 5,
            iterations,
            daemon_mode,
        }
    }

    fn group(scenario_type: &str) -> ScenarioGroup {
        ScenarioGroup {
            scenario_type: scenario_type.to_string(),
            entries: vec![ScenarioEntry::Inline(json!([]))],
        }
    }

    fn controller(
        tunings: TuningsConfig,
        signals: ScriptedSignals,
        sleeper: &SharedSleeper,
    ) -> (RunController, Rc<RefCell<Vec<u64>>>) {
        let runs = Rc::new(RefCell::new(Vec::new()));
        let controller = RunController::new(
            Distribution::Kubernetes,
            tunings,
            Box::new(signals),
            Box::new(sleeper.clone()),
            Box::new(NoopHealthCheck),
        )
        .with_handler(Box::new(CountingHandler {
            scenario_type: "test_scenarios",
            required: None,
            runs: Rc::clone(&runs),
        }));
        (controller, runs)
    }

    fn session() -> RunSession {
        RunSession::new("run", RunSignal::Run, chrono::Utc::now())
    }

    #[test]
    fn bounded_run_executes_exact_iteration_count() {
        let (signals, _) = ScriptedSignals::new(&[], RunSignal::Run);
        let sleeper = SharedSleeper::default();
        let (mut controller, runs) = controller(tunings(3, false), signals, &sleeper);
        let mut session = session();

        controller
            .run(&[group("test_scenarios")], &mut session)
            .expect("run");

        assert_eq!(*runs.borrow(), vec![0, 1, 2]);
        assert_eq!(session.iteration, 3);
        assert_eq!(sleeper.0.borrow().len(), 3);
    }

    #[test]
    fn daemon_mode_runs_until_stop() {
        let script = vec![RunSignal::Run; 25];
        let (signals, polls) = ScriptedSignals::new(&script, RunSignal::Stop);
        let sleeper = SharedSleeper::default();
        let (mut controller, runs) = controller(tunings(1, true), signals, &sleeper);
        let mut session = session();

        controller
            .run(&[group("test_scenarios")], &mut session)
            .expect("run");

        assert_eq!(runs.borrow().len(), 25);
        assert_eq!(*polls.borrow(), 26);
        assert_eq!(session.signal, RunSignal::Stop);
        assert_eq!(session.iteration, 26);
    }

    #[test]
    fn pause_holds_group_progress_until_run() {
        let (signals, polls) = ScriptedSignals::new(
            &[RunSignal::Pause, RunSignal::Pause, RunSignal::Pause],
            RunSignal::Run,
        );
        let sleeper = SharedSleeper::default();
        let (mut controller, runs) = controller(tunings(1, false), signals, &sleeper);
        let mut session = session();

        controller
            .run(&[group("test_scenarios")], &mut session)
            .expect("run");

        assert_eq!(*polls.borrow(), 4);
        assert_eq!(runs.borrow().len(), 1);
        // three pause waits, then the pacing wait of the single action
        assert_eq!(*sleeper.0.borrow(), vec![Duration::from_secs(5); 4]);
    }

    #[test]
    fn pause_then_stop_runs_nothing() {
        let (signals, _) = ScriptedSignals::new(&[RunSignal::Pause], RunSignal::Stop);
        let sleeper = SharedSleeper::default();
        let (mut controller, runs) = controller(tunings(2, false), signals, &sleeper);
        let mut session = session();

        controller
            .run(&[group("test_scenarios")], &mut session)
            .expect("run");

        assert!(runs.borrow().is_empty());
        assert_eq!(session.iteration, 1);
    }

    #[test]
    fn stop_mid_iteration_skips_remaining_groups() {
        let (signals, _) = ScriptedSignals::new(&[RunSignal::Run], RunSignal::Stop);
        let sleeper = SharedSleeper::default();
        let (mut controller, runs) = controller(tunings(5, false), signals, &sleeper);
        let mut session = session();

        controller
            .run(
                &[group("test_scenarios"), group("test_scenarios")],
                &mut session,
            )
            .expect("run");

        assert_eq!(*runs.borrow(), vec![0]);
        assert!(session.signal.is_stop());
    }

    #[test]
    fn unhandled_scenario_types_are_ignored() {
        let (signals, _) = ScriptedSignals::new(&[], RunSignal::Run);
        let sleeper = SharedSleeper::default();
        let (mut controller, runs) = controller(tunings(1, false), signals, &sleeper);
        let mut session = session();

        controller
            .run(
                &[group("zone_outages"), group("test_scenarios")],
                &mut session,
            )
            .expect("run");

        assert_eq!(runs.borrow().len(), 1);
    }

    fn openshift_only_controller() -> (RunController, Rc<RefCell<Vec<u64>>>) {
        let (signals, _) = ScriptedSignals::new(&[], RunSignal::Run);
        let runs = Rc::new(RefCell::new(Vec::new()));
        let controller = RunController::new(
            Distribution::Kubernetes,
            tunings(1, false),
            Box::new(signals),
            Box::new(SharedSleeper::default()),
            Box::new(NoopHealthCheck),
        )
        .with_handler(Box::new(CountingHandler {
            scenario_type: "time_scenarios",
            required: Some(Distribution::Openshift),
            runs: Rc::clone(&runs),
        }));
        (controller, runs)
    }

    #[test]
    fn empty_group_is_skipped_before_distribution_check() {
        let (mut controller, runs) = openshift_only_controller();
        let empty = ScenarioGroup {
            scenario_type: "time_scenarios".to_string(),
            entries: Vec::new(),
        };
        let mut session = session();

        controller.run(&[empty], &mut session).expect("empty group is skipped");

        assert!(runs.borrow().is_empty());
        assert_eq!(session.iteration, 1);
    }

    #[test]
    fn distribution_restricted_handler_rejects_other_distributions() {
        let (mut controller, runs) = openshift_only_controller();

        let err = controller
            .run(&[group("time_scenarios")], &mut session())
            .expect_err("openshift only");

        assert!(matches!(
            err,
            ControllerError::UnsupportedDistribution {
                required: Distribution::Openshift,
                configured: Distribution::Kubernetes,
                ..
            }
        ));
        assert!(runs.borrow().is_empty());
    }
}
