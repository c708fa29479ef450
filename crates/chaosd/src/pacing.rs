//! Wait-and-verify bracket around each injected action.

use std::time::Duration;

use chaos_health::HealthCheck;
use chrono::Utc;

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records a start time, runs the action, sleeps `wait`, records an end time
/// and hands the window to the health check. The sleep is never shortened.
pub struct ActionPacer<'a> {
    pub wait: Duration,
    sleeper: &'a dyn Sleeper,
    health: &'a dyn HealthCheck,
}

impl<'a> ActionPacer<'a> {
    pub fn new(wait: Duration, sleeper: &'a dyn Sleeper, health: &'a dyn HealthCheck) -> Self {
        Self {
            wait,
            sleeper,
            health,
        }
    }

    /// An action that returns an error is not paced; the error goes straight
    /// back to the caller.
    pub fn pace<T, E>(&self, action: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let start = Utc::now().timestamp();
        let value = action()?;
        log::info!("Waiting for the specified duration: {}s", self.wait.as_secs());
        self.sleeper.sleep(self.wait);
        let end = Utc::now().timestamp();
        let report = self.health.evaluate(start, end);
        if report.is_failure() {
            log::error!("Health check reported problems for window {start}..{end}");
        }
        Ok(value)
    }
}

impl std::fmt::Debug for ActionPacer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionPacer").field("wait", &self.wait).finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chaos_health::HealthReport;
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    pub(crate) struct RecordingSleeper {
        pub sleeps: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct RecordingHealth {
        pub windows: RefCell<Vec<(i64, i64)>>,
    }

    impl HealthCheck for RecordingHealth {
        fn evaluate(&self, start_epoch: i64, end_epoch: i64) -> HealthReport {
            self.windows.borrow_mut().push((start_epoch, end_epoch));
            HealthReport {
                healthy: Some(false),
                ..HealthReport::default()
            }
        }
    }

    #[test]
    fn successful_action_sleeps_then_checks_health() {
        let sleeper = RecordingSleeper::default();
        let health = RecordingHealth::default();
        let pacer = ActionPacer::new(Duration::from_secs(7), &sleeper, &health);

        let value = pacer.pace(|| Ok::<_, String>(42)).expect("action succeeds");

        assert_eq!(value, 42);
        assert_eq!(*sleeper.sleeps.borrow(), vec![Duration::from_secs(7)]);
        let windows = health.windows.borrow();
        assert_eq!(windows.len(), 1);
        assert!(windows[0].0 <= windows[0].1);
    }

    #[test]
    fn failed_action_skips_wait_and_health_check() {
        let sleeper = RecordingSleeper::default();
        let health = RecordingHealth::default();
        let pacer = ActionPacer::new(Duration::from_secs(7), &sleeper, &health);

        let err = pacer
            .pace(|| Err::<(), _>("provider failed".to_string()))
            .expect_err("action fails");

        assert_eq!(err, "provider failed");
        assert!(sleeper.sleeps.borrow().is_empty());
        assert!(health.windows.borrow().is_empty());
    }
}
