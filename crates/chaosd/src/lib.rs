//! Chaos run daemon: iteration loop, scenario handlers and reporting.

pub mod controller;
pub mod error;
pub mod handlers;
pub mod logger;
pub mod pacing;

pub use controller::*;
pub use error::*;
pub use handlers::*;
pub use pacing::*;

#[cfg(test)]
mod tests {
    use super::{ActionPacer, ControllerError, PluginScenarioHandler, RunController, ThreadSleeper};
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_daemon_types() {
        let _ = TypeId::of::<RunController>();
        let _ = TypeId::of::<ControllerError>();
        let _ = TypeId::of::<PluginScenarioHandler>();
        let _ = TypeId::of::<ThreadSleeper>();
        let _ = TypeId::of::<ActionPacer<'static>>();
    }
}
