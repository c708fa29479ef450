pub mod pods;
pub mod run_python;

pub use pods::*;
pub use run_python::*;

use crate::error::RegistryError;
use crate::registry::StepRegistry;
use crate::step::register;

/// The steps available to plugin scenario files.
pub fn builtin_registry() -> Result<StepRegistry, RegistryError> {
    StepRegistry::new(vec![
        register(KillPodsStep::default()),
        register(WaitForPodsStep::default()),
        register(RunPythonStep::default()),
    ])
}
