//! Scenario-type handlers invoked by the run controller.

use chaos_core::{
    load_node_scenarios, Distribution, RunSession, ScenarioEntry, Validate, ValidationLevel,
    NODE_SCENARIOS, PLUGIN_SCENARIOS,
};
use chaos_nodes::{dispatch_action, NodeResolver, ProviderFactory};
use chaos_plugins::{run_plan, StepContext, StepRegistry, StepResult};

use crate::error::HandlerError;
use crate::pacing::ActionPacer;

pub trait ScenarioHandler {
    fn scenario_type(&self) -> &'static str;

    /// Distribution this scenario type is limited to, if any.
    fn required_distribution(&self) -> Option<Distribution> {
        None
    }

    fn run(
        &self,
        entries: &[ScenarioEntry],
        session: &mut RunSession,
        pacer: &ActionPacer<'_>,
    ) -> Result<(), HandlerError>;
}

pub struct NodeScenarioHandler<F, R> {
    pub providers: F,
    pub resolver: R,
}

impl<F: ProviderFactory, R: NodeResolver> NodeScenarioHandler<F, R> {
    pub fn new(providers: F, resolver: R) -> Self {
        Self {
            providers,
            resolver,
        }
    }
}

impl<F: ProviderFactory, R: NodeResolver> ScenarioHandler for NodeScenarioHandler<F, R> {
    fn scenario_type(&self) -> &'static str {
        NODE_SCENARIOS
    }

    fn run(
        &self,
        entries: &[ScenarioEntry],
        _session: &mut RunSession,
        pacer: &ActionPacer<'_>,
    ) -> Result<(), HandlerError> {
        log::info!("Running node scenarios");
        for (index, entry) in entries.iter().enumerate() {
            for config in load_node_scenarios(entry, index)? {
                for issue in config.validate() {
                    if issue.level == ValidationLevel::Warning {
                        log::warn!("{}: {}", issue.code, issue.message);
                    }
                }
                let selected = self.providers.select(&config)?;
                for action in &config.actions {
                    let report = pacer.pace(|| {
                        dispatch_action(
                            action,
                            &config,
                            selected.actions.as_ref(),
                            selected.context,
                            &self.resolver,
                        )
                    })?;
                    log::info!(
                        "Node action {action} on {} finished (targets: {}, skipped: {})",
                        selected.actions.provider(),
                        report.targets.join(", "),
                        report.skipped
                    );
                }
            }
        }
        Ok(())
    }
}

pub struct PluginScenarioHandler {
    pub registry: StepRegistry,
    pub context: StepContext,
}

impl PluginScenarioHandler {
    pub fn new(registry: StepRegistry, context: StepContext) -> Self {
        Self { registry, context }
    }

    fn run_entry(&self, index: usize, entry: &ScenarioEntry) -> Result<Vec<StepResult>, HandlerError> {
        let (label, document) = entry.load_document(index)?;
        Ok(run_plan(&self.registry, &label, &document, &self.context)?)
    }
}

impl std::fmt::Debug for PluginScenarioHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginScenarioHandler")
            .field("steps", &self.registry.ids())
            .field("context", &self.context)
            .finish()
    }
}

impl ScenarioHandler for PluginScenarioHandler {
    fn scenario_type(&self) -> &'static str {
        PLUGIN_SCENARIOS
    }

    /// A failing plan is recorded in the session and ends this group; the
    /// remaining entries of the group are not run.
    fn run(
        &self,
        entries: &[ScenarioEntry],
        session: &mut RunSession,
        pacer: &ActionPacer<'_>,
    ) -> Result<(), HandlerError> {
        for (index, entry) in entries.iter().enumerate() {
            let label = entry.source_label(index);
            let outcome = pacer.pace(|| self.run_entry(index, entry));
            match outcome {
                Ok(results) => {
                    log::info!("Plugin scenario {label} finished ({} steps)", results.len());
                }
                Err(err) => {
                    log::error!("Plugin scenario {label} failed: {err}");
                    session.record_failure(label);
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
