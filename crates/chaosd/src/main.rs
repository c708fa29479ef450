use anyhow::Context;
use chaos_core::{
    load_node_scenarios, load_run_config, ConfigError, RunConfig, RunSession, RunSignal,
    Validate, ValidationIssue, ValidationLevel, DEFAULT_STATUS_PORT, NODE_SCENARIOS,
    PLUGIN_SCENARIOS,
};
use chaos_health::{
    health_check_from_config, signal_source_from_config, AlertWindow, HealthError,
    InterruptAware, KubeBurnerAlerts,
};
use chaos_kube::{KubeCli, KubeNodes};
use chaos_nodes::{InventoryResolver, ProviderRegistry};
use chaos_plugins::{builtin_registry, validate_plan, RegistryError, StepContext, StepRegistry};
use chaosd::logger::{self, REPORT_FILE};
use chaosd::{
    ControllerError, LoggerError, NodeScenarioHandler, PluginScenarioHandler, RunController,
    ThreadSleeper,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "config/chaos.toml";
/// Set through the downward API when the engine runs inside the cluster.
const NODE_NAME_ENV: &str = "NODE_NAME";

#[derive(Debug, Parser)]
#[command(name = "chaosd", version, about = "Inject chaos scenarios into a Kubernetes or OpenShift cluster")]
struct Cli {
    #[command(subcommand)]
    command: Option<CliCommand>,
    /// Run configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum CliCommand {
    /// Execute the configured scenarios (default).
    Run,
    /// Print the JSON schema for plugin scenario files.
    Schema,
    /// Check the configuration and every referenced scenario file.
    Validate,
}

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error(transparent)]
    Logger(#[from] LoggerError),
    #[error("failed to load run config at {path}: {source}")]
    LoadConfig {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
    #[error("{0}")]
    InvalidConfig(String),
    #[error("cannot read the kubeconfig file at {path}, please check")]
    MissingKubeconfig { path: PathBuf },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Signals(#[from] HealthError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("failed to render plugin schema: {0}")]
    Schema(#[from] serde_json::Error),
    #[error("scenario validation failed: {0:#}")]
    Scenarios(anyhow::Error),
    #[error("post scenarios are still failing at the end of all iterations: {0}")]
    FailedScenarios(String),
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("{err}");
        eprintln!("chaosd failed: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), MainError> {
    match cli.command.unwrap_or(CliCommand::Run) {
        CliCommand::Schema => print_schema(),
        CliCommand::Validate => {
            logger::init(Path::new(REPORT_FILE))?;
            run_validate(&cli.config)
        }
        CliCommand::Run => {
            logger::init(Path::new(REPORT_FILE))?;
            run_chaos(&cli.config)
        }
    }
}

fn print_schema() -> Result<(), MainError> {
    let registry = builtin_registry()?;
    println!("{}", serde_json::to_string_pretty(&registry.schema_document())?);
    Ok(())
}

fn load_config(path: &Path) -> Result<RunConfig, MainError> {
    let config = load_run_config(path).map_err(|source| MainError::LoadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    check_issues(&config.validate())?;
    Ok(config)
}

fn check_issues(issues: &[ValidationIssue]) -> Result<(), MainError> {
    for issue in issues.iter().filter(|issue| issue.level == ValidationLevel::Warning) {
        log::warn!("{}: {}", issue.code, issue.message);
    }

    let errors = issues
        .iter()
        .filter(|issue| issue.level == ValidationLevel::Error)
        .map(|issue| format!("{}: {}", issue.code, issue.message))
        .collect::<Vec<_>>();
    if errors.is_empty() {
        return Ok(());
    }
    Err(MainError::InvalidConfig(format!(
        "run config validation failed ({})",
        errors.join("; ")
    )))
}

fn run_uuid(configured: Option<&str>) -> String {
    match configured.map(str::trim) {
        Some(uuid) if !uuid.is_empty() => {
            log::info!("Using the uuid defined by the user for the run: {uuid}");
            uuid.to_string()
        }
        _ => {
            let uuid = uuid::Uuid::new_v4().to_string();
            log::info!("Generated a uuid for the run: {uuid}");
            uuid
        }
    }
}

fn failure_summary(failed: &[String]) -> Option<String> {
    if failed.is_empty() {
        None
    } else {
        Some(failed.join(", "))
    }
}

/// Load every scenario file the config references and check it without
/// touching the cluster. Returns the number of entries checked.
fn validate_scenario_files(config: &RunConfig, registry: &StepRegistry) -> anyhow::Result<usize> {
    let mut checked = 0;
    for group in &config.chaos.scenarios {
        for (index, entry) in group.entries.iter().enumerate() {
            let label = entry.source_label(index);
            match group.scenario_type.as_str() {
                NODE_SCENARIOS => {
                    let scenarios = load_node_scenarios(entry, index)
                        .with_context(|| format!("node scenario {label}"))?;
                    for scenario in &scenarios {
                        check_issues(&scenario.validate())
                            .map_err(|err| anyhow::anyhow!("{err}"))
                            .with_context(|| format!("node scenario {label}"))?;
                    }
                }
                PLUGIN_SCENARIOS => {
                    let (label, document) = entry
                        .load_document(index)
                        .with_context(|| format!("plugin scenario {label}"))?;
                    validate_plan(registry, &label, &document)?;
                }
                other => {
                    log::info!("Scenario type {other} is not handled by this engine, skipping {label}");
                    continue;
                }
            }
            checked += 1;
        }
    }
    Ok(checked)
}

fn run_validate(config_path: &Path) -> Result<(), MainError> {
    let config = load_config(config_path)?;
    let registry = builtin_registry()?;
    let checked = validate_scenario_files(&config, &registry).map_err(MainError::Scenarios)?;
    log::info!(
        "Config {} is valid ({} scenario entries checked)",
        config_path.display(),
        checked
    );
    Ok(())
}

fn run_chaos(config_path: &Path) -> Result<(), MainError> {
    let config = load_config(config_path)?;

    let kubeconfig = config.chaos.kubeconfig();
    if !kubeconfig.is_file() {
        return Err(MainError::MissingKubeconfig { path: kubeconfig });
    }
    log::info!("Initializing client to talk to the Kubernetes cluster");
    let cli = KubeCli::default().with_kubeconfig(&kubeconfig);

    let (port, fell_back) = config.chaos.effective_port();
    if fell_back {
        log::info!(
            "Using port {DEFAULT_STATUS_PORT} as {} isn't a valid port number",
            config.chaos.port
        );
    }
    if config.chaos.publish_status {
        log::info!(
            "Reading run status from http://{}:{port}",
            config.chaos.signal_address
        );
    }

    log::info!("Fetching cluster info");
    match cli.cluster_version() {
        Some(version) => log::info!("{version}"),
        None => log::info!("Cluster version CRD not detected, skipping"),
    }
    match cli.server_url() {
        Ok(url) => log::info!("Server URL: {url}"),
        Err(err) => log::warn!("Could not read the server URL: {err}"),
    }

    let uuid = run_uuid(config.performance_monitoring.uuid.as_deref());
    let limit = config.tunings.iteration_limit();
    if config.tunings.daemon_mode {
        log::info!("Daemon mode enabled, chaos will run until a STOP signal; ignoring the iterations set");
    } else {
        log::info!("Daemon mode not enabled, will run through {limit} iterations");
    }

    let mut nodes = KubeNodes::new(cli.clone());
    if let Ok(own_node) = env::var(NODE_NAME_ENV) {
        if !own_node.trim().is_empty() {
            nodes = nodes.with_excluded_node(own_node.trim());
        }
    }
    let plugin_context = StepContext {
        kubeconfig_path: Some(kubeconfig.clone()),
    };

    let signals = InterruptAware::register(signal_source_from_config(&config.chaos))?;
    let mut controller = RunController::new(
        config.chaos.distribution,
        config.tunings.clone(),
        Box::new(signals),
        Box::new(ThreadSleeper),
        health_check_from_config(&config.cerberus),
    )
    .with_handler(Box::new(NodeScenarioHandler::new(
        ProviderRegistry::new(nodes.clone()),
        InventoryResolver::new(nodes),
    )))
    .with_handler(Box::new(PluginScenarioHandler::new(
        builtin_registry()?,
        plugin_context,
    )));

    let initial_signal = if config.chaos.publish_status {
        config.chaos.signal_state
    } else {
        RunSignal::Run
    };
    let mut session = RunSession::new(uuid.clone(), initial_signal, Utc::now());
    controller.run(&config.chaos.scenarios, &mut session)?;
    session.finish(Utc::now());

    if let Some(alerts) = KubeBurnerAlerts::from_config(&config.performance_monitoring) {
        log::info!("Alerts checking is enabled");
        let window = AlertWindow {
            uuid: uuid.clone(),
            start_epoch: session.started_at.timestamp(),
            end_epoch: session.ended_at.unwrap_or_else(Utc::now).timestamp(),
        };
        match alerts.check(&window) {
            Ok(output) if !output.trim().is_empty() => log::info!("{}", output.trim()),
            Ok(_) => {}
            Err(err) => log::error!("Alert check failed: {err}"),
        }
    }

    if let Some(failed) = failure_summary(&session.failed_scenarios) {
        return Err(MainError::FailedScenarios(failed));
    }

    let report = env::current_dir()
        .map(|dir| dir.join(REPORT_FILE))
        .unwrap_or_else(|_| PathBuf::from(REPORT_FILE));
    log::info!(
        "Successfully finished running chaos scenarios. UUID for the run: {uuid}. Report generated at {}. Exiting",
        report.display()
    );
    Ok(())
}
