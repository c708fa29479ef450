use chaos_core::NodeScenarioConfig;

use crate::action::NodeAction;
use crate::capability::{perform, NodeActions};
use crate::error::{DispatchError, NodeActionError};
use crate::registry::DispatchContext;
use crate::resolver::NodeResolver;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Nodes (or helper IPs) the action ran against, in order.
    pub targets: Vec<String>,
    pub skipped: usize,
}

/// Run one action of a node scenario against every resolved node.
///
/// Each comma-separated name is resolved independently, then every resolved
/// node is processed in sequence. Resolution, configuration and provider
/// errors propagate; actions outside the generic subset (in generic mode) and
/// unrecognized identifiers are skipped with a notice.
pub fn dispatch_action(
    action_id: &str,
    config: &NodeScenarioConfig,
    provider: &dyn NodeActions,
    context: DispatchContext,
    resolver: &dyn NodeResolver,
) -> Result<DispatchReport, DispatchError> {
    let action = NodeAction::parse(action_id);
    let mut report = DispatchReport::default();

    for name in config.node_names() {
        let nodes = resolver.resolve(&name, config.label_selector(), config.instance_count)?;
        for node in nodes {
            if context.generic_only && !action.is_some_and(NodeAction::is_generic) {
                log::info!(
                    "Scenario: {action_id} is not set up for generic cloud type, skipping action"
                );
                report.skipped += 1;
                continue;
            }
            let Some(action) = action else {
                log::info!("There is no node action that matches {action_id}, skipping scenario");
                report.skipped += 1;
                continue;
            };

            if action == NodeAction::HelperNodeStopStartScenario {
                let helper_ip = run_helper_action(action_id, config, provider)?;
                report.targets.push(helper_ip);
                continue;
            }

            perform(provider, action, config.runs, &node, config.timeout()).map_err(|source| {
                DispatchError::Action {
                    action: action_id.to_string(),
                    target: node.clone(),
                    source,
                }
            })?;
            report.targets.push(node);
        }
    }
    Ok(report)
}

fn run_helper_action(
    action_id: &str,
    config: &NodeScenarioConfig,
    provider: &dyn NodeActions,
) -> Result<String, DispatchError> {
    if provider.provider() != "openstack" {
        return Err(DispatchError::HelperRequiresOpenstack {
            action: action_id.to_string(),
            provider: provider.provider(),
        });
    }
    let helper_ip = required(action_id, "helper_node_ip", config.helper_node_ip.as_deref())?;
    let service = required(action_id, "service", config.service.as_deref())?;

    let wrap = |source: NodeActionError| DispatchError::Action {
        action: action_id.to_string(),
        target: helper_ip.to_string(),
        source,
    };
    provider
        .helper_node_stop_start(config.runs, helper_ip, config.timeout())
        .map_err(wrap)?;
    provider
        .helper_node_service_status(helper_ip, service, &config.ssh_private_key, config.timeout())
        .map_err(wrap)?;
    Ok(helper_ip.to_string())
}

fn required<'a>(
    action_id: &str,
    field: &'static str,
    value: Option<&'a str>,
) -> Result<&'a str, DispatchError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DispatchError::MissingField {
            action: action_id.to_string(),
            field,
        })
}
