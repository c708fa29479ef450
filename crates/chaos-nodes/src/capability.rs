use std::time::Duration;

use crate::action::NodeAction;
use crate::error::NodeActionError;

/// Node-level disruptions a provider can perform. Every provider implements
/// the generic pair (`node_crash`, `stop_kubelet`); the remaining operations
/// answer [`NodeActionError::Unsupported`] unless the provider overrides them.
pub trait NodeActions {
    fn provider(&self) -> &'static str;

    fn node_crash(&self, run_count: u32, node: &str, timeout: Duration)
        -> Result<(), NodeActionError>;

    fn stop_kubelet(
        &self,
        run_count: u32,
        node: &str,
        timeout: Duration,
    ) -> Result<(), NodeActionError>;

    fn node_start(&self, _run_count: u32, _node: &str, _timeout: Duration) -> Result<(), NodeActionError> {
        Err(self.unsupported(NodeAction::NodeStartScenario))
    }

    fn node_stop(&self, _run_count: u32, _node: &str, _timeout: Duration) -> Result<(), NodeActionError> {
        Err(self.unsupported(NodeAction::NodeStopScenario))
    }

    fn node_stop_start(
        &self,
        _run_count: u32,
        _node: &str,
        _timeout: Duration,
    ) -> Result<(), NodeActionError> {
        Err(self.unsupported(NodeAction::NodeStopStartScenario))
    }

    fn node_termination(
        &self,
        _run_count: u32,
        _node: &str,
        _timeout: Duration,
    ) -> Result<(), NodeActionError> {
        Err(self.unsupported(NodeAction::NodeTerminationScenario))
    }

    fn node_reboot(&self, _run_count: u32, _node: &str, _timeout: Duration) -> Result<(), NodeActionError> {
        Err(self.unsupported(NodeAction::NodeRebootScenario))
    }

    fn stop_start_kubelet(
        &self,
        _run_count: u32,
        _node: &str,
        _timeout: Duration,
    ) -> Result<(), NodeActionError> {
        Err(self.unsupported(NodeAction::StopStartKubeletScenario))
    }

    fn helper_node_stop_start(
        &self,
        _run_count: u32,
        _helper_ip: &str,
        _timeout: Duration,
    ) -> Result<(), NodeActionError> {
        Err(self.unsupported(NodeAction::HelperNodeStopStartScenario))
    }

    fn helper_node_service_status(
        &self,
        _helper_ip: &str,
        _service: &str,
        _ssh_private_key: &str,
        _timeout: Duration,
    ) -> Result<(), NodeActionError> {
        Err(NodeActionError::Unsupported {
            provider: self.provider(),
            action: "helper_node_service_status",
        })
    }

    fn unsupported(&self, action: NodeAction) -> NodeActionError {
        NodeActionError::Unsupported {
            provider: self.provider(),
            action: action.as_str(),
        }
    }
}

/// Route a node-targeted action to the matching capability. The helper-node
/// action targets an IP rather than a node and is handled by the dispatcher.
pub fn perform(
    provider: &dyn NodeActions,
    action: NodeAction,
    run_count: u32,
    node: &str,
    timeout: Duration,
) -> Result<(), NodeActionError> {
    match action {
        NodeAction::NodeStartScenario => provider.node_start(run_count, node, timeout),
        NodeAction::NodeStopScenario => provider.node_stop(run_count, node, timeout),
        NodeAction::NodeStopStartScenario => provider.node_stop_start(run_count, node, timeout),
        NodeAction::NodeTerminationScenario => provider.node_termination(run_count, node, timeout),
        NodeAction::NodeRebootScenario => provider.node_reboot(run_count, node, timeout),
        NodeAction::StopStartKubeletScenario => {
            provider.stop_start_kubelet(run_count, node, timeout)
        }
        NodeAction::StopKubeletScenario => provider.stop_kubelet(run_count, node, timeout),
        NodeAction::NodeCrashScenario => provider.node_crash(run_count, node, timeout),
        NodeAction::HelperNodeStopStartScenario => Err(provider.unsupported(action)),
    }
}
