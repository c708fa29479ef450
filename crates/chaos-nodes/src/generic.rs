use std::time::Duration;

use chaos_kube::{KubeError, KubeNodes};

use crate::capability::NodeActions;
use crate::error::NodeActionError;

pub const DEFAULT_DEBUG_IMAGE: &str = "registry.access.redhat.com/ubi9/ubi-minimal";

const CRASH_SCRIPT: &str = "echo c > /proc/sysrq-trigger";
const STOP_KUBELET_SCRIPT: &str = "systemctl stop kubelet";

/// Provider-independent disruptions run through a privileged debug pod on the
/// target node.
#[derive(Debug, Clone)]
pub struct GenericNodeScenarios {
    pub nodes: KubeNodes,
    pub debug_image: String,
}

impl GenericNodeScenarios {
    pub fn new(nodes: KubeNodes) -> Self {
        Self {
            nodes,
            debug_image: DEFAULT_DEBUG_IMAGE.to_string(),
        }
    }
}

impl NodeActions for GenericNodeScenarios {
    fn provider(&self) -> &'static str {
        "generic"
    }

    fn node_crash(&self, run_count: u32, node: &str, _timeout: Duration) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            log::info!("Starting node_crash_scenario injection on {node}");
            match self.nodes.debug_node(node, &self.debug_image, CRASH_SCRIPT) {
                Ok(_) => {}
                // The debug session dies with the kernel.
                Err(KubeError::CommandFailed { .. }) => {}
                Err(err) => return Err(err.into()),
            }
            log::info!("Node crash triggered on {node}");
        }
        Ok(())
    }

    fn stop_kubelet(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            log::info!("Starting stop_kubelet_scenario injection on {node}");
            self.nodes
                .debug_node(node, &self.debug_image, STOP_KUBELET_SCRIPT)?;
            self.nodes.wait_for_not_ready(node, timeout)?;
            log::info!("Kubelet on {node} is stopped and the node is NotReady");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_kube::KubeCli;

    #[test]
    fn generic_provider_reports_its_tag() {
        let provider = GenericNodeScenarios::new(KubeNodes::default());
        assert_eq!(provider.provider(), "generic");
        assert_eq!(provider.debug_image, DEFAULT_DEBUG_IMAGE);
    }

    #[test]
    fn crash_tolerates_debug_session_loss() {
        let provider = GenericNodeScenarios::new(KubeNodes::new(KubeCli::new("false")));
        provider
            .node_crash(1, "worker-0", Duration::from_secs(1))
            .expect("lost debug session counts as crash");
    }

    #[test]
    fn crash_propagates_missing_kubectl() {
        let provider =
            GenericNodeScenarios::new(KubeNodes::new(KubeCli::new("/definitely/missing/kubectl")));
        let err = provider
            .node_crash(1, "worker-0", Duration::from_secs(1))
            .expect_err("spawn failure");
        assert!(matches!(err, NodeActionError::Kube(KubeError::Io { .. })));
    }

    #[test]
    fn stop_kubelet_propagates_debug_failures() {
        let provider = GenericNodeScenarios::new(KubeNodes::new(KubeCli::new("false")));
        let err = provider
            .stop_kubelet(1, "worker-0", Duration::from_secs(1))
            .expect_err("debug pod failed");
        assert!(matches!(err, NodeActionError::Kube(KubeError::CommandFailed { .. })));
    }

    #[test]
    fn zero_runs_perform_nothing() {
        let provider =
            GenericNodeScenarios::new(KubeNodes::new(KubeCli::new("/definitely/missing/kubectl")));
        provider
            .stop_kubelet(0, "worker-0", Duration::from_secs(1))
            .expect("no runs");
    }
}
