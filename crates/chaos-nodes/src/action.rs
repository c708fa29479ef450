use serde::{Deserialize, Serialize};

/// Named node disruption. Identifiers outside this vocabulary are skipped by
/// the dispatcher rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAction {
    NodeStartScenario,
    NodeStopScenario,
    NodeStopStartScenario,
    NodeTerminationScenario,
    NodeRebootScenario,
    StopStartKubeletScenario,
    StopKubeletScenario,
    NodeCrashScenario,
    HelperNodeStopStartScenario,
}

pub const GENERIC_ACTIONS: [NodeAction; 2] =
    [NodeAction::StopKubeletScenario, NodeAction::NodeCrashScenario];

impl NodeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeAction::NodeStartScenario => "node_start_scenario",
            NodeAction::NodeStopScenario => "node_stop_scenario",
            NodeAction::NodeStopStartScenario => "node_stop_start_scenario",
            NodeAction::NodeTerminationScenario => "node_termination_scenario",
            NodeAction::NodeRebootScenario => "node_reboot_scenario",
            NodeAction::StopStartKubeletScenario => "stop_start_kubelet_scenario",
            NodeAction::StopKubeletScenario => "stop_kubelet_scenario",
            NodeAction::NodeCrashScenario => "node_crash_scenario",
            NodeAction::HelperNodeStopStartScenario => "stop_start_helper_node_scenario",
        }
    }

    /// Parse an action identifier from a scenario file. Both spellings of the
    /// helper-node action are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        let action = match raw.trim() {
            "node_start_scenario" => NodeAction::NodeStartScenario,
            "node_stop_scenario" => NodeAction::NodeStopScenario,
            "node_stop_start_scenario" => NodeAction::NodeStopStartScenario,
            "node_termination_scenario" => NodeAction::NodeTerminationScenario,
            "node_reboot_scenario" => NodeAction::NodeRebootScenario,
            "stop_start_kubelet_scenario" => NodeAction::StopStartKubeletScenario,
            "stop_kubelet_scenario" => NodeAction::StopKubeletScenario,
            "node_crash_scenario" => NodeAction::NodeCrashScenario,
            "stop_start_helper_node_scenario" | "helper_node_stop_start_scenario" => {
                NodeAction::HelperNodeStopStartScenario
            }
            _ => return None,
        };
        Some(action)
    }

    pub fn is_generic(self) -> bool {
        GENERIC_ACTIONS.contains(&self)
    }
}

impl std::fmt::Display for NodeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_canonical_names() {
        for action in [
            NodeAction::NodeStartScenario,
            NodeAction::NodeStopScenario,
            NodeAction::NodeStopStartScenario,
            NodeAction::NodeTerminationScenario,
            NodeAction::NodeRebootScenario,
            NodeAction::StopStartKubeletScenario,
            NodeAction::StopKubeletScenario,
            NodeAction::NodeCrashScenario,
            NodeAction::HelperNodeStopStartScenario,
        ] {
            assert_eq!(NodeAction::parse(action.as_str()), Some(action));
        }
    }

    #[test]
    fn helper_action_accepts_both_spellings() {
        assert_eq!(
            NodeAction::parse("helper_node_stop_start_scenario"),
            Some(NodeAction::HelperNodeStopStartScenario)
        );
    }

    #[test]
    fn unknown_identifiers_do_not_parse() {
        assert_eq!(NodeAction::parse("node_fork_bomb_scenario"), None);
        assert_eq!(NodeAction::parse(""), None);
    }

    #[test]
    fn generic_subset_is_crash_and_kubelet_stop() {
        assert!(NodeAction::NodeCrashScenario.is_generic());
        assert!(NodeAction::StopKubeletScenario.is_generic());
        assert!(!NodeAction::NodeStartScenario.is_generic());
        assert!(!NodeAction::StopStartKubeletScenario.is_generic());
    }
}
