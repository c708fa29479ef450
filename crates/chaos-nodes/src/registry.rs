use chaos_core::NodeScenarioConfig;
use chaos_kube::KubeNodes;

use crate::baremetal::IpmiBackend;
use crate::capability::NodeActions;
use crate::cloud::{Alibaba, Aws, Azure, Gcp, InstanceNodeScenarios, Openstack, VendorCliBackend};
use crate::error::DispatchError;
use crate::generic::GenericNodeScenarios;

/// Per-scenario dispatch settings derived from provider selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchContext {
    /// Restrict the scenario to the generic action subset.
    pub generic_only: bool,
}

pub struct SelectedProvider {
    pub actions: Box<dyn NodeActions>,
    pub context: DispatchContext,
}

impl std::fmt::Debug for SelectedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedProvider")
            .field("provider", &self.actions.provider())
            .field("context", &self.context)
            .finish()
    }
}

pub trait ProviderFactory {
    fn select(&self, config: &NodeScenarioConfig) -> Result<SelectedProvider, DispatchError>;
}

/// Maps a scenario's `cloud_type` to its provider implementation.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    pub nodes: KubeNodes,
}

impl ProviderRegistry {
    pub fn new(nodes: KubeNodes) -> Self {
        Self { nodes }
    }
}

impl ProviderFactory for ProviderRegistry {
    fn select(&self, config: &NodeScenarioConfig) -> Result<SelectedProvider, DispatchError> {
        let nodes = self.nodes.clone();
        let actions: Box<dyn NodeActions> = match config.cloud_tag() {
            None | Some("generic") => {
                return Ok(SelectedProvider {
                    actions: Box::new(GenericNodeScenarios::new(nodes)),
                    context: DispatchContext { generic_only: true },
                })
            }
            Some("aws") => Box::new(InstanceNodeScenarios::new(
                VendorCliBackend::new(Aws, nodes.clone()),
                nodes,
            )),
            Some("gcp") => Box::new(InstanceNodeScenarios::new(
                VendorCliBackend::new(Gcp, nodes.clone()),
                nodes,
            )),
            Some("azure") | Some("az") => Box::new(InstanceNodeScenarios::new(
                VendorCliBackend::new(Azure, nodes.clone()),
                nodes,
            )),
            Some("openstack") => Box::new(InstanceNodeScenarios::new(
                VendorCliBackend::new(Openstack, nodes.clone()),
                nodes,
            )),
            Some("alibaba") | Some("alicloud") => Box::new(InstanceNodeScenarios::new(
                VendorCliBackend::new(Alibaba, nodes.clone()),
                nodes,
            )),
            Some("bm") => Box::new(InstanceNodeScenarios::new(
                IpmiBackend::new(
                    config.bmc_info.clone(),
                    config.bmc_user.clone(),
                    config.bmc_password.clone(),
                ),
                nodes,
            )),
            Some(other) => {
                return Err(DispatchError::UnknownProvider {
                    tag: other.to_string(),
                })
            }
        };
        Ok(SelectedProvider {
            actions,
            context: DispatchContext::default(),
        })
    }
}
