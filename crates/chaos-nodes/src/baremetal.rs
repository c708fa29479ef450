use std::collections::BTreeMap;
use std::time::Duration;

use chaos_core::BmcInfo;

use crate::cloud::{InstanceBackend, PowerOp};
use crate::command::ToolCli;
use crate::error::NodeActionError;

/// Chassis power control over IPMI, one BMC per node.
#[derive(Debug, Clone)]
pub struct IpmiBackend {
    pub cli: ToolCli,
    pub bmc_info: BTreeMap<String, BmcInfo>,
    /// Credentials used when a node's BMC entry omits its own.
    pub bmc_user: Option<String>,
    pub bmc_password: Option<String>,
}

impl IpmiBackend {
    pub fn new(
        bmc_info: BTreeMap<String, BmcInfo>,
        bmc_user: Option<String>,
        bmc_password: Option<String>,
    ) -> Self {
        Self {
            cli: ToolCli::new("ipmitool"),
            bmc_info,
            bmc_user,
            bmc_password,
        }
    }

    pub fn power_args(&self, op: PowerOp, node: &str) -> Result<Vec<String>, NodeActionError> {
        let chassis = match op {
            PowerOp::Start => "on",
            PowerOp::Stop => "off",
            PowerOp::Reboot => "cycle",
            PowerOp::Terminate => {
                return Err(NodeActionError::Unsupported {
                    provider: "bm",
                    action: "node_termination_scenario",
                })
            }
        };
        let bmc = self
            .bmc_info
            .get(node)
            .ok_or_else(|| NodeActionError::MissingBmc {
                node: node.to_string(),
            })?;

        let mut args = vec![
            "-I".to_string(),
            "lanplus".to_string(),
            "-H".to_string(),
            bmc.bmc_addr.clone(),
        ];
        if let Some(user) = bmc.bmc_user.as_ref().or(self.bmc_user.as_ref()) {
            args.push("-U".to_string());
            args.push(user.clone());
        }
        if let Some(password) = bmc.bmc_password.as_ref().or(self.bmc_password.as_ref()) {
            args.push("-P".to_string());
            args.push(password.clone());
        }
        args.extend(["chassis", "power", chassis].map(str::to_string));
        Ok(args)
    }
}

impl InstanceBackend for IpmiBackend {
    fn provider(&self) -> &'static str {
        "bm"
    }

    fn power(&self, op: PowerOp, node: &str, _timeout: Duration) -> Result<(), NodeActionError> {
        let args = self.power_args(op, node)?;
        log::info!("{}", self.cli.render(&args));
        self.cli.run(&args)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> IpmiBackend {
        let mut bmc_info = BTreeMap::new();
        bmc_info.insert(
            "worker-0".to_string(),
            BmcInfo {
                bmc_addr: "10.0.0.5".to_string(),
                bmc_user: Some("node-admin".to_string()),
                bmc_password: None,
            },
        );
        IpmiBackend::new(bmc_info, Some("admin".to_string()), Some("secret".to_string()))
    }

    #[test]
    fn per_node_credentials_override_defaults() {
        let args = backend()
            .power_args(PowerOp::Reboot, "worker-0")
            .expect("bmc args");
        assert_eq!(
            args,
            vec![
                "-I", "lanplus", "-H", "10.0.0.5", "-U", "node-admin", "-P", "secret", "chassis",
                "power", "cycle",
            ]
        );
    }

    #[test]
    fn missing_bmc_entry_is_an_error() {
        let err = backend()
            .power_args(PowerOp::Start, "worker-9")
            .expect_err("no bmc for worker-9");
        assert!(matches!(err, NodeActionError::MissingBmc { node } if node == "worker-9"));
    }

    #[test]
    fn termination_is_unsupported_on_bare_metal() {
        let err = backend()
            .power(PowerOp::Terminate, "worker-0", Duration::from_secs(1))
            .expect_err("bare metal cannot terminate");
        assert!(matches!(err, NodeActionError::Unsupported { provider: "bm", .. }));
    }
}
