//! Instance-level providers: cloud vendors driven through their CLI tools.

use std::thread;
use std::time::{Duration, Instant};

use chaos_core::expand_home;
use chaos_kube::KubeNodes;

use crate::action::NodeAction;
use crate::capability::NodeActions;
use crate::command::ToolCli;
use crate::error::NodeActionError;
use crate::generic::GenericNodeScenarios;

const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerOp {
    Start,
    Stop,
    Reboot,
    Terminate,
}

impl PowerOp {
    fn action(self) -> NodeAction {
        match self {
            PowerOp::Start => NodeAction::NodeStartScenario,
            PowerOp::Stop => NodeAction::NodeStopScenario,
            PowerOp::Reboot => NodeAction::NodeRebootScenario,
            PowerOp::Terminate => NodeAction::NodeTerminationScenario,
        }
    }
}

/// Power control over the machine behind a node.
pub trait InstanceBackend {
    fn provider(&self) -> &'static str;

    fn power(&self, op: PowerOp, node: &str, timeout: Duration) -> Result<(), NodeActionError>;

    /// Power control over a machine that is not a cluster node, addressed by IP.
    fn power_by_ip(&self, _op: PowerOp, _ip: &str, _timeout: Duration) -> Result<(), NodeActionError> {
        Err(NodeActionError::Unsupported {
            provider: self.provider(),
            action: NodeAction::HelperNodeStopStartScenario.as_str(),
        })
    }
}

/// Full node capability set on top of an [`InstanceBackend`]. Kubelet and
/// crash disruptions go through the generic debug-pod path.
#[derive(Debug, Clone)]
pub struct InstanceNodeScenarios<B> {
    pub backend: B,
    pub generic: GenericNodeScenarios,
    pub ssh: ToolCli,
    pub ssh_user: String,
}

impl<B: InstanceBackend> InstanceNodeScenarios<B> {
    pub fn new(backend: B, nodes: KubeNodes) -> Self {
        Self {
            backend,
            generic: GenericNodeScenarios::new(nodes),
            ssh: ToolCli::new("ssh"),
            ssh_user: "root".to_string(),
        }
    }

    fn nodes(&self) -> &KubeNodes {
        &self.generic.nodes
    }
}

impl<B: InstanceBackend> NodeActions for InstanceNodeScenarios<B> {
    fn provider(&self) -> &'static str {
        self.backend.provider()
    }

    fn node_crash(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        self.generic.node_crash(run_count, node, timeout)
    }

    fn stop_kubelet(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        self.generic.stop_kubelet(run_count, node, timeout)
    }

    fn node_start(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            log::info!("Starting node_start_scenario injection on {node}");
            self.backend.power(PowerOp::Start, node, timeout)?;
            self.nodes().wait_for_ready(node, timeout)?;
            log::info!("Node {node} is started and Ready");
        }
        Ok(())
    }

    fn node_stop(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            log::info!("Starting node_stop_scenario injection on {node}");
            self.backend.power(PowerOp::Stop, node, timeout)?;
            self.nodes().wait_for_not_ready(node, timeout)?;
            log::info!("Node {node} is stopped");
        }
        Ok(())
    }

    fn node_stop_start(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            self.node_stop(1, node, timeout)?;
            self.node_start(1, node, timeout)?;
        }
        Ok(())
    }

    fn node_termination(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            log::info!("Starting node_termination_scenario injection on {node}");
            self.backend.power(PowerOp::Terminate, node, timeout)?;
            self.nodes().wait_for_deleted(node, timeout)?;
            log::info!("Node {node} is terminated and removed from the cluster");
        }
        Ok(())
    }

    fn node_reboot(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            log::info!("Starting node_reboot_scenario injection on {node}");
            self.backend.power(PowerOp::Reboot, node, timeout)?;
            self.nodes().wait_for_not_ready(node, timeout)?;
            self.nodes().wait_for_ready(node, timeout)?;
            log::info!("Node {node} is rebooted and Ready");
        }
        Ok(())
    }

    fn stop_start_kubelet(&self, run_count: u32, node: &str, timeout: Duration) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            self.generic.stop_kubelet(1, node, timeout)?;
            self.node_reboot(1, node, timeout)?;
        }
        Ok(())
    }

    fn helper_node_stop_start(
        &self,
        run_count: u32,
        helper_ip: &str,
        timeout: Duration,
    ) -> Result<(), NodeActionError> {
        for _ in 0..run_count {
            log::info!("Stopping helper node {helper_ip}");
            self.backend.power_by_ip(PowerOp::Stop, helper_ip, timeout)?;
            log::info!("Starting helper node {helper_ip}");
            self.backend.power_by_ip(PowerOp::Start, helper_ip, timeout)?;
        }
        Ok(())
    }

    fn helper_node_service_status(
        &self,
        helper_ip: &str,
        service: &str,
        ssh_private_key: &str,
        timeout: Duration,
    ) -> Result<(), NodeActionError> {
        if self.backend.provider() != "openstack" {
            return Err(NodeActionError::Unsupported {
                provider: self.backend.provider(),
                action: "helper_node_service_status",
            });
        }
        let key = expand_home(ssh_private_key);
        let args = vec![
            "-i".to_string(),
            key.to_string_lossy().into_owned(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", timeout.as_secs()),
            format!("{}@{helper_ip}", self.ssh_user),
            format!("systemctl is-active {service}"),
        ];
        let state = self.ssh.run(&args)?;
        log::info!("Service {service} on helper node {helper_ip} is {}", state.trim());
        Ok(())
    }
}

/// Cloud instance coordinates parsed from a node's `spec.providerID`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRef {
    pub id: String,
    pub zone: Option<String>,
    /// Project, resource group or region, depending on the vendor.
    pub group: Option<String>,
}

impl InstanceRef {
    fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            zone: None,
            group: None,
        }
    }
}

/// Vendor-specific command vocabulary for one cloud CLI.
pub trait VendorCommands {
    fn provider(&self) -> &'static str;
    fn binary(&self) -> &'static str;
    fn instance_ref(&self, provider_id: &str) -> Result<InstanceRef, NodeActionError>;
    fn power_args(&self, op: PowerOp, instance: &InstanceRef) -> Vec<String>;

    fn lookup_by_ip_args(&self, _ip: &str) -> Option<Vec<String>> {
        None
    }

    fn status_args(&self, _instance: &InstanceRef) -> Option<Vec<String>> {
        None
    }

    /// Status reported once `op` has fully taken effect.
    fn settled_status(&self, _op: PowerOp) -> Option<&'static str> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct VendorCliBackend<V> {
    pub vendor: V,
    pub cli: ToolCli,
    pub nodes: KubeNodes,
}

impl<V: VendorCommands> VendorCliBackend<V> {
    pub fn new(vendor: V, nodes: KubeNodes) -> Self {
        let cli = ToolCli::new(vendor.binary());
        Self { vendor, cli, nodes }
    }

    fn wait_for_status(
        &self,
        op: PowerOp,
        instance: &InstanceRef,
        timeout: Duration,
    ) -> Result<(), NodeActionError> {
        let (Some(args), Some(expected)) =
            (self.vendor.status_args(instance), self.vendor.settled_status(op))
        else {
            return Ok(());
        };
        // A timeout past the end of the clock waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        loop {
            let status = self.cli.run(&args)?;
            if status.trim().eq_ignore_ascii_case(expected) {
                return Ok(());
            }
            if matches!(deadline, Some(deadline) if Instant::now() >= deadline) {
                return Err(NodeActionError::Timeout {
                    what: format!("instance {} to reach {expected}", instance.id),
                    timeout_secs: timeout.as_secs(),
                });
            }
            thread::sleep(STATUS_POLL_INTERVAL);
        }
    }
}

impl<V: VendorCommands> InstanceBackend for VendorCliBackend<V> {
    fn provider(&self) -> &'static str {
        self.vendor.provider()
    }

    fn power(&self, op: PowerOp, node: &str, _timeout: Duration) -> Result<(), NodeActionError> {
        let provider_id = self.nodes.provider_id(node)?;
        let instance = self.vendor.instance_ref(&provider_id)?;
        log::info!(
            "{} {} for node {node} via {}",
            op.action(),
            instance.id,
            self.vendor.provider()
        );
        self.cli.run(&self.vendor.power_args(op, &instance))?;
        Ok(())
    }

    fn power_by_ip(&self, op: PowerOp, ip: &str, timeout: Duration) -> Result<(), NodeActionError> {
        let Some(lookup) = self.vendor.lookup_by_ip_args(ip) else {
            return Err(NodeActionError::Unsupported {
                provider: self.vendor.provider(),
                action: NodeAction::HelperNodeStopStartScenario.as_str(),
            });
        };
        let listing = self.cli.run(&lookup)?;
        let id = listing
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| NodeActionError::InstanceRef {
                value: ip.to_string(),
                reason: "no server owns this address".to_string(),
            })?;
        let instance = InstanceRef::bare(id);
        self.cli.run(&self.vendor.power_args(op, &instance))?;
        self.wait_for_status(op, &instance, timeout)
    }
}

fn provider_id_segments<'a>(
    provider_id: &'a str,
    scheme: &str,
) -> Result<Vec<&'a str>, NodeActionError> {
    let rest = provider_id
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix("://"))
        .ok_or_else(|| NodeActionError::InstanceRef {
            value: provider_id.to_string(),
            reason: format!("expected a {scheme}:// provider id"),
        })?;
    Ok(rest.split('/').filter(|segment| !segment.is_empty()).collect())
}

fn malformed(provider_id: &str, reason: &str) -> NodeActionError {
    NodeActionError::InstanceRef {
        value: provider_id.to_string(),
        reason: reason.to_string(),
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Aws;

impl VendorCommands for Aws {
    fn provider(&self) -> &'static str {
        "aws"
    }

    fn binary(&self) -> &'static str {
        "aws"
    }

    fn instance_ref(&self, provider_id: &str) -> Result<InstanceRef, NodeActionError> {
        match provider_id_segments(provider_id, "aws")?.as_slice() {
            [zone, id] => Ok(InstanceRef {
                id: (*id).to_string(),
                zone: Some((*zone).to_string()),
                group: Some(zone.trim_end_matches(|c: char| c.is_ascii_lowercase()).to_string()),
            }),
            [id] => Ok(InstanceRef::bare(*id)),
            _ => Err(malformed(provider_id, "expected aws:///<zone>/<instance-id>")),
        }
    }

    fn power_args(&self, op: PowerOp, instance: &InstanceRef) -> Vec<String> {
        let verb = match op {
            PowerOp::Start => "start-instances",
            PowerOp::Stop => "stop-instances",
            PowerOp::Reboot => "reboot-instances",
            PowerOp::Terminate => "terminate-instances",
        };
        let mut args = strings(&["ec2", verb, "--instance-ids", &instance.id]);
        if let Some(region) = &instance.group {
            args.extend(strings(&["--region", region]));
        }
        args
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Gcp;

impl VendorCommands for Gcp {
    fn provider(&self) -> &'static str {
        "gcp"
    }

    fn binary(&self) -> &'static str {
        "gcloud"
    }

    fn instance_ref(&self, provider_id: &str) -> Result<InstanceRef, NodeActionError> {
        match provider_id_segments(provider_id, "gce")?.as_slice() {
            [project, zone, name] => Ok(InstanceRef {
                id: (*name).to_string(),
                zone: Some((*zone).to_string()),
                group: Some((*project).to_string()),
            }),
            _ => Err(malformed(provider_id, "expected gce://<project>/<zone>/<name>")),
        }
    }

    fn power_args(&self, op: PowerOp, instance: &InstanceRef) -> Vec<String> {
        let verb = match op {
            PowerOp::Start => "start",
            PowerOp::Stop => "stop",
            PowerOp::Reboot => "reset",
            PowerOp::Terminate => "delete",
        };
        let mut args = strings(&["compute", "instances", verb, &instance.id]);
        if let Some(zone) = &instance.zone {
            args.extend(strings(&["--zone", zone]));
        }
        if let Some(project) = &instance.group {
            args.extend(strings(&["--project", project]));
        }
        args.push("--quiet".to_string());
        args
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Azure;

impl VendorCommands for Azure {
    fn provider(&self) -> &'static str {
        "azure"
    }

    fn binary(&self) -> &'static str {
        "az"
    }

    fn instance_ref(&self, provider_id: &str) -> Result<InstanceRef, NodeActionError> {
        let segments = provider_id_segments(provider_id, "azure")?;
        let group = segments
            .iter()
            .position(|segment| segment.eq_ignore_ascii_case("resourceGroups"))
            .and_then(|index| segments.get(index + 1))
            .ok_or_else(|| malformed(provider_id, "missing resourceGroups segment"))?;
        let name = segments
            .last()
            .ok_or_else(|| malformed(provider_id, "missing virtual machine name"))?;
        Ok(InstanceRef {
            id: (*name).to_string(),
            zone: None,
            group: Some((*group).to_string()),
        })
    }

    fn power_args(&self, op: PowerOp, instance: &InstanceRef) -> Vec<String> {
        let verb = match op {
            PowerOp::Start => "start",
            PowerOp::Stop => "stop",
            PowerOp::Reboot => "restart",
            PowerOp::Terminate => "delete",
        };
        let mut args = strings(&["vm", verb]);
        if let Some(group) = &instance.group {
            args.extend(strings(&["--resource-group", group]));
        }
        args.extend(strings(&["--name", &instance.id]));
        if op == PowerOp::Terminate {
            args.push("--yes".to_string());
        }
        args
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Openstack;

impl VendorCommands for Openstack {
    fn provider(&self) -> &'static str {
        "openstack"
    }

    fn binary(&self) -> &'static str {
        "openstack"
    }

    fn instance_ref(&self, provider_id: &str) -> Result<InstanceRef, NodeActionError> {
        provider_id_segments(provider_id, "openstack")?
            .last()
            .map(|id| InstanceRef::bare(*id))
            .ok_or_else(|| malformed(provider_id, "expected openstack:///<server-id>"))
    }

    fn power_args(&self, op: PowerOp, instance: &InstanceRef) -> Vec<String> {
        match op {
            PowerOp::Start => strings(&["server", "start", &instance.id]),
            PowerOp::Stop => strings(&["server", "stop", &instance.id]),
            PowerOp::Reboot => strings(&["server", "reboot", "--hard", &instance.id]),
            PowerOp::Terminate => strings(&["server", "delete", &instance.id]),
        }
    }

    fn lookup_by_ip_args(&self, ip: &str) -> Option<Vec<String>> {
        Some(strings(&[
            "server", "list", "--ip", ip, "-f", "value", "-c", "ID",
        ]))
    }

    fn status_args(&self, instance: &InstanceRef) -> Option<Vec<String>> {
        Some(strings(&[
            "server",
            "show",
            &instance.id,
            "-f",
            "value",
            "-c",
            "status",
        ]))
    }

    fn settled_status(&self, op: PowerOp) -> Option<&'static str> {
        match op {
            PowerOp::Start | PowerOp::Reboot => Some("ACTIVE"),
            PowerOp::Stop => Some("SHUTOFF"),
            PowerOp::Terminate => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alibaba;

impl VendorCommands for Alibaba {
    fn provider(&self) -> &'static str {
        "alibaba"
    }

    fn binary(&self) -> &'static str {
        "aliyun"
    }

    fn instance_ref(&self, provider_id: &str) -> Result<InstanceRef, NodeActionError> {
        let segments = provider_id_segments(provider_id, "alicloud")?;
        let (region, id) = segments
            .last()
            .and_then(|raw| raw.split_once('.'))
            .ok_or_else(|| malformed(provider_id, "expected alicloud://<region>.<instance-id>"))?;
        Ok(InstanceRef {
            id: id.to_string(),
            zone: None,
            group: Some(region.to_string()),
        })
    }

    fn power_args(&self, op: PowerOp, instance: &InstanceRef) -> Vec<String> {
        let verb = match op {
            PowerOp::Start => "StartInstance",
            PowerOp::Stop => "StopInstance",
            PowerOp::Reboot => "RebootInstance",
            PowerOp::Terminate => "DeleteInstance",
        };
        let mut args = strings(&["ecs", verb]);
        if let Some(region) = &instance.group {
            args.extend(strings(&["--RegionId", region]));
        }
        args.extend(strings(&["--InstanceId", &instance.id]));
        if op == PowerOp::Terminate {
            args.extend(strings(&["--Force", "true"]));
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_kube::KubeCli;
    use std::cell::RefCell;

    /// Vendor whose status command echoes the settled status back.
    #[derive(Debug, Clone, Copy)]
    struct EchoVendor;

    impl VendorCommands for EchoVendor {
        fn provider(&self) -> &'static str {
            "echo"
        }

        fn binary(&self) -> &'static str {
            "echo"
        }

        fn instance_ref(&self, provider_id: &str) -> Result<InstanceRef, NodeActionError> {
            Ok(InstanceRef::bare(provider_id))
        }

        fn power_args(&self, _op: PowerOp, _instance: &InstanceRef) -> Vec<String> {
            Vec::new()
        }

        fn status_args(&self, _instance: &InstanceRef) -> Option<Vec<String>> {
            Some(vec!["stopped".to_string()])
        }

        fn settled_status(&self, _op: PowerOp) -> Option<&'static str> {
            Some("stopped")
        }
    }

    #[test]
    fn status_wait_accepts_timeout_beyond_clock_range() {
        let backend = VendorCliBackend::new(EchoVendor, KubeNodes::default());
        backend
            .wait_for_status(PowerOp::Stop, &InstanceRef::bare("i-0abc"), Duration::MAX)
            .expect("settled status is reported immediately");
    }

    #[test]
    fn aws_provider_id_yields_zone_region_and_instance() {
        let instance = Aws
            .instance_ref("aws:///us-east-1a/i-0abc123")
            .expect("aws provider id");
        assert_eq!(instance.id, "i-0abc123");
        assert_eq!(instance.zone.as_deref(), Some("us-east-1a"));
        assert_eq!(instance.group.as_deref(), Some("us-east-1"));
        assert_eq!(
            Aws.power_args(PowerOp::Stop, &instance),
            vec!["ec2", "stop-instances", "--instance-ids", "i-0abc123", "--region", "us-east-1"]
        );
    }

    #[test]
    fn gcp_provider_id_requires_project_zone_and_name() {
        let instance = Gcp
            .instance_ref("gce://chaos-project/us-central1-a/worker-0")
            .expect("gce provider id");
        assert_eq!(
            Gcp.power_args(PowerOp::Reboot, &instance),
            vec![
                "compute",
                "instances",
                "reset",
                "worker-0",
                "--zone",
                "us-central1-a",
                "--project",
                "chaos-project",
                "--quiet",
            ]
        );
        assert!(Gcp.instance_ref("gce://chaos-project/worker-0").is_err());
    }

    #[test]
    fn azure_provider_id_extracts_resource_group() {
        let instance = Azure
            .instance_ref("azure:///subscriptions/sub-1/resourceGroups/chaos-rg/providers/Microsoft.Compute/virtualMachines/worker-0")
            .expect("azure provider id");
        assert_eq!(instance.group.as_deref(), Some("chaos-rg"));
        assert_eq!(
            Azure.power_args(PowerOp::Terminate, &instance),
            vec!["vm", "delete", "--resource-group", "chaos-rg", "--name", "worker-0", "--yes"]
        );
    }

    #[test]
    fn openstack_supports_lookup_by_ip_and_status_polling() {
        let instance = Openstack
            .instance_ref("openstack:///4f2a-11e9")
            .expect("openstack provider id");
        assert_eq!(instance.id, "4f2a-11e9");
        assert!(Openstack.lookup_by_ip_args("10.0.0.9").is_some());
        assert_eq!(Openstack.settled_status(PowerOp::Stop), Some("SHUTOFF"));
        assert_eq!(Aws.lookup_by_ip_args("10.0.0.9"), None);
    }

    #[test]
    fn alibaba_provider_id_splits_region_and_instance() {
        let instance = Alibaba
            .instance_ref("alicloud://cn-hangzhou.i-bp1abc")
            .expect("alicloud provider id");
        assert_eq!(instance.id, "i-bp1abc");
        assert_eq!(
            Alibaba.power_args(PowerOp::Start, &instance),
            vec!["ecs", "StartInstance", "--RegionId", "cn-hangzhou", "--InstanceId", "i-bp1abc"]
        );
    }

    #[test]
    fn provider_id_with_wrong_scheme_is_rejected() {
        let err = Aws
            .instance_ref("gce://p/z/n")
            .expect_err("scheme mismatch");
        assert!(matches!(err, NodeActionError::InstanceRef { .. }));
    }

    #[test]
    fn helper_power_is_unsupported_without_ip_lookup() {
        let backend = VendorCliBackend::new(Aws, KubeNodes::default());
        let err = backend
            .power_by_ip(PowerOp::Stop, "10.0.0.9", Duration::from_secs(1))
            .expect_err("aws has no helper lookup");
        assert!(matches!(err, NodeActionError::Unsupported { provider: "aws", .. }));
    }

    struct RecordingBackend {
        ops: RefCell<Vec<(PowerOp, String)>>,
    }

    impl InstanceBackend for RecordingBackend {
        fn provider(&self) -> &'static str {
            "recording"
        }

        fn power(&self, op: PowerOp, node: &str, _: Duration) -> Result<(), NodeActionError> {
            self.ops.borrow_mut().push((op, node.to_string()));
            Ok(())
        }
    }

    #[test]
    fn node_stop_powers_off_before_waiting_on_the_node() {
        let scenarios = InstanceNodeScenarios::new(
            RecordingBackend {
                ops: RefCell::new(Vec::new()),
            },
            KubeNodes::new(KubeCli::new("false")),
        );
        let err = scenarios
            .node_stop(2, "worker-0", Duration::from_secs(1))
            .expect_err("kubectl wait fails");
        assert!(matches!(err, NodeActionError::Kube(_)));
        assert_eq!(
            *scenarios.backend.ops.borrow(),
            vec![(PowerOp::Stop, "worker-0".to_string())]
        );
    }

    #[test]
    fn helper_service_status_requires_openstack() {
        let scenarios = InstanceNodeScenarios::new(
            RecordingBackend {
                ops: RefCell::new(Vec::new()),
            },
            KubeNodes::default(),
        );
        let err = scenarios
            .helper_node_service_status("10.0.0.9", "haproxy", "~/.ssh/id_rsa", Duration::from_secs(1))
            .expect_err("not openstack");
        assert!(matches!(err, NodeActionError::Unsupported { .. }));
    }
}
