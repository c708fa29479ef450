use std::time::Duration;

use crate::command::KubeCli;
use crate::error::KubeError;

const NODE_READY_JSONPATH: &str = r#"jsonpath={range .items[*]}{.metadata.name}{"\t"}{.status.conditions[?(@.type=="Ready")].status}{"\n"}{end}"#;

/// Source of nodes eligible for disruption.
pub trait NodeInventory {
    /// Names of Ready nodes matching `label_selector`. An empty selector
    /// matches every node.
    fn killable_nodes(&self, label_selector: &str) -> Result<Vec<String>, KubeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub name: String,
    pub ready: bool,
}

/// Node queries and node-level operations backed by `kubectl`.
#[derive(Debug, Clone, Default)]
pub struct KubeNodes {
    pub cli: KubeCli,
    /// Node hosting the engine itself; never offered for disruption.
    pub exclude_node: Option<String>,
}

impl KubeNodes {
    pub fn new(cli: KubeCli) -> Self {
        Self {
            cli,
            exclude_node: None,
        }
    }

    pub fn with_excluded_node(mut self, node: impl Into<String>) -> Self {
        self.exclude_node = Some(node.into());
        self
    }

    pub fn list(&self, label_selector: &str) -> Result<Vec<NodeStatus>, KubeError> {
        let mut args = vec!["get", "nodes"];
        if !label_selector.is_empty() {
            args.push("-l");
            args.push(label_selector);
        }
        args.push("-o");
        args.push(NODE_READY_JSONPATH);
        let output = self.cli.run(args)?;
        parse_node_statuses(&output.stdout)
    }

    /// Cloud provider instance reference, e.g. `aws:///us-east-1a/i-0abc`.
    pub fn provider_id(&self, node: &str) -> Result<String, KubeError> {
        let output = self.cli.run([
            "get",
            "node",
            node,
            "-o",
            "jsonpath={.spec.providerID}",
        ])?;
        let provider_id = output.stdout.trim();
        if provider_id.is_empty() {
            return Err(KubeError::Parse {
                context: format!("node '{node}' has no spec.providerID"),
            });
        }
        Ok(provider_id.to_string())
    }

    pub fn internal_ip(&self, node: &str) -> Result<String, KubeError> {
        let output = self.cli.run([
            "get",
            "node",
            node,
            "-o",
            r#"jsonpath={.status.addresses[?(@.type=="InternalIP")].address}"#,
        ])?;
        let ip = output.stdout.split_whitespace().next().unwrap_or("");
        if ip.is_empty() {
            return Err(KubeError::Parse {
                context: format!("node '{node}' has no InternalIP address"),
            });
        }
        Ok(ip.to_string())
    }

    pub fn wait_for_ready(&self, node: &str, timeout: Duration) -> Result<(), KubeError> {
        self.wait_for(node, "condition=Ready", timeout)
    }

    pub fn wait_for_not_ready(&self, node: &str, timeout: Duration) -> Result<(), KubeError> {
        self.wait_for(node, "condition=Ready=false", timeout)
    }

    pub fn wait_for_deleted(&self, node: &str, timeout: Duration) -> Result<(), KubeError> {
        self.wait_for(node, "delete", timeout)
    }

    fn wait_for(&self, node: &str, condition: &str, timeout: Duration) -> Result<(), KubeError> {
        let target = format!("node/{node}");
        let condition = format!("--for={condition}");
        let timeout = format!("--timeout={}s", timeout.as_secs());
        self.cli
            .run(["wait", target.as_str(), condition.as_str(), timeout.as_str()])?;
        Ok(())
    }

    /// Run `script` on the node host through a privileged debug pod.
    pub fn debug_node(&self, node: &str, image: &str, script: &str) -> Result<String, KubeError> {
        let target = format!("node/{node}");
        let image = format!("--image={image}");
        let output = self.cli.run([
            "debug",
            target.as_str(),
            image.as_str(),
            "--profile=sysadmin",
            "--quiet",
            "--",
            "chroot",
            "/host",
            "sh",
            "-c",
            script,
        ])?;
        Ok(output.stdout)
    }
}

impl NodeInventory for KubeNodes {
    fn killable_nodes(&self, label_selector: &str) -> Result<Vec<String>, KubeError> {
        let nodes = self.list(label_selector)?;
        Ok(nodes
            .into_iter()
            .filter(|node| node.ready)
            .filter(|node| self.exclude_node.as_deref() != Some(node.name.as_str()))
            .map(|node| node.name)
            .collect())
    }
}

pub fn parse_node_statuses(stdout: &str) -> Result<Vec<NodeStatus>, KubeError> {
    let mut nodes = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let name = fields.next().unwrap_or("").trim();
        if name.is_empty() {
            return Err(KubeError::Parse {
                context: format!("node line without a name: '{line}'"),
            });
        }
        let ready = fields.next().map(str::trim) == Some("True");
        nodes.push(NodeStatus {
            name: name.to_string(),
            ready,
        });
    }
    Ok(nodes)
}
