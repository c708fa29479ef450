use chaos_kube::KubeError;

#[derive(Debug, thiserror::Error)]
pub enum NodeActionError {
    #[error("{action} is not supported by the {provider} provider")]
    Unsupported {
        provider: &'static str,
        action: &'static str,
    },
    #[error("command failed to start ({command}): {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("command returned non-zero exit ({command}) status={status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("unexpected instance reference '{value}': {reason}")]
    InstanceRef { value: String, reason: String },
    #[error("no BMC address configured for node {node}")]
    MissingBmc { node: String },
    #[error("timed out after {timeout_secs}s waiting for {what}")]
    Timeout { what: String, timeout_secs: u64 },
    #[error(transparent)]
    Kube(#[from] KubeError),
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no ready nodes match label selector '{label_selector}'")]
    NoMatchingNodes { label_selector: String },
    #[error("requested {requested} nodes for label selector '{label_selector}' but only {available} are ready")]
    NotEnoughNodes {
        label_selector: String,
        requested: usize,
        available: usize,
    },
    #[error("failed to list nodes: {0}")]
    Inventory(#[from] KubeError),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("cloud type '{tag}' is not currently supported; use 'generic' to stop kubelet or crash nodes on any cluster")]
    UnknownProvider { tag: String },
    #[error("{action} is only supported for cloud type openstack, not {provider}")]
    HelperRequiresOpenstack {
        action: String,
        provider: &'static str,
    },
    #[error("{action} requires '{field}' in the node scenario")]
    MissingField {
        action: String,
        field: &'static str,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("{action} failed on {target}: {source}")]
    Action {
        action: String,
        target: String,
        #[source]
        source: NodeActionError,
    },
}
