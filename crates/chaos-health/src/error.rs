#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response from {url}: {body}")]
    Body { url: String, body: String },
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
    #[error("failed to register handler for signal {signal}: {source}")]
    SignalHandler {
        signal: i32,
        #[source]
        source: std::io::Error,
    },
}
