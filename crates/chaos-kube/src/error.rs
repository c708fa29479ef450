use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum KubeError {
    #[error("kubectl command failed to start ({command}): {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("kubectl command returned non-zero exit ({command}) status={status:?}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("kubectl command output was not valid UTF-8 ({command}, {stream}): {source}")]
    NonUtf8Output {
        command: String,
        stream: &'static str,
        #[source]
        source: FromUtf8Error,
    },
    #[error("invalid kubectl output: {context}")]
    Parse { context: String },
}

impl KubeError {
    /// Trimmed stderr of a failed command, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            KubeError::CommandFailed { stderr, .. } => Some(stderr.trim()),
            _ => None,
        }
    }
}
