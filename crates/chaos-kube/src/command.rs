use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::KubeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Thin runner around the `kubectl` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubeCli {
    pub binary: PathBuf,
    pub kubeconfig: Option<PathBuf>,
}

impl Default for KubeCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("kubectl"),
            kubeconfig: None,
        }
    }
}

impl KubeCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig: None,
        }
    }

    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    pub fn run<I, S>(&self, args: I) -> Result<KubeOutput, KubeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut owned_args: Vec<OsString> = Vec::new();
        if let Some(kubeconfig) = &self.kubeconfig {
            owned_args.push(OsString::from("--kubeconfig"));
            owned_args.push(kubeconfig.as_os_str().to_os_string());
        }
        owned_args.extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));

        let rendered = render_command(&self.binary, &owned_args);
        let output = Command::new(&self.binary)
            .args(&owned_args)
            .output()
            .map_err(|source| KubeError::Io {
                command: rendered.clone(),
                source,
            })?;

        let stdout =
            String::from_utf8(output.stdout).map_err(|source| KubeError::NonUtf8Output {
                command: rendered.clone(),
                stream: "stdout",
                source,
            })?;
        let stderr =
            String::from_utf8(output.stderr).map_err(|source| KubeError::NonUtf8Output {
                command: rendered.clone(),
                stream: "stderr",
                source,
            })?;

        if !output.status.success() {
            return Err(KubeError::CommandFailed {
                command: rendered,
                status: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(KubeOutput { stdout, stderr })
    }

    /// API server URL of the current context.
    pub fn server_url(&self) -> Result<String, KubeError> {
        let output = self.run([
            "config",
            "view",
            "--minify",
            "-o",
            "jsonpath={.clusters[0].cluster.server}",
        ])?;
        Ok(output.stdout.trim().to_string())
    }

    /// OpenShift cluster version string, or `None` when the ClusterVersion
    /// resource does not exist on this cluster.
    pub fn cluster_version(&self) -> Option<String> {
        self.run([
            "get",
            "clusterversion",
            "-o",
            "jsonpath={.items[0].status.desired.version}",
        ])
        .ok()
        .map(|output| output.stdout.trim().to_string())
        .filter(|version| !version.is_empty())
    }
}

pub(crate) fn render_command(binary: &Path, args: &[OsString]) -> String {
    let mut rendered = binary.to_string_lossy().into_owned();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}
