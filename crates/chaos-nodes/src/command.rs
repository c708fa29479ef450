use std::path::PathBuf;
use std::process::Command;

use crate::error::NodeActionError;

/// Runner for vendor command line tools (`aws`, `gcloud`, `ipmitool`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCli {
    pub binary: PathBuf,
}

impl ToolCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn run(&self, args: &[String]) -> Result<String, NodeActionError> {
        let rendered = self.render(args);
        log::debug!("running {rendered}");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|source| NodeActionError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(NodeActionError::CommandFailed {
                command: rendered,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Rendered command line with `-P <secret>` style password values masked.
    pub fn render(&self, args: &[String]) -> String {
        let mut rendered = self.binary.to_string_lossy().into_owned();
        let mut mask_next = false;
        for arg in args {
            rendered.push(' ');
            if mask_next {
                rendered.push_str("****");
            } else {
                rendered.push_str(arg);
            }
            mask_next = arg == "-P";
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn render_masks_ipmi_password() {
        let cli = ToolCli::new("ipmitool");
        assert_eq!(
            cli.render(&args(&["-H", "10.0.0.5", "-U", "admin", "-P", "hunter2", "power", "on"])),
            "ipmitool -H 10.0.0.5 -U admin -P **** power on"
        );
    }

    #[test]
    fn run_reports_missing_binary_as_spawn_error() {
        let err = ToolCli::new("/definitely/missing/aws")
            .run(&args(&["ec2", "describe-instances"]))
            .expect_err("missing binary");
        assert!(matches!(err, NodeActionError::Spawn { .. }));
    }

    #[test]
    fn run_reports_non_zero_exit() {
        let err = ToolCli::new("false").run(&[]).expect_err("false exits 1");
        match err {
            NodeActionError::CommandFailed { status, .. } => assert_eq!(status, Some(1)),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }
}
