// file: src/network/ssh.rs
// version: 2.0.0
// guid: 9a1cf0e4-a9e1-4807-a74a-56bb88f77b39

//! SSH operations against slave hosts, driven through the OpenSSH tools

use super::executor::{CommandRunner, CommandSpec};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Remote provisioning payload; `{{REMOTE_USER}}` names the jump account
const REMOTE_PROVISION_TEMPLATE: &str = include_str!("../../templates/remote_provision.sh");

/// Render the remote provisioning payload for a jump account
pub fn remote_provision_script(remote_user: &str) -> String {
    REMOTE_PROVISION_TEMPLATE.replace("{{REMOTE_USER}}", remote_user)
}

/// Where and as whom to reach a slave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl SshTarget {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// SSH client for remote operations
#[derive(Clone)]
pub struct SshClient {
    runner: Arc<dyn CommandRunner>,
    known_hosts: PathBuf,
}

impl SshClient {
    pub fn new(runner: Arc<dyn CommandRunner>, known_hosts: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            known_hosts: known_hosts.into(),
        }
    }

    /// Forget any stale host key for `host`. Failures are ignored.
    pub async fn scrub_known_host(&self, host: &str) {
        let spec = CommandSpec::new("ssh-keygen")
            .arg("-f")
            .arg(self.known_hosts.to_string_lossy())
            .args(["-R", host]);

        match self.runner.run(&spec).await {
            Ok(output) => debug!("known_hosts scrub exited with {:?}", output.exit_code),
            Err(e) => debug!("known_hosts scrub failed: {}", e),
        }
    }

    /// Install `public_key` on the target using password authentication.
    ///
    /// The password travels in the `SSHPASS` environment variable.
    pub async fn copy_id(&self, target: &SshTarget, password: &str, public_key: &Path) -> Result<()> {
        self.scrub_known_host(&target.host).await;

        info!("Copying SSH key to {}:{}", target.destination(), target.port);
        let spec = CommandSpec::new("sshpass")
            .args(["-e", "ssh-copy-id", "-p"])
            .arg(target.port.to_string())
            .args(["-o", "StrictHostKeyChecking=no", "-i"])
            .arg(public_key.to_string_lossy())
            .arg(target.destination())
            .env("SSHPASS", password)
            .inherit_output();

        self.runner.run_checked(&spec).await?;
        Ok(())
    }

    /// Run the provisioning payload on the target with the shared key
    pub async fn run_remote_provision(
        &self,
        target: &SshTarget,
        private_key: &Path,
        script: &str,
    ) -> Result<()> {
        info!("Running remote provisioning on {}", target.destination());
        let spec = CommandSpec::new("ssh")
            .arg("-p")
            .arg(target.port.to_string())
            .args(["-o", "StrictHostKeyChecking=no", "-o", "BatchMode=yes", "-i"])
            .arg(private_key.to_string_lossy())
            .arg(target.destination())
            .arg(script)
            .inherit_output();

        self.runner.run_checked(&spec).await?;
        Ok(())
    }

    /// Open an interactive session
    pub async fn interactive(&self, destination: &str) -> Result<i32> {
        let spec = CommandSpec::new("ssh").arg(destination).inherit_output();
        let output = self.runner.run(&spec).await?;
        Ok(output.exit_code.unwrap_or(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::executor::testing::RecordingRunner;
    use crate::KangarooError;

    fn target() -> SshTarget {
        SshTarget {
            user: "root".to_string(),
            host: "10.0.0.5".to_string(),
            port: 2222,
        }
    }

    #[test]
    fn test_remote_script_is_templated() {
        let script = remote_provision_script("jumper");
        assert!(script.contains("useradd -m -s /bin/bash jumper"));
        assert!(!script.contains("{{REMOTE_USER}}"));
    }

    #[tokio::test]
    async fn test_copy_id_passes_password_via_env() -> Result<()> {
        let runner = Arc::new(RecordingRunner::default());
        let client = SshClient::new(runner.clone(), "/root/.ssh/known_hosts");

        client
            .copy_id(&target(), "s3cret", Path::new("/etc/ssh/k.pub"))
            .await?;

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].display(),
            "ssh-keygen -f /root/.ssh/known_hosts -R 10.0.0.5"
        );
        assert_eq!(calls[1].program, "sshpass");
        assert!(!calls[1].args.iter().any(|a| a.contains("s3cret")));
        assert_eq!(calls[1].env, vec![("SSHPASS".to_string(), "s3cret".to_string())]);
        assert!(calls[1].args.contains(&"root@10.0.0.5".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_remote_provision_failure_propagates() {
        let runner = Arc::new(RecordingRunner {
            failing: vec!["ssh".to_string()],
            ..Default::default()
        });
        let client = SshClient::new(runner, "/root/.ssh/known_hosts");

        let err = client
            .run_remote_provision(&target(), Path::new("/etc/ssh/k"), "true")
            .await
            .unwrap_err();
        assert!(matches!(err, KangarooError::ProcessError { .. }));
    }
}
