//! Remote command execution on a provisioned node
//!
//! Wraps the system `ssh` client. Only used to poll reachability and to
//! wait for the boot sentinel.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Exit status `ssh` uses for its own failures
const SSH_ERROR_STATUS: i32 = 255;

#[derive(Error, Debug)]
pub enum RemoteError {
    /// Host not reachable yet (no route, refused, sshd not started)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// sshd is up but the key is not installed yet
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Conditions expected while a fresh node is still booting
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            RemoteError::Connection(_) | RemoteError::Authentication(_)
        )
    }
}

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Target description for logs, e.g. `ubuntu@smithi001`
    fn target(&self) -> String;

    /// Establish (or probe) the connection
    async fn connect(&self) -> Result<(), RemoteError>;

    /// Run a shell command, returning its stdout
    async fn run(&self, command: &str, timeout: Duration) -> Result<String, RemoteError>;
}

/// `ssh` based transport
#[derive(Debug, Clone)]
pub struct SshRemote {
    user: String,
    host: String,
    connect_timeout: Duration,
}

impl SshRemote {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn args(&self, command: &str) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            // Fresh nodes always present an unknown host key
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            self.target(),
            command.to_string(),
        ]
    }

    async fn exec(&self, command: &str) -> Result<String, RemoteError> {
        let mut cmd = Command::new("ssh");
        cmd.args(self.args(command));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::trace!("Running on {}: {}", self.target(), command);

        let output = cmd.output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).to_string()),
            Some(SSH_ERROR_STATUS) => Err(classify_ssh_failure(stderr)),
            Some(status) => Err(RemoteError::CommandFailed { status, stderr }),
            None => Err(RemoteError::CommandFailed { status: -1, stderr }),
        }
    }
}

fn classify_ssh_failure(stderr: String) -> RemoteError {
    if stderr.contains("Permission denied") || stderr.contains("Too many authentication failures")
    {
        RemoteError::Authentication(stderr)
    } else {
        RemoteError::Connection(stderr)
    }
}

#[async_trait]
impl RemoteTransport for SshRemote {
    fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    async fn connect(&self) -> Result<(), RemoteError> {
        self.exec("true").await.map(|_| ())
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<String, RemoteError> {
        match tokio::time::timeout(timeout, self.exec(command)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_args() {
        let remote = SshRemote::new("ubuntu", "smithi001");
        let args = remote.args("uptime");

        assert_eq!(remote.target(), "ubuntu@smithi001");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert_eq!(args[args.len() - 2], "ubuntu@smithi001");
        assert_eq!(args[args.len() - 1], "uptime");
    }

    #[test]
    fn test_classify_ssh_failure() {
        assert!(matches!(
            classify_ssh_failure("ubuntu@node: Permission denied (publickey).".to_string()),
            RemoteError::Authentication(_)
        ));
        assert!(matches!(
            classify_ssh_failure(
                "ssh: connect to host node port 22: Connection refused".to_string()
            ),
            RemoteError::Connection(_)
        ));
    }

    #[test]
    fn test_not_ready_conditions() {
        assert!(RemoteError::Connection("no route".into()).is_not_ready());
        assert!(RemoteError::Authentication("denied".into()).is_not_ready());
        assert!(!RemoteError::Timeout(Duration::from_secs(1)).is_not_ready());
        assert!(
            !RemoteError::CommandFailed {
                status: 1,
                stderr: String::new()
            }
            .is_not_ready()
        );
    }
}
