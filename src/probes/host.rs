use crate::error::{Result, VerifyError};
use crate::utils::error::compact_error_message;
use crate::utils::retry::{poll_until, Attempt, PollPolicy};
use async_trait::async_trait;
use std::fmt;
use tokio::process::Command;

const HOST_ERR_MAX_LEN: usize = 400;

/// systemd `ActiveState` of a unit, as far as readiness is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitState {
    Active,
    Activating,
    Inactive,
    Failed,
    Other(String),
}

impl UnitState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "active" => Self::Active,
            "activating" | "reloading" => Self::Activating,
            "inactive" | "deactivating" => Self::Inactive,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Activating => f.write_str("activating"),
            Self::Inactive => f.write_str("inactive"),
            Self::Failed => f.write_str("failed"),
            Self::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// The machine the pipeline runs on: unit supervisor plus journal.
#[async_trait]
pub trait Host: Send + Sync {
    /// Bring the machine up (or confirm it is reachable).
    async fn start(&self) -> Result<()>;
    async fn unit_state(&self, unit: &str) -> Result<UnitState>;
    /// Complete journal of a unit.
    async fn journal(&self, unit: &str) -> Result<String>;
}

/// Shells out to `systemctl`/`journalctl`, locally or through `ssh <target>`.
pub struct SystemdHost {
    ssh_target: Option<String>,
}

impl SystemdHost {
    pub fn local() -> Self {
        Self { ssh_target: None }
    }

    pub fn over_ssh(target: impl Into<String>) -> Self {
        Self {
            ssh_target: Some(target.into()),
        }
    }

    pub fn from_target(target: Option<&str>) -> Self {
        match target {
            Some(target) => Self::over_ssh(target),
            None => Self::local(),
        }
    }

    fn command(&self, program: &str, args: &[&str]) -> (Command, String) {
        let rendered = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        match &self.ssh_target {
            Some(target) => {
                let mut cmd = Command::new("ssh");
                cmd.args(["-o", "BatchMode=yes", target.as_str(), "--", program])
                    .args(args);
                (cmd, format!("ssh {target} -- {rendered}"))
            }
            None => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                (cmd, rendered)
            }
        }
    }

    /// Run and capture stdout. `allow_failure` keeps stdout of a non-zero exit.
    async fn run(&self, program: &str, args: &[&str], allow_failure: bool) -> Result<String> {
        let (mut cmd, rendered) = self.command(program, args);
        let output = cmd
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VerifyError::HostCommand {
                command: rendered.clone(),
                detail: e.to_string(),
            })?;
        if !output.status.success() && !allow_failure {
            return Err(VerifyError::HostCommand {
                command: rendered,
                detail: compact_error_message(
                    &format!(
                        "exit {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr)
                    ),
                    HOST_ERR_MAX_LEN,
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Host for SystemdHost {
    async fn start(&self) -> Result<()> {
        self.run("true", &[], false).await.map(|_| ())
    }

    async fn unit_state(&self, unit: &str) -> Result<UnitState> {
        // `is-active` exits non-zero for every state but `active`; the state is on stdout.
        let stdout = self.run("systemctl", &["is-active", unit], true).await?;
        Ok(UnitState::parse(&stdout))
    }

    async fn journal(&self, unit: &str) -> Result<String> {
        self.run("journalctl", &["-u", unit, "--no-pager"], false)
            .await
    }
}

/// Wait until `unit` reports active. A `failed` unit aborts without waiting out the timeout.
pub async fn wait_for_unit_active(host: &dyn Host, unit: &str, policy: PollPolicy) -> Result<()> {
    poll_until(policy, |_| async move {
        match host.unit_state(unit).await {
            Ok(UnitState::Active) => Attempt::Ready(()),
            Ok(UnitState::Failed) => Attempt::Abort(VerifyError::ServiceNotReady {
                service: unit.to_string(),
                waited: std::time::Duration::ZERO,
                last_state: UnitState::Failed.to_string(),
            }),
            Ok(state) => Attempt::Pending(state.to_string()),
            Err(err) => Attempt::Pending(err.to_string()),
        }
    })
    .await
    .map_err(|failure| {
        failure.into_error(|exhausted| VerifyError::ServiceNotReady {
            service: unit.to_string(),
            waited: exhausted.waited,
            last_state: exhausted.last_observation,
        })
    })?;
    tracing::info!("[READY] ✓ unit {} is active", unit);
    Ok(())
}
