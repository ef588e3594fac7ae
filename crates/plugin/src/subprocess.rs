//! Production subprocess host
//!
//! Spawns plugin executables (`upd-plugin-<name>`) with piped output, puts
//! each in its own process group so termination reaches descendants, and
//! turns output lines into stream events as they arrive.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};
use upd_errors::{Error, PluginError};
use upd_events::StreamEvent;
use upd_types::PluginDescriptor;

use crate::command::PluginCommand;
use crate::host::{PhaseProcess, ProcessHost};
use crate::protocol::parse_stderr_line;

/// Spawns real plugin subprocesses.
#[derive(Debug, Clone, Default)]
pub struct SubprocessHost {
    plugin_dir: Option<PathBuf>,
}

impl SubprocessHost {
    /// Host resolving plugin executables on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host resolving plugin executables under `dir` first.
    #[must_use]
    pub fn with_plugin_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            plugin_dir: Some(dir.into()),
        }
    }

    fn program_for(&self, plugin: &PluginDescriptor) -> PathBuf {
        let name = format!("upd-plugin-{}", plugin.name);
        match &self.plugin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

#[async_trait]
impl ProcessHost for SubprocessHost {
    async fn spawn(
        &self,
        plugin: &PluginDescriptor,
        command: PluginCommand,
    ) -> Result<Box<dyn PhaseProcess>, Error> {
        let program = self.program_for(plugin);
        let mut cmd = Command::new(&program);
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so group signals reach every descendant.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::Plugin(PluginError::NotFound {
                    program: program.display().to_string(),
                })
            } else {
                Error::Plugin(PluginError::SpawnFailed {
                    plugin: plugin.name.clone(),
                    phase: command.to_string(),
                    message: e.to_string(),
                })
            }
        })?;

        debug!(plugin = %plugin.name, command = %command, pid = ?child.id(), "spawned plugin subprocess");

        let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
        let stderr = child.stderr.take().map(|s| BufReader::new(s).lines());
        Ok(Box::new(SubprocessPhase {
            plugin: plugin.name.clone(),
            child,
            stdout,
            stderr,
            exit_sent: false,
        }))
    }
}

struct SubprocessPhase {
    plugin: String,
    child: Child,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr: Option<Lines<BufReader<ChildStderr>>>,
    exit_sent: bool,
}

impl SubprocessPhase {
    async fn wait_exit_code(&mut self) -> i32 {
        match self.child.wait().await {
            Ok(status) => exit_code(status),
            Err(e) => {
                warn!(plugin = %self.plugin, error = %e, "failed to reap plugin subprocess");
                -1
            }
        }
    }
}

#[async_trait]
impl PhaseProcess for SubprocessPhase {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            match (self.stdout.as_mut(), self.stderr.as_mut()) {
                (None, None) => {
                    if self.exit_sent {
                        return None;
                    }
                    self.exit_sent = true;
                    let code = self.wait_exit_code().await;
                    return Some(StreamEvent::Exit { code });
                }
                (Some(stdout), Some(stderr)) => {
                    tokio::select! {
                        line = stdout.next_line() => match line {
                            Ok(Some(text)) => return Some(StreamEvent::Output { text }),
                            _ => self.stdout = None,
                        },
                        line = stderr.next_line() => match line {
                            Ok(Some(text)) => return Some(parse_stderr_line(&text)),
                            _ => self.stderr = None,
                        },
                    }
                }
                (Some(stdout), None) => match stdout.next_line().await {
                    Ok(Some(text)) => return Some(StreamEvent::Output { text }),
                    _ => self.stdout = None,
                },
                (None, Some(stderr)) => match stderr.next_line().await {
                    Ok(Some(text)) => return Some(parse_stderr_line(&text)),
                    _ => self.stderr = None,
                },
            }
        }
    }

    async fn terminate(&mut self, grace: Duration) -> Result<(), Error> {
        let Some(pid) = self.child.id() else {
            return Ok(()); // already exited
        };

        signal_group(pid, TerminationSignal::Graceful);
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!(plugin = %self.plugin, pid, grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    "plugin did not exit within grace period, killing process group");
                signal_group(pid, TerminationSignal::Forced);
                let _ = self.child.wait().await;
                Err(PluginError::TerminationForced {
                    plugin: self.plugin.clone(),
                    grace_ms: u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                }
                .into())
            }
        }
    }
}

enum TerminationSignal {
    Graceful,
    Forced,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: TerminationSignal) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let signal = match signal {
        TerminationSignal::Graceful => Signal::SIGTERM,
        TerminationSignal::Forced => Signal::SIGKILL,
    };
    #[allow(clippy::cast_possible_wrap)]
    if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
        debug!(pid, %signal, error = %e, "process group signal failed (group may be gone)");
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: TerminationSignal) {}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
