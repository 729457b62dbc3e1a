//! External command execution with captured output and a hard timeout

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::config::redact_args;
use crate::error::{HarnessError, HarnessResult};

/// Grace period between SIGTERM and SIGKILL for a timed-out command
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Captured result of a finished command. A nonzero exit code is a normal result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub argv: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Convert a nonzero exit into [`HarnessError::CommandFailed`]
    pub fn into_success(self) -> HarnessResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(HarnessError::CommandFailed {
                command: redact_args(&self.argv).join(" "),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    /// Parse stdout as JSON
    pub fn json(&self) -> HarnessResult<serde_json::Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }
}

/// Runs executables with a timeout
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    default_timeout: Duration,
    env: Vec<(String, String)>,
}

impl CommandExecutor {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            env: Vec::new(),
        }
    }

    /// Add an environment variable to every spawned command
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run with the default timeout
    pub async fn run_default(&self, argv: &[String]) -> HarnessResult<CommandOutput> {
        self.run(argv, self.default_timeout).await
    }

    /// Run `argv[0]` with the remaining arguments.
    ///
    /// Fails only when the executable cannot be found or the command outlives `timeout`.
    pub async fn run(&self, argv: &[String], timeout: Duration) -> HarnessResult<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| HarnessError::Config("empty command line".to_string()))?;
        let printable = redact_args(argv).join(" ");
        debug!("Running: {}", printable);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own process group, so a timeout also reaches background children
        #[cfg(unix)]
        cmd.process_group(0);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HarnessError::ExecutableNotFound(program.clone())
            } else {
                HarnessError::Io(e)
            }
        })?;

        let pid = child.id();
        let mut stdout = spawn_reader(child.stdout.take());
        let mut stderr = spawn_reader(child.stderr.take());

        // one deadline for the exit and for both pipes reaching EOF
        let finished = tokio::time::timeout(timeout, async {
            tokio::try_join!(
                async { Ok::<_, HarnessError>(child.wait().await?) },
                collect(&mut stdout),
                collect(&mut stderr),
            )
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(result) => result?,
            Err(_) => {
                warn!("Command timed out after {:?}: {}", timeout, printable);
                terminate(&mut child, pid).await;
                stdout.abort();
                stderr.abort();
                return Err(HarnessError::CommandTimeout {
                    command: printable,
                    timeout,
                });
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status_code(&status);

        debug!("Exit {} after {} ms: {}", exit_code, duration_ms, printable);

        Ok(CommandOutput {
            argv: argv.to_vec(),
            stdout,
            stderr,
            exit_code,
            duration_ms,
        })
    }
}

type ReaderHandle = tokio::task::JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_reader<R>(pipe: Option<R>) -> ReaderHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

async fn collect(handle: &mut ReaderHandle) -> HarnessResult<String> {
    let bytes = handle
        .await
        .map_err(|e| HarnessError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// SIGTERM the whole process group, then SIGKILL whatever outlived the grace period
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = pid {
            let group = Pid::from_raw(pid as i32);
            if killpg(group, Signal::SIGTERM).is_ok() {
                let _ = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await;
            }
            let _ = killpg(group, Signal::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    let _ = child.kill().await;
}

fn status_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let out = executor
            .run_default(&argv(&["sh", "-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());

        let err = out.into_success().unwrap_err();
        assert!(matches!(err, HarnessError::CommandFailed { exit_code: 3, .. }));
    }

    #[tokio::test]
    async fn test_missing_executable_is_distinct() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let err = executor
            .run_default(&argv(&["definitely-not-a-real-binary-7f3a"]))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::ExecutableNotFound(ref p) if p == "definitely-not-a-real-binary-7f3a"));
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let start = Instant::now();
        let err = executor
            .run(&argv(&["sleep", "30"]), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::CommandTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_timeout_covers_inherited_pipes() {
        // the shell exits at once but its background child keeps stdout open
        let executor = CommandExecutor::new(Duration::from_secs(10));
        let start = Instant::now();
        let err = executor
            .run(&argv(&["sh", "-c", "sleep 6 & echo started"]), Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::CommandTimeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_env_and_json() {
        let executor = CommandExecutor::new(Duration::from_secs(10)).with_env("MTV_E2E_PROBE", "42");
        let out = executor
            .run_default(&argv(&["sh", "-c", "printf '{\"probe\": %s}' \"$MTV_E2E_PROBE\""]))
            .await
            .unwrap();
        assert_eq!(out.json().unwrap()["probe"], 42);
    }

    #[tokio::test]
    async fn test_empty_argv_rejected() {
        let executor = CommandExecutor::new(Duration::from_secs(1));
        assert!(executor.run_default(&[]).await.is_err());
    }
}
