use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use crate::{
    config::SandboxLimits,
    constants::{OUTPUT_EXCEEDED_MSG, READ_CHUNK_SIZE, TRUNCATION_MARKER},
    core::traits::runner::{Invocation, ProcessRunner, RunOutcome, Termination},
    native::sandbox,
};

/// Runs invocations as plain child processes of this one.
#[derive(Clone, Debug)]
pub struct NativeRunner {
    max_output_chars: usize,
    sandbox: SandboxLimits,
}

impl NativeRunner {
    pub fn new(max_output_chars: usize, sandbox: SandboxLimits) -> Self {
        NativeRunner {
            max_output_chars,
            sandbox,
        }
    }

    /// Drives a launched child to exactly one terminal state.
    async fn supervise(&self, child: &mut Child, timeout: Duration) -> RunOutcome {
        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            sandbox::kill_tree(child);
            return launch_failed("child stdio was not captured".to_string());
        };

        // The id is gone from `child` once it has been reaped.
        let leader = child.id();

        let mut out = Capture::new(self.max_output_chars);
        let mut err = Capture::new(self.max_output_chars);
        let mut out_buf = vec![0u8; READ_CHUNK_SIZE];
        let mut err_buf = vec![0u8; READ_CHUNK_SIZE];
        let mut stdout_open = true;
        let mut stderr_open = true;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                _ = &mut deadline => {
                    sandbox::kill_tree(child);
                    let timeout_ms = timeout.as_millis();
                    tracing::warn!(
                        timeout_ms = timeout_ms as u64,
                        "execution timed out, process killed"
                    );
                    return RunOutcome {
                        termination: Termination::TimedOut { limit: timeout },
                        stdout: out.into_string().trim().to_string(),
                        stderr: Some(format!("Execution timed out after {}ms", timeout_ms)),
                    };
                }
                read = stdout.read(&mut out_buf), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => {
                        out.push(&out_buf[..n]);
                        if out.exceeds_limit() {
                            sandbox::kill_tree(child);
                            tracing::warn!(
                                limit_chars = self.max_output_chars,
                                "stdout exceeded limit, process killed"
                            );
                            return RunOutcome {
                                termination: Termination::OutputOverflowed {
                                    limit_chars: self.max_output_chars,
                                },
                                stdout: out.into_truncated(),
                                stderr: Some(OUTPUT_EXCEEDED_MSG.to_string()),
                            };
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "stdout read failed");
                        stdout_open = false;
                    }
                },
                read = stderr.read(&mut err_buf), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => err.push_bounded(&err_buf[..n]),
                    Err(e) => {
                        tracing::debug!(error = %e, "stderr read failed");
                        stderr_open = false;
                    }
                },
                status = child.wait(), if !stdout_open && !stderr_open => break status,
            }
        };

        // Detached descendants must not outlive the run.
        sandbox::kill_group(leader);

        let stdout = out.into_string().trim().to_string();
        let mut stderr = err.into_string().trim().to_string();

        let code = match status {
            Ok(status) => {
                if stderr.is_empty() {
                    stderr = signal_message(&status).unwrap_or_default();
                }
                status.code()
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to wait for process");
                if stderr.is_empty() {
                    stderr = format!("Failed to wait for process: {}", e);
                }
                None
            }
        };

        tracing::debug!(?code, "process exited");

        RunOutcome {
            termination: Termination::Exited { code },
            stdout,
            stderr: (!stderr.is_empty()).then_some(stderr),
        }
    }
}

#[async_trait::async_trait]
impl ProcessRunner for NativeRunner {
    #[tracing::instrument(skip(self, invocation), fields(program = ?invocation.program))]
    async fn run(&self, invocation: &Invocation) -> RunOutcome {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        sandbox::configure(&mut cmd, &self.sandbox);

        tracing::debug!(
            "Spawning: args={:?}, timeout={:?}",
            invocation.args,
            invocation.timeout
        );

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(error = %e, "failed to launch process");
                return launch_failed(e.to_string());
            }
        };

        feed_stdin(&mut child, invocation.stdin.clone());

        self.supervise(&mut child, invocation.timeout).await
    }
}

/// Writes the payload, if any, and closes stdin so the child sees EOF.
fn feed_stdin(child: &mut Child, payload: Option<String>) {
    let Some(mut handle) = child.stdin.take() else {
        return;
    };
    let Some(payload) = payload else {
        return;
    };

    // A separate task so a child that never reads cannot stall output capture.
    tokio::spawn(async move {
        if let Err(e) = handle.write_all(payload.as_bytes()).await {
            tracing::debug!(error = %e, "child closed stdin early");
        }
    });
}

fn launch_failed(msg: String) -> RunOutcome {
    RunOutcome {
        termination: Termination::LaunchFailed { msg: msg.clone() },
        stdout: String::new(),
        stderr: Some(msg),
    }
}

#[cfg(unix)]
fn signal_message(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status
        .signal()
        .map(|signal| format!("Process terminated by signal {}", signal))
}

#[cfg(not(unix))]
fn signal_message(_status: &ExitStatus) -> Option<String> {
    None
}

/// Raw bytes read from one pipe, measured in characters.
#[derive(Debug)]
struct Capture {
    bytes: Vec<u8>,
    limit_chars: usize,
    clamped: bool,
}

impl Capture {
    fn new(limit_chars: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit_chars,
            clamped: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Accumulates up to the limit and silently drops the rest.
    fn push_bounded(&mut self, chunk: &[u8]) {
        if self.clamped {
            return;
        }
        self.push(chunk);
        if self.exceeds_limit() {
            let kept: String = self.text().chars().take(self.limit_chars).collect();
            self.bytes = kept.into_bytes();
            self.clamped = true;
        }
    }

    fn exceeds_limit(&self) -> bool {
        // A char is at least one byte.
        self.bytes.len() > self.limit_chars && complete_chars(&self.bytes) > self.limit_chars
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    fn into_truncated(self) -> String {
        let mut text: String = self.text().chars().take(self.limit_chars).collect();
        text.push_str(TRUNCATION_MARKER);
        text
    }

    fn into_string(self) -> String {
        let mut text = self.text();
        if self.clamped {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Counts characters, ignoring a multi-byte sequence cut off at the end.
fn complete_chars(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.chars().count(),
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..e.valid_up_to()])
                .chars()
                .count()
        }
        Err(_) => String::from_utf8_lossy(bytes).chars().count(),
    }
}
