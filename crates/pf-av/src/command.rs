//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Output of [`ToolCommand::run_streaming`].
#[derive(Debug, Clone)]
pub struct StreamedOutput {
    /// Process exit status. Not checked; the caller decides what it means.
    pub status: ExitStatus,
    /// Every line the tool printed, in arrival order.
    pub log: String,
}

impl StreamedOutput {
    /// Exit code, or `-1` when the process was terminated by a signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }
}

/// Sink for log lines produced while a tool is running.
pub struct LogSender {
    callback: Box<dyn Fn(&str) + Send + Sync>,
}

impl LogSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all lines.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    /// Forward one line.
    pub fn send(&self, line: &str) {
        (self.callback)(line);
    }
}

impl std::fmt::Debug for LogSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSender").finish_non_exhaustive()
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use pf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> pf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-encoders")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The program followed by its arguments, space separated.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn spawn(&self) -> pf_core::Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Spawning: {}", self.command_line());

        cmd.spawn()
            .map_err(|e| pf_core::Error::tool(self.program_name(), format!("failed to spawn: {e}")))
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`pf_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration).
    /// - Returns [`pf_core::Error::Tool`] if the process exits with a non-zero
    ///   status (message includes stderr).
    /// - Returns [`pf_core::Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> pf_core::Result<ToolOutput> {
        let program_name = self.program_name();
        let child = self.spawn()?;

        // On timeout the future is dropped and kill_on_drop reaps the child.
        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(pf_core::Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(pf_core::Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => Err(pf_core::Error::tool(
                program_name,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }

    /// Run the command, forwarding each output line to `log` as it arrives.
    ///
    /// Both stdout and stderr are read line by line into a single log. The
    /// exit status is returned as-is, so a non-zero exit is *not* an error
    /// here.
    ///
    /// # Errors
    ///
    /// - [`pf_core::Error::Tool`] if spawning fails or the timeout elapses.
    /// - [`pf_core::Error::Cancelled`] if `cancel` fires first.
    ///
    /// In both of the last two cases the child is killed before returning.
    pub async fn run_streaming(
        &self,
        log: &LogSender,
        cancel: &CancellationToken,
    ) -> pf_core::Result<StreamedOutput> {
        let program_name = self.program_name();
        let mut child = self.spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| pf_core::Error::Internal("child stderr was not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| pf_core::Error::Internal("child stdout was not piped".into()))?;

        // Raw bytes, decoded lossily: ffmpeg echoes file names and metadata
        // that need not be UTF-8. Both pipes are drained to EOF so the child
        // never blocks on a full pipe.
        let mut err_reader = BufReader::new(stderr);
        let mut out_reader = BufReader::new(stdout);
        let mut err_buf = Vec::new();
        let mut out_buf = Vec::new();
        let mut err_open = true;
        let mut out_open = true;
        let mut captured = String::new();

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut record = |buf: &mut Vec<u8>| {
            let line = decode_line(buf);
            buf.clear();
            log.send(&line);
            captured.push_str(&line);
            captured.push('\n');
        };

        while err_open || out_open {
            tokio::select! {
                read = err_reader.read_until(b'\n', &mut err_buf), if err_open => match read {
                    Ok(0) => err_open = false,
                    Ok(_) => record(&mut err_buf),
                    Err(e) => {
                        tracing::warn!("Failed reading {program_name} stderr: {e}");
                        err_open = false;
                    }
                },
                read = out_reader.read_until(b'\n', &mut out_buf), if out_open => match read {
                    Ok(0) => out_open = false,
                    Ok(_) => record(&mut out_buf),
                    Err(e) => {
                        tracing::warn!("Failed reading {program_name} stdout: {e}");
                        out_open = false;
                    }
                },
                _ = &mut deadline => {
                    kill(&mut child, &program_name).await;
                    return Err(pf_core::Error::tool(
                        program_name,
                        format!("timed out after {:?}", self.timeout),
                    ));
                }
                _ = cancel.cancelled() => {
                    kill(&mut child, &program_name).await;
                    return Err(pf_core::Error::Cancelled(format!("{program_name} was cancelled")));
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| {
                pf_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
            })?,
            _ = &mut deadline => {
                kill(&mut child, &program_name).await;
                return Err(pf_core::Error::tool(
                    program_name,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
            _ = cancel.cancelled() => {
                kill(&mut child, &program_name).await;
                return Err(pf_core::Error::Cancelled(format!("{program_name} was cancelled")));
            }
        };

        Ok(StreamedOutput {
            status,
            log: captured,
        })
    }
}

/// One line of tool output without its terminator.
fn decode_line(buf: &[u8]) -> String {
    let end = buf
        .iter()
        .rposition(|b| !matches!(b, b'\n' | b'\r'))
        .map_or(0, |i| i + 1);
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

async fn kill(child: &mut Child, program_name: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill {program_name}: {e}");
    }
}
