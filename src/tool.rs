//! External process invocation with drained output streams

use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// Everything an external tool left behind
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Turn a non-zero exit into a typed failure carrying stderr
    pub fn into_result(self, tool: &str) -> Result<ToolOutput> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(PipelineError::ToolFailed {
                tool: tool.to_string(),
                status: self.status.to_string(),
                stderr: tail(&self.stderr, 2000),
            })
        }
    }
}

/// Spawn `cmd`, feed it `stdin` if given, and wait for exit.
///
/// Input is written while both output streams are read to EOF, so neither
/// side blocks on a full pipe. On timeout the child is killed and reaped.
pub async fn run_tool(
    mut cmd: Command,
    tool: &str,
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<ToolOutput> {
    let start_time = Instant::now();

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);

    debug!("Executing command: {:?}", cmd);

    let mut child = cmd.spawn().map_err(|source| PipelineError::ToolSpawn {
        tool: tool.to_string(),
        source,
    })?;

    let stdin_pipe = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let feed = async move {
        if let (Some(input), Some(mut pipe)) = (stdin, stdin_pipe) {
            pipe.write_all(input).await?;
            // closing stdin signals EOF to filters such as kakasi
            drop(pipe);
        }
        Ok::<(), std::io::Error>(())
    };

    let drained = async {
        let (fed, out, err) = tokio::join!(
            feed,
            drain(stdout, tool, "stdout"),
            drain(stderr, tool, "stderr")
        );
        let status = child.wait().await;
        (fed, out, err, status)
    };

    let (fed, stdout, stderr, status) = match tokio::time::timeout(timeout, drained).await {
        Ok(result) => result,
        Err(_) => {
            warn!("⏰ {} timed out after {:.1}s", tool, start_time.elapsed().as_secs_f64());
            let _ = child.kill().await;
            return Err(PipelineError::ToolTimeout {
                tool: tool.to_string(),
                timeout,
            });
        }
    };

    fed.map_err(|e| PipelineError::io(tool, e))?;
    let status = status.map_err(|e| PipelineError::io(tool, e))?;
    let elapsed = start_time.elapsed();
    debug!("{} finished with {} in {:.2}s", tool, status, elapsed.as_secs_f64());

    Ok(ToolOutput {
        status,
        stdout,
        stderr,
        elapsed,
    })
}

async fn drain<R: AsyncRead + Unpin>(stream: Option<R>, tool: &str, label: &str) -> String {
    let Some(stream) = stream else {
        return String::new();
    };

    let mut collected = String::new();
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    debug!("{} {}: {}", tool, label, line);
                }
                collected.push_str(&line);
                collected.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading {} {}: {}", tool, label, e);
                break;
            }
        }
    }
    collected
}

/// Opt-in bounded retry with exponential backoff.
///
/// Only transient failures are retried; `max_retries == 0` runs once.
pub async fn with_retries<T, F, Fut>(
    what: &str,
    max_retries: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && e.is_transient() => {
                let delay = backoff * 2u32.saturating_pow(attempt);
                attempt += 1;
                info!(
                    "🔁 {} failed ({}), retry {}/{} in {}ms",
                    what,
                    e,
                    attempt,
                    max_retries,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Last `max_chars` characters of trimmed tool output
pub fn tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - max_chars).collect()
    }
}
