//! TokioProcessRunner - tokio::process による ProcessRunner 実装
//!
//! Program and arguments go straight to `Command` (no shell), stdin is
//! closed, stdout/stderr are captured. The child is killed when the timeout
//! elapses.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::ports::{ProcessError, ProcessOutput, ProcessRunner, ProcessSpec};

/// Captured output beyond this is dropped (the transport can be chatty).
const MAX_OUTPUT_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Drain `reader` to the end (the child blocks on a full pipe otherwise),
/// keeping at most `limit` bytes.
async fn read_capped<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
) -> std::io::Result<String> {
    let Some(mut reader) = reader else {
        return Ok(String::new());
    };
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8 * 1024];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok(String::from_utf8_lossy(&kept).into_owned())
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let result = tokio::time::timeout(spec.timeout, async {
            let (stdout, stderr, status) = tokio::join!(
                read_capped(stdout, MAX_OUTPUT_SIZE),
                read_capped(stderr, MAX_OUTPUT_SIZE),
                child.wait()
            );
            Ok::<_, std::io::Error>((stdout?, stderr?, status?))
        })
        .await;

        match result {
            Ok(Ok((stdout, stderr, status))) => Ok(ProcessOutput {
                exit_code: status.code(),
                stdout,
                stderr,
            }),
            Ok(Err(source)) => Err(ProcessError::Wait {
                program: spec.program.clone(),
                source,
            }),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(
                        program = %spec.program,
                        error = %e,
                        "failed to kill timed out process"
                    );
                }
                Err(ProcessError::TimedOut {
                    program: spec.program.clone(),
                    timeout: spec.timeout,
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn captures_exit_code_and_output() {
        let spec = ProcessSpec::new("sh").args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let output = TokioProcessRunner::new().run(&spec).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec::new("sh")
            .args(["-c", "echo hi > marker"])
            .with_working_dir(dir.path().to_path_buf());
        let output = TokioProcessRunner::new().run(&spec).await.unwrap();

        assert!(output.success());
        assert!(dir.path().join("marker").is_file());
    }

    #[tokio::test]
    async fn read_capped_keeps_prefix_and_drains_the_rest() {
        let input = vec![b'x'; 20_000];
        let text = read_capped(Some(input.as_slice()), 10).await.unwrap();
        assert_eq!(text, "xxxxxxxxxx");

        let text = read_capped(None::<&[u8]>, 10).await.unwrap();
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn large_output_is_capped_without_blocking_the_child() {
        let spec = ProcessSpec::new("sh").args(["-c", "head -c 200000 /dev/zero; exit 0"]);
        let output = TokioProcessRunner::new().run(&spec).await.unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.len(), MAX_OUTPUT_SIZE);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let spec = ProcessSpec::new("/nonexistent/courier-transport");
        let err = TokioProcessRunner::new().run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn times_out() {
        let spec = ProcessSpec::new("sleep")
            .arg("5")
            .with_timeout(Duration::from_millis(100));
        let err = TokioProcessRunner::new().run(&spec).await.unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }
}
