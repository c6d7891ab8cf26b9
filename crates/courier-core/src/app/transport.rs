//! TransportInvoker - 外部 transport プロセスの呼び出し
//!
//! One attempt:
//! 1. write the document to `<scratch>/<attempt>.xml`
//! 2. create `<scratch>/<attempt>-evidence/`
//! 3. run `<command> -f <input> -s <sender> -r <receiver> -e <evidence> -cert <cert> --protocol <protocol>`
//! 4. exit 0 and at least one evidence file: concatenate them (file-name order)
//! 5. remove both scratch resources, whatever happened

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{AttemptId, Evidence, PipelineError, RejectReason, RoutingIdentifiers};
use crate::ports::{ProcessRunner, ProcessSpec};

pub const DEFAULT_COMMAND: &str = "sh /oxalis/bin-standalone/run-docker.sh";
pub const DEFAULT_PROTOCOL: &str = "peppol-transport-as4-v2_0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Program followed by its leading arguments.
    pub command: Vec<String>,
    pub cert_path: PathBuf,
    pub protocol: String,
    pub timeout: Duration,
    pub scratch_dir: PathBuf,
}

impl TransportSettings {
    pub fn new(cert_path: impl Into<PathBuf>) -> Self {
        Self {
            command: split_command(DEFAULT_COMMAND),
            cert_path: cert_path.into(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = split_command(command);
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Whitespace split; the command line is not shell-interpreted.
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Per-attempt scratch paths.
#[derive(Debug, Clone)]
struct Scratch {
    input: PathBuf,
    evidence_dir: PathBuf,
}

impl Scratch {
    fn for_attempt(root: &Path, attempt: AttemptId) -> Self {
        Self {
            input: root.join(format!("{attempt}.xml")),
            evidence_dir: root.join(format!("{attempt}-evidence")),
        }
    }

    /// Best effort; failures are logged, never returned.
    async fn cleanup(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.input).await {
            if e.kind() != IoErrorKind::NotFound {
                tracing::warn!(
                    path = %self.input.display(),
                    error = %e,
                    "failed to remove scratch input"
                );
            }
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.evidence_dir).await {
            if e.kind() != IoErrorKind::NotFound {
                tracing::warn!(
                    path = %self.evidence_dir.display(),
                    error = %e,
                    "failed to remove evidence directory"
                );
            }
        }
    }
}

pub struct TransportInvoker {
    settings: TransportSettings,
    runner: Arc<dyn ProcessRunner>,
}

impl TransportInvoker {
    pub fn new(settings: TransportSettings, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { settings, runner }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Hand `document` to the transport process.
    pub async fn send(
        &self,
        attempt: AttemptId,
        document: &[u8],
        routing: &RoutingIdentifiers,
    ) -> Result<Evidence, PipelineError> {
        let scratch = Scratch::for_attempt(&self.settings.scratch_dir, attempt);
        let result = self.send_with_scratch(&scratch, document, routing).await;
        scratch.cleanup().await;
        result
    }

    async fn send_with_scratch(
        &self,
        scratch: &Scratch,
        document: &[u8],
        routing: &RoutingIdentifiers,
    ) -> Result<Evidence, PipelineError> {
        tracing::debug!(path = %scratch.input.display(), "saving document to scratch file");
        tokio::fs::write(&scratch.input, document)
            .await
            .map_err(|e| PipelineError::io("writing scratch document", e))?;

        tokio::fs::create_dir(&scratch.evidence_dir)
            .await
            .map_err(|e| PipelineError::io("creating evidence directory", e))?;

        let spec = self.process_spec(scratch, routing)?;
        tracing::info!(command = %spec.command_line(), %routing, "invoking transport");

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| PipelineError::io("running transport", e.into_io()))?;

        if !output.success() {
            let reason = RejectReason::ExitStatus(output.exit_code);
            tracing::error!(
                exit_code = ?output.exit_code,
                output = %output.combined(),
                "transport rejected the document"
            );
            return Err(PipelineError::TransportRejected {
                reason,
                output: output.combined(),
            });
        }
        tracing::debug!(output = %output.combined(), "transport finished");

        let evidence = read_evidence(&scratch.evidence_dir).await.map_err(|reason| {
            tracing::error!(
                %reason,
                output = %output.combined(),
                "transport produced no usable evidence"
            );
            PipelineError::TransportRejected {
                reason,
                output: output.combined(),
            }
        })?;
        Ok(evidence)
    }

    fn process_spec(
        &self,
        scratch: &Scratch,
        routing: &RoutingIdentifiers,
    ) -> Result<ProcessSpec, PipelineError> {
        let Some((program, leading)) = self.settings.command.split_first() else {
            return Err(PipelineError::io(
                "building transport command",
                std::io::Error::new(IoErrorKind::InvalidInput, "transport command is empty"),
            ));
        };

        Ok(ProcessSpec::new(program.as_str())
            .args(leading.iter().cloned())
            .arg("-f")
            .arg(scratch.input.display().to_string())
            .arg("-s")
            .arg(routing.sender.as_str())
            .arg("-r")
            .arg(routing.receiver.as_str())
            .arg("-e")
            .arg(scratch.evidence_dir.display().to_string())
            .arg("-cert")
            .arg(self.settings.cert_path.display().to_string())
            .arg("--protocol")
            .arg(self.settings.protocol.as_str())
            .with_timeout(self.settings.timeout))
    }
}

/// Concatenate the regular files in `dir` in file-name order.
async fn read_evidence(dir: &Path) -> Result<Evidence, RejectReason> {
    let unreadable = |file: &Path, e: std::io::Error| RejectReason::UnreadableEvidence {
        file: file.display().to_string(),
        error: e.to_string(),
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| unreadable(dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| unreadable(dir, e))? {
        let file_type = entry.file_type().await.map_err(|e| unreadable(&entry.path(), e))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(RejectReason::NoEvidence);
    }

    let mut bytes = Vec::new();
    for file in &files {
        let content = tokio::fs::read(file).await.map_err(|e| unreadable(file, e))?;
        bytes.extend_from_slice(&content);
    }
    Ok(Evidence::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ProcessError, ProcessOutput};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use ulid::Ulid;

    /// Writes the given evidence files into `-e` and exits with `exit_code`.
    struct ScriptedRunner {
        exit_code: Option<i32>,
        evidence: Vec<(&'static str, &'static str)>,
        seen: Mutex<Vec<ProcessSpec>>,
    }

    impl ScriptedRunner {
        fn new(exit_code: Option<i32>, evidence: Vec<(&'static str, &'static str)>) -> Arc<Self> {
            Arc::new(Self {
                exit_code,
                evidence,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
            self.seen.lock().unwrap().push(spec.clone());
            let dir = PathBuf::from(spec.flag_value("-e").unwrap());
            for (name, content) in &self.evidence {
                std::fs::write(dir.join(name), content).unwrap();
            }
            Ok(ProcessOutput {
                exit_code: self.exit_code,
                stdout: "scripted".to_string(),
                stderr: String::new(),
            })
        }
    }

    struct FailingRunner;

    #[async_trait]
    impl ProcessRunner for FailingRunner {
        async fn run(&self, spec: &ProcessSpec) -> Result<ProcessOutput, ProcessError> {
            Err(ProcessError::TimedOut {
                program: spec.program.clone(),
                timeout: spec.timeout,
            })
        }
    }

    fn routing() -> RoutingIdentifiers {
        RoutingIdentifiers::new("0192:111", "0192:222")
    }

    fn invoker(scratch: &Path, runner: Arc<dyn ProcessRunner>) -> TransportInvoker {
        let settings = TransportSettings::new("/certs/ap.p12")
            .with_command("sh /opt/transport/run.sh")
            .with_scratch_dir(scratch);
        TransportInvoker::new(settings, runner)
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn builds_command_line_and_cleans_scratch() {
        let scratch = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new(Some(0), vec![("receipt.xml", "<r/>")]);
        let attempt = AttemptId::from_ulid(Ulid::new());

        let evidence = invoker(scratch.path(), runner.clone())
            .send(attempt, b"<Invoice/>", &routing())
            .await
            .unwrap();
        assert_eq!(evidence.as_bytes(), b"<r/>");

        let spec = runner.seen.lock().unwrap().remove(0);
        assert_eq!(spec.program, "sh");
        assert_eq!(spec.args[0], "/opt/transport/run.sh");
        assert_eq!(spec.flag_value("-s"), Some("0192:111"));
        assert_eq!(spec.flag_value("-r"), Some("0192:222"));
        assert_eq!(spec.flag_value("-cert"), Some("/certs/ap.p12"));
        assert_eq!(spec.flag_value("--protocol"), Some(DEFAULT_PROTOCOL));
        assert!(spec.flag_value("-f").unwrap().ends_with(&format!("{attempt}.xml")));
        assert!(spec.flag_value("-e").unwrap().ends_with(&format!("{attempt}-evidence")));

        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn evidence_files_are_concatenated_by_name() {
        let scratch = tempfile::tempdir().unwrap();
        let runner =
            ScriptedRunner::new(Some(0), vec![("b.xml", "B"), ("a.xml", "A"), ("c.xml", "C")]);

        let evidence = invoker(scratch.path(), runner)
            .send(AttemptId::from_ulid(Ulid::new()), b"<Invoice/>", &routing())
            .await
            .unwrap();
        assert_eq!(evidence.as_bytes(), b"ABC");
    }

    #[tokio::test]
    async fn non_zero_exit_is_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new(Some(1), vec![("receipt.xml", "<r/>")]);

        let err = invoker(scratch.path(), runner)
            .send(AttemptId::from_ulid(Ulid::new()), b"<Invoice/>", &routing())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TransportRejected {
                reason: RejectReason::ExitStatus(Some(1)),
                ..
            }
        ));
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn success_without_evidence_is_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new(Some(0), vec![]);

        let err = invoker(scratch.path(), runner)
            .send(AttemptId::from_ulid(Ulid::new()), b"<Invoice/>", &routing())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TransportRejected {
                reason: RejectReason::NoEvidence,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn timeout_is_an_io_failure() {
        let scratch = tempfile::tempdir().unwrap();

        let err = invoker(scratch.path(), Arc::new(FailingRunner))
            .send(AttemptId::from_ulid(Ulid::new()), b"<Invoice/>", &routing())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn unusable_scratch_root_is_an_io_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let not_a_dir = scratch.path().join("plain-file");
        std::fs::write(&not_a_dir, b"x").unwrap();
        let runner = ScriptedRunner::new(Some(0), vec![("receipt.xml", "<r/>")]);

        let err = invoker(&not_a_dir, runner.clone())
            .send(AttemptId::from_ulid(Ulid::new()), b"<Invoice/>", &routing())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(runner.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn command_is_whitespace_split() {
        assert_eq!(
            split_command("  sh  /oxalis/bin-standalone/run-docker.sh "),
            vec!["sh".to_string(), "/oxalis/bin-standalone/run-docker.sh".to_string()]
        );
        assert!(split_command("   ").is_empty());
    }
}
