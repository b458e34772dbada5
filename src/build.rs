//! Compiling the generated document with an external make-mode LaTeX driver.
//!
//! A build owns one scratch workspace from the moment the source is written
//! until the PDF has been relayed to its destination. The driver (latexmk by
//! default) is trusted to rerun itself until cross-references settle, so a
//! single invocation is issued and awaited however long it takes.

use crate::config::{DEFAULT_COMPILER, DEFAULT_COMPILER_ARGS, NotebookConfig};
use crate::error::{NotebookError, Result};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Name of the document source inside the scratch workspace
pub const SOURCE_FILE_NAME: &str = "_notebook.tex";

/// Extension of the artifact the compiler leaves next to the source
pub const OUTPUT_EXTENSION: &str = "pdf";

/// How many trailing bytes of compiler output are logged on failure
const LOG_TAIL_BYTES: usize = 2048;

/// External compiler invocation settings
#[derive(Debug, Clone)]
pub struct Compiler {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    keep_scratch: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self {
            program: DEFAULT_COMPILER.to_string(),
            args: DEFAULT_COMPILER_ARGS.iter().map(ToString::to_string).collect(),
            timeout: None,
            keep_scratch: false,
        }
    }
}

impl Compiler {
    /// A compiler with the given leading arguments; the source path is appended last
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &NotebookConfig) -> Self {
        Self {
            program: config.compiler.clone(),
            args: config.compiler_args.clone(),
            timeout: config.timeout,
            keep_scratch: config.keep_scratch,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn keep_scratch(mut self, keep: bool) -> Self {
        self.keep_scratch = keep;
        self
    }

    /// Compiles `source` in a fresh scratch workspace.
    ///
    /// On success the returned artifact owns the workspace; it is removed once
    /// the artifact is delivered (or dropped). On any failure the workspace is
    /// removed immediately, unless `keep_scratch` is set and the compiler ran
    /// without producing output, in which case it is left for inspection.
    ///
    /// # Errors
    ///
    /// - `NotebookError::Io` if the workspace or the source file cannot be written.
    /// - `NotebookError::Spawn` if the compiler cannot be started.
    /// - `NotebookError::Timeout` if the compiler outlives the configured timeout.
    ///   Only the driver process itself is killed; engine runs it started
    ///   (xelatex, pygmentize) are not tracked and may outlive it.
    /// - `NotebookError::BuildFailed` if the compiler exits without leaving a PDF.
    pub async fn build(&self, source: &str) -> Result<BuildArtifact> {
        let workspace = tempfile::Builder::new().prefix("notebookgen-").tempdir()?;
        let source_path = workspace.path().join(SOURCE_FILE_NAME);
        let output_path = source_path.with_extension(OUTPUT_EXTENSION);

        write_source(&source_path, source).await?;
        debug!(path = %source_path.display(), bytes = source.len(), "document source written");

        let started_at = Instant::now();
        let output = self.run(workspace.path(), &source_path).await?;
        let (code, signal) = exit_details(output.status);
        info!(
            program = %self.program,
            exit_code = ?code,
            signal = ?signal,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "compiler finished"
        );

        // the exit status alone is not trusted: latexmk may report errors yet
        // still leave a usable PDF behind
        if tokio::fs::try_exists(&output_path).await? {
            return Ok(BuildArtifact {
                workspace,
                path: output_path,
            });
        }

        warn!(
            stdout = %tail(&output.stdout),
            stderr = %tail(&output.stderr),
            "compiler produced no document"
        );
        let kept = if self.keep_scratch {
            Some(workspace.keep())
        } else {
            close_workspace(workspace);
            None
        };
        Err(NotebookError::BuildFailed {
            code,
            signal,
            workspace: kept,
        })
    }

    async fn run(&self, workspace: &Path, source_path: &Path) -> Result<std::process::Output> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(source_path)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(program = %self.program, args = ?self.args, "running compiler");
        let running = command.output();
        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, running)
                .await
                .map_err(|_| NotebookError::Timeout { limit })?,
            None => running.await,
        };

        finished.map_err(|source| NotebookError::Spawn {
            program: self.program.clone(),
            source,
        })
    }
}

async fn write_source(path: &Path, source: &str) -> Result<()> {
    let mut file = File::create(path).await?;
    file.write_all(source.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(unix)]
fn exit_details(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    use std::os::unix::process::ExitStatusExt;
    (status.code(), status.signal())
}

#[cfg(not(unix))]
fn exit_details(status: ExitStatus) -> (Option<i32>, Option<i32>) {
    (status.code(), None)
}

fn tail(output: &[u8]) -> String {
    let start = output.len().saturating_sub(LOG_TAIL_BYTES);
    String::from_utf8_lossy(&output[start..]).into_owned()
}

fn close_workspace(workspace: TempDir) {
    let path = workspace.path().to_path_buf();
    if let Err(err) = workspace.close() {
        warn!(path = %path.display(), error = %err, "failed to remove scratch workspace");
    }
}

/// A compiled document still sitting in its scratch workspace
#[derive(Debug)]
pub struct BuildArtifact {
    workspace: TempDir,
    path: PathBuf,
}

impl BuildArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Streams the document into `sink`, then removes the scratch workspace.
    ///
    /// Returns the number of bytes relayed. A workspace that cannot be removed
    /// afterwards is logged, not reported, since the document was delivered.
    ///
    /// # Errors
    ///
    /// Returns `NotebookError::Delivery` if reading the artifact or writing
    /// to the sink fails.
    pub async fn deliver<W>(self, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let relayed = relay(&self.path, sink).await;
        close_workspace(self.workspace);
        let bytes = relayed.map_err(NotebookError::Delivery)?;
        debug!(bytes, "document delivered");
        Ok(bytes)
    }
}

async fn relay<W>(path: &Path, sink: &mut W) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut artifact = File::open(path).await?;
    let bytes = tokio::io::copy(&mut artifact, sink).await?;
    sink.flush().await?;
    Ok(bytes)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// `sh -c SCRIPT fake-latexmk <source>`: the source path arrives as `$1`
    fn fake_compiler(script: &str) -> Compiler {
        Compiler::new("sh", ["-c", script, "fake-latexmk"])
    }

    const WRITES_PDF: &str = r#"printf '%%PDF-1.5 fake' > "${1%.tex}.pdf""#;

    #[tokio::test]
    async fn test_build_and_deliver() {
        let artifact = fake_compiler(WRITES_PDF).build("\\documentclass{article}").await.unwrap();
        let workspace = artifact.workspace().to_path_buf();
        assert!(artifact.path().ends_with("_notebook.pdf"));
        assert!(workspace.join(SOURCE_FILE_NAME).exists());

        let mut sink = Vec::new();
        let bytes = artifact.deliver(&mut sink).await.unwrap();
        assert_eq!(sink, b"%PDF-1.5 fake");
        assert_eq!(bytes, sink.len() as u64);
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn test_source_is_written_before_compiling() {
        // the fake compiler turns the source itself into the "pdf"
        let compiler = fake_compiler(r#"cp "$1" "${1%.tex}.pdf""#);
        let artifact = compiler.build("hello notebook").await.unwrap();

        let mut sink = Vec::new();
        artifact.deliver(&mut sink).await.unwrap();
        assert_eq!(sink, b"hello notebook");
    }

    #[tokio::test]
    async fn test_runs_inside_workspace_with_inherited_env() {
        let script = r#"printf '%s|%s' "$(pwd -P)" "${PATH:+has-path}" > "${1%.tex}.pdf""#;
        let artifact = fake_compiler(script).build("").await.unwrap();
        let workspace = artifact.workspace().canonicalize().unwrap();

        let mut sink = Vec::new();
        artifact.deliver(&mut sink).await.unwrap();
        let seen = String::from_utf8(sink).unwrap();
        assert_eq!(seen, format!("{}|has-path", workspace.display()));
    }

    #[tokio::test]
    async fn test_pdf_counts_even_on_nonzero_exit() {
        let script = format!("{WRITES_PDF}; exit 1");
        let artifact = fake_compiler(&script).build("").await.unwrap();

        let mut sink = Vec::new();
        artifact.deliver(&mut sink).await.unwrap();
        assert!(!sink.is_empty());
    }

    #[tokio::test]
    async fn test_no_output_reports_exit_code() {
        let result = fake_compiler("exit 12").build("").await;
        match result {
            Err(NotebookError::BuildFailed {
                code,
                signal,
                workspace,
            }) => {
                assert_eq!(code, Some(12));
                assert_eq!(signal, None);
                assert!(workspace.is_none());
            }
            other => panic!("expected BuildFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_output_reports_signal() {
        let result = fake_compiler("kill -9 $$").build("").await;
        match result {
            Err(NotebookError::BuildFailed { code, signal, .. }) => {
                assert_eq!(code, None);
                assert_eq!(signal, Some(9));
            }
            other => panic!("expected BuildFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_keep_scratch_on_failure() {
        let result = fake_compiler("exit 1").keep_scratch(true).build("kept").await;
        let Err(NotebookError::BuildFailed {
            workspace: Some(workspace),
            ..
        }) = result
        else {
            panic!("expected BuildFailed with a kept workspace");
        };

        let source = std::fs::read_to_string(workspace.join(SOURCE_FILE_NAME)).unwrap();
        assert_eq!(source, "kept");
        std::fs::remove_dir_all(&workspace).unwrap();
    }

    #[tokio::test]
    async fn test_missing_compiler_is_spawn_error() {
        let compiler = Compiler::new("notebookgen-no-such-compiler", Vec::<String>::new());
        let result = compiler.build("").await;
        assert!(matches!(result, Err(NotebookError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_compiler() {
        let compiler = fake_compiler("sleep 5").with_timeout(Some(Duration::from_millis(100)));
        let result = compiler.build("").await;
        match result {
            Err(err @ NotebookError::Timeout { .. }) => {
                assert_eq!(format!("{err}"), "Compiler timed out after 100ms");
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    /// Sink whose every write fails
    struct BrokenSink;

    impl AsyncWrite for BrokenSink {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "reader went away",
            )))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_deliver_sink_failure() {
        let artifact = fake_compiler(WRITES_PDF).build("").await.unwrap();
        let workspace = artifact.workspace().to_path_buf();

        let result = artifact.deliver(&mut BrokenSink).await;
        match result {
            Err(NotebookError::Delivery(err)) => {
                assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected Delivery, got {other:?}"),
        }
        assert!(!workspace.exists());
    }

    #[tokio::test]
    async fn test_deliver_unreadable_artifact() {
        let artifact = fake_compiler(r#"mkdir "${1%.tex}.pdf""#).build("").await.unwrap();
        let workspace = artifact.workspace().to_path_buf();

        let mut sink = Vec::new();
        let result = artifact.deliver(&mut sink).await;
        assert!(matches!(result, Err(NotebookError::Delivery(_))));
        assert!(sink.is_empty());
        assert!(!workspace.exists());
    }

    #[test]
    fn test_tail_keeps_last_bytes() {
        let long = vec![b'a'; LOG_TAIL_BYTES + 10];
        assert_eq!(tail(&long).len(), LOG_TAIL_BYTES);
        assert_eq!(tail(b"short"), "short");
    }
}
