use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for notebook generation
#[derive(Error, Debug)]
pub enum NotebookError {
    /// IO error not tied to a specific path
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Root (or nested) directory does not exist or is not a directory
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// A recognized source file could not be read
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `WalkDir` error when listing a directory
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// The document template could not be loaded
    #[error("Failed to load template {path}: {source}")]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Regex compilation error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern: {0}")]
    Glob(#[from] globset::Error),

    /// The JSON options file could not be read or parsed
    #[error("Invalid options file {path}: {message}")]
    Options { path: PathBuf, message: String },

    /// The compiler could not be started at all
    #[error("Failed to start compiler '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The compiler ran but left no output artifact behind
    #[error("Document was not generated ({}){}", describe_exit(.code, .signal), .workspace.as_ref().map(|w| format!(", scratch kept at {}", w.display())).unwrap_or_default())]
    BuildFailed {
        code: Option<i32>,
        signal: Option<i32>,
        workspace: Option<PathBuf>,
    },

    /// The compiler exceeded the configured time limit and was killed
    #[error("Compiler timed out after {limit:?}")]
    Timeout { limit: Duration },

    /// Relaying the finished artifact to the output sink failed
    #[error("Failed to deliver output: {0}")]
    Delivery(#[source] io::Error),
}

fn describe_exit(code: &Option<i32>, signal: &Option<i32>) -> String {
    match (*code, *signal) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signal)) => format!("terminated by signal {signal}"),
        (None, None) => "unknown exit status".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, NotebookError>;
