use std::fmt;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::Stage;

#[derive(Debug, Error, Diagnostic)]
pub enum DragontailError {
    #[error("{stage} stage failed")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<DragontailError>,
    },

    #[error("request to {url} failed: {message}")]
    Upstream { url: String, message: String },

    #[error("{url} returned status {status}")]
    UpstreamStatus { url: String, status: u16 },

    #[error("incomplete download from {url}: expected {expected} bytes, received {received}")]
    IncompleteDownload {
        url: String,
        expected: u64,
        received: u64,
    },

    #[error("invalid version identifier from upstream: {0:?}")]
    InvalidVersion(String),

    #[error("no versions returned from {0}")]
    EmptyResult(String),

    #[error("blocked path traversal attempt: {entry}")]
    #[diagnostic(help("the archive contains an entry that resolves outside the extraction root"))]
    PathTraversal { entry: String },

    #[error("expected input not found: {0}")]
    MissingInput(Utf8PathBuf),

    #[error("malformed input {path}: {message}")]
    MalformedInput { path: Utf8PathBuf, message: String },

    #[error("{} tile copies failed: {}", .failures.len(), join_failures(.failures))]
    Copy { failures: Vec<CopyFailure> },

    #[error("archive error in {path}: {message}")]
    Archive { path: Utf8PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl DragontailError {
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ DragontailError::StageFailed { .. } => already,
            other => DragontailError::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn root(&self) -> &DragontailError {
        match self {
            DragontailError::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            DragontailError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFailure {
    pub file: Utf8PathBuf,
    pub message: String,
}

impl fmt::Display for CopyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

fn join_failures(failures: &[CopyFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
