use std::fmt;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::export::ExportError;
use crate::json::JsonError;
use crate::project::ProjectError;
use crate::pulses::PulseError;
use crate::table::TableError;
use crate::upload::UploadError;

/// How a failure affects the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required artifact or directory is absent
    MissingInput,
    /// Source data could not be parsed or decoded
    MalformedSource,
    /// A particle or image produced no features
    ExtractionFailure,
    /// `config.toml` is missing or invalid
    Configuration,
    /// EcoTaxa refused or failed a request
    Remote,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MissingInput => "missing input",
            ErrorKind::MalformedSource => "malformed source",
            ErrorKind::ExtractionFailure => "extraction failure",
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Remote => "remote error",
        };
        f.write_str(name)
    }
}

/// Errors that abort a stage
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Json(#[from] JsonError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Pulse(#[from] PulseError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    /// The image worker pool could not start
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A stage input is absent
    #[error("{what} not found: {}; {remediation}", path.display())]
    MissingInput {
        what: String,
        path: PathBuf,
        remediation: String,
    },

    /// `create` found an existing configuration
    #[error("Project already initialised, {} exists", .0.display())]
    ProjectExists(PathBuf),

    /// No converter binary is configured
    #[error("Cyz2Json converter not configured; set [converter] path in config.toml or the CYZ2JSON environment variable")]
    ConverterNotConfigured,

    /// Some items of the batch failed; the others were processed
    #[error("{stage}: {} sample(s) failed: {}", failed.len(), failed.iter().map(|(s, e)| format!("{} ({})", s, e)).collect::<Vec<_>>().join(", "))]
    Failures {
        stage: &'static str,
        kind: ErrorKind,
        failed: Vec<(String, String)>,
    },
}

impl StageError {
    /// Failure category, for reporting and exit handling
    pub fn kind(&self) -> ErrorKind {
        match self {
            StageError::MissingInput { .. } | StageError::Project(_) => ErrorKind::MissingInput,
            StageError::Config(_)
            | StageError::Pulse(_)
            | StageError::ProjectExists(_)
            | StageError::ConverterNotConfigured => {
                ErrorKind::Configuration
            }
            StageError::Json(_) => ErrorKind::MalformedSource,
            StageError::Export(ExportError::Preflight(_)) => ErrorKind::MissingInput,
            StageError::Upload(UploadError::MissingProjectId) => ErrorKind::Configuration,
            StageError::Upload(_) => ErrorKind::Remote,
            StageError::Failures { kind, .. } => *kind,
            StageError::IoError(_)
            | StageError::Table(_)
            | StageError::Export(_)
            | StageError::ThreadPool(_) => ErrorKind::ExtractionFailure,
        }
    }
}
