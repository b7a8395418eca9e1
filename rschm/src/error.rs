//! Error types for the gridding pipeline.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias used across the library.
pub type Result<T> = core::result::Result<T, Error>;

/// The two parallel phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Global extent discovery.
    Bounds,
    /// DSM/DTM accumulation.
    Grids,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Bounds => "bounds",
            Phase::Grids => "grids",
        };
        f.write_str(s)
    }
}

/// Pipeline error types.
#[derive(Debug, Error)]
pub enum Error {
    /// A point-cloud file could not be opened or decoded.
    #[error("failed to read {}: {message}", path.display())]
    Read {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No input file contributed a single point to the extent.
    #[error("no valid points found in {files} input file(s)")]
    NoValidData { files: usize },

    /// A raster could not be quantized (non-finite values or scale).
    #[error("cannot encode {raster} raster: {reason}")]
    EncodingRange { raster: &'static str, reason: String },

    /// Coordinate transformation could not be created or applied.
    #[error("coordinate transform failed: {message}")]
    Transform { message: String },

    /// Invalid pipeline configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error on a directory or output artifact.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be started.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// A per-file task failed; reported by the coordinator.
    #[error("{phase} phase failed on {}: {source}", path.display())]
    Task {
        phase: Phase,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The task observed the abort flag and stopped early.
    #[error("task cancelled")]
    Cancelled,
}

impl Error {
    /// Create a read error for `path` from any underlying error.
    pub fn read(
        path: impl Into<PathBuf>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Read {
            path: path.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a transform error.
    pub fn transform(message: impl Into<String>) -> Self {
        Error::Transform {
            message: message.into(),
        }
    }

    /// Phase and file of a failed per-file task, if this is one.
    pub fn failed_task(&self) -> Option<(Phase, &std::path::Path)> {
        match self {
            Error::Task { phase, path, .. } => Some((*phase, path.as_path())),
            _ => None,
        }
    }
}
