//! Error types for geodiff

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for geodiff operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input raster not found or not a file: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Cannot read input raster {}: {reason}", path.display())]
    InputUnreadable { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Geotransform mismatch: {0}")]
    TransformMismatch(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Cannot write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of [`Error`] values, stable enough for callers to
/// branch on (exit codes, retry decisions, user messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A source raster is missing or unreadable
    InputNotFound,
    /// The two sources differ in shape, geotransform or CRS
    GeometryMismatch,
    /// The difference surface has zero dynamic range
    DegenerateInput,
    /// A configuration value was rejected before running
    InvalidParameter,
    /// An output artifact could not be written
    OutputWrite,
    /// Other I/O failure
    Io,
    /// Malformed or unsupported file content
    Format,
    /// Internal invariant violated
    Internal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InputNotFound(_) | Error::InputUnreadable { .. } => ErrorKind::InputNotFound,
            Error::SizeMismatch { .. } | Error::CrsMismatch(..) | Error::TransformMismatch(_) => {
                ErrorKind::GeometryMismatch
            }
            Error::DegenerateInput(_) => ErrorKind::DegenerateInput,
            Error::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Error::OutputWrite { .. } => ErrorKind::OutputWrite,
            Error::Io(_) => ErrorKind::Io,
            Error::UnsupportedDataType(_) | Error::InvalidDimensions { .. } | Error::Serialization(_) => {
                ErrorKind::Format
            }
            Error::IndexOutOfBounds { .. } | Error::Algorithm(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether the input pair was rejected for incompatible geometry
    pub fn is_geometry_mismatch(&self) -> bool {
        self.kind() == ErrorKind::GeometryMismatch
    }

    /// Wrap any error raised while producing `path` as an [`Error::OutputWrite`]
    pub fn output_write(path: impl Into<PathBuf>, err: Error) -> Self {
        let source = match err {
            Error::Io(e) => e,
            Error::OutputWrite { source, .. } => source,
            other => std::io::Error::other(other.to_string()),
        };
        Error::OutputWrite {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for geodiff operations
pub type Result<T> = std::result::Result<T, Error>;
