//! Error types for pipeline operations

use std::fmt;
use std::path::PathBuf;

/// Main error type for all pipeline operations
#[derive(Debug)]
pub enum PipelineError {
    /// Failed to load a NIfTI volume from the filesystem
    VolumeLoad {
        /// Path to the volume file
        path: PathBuf,
        /// Underlying NIfTI reader error
        source: nifti::NiftiError,
    },

    /// Failed to write a NIfTI volume to disk
    VolumeExport {
        /// Path where export was attempted
        path: PathBuf,
        /// Underlying NIfTI writer error
        source: nifti::NiftiError,
    },

    /// Loaded or computed volume doesn't meet pipeline requirements
    InvalidVolume {
        /// Description of what's wrong with the volume
        reason: String,
    },

    /// Two volumes expected to share a voxel grid do not
    GridMismatch {
        /// Operation that required matching grids
        operation: &'static str,
        /// Shape of the reference volume
        expected: (usize, usize, usize),
        /// Shape of the offending volume
        actual: (usize, usize, usize),
    },

    /// Atlas download failed
    AtlasFetch {
        /// URL that was requested
        url: String,
        /// Underlying HTTP error
        source: reqwest::Error,
    },

    /// Checkpoint envelope could not be serialized or deserialized
    Checkpoint {
        /// Checkpoint key involved
        key: String,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// Pipeline parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Model fit or other numerical computation produced an invalid result
    Computation {
        /// Name of the computation that failed
        operation: &'static str,
        /// Description of the failure
        reason: String,
    },

    /// Failed to save a rendered image to disk
    ImageExport {
        /// Path where export was attempted
        path: PathBuf,
        /// Underlying image export error
        source: image::ImageError,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VolumeLoad { path, source } => {
                write!(f, "Failed to load volume '{}': {source}", path.display())
            }
            Self::VolumeExport { path, source } => {
                write!(
                    f,
                    "Failed to export volume to '{}': {source}",
                    path.display()
                )
            }
            Self::InvalidVolume { reason } => {
                write!(f, "Invalid volume: {reason}")
            }
            Self::GridMismatch {
                operation,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Voxel grid mismatch during {operation}: expected {}x{}x{}, got {}x{}x{}",
                    expected.0, expected.1, expected.2, actual.0, actual.1, actual.2
                )
            }
            Self::AtlasFetch { url, source } => {
                write!(f, "Failed to fetch atlas from '{url}': {source}")
            }
            Self::Checkpoint { key, source } => {
                write!(f, "Checkpoint error for key '{key}': {source}")
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::Computation { operation, reason } => {
                write!(f, "Computation error in {operation}: {reason}")
            }
            Self::ImageExport { path, source } => {
                write!(
                    f,
                    "Failed to export image to '{}': {source}",
                    path.display()
                )
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::VolumeLoad { source, .. } | Self::VolumeExport { source, .. } => Some(source),
            Self::AtlasFetch { source, .. } => Some(source),
            Self::Checkpoint { source, .. } => Some(source),
            Self::ImageExport { source, .. } => Some(source),
            Self::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for pipeline results
pub type Result<T> = std::result::Result<T, PipelineError>;

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> PipelineError {
    PipelineError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a computation error
pub fn computation_error(operation: &'static str, reason: &impl ToString) -> PipelineError {
    PipelineError::Computation {
        operation,
        reason: reason.to_string(),
    }
}

/// Create a file system error with path and operation context
pub fn fs_error(
    path: impl Into<PathBuf>,
    operation: &'static str,
    source: std::io::Error,
) -> PipelineError {
    PipelineError::FileSystem {
        path: path.into(),
        operation,
        source,
    }
}
