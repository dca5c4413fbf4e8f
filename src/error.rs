//! imagepin error types
//!
//! Only structural failures are errors. A missing, malformed or unresolved
//! leaf record is reported as a `LeafDiagnostic` by the scanner and never
//! surfaces here.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline stages
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The declarative source does not exist
    #[error("Declarations file not found: {}", .path.display())]
    DeclarationsMissing { path: PathBuf },

    /// The declarative source exists but cannot be used
    #[error("Invalid declarations in {}: {reason}", .path.display())]
    DeclarationsInvalid { path: PathBuf, reason: String },

    /// Two declared images would share the same directory in the trees
    #[error("Images {first} and {second} both map to tree key {key}")]
    DuplicateImageKey {
        key: String,
        first: String,
        second: String,
    },

    /// A name from the declarations or a leaf cannot be used as a path segment
    #[error("Unsafe path segment {segment:?} for {what}")]
    UnsafeSegment { what: &'static str, segment: String },

    /// Filesystem operation on the tree or the output failed
    #[error("Storage error in {operation} at {}: {source}", .path.display())]
    Storage {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The digest map could not be rendered
    #[error("Failed to serialize digest map: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn storage(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Helper mapping an io::Error into a storage error for `map_err`
pub fn storage_err(
    operation: &'static str,
    path: impl Into<PathBuf>,
) -> impl FnOnce(io::Error) -> PipelineError {
    let path = path.into();
    move |source| PipelineError::storage(operation, path, source)
}

/// Helper to tell declaration problems apart from tree problems
pub fn is_declaration_error(err: &PipelineError) -> bool {
    match err {
        PipelineError::DeclarationsMissing { .. } => true,
        PipelineError::DeclarationsInvalid { .. } => true,
        PipelineError::DuplicateImageKey { .. } => true,
        PipelineError::UnsafeSegment { .. } => true,
        PipelineError::Storage { .. } => false,
        PipelineError::Serialize(_) => false,
    }
}
