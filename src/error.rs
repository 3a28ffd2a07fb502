//! Domain errors.
//!
//! Adapter and filesystem failures travel as `anyhow::Error` with the
//! operation name attached as context. The variants below are the ones callers
//! need to tell apart, usually through `anyhow::Error::downcast_ref`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BekuError {
    #[error("GOPATH is not defined")]
    WorkspaceUndefined,

    #[error("GOROOT is not defined")]
    GorootUndefined,

    /// The directory has VCS metadata but no tag or commit.
    #[error("No tag or commit found")]
    NoVersionFound,

    #[error("No remote URL found")]
    NoRemoteFound,

    #[error("Empty or invalid package name")]
    EmptyOrInvalidPackageName,

    #[error("Empty or invalid remote URL found")]
    EmptyOrInvalidRemoteUrl,

    #[error("directory {} is not empty", .0.display())]
    DirNotEmpty(PathBuf),

    #[error("package '{import_path}' is required by {}", .required_by.join(", "))]
    PackageRequired {
        import_path: String,
        required_by: Vec<String>,
    },

    #[error("package '{0}' is not tracked")]
    PackageNotFound(String),

    #[error("unknown VCS mode '{0}'")]
    UnknownVcsMode(String),

    #[error("missing package name in {}", .file.display())]
    MissingPackageName { file: PathBuf },
}

/// Returns true when `err` is a version-resolution failure that makes a
/// directory "not a trackable package" rather than a fatal scan error.
pub fn is_version_resolution(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<BekuError>(),
        Some(BekuError::NoVersionFound | BekuError::NoRemoteFound)
    )
}
