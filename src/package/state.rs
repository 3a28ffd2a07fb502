//! Package lifecycle state and VCS mode.

use std::fmt;
use std::str::FromStr;

use crate::error::BekuError;

/// Lifecycle of a tracked package inside one run.
///
/// `Unscanned -> {New, Loaded} -> Changed -> Dirty -> Saved`. Every mutation
/// that must reach the database ends in `Dirty`; `Save` moves all packages to
/// `Saved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageState {
    #[default]
    Unscanned,
    /// Found on disk by this run's scan, not in the database.
    New,
    /// Restored from the database.
    Loaded,
    /// Scanned version differs from the database; staged in `version_next`.
    Changed,
    Dirty,
    Saved,
}

impl PackageState {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::New | Self::Changed)
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unscanned => "unscanned",
            Self::New => "new",
            Self::Loaded => "loaded",
            Self::Changed => "changed",
            Self::Dirty => "dirty",
            Self::Saved => "saved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VcsMode {
    #[default]
    Git,
}

impl VcsMode {
    /// Directory marking the root of a checkout.
    pub fn metadata_dir(self) -> &'static str {
        match self {
            Self::Git => ".git",
        }
    }
}

impl fmt::Display for VcsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => f.write_str("git"),
        }
    }
}

impl FromStr for VcsMode {
    type Err = BekuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "git" => Ok(Self::Git),
            other => Err(BekuError::UnknownVcsMode(other.to_string())),
        }
    }
}
