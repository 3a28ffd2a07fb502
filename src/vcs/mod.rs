//! Version control abstraction.
//!
//! Packages never run VCS commands themselves; they go through the [`Vcs`]
//! trait so that graph maintenance can be tested without a real repository.
//! Only git is supported for now, see [`Git`].

mod git;

use anyhow::Result;
use std::path::Path;

pub use git::{DEFAULT_REMOTE_NAME, Git};

/// Contract of a single version-control backend.
///
/// Every call blocks until the underlying process exits. There is no timeout:
/// a hung network fetch blocks the whole run.
#[cfg_attr(test, mockall::automock)]
pub trait Vcs: Send + Sync {
    /// Tag at HEAD if HEAD is exactly tagged, otherwise the short commit hash
    /// at HEAD. Fails with `NoVersionFound` when neither exists.
    fn scan_version(&self, path: &Path) -> Result<String>;

    /// Configured remote as `(name, url)`. Fails with `NoRemoteFound` when no
    /// remote is configured.
    fn scan_remote(&self, path: &Path) -> Result<(String, String)>;

    fn fetch_all(&self, path: &Path) -> Result<()>;

    fn latest_tag(&self, path: &Path) -> Result<String>;

    fn latest_commit(&self, path: &Path, reference: &str) -> Result<String>;

    /// Clone `remote_url` into `dest`, which must be empty or missing.
    fn clone_repo(&self, remote_url: &str, dest: &Path) -> Result<()>;

    fn checkout_revision(
        &self,
        path: &Path,
        remote_name: &str,
        branch: &str,
        revision: &str,
    ) -> Result<()>;

    /// Human readable list of commits between two revisions.
    fn log_revisions(&self, path: &Path, from_rev: &str, to_rev: &str) -> Result<String>;

    fn remote_change(
        &self,
        path: &Path,
        old_name: &str,
        new_name: &str,
        new_url: &str,
    ) -> Result<()>;

    /// Branch names available on the remote, without the remote prefix.
    fn remote_branches(&self, path: &Path) -> Result<Vec<String>>;
}
