//! Package entity
//!
//! A [`Package`] is one tracked checkout under the workspace source tree. It
//! knows its remote, its current and staged revisions, and both directions of
//! its dependency edges. Edges are stored as import path strings; the graph
//! that owns all packages keeps them symmetric.

mod state;
mod version;

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fmt;
use std::path::{Path, PathBuf};

pub use state::{PackageState, VcsMode};
pub use version::VersionPolicy;

use crate::build::BuildTool;
use crate::error::BekuError;
use crate::import_path::{default_remote_url, has_path_prefix, is_tag_version};
use crate::runtime::{Runtime, rmdir_empty_all};
use crate::vcs::{DEFAULT_REMOTE_NAME, Vcs};

const DEFAULT_BRANCHES: &[&str] = &["master", "main"];

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Package {
    pub import_path: String,
    pub full_path: PathBuf,
    pub remote_name: String,
    pub remote_url: String,
    pub remote_branch: String,
    version: String,
    pub version_next: String,
    is_tag: bool,
    pub deps: Vec<String>,
    pub deps_missing: Vec<String>,
    pub required_by: Vec<String>,
    pub state: PackageState,
    pub vcs_mode: VcsMode,
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

fn remove_item(list: &mut Vec<String>, value: &str) -> bool {
    let before = list.len();
    list.retain(|v| v != value);
    before != list.len()
}

/// Pick the branch to track out of the remote's branch list.
pub(crate) fn pick_branch(branches: &[String]) -> String {
    DEFAULT_BRANCHES
        .iter()
        .find(|name| branches.iter().any(|b| b == *name))
        .map(|name| name.to_string())
        .or_else(|| branches.first().cloned())
        .unwrap_or_default()
}

fn is_valid_import_path(import_path: &str) -> bool {
    !import_path.is_empty()
        && !import_path.contains(char::is_whitespace)
        && import_path
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

impl Package {
    /// Create a package rooted at `src_dir/import_path`. An empty
    /// `remote_url` is derived from the import path.
    pub fn new(src_dir: &Path, import_path: &str, remote_url: &str) -> Result<Self, BekuError> {
        let import_path = import_path.trim().trim_matches('/');
        if !is_valid_import_path(import_path) {
            return Err(BekuError::EmptyOrInvalidPackageName);
        }

        let remote_url = match remote_url.trim() {
            "" => default_remote_url(import_path),
            url => url.to_string(),
        };
        if remote_url.contains(char::is_whitespace) {
            return Err(BekuError::EmptyOrInvalidRemoteUrl);
        }

        Ok(Self {
            import_path: import_path.to_string(),
            full_path: src_dir.join(import_path),
            remote_name: DEFAULT_REMOTE_NAME.to_string(),
            remote_url,
            ..Default::default()
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_tag(&self) -> bool {
        self.is_tag
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
        self.is_tag = is_tag_version(&self.version);
    }

    pub fn mark_dirty(&mut self) {
        self.state = PackageState::Dirty;
    }

    /// Stage a scanned or fetched revision without applying it.
    pub fn stage(&mut self, version_next: impl Into<String>) {
        self.version_next = version_next.into();
        self.state = PackageState::Changed;
    }

    /// Apply the staged revision, if any, and mark the package for saving.
    pub fn promote(&mut self) {
        if !self.version_next.is_empty() {
            let next = std::mem::take(&mut self.version_next);
            self.set_version(next);
        }
        self.mark_dirty();
    }

    fn remote_or_default(&self) -> &str {
        if self.remote_name.is_empty() {
            DEFAULT_REMOTE_NAME
        } else {
            &self.remote_name
        }
    }

    /// Remote ref used to look up the latest commit.
    fn tracked_ref(&self) -> String {
        let branch = if self.remote_branch.is_empty() {
            "HEAD"
        } else {
            &self.remote_branch
        };
        format!("{}/{}", self.remote_or_default(), branch)
    }

    fn resolve_remote_branch<V: Vcs>(&self, vcs: &V) -> String {
        match vcs.remote_branches(&self.full_path) {
            Ok(branches) => pick_branch(&branches),
            Err(err) => {
                debug!("{}: {:#}", self.import_path, err);
                String::new()
            }
        }
    }

    /// Read version and remote of the checkout at `full_path`.
    pub fn scan<V: Vcs>(&mut self, vcs: &V) -> Result<()> {
        let version = vcs
            .scan_version(&self.full_path)
            .with_context(|| format!("Scan {}", self.import_path))?;
        self.set_version(version);

        let (name, url) = vcs
            .scan_remote(&self.full_path)
            .with_context(|| format!("Scan {}", self.import_path))?;
        self.remote_name = name;
        self.remote_url = url;

        if self.remote_branch.is_empty() {
            self.remote_branch = self.resolve_remote_branch(vcs);
        }
        Ok(())
    }

    /// Fetch the remote and stage the latest tag, or the latest commit on
    /// the tracked branch when the current version is not a tag.
    pub fn fetch_latest_version<V: Vcs>(&mut self, vcs: &V) -> Result<()> {
        vcs.fetch_all(&self.full_path)
            .with_context(|| format!("Fetch {}", self.import_path))?;

        if self.remote_branch.is_empty() {
            self.remote_branch = self.resolve_remote_branch(vcs);
        }

        let latest_tag = if self.is_tag {
            match vcs.latest_tag(&self.full_path) {
                Ok(tag) if !tag.is_empty() => Some(tag),
                Ok(_) => None,
                Err(err) => {
                    debug!("{}: {:#}", self.import_path, err);
                    None
                }
            }
        } else {
            None
        };

        self.version_next = match latest_tag {
            Some(tag) => tag,
            None => vcs
                .latest_commit(&self.full_path, &self.tracked_ref())
                .with_context(|| format!("Fetch {}", self.import_path))?,
        };
        Ok(())
    }

    /// Clone the package and check out its version. Without a requested
    /// version the latest tag is used, or the latest commit if there is no tag.
    pub fn install<V: Vcs>(&mut self, vcs: &V) -> Result<()> {
        vcs.clone_repo(&self.remote_url, &self.full_path)
            .with_context(|| format!("Install {}", self.import_path))?;

        if self.remote_branch.is_empty() {
            self.remote_branch = self.resolve_remote_branch(vcs);
        }

        let revision = if !self.version.is_empty() {
            self.version.clone()
        } else {
            match vcs.latest_tag(&self.full_path) {
                Ok(tag) if !tag.is_empty() => tag,
                _ => vcs
                    .latest_commit(&self.full_path, &self.tracked_ref())
                    .with_context(|| format!("Install {}", self.import_path))?,
            }
        };

        vcs.checkout_revision(
            &self.full_path,
            self.remote_or_default(),
            &self.remote_branch,
            &revision,
        )
        .with_context(|| format!("Install {}", self.import_path))?;

        self.set_version(revision);
        Ok(())
    }

    /// Check out the recorded version of an existing checkout.
    pub fn checkout<V: Vcs>(&self, vcs: &V, revision: &str) -> Result<()> {
        vcs.checkout_revision(
            &self.full_path,
            self.remote_or_default(),
            &self.remote_branch,
            revision,
        )
        .with_context(|| format!("Checkout {} {}", self.import_path, revision))
    }

    /// Move this package to the state described by `new_pkg`: new location,
    /// new remote and the revision `new_pkg.version()`.
    pub fn update<R: Runtime, V: Vcs>(
        &mut self,
        runtime: &R,
        vcs: &V,
        src_dir: &Path,
        new_pkg: &Package,
    ) -> Result<()> {
        if self.full_path != new_pkg.full_path {
            if let Some(parent) = new_pkg.full_path.parent() {
                runtime.create_dir_all(parent)?;
            }
            runtime
                .rename(&self.full_path, &new_pkg.full_path)
                .with_context(|| format!("Update {}", self.import_path))?;

            let old_path = std::mem::replace(&mut self.full_path, new_pkg.full_path.clone());
            self.import_path = new_pkg.import_path.clone();
            if let Err(err) = rmdir_empty_all(runtime, &old_path, src_dir) {
                warn!("Update {}: {:#}", self.import_path, err);
            }
        }

        if self.remote_name != new_pkg.remote_name || self.remote_url != new_pkg.remote_url {
            vcs.remote_change(
                &self.full_path,
                &self.remote_name,
                &new_pkg.remote_name,
                &new_pkg.remote_url,
            )
            .with_context(|| format!("Update {}", self.import_path))?;
        }

        vcs.fetch_all(&self.full_path)
            .with_context(|| format!("Update {}", self.import_path))?;

        let branch = if !new_pkg.remote_branch.is_empty() {
            new_pkg.remote_branch.clone()
        } else if !self.remote_branch.is_empty() {
            self.remote_branch.clone()
        } else {
            self.resolve_remote_branch(vcs)
        };

        vcs.checkout_revision(
            &self.full_path,
            &new_pkg.remote_name,
            &branch,
            new_pkg.version(),
        )
        .with_context(|| format!("Update {}", self.import_path))?;

        self.remote_name = new_pkg.remote_name.clone();
        self.remote_url = new_pkg.remote_url.clone();
        self.remote_branch = branch;
        self.set_version(new_pkg.version());
        self.version_next.clear();
        self.mark_dirty();
        Ok(())
    }

    /// Clean build outputs, delete the checkout, then prune empty parents
    /// up to `src_dir`.
    pub fn remove<R: Runtime, B: BuildTool>(
        &self,
        runtime: &R,
        build: &B,
        src_dir: &Path,
    ) -> Result<()> {
        build
            .clean(&self.full_path)
            .with_context(|| format!("Remove {}", self.import_path))?;

        if runtime.exists(&self.full_path) {
            runtime
                .remove_dir_all(&self.full_path)
                .with_context(|| format!("Remove {}", self.import_path))?;
        }

        rmdir_empty_all(runtime, &self.full_path, src_dir)
            .with_context(|| format!("Remove {}", self.import_path))
    }

    pub fn go_install<B: BuildTool>(&self, build: &B) -> Result<()> {
        build
            .install(&self.full_path)
            .with_context(|| format!("Install {}", self.import_path))
    }

    /// Equality on identity, remote and version only.
    pub fn is_equal(&self, other: &Package) -> bool {
        self.import_path == other.import_path
            && self.remote_name == other.remote_name
            && self.remote_url == other.remote_url
            && self.version == other.version
    }

    pub fn push_dep(&mut self, import_path: &str) -> bool {
        push_unique(&mut self.deps, import_path)
    }

    pub fn push_missing(&mut self, import_path: &str) -> bool {
        push_unique(&mut self.deps_missing, import_path)
    }

    pub fn push_required_by(&mut self, import_path: &str) -> bool {
        push_unique(&mut self.required_by, import_path)
    }

    pub fn remove_dep(&mut self, import_path: &str) -> bool {
        remove_item(&mut self.deps, import_path)
    }

    pub fn remove_required_by(&mut self, import_path: &str) -> bool {
        remove_item(&mut self.required_by, import_path)
    }

    /// Drop every missing import provided by `new_pkg`. With `add_as_dep` the
    /// two packages are linked as well.
    pub fn update_missing_dep(&mut self, new_pkg: &mut Package, add_as_dep: bool) -> bool {
        if self.import_path == new_pkg.import_path {
            return false;
        }

        let before = self.deps_missing.len();
        self.deps_missing
            .retain(|missing| !has_path_prefix(missing, &new_pkg.import_path));
        if before == self.deps_missing.len() {
            return false;
        }

        if add_as_dep {
            self.push_dep(&new_pkg.import_path);
            new_pkg.push_required_by(&self.import_path);
        }
        self.mark_dirty();
        true
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[package \"{}\"]", self.import_path)?;
        writeln!(f, "     FullPath = {}", self.full_path.display())?;
        writeln!(f, "          VCS = {}", self.vcs_mode)?;
        writeln!(f, "   RemoteName = {}", self.remote_name)?;
        writeln!(f, "    RemoteURL = {}", self.remote_url)?;
        writeln!(f, " RemoteBranch = {}", self.remote_branch)?;
        writeln!(f, "      Version = {}", self.version)?;
        writeln!(f, "  VersionNext = {}", self.version_next)?;
        writeln!(f, "        IsTag = {}", self.is_tag)?;
        writeln!(f, "         Deps = {:?}", self.deps)?;
        writeln!(f, "   RequiredBy = {:?}", self.required_by)?;
        writeln!(f, "  DepsMissing = {:?}", self.deps_missing)?;
        writeln!(f, "        State = {}", self.state)
    }
}
