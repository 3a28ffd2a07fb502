//! Build tool abstraction.
//!
//! Dependency discovery and installation go through [`BuildTool`]; the only
//! implementation is the Go toolchain ([`GoTool`]).

mod go;

use anyhow::Result;
use std::path::Path;

pub use go::GoTool;

#[cfg_attr(test, mockall::automock)]
pub trait BuildTool: Send + Sync {
    /// Every import path required by the package tree rooted at
    /// `package_path`, transitively. The list is sorted and has no duplicates.
    fn recursive_imports(&self, package_path: &Path) -> Result<Vec<String>>;

    /// Build and install the binaries and archives of the package tree.
    fn install(&self, package_path: &Path) -> Result<()>;

    /// Remove the build outputs of the package tree. Having nothing to clean
    /// is not an error.
    fn clean(&self, package_path: &Path) -> Result<()>;

    /// Value of a tool environment setting, for example `GOROOT`.
    fn env_value(&self, key: &str) -> Result<String>;
}
