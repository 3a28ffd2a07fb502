//! Process-level side effects behind one trait.
//!
//! Workflows never touch the filesystem, the environment or the terminal
//! directly; they go through [`Runtime`] so tests can swap in a mock or a
//! scripted implementation.
//!
//! - `path`: pure path helpers plus the empty-directory pruning used on removal
//! - `env`: environment variables, current and home directory
//! - `fs`: file and directory operations
//! - `user`: yes/no prompts

mod env;
mod fs;
pub mod path;
mod user;

use anyhow::Result;
use std::env as std_env;
use std::path::{Path, PathBuf};

pub use path::{is_dir_empty, is_path_under, rmdir_empty_all};

#[cfg_attr(test, mockall::automock)]
pub trait Runtime: Send + Sync {
    // Environment
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError>;
    fn current_dir(&self) -> Result<PathBuf>;

    // File System
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_dir(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// List the entries of a directory, sorted by name so that scans are
    /// deterministic across platforms.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    // Directories
    fn home_dir(&self) -> Option<PathBuf>;

    // User interaction
    /// Ask a yes/no question. An empty answer selects `default_yes`.
    fn confirm(&self, prompt: &str, default_yes: bool) -> Result<bool>;
}

pub struct RealRuntime;

impl Runtime for RealRuntime {
    fn env_var(&self, key: &str) -> Result<String, std_env::VarError> {
        self.env_var_impl(key)
    }

    fn current_dir(&self) -> Result<PathBuf> {
        self.current_dir_impl()
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.write_impl(path, contents)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.read_to_string_impl(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.rename_impl(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.create_dir_all_impl(path)
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        self.remove_dir_impl(path)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.remove_dir_all_impl(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.exists_impl(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.is_dir_impl(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.read_dir_impl(path)
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir_impl()
    }

    fn confirm(&self, prompt: &str, default_yes: bool) -> Result<bool> {
        self.confirm_impl(prompt, default_yes)
    }
}
