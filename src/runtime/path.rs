//! Path utility functions for normalization, comparison and cleanup.

use anyhow::Result;
use log::debug;
use std::path::{Component, Path, PathBuf};

use super::Runtime;

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => {
                result.push(component);
            }
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
/// Returns true if `path` is under `dir` (i.e., `dir` is a prefix of `path`).
///
/// For example, `/go/src/../../etc` is NOT under `/go/src`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// A directory is empty when it does not exist or has no entries at all.
pub fn is_dir_empty<R: Runtime>(runtime: &R, path: &Path) -> bool {
    if !runtime.exists(path) {
        return true;
    }
    match runtime.read_dir(path) {
        Ok(entries) => entries.is_empty(),
        Err(_) => false,
    }
}

/// Remove `path` and then each of its parents while they are empty
/// directories, never touching `root` itself or anything outside it.
///
/// A leaf that does not exist is skipped and its parents are still examined.
/// The walk stops quietly at the first file or non-empty directory.
pub fn rmdir_empty_all<R: Runtime>(runtime: &R, path: &Path, root: &Path) -> Result<()> {
    let root = normalize_path(root);
    let mut current = Some(normalize_path(path));

    while let Some(dir) = current {
        if dir == root || !is_path_under(&dir, &root) {
            break;
        }
        if runtime.exists(&dir) {
            if !runtime.is_dir(&dir) || !is_dir_empty(runtime, &dir) {
                break;
            }
            debug!("Removing empty directory {:?}", dir);
            runtime.remove_dir(&dir)?;
        }
        current = dir.parent().map(Path::to_path_buf);
    }

    Ok(())
}
