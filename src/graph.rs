//! In-memory dependency graph.
//!
//! Packages live in a flat arena and refer to each other by import path, the
//! same way they are persisted. Every edge is written on both sides at once
//! (`deps` on the dependent, `required_by` on the dependency) so the two
//! directions stay symmetric.

use anyhow::{Result, bail};
use log::debug;
use std::collections::{BTreeMap, HashSet};

use crate::error::BekuError;
use crate::import_path::{CGO_IMPORT, first_segment, has_path_prefix, is_ignored_dir};
use crate::package::{Package, PackageState};

#[derive(Debug, Default)]
pub struct Graph {
    pkgs: Vec<Package>,
    excludes: Vec<String>,
    missing: Vec<String>,
    std: Vec<String>,
    dirty: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pkgs(&self) -> &[Package] {
        &self.pkgs
    }

    pub fn pkg(&self, idx: usize) -> &Package {
        &self.pkgs[idx]
    }

    pub fn pkg_mut(&mut self, idx: usize) -> &mut Package {
        &mut self.pkgs[idx]
    }

    pub fn len(&self) -> usize {
        self.pkgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pkgs.is_empty()
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn std_pkgs(&self) -> &[String] {
        &self.std
    }

    pub fn set_std(&mut self, std: Vec<String>) {
        self.std = std;
    }

    /// True when the top-level segment of `import_path` is a standard
    /// library package.
    pub fn is_std(&self, import_path: &str) -> bool {
        let top = first_segment(import_path);
        self.std.iter().any(|s| s == top)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Called after loading the database.
    pub fn mark_loaded(&mut self) {
        for pkg in &mut self.pkgs {
            pkg.state = PackageState::Loaded;
        }
        self.dirty = false;
    }

    /// Called after a successful save.
    pub fn mark_saved(&mut self) {
        for pkg in &mut self.pkgs {
            pkg.state = PackageState::Saved;
        }
        self.dirty = false;
    }

    pub fn index_of(&self, import_path: &str) -> Option<usize> {
        self.pkgs.iter().position(|p| p.import_path == import_path)
    }

    pub fn get(&self, import_path: &str) -> Option<&Package> {
        self.index_of(import_path).map(|idx| &self.pkgs[idx])
    }

    /// Tracked package with the longest import path that is a path prefix of
    /// `import_path`.
    fn find_by_prefix(&self, import_path: &str) -> Option<usize> {
        self.pkgs
            .iter()
            .enumerate()
            .filter(|(_, p)| has_path_prefix(import_path, &p.import_path))
            .max_by_key(|(_, p)| p.import_path.len())
            .map(|(idx, _)| idx)
    }

    /// Lookup by exact import path, then by exact remote URL.
    pub fn find_exact(&self, import_path: &str, remote_url: &str) -> Option<usize> {
        self.index_of(import_path).or_else(|| {
            if remote_url.is_empty() {
                return None;
            }
            self.pkgs.iter().position(|p| p.remote_url == remote_url)
        })
    }

    /// Lookup by exact import path, then exact remote URL, then import path
    /// prefix so that a sub-package resolves to its repository.
    pub fn get_package_from_db(&self, import_path: &str, remote_url: &str) -> Option<usize> {
        if import_path.is_empty() && remote_url.is_empty() {
            return None;
        }
        self.find_exact(import_path, remote_url)
            .or_else(|| self.find_by_prefix(import_path))
    }

    /// An import path is excluded when it or one of its parents is on the
    /// exclude list.
    pub fn is_excluded(&self, import_path: &str) -> bool {
        !import_path.is_empty()
            && self
                .excludes
                .iter()
                .any(|ex| has_path_prefix(import_path, ex))
    }

    /// Add `import_path` to the exclude list. Returns false if it was already
    /// there.
    pub fn add_exclude(&mut self, import_path: &str) -> bool {
        let import_path = import_path.trim();
        if import_path.is_empty() || self.excludes.iter().any(|ex| ex == import_path) {
            return false;
        }
        self.excludes.push(import_path.to_string());
        self.dirty = true;
        true
    }

    pub fn add_missing(&mut self, import_path: &str) -> bool {
        if self.is_excluded(import_path) || self.missing.iter().any(|m| m == import_path) {
            return false;
        }
        self.missing.push(import_path.to_string());
        true
    }

    /// Append a package. Its missing imports are registered in the graph.
    pub fn add_package(&mut self, pkg: Package) -> Result<usize> {
        if self.index_of(&pkg.import_path).is_some() {
            bail!("package '{}' is already tracked", pkg.import_path);
        }
        for missing in &pkg.deps_missing {
            if !self.is_excluded(missing) && !self.missing.contains(missing) {
                self.missing.push(missing.clone());
            }
        }
        self.pkgs.push(pkg);
        Ok(self.pkgs.len() - 1)
    }

    fn link(&mut self, from: usize, to: usize) -> bool {
        let from_ip = self.pkgs[from].import_path.clone();
        let to_ip = self.pkgs[to].import_path.clone();
        let added_dep = self.pkgs[from].push_dep(&to_ip);
        let added_req = self.pkgs[to].push_required_by(&from_ip);
        added_dep || added_req
    }

    /// Classify one import of package `idx`.
    ///
    /// Empty, self, vendored, cgo, standard library and excluded imports are
    /// ignored and return false. An import provided by a tracked package
    /// links the two packages; anything else is recorded as missing.
    pub fn add_dep(&mut self, idx: usize, import_path: &str) -> bool {
        let import_path = import_path.trim();
        if import_path.is_empty()
            || has_path_prefix(import_path, &self.pkgs[idx].import_path)
            || is_ignored_dir(first_segment(import_path))
            || import_path == CGO_IMPORT
            || self.is_std(import_path)
            || self.is_excluded(import_path)
        {
            return false;
        }

        match self.find_by_prefix(import_path) {
            Some(target) if target != idx => {
                self.link(idx, target);
                true
            }
            Some(_) => false,
            None => {
                self.pkgs[idx].push_missing(import_path);
                self.add_missing(import_path);
                true
            }
        }
    }

    fn edge_count(&self) -> usize {
        self.pkgs
            .iter()
            .map(|p| p.deps.len() + p.deps_missing.len() + p.required_by.len())
            .sum()
    }

    /// Link every import of package `idx` as reported by the build tool.
    /// Returns whether any edge was added.
    pub fn link_imports(&mut self, idx: usize, imports: &[String]) -> bool {
        let before = self.edge_count();
        for import in imports {
            self.add_dep(idx, import);
        }
        before != self.edge_count()
    }

    /// Resolve missing imports provided by `new_pkg` in every tracked package
    /// and in the missing registry.
    pub fn update_missing(&mut self, new_pkg: &mut Package, add_as_dep: bool) -> bool {
        let mut changed = false;
        for pkg in &mut self.pkgs {
            if pkg.update_missing_dep(new_pkg, add_as_dep) {
                debug!("{}: resolved missing {}", pkg.import_path, new_pkg.import_path);
                changed = true;
            }
        }

        let before = self.missing.len();
        self.missing
            .retain(|m| !has_path_prefix(m, &new_pkg.import_path));
        changed |= before != self.missing.len();

        if changed {
            self.dirty = true;
        }
        changed
    }

    /// [`Graph::update_missing`] for a package that is already tracked.
    pub fn update_missing_at(&mut self, idx: usize, add_as_dep: bool) -> bool {
        let mut pkg = std::mem::take(&mut self.pkgs[idx]);
        let changed = self.update_missing(&mut pkg, add_as_dep);
        self.pkgs[idx] = pkg;
        changed
    }

    /// Replace references to `old` with `new` after a package moved.
    pub fn rename_refs(&mut self, old: &str, new: &str) {
        for pkg in &mut self.pkgs {
            for dep in pkg.deps.iter_mut().chain(pkg.required_by.iter_mut()) {
                if dep == old {
                    *dep = new.to_string();
                }
            }
        }
    }

    /// Decide which packages become unused when `import_path` is removed.
    ///
    /// Every package reachable through `deps` starts as a removal candidate
    /// (`true`). A candidate required by any package outside the candidate
    /// set is kept (`false`), and that repeats until nothing changes, so a
    /// shared dependency is only removed once all of its requirers are.
    pub fn filter_unused_deps(&self, import_path: &str) -> BTreeMap<String, bool> {
        let mut unused = BTreeMap::new();
        let mut stack = vec![import_path.to_string()];
        let mut seen = HashSet::new();

        while let Some(ip) = stack.pop() {
            if !seen.insert(ip.clone()) {
                continue;
            }
            let Some(pkg) = self.get(&ip) else {
                continue;
            };
            unused.insert(ip, true);
            stack.extend(pkg.deps.iter().rev().cloned());
        }

        loop {
            let mut changed = false;
            let candidates: Vec<String> = unused
                .iter()
                .filter(|(ip, marked)| **marked && ip.as_str() != import_path)
                .map(|(ip, _)| ip.clone())
                .collect();

            for ip in candidates {
                let Some(pkg) = self.get(&ip) else {
                    continue;
                };
                let required_outside = pkg
                    .required_by
                    .iter()
                    .any(|req| !unused.get(req).copied().unwrap_or(false));
                if required_outside {
                    debug!("{} is still required, keeping it", ip);
                    unused.insert(ip, false);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        unused
    }

    /// Order the marked packages so that every package comes after all of
    /// its requirers.
    pub fn removal_order(&self, unused: &BTreeMap<String, bool>) -> Vec<String> {
        let mut pending: Vec<String> = unused
            .iter()
            .filter(|(_, marked)| **marked)
            .map(|(ip, _)| ip.clone())
            .collect();
        let mut order: Vec<String> = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let (ready, rest): (Vec<String>, Vec<String>) =
                pending.into_iter().partition(|ip| {
                    self.get(ip)
                        .is_none_or(|p| p.required_by.iter().all(|req| order.contains(req)))
                });
            if ready.is_empty() {
                // Packages requiring each other: any order will do.
                order.extend(rest);
                break;
            }
            order.extend(ready);
            pending = rest;
        }
        order
    }

    /// Drop a package and strip every reference to it, without checking
    /// whether it is still required.
    pub fn detach(&mut self, import_path: &str) -> Option<Package> {
        let idx = self.index_of(import_path)?;
        let pkg = self.pkgs.remove(idx);
        for other in &mut self.pkgs {
            other.remove_dep(import_path);
            other.remove_required_by(import_path);
        }
        self.rebuild_missing();
        self.dirty = true;
        Some(pkg)
    }

    /// Recompute the missing registry from the missing imports of the
    /// packages still tracked.
    fn rebuild_missing(&mut self) {
        let mut missing: Vec<String> = Vec::new();
        for pkg in &self.pkgs {
            for ip in &pkg.deps_missing {
                if !self.is_excluded(ip) && !missing.contains(ip) {
                    missing.push(ip.clone());
                }
            }
        }
        self.missing = missing;
    }

    /// Drop a package that nothing requires anymore.
    pub fn remove_package(&mut self, import_path: &str) -> Result<Package> {
        let Some(pkg) = self.get(import_path) else {
            return Err(BekuError::PackageNotFound(import_path.to_string()).into());
        };
        if !pkg.required_by.is_empty() {
            return Err(BekuError::PackageRequired {
                import_path: import_path.to_string(),
                required_by: pkg.required_by.clone(),
            }
            .into());
        }
        self.detach(import_path)
            .ok_or_else(|| BekuError::PackageNotFound(import_path.to_string()).into())
    }

    /// Put `import_path` on the exclude list and forget everything the graph
    /// knows about it. Returns whether the graph changed.
    pub fn exclude(&mut self, import_path: &str) -> bool {
        let import_path = import_path.trim();
        if import_path.is_empty() {
            return false;
        }

        let mut changed = self.add_exclude(import_path);

        let excluded: Vec<String> = self
            .pkgs
            .iter()
            .filter(|p| has_path_prefix(&p.import_path, import_path))
            .map(|p| p.import_path.clone())
            .collect();
        for ip in excluded {
            debug!("excluding tracked package {}", ip);
            self.detach(&ip);
            changed = true;
        }

        let mut excluded_pkg = Package::default();
        excluded_pkg.import_path = import_path.to_string();
        changed |= self.update_missing(&mut excluded_pkg, false);

        for pkg in &mut self.pkgs {
            changed |= pkg.remove_required_by(import_path);
            changed |= pkg.remove_dep(import_path);
        }

        if changed {
            self.dirty = true;
        }
        changed
    }
}
