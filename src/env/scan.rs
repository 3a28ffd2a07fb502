use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use super::Env;
use crate::build::BuildTool;
use crate::error::is_version_resolution;
use crate::import_path::is_ignored_dir;
use crate::package::{Package, PackageState, VcsMode};
use crate::runtime::Runtime;
use crate::vcs::Vcs;

/// Import path of a directory under `src_dir`.
fn import_path_of(src_dir: &Path, dir: &Path) -> Option<String> {
    let rel = dir.strip_prefix(src_dir).ok()?;
    let segments: Option<Vec<&str>> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect();
    let segments = segments?;
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

impl<R: Runtime, V: Vcs, B: BuildTool> Env<R, V, B> {
    /// Package roots under the source tree: directories holding VCS
    /// metadata. Descent stops at a root and skips ignored directories.
    fn scan_dirs(&self) -> Result<Vec<PathBuf>> {
        let src_dir = self.src_dir();
        let mut roots = Vec::new();
        if !self.runtime.is_dir(&src_dir) {
            debug!("{} does not exist", src_dir.display());
            return Ok(roots);
        }

        let marker = VcsMode::default().metadata_dir();
        let mut stack = vec![src_dir];
        while let Some(dir) = stack.pop() {
            let entries = self
                .runtime
                .read_dir(&dir)
                .with_context(|| format!("Scan {}", dir.display()))?;

            // Reversed so that directories are visited in name order.
            for entry in entries.into_iter().rev() {
                let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if is_ignored_dir(name) || !self.runtime.is_dir(&entry) {
                    continue;
                }
                if self.runtime.is_dir(&entry.join(marker)) {
                    roots.push(entry);
                } else {
                    stack.push(entry);
                }
            }
        }

        roots.sort();
        Ok(roots)
    }

    /// Walk the source tree and merge every package found into the graph,
    /// then relink the dependencies of all tracked packages.
    ///
    /// A directory whose version or remote cannot be read is not a package
    /// and is skipped. A tracked package found with another version gets it
    /// staged instead of applied.
    pub fn scan(&mut self) -> Result<()> {
        let src_dir = self.src_dir();

        for root in self.scan_dirs()? {
            let Some(import_path) = import_path_of(&src_dir, &root) else {
                continue;
            };
            let mut pkg = match Package::new(&src_dir, &import_path, "") {
                Ok(pkg) => pkg,
                Err(err) => {
                    warn!("Scan {}: {}", root.display(), err);
                    continue;
                }
            };

            if let Err(err) = pkg.scan(&self.vcs) {
                if is_version_resolution(&err) {
                    debug!("{:#}, skipped", err);
                    continue;
                }
                return Err(err);
            }

            match self.graph.find_exact(&pkg.import_path, &pkg.remote_url) {
                Some(idx) => {
                    let policy = self.config.version_policy;
                    let cur = self.graph.pkg_mut(idx);
                    if policy.is_update(cur.version(), pkg.version()) {
                        info!(
                            "{}: {} changed to {}",
                            cur.import_path,
                            cur.version(),
                            pkg.version()
                        );
                        cur.stage(pkg.version());
                    }
                }
                None => {
                    info!("{}: new package at {}", pkg.import_path, pkg.version());
                    pkg.state = PackageState::New;
                    self.graph.add_package(pkg)?;
                }
            }
        }

        for idx in 0..self.graph.len() {
            if let Err(err) = self.scan_deps(idx) {
                warn!("{:#}", err);
            }
        }
        Ok(())
    }

    /// Ask the build tool for the imports of package `idx` and link them.
    /// Returns whether any edge was added.
    pub fn scan_deps(&mut self, idx: usize) -> Result<bool> {
        let pkg = self.graph.pkg(idx);
        if !self.runtime.is_dir(&pkg.full_path) {
            debug!("{}: no checkout, dependencies not scanned", pkg.import_path);
            return Ok(false);
        }
        let imports = self
            .build
            .recursive_imports(&pkg.full_path)
            .with_context(|| format!("ScanDeps {}", pkg.import_path))?;
        Ok(self.graph.link_imports(idx, &imports))
    }

    /// Scan, show what is new or changed, and apply it after confirmation.
    ///
    /// Returns false when the user declined. On the first run the graph is
    /// marked dirty even when nothing was found so that the database gets
    /// created.
    pub fn rescan(&mut self, first_time: bool) -> Result<bool> {
        self.scan()?;

        let pending: Vec<usize> = (0..self.graph.len())
            .filter(|&idx| self.graph.pkg(idx).state.is_pending())
            .collect();
        if pending.is_empty() {
            writeln!(self.out, ">>> Nothing to update.")?;
            if first_time {
                self.graph.set_dirty();
            }
            return Ok(true);
        }

        let width = pending
            .iter()
            .map(|&idx| self.graph.pkg(idx).import_path.len())
            .max()
            .unwrap_or(0);
        writeln!(self.out, ">>> The following packages will be saved:")?;
        for &idx in &pending {
            let pkg = self.graph.pkg(idx);
            if pkg.state == PackageState::New {
                writeln!(
                    self.out,
                    "    {:<width$}  (new) {}",
                    pkg.import_path,
                    pkg.version()
                )?;
            } else {
                writeln!(
                    self.out,
                    "    {:<width$}  {} -> {}",
                    pkg.import_path,
                    pkg.version(),
                    pkg.version_next
                )?;
            }
        }

        if !self.confirm("Continue?", true)? {
            return Ok(false);
        }

        let mut new_pkgs = Vec::new();
        for idx in pending {
            let pkg = self.graph.pkg_mut(idx);
            if pkg.state == PackageState::New {
                new_pkgs.push(idx);
            }
            pkg.promote();
        }
        self.graph.set_dirty();

        for idx in new_pkgs {
            self.graph.update_missing_at(idx, true);
        }
        Ok(true)
    }

    /// Packages checked out under the source tree that are not tracked nor
    /// excluded.
    pub fn get_unused(&self) -> Result<Vec<Package>> {
        let src_dir = self.src_dir();
        let mut unused = Vec::new();

        for root in self.scan_dirs()? {
            let Some(import_path) = import_path_of(&src_dir, &root) else {
                continue;
            };
            if self.graph.index_of(&import_path).is_some() || self.graph.is_excluded(&import_path)
            {
                continue;
            }
            match Package::new(&src_dir, &import_path, "") {
                Ok(pkg) => unused.push(pkg),
                Err(err) => warn!("{}: {}", root.display(), err),
            }
        }
        Ok(unused)
    }
}
