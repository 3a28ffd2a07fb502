//! Workspace environment.
//!
//! [`Env`] owns the dependency [`Graph`] for one run together with the
//! adapters it drives. Every workflow (scan, sync, remove, exclude, freeze,
//! query) is a method on it; user-facing text goes to the injected output
//! sink and diagnostics go to the logger.

mod freeze;
mod remove;
mod scan;
mod sync;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::build::BuildTool;
use crate::config::Config;
use crate::db;
use crate::error::BekuError;
use crate::graph::Graph;
use crate::import_path::is_ignored_dir;
use crate::runtime::Runtime;
use crate::vcs::Vcs;

const ENV_GOROOT: &str = "GOROOT";

pub struct Env<R: Runtime, V: Vcs, B: BuildTool> {
    runtime: R,
    vcs: V,
    build: B,
    config: Config,
    graph: Graph,
    db_file: Option<PathBuf>,
    out: Box<dyn Write + Send>,
}

impl<R: Runtime, V: Vcs, B: BuildTool> Env<R, V, B> {
    /// Create the environment and read the standard library registry from
    /// `GOROOT/src`. A missing `GOROOT` is asked from the build tool.
    pub fn new(
        runtime: R,
        vcs: V,
        build: B,
        mut config: Config,
        out: Box<dyn Write + Send>,
    ) -> Result<Self> {
        if config.goroot.is_none() {
            let goroot = build.env_value(ENV_GOROOT).unwrap_or_else(|err| {
                debug!("{:#}", err);
                String::new()
            });
            if goroot.trim().is_empty() {
                return Err(BekuError::GorootUndefined.into());
            }
            config.goroot = Some(PathBuf::from(goroot.trim()));
        }

        let mut env = Self {
            runtime,
            vcs,
            build,
            config,
            graph: Graph::new(),
            db_file: None,
            out,
        };
        env.scan_std_packages()?;
        Ok(env)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[cfg(test)]
    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn is_dirty(&self) -> bool {
        self.graph.is_dirty()
    }

    fn src_dir(&self) -> PathBuf {
        self.config.src_dir()
    }

    /// Ask the user unless confirmation is disabled, in which case the
    /// answer is always yes.
    fn confirm(&self, prompt: &str, default_yes: bool) -> Result<bool> {
        if self.config.no_confirm {
            return Ok(true);
        }
        self.runtime.confirm(prompt, default_yes)
    }

    fn scan_std_packages(&mut self) -> Result<()> {
        let Some(root_src) = self.config.root_src_dir() else {
            return Err(BekuError::GorootUndefined.into());
        };
        if !self.runtime.is_dir(&root_src) {
            warn!("{} is not a directory", root_src.display());
            return Ok(());
        }

        let mut std = Vec::new();
        for entry in self.runtime.read_dir(&root_src)? {
            if !self.runtime.is_dir(&entry) {
                continue;
            }
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_ignored_dir(name) {
                std.push(name.to_string());
            }
        }
        debug!("standard packages: {:?}", std);
        self.graph.set_std(std);
        Ok(())
    }

    /// Load the database, `./beku.db` first. Returns false when there is no
    /// database yet.
    pub fn load(&mut self) -> Result<bool> {
        let file = self.config.db_file(&self.runtime);
        if !self.runtime.exists(&file) {
            debug!("database {} does not exist", file.display());
            return Ok(false);
        }
        self.load_file(&file)?;
        Ok(true)
    }

    pub fn load_file(&mut self, file: &Path) -> Result<()> {
        let content = self
            .runtime
            .read_to_string(file)
            .with_context(|| format!("Load {}", file.display()))?;
        let db = db::decode(&content, file, &self.src_dir())?;

        for ex in &db.excludes {
            self.graph.add_exclude(ex);
        }
        for pkg in db.packages {
            let import_path = pkg.import_path.clone();
            if let Err(err) = self.graph.add_package(pkg) {
                warn!("Load {}: {:#}, skipped", import_path, err);
            }
        }

        info!(
            "loaded {} packages from {}",
            self.graph.len(),
            file.display()
        );
        self.db_file = Some(file.to_path_buf());
        self.graph.mark_loaded();
        Ok(())
    }

    /// Save the graph to the loaded database, or to the default one. Nothing
    /// is written when the graph has not changed.
    pub fn save(&mut self) -> Result<()> {
        if !self.graph.is_dirty() {
            debug!("database is up to date");
            return Ok(());
        }
        let file = self
            .db_file
            .clone()
            .unwrap_or_else(|| self.config.default_db_file());
        self.save_file(&file)
    }

    pub fn save_file(&mut self, file: &Path) -> Result<()> {
        if let Some(parent) = file.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        let content = db::encode(&self.graph)?;
        self.runtime
            .write(file, content.as_bytes())
            .with_context(|| format!("Save {}", file.display()))?;

        info!("saved {} packages to {}", self.graph.len(), file.display());
        self.db_file = Some(file.to_path_buf());
        self.graph.mark_saved();
        Ok(())
    }

    /// Print import path and version of the tracked packages, all of them
    /// when `import_paths` is empty.
    pub fn query(&mut self, import_paths: &[String]) -> Result<()> {
        let pkgs: Vec<_> = self
            .graph
            .pkgs()
            .iter()
            .filter(|p| import_paths.is_empty() || import_paths.contains(&p.import_path))
            .collect();
        let width = pkgs.iter().map(|p| p.import_path.len()).max().unwrap_or(0);

        for pkg in pkgs {
            writeln!(self.out, "{:<width$}  {}", pkg.import_path, pkg.version())?;
        }
        Ok(())
    }

    fn print_list(&mut self, header: &str, items: &[String]) -> Result<()> {
        writeln!(self.out, ">>> {}", header)?;
        for item in items {
            writeln!(self.out, "    - {}", item)?;
        }
        Ok(())
    }
}

impl<R: Runtime, V: Vcs, B: BuildTool> fmt::Display for Env<R, V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GOPATH: {}", self.config.gopath.display())?;
        if let Some(goroot) = &self.config.goroot {
            writeln!(f, "GOROOT: {}", goroot.display())?;
        }
        writeln!(f, "Standard packages: {:?}", self.graph.std_pkgs())?;
        writeln!(f, "Excludes: {:?}", self.graph.excludes())?;
        for pkg in self.graph.pkgs() {
            writeln!(f)?;
            write!(f, "{}", pkg)?;
        }
        writeln!(f, "\n[_missing_]")?;
        for missing in self.graph.missing() {
            writeln!(f, "    {}", missing)?;
        }
        Ok(())
    }
}
