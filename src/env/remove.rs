use anyhow::Result;
use log::info;
use std::io::Write;

use super::Env;
use crate::build::BuildTool;
use crate::error::BekuError;
use crate::runtime::Runtime;
use crate::vcs::Vcs;

impl<R: Runtime, V: Vcs, B: BuildTool> Env<R, V, B> {
    /// Remove a package that nothing requires, its checkout and its build
    /// outputs. With `recursive` the dependencies that would be left unused
    /// go too, each after every package requiring it.
    pub fn remove(&mut self, import_path: &str, recursive: bool) -> Result<()> {
        let import_path = import_path.trim();
        if import_path.is_empty() {
            return Err(BekuError::EmptyOrInvalidPackageName.into());
        }
        if self.graph.is_excluded(import_path) {
            writeln!(self.out, "!!! Package '{}' is excluded.", import_path)?;
            return Ok(());
        }

        let Some(pkg) = self.graph.get(import_path) else {
            return Err(BekuError::PackageNotFound(import_path.to_string()).into());
        };
        if !pkg.required_by.is_empty() {
            return Err(BekuError::PackageRequired {
                import_path: import_path.to_string(),
                required_by: pkg.required_by.clone(),
            }
            .into());
        }

        let targets = if recursive {
            let unused = self.graph.filter_unused_deps(import_path);
            self.graph.removal_order(&unused)
        } else {
            vec![import_path.to_string()]
        };

        self.print_list("The following packages will be removed:", &targets)?;
        if !self.confirm("Continue?", true)? {
            writeln!(self.out, ">>> Remove cancelled.")?;
            return Ok(());
        }

        let src_dir = self.src_dir();
        for target in &targets {
            let Some(pkg) = self.graph.get(target) else {
                continue;
            };
            pkg.remove(&self.runtime, &self.build, &src_dir)?;
            self.graph.detach(target);
            info!("{} removed", target);
            writeln!(self.out, ">>> {} removed.", target)?;
        }
        Ok(())
    }

    /// Put every import path on the exclude list, dropping whatever the
    /// graph knows about them. The checkouts stay on disk.
    pub fn exclude(&mut self, import_paths: &[String]) -> Result<()> {
        let import_paths: Vec<&str> = import_paths
            .iter()
            .map(|ip| ip.trim())
            .filter(|ip| !ip.is_empty())
            .collect();
        if import_paths.is_empty() {
            return Err(BekuError::EmptyOrInvalidPackageName.into());
        }

        for import_path in import_paths {
            if self.graph.exclude(import_path) {
                writeln!(self.out, ">>> {} excluded.", import_path)?;
            } else {
                writeln!(self.out, ">>> {} is already excluded.", import_path)?;
            }
        }
        Ok(())
    }
}
