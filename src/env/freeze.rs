use anyhow::Result;
use log::warn;
use std::io::Write;

use super::Env;
use crate::build::BuildTool;
use crate::runtime::{Runtime, is_dir_empty};
use crate::vcs::Vcs;

impl<R: Runtime, V: Vcs, B: BuildTool> Env<R, V, B> {
    /// Make the source tree match the database: clone what is missing, check
    /// out the recorded version of what exists and, after confirmation,
    /// delete checkouts the database does not know about.
    pub fn freeze(&mut self) -> Result<()> {
        for idx in 0..self.graph.len() {
            let empty = is_dir_empty(&self.runtime, &self.graph.pkg(idx).full_path);
            if empty {
                writeln!(
                    self.out,
                    ">>> Installing {} at {}",
                    self.graph.pkg(idx).import_path,
                    self.graph.pkg(idx).version()
                )?;
                let mut pkg = std::mem::take(self.graph.pkg_mut(idx));
                let installed = self.install_package(&mut pkg);
                *self.graph.pkg_mut(idx) = pkg;
                installed?;
            } else {
                let pkg = self.graph.pkg(idx);
                writeln!(
                    self.out,
                    ">>> Checking out {} at {}",
                    pkg.import_path,
                    pkg.version()
                )?;
                pkg.checkout(&self.vcs, pkg.version())?;
            }
        }

        let unused = self.get_unused()?;
        if !unused.is_empty() {
            let names: Vec<String> = unused.iter().map(|p| p.import_path.clone()).collect();
            self.print_list("The following packages are not in the database:", &names)?;
            if self.confirm("Remove unused packages?", true)? {
                let src_dir = self.src_dir();
                for pkg in &unused {
                    pkg.remove(&self.runtime, &self.build, &src_dir)?;
                    writeln!(self.out, ">>> {} removed.", pkg.import_path)?;
                }
            }
        }

        for idx in 0..self.graph.len() {
            match self.scan_deps(idx) {
                Ok(true) => self.graph.set_dirty(),
                Ok(false) => {}
                Err(err) => warn!("{:#}", err),
            }
        }

        if !self.config.no_deps {
            self.install_missing()?;
        }
        Ok(())
    }
}
