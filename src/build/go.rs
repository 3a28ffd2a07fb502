//! Go toolchain backend.
//!
//! All commands run in GOPATH mode (`GO111MODULE=off`) against the workspace
//! the tool was created for.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::BuildTool;

const DEPS_FORMAT: &str = "{{ join .Deps \"\\n\" }}";
const NOTHING_TO_CLEAN: &[&str] = &["matched no packages", "no Go files", "cannot find package"];

/// Deduplicated, sorted import list out of `go list` output.
fn parse_imports(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_nothing_to_clean(stderr: &str) -> bool {
    NOTHING_TO_CLEAN.iter().any(|msg| stderr.contains(msg))
}

#[derive(Debug, Clone)]
pub struct GoTool {
    gopath: PathBuf,
}

impl GoTool {
    pub fn new(gopath: PathBuf) -> Self {
        Self { gopath }
    }

    fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<Output> {
        debug!("go {:?}", args);
        let mut cmd = Command::new("go");
        cmd.args(args)
            .env("GOPATH", &self.gopath)
            .env("GO111MODULE", "off");
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        cmd.output().context("failed to execute go")
    }
}

impl BuildTool for GoTool {
    #[tracing::instrument(skip(self))]
    fn recursive_imports(&self, package_path: &Path) -> Result<Vec<String>> {
        let out = self
            .run(&["list", "-e", "-f", DEPS_FORMAT, "./..."], Some(package_path))
            .with_context(|| format!("list imports of {}", package_path.display()))?;
        let stdout = String::from_utf8_lossy(&out.stdout);
        if !out.status.success() && stdout.trim().is_empty() {
            bail!(
                "go list {}: {}",
                package_path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(parse_imports(&stdout))
    }

    #[tracing::instrument(skip(self))]
    fn install(&self, package_path: &Path) -> Result<()> {
        info!("installing {}", package_path.display());
        let out = self
            .run(&["install", "./..."], Some(package_path))
            .with_context(|| format!("install {}", package_path.display()))?;
        if !out.status.success() {
            bail!(
                "go install {}: {}",
                package_path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn clean(&self, package_path: &Path) -> Result<()> {
        if !package_path.is_dir() {
            debug!("clean {}: nothing to clean", package_path.display());
            return Ok(());
        }
        let out = self
            .run(&["clean", "-i", "./..."], Some(package_path))
            .with_context(|| format!("clean {}", package_path.display()))?;
        if out.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&out.stderr);
        if is_nothing_to_clean(&stderr) {
            debug!("clean {}: {}", package_path.display(), stderr.trim());
            return Ok(());
        }
        bail!("go clean {}: {}", package_path.display(), stderr.trim());
    }

    #[tracing::instrument(skip(self))]
    fn env_value(&self, key: &str) -> Result<String> {
        let out = self.run(&["env", key], None)?;
        if !out.status.success() {
            bail!("go env {}: {}", key, String::from_utf8_lossy(&out.stderr).trim());
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}
