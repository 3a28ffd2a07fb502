//! Git backend, implemented by shelling out to the `git` binary.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::fs;
use std::path::Path;
use std::process::Command;

use super::Vcs;
use crate::error::BekuError;

pub const DEFAULT_REMOTE_NAME: &str = "origin";

fn run_git(args: &[&str], cwd: &Path) -> Result<String> {
    debug!("git {:?} in {}", args, cwd.display());
    let out = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .context("failed to execute git")?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        bail!("git {:?} failed ({}): {}", args, out.status, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Parse `git branch -r` output into bare branch names.
fn parse_remote_branches(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("->"))
        .filter_map(|line| line.split_once('/').map(|(_, branch)| branch.to_string()))
        .filter(|branch| branch != "HEAD")
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Git;

impl Vcs for Git {
    #[tracing::instrument(skip(self))]
    fn scan_version(&self, path: &Path) -> Result<String> {
        if let Ok(tag) = run_git(&["describe", "--tags", "--exact-match"], path)
            && !tag.is_empty()
        {
            return Ok(tag);
        }
        match run_git(&["rev-parse", "--short", "HEAD"], path) {
            Ok(commit) if !commit.is_empty() => Ok(commit),
            _ => Err(BekuError::NoVersionFound.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    fn scan_remote(&self, path: &Path) -> Result<(String, String)> {
        let key = format!("remote.{}.url", DEFAULT_REMOTE_NAME);
        match run_git(&["config", "--get", &key], path) {
            Ok(url) if !url.is_empty() => Ok((DEFAULT_REMOTE_NAME.to_string(), url)),
            _ => Err(BekuError::NoRemoteFound.into()),
        }
    }

    #[tracing::instrument(skip(self))]
    fn fetch_all(&self, path: &Path) -> Result<()> {
        run_git(&["fetch", "--all", "--tags"], path).context("fetch all remotes")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn latest_tag(&self, path: &Path) -> Result<String> {
        let rev = run_git(&["rev-list", "--tags", "--max-count=1"], path)
            .context("get latest tag")?;
        if rev.is_empty() {
            bail!("no tag found");
        }
        run_git(&["describe", "--tags", "--abbrev=0", &rev], path).context("get latest tag")
    }

    #[tracing::instrument(skip(self))]
    fn latest_commit(&self, path: &Path, reference: &str) -> Result<String> {
        run_git(&["rev-parse", "--short", reference], path).context("get latest commit")
    }

    #[tracing::instrument(skip(self))]
    fn clone_repo(&self, remote_url: &str, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest).context("clone repository")?;
        if fs::read_dir(dest).context("clone repository")?.next().is_some() {
            return Err(BekuError::DirNotEmpty(dest.to_path_buf())).context("clone repository");
        }
        run_git(&["clone", "--quiet", remote_url, "."], dest).context("clone repository")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn checkout_revision(
        &self,
        path: &Path,
        remote_name: &str,
        branch: &str,
        revision: &str,
    ) -> Result<()> {
        if revision.is_empty() {
            warn!("checkout {}: empty version", path.display());
            return Ok(());
        }

        // Local changes are dropped, a stash would get in the way of rebuilds.
        if let Err(err) = run_git(&["clean", "-qdff"], path) {
            debug!("checkout: {:#}", err);
        }
        if !branch.is_empty() {
            let upstream = format!("{}/{}", remote_name, branch);
            if let Err(err) = run_git(&["checkout", "-q", "-B", branch, "-t", &upstream], path) {
                debug!("checkout: {:#}", err);
            }
        }
        run_git(&["reset", "-q", "--hard", revision], path).context("checkout revision")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn log_revisions(&self, path: &Path, from_rev: &str, to_rev: &str) -> Result<String> {
        let range = format!("{}...{}", from_rev, to_rev);
        run_git(&["log", "--oneline", &range], path).context("log revisions")
    }

    #[tracing::instrument(skip(self))]
    fn remote_change(
        &self,
        path: &Path,
        old_name: &str,
        new_name: &str,
        new_url: &str,
    ) -> Result<()> {
        if !old_name.is_empty()
            && let Err(err) = run_git(&["remote", "remove", old_name], path)
        {
            warn!("remove remote: {:#}", err);
        }
        run_git(&["remote", "add", new_name, new_url], path).context("add remote")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn remote_branches(&self, path: &Path) -> Result<Vec<String>> {
        let out = run_git(&["branch", "-r"], path).context("list remote branches")?;
        Ok(parse_remote_branches(&out))
    }
}
