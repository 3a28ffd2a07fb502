use anyhow::Result;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::io::Write;

use super::Env;
use crate::build::BuildTool;
use crate::error::BekuError;
use crate::import_path::{default_remote_url, get_compare_url, parse_pkg_version, repo_root};
use crate::package::Package;
use crate::runtime::{Runtime, is_dir_empty};
use crate::vcs::Vcs;

impl<R: Runtime, V: Vcs, B: BuildTool> Env<R, V, B> {
    /// Install or update one package, `name` or `name@version`.
    ///
    /// With a non-empty `import_path` the package is checked out under that
    /// import path while its remote stays the one of `pkg_name`, which is how
    /// a fork replaces the original. Missing dependencies are installed
    /// afterwards unless disabled.
    pub fn sync(&mut self, pkg_name: &str, import_path: &str) -> Result<()> {
        self.sync_package(pkg_name, import_path)?;
        if !self.config.no_deps {
            self.install_missing()?;
        }
        Ok(())
    }

    /// [`Env::sync`] for each name in turn, stopping at the first failure.
    pub fn sync_many(&mut self, pkg_names: &[String]) -> Result<()> {
        for name in pkg_names {
            self.sync_package(name, "")?;
        }
        if !self.config.no_deps {
            self.install_missing()?;
        }
        Ok(())
    }

    /// Returns the index of the synced package, or `None` when nothing was
    /// done.
    fn sync_package(&mut self, pkg_name: &str, import_path: &str) -> Result<Option<usize>> {
        let (name, version) = parse_pkg_version(pkg_name);
        if name.is_empty() {
            return Err(BekuError::EmptyOrInvalidPackageName.into());
        }
        let into = import_path.trim();

        if self.graph.is_excluded(&name) || (!into.is_empty() && self.graph.is_excluded(into)) {
            writeln!(self.out, "!!! Package '{}' is excluded.", name)?;
            return Ok(None);
        }

        let src_dir = self.src_dir();
        let mut candidate = if into.is_empty() {
            Package::new(&src_dir, &repo_root(&name), "")?
        } else {
            Package::new(&src_dir, into, &default_remote_url(&name))?
        };
        if !version.is_empty() {
            candidate.set_version(version);
        }

        let synced = match self
            .graph
            .get_package_from_db(&candidate.import_path, &candidate.remote_url)
        {
            Some(idx) => self.sync_update(idx, candidate, !into.is_empty())?,
            None => self.sync_install(candidate)?,
        };

        if let Some(idx) = synced {
            self.post_sync(idx)?;
        }
        Ok(synced)
    }

    fn sync_update(
        &mut self,
        idx: usize,
        mut candidate: Package,
        explicit_remote: bool,
    ) -> Result<Option<usize>> {
        writeln!(
            self.out,
            ">>> Fetching latest version of {} ...",
            self.graph.pkg(idx).import_path
        )?;
        self.graph.pkg_mut(idx).fetch_latest_version(&self.vcs)?;
        let cur = self.graph.pkg(idx).clone();

        if !explicit_remote {
            candidate.import_path = cur.import_path.clone();
            candidate.full_path = cur.full_path.clone();
            candidate.remote_name = cur.remote_name.clone();
            candidate.remote_url = cur.remote_url.clone();
        } else if candidate.import_path != cur.import_path
            && self.graph.index_of(&candidate.import_path).is_some()
        {
            anyhow::bail!(
                "Sync {}: '{}' is already tracked",
                cur.import_path,
                candidate.import_path
            );
        }
        candidate.remote_branch = cur.remote_branch.clone();
        if candidate.version().is_empty() {
            let latest = if cur.version_next.is_empty() {
                cur.version()
            } else {
                &cur.version_next
            };
            candidate.set_version(latest);
        }

        if cur.is_equal(&candidate) {
            self.graph.pkg_mut(idx).version_next.clear();
            writeln!(self.out, ">>> {} is up to date.", cur.import_path)?;
            writeln!(self.out, ">>> Nothing to update.")?;
            return Ok(None);
        }

        writeln!(self.out, ">>> Updating package {}", cur.import_path)?;
        if cur.import_path != candidate.import_path {
            writeln!(
                self.out,
                "    ImportPath  {} -> {}",
                cur.import_path, candidate.import_path
            )?;
        }
        if cur.remote_url != candidate.remote_url {
            writeln!(
                self.out,
                "    RemoteURL   {} -> {}",
                cur.remote_url, candidate.remote_url
            )?;
        }
        writeln!(
            self.out,
            "    Version     {} -> {}",
            cur.version(),
            candidate.version()
        )?;
        let compare_url = get_compare_url(&cur.remote_url, cur.version(), candidate.version());
        if !compare_url.is_empty() {
            writeln!(self.out, "    Compare     {}", compare_url)?;
        }

        if !self.config.no_confirm && self.runtime.confirm("View commit logs?", false)? {
            let log = self
                .vcs
                .log_revisions(&cur.full_path, cur.version(), candidate.version())?;
            writeln!(self.out, "{}", log)?;
        }
        if !self.confirm("Proceed with update?", true)? {
            self.graph.pkg_mut(idx).version_next.clear();
            writeln!(self.out, ">>> Update cancelled.")?;
            return Ok(None);
        }

        let src_dir = self.src_dir();
        let updated = self
            .graph
            .pkg_mut(idx)
            .update(&self.runtime, &self.vcs, &src_dir, &candidate);

        // The directory may have moved even when a later step failed.
        let pkg = self.graph.pkg_mut(idx);
        if pkg.import_path != cur.import_path {
            pkg.mark_dirty();
            let moved_to = pkg.import_path.clone();
            self.graph.rename_refs(&cur.import_path, &moved_to);
            self.graph.set_dirty();
        }
        updated?;
        self.graph.set_dirty();
        Ok(Some(idx))
    }

    fn sync_install(&mut self, mut candidate: Package) -> Result<Option<usize>> {
        if !is_dir_empty(&self.runtime, &candidate.full_path) {
            writeln!(
                self.out,
                "!!! Directory {} is not empty.",
                candidate.full_path.display()
            )?;
            if !self.confirm("Clean destination directory?", true)? {
                writeln!(self.out, ">>> Sync cancelled.")?;
                return Ok(None);
            }
            self.runtime.remove_dir_all(&candidate.full_path)?;
        }

        writeln!(
            self.out,
            ">>> Installing {} from {} ...",
            candidate.import_path, candidate.remote_url
        )?;
        self.install_package(&mut candidate)?;
        writeln!(
            self.out,
            ">>> {} installed at {}",
            candidate.import_path,
            candidate.version()
        )?;

        candidate.mark_dirty();
        let idx = self.graph.add_package(candidate)?;
        self.graph.set_dirty();
        Ok(Some(idx))
    }

    /// Clone `pkg`. On failure anything left of the clone is removed, unless
    /// the clone was refused because the directory was not empty.
    pub(super) fn install_package(&self, pkg: &mut Package) -> Result<()> {
        let Err(err) = pkg.install(&self.vcs) else {
            return Ok(());
        };

        let dir_not_empty = matches!(
            err.downcast_ref::<BekuError>(),
            Some(BekuError::DirNotEmpty(_))
        );
        if !dir_not_empty
            && let Err(rm_err) = pkg.remove(&self.runtime, &self.build, &self.src_dir())
        {
            warn!("{:#}", rm_err);
        }
        Err(err)
    }

    /// Resolve the graph's missing imports against the synced package,
    /// relink its own imports and build it when nothing is missing.
    pub(super) fn post_sync(&mut self, idx: usize) -> Result<()> {
        self.graph.update_missing_at(idx, true);
        if self.scan_deps(idx)? {
            self.graph.set_dirty();
        }

        let pkg = self.graph.pkg(idx);
        if pkg.deps_missing.is_empty() {
            writeln!(self.out, ">>> Building {} ...", pkg.import_path)?;
            pkg.go_install(&self.build)?;
            return Ok(());
        }

        writeln!(
            self.out,
            "!!! {} is not built, missing dependencies:",
            pkg.import_path
        )?;
        for missing in &pkg.deps_missing {
            writeln!(self.out, "    - {}", missing)?;
        }
        Ok(())
    }

    /// Sync the repository of every missing import that is not excluded,
    /// until no new one shows up. Failures are reported and skipped.
    pub fn install_missing(&mut self) -> Result<()> {
        let mut attempted: HashSet<String> = HashSet::new();

        loop {
            let mut pending: Vec<String> = Vec::new();
            for missing in self.graph.missing() {
                let root = repo_root(missing);
                if !self.graph.is_excluded(&root)
                    && !attempted.contains(&root)
                    && !pending.contains(&root)
                {
                    pending.push(root);
                }
            }
            if pending.is_empty() {
                break;
            }

            for root in pending {
                attempted.insert(root.clone());
                writeln!(self.out, ">>> Installing missing dependency {}", root)?;
                if let Err(err) = self.sync_package(&root, "") {
                    warn!("{:#}", err);
                    writeln!(self.out, "!!! {}: {:#}", root, err)?;
                }
            }
        }
        debug!("missing after install: {:?}", self.graph.missing());
        Ok(())
    }

    /// Fetch every tracked package and update, after one confirmation, all
    /// of those with a newer version.
    pub fn sync_all(&mut self) -> Result<()> {
        let policy = self.config.version_policy;
        let mut changed = Vec::new();

        for idx in 0..self.graph.len() {
            writeln!(
                self.out,
                ">>> Fetching {} ...",
                self.graph.pkg(idx).import_path
            )?;
            let pkg = self.graph.pkg_mut(idx);
            if let Err(err) = pkg.fetch_latest_version(&self.vcs) {
                warn!("{:#}", err);
                continue;
            }
            if policy.is_update(pkg.version(), &pkg.version_next) {
                changed.push(idx);
            } else {
                pkg.version_next.clear();
            }
        }

        if changed.is_empty() {
            writeln!(self.out, ">>> All packages are up to date.")?;
            return Ok(());
        }

        let width = changed
            .iter()
            .map(|&idx| self.graph.pkg(idx).import_path.len())
            .max()
            .unwrap_or(0);
        writeln!(self.out, ">>> The following packages will be updated:")?;
        for &idx in &changed {
            let pkg = self.graph.pkg(idx);
            writeln!(
                self.out,
                "    {:<width$}  {} -> {}",
                pkg.import_path,
                pkg.version(),
                pkg.version_next
            )?;
            let compare_url = get_compare_url(&pkg.remote_url, pkg.version(), &pkg.version_next);
            if !compare_url.is_empty() {
                writeln!(self.out, "    {:<width$}  {}", "", compare_url)?;
            }
        }

        if !self.confirm("Proceed with update?", true)? {
            writeln!(self.out, ">>> Update cancelled.")?;
            return Ok(());
        }

        for &idx in &changed {
            let pkg = self.graph.pkg_mut(idx);
            let next = pkg.version_next.clone();
            pkg.checkout(&self.vcs, &next)?;
            pkg.promote();
            info!("{} updated to {}", pkg.import_path, next);
            self.graph.set_dirty();
        }

        for idx in changed {
            if let Err(err) = self.post_sync(idx) {
                warn!("{:#}", err);
            }
        }
        if !self.config.no_deps {
            self.install_missing()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::MockBuildTool;
    use crate::config::Config;
    use crate::package::PackageState;
    use crate::test_utils::{ScriptedRuntime, SharedBuf, make_checkout, workspace};
    use crate::vcs::MockVcs;
    use std::fs;
    use std::path::Path;

    type TestEnv = Env<ScriptedRuntime, MockVcs, MockBuildTool>;

    fn new_env(
        config: Config,
        vcs: MockVcs,
        build: MockBuildTool,
        answers: &[bool],
    ) -> (TestEnv, SharedBuf) {
        let out = SharedBuf::default();
        let env = Env::new(
            ScriptedRuntime::new(answers),
            vcs,
            build,
            config,
            Box::new(out.clone()),
        )
        .unwrap();
        (env, out)
    }

    fn tracked(env: &mut TestEnv, import_path: &str, version: &str) -> usize {
        let src = env.config().src_dir();
        let mut pkg = Package::new(&src, import_path, "").unwrap();
        pkg.set_version(version);
        pkg.remote_branch = "master".to_string();
        pkg.state = PackageState::Loaded;
        env.graph_mut().add_package(pkg).unwrap()
    }

    /// VCS that clones by creating the checkout directory.
    fn cloning_vcs(tag: &'static str) -> MockVcs {
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo().returning(|_, dest| {
            fs::create_dir_all(dest.join(".git")).unwrap();
            Ok(())
        });
        vcs.expect_remote_branches()
            .returning(|_| Ok(vec!["master".to_string()]));
        vcs.expect_latest_tag().returning(move |_| Ok(tag.to_string()));
        vcs.expect_checkout_revision().returning(|_, _, _, _| Ok(()));
        vcs
    }

    fn no_imports() -> MockBuildTool {
        let mut build = MockBuildTool::new();
        build.expect_recursive_imports().returning(|_| Ok(vec![]));
        build
    }

    #[test]
    fn test_sync_installs_new_package() {
        let (_dir, config) = workspace();
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo()
            .withf(|url, _| url == "https://github.com/shuLhan/beku")
            .times(1)
            .returning(|_, dest| {
                fs::create_dir_all(dest.join(".git")).unwrap();
                Ok(())
            });
        vcs.expect_remote_branches()
            .returning(|_| Ok(vec!["master".to_string()]));
        vcs.expect_latest_tag().returning(|_| Ok("v0.2.0".to_string()));
        vcs.expect_checkout_revision()
            .withf(|_, _, branch, rev| branch == "master" && rev == "v0.2.0")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let mut build = no_imports();
        build.expect_install().times(1).returning(|_| Ok(()));
        let (mut env, out) = new_env(config, vcs, build, &[]);

        env.sync("github.com/shuLhan/beku/lib/ini", "").unwrap();

        let pkg = env.graph().get("github.com/shuLhan/beku").unwrap();
        assert_eq!(pkg.version(), "v0.2.0");
        assert!(pkg.is_tag());
        assert_eq!(pkg.remote_branch, "master");
        assert_eq!(pkg.state, PackageState::Dirty);
        assert!(env.is_dirty());
        assert!(out.contents().contains(">>> Building github.com/shuLhan/beku ..."));
    }

    #[test]
    fn test_sync_empty_name() {
        let (_dir, config) = workspace();
        let (mut env, _) = new_env(config, MockVcs::new(), MockBuildTool::new(), &[]);

        for name in ["", "@v1.0.0"] {
            let err = env.sync(name, "").unwrap_err();
            assert_eq!(
                err.downcast_ref::<BekuError>(),
                Some(&BekuError::EmptyOrInvalidPackageName)
            );
        }
        assert!(env.graph().is_empty());
    }

    #[test]
    fn test_sync_excluded_is_noop() {
        let (_dir, config) = workspace();
        let (mut env, out) = new_env(config, MockVcs::new(), MockBuildTool::new(), &[]);
        env.graph_mut().add_exclude("github.com/x/y");
        env.graph_mut().clear_dirty();

        env.sync("github.com/x/y", "").unwrap();
        env.sync("github.com/a/b", "github.com/x/y").unwrap();

        assert!(env.graph().is_empty());
        assert!(!env.is_dirty());
        assert!(out.contents().contains("is excluded"));
    }

    #[test]
    fn test_sync_resolves_missing_of_others() {
        let (_dir, mut config) = workspace();
        config.no_deps = true;
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo()
            .withf(|url, _| url == "https://go.googlesource.com/crypto")
            .returning(|_, dest| {
                fs::create_dir_all(dest.join(".git")).unwrap();
                Ok(())
            });
        vcs.expect_remote_branches()
            .returning(|_| Ok(vec!["master".to_string()]));
        vcs.expect_latest_tag().returning(|_| Ok(String::new()));
        vcs.expect_latest_commit()
            .returning(|_, _| Ok("1e7ff30".to_string()));
        vcs.expect_checkout_revision().returning(|_, _, _, _| Ok(()));
        let mut build = no_imports();
        build.expect_install().times(1).returning(|_| Ok(()));
        let (mut env, _) = new_env(config, vcs, build, &[]);
        let a = tracked(&mut env, "github.com/a/a", "v1.0.0");
        env.graph_mut().add_dep(a, "golang.org/x/crypto/ssh");

        env.sync("golang.org/x/crypto", "").unwrap();

        let g = env.graph();
        let crypto = g.get("golang.org/x/crypto").unwrap();
        assert_eq!(crypto.version(), "1e7ff30");
        assert_eq!(crypto.required_by, vec!["github.com/a/a"]);
        let a = g.get("github.com/a/a").unwrap();
        assert_eq!(a.deps, vec!["golang.org/x/crypto"]);
        assert!(a.deps_missing.is_empty());
        assert!(g.missing().is_empty());
    }

    #[test]
    fn test_sync_reports_missing_and_skips_build() {
        let (_dir, mut config) = workspace();
        config.no_deps = true;
        let mut build = MockBuildTool::new();
        build
            .expect_recursive_imports()
            .returning(|_| Ok(vec!["github.com/shuLhan/share/lib/ini".to_string()]));
        build.expect_install().never();
        let (mut env, out) = new_env(config, cloning_vcs("v0.1.0"), build, &[]);

        env.sync("github.com/a/a", "").unwrap();

        let pkg = env.graph().get("github.com/a/a").unwrap();
        assert_eq!(pkg.deps_missing, vec!["github.com/shuLhan/share/lib/ini"]);
        assert_eq!(env.graph().missing(), &["github.com/shuLhan/share/lib/ini"]);
        assert!(out.contents().contains("    - github.com/shuLhan/share/lib/ini\n"));
    }

    #[test_log::test]
    fn test_sync_installs_missing_dependencies() {
        let (_dir, config) = workspace();
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo()
            .withf(|url, _| url == "https://github.com/shuLhan/share")
            .times(1)
            .returning(|_, dest| {
                fs::create_dir_all(dest.join(".git")).unwrap();
                Ok(())
            });
        vcs.expect_remote_branches()
            .returning(|_| Ok(vec!["master".to_string()]));
        vcs.expect_latest_tag().returning(|_| Ok("v0.3.0".to_string()));
        vcs.expect_checkout_revision().returning(|_, _, _, _| Ok(()));
        let mut build = no_imports();
        build.expect_install().times(1).returning(|_| Ok(()));
        let (mut env, _) = new_env(config, vcs, build, &[]);
        let a = tracked(&mut env, "github.com/a/a", "v1.0.0");
        env.graph_mut()
            .add_dep(a, "github.com/shuLhan/share/lib/ini");

        env.install_missing().unwrap();

        let g = env.graph();
        assert!(g.get("github.com/shuLhan/share").is_some());
        assert_eq!(g.get("github.com/a/a").unwrap().deps, vec!["github.com/shuLhan/share"]);
        assert!(g.missing().is_empty());
    }

    #[test]
    fn test_sync_existing_up_to_date() {
        let (_dir, config) = workspace();
        let mut vcs = MockVcs::new();
        vcs.expect_fetch_all().returning(|_| Ok(()));
        vcs.expect_latest_tag().returning(|_| Ok("v1.0.0".to_string()));
        vcs.expect_checkout_revision().never();
        let (mut env, out) = new_env(config, vcs, MockBuildTool::new(), &[]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");

        env.sync("github.com/a/a", "").unwrap();

        assert!(!env.is_dirty());
        assert!(out.contents().contains("Nothing to update."));
    }

    #[test]
    fn test_sync_existing_updates_to_latest() {
        let (_dir, config) = workspace();
        let mut vcs = MockVcs::new();
        vcs.expect_fetch_all().returning(|_| Ok(()));
        vcs.expect_latest_tag().returning(|_| Ok("v1.1.0".to_string()));
        vcs.expect_remote_change().never();
        vcs.expect_checkout_revision()
            .withf(|_, remote, branch, rev| remote == "origin" && branch == "master" && rev == "v1.1.0")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let mut build = MockBuildTool::new();
        build.expect_install().times(1).returning(|_| Ok(()));
        let (mut env, out) = new_env(config, vcs, build, &[]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");

        env.sync("github.com/a/a", "").unwrap();

        let pkg = env.graph().get("github.com/a/a").unwrap();
        assert_eq!(pkg.version(), "v1.1.0");
        assert_eq!(pkg.state, PackageState::Dirty);
        assert!(env.is_dirty());
        assert!(
            out.contents()
                .contains("https://github.com/a/a/compare/v1.0.0...v1.1.0")
        );
    }

    #[test]
    fn test_sync_existing_requested_version() {
        let (_dir, config) = workspace();
        let mut vcs = MockVcs::new();
        vcs.expect_fetch_all().returning(|_| Ok(()));
        vcs.expect_latest_tag().returning(|_| Ok("v1.1.0".to_string()));
        vcs.expect_checkout_revision()
            .withf(|_, _, _, rev| rev == "v0.9.0")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let mut build = MockBuildTool::new();
        build.expect_install().returning(|_| Ok(()));
        let (mut env, _) = new_env(config, vcs, build, &[]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");

        env.sync("github.com/a/a@v0.9.0", "").unwrap();

        assert_eq!(env.graph().get("github.com/a/a").unwrap().version(), "v0.9.0");
    }

    #[test]
    fn test_sync_update_declined() {
        let (_dir, mut config) = workspace();
        config.no_confirm = false;
        let mut vcs = MockVcs::new();
        vcs.expect_fetch_all().returning(|_| Ok(()));
        vcs.expect_latest_tag().returning(|_| Ok("v1.1.0".to_string()));
        vcs.expect_log_revisions()
            .withf(|_, from, to| from == "v1.0.0" && to == "v1.1.0")
            .returning(|_, _, _| Ok("abc1234 fix all the things".to_string()));
        vcs.expect_checkout_revision().never();
        let (mut env, out) = new_env(config, vcs, MockBuildTool::new(), &[true, false]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");

        env.sync("github.com/a/a", "").unwrap();

        let pkg = env.graph().get("github.com/a/a").unwrap();
        assert_eq!(pkg.version(), "v1.0.0");
        assert!(pkg.version_next.is_empty());
        assert!(!env.is_dirty());
        assert!(out.contents().contains("abc1234 fix all the things"));
        assert_eq!(
            env.runtime.prompts(),
            vec!["View commit logs?", "Proceed with update?"]
        );
    }

    #[test]
    fn test_sync_into_replaces_with_fork() {
        let (_dir, config) = workspace();
        let path = make_checkout(&config, "github.com/a/a");
        let mut vcs = MockVcs::new();
        vcs.expect_fetch_all().returning(|_| Ok(()));
        vcs.expect_latest_tag().returning(|_| Ok("v1.0.0".to_string()));
        vcs.expect_remote_change()
            .withf(|_, old, new, url| old == "origin" && new == "origin" && url == "https://github.com/fork/a")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        vcs.expect_checkout_revision().returning(|_, _, _, _| Ok(()));
        let mut build = no_imports();
        build.expect_install().returning(|_| Ok(()));
        let (mut env, _) = new_env(config, vcs, build, &[]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");

        env.sync("github.com/fork/a@v1.0.1", "github.com/a/a").unwrap();

        let pkg = env.graph().get("github.com/a/a").unwrap();
        assert_eq!(pkg.remote_url, "https://github.com/fork/a");
        assert_eq!(pkg.version(), "v1.0.1");
        assert_eq!(pkg.full_path, path);
        assert!(env.graph().get("github.com/fork/a").is_none());
    }

    #[test]
    fn test_sync_into_non_empty_directory_declined() {
        let (_dir, mut config) = workspace();
        config.no_confirm = false;
        let path = config.src_dir().join("github.com/a/a");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("main.go"), "package main").unwrap();
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo().never();
        let (mut env, out) = new_env(config, vcs, MockBuildTool::new(), &[false]);

        env.sync("github.com/a/a", "").unwrap();

        assert!(path.join("main.go").is_file());
        assert!(env.graph().is_empty());
        assert!(out.contents().contains("Sync cancelled."));
        assert_eq!(env.runtime.prompts(), vec!["Clean destination directory?"]);
    }

    #[test_log::test]
    fn test_sync_install_failure_removes_clone() {
        let (_dir, config) = workspace();
        let src = config.src_dir();
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo().returning(|_, dest| {
            fs::create_dir_all(dest.join(".git")).unwrap();
            Err(anyhow::anyhow!("connection reset"))
        });
        let mut build = MockBuildTool::new();
        build.expect_clean().times(1).returning(|_| Ok(()));
        let (mut env, _) = new_env(config, vcs, build, &[]);

        let err = env.sync("github.com/a/a", "").unwrap_err();

        assert!(format!("{:#}", err).contains("connection reset"));
        assert!(!src.join("github.com").exists());
        assert!(env.graph().is_empty());
        assert!(!env.is_dirty());
    }

    #[test]
    fn test_sync_many_stops_at_first_error() {
        let (_dir, mut config) = workspace();
        config.no_deps = true;
        let mut build = no_imports();
        build.expect_install().times(1).returning(|_| Ok(()));
        let (mut env, _) = new_env(config, cloning_vcs("v0.1.0"), build, &[]);

        let names = vec![
            "github.com/a/a".to_string(),
            "".to_string(),
            "github.com/b/b".to_string(),
        ];
        assert!(env.sync_many(&names).is_err());

        assert!(env.graph().get("github.com/a/a").is_some());
        assert!(env.graph().get("github.com/b/b").is_none());
    }

    #[test_log::test]
    fn test_sync_all() {
        let (_dir, config) = workspace();
        let mut vcs = MockVcs::new();
        vcs.expect_fetch_all().returning(|_| Ok(()));
        vcs.expect_latest_tag().returning(|path: &Path| {
            if path.ends_with("github.com/a/a") {
                Ok("v1.1.0".to_string())
            } else {
                Ok("v2.0.0".to_string())
            }
        });
        vcs.expect_checkout_revision()
            .withf(|path, _, _, rev| path.ends_with("github.com/a/a") && rev == "v1.1.0")
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        let mut build = MockBuildTool::new();
        build.expect_install().times(1).returning(|_| Ok(()));
        let (mut env, out) = new_env(config, vcs, build, &[]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");
        tracked(&mut env, "github.com/b/b", "v2.0.0");

        env.sync_all().unwrap();

        let g = env.graph();
        assert_eq!(g.get("github.com/a/a").unwrap().version(), "v1.1.0");
        let b = g.get("github.com/b/b").unwrap();
        assert_eq!(b.version(), "v2.0.0");
        assert!(b.version_next.is_empty());
        assert_eq!(b.state, PackageState::Loaded);
        assert!(g.is_dirty());
        assert!(out.contents().contains("github.com/a/a  v1.0.0 -> v1.1.0"));
    }

    #[test]
    fn test_sync_into_failure_after_move_keeps_refs() {
        let (_dir, mut config) = workspace();
        config.no_deps = true;
        let src = config.src_dir();
        make_checkout(&config, "github.com/a/a");
        let mut vcs = MockVcs::new();
        let mut fetches = 0;
        vcs.expect_fetch_all().returning(move |_| {
            fetches += 1;
            if fetches == 1 {
                Ok(())
            } else {
                Err(anyhow::anyhow!("network is unreachable"))
            }
        });
        vcs.expect_latest_tag().returning(|_| Ok("v1.0.0".to_string()));
        vcs.expect_checkout_revision().never();
        let (mut env, _) = new_env(config, vcs, MockBuildTool::new(), &[]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");
        let c = tracked(&mut env, "github.com/c/c", "v1.0.0");
        env.graph_mut().add_dep(c, "github.com/a/a");
        env.graph_mut().clear_dirty();

        let err = env.sync("github.com/a/a@v1.1.0", "github.com/me/a").unwrap_err();

        assert!(format!("{:#}", err).contains("network is unreachable"));
        assert!(src.join("github.com/me/a").is_dir());
        let g = env.graph();
        assert!(g.get("github.com/a/a").is_none());
        let moved = g.get("github.com/me/a").unwrap();
        assert_eq!(moved.required_by, vec!["github.com/c/c"]);
        assert_eq!(moved.state, PackageState::Dirty);
        assert_eq!(g.get("github.com/c/c").unwrap().deps, vec!["github.com/me/a"]);
        assert!(g.is_dirty());
    }

    #[test]
    fn test_sync_all_checkout_failure_keeps_earlier_updates() {
        let (_dir, config) = workspace();
        let mut vcs = MockVcs::new();
        vcs.expect_fetch_all().returning(|_| Ok(()));
        vcs.expect_latest_tag().returning(|_| Ok("v9.0.0".to_string()));
        vcs.expect_checkout_revision().returning(|path, _, _, _| {
            if path.ends_with("github.com/b/b") {
                Err(anyhow::anyhow!("pathspec 'v9.0.0' did not match"))
            } else {
                Ok(())
            }
        });
        let (mut env, _) = new_env(config, vcs, MockBuildTool::new(), &[]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");
        tracked(&mut env, "github.com/b/b", "v1.0.0");

        assert!(env.sync_all().is_err());

        let g = env.graph();
        let a = g.get("github.com/a/a").unwrap();
        assert_eq!(a.version(), "v9.0.0");
        assert_eq!(a.state, PackageState::Dirty);
        assert_eq!(g.get("github.com/b/b").unwrap().version(), "v1.0.0");
        assert!(g.is_dirty());
    }

    #[test]
    fn test_sync_all_up_to_date() {
        let (_dir, config) = workspace();
        let mut vcs = MockVcs::new();
        vcs.expect_fetch_all().returning(|_| Ok(()));
        vcs.expect_latest_tag().returning(|_| Ok("v1.0.0".to_string()));
        let (mut env, out) = new_env(config, vcs, MockBuildTool::new(), &[]);
        tracked(&mut env, "github.com/a/a", "v1.0.0");

        env.sync_all().unwrap();

        assert!(!env.is_dirty());
        assert!(out.contents().contains("All packages are up to date."));
    }
}
