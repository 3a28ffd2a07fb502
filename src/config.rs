use anyhow::Result;
use log::debug;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::BekuError;
use crate::package::VersionPolicy;
use crate::runtime::Runtime;

const ENV_GOPATH: &str = "GOPATH";
const ENV_GOROOT: &str = "GOROOT";
const ENV_DEBUG: &str = "BEKU_DEBUG";

const DIR_SRC: &str = "src";
const DEFAULT_DB_DIR: &str = "var/beku";
pub const DB_FILE_NAME: &str = "beku.db";

/// Workspace locations and run-wide flags, resolved once at start up.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub gopath: PathBuf,
    /// Resolved from the build tool when `GOROOT` is not set.
    pub goroot: Option<PathBuf>,
    pub current_dir: Option<PathBuf>,
    pub no_confirm: bool,
    pub no_deps: bool,
    /// 0 is quiet, 1 prints progress, 2 prints everything.
    pub debug: u8,
    pub version_policy: VersionPolicy,
}

impl Config {
    pub fn new<R: Runtime>(runtime: &R) -> Result<Self> {
        let gopath = Self::resolve_gopath(runtime)?;
        debug!("Using GOPATH: {}", gopath.display());

        let goroot = runtime
            .env_var(ENV_GOROOT)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let debug = runtime
            .env_var(ENV_DEBUG)
            .ok()
            .and_then(|v| v.trim().parse::<u8>().ok())
            .map_or(0, |v| v.min(2));

        Ok(Self {
            gopath,
            goroot,
            current_dir: runtime.current_dir().ok(),
            no_confirm: false,
            no_deps: false,
            debug,
            version_policy: VersionPolicy::default(),
        })
    }

    /// First entry of `$GOPATH`, or `$HOME/go`.
    fn resolve_gopath<R: Runtime>(runtime: &R) -> Result<PathBuf> {
        if let Ok(value) = runtime.env_var(ENV_GOPATH)
            && let Some(first) = env::split_paths(&value).find(|p| !p.as_os_str().is_empty())
        {
            return Ok(first);
        }
        match runtime.home_dir() {
            Some(home) => Ok(home.join("go")),
            None => Err(BekuError::WorkspaceUndefined.into()),
        }
    }

    pub fn src_dir(&self) -> PathBuf {
        self.gopath.join(DIR_SRC)
    }

    pub fn root_src_dir(&self) -> Option<PathBuf> {
        self.goroot.as_ref().map(|root| root.join(DIR_SRC))
    }

    pub fn default_db_file(&self) -> PathBuf {
        self.gopath.join(DEFAULT_DB_DIR).join(DB_FILE_NAME)
    }

    pub fn local_db_file(&self) -> Option<PathBuf> {
        self.current_dir.as_ref().map(|dir| dir.join(DB_FILE_NAME))
    }

    /// Database to use: `./beku.db` when it exists, otherwise the default
    /// one under GOPATH.
    pub fn db_file<R: Runtime>(&self, runtime: &R) -> PathBuf {
        match self.local_db_file() {
            Some(local) if runtime.exists(&local) => local,
            _ => self.default_db_file(),
        }
    }

    /// Default filter for the logger.
    pub fn log_filter(&self) -> &'static str {
        match self.debug {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    /// Configuration rooted at `gopath` with everything else defaulted.
    pub fn for_workspace(gopath: &Path, goroot: &Path) -> Self {
        Self {
            gopath: gopath.to_path_buf(),
            goroot: Some(goroot.to_path_buf()),
            current_dir: None,
            no_confirm: false,
            no_deps: false,
            debug: 0,
            version_policy: VersionPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use std::collections::HashMap;

    fn runtime_with_env(vars: &[(&str, &str)], home: Option<&str>) -> MockRuntime {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let home = home.map(PathBuf::from);

        let mut runtime = MockRuntime::new();
        runtime
            .expect_env_var()
            .returning(move |key| vars.get(key).cloned().ok_or(env::VarError::NotPresent));
        runtime.expect_home_dir().returning(move || home.clone());
        runtime
            .expect_current_dir()
            .returning(|| Ok(PathBuf::from("/work")));
        runtime
    }

    #[test]
    fn test_config_from_env() {
        let runtime = runtime_with_env(
            &[("GOPATH", "/go"), ("GOROOT", "/usr/lib/go"), ("BEKU_DEBUG", "1")],
            Some("/home/user"),
        );

        let config = Config::new(&runtime).unwrap();

        assert_eq!(config.gopath, PathBuf::from("/go"));
        assert_eq!(config.goroot, Some(PathBuf::from("/usr/lib/go")));
        assert_eq!(config.src_dir(), PathBuf::from("/go/src"));
        assert_eq!(config.root_src_dir(), Some(PathBuf::from("/usr/lib/go/src")));
        assert_eq!(config.default_db_file(), PathBuf::from("/go/var/beku/beku.db"));
        assert_eq!(config.debug, 1);
        assert_eq!(config.log_filter(), "info");
        assert!(!config.no_confirm);
        assert_eq!(config.version_policy, VersionPolicy::Differs);
    }

    #[test]
    #[cfg(unix)]
    fn test_config_gopath_list_uses_first() {
        let runtime = runtime_with_env(&[("GOPATH", "/go:/other/go")], None);
        let config = Config::new(&runtime).unwrap();
        assert_eq!(config.gopath, PathBuf::from("/go"));
        assert_eq!(config.goroot, None);
        assert_eq!(config.root_src_dir(), None);
    }

    #[test]
    fn test_config_gopath_falls_back_to_home() {
        let runtime = runtime_with_env(&[("BEKU_DEBUG", "9")], Some("/home/user"));
        let config = Config::new(&runtime).unwrap();
        assert_eq!(config.gopath, PathBuf::from("/home/user/go"));
        assert_eq!(config.debug, 2);
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_config_without_workspace() {
        let runtime = runtime_with_env(&[("GOPATH", "")], None);
        let err = Config::new(&runtime).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BekuError>(),
            Some(&BekuError::WorkspaceUndefined)
        );
    }

    #[test]
    fn test_db_file_prefers_local() {
        let runtime = runtime_with_env(&[("GOPATH", "/go")], None);
        let config = Config::new(&runtime).unwrap();

        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(mockall::predicate::eq(PathBuf::from("/work/beku.db")))
            .returning(|_| true);
        assert_eq!(config.db_file(&runtime), PathBuf::from("/work/beku.db"));

        let mut runtime = MockRuntime::new();
        runtime.expect_exists().returning(|_| false);
        assert_eq!(config.db_file(&runtime), PathBuf::from("/go/var/beku/beku.db"));
    }
}
