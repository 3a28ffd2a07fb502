//! Database file codec.
//!
//! The database is a TOML document with one `[beku]` table for workspace
//! settings and one `[package."<import path>"]` table per tracked package:
//!
//! ```toml
//! [beku]
//! exclude = ["github.com/x/y"]
//!
//! [package."github.com/shuLhan/beku"]
//! vcs = "git"
//! remote-name = "origin"
//! remote-url = "https://github.com/shuLhan/beku"
//! remote-branch = "master"
//! version = "v0.1.0"
//! deps = ["github.com/shuLhan/share"]
//! required-by = ["github.com/shuLhan/rescached-go"]
//! missing = ["golang.org/x/net/context"]
//! ```
//!
//! A package table that cannot be decoded is logged and skipped; the rest of
//! the file still loads.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::BekuError;
use crate::graph::Graph;
use crate::package::{Package, PackageState, VcsMode};

/// Decoded content of a database file.
#[derive(Debug, Default)]
pub struct Database {
    pub excludes: Vec<String>,
    pub packages: Vec<Package>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BekuTable {
    #[serde(default)]
    exclude: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PackageRecord {
    #[serde(default)]
    vcs: String,
    #[serde(default)]
    remote_name: String,
    #[serde(default)]
    remote_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    remote_branch: String,
    #[serde(default)]
    version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deps: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    required_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    missing: Vec<String>,
}

const PACKAGE_KEYS: &[&str] = &[
    "vcs",
    "remote-name",
    "remote-url",
    "remote-branch",
    "version",
    "deps",
    "required-by",
    "missing",
];

/// Layout of the file on load. Package tables stay untyped so that one bad
/// table does not fail the others.
#[derive(Debug, Default, Deserialize)]
struct RawFile {
    #[serde(default)]
    beku: BekuTable,
    #[serde(default)]
    package: toml::Table,
    #[serde(flatten)]
    unknown: toml::Table,
}

#[derive(Debug, Serialize)]
struct DbFile<'a> {
    beku: BekuTable,
    package: BTreeMap<&'a str, PackageRecord>,
}

impl From<&Package> for PackageRecord {
    fn from(pkg: &Package) -> Self {
        Self {
            vcs: pkg.vcs_mode.to_string(),
            remote_name: pkg.remote_name.clone(),
            remote_url: pkg.remote_url.clone(),
            remote_branch: pkg.remote_branch.clone(),
            version: pkg.version().to_string(),
            deps: pkg.deps.clone(),
            required_by: pkg.required_by.clone(),
            missing: pkg.deps_missing.clone(),
        }
    }
}

fn decode_package(
    import_path: &str,
    value: toml::Value,
    file: &Path,
    src_dir: &Path,
) -> Option<Package> {
    if import_path.trim().is_empty() {
        warn!(
            "{}",
            BekuError::MissingPackageName {
                file: file.to_path_buf()
            }
        );
        return None;
    }

    if let Some(table) = value.as_table() {
        for key in table.keys() {
            if !PACKAGE_KEYS.contains(&key.as_str()) {
                warn!("{}: package '{}': unknown key '{}'", file.display(), import_path, key);
            }
        }
    }

    let record: PackageRecord = match value.try_into() {
        Ok(record) => record,
        Err(err) => {
            warn!("{}: package '{}' skipped: {}", file.display(), import_path, err);
            return None;
        }
    };

    let mut pkg = match Package::new(src_dir, import_path, "") {
        Ok(pkg) => pkg,
        Err(err) => {
            warn!("{}: package '{}' skipped: {}", file.display(), import_path, err);
            return None;
        }
    };

    if !record.vcs.is_empty() {
        pkg.vcs_mode = record.vcs.parse().unwrap_or_else(|err| {
            warn!("{}: package '{}': {}, using git", file.display(), import_path, err);
            VcsMode::default()
        });
    }
    pkg.remote_name = record.remote_name;
    pkg.remote_url = record.remote_url;
    pkg.remote_branch = record.remote_branch;
    pkg.set_version(record.version);
    for dep in &record.deps {
        pkg.push_dep(dep);
    }
    for req in &record.required_by {
        pkg.push_required_by(req);
    }
    for missing in &record.missing {
        pkg.push_missing(missing);
    }

    pkg.state = PackageState::Loaded;
    Some(pkg)
}

/// Decode a database. `file` is only used in diagnostics; package locations
/// are rooted at `src_dir`.
pub fn decode(content: &str, file: &Path, src_dir: &Path) -> Result<Database> {
    let raw: RawFile =
        toml::from_str(content).with_context(|| format!("Parse {}", file.display()))?;

    for key in raw.unknown.keys() {
        warn!("{}: unknown table '{}'", file.display(), key);
    }

    let mut db = Database::default();
    for ex in raw.beku.exclude {
        let ex = ex.trim();
        if !ex.is_empty() && !db.excludes.iter().any(|e| e == ex) {
            db.excludes.push(ex.to_string());
        }
    }
    for (import_path, value) in raw.package {
        if let Some(pkg) = decode_package(&import_path, value, file, src_dir) {
            db.packages.push(pkg);
        }
    }

    Ok(db)
}

/// Render the whole graph. Packages are written in import path order.
pub fn encode(graph: &Graph) -> Result<String> {
    let file = DbFile {
        beku: BekuTable {
            exclude: graph.excludes().to_vec(),
        },
        package: graph
            .pkgs()
            .iter()
            .map(|pkg| (pkg.import_path.as_str(), PackageRecord::from(pkg)))
            .collect(),
    };
    toml::to_string(&file).context("Encode database")
}
