//! Rules for deciding whether a candidate revision is an update.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use semver::Version;

use crate::import_path::is_tag_version;

/// How a rescanned or fetched version is compared with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionPolicy {
    /// Any difference counts as an update.
    #[default]
    Differs,
    /// When both versions are semantic tags only a greater tag counts;
    /// anything else behaves like `Differs`.
    NewerTag,
}

impl VersionPolicy {
    pub fn is_update(self, current: &str, candidate: &str) -> bool {
        if candidate.is_empty() || current == candidate {
            return false;
        }
        match self {
            Self::Differs => true,
            Self::NewerTag => match (parse_tag(current), parse_tag(candidate)) {
                (Some(cur), Some(next)) => next > cur,
                _ => true,
            },
        }
    }
}

/// Parse a tag like `v1.2.3`, `1.2` or `v2` into a semantic version.
fn parse_tag(version: &str) -> Option<Version> {
    if !is_tag_version(version) {
        return None;
    }
    let bare = version.strip_prefix('v').unwrap_or(version);
    if let Ok(v) = Version::parse(bare) {
        return Some(v);
    }
    // Short forms: pad the numeric core to three components.
    let (core, rest) = match bare.find(['-', '+']) {
        Some(idx) => bare.split_at(idx),
        None => (bare, ""),
    };
    let parts = core.split('.').count();
    if parts >= 3 {
        return None;
    }
    let padded = format!("{}{}{}", core, ".0".repeat(3 - parts), rest);
    Version::parse(&padded).ok()
}

impl fmt::Display for VersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Differs => f.write_str("differs"),
            Self::NewerTag => f.write_str("newer-tag"),
        }
    }
}

impl FromStr for VersionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "differs" => Ok(Self::Differs),
            "newer-tag" => Ok(Self::NewerTag),
            other => bail!("unknown version policy '{}'", other),
        }
    }
}
