//! Import path helpers: pure string functions shared by the scanner, the
//! dependency linker and the sync workflow.

/// Directory names skipped while scanning, besides anything starting with
/// `_` or `.`.
const IGNORED_DIRS: [&str; 2] = ["testdata", "vendor"];

/// Pseudo-import used by cgo; never a real package.
pub const CGO_IMPORT: &str = "C";

pub const SEP_IMPORT: char = '/';
pub const SEP_IMPORT_VERSION: char = '@';

const PREFIX_TAG: char = 'v';
const SEP_VERSION: char = '.';

/// Returns true if directory `name` starts with `_` or `.`, or is one of
/// `vendor` or `testdata`.
pub fn is_ignored_dir(name: &str) -> bool {
    if name.starts_with('_') || name.starts_with('.') {
        return true;
    }
    IGNORED_DIRS.contains(&name)
}

/// Returns true if `version` looks like a release tag: prefixed with `v`, or
/// containing a `.` after its first character. The string is not trimmed, so
/// `" v"` is not a tag.
pub fn is_tag_version(version: &str) -> bool {
    if version.starts_with(PREFIX_TAG) {
        return true;
    }
    matches!(version.find(SEP_VERSION), Some(idx) if idx > 0)
}

/// Split `"name@version"` into its trimmed name and version. The version is
/// empty when no `@` is present.
pub fn parse_pkg_version(pkg_name: &str) -> (String, String) {
    let pkg_name = pkg_name.trim();
    match pkg_name.split_once(SEP_IMPORT_VERSION) {
        Some((name, version)) => (name.trim().to_string(), version.trim().to_string()),
        None => (pkg_name.to_string(), String::new()),
    }
}

/// Returns true if `path` equals `prefix` or lives under it, comparing whole
/// `/`-separated segments: `a/b/c` is under `a/b` but `a/bc` is not.
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with(SEP_IMPORT),
        None => false,
    }
}

/// First `/`-separated segment of an import path.
pub fn first_segment(import_path: &str) -> &str {
    import_path
        .split(SEP_IMPORT)
        .next()
        .unwrap_or(import_path)
}

/// Strip the scheme or scp-like user prefix and the `.git` suffix from a
/// remote URL, leaving `host/path`.
fn remote_host_path(remote_url: &str) -> Option<String> {
    let url = remote_url.trim();
    if url.is_empty() {
        return None;
    }

    let host_path = if let Some((_, rest)) = url.split_once("://") {
        let rest = rest.rsplit_once('@').map_or(rest, |(_, r)| r);
        rest.to_string()
    } else if let Some((user_host, path)) = url.split_once(':') {
        let host = user_host.rsplit_once('@').map_or(user_host, |(_, h)| h);
        format!("{}/{}", host, path)
    } else {
        url.to_string()
    };

    let host_path = host_path.trim_end_matches('/');
    Some(host_path.strip_suffix(".git").unwrap_or(host_path).to_string())
}

/// Build a web URL comparing `old_ver` with `new_ver` for the repository at
/// `remote_url`. Only GitHub-hosted repositories (including the `golang.org/x`
/// mirrors) have one; everything else yields an empty string.
pub fn get_compare_url(remote_url: &str, old_ver: &str, new_ver: &str) -> String {
    let Some(host_path) = remote_host_path(remote_url) else {
        return String::new();
    };
    let Some((host, path)) = host_path.split_once(SEP_IMPORT) else {
        return String::new();
    };

    let repo = match host {
        "github.com" => path.to_string(),
        "golang.org" => match path.strip_prefix("x/") {
            Some(name) => format!("golang/{}", name),
            None => return String::new(),
        },
        _ => return String::new(),
    };

    format!("https://github.com/{}/compare/{}...{}", repo, old_ver, new_ver)
}

/// Reduce an import path to the root of the repository that provides it.
///
/// Well-known hosts use `host/owner/repo`; `gopkg.in` uses `gopkg.in/pkg.vN`
/// or `gopkg.in/user/pkg.vN`; anything else is assumed to be a root already.
pub fn repo_root(import_path: &str) -> String {
    let segments: Vec<&str> = import_path.split(SEP_IMPORT).collect();
    let keep = match segments[0] {
        "github.com" | "gitlab.com" | "bitbucket.org" | "golang.org" => 3,
        "gopkg.in" if segments.len() > 1 && segments[1].contains(".v") => 2,
        "gopkg.in" => 3,
        _ => segments.len(),
    };
    segments[..keep.min(segments.len())].join("/")
}

/// Default remote URL for a repository root import path.
pub fn default_remote_url(import_path: &str) -> String {
    let root = repo_root(import_path);
    match root.strip_prefix("golang.org/x/") {
        Some(name) => format!("https://go.googlesource.com/{}", name),
        None => format!("https://{}", root),
    }
}
