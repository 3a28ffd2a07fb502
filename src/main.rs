use anyhow::{Result, bail};
use beku::build::GoTool;
use beku::config::Config;
use beku::env::Env;
use beku::package::VersionPolicy;
use beku::runtime::RealRuntime;
use beku::vcs::Git;
use clap::{ArgGroup, Parser};
use log::debug;
use std::io;

/// beku - Go packages manager for GOPATH workspaces
///
/// Tracks every package checked out under $GOPATH/src together with its
/// version and dependencies, in a small database at
/// $GOPATH/var/beku/beku.db (or ./beku.db when it exists).
///
/// Examples:
///   beku -S                          # Scan GOPATH and save new or changed packages
///   beku -S github.com/user/repo     # Install or update one package
///   beku -S github.com/user/repo@v1.0.0
///   beku -Su                         # Update every package
///   beku -Rs github.com/user/repo    # Remove a package and its unused dependencies
///   beku -B                          # Make GOPATH match the database
#[derive(Parser, Debug)]
#[command(author, version = env!("BEKU_VERSION"), about)]
#[command(group(
    ArgGroup::new("operation")
        .required(true)
        .args(["sync", "remove", "query", "freeze", "database"])
))]
struct Cli {
    /// Install or update packages; scan GOPATH when no package is given
    #[arg(short = 'S', long)]
    sync: bool,

    /// Remove a package
    #[arg(short = 'R', long)]
    remove: bool,

    /// List tracked packages and their versions
    #[arg(short = 'Q', long)]
    query: bool,

    /// Install, check out or delete packages until GOPATH matches the database
    #[arg(short = 'B', long)]
    freeze: bool,

    /// Modify the database
    #[arg(short = 'D', long)]
    database: bool,

    /// With --sync, update every tracked package
    #[arg(short = 'u', long, requires = "sync")]
    update: bool,

    /// With --sync, install the package under this import path instead
    #[arg(long, value_name = "DIR", requires = "sync")]
    into: Option<String>,

    /// With --remove, also remove dependencies that become unused
    #[arg(short = 's', long, requires = "remove")]
    recursive: bool,

    /// With --database, exclude packages from being tracked
    #[arg(short = 'e', long, requires = "database")]
    exclude: bool,

    /// Do not ask for any confirmation
    #[arg(long = "noconfirm")]
    no_confirm: bool,

    /// Do not install missing dependencies
    #[arg(short = 'd', long = "nodeps")]
    no_deps: bool,

    /// When a fetched version counts as an update: "differs" or "newer-tag"
    #[arg(
        long,
        env = "BEKU_VERSION_POLICY",
        value_name = "POLICY",
        default_value = "differs"
    )]
    version_policy: VersionPolicy,

    /// Packages, as import paths, optionally suffixed with @version
    #[arg(value_name = "PACKAGE")]
    packages: Vec<String>,
}

impl Cli {
    /// Checks clap cannot express with argument relations alone.
    fn validate(&self) -> Result<()> {
        if self.sync && self.update && !self.packages.is_empty() {
            bail!("--update does not take packages");
        }
        if self.into.is_some() && self.packages.len() != 1 {
            bail!("--into requires exactly one package");
        }
        if self.remove && self.packages.is_empty() {
            bail!("--remove requires a package");
        }
        if self.database && !self.exclude {
            bail!("--database requires --exclude");
        }
        if self.database && self.packages.is_empty() {
            bail!("--exclude requires at least one package");
        }
        if (self.freeze || self.query) && (self.update || self.into.is_some()) {
            bail!("--update and --into are only valid with --sync");
        }
        if self.freeze && !self.packages.is_empty() {
            bail!("--freeze does not take packages");
        }
        Ok(())
    }
}

fn run(env: &mut Env<RealRuntime, Git, GoTool>, cli: &Cli, first_time: bool) -> Result<()> {
    if cli.sync {
        if first_time && !env.rescan(true)? {
            return Ok(());
        }
        if cli.update {
            return env.sync_all();
        }
        return match cli.packages.as_slice() {
            [] if first_time => Ok(()),
            [] => env.rescan(false).map(|_| ()),
            [pkg] => env.sync(pkg, cli.into.as_deref().unwrap_or_default()),
            pkgs => env.sync_many(pkgs),
        };
    }
    if cli.remove {
        for pkg in &cli.packages {
            env.remove(pkg, cli.recursive)?;
        }
        return Ok(());
    }
    if cli.query {
        return env.query(&cli.packages);
    }
    if cli.freeze {
        return env.freeze();
    }
    env.exclude(&cli.packages)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.validate()?;

    let runtime = RealRuntime;
    let mut config = Config::new(&runtime)?;
    config.no_confirm = cli.no_confirm;
    config.no_deps = cli.no_deps;
    config.version_policy = cli.version_policy;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_filter()))
        .init();
    debug!("{:?}", config);

    let build = GoTool::new(config.gopath.clone());
    let mut env = Env::new(runtime, Git, build, config, Box::new(io::stdout()))?;

    let first_time = !env.load()?;
    if first_time && !cli.sync {
        bail!("no database found, run 'beku -S' to create it");
    }

    run(&mut env, &cli, first_time)?;
    env.save()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli> {
        let cli = Cli::try_parse_from(args)?;
        cli.validate()?;
        Ok(cli)
    }

    #[test]
    fn test_cli_sync_parsing() {
        let cli = parse(&["beku", "-S", "github.com/a/b@v1.0.0"]).unwrap();
        assert!(cli.sync);
        assert_eq!(cli.packages, vec!["github.com/a/b@v1.0.0"]);
        assert_eq!(cli.version_policy, VersionPolicy::Differs);

        let cli = parse(&["beku", "-Su", "--noconfirm"]).unwrap();
        assert!(cli.update);
        assert!(cli.no_confirm);

        let cli = parse(&["beku", "-S", "--into", "github.com/a/b", "github.com/fork/b"]).unwrap();
        assert_eq!(cli.into.as_deref(), Some("github.com/a/b"));
    }

    #[test]
    fn test_cli_remove_parsing() {
        let cli = parse(&["beku", "-Rs", "github.com/a/b"]).unwrap();
        assert!(cli.remove);
        assert!(cli.recursive);
        assert!(parse(&["beku", "-R"]).is_err());
    }

    #[test]
    fn test_cli_database_parsing() {
        let cli = parse(&["beku", "-D", "--exclude", "github.com/x/y"]).unwrap();
        assert!(cli.database);
        assert!(cli.exclude);
        assert!(parse(&["beku", "-D", "github.com/x/y"]).is_err());
        assert!(parse(&["beku", "-De"]).is_err());
    }

    #[test]
    fn test_cli_version_policy() {
        let cli = parse(&["beku", "-Q", "--version-policy", "newer-tag"]).unwrap();
        assert_eq!(cli.version_policy, VersionPolicy::NewerTag);
        assert!(parse(&["beku", "-Q", "--version-policy", "latest"]).is_err());
    }

    #[test]
    fn test_cli_requires_one_operation() {
        assert!(parse(&["beku"]).is_err());
        assert!(parse(&["beku", "github.com/a/b"]).is_err());
        assert!(parse(&["beku", "-S", "-R", "github.com/a/b"]).is_err());
    }

    #[test]
    fn test_cli_flag_misuse() {
        assert!(parse(&["beku", "-Q", "-u"]).is_err());
        assert!(parse(&["beku", "-S", "-s"]).is_err());
        assert!(parse(&["beku", "-Su", "github.com/a/b"]).is_err());
        assert!(parse(&["beku", "-S", "--into", "x/y/z", "a/b/c", "d/e/f"]).is_err());
        assert!(parse(&["beku", "-B", "github.com/a/b"]).is_err());
    }
}
