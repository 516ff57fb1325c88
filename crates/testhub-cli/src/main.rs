mod commands;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use testhub_core::config::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "testhub",
    version,
    about = "Commit-graph mirror and test status aggregation",
    long_about = "testhub mirrors the branches, commits and open pull requests of a hosted\n\
        repository into a local SQLite store, maps the test cases declared at each\n\
        revision and rolls submitted test results up into per-commit statuses.\n\n\
        Quick start:\n  \
        testhub init\n  \
        testhub sync\n  \
        testhub log --branch main\n  \
        testhub show head"
)]
struct Cli {
    /// Enable verbose logging (set log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (default: .testhub/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the local store for the configured repository
    Init,
    /// Check store health and report row counts
    Doctor,
    /// Mirror branches, commits and pull requests from the remote
    ///
    /// Examples:
    ///   testhub sync
    ///   testhub sync --branch main --days-before 10
    ///   testhub sync --force
    Sync {
        /// Sync only this branch (default: every branch plus pull requests)
        #[arg(long)]
        branch: Option<String>,

        /// Fetch complete branch histories instead of a lookback window
        #[arg(long)]
        force: bool,

        /// Initial lookback window in days (default: sync.days_before)
        #[arg(long)]
        days_before: Option<i64>,

        /// Print the sync report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sync sized to the commits of a push notification
    ///
    /// Example: testhub push payload.json
    Push {
        /// Path to the push payload (JSON with commits[].timestamp)
        payload: PathBuf,
    },
    /// Add memberships missing for commits already in the store
    Memberships {
        /// Refresh only this branch (default: every branch)
        #[arg(long)]
        branch: Option<String>,
    },
    /// Discover test cases for commits that have none yet
    Map,
    /// List the commits of a branch, newest first
    Log {
        #[arg(long)]
        branch: Option<String>,

        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: usize,
    },
    /// Show commits around a revision within a branch
    ///
    /// Examples:
    ///   testhub nearby head
    ///   testhub nearby 1a2b3c4 --branch feature --limit 7
    Nearby {
        /// Full SHA, 7-character short SHA, `head` or `auto`
        revision: String,

        #[arg(long)]
        branch: Option<String>,

        /// Maximum commits to show (default: query.nearby_limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show status, completion and test cases of one commit
    Show {
        /// Full SHA, 7-character short SHA, `head` or `auto`
        revision: String,

        #[arg(long)]
        branch: Option<String>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a test submission for a commit and roll it up
    ///
    /// Example: testhub submit 1a2b3c4 results.json
    Submit {
        revision: String,

        /// JSON file with `submission` and `instances`
        file: PathBuf,
    },
    /// Recompute the rollup scalars of a commit
    Recompute { revision: String },
    /// Delete every commit and everything attached to it
    Purge {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_file = cli.config.as_deref().map(Path::new);
    let cwd = std::env::current_dir()?;
    let config = Config::load_with_file(Some(&cwd), config_file)?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run(&config)?,
        Commands::Doctor => commands::doctor::run(&config)?,
        Commands::Sync {
            branch,
            force,
            days_before,
            json,
        } => commands::sync::run(&config, branch.as_deref(), force, days_before, json)?,
        Commands::Push { payload } => commands::sync::run_push(&config, &payload)?,
        Commands::Memberships { branch } => {
            commands::sync::run_memberships(&config, branch.as_deref())?
        }
        Commands::Map => commands::sync::run_map(&config)?,
        Commands::Log { branch, page } => commands::browse::log(&config, branch.as_deref(), page)?,
        Commands::Nearby {
            revision,
            branch,
            limit,
        } => commands::browse::nearby(&config, &revision, branch.as_deref(), limit)?,
        Commands::Show {
            revision,
            branch,
            json,
        } => commands::show::run(&config, &revision, branch.as_deref(), json)?,
        Commands::Submit { revision, file } => commands::results::submit(&config, &revision, &file)?,
        Commands::Recompute { revision } => commands::results::recompute(&config, &revision)?,
        Commands::Purge { yes } => commands::purge::run(&config, yes)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sync_flags_parse() {
        let cli = Cli::try_parse_from([
            "testhub",
            "sync",
            "--branch",
            "main",
            "--days-before",
            "10",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Sync {
                branch,
                force,
                days_before,
                json,
            } => {
                assert_eq!(branch.as_deref(), Some("main"));
                assert!(!force && !json);
                assert_eq!(days_before, Some(10));
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn purge_requires_explicit_flag_to_be_set() {
        let cli = Cli::try_parse_from(["testhub", "purge"]).unwrap();
        assert!(matches!(cli.command, Commands::Purge { yes: false }));
    }
}
