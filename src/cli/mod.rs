//! CLI argument definitions for Featurelens.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Featurelens - feature verification for a running application.
///
/// Configure endpoint probes in config.kdl, then `fl run` to verify them and
/// `fl features` to see which features are implemented and tested.
#[derive(Parser, Debug)]
#[command(name = "fl")]
#[command(author, version, about = "Correlated tracing, feature tests, and feature status", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Path to config.kdl (defaults to <data-dir>/config.kdl)
    #[arg(short = 'c', long = "config", global = true, env = "FL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the persisted debug store
    #[arg(long = "data-dir", global = true, env = "FL_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one configured test, or all of them in dependency order
    Run {
        /// Test ID (omit to run every test)
        id: Option<String>,

        /// Base URL for endpoint probes (overrides FL_BASE_URL and config)
        #[arg(long)]
        base_url: Option<String>,

        /// Per-test timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Show derived feature status (all features, or one by name)
    Features {
        /// Feature name
        name: Option<String>,

        /// Log entries to include when showing one feature
        #[arg(long, default_value = "20")]
        log_limit: usize,
    },

    /// Record manual verification of a feature
    Mark {
        /// Feature name
        name: String,

        /// Mark the feature implemented (true) or not (false)
        #[arg(long)]
        implemented: Option<bool>,

        /// Mark the feature tested (true) or not (false)
        #[arg(long)]
        tested: Option<bool>,

        /// Append a verification note
        #[arg(long)]
        note: Option<String>,
    },

    /// List registered feature tests
    Tests,

    /// Show the latest result of every test
    Results,

    /// Print the Markdown test report
    Report,

    /// Query the log store (newest first)
    Logs {
        /// Minimum level (debug, info, warn, error)
        #[arg(long)]
        level: Option<String>,

        /// Only entries from this area
        #[arg(long)]
        area: Option<String>,

        /// Only entries from this context
        #[arg(long)]
        context: Option<String>,

        /// Lower time bound (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        from: Option<String>,

        /// Upper time bound (YYYY-MM-DD or RFC 3339, dates are inclusive)
        #[arg(long)]
        to: Option<String>,

        /// Maximum entries to return
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show recent endpoint probe results
    Api {
        /// Maximum results to return
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Execute an allow-listed debug query, e.g. "getEnhancedFeatures()"
    Query {
        /// Query string
        query: String,
    },

    /// Export the debug store as JSON (stdout when no path is given)
    Export {
        /// Output file
        path: Option<PathBuf>,
    },

    /// Replace the debug store with a previously exported snapshot
    Import {
        /// Snapshot file
        path: PathBuf,
    },

    /// Clear stored data (everything when no flag is given)
    Clear {
        /// Clear log entries
        #[arg(long)]
        logs: bool,

        /// Clear feature test results
        #[arg(long)]
        results: bool,

        /// Clear endpoint probe results
        #[arg(long)]
        api: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved settings with the source of each value
    Show {
        /// Base URL override to resolve against
        #[arg(long)]
        base_url: Option<String>,

        /// Timeout override to resolve against
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Write a starter config.kdl
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mark() {
        let cli = Cli::try_parse_from([
            "fl",
            "mark",
            "goal-management",
            "--implemented",
            "false",
            "--note",
            "rolled back",
        ])
        .unwrap();
        match cli.command {
            Commands::Mark {
                name,
                implemented,
                tested,
                note,
            } => {
                assert_eq!(name, "goal-management");
                assert_eq!(implemented, Some(false));
                assert_eq!(tested, None);
                assert_eq!(note.as_deref(), Some("rolled back"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "fl",
            "-H",
            "run",
            "goal-list",
            "--base-url",
            "http://localhost:4000",
            "--timeout-ms",
            "500",
        ])
        .unwrap();
        assert!(cli.human_readable);
        match cli.command {
            Commands::Run {
                id,
                base_url,
                timeout_ms,
            } => {
                assert_eq!(id.as_deref(), Some("goal-list"));
                assert_eq!(base_url.as_deref(), Some("http://localhost:4000"));
                assert_eq!(timeout_ms, Some(500));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_clear_flags() {
        let cli = Cli::try_parse_from(["fl", "clear", "--logs", "--api"]).unwrap();
        match cli.command {
            Commands::Clear { logs, results, api } => {
                assert!(logs);
                assert!(!results);
                assert!(api);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["fl", "features", "--data-dir", "/tmp/fl", "-H"]).unwrap();
        assert!(cli.human_readable);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/fl")));
    }
}
