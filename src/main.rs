//! Featurelens CLI - feature verification for a running application.

use clap::Parser;
use featurelens::cli::{Cli, Commands, ConfigCommands};
use featurelens::commands::{self, LogsArgs, Output, Workspace};
use featurelens::config::ConfigOverrides;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the diagnostics filter (e.g. `debug`, `featurelens=trace`).
const LOG_ENV: &str = "FL_LOG";

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    init_tracing();

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(featurelens::Error::from)
        .and_then(|runtime| runtime.block_on(run_command(cli)));

    // Handle result
    if let Err(e) = result {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn overrides(base_url: Option<String>, timeout_ms: Option<u64>) -> ConfigOverrides {
    ConfigOverrides {
        base_url,
        test_timeout_ms: timeout_ms,
    }
}

async fn run_command(cli: Cli) -> Result<(), featurelens::Error> {
    let human = cli.human_readable;

    // Init must work when the config file is missing or broken
    let ws = match cli.command {
        Commands::Config {
            command: ConfigCommands::Init { .. },
        } => Workspace::locate(cli.data_dir.as_deref(), cli.config.as_deref())?,
        _ => Workspace::open(cli.data_dir.as_deref(), cli.config.as_deref())?,
    };
    tracing::debug!(data_dir = %ws.data_dir.display(), "Opened workspace");

    match cli.command {
        Commands::Run {
            id,
            base_url,
            timeout_ms,
        } => {
            let result =
                commands::run(&ws, id.as_deref(), &overrides(base_url, timeout_ms)).await?;
            output(&result, human);
        }
        Commands::Features { name, log_limit } => match name {
            Some(name) => output(&commands::feature_show(&ws, &name, log_limit)?, human),
            None => output(&commands::features_list(&ws)?, human),
        },
        Commands::Mark {
            name,
            implemented,
            tested,
            note,
        } => output(
            &commands::mark(&ws, &name, implemented, tested, note.as_deref())?,
            human,
        ),
        Commands::Tests => output(&commands::tests(&ws)?, human),
        Commands::Results => output(&commands::results(&ws)?, human),
        Commands::Report => output(&commands::report(&ws)?, human),
        Commands::Logs {
            level,
            area,
            context,
            from,
            to,
            limit,
        } => {
            let args = LogsArgs {
                level,
                area,
                context,
                from,
                to,
                limit,
            };
            output(&commands::logs(&ws, &args)?, human);
        }
        Commands::Api { limit } => output(&commands::api_results(&ws, limit)?, human),
        Commands::Query { query } => output(&commands::query(&ws, &query).await?, human),
        Commands::Export { path } => output(&commands::export(&ws, path.as_deref())?, human),
        Commands::Import { path } => output(&commands::import(&ws, &path)?, human),
        Commands::Clear { logs, results, api } => {
            output(&commands::clear(&ws, logs, results, api)?, human)
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show {
                base_url,
                timeout_ms,
            } => output(
                &commands::config_show(&ws, &overrides(base_url, timeout_ms))?,
                human,
            ),
            ConfigCommands::Init { force } => output(&commands::config_init(&ws, force)?, human),
        },
    }

    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
