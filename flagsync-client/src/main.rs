//! flagsync - command-line runner
//!
//! Runs the flag sync controller against a flags file and prints every
//! published view, or inspects the declared defaults and targeting user.

use clap::Parser;

use flagsync_core::Verbosity;
use flagsync_utils::{init_logging_with_config, Result};

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e);
        }
    };

    let debug = cli.debug || config.sync.verbosity == Verbosity::Debug;
    init_logging_with_config(cli.log_config(debug))?;
    tracing::debug!("CLI args: {:?}", cli);

    let result = match cli.command {
        Command::Run {
            flags_file,
            env,
            json,
            no_watch,
        } => commands::run(&config, env, flags_file, json, !no_watch).await,
        Command::Defaults { env, json } => commands::defaults(&config, env, json),
        Command::User { reset } => commands::user(reset),
    };

    if let Err(e) = &result {
        tracing::error!("flagsync error: {}", e);
        eprintln!("Error: {}", e);
    }
    result
}
