//! Command-line argument parsing for flagsync
//!
//! Uses clap for argument parsing with derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use flagsync_core::Environment;
use flagsync_utils::LogConfig;

/// flagsync - client-side feature flag synchronization
#[derive(Parser, Debug)]
#[command(name = "flagsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.config/flagsync/config.toml)
    #[arg(long, short = 'c', global = true, env = "FLAGSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Write logs to a file instead of stderr ("-" for the default log file)
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Pick the logging preset for this invocation
    ///
    /// `debug` is set by `--debug` or by `verbosity = "debug"` in the config.
    pub fn log_config(&self, debug: bool) -> LogConfig {
        match &self.log_file {
            Some(path) if path.as_os_str() == "-" => LogConfig::daemon().with_debug(debug),
            Some(path) => LogConfig::daemon().with_file(path).with_debug(debug),
            None if debug => LogConfig::development(),
            None => LogConfig::cli(),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the controller and print every published view until Ctrl-C
    Run {
        /// Flag values file served by the file provider
        #[arg(long)]
        flags_file: Option<PathBuf>,

        /// Environment (development, staging, production)
        #[arg(long, short = 'e')]
        env: Option<Environment>,

        /// Print views as JSON lines
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Only read the flags file once
        #[arg(long, default_value_t = false)]
        no_watch: bool,
    },

    /// Print the declared defaults for an environment
    Defaults {
        /// Environment (development, staging, production)
        #[arg(long, short = 'e')]
        env: Option<Environment>,

        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the persisted targeting user, generating one if needed
    User {
        /// Discard the stored user and generate a new one
        #[arg(long, default_value_t = false)]
        reset: bool,
    },
}
