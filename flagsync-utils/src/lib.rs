//! flagsync-utils: Shared utilities for flagsync
//!
//! Error types, logging setup and XDG path helpers used by every crate
//! in the workspace.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{FlagsyncError, Result};
pub use logging::{init_logging_with_config, LogConfig, LogOutput, DEFAULT_LOG_FILE};
pub use paths::{
    config_dir, config_file, data_dir, ensure_dir, flags_file, log_dir, state_dir,
    user_context_file,
};
