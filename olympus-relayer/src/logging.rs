use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::NodeError;

/// File name of the log written when file logging is enabled.
pub const LOG_FILE: &str = "relayer.log";

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. When `log_dir` is set, output
/// goes to `<log_dir>/relayer.log` without ANSI colors.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<(), NodeError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| NodeError::LoggingError {
            reason: format!("invalid log level '{}': {}", level, e),
        })?,
    };

    let result = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    result.map_err(|e| NodeError::LoggingError {
        reason: e.to_string(),
    })
}
