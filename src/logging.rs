//! Logging for the provider and the `gemini` CLI.
//!
//! Records go to `gemini.log`, rotated daily, under the local data
//! directory (`~/.local/share/gemini-provider/logs/` on Linux). Stdout is
//! left to command output. `--verbose` mirrors records to stderr.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

const LOG_FILE_PREFIX: &str = "gemini.log";

/// Directive used when `RUST_LOG` is unset.
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "gemini_provider=debug,gemini=debug,warn"
    } else {
        "gemini_provider=info,gemini=info,warn"
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the level chosen by `verbose`.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a subscriber is already
/// installed.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let log_dir = log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
    });

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(stderr_layer)
        .with(filter)
        .try_init()?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), verbose, "gemini starting");
    tracing::debug!(log_dir = %log_dir.display(), "Log directory");

    Ok(())
}

fn log_directory() -> anyhow::Result<PathBuf> {
    let base_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(base_dir.join("gemini-provider").join("logs"))
}
