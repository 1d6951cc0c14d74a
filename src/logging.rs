//! Logging configuration with journald support on Linux.
//!
//! Sets up tracing-based logging that integrates with systemd's journal on
//! Linux systems, with a rolling log file as the fallback.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Name of the optional file whose contents set the log level.
const LEVEL_FILE: &str = "LOGLEVEL";

/// Initialize the logging system.
///
/// The level comes from `PHOTOSYNC_LOG` when set, otherwise from a
/// `LOGLEVEL` file in the working directory, otherwise `info`:
/// - `PHOTOSYNC_LOG=debug` for verbose output
/// - `PHOTOSYNC_LOG=warn` for warnings and errors only
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("PHOTOSYNC_LOG")
        .unwrap_or_else(|_| EnvFilter::new(level_from_file(Path::new(LEVEL_FILE))));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .init();

            tracing::debug!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(|| PathBuf::from("log"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "upload.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer flushes on guard drop, so keep it for the process lifetime.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::debug!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}

/// Read a level name from `path`, lowercased; `info` when absent or empty.
fn level_from_file(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "info".to_string())
}
