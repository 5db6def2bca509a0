//! Tracing subscriber setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "chrono_task=info";

const LOG_FILE_PREFIX: &str = "chrono-task";
const LOG_FILE_SUFFIX: &str = "log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Log to stderr and to a daily-rotated file in `logs_dir`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes the file writer. When the log directory is not writable only
/// stderr logging is installed and `None` is returned.
pub fn init(logs_dir: &Path) -> Option<WorkerGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(logs_dir);

    let appender = match appender {
        Ok(appender) => appender,
        Err(e) => {
            init_stderr();
            tracing::warn!("file logging disabled, {}: {e}", logs_dir.display());
            return None;
        }
    };
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init();
    Some(guard)
}

/// Log to stderr only.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter())
        .try_init();
}
