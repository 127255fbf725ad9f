//! Structured Logger
//!
//! Wraps `tracing` with a console layer, an optional daily-rolling NDJSON
//! file, and environment-based level control.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the rolling log (`portalchat.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "portalchat.log";

/// Initialize the global subscriber.
///
/// `RUST_LOG` overrides `level`. When `log_dir` is set, events are also
/// written there as NDJSON. `json_console` switches stdout to JSON lines.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logger(level: &str, log_dir: Option<&Path>, json_console: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = log_dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let (pretty_console, json_console_layer) = if json_console {
        (None, Some(fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(true),
            ),
            None,
        )
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty_console)
        .with(json_console_layer)
        .with(file_layer)
        .try_init();
}
