//! Tracing initialisation for the TrafficIQ binaries.
//!
//! Logs go to stderr so that command output on stdout stays machine-readable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Settings;

/// Install the global subscriber.
///
/// * `json` emits newline-delimited JSON records.
/// * `level` applies when `RUST_LOG` is unset.
///
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json().flatten_event(true))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
            .ok();
    }
}

/// [`init_tracing`] with the format and level named in `settings`.
pub fn init_tracing_from_settings(settings: &Settings) {
    init_tracing(settings.json_logging, settings.tracing_level());
}
