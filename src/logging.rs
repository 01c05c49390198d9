//! Tracing subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

use crate::config::ApplicationSettings;

/// Level used for this crate's targets when `RUST_LOG` is unset.
///
/// Each `-v` raises the configured level by one step.
pub fn effective_level(configured: &str, verbosity: u8) -> &'static str {
    const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    let base = LEVELS.iter().position(|l| *l == configured).unwrap_or(2);
    LEVELS[(base + usize::from(verbosity)).min(LEVELS.len() - 1)]
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// settings. Calling this twice is harmless (the second call is ignored).
pub fn init(settings: &ApplicationSettings, verbosity: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,stm_tasks={}",
            effective_level(&settings.log_level, verbosity)
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = if settings.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
