//! Development-time tracing for debugging git-town.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: dev diagnostics via `RUST_LOG` or `--debug`,
//!   output to stderr. Every git invocation is traced at debug level by the
//!   backend and frontend.
//!
//! - **Product output**: step progress and dry-run command echoes go to
//!   stdout and are unaffected by the filter configured here.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// With `debug` set (the `--debug` flag or the `GIT_TOWN_DEBUG` env var) the
/// filter is forced to `git_town=debug` so every git invocation is traced to
/// stderr. Otherwise `RUST_LOG` is honored, defaulting to `warn`.
pub fn init(debug: bool) {
    let filter = if debug {
        EnvFilter::new("git_town=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// True if the `GIT_TOWN_DEBUG` env var requests debug tracing.
pub fn debug_env() -> bool {
    matches!(
        std::env::var("GIT_TOWN_DEBUG").ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}
