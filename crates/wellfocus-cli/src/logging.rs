//! Log setup. Output goes to stderr; stdout is reserved for command output.
//!
//! The filter comes from `WELLFOCUS_LOG`, then `RUST_LOG`, then the
//! `log_filter` config key.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wellfocus_core::Config;

pub fn init() {
    let filter = std::env::var("WELLFOCUS_LOG")
        .ok()
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| {
            let directive = Config::load_or_default().log_filter;
            EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"))
        });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .without_time();

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .try_init();
}
