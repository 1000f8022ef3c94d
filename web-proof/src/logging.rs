use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "warn,web_proof=info";

/// Installs a formatted subscriber filtered by `RUST_LOG`.
///
/// Fails without side effects if the host already installed a global subscriber.
pub fn init_logging() -> anyhow::Result<()> {
    // use RUST_LOG if provided; otherwise default
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")
}
