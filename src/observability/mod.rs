//! Logging setup for host applications
//!
//! The library itself only emits `tracing` events; binaries embedding it call
//! [`init_tracing`] once at startup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `m3u_ingest=<level>`
pub fn init_tracing(level: &str) -> anyhow::Result<()> {
    let log_filter = format!("m3u_ingest={level}");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}
