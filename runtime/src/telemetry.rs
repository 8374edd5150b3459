//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid; matches every
/// `pasajes_*` crate by prefix.
pub const DEFAULT_FILTER: &str = "pasajes=info";

/// Install the global subscriber: `RUST_LOG` filter plus the fmt layer.
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;
    Ok(())
}
