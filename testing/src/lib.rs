//! # Pasajes Testing
//!
//! Testing utilities for the pasajes engine.
//!
//! This crate provides:
//! - [`Roster`]: a seeded cast of members (admin, titular, alternates, delegate)
//! - [`Harness`]: engine over in-memory storage with a controllable clock
//!   and a recording event sink
//! - [`RequestBuilder`] and [`ticket`]: concise inputs for common scenarios
//! - [`properties`]: proptest strategies for lifecycle states
//! - [`assertions`]: error-kind assertions
//!
//! ## Example
//!
//! ```
//! use pasajes_testing::{Harness, RequestBuilder, at};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let h = Harness::start().await;
//! let request = h
//!     .engine
//!     .requests()
//!     .create(
//!         &h.roster.titular_actor(),
//!         RequestBuilder::quota(h.roster.titular.id)
//!             .one_way("LPB", "CBB", at(2025, 1, 8, 9))
//!             .build(),
//!     )
//!     .await
//!     .unwrap();
//! assert!(request.code.starts_with("SPD-25"));
//! # }
//! ```

mod builders;
mod harness;

pub mod assertions;
pub mod properties;

pub use builders::{RequestBuilder, at, date, replacement, ticket};
pub use harness::{Harness, Roster};

use chrono::{DateTime, Utc};
use pasajes_core::mocks::FixedClock;

/// 2025-01-01T00:00:00Z, the start of every harness.
#[must_use]
pub fn test_epoch() -> DateTime<Utc> {
    at(2025, 1, 1, 0)
}

/// Fixed clock for deterministic tests, stopped at [`test_epoch`].
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(test_epoch())
}

/// Route engine logs to the test writer. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pasajes_core=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasajes_core::Clock;

    #[test]
    fn test_clock_starts_at_epoch() {
        let clock = test_clock();
        assert_eq!(clock.now(), test_epoch());
        assert_eq!(clock.now(), clock.now());
    }
}
