//! Event sink that writes committed lifecycle events to the log.
//!
//! Delivery to people (mail, notifications) happens outside the worker, by
//! whatever ships these log lines. Each event is logged once with its name
//! and a JSON payload.

use pasajes_core::{EventSink, LifecycleEvent};

/// Logs every lifecycle event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Create the sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn publish(&self, event: &LifecycleEvent) {
        metrics::counter!("pasajes.events.published", "event" => event.name()).increment(1);

        match serde_json::to_string(event) {
            Ok(payload) => {
                tracing::info!(target: "pasajes::events", event = event.name(), %payload, "Lifecycle event");
            }
            Err(error) => {
                tracing::warn!(
                    target: "pasajes::events",
                    event = event.name(),
                    error = %error,
                    "Lifecycle event could not be serialized"
                );
            }
        }
    }
}
