//! Injected dependencies shared by every engine component.

use crate::error::{Error, Result};
use crate::events::{EventSink, LifecycleEvent, NullEventSink};
use crate::policy::QuotaPolicy;
use crate::retry::{RetryPolicy, retry_with_predicate};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Clock trait for dependency injection.
///
/// Allows tests to control time (expiry, deadlines) deterministically.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Storage, clock, event sink and policy for the engine components.
///
/// Cheap to clone; components hold their own copy.
pub struct Environment<S> {
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    policy: QuotaPolicy,
    timeout: Option<Duration>,
    read_retry: RetryPolicy,
}

impl<S> Clone for Environment<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            clock: Arc::clone(&self.clock),
            events: Arc::clone(&self.events),
            policy: self.policy,
            timeout: self.timeout,
            read_retry: self.read_retry.clone(),
        }
    }
}

impl<S: Storage> Environment<S> {
    /// Environment with default policy, no timeout and a discarding sink.
    #[must_use]
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self::from_shared(Arc::new(storage), clock)
    }

    /// Environment over an already shared store.
    #[must_use]
    pub fn from_shared(storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            events: Arc::new(NullEventSink),
            policy: QuotaPolicy::default(),
            timeout: None,
            read_retry: RetryPolicy::read_path(),
        }
    }

    /// Set the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Set the quota policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: QuotaPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Abort (and roll back) any operation running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retry policy applied to read paths.
    #[must_use]
    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    /// The store.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The shared store handle.
    #[must_use]
    pub fn shared_storage(&self) -> Arc<S> {
        Arc::clone(&self.storage)
    }

    /// Current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The quota policy.
    #[must_use]
    pub const fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Run `op` under the configured timeout.
    ///
    /// On expiry the future is dropped, which drops its open transaction
    /// and rolls it back.
    pub(crate) async fn bounded<T, F>(&self, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, op).await.unwrap_or_else(|_| {
                tracing::warn!(
                    timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    "Operation timed out, transaction rolled back"
                );
                metrics::counter!("pasajes.operations.timeouts").increment(1);
                Err(Error::Timeout)
            }),
            None => op.await,
        }
    }

    /// Run an idempotent read under the timeout, retrying transient
    /// storage failures according to the read policy.
    pub(crate) async fn read<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let env = self;
        retry_with_predicate(
            self.read_retry.clone(),
            move || env.bounded(op()),
            Error::is_transient,
        )
        .await
    }

    /// Hand committed events to the sink.
    pub(crate) fn publish<I>(&self, events: I)
    where
        I: IntoIterator<Item = LifecycleEvent>,
    {
        for event in events {
            tracing::debug!(event = event.name(), "Publishing lifecycle event");
            self.events.publish(&event);
        }
    }
}
