//! Assertions on engine errors and published events.

use pasajes_core::mocks::RecordingEventSink;
use pasajes_core::{Error, Result};
use std::fmt::Debug;

/// Assert that `result` failed with [`Error::InvalidState`].
///
/// # Panics
///
/// Panics on success or on any other error.
#[allow(clippy::panic)] // Test assertion
pub fn assert_invalid_state<T: Debug>(result: Result<T>) {
    match result {
        Err(Error::InvalidState(_)) => {}
        other => panic!("Expected InvalidState, got {other:?}"),
    }
}

/// Assert that `result` failed with [`Error::Forbidden`].
///
/// # Panics
///
/// Panics on success or on any other error.
#[allow(clippy::panic)] // Test assertion
pub fn assert_forbidden<T: Debug>(result: Result<T>) {
    match result {
        Err(Error::Forbidden(_)) => {}
        other => panic!("Expected Forbidden, got {other:?}"),
    }
}

/// Assert that `result` failed with [`Error::Validation`].
///
/// # Panics
///
/// Panics on success or on any other error.
#[allow(clippy::panic)] // Test assertion
pub fn assert_validation<T: Debug>(result: Result<T>) {
    match result {
        Err(Error::Validation(_)) => {}
        other => panic!("Expected Validation, got {other:?}"),
    }
}

/// Assert that `result` failed with [`Error::QuotaUnavailable`].
///
/// # Panics
///
/// Panics on success or on any other error.
#[allow(clippy::panic)] // Test assertion
pub fn assert_quota_unavailable<T: Debug>(result: Result<T>) {
    match result {
        Err(Error::QuotaUnavailable(_)) => {}
        other => panic!("Expected QuotaUnavailable, got {other:?}"),
    }
}

/// Assert the names of the events published so far, in order.
///
/// # Panics
///
/// Panics if the recorded names differ.
pub fn assert_events(sink: &RecordingEventSink, expected: &[&str]) {
    assert_eq!(sink.names(), expected, "Unexpected published events");
}
