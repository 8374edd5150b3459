//! Error types for quota and request workflow operations.

use crate::ids::{LiquidationId, RequestId};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every engine component and storage backend.
///
/// Taxonomy errors (`NotFound` through `Validation`) are surfaced to the
/// caller as-is and never retried. Storage failures carry a `transient`
/// flag that read paths use to decide on a single internal retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════
    // Domain Errors
    // ═══════════════════════════════════════════════════════════

    /// The referenced entity does not exist (or was soft-deleted).
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The acting member lacks the role or ownership standing.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The operation is not legal in the entity's current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No eligible quota item exists for the request.
    #[error("Quota unavailable: {0}")]
    QuotaUnavailable(String),

    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════
    // Infrastructure Errors
    // ═══════════════════════════════════════════════════════════

    /// The storage backend failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Backend error description
        message: String,
        /// Whether retrying the same read may succeed (lock timeout, connectivity)
        transient: bool,
    },

    /// The caller-supplied deadline elapsed; the transaction was rolled back.
    #[error("Operation timed out")]
    Timeout,

    /// A liquidation changed state but the linked request could not follow.
    ///
    /// Re-running the same liquidation operation completes the request side.
    #[error("Liquidation {liquidation_id} committed but request {request_id} was not updated: {source}")]
    LinkageIncomplete {
        /// Liquidation whose state was committed
        liquidation_id: LiquidationId,
        /// Request that still needs the matching transition
        request_id: RequestId,
        /// Last error returned by the request step
        source: Box<Error>,
    },
}

impl Error {
    /// Build a [`Error::NotFound`] for an entity id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Build a non-transient [`Error::Storage`].
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            transient: false,
        }
    }

    /// Build a transient [`Error::Storage`] (lock wait, connectivity).
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            transient: true,
        }
    }

    /// Returns `true` for the domain taxonomy: bad input, missing entities,
    /// missing standing or an illegal transition.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Forbidden(_)
                | Self::InvalidState(_)
                | Self::QuotaUnavailable(_)
                | Self::Validation(_)
        )
    }

    /// Returns `true` if the same operation may succeed when repeated.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Storage { transient: true, .. } | Self::Timeout)
    }
}
