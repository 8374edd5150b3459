//! Lifecycle events handed to notification delivery.
//!
//! Events are plain data published only after the producing transaction
//! commits. Delivery (email, websocket) lives outside the engine behind
//! [`EventSink`].

use crate::ids::{LiquidationId, MemberId, QuotaItemId, RequestId, TicketId};
use crate::state::RequestStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A committed lifecycle transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A request was filed.
    RequestCreated {
        /// Request
        request_id: RequestId,
        /// Request code
        code: String,
        /// Traveller
        beneficiary: MemberId,
        /// Reserved quota item
        quota_item: Option<QuotaItemId>,
    },
    /// A request (or one of its legs) was approved.
    RequestApproved {
        /// Request
        request_id: RequestId,
        /// Request code
        code: String,
        /// Status after the approval
        status: RequestStatus,
    },
    /// A request was rejected.
    RequestRejected {
        /// Request
        request_id: RequestId,
        /// Request code
        code: String,
        /// Quota item returned to DISPONIBLE
        released_item: Option<QuotaItemId>,
    },
    /// A request was soft-deleted.
    RequestDeleted {
        /// Request
        request_id: RequestId,
        /// Request code
        code: String,
    },
    /// A request was finalized by its liquidation.
    RequestFinalized {
        /// Request
        request_id: RequestId,
        /// Request code
        code: String,
    },
    /// A quota item changed holder.
    QuotaItemTransferred {
        /// Item
        item_id: QuotaItemId,
        /// Previous holder
        from: MemberId,
        /// New holder
        to: MemberId,
        /// Stated reason
        reason: String,
    },
    /// A ticket was emitted.
    TicketEmitted {
        /// Request
        request_id: RequestId,
        /// Ticket
        ticket_id: TicketId,
        /// Ticket number
        number: String,
    },
    /// A liquidation was approved and its request finalized.
    LiquidationApproved {
        /// Liquidation
        liquidation_id: LiquidationId,
        /// Finalized request
        request_id: RequestId,
    },
    /// A liquidation approval was reverted together with the finalization.
    LiquidationApprovalReverted {
        /// Liquidation
        liquidation_id: LiquidationId,
        /// Request returned to EMITIDO
        request_id: RequestId,
    },
    /// A request without liquidation is close to (or past) its deadline.
    LiquidationDeadlineApproaching {
        /// Request
        request_id: RequestId,
        /// Request code
        code: String,
        /// Traveller
        beneficiary: MemberId,
        /// Last day to present the liquidation
        deadline: NaiveDate,
        /// Days until the deadline; negative when overdue
        days_remaining: i64,
    },
}

impl LifecycleEvent {
    /// Stable event name for logs and metrics labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RequestCreated { .. } => "request_created",
            Self::RequestApproved { .. } => "request_approved",
            Self::RequestRejected { .. } => "request_rejected",
            Self::RequestDeleted { .. } => "request_deleted",
            Self::RequestFinalized { .. } => "request_finalized",
            Self::QuotaItemTransferred { .. } => "quota_item_transferred",
            Self::TicketEmitted { .. } => "ticket_emitted",
            Self::LiquidationApproved { .. } => "liquidation_approved",
            Self::LiquidationApprovalReverted { .. } => "liquidation_approval_reverted",
            Self::LiquidationDeadlineApproaching { .. } => "liquidation_deadline_approaching",
        }
    }
}

/// Receiver of committed lifecycle events.
///
/// Implementations must not block: queue the event and return.
pub trait EventSink: Send + Sync {
    /// Hand over one event.
    fn publish(&self, event: &LifecycleEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: &LifecycleEvent) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = LifecycleEvent::RequestDeleted {
            request_id: RequestId::new(),
            code: "SPD-250001".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "request_deleted");
        assert_eq!(json["code"], "SPD-250001");
        assert_eq!(event.name(), "request_deleted");
    }
}
