//! Strongly-typed identifiers.
//!
//! Every entity gets its own UUID newtype so that a request id can never be
//! passed where a quota item id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID (e.g. loaded from storage).
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Get the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Member of the legislative body (titular, alternate or staff).
    MemberId
);
entity_id!(
    /// Quota aggregate: one per titular and period.
    QuotaAggregateId
);
entity_id!(
    /// Weekly quota item (voucher).
    QuotaItemId
);
entity_id!(
    /// Travel request.
    RequestId
);
entity_id!(
    /// One leg of a travel request.
    RequestItemId
);
entity_id!(
    /// Ticket issued against a request leg.
    TicketId
);
entity_id!(
    /// Expense liquidation closing a request.
    LiquidationId
);
