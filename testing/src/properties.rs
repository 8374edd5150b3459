//! Property-based testing utilities using proptest.

use pasajes_core::state::{LegStatus, StateMachine};
use proptest::prelude::*;

/// Any leg status.
pub fn leg_status() -> impl Strategy<Value = LegStatus> {
    proptest::sample::select(LegStatus::ALL)
}

/// One or two legs, the shapes a request can have before rescheduling.
pub fn leg_pair() -> impl Strategy<Value = Vec<LegStatus>> {
    proptest::collection::vec(leg_status(), 1..=2)
}

/// A leg history: live legs plus any number of superseded ones.
pub fn leg_history() -> impl Strategy<Value = Vec<LegStatus>> {
    (
        leg_pair(),
        proptest::collection::vec(
            prop_oneof![Just(LegStatus::Reprogramado), Just(LegStatus::Cancelado)],
            0..3,
        ),
    )
        .prop_map(|(mut live, superseded)| {
            live.extend(superseded);
            live
        })
}
