//! In-memory doubles for tests and local runs.
//!
//! - [`InMemoryStorage`]: transactional store serialized by one async lock,
//!   with fault injection for transient failures and slow commits
//! - [`FixedClock`]: settable time
//! - [`RecordingEventSink`]: captures published events

mod clock;
mod events;
mod storage;

pub use clock::FixedClock;
pub use events::RecordingEventSink;
pub use storage::{InMemoryStorage, InMemoryTransaction, Snapshot};
