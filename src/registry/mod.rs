//! Participant registry
//!
//! The registry is the broker's only shared mutable state: a fixed-capacity
//! arena of participant slots, each optionally carrying one observer seat.
//! All mutation goes through `Registry`, whose single lock linearizes
//! username claims against the collision scan and makes every broadcast an
//! atomic pass over the attached observers.
//!
//! ```text
//!                         Arc<Registry>
//!                 ┌───────────────────────────┐
//!                 │ slots: [Option<Entry>; N] │
//!                 │   Entry {                 │
//!                 │     username, state,      │
//!                 │     observer: Seat(tx)    │
//!                 │   }                       │
//!                 └─────────────┬─────────────┘
//!                               │
//!            ┌──────────────────┼──────────────────┐
//!            ▼                  ▼                  ▼
//!      [Participant]      [Observer task]    [Observer task]
//!      router.publish()   rx.recv()          rx.recv()
//!            │                  │                  │
//!            └──► registry.broadcast() ──► seat.send() ──► TCP
//! ```
//!
//! Frames are `bytes::Bytes`, so a broadcast clones reference counts, not
//! payloads.

pub mod entry;
pub mod store;

pub use entry::{ObserverSeat, ParticipantEntry, ParticipantState, SlotId};
pub use store::{
    valid_username, AttachOutcome, ClaimOutcome, Registry, RegistrySnapshot, RemovedParticipant,
    DEFAULT_CAPACITY,
};
