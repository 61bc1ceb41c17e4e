//! Omerta incarceration engine
//!
//! Platform-agnostic jail subsystem for the Omerta browser mafia RPG: the
//! jail record entity, the service orchestrating sentences, breakouts and
//! releases, and the storage/clock/event seams the rest of the game plugs
//! into. No HTTP, no UI; callers hand the service a player id and get a
//! structured result back.

pub mod clock;
pub mod events;
pub mod player;
pub mod record;
pub mod sentence;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventSink, JailEvent, NullSink, RecordingSink};
pub use player::{BreakoutTally, JailStats, Player, PlayerId};
pub use record::{JailRecord, RecordId, Severity};
pub use sentence::{JailConfig, breakout_chance, reduced_sentence_secs, roll_breakout};
pub use service::{
    BreakoutOutcome, JailError, JailService, JailStatus, LEGACY_SENTENCE_REASON,
    MSG_ALREADY_ATTEMPTED, MSG_ALREADY_RELEASED, MSG_NOT_IN_JAIL, ReleaseOutcome,
};
pub use store::{JailRecordStore, MemoryJailStore, MemoryPlayerStore, PlayerStore, StoreError};
