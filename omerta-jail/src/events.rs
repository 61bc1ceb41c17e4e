//! Fire-and-forget notifications emitted by the jail service.
//!
//! Nothing in-process consumes these today; the sink seam exists so a real
//! publisher can be dropped in without touching the service.
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

use crate::player::PlayerId;
use crate::record::RecordId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JailEvent {
    Jailed {
        player: PlayerId,
        record: RecordId,
        duration_secs: u64,
        reason: String,
    },
    BreakoutSucceeded {
        player: PlayerId,
        record: RecordId,
        served_secs: u64,
    },
    BreakoutFailed {
        player: PlayerId,
        record: RecordId,
    },
    Released {
        player: PlayerId,
        record: RecordId,
        served_secs: u64,
    },
}

impl JailEvent {
    /// Topic string legacy observers subscribe on.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::Jailed { .. } => "user.jailed",
            Self::BreakoutSucceeded { .. } => "user.breakout.success",
            Self::BreakoutFailed { .. } => "user.breakout.failed",
            Self::Released { .. } => "user.released",
        }
    }
}

/// Observer seam for jail events.
pub trait EventSink {
    fn publish(&self, event: &JailEvent);
}

/// Discards every event; the default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: &JailEvent) {}
}

/// Buffers events for later inspection. Used by the tester and tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<JailEvent>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<JailEvent> {
        self.events.borrow().clone()
    }

    #[must_use]
    pub fn topics(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(JailEvent::topic).collect()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &JailEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
