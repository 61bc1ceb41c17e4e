//! Jail record entity: one incarceration episode per record.
//!
//! A record is *active* while the confinement window contains "now" and
//! neither closing flag is set. Once released or broken out of, the record
//! is inert and only kept for history queries. All flag transitions go
//! through the methods here so the set-at-most-once timestamps hold.
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::player::PlayerId;

/// Identifier for a persisted jail record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Breakout difficulty modifier, clamped to 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const MIN: Self = Self(1);
    pub const MAX: Self = Self(5);

    #[must_use]
    pub fn new(value: u8) -> Self {
        Self(value.clamp(Self::MIN.0, Self::MAX.0))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::MIN
    }
}

impl From<u8> for Severity {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Severity> for u8 {
    fn from(value: Severity) -> Self {
        value.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted shape of a single incarceration episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JailRecord {
    pub id: RecordId,
    pub player: PlayerId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub breakout_attempted: bool,
    #[serde(default)]
    pub breakout_successful: bool,
    #[serde(default)]
    pub breakout_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub released: bool,
    #[serde(default)]
    pub release_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JailRecord {
    /// Open a new episode running from `start` for `duration_secs` seconds.
    #[must_use]
    pub fn new(
        id: RecordId,
        player: PlayerId,
        start: DateTime<Utc>,
        duration_secs: u64,
        reason: &str,
        severity: Severity,
    ) -> Self {
        let delta = Duration::try_seconds(i64::try_from(duration_secs).unwrap_or(i64::MAX))
            .unwrap_or(Duration::MAX);
        let end_time = start.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id,
            player,
            start_time: start,
            end_time,
            reason: reason.to_string(),
            severity,
            breakout_attempted: false,
            breakout_successful: false,
            breakout_time: None,
            released: false,
            release_time: None,
            created_at: start,
        }
    }

    /// Whether a closing flag has been set (released or broken out).
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.released || self.breakout_successful
    }

    /// Active means open and the confinement window contains `now`.
    /// The window is inclusive at `start_time`, exclusive at `end_time`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.is_closed() {
            return false;
        }
        self.start_time <= now && now < self.end_time
    }

    /// Whole seconds left to serve, rounded up. Zero once closed or expired.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        if self.is_closed() || now >= self.end_time {
            return 0;
        }
        let millis = (self.end_time - now).num_milliseconds();
        u64::try_from(millis).map_or(0, |ms| ms.div_ceil(1000))
    }

    /// A persisted window that ends before it starts cannot be trusted.
    #[must_use]
    pub fn looks_corrupt(&self) -> bool {
        self.end_time < self.start_time
    }

    /// Wall-clock seconds served, floored. Open records count up to `now`.
    #[must_use]
    pub fn served_secs(&self, now: DateTime<Utc>) -> u64 {
        let closed_at = self.closed_at().unwrap_or(now);
        u64::try_from((closed_at - self.start_time).num_seconds()).unwrap_or(0)
    }

    /// Instant the record was closed, if it has been.
    #[must_use]
    pub const fn closed_at(&self) -> Option<DateTime<Utc>> {
        match (self.breakout_time, self.release_time) {
            (Some(t), _) | (None, Some(t)) => Some(t),
            (None, None) => None,
        }
    }

    /// Administrative or natural release. The timestamp is only written the
    /// first time the flag flips.
    pub fn release(&mut self, now: DateTime<Utc>) {
        self.released = true;
        if self.release_time.is_none() {
            self.release_time = Some(now);
        }
    }

    /// Record that a breakout was tried. Monotonic: never reset.
    pub fn attempt_breakout(&mut self) {
        self.breakout_attempted = true;
    }

    /// Close the record as a successful breakout.
    pub fn breakout(&mut self, now: DateTime<Utc>) {
        self.breakout_successful = true;
        if self.breakout_time.is_none() {
            self.breakout_time = Some(now);
        }
    }
}
