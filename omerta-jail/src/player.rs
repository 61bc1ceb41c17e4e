//! The slice of the player aggregate the jail system is allowed to touch.
//!
//! The full player document is owned elsewhere; this module models only the
//! jail-facing fields plus the legacy flat flags (`in_jail`, `jail_time_end`,
//! `breakout_attempted`) kept for pre-record clients. The structured
//! [`crate::record::JailRecord`] is authoritative; the flat fields are a
//! cached projection the service reconciles on every read.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::RecordId;

/// Identifier for a player document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifetime incarceration counters. All start at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JailStats {
    #[serde(default)]
    pub times_sent_to_jail: u32,
    #[serde(default)]
    pub successful_breakouts: u32,
    #[serde(default)]
    pub failed_breakouts: u32,
    /// Whole seconds served across all closed sentences.
    #[serde(default)]
    pub time_served: u64,
}

/// How a breakout attempt should be tallied against the stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakoutTally {
    Success,
    Failure,
}

const fn default_level() -> u32 {
    1
}

/// Jail-facing view of a player document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    /// Game level; shortens sentences and improves breakout odds.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Pointer to the active jail record, if any.
    #[serde(default)]
    pub current_jail_record: Option<RecordId>,
    /// Legacy flat flag mirroring "currently jailed".
    #[serde(default)]
    pub in_jail: bool,
    /// Legacy flat copy of the scheduled release time.
    #[serde(default)]
    pub jail_time_end: Option<DateTime<Utc>>,
    /// Legacy mirror of the record's breakout-attempted flag.
    #[serde(default)]
    pub breakout_attempted: bool,
    #[serde(default)]
    pub jail_stats: JailStats,
}

impl Player {
    #[must_use]
    pub fn new(id: impl Into<PlayerId>, level: u32) -> Self {
        Self {
            id: id.into(),
            level,
            current_jail_record: None,
            in_jail: false,
            jail_time_end: None,
            breakout_attempted: false,
            jail_stats: JailStats::default(),
        }
    }

    /// Drop the structured pointer and the "currently jailed" projection.
    pub fn clear_jail_pointers(&mut self) {
        self.current_jail_record = None;
        self.in_jail = false;
        self.jail_time_end = None;
    }

    /// Reset every legacy flat field, including the attempt mirror.
    pub fn clear_legacy_flags(&mut self) {
        self.in_jail = false;
        self.jail_time_end = None;
        self.breakout_attempted = false;
    }

    /// Apply a served-time delta and an optional breakout tally in one step.
    pub fn apply_jail_outcome(&mut self, served_secs: u64, tally: Option<BreakoutTally>) {
        self.jail_stats.time_served = self.jail_stats.time_served.saturating_add(served_secs);
        match tally {
            Some(BreakoutTally::Success) => {
                self.jail_stats.successful_breakouts += 1;
            }
            Some(BreakoutTally::Failure) => {
                self.jail_stats.failed_breakouts += 1;
            }
            None => {}
        }
    }
}
