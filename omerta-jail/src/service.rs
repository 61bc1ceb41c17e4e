//! Jail service: the only component that creates jail records and mutates a
//! player's jail-facing fields.
//!
//! Every operation loads the player, reconciles the legacy flat fields
//! against the structured record ("repair on read"), performs the requested
//! transition, and persists both documents. There is no transaction around
//! the two writes; `jail_status` re-derives a consistent view on the next
//! read when a crash lands between them.
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::events::{EventSink, JailEvent, NullSink};
use crate::player::{BreakoutTally, Player, PlayerId};
use crate::record::{JailRecord, Severity};
use crate::sentence::{JailConfig, breakout_chance, reduced_sentence_secs, roll_breakout};
use crate::store::{JailRecordStore, PlayerStore, StoreError};

pub const MSG_NOT_IN_JAIL: &str = "User is not in jail";
pub const MSG_ALREADY_ATTEMPTED: &str = "Breakout already attempted";
pub const MSG_ALREADY_RELEASED: &str = "User is already released";
pub const MSG_BREAKOUT_SUCCESS: &str = "You slipped past the guards and escaped";
pub const MSG_BREAKOUT_FAILED: &str = "The guards caught you climbing the wall";
pub const LEGACY_SENTENCE_REASON: &str = "Legacy jail sentence";

#[derive(Debug, Error)]
pub enum JailError {
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Answer from [`JailService::jail_status`], already reconciled against the
/// legacy flat fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JailStatus {
    /// Not confined; nothing needed closing.
    Free,
    Jailed {
        record: JailRecord,
        remaining_secs: u64,
        breakout_attempted: bool,
        breakout_successful: bool,
    },
    /// An expired or stranded sentence was closed during this read.
    Released {
        served_secs: u64,
        breakout_successful: bool,
    },
}

impl JailStatus {
    #[must_use]
    pub const fn in_jail(&self) -> bool {
        matches!(self, Self::Jailed { .. })
    }

    /// Flat camelCase payload in the shape legacy HTTP clients expect.
    #[must_use]
    pub fn wire_payload(&self) -> Value {
        match self {
            Self::Free => json!({ "inJail": false, "breakoutSuccessful": false }),
            Self::Jailed {
                record,
                remaining_secs,
                breakout_attempted,
                breakout_successful,
            } => json!({
                "inJail": true,
                "jailRecord": record,
                "timeRemaining": remaining_secs,
                "breakoutAttempted": breakout_attempted,
                "breakoutSuccessful": breakout_successful,
            }),
            Self::Released {
                served_secs,
                breakout_successful,
            } => json!({
                "inJail": false,
                "released": true,
                "timeServed": served_secs,
                "breakoutSuccessful": breakout_successful,
            }),
        }
    }
}

/// Result of a breakout attempt. The attempt being *processed* is separate
/// from the breakout *succeeding*: callers branch on the variant, and the
/// wire payload keeps the legacy `success`/`breakoutSuccessful` split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BreakoutOutcome {
    NotInJail,
    AlreadyAttempted,
    Escaped { served_secs: u64 },
    Foiled,
}

impl BreakoutOutcome {
    /// Whether the attempt ran the probability roll at all.
    #[must_use]
    pub const fn was_processed(&self) -> bool {
        matches!(self, Self::Escaped { .. } | Self::Foiled)
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::NotInJail => MSG_NOT_IN_JAIL,
            Self::AlreadyAttempted => MSG_ALREADY_ATTEMPTED,
            Self::Escaped { .. } => MSG_BREAKOUT_SUCCESS,
            Self::Foiled => MSG_BREAKOUT_FAILED,
        }
    }

    #[must_use]
    pub fn wire_payload(&self) -> Value {
        match self {
            Self::NotInJail | Self::AlreadyAttempted => json!({
                "success": false,
                "message": self.message(),
            }),
            Self::Escaped { served_secs } => json!({
                "success": true,
                "breakoutSuccessful": true,
                "message": self.message(),
                "timeServed": served_secs,
            }),
            Self::Foiled => json!({
                "success": true,
                "breakoutSuccessful": false,
                "message": self.message(),
            }),
        }
    }
}

/// Result of an administrative release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReleaseOutcome {
    NotInJail,
    AlreadyReleased,
    /// `served_secs` is absent when only legacy flags were cleared and no
    /// structured record existed to account against.
    Released { served_secs: Option<u64> },
}

impl ReleaseOutcome {
    #[must_use]
    pub const fn released(&self) -> bool {
        matches!(self, Self::Released { .. })
    }

    #[must_use]
    pub fn wire_payload(&self) -> Value {
        match self {
            Self::NotInJail => json!({ "released": false, "message": MSG_NOT_IN_JAIL }),
            Self::AlreadyReleased => json!({ "released": false, "message": MSG_ALREADY_RELEASED }),
            Self::Released { served_secs: Some(secs) } => {
                json!({ "released": true, "timeServed": secs })
            }
            Self::Released { served_secs: None } => json!({ "released": true }),
        }
    }
}

/// Orchestrator over the jail record store and the player aggregate.
pub struct JailService<P: PlayerStore, J: JailRecordStore> {
    players: P,
    records: J,
    cfg: JailConfig,
    clock: Box<dyn Clock>,
    sink: Box<dyn EventSink>,
    rng: Box<dyn RngCore>,
}

impl<P: PlayerStore, J: JailRecordStore> JailService<P, J> {
    #[must_use]
    pub fn new(players: P, records: J) -> Self {
        Self {
            players,
            records,
            cfg: JailConfig::default(),
            clock: Box::new(SystemClock),
            sink: Box::new(NullSink),
            rng: Box::new(SmallRng::from_entropy()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, cfg: JailConfig) -> Self {
        self.cfg = cfg;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    #[must_use]
    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    #[must_use]
    pub fn config(&self) -> &JailConfig {
        &self.cfg
    }

    #[must_use]
    pub fn players(&self) -> &P {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut P {
        &mut self.players
    }

    #[must_use]
    pub fn records(&self) -> &J {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut J {
        &mut self.records
    }

    fn load_player(&self, id: &PlayerId) -> Result<Player, JailError> {
        self.players
            .load(id)?
            .ok_or_else(|| JailError::PlayerNotFound(id.clone()))
    }

    /// Sentence a player. Any active record is silently superseded: it gets
    /// closed without the release accounting path, except that
    /// `accrue_time_on_supersede` credits its served time first.
    ///
    /// # Errors
    ///
    /// Returns [`JailError::PlayerNotFound`] for an unknown player and
    /// propagates storage failures.
    pub fn jail_player(
        &mut self,
        id: &PlayerId,
        requested_secs: u64,
        reason: &str,
        severity: Severity,
    ) -> Result<JailRecord, JailError> {
        let mut player = self.load_player(id)?;
        let now = self.clock.now();
        let effective_secs = reduced_sentence_secs(&self.cfg, requested_secs, player.level);

        if let Some(mut prior) = self.records.active_for_player(id, now)? {
            if self.cfg.accrue_time_on_supersede {
                player.apply_jail_outcome(prior.served_secs(now), None);
            }
            prior.release(now);
            self.records.update(&prior)?;
            log::debug!("superseding active jail record {} for {id}", prior.id);
        }

        let record = JailRecord::new(
            self.records.allocate_id(),
            player.id.clone(),
            now,
            effective_secs,
            reason,
            severity,
        );
        self.records.insert(&record)?;

        player.current_jail_record = Some(record.id);
        player.jail_stats.times_sent_to_jail += 1;
        player.in_jail = true;
        player.jail_time_end = Some(record.end_time);
        player.breakout_attempted = false;
        self.players.save(&player)?;

        self.sink.publish(&JailEvent::Jailed {
            player: player.id.clone(),
            record: record.id,
            duration_secs: effective_secs,
            reason: reason.to_string(),
        });
        Ok(record)
    }

    /// Current confinement state. This is also the repair path: it backfills
    /// a record for legacy-only jailings, clears stale legacy flags, and
    /// closes expired or stranded records, accruing their served time.
    ///
    /// # Errors
    ///
    /// Returns [`JailError::PlayerNotFound`] for an unknown player and
    /// propagates storage failures.
    pub fn jail_status(&mut self, id: &PlayerId) -> Result<JailStatus, JailError> {
        let mut player = self.load_player(id)?;
        let now = self.clock.now();

        let Some(record_id) = player.current_jail_record else {
            return self.reconcile_legacy_only(&mut player, now);
        };

        let Some(mut record) = self.records.get(record_id)? else {
            // Pointer to a record the store never saw; drop it.
            log::debug!("player {id} points at missing jail record {record_id}; clearing");
            player.clear_jail_pointers();
            player.clear_legacy_flags();
            self.players.save(&player)?;
            return Ok(JailStatus::Free);
        };

        if !record.is_closed() && record.looks_corrupt() {
            log::warn!(
                "jail record {} for {id} has end before start; reporting {}s remaining",
                record.id,
                self.cfg.fallback_remaining_secs
            );
            return Ok(JailStatus::Jailed {
                remaining_secs: self.cfg.fallback_remaining_secs,
                breakout_attempted: record.breakout_attempted,
                breakout_successful: false,
                record,
            });
        }

        if record.is_active(now) {
            return Ok(JailStatus::Jailed {
                remaining_secs: record.remaining_secs(now),
                breakout_attempted: record.breakout_attempted,
                breakout_successful: record.breakout_successful,
                record,
            });
        }

        // Sentence over (expired, superseded, or closed elsewhere without
        // the pointer being cleared): close it properly. Served time is only
        // accrued when this read does the closing; a record that was already
        // closed had its accounting done at closing time.
        let was_open = !record.is_closed();
        if was_open {
            record.release(now);
            self.records.update(&record)?;
        }
        let served_secs = record.served_secs(now);
        if was_open {
            player.apply_jail_outcome(served_secs, None);
        }
        player.clear_jail_pointers();
        player.clear_legacy_flags();
        self.players.save(&player)?;
        Ok(JailStatus::Released {
            served_secs,
            breakout_successful: record.breakout_successful,
        })
    }

    fn reconcile_legacy_only(
        &mut self,
        player: &mut Player,
        now: DateTime<Utc>,
    ) -> Result<JailStatus, JailError> {
        if !player.in_jail {
            return Ok(JailStatus::Free);
        }
        let Some(end) = player.jail_time_end.filter(|end| *end > now) else {
            // Legacy flag with a past (or missing) end; the sentence is over.
            log::debug!("clearing stale legacy jail flags for {}", player.id);
            player.clear_legacy_flags();
            self.players.save(player)?;
            return Ok(JailStatus::Free);
        };

        // Still jailed per the legacy fields but no structured record:
        // backfill one so the richer model takes over from here.
        let backfill =
            Duration::try_seconds(i64::try_from(self.cfg.legacy_backfill_secs).unwrap_or(i64::MAX))
                .unwrap_or(Duration::MAX);
        let start = end.checked_sub_signed(backfill).unwrap_or(end);
        let mut record = JailRecord::new(
            self.records.allocate_id(),
            player.id.clone(),
            start,
            0,
            LEGACY_SENTENCE_REASON,
            Severity::default(),
        );
        record.end_time = end;
        record.created_at = now;
        record.breakout_attempted = player.breakout_attempted;
        self.records.insert(&record)?;
        log::debug!("backfilled legacy jail record {} for {}", record.id, player.id);

        player.current_jail_record = Some(record.id);
        self.players.save(player)?;
        Ok(JailStatus::Jailed {
            remaining_secs: record.remaining_secs(now),
            breakout_attempted: record.breakout_attempted,
            breakout_successful: false,
            record,
        })
    }

    /// One-shot breakout attempt for the active sentence. A failed roll
    /// leaves the player jailed; a second attempt on the same sentence is
    /// rejected without touching the stats.
    ///
    /// # Errors
    ///
    /// Returns [`JailError::PlayerNotFound`] for an unknown player and
    /// propagates storage failures.
    pub fn attempt_breakout(&mut self, id: &PlayerId) -> Result<BreakoutOutcome, JailError> {
        let mut player = self.load_player(id)?;
        let now = self.clock.now();

        let Some(mut record) = self.records.active_for_player(id, now)? else {
            return Ok(BreakoutOutcome::NotInJail);
        };
        if record.breakout_attempted {
            return Ok(BreakoutOutcome::AlreadyAttempted);
        }

        record.attempt_breakout();
        self.records.update(&record)?;
        player.breakout_attempted = true;

        let chance = breakout_chance(&self.cfg, player.level, record.severity);
        if roll_breakout(chance, self.rng.as_mut()) {
            record.breakout(now);
            self.records.update(&record)?;
            let served_secs = record.served_secs(now);
            player.apply_jail_outcome(served_secs, Some(BreakoutTally::Success));
            player.clear_jail_pointers();
            self.players.save(&player)?;
            self.sink.publish(&JailEvent::BreakoutSucceeded {
                player: player.id.clone(),
                record: record.id,
                served_secs,
            });
            Ok(BreakoutOutcome::Escaped { served_secs })
        } else {
            player.apply_jail_outcome(0, Some(BreakoutTally::Failure));
            self.players.save(&player)?;
            self.sink.publish(&JailEvent::BreakoutFailed {
                player: player.id.clone(),
                record: record.id,
            });
            Ok(BreakoutOutcome::Foiled)
        }
    }

    /// Administrative release, distinct from natural expiry (which
    /// `jail_status` settles on read).
    ///
    /// # Errors
    ///
    /// Returns [`JailError::PlayerNotFound`] for an unknown player and
    /// propagates storage failures.
    pub fn release_player(&mut self, id: &PlayerId) -> Result<ReleaseOutcome, JailError> {
        let mut player = self.load_player(id)?;
        let now = self.clock.now();

        let Some(record_id) = player.current_jail_record else {
            if player.in_jail {
                // Purely-legacy jailing with no structured record to close.
                player.clear_legacy_flags();
                self.players.save(&player)?;
                return Ok(ReleaseOutcome::Released { served_secs: None });
            }
            return Ok(ReleaseOutcome::NotInJail);
        };

        let Some(mut record) = self.records.get(record_id)? else {
            log::debug!("player {id} points at missing jail record {record_id}; clearing");
            player.clear_jail_pointers();
            player.clear_legacy_flags();
            self.players.save(&player)?;
            return Ok(ReleaseOutcome::Released { served_secs: None });
        };
        if record.is_closed() {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }

        record.release(now);
        self.records.update(&record)?;
        let served_secs = record.served_secs(now);
        player.apply_jail_outcome(served_secs, None);
        // The record pointer stays so a repeated release call can answer
        // "already released"; the next status read drops it.
        player.clear_legacy_flags();
        self.players.save(&player)?;
        self.sink.publish(&JailEvent::Released {
            player: player.id.clone(),
            record: record.id,
            served_secs,
        });
        Ok(ReleaseOutcome::Released {
            served_secs: Some(served_secs),
        })
    }

    /// Most recent sentences, newest first. Pure read.
    ///
    /// # Errors
    ///
    /// Returns [`JailError::PlayerNotFound`] for an unknown player and
    /// propagates storage failures.
    pub fn jail_history(
        &self,
        id: &PlayerId,
        limit: Option<usize>,
    ) -> Result<Vec<JailRecord>, JailError> {
        let player = self.load_player(id)?;
        let limit = limit.unwrap_or(self.cfg.default_history_limit);
        Ok(self.records.history_for_player(&player.id, limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::RecordingSink;
    use crate::store::{MemoryJailStore, MemoryPlayerStore};
    use chrono::TimeZone;
    use rand::rngs::mock::StepRng;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn vinny() -> PlayerId {
        PlayerId::from("vinny")
    }

    struct Harness {
        service: JailService<MemoryPlayerStore, MemoryJailStore>,
        clock: ManualClock,
        sink: RecordingSink,
    }

    fn harness(level: u32, roll: StepRng) -> Harness {
        harness_with_cfg(level, roll, JailConfig::default())
    }

    fn harness_with_cfg(level: u32, roll: StepRng, cfg: JailConfig) -> Harness {
        let clock = ManualClock::at(start());
        let sink = RecordingSink::new();
        let mut players = MemoryPlayerStore::new();
        players.put(Player::new("vinny", level));
        let service = JailService::new(players, MemoryJailStore::new())
            .with_config(cfg)
            .with_clock(clock.clone())
            .with_sink(sink.clone())
            .with_rng(roll);
        Harness { service, clock, sink }
    }

    fn always_escape() -> StepRng {
        StepRng::new(0, 0)
    }

    fn never_escape() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn unknown_player_is_fatal_for_every_operation() {
        let mut h = harness(1, always_escape());
        let ghost = PlayerId::from("ghost");
        assert!(matches!(
            h.service.jail_player(&ghost, 60, "x", Severity::default()),
            Err(JailError::PlayerNotFound(_))
        ));
        assert!(matches!(h.service.jail_status(&ghost), Err(JailError::PlayerNotFound(_))));
        assert!(matches!(h.service.attempt_breakout(&ghost), Err(JailError::PlayerNotFound(_))));
        assert!(matches!(h.service.release_player(&ghost), Err(JailError::PlayerNotFound(_))));
        assert!(matches!(h.service.jail_history(&ghost, None), Err(JailError::PlayerNotFound(_))));
    }

    #[test]
    fn jail_then_status_round_trip() {
        let mut h = harness(1, always_escape());
        let record = h
            .service
            .jail_player(&vinny(), 300, "caught stealing", Severity::new(1))
            .unwrap();
        assert_eq!(record.end_time - record.start_time, Duration::seconds(282));

        match h.service.jail_status(&vinny()).unwrap() {
            JailStatus::Jailed { remaining_secs, breakout_attempted, .. } => {
                assert_eq!(remaining_secs, 282);
                assert!(!breakout_attempted);
            }
            other => panic!("expected jailed status, got {other:?}"),
        }

        let player = h.service.players().load(&vinny()).unwrap().unwrap();
        assert!(player.in_jail);
        assert_eq!(player.jail_time_end, Some(record.end_time));
        assert_eq!(player.current_jail_record, Some(record.id));
        assert_eq!(player.jail_stats.times_sent_to_jail, 1);
        assert_eq!(h.sink.topics(), vec!["user.jailed"]);
    }

    #[test]
    fn expiry_is_settled_on_read() {
        let mut h = harness(1, always_escape());
        h.service
            .jail_player(&vinny(), 300, "loan sharking", Severity::default())
            .unwrap();
        h.clock.advance_secs(400);

        match h.service.jail_status(&vinny()).unwrap() {
            JailStatus::Released { served_secs, breakout_successful } => {
                assert_eq!(served_secs, 400);
                assert!(!breakout_successful);
            }
            other => panic!("expected released, got {other:?}"),
        }

        let player = h.service.players().load(&vinny()).unwrap().unwrap();
        assert!(!player.in_jail);
        assert!(player.current_jail_record.is_none());
        assert_eq!(player.jail_stats.time_served, 400);

        // The repair already ran; the next read is a plain miss.
        assert_eq!(h.service.jail_status(&vinny()).unwrap(), JailStatus::Free);
    }

    #[test]
    fn forced_breakout_success_clears_the_player() {
        let mut h = harness(1, always_escape());
        h.service
            .jail_player(&vinny(), 300, "arson", Severity::new(3))
            .unwrap();
        h.clock.advance_secs(42);

        let outcome = h.service.attempt_breakout(&vinny()).unwrap();
        assert_eq!(outcome, BreakoutOutcome::Escaped { served_secs: 42 });
        assert!(outcome.was_processed());

        let player = h.service.players().load(&vinny()).unwrap().unwrap();
        assert!(player.current_jail_record.is_none());
        assert!(!player.in_jail);
        assert_eq!(player.jail_stats.successful_breakouts, 1);
        assert_eq!(player.jail_stats.failed_breakouts, 0);
        assert_eq!(player.jail_stats.time_served, 42);
        assert_eq!(h.sink.topics(), vec!["user.jailed", "user.breakout.success"]);
        assert_eq!(h.service.jail_status(&vinny()).unwrap(), JailStatus::Free);
    }

    #[test]
    fn forced_breakout_failure_keeps_the_player_jailed() {
        let mut h = harness(1, never_escape());
        h.service
            .jail_player(&vinny(), 300, "arson", Severity::new(3))
            .unwrap();

        assert_eq!(h.service.attempt_breakout(&vinny()).unwrap(), BreakoutOutcome::Foiled);

        let player = h.service.players().load(&vinny()).unwrap().unwrap();
        assert_eq!(player.jail_stats.failed_breakouts, 1);
        assert_eq!(player.jail_stats.successful_breakouts, 0);
        assert!(player.breakout_attempted, "legacy mirror follows the record");
        assert!(h.service.jail_status(&vinny()).unwrap().in_jail());
        assert_eq!(h.sink.topics(), vec!["user.jailed", "user.breakout.failed"]);
    }

    #[test]
    fn second_attempt_on_the_same_sentence_is_rejected() {
        let mut h = harness(1, never_escape());
        h.service
            .jail_player(&vinny(), 300, "arson", Severity::default())
            .unwrap();
        h.service.attempt_breakout(&vinny()).unwrap();
        let before = h.service.players().load(&vinny()).unwrap().unwrap().jail_stats;

        let outcome = h.service.attempt_breakout(&vinny()).unwrap();
        assert_eq!(outcome, BreakoutOutcome::AlreadyAttempted);
        assert!(!outcome.was_processed());
        assert_eq!(outcome.message(), MSG_ALREADY_ATTEMPTED);

        let after = h.service.players().load(&vinny()).unwrap().unwrap().jail_stats;
        assert_eq!(before, after, "a rejected attempt must not touch the stats");
    }

    #[test]
    fn breakout_without_a_sentence_is_not_in_jail() {
        let mut h = harness(1, always_escape());
        assert_eq!(h.service.attempt_breakout(&vinny()).unwrap(), BreakoutOutcome::NotInJail);
    }

    #[test]
    fn release_is_idempotent_in_reply() {
        let mut h = harness(1, always_escape());
        h.service
            .jail_player(&vinny(), 300, "extortion", Severity::default())
            .unwrap();
        h.clock.advance_secs(30);

        let first = h.service.release_player(&vinny()).unwrap();
        assert_eq!(first, ReleaseOutcome::Released { served_secs: Some(30) });
        assert!(first.released());

        let second = h.service.release_player(&vinny()).unwrap();
        assert_eq!(second, ReleaseOutcome::AlreadyReleased);

        let player = h.service.players().load(&vinny()).unwrap().unwrap();
        assert_eq!(player.jail_stats.time_served, 30);
        assert_eq!(player.jail_stats.successful_breakouts, 0);
        assert_eq!(h.sink.topics(), vec!["user.jailed", "user.released"]);

        // The next status read settles the stale pointer without counting
        // the served time a second time.
        assert!(matches!(
            h.service.jail_status(&vinny()).unwrap(),
            JailStatus::Released { served_secs: 30, breakout_successful: false }
        ));
        let player = h.service.players().load(&vinny()).unwrap().unwrap();
        assert_eq!(player.jail_stats.time_served, 30);
        assert_eq!(h.service.release_player(&vinny()).unwrap(), ReleaseOutcome::NotInJail);
    }

    #[test]
    fn release_of_an_already_closed_record_reports_it() {
        let mut h = harness(1, always_escape());
        let record = h
            .service
            .jail_player(&vinny(), 300, "extortion", Severity::default())
            .unwrap();

        // Close the record behind the service's back, keeping the pointer.
        let mut closed = record;
        closed.release(start());
        h.service.records_mut().update(&closed).unwrap();

        assert_eq!(
            h.service.release_player(&vinny()).unwrap(),
            ReleaseOutcome::AlreadyReleased
        );
    }

    #[test]
    fn supersession_keeps_at_most_one_active_record() {
        let mut h = harness(1, always_escape());
        let first = h
            .service
            .jail_player(&vinny(), 300, "first", Severity::default())
            .unwrap();
        h.clock.advance_secs(60);
        let second = h
            .service
            .jail_player(&vinny(), 300, "second", Severity::default())
            .unwrap();

        let active = h
            .service
            .records()
            .active_for_player(&vinny(), h.clock.now())
            .unwrap()
            .unwrap();
        assert_eq!(active.id, second.id);

        let superseded = h.service.records().get(first.id).unwrap().unwrap();
        assert!(superseded.released);

        // Silent supersession by default: no served time credited.
        let player = h.service.players().load(&vinny()).unwrap().unwrap();
        assert_eq!(player.jail_stats.time_served, 0);
        assert_eq!(player.jail_stats.times_sent_to_jail, 2);
    }

    #[test]
    fn supersession_accrues_served_time_when_configured() {
        let cfg = JailConfig {
            accrue_time_on_supersede: true,
            ..JailConfig::default()
        };
        let mut h = harness_with_cfg(1, always_escape(), cfg);

        h.service.jail_player(&vinny(), 300, "first", Severity::default()).unwrap();
        h.clock.advance_secs(60);
        h.service.jail_player(&vinny(), 300, "second", Severity::default()).unwrap();

        let player = h.service.players().load(&vinny()).unwrap().unwrap();
        assert_eq!(player.jail_stats.time_served, 60);
    }

    #[test]
    fn history_round_trip() {
        let mut h = harness(1, always_escape());
        h.service.jail_player(&vinny(), 100, "test", Severity::default()).unwrap();
        let history = h.service.jail_history(&vinny(), Some(1)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "test");
    }

    #[test]
    fn wire_payloads_keep_the_legacy_shape() {
        let free = JailStatus::Free.wire_payload();
        assert_eq!(free["inJail"], false);
        assert_eq!(free["breakoutSuccessful"], false);

        let foiled = BreakoutOutcome::Foiled.wire_payload();
        assert_eq!(foiled["success"], true);
        assert_eq!(foiled["breakoutSuccessful"], false);

        let rejected = BreakoutOutcome::NotInJail.wire_payload();
        assert_eq!(rejected["success"], false);
        assert_eq!(rejected["message"], MSG_NOT_IN_JAIL);

        let released = ReleaseOutcome::Released { served_secs: Some(12) }.wire_payload();
        assert_eq!(released["released"], true);
        assert_eq!(released["timeServed"], 12);
    }
}
