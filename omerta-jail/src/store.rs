//! Storage seams for jail records and player documents.
//!
//! The real game persists both in a document store; these traits are the
//! narrow surface the service needs, with in-memory backends used by the
//! tester and the test suites.
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::player::{Player, PlayerId};
use crate::record::{JailRecord, RecordId};

/// Failures surfaced by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corrupt stored document: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("jail record {0} not found")]
    MissingRecord(RecordId),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Read/write access to the player aggregate's jail-facing fields.
pub trait PlayerStore {
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn load(&self, id: &PlayerId) -> Result<Option<Player>, StoreError>;

    /// # Errors
    ///
    /// Returns an error when the write does not reach the backend.
    fn save(&mut self, player: &Player) -> Result<(), StoreError>;
}

/// Persistence and queries for jail records.
pub trait JailRecordStore {
    /// Hand out the identity for a record about to be inserted.
    fn allocate_id(&mut self) -> RecordId;

    /// # Errors
    ///
    /// Returns an error when the id is already taken or the write fails.
    fn insert(&mut self, record: &JailRecord) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::MissingRecord`] when the record was never inserted.
    fn update(&mut self, record: &JailRecord) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn get(&self, id: RecordId) -> Result<Option<JailRecord>, StoreError>;

    /// The single open record whose window contains `now`; when several
    /// qualify, the one with the latest `end_time` wins.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn active_for_player(
        &self,
        player: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Option<JailRecord>, StoreError>;

    /// Most recently created record regardless of state.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn latest_for_player(&self, player: &PlayerId) -> Result<Option<JailRecord>, StoreError>;

    /// Up to `limit` records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend cannot be read.
    fn history_for_player(
        &self,
        player: &PlayerId,
        limit: usize,
    ) -> Result<Vec<JailRecord>, StoreError>;
}

/// In-memory player backend.
#[derive(Debug, Default)]
pub struct MemoryPlayerStore {
    players: HashMap<PlayerId, Player>,
}

impl MemoryPlayerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a player directly, bypassing the service.
    pub fn put(&mut self, player: Player) {
        self.players.insert(player.id.clone(), player);
    }
}

impl PlayerStore for MemoryPlayerStore {
    fn load(&self, id: &PlayerId) -> Result<Option<Player>, StoreError> {
        Ok(self.players.get(id).cloned())
    }

    fn save(&mut self, player: &Player) -> Result<(), StoreError> {
        self.players.insert(player.id.clone(), player.clone());
        Ok(())
    }
}

/// In-memory jail record backend with monotonic id allocation.
#[derive(Debug, Default)]
pub struct MemoryJailStore {
    records: HashMap<RecordId, JailRecord>,
    next_id: u64,
}

impl MemoryJailStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn for_player<'a>(
        &'a self,
        player: &'a PlayerId,
    ) -> impl Iterator<Item = &'a JailRecord> + 'a {
        self.records.values().filter(move |rec| rec.player == *player)
    }
}

impl JailRecordStore for MemoryJailStore {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        RecordId(self.next_id)
    }

    fn insert(&mut self, record: &JailRecord) -> Result<(), StoreError> {
        if self.records.contains_key(&record.id) {
            return Err(StoreError::Backend(format!(
                "duplicate jail record id {}",
                record.id
            )));
        }
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn update(&mut self, record: &JailRecord) -> Result<(), StoreError> {
        let slot = self
            .records
            .get_mut(&record.id)
            .ok_or(StoreError::MissingRecord(record.id))?;
        *slot = record.clone();
        Ok(())
    }

    fn get(&self, id: RecordId) -> Result<Option<JailRecord>, StoreError> {
        Ok(self.records.get(&id).cloned())
    }

    fn active_for_player(
        &self,
        player: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Option<JailRecord>, StoreError> {
        Ok(self
            .for_player(player)
            .filter(|rec| rec.is_active(now))
            .max_by_key(|rec| (rec.end_time, rec.id))
            .cloned())
    }

    fn latest_for_player(&self, player: &PlayerId) -> Result<Option<JailRecord>, StoreError> {
        Ok(self
            .for_player(player)
            .max_by_key(|rec| (rec.created_at, rec.id))
            .cloned())
    }

    fn history_for_player(
        &self,
        player: &PlayerId,
        limit: usize,
    ) -> Result<Vec<JailRecord>, StoreError> {
        let mut history: Vec<JailRecord> = self.for_player(player).cloned().collect();
        history.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        history.truncate(limit);
        Ok(history)
    }
}
