mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use availability::{current_occupant, next_entry, room_status, tally};
pub use conflict::{find_entry_conflict, find_reservation_conflict, validate_span};
pub use error::{Conflicting, EngineError, Key};
pub use store::{InMemoryStore, SharedRoomState, normalize_usn};

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockWriteGuard};

use crate::model::*;
use crate::notify::NotifyHub;

/// The campus scheduling engine: entity store, availability queries and
/// the reservation conflict checker behind one access-checked API.
///
/// Locking: each room's schedule sits behind its own `RwLock`, so a
/// conflict check and the commit that follows happen under one write
/// guard and readers never observe a half-applied booking. Structural
/// changes (students, blocks, rooms) are additionally serialized by the
/// `catalog` mutex so referential checks cannot race their commits.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub notify: Arc<NotifyHub>,
    pub(super) catalog: Mutex<()>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Arc::new(NotifyHub::new()))
    }
}

impl Engine {
    pub fn new(notify: Arc<NotifyHub>) -> Self {
        Self {
            store: InMemoryStore::new(),
            notify,
            catalog: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Room number → id, or `NotFound`.
    pub(super) fn resolve_room(&self, number: &str) -> Result<Id, EngineError> {
        self.store
            .room_id_by_number(number)
            .ok_or_else(|| Key::RoomNumber(number.to_string()))
            .map_err(EngineError::NotFound)
    }

    /// Acquire a room's write lock, re-checking afterwards that the room was
    /// not deleted while we waited for it.
    pub(super) async fn lock_room_write(
        &self,
        room_id: Id,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let rs = self
            .store
            .room(room_id)
            .ok_or(EngineError::NotFound(Key::Room(room_id)))?;
        let guard = rs.write_owned().await;
        if !self.store.contains_room(room_id) {
            return Err(EngineError::NotFound(Key::Room(room_id)));
        }
        Ok(guard)
    }

    /// Lookup entry → room, acquire the room's write lock.
    pub(super) async fn resolve_entry_write(
        &self,
        entry_id: Id,
    ) -> Result<(Id, OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .store
            .room_for_entry(entry_id)
            .ok_or(EngineError::NotFound(Key::Entry(entry_id)))?;
        let guard = self.lock_room_write(room_id).await?;
        Ok((room_id, guard))
    }

    /// Lookup reservation → room, acquire the room's write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: Id,
    ) -> Result<(Id, OwnedRwLockWriteGuard<RoomState>), EngineError> {
        let room_id = self
            .store
            .room_for_reservation(reservation_id)
            .ok_or(EngineError::NotFound(Key::Reservation(reservation_id)))?;
        let guard = self.lock_room_write(room_id).await?;
        Ok((room_id, guard))
    }

    /// Publish a committed event. Call while still holding the lock that
    /// guarded the commit.
    pub(super) fn publish(&self, event: Event) {
        self.notify.send(&event);
    }
}
