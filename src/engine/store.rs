use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::model::*;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Kind {
    Student,
    Block,
    Room,
    Entry,
    Reservation,
}

/// Per-kind id counters. Ids start at 1 and are never reused.
#[derive(Default)]
struct Sequences {
    student: AtomicU64,
    block: AtomicU64,
    room: AtomicU64,
    entry: AtomicU64,
    reservation: AtomicU64,
}

impl Sequences {
    fn counter(&self, kind: Kind) -> &AtomicU64 {
        match kind {
            Kind::Student => &self.student,
            Kind::Block => &self.block,
            Kind::Room => &self.room,
            Kind::Entry => &self.entry,
            Kind::Reservation => &self.reservation,
        }
    }
}

/// USNs are compared trimmed and upper-cased.
pub fn normalize_usn(usn: &str) -> String {
    usn.trim().to_uppercase()
}

/// Canonical collections plus their natural-key and reverse indexes.
///
/// The store does no validation and takes no locks beyond the maps' own;
/// the engine decides what may be written and serializes writers.
pub struct InMemoryStore {
    students: DashMap<Id, Student>,
    usns: DashMap<String, Id>,
    blocks: DashMap<Id, Block>,
    block_names: DashMap<String, Id>,
    /// Block name → rooms in that block.
    block_rooms: DashMap<String, Vec<Id>>,
    rooms: DashMap<Id, SharedRoomState>,
    room_numbers: DashMap<String, Id>,
    /// Timetable entry id → room id
    entry_to_room: DashMap<Id, Id>,
    /// Reservation id → room id
    reservation_to_room: DashMap<Id, Id>,
    seq: Sequences,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            students: DashMap::new(),
            usns: DashMap::new(),
            blocks: DashMap::new(),
            block_names: DashMap::new(),
            block_rooms: DashMap::new(),
            rooms: DashMap::new(),
            room_numbers: DashMap::new(),
            entry_to_room: DashMap::new(),
            reservation_to_room: DashMap::new(),
            seq: Sequences::default(),
        }
    }

    pub(crate) fn allocate(&self, kind: Kind) -> Id {
        self.seq.counter(kind).fetch_add(1, Ordering::Relaxed) + 1
    }

    // ── Students ─────────────────────────────────────────────

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn student(&self, id: Id) -> Option<Student> {
        self.students.get(&id).map(|e| e.value().clone())
    }

    pub fn student_id_by_usn(&self, usn: &str) -> Option<Id> {
        self.usns.get(&normalize_usn(usn)).map(|e| *e.value())
    }

    /// Insert or replace. Keeps the USN index in step with the record.
    pub fn put_student(&self, student: Student) {
        if let Some(old) = self.students.get(&student.id).map(|e| e.usn.clone())
            && old != student.usn
        {
            self.usns.remove(&old);
        }
        self.usns.insert(student.usn.clone(), student.id);
        self.students.insert(student.id, student);
    }

    pub fn remove_student(&self, id: Id) -> Option<Student> {
        let (_, student) = self.students.remove(&id)?;
        self.usns.remove(&student.usn);
        Some(student)
    }

    /// All students in id order.
    pub fn students(&self) -> Vec<Student> {
        let mut all: Vec<Student> = self.students.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.id);
        all
    }

    // ── Blocks ───────────────────────────────────────────────

    pub fn block(&self, id: Id) -> Option<Block> {
        self.blocks.get(&id).map(|e| e.value().clone())
    }

    pub fn block_id_by_name(&self, name: &str) -> Option<Id> {
        self.block_names.get(name).map(|e| *e.value())
    }

    pub fn contains_block_name(&self, name: &str) -> bool {
        self.block_names.contains_key(name)
    }

    pub fn put_block(&self, block: Block) {
        if let Some(old) = self.blocks.get(&block.id).map(|e| e.name.clone())
            && old != block.name
        {
            self.block_names.remove(&old);
        }
        self.block_names.insert(block.name.clone(), block.id);
        self.blocks.insert(block.id, block);
    }

    pub fn remove_block(&self, id: Id) -> Option<Block> {
        let (_, block) = self.blocks.remove(&id)?;
        self.block_names.remove(&block.name);
        self.block_rooms.remove(&block.name);
        Some(block)
    }

    pub fn blocks(&self) -> Vec<Block> {
        let mut all: Vec<Block> = self.blocks.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|b| b.id);
        all
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains_room(&self, id: Id) -> bool {
        self.rooms.contains_key(&id)
    }

    pub fn room(&self, id: Id) -> Option<SharedRoomState> {
        self.rooms.get(&id).map(|e| e.value().clone())
    }

    pub fn room_id_by_number(&self, number: &str) -> Option<Id> {
        self.room_numbers.get(number).map(|e| *e.value())
    }

    pub fn insert_room(&self, state: RoomState) {
        let room = &state.room;
        let id = room.id;
        self.room_numbers.insert(room.room_number.clone(), id);
        self.block_rooms.entry(room.block.clone()).or_default().push(id);
        self.rooms.insert(id, Arc::new(RwLock::new(state)));
    }

    /// Re-point the indexes after a room's number or block changed.
    pub fn reindex_room(&self, before: &Room, after: &Room) {
        if before.room_number != after.room_number {
            self.room_numbers.remove(&before.room_number);
            self.room_numbers.insert(after.room_number.clone(), after.id);
        }
        if before.block != after.block {
            self.detach_from_block(&before.block, before.id);
            self.block_rooms.entry(after.block.clone()).or_default().push(after.id);
        }
    }

    pub fn remove_room(&self, room: &Room) -> Option<SharedRoomState> {
        let (_, state) = self.rooms.remove(&room.id)?;
        self.room_numbers.remove(&room.room_number);
        self.detach_from_block(&room.block, room.id);
        Some(state)
    }

    fn detach_from_block(&self, block: &str, room_id: Id) {
        if let Some(mut ids) = self.block_rooms.get_mut(block) {
            ids.retain(|id| *id != room_id);
        }
    }

    /// Room ids in ascending order, so scans over rooms are deterministic.
    pub fn room_ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.rooms.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn rooms_in_block(&self, block: &str) -> Vec<Id> {
        let mut ids = self
            .block_rooms
            .get(block)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn block_has_rooms(&self, block: &str) -> bool {
        self.block_rooms
            .get(block)
            .is_some_and(|ids| !ids.is_empty())
    }

    // ── Entity index ─────────────────────────────────────────

    pub fn room_for_entry(&self, entry_id: Id) -> Option<Id> {
        self.entry_to_room.get(&entry_id).map(|e| *e.value())
    }

    pub fn map_entry(&self, entry_id: Id, room_id: Id) {
        self.entry_to_room.insert(entry_id, room_id);
    }

    pub fn unmap_entry(&self, entry_id: Id) {
        self.entry_to_room.remove(&entry_id);
    }

    pub fn room_for_reservation(&self, reservation_id: Id) -> Option<Id> {
        self.reservation_to_room.get(&reservation_id).map(|e| *e.value())
    }

    pub fn map_reservation(&self, reservation_id: Id, room_id: Id) {
        self.reservation_to_room.insert(reservation_id, room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: Id, usn: &str) -> Student {
        Student {
            id,
            usn: usn.into(),
            name: "John Doe".into(),
            email: "john@student.edu".into(),
            phone: "9876543210".into(),
            department: "Computer Science".into(),
            semester: 5,
            section: "A".into(),
        }
    }

    fn room(id: Id, number: &str, block: &str) -> Room {
        Room {
            id,
            room_number: number.into(),
            block: block.into(),
            floor: 1,
            kind: RoomKind::Classroom,
            capacity: 60,
            has_projector: true,
            has_ac: true,
        }
    }

    #[test]
    fn ids_are_per_kind_and_never_reused() {
        let store = InMemoryStore::new();
        assert_eq!(store.allocate(Kind::Student), 1);
        assert_eq!(store.allocate(Kind::Student), 2);
        assert_eq!(store.allocate(Kind::Room), 1);
        store.put_student(student(2, "1MS21CS002"));
        store.remove_student(2);
        assert_eq!(store.allocate(Kind::Student), 3);
    }

    #[test]
    fn usn_index_follows_updates() {
        let store = InMemoryStore::new();
        store.put_student(student(1, "1MS21CS001"));
        assert_eq!(store.student_id_by_usn(" 1ms21cs001 "), Some(1));

        store.put_student(student(1, "1MS21CS099"));
        assert_eq!(store.student_id_by_usn("1MS21CS001"), None);
        assert_eq!(store.student_id_by_usn("1MS21CS099"), Some(1));

        store.remove_student(1);
        assert_eq!(store.student_id_by_usn("1MS21CS099"), None);
        assert_eq!(store.student_count(), 0);
    }

    #[test]
    fn block_children_index() {
        let store = InMemoryStore::new();
        store.insert_room(RoomState::new(room(2, "A102", "A Block")));
        store.insert_room(RoomState::new(room(1, "A101", "A Block")));
        assert_eq!(store.rooms_in_block("A Block"), vec![1, 2]);
        assert!(store.block_has_rooms("A Block"));

        let before = room(1, "A101", "A Block");
        let after = room(1, "B101", "B Block");
        store.reindex_room(&before, &after);
        assert_eq!(store.rooms_in_block("A Block"), vec![2]);
        assert_eq!(store.rooms_in_block("B Block"), vec![1]);
        assert_eq!(store.room_id_by_number("B101"), Some(1));
        assert_eq!(store.room_id_by_number("A101"), None);

        store.remove_room(&room(2, "A102", "A Block"));
        assert!(!store.block_has_rooms("A Block"));
        assert_eq!(store.room_ids(), vec![1]);
    }
}
