use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::time::{Day, Span, TimeOfDay};

/// Entity id. Assigned per kind from a counter that never hands out a
/// deleted id again.
pub type Id = u64;

// ── Students ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Id,
    pub usn: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub semester: u32,
    pub section: String,
}

impl Student {
    /// True if this student attends classes scheduled by `entry`.
    pub fn attends(&self, entry: &TimetableEntry) -> bool {
        entry.department == self.department
            && entry.semester == self.semester
            && entry.section == self.section
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub usn: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub department: String,
    pub semester: u32,
    pub section: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentPatch {
    pub usn: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub semester: Option<u32>,
    pub section: Option<String>,
}

// ── Blocks ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: Id,
    pub name: String,
    pub floors: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlock {
    pub name: String,
    pub floors: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockPatch {
    pub name: Option<String>,
    pub floors: Option<u32>,
    pub description: Option<String>,
}

// ── Rooms ────────────────────────────────────────────────────────

/// What a room is used for. Open set: anything unrecognised is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoomKind {
    Classroom,
    Lab,
    SeminarHall,
    Other(String),
}

impl RoomKind {
    pub fn as_str(&self) -> &str {
        match self {
            RoomKind::Classroom => "classroom",
            RoomKind::Lab => "lab",
            RoomKind::SeminarHall => "seminar_hall",
            RoomKind::Other(s) => s,
        }
    }
}

impl From<String> for RoomKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "classroom" => RoomKind::Classroom,
            "lab" => RoomKind::Lab,
            "seminar_hall" => RoomKind::SeminarHall,
            _ => RoomKind::Other(value),
        }
    }
}

impl From<RoomKind> for String {
    fn from(value: RoomKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Id,
    pub room_number: String,
    /// Name of the owning [`Block`].
    pub block: String,
    pub floor: u32,
    #[serde(rename = "type")]
    pub kind: RoomKind,
    pub capacity: u32,
    pub has_projector: bool,
    #[serde(rename = "hasAC")]
    pub has_ac: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub room_number: String,
    pub block: String,
    pub floor: u32,
    #[serde(rename = "type")]
    pub kind: RoomKind,
    pub capacity: u32,
    #[serde(default)]
    pub has_projector: bool,
    #[serde(rename = "hasAC", default)]
    pub has_ac: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomPatch {
    pub room_number: Option<String>,
    pub block: Option<String>,
    pub floor: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<RoomKind>,
    pub capacity: Option<u32>,
    pub has_projector: Option<bool>,
    #[serde(rename = "hasAC")]
    pub has_ac: Option<bool>,
}

// ── Timetable ────────────────────────────────────────────────────

/// A recurring weekly class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub id: Id,
    pub day: Day,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub subject: String,
    pub teacher: String,
    /// Room number of the room this class is held in.
    pub room: String,
    pub block: String,
    pub department: String,
    pub semester: u32,
    pub section: String,
}

impl TimetableEntry {
    pub fn span(&self) -> Span {
        Span::new(self.start_time.minutes(), self.end_time.minutes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimetableEntry {
    pub day: Day,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub subject: String,
    pub teacher: String,
    pub room: String,
    pub department: String,
    pub semester: u32,
    pub section: String,
}

/// Moving an entry to another room is a remove + add, so `room` is not patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimetablePatch {
    pub day: Option<Day>,
    pub start_time: Option<TimeOfDay>,
    pub end_time: Option<TimeOfDay>,
    pub subject: Option<String>,
    pub teacher: Option<String>,
    pub department: Option<String>,
    pub semester: Option<u32>,
    pub section: Option<String>,
}

// ── Reservations ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
    /// Accepted from loaded data only; nothing moves a reservation into it.
    Pending,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Pending => "pending",
        })
    }
}

/// A one-off booking of a room on a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Id,
    pub room_number: String,
    pub block: String,
    pub teacher_name: String,
    pub teacher_id: String,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub purpose: String,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn span(&self) -> Span {
        Span::new(self.start_time.minutes(), self.end_time.minutes())
    }

    /// Only confirmed reservations hold their slot.
    pub fn is_blocking(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReservation {
    pub room_number: String,
    pub date: NaiveDate,
    pub start_time: TimeOfDay,
    pub end_time: TimeOfDay,
    pub purpose: String,
}

// ── Per-room state ───────────────────────────────────────────────

/// A room together with everything scheduled in it.
///
/// Entries and reservations are kept in insertion order; "first match"
/// lookups are defined against that order.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub timetable: Vec<TimetableEntry>,
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            timetable: Vec::new(),
            reservations: Vec::new(),
        }
    }

    pub fn entries_on(&self, day: Day) -> impl Iterator<Item = &TimetableEntry> {
        self.timetable.iter().filter(move |e| e.day == day)
    }

    /// Confirmed reservations on `date`.
    pub fn blocking_reservations_on(&self, date: NaiveDate) -> impl Iterator<Item = &Reservation> {
        self.reservations
            .iter()
            .filter(move |r| r.date == date && r.is_blocking())
    }

    pub fn entry(&self, id: Id) -> Option<&TimetableEntry> {
        self.timetable.iter().find(|e| e.id == id)
    }

    pub fn remove_entry(&mut self, id: Id) -> Option<TimetableEntry> {
        let pos = self.timetable.iter().position(|e| e.id == id)?;
        Some(self.timetable.remove(pos))
    }

    pub fn reservation_mut(&mut self, id: Id) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == id)
    }

    pub fn has_dependents(&self) -> bool {
        !self.timetable.is_empty() || !self.reservations.is_empty()
    }
}

// ── Events ───────────────────────────────────────────────────────

/// One committed mutation. Flat, no nesting; this is what subscribers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    StudentAdded { id: Id },
    StudentUpdated { id: Id },
    StudentRemoved { id: Id },
    BlockAdded { id: Id },
    BlockUpdated { id: Id },
    BlockRemoved { id: Id },
    RoomAdded { id: Id },
    RoomUpdated { id: Id },
    RoomRemoved { id: Id },
    EntryAdded { id: Id, room_id: Id },
    EntryUpdated { id: Id, room_id: Id },
    EntryRemoved { id: Id, room_id: Id },
    ReservationConfirmed {
        id: Id,
        room_id: Id,
        date: NaiveDate,
        span: Span,
    },
    ReservationCancelled { id: Id, room_id: Id },
}

impl Event {
    /// The room this event concerns, if any.
    pub fn room_id(&self) -> Option<Id> {
        match self {
            Event::RoomAdded { id } | Event::RoomUpdated { id } | Event::RoomRemoved { id } => {
                Some(*id)
            }
            Event::EntryAdded { room_id, .. }
            | Event::EntryUpdated { room_id, .. }
            | Event::EntryRemoved { room_id, .. }
            | Event::ReservationConfirmed { room_id, .. }
            | Event::ReservationCancelled { room_id, .. } => Some(*room_id),
            Event::StudentAdded { .. }
            | Event::StudentUpdated { .. }
            | Event::StudentRemoved { .. }
            | Event::BlockAdded { .. }
            | Event::BlockUpdated { .. }
            | Event::BlockRemoved { .. } => None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyCounts {
    pub vacant: usize,
    pub occupied: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentLocation {
    pub student: Student,
    pub current: Option<TimetableEntry>,
    pub next: Option<TimetableEntry>,
}

/// Live status of one room at a given day and minute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    pub room: Room,
    pub current: Option<TimetableEntry>,
    pub next: Option<TimetableEntry>,
}

impl RoomStatus {
    pub fn is_occupied(&self) -> bool {
        self.current.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// 1-based data row number (the header is row 0).
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: Vec<SkippedRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room {
            id: 1,
            room_number: "A101".into(),
            block: "A Block".into(),
            floor: 1,
            kind: RoomKind::Classroom,
            capacity: 60,
            has_projector: true,
            has_ac: false,
        }
    }

    fn entry(id: Id, day: Day, start: &str, end: &str) -> TimetableEntry {
        TimetableEntry {
            id,
            day,
            start_time: start.parse().unwrap(),
            end_time: end.parse().unwrap(),
            subject: "Networks".into(),
            teacher: "Dr. Wilson".into(),
            room: "A101".into(),
            block: "A Block".into(),
            department: "Computer Science".into(),
            semester: 5,
            section: "A".into(),
        }
    }

    #[test]
    fn room_kind_open_set() {
        assert_eq!(RoomKind::from("lab".to_string()), RoomKind::Lab);
        assert_eq!(RoomKind::from("seminar_hall".to_string()), RoomKind::SeminarHall);
        assert_eq!(
            RoomKind::from("auditorium".to_string()),
            RoomKind::Other("auditorium".into())
        );
        assert_eq!(RoomKind::Other("auditorium".into()).to_string(), "auditorium");
    }

    #[test]
    fn room_json_uses_original_field_names() {
        let json = serde_json::to_value(room()).unwrap();
        assert_eq!(json["roomNumber"], "A101");
        assert_eq!(json["type"], "classroom");
        assert_eq!(json["hasAC"], false);
        assert_eq!(json["hasProjector"], true);
        let back: Room = serde_json::from_value(json).unwrap();
        assert_eq!(back, room());
    }

    #[test]
    fn entries_on_keeps_insertion_order() {
        let mut rs = RoomState::new(room());
        rs.timetable.push(entry(2, Day::Monday, "11:00", "12:00"));
        rs.timetable.push(entry(1, Day::Monday, "09:00", "10:00"));
        rs.timetable.push(entry(3, Day::Tuesday, "09:00", "10:00"));
        let ids: Vec<Id> = rs.entries_on(Day::Monday).map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn remove_entry_returns_removed() {
        let mut rs = RoomState::new(room());
        rs.timetable.push(entry(1, Day::Monday, "09:00", "10:00"));
        assert!(rs.has_dependents());
        assert_eq!(rs.remove_entry(1).map(|e| e.id), Some(1));
        assert!(rs.remove_entry(1).is_none());
        assert!(!rs.has_dependents());
    }

    #[test]
    fn only_confirmed_reservations_block() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut rs = RoomState::new(room());
        for (id, status) in [
            (1, ReservationStatus::Confirmed),
            (2, ReservationStatus::Cancelled),
            (3, ReservationStatus::Pending),
        ] {
            rs.reservations.push(Reservation {
                id,
                room_number: "A101".into(),
                block: "A Block".into(),
                teacher_name: "Dr. Smith".into(),
                teacher_id: "T001".into(),
                date,
                start_time: "14:00".parse().unwrap(),
                end_time: "16:00".parse().unwrap(),
                purpose: "Tutorial".into(),
                status,
            });
        }
        let ids: Vec<Id> = rs.blocking_reservations_on(date).map(|r| r.id).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(rs.blocking_reservations_on(date.succ_opt().unwrap()).count(), 0);
    }

    #[test]
    fn event_json_is_tagged() {
        let event = Event::EntryAdded { id: 4, room_id: 2 };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"entry_added","id":4,"room_id":2}"#);
        assert_eq!(event.room_id(), Some(2));
        assert_eq!(Event::StudentAdded { id: 1 }.room_id(), None);
    }
}
