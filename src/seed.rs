use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::policy::Actor;

/// A reservation as stored in a data file: the booking plus who made it
/// and where it stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReservation {
    #[serde(flatten)]
    pub booking: NewReservation,
    pub teacher_id: String,
    pub teacher_name: String,
    #[serde(default = "confirmed")]
    pub status: ReservationStatus,
}

fn confirmed() -> ReservationStatus {
    ReservationStatus::Confirmed
}

/// Everything needed to bring up a campus. Blocks load before rooms,
/// rooms before timetable entries and reservations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampusSeed {
    pub blocks: Vec<NewBlock>,
    pub rooms: Vec<NewRoom>,
    pub students: Vec<NewStudent>,
    pub timetable: Vec<NewTimetableEntry>,
    pub reservations: Vec<SeedReservation>,
}

#[derive(Debug)]
pub enum SeedError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Rejected(EngineError),
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Io(e) => write!(f, "reading seed: {e}"),
            SeedError::Parse(e) => write!(f, "parsing seed: {e}"),
            SeedError::Rejected(e) => write!(f, "applying seed: {e}"),
        }
    }
}

impl std::error::Error for SeedError {}

impl From<std::io::Error> for SeedError {
    fn from(e: std::io::Error) -> Self {
        SeedError::Io(e)
    }
}

impl From<serde_json::Error> for SeedError {
    fn from(e: serde_json::Error) -> Self {
        SeedError::Parse(e)
    }
}

impl From<EngineError> for SeedError {
    fn from(e: EngineError) -> Self {
        SeedError::Rejected(e)
    }
}

/// The built-in demo campus: three blocks, six rooms, three students,
/// a Monday/Tuesday timetable and two reservations.
pub fn demo() -> Result<CampusSeed, SeedError> {
    Ok(serde_json::from_str(include_str!("../data/demo.json"))?)
}

pub fn load_file(path: &Path) -> Result<CampusSeed, SeedError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Feed a seed through the regular engine operations as the system actor,
/// so every record gets the same validation and conflict checks as live
/// traffic. Stops at the first rejected record.
pub async fn apply(engine: &Engine, seed: CampusSeed) -> Result<(), SeedError> {
    let system = Actor::system();

    for block in seed.blocks {
        engine.add_block(&system, block).await?;
    }
    for room in seed.rooms {
        engine.add_room(&system, room).await?;
    }
    for student in seed.students {
        engine.add_student(&system, student).await?;
    }
    for entry in seed.timetable {
        engine.add_timetable_entry(&system, entry).await?;
    }
    for r in seed.reservations {
        let teacher = Actor::teacher(r.teacher_id, r.teacher_name);
        engine
            .restore_reservation(&system, &teacher, r.booking, r.status)
            .await?;
    }

    info!(
        blocks = engine.store().blocks().len(),
        rooms = engine.store().room_count(),
        students = engine.store().student_count(),
        "seed applied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn demo_parses() {
        let seed = demo().unwrap();
        assert_eq!(seed.blocks.len(), 3);
        assert_eq!(seed.rooms.len(), 6);
        assert_eq!(seed.students.len(), 3);
        assert_eq!(seed.timetable.len(), 5);
        assert_eq!(seed.reservations.len(), 2);
        assert!(seed.reservations.iter().all(|r| r.status == ReservationStatus::Confirmed));
    }

    #[tokio::test]
    async fn demo_applies_cleanly() {
        let engine = Engine::default();
        apply(&engine, demo().unwrap()).await.unwrap();
        assert_eq!(engine.store().room_count(), 6);
        assert_eq!(engine.store().student_count(), 3);
    }

    #[test]
    fn load_file_reads_partial_seed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"blocks":[{{"name":"D Block","floors":2}}],
                "rooms":[{{"roomNumber":"D1","block":"D Block","floor":1,"type":"lab","capacity":20}}]}}"#
        )
        .unwrap();

        let seed = load_file(file.path()).unwrap();
        assert_eq!(seed.blocks[0].name, "D Block");
        assert_eq!(seed.rooms[0].kind, RoomKind::Lab);
        assert!(seed.students.is_empty());
    }

    #[test]
    fn load_file_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(load_file(file.path()), Err(SeedError::Parse(_))));
    }

    #[tokio::test]
    async fn cancelled_reservations_do_not_hold_their_slot() {
        let engine = Engine::default();
        let mut seed = demo().unwrap();
        seed.reservations[0].status = ReservationStatus::Cancelled;
        apply(&engine, seed).await.unwrap();

        let admin = Actor::system();
        let booked = engine
            .check_conflict(
                &admin,
                "A101",
                chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                "14:30".parse().unwrap(),
                "15:00".parse().unwrap(),
            )
            .await
            .unwrap();
        assert!(!booked);
    }
}
