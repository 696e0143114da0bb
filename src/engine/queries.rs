use chrono::NaiveDate;

use crate::model::*;
use crate::policy::{self, Action, Actor, Role};
use crate::time::{Day, TimeOfDay};

use super::availability::{current_occupant, next_entry, room_status, tally};
use super::conflict::{find_entry_conflict, find_reservation_conflict, validate_span};
use super::{Engine, EngineError, Key};

impl Engine {
    // ── Room iteration ───────────────────────────────────────

    fn scoped_room_ids(&self, block: Option<&str>) -> Vec<Id> {
        match block {
            Some(name) => self.store.rooms_in_block(name),
            None => self.store.room_ids(),
        }
    }

    /// Visit each room under its read lock, in id order. Rooms deleted
    /// between listing and locking are skipped.
    async fn collect_rooms<T>(
        &self,
        ids: Vec<Id>,
        mut visit: impl FnMut(&RoomState) -> Option<T>,
    ) -> Vec<T> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(rs) = self.store.room(id) else { continue };
            let guard = rs.read().await;
            if let Some(item) = visit(&*guard) {
                out.push(item);
            }
        }
        out
    }

    async fn read_room<T>(
        &self,
        number: &str,
        read: impl FnOnce(&RoomState) -> T,
    ) -> Result<T, EngineError> {
        let id = self.resolve_room(number)?;
        let rs = self
            .store
            .room(id)
            .ok_or(EngineError::NotFound(Key::Room(id)))?;
        let guard = rs.read().await;
        Ok(read(&*guard))
    }

    // ── Students ─────────────────────────────────────────────

    pub fn list_students(&self, actor: &Actor) -> Result<Vec<Student>, EngineError> {
        policy::authorize(actor, Action::ReadStudents)?;
        Ok(self.store.students())
    }

    pub fn get_student(&self, actor: &Actor, id: Id) -> Result<Student, EngineError> {
        policy::authorize(actor, Action::ReadStudents)?;
        self.store
            .student(id)
            .ok_or(EngineError::NotFound(Key::Student(id)))
    }

    /// Lookup by USN, ignoring case and surrounding whitespace.
    pub fn find_student_by_usn(&self, actor: &Actor, usn: &str) -> Result<Student, EngineError> {
        policy::authorize(actor, Action::ReadStudents)?;
        self.store
            .student_id_by_usn(usn)
            .and_then(|id| self.store.student(id))
            .ok_or_else(|| EngineError::NotFound(Key::Usn(usn.trim().to_string())))
    }

    /// Case-insensitive substring match on USN, name or department.
    /// An empty term matches everyone.
    pub fn search_students(&self, actor: &Actor, term: &str) -> Result<Vec<Student>, EngineError> {
        policy::authorize(actor, Action::ReadStudents)?;
        let needle = term.trim().to_lowercase();
        Ok(self
            .store
            .students()
            .into_iter()
            .filter(|s| {
                needle.is_empty()
                    || s.usn.to_lowercase().contains(&needle)
                    || s.name.to_lowercase().contains(&needle)
                    || s.department.to_lowercase().contains(&needle)
            })
            .collect())
    }

    // ── Blocks and rooms ─────────────────────────────────────

    pub fn list_blocks(&self, actor: &Actor) -> Result<Vec<Block>, EngineError> {
        policy::authorize(actor, Action::ReadRooms)?;
        Ok(self.store.blocks())
    }

    pub async fn list_rooms(&self, actor: &Actor, block: Option<&str>) -> Result<Vec<Room>, EngineError> {
        policy::authorize(actor, Action::ReadRooms)?;
        let ids = self.scoped_room_ids(block);
        Ok(self.collect_rooms(ids, |rs| Some(rs.room.clone())).await)
    }

    pub async fn get_room(&self, actor: &Actor, number: &str) -> Result<Room, EngineError> {
        policy::authorize(actor, Action::ReadRooms)?;
        self.read_room(number, |rs| rs.room.clone()).await
    }

    // ── Timetable ────────────────────────────────────────────

    /// Every entry for one class section, ordered by day then start time.
    pub async fn timetable_for(
        &self,
        actor: &Actor,
        department: &str,
        semester: u32,
        section: &str,
    ) -> Result<Vec<TimetableEntry>, EngineError> {
        policy::authorize(actor, Action::ReadTimetable)?;
        let ids = self.store.room_ids();
        let mut entries: Vec<TimetableEntry> = self
            .collect_rooms(ids, |rs| {
                Some(
                    rs.timetable
                        .iter()
                        .filter(|e| {
                            e.department == department && e.semester == semester && e.section == section
                        })
                        .cloned()
                        .collect::<Vec<_>>(),
                )
            })
            .await
            .into_iter()
            .flatten()
            .collect();
        entries.sort_by_key(|e| (e.day, e.start_time, e.id));
        Ok(entries)
    }

    pub async fn room_timetable(&self, actor: &Actor, number: &str) -> Result<Vec<TimetableEntry>, EngineError> {
        policy::authorize(actor, Action::ReadTimetable)?;
        let mut entries = self.read_room(number, |rs| rs.timetable.clone()).await?;
        entries.sort_by_key(|e| (e.day, e.start_time, e.id));
        Ok(entries)
    }

    // ── Occupancy ────────────────────────────────────────────

    pub async fn current_occupant(
        &self,
        actor: &Actor,
        number: &str,
        day: Day,
        at: TimeOfDay,
    ) -> Result<Option<TimetableEntry>, EngineError> {
        policy::authorize(actor, Action::ReadVacancy)?;
        self.read_room(number, |rs| {
            current_occupant(&rs.timetable, day, at.minutes()).cloned()
        })
        .await
    }

    pub async fn next_entry(
        &self,
        actor: &Actor,
        number: &str,
        day: Day,
        at: TimeOfDay,
    ) -> Result<Option<TimetableEntry>, EngineError> {
        policy::authorize(actor, Action::ReadVacancy)?;
        self.read_room(number, |rs| next_entry(&rs.timetable, day, at.minutes()).cloned())
            .await
    }

    /// Timetable occupancy only. Reservations do not make a room occupied.
    pub async fn is_room_occupied(
        &self,
        actor: &Actor,
        number: &str,
        day: Day,
        at: TimeOfDay,
    ) -> Result<bool, EngineError> {
        Ok(self.current_occupant(actor, number, day, at).await?.is_some())
    }

    pub async fn vacancy_counts(&self, actor: &Actor, day: Day, at: TimeOfDay) -> Result<VacancyCounts, EngineError> {
        policy::authorize(actor, Action::ReadVacancy)?;
        let ids = self.store.room_ids();
        let flags = self
            .collect_rooms(ids, |rs| {
                Some(current_occupant(&rs.timetable, day, at.minutes()).is_some())
            })
            .await;
        Ok(tally(flags))
    }

    pub async fn room_statuses(
        &self,
        actor: &Actor,
        day: Day,
        at: TimeOfDay,
        block: Option<&str>,
    ) -> Result<Vec<RoomStatus>, EngineError> {
        policy::authorize(actor, Action::ReadVacancy)?;
        let ids = self.scoped_room_ids(block);
        Ok(self
            .collect_rooms(ids, |rs| Some(room_status(rs, day, at.minutes())))
            .await)
    }

    /// Where a student is (or will next be) on `day` at `at`, from their
    /// section's timetable across all rooms.
    pub async fn locate_student(
        &self,
        actor: &Actor,
        usn: &str,
        day: Day,
        at: TimeOfDay,
    ) -> Result<StudentLocation, EngineError> {
        policy::authorize(actor, Action::ReadTimetable)?;
        let student = self.find_student_by_usn(actor, usn)?;
        let ids = self.store.room_ids();
        let mut schedule: Vec<TimetableEntry> = self
            .collect_rooms(ids, |rs| {
                Some(
                    rs.timetable
                        .iter()
                        .filter(|e| student.attends(e))
                        .cloned()
                        .collect::<Vec<_>>(),
                )
            })
            .await
            .into_iter()
            .flatten()
            .collect();
        // Ids are handed out in insertion order across all rooms.
        schedule.sort_by_key(|e| e.id);

        Ok(StudentLocation {
            current: current_occupant(&schedule, day, at.minutes()).cloned(),
            next: next_entry(&schedule, day, at.minutes()).cloned(),
            student,
        })
    }

    // ── Availability ─────────────────────────────────────────

    /// True when a booking of `start..end` on `date` would be rejected.
    pub async fn check_conflict(
        &self,
        actor: &Actor,
        number: &str,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<bool, EngineError> {
        policy::authorize(actor, Action::CheckAvailability)?;
        let span = validate_span(start, end)?;
        self.read_room(number, |rs| find_reservation_conflict(rs, date, &span).is_some())
            .await
    }

    /// True when a weekly class at `start..end` on `day` would be rejected.
    pub async fn check_weekly_conflict(
        &self,
        actor: &Actor,
        number: &str,
        day: Day,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<bool, EngineError> {
        policy::authorize(actor, Action::CheckAvailability)?;
        let span = validate_span(start, end)?;
        self.read_room(number, |rs| find_entry_conflict(rs, day, &span, None).is_some())
            .await
    }

    /// Rooms (optionally within one block) free for the whole of `start..end`
    /// on `date`: no class that weekday and no confirmed reservation overlaps.
    pub async fn available_rooms(
        &self,
        actor: &Actor,
        block: Option<&str>,
        date: NaiveDate,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<Vec<Room>, EngineError> {
        policy::authorize(actor, Action::CheckAvailability)?;
        let span = validate_span(start, end)?;
        let ids = self.scoped_room_ids(block);
        Ok(self
            .collect_rooms(ids, |rs| {
                find_reservation_conflict(rs, date, &span)
                    .is_none()
                    .then(|| rs.room.clone())
            })
            .await)
    }

    // ── Reservations ─────────────────────────────────────────

    /// Teachers only see their own reservations.
    pub async fn get_reservation(&self, actor: &Actor, id: Id) -> Result<Reservation, EngineError> {
        policy::authorize(actor, Action::ReadReservations)?;
        let room_id = self
            .store
            .room_for_reservation(id)
            .ok_or(EngineError::NotFound(Key::Reservation(id)))?;
        let rs = self
            .store
            .room(room_id)
            .ok_or(EngineError::NotFound(Key::Reservation(id)))?;
        let guard = rs.read().await;
        let reservation = guard
            .reservations
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(Key::Reservation(id)))?;
        if !actor.owns(&reservation) {
            return policy::deny(actor, Action::ReadReservations);
        }
        Ok(reservation)
    }

    /// All reservations for admins, the caller's own for teachers.
    /// Ordered by date, then start time.
    pub async fn list_reservations(&self, actor: &Actor) -> Result<Vec<Reservation>, EngineError> {
        policy::authorize(actor, Action::ReadReservations)?;
        let ids = self.store.room_ids();
        let mut all: Vec<Reservation> = self
            .collect_rooms(ids, |rs| {
                Some(
                    rs.reservations
                        .iter()
                        .filter(|r| actor.role == Role::Admin || r.teacher_id == actor.id)
                        .cloned()
                        .collect::<Vec<_>>(),
                )
            })
            .await
            .into_iter()
            .flatten()
            .collect();
        all.sort_by_key(|r| (r.date, r.start_time, r.id));
        Ok(all)
    }
}
