use tracing::{debug, info, warn};

use crate::import::{self, StudentRow};
use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::policy::{self, Action, Actor};

use super::conflict::{find_entry_conflict, find_reservation_conflict, validate_span};
use super::store::{Kind, normalize_usn};
use super::{Engine, EngineError, Key};

// ── Field validation ─────────────────────────────────────────────

fn require_text(field: &str, value: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid(format!("{field} is required")));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("field too long"));
    }
    Ok(trimmed.to_string())
}

fn optional_text(value: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("field too long"));
    }
    Ok(trimmed.to_string())
}

fn require_positive(field: &str, value: u32) -> Result<u32, EngineError> {
    if value == 0 {
        return Err(EngineError::invalid(format!("{field} must be at least 1")));
    }
    Ok(value)
}

pub(super) fn normalize_student(new: NewStudent) -> Result<NewStudent, EngineError> {
    let usn = normalize_usn(&new.usn);
    if usn.is_empty() {
        return Err(EngineError::invalid("usn is required"));
    }
    if usn.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("field too long"));
    }
    Ok(NewStudent {
        usn,
        name: require_text("name", &new.name)?,
        email: optional_text(&new.email)?,
        phone: optional_text(&new.phone)?,
        department: require_text("department", &new.department)?,
        semester: require_positive("semester", new.semester)?,
        section: require_text("section", &new.section)?,
    })
}

fn normalize_block(new: NewBlock) -> Result<NewBlock, EngineError> {
    Ok(NewBlock {
        name: require_text("block name", &new.name)?,
        floors: require_positive("floors", new.floors)?,
        description: optional_text(&new.description)?,
    })
}

fn normalize_room(new: NewRoom) -> Result<NewRoom, EngineError> {
    let kind = match new.kind {
        RoomKind::Other(other) => RoomKind::from(require_text("room type", &other)?),
        known => known,
    };
    Ok(NewRoom {
        room_number: require_text("room number", &new.room_number)?,
        block: require_text("block", &new.block)?,
        kind,
        ..new
    })
}

fn normalize_entry(new: NewTimetableEntry) -> Result<NewTimetableEntry, EngineError> {
    if !new.day.is_teaching_day() {
        return Err(EngineError::invalid(format!("no classes are scheduled on {}", new.day)));
    }
    validate_span(new.start_time, new.end_time)?;
    Ok(NewTimetableEntry {
        subject: require_text("subject", &new.subject)?,
        teacher: require_text("teacher", &new.teacher)?,
        room: require_text("room", &new.room)?,
        department: require_text("department", &new.department)?,
        semester: require_positive("semester", new.semester)?,
        section: require_text("section", &new.section)?,
        ..new
    })
}

fn require_purpose(purpose: &str) -> Result<String, EngineError> {
    let trimmed = purpose.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid("purpose is required"));
    }
    if trimmed.len() > MAX_PURPOSE_LEN {
        return Err(EngineError::LimitExceeded("purpose too long"));
    }
    Ok(trimmed.to_string())
}

impl Engine {
    // ── Students ─────────────────────────────────────────────

    pub async fn add_student(&self, actor: &Actor, new: NewStudent) -> Result<Student, EngineError> {
        policy::authorize(actor, Action::ManageStudents)?;
        let fields = normalize_student(new)?;
        let _catalog = self.catalog.lock().await;
        self.insert_student(fields)
    }

    /// Caller holds the catalog lock and has normalized `fields`.
    fn insert_student(&self, fields: NewStudent) -> Result<Student, EngineError> {
        if self.store.student_count() >= MAX_STUDENTS {
            return Err(EngineError::LimitExceeded("too many students"));
        }
        if self.store.student_id_by_usn(&fields.usn).is_some() {
            return Err(EngineError::DuplicateKey(Key::Usn(fields.usn)));
        }
        let student = Student {
            id: self.store.allocate(Kind::Student),
            usn: fields.usn,
            name: fields.name,
            email: fields.email,
            phone: fields.phone,
            department: fields.department,
            semester: fields.semester,
            section: fields.section,
        };
        self.store.put_student(student.clone());
        self.publish(Event::StudentAdded { id: student.id });
        info!(id = student.id, usn = %student.usn, "student added");
        Ok(student)
    }

    pub async fn update_student(
        &self,
        actor: &Actor,
        id: Id,
        patch: StudentPatch,
    ) -> Result<Student, EngineError> {
        policy::authorize(actor, Action::ManageStudents)?;
        let _catalog = self.catalog.lock().await;
        let existing = self
            .store
            .student(id)
            .ok_or(EngineError::NotFound(Key::Student(id)))?;

        let merged = normalize_student(NewStudent {
            usn: patch.usn.unwrap_or(existing.usn.clone()),
            name: patch.name.unwrap_or(existing.name),
            email: patch.email.unwrap_or(existing.email),
            phone: patch.phone.unwrap_or(existing.phone),
            department: patch.department.unwrap_or(existing.department),
            semester: patch.semester.unwrap_or(existing.semester),
            section: patch.section.unwrap_or(existing.section),
        })?;
        if merged.usn != existing.usn
            && let Some(other) = self.store.student_id_by_usn(&merged.usn)
            && other != id
        {
            return Err(EngineError::DuplicateKey(Key::Usn(merged.usn)));
        }

        let student = Student {
            id,
            usn: merged.usn,
            name: merged.name,
            email: merged.email,
            phone: merged.phone,
            department: merged.department,
            semester: merged.semester,
            section: merged.section,
        };
        self.store.put_student(student.clone());
        self.publish(Event::StudentUpdated { id });
        info!(id, "student updated");
        Ok(student)
    }

    pub async fn delete_student(&self, actor: &Actor, id: Id) -> Result<Student, EngineError> {
        policy::authorize(actor, Action::ManageStudents)?;
        let _catalog = self.catalog.lock().await;
        let removed = self
            .store
            .remove_student(id)
            .ok_or(EngineError::NotFound(Key::Student(id)))?;
        self.publish(Event::StudentRemoved { id });
        info!(id, usn = %removed.usn, "student deleted");
        Ok(removed)
    }

    /// Insert already-parsed rows one at a time. A bad row is recorded and
    /// skipped; it never aborts the rows after it.
    pub async fn import_students(
        &self,
        actor: &Actor,
        rows: &[StudentRow],
    ) -> Result<ImportSummary, EngineError> {
        policy::authorize(actor, Action::ImportStudents)?;
        self.import_parsed(rows.iter().cloned().map(Ok).collect()).await
    }

    /// Parse CSV text (header row first) and import it.
    pub async fn import_students_csv<R: std::io::Read>(
        &self,
        actor: &Actor,
        reader: R,
    ) -> Result<ImportSummary, EngineError> {
        policy::authorize(actor, Action::ImportStudents)?;
        let rows = import::read_csv_rows(reader)?;
        self.import_parsed(rows).await
    }

    async fn import_parsed(
        &self,
        rows: Vec<Result<StudentRow, EngineError>>,
    ) -> Result<ImportSummary, EngineError> {
        if rows.len() > MAX_IMPORT_ROWS {
            return Err(EngineError::LimitExceeded("too many import rows"));
        }
        let _catalog = self.catalog.lock().await;
        let mut summary = ImportSummary::default();
        for (i, row) in rows.into_iter().enumerate() {
            let outcome = row
                .and_then(|r| import::parse_student_row(&r))
                .and_then(normalize_student)
                .and_then(|fields| self.insert_student(fields));
            match outcome {
                Ok(_) => summary.inserted += 1,
                Err(e) => {
                    debug!(row = i + 1, error = %e, "import row skipped");
                    summary.skipped.push(SkippedRow {
                        row: i + 1,
                        reason: e.to_string(),
                    });
                }
            }
        }
        metrics::counter!(observability::IMPORT_ROWS_TOTAL, "outcome" => "inserted")
            .increment(summary.inserted as u64);
        metrics::counter!(observability::IMPORT_ROWS_TOTAL, "outcome" => "skipped")
            .increment(summary.skipped.len() as u64);
        info!(
            inserted = summary.inserted,
            skipped = summary.skipped.len(),
            "student import finished"
        );
        Ok(summary)
    }

    // ── Blocks ───────────────────────────────────────────────

    pub async fn add_block(&self, actor: &Actor, new: NewBlock) -> Result<Block, EngineError> {
        policy::authorize(actor, Action::ManageRooms)?;
        let fields = normalize_block(new)?;
        let _catalog = self.catalog.lock().await;
        if self.store.blocks().len() >= MAX_BLOCKS {
            return Err(EngineError::LimitExceeded("too many blocks"));
        }
        if self.store.contains_block_name(&fields.name) {
            return Err(EngineError::DuplicateKey(Key::BlockName(fields.name)));
        }
        let block = Block {
            id: self.store.allocate(Kind::Block),
            name: fields.name,
            floors: fields.floors,
            description: fields.description,
        };
        self.store.put_block(block.clone());
        self.publish(Event::BlockAdded { id: block.id });
        info!(id = block.id, name = %block.name, "block added");
        Ok(block)
    }

    /// A block that still has rooms cannot be renamed: rooms refer to it by name.
    pub async fn update_block(
        &self,
        actor: &Actor,
        id: Id,
        patch: BlockPatch,
    ) -> Result<Block, EngineError> {
        policy::authorize(actor, Action::ManageRooms)?;
        let _catalog = self.catalog.lock().await;
        let existing = self
            .store
            .block(id)
            .ok_or(EngineError::NotFound(Key::Block(id)))?;
        let fields = normalize_block(NewBlock {
            name: patch.name.unwrap_or(existing.name.clone()),
            floors: patch.floors.unwrap_or(existing.floors),
            description: patch.description.unwrap_or(existing.description.clone()),
        })?;
        if fields.name != existing.name {
            if self.store.contains_block_name(&fields.name) {
                return Err(EngineError::DuplicateKey(Key::BlockName(fields.name)));
            }
            if self.store.block_has_rooms(&existing.name) {
                return Err(EngineError::HasDependents(Key::BlockName(existing.name)));
            }
        }
        let block = Block {
            id,
            name: fields.name,
            floors: fields.floors,
            description: fields.description,
        };
        self.store.put_block(block.clone());
        self.publish(Event::BlockUpdated { id });
        info!(id, "block updated");
        Ok(block)
    }

    pub async fn delete_block(&self, actor: &Actor, id: Id) -> Result<Block, EngineError> {
        policy::authorize(actor, Action::ManageRooms)?;
        let _catalog = self.catalog.lock().await;
        let block = self
            .store
            .block(id)
            .ok_or(EngineError::NotFound(Key::Block(id)))?;
        if self.store.block_has_rooms(&block.name) {
            return Err(EngineError::HasDependents(Key::Block(id)));
        }
        self.store.remove_block(id);
        self.publish(Event::BlockRemoved { id });
        info!(id, name = %block.name, "block deleted");
        Ok(block)
    }

    // ── Rooms ────────────────────────────────────────────────

    pub async fn add_room(&self, actor: &Actor, new: NewRoom) -> Result<Room, EngineError> {
        policy::authorize(actor, Action::ManageRooms)?;
        let fields = normalize_room(new)?;
        let _catalog = self.catalog.lock().await;
        if self.store.room_count() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if !self.store.contains_block_name(&fields.block) {
            return Err(EngineError::NotFound(Key::BlockName(fields.block)));
        }
        if self.store.room_id_by_number(&fields.room_number).is_some() {
            return Err(EngineError::DuplicateKey(Key::RoomNumber(fields.room_number)));
        }
        let room = Room {
            id: self.store.allocate(Kind::Room),
            room_number: fields.room_number,
            block: fields.block,
            floor: fields.floor,
            kind: fields.kind,
            capacity: fields.capacity,
            has_projector: fields.has_projector,
            has_ac: fields.has_ac,
        };
        self.store.insert_room(RoomState::new(room.clone()));
        self.publish(Event::RoomAdded { id: room.id });
        info!(id = room.id, number = %room.room_number, block = %room.block, "room added");
        Ok(room)
    }

    /// Renaming a room or moving it to another block rewrites the room and
    /// block fields of everything scheduled in it.
    pub async fn update_room(
        &self,
        actor: &Actor,
        id: Id,
        patch: RoomPatch,
    ) -> Result<Room, EngineError> {
        policy::authorize(actor, Action::ManageRooms)?;
        let _catalog = self.catalog.lock().await;
        let mut guard = self.lock_room_write(id).await?;
        let before = guard.room.clone();

        let fields = normalize_room(NewRoom {
            room_number: patch.room_number.unwrap_or(before.room_number.clone()),
            block: patch.block.unwrap_or(before.block.clone()),
            floor: patch.floor.unwrap_or(before.floor),
            kind: patch.kind.unwrap_or(before.kind.clone()),
            capacity: patch.capacity.unwrap_or(before.capacity),
            has_projector: patch.has_projector.unwrap_or(before.has_projector),
            has_ac: patch.has_ac.unwrap_or(before.has_ac),
        })?;
        if fields.room_number != before.room_number
            && self.store.room_id_by_number(&fields.room_number).is_some()
        {
            return Err(EngineError::DuplicateKey(Key::RoomNumber(fields.room_number)));
        }
        if fields.block != before.block && !self.store.contains_block_name(&fields.block) {
            return Err(EngineError::NotFound(Key::BlockName(fields.block)));
        }

        let after = Room {
            id,
            room_number: fields.room_number,
            block: fields.block,
            floor: fields.floor,
            kind: fields.kind,
            capacity: fields.capacity,
            has_projector: fields.has_projector,
            has_ac: fields.has_ac,
        };
        for entry in guard.timetable.iter_mut() {
            entry.room = after.room_number.clone();
            entry.block = after.block.clone();
        }
        for reservation in guard.reservations.iter_mut() {
            reservation.room_number = after.room_number.clone();
            reservation.block = after.block.clone();
        }
        guard.room = after.clone();
        self.store.reindex_room(&before, &after);
        self.publish(Event::RoomUpdated { id });
        info!(id, number = %after.room_number, "room updated");
        Ok(after)
    }

    /// Refuses while the room has timetable entries or any reservation
    /// history, so nothing is ever left pointing at a missing room.
    pub async fn delete_room(&self, actor: &Actor, id: Id) -> Result<Room, EngineError> {
        policy::authorize(actor, Action::ManageRooms)?;
        let _catalog = self.catalog.lock().await;
        let guard = self.lock_room_write(id).await?;
        if guard.has_dependents() {
            return Err(EngineError::HasDependents(Key::Room(id)));
        }
        let room = guard.room.clone();
        self.store.remove_room(&room);
        self.publish(Event::RoomRemoved { id });
        info!(id, number = %room.room_number, "room deleted");
        Ok(room)
    }

    // ── Timetable ────────────────────────────────────────────

    pub async fn add_timetable_entry(
        &self,
        actor: &Actor,
        new: NewTimetableEntry,
    ) -> Result<TimetableEntry, EngineError> {
        policy::authorize(actor, Action::ManageTimetable)?;
        let fields = normalize_entry(new)?;
        let span = validate_span(fields.start_time, fields.end_time)?;
        let room_id = self.resolve_room(&fields.room)?;
        let mut guard = self.lock_room_write(room_id).await?;
        if guard.timetable.len() >= MAX_ENTRIES_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many timetable entries on room"));
        }
        if let Some(with) = find_entry_conflict(&guard, fields.day, &span, None) {
            warn!(room = %guard.room.room_number, day = %fields.day, %with, "timetable entry rejected");
            return Err(EngineError::Conflict(with));
        }

        let entry = TimetableEntry {
            id: self.store.allocate(Kind::Entry),
            day: fields.day,
            start_time: fields.start_time,
            end_time: fields.end_time,
            subject: fields.subject,
            teacher: fields.teacher,
            room: guard.room.room_number.clone(),
            block: guard.room.block.clone(),
            department: fields.department,
            semester: fields.semester,
            section: fields.section,
        };
        guard.timetable.push(entry.clone());
        self.store.map_entry(entry.id, room_id);
        self.publish(Event::EntryAdded {
            id: entry.id,
            room_id,
        });
        info!(id = entry.id, room = %entry.room, day = %entry.day, "timetable entry added");
        Ok(entry)
    }

    pub async fn update_timetable_entry(
        &self,
        actor: &Actor,
        id: Id,
        patch: TimetablePatch,
    ) -> Result<TimetableEntry, EngineError> {
        policy::authorize(actor, Action::ManageTimetable)?;
        let (room_id, mut guard) = self.resolve_entry_write(id).await?;
        let existing = guard
            .entry(id)
            .cloned()
            .ok_or(EngineError::NotFound(Key::Entry(id)))?;

        let fields = normalize_entry(NewTimetableEntry {
            day: patch.day.unwrap_or(existing.day),
            start_time: patch.start_time.unwrap_or(existing.start_time),
            end_time: patch.end_time.unwrap_or(existing.end_time),
            subject: patch.subject.unwrap_or(existing.subject),
            teacher: patch.teacher.unwrap_or(existing.teacher),
            room: existing.room.clone(),
            department: patch.department.unwrap_or(existing.department),
            semester: patch.semester.unwrap_or(existing.semester),
            section: patch.section.unwrap_or(existing.section),
        })?;
        let span = validate_span(fields.start_time, fields.end_time)?;
        if let Some(with) = find_entry_conflict(&guard, fields.day, &span, Some(id)) {
            return Err(EngineError::Conflict(with));
        }

        let updated = TimetableEntry {
            id,
            day: fields.day,
            start_time: fields.start_time,
            end_time: fields.end_time,
            subject: fields.subject,
            teacher: fields.teacher,
            room: existing.room,
            block: existing.block,
            department: fields.department,
            semester: fields.semester,
            section: fields.section,
        };
        if let Some(slot) = guard.timetable.iter_mut().find(|e| e.id == id) {
            *slot = updated.clone();
        }
        self.publish(Event::EntryUpdated { id, room_id });
        info!(id, "timetable entry updated");
        Ok(updated)
    }

    pub async fn remove_timetable_entry(
        &self,
        actor: &Actor,
        id: Id,
    ) -> Result<TimetableEntry, EngineError> {
        policy::authorize(actor, Action::ManageTimetable)?;
        let (room_id, mut guard) = self.resolve_entry_write(id).await?;
        let removed = guard
            .remove_entry(id)
            .ok_or(EngineError::NotFound(Key::Entry(id)))?;
        self.store.unmap_entry(id);
        self.publish(Event::EntryRemoved { id, room_id });
        info!(id, room = %removed.room, "timetable entry removed");
        Ok(removed)
    }

    // ── Reservations ─────────────────────────────────────────

    /// Book a room for the calling teacher (or admin). The conflict check
    /// and the commit run under the room's write lock, so two overlapping
    /// requests for the same room can never both succeed.
    pub async fn create_reservation(
        &self,
        actor: &Actor,
        new: NewReservation,
    ) -> Result<Reservation, EngineError> {
        policy::authorize(actor, Action::CreateReservation)?;
        self.commit_reservation(actor, new, ReservationStatus::Confirmed)
            .await
    }

    /// Admin-only: record a reservation in any status on behalf of `teacher`,
    /// e.g. history loaded from elsewhere. Confirmed records are still
    /// conflict-checked.
    pub async fn restore_reservation(
        &self,
        actor: &Actor,
        teacher: &Actor,
        new: NewReservation,
        status: ReservationStatus,
    ) -> Result<Reservation, EngineError> {
        policy::authorize(actor, Action::ManageRooms)?;
        self.commit_reservation(teacher, new, status).await
    }

    async fn commit_reservation(
        &self,
        teacher: &Actor,
        new: NewReservation,
        status: ReservationStatus,
    ) -> Result<Reservation, EngineError> {
        let span = validate_span(new.start_time, new.end_time)?;
        let purpose = require_purpose(&new.purpose)?;
        let room_id = self.resolve_room(&new.room_number)?;
        let mut guard = self.lock_room_write(room_id).await?;
        // Cancelled history stays on the room but does not count toward the cap.
        let live = guard
            .reservations
            .iter()
            .filter(|r| r.status != ReservationStatus::Cancelled)
            .count();
        if live >= MAX_RESERVATIONS_PER_ROOM {
            return Err(EngineError::LimitExceeded("too many reservations on room"));
        }

        if status == ReservationStatus::Confirmed
            && let Some(with) = find_reservation_conflict(&guard, new.date, &span)
        {
            warn!(room = %guard.room.room_number, date = %new.date, %with, "reservation rejected");
            metrics::counter!(observability::RESERVATIONS_TOTAL, "outcome" => "conflict")
                .increment(1);
            return Err(EngineError::Conflict(with));
        }

        let reservation = Reservation {
            id: self.store.allocate(Kind::Reservation),
            room_number: guard.room.room_number.clone(),
            block: guard.room.block.clone(),
            teacher_name: teacher.name.clone(),
            teacher_id: teacher.id.clone(),
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            purpose,
            status,
        };
        guard.reservations.push(reservation.clone());
        self.store.map_reservation(reservation.id, room_id);
        if status == ReservationStatus::Confirmed {
            self.publish(Event::ReservationConfirmed {
                id: reservation.id,
                room_id,
                date: reservation.date,
                span,
            });
            metrics::counter!(observability::RESERVATIONS_TOTAL, "outcome" => "confirmed")
                .increment(1);
        }
        info!(
            id = reservation.id,
            room = %reservation.room_number,
            date = %reservation.date,
            start = %reservation.start_time,
            end = %reservation.end_time,
            teacher = %reservation.teacher_id,
            status = %reservation.status,
            "reservation recorded"
        );
        Ok(reservation)
    }

    /// Move a reservation to `cancelled`. Teachers may only cancel their own.
    /// Cancelling twice is an error rather than a silent no-op.
    pub async fn cancel_reservation(&self, actor: &Actor, id: Id) -> Result<Reservation, EngineError> {
        policy::authorize(actor, Action::CancelReservation)?;
        let (room_id, mut guard) = self.resolve_reservation_write(id).await?;
        let reservation = guard
            .reservation_mut(id)
            .ok_or(EngineError::NotFound(Key::Reservation(id)))?;
        if !actor.owns(reservation) {
            return policy::deny(actor, Action::CancelReservation);
        }
        if reservation.status == ReservationStatus::Cancelled {
            return Err(EngineError::AlreadyCancelled(id));
        }
        reservation.status = ReservationStatus::Cancelled;
        let cancelled = reservation.clone();

        self.publish(Event::ReservationCancelled { id, room_id });
        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        info!(id, room = %cancelled.room_number, by = %actor.id, "reservation cancelled");
        Ok(cancelled)
    }
}
