use chrono::NaiveDate;

use crate::model::*;
use crate::time::{Day, Span, TimeOfDay};

use super::{Conflicting, EngineError};

pub fn validate_span(start: TimeOfDay, end: TimeOfDay) -> Result<Span, EngineError> {
    Span::between(start, end)
        .ok_or_else(|| EngineError::invalid(format!("start {start} must be before end {end}")))
}

/// First thing in the room that a booking of `span` on `date` would collide
/// with: a weekly class on that weekday, or a confirmed reservation that day.
pub fn find_reservation_conflict(rs: &RoomState, date: NaiveDate, span: &Span) -> Option<Conflicting> {
    let day = Day::of(date);
    if let Some(entry) = rs.entries_on(day).find(|e| e.span().overlaps(span)) {
        return Some(Conflicting::Entry {
            id: entry.id,
            subject: entry.subject.clone(),
            span: entry.span(),
        });
    }
    rs.blocking_reservations_on(date)
        .find(|r| r.span().overlaps(span))
        .map(|r| Conflicting::Reservation {
            id: r.id,
            date: r.date,
            span: r.span(),
        })
}

/// What a weekly class at `span` on `day` would collide with: another class
/// in the room that day, or any confirmed reservation falling on that
/// weekday. `ignore` skips the entry being edited.
pub fn find_entry_conflict(rs: &RoomState, day: Day, span: &Span, ignore: Option<Id>) -> Option<Conflicting> {
    if let Some(entry) = rs
        .entries_on(day)
        .filter(|e| Some(e.id) != ignore)
        .find(|e| e.span().overlaps(span))
    {
        return Some(Conflicting::Entry {
            id: entry.id,
            subject: entry.subject.clone(),
            span: entry.span(),
        });
    }
    rs.reservations
        .iter()
        .filter(|r| r.is_blocking() && Day::of(r.date) == day)
        .find(|r| r.span().overlaps(span))
        .map(|r| Conflicting::Reservation {
            id: r.id,
            date: r.date,
            span: r.span(),
        })
}
