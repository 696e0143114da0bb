use crate::model::*;
use crate::time::{Day, Minutes};

// ── Occupancy derivation ──────────────────────────────────────────
//
// All of these work on any sequence of timetable entries, so the same
// logic serves a single room's schedule and a student's cross-room one.

/// First entry on `day` whose half-open window contains `at`.
///
/// Under the no-overlap invariant at most one entry can match. If the
/// invariant was broken by loaded data, the earliest one in iteration
/// order wins.
pub fn current_occupant<'a, I>(entries: I, day: Day, at: Minutes) -> Option<&'a TimetableEntry>
where
    I: IntoIterator<Item = &'a TimetableEntry>,
{
    entries
        .into_iter()
        .find(|e| e.day == day && e.span().contains(at))
}

/// Entry on `day` with the smallest start strictly after `at`.
/// Ties go to the earliest one in iteration order.
pub fn next_entry<'a, I>(entries: I, day: Day, at: Minutes) -> Option<&'a TimetableEntry>
where
    I: IntoIterator<Item = &'a TimetableEntry>,
{
    entries
        .into_iter()
        .filter(|e| e.day == day && e.start_time.minutes() > at)
        .min_by_key(|e| e.start_time)
}

pub fn room_status(rs: &RoomState, day: Day, at: Minutes) -> RoomStatus {
    RoomStatus {
        room: rs.room.clone(),
        current: current_occupant(&rs.timetable, day, at).cloned(),
        next: next_entry(&rs.timetable, day, at).cloned(),
    }
}

/// Partition rooms into vacant/occupied. `vacant + occupied == total`.
pub fn tally<I>(occupied_flags: I) -> VacancyCounts
where
    I: IntoIterator<Item = bool>,
{
    let mut counts = VacancyCounts {
        vacant: 0,
        occupied: 0,
        total: 0,
    };
    for occupied in occupied_flags {
        if occupied {
            counts.occupied += 1;
        } else {
            counts.vacant += 1;
        }
        counts.total += 1;
    }
    counts
}
