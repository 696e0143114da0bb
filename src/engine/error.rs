use std::fmt;

use chrono::NaiveDate;

use crate::model::Id;
use crate::policy::{Action, Role};
use crate::time::{ParseDayError, Span, TimeParseError};

/// Names the entity an error is about, by id or by natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Student(Id),
    Usn(String),
    Block(Id),
    BlockName(String),
    Room(Id),
    RoomNumber(String),
    Entry(Id),
    Reservation(Id),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Student(id) => write!(f, "student {id}"),
            Key::Usn(usn) => write!(f, "student with USN {usn}"),
            Key::Block(id) => write!(f, "block {id}"),
            Key::BlockName(name) => write!(f, "block {name:?}"),
            Key::Room(id) => write!(f, "room {id}"),
            Key::RoomNumber(number) => write!(f, "room {number}"),
            Key::Entry(id) => write!(f, "timetable entry {id}"),
            Key::Reservation(id) => write!(f, "reservation {id}"),
        }
    }
}

/// What a rejected booking collided with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflicting {
    Entry { id: Id, subject: String, span: Span },
    Reservation { id: Id, date: NaiveDate, span: Span },
}

impl fmt::Display for Conflicting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflicting::Entry { id, subject, span } => write!(
                f,
                "timetable entry {id} ({subject}) [{}, {})",
                crate::time::format_minutes(span.start),
                crate::time::format_minutes(span.end)
            ),
            Conflicting::Reservation { id, date, span } => write!(
                f,
                "reservation {id} on {date} [{}, {})",
                crate::time::format_minutes(span.start),
                crate::time::format_minutes(span.end)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Validation(String),
    DuplicateKey(Key),
    NotFound(Key),
    Conflict(Conflicting),
    PermissionDenied { role: Role, action: Action },
    HasDependents(Key),
    AlreadyCancelled(Id),
    LimitExceeded(&'static str),
}

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::DuplicateKey(key) => write!(f, "already exists: {key}"),
            EngineError::NotFound(key) => write!(f, "not found: {key}"),
            EngineError::Conflict(with) => write!(f, "conflict with {with}"),
            EngineError::PermissionDenied { role, action } => {
                write!(f, "permission denied: {role} may not {action}")
            }
            EngineError::HasDependents(key) => {
                write!(f, "cannot delete {key}: still referenced")
            }
            EngineError::AlreadyCancelled(id) => {
                write!(f, "reservation {id} is already cancelled")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<TimeParseError> for EngineError {
    fn from(e: TimeParseError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

impl From<ParseDayError> for EngineError {
    fn from(e: ParseDayError) -> Self {
        EngineError::Validation(e.to_string())
    }
}
