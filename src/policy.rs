use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::EngineError;
use crate::model::Reservation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Guest,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Guest => "guest",
        })
    }
}

/// Whoever is calling into the engine. Identity comes from an outside
/// account system; the engine trusts it as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
        }
    }

    pub fn admin(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::Admin)
    }

    pub fn teacher(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Role::Teacher)
    }

    pub fn guest() -> Self {
        Self::new("guest", "Guest User", Role::Guest)
    }

    /// Internal admin identity used for loading seed data.
    pub fn system() -> Self {
        Self::admin("system", "System")
    }

    /// Admins may touch any reservation; teachers only their own.
    pub fn owns(&self, reservation: &Reservation) -> bool {
        self.role == Role::Admin || reservation.teacher_id == self.id
    }
}

/// Every operation the policy gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    ReadStudents,
    ManageStudents,
    ImportStudents,
    ReadTimetable,
    ManageTimetable,
    ReadVacancy,
    ReadRooms,
    ManageRooms,
    CheckAvailability,
    CreateReservation,
    CancelReservation,
    ReadReservations,
}

impl Action {
    pub fn label(self) -> &'static str {
        match self {
            Action::ReadStudents => "read_students",
            Action::ManageStudents => "manage_students",
            Action::ImportStudents => "import_students",
            Action::ReadTimetable => "read_timetable",
            Action::ManageTimetable => "manage_timetable",
            Action::ReadVacancy => "read_vacancy",
            Action::ReadRooms => "read_rooms",
            Action::ManageRooms => "manage_rooms",
            Action::CheckAvailability => "check_availability",
            Action::CreateReservation => "create_reservation",
            Action::CancelReservation => "cancel_reservation",
            Action::ReadReservations => "read_reservations",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn permits(role: Role, action: Action) -> bool {
    match role {
        Role::Admin => true,
        Role::Teacher => matches!(
            action,
            Action::ReadStudents
                | Action::ReadTimetable
                | Action::ReadVacancy
                | Action::ReadRooms
                | Action::CheckAvailability
                | Action::CreateReservation
                | Action::CancelReservation
                | Action::ReadReservations
        ),
        Role::Guest => matches!(
            action,
            Action::ReadStudents | Action::ReadTimetable | Action::ReadVacancy
        ),
    }
}

/// Gate an operation. Must run before the operation touches any state.
pub fn authorize(actor: &Actor, action: Action) -> Result<(), EngineError> {
    if permits(actor.role, action) {
        return Ok(());
    }
    deny(actor, action)
}

pub(crate) fn deny<T>(actor: &Actor, action: Action) -> Result<T, EngineError> {
    tracing::warn!(actor = %actor.id, role = %actor.role, %action, "permission denied");
    metrics::counter!(
        crate::observability::PERMISSION_DENIED_TOTAL,
        "action" => action.label()
    )
    .increment(1);
    Err(EngineError::PermissionDenied {
        role: actor.role,
        action,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [Action; 12] = [
        Action::ReadStudents,
        Action::ManageStudents,
        Action::ImportStudents,
        Action::ReadTimetable,
        Action::ManageTimetable,
        Action::ReadVacancy,
        Action::ReadRooms,
        Action::ManageRooms,
        Action::CheckAvailability,
        Action::CreateReservation,
        Action::CancelReservation,
        Action::ReadReservations,
    ];

    #[test]
    fn admin_may_do_everything() {
        let admin = Actor::admin("admin001", "Dr. Admin");
        for action in ALL_ACTIONS {
            assert!(authorize(&admin, action).is_ok(), "{action}");
        }
    }

    #[test]
    fn teacher_cannot_manage() {
        let teacher = Actor::teacher("T001", "Dr. Smith");
        for action in [
            Action::ManageStudents,
            Action::ImportStudents,
            Action::ManageTimetable,
            Action::ManageRooms,
        ] {
            assert!(matches!(
                authorize(&teacher, action),
                Err(EngineError::PermissionDenied { role: Role::Teacher, .. })
            ));
        }
        assert!(authorize(&teacher, Action::CreateReservation).is_ok());
        assert!(authorize(&teacher, Action::ReadRooms).is_ok());
    }

    #[test]
    fn guest_is_read_only() {
        let guest = Actor::guest();
        let allowed: Vec<Action> = ALL_ACTIONS
            .into_iter()
            .filter(|a| permits(Role::Guest, *a))
            .collect();
        assert_eq!(
            allowed,
            vec![Action::ReadStudents, Action::ReadTimetable, Action::ReadVacancy]
        );
        assert!(authorize(&guest, Action::CreateReservation).is_err());
        assert!(authorize(&guest, Action::ReadRooms).is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"teacher\"");
        let actor: Actor =
            serde_json::from_str(r#"{"id":"T002","name":"Prof. Johnson","role":"teacher"}"#)
                .unwrap();
        assert_eq!(actor, Actor::teacher("T002", "Prof. Johnson"));
    }
}
