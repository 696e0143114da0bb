/// Longest accepted name-like field (student name, subject, block name, …).
pub const MAX_NAME_LEN: usize = 256;

/// Longest accepted reservation purpose.
pub const MAX_PURPOSE_LEN: usize = 1024;

pub const MAX_STUDENTS: usize = 100_000;

pub const MAX_BLOCKS: usize = 1_000;

pub const MAX_ROOMS: usize = 10_000;

pub const MAX_ENTRIES_PER_ROOM: usize = 1_000;

/// Confirmed and pending reservations held by one room.
pub const MAX_RESERVATIONS_PER_ROOM: usize = 50_000;

/// Rows accepted in a single bulk import.
pub const MAX_IMPORT_ROWS: usize = 10_000;
