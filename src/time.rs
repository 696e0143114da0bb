use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDate, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Minutes since local midnight. Every time-of-day value is one of these.
pub type Minutes = u32;

pub const MINUTES_PER_DAY: Minutes = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParseError {
    input: String,
    reason: &'static str,
}

impl TimeParseError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time {:?}: {}", self.input, self.reason)
    }
}

impl std::error::Error for TimeParseError {}

/// Parse a 24-hour `"HH:MM"` string into minutes since midnight.
///
/// The hour may be written with one or two digits (`"9:05"` is accepted, as
/// browsers emit it that way); the minute must always have two.
pub fn time_to_minutes(input: &str) -> Result<Minutes, TimeParseError> {
    let (hours, minutes) = input
        .trim()
        .split_once(':')
        .ok_or_else(|| TimeParseError::new(input, "expected HH:MM"))?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return Err(TimeParseError::new(input, "expected HH:MM"));
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(TimeParseError::new(input, "non-digit characters"));
    }
    // Both parts are 1-2 ASCII digits, so these parses cannot fail.
    let h: Minutes = hours.parse().map_err(|_| TimeParseError::new(input, "bad hour"))?;
    let m: Minutes = minutes.parse().map_err(|_| TimeParseError::new(input, "bad minute"))?;
    if h > 23 {
        return Err(TimeParseError::new(input, "hour out of range"));
    }
    if m > 59 {
        return Err(TimeParseError::new(input, "minute out of range"));
    }
    Ok(h * 60 + m)
}

/// Inverse of [`time_to_minutes`]. Values past the end of the day wrap.
pub fn format_minutes(minutes: Minutes) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// `start <= instant < end`. An instant exactly at `end` is outside.
pub fn is_within(instant: Minutes, start: Minutes, end: Minutes) -> bool {
    start <= instant && instant < end
}

/// Strict overlap: back-to-back intervals (`end1 == start2`) do not overlap.
pub fn intervals_overlap(start1: Minutes, end1: Minutes, start2: Minutes, end2: Minutes) -> bool {
    start1 < end2 && end1 > start2
}

/// A wall-clock time of day, carried as minutes and written as `"HH:MM"`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(Minutes);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);

    pub fn from_minutes(minutes: Minutes) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self(hour * 60 + minute))
    }

    pub fn minutes(self) -> Minutes {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        time_to_minutes(s).map(Self)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_minutes(self.0))
    }
}

impl fmt::Debug for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeOfDay({self})")
    }
}

/// 12-hour display form, e.g. `13:05` → `1:05 PM`, `00:30` → `12:30 AM`.
pub fn format_12h(time: TimeOfDay) -> String {
    let hour = time.minutes() / 60;
    let minute = time.minutes() % 60;
    let suffix = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display_hour}:{minute:02} {suffix}")
}

/// Half-open interval `[start, end)` in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Minutes,
    pub end: Minutes,
}

impl Span {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn between(start: TimeOfDay, end: TimeOfDay) -> Option<Self> {
        (start < end).then(|| Self::new(start.minutes(), end.minutes()))
    }

    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        intervals_overlap(self.start, self.end, other.start, other.end)
    }

    pub fn contains(&self, instant: Minutes) -> bool {
        is_within(instant, self.start, self.end)
    }
}

/// Day of the week, named in full (`"Monday"` … `"Sunday"`) on the wire.
///
/// Calendar dates map onto days through `chrono`'s proleptic Gregorian
/// weekday with no time-zone adjustment: a `NaiveDate` is already local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
        Day::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    /// Timetable entries are only scheduled Monday through Saturday.
    pub fn is_teaching_day(self) -> bool {
        self != Day::Sunday
    }

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }
}

impl From<Weekday> for Day {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => Day::Monday,
            Weekday::Tue => Day::Tuesday,
            Weekday::Wed => Day::Wednesday,
            Weekday::Thu => Day::Thursday,
            Weekday::Fri => Day::Friday,
            Weekday::Sat => Day::Saturday,
            Weekday::Sun => Day::Sunday,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDayError(String);

impl fmt::Display for ParseDayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown day: {:?}", self.0)
    }
}

impl std::error::Error for ParseDayError {}

impl FromStr for Day {
    type Err = ParseDayError;

    /// Accepts full names and three-letter abbreviations, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Day::ALL
            .into_iter()
            .find(|d| {
                let name = d.name().to_ascii_lowercase();
                lower == name || lower == name[..3]
            })
            .ok_or_else(|| ParseDayError(s.to_string()))
    }
}

/// Current local date, weekday and minute.
pub fn now_slot() -> (NaiveDate, Day, TimeOfDay) {
    let now = Local::now();
    let date = now.date_naive();
    let at = TimeOfDay(now.hour() * 60 + now.minute());
    (date, Day::of(date), at)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hh_mm() {
        assert_eq!(time_to_minutes("09:00"), Ok(540));
        assert_eq!(time_to_minutes("00:00"), Ok(0));
        assert_eq!(time_to_minutes("23:59"), Ok(1439));
        assert_eq!(time_to_minutes("9:05"), Ok(545));
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["", "0900", "24:00", "12:60", "ab:cd", "1:2", "123:00", "12:000", "-1:00"] {
            assert!(time_to_minutes(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn format_inverts_parse() {
        for m in 0..MINUTES_PER_DAY {
            assert_eq!(time_to_minutes(&format_minutes(m)), Ok(m));
        }
    }

    #[test]
    fn is_within_is_half_open() {
        assert!(is_within(540, 540, 600));
        assert!(is_within(599, 540, 600));
        assert!(!is_within(600, 540, 600));
        assert!(!is_within(539, 540, 600));
    }

    #[test]
    fn overlap_is_symmetric_and_strict() {
        let cases = [
            (540, 600, 600, 660),
            (540, 600, 570, 630),
            (540, 660, 570, 600),
            (540, 600, 480, 540),
            (0, 1, 0, 1),
        ];
        for (a, b, c, d) in cases {
            assert_eq!(intervals_overlap(a, b, c, d), intervals_overlap(c, d, a, b));
        }
        assert!(!intervals_overlap(540, 600, 600, 660));
        assert!(intervals_overlap(540, 600, 599, 660));
        assert!(intervals_overlap(540, 660, 570, 600));
    }

    #[test]
    fn time_of_day_serde_uses_string_form() {
        let t: TimeOfDay = serde_json::from_str("\"14:30\"").unwrap();
        assert_eq!(t.minutes(), 870);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"14:30\"");
        assert!(serde_json::from_str::<TimeOfDay>("\"25:00\"").is_err());
    }

    #[test]
    fn twelve_hour_format() {
        assert_eq!(format_12h(TimeOfDay::hm(0, 30).unwrap()), "12:30 AM");
        assert_eq!(format_12h(TimeOfDay::hm(9, 0).unwrap()), "9:00 AM");
        assert_eq!(format_12h(TimeOfDay::hm(12, 0).unwrap()), "12:00 PM");
        assert_eq!(format_12h(TimeOfDay::hm(13, 5).unwrap()), "1:05 PM");
    }

    #[test]
    fn span_between_requires_order() {
        let nine = TimeOfDay::hm(9, 0).unwrap();
        let ten = TimeOfDay::hm(10, 0).unwrap();
        assert_eq!(Span::between(nine, ten), Some(Span::new(540, 600)));
        assert_eq!(Span::between(ten, nine), None);
        assert_eq!(Span::between(nine, nine), None);
    }

    #[test]
    fn day_of_date() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(Day::of(monday), Day::Monday);
        assert_eq!(Day::of(monday.succ_opt().unwrap()), Day::Tuesday);
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 14).unwrap();
        assert_eq!(Day::of(sunday), Day::Sunday);
        assert!(!Day::Sunday.is_teaching_day());
    }

    #[test]
    fn day_parses_names_and_abbreviations() {
        assert_eq!("Monday".parse::<Day>(), Ok(Day::Monday));
        assert_eq!("sat".parse::<Day>(), Ok(Day::Saturday));
        assert_eq!(" THURSDAY ".parse::<Day>(), Ok(Day::Thursday));
        assert!("Funday".parse::<Day>().is_err());
        assert_eq!(serde_json::to_string(&Day::Friday).unwrap(), "\"Friday\"");
    }
}
