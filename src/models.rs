//! Row types for every table in [`crate::schema`], plus the enums stored as text columns.

use crate::schema::{attendance, colleges, events, feedback, registrations, students};
use chrono::NaiveDateTime;
use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Failure to read an enum back from its text column.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Implements the text column mapping for an enum with `as_str` and [`FromStr`].
macro_rules! text_column_enum {
    ($ty:ty) => {
        impl ToSql<Text, Sqlite> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
                out.set_value(self.as_str());
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Sqlite> for $ty {
            fn from_sql(value: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
                let text = <String as FromSql<Text, Sqlite>>::from_sql(value)?;
                Ok(text.parse::<$ty>()?)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// The kinds of events a college can host.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsExpression,
    FromSqlRow,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[diesel(sql_type = Text)]
pub enum EventType {
    Workshop,
    Hackathon,
    Seminar,
    Fest,
    Conference,
    Competition,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Workshop,
        EventType::Hackathon,
        EventType::Seminar,
        EventType::Fest,
        EventType::Conference,
        EventType::Competition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Workshop => "Workshop",
            EventType::Hackathon => "Hackathon",
            EventType::Seminar => "Seminar",
            EventType::Fest => "Fest",
            EventType::Conference => "Conference",
            EventType::Competition => "Competition",
        }
    }
}

impl FromStr for EventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "event type",
                value: s.to_string(),
            })
    }
}

text_column_enum!(EventType);

/// Lifecycle of an event. Cancelling is a soft delete.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsExpression,
    FromSqlRow,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Scheduled,
    Cancelled,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
        }
    }
}

impl FromStr for EventStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(EventStatus::Scheduled),
            "cancelled" => Ok(EventStatus::Cancelled),
            "completed" => Ok(EventStatus::Completed),
            other => Err(ParseEnumError {
                kind: "event status",
                value: other.to_string(),
            }),
        }
    }
}

text_column_enum!(EventStatus);

/// Status of a registration. Only `registered` exists today; counts filter on it so that
/// future states (waitlisted, withdrawn) do not consume capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registered" => Ok(RegistrationStatus::Registered),
            other => Err(ParseEnumError {
                kind: "registration status",
                value: other.to_string(),
            }),
        }
    }
}

text_column_enum!(RegistrationStatus);

/// Whether a registered student attended, derived from the (optional) attendance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    NotMarked,
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::NotMarked => "not_marked",
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

impl From<Option<bool>> for AttendanceStatus {
    fn from(present: Option<bool>) -> Self {
        match present {
            None => AttendanceStatus::NotMarked,
            Some(true) => AttendanceStatus::Present,
            Some(false) => AttendanceStatus::Absent,
        }
    }
}

impl From<Option<&Attendance>> for AttendanceStatus {
    fn from(record: Option<&Attendance>) -> Self {
        record.map(|record| record.present).into()
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Insertable, Serialize)]
#[diesel(table_name = colleges)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct College {
    pub id: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Insertable, Serialize)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Student {
    pub id: String,
    pub college_id: String,
    pub roll_no: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Insertable, Serialize)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Event {
    pub id: String,
    pub college_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// Maximum number of registrations; `0` means unlimited.
    pub capacity: i32,
    pub status: EventStatus,
    pub created_at: NaiveDateTime,
}

impl Event {
    pub fn is_unlimited(&self) -> bool {
        self.capacity <= 0
    }

    /// Seats left given the current registered count, or `None` for unlimited events.
    pub fn available_spots(&self, registered: i64) -> Option<i64> {
        if self.is_unlimited() {
            None
        } else {
            Some((i64::from(self.capacity) - registered).max(0))
        }
    }

    pub fn is_full(&self, registered: i64) -> bool {
        !self.is_unlimited() && registered >= i64::from(self.capacity)
    }
}

/// A partial update to an [`Event`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, AsChangeset, Deserialize)]
#[diesel(table_name = events)]
pub struct EventChanges {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub description: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub capacity: Option<i32>,
    pub status: Option<EventStatus>,
}

impl EventChanges {
    pub fn is_empty(&self) -> bool {
        *self == EventChanges::default()
    }

    /// The same changes with the new title trimmed.
    pub fn trimmed(&self) -> EventChanges {
        EventChanges {
            title: self.title.as_deref().map(str::trim).map(str::to_string),
            ..self.clone()
        }
    }

    /// The event as it would look after applying these changes.
    pub fn apply_to(&self, event: &Event) -> Event {
        Event {
            title: self.title.clone().unwrap_or_else(|| event.title.clone()),
            event_type: self.event_type.unwrap_or(event.event_type),
            description: self.description.clone().or_else(|| event.description.clone()),
            start_time: self.start_time.unwrap_or(event.start_time),
            end_time: self.end_time.unwrap_or(event.end_time),
            capacity: self.capacity.unwrap_or(event.capacity),
            status: self.status.unwrap_or(event.status),
            ..event.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Insertable, Serialize)]
#[diesel(table_name = registrations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    pub student_id: String,
    pub registered_at: NaiveDateTime,
    pub status: RegistrationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Insertable, Serialize)]
#[diesel(table_name = attendance)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Attendance {
    pub id: String,
    pub registration_id: String,
    pub checked_in_at: NaiveDateTime,
    pub present: bool,
    /// How the row was written: a self check-in method or `admin`.
    pub method: String,
}

impl Attendance {
    pub fn status(&self) -> AttendanceStatus {
        Some(self).into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Identifiable, Insertable, Serialize)]
#[diesel(table_name = feedback)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Feedback {
    pub id: String,
    pub registration_id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub submitted_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn event(capacity: i32) -> Event {
        let start = NaiveDate::from_ymd_opt(2030, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        Event {
            id: "e".into(),
            college_id: "c".into(),
            title: "Rust Workshop".into(),
            event_type: EventType::Workshop,
            description: None,
            start_time: start,
            end_time: start + chrono::Duration::hours(2),
            capacity,
            status: EventStatus::Scheduled,
            created_at: start,
        }
    }

    #[test]
    fn unlimited_event_is_never_full() {
        let event = event(0);
        for registered in [0, 1, 1_000, 1_000_000] {
            assert_eq!(event.available_spots(registered), None);
            assert!(!event.is_full(registered));
        }
    }

    #[test]
    fn limited_event_counts_down_to_zero() {
        let event = event(2);
        assert_eq!(event.available_spots(0), Some(2));
        assert_eq!(event.available_spots(2), Some(0));
        assert_eq!(event.available_spots(5), Some(0));
        assert!(!event.is_full(1));
        assert!(event.is_full(2));
    }

    #[test]
    fn enum_text_forms_parse_back() {
        for kind in EventType::ALL {
            assert_eq!(kind.as_str().parse::<EventType>().unwrap(), kind);
        }
        assert_eq!("cancelled".parse::<EventStatus>().unwrap(), EventStatus::Cancelled);
        assert!("Cancelled".parse::<EventStatus>().is_err());
        assert!("Party".parse::<EventType>().is_err());
    }

    #[test]
    fn attendance_status_has_three_states() {
        assert_eq!(AttendanceStatus::from(None::<bool>), AttendanceStatus::NotMarked);
        assert_eq!(AttendanceStatus::from(Some(true)), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::from(Some(false)), AttendanceStatus::Absent);
        assert_eq!(
            serde_json::to_value(AttendanceStatus::NotMarked).unwrap(),
            serde_json::json!("not_marked")
        );
    }

    #[test]
    fn changes_overlay_the_current_event() {
        let current = event(10);
        let changes = EventChanges {
            capacity: Some(0),
            status: Some(EventStatus::Completed),
            ..EventChanges::default()
        };
        let next = changes.apply_to(&current);
        assert_eq!(next.capacity, 0);
        assert_eq!(next.status, EventStatus::Completed);
        assert_eq!(next.title, current.title);
        assert!(EventChanges::default().is_empty());

        let padded = EventChanges {
            title: Some("  Rust 201 ".to_string()),
            ..EventChanges::default()
        };
        assert_eq!(padded.trimmed().title.as_deref(), Some("Rust 201"));
        assert!(!changes.is_empty());
    }
}
