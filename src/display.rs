//! Rendering command results: the JSON envelope by default, or a table / CSV for listings.

use crate::events::{EventSummary, RegistrationHit, RosterEntry};
use crate::models::College;
use crate::reports::{
    ActiveStudent, AttendanceRow, EventRegistrations, FeedbackDetail, FeedbackRow,
    FilteredEvent, ParticipationEvent, PopularityRow,
};
use crate::response::Envelope;
use anyhow::Result;
use clap::ValueEnum;
use serde_json::Value;
use std::borrow::Cow;
use tabled::builder::Builder;
use tabled::{Tabled, settings::Style};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
    Csv,
}

/// Headers and stringified cells of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl Grid {
    pub fn from_rows<R: Tabled>(rows: impl IntoIterator<Item = R>) -> Self {
        Self {
            headers: R::headers().into_iter().map(Cow::into_owned).collect(),
            records: rows
                .into_iter()
                .map(|row| row.fields().into_iter().map(Cow::into_owned).collect())
                .collect(),
        }
    }

    pub fn to_table(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.headers.clone());
        for record in &self.records {
            builder.push_record(record.clone());
        }

        let mut table = builder.build();
        table.with(Style::modern());
        table.to_string()
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for record in &self.records {
            writer.write_record(record)?;
        }
        Ok(String::from_utf8(writer.into_inner()?)?)
    }
}

/// What a command produced: the JSON payload, and a grid when the result is a listing.
#[derive(Debug, Clone)]
pub struct Reply {
    pub payload: Value,
    pub grid: Option<Grid>,
}

impl Reply {
    pub fn json(payload: Value) -> Self {
        Self {
            payload,
            grid: None,
        }
    }

    pub fn listing<R: Tabled>(payload: Value, rows: impl IntoIterator<Item = R>) -> Self {
        Self {
            payload,
            grid: Some(Grid::from_rows(rows)),
        }
    }

    /// Renders in the requested format. Results that are not listings are always JSON.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match (format, &self.grid) {
            (OutputFormat::Table, Some(grid)) => Ok(grid.to_table()),
            (OutputFormat::Csv, Some(grid)) => grid.to_csv(),
            _ => Ok(serde_json::to_string_pretty(&Envelope::ok(&self.payload))?),
        }
    }
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn spots(available: Option<i64>) -> String {
    available.map_or_else(|| "unlimited".to_string(), |spots| spots.to_string())
}

#[derive(Tabled)]
pub struct EventLine {
    id: String,
    title: String,
    #[tabled(rename = "type")]
    event_type: String,
    college: String,
    start_time: String,
    status: String,
    registered: i64,
    available: String,
}

impl From<&EventSummary> for EventLine {
    fn from(summary: &EventSummary) -> Self {
        let event = &summary.event;
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            event_type: event.event_type.to_string(),
            college: text(summary.college_name.as_deref()),
            start_time: event.start_time.to_string(),
            status: event.status.to_string(),
            registered: summary.registrations_count,
            available: spots(summary.available_spots),
        }
    }
}

#[derive(Tabled)]
pub struct RosterLine {
    registration_id: String,
    name: String,
    email: String,
    roll_no: String,
    attendance: String,
    checked_in_at: String,
}

impl From<&RosterEntry> for RosterLine {
    fn from(entry: &RosterEntry) -> Self {
        Self {
            registration_id: entry.registration_id.clone(),
            name: entry.name.clone(),
            email: entry.email.clone(),
            roll_no: text(entry.roll_no.as_deref()),
            attendance: entry.attendance_status.to_string(),
            checked_in_at: entry
                .checked_in_at
                .map_or_else(|| "-".to_string(), |at| at.to_string()),
        }
    }
}

#[derive(Tabled)]
pub struct RegistrationLine {
    registration_id: String,
    event: String,
    event_date: String,
    registered_at: String,
}

impl From<&RegistrationHit> for RegistrationLine {
    fn from(hit: &RegistrationHit) -> Self {
        Self {
            registration_id: hit.id.clone(),
            event: hit.event_title.clone(),
            event_date: hit.event_date.to_string(),
            registered_at: hit.registered_at.to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct CollegeLine {
    id: String,
    name: String,
}

impl From<&College> for CollegeLine {
    fn from(college: &College) -> Self {
        Self {
            id: college.id.clone(),
            name: college.name.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct PopularityLine {
    title: String,
    #[tabled(rename = "type")]
    event_type: String,
    college: String,
    start_time: String,
    capacity: String,
    registrations: i64,
}

impl From<&PopularityRow> for PopularityLine {
    fn from(row: &PopularityRow) -> Self {
        Self {
            title: row.title.clone(),
            event_type: row.event_type.to_string(),
            college: text(row.college_name.as_deref()),
            start_time: row.start_time.to_string(),
            capacity: match row.capacity {
                0 => "unlimited".to_string(),
                capacity => capacity.to_string(),
            },
            registrations: row.registrations_count,
        }
    }
}

#[derive(Tabled)]
pub struct AttendanceLine {
    title: String,
    college: String,
    start_time: String,
    registrations: i64,
    attended: i64,
    percentage: String,
}

impl From<&AttendanceRow> for AttendanceLine {
    fn from(row: &AttendanceRow) -> Self {
        Self {
            title: row.title.clone(),
            college: text(row.college_name.as_deref()),
            start_time: row.start_time.to_string(),
            registrations: row.registrations,
            attended: row.attended,
            percentage: row.attendance_percentage.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct FeedbackLine {
    title: String,
    college: String,
    start_time: String,
    avg_rating: String,
    ratings: i64,
}

impl From<&FeedbackRow> for FeedbackLine {
    fn from(row: &FeedbackRow) -> Self {
        Self {
            title: row.title.clone(),
            college: text(row.college_name.as_deref()),
            start_time: row.start_time.to_string(),
            avg_rating: text(row.avg_rating.as_deref()),
            ratings: row.rating_count,
        }
    }
}

#[derive(Tabled)]
pub struct CommentLine {
    name: String,
    rating: i32,
    comment: String,
    submitted_at: String,
}

impl From<&FeedbackDetail> for CommentLine {
    fn from(detail: &FeedbackDetail) -> Self {
        Self {
            name: detail.name.clone(),
            rating: detail.rating,
            comment: text(detail.comment.as_deref()),
            submitted_at: detail.submitted_at.to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct ParticipationLine {
    title: String,
    #[tabled(rename = "type")]
    event_type: String,
    start_time: String,
    registered_at: String,
    attendance: String,
}

impl From<&ParticipationEvent> for ParticipationLine {
    fn from(event: &ParticipationEvent) -> Self {
        Self {
            title: event.title.clone(),
            event_type: event.event_type.to_string(),
            start_time: event.start_time.to_string(),
            registered_at: event.registered_at.to_string(),
            attendance: event.attendance_status.to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct ActiveStudentLine {
    name: String,
    email: String,
    roll_no: String,
    college: String,
    events_attended: i64,
}

impl From<&ActiveStudent> for ActiveStudentLine {
    fn from(student: &ActiveStudent) -> Self {
        Self {
            name: student.name.clone(),
            email: student.email.clone(),
            roll_no: text(student.roll_no.as_deref()),
            college: student.college_name.clone(),
            events_attended: student.events_attended,
        }
    }
}

#[derive(Tabled)]
pub struct EventRegistrationsLine {
    title: String,
    #[tabled(rename = "type")]
    event_type: String,
    college: String,
    start_time: String,
    registrations: i64,
}

impl From<&EventRegistrations> for EventRegistrationsLine {
    fn from(row: &EventRegistrations) -> Self {
        Self {
            title: row.title.clone(),
            event_type: row.event_type.to_string(),
            college: text(row.college_name.as_deref()),
            start_time: row.start_time.to_string(),
            registrations: row.registrations,
        }
    }
}

#[derive(Tabled)]
pub struct FilteredEventLine {
    title: String,
    #[tabled(rename = "type")]
    event_type: String,
    college: String,
    start_time: String,
    status: String,
    registrations: i64,
    attended: i64,
    percentage: String,
}

impl From<&FilteredEvent> for FilteredEventLine {
    fn from(row: &FilteredEvent) -> Self {
        Self {
            title: row.event.title.clone(),
            event_type: row.event.event_type.to_string(),
            college: text(row.college_name.as_deref()),
            start_time: row.event.start_time.to_string(),
            status: row.event.status.to_string(),
            registrations: row.registrations_count,
            attended: row.attendance_count,
            percentage: row.attendance_percentage.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Tabled)]
    struct Pair {
        name: &'static str,
        count: i64,
    }

    fn grid() -> Grid {
        Grid::from_rows([
            Pair {
                name: "Ann, Jr.",
                count: 2,
            },
            Pair {
                name: "Bo",
                count: 0,
            },
        ])
    }

    #[test]
    fn csv_quotes_cells_with_commas() {
        assert_eq!(
            grid().to_csv().unwrap(),
            "name,count\n\"Ann, Jr.\",2\nBo,0\n"
        );
    }

    #[test]
    fn tables_carry_headers_and_cells() {
        let table = grid().to_table();
        assert!(table.contains("name"));
        assert!(table.contains("Ann, Jr."));
    }

    #[test]
    fn plain_replies_stay_json_in_any_format() {
        let reply = Reply::json(json!({ "has_feedback": false }));
        let rendered = reply.render(OutputFormat::Table).unwrap();
        let value: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value, json!({ "success": true, "has_feedback": false }));
    }
}
