//! Read-only aggregate reports over events, registrations, attendance and feedback.
//!
//! Counts are gathered with grouped queries and combined with event rows here rather than in
//! one large SQL statement. Percentages and mean ratings are rendered with two decimals.

use crate::error::{Entity, OptionalExt, Result};
use crate::events::{EventOrder, EventQuery, Page, select_events};
use crate::manager::{
    EventManager, find_event, find_student, present_count, present_counts, registered_count,
    registered_counts,
};
use crate::models::{
    Attendance, AttendanceStatus, Event, EventStatus, EventType, Registration,
    RegistrationStatus, Student,
};
use crate::schema::{attendance, colleges, events, feedback, registrations, students};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_POPULARITY_LIMIT: i64 = 10;
pub const DEFAULT_TOP_ACTIVE_LIMIT: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularityRow {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub start_time: NaiveDateTime,
    pub capacity: i32,
    pub college_name: Option<String>,
    pub registrations_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRow {
    pub id: String,
    pub title: String,
    pub college_name: Option<String>,
    pub start_time: NaiveDateTime,
    pub registrations: i64,
    /// Registrations marked present.
    pub attended: i64,
    pub attendance_percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackRow {
    pub id: String,
    pub title: String,
    pub college_name: Option<String>,
    pub start_time: NaiveDateTime,
    /// `None` until the first rating arrives.
    pub avg_rating: Option<String>,
    pub rating_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable)]
pub struct FeedbackDetail {
    pub rating: i32,
    pub comment: Option<String>,
    pub submitted_at: NaiveDateTime,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventFeedback {
    #[serde(flatten)]
    pub summary: FeedbackRow,
    /// Most recent first.
    pub feedback_details: Vec<FeedbackDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipationEvent {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub start_time: NaiveDateTime,
    pub registered_at: NaiveDateTime,
    pub registration_status: RegistrationStatus,
    pub attendance_status: AttendanceStatus,
    /// Set once any attendance row exists, present or absent.
    pub attended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentParticipation {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roll_no: Option<String>,
    /// Distinct events the student registered for.
    pub events_registered: i64,
    /// Attendance rows of any kind, present or absent.
    pub events_attended: i64,
    pub events: Vec<ParticipationEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveStudent {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roll_no: Option<String>,
    pub college_name: String,
    pub events_attended: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRegistrations {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub start_time: NaiveDateTime,
    pub college_name: Option<String>,
    pub registrations: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilteredEvent {
    #[serde(flatten)]
    pub event: Event,
    pub college_name: Option<String>,
    pub registrations_count: i64,
    pub attendance_count: i64,
    pub attendance_percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub events: Vec<FilteredEvent>,
    pub pagination: Page,
}

/// `part / whole * 100` with two decimals, `"0.00"` for an empty whole.
pub fn percentage(part: i64, whole: i64) -> String {
    if whole == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", part as f64 / whole as f64 * 100.0)
}

fn mean_rating(sum: i64, count: i64) -> Option<String> {
    (count > 0).then(|| format!("{:.2}", sum as f64 / count as f64))
}

fn limit_to(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}

fn for_college(college_id: Option<&str>) -> EventQuery {
    EventQuery {
        college_id: college_id.map(str::to_string),
        ..EventQuery::default()
    }
}

impl EventManager {
    /// Events ranked by registrations, most popular first. Ties go to the earlier event.
    pub fn popularity(
        &mut self,
        college_id: Option<&str>,
        event_type: Option<EventType>,
        limit: Option<i64>,
    ) -> Result<Vec<PopularityRow>> {
        let conn = self.db();
        let query = EventQuery {
            event_type,
            ..for_college(college_id)
        };

        let events = select_events(conn, &query, None, EventOrder::SoonestFirst, None)?;
        let counts = registered_counts(conn)?;

        let mut rows: Vec<PopularityRow> = events
            .into_iter()
            .map(|(event, college_name)| PopularityRow {
                registrations_count: counts.get(&event.id).copied().unwrap_or(0),
                id: event.id,
                title: event.title,
                event_type: event.event_type,
                start_time: event.start_time,
                capacity: event.capacity,
                college_name,
            })
            .collect();

        // Stable, so equal counts keep start-time order.
        rows.sort_by(|a, b| b.registrations_count.cmp(&a.registrations_count));
        rows.truncate(limit_to(limit.unwrap_or(DEFAULT_POPULARITY_LIMIT)));
        Ok(rows)
    }

    /// Attendance percentage of every event, latest first.
    pub fn attendance_report(&mut self, college_id: Option<&str>) -> Result<Vec<AttendanceRow>> {
        let conn = self.db();

        let events = select_events(
            conn,
            &for_college(college_id),
            None,
            EventOrder::LatestFirst,
            None,
        )?;
        let registered = registered_counts(conn)?;
        let present = present_counts(conn)?;

        Ok(events
            .into_iter()
            .map(|(event, college_name)| {
                let registrations = registered.get(&event.id).copied().unwrap_or(0);
                let attended = present.get(&event.id).copied().unwrap_or(0);
                attendance_row(event, college_name, registrations, attended)
            })
            .collect())
    }

    pub fn event_attendance(&mut self, event_id: &str) -> Result<AttendanceRow> {
        let conn = self.db();
        let (event, college_name) = event_with_college(conn, event_id)?;
        let registrations = registered_count(conn, event_id)?;
        let attended = present_count(conn, event_id)?;
        Ok(attendance_row(event, college_name, registrations, attended))
    }

    /// Mean rating and number of ratings of every event, latest first.
    pub fn feedback_report(&mut self, college_id: Option<&str>) -> Result<Vec<FeedbackRow>> {
        let conn = self.db();

        let events = select_events(
            conn,
            &for_college(college_id),
            None,
            EventOrder::LatestFirst,
            None,
        )?;

        let totals = rating_totals(conn)?;

        Ok(events
            .into_iter()
            .map(|(event, college_name)| {
                let (sum, count) = totals.get(&event.id).copied().unwrap_or_default();
                feedback_row(event, college_name, sum, count)
            })
            .collect())
    }

    /// One event's rating summary with every individual rating and comment.
    pub fn event_feedback(&mut self, event_id: &str) -> Result<EventFeedback> {
        let conn = self.db();
        let (event, college_name) = event_with_college(conn, event_id)?;

        let feedback_details = feedback::table
            .inner_join(registrations::table.inner_join(students::table))
            .filter(registrations::event_id.eq(event_id))
            .order((feedback::submitted_at.desc(), feedback::id.asc()))
            .select((
                feedback::rating,
                feedback::comment,
                feedback::submitted_at,
                students::name,
            ))
            .load::<FeedbackDetail>(conn)?;

        let count = feedback_details.len() as i64;
        let sum = feedback_details
            .iter()
            .map(|detail| i64::from(detail.rating))
            .sum();

        Ok(EventFeedback {
            summary: feedback_row(event, college_name, sum, count),
            feedback_details,
        })
    }

    /// A student's registrations and attendance. With `college_id`, a student of another
    /// college is reported as not found.
    pub fn student_participation(
        &mut self,
        student_id: &str,
        college_id: Option<&str>,
    ) -> Result<StudentParticipation> {
        let conn = self.db();

        let student = find_student(conn, student_id)?
            .filter(|student| college_id.is_none_or(|college| student.college_id == college))
            .found(Entity::Student)?;

        let rows = registrations::table
            .inner_join(events::table)
            .left_join(attendance::table)
            .filter(registrations::student_id.eq(student_id))
            .order((events::start_time.desc(), events::id.asc()))
            .select((
                Event::as_select(),
                Registration::as_select(),
                Option::<Attendance>::as_select(),
            ))
            .load::<(Event, Registration, Option<Attendance>)>(conn)?;

        let events_registered = rows
            .iter()
            .map(|(event, ..)| event.id.as_str())
            .collect::<HashSet<_>>()
            .len() as i64;
        let events_attended = rows
            .iter()
            .filter(|(.., record)| record.is_some())
            .count() as i64;

        let events = rows
            .into_iter()
            .map(|(event, registration, record)| {
                let attendance_status = AttendanceStatus::from(record.as_ref());
                ParticipationEvent {
                    id: event.id,
                    title: event.title,
                    event_type: event.event_type,
                    start_time: event.start_time,
                    registered_at: registration.registered_at,
                    registration_status: registration.status,
                    attended: record.is_some(),
                    attendance_status,
                }
            })
            .collect();

        Ok(StudentParticipation {
            id: student.id,
            name: student.name,
            email: student.email,
            roll_no: student.roll_no,
            events_registered,
            events_attended,
            events,
        })
    }

    /// Students ranked by how many attendance rows they have.
    ///
    /// Rows marked absent count too, so a student marked absent everywhere still ranks.
    pub fn top_active(
        &mut self,
        college_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<ActiveStudent>> {
        let conn = self.db();
        let limit = limit.unwrap_or(DEFAULT_TOP_ACTIVE_LIMIT).max(0);

        let ranked = attendance::table
            .inner_join(registrations::table.inner_join(students::table))
            .filter(
                students::college_id
                    .eq(college_id.unwrap_or_default())
                    .or(college_id.is_none().into_sql::<Bool>()),
            )
            .group_by(students::id)
            .select((Student::as_select(), diesel::dsl::count_star()))
            .order_by((
                diesel::dsl::count_star().desc(),
                students::name.asc(),
                students::id.asc(),
            ))
            .limit(limit)
            .load::<(Student, i64)>(conn)?;

        let college_names: HashMap<String, String> = colleges::table
            .select((colleges::id, colleges::name))
            .load::<(String, String)>(conn)?
            .into_iter()
            .collect();

        let ranking = ranked
            .into_iter()
            .map(|(student, events_attended)| ActiveStudent {
                college_name: college_names
                    .get(&student.college_id)
                    .cloned()
                    .unwrap_or_default(),
                id: student.id,
                name: student.name,
                email: student.email,
                roll_no: student.roll_no,
                events_attended,
            })
            .collect();

        Ok(ranking)
    }

    /// Registration totals of events with the given status (scheduled by default), busiest first.
    pub fn registrations_per_event(
        &mut self,
        college_id: Option<&str>,
        status: Option<EventStatus>,
    ) -> Result<Vec<EventRegistrations>> {
        let conn = self.db();
        let status = status.unwrap_or(EventStatus::Scheduled);

        let events = select_events(
            conn,
            &for_college(college_id),
            Some(status),
            EventOrder::SoonestFirst,
            None,
        )?;
        let counts = registered_counts(conn)?;

        let mut rows: Vec<EventRegistrations> = events
            .into_iter()
            .map(|(event, college_name)| EventRegistrations {
                registrations: counts.get(&event.id).copied().unwrap_or(0),
                id: event.id,
                title: event.title,
                event_type: event.event_type,
                start_time: event.start_time,
                college_name,
            })
            .collect();
        rows.sort_by(|a, b| b.registrations.cmp(&a.registrations));
        Ok(rows)
    }

    /// A page of events matching `query`, latest first, with registration and attendance
    /// figures. Every status is included unless `query.status` narrows it.
    pub fn event_filter_report(&mut self, query: &EventQuery) -> Result<FilterReport> {
        let conn = self.db();

        let events = select_events(
            conn,
            query,
            query.status,
            EventOrder::LatestFirst,
            Some(query.page),
        )?;
        let registered = registered_counts(conn)?;
        let present = present_counts(conn)?;

        let events = events
            .into_iter()
            .map(|(event, college_name)| {
                let registrations_count = registered.get(&event.id).copied().unwrap_or(0);
                let attendance_count = present.get(&event.id).copied().unwrap_or(0);
                FilteredEvent {
                    attendance_percentage: percentage(attendance_count, registrations_count),
                    event,
                    college_name,
                    registrations_count,
                    attendance_count,
                }
            })
            .collect();

        Ok(FilterReport {
            events,
            pagination: query.page,
        })
    }
}

fn event_with_college(
    conn: &mut SqliteConnection,
    event_id: &str,
) -> Result<(Event, Option<String>)> {
    let event = find_event(conn, event_id)?.found(Entity::Event)?;
    let college_name = colleges::table
        .find(&event.college_id)
        .select(colleges::name)
        .first::<String>(conn)
        .optional()?;
    Ok((event, college_name))
}

/// Sum and number of ratings per event.
fn rating_totals(conn: &mut SqliteConnection) -> QueryResult<HashMap<String, (i64, i64)>> {
    Ok(feedback::table
        .inner_join(registrations::table)
        .group_by(registrations::event_id)
        .select((
            registrations::event_id,
            diesel::dsl::sum(feedback::rating),
            diesel::dsl::count_star(),
        ))
        .load::<(String, Option<i64>, i64)>(conn)?
        .into_iter()
        .map(|(event_id, sum, count)| (event_id, (sum.unwrap_or(0), count)))
        .collect())
}

fn attendance_row(
    event: Event,
    college_name: Option<String>,
    registrations: i64,
    attended: i64,
) -> AttendanceRow {
    AttendanceRow {
        id: event.id,
        title: event.title,
        college_name,
        start_time: event.start_time,
        registrations,
        attended,
        attendance_percentage: percentage(attended, registrations),
    }
}

fn feedback_row(event: Event, college_name: Option<String>, sum: i64, count: i64) -> FeedbackRow {
    FeedbackRow {
        id: event.id,
        title: event.title,
        college_name,
        start_time: event.start_time,
        avg_rating: mean_rating(sum, count),
        rating_count: count,
    }
}
