//! Event administration and the event/registration lookups built on it.

use crate::error::{Entity, Error, OptionalExt, Result, is_unique_violation};
use crate::manager::{
    EventManager, find_college_by_name, find_event, new_id, present_count, registered_count,
    registered_counts,
};
use crate::models::{
    Attendance, AttendanceStatus, College, Event, EventChanges, EventStatus, EventType,
    Registration, RegistrationStatus, Student,
};
use crate::schema::{attendance, colleges, events, registrations, students};
use crate::validation::{validate_event, validate_new_event};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Capacity given to events created without one.
pub const DEFAULT_CAPACITY: i32 = 100;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewEventRequest {
    /// The owning college, created on first use.
    pub college_name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    /// `0` is unlimited; defaults to [`DEFAULT_CAPACITY`].
    pub capacity: Option<i32>,
    pub status: Option<EventStatus>,
}

/// A 1-based page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// Filters for event listings. `from`/`to` bound the start time; `q` matches title or
/// description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EventQuery {
    pub college_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<EventType>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    pub q: Option<String>,
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub page: Page,
}

/// An event in a listing, with its current availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    #[serde(flatten)]
    pub event: Event,
    pub college_name: Option<String>,
    pub registrations_count: i64,
    pub available_spots: Option<i64>,
    pub is_full: bool,
}

impl EventSummary {
    fn new(event: Event, college_name: Option<String>, registrations_count: i64) -> Self {
        Self {
            available_spots: event.available_spots(registrations_count),
            is_full: event.is_full(registrations_count),
            event,
            college_name,
            registrations_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDetails {
    #[serde(flatten)]
    pub summary: EventSummary,
    /// Registrations marked present.
    pub attendance_count: i64,
}

/// One row of an event's attendance sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub registration_id: String,
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub roll_no: Option<String>,
    pub phone: Option<String>,
    pub registered_at: NaiveDateTime,
    pub attendance_status: AttendanceStatus,
    pub checked_in_at: Option<NaiveDateTime>,
}

impl RosterEntry {
    fn new(registration: Registration, student: Student, attendance: Option<Attendance>) -> Self {
        Self {
            registration_id: registration.id,
            student_id: student.id,
            name: student.name,
            email: student.email,
            roll_no: student.roll_no,
            phone: student.phone,
            registered_at: registration.registered_at,
            attendance_status: attendance.as_ref().into(),
            checked_in_at: attendance.map(|record| record.checked_in_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRoster {
    pub event: EventDetails,
    pub registrations: Vec<RosterEntry>,
}

/// A registration found by student email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Queryable)]
pub struct RegistrationHit {
    pub id: String,
    pub registered_at: NaiveDateTime,
    pub event_title: String,
    pub event_date: NaiveDateTime,
    pub event_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationDetails {
    pub registration: Registration,
    pub name: String,
    pub email: String,
    pub event: Event,
    pub college_name: String,
}

impl EventManager {
    /// Creates an event, filing it under the college with the given name (created if new).
    pub fn create_event(&mut self, request: &NewEventRequest) -> Result<Event> {
        let now = self.now();
        let college_name = request.college_name.trim();

        let mut event = Event {
            id: new_id(),
            college_id: String::new(),
            title: request.title.trim().to_string(),
            event_type: request.event_type,
            description: request.description.clone(),
            start_time: request.start_time,
            end_time: request.end_time,
            capacity: request.capacity.unwrap_or(DEFAULT_CAPACITY),
            status: request.status.unwrap_or(EventStatus::Scheduled),
            created_at: now,
        };
        validate_new_event(college_name, &event)?;

        let event = self.db().immediate_transaction(|conn| -> Result<Event> {
            event.college_id = find_or_create_college(conn, college_name, now)?.id;
            diesel::insert_into(events::table)
                .values(&event)
                .execute(conn)?;
            Ok(event)
        })?;

        tracing::info!(event_id = %event.id, college_id = %event.college_id, "created event");
        Ok(event)
    }

    /// Applies a partial update. The result is validated as a whole, and capacity cannot drop
    /// below the number of students already registered.
    pub fn update_event(&mut self, event_id: &str, changes: &EventChanges) -> Result<Event> {
        let changes = &changes.trimmed();
        let updated = self.db().immediate_transaction(|conn| -> Result<Event> {
            let current = find_event(conn, event_id)?.found(Entity::Event)?;
            if changes.is_empty() {
                return Ok(current);
            }

            let next = changes.apply_to(&current);
            validate_event(&next)?;

            if !next.is_unlimited() {
                let registered = registered_count(conn, event_id)?;
                if registered > i64::from(next.capacity) {
                    return Err(Error::validation(
                        "capacity",
                        format!("cannot be lower than the {registered} current registrations"),
                    ));
                }
            }

            diesel::update(events::table.find(event_id))
                .set(changes)
                .execute(conn)?;
            Ok(next)
        })?;

        tracing::info!(event_id, "updated event");
        Ok(updated)
    }

    /// Cancels an event. Existing registrations are kept; new ones are refused.
    pub fn cancel_event(&mut self, event_id: &str) -> Result<Event> {
        let cancelled = diesel::update(events::table.find(event_id))
            .set(events::status.eq(EventStatus::Cancelled))
            .returning(Event::as_returning())
            .get_result(self.db())
            .optional()?
            .found(Entity::Event)?;

        tracing::info!(event_id, "cancelled event");
        Ok(cancelled)
    }

    /// Public listing: scheduled events unless another status is asked for, soonest first.
    pub fn list_events(&mut self, query: &EventQuery) -> Result<Vec<EventSummary>> {
        let status = query.status.unwrap_or(EventStatus::Scheduled);
        self.query_events(query, Some(status), EventOrder::SoonestFirst)
    }

    /// Admin listing: every status unless filtered, most recently created first.
    pub fn admin_list_events(&mut self, query: &EventQuery) -> Result<Vec<EventSummary>> {
        self.query_events(query, query.status, EventOrder::NewestCreatedFirst)
    }

    fn query_events(
        &mut self,
        query: &EventQuery,
        status: Option<EventStatus>,
        order: EventOrder,
    ) -> Result<Vec<EventSummary>> {
        let conn = self.db();

        let rows = select_events(conn, query, status, order, Some(query.page))?;
        let counts = registered_counts(conn)?;

        Ok(rows
            .into_iter()
            .map(|(event, college_name)| {
                let registered = counts.get(&event.id).copied().unwrap_or(0);
                EventSummary::new(event, college_name, registered)
            })
            .collect())
    }

    /// A single event with registration and attendance counts.
    pub fn event_details(&mut self, event_id: &str) -> Result<EventDetails> {
        let conn = self.db();

        let (event, college_name) = events::table
            .left_join(colleges::table)
            .filter(events::id.eq(event_id))
            .select((Event::as_select(), colleges::name.nullable()))
            .first::<(Event, Option<String>)>(conn)
            .optional()?
            .found(Entity::Event)?;

        let registered = registered_count(conn, event_id)?;
        let attendance_count = present_count(conn, event_id)?;

        Ok(EventDetails {
            summary: EventSummary::new(event, college_name, registered),
            attendance_count,
        })
    }

    /// An event with its registered students and their attendance, ordered by name.
    pub fn event_roster(&mut self, event_id: &str) -> Result<EventRoster> {
        let event = self.event_details(event_id)?;

        let registrations = registrations::table
            .inner_join(students::table)
            .left_join(attendance::table)
            .filter(registrations::event_id.eq(event_id))
            .filter(registrations::status.eq(RegistrationStatus::Registered))
            .order((students::name.asc(), registrations::id.asc()))
            .select((
                Registration::as_select(),
                Student::as_select(),
                Option::<Attendance>::as_select(),
            ))
            .load::<(Registration, Student, Option<Attendance>)>(self.db())?
            .into_iter()
            .map(|(registration, student, attendance)| {
                RosterEntry::new(registration, student, attendance)
            })
            .collect();

        Ok(EventRoster {
            event,
            registrations,
        })
    }

    /// Registrations held by the student with this email, latest event first.
    pub fn search_registrations(&mut self, email: &str) -> Result<Vec<RegistrationHit>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::validation("email", "Email parameter is required"));
        }

        Ok(registrations::table
            .inner_join(students::table)
            .inner_join(events::table)
            .filter(students::email.eq(email))
            .filter(registrations::status.eq(RegistrationStatus::Registered))
            .order(events::start_time.desc())
            .select((
                registrations::id,
                registrations::registered_at,
                events::title,
                events::start_time,
                events::id,
            ))
            .load::<RegistrationHit>(self.db())?)
    }

    /// A registration with the student's name and email and the event it is for.
    pub fn registration_details(&mut self, registration_id: &str) -> Result<RegistrationDetails> {
        let conn = self.db();

        let (registration, name, email) = registrations::table
            .inner_join(students::table)
            .filter(registrations::id.eq(registration_id))
            .select((Registration::as_select(), students::name, students::email))
            .first::<(Registration, String, String)>(conn)
            .optional()?
            .found(Entity::Registration)?;

        let (event, college_name) = events::table
            .inner_join(colleges::table)
            .filter(events::id.eq(&registration.event_id))
            .select((Event::as_select(), colleges::name))
            .first::<(Event, String)>(conn)?;

        Ok(RegistrationDetails {
            registration,
            name,
            email,
            event,
            college_name,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventOrder {
    SoonestFirst,
    LatestFirst,
    NewestCreatedFirst,
}

/// Events matching `query` with their college names. `q` matches title or description.
pub(crate) fn select_events(
    conn: &mut SqliteConnection,
    query: &EventQuery,
    status: Option<EventStatus>,
    order: EventOrder,
    page: Option<Page>,
) -> QueryResult<Vec<(Event, Option<String>)>> {
    let mut select = events::table
        .left_join(colleges::table)
        .select((Event::as_select(), colleges::name.nullable()))
        .into_boxed();

    if let Some(status) = status {
        select = select.filter(events::status.eq(status));
    }
    if let Some(college_id) = &query.college_id {
        select = select.filter(events::college_id.eq(college_id.clone()));
    }
    if let Some(event_type) = query.event_type {
        select = select.filter(events::event_type.eq(event_type));
    }
    if let Some(from) = query.from {
        select = select.filter(events::start_time.ge(from));
    }
    if let Some(to) = query.to {
        select = select.filter(events::start_time.le(to));
    }
    if let Some(text) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{text}%");
        select = select.filter(
            events::title
                .like(pattern.clone())
                .or(events::description.like(pattern)),
        );
    }

    select = match order {
        EventOrder::SoonestFirst => select.order((events::start_time.asc(), events::id.asc())),
        EventOrder::LatestFirst => select.order((events::start_time.desc(), events::id.asc())),
        EventOrder::NewestCreatedFirst => {
            select.order((events::created_at.desc(), events::id.asc()))
        }
    };

    if let Some(page) = page {
        select = select.offset(page.offset()).limit(page.limit);
    }

    select.load(conn)
}

/// Finds the college with this name or creates it. The unique index on the name settles two
/// creators racing for the same new college.
fn find_or_create_college(
    conn: &mut SqliteConnection,
    name: &str,
    now: NaiveDateTime,
) -> Result<College> {
    if let Some(college) = find_college_by_name(conn, name)? {
        return Ok(college);
    }

    let college = College {
        id: new_id(),
        name: name.to_string(),
        created_at: now,
    };

    match diesel::insert_into(colleges::table)
        .values(&college)
        .execute(conn)
    {
        Ok(_) => {
            tracing::info!(college_id = %college.id, name, "created college");
            Ok(college)
        }
        Err(err) if is_unique_violation(&err) => {
            find_college_by_name(conn, name)?.ok_or(Error::Database(err))
        }
        Err(err) => Err(err.into()),
    }
}
