//! The entity store: connection setup, schema, and per-entity lookups.
//!
//! [`EventManager`] owns one SQLite connection. The registration, attendance and feedback
//! engines are implemented on it in their own modules and run each mutation inside a single
//! `BEGIN IMMEDIATE` transaction, so concurrent managers on the same database file serialise
//! their writes instead of racing between a read and the write that depends on it.

use crate::error::{Entity, OptionalExt, Result};
use crate::models::{
    Attendance, College, Event, Feedback, Registration, RegistrationStatus, Student,
};
use crate::schema;
use crate::settings::Settings;
use chrono::{NaiveDateTime, Utc};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::result::QueryResult;
use std::collections::HashMap;
use std::sync::Arc;

/// The schema, applied idempotently on every connection.
const SCHEMA: &str = include_str!("../migrations/2025-01-01-000000_create_campus_events/up.sql");

/// Default time a writer waits for another connection's write lock.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Source of "now" for every time-window rule and timestamp.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// The manager for recording, modifying, and retrieving campus event data.
pub struct EventManager {
    db: SqliteConnection,
    clock: Clock,
}

impl EventManager {
    /// Opens (creating if needed) the SQLite database at `database_url` and applies the schema.
    pub fn open(database_url: &str) -> Result<Self> {
        Self::open_with_timeout(database_url, DEFAULT_BUSY_TIMEOUT_MS)
    }

    pub fn open_with_timeout(database_url: &str, busy_timeout_ms: u64) -> Result<Self> {
        let db = SqliteConnection::establish(database_url)?;

        let mut manager = Self {
            db,
            clock: Arc::new(|| Utc::now().naive_utc()),
        };
        manager.db.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {busy_timeout_ms};"
        ))?;
        manager.migrate()?;

        tracing::debug!(database_url, "opened campus events database");
        Ok(manager)
    }

    /// A private in-memory database, mostly for tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::open_with_timeout(&settings.database_url, settings.busy_timeout_ms)
    }

    /// Creates a new `EventManager` from the layered configuration (see [`Settings::load`]).
    pub fn connect() -> Result<Self> {
        Self::from_settings(&Settings::load()?)
    }

    /// Creates any missing tables and indexes.
    pub fn migrate(&mut self) -> Result<()> {
        self.db.batch_execute(SCHEMA)?;
        Ok(())
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub(crate) fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub(crate) fn db(&mut self) -> &mut SqliteConnection {
        &mut self.db
    }

    /// Retrieves all colleges, ordered by name.
    pub fn list_colleges(&mut self) -> Result<Vec<College>> {
        use schema::colleges::dsl::*;

        Ok(colleges
            .order(name.asc())
            .select(College::as_select())
            .load(&mut self.db)?)
    }

    pub fn get_college(&mut self, college_id: &str) -> Result<College> {
        find_college(&mut self.db, college_id)?.found(Entity::College)
    }

    pub fn find_college_by_name(&mut self, college_name: &str) -> Result<Option<College>> {
        Ok(find_college_by_name(&mut self.db, college_name)?)
    }

    /// Removes a college together with its students and events (and everything below them).
    pub fn delete_college(&mut self, college_id: &str) -> Result<College> {
        use schema::colleges::dsl::*;

        let deleted = diesel::delete(colleges.filter(id.eq(college_id)))
            .returning(College::as_returning())
            .get_result(&mut self.db)
            .optional()?
            .found(Entity::College)?;

        tracing::info!(college_id, "deleted college");
        Ok(deleted)
    }

    pub fn get_student(&mut self, student_id: &str) -> Result<Student> {
        find_student(&mut self.db, student_id)?.found(Entity::Student)
    }

    pub fn find_student_by_email(&mut self, student_email: &str) -> Result<Option<Student>> {
        Ok(find_student_by_email(&mut self.db, student_email)?)
    }

    pub fn students_of_college(&mut self, college: &str) -> Result<Vec<Student>> {
        use schema::students::dsl::*;

        Ok(students
            .filter(college_id.eq(college))
            .order(name.asc())
            .select(Student::as_select())
            .load(&mut self.db)?)
    }

    /// Removes a student and, through the cascade, their registrations.
    pub fn delete_student(&mut self, student_id: &str) -> Result<Student> {
        use schema::students::dsl::*;

        let deleted = diesel::delete(students.filter(id.eq(student_id)))
            .returning(Student::as_returning())
            .get_result(&mut self.db)
            .optional()?
            .found(Entity::Student)?;

        tracing::info!(student_id, "deleted student");
        Ok(deleted)
    }

    pub fn get_event(&mut self, event_id: &str) -> Result<Event> {
        find_event(&mut self.db, event_id)?.found(Entity::Event)
    }

    pub fn events_of_college(&mut self, college: &str) -> Result<Vec<Event>> {
        use schema::events::dsl::*;

        Ok(events
            .filter(college_id.eq(college))
            .order(start_time.asc())
            .select(Event::as_select())
            .load(&mut self.db)?)
    }

    /// Hard-deletes an event and its registrations. Administrators normally cancel instead.
    pub fn delete_event(&mut self, event_id: &str) -> Result<Event> {
        use schema::events::dsl::*;

        let deleted = diesel::delete(events.filter(id.eq(event_id)))
            .returning(Event::as_returning())
            .get_result(&mut self.db)
            .optional()?
            .found(Entity::Event)?;

        tracing::info!(event_id, "deleted event");
        Ok(deleted)
    }

    pub fn get_registration(&mut self, registration_id: &str) -> Result<Registration> {
        find_registration(&mut self.db, registration_id)?.found(Entity::Registration)
    }

    pub fn registrations_of_event(&mut self, event: &str) -> Result<Vec<Registration>> {
        use schema::registrations::dsl::*;

        Ok(registrations
            .filter(event_id.eq(event))
            .order(registered_at.asc())
            .select(Registration::as_select())
            .load(&mut self.db)?)
    }

    /// Returns the number of registrations currently holding a seat at the event.
    pub fn registered_count(&mut self, event: &str) -> Result<i64> {
        Ok(registered_count(&mut self.db, event)?)
    }

    pub fn delete_registration(&mut self, registration_id: &str) -> Result<Registration> {
        use schema::registrations::dsl::*;

        let deleted = diesel::delete(registrations.filter(id.eq(registration_id)))
            .returning(Registration::as_returning())
            .get_result(&mut self.db)
            .optional()?
            .found(Entity::Registration)?;

        tracing::info!(registration_id, "deleted registration");
        Ok(deleted)
    }

    pub fn attendance_of_registration(&mut self, registration: &str) -> Result<Option<Attendance>> {
        Ok(find_attendance(&mut self.db, registration)?)
    }

    pub fn feedback_of_registration(&mut self, registration: &str) -> Result<Option<Feedback>> {
        Ok(find_feedback(&mut self.db, registration)?)
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(crate) fn find_college(
    conn: &mut SqliteConnection,
    college_id: &str,
) -> QueryResult<Option<College>> {
    use schema::colleges::dsl::*;

    colleges
        .find(college_id)
        .select(College::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn find_college_by_name(
    conn: &mut SqliteConnection,
    college_name: &str,
) -> QueryResult<Option<College>> {
    use schema::colleges::dsl::*;

    colleges
        .filter(name.eq(college_name))
        .select(College::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn find_student(
    conn: &mut SqliteConnection,
    student_id: &str,
) -> QueryResult<Option<Student>> {
    use schema::students::dsl::*;

    students
        .find(student_id)
        .select(Student::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn find_student_by_email(
    conn: &mut SqliteConnection,
    student_email: &str,
) -> QueryResult<Option<Student>> {
    use schema::students::dsl::*;

    students
        .filter(email.eq(student_email))
        .select(Student::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn find_event(
    conn: &mut SqliteConnection,
    event_id: &str,
) -> QueryResult<Option<Event>> {
    use schema::events::dsl::*;

    events
        .find(event_id)
        .select(Event::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn find_registration(
    conn: &mut SqliteConnection,
    registration_id: &str,
) -> QueryResult<Option<Registration>> {
    use schema::registrations::dsl::*;

    registrations
        .find(registration_id)
        .select(Registration::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn find_registration_for(
    conn: &mut SqliteConnection,
    event: &str,
    student: &str,
) -> QueryResult<Option<Registration>> {
    use schema::registrations::dsl::*;

    registrations
        .filter(event_id.eq(event))
        .filter(student_id.eq(student))
        .select(Registration::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn find_attendance(
    conn: &mut SqliteConnection,
    registration: &str,
) -> QueryResult<Option<Attendance>> {
    use schema::attendance::dsl::*;

    attendance
        .filter(registration_id.eq(registration))
        .select(Attendance::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn find_feedback(
    conn: &mut SqliteConnection,
    registration: &str,
) -> QueryResult<Option<Feedback>> {
    use schema::feedback::dsl::*;

    feedback
        .filter(registration_id.eq(registration))
        .select(Feedback::as_select())
        .first(conn)
        .optional()
}

pub(crate) fn registered_count(conn: &mut SqliteConnection, event: &str) -> QueryResult<i64> {
    use schema::registrations::dsl::*;

    registrations
        .filter(event_id.eq(event))
        .filter(status.eq(RegistrationStatus::Registered))
        .count()
        .get_result(conn)
}

/// Registered counts for every event that has at least one registration.
pub(crate) fn registered_counts(conn: &mut SqliteConnection) -> QueryResult<HashMap<String, i64>> {
    use schema::registrations::dsl::*;

    Ok(registrations
        .filter(status.eq(RegistrationStatus::Registered))
        .group_by(event_id)
        .select((event_id, diesel::dsl::count_star()))
        .load::<(String, i64)>(conn)?
        .into_iter()
        .collect())
}

/// Registered students of one event marked present.
pub(crate) fn present_count(conn: &mut SqliteConnection, event: &str) -> QueryResult<i64> {
    use schema::{attendance, registrations};

    attendance::table
        .inner_join(registrations::table)
        .filter(registrations::event_id.eq(event))
        .filter(registrations::status.eq(RegistrationStatus::Registered))
        .filter(attendance::present.eq(true))
        .count()
        .get_result(conn)
}

/// Per event, the number of registered students marked present.
pub(crate) fn present_counts(conn: &mut SqliteConnection) -> QueryResult<HashMap<String, i64>> {
    use schema::{attendance, registrations};

    Ok(attendance::table
        .inner_join(registrations::table)
        .filter(registrations::status.eq(RegistrationStatus::Registered))
        .filter(attendance::present.eq(true))
        .group_by(registrations::event_id)
        .select((registrations::event_id, diesel::dsl::count_star()))
        .load::<(String, i64)>(conn)?
        .into_iter()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let mut manager = EventManager::in_memory().unwrap();
        manager.migrate().unwrap();
        manager.migrate().unwrap();
        assert!(manager.list_colleges().unwrap().is_empty());
    }

    #[test]
    fn lookups_report_missing_entities() {
        use crate::error::Error;

        let mut manager = EventManager::in_memory().unwrap();
        assert!(matches!(
            manager.get_event("nope"),
            Err(Error::NotFound(Entity::Event))
        ));
        assert!(matches!(
            manager.get_registration("nope"),
            Err(Error::NotFound(Entity::Registration))
        ));
        assert!(matches!(
            manager.delete_student("nope"),
            Err(Error::NotFound(Entity::Student))
        ));
        assert_eq!(manager.find_student_by_email("nobody@x.com").unwrap(), None);
    }

    #[test]
    fn clock_can_be_pinned() {
        let pinned = chrono::NaiveDate::from_ymd_opt(2030, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let manager = EventManager::in_memory().unwrap().with_clock(move || pinned);
        assert_eq!(manager.now(), pinned);
    }
}
