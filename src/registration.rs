//! Registering students for events.
//!
//! A registration is accepted only while the event is scheduled, has not started, and (for
//! limited events) has a free seat. The whole decision runs in one immediate transaction: the
//! capacity count and the insert that depends on it cannot interleave with another writer, and
//! a student created for a registration that is then rejected is rolled back with it.

use crate::error::{Entity, Error, OptionalExt, Result, is_unique_violation};
use crate::manager::{
    EventManager, find_event, find_registration_for, find_student, find_student_by_email,
    new_id, registered_count,
};
use crate::models::{EventStatus, Registration, RegistrationStatus, Student};
use crate::schema;
use crate::validation::{Contact, validate_contact};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Deserialize;

/// Sentinel `student_id` asking for a new student to be created.
pub const NEW_STUDENT: &str = "new";

/// Who is registering. Either an existing `student_id`, or contact details for a new student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegistrationRequest {
    pub student_id: Option<String>,
    pub roll_no: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl RegistrationRequest {
    /// Registers an already known student.
    pub fn existing(student_id: impl Into<String>) -> Self {
        Self {
            student_id: Some(student_id.into()),
            ..Self::default()
        }
    }

    /// Registers a new student with the given name and email.
    pub fn new_student(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            student_id: Some(NEW_STUDENT.to_string()),
            name: Some(name.into()),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_roll_no(mut self, roll_no: impl Into<String>) -> Self {
        self.roll_no = Some(roll_no.into());
        self
    }

    /// The referenced student, unless the request asks for a new one (absent, empty or `"new"`).
    pub fn existing_student_id(&self) -> Option<&str> {
        self.student_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != NEW_STUDENT)
    }

    fn contact(&self) -> Contact<'_> {
        Contact {
            roll_no: self.roll_no.as_deref(),
            name: self.name.as_deref(),
            email: self.email.as_deref(),
            phone: self.phone.as_deref(),
        }
    }
}

impl EventManager {
    /// Registers a student for an event.
    ///
    /// Fails with [`Error::NotFound`] for an unknown event or student id,
    /// [`Error::EventCancelled`], [`Error::RegistrationClosed`] once the event has started,
    /// [`Error::DuplicateEmail`] when a new student's email is taken,
    /// [`Error::AlreadyRegistered`] (carrying the existing registration) and
    /// [`Error::EventFull`].
    pub fn register(
        &mut self,
        event_id: &str,
        request: &RegistrationRequest,
    ) -> Result<Registration> {
        let now = self.now();

        let result = self
            .db()
            .immediate_transaction(|conn| register_in(conn, event_id, request, now));

        match &result {
            Ok(registration) => tracing::info!(
                registration_id = %registration.id,
                event_id,
                student_id = %registration.student_id,
                "registered student for event"
            ),
            Err(err) => tracing::warn!(event_id, error = %err, "registration rejected"),
        }

        result
    }
}

fn register_in(
    conn: &mut SqliteConnection,
    event_id: &str,
    request: &RegistrationRequest,
    now: NaiveDateTime,
) -> Result<Registration> {
    let existing_student = request.existing_student_id();
    validate_contact(&request.contact(), existing_student.is_none())?;

    let event = find_event(conn, event_id)?.found(Entity::Event)?;

    if event.status == EventStatus::Cancelled {
        return Err(Error::EventCancelled);
    }
    if now >= event.start_time {
        return Err(Error::RegistrationClosed);
    }

    let student_id = match existing_student {
        Some(student_id) => find_student(conn, student_id)?.found(Entity::Student)?.id,
        None => create_student(conn, &event.college_id, request, now)?.id,
    };

    // A student already holding a seat is told so, even when the event has since filled up.
    if let Some(existing) = find_registration_for(conn, &event.id, &student_id)? {
        return Err(Error::AlreadyRegistered(Box::new(existing)));
    }

    if !event.is_unlimited() && event.is_full(registered_count(conn, &event.id)?) {
        return Err(Error::EventFull);
    }

    let registration = Registration {
        id: new_id(),
        event_id: event.id.clone(),
        student_id,
        registered_at: now,
        status: RegistrationStatus::Registered,
    };

    match diesel::insert_into(schema::registrations::table)
        .values(&registration)
        .execute(conn)
    {
        Ok(_) => Ok(registration),
        Err(err) if is_unique_violation(&err) => {
            match find_registration_for(conn, &registration.event_id, &registration.student_id)? {
                Some(existing) => Err(Error::AlreadyRegistered(Box::new(existing))),
                None => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Creates the student a registration asks for, in the event's college.
fn create_student(
    conn: &mut SqliteConnection,
    college_id: &str,
    request: &RegistrationRequest,
    now: NaiveDateTime,
) -> Result<Student> {
    let (Some(name), Some(email)) = (request.name.as_deref(), request.email.as_deref()) else {
        return Err(Error::Validation(vec![
            "name: Name and email are required for new students".to_string(),
        ]));
    };
    let email = email.trim();

    if find_student_by_email(conn, email)?.is_some() {
        return Err(Error::DuplicateEmail);
    }

    let student = Student {
        id: new_id(),
        college_id: college_id.to_string(),
        roll_no: request.roll_no.as_deref().map(str::trim).map(str::to_string),
        name: name.trim().to_string(),
        email: email.to_string(),
        phone: request.phone.as_deref().map(str::trim).map(str::to_string),
        created_at: now,
    };

    match diesel::insert_into(schema::students::table)
        .values(&student)
        .execute(conn)
    {
        Ok(_) => {
            tracing::debug!(student_id = %student.id, college_id, "created student");
            Ok(student)
        }
        Err(err) if is_unique_violation(&err) => Err(Error::DuplicateEmail),
        Err(err) => Err(err.into()),
    }
}
