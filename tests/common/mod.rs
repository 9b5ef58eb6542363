#![allow(dead_code)]

use campus_events::EventManager;
use campus_events::events::NewEventRequest;
use campus_events::models::{Event, EventType, Registration};
use campus_events::registration::RegistrationRequest;
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// The pinned "now" of every test manager.
pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 1, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

pub fn manager() -> EventManager {
    EventManager::in_memory().unwrap().with_clock(now)
}

pub fn event_request(college: &str, title: &str, capacity: i32) -> NewEventRequest {
    let start_time = now() + Duration::days(7);
    NewEventRequest {
        college_name: college.to_string(),
        title: title.to_string(),
        event_type: EventType::Workshop,
        description: None,
        start_time,
        end_time: start_time + Duration::hours(2),
        capacity: Some(capacity),
        status: None,
    }
}

/// A workshop a week from now.
pub fn event(manager: &mut EventManager, college: &str, title: &str, capacity: i32) -> Event {
    manager
        .create_event(&event_request(college, title, capacity))
        .unwrap()
}

/// Registers a brand-new student, named after the email's local part.
pub fn register_new(manager: &mut EventManager, event_id: &str, email: &str) -> Registration {
    let name = email.split('@').next().unwrap();
    manager
        .register(event_id, &RegistrationRequest::new_student(name, email))
        .unwrap()
}
