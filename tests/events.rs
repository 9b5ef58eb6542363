mod common;

use campus_events::ErrorKind;
use campus_events::events::{DEFAULT_CAPACITY, EventQuery, Page};
use campus_events::models::{EventChanges, EventStatus, EventType};
use chrono::Duration;
use common::{event, event_request, manager, now, register_new};

#[test]
fn end_must_follow_start() {
    let mut manager = manager();

    let mut request = event_request("Northfield", "Backwards", 10);
    request.end_time = request.start_time;
    let err = manager.create_event(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(manager.list_colleges().unwrap().is_empty());

    let workshop = event(&mut manager, "Northfield", "Forwards", 10);
    let changes = EventChanges {
        end_time: Some(workshop.start_time - Duration::minutes(1)),
        ..EventChanges::default()
    };
    let err = manager.update_event(&workshop.id, &changes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(manager.get_event(&workshop.id).unwrap(), workshop);
}

#[test]
fn updated_titles_are_trimmed() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);

    let changes = EventChanges {
        title: Some("  Rust 201  ".to_string()),
        ..EventChanges::default()
    };
    let updated = manager.update_event(&workshop.id, &changes).unwrap();
    assert_eq!(updated.title, "Rust 201");
    assert_eq!(manager.get_event(&workshop.id).unwrap().title, "Rust 201");

    let blank = EventChanges {
        title: Some("   ".to_string()),
        ..EventChanges::default()
    };
    let err = manager.update_event(&workshop.id, &blank).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(manager.get_event(&workshop.id).unwrap().title, "Rust 201");
}

#[test]
fn colleges_are_created_once_by_name() {
    let mut manager = manager();
    let first = event(&mut manager, "Northfield", "Rust 101", 10);
    let second = event(&mut manager, "Northfield", "Rust 102", 10);
    event(&mut manager, "Riverside", "Poetry Slam", 10);

    assert_eq!(first.college_id, second.college_id);
    let names: Vec<_> = manager
        .list_colleges()
        .unwrap()
        .into_iter()
        .map(|college| college.name)
        .collect();
    assert_eq!(names, ["Northfield", "Riverside"]);
}

#[test]
fn capacity_defaults_when_omitted() {
    let mut manager = manager();
    let mut request = event_request("Northfield", "Default Seats", 0);
    request.capacity = None;
    let created = manager.create_event(&request).unwrap();
    assert_eq!(created.capacity, DEFAULT_CAPACITY);
    assert_eq!(created.status, EventStatus::Scheduled);
}

#[test]
fn public_listing_hides_cancelled_events_and_filters() {
    let mut manager = manager();
    let rust = event(&mut manager, "Northfield", "Rust 101", 10);
    let cancelled = event(&mut manager, "Northfield", "Cancelled Talk", 10);
    let mut request = event_request("Riverside", "Poetry Slam", 10);
    request.event_type = EventType::Fest;
    request.description = Some("Bring your own rust-free verses".to_string());
    request.start_time = now() + Duration::days(1);
    request.end_time = request.start_time + Duration::hours(1);
    let poetry = manager.create_event(&request).unwrap();
    manager.cancel_event(&cancelled.id).unwrap();

    let titles = |events: Vec<campus_events::events::EventSummary>| -> Vec<String> {
        events.into_iter().map(|summary| summary.event.title).collect()
    };

    let all = manager.list_events(&EventQuery::default()).unwrap();
    assert_eq!(titles(all), ["Poetry Slam", "Rust 101"]);

    let query = EventQuery {
        q: Some("rust".to_string()),
        ..EventQuery::default()
    };
    assert_eq!(
        titles(manager.list_events(&query).unwrap()),
        ["Poetry Slam", "Rust 101"]
    );

    let query = EventQuery {
        college_id: Some(rust.college_id.clone()),
        ..EventQuery::default()
    };
    assert_eq!(titles(manager.list_events(&query).unwrap()), ["Rust 101"]);

    let query = EventQuery {
        event_type: Some(EventType::Fest),
        ..EventQuery::default()
    };
    assert_eq!(titles(manager.list_events(&query).unwrap()), ["Poetry Slam"]);

    let query = EventQuery {
        from: Some(poetry.start_time + Duration::hours(1)),
        ..EventQuery::default()
    };
    assert_eq!(titles(manager.list_events(&query).unwrap()), ["Rust 101"]);

    let query = EventQuery {
        status: Some(EventStatus::Cancelled),
        ..EventQuery::default()
    };
    assert_eq!(titles(manager.list_events(&query).unwrap()), ["Cancelled Talk"]);

    let query = EventQuery {
        page: Page::new(2, 1),
        ..EventQuery::default()
    };
    assert_eq!(titles(manager.list_events(&query).unwrap()), ["Rust 101"]);

    assert_eq!(manager.admin_list_events(&EventQuery::default()).unwrap().len(), 3);
}

#[test]
fn listings_carry_availability() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 2);
    register_new(&mut manager, &workshop.id, "ann@x.com");
    register_new(&mut manager, &workshop.id, "bob@x.com");

    let listed = manager.list_events(&EventQuery::default()).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].college_name.as_deref(), Some("Northfield"));
    assert_eq!(listed[0].registrations_count, 2);
    assert_eq!(listed[0].available_spots, Some(0));
    assert!(listed[0].is_full);
}

#[test]
fn pages_are_clamped() {
    assert_eq!(Page::new(0, 0), Page { page: 1, limit: 1 });
    assert_eq!(Page::new(3, 1_000), Page { page: 3, limit: 100 });
    assert_eq!(Page::new(3, 20).offset(), 40);
}

#[test]
fn registrations_are_found_by_email() {
    let mut manager = manager();
    let first = event(&mut manager, "Northfield", "Rust 101", 10);
    let mut request = event_request("Northfield", "Rust 201", 10);
    request.start_time += Duration::days(7);
    request.end_time += Duration::days(7);
    let second = manager.create_event(&request).unwrap();

    let registration = register_new(&mut manager, &first.id, "ann@x.com");
    manager
        .register(
            &second.id,
            &campus_events::registration::RegistrationRequest::existing(&registration.student_id),
        )
        .unwrap();

    let hits = manager.search_registrations(" ann@x.com ").unwrap();
    let titles: Vec<_> = hits.iter().map(|hit| hit.event_title.as_str()).collect();
    assert_eq!(titles, ["Rust 201", "Rust 101"]);

    let err = manager.search_registrations("  ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let details = manager.registration_details(&registration.id).unwrap();
    assert_eq!(details.email, "ann@x.com");
    assert_eq!(details.event.id, first.id);
    assert_eq!(details.college_name, "Northfield");
}
