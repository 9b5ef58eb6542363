mod common;

use campus_events::attendance::{ADMIN_METHOD, DEFAULT_CHECK_IN_METHOD};
use campus_events::models::AttendanceStatus;
use campus_events::{Entity, Error, ErrorKind, EventManager};
use chrono::Duration;
use common::{event, manager, now, register_new};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

#[test]
fn checking_in_twice_returns_the_same_row() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);
    let registration = register_new(&mut manager, &workshop.id, "ann@x.com");

    let first = manager.check_in(&registration.id, Some("qr")).unwrap();
    let second = manager.check_in(&registration.id, None).unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.attendance, second.attendance);
    assert_eq!(second.attendance.method, "qr");
    assert!(second.attendance.present);
}

#[test]
fn check_in_defaults_to_manual() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);
    let registration = register_new(&mut manager, &workshop.id, "ann@x.com");

    let check_in = manager.check_in(&registration.id, Some("  ")).unwrap();
    assert_eq!(check_in.attendance.method, DEFAULT_CHECK_IN_METHOD);
}

#[test]
fn check_in_needs_a_registration() {
    let mut manager = manager();
    let err = manager.check_in("missing", None).unwrap_err();
    assert!(matches!(err, Error::NotFound(Entity::Registration)));
}

#[test]
fn marking_absent_updates_the_row_in_place() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);
    let registration = register_new(&mut manager, &workshop.id, "ann@x.com");

    assert_eq!(
        manager.attendance_status(&registration.id).unwrap(),
        AttendanceStatus::NotMarked
    );

    let present = manager.mark_attendance(&registration.id, true).unwrap();
    let absent = manager.mark_attendance(&registration.id, false).unwrap();

    assert_eq!(present.id, absent.id);
    assert!(!absent.present);
    assert_eq!(absent.method, ADMIN_METHOD);
    assert_eq!(
        manager.attendance_status(&registration.id).unwrap(),
        AttendanceStatus::Absent
    );

    // A later self check-in does not overwrite the administrator's decision.
    let check_in = manager.check_in(&registration.id, None).unwrap();
    assert!(!check_in.created);
    assert!(!check_in.attendance.present);
}

#[test]
fn admin_marks_refresh_the_check_in_time() {
    let minutes = Arc::new(AtomicI64::new(0));
    let clock = Arc::clone(&minutes);
    let mut manager = EventManager::in_memory()
        .unwrap()
        .with_clock(move || now() + Duration::minutes(clock.load(Ordering::SeqCst)));
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);
    let registration = register_new(&mut manager, &workshop.id, "ann@x.com");

    let present = manager.mark_attendance(&registration.id, true).unwrap();
    assert_eq!(present.checked_in_at, now());

    minutes.store(5, Ordering::SeqCst);
    let absent = manager.mark_attendance(&registration.id, false).unwrap();
    assert_eq!(present.id, absent.id);
    assert!(absent.checked_in_at > present.checked_in_at);
    assert_eq!(absent.checked_in_at, now() + Duration::minutes(5));
}

#[test]
fn event_details_count_only_present_rows() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);
    let ann = register_new(&mut manager, &workshop.id, "ann@x.com");
    let bob = register_new(&mut manager, &workshop.id, "bob@x.com");
    register_new(&mut manager, &workshop.id, "cy@x.com");

    manager.check_in(&ann.id, None).unwrap();
    manager.mark_attendance(&bob.id, false).unwrap();

    let details = manager.event_details(&workshop.id).unwrap();
    assert_eq!(details.summary.registrations_count, 3);
    assert_eq!(details.attendance_count, 1);
    assert_eq!(details.summary.available_spots, Some(7));

    let roster = manager.event_roster(&workshop.id).unwrap();
    let statuses: Vec<_> = roster
        .registrations
        .iter()
        .map(|entry| (entry.name.as_str(), entry.attendance_status))
        .collect();
    assert_eq!(
        statuses,
        [
            ("ann", AttendanceStatus::Present),
            ("bob", AttendanceStatus::Absent),
            ("cy", AttendanceStatus::NotMarked),
        ]
    );
}

#[test]
fn second_feedback_conflicts_and_keeps_the_first() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);
    let registration = register_new(&mut manager, &workshop.id, "ann@x.com");

    let first = manager
        .submit_feedback(&registration.id, 4, Some("  Good pace  "))
        .unwrap();
    assert_eq!(first.comment.as_deref(), Some("Good pace"));

    let err = manager
        .submit_feedback(&registration.id, 1, Some("changed my mind"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let Error::AlreadySubmitted(existing) = err else {
        panic!("expected AlreadySubmitted, got {err:?}");
    };
    assert_eq!(*existing, first);

    let status = manager.feedback_status(&registration.id).unwrap();
    assert!(status.has_feedback);
    assert_eq!(status.feedback, Some(first));
}

#[test]
fn rating_boundaries() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);

    for rating in [0, 6, -1] {
        let registration =
            register_new(&mut manager, &workshop.id, &format!("r{}@x.com", rating + 10));
        let err = manager
            .submit_feedback(&registration.id, rating, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "rating {rating}");
        assert!(!manager.feedback_status(&registration.id).unwrap().has_feedback);
    }

    for rating in [1, 5] {
        let registration =
            register_new(&mut manager, &workshop.id, &format!("ok{rating}@x.com"));
        let feedback = manager.submit_feedback(&registration.id, rating, None).unwrap();
        assert_eq!(feedback.rating, rating);
    }
}

#[test]
fn feedback_needs_a_registration() {
    let mut manager = manager();
    let err = manager.submit_feedback("missing", 3, None).unwrap_err();
    assert!(matches!(err, Error::NotFound(Entity::Registration)));

    let status = manager.feedback_status("missing").unwrap();
    assert!(!status.has_feedback);
}

#[test]
fn deleting_an_event_cascades() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);
    let registration = register_new(&mut manager, &workshop.id, "ann@x.com");
    manager.check_in(&registration.id, None).unwrap();
    manager.submit_feedback(&registration.id, 5, None).unwrap();

    manager.delete_event(&workshop.id).unwrap();

    assert!(matches!(
        manager.get_registration(&registration.id),
        Err(Error::NotFound(Entity::Registration))
    ));
    assert_eq!(manager.attendance_of_registration(&registration.id).unwrap(), None);
    assert_eq!(manager.feedback_of_registration(&registration.id).unwrap(), None);
    // The student outlives the event.
    assert!(manager.get_student(&registration.student_id).is_ok());
}

#[test]
fn deleting_a_college_removes_its_students_and_events() {
    let mut manager = manager();
    let workshop = event(&mut manager, "Northfield", "Rust 101", 10);
    let registration = register_new(&mut manager, &workshop.id, "ann@x.com");

    manager.delete_college(&workshop.college_id).unwrap();

    assert!(manager.get_event(&workshop.id).is_err());
    assert!(manager.get_student(&registration.student_id).is_err());
    assert!(manager.list_colleges().unwrap().is_empty());
}
