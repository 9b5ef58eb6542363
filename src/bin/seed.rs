use anyhow::Context;
use campus_events::create_default_manager;
use campus_events::events::NewEventRequest;
use campus_events::models::{EventType, Registration};
use campus_events::registration::RegistrationRequest;
use chrono::{Duration, Utc};

static COLLEGES: [&str; 2] = ["Northfield Institute of Technology", "Riverside College of Arts"];

static STUDENTS: [&str; 10] = [
    "Aarav Shah",
    "Bea Lindqvist",
    "Chidi Okafor",
    "Dana Moreau",
    "Emil Novak",
    "Farah Haddad",
    "Goro Tanaka",
    "Hana Kim",
    "Ivan Petrov",
    "Julia Costa",
];

static EVENTS: [(&str, EventType, i32); 4] = [
    ("Intro to Rust Workshop", EventType::Workshop, 30),
    ("Spring Hackathon", EventType::Hackathon, 0),
    ("Careers in Research Seminar", EventType::Seminar, 50),
    ("Annual Cultural Fest", EventType::Fest, 200),
];

static COMMENTS: [Option<&str>; 4] = [
    Some("Well organised, would attend again."),
    None,
    Some("Too short, wanted more hands-on time."),
    Some("Great speakers."),
];

/// Fills an empty database with two colleges, twenty students and eight upcoming events, with
/// registrations, check-ins and feedback spread across them.
pub fn main() -> anyhow::Result<()> {
    let (mut manager, settings) = create_default_manager()?;

    if !manager.list_colleges()?.is_empty() {
        println!("{} already has data; not seeding.", settings.database_url);
        return Ok(());
    }

    let today = Utc::now().naive_utc();
    let mut registrations: Vec<Registration> = Vec::new();

    for (c, college) in COLLEGES.iter().enumerate() {
        let mut event_ids = Vec::new();
        for (e, (title, event_type, capacity)) in EVENTS.iter().enumerate() {
            let start_time = today + Duration::days(7 * (e as i64 + 1) + c as i64);
            let event = manager.create_event(&NewEventRequest {
                college_name: college.to_string(),
                title: title.to_string(),
                event_type: *event_type,
                description: Some(format!("{title} hosted by {college}.")),
                start_time,
                end_time: start_time + Duration::hours(3),
                capacity: Some(*capacity),
                status: None,
            })?;
            event_ids.push(event.id);
        }

        for (s, name) in STUDENTS.iter().enumerate() {
            let email = format!(
                "{}.{}@campus{}.edu",
                name.split_whitespace().next().unwrap_or("student").to_lowercase(),
                s,
                c + 1
            );
            let first = manager
                .register(
                    &event_ids[s % event_ids.len()],
                    &RegistrationRequest::new_student(*name, email)
                        .with_roll_no(format!("C{}-{:03}", c + 1, s + 1)),
                )
                .with_context(|| format!("registering {name}"))?;

            // Everyone also joins the fest; every other student a second event.
            let mut extra = vec![event_ids[3].clone()];
            if s % 2 == 0 {
                extra.push(event_ids[(s / 2 + 1) % 3].clone());
            }

            let student_id = first.student_id.clone();
            registrations.push(first);
            for event_id in extra {
                match manager.register(&event_id, &RegistrationRequest::existing(&student_id)) {
                    Ok(registration) => registrations.push(registration),
                    Err(campus_events::Error::AlreadyRegistered(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }

    let mut checked_in = 0;
    let mut rated = 0;
    for (i, registration) in registrations.iter().enumerate() {
        match i % 4 {
            0 | 1 => {
                manager.check_in(&registration.id, Some("qr"))?;
                checked_in += 1;
            }
            2 => {
                manager.mark_attendance(&registration.id, false)?;
            }
            _ => continue,
        }

        if i % 3 == 0 {
            manager.submit_feedback(&registration.id, (i % 5) as i32 + 1, COMMENTS[i % 4])?;
            rated += 1;
        }
    }

    tracing::info!(
        registrations = registrations.len(),
        checked_in,
        rated,
        "seeded demo data"
    );
    println!(
        "Seeded {} colleges, {} students, {} events and {} registrations into {}",
        COLLEGES.len(),
        COLLEGES.len() * STUDENTS.len(),
        COLLEGES.len() * EVENTS.len(),
        registrations.len(),
        settings.database_url
    );

    Ok(())
}
