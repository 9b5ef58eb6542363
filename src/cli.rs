//! This module contains the command-line interface [`Cli`] parser for the campus events backend,
//! and [`dispatch`], which runs a parsed [`Command`] against an [`EventManager`].

use crate::auth::authorize;
use crate::display::{
    ActiveStudentLine, AttendanceLine, CollegeLine, CommentLine, EventLine,
    EventRegistrationsLine, FeedbackLine, FilteredEventLine, OutputFormat, ParticipationLine,
    PopularityLine, RegistrationLine, Reply, RosterLine,
};
use crate::error::Result;
use crate::events::{DEFAULT_PAGE_SIZE, EventQuery, NewEventRequest, Page};
use crate::manager::EventManager;
use crate::models::{EventChanges, EventStatus, EventType};
use crate::registration::RegistrationRequest;
use crate::settings::Settings;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

/// The command line configuration struct, where the command-line interface parser is automatically
/// derived by [`clap::Parser`].
#[derive(Parser, Debug)]
#[command(name = "campus-events", version, about)]
pub struct Cli {
    /// How listings are printed. Other results are always JSON.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    /// SQLite database to use instead of the configured one.
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Browse scheduled events.
    #[command(subcommand)]
    Events(EventsCommand),

    /// Register a student for an event.
    Register(RegisterArgs),

    /// Check in to an event with a registration.
    CheckIn {
        registration_id: String,
        /// How the check-in happened, e.g. `qr` or `manual`.
        #[arg(long)]
        method: Option<String>,
    },

    /// Rate an event once, from 1 to 5, with an optional comment.
    Feedback {
        registration_id: String,
        #[arg(long)]
        rating: i32,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Show whether feedback was already given for a registration.
    FeedbackStatus { registration_id: String },

    /// Find the registrations of a student by email.
    Search {
        #[arg(long)]
        email: String,
    },

    /// Show a registration with its student and event.
    Details { registration_id: String },

    /// List all colleges.
    Colleges,

    /// Administrative commands; these require the admin token.
    Admin(AdminArgs),

    /// Aggregate reports.
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand, Debug)]
pub enum EventsCommand {
    /// List events, soonest first.
    List(ListArgs),

    /// Show one event with its registration and attendance counts.
    Show { event_id: String },
}

/// Filters shared by the event listings and the filter report.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[arg(long)]
    pub college_id: Option<String>,

    #[arg(long = "type", value_enum)]
    pub event_type: Option<EventType>,

    /// Earliest start time, e.g. `2025-03-01` or `2025-03-01T09:00:00`.
    #[arg(long, value_parser = parse_time)]
    pub from: Option<NaiveDateTime>,

    /// Latest start time.
    #[arg(long, value_parser = parse_time)]
    pub to: Option<NaiveDateTime>,

    /// Text to look for in titles and descriptions.
    #[arg(long)]
    pub q: Option<String>,

    #[arg(long, value_enum)]
    pub status: Option<EventStatus>,

    #[arg(long, default_value_t = 1)]
    pub page: i64,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub limit: i64,
}

impl ListArgs {
    pub fn query(&self) -> EventQuery {
        EventQuery {
            college_id: self.college_id.clone(),
            event_type: self.event_type,
            from: self.from,
            to: self.to,
            q: self.q.clone(),
            status: self.status,
            page: Page::new(self.page, self.limit),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RegisterArgs {
    pub event_id: String,

    /// An existing student, or `new` (the default) to create one from the details below.
    #[arg(long)]
    pub student_id: Option<String>,

    #[arg(long)]
    pub roll_no: Option<String>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,
}

impl RegisterArgs {
    pub fn request(&self) -> RegistrationRequest {
        RegistrationRequest {
            student_id: self.student_id.clone(),
            roll_no: self.roll_no.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct AdminArgs {
    #[arg(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    #[command(subcommand)]
    pub command: AdminCommand,
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
    /// Create an event, creating its college on first use.
    CreateEvent(CreateEventArgs),

    /// Change some fields of an event.
    UpdateEvent(UpdateEventArgs),

    /// Cancel an event. Registrations are kept.
    CancelEvent { event_id: String },

    /// Permanently delete an event with its registrations.
    DeleteEvent { event_id: String },

    /// List events of every status, newest first.
    ListEvents(ListArgs),

    /// Show one event with its counts.
    ShowEvent { event_id: String },

    /// The attendance sheet of an event.
    Registrations { event_id: String },

    /// Mark a registration present or absent.
    Mark(MarkArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CreateEventArgs {
    #[arg(long)]
    pub college_name: String,

    #[arg(long)]
    pub title: String,

    #[arg(long = "type", value_enum)]
    pub event_type: EventType,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_time)]
    pub start: NaiveDateTime,

    #[arg(long, value_parser = parse_time)]
    pub end: NaiveDateTime,

    /// Seats available; 0 for unlimited. Defaults to 100.
    #[arg(long)]
    pub capacity: Option<i32>,

    #[arg(long, value_enum)]
    pub status: Option<EventStatus>,
}

impl CreateEventArgs {
    pub fn request(&self) -> NewEventRequest {
        NewEventRequest {
            college_name: self.college_name.clone(),
            title: self.title.clone(),
            event_type: self.event_type,
            description: self.description.clone(),
            start_time: self.start,
            end_time: self.end,
            capacity: self.capacity,
            status: self.status,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct UpdateEventArgs {
    pub event_id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long = "type", value_enum)]
    pub event_type: Option<EventType>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_time)]
    pub start: Option<NaiveDateTime>,

    #[arg(long, value_parser = parse_time)]
    pub end: Option<NaiveDateTime>,

    #[arg(long)]
    pub capacity: Option<i32>,

    #[arg(long, value_enum)]
    pub status: Option<EventStatus>,
}

impl UpdateEventArgs {
    pub fn changes(&self) -> EventChanges {
        EventChanges {
            title: self.title.clone(),
            event_type: self.event_type,
            description: self.description.clone(),
            start_time: self.start,
            end_time: self.end,
            capacity: self.capacity,
            status: self.status,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct MarkArgs {
    pub registration_id: String,

    #[command(flatten)]
    pub state: MarkState,
}

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct MarkState {
    #[arg(long)]
    pub present: bool,

    #[arg(long)]
    pub absent: bool,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Events ranked by registrations.
    Popularity {
        #[arg(long)]
        college_id: Option<String>,
        #[arg(long = "type", value_enum)]
        event_type: Option<EventType>,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Attendance percentages, for every event or a single one.
    Attendance {
        #[arg(long, conflicts_with = "college_id")]
        event_id: Option<String>,
        #[arg(long)]
        college_id: Option<String>,
    },

    /// Average ratings, for every event or a single one with its comments.
    Feedback {
        #[arg(long, conflicts_with = "college_id")]
        event_id: Option<String>,
        #[arg(long)]
        college_id: Option<String>,
    },

    /// What one student registered for and attended.
    Participation {
        student_id: String,
        #[arg(long)]
        college_id: Option<String>,
    },

    /// Students with the most attendance records.
    TopActive {
        #[arg(long)]
        college_id: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Registration totals per event.
    RegistrationsPerEvent {
        #[arg(long)]
        college_id: Option<String>,
        /// Defaults to scheduled events.
        #[arg(long, value_enum)]
        status: Option<EventStatus>,
    },

    /// Filtered, paged events with registration and attendance figures.
    Filter(ListArgs),
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` and `YYYY-MM-DDTHH:MM[:SS]`.
pub fn parse_time(value: &str) -> std::result::Result<NaiveDateTime, String> {
    let value = value.trim();
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(time) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(time);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("invalid date or time `{value}`"))
}

/// Runs one command. Admin commands are authorised against `settings` before touching the
/// database.
pub fn dispatch(
    manager: &mut EventManager,
    command: &Command,
    settings: &Settings,
) -> Result<Reply> {
    match command {
        Command::Events(EventsCommand::List(args)) => {
            let events = manager.list_events(&args.query())?;
            Ok(Reply::listing(
                json!({ "events": events }),
                events.iter().map(EventLine::from),
            ))
        }
        Command::Events(EventsCommand::Show { event_id }) => {
            let event = manager.event_details(event_id)?;
            Ok(Reply::json(json!({ "event": event })))
        }
        Command::Register(args) => {
            let registration = manager.register(&args.event_id, &args.request())?;
            Ok(Reply::json(json!({
                "message": "Successfully registered for event",
                "registration": registration,
            })))
        }
        Command::CheckIn {
            registration_id,
            method,
        } => {
            let check_in = manager.check_in(registration_id, method.as_deref())?;
            let message = if check_in.created {
                "Checked in successfully"
            } else {
                "Already checked in"
            };
            Ok(Reply::json(json!({
                "message": message,
                "attendance": check_in.attendance,
            })))
        }
        Command::Feedback {
            registration_id,
            rating,
            comment,
        } => {
            let feedback = manager.submit_feedback(registration_id, *rating, comment.as_deref())?;
            Ok(Reply::json(json!({
                "message": "Feedback submitted successfully",
                "feedback": feedback,
            })))
        }
        Command::FeedbackStatus { registration_id } => {
            let status = manager.feedback_status(registration_id)?;
            Ok(Reply::json(json!(status)))
        }
        Command::Search { email } => {
            let registrations = manager.search_registrations(email)?;
            Ok(Reply::listing(
                json!({ "registrations": registrations }),
                registrations.iter().map(RegistrationLine::from),
            ))
        }
        Command::Details { registration_id } => {
            let details = manager.registration_details(registration_id)?;
            Ok(Reply::json(json!({ "registration": details })))
        }
        Command::Colleges => {
            let colleges = manager.list_colleges()?;
            Ok(Reply::listing(
                json!({ "colleges": colleges }),
                colleges.iter().map(CollegeLine::from),
            ))
        }
        Command::Admin(args) => {
            authorize(args.admin_token.as_deref(), settings.admin_token.as_deref())?;
            dispatch_admin(manager, &args.command)
        }
        Command::Report(report) => dispatch_report(manager, report),
    }
}

fn dispatch_admin(manager: &mut EventManager, command: &AdminCommand) -> Result<Reply> {
    match command {
        AdminCommand::CreateEvent(args) => {
            let event = manager.create_event(&args.request())?;
            Ok(Reply::json(json!({
                "message": "Event created successfully",
                "event": event,
            })))
        }
        AdminCommand::UpdateEvent(args) => {
            let event = manager.update_event(&args.event_id, &args.changes())?;
            Ok(Reply::json(json!({
                "message": "Event updated successfully",
                "event": event,
            })))
        }
        AdminCommand::CancelEvent { event_id } => {
            let event = manager.cancel_event(event_id)?;
            Ok(Reply::json(json!({
                "message": "Event cancelled successfully",
                "event": event,
            })))
        }
        AdminCommand::DeleteEvent { event_id } => {
            let event = manager.delete_event(event_id)?;
            Ok(Reply::json(json!({
                "message": "Event deleted",
                "event": event,
            })))
        }
        AdminCommand::ListEvents(args) => {
            let events = manager.admin_list_events(&args.query())?;
            Ok(Reply::listing(
                json!({ "events": events }),
                events.iter().map(EventLine::from),
            ))
        }
        AdminCommand::ShowEvent { event_id } => {
            let event = manager.event_details(event_id)?;
            Ok(Reply::json(json!({ "event": event })))
        }
        AdminCommand::Registrations { event_id } => {
            let roster = manager.event_roster(event_id)?;
            Ok(Reply::listing(
                json!(roster),
                roster.registrations.iter().map(RosterLine::from),
            ))
        }
        AdminCommand::Mark(args) => {
            let attendance = manager.mark_attendance(&args.registration_id, args.state.present)?;
            Ok(Reply::json(json!({
                "message": "Attendance updated",
                "attendance": attendance,
            })))
        }
    }
}

fn dispatch_report(manager: &mut EventManager, report: &ReportCommand) -> Result<Reply> {
    match report {
        ReportCommand::Popularity {
            college_id,
            event_type,
            limit,
        } => {
            let events = manager.popularity(college_id.as_deref(), *event_type, *limit)?;
            Ok(Reply::listing(
                json!({ "events": events }),
                events.iter().map(PopularityLine::from),
            ))
        }
        ReportCommand::Attendance {
            event_id: Some(event_id),
            ..
        } => {
            let event = manager.event_attendance(event_id)?;
            Ok(Reply::listing(
                json!({ "event": event }),
                [AttendanceLine::from(&event)],
            ))
        }
        ReportCommand::Attendance { college_id, .. } => {
            let events = manager.attendance_report(college_id.as_deref())?;
            Ok(Reply::listing(
                json!({ "events": events }),
                events.iter().map(AttendanceLine::from),
            ))
        }
        ReportCommand::Feedback {
            event_id: Some(event_id),
            ..
        } => {
            let event = manager.event_feedback(event_id)?;
            Ok(Reply::listing(
                json!({ "event": event }),
                event.feedback_details.iter().map(CommentLine::from),
            ))
        }
        ReportCommand::Feedback { college_id, .. } => {
            let events = manager.feedback_report(college_id.as_deref())?;
            Ok(Reply::listing(
                json!({ "events": events }),
                events.iter().map(FeedbackLine::from),
            ))
        }
        ReportCommand::Participation {
            student_id,
            college_id,
        } => {
            let student = manager.student_participation(student_id, college_id.as_deref())?;
            Ok(Reply::listing(
                json!({ "student": student }),
                student.events.iter().map(ParticipationLine::from),
            ))
        }
        ReportCommand::TopActive { college_id, limit } => {
            let students = manager.top_active(college_id.as_deref(), *limit)?;
            Ok(Reply::listing(
                json!({ "students": students }),
                students.iter().map(ActiveStudentLine::from),
            ))
        }
        ReportCommand::RegistrationsPerEvent { college_id, status } => {
            let events = manager.registrations_per_event(college_id.as_deref(), *status)?;
            Ok(Reply::listing(
                json!({ "events": events }),
                events.iter().map(EventRegistrationsLine::from),
            ))
        }
        ReportCommand::Filter(args) => {
            let report = manager.event_filter_report(&args.query())?;
            Ok(Reply::listing(
                json!(report),
                report.events.iter().map(FilteredEventLine::from),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn times_parse_in_several_shapes() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_time("2025-03-01T09:30:00"), Ok(expected));
        assert_eq!(parse_time("2025-03-01 09:30"), Ok(expected));
        assert_eq!(
            parse_time("2025-03-01"),
            Ok(expected.date().and_hms_opt(0, 0, 0).unwrap())
        );
        assert!(parse_time("March 1st").is_err());
    }

    #[test]
    fn mark_needs_exactly_one_state() {
        let parse = |args: &[&str]| Cli::try_parse_from(args);
        assert!(parse(&["campus-events", "admin", "mark", "r1"]).is_err());
        assert!(parse(&["campus-events", "admin", "mark", "r1", "--present", "--absent"]).is_err());

        let cli = parse(&["campus-events", "admin", "mark", "r1", "--absent"]).unwrap();
        let Command::Admin(AdminArgs {
            command: AdminCommand::Mark(args),
            ..
        }) = cli.command
        else {
            panic!("expected admin mark");
        };
        assert!(!args.state.present);
    }

    #[test]
    fn admin_commands_need_the_token() {
        let mut manager = EventManager::in_memory().unwrap();
        let settings = Settings {
            admin_token: Some("s3cret".to_string()),
            ..Settings::default()
        };

        // ADMIN_TOKEN may be set in the environment, so drop whatever clap picked up.
        let mut cli = Cli::try_parse_from(["campus-events", "admin", "list-events"]).unwrap();
        let Command::Admin(args) = &mut cli.command else {
            panic!("expected an admin command");
        };
        args.admin_token = None;
        let err = dispatch(&mut manager, &cli.command, &settings).unwrap_err();
        assert_eq!(err.kind().status_code(), 401);

        let cli = Cli::try_parse_from([
            "campus-events",
            "admin",
            "--admin-token",
            "guess",
            "list-events",
        ])
        .unwrap();
        let err = dispatch(&mut manager, &cli.command, &settings).unwrap_err();
        assert_eq!(err.kind().status_code(), 403);

        let cli = Cli::try_parse_from([
            "campus-events",
            "admin",
            "--admin-token",
            "s3cret",
            "list-events",
        ])
        .unwrap();
        assert!(dispatch(&mut manager, &cli.command, &settings).is_ok());
    }
}
