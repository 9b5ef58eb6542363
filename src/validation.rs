//! Field-level input checks. Every check records `field: message` and all failures of one
//! request are reported together.

use crate::error::{Error, Result};
use crate::models::Event;

pub const NAME_LEN: (usize, usize) = (2, 100);
pub const COLLEGE_NAME_LEN: (usize, usize) = (2, 255);
pub const TITLE_LEN: (usize, usize) = (3, 200);
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_ROLL_NO_LEN: usize = 50;
pub const MAX_COMMENT_LEN: usize = 500;
pub const MAX_CAPACITY: i32 = 1000;
pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

/// Collects failures across several fields.
#[derive(Debug, Default)]
pub struct Checks {
    details: Vec<String>,
}

impl Checks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &str, message: &str) {
        self.details.push(format!("{field}: {message}"));
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.fail(field, message);
        }
        self
    }

    /// Checks the length in characters of a required field.
    pub fn length(&mut self, field: &str, value: &str, (min, max): (usize, usize)) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min {
            self.fail(field, &format!("must be at least {min} characters long"));
        } else if len > max {
            self.fail(field, &format!("cannot exceed {max} characters"));
        }
        self
    }

    pub fn max_length(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if value.is_some_and(|value| value.chars().count() > max) {
            self.fail(field, &format!("cannot exceed {max} characters"));
        }
        self
    }

    pub fn finish(&mut self) -> Result<()> {
        if self.details.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(std::mem::take(&mut self.details)))
        }
    }
}

/// A loose address check: one `@`, a non-empty local part, and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// 10 to 15 characters of digits, `+`, `-`, spaces or parentheses.
pub fn is_valid_phone(phone: &str) -> bool {
    let len = phone.chars().count();
    (10..=15).contains(&len)
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}

/// Contact details supplied with a registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Contact<'a> {
    pub roll_no: Option<&'a str>,
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
}

/// Checks contact details. Name and email are required only when a new student is created.
pub fn validate_contact(contact: &Contact<'_>, new_student: bool) -> Result<()> {
    let mut checks = Checks::new();

    match contact.name {
        Some(name) => {
            checks.length("name", name, NAME_LEN);
        }
        None if new_student => checks.fail("name", "Name is required for new student registration"),
        None => {}
    }

    match contact.email {
        Some(email) => {
            checks.check(
                is_valid_email(email),
                "email",
                "Please provide a valid email address",
            );
        }
        None if new_student => {
            checks.fail("email", "Email is required for new student registration")
        }
        None => {}
    }

    if let Some(phone) = contact.phone {
        checks.check(
            is_valid_phone(phone),
            "phone",
            "Please provide a valid phone number",
        );
    }

    checks
        .max_length("roll_no", contact.roll_no, MAX_ROLL_NO_LEN)
        .finish()
}

pub fn validate_feedback(rating: i32, comment: Option<&str>) -> Result<()> {
    Checks::new()
        .check(
            RATING_RANGE.contains(&rating),
            "rating",
            "Rating must be between 1 and 5",
        )
        .max_length("comment", comment, MAX_COMMENT_LEN)
        .finish()
}

/// Checks an event as it will be stored, after defaults and partial updates are applied.
pub fn validate_event(event: &Event) -> Result<()> {
    event_checks(&mut Checks::new(), event).finish()
}

/// Checks a new event together with the name of the college it is filed under.
pub fn validate_new_event(college_name: &str, event: &Event) -> Result<()> {
    let mut checks = Checks::new();
    checks.length("college_name", college_name, COLLEGE_NAME_LEN);
    event_checks(&mut checks, event).finish()
}

fn event_checks<'c>(checks: &'c mut Checks, event: &Event) -> &'c mut Checks {
    checks
        .length("title", &event.title, TITLE_LEN)
        .max_length(
            "description",
            event.description.as_deref(),
            MAX_DESCRIPTION_LEN,
        )
        .check(
            event.end_time > event.start_time,
            "end_time",
            "End time must be after start time",
        )
        .check(
            (0..=MAX_CAPACITY).contains(&event.capacity),
            "capacity",
            "Capacity must be between 0 (unlimited) and 1000",
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_valid_email("ann@x.com"));
        assert!(is_valid_email("first.last+tag@mail.college.edu.in"));
        assert!(!is_valid_email("ann"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("ann@x"));
        assert!(!is_valid_email("ann@x..com"));
        assert!(!is_valid_email("ann@@x.com"));
        assert!(!is_valid_email("an n@x.com"));
    }

    #[test]
    fn phones() {
        assert!(is_valid_phone("9876543210"));
        assert!(is_valid_phone("+91 98765-43210"));
        assert!(is_valid_phone("(022) 1234 5678"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("1234567890123456"));
        assert!(!is_valid_phone("98765abc10"));
    }

    #[test]
    fn new_students_need_name_and_email() {
        let Err(Error::Validation(details)) = validate_contact(&Contact::default(), true) else {
            panic!("expected validation failure");
        };
        assert_eq!(details.len(), 2);

        assert!(validate_contact(&Contact::default(), false).is_ok());
    }

    #[test]
    fn contact_reports_every_bad_field() {
        let roll_no = "R".repeat(51);
        let contact = Contact {
            roll_no: Some(roll_no.as_str()),
            name: Some("A"),
            email: Some("not-an-email"),
            phone: Some("call me"),
        };
        let err = validate_contact(&contact, true).unwrap_err();
        let details = err.details().unwrap();
        assert_eq!(details.len(), 4);
        assert!(details[0].starts_with("name:"));
    }

    #[test]
    fn rating_boundaries() {
        assert!(validate_feedback(0, None).is_err());
        assert!(validate_feedback(1, None).is_ok());
        assert!(validate_feedback(5, None).is_ok());
        assert!(validate_feedback(6, None).is_err());
    }

    #[test]
    fn long_comments_are_rejected_not_truncated() {
        assert!(validate_feedback(4, Some("a".repeat(500).as_str())).is_ok());
        let err = validate_feedback(4, Some("a".repeat(501).as_str())).unwrap_err();
        assert_eq!(
            err.details().unwrap(),
            ["comment: cannot exceed 500 characters".to_string()]
        );
    }
}
