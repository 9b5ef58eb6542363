//! The error type shared by every engine, and its mapping onto the caller-facing taxonomy.

use crate::models::{Feedback, Registration};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::fmt;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which stored entity a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    College,
    Student,
    Event,
    Registration,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Entity::College => "College",
            Entity::Student => "Student",
            Entity::Event => "Event",
            Entity::Registration => "Registration",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input. Each detail reads `field: message`.
    #[error("Validation failed")]
    Validation(Vec<String>),

    #[error("{0} not found")]
    NotFound(Entity),

    #[error("Event has been cancelled")]
    EventCancelled,

    #[error("Registration closed - event has started")]
    RegistrationClosed,

    #[error("Event is full")]
    EventFull,

    #[error("Email already exists")]
    DuplicateEmail,

    /// Carries the registration that already exists so callers can treat it as a replay.
    #[error("Already registered for this event")]
    AlreadyRegistered(Box<Registration>),

    /// Carries the feedback that was submitted first.
    #[error("Feedback already submitted")]
    AlreadySubmitted(Box<Feedback>),

    #[error("Admin token required")]
    Unauthorized,

    #[error("Invalid admin token")]
    Forbidden,

    #[error("Database query failed: {0}")]
    Database(#[from] DieselError),

    #[error("Failed to connect to database: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// The caller-facing error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    Internal,
}

impl ErrorKind {
    /// The HTTP status code for this class of error.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

impl Error {
    pub fn validation(field: &str, message: impl fmt::Display) -> Self {
        Error::Validation(vec![format!("{field}: {message}")])
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::EventCancelled | Error::RegistrationClosed => {
                ErrorKind::Validation
            }
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::EventFull
            | Error::DuplicateEmail
            | Error::AlreadyRegistered(_)
            | Error::AlreadySubmitted(_) => ErrorKind::Conflict,
            Error::Unauthorized => ErrorKind::Unauthorized,
            Error::Forbidden => ErrorKind::Forbidden,
            Error::Database(_) | Error::Connection(_) | Error::Config(_) => ErrorKind::Internal,
        }
    }

    /// Field-level details, present only for validation failures.
    pub fn details(&self) -> Option<&[String]> {
        match self {
            Error::Validation(details) => Some(details),
            _ => None,
        }
    }
}

/// Whether a diesel error is a unique index rejecting an insert.
pub(crate) fn is_unique_violation(err: &DieselError) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

/// Extension for turning "no row" results into [`Error::NotFound`].
pub(crate) trait OptionalExt<T> {
    fn found(self, entity: Entity) -> Result<T>;
}

impl<T> OptionalExt<T> for Option<T> {
    fn found(self, entity: Entity) -> Result<T> {
        self.ok_or(Error::NotFound(entity))
    }
}
