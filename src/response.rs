//! The `{"success": ..}` envelope every command answers with.

use crate::error::{Error, ErrorKind};
use crate::models::{Feedback, Registration};
use serde::Serialize;

/// Message shown for internal errors outside development.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// A payload flattened next to the `success` flag. `T` must serialize as a map.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub error: String,
    /// The status the error class maps to.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    /// The registration that already exists, for a repeated registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,
    /// The feedback submitted first, for a repeated submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl Failure {
    pub fn new(err: &Error, expose_internal: bool) -> Self {
        let kind = err.kind();
        let error = if kind == ErrorKind::Internal && !expose_internal {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            err.to_string()
        };

        Self {
            error,
            status: kind.status_code(),
            details: err.details().map(<[String]>::to_vec),
            registration: match err {
                Error::AlreadyRegistered(existing) => Some(existing.as_ref().clone()),
                _ => None,
            },
            feedback: match err {
                Error::AlreadySubmitted(existing) => Some(existing.as_ref().clone()),
                _ => None,
            },
        }
    }
}

pub fn failure(err: &Error, expose_internal: bool) -> Envelope<Failure> {
    Envelope {
        success: false,
        payload: Failure::new(err, expose_internal),
    }
}
