//! Post-event feedback: one rating and optional comment per registration, never edited.

use crate::error::{Entity, Error, OptionalExt, Result, is_unique_violation};
use crate::manager::{EventManager, find_feedback, find_registration, new_id};
use crate::models::Feedback;
use crate::schema;
use crate::validation::validate_feedback;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackStatus {
    pub has_feedback: bool,
    pub feedback: Option<Feedback>,
}

impl EventManager {
    /// Submits feedback for a registration.
    ///
    /// Ratings outside 1..=5 and comments longer than 500 characters are rejected. A second
    /// submission fails with [`Error::AlreadySubmitted`] carrying the first one.
    pub fn submit_feedback(
        &mut self,
        registration_id: &str,
        rating: i32,
        comment: Option<&str>,
    ) -> Result<Feedback> {
        let comment = comment.map(str::trim).filter(|comment| !comment.is_empty());
        validate_feedback(rating, comment)?;

        let now = self.now();
        let result = self.db().immediate_transaction(|conn| {
            submit_in(conn, registration_id, rating, comment, now)
        });

        match &result {
            Ok(_) => tracing::info!(registration_id, rating, "feedback submitted"),
            Err(err) => tracing::warn!(registration_id, error = %err, "feedback rejected"),
        }
        result
    }

    /// Whether feedback exists for a registration. Unknown registrations simply have none.
    pub fn feedback_status(&mut self, registration_id: &str) -> Result<FeedbackStatus> {
        let feedback = self.feedback_of_registration(registration_id)?;
        Ok(FeedbackStatus {
            has_feedback: feedback.is_some(),
            feedback,
        })
    }
}

fn submit_in(
    conn: &mut SqliteConnection,
    registration_id: &str,
    rating: i32,
    comment: Option<&str>,
    now: NaiveDateTime,
) -> Result<Feedback> {
    find_registration(conn, registration_id)?.found(Entity::Registration)?;

    if let Some(existing) = find_feedback(conn, registration_id)? {
        return Err(Error::AlreadySubmitted(Box::new(existing)));
    }

    let feedback = Feedback {
        id: new_id(),
        registration_id: registration_id.to_string(),
        rating,
        comment: comment.map(str::to_string),
        submitted_at: now,
    };

    match diesel::insert_into(schema::feedback::table)
        .values(&feedback)
        .execute(conn)
    {
        Ok(_) => Ok(feedback),
        Err(err) if is_unique_violation(&err) => match find_feedback(conn, registration_id)? {
            Some(existing) => Err(Error::AlreadySubmitted(Box::new(existing))),
            None => Err(Error::Database(err)),
        },
        Err(err) => Err(err.into()),
    }
}
