//! Recording whether registered students attended.
//!
//! A registration has at most one attendance row. Self-service check-in only ever creates a
//! `present` row and is idempotent; administrators upsert the row to present or absent.

use crate::error::{Entity, Error, OptionalExt, Result, is_unique_violation};
use crate::manager::{EventManager, find_attendance, find_registration, new_id};
use crate::models::{Attendance, AttendanceStatus};
use crate::schema;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

/// Method recorded when a check-in does not name one.
pub const DEFAULT_CHECK_IN_METHOD: &str = "manual";

/// Method recorded for rows written by an administrator.
pub const ADMIN_METHOD: &str = "admin";

/// Outcome of a check-in: the attendance row and whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckIn {
    pub attendance: Attendance,
    pub created: bool,
}

impl EventManager {
    /// Checks a registered student in. Checking in again returns the existing row unchanged.
    pub fn check_in(&mut self, registration_id: &str, method: Option<&str>) -> Result<CheckIn> {
        let now = self.now();
        let method = method
            .map(str::trim)
            .filter(|method| !method.is_empty())
            .unwrap_or(DEFAULT_CHECK_IN_METHOD);

        let check_in = self
            .db()
            .immediate_transaction(|conn| check_in_in(conn, registration_id, method, now))?;

        if check_in.created {
            tracing::info!(registration_id, method, "checked in");
        } else {
            tracing::debug!(registration_id, "already checked in");
        }
        Ok(check_in)
    }

    /// Marks a registration present or absent, updating the existing row in place.
    pub fn mark_attendance(&mut self, registration_id: &str, present: bool) -> Result<Attendance> {
        let now = self.now();

        let record = self.db().immediate_transaction(|conn| {
            find_registration(conn, registration_id)?.found(Entity::Registration)?;

            let record = Attendance {
                id: new_id(),
                registration_id: registration_id.to_string(),
                checked_in_at: now,
                present,
                method: ADMIN_METHOD.to_string(),
            };

            {
                use schema::attendance::dsl;

                diesel::insert_into(dsl::attendance)
                    .values(&record)
                    .on_conflict(dsl::registration_id)
                    .do_update()
                    .set((
                        dsl::present.eq(present),
                        dsl::checked_in_at.eq(now),
                        dsl::method.eq(ADMIN_METHOD),
                    ))
                    .execute(conn)?;
            }

            find_attendance(conn, registration_id)?.found(Entity::Registration)
        })?;

        tracing::info!(registration_id, present, "marked attendance");
        Ok(record)
    }

    /// The derived attendance state of a registration.
    pub fn attendance_status(&mut self, registration_id: &str) -> Result<AttendanceStatus> {
        self.get_registration(registration_id)?;
        let record = self.attendance_of_registration(registration_id)?;
        Ok(record.as_ref().into())
    }
}

fn check_in_in(
    conn: &mut SqliteConnection,
    registration_id: &str,
    method: &str,
    now: NaiveDateTime,
) -> Result<CheckIn> {
    find_registration(conn, registration_id)?.found(Entity::Registration)?;

    if let Some(attendance) = find_attendance(conn, registration_id)? {
        return Ok(CheckIn {
            attendance,
            created: false,
        });
    }

    let attendance = Attendance {
        id: new_id(),
        registration_id: registration_id.to_string(),
        checked_in_at: now,
        present: true,
        method: method.to_string(),
    };

    match diesel::insert_into(schema::attendance::table)
        .values(&attendance)
        .execute(conn)
    {
        Ok(_) => Ok(CheckIn {
            attendance,
            created: true,
        }),
        // Another writer checked the same registration in first; theirs is the row.
        Err(err) if is_unique_violation(&err) => match find_attendance(conn, registration_id)? {
            Some(attendance) => Ok(CheckIn {
                attendance,
                created: false,
            }),
            None => Err(Error::Database(err)),
        },
        Err(err) => Err(err.into()),
    }
}
