use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Court, TimeRange};

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("court is only available for bookings starting between {hours}")]
    OutsideOperatingHours { hours: String },

    #[error("court is unavailable for this time slot: {reason}")]
    SlotBlocked { reason: String },

    #[error("this time slot is already booked, please pick a different time")]
    SlotTaken,
}

impl SchedulingError {
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulingError::OutsideOperatingHours { .. } => "outside_operating_hours",
            SchedulingError::SlotBlocked { .. } => "slot_blocked",
            SchedulingError::SlotTaken => "slot_taken",
        }
    }
}

/// Checks a requested slot on `court` in order: operating hours, maintenance
/// blocks, then live bookings. The first failing check decides the error.
///
/// `requested` is in UTC. Operating hours are matched against `local_start`,
/// the start as the client's wall clock read it.
pub fn validate_slot(
    conn: &Connection,
    court: &Court,
    requested: &TimeRange,
    local_start: &NaiveDateTime,
) -> Result<(), AppError> {
    if let Some(hours) = court.operating_hours()? {
        if !hours.admits(local_start)? {
            return Err(SchedulingError::OutsideOperatingHours {
                hours: hours.to_human_readable(),
            }
            .into());
        }
    }

    let blocks = queries::get_blocked_slots_overlapping(conn, &court.id, requested)?;
    if let Some(block) = blocks.first() {
        return Err(SchedulingError::SlotBlocked {
            reason: block.reason.clone(),
        }
        .into());
    }

    let bookings = queries::get_active_bookings_overlapping(conn, &court.id, requested)?;
    if !bookings.is_empty() {
        return Err(SchedulingError::SlotTaken.into());
    }

    Ok(())
}
