use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{OperatingHours, TimeRange};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedInterval {
    #[serde(flatten)]
    pub range: TimeRange,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourtSchedule {
    pub court_id: String,
    pub date: NaiveDate,
    pub operating_hours: Option<OperatingHours>,
    pub booked: Vec<TimeRange>,
    pub blocked: Vec<BlockedInterval>,
}

// GET /api/courts/:court_id/schedule?date=YYYY-MM-DD
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    Path(court_id): Path<String>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<CourtSchedule>, AppError> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("invalid date: {}", query.date)))?;
    let day_start = date.and_time(NaiveTime::MIN);
    let day_end = day_start
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| AppError::BadRequest(format!("date out of range: {}", query.date)))?;
    let day = TimeRange::new(day_start, day_end)?;

    let db = state.db();
    let court = queries::get_court(&db, &court_id)?.ok_or(AppError::NotFound("court"))?;
    let booked = queries::get_active_bookings_overlapping(&db, &court.id, &day)?
        .iter()
        .map(|b| b.range())
        .collect();
    let blocked = queries::get_blocked_slots_overlapping(&db, &court.id, &day)?
        .into_iter()
        .map(|s| BlockedInterval {
            range: s.range(),
            reason: s.reason,
        })
        .collect();

    Ok(Json(CourtSchedule {
        operating_hours: court.operating_hours()?,
        court_id: court.id,
        date,
        booked,
        blocked,
    }))
}
