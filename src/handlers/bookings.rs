use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::{AuthUser, Role};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{parse_client_timestamp, BookingSummary};
use crate::services::reservation::{self, ReservationRequest};
use crate::state::AppState;

pub const DEFAULT_DURATION_HOURS: u32 = 1;
pub const MAX_DURATION_HOURS: u32 = 24;

// POST /api/bookings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub court_id: String,
    pub booking_start_time: String,
    pub duration_in_hours: Option<i64>,
}

impl CreateBookingRequest {
    pub fn validate(self) -> Result<ReservationRequest, AppError> {
        if self.court_id.trim().is_empty() {
            return Err(AppError::BadRequest("courtId is required".to_string()));
        }

        let start = parse_client_timestamp(&self.booking_start_time)
            .map_err(|e| AppError::BadRequest(format!("bookingStartTime: {e}")))?;

        let duration_hours = match self.duration_in_hours {
            None => DEFAULT_DURATION_HOURS,
            Some(hours) => u32::try_from(hours)
                .ok()
                .filter(|h| (1..=MAX_DURATION_HOURS).contains(h))
                .ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "durationInHours must be between 1 and {MAX_DURATION_HOURS}"
                    ))
                })?,
        };

        Ok(ReservationRequest {
            court_id: self.court_id,
            start,
            duration_hours,
        })
    }
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    auth.require_role(Role::User)?;
    let request = body.validate()?;

    let booking = {
        let mut db = state.db();
        reservation::reserve_slot(
            &mut db,
            &auth.user_id,
            &request,
            chrono::Utc::now().naive_utc(),
        )?
    };

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Booking request received and awaiting confirmation.",
            "booking": booking,
        })),
    ))
}

// GET /api/bookings/my-bookings
pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    let bookings = {
        let db = state.db();
        queries::get_bookings_for_user(&db, &auth.user_id)?
    };
    Ok(Json(bookings))
}

// PUT /api/bookings/:booking_id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let booking = {
        let mut db = state.db();
        reservation::cancel_booking(
            &mut db,
            &booking_id,
            &auth.user_id,
            chrono::Utc::now().naive_utc(),
        )?
    };

    Ok(Json(serde_json::json!({
        "message": "Your booking has been cancelled successfully.",
        "booking": booking,
    })))
}
