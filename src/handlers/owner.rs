use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::auth::{AuthUser, Role};
use crate::db::queries;
use crate::errors::AppError;
use crate::models::blocked_slot::DEFAULT_BLOCK_REASON;
use crate::models::{
    parse_client_timestamp, BlockedSlot, BookingStatus, BookingSummary, Court, Facility,
    OperatingHours, TimeRange,
};
use crate::services::reservation;
use crate::state::AppState;

/// Loads a court and checks that `owner_id` owns its facility.
fn owned_court(conn: &Connection, court_id: &str, owner_id: &str) -> Result<Court, AppError> {
    let (court, court_owner) =
        queries::get_court_with_owner(conn, court_id)?.ok_or(AppError::NotFound("court"))?;
    if court_owner != owner_id {
        return Err(AppError::Forbidden(
            "access denied: you do not own this court".to_string(),
        ));
    }
    Ok(court)
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value.to_string())
}

// POST /api/owner/facility
#[derive(Debug, Deserialize)]
pub struct FacilityRequest {
    pub name: String,
    pub address: String,
    pub description: Option<String>,
}

pub async fn create_facility(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<FacilityRequest>,
) -> Result<(StatusCode, Json<Facility>), AppError> {
    auth.require_role(Role::Owner)?;

    let facility = Facility {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: auth.user_id.clone(),
        name: required("name", &body.name)?,
        address: required("address", &body.address)?,
        description: body.description,
    };

    {
        let db = state.db();
        if let Err(e) = queries::create_facility(&db, &facility) {
            if queries::is_unique_violation(&e) {
                return Err(AppError::Conflict(
                    "you have already created a facility".to_string(),
                ));
            }
            return Err(e.into());
        }
    }

    tracing::info!(facility_id = %facility.id, owner_id = %auth.user_id, "facility created");
    Ok((StatusCode::CREATED, Json(facility)))
}

// GET /api/owner/facility
pub async fn get_facility(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require_role(Role::Owner)?;

    let (facility, courts) = {
        let db = state.db();
        let facility = queries::get_facility_by_owner(&db, &auth.user_id)?
            .ok_or(AppError::NotFound("facility"))?;
        let courts = queries::get_courts_for_facility(&db, &facility.id)?;
        (facility, courts)
    };

    Ok(Json(serde_json::json!({
        "facility": facility,
        "courts": courts,
    })))
}

/// Upper bound on an hourly rate; keeps `rate * MAX_DURATION_HOURS` representable.
pub const MAX_PRICE_PER_HOUR: i64 = 1_000_000_000;

// POST /api/owner/courts, PUT /api/owner/courts/:court_id
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourtRequest {
    pub name: String,
    pub sport_type: String,
    pub price_per_hour: Decimal,
    pub operating_hours_start: Option<String>,
    pub operating_hours_end: Option<String>,
}

impl CourtRequest {
    fn into_court(self, id: String, facility_id: String) -> Result<Court, AppError> {
        if self.price_per_hour <= Decimal::ZERO {
            return Err(AppError::BadRequest(
                "pricePerHour must be positive".to_string(),
            ));
        }
        if self.price_per_hour > Decimal::from(MAX_PRICE_PER_HOUR) {
            return Err(AppError::BadRequest(format!(
                "pricePerHour must not exceed {MAX_PRICE_PER_HOUR}"
            )));
        }
        let hours = OperatingHours::from_parts(
            self.operating_hours_start.as_deref(),
            self.operating_hours_end.as_deref(),
        )
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(Court {
            id,
            facility_id,
            name: required("name", &self.name)?,
            sport_type: required("sportType", &self.sport_type)?,
            price_per_hour: self.price_per_hour,
            operating_hours_start: hours.as_ref().map(|h| h.start.clone()),
            operating_hours_end: hours.map(|h| h.end),
        })
    }
}

pub async fn add_court(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CourtRequest>,
) -> Result<(StatusCode, Json<Court>), AppError> {
    auth.require_role(Role::Owner)?;

    let court = {
        let db = state.db();
        let facility = queries::get_facility_by_owner(&db, &auth.user_id)?
            .ok_or(AppError::NotFound("facility"))?;
        let court = body.into_court(uuid::Uuid::new_v4().to_string(), facility.id)?;
        queries::create_court(&db, &court)?;
        court
    };

    tracing::info!(court_id = %court.id, facility_id = %court.facility_id, "court added");
    Ok((StatusCode::CREATED, Json(court)))
}

pub async fn update_court(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(court_id): Path<String>,
    Json(body): Json<CourtRequest>,
) -> Result<Json<Court>, AppError> {
    auth.require_role(Role::Owner)?;

    let court = {
        let db = state.db();
        let existing = owned_court(&db, &court_id, &auth.user_id)?;
        let court = body.into_court(existing.id, existing.facility_id)?;
        queries::update_court(&db, &court)?;
        court
    };

    Ok(Json(court))
}

// DELETE /api/owner/courts/:court_id
pub async fn delete_court(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(court_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require_role(Role::Owner)?;

    {
        let db = state.db();
        owned_court(&db, &court_id, &auth.user_id)?;
        queries::delete_court(&db, &court_id)?;
    }

    tracing::info!(court_id = %court_id, "court deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// POST /api/owner/courts/:court_id/blocked-slots
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedSlotRequest {
    pub start_time: String,
    pub end_time: String,
    pub reason: Option<String>,
}

pub async fn add_blocked_slot(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(court_id): Path<String>,
    Json(body): Json<BlockedSlotRequest>,
) -> Result<(StatusCode, Json<BlockedSlot>), AppError> {
    auth.require_role(Role::Owner)?;

    let start = parse_client_timestamp(&body.start_time)
        .map_err(|e| AppError::BadRequest(format!("startTime: {e}")))?;
    let end = parse_client_timestamp(&body.end_time)
        .map_err(|e| AppError::BadRequest(format!("endTime: {e}")))?;
    let range = TimeRange::new(start.naive_utc(), end.naive_utc())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let reason = body
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string());

    let slot = {
        let db = state.db();
        let court = owned_court(&db, &court_id, &auth.user_id)?;
        let slot = BlockedSlot {
            id: uuid::Uuid::new_v4().to_string(),
            court_id: court.id,
            start_time: range.start,
            end_time: range.end,
            reason,
        };
        queries::create_blocked_slot(&db, &slot)?;
        slot
    };

    tracing::info!(slot_id = %slot.id, court_id = %slot.court_id, reason = %slot.reason, "court slot blocked");
    Ok((StatusCode::CREATED, Json(slot)))
}

// GET /api/owner/courts/:court_id/blocked-slots
pub async fn list_blocked_slots(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(court_id): Path<String>,
) -> Result<Json<Vec<BlockedSlot>>, AppError> {
    auth.require_role(Role::Owner)?;

    let slots = {
        let db = state.db();
        owned_court(&db, &court_id, &auth.user_id)?;
        queries::get_blocked_slots_for_court(&db, &court_id)?
    };
    Ok(Json(slots))
}

// DELETE /api/owner/blocked-slots/:slot_id
pub async fn delete_blocked_slot(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(slot_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require_role(Role::Owner)?;

    {
        let db = state.db();
        let slot = queries::get_blocked_slot(&db, &slot_id)?
            .ok_or(AppError::NotFound("blocked slot"))?;
        owned_court(&db, &slot.court_id, &auth.user_id)?;
        queries::delete_blocked_slot(&db, &slot_id)?;
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/owner/bookings
#[derive(Debug, Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
}

fn parse_status(s: &str) -> Result<BookingStatus, AppError> {
    BookingStatus::parse(&s.to_lowercase())
        .ok_or_else(|| AppError::BadRequest(format!("unknown booking status: {s}")))
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    auth.require_role(Role::Owner)?;

    let status_filter = query.status.as_deref().map(parse_status).transpose()?;

    let bookings = {
        let db = state.db();
        queries::get_bookings_for_owner(&db, &auth.user_id, status_filter)?
    };
    Ok(Json(bookings))
}

// PUT /api/owner/bookings/:booking_id/status
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: String,
}

pub async fn review_booking(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(booking_id): Path<String>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require_role(Role::Owner)?;
    let decision = parse_status(&body.status)?;

    let booking = {
        let mut db = state.db();
        reservation::review_booking(
            &mut db,
            &booking_id,
            &auth.user_id,
            decision,
            chrono::Utc::now().naive_utc(),
        )?
    };

    Ok(Json(serde_json::json!({ "booking": booking })))
}
