pub mod bookings;
pub mod courts;
pub mod health;
pub mod owner;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/courts/:court_id/schedule", get(courts::get_schedule))
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/bookings/my-bookings", get(bookings::my_bookings))
        .route(
            "/api/bookings/:booking_id/cancel",
            put(bookings::cancel_booking),
        )
        .route(
            "/api/owner/facility",
            get(owner::get_facility).post(owner::create_facility),
        )
        .route("/api/owner/courts", post(owner::add_court))
        .route(
            "/api/owner/courts/:court_id",
            put(owner::update_court).delete(owner::delete_court),
        )
        .route(
            "/api/owner/courts/:court_id/blocked-slots",
            get(owner::list_blocked_slots).post(owner::add_blocked_slot),
        )
        .route(
            "/api/owner/blocked-slots/:slot_id",
            delete(owner::delete_blocked_slot),
        )
        .route("/api/owner/bookings", get(owner::list_bookings))
        .route(
            "/api/owner/bookings/:booking_id/status",
            put(owner::review_booking),
        )
        .with_state(state)
}
