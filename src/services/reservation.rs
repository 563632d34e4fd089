use chrono::{DateTime, FixedOffset, NaiveDateTime, SubsecRound};
use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, TimeRange};
use crate::services::scheduling::{self, SchedulingError};

/// A validated booking request.
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub court_id: String,
    pub start: DateTime<FixedOffset>,
    pub duration_hours: u32,
}

/// Validates the requested slot and inserts a `Pending` booking for `user_id`.
///
/// Runs under `BEGIN IMMEDIATE`: the write lock is held from the first read
/// until commit. A unique violation on `(court_id, booking_start_time)` is
/// reported as `SlotTaken`.
pub fn reserve_slot(
    conn: &mut Connection,
    user_id: &str,
    request: &ReservationRequest,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let now = now.trunc_subsecs(0);
    let requested = TimeRange::from_hours(request.start.naive_utc(), request.duration_hours)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let court = queries::get_court(&tx, &request.court_id)?.ok_or(AppError::NotFound("court"))?;

    let local_start = request.start.naive_local();
    if let Err(e) = scheduling::validate_slot(&tx, &court, &requested, &local_start) {
        tracing::info!(court_id = %court.id, user_id, reason = e.kind(), "reservation rejected");
        return Err(e);
    }

    let total_price = court
        .price_per_hour
        .checked_mul(Decimal::from(request.duration_hours))
        .ok_or_else(|| AppError::BadRequest("total price is out of range".to_string()))?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        court_id: court.id.clone(),
        booking_start_time: requested.start,
        booking_end_time: requested.end,
        total_price,
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = queries::create_booking(&tx, &booking) {
        if queries::is_unique_violation(&e) {
            tracing::warn!(court_id = %court.id, "slot claimed concurrently");
            return Err(SchedulingError::SlotTaken.into());
        }
        return Err(e.into());
    }

    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        court_id = %booking.court_id,
        user_id,
        start = %booking.booking_start_time,
        hours = request.duration_hours,
        "booking created"
    );

    Ok(booking)
}

/// Cancels a booking on behalf of the user who made it.
pub fn cancel_booking(
    conn: &mut Connection,
    booking_id: &str,
    user_id: &str,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let now = now.trunc_subsecs(0);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut booking =
        queries::get_booking_by_id(&tx, booking_id)?.ok_or(AppError::NotFound("booking"))?;

    if booking.user_id != user_id {
        return Err(AppError::Forbidden(
            "access denied: you can only cancel your own bookings".to_string(),
        ));
    }
    if !booking.status.is_cancellable() {
        return Err(AppError::InvalidState(booking.status.as_str()));
    }
    if booking.booking_start_time < now {
        return Err(AppError::AlreadyPast);
    }

    queries::update_booking_status(&tx, booking_id, BookingStatus::Cancelled, &now)?;
    tx.commit()?;

    tracing::info!(booking_id, user_id, "booking cancelled");

    booking.status = BookingStatus::Cancelled;
    booking.updated_at = now;
    Ok(booking)
}

/// Owner decision on a pending booking: `Confirmed` or `Rejected`.
pub fn review_booking(
    conn: &mut Connection,
    booking_id: &str,
    owner_id: &str,
    decision: BookingStatus,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if !matches!(decision, BookingStatus::Confirmed | BookingStatus::Rejected) {
        return Err(AppError::BadRequest(format!(
            "status must be confirmed or rejected, got {}",
            decision.as_str()
        )));
    }

    let now = now.trunc_subsecs(0);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut booking =
        queries::get_booking_by_id(&tx, booking_id)?.ok_or(AppError::NotFound("booking"))?;

    let (_, court_owner) = queries::get_court_with_owner(&tx, &booking.court_id)?
        .ok_or(AppError::NotFound("court"))?;
    if court_owner != owner_id {
        return Err(AppError::Forbidden(
            "access denied: you do not own this court".to_string(),
        ));
    }
    if booking.status != BookingStatus::Pending {
        return Err(AppError::InvalidState(booking.status.as_str()));
    }

    queries::update_booking_status(&tx, booking_id, decision, &now)?;
    tx.commit()?;

    tracing::info!(booking_id, status = decision.as_str(), "booking reviewed");

    booking.status = decision;
    booking.updated_at = now;
    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_client_timestamp;
    use crate::services::fixtures::{dt, insert_booking, setup_court, setup_court_priced};

    fn request(court_id: &str, start: &str, hours: u32) -> ReservationRequest {
        ReservationRequest {
            court_id: court_id.to_string(),
            start: dt(start).and_utc().fixed_offset(),
            duration_hours: hours,
        }
    }

    fn now() -> NaiveDateTime {
        dt("2025-06-01 12:00")
    }

    fn kind(err: &AppError) -> &'static str {
        err.kind()
    }

    #[test]
    fn test_reserve_creates_pending_booking() {
        let (mut conn, court) = setup_court(None);
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 2), now())
                .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.user_id, "alice");
        assert_eq!(booking.booking_end_time, dt("2025-06-16 12:00"));

        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.booking_start_time, dt("2025-06-16 10:00"));
        assert_eq!(stored.status, BookingStatus::Pending);
    }

    #[test]
    fn test_price_is_rate_times_hours() {
        let (mut conn, court) = setup_court_priced("500");
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 3), now())
                .unwrap();
        assert_eq!(booking.total_price, Decimal::from(1500));
    }

    #[test]
    fn test_unknown_court() {
        let (mut conn, _) = setup_court(None);
        let err = reserve_slot(&mut conn, "alice", &request("missing", "2025-06-16 10:00", 1), now())
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("court")));
    }

    #[test]
    fn test_adjacent_bookings_both_succeed() {
        let (mut conn, court) = setup_court(None);
        reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now()).unwrap();
        reserve_slot(&mut conn, "bob", &request(&court.id, "2025-06-16 11:00", 1), now()).unwrap();
    }

    #[test]
    fn test_identical_request_rejected() {
        let (mut conn, court) = setup_court(None);
        reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now()).unwrap();
        let err = reserve_slot(&mut conn, "bob", &request(&court.id, "2025-06-16 10:00", 1), now())
            .unwrap_err();
        assert_eq!(kind(&err), "slot_taken");
    }

    #[test]
    fn test_containment_rejected_both_directions() {
        let (mut conn, court) = setup_court(None);
        reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 4), now()).unwrap();
        let err = reserve_slot(&mut conn, "bob", &request(&court.id, "2025-06-16 11:00", 1), now())
            .unwrap_err();
        assert_eq!(kind(&err), "slot_taken");

        let (mut conn, court) = setup_court(None);
        reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 11:00", 1), now()).unwrap();
        let err = reserve_slot(&mut conn, "bob", &request(&court.id, "2025-06-16 10:00", 4), now())
            .unwrap_err();
        assert_eq!(kind(&err), "slot_taken");
    }

    #[test]
    fn test_rejected_reservation_leaves_store_unchanged() {
        let (mut conn, court) = setup_court(None);
        reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 2), now()).unwrap();
        let _ = reserve_slot(&mut conn, "bob", &request(&court.id, "2025-06-16 11:00", 2), now());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unique_index_reported_as_slot_taken() {
        // Same start, but the existing row is a zero-length leftover the
        // overlap check cannot see; only the unique index catches it.
        let (mut conn, court) = setup_court(None);
        insert_booking(&conn, &court.id, "2025-06-16 10:00", "2025-06-16 10:00", BookingStatus::Confirmed);
        let err = reserve_slot(&mut conn, "bob", &request(&court.id, "2025-06-16 10:00", 1), now())
            .unwrap_err();
        assert_eq!(kind(&err), "slot_taken");
    }

    #[test]
    fn test_cancellation_frees_slot() {
        let (mut conn, court) = setup_court(None);
        let first =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now())
                .unwrap();
        cancel_booking(&mut conn, &first.id, "alice", now()).unwrap();

        let again =
            reserve_slot(&mut conn, "bob", &request(&court.id, "2025-06-16 10:00", 1), now());
        assert!(again.is_ok());
    }

    #[test]
    fn test_cancel_sets_status() {
        let (mut conn, court) = setup_court(None);
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now())
                .unwrap();
        let cancelled = cancel_booking(&mut conn, &booking.id, "alice", now()).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_cancel_unknown_booking() {
        let (mut conn, _) = setup_court(None);
        let err = cancel_booking(&mut conn, "nope", "alice", now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound("booking")));
    }

    #[test]
    fn test_cancel_by_non_owner_forbidden() {
        let (mut conn, court) = setup_court(None);
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now())
                .unwrap();
        let err = cancel_booking(&mut conn, &booking.id, "mallory", now()).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_cancel_twice_is_invalid_state() {
        let (mut conn, court) = setup_court(None);
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now())
                .unwrap();
        cancel_booking(&mut conn, &booking.id, "alice", now()).unwrap();
        let err = cancel_booking(&mut conn, &booking.id, "alice", now()).unwrap_err();
        assert!(matches!(err, AppError::InvalidState("cancelled")));
    }

    #[test]
    fn test_cancel_past_booking_rejected() {
        let (mut conn, court) = setup_court(None);
        for (status, start, end) in [
            (BookingStatus::Pending, "2025-05-01 10:00", "2025-05-01 11:00"),
            (BookingStatus::Confirmed, "2025-05-02 10:00", "2025-05-02 11:00"),
        ] {
            let id = insert_booking(&conn, &court.id, start, end, status);
            conn.execute("UPDATE bookings SET user_id = 'alice' WHERE id = ?1", [&id])
                .unwrap();
            let err = cancel_booking(&mut conn, &id, "alice", now()).unwrap_err();
            assert!(matches!(err, AppError::AlreadyPast));
        }
    }

    #[test]
    fn test_review_confirms_pending() {
        let (mut conn, court) = setup_court(None);
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now())
                .unwrap();
        let reviewed =
            review_booking(&mut conn, &booking.id, "owner-1", BookingStatus::Confirmed, now())
                .unwrap();
        assert_eq!(reviewed.status, BookingStatus::Confirmed);

        let err = review_booking(&mut conn, &booking.id, "owner-1", BookingStatus::Rejected, now())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState("confirmed")));
    }

    #[test]
    fn test_rejection_frees_slot() {
        let (mut conn, court) = setup_court(None);
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now())
                .unwrap();
        review_booking(&mut conn, &booking.id, "owner-1", BookingStatus::Rejected, now()).unwrap();
        assert!(
            reserve_slot(&mut conn, "bob", &request(&court.id, "2025-06-16 10:00", 1), now())
                .is_ok()
        );
    }

    #[test]
    fn test_review_by_other_owner_forbidden() {
        let (mut conn, court) = setup_court(None);
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now())
                .unwrap();
        let err = review_booking(&mut conn, &booking.id, "owner-2", BookingStatus::Confirmed, now())
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_review_requires_decision_status() {
        let (mut conn, court) = setup_court(None);
        let booking =
            reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 1), now())
                .unwrap();
        let err = review_booking(&mut conn, &booking.id, "owner-1", BookingStatus::Cancelled, now())
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_price_overflow_rejected() {
        let (mut conn, court) = setup_court_priced("79228162514264337593543950335");
        let err = reserve_slot(&mut conn, "alice", &request(&court.id, "2025-06-16 10:00", 2), now())
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_offset_start_checked_against_local_hours() {
        let (mut conn, court) = setup_court(Some(("09:00", "22:00")));
        let req = ReservationRequest {
            court_id: court.id.clone(),
            start: parse_client_timestamp("2025-06-16T10:00:00+05:30").unwrap(),
            duration_hours: 1,
        };
        let booking = reserve_slot(&mut conn, "alice", &req, now()).unwrap();
        assert_eq!(booking.booking_start_time, dt("2025-06-16 04:30"));

        let req = ReservationRequest {
            court_id: court.id.clone(),
            start: parse_client_timestamp("2025-06-16T07:00:00+05:30").unwrap(),
            duration_hours: 1,
        };
        let err = reserve_slot(&mut conn, "alice", &req, now()).unwrap_err();
        assert_eq!(kind(&err), "outside_operating_hours");
    }

    #[test]
    fn test_returned_booking_matches_stored_row() {
        let (mut conn, court) = setup_court(None);
        let at = now() + chrono::Duration::milliseconds(750);
        let req = ReservationRequest {
            court_id: court.id.clone(),
            start: parse_client_timestamp("2025-06-16T10:00:00.500Z").unwrap(),
            duration_hours: 2,
        };

        let booking = reserve_slot(&mut conn, "alice", &req, at).unwrap();
        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(booking.booking_start_time, stored.booking_start_time);
        assert_eq!(booking.booking_end_time, stored.booking_end_time);
        assert_eq!(booking.created_at, stored.created_at);
        assert_eq!(booking.updated_at, stored.updated_at);

        let later = at + chrono::Duration::minutes(5);
        let cancelled = cancel_booking(&mut conn, &booking.id, "alice", later).unwrap();
        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(cancelled.updated_at, stored.updated_at);
        assert_eq!(stored.updated_at, dt("2025-06-01 12:05"));
    }

    #[test]
    fn test_active_bookings_never_overlap() {
        let (mut conn, court) = setup_court(None);
        let users = ["alice", "bob", "carol"];
        let mut held: Vec<(String, &str)> = vec![];
        let (mut accepted, mut refused) = (0, 0);

        for i in 0..90u32 {
            let day = 16 + i % 2;
            let hour = 6 + (i * 7) % 15;
            let start = format!("2025-06-{day} {hour:02}:{:02}", (i % 3) * 20);
            let user = users[(i % 3) as usize];

            match reserve_slot(&mut conn, user, &request(&court.id, &start, 1 + (i * 5) % 4), now()) {
                Ok(booking) => {
                    accepted += 1;
                    held.push((booking.id, user));
                }
                Err(e) => {
                    assert_eq!(kind(&e), "slot_taken", "{start}");
                    refused += 1;
                }
            }

            if i % 5 == 4 && !held.is_empty() {
                let (id, owner) = held.remove(0);
                let _ = cancel_booking(&mut conn, &id, owner, now());
            }
            if let Some((id, _)) = held.last() {
                let decision = if i % 4 == 1 {
                    BookingStatus::Rejected
                } else {
                    BookingStatus::Confirmed
                };
                if i % 3 == 0 {
                    let _ = review_booking(&mut conn, id, "owner-1", decision, now());
                }
            }
        }
        assert!(accepted > 1);
        assert!(refused > 0);

        let mut stmt = conn
            .prepare(
                "SELECT booking_start_time, booking_end_time FROM bookings
                 WHERE court_id = ?1 AND status NOT IN ('cancelled', 'rejected')",
            )
            .unwrap();
        let active: Vec<TimeRange> = stmt
            .query_map([&court.id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .unwrap()
            .map(|row| {
                let (start, end) = row.unwrap();
                let parse = |s: &str| {
                    NaiveDateTime::parse_from_str(s, crate::db::TIMESTAMP_FORMAT).unwrap()
                };
                TimeRange::new(parse(&start), parse(&end)).unwrap()
            })
            .collect();

        for (i, a) in active.iter().enumerate() {
            for b in &active[i + 1..] {
                assert!(
                    !(a.start < b.end && b.start < a.end),
                    "active bookings overlap: {a:?} and {b:?}"
                );
            }
        }
    }
}
