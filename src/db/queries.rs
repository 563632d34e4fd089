use std::str::FromStr;

use anyhow::Context;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use super::TIMESTAMP_FORMAT;
use crate::models::{
    BlockedSlot, Booking, BookingStatus, BookingSummary, Court, Facility, TimeRange,
};

const BOOKING_COLUMNS: &str = "b.id, b.user_id, b.court_id, b.booking_start_time, b.booking_end_time, \
     b.total_price, b.status, b.created_at, b.updated_at";

const COURT_COLUMNS: &str = "c.id, c.facility_id, c.name, c.sport_type, c.price_per_hour, \
     c.operating_hours_start, c.operating_hours_end";

pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid stored timestamp: {s}"))
}

fn parse_decimal(s: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("invalid stored amount: {s}"))
}

// ── Facilities ──

pub fn create_facility(conn: &Connection, facility: &Facility) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO facilities (id, owner_id, name, address, description) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            facility.id,
            facility.owner_id,
            facility.name,
            facility.address,
            facility.description,
        ],
    )?;
    Ok(())
}

pub fn get_facility_by_owner(conn: &Connection, owner_id: &str) -> anyhow::Result<Option<Facility>> {
    let facility = conn
        .query_row(
            "SELECT id, owner_id, name, address, description FROM facilities WHERE owner_id = ?1",
            params![owner_id],
            |row| {
                Ok(Facility {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    address: row.get(3)?,
                    description: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(facility)
}

// ── Courts ──

pub fn create_court(conn: &Connection, court: &Court) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO courts (id, facility_id, name, sport_type, price_per_hour, operating_hours_start, operating_hours_end)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            court.id,
            court.facility_id,
            court.name,
            court.sport_type,
            court.price_per_hour.to_string(),
            court.operating_hours_start,
            court.operating_hours_end,
        ],
    )?;
    Ok(())
}

pub fn update_court(conn: &Connection, court: &Court) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE courts SET name = ?1, sport_type = ?2, price_per_hour = ?3,
           operating_hours_start = ?4, operating_hours_end = ?5
         WHERE id = ?6",
        params![
            court.name,
            court.sport_type,
            court.price_per_hour.to_string(),
            court.operating_hours_start,
            court.operating_hours_end,
            court.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_court(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM courts WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_court(conn: &Connection, id: &str) -> anyhow::Result<Option<Court>> {
    Ok(get_court_with_owner(conn, id)?.map(|(court, _)| court))
}

/// Loads a court together with the id of the user owning its facility.
pub fn get_court_with_owner(
    conn: &Connection,
    id: &str,
) -> anyhow::Result<Option<(Court, String)>> {
    let sql = format!(
        "SELECT {COURT_COLUMNS}, f.owner_id
         FROM courts c INNER JOIN facilities f ON f.id = c.facility_id
         WHERE c.id = ?1"
    );
    let result = conn.query_row(&sql, params![id], |row| {
        Ok(parse_court_row(row).and_then(|court| Ok((court, row.get::<_, String>(7)?))))
    });

    match result {
        Ok(court) => Ok(Some(court?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_courts_for_facility(conn: &Connection, facility_id: &str) -> anyhow::Result<Vec<Court>> {
    let sql = format!("SELECT {COURT_COLUMNS} FROM courts c WHERE c.facility_id = ?1 ORDER BY c.name ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![facility_id], |row| Ok(parse_court_row(row)))?;

    let mut courts = vec![];
    for row in rows {
        courts.push(row??);
    }
    Ok(courts)
}

fn parse_court_row(row: &rusqlite::Row) -> anyhow::Result<Court> {
    let price_str: String = row.get(4)?;
    Ok(Court {
        id: row.get(0)?,
        facility_id: row.get(1)?,
        name: row.get(2)?,
        sport_type: row.get(3)?,
        price_per_hour: parse_decimal(&price_str)?,
        operating_hours_start: row.get(5)?,
        operating_hours_end: row.get(6)?,
    })
}

// ── Blocked Slots ──

pub fn create_blocked_slot(conn: &Connection, slot: &BlockedSlot) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO blocked_slots (id, court_id, start_time, end_time, reason) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            slot.id,
            slot.court_id,
            format_timestamp(&slot.start_time),
            format_timestamp(&slot.end_time),
            slot.reason,
        ],
    )?;
    Ok(())
}

pub fn get_blocked_slot(conn: &Connection, id: &str) -> anyhow::Result<Option<BlockedSlot>> {
    let result = conn.query_row(
        "SELECT id, court_id, start_time, end_time, reason FROM blocked_slots WHERE id = ?1",
        params![id],
        |row| Ok(parse_blocked_slot_row(row)),
    );

    match result {
        Ok(slot) => Ok(Some(slot?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_blocked_slot(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM blocked_slots WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn get_blocked_slots_for_court(conn: &Connection, court_id: &str) -> anyhow::Result<Vec<BlockedSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, court_id, start_time, end_time, reason
         FROM blocked_slots WHERE court_id = ?1 ORDER BY start_time ASC",
    )?;
    let rows = stmt.query_map(params![court_id], |row| Ok(parse_blocked_slot_row(row)))?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

/// Blocks on the court that share at least one instant with `range`.
pub fn get_blocked_slots_overlapping(
    conn: &Connection,
    court_id: &str,
    range: &TimeRange,
) -> anyhow::Result<Vec<BlockedSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, court_id, start_time, end_time, reason
         FROM blocked_slots
         WHERE court_id = ?1 AND start_time < ?2 AND end_time > ?3
         ORDER BY start_time ASC",
    )?;
    let rows = stmt.query_map(
        params![
            court_id,
            format_timestamp(&range.end),
            format_timestamp(&range.start)
        ],
        |row| Ok(parse_blocked_slot_row(row)),
    )?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

fn parse_blocked_slot_row(row: &rusqlite::Row) -> anyhow::Result<BlockedSlot> {
    let start_str: String = row.get(2)?;
    let end_str: String = row.get(3)?;
    Ok(BlockedSlot {
        id: row.get(0)?,
        court_id: row.get(1)?,
        start_time: parse_timestamp(&start_str)?,
        end_time: parse_timestamp(&end_str)?,
        reason: row.get(4)?,
    })
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, court_id, booking_start_time, booking_end_time, total_price, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.id,
            booking.user_id,
            booking.court_id,
            format_timestamp(&booking.booking_start_time),
            format_timestamp(&booking.booking_end_time),
            booking.total_price.to_string(),
            booking.status.as_str(),
            format_timestamp(&booking.created_at),
            format_timestamp(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), format_timestamp(now), id],
    )?;
    Ok(count > 0)
}

/// Bookings on the court that still hold their slot and share at least one
/// instant with `range`.
pub fn get_active_bookings_overlapping(
    conn: &Connection,
    court_id: &str,
    range: &TimeRange,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         WHERE b.court_id = ?1 AND b.status NOT IN ('cancelled', 'rejected')
           AND b.booking_start_time < ?2 AND b.booking_end_time > ?3
         ORDER BY b.booking_start_time ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            court_id,
            format_timestamp(&range.end),
            format_timestamp(&range.start)
        ],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<BookingSummary>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, c.name, c.sport_type, f.name
         FROM bookings b
         INNER JOIN courts c ON c.id = b.court_id
         INNER JOIN facilities f ON f.id = c.facility_id
         WHERE b.user_id = ?1
         ORDER BY b.booking_start_time DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_summary_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_owner(
    conn: &Connection,
    owner_id: &str,
    status_filter: Option<BookingStatus>,
) -> anyhow::Result<Vec<BookingSummary>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, c.name, c.sport_type, f.name
         FROM bookings b
         INNER JOIN courts c ON c.id = b.court_id
         INNER JOIN facilities f ON f.id = c.facility_id
         WHERE f.owner_id = ?1 AND (?2 IS NULL OR b.status = ?2)
         ORDER BY b.booking_start_time DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![owner_id, status_filter.map(|s| s.as_str())],
        |row| Ok(parse_summary_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let price_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("invalid stored booking status: {status_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        court_id: row.get(2)?,
        booking_start_time: parse_timestamp(&start_str)?,
        booking_end_time: parse_timestamp(&end_str)?,
        total_price: parse_decimal(&price_str)?,
        status,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}

fn parse_summary_row(row: &rusqlite::Row) -> anyhow::Result<BookingSummary> {
    Ok(BookingSummary {
        booking: parse_booking_row(row)?,
        court_name: row.get(9)?,
        sport_type: row.get(10)?,
        facility_name: row.get(11)?,
    })
}

/// True when `err` came from a UNIQUE constraint on insert.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
