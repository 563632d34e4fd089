use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, SubsecRound};
use serde::Serialize;

const NAIVE_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses a client-supplied timestamp, keeping the offset it was written in.
/// Values without an offset are taken as UTC. Fractional seconds are dropped
/// to match what the store keeps.
///
/// `naive_utc()` gives the instant to store; `naive_local()` gives the
/// wall-clock time operating hours are compared against.
pub fn parse_client_timestamp(s: &str) -> anyhow::Result<DateTime<FixedOffset>> {
    let s = s.trim();
    let parsed = match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt,
        Err(_) => NAIVE_INPUT_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .ok_or_else(|| anyhow::anyhow!("invalid timestamp: {s}"))?
            .and_utc()
            .fixed_offset(),
    };
    Ok(parsed.trunc_subsecs(0))
}

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> anyhow::Result<Self> {
        anyhow::ensure!(end > start, "end time must be after start time");
        Ok(Self { start, end })
    }

    /// Range starting at `start` and lasting `hours` whole hours.
    pub fn from_hours(start: NaiveDateTime, hours: u32) -> anyhow::Result<Self> {
        let end = start
            .checked_add_signed(Duration::hours(i64::from(hours)))
            .ok_or_else(|| anyhow::anyhow!("end time out of range"))?;
        Self::new(start, end)
    }

    /// Strict test: ranges that only touch at a boundary do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}
