use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::TimeRange;

pub const DEFAULT_BLOCK_REASON: &str = "Maintenance";

/// Owner-declared window during which a court cannot be booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedSlot {
    pub id: String,
    pub court_id: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub reason: String,
}

impl BlockedSlot {
    pub fn range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }
}
