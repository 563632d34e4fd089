use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OperatingHours;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub address: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Court {
    pub id: String,
    pub facility_id: String,
    pub name: String,
    pub sport_type: String,
    pub price_per_hour: Decimal,
    pub operating_hours_start: Option<String>,
    pub operating_hours_end: Option<String>,
}

impl Court {
    pub fn operating_hours(&self) -> anyhow::Result<Option<OperatingHours>> {
        OperatingHours::from_parts(
            self.operating_hours_start.as_deref(),
            self.operating_hours_end.as_deref(),
        )
    }
}
