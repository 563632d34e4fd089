use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Daily window in which bookings on a court may start, as `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub start: String,
    pub end: String,
}

impl OperatingHours {
    /// Builds the window from a court's optional columns. Both or neither must be set.
    pub fn from_parts(start: Option<&str>, end: Option<&str>) -> anyhow::Result<Option<Self>> {
        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let open = parse_time(start)?;
                let close = parse_time(end)?;
                if open.0 >= close.0 {
                    return Err(anyhow::anyhow!(
                        "opening hour must be before closing hour: {start}-{end}"
                    ));
                }
                Ok(Some(Self {
                    start: start.to_string(),
                    end: end.to_string(),
                }))
            }
            _ => Err(anyhow::anyhow!(
                "operating hours need both a start and an end"
            )),
        }
    }

    pub fn opening_hour(&self) -> anyhow::Result<u32> {
        Ok(parse_time(&self.start)?.0)
    }

    pub fn closing_hour(&self) -> anyhow::Result<u32> {
        Ok(parse_time(&self.end)?.0)
    }

    /// Only the hour of `dt` is compared: `opening <= hour < closing`.
    pub fn admits(&self, dt: &NaiveDateTime) -> anyhow::Result<bool> {
        let hour = dt.hour();
        Ok(self.opening_hour()? <= hour && hour < self.closing_hour()?)
    }

    pub fn to_human_readable(&self) -> String {
        format!("{} and {}", self.start, self.end)
    }
}

fn parse_time(s: &str) -> anyhow::Result<(u32, u32)> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if hour > 24 || minute > 59 || (hour == 24 && minute != 0) {
        return Err(anyhow::anyhow!("time out of range: {s}"));
    }
    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn hours(start: &str, end: &str) -> OperatingHours {
        OperatingHours::from_parts(Some(start), Some(end))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_no_hours_configured() {
        assert!(OperatingHours::from_parts(None, None).unwrap().is_none());
    }

    #[test]
    fn test_half_configured_rejected() {
        assert!(OperatingHours::from_parts(Some("09:00"), None).is_err());
        assert!(OperatingHours::from_parts(None, Some("22:00")).is_err());
    }

    #[test]
    fn test_invalid_time_rejected() {
        assert!(OperatingHours::from_parts(Some("25:00"), Some("22:00")).is_err());
        assert!(OperatingHours::from_parts(Some("9am"), Some("22:00")).is_err());
        assert!(OperatingHours::from_parts(Some("09:00"), Some("22:75")).is_err());
    }

    #[test]
    fn test_inverted_window_rejected() {
        assert!(OperatingHours::from_parts(Some("22:00"), Some("09:00")).is_err());
        assert!(OperatingHours::from_parts(Some("09:00"), Some("09:30")).is_err());
    }

    #[test]
    fn test_midnight_close_allowed() {
        let h = hours("06:00", "24:00");
        assert!(h.admits(&dt("2025-06-16 23:00")).unwrap());
    }

    #[test]
    fn test_admits_within_window() {
        let h = hours("09:00", "22:00");
        assert!(h.admits(&dt("2025-06-16 09:00")).unwrap());
        assert!(h.admits(&dt("2025-06-16 21:00")).unwrap());
        assert!(h.admits(&dt("2025-06-16 21:30")).unwrap());
    }

    #[test]
    fn test_rejects_outside_window() {
        let h = hours("09:00", "22:00");
        assert!(!h.admits(&dt("2025-06-16 08:00")).unwrap());
        assert!(!h.admits(&dt("2025-06-16 08:59")).unwrap());
        assert!(!h.admits(&dt("2025-06-16 22:00")).unwrap());
    }

    #[test]
    fn test_to_human_readable() {
        assert_eq!(hours("09:00", "22:00").to_human_readable(), "09:00 and 22:00");
    }
}
