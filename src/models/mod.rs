pub mod blocked_slot;
pub mod booking;
pub mod court;
pub mod operating_hours;
pub mod slot;

pub use blocked_slot::BlockedSlot;
pub use booking::{Booking, BookingStatus, BookingSummary};
pub use court::{Court, Facility};
pub use operating_hours::OperatingHours;
pub use slot::{parse_client_timestamp, TimeRange};
