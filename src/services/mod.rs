pub mod reservation;
pub mod scheduling;
