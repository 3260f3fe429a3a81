//! Timestamp utilities

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

/// Six-digit `HHMMSS` stamp of the given instant, in that instant's own timezone.
///
/// Used as the time component of working-directory asset names.
pub fn time_of_day_stamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%H%M%S").to_string()
}

/// `HHMMSS` stamp of the current local time
pub fn local_time_of_day_stamp() -> String {
    time_of_day_stamp(&Local::now())
}
