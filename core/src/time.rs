//! Time utilities.

use chrono::Utc;

/// DateTime in UTC.
pub type DateTime = chrono::DateTime<Utc>;

/// Create a datetime of the current time in UTC.
pub fn now() -> DateTime {
    Utc::now()
}
