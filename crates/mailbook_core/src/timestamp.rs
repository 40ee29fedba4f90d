//! Registry timestamps.
//!
//! Every registry value is a second-precision timestamp in the fixed textual
//! format `YYYY-MM-DD_HH:MM:SS`, e.g. `2021-06-01_10:00:00`. The format carries
//! no zone; both sides of the sync write UTC.

use chrono::{NaiveDateTime, Timelike, Utc};
use std::fmt;

use crate::error::{MailbookError, Result};

/// `strftime` pattern of registry timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// A registry timestamp, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parse the registry format. Anything else is a configuration error.
    pub fn parse(value: &str) -> Result<Self> {
        NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
            .map(Timestamp)
            .map_err(|_| MailbookError::InvalidTimestamp(value.to_string()))
    }

    /// Current UTC time truncated to whole seconds.
    pub fn now() -> Self {
        // Formatting drops sub-second precision; keep the value consistent with that
        Timestamp::from(Utc::now().naive_utc())
    }

    /// The underlying chrono value.
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(value: NaiveDateTime) -> Self {
        Timestamp(value.with_nanosecond(0).unwrap_or(value))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_roundtrip() {
        let ts = Timestamp::parse("2021-06-01_10:00:00").unwrap();
        assert_eq!(ts.to_string(), "2021-06-01_10:00:00");
    }

    #[test]
    fn test_ordering_is_chronological() {
        let earlier = Timestamp::parse("2020-12-31_23:59:59").unwrap();
        let later = Timestamp::parse("2021-01-01_00:00:00").unwrap();
        assert!(later > earlier);
    }

    #[test]
    fn test_rejects_other_formats() {
        for bad in ["2021-06-01 10:00:00", "2021-06-01", "yesterday", ""] {
            let err = Timestamp::parse(bad).unwrap_err();
            assert!(matches!(err, MailbookError::InvalidTimestamp(_)));
        }
    }

    #[test]
    fn test_now_has_whole_seconds() {
        let now = Timestamp::now();
        assert_eq!(Timestamp::parse(&now.to_string()).unwrap(), now);
    }
}
