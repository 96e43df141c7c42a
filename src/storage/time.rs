//! Conversion between POSIX time and the storage epoch.
//!
//! Timestamps are persisted as signed microseconds since
//! 1601-01-01 00:00:00 UTC (the "WebKit" epoch used by Chromium-style
//! storage). A stored value of `0` means "no timestamp".

use chrono::{DateTime, Utc};

/// Seconds between 1601-01-01 and 1970-01-01.
pub const EPOCH_OFFSET_SECONDS: i64 = 11_644_473_600;

/// Storage resolution.
pub const MICROSECONDS_PER_SECOND: i64 = 1_000_000;

/// Convert POSIX seconds to a storage timestamp.
#[must_use]
pub const fn posix_seconds_to_storage(posix_seconds: i64) -> i64 {
    (posix_seconds + EPOCH_OFFSET_SECONDS) * MICROSECONDS_PER_SECOND
}

/// Convert a storage timestamp back to POSIX seconds, truncating sub-second precision.
#[must_use]
pub const fn storage_to_posix_seconds(storage: i64) -> i64 {
    storage.div_euclid(MICROSECONDS_PER_SECOND) - EPOCH_OFFSET_SECONDS
}

/// Convert a point in time to a storage timestamp.
#[must_use]
pub fn to_storage_timestamp(time: DateTime<Utc>) -> i64 {
    (time.timestamp() + EPOCH_OFFSET_SECONDS) * MICROSECONDS_PER_SECOND
        + i64::from(time.timestamp_subsec_micros())
}

/// Convert an optional point in time, mapping `None` to the null timestamp.
#[must_use]
pub fn to_storage_timestamp_or_null(time: Option<DateTime<Utc>>) -> i64 {
    time.map_or(0, to_storage_timestamp)
}

/// Convert a storage timestamp to a point in time.
///
/// Returns `None` for the null timestamp and for values chrono cannot represent.
#[must_use]
pub fn from_storage_timestamp(storage: i64) -> Option<DateTime<Utc>> {
    if storage == 0 {
        return None;
    }

    let posix_micros = storage.checked_sub(EPOCH_OFFSET_SECONDS * MICROSECONDS_PER_SECOND)?;
    DateTime::<Utc>::from_timestamp_micros(posix_micros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_posix_round_trip_keeps_seconds() {
        let posix = 1_700_000_000;
        let storage = posix_seconds_to_storage(posix);
        assert_eq!(storage, 13_344_473_600_000_000);
        assert_eq!(storage_to_posix_seconds(storage), posix);
    }

    #[test]
    fn test_unix_epoch_maps_to_offset() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(
            to_storage_timestamp(epoch),
            EPOCH_OFFSET_SECONDS * MICROSECONDS_PER_SECOND
        );
    }

    #[test]
    fn test_datetime_round_trip_keeps_micros() {
        let time = Utc.timestamp_opt(1_600_000_000, 123_456_000).unwrap();
        let storage = to_storage_timestamp(time);
        assert_eq!(from_storage_timestamp(storage), Some(time));
    }

    #[test]
    fn test_null_timestamp() {
        assert_eq!(to_storage_timestamp_or_null(None), 0);
        assert_eq!(from_storage_timestamp(0), None);
    }
}
