//! Time utilities.
//!
//! Canonical timestamps are epoch **milliseconds UTC**. This module provides
//! the conversions venues need: epoch seconds, ISO-8601 strings, and the
//! awkward case of a venue-local wall-clock time-of-day that must be
//! recombined with the current date in the venue's fixed UTC offset.

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};

use crate::error::MdxError;

/// Current time as epoch milliseconds UTC.
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert an ISO-8601 / RFC 3339 timestamp string to epoch milliseconds.
pub fn ms_from_iso(s: &str) -> Result<i64, MdxError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
        .map_err(|e| MdxError::Protocol(format!("bad ISO timestamp {s:?}: {e}")))
}

/// Reconstruct a full timestamp from a venue-local `"HH:MM:SS"` wall clock.
///
/// Some venues send candle times as a bare time-of-day in their local zone.
/// The full timestamp is the current date *in that zone* (derived from
/// `now_utc` shifted by the venue's fixed `utc_offset_hours`) combined with
/// the given time, re-interpreted as an aware timestamp and converted back
/// to epoch milliseconds UTC.
///
/// `now_utc` is an explicit parameter so tests can freeze it.
pub fn ms_from_local_time(
    time_of_day: &str,
    utc_offset_hours: i32,
    now_utc: DateTime<Utc>,
) -> Result<i64, MdxError> {
    let time = NaiveTime::parse_from_str(time_of_day, "%H:%M:%S")
        .map_err(|e| MdxError::Protocol(format!("bad time-of-day {time_of_day:?}: {e}")))?;
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .ok_or_else(|| MdxError::Protocol(format!("bad UTC offset {utc_offset_hours}")))?;

    let local_date = now_utc.with_timezone(&offset).date_naive();
    let local_dt = local_date.and_time(time);
    let aware = local_dt
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| MdxError::Protocol(format!("ambiguous local time {time_of_day:?}")))?;

    Ok(aware.with_timezone(&Utc).timestamp_millis())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn iso_to_ms() {
        let ms = ms_from_iso("2018-08-01T12:00:00.500Z").unwrap();
        assert_eq!(ms, 1_533_124_800_500);
    }

    #[test]
    fn iso_with_offset_normalized_to_utc() {
        let utc = ms_from_iso("2018-08-01T12:00:00Z").unwrap();
        let shifted = ms_from_iso("2018-08-01T20:00:00+08:00").unwrap();
        assert_eq!(utc, shifted);
    }

    #[test]
    fn local_time_reconstruction_with_frozen_now() {
        // Frozen "now": 2019-03-10 06:00:00 UTC, which is 14:00 at UTC+8.
        let now = Utc.with_ymd_and_hms(2019, 3, 10, 6, 0, 0).unwrap();
        let ms = ms_from_local_time("12:30:00", 8, now).unwrap();
        // 2019-03-10 12:30:00 +08:00 == 2019-03-10 04:30:00 UTC.
        let expected = Utc.with_ymd_and_hms(2019, 3, 10, 4, 30, 0).unwrap().timestamp_millis();
        assert_eq!(ms, expected);
    }

    #[test]
    fn local_time_uses_venue_date_not_utc_date() {
        // 2019-03-10 23:00 UTC is already 2019-03-11 07:00 at UTC+8, so the
        // reconstructed date must be the 11th.
        let now = Utc.with_ymd_and_hms(2019, 3, 10, 23, 0, 0).unwrap();
        let ms = ms_from_local_time("07:05:00", 8, now).unwrap();
        let expected = Utc.with_ymd_and_hms(2019, 3, 10, 23, 5, 0).unwrap().timestamp_millis();
        assert_eq!(ms, expected);
    }

    #[test]
    fn garbage_time_of_day_is_protocol_error() {
        let now = Utc::now();
        assert!(matches!(ms_from_local_time("not-a-time", 8, now), Err(MdxError::Protocol(_))));
    }
}
