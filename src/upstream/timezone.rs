//! Upstream clock offset detection.
//!
//! The monitor API reports hourly samples as naive local times in whatever
//! zone the serving region uses. The newest sample always falls in the
//! current hour, so comparing its hour against the current UTC time pins
//! the offset down to a whole hour.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Timelike, Utc};

use super::{FetchError, FetchResult};

const API_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse a naive upstream timestamp (`YYYY-MM-DD HH:MM[:SS]`).
pub fn parse_api_time(s: &str) -> FetchResult<NaiveDateTime> {
    let trimmed = s.trim();
    API_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| FetchError::InvalidTimestamp(s.to_string()))
}

/// Smallest offset in UTC-11..=UTC+12 whose wall-clock hour at `now_utc`
/// equals the hour of `latest_time`. Falls back to UTC.
pub fn infer_offset(latest_time: &str, now_utc: DateTime<Utc>) -> FetchResult<FixedOffset> {
    let latest_hour = parse_api_time(latest_time)?.hour();

    let found = (-11..=12)
        .filter_map(|hours| FixedOffset::east_opt(hours * 3600))
        .find(|offset| now_utc.with_timezone(offset).hour() == latest_hour);

    Ok(found.unwrap_or_else(|| Utc.fix()))
}

/// The upstream's UTC offset, resolved once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiTimezone(FixedOffset);

impl Default for ApiTimezone {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for ApiTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UTC{}", self.0)
    }
}

impl ApiTimezone {
    pub fn utc() -> Self {
        Self(Utc.fix())
    }

    pub fn from_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours.checked_mul(3600)?).map(Self)
    }

    /// Infer from the `x_time` axis of a model-usage response.
    /// An empty axis carries no evidence and yields `None`.
    pub fn from_samples(x_time: &[String], now_utc: DateTime<Utc>) -> FetchResult<Option<Self>> {
        x_time
            .last()
            .map(|latest| infer_offset(latest, now_utc).map(Self))
            .transpose()
    }

    /// Attach this offset to a naive upstream timestamp.
    pub fn localize(&self, s: &str) -> FetchResult<DateTime<FixedOffset>> {
        let naive = parse_api_time(s)?;
        self.0
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| FetchError::InvalidTimestamp(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[rstest]
    #[case::beijing("2026-01-05 20:00", "2026-01-05T12:34:00Z", 8)]
    #[case::moscow("2026-01-05 15:00", "2026-01-05T12:34:00Z", 3)]
    #[case::utc("2026-01-05 12:00", "2026-01-05T12:34:00Z", 0)]
    #[case::west("2026-01-05 07:00", "2026-01-05T12:34:00Z", -5)]
    #[case::wraps_midnight("2026-01-06 03:00", "2026-01-05T19:10:00Z", 8)]
    #[case::with_seconds("2026-01-05 20:00:00", "2026-01-05T12:00:00Z", 8)]
    fn test_infer_offset(#[case] latest: &str, #[case] now: &str, #[case] hours: i32) {
        let offset = infer_offset(latest, utc(now)).unwrap();
        assert_eq!(offset.local_minus_utc(), hours * 3600);
    }

    #[test]
    fn test_infer_offset_prefers_smallest() {
        // UTC-11 and UTC+13 share a wall-clock hour; only -11 is in range.
        let offset = infer_offset("2026-01-05 01:00", utc("2026-01-05T12:00:00Z")).unwrap();
        assert_eq!(offset.local_minus_utc(), -11 * 3600);
    }

    #[test]
    fn test_infer_offset_satisfies_hour_equation() {
        let now = utc("2026-07-14T21:45:00Z");
        for hour in 0..24 {
            let latest = format!("2026-07-14 {hour:02}:00");
            let offset = infer_offset(&latest, now).unwrap();
            let o = offset.local_minus_utc() / 3600;
            assert_eq!((21 + o).rem_euclid(24) as u32, hour, "hour {hour}");
        }
    }

    #[rstest]
    #[case("")]
    #[case("20:00")]
    #[case("2026-01-05T20:00:00")]
    #[case("yesterday")]
    fn test_invalid_timestamps(#[case] s: &str) {
        assert!(matches!(
            infer_offset(s, Utc::now()),
            Err(FetchError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_from_samples_empty_is_unresolved() {
        assert_eq!(ApiTimezone::from_samples(&[], Utc::now()).unwrap(), None);
        assert_eq!(ApiTimezone::utc().to_string(), "UTC+00:00");
    }

    #[test]
    fn test_from_samples_uses_last() {
        let x_time = vec!["2026-01-05 03:00".to_string(), "2026-01-05 20:00".to_string()];
        let tz = ApiTimezone::from_samples(&x_time, utc("2026-01-05T12:10:00Z")).unwrap();
        assert_eq!(tz, ApiTimezone::from_hours(8));
    }

    #[test]
    fn test_localize() {
        let tz = ApiTimezone::from_hours(8).unwrap();
        let t = tz.localize("2026-01-05 20:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2026-01-05T20:00:00+08:00");
        assert_eq!(t.with_timezone(&Utc), utc("2026-01-05T12:00:00Z"));
    }
}
