use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

const PARAM_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The rolling one-day window sent as `startTime`/`endTime`.
///
/// Starts at the top of the hour one day before `now` and ends at the last
/// second of `now`'s hour, so the current partial hour is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl QueryWindow {
    pub fn ending_at(now: NaiveDateTime) -> Self {
        Self {
            start: top_of_hour(now - TimeDelta::days(1)),
            end: top_of_hour(now) + TimeDelta::seconds(59 * 60 + 59),
        }
    }

    /// Window ending at the host's local wall-clock time.
    pub fn now_local() -> Self {
        Self::ending_at(Local::now().naive_local())
    }

    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("startTime", self.start.format(PARAM_FORMAT).to_string()),
            ("endTime", self.end.format(PARAM_FORMAT).to_string()),
        ]
    }
}

fn top_of_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_time(NaiveTime::MIN) + TimeDelta::hours(i64::from(t.hour()))
}
