//! Current-UTC resolution and the calendar arithmetic built on it.

mod remote;

pub use remote::{HttpTimeSource, RemoteClock, TimeSource};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};

/// Source of "now" for selection and scheduling.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn now(&self) -> DateTime<Utc>;
}

/// The host's clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn utc_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.date_naive()
}

/// Formats a date as `YYYY-MM-DD`.
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Start of the UTC day after `instant`.
pub fn next_utc_midnight(instant: DateTime<Utc>) -> DateTime<Utc> {
    let today = instant.date_naive();
    let tomorrow = today.succ_opt().unwrap_or(today);
    tomorrow.and_time(NaiveTime::MIN).and_utc()
}

/// Non-negative time from `now` to `target`.
pub fn duration_until(now: DateTime<Utc>, target: DateTime<Utc>) -> std::time::Duration {
    (target - now)
        .max(ChronoDuration::zero())
        .to_std()
        .unwrap_or_default()
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_midnight_rolls_over_month_and_year() {
        let late = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_utc_midnight(late),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );

        let midnight = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        assert_eq!(
            next_utc_midnight(midnight),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn duration_until_never_goes_negative() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let past = now - ChronoDuration::hours(1);
        assert_eq!(duration_until(now, past), std::time::Duration::ZERO);
        assert_eq!(
            duration_until(now, next_utc_midnight(now)),
            std::time::Duration::from_secs(12 * 3600)
        );
    }

    #[test]
    fn iso_date_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(iso_date(date), "2024-03-05");
    }
}
