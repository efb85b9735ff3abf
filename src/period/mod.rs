//! Period resolution.
//!
//! Maps a requested period specification (weekly/monthly/yearly/years-back,
//! with offset) to a half-open `[start, end)` interval and a stable period
//! key. The reference "now" is injected by the caller so resolution is
//! deterministic and testable.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    #[error("years-back lookback must be at least 1")]
    ZeroLookback,
    #[error("year {0} is out of the supported range")]
    YearOutOfRange(i32),
}

/// The kind of a resolved period, used as part of the cache identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKind {
    Weekly,
    Monthly,
    Yearly,
    YearsBack,
}

impl PeriodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Weekly => "weekly",
            PeriodKind::Monthly => "monthly",
            PeriodKind::Yearly => "yearly",
            PeriodKind::YearsBack => "years-back",
        }
    }
}

/// A period specification as supplied by the caller.
///
/// Historically weekly, monthly, yearly and lookback reports each grew their
/// own selection flags; they all resolve through this one type now. `Yearly`
/// addresses a calendar year by how many years back it lies, `YearsBack` is a
/// rolling window ending at the reference now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSpec {
    Weekly { offset: u32 },
    Monthly { month: u32, year: i32 },
    Yearly { years_ago: u32 },
    YearsBack { years: u32 },
}

/// A resolved period: half-open `[start, end)` interval plus cache identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub kind: PeriodKind,
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end. Always the canonical boundary; for open periods this
    /// lies in the future relative to the reference now.
    pub end: DateTime<Utc>,
    /// Deterministic cache key, e.g. `monthly:2024-03`.
    pub key: String,
    /// True when `end <= now` at resolution: the period is fully in the past
    /// and its computed result is immutable.
    pub closed: bool,
}

impl Period {
    pub fn start_ts(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_ts(&self) -> i64 {
        self.end.timestamp()
    }
}

impl PeriodSpec {
    /// Resolve this specification against a reference now.
    ///
    /// Pure: no clock reads, no I/O. The same `(spec, now)` pair always
    /// yields the same interval and key. The rolling kinds (weekly,
    /// years-back) carry date-granular keys, so they resolve against the
    /// reference date at midnight; any time of day on one date yields the
    /// same window, keeping key identity and interval in agreement.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<Period, PeriodError> {
        match *self {
            PeriodSpec::Weekly { offset } => {
                let end = day_start(now) - Duration::days(7 * offset as i64);
                let start = end - Duration::days(7);
                Ok(Period {
                    kind: PeriodKind::Weekly,
                    start,
                    end,
                    key: format!("weekly:{}", start.date_naive()),
                    closed: end <= now,
                })
            }
            PeriodSpec::Monthly { month, year } => {
                if !(1..=12).contains(&month) {
                    return Err(PeriodError::InvalidMonth(month));
                }
                let start = month_start(year, month)?;
                let end = if month == 12 {
                    month_start(year + 1, 1)?
                } else {
                    month_start(year, month + 1)?
                };
                Ok(Period {
                    kind: PeriodKind::Monthly,
                    start,
                    end,
                    key: format!("monthly:{:04}-{:02}", year, month),
                    closed: end <= now,
                })
            }
            PeriodSpec::Yearly { years_ago } => {
                let year = now.year() - years_ago as i32;
                let start = month_start(year, 1)?;
                let end = month_start(year + 1, 1)?;
                Ok(Period {
                    kind: PeriodKind::Yearly,
                    start,
                    end,
                    key: format!("yearly:{:04}", year),
                    closed: end <= now,
                })
            }
            PeriodSpec::YearsBack { years } => {
                if years == 0 {
                    return Err(PeriodError::ZeroLookback);
                }
                let today = day_start(now);
                let start = shift_years_back(today, years)?;
                Ok(Period {
                    kind: PeriodKind::YearsBack,
                    start,
                    end: today,
                    key: format!("years-back:{}:{}", years, today.date_naive()),
                    closed: true,
                })
            }
        }
    }
}

fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &now.date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid"),
    )
}

fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>, PeriodError> {
    let date = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(PeriodError::YearOutOfRange(year))?;
    Ok(Utc
        .from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid")))
}

/// Shift a timestamp back by whole years, clamping Feb 29 to Feb 28 on
/// non-leap target years.
fn shift_years_back(now: DateTime<Utc>, years: u32) -> Result<DateTime<Utc>, PeriodError> {
    let target_year = now.year() - years as i32;
    let date = now.date_naive();
    let shifted = date
        .with_year(target_year)
        .or_else(|| {
            NaiveDate::from_ymd_opt(target_year, date.month(), date.day().saturating_sub(1))
        })
        .ok_or(PeriodError::YearOutOfRange(target_year))?;
    Ok(Utc.from_utc_datetime(&shifted.and_time(now.time())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_weekly_offset_zero_is_last_seven_days() {
        let period = PeriodSpec::Weekly { offset: 0 }
            .resolve(reference_now())
            .unwrap();

        assert_eq!(period.start, Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap());
        assert_eq!(period.end, reference_now());
        assert_eq!(period.key, "weekly:2024-03-08");
        assert!(period.closed);
    }

    #[test]
    fn test_weekly_offsets_do_not_overlap() {
        let now = reference_now();
        let this_week = PeriodSpec::Weekly { offset: 0 }.resolve(now).unwrap();
        let last_week = PeriodSpec::Weekly { offset: 1 }.resolve(now).unwrap();

        assert_eq!(last_week.end, this_week.start);
        assert_eq!(last_week.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_ne!(last_week.key, this_week.key);
    }

    #[test]
    fn test_monthly_leap_february() {
        let period = PeriodSpec::Monthly { month: 2, year: 2024 }
            .resolve(reference_now())
            .unwrap();

        assert_eq!(period.start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(period.key, "monthly:2024-02");
        assert!(period.closed);
    }

    #[test]
    fn test_monthly_current_month_is_open() {
        let period = PeriodSpec::Monthly { month: 3, year: 2024 }
            .resolve(reference_now())
            .unwrap();

        assert_eq!(period.end, Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
        assert!(!period.closed);
    }

    #[test]
    fn test_monthly_december_rolls_year() {
        let period = PeriodSpec::Monthly { month: 12, year: 2023 }
            .resolve(reference_now())
            .unwrap();

        assert_eq!(period.start, Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(period.closed);
    }

    #[test]
    fn test_monthly_invalid_month_rejected() {
        let result = PeriodSpec::Monthly { month: 13, year: 2024 }.resolve(reference_now());
        assert_eq!(result.unwrap_err(), PeriodError::InvalidMonth(13));

        let result = PeriodSpec::Monthly { month: 0, year: 2024 }.resolve(reference_now());
        assert_eq!(result.unwrap_err(), PeriodError::InvalidMonth(0));
    }

    #[test]
    fn test_yearly_current_year_is_open() {
        let period = PeriodSpec::Yearly { years_ago: 0 }
            .resolve(reference_now())
            .unwrap();

        assert_eq!(period.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(period.key, "yearly:2024");
        assert!(!period.closed);
    }

    #[test]
    fn test_yearly_past_year_is_closed() {
        let period = PeriodSpec::Yearly { years_ago: 2 }
            .resolve(reference_now())
            .unwrap();

        assert_eq!(period.key, "yearly:2022");
        assert!(period.closed);
    }

    #[test]
    fn test_years_back_rolling_window() {
        let period = PeriodSpec::YearsBack { years: 5 }
            .resolve(reference_now())
            .unwrap();

        assert_eq!(period.start, Utc.with_ymd_and_hms(2019, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(period.end, reference_now());
        assert_eq!(period.key, "years-back:5:2024-03-15");
        assert!(period.closed);
    }

    #[test]
    fn test_years_back_zero_rejected() {
        let result = PeriodSpec::YearsBack { years: 0 }.resolve(reference_now());
        assert_eq!(result.unwrap_err(), PeriodError::ZeroLookback);
    }

    #[test]
    fn test_years_back_from_leap_day() {
        let leap = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        let period = PeriodSpec::YearsBack { years: 1 }.resolve(leap).unwrap();

        // 2023 has no Feb 29, clamp to Feb 28
        assert_eq!(period.start, Utc.with_ymd_and_hms(2023, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_rolling_kinds_ignore_time_of_day() {
        // A morning and an evening run on the same date must resolve the
        // same window, since they resolve the same cache key.
        let morning = Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 3, 15, 21, 45, 0).unwrap();

        for spec in [
            PeriodSpec::Weekly { offset: 0 },
            PeriodSpec::Weekly { offset: 3 },
            PeriodSpec::YearsBack { years: 5 },
        ] {
            let early = spec.resolve(morning).unwrap();
            let late = spec.resolve(evening).unwrap();
            assert_eq!(early, late, "{:?} differs across the day", spec);
        }

        let period = PeriodSpec::Weekly { offset: 0 }.resolve(evening).unwrap();
        assert_eq!(period.end, Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let now = reference_now();
        let a = PeriodSpec::Weekly { offset: 3 }.resolve(now).unwrap();
        let b = PeriodSpec::Weekly { offset: 3 }.resolve(now).unwrap();
        assert_eq!(a, b);
    }
}
