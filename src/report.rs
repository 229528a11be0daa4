//! Bucketed aggregation of committed values for dashboards.
//!
//! The fiscal year starts in April: month and quarter buckets are ordered
//! April first. Records are bucketed by the start date of their interval.

use std::ops::AddAssign;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{DateRange, ReservationInterval};

const FISCAL_YEAR_START_MONTH: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketMode {
    DayOfWeek,
    DayOfMonth,
    Month,
    Quarter,
}

impl BucketMode {
    pub fn bucket_count(&self) -> usize {
        match self {
            BucketMode::DayOfWeek => 7,
            BucketMode::DayOfMonth => 31,
            BucketMode::Month => 12,
            BucketMode::Quarter => 4,
        }
    }

    /// Always `< bucket_count()`.
    pub fn bucket_index(&self, date: NaiveDate) -> usize {
        match self {
            BucketMode::DayOfWeek => date.weekday().num_days_from_sunday() as usize,
            BucketMode::DayOfMonth => date.day0() as usize,
            BucketMode::Month => {
                let m = date.month();
                if m < FISCAL_YEAR_START_MONTH {
                    (m + 8) as usize
                } else {
                    (m - FISCAL_YEAR_START_MONTH) as usize
                }
            }
            BucketMode::Quarter => {
                let q = date.month0() / 3 + 1;
                if q < 2 { (q + 2) as usize } else { (q - 2) as usize }
            }
        }
    }

    pub fn labels(&self) -> Vec<String> {
        match self {
            BucketMode::DayOfWeek => ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            BucketMode::DayOfMonth => (1..=31).map(|d| d.to_string()).collect(),
            BucketMode::Month => [
                "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec", "Jan", "Feb", "Mar",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            BucketMode::Quarter => (1..=4).map(|q| format!("Q{q}")).collect(),
        }
    }
}

/// Dashboard grouping selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportGrouping {
    Reset,
    Week,
    Month,
    Quarter,
    Year,
}

impl ReportGrouping {
    pub fn bucket_mode(&self) -> BucketMode {
        match self {
            ReportGrouping::Reset | ReportGrouping::Quarter => BucketMode::Month,
            ReportGrouping::Week => BucketMode::DayOfWeek,
            ReportGrouping::Month => BucketMode::DayOfMonth,
            ReportGrouping::Year => BucketMode::Quarter,
        }
    }

    /// The period containing `today` that this grouping reports on.
    pub fn default_range(&self, today: NaiveDate) -> DateRange {
        match self {
            ReportGrouping::Reset | ReportGrouping::Year => fiscal_year(today),
            ReportGrouping::Quarter => {
                let first_month = today.month0() / 3 * 3 + 1;
                let start = first_of(today.year(), first_month);
                DateRange::new(start, last_day_before(add_months(start, 3)))
            }
            ReportGrouping::Month => {
                let start = first_of(today.year(), today.month());
                DateRange::new(start, last_day_before(add_months(start, 1)))
            }
            ReportGrouping::Week => {
                let back = today.weekday().num_days_from_sunday() as u64;
                let start = today - Days::new(back);
                DateRange::new(start, start + Days::new(6))
            }
        }
    }
}

fn first_of(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn add_months(first: NaiveDate, months: u32) -> NaiveDate {
    first
        .checked_add_months(chrono::Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

fn last_day_before(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

fn fiscal_year(today: NaiveDate) -> DateRange {
    let start_year = if today.month() >= FISCAL_YEAR_START_MONTH {
        today.year()
    } else {
        today.year() - 1
    };
    let start = first_of(start_year, FISCAL_YEAR_START_MONTH);
    DateRange::new(start, last_day_before(add_months(start, 12)))
}

/// Sum `(date, value)` records into a zero-filled bucket array.
pub fn aggregate_dated<V>(records: impl IntoIterator<Item = (NaiveDate, V)>, mode: BucketMode) -> Vec<V>
where
    V: Copy + Default + AddAssign,
{
    let mut buckets = vec![V::default(); mode.bucket_count()];
    for (date, value) in records {
        buckets[mode.bucket_index(date)] += value;
    }
    buckets
}

pub fn aggregate_by_bucket<V>(
    intervals: &[ReservationInterval],
    mode: BucketMode,
    value: impl Fn(&ReservationInterval) -> V,
) -> Vec<V>
where
    V: Copy + Default + AddAssign,
{
    aggregate_dated(intervals.iter().map(|i| (i.range.start, value(i))), mode)
}

/// Intervals starting inside `range`, bucketed the way `grouping` displays them.
pub fn aggregate_report<V>(
    intervals: &[ReservationInterval],
    range: DateRange,
    grouping: ReportGrouping,
    value: impl Fn(&ReservationInterval) -> V,
) -> Vec<V>
where
    V: Copy + Default + AddAssign,
{
    aggregate_dated(
        intervals
            .iter()
            .filter(|i| range.contains_day(i.range.start))
            .map(|i| (i.range.start, value(i))),
        grouping.bucket_mode(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReservationKind;
    use ulid::Ulid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn starting(start: NaiveDate, units: u32) -> ReservationInterval {
        ReservationInterval {
            item_id: Ulid::new(),
            consumer_id: Ulid::new(),
            kind: ReservationKind::Booking,
            range: DateRange::new(start, start + Days::new(3)),
            units,
        }
    }

    #[test]
    fn fiscal_month_boundaries() {
        let m = BucketMode::Month;
        assert_eq!(m.bucket_index(d(2024, 1, 15)), 9);
        assert_eq!(m.bucket_index(d(2024, 3, 31)), 11);
        assert_eq!(m.bucket_index(d(2024, 4, 1)), 0);
        assert_eq!(m.bucket_index(d(2024, 12, 1)), 8);
    }

    #[test]
    fn fiscal_quarter_boundaries() {
        let q = BucketMode::Quarter;
        assert_eq!(q.bucket_index(d(2024, 2, 1)), 3);
        assert_eq!(q.bucket_index(d(2024, 4, 1)), 0);
        assert_eq!(q.bucket_index(d(2024, 8, 1)), 1);
        assert_eq!(q.bucket_index(d(2024, 12, 31)), 2);
    }

    #[test]
    fn day_buckets() {
        // 2024-01-07 is a Sunday.
        assert_eq!(BucketMode::DayOfWeek.bucket_index(d(2024, 1, 7)), 0);
        assert_eq!(BucketMode::DayOfWeek.bucket_index(d(2024, 1, 13)), 6);
        assert_eq!(BucketMode::DayOfMonth.bucket_index(d(2024, 1, 31)), 30);
        assert_eq!(BucketMode::DayOfMonth.bucket_index(d(2024, 2, 1)), 0);
    }

    #[test]
    fn labels_match_bucket_count() {
        for mode in [BucketMode::DayOfWeek, BucketMode::DayOfMonth, BucketMode::Month, BucketMode::Quarter] {
            assert_eq!(mode.labels().len(), mode.bucket_count());
        }
        assert_eq!(BucketMode::Month.labels()[9], "Jan");
    }

    #[test]
    fn wednesday_values_sum_into_one_bucket() {
        // 2024-01-10 and 2024-01-17 are Wednesdays.
        let records = vec![(d(2024, 1, 10), 100u64), (d(2024, 1, 17), 50)];
        let buckets = aggregate_dated(records, BucketMode::DayOfWeek);
        assert_eq!(buckets, vec![0, 0, 0, 150, 0, 0, 0]);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let buckets: Vec<f64> = aggregate_dated(Vec::new(), BucketMode::Quarter);
        assert_eq!(buckets, vec![0.0; 4]);
    }

    #[test]
    fn by_bucket_uses_start_date() {
        // Starts in March, runs into April.
        let intervals = vec![starting(d(2024, 3, 30), 2), starting(d(2024, 4, 2), 5)];
        let buckets = aggregate_by_bucket(&intervals, BucketMode::Month, |i| i.units);
        assert_eq!(buckets[11], 2);
        assert_eq!(buckets[0], 5);
    }

    #[test]
    fn report_filters_by_start_date() {
        let intervals = vec![
            starting(d(2024, 3, 31), 1),
            starting(d(2024, 4, 1), 2),
            starting(d(2025, 3, 31), 4),
            starting(d(2025, 4, 1), 8),
        ];
        let range = ReportGrouping::Year.default_range(d(2024, 6, 15));
        let buckets = aggregate_report(&intervals, range, ReportGrouping::Year, |i| i.units);
        assert_eq!(buckets, vec![2, 0, 0, 4]);
    }

    #[test]
    fn grouping_modes() {
        assert_eq!(ReportGrouping::Reset.bucket_mode(), BucketMode::Month);
        assert_eq!(ReportGrouping::Week.bucket_mode(), BucketMode::DayOfWeek);
        assert_eq!(ReportGrouping::Month.bucket_mode(), BucketMode::DayOfMonth);
        assert_eq!(ReportGrouping::Quarter.bucket_mode(), BucketMode::Month);
        assert_eq!(ReportGrouping::Year.bucket_mode(), BucketMode::Quarter);
    }

    #[test]
    fn default_ranges() {
        let today = d(2024, 2, 14); // Wednesday
        assert_eq!(
            ReportGrouping::Reset.default_range(today),
            DateRange::new(d(2023, 4, 1), d(2024, 3, 31))
        );
        assert_eq!(
            ReportGrouping::Year.default_range(d(2024, 4, 1)),
            DateRange::new(d(2024, 4, 1), d(2025, 3, 31))
        );
        assert_eq!(
            ReportGrouping::Quarter.default_range(today),
            DateRange::new(d(2024, 1, 1), d(2024, 3, 31))
        );
        assert_eq!(
            ReportGrouping::Month.default_range(today),
            DateRange::new(d(2024, 2, 1), d(2024, 2, 29))
        );
        assert_eq!(
            ReportGrouping::Week.default_range(today),
            DateRange::new(d(2024, 2, 11), d(2024, 2, 17))
        );
    }
}
