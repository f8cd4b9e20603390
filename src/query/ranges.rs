use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Timestamp layout bound into DuckDB `CAST(? AS TIMESTAMP)` parameters.
const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A closed time window: an event at `t` is inside when `start <= t <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The whole local calendar day `date` in `tz`.
    pub fn day(date: NaiveDate, tz: Tz) -> Self {
        Self::new(start_of_day(date, tz), end_of_day(date, tz))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// `true` when no instant can satisfy the window (start after end).
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn start_sql(&self) -> String {
        format_timestamp(self.start)
    }

    pub fn end_sql(&self) -> String {
        format_timestamp(self.end)
    }
}

/// Format an instant as a naive UTC timestamp string DuckDB can cast.
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(SQL_TIMESTAMP_FORMAT).to_string()
}

/// Convert DuckDB `epoch_us(...)` output back into an instant.
pub fn timestamp_from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::UNIX_EPOCH)
}

/// First instant of the local day `date` in `tz`.
///
/// When local midnight falls into a DST gap the day starts at the first
/// local time that exists, one hour later.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    local_to_utc(tz, midnight)
        .or_else(|| local_to_utc(tz, midnight + TimeDelta::hours(1)))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Last representable instant (microsecond precision) of the local day `date`.
pub fn end_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    start_of_day(next, tz) - TimeDelta::microseconds(1)
}

/// First instant of the local month containing `date`.
pub fn start_of_month(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    start_of_day(date.with_day(1).unwrap_or(date), tz)
}

fn local_to_utc(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// The four windows a website snapshot is built from, all derived from a
/// single captured `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRanges {
    pub today: DateRange,
    pub yesterday: DateRange,
    pub this_month: DateRange,
    pub since_creation: DateRange,
}

impl SnapshotRanges {
    pub fn at(now: DateTime<Utc>, created_at: DateTime<Utc>, tz: Tz) -> Self {
        let today = now.with_timezone(&tz).date_naive();
        let yesterday = today.pred_opt().unwrap_or(today);

        Self {
            today: DateRange::day(today, tz),
            yesterday: DateRange::day(yesterday, tz),
            this_month: DateRange::new(start_of_month(today, tz), end_of_day(today, tz)),
            since_creation: DateRange::new(created_at, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_day_bounds_utc() {
        let range = DateRange::day(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), Tz::UTC);
        assert_eq!(range.start, utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(
            range.end,
            utc(2024, 3, 16, 0, 0, 0) - TimeDelta::microseconds(1)
        );
        assert_eq!(range.start_sql(), "2024-03-15 00:00:00.000000");
        assert_eq!(range.end_sql(), "2024-03-15 23:59:59.999999");
    }

    #[test]
    fn test_day_bounds_in_offset_zone() {
        let tz: Tz = "Asia/Tokyo".parse().unwrap();
        let range = DateRange::day(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), tz);
        // Tokyo is UTC+9 with no DST.
        assert_eq!(range.start, utc(2024, 3, 14, 15, 0, 0));
        assert_eq!(range.end_sql(), "2024-03-15 14:59:59.999999");
    }

    #[test]
    fn test_start_of_day_in_dst_gap() {
        // Santiago skips 00:00-01:00 local when DST starts.
        let tz: Tz = "America/Santiago".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2023, 9, 3).unwrap();
        let start = start_of_day(date, tz);
        assert_eq!(start.with_timezone(&tz).date_naive(), date);
    }

    #[test]
    fn test_snapshot_ranges_mid_month() {
        let now = utc(2024, 3, 15, 12, 0, 0);
        let created = utc(2024, 1, 1, 0, 0, 0);
        let ranges = SnapshotRanges::at(now, created, Tz::UTC);

        assert_eq!(ranges.today.start, utc(2024, 3, 15, 0, 0, 0));
        assert_eq!(ranges.yesterday.start, utc(2024, 3, 14, 0, 0, 0));
        assert_eq!(ranges.yesterday.end_sql(), "2024-03-14 23:59:59.999999");
        assert_eq!(ranges.this_month.start, utc(2024, 3, 1, 0, 0, 0));
        assert_eq!(ranges.this_month.end, ranges.today.end);
        assert_eq!(ranges.since_creation, DateRange::new(created, now));
    }

    #[test]
    fn test_snapshot_ranges_first_of_month() {
        // Yesterday belongs to the previous month and is outside this month.
        let now = utc(2024, 3, 1, 8, 0, 0);
        let ranges = SnapshotRanges::at(now, utc(2024, 1, 1, 0, 0, 0), Tz::UTC);
        assert_eq!(ranges.yesterday.start, utc(2024, 2, 29, 0, 0, 0));
        assert_eq!(ranges.this_month.start, ranges.today.start);
        assert!(!ranges.this_month.contains(ranges.yesterday.end));
    }

    #[test]
    fn test_snapshot_ranges_follow_local_date() {
        // 23:30 UTC on the 15th is already the 16th in Berlin (UTC+1).
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let now = utc(2024, 1, 15, 23, 30, 0);
        let ranges = SnapshotRanges::at(now, utc(2024, 1, 1, 0, 0, 0), tz);
        assert_eq!(ranges.today.start, utc(2024, 1, 15, 23, 0, 0));
        assert_eq!(ranges.yesterday.start, utc(2024, 1, 14, 23, 0, 0));
    }

    #[test]
    fn test_created_after_now_is_empty() {
        let now = utc(2024, 3, 15, 12, 0, 0);
        let ranges = SnapshotRanges::at(now, utc(2024, 3, 16, 0, 0, 0), Tz::UTC);
        assert!(ranges.since_creation.is_empty());
        assert!(!ranges.today.is_empty());
    }

    #[test]
    fn test_timestamp_from_micros() {
        let instant = utc(2024, 1, 1, 0, 0, 0);
        assert_eq!(timestamp_from_micros(instant.timestamp_micros()), instant);
    }
}
