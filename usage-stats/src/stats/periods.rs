//! Calendar periods and the mapping from periods to sample index ranges.
//!
//! Periods are aligned either to UTC or to the civil time of the first
//! sample. Local alignment uses the first sample's offset for the whole
//! series, so a daylight-saving transition inside the series shifts every
//! later boundary by the size of the transition.

use std::{fmt, ops::Range, str::FromStr};

use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::StatsError;
use crate::stats::sample_period::sample_period;

const SECS_PER_MINUTE: f64 = 60.0;
const SECS_PER_HOUR: f64 = 3_600.0;
const SECS_PER_DAY: f64 = 86_400.0;

/// Default multiple of the per-period sample bound scanned for each period.
pub const DEFAULT_WINDOW_FACTOR: f64 = 2.0;

/// Calendar-aligned bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum Granularity {
    Yearly,
    Monthly,
    Daily,
    Hourly,
    Minutely,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yearly => "yearly",
            Self::Monthly => "monthly",
            Self::Daily => "daily",
            Self::Hourly => "hourly",
            Self::Minutely => "minutely",
        }
    }

    /// Standard calendar-period code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Yearly => "A",
            Self::Monthly => "M",
            Self::Daily => "D",
            Self::Hourly => "H",
            Self::Minutely => "T",
        }
    }

    /// Nominal duration of one period in seconds.
    ///
    /// Years count as 365 days and months as 30 days.
    pub fn nominal_seconds(&self) -> f64 {
        match self {
            Self::Yearly => 365.0 * SECS_PER_DAY,
            Self::Monthly => 30.0 * SECS_PER_DAY,
            Self::Daily => SECS_PER_DAY,
            Self::Hourly => SECS_PER_HOUR,
            Self::Minutely => SECS_PER_MINUTE,
        }
    }

    /// Duration in seconds of the longest calendar instance (31-day month, leap year).
    pub fn longest_seconds(&self) -> f64 {
        match self {
            Self::Yearly => 366.0 * SECS_PER_DAY,
            Self::Monthly => 31.0 * SECS_PER_DAY,
            other => other.nominal_seconds(),
        }
    }

    fn floor(&self, at: PrimitiveDateTime) -> Result<PrimitiveDateTime, StatsError> {
        let date = at.date();
        let floored = match self {
            Self::Yearly => Date::from_calendar_date(date.year(), Month::January, 1)
                .map_err(out_of_range)?
                .midnight(),
            Self::Monthly => date.replace_day(1).map_err(out_of_range)?.midnight(),
            Self::Daily => date.midnight(),
            Self::Hourly => at.replace_time(Time::from_hms(at.hour(), 0, 0).map_err(out_of_range)?),
            Self::Minutely => {
                at.replace_time(Time::from_hms(at.hour(), at.minute(), 0).map_err(out_of_range)?)
            }
        };
        Ok(floored)
    }

    fn advance(&self, start: PrimitiveDateTime) -> Result<PrimitiveDateTime, StatsError> {
        let date = start.date();
        let next = match self {
            Self::Yearly => Date::from_calendar_date(date.year() + 1, Month::January, 1)
                .map_err(out_of_range)?
                .midnight(),
            Self::Monthly => {
                let (year, month) = match date.month() {
                    Month::December => (date.year() + 1, Month::January),
                    month => (date.year(), month.next()),
                };
                Date::from_calendar_date(year, month, 1)
                    .map_err(out_of_range)?
                    .midnight()
            }
            Self::Daily => date
                .next_day()
                .ok_or_else(|| StatsError::OutOfRange(format!("no day after {date}")))?
                .midnight(),
            Self::Hourly => start
                .checked_add(Duration::HOUR)
                .ok_or_else(|| StatsError::OutOfRange(format!("no hour after {start}")))?,
            Self::Minutely => start
                .checked_add(Duration::MINUTE)
                .ok_or_else(|| StatsError::OutOfRange(format!("no minute after {start}")))?,
        };
        Ok(next)
    }
}

fn out_of_range(e: time::error::ComponentRange) -> StatsError {
    StatsError::OutOfRange(e.to_string())
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = StatsError;

    /// Accepts the long tokens (`daily`, ...) case-insensitively and the
    /// calendar codes `A`/`Y`, `M`, `D`, `H`, `T`/`min`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "Y" => return Ok(Self::Yearly),
            "M" => return Ok(Self::Monthly),
            "D" => return Ok(Self::Daily),
            "H" => return Ok(Self::Hourly),
            "T" | "min" => return Ok(Self::Minutely),
            _ => {}
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "yearly" | "annual" | "annually" => Ok(Self::Yearly),
            "monthly" => Ok(Self::Monthly),
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "minutely" => Ok(Self::Minutely),
            _ => Err(StatsError::InvalidGranularity(s.to_string())),
        }
    }
}

impl TryFrom<String> for Granularity {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Granularity> for String {
    fn from(value: Granularity) -> Self {
        value.as_str().to_string()
    }
}

/// A half-open calendar interval `[start, end)` in a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    granularity: Granularity,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
    offset: UtcOffset,
}

impl Period {
    /// The period of `granularity` containing `at`, with civil boundaries in `offset`.
    pub fn containing(
        at: OffsetDateTime,
        granularity: Granularity,
        offset: UtcOffset,
    ) -> Result<Self, StatsError> {
        let local = at.to_offset(offset);
        let start = granularity.floor(PrimitiveDateTime::new(local.date(), local.time()))?;
        Self::starting_at(start, granularity, offset)
    }

    fn starting_at(
        start: PrimitiveDateTime,
        granularity: Granularity,
        offset: UtcOffset,
    ) -> Result<Self, StatsError> {
        Ok(Self {
            granularity,
            start,
            end: granularity.advance(start)?,
            offset,
        })
    }

    /// The period immediately after this one.
    pub fn next(&self) -> Result<Self, StatsError> {
        Self::starting_at(self.end, self.granularity, self.offset)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn start_time(&self) -> OffsetDateTime {
        self.start.assume_offset(self.offset)
    }

    /// First instant after the period.
    pub fn end_time(&self) -> OffsetDateTime {
        self.end.assume_offset(self.offset)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, at: OffsetDateTime) -> bool {
        self.start_time() <= at && at < self.end_time()
    }

    /// Canonical label, e.g. `2011`, `2011-04`, `2011-04-19`, `2011-04-19 13:00`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (date, time) = (self.start.date(), self.start.time());
        let (year, month, day) = (date.year(), u8::from(date.month()), date.day());
        match self.granularity {
            Granularity::Yearly => write!(f, "{year:04}"),
            Granularity::Monthly => write!(f, "{year:04}-{month:02}"),
            Granularity::Daily => write!(f, "{year:04}-{month:02}-{day:02}"),
            Granularity::Hourly | Granularity::Minutely => write!(
                f,
                "{year:04}-{month:02}-{day:02} {:02}:{:02}",
                time.hour(),
                time.minute()
            ),
        }
    }
}

/// Contiguous periods from the one containing `first` to the one containing `last`.
pub fn period_range(
    first: OffsetDateTime,
    last: OffsetDateTime,
    granularity: Granularity,
    offset: UtcOffset,
) -> Result<Vec<Period>, StatsError> {
    let mut periods = Vec::new();
    let mut period = Period::containing(first, granularity, offset)?;
    loop {
        let covers_last = last < period.end_time();
        periods.push(period);
        if covers_last {
            return Ok(periods);
        }
        period = period.next()?;
    }
}

/// Offset whose civil time the periods follow.
pub fn alignment_offset(timestamps: &[OffsetDateTime], use_local_time: bool) -> UtcOffset {
    match timestamps.first() {
        Some(first) if use_local_time => first.offset(),
        _ => UtcOffset::UTC,
    }
}

/// Upper bound on the number of samples one period can hold.
pub fn max_samples_per_period(granularity: Granularity, sample_period_secs: f64) -> f64 {
    granularity.nominal_seconds() / sample_period_secs
}

/// Periods spanning a series and the sample index range of each.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryMap {
    periods: Vec<Period>,
    ranges: Vec<Option<Range<usize>>>,
    examined: usize,
}

impl BoundaryMap {
    /// Every period, in order, including those without samples.
    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Index range for `period`; `None` when it has no samples or is not part of the map.
    pub fn get(&self, period: &Period) -> Option<Range<usize>> {
        let i = self.periods.binary_search(period).ok()?;
        self.ranges[i].clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Period, Option<Range<usize>>)> + '_ {
        self.periods.iter().zip(self.ranges.iter().cloned())
    }

    /// Number of periods with at least one sample.
    pub fn populated(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_some()).count()
    }

    /// Total timestamp comparisons made while resolving the boundaries.
    pub fn examined(&self) -> usize {
        self.examined
    }
}

/// Partition sorted `timestamps` into per-period index ranges.
///
/// Each period is searched in a window of `window_factor` times the sample
/// count of the longest instance of the granularity, starting where the previous populated period
/// ended. Samples beyond a window that is too short for irregular data are
/// not attributed to that period.
pub fn resolve_boundaries(
    timestamps: &[OffsetDateTime],
    granularity: Granularity,
    use_local_time: bool,
    window_factor: f64,
) -> Result<BoundaryMap, StatsError> {
    let period_secs = sample_period(timestamps)?;
    resolve_boundaries_with_sample_period(
        timestamps,
        granularity,
        use_local_time,
        window_factor,
        period_secs,
    )
}

pub(crate) fn resolve_boundaries_with_sample_period(
    timestamps: &[OffsetDateTime],
    granularity: Granularity,
    use_local_time: bool,
    window_factor: f64,
    sample_period_secs: f64,
) -> Result<BoundaryMap, StatsError> {
    if !(window_factor.is_finite() && window_factor >= 1.0) {
        return Err(StatsError::Configuration(format!(
            "window factor must be a finite value >= 1, got {window_factor}"
        )));
    }
    let (first, last) = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(StatsError::InputType(
                "cannot resolve periods of an empty time axis".to_string(),
            ))
        }
    };

    let offset = alignment_offset(timestamps, use_local_time);
    let periods = period_range(first, last, granularity, offset)?;

    let max_samples = (granularity.longest_seconds() / sample_period_secs).ceil().max(1.0);
    let window_len = (max_samples * window_factor).ceil() as usize;

    let mut ranges = Vec::with_capacity(periods.len());
    let mut processed = 0_usize;
    let mut examined = 0_usize;
    for period in &periods {
        let end = period.end_time();
        let window_end = timestamps.len().min(processed.saturating_add(window_len));
        let window = &timestamps[processed..window_end];

        let n_in_period = window.iter().take_while(|ts| **ts < end).count();
        examined += window.len().min(n_in_period + 1);

        if n_in_period > 0 {
            ranges.push(Some(processed..processed + n_in_period));
            processed += n_in_period;
        } else {
            ranges.push(None);
        }
    }

    tracing::debug!(
        granularity = %granularity,
        %offset,
        periods = periods.len(),
        window_len,
        examined,
        unassigned = timestamps.len() - processed,
        "resolved period boundaries"
    );

    Ok(BoundaryMap {
        periods,
        ranges,
        examined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    fn regular(start: OffsetDateTime, n: usize, gap: Duration) -> Vec<OffsetDateTime> {
        (0..n).map(|i| start + gap * i as u32).collect()
    }

    #[test]
    fn granularity_parses_tokens_and_codes() {
        assert_eq!("daily".parse::<Granularity>().unwrap(), Granularity::Daily);
        assert_eq!("Hourly".parse::<Granularity>().unwrap(), Granularity::Hourly);
        assert_eq!("A".parse::<Granularity>().unwrap(), Granularity::Yearly);
        assert_eq!("M".parse::<Granularity>().unwrap(), Granularity::Monthly);
        assert_eq!("T".parse::<Granularity>().unwrap(), Granularity::Minutely);
        assert!(matches!(
            "fortnightly".parse::<Granularity>(),
            Err(StatsError::InvalidGranularity(_))
        ));
    }

    #[test]
    fn period_labels_follow_granularity() {
        let at = datetime!(2011-04-19 13:05:42 UTC);
        let label = |g| Period::containing(at, g, offset!(UTC)).unwrap().label();
        assert_eq!(label(Granularity::Yearly), "2011");
        assert_eq!(label(Granularity::Monthly), "2011-04");
        assert_eq!(label(Granularity::Daily), "2011-04-19");
        assert_eq!(label(Granularity::Hourly), "2011-04-19 13:00");
        assert_eq!(label(Granularity::Minutely), "2011-04-19 13:05");
    }

    #[test]
    fn monthly_periods_roll_over_the_year() {
        let p = Period::containing(datetime!(2011-12-31 23:59:59 UTC), Granularity::Monthly, offset!(UTC))
            .unwrap();
        assert_eq!(p.end_time(), datetime!(2012-01-01 00:00:00 UTC));
        assert_eq!(p.next().unwrap().label(), "2012-01");
        assert_eq!(p.duration(), Duration::days(31));
    }

    #[test]
    fn local_period_boundaries_sit_at_local_midnight() {
        let p = Period::containing(datetime!(2011-04-19 02:00:00 UTC), Granularity::Daily, offset!(-4))
            .unwrap();
        assert_eq!(p.label(), "2011-04-18");
        assert_eq!(p.start_time(), datetime!(2011-04-18 04:00:00 UTC));
        assert_eq!(p.end_time(), datetime!(2011-04-19 04:00:00 UTC));
        assert!(p.contains(datetime!(2011-04-19 03:59:59 UTC)));
        assert!(!p.contains(datetime!(2011-04-19 04:00:00 UTC)));
    }

    #[test]
    fn period_range_spans_first_to_last() {
        let periods = period_range(
            datetime!(2011-04-18 09:22:13 UTC),
            datetime!(2011-05-24 15:56:34 UTC),
            Granularity::Daily,
            offset!(UTC),
        )
        .unwrap();
        assert_eq!(periods.len(), 37);
        assert_eq!(periods[0].label(), "2011-04-18");
        assert_eq!(periods[36].label(), "2011-05-24");
    }

    #[test]
    fn ranges_are_disjoint_ascending_and_cover_the_series() {
        let axis = regular(datetime!(2024-01-01 05:00:00 UTC), 3 * 24 * 60, Duration::minutes(1));
        let map = resolve_boundaries(&axis, Granularity::Daily, false, DEFAULT_WINDOW_FACTOR).unwrap();

        assert_eq!(map.periods().len(), 4);
        let ranges: Vec<_> = map.iter().filter_map(|(_, r)| r).collect();
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, axis.len());
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
        for (period, range) in map.iter() {
            let range = range.unwrap();
            assert!(axis[range].iter().all(|ts| period.contains(*ts)));
        }
    }

    #[test]
    fn empty_periods_are_absent_from_the_map() {
        let start = datetime!(2024-01-01 00:00:00 UTC);
        let mut axis = regular(start, 24, Duration::hours(1));
        axis.extend(regular(start + Duration::days(3), 24, Duration::hours(1)));

        let map = resolve_boundaries(&axis, Granularity::Daily, false, DEFAULT_WINDOW_FACTOR).unwrap();
        let periods = map.periods();
        assert_eq!(periods.len(), 4);
        assert_eq!(map.get(&periods[0]), Some(0..24));
        assert_eq!(map.get(&periods[1]), None);
        assert_eq!(map.get(&periods[2]), None);
        assert_eq!(map.get(&periods[3]), Some(24..48));
        assert_eq!(map.populated(), 2);
    }

    #[test]
    fn examined_indices_stay_linear_in_series_length() {
        let axis = regular(datetime!(2024-01-01 00:00:00 UTC), 200_000, Duration::seconds(6));
        let map = resolve_boundaries(&axis, Granularity::Hourly, false, DEFAULT_WINDOW_FACTOR).unwrap();

        let covered: usize = map.iter().filter_map(|(_, r)| r).map(|r| r.len()).sum();
        assert_eq!(covered, axis.len());
        assert!(map.examined() <= axis.len() + map.periods().len());
    }

    #[test]
    fn local_alignment_shifts_boundaries_by_the_offset() {
        let start = datetime!(2024-01-01 00:00:00 -4);
        let axis = regular(start, 48, Duration::hours(1));

        let local = resolve_boundaries(&axis, Granularity::Daily, true, DEFAULT_WINDOW_FACTOR).unwrap();
        let utc = resolve_boundaries(&axis, Granularity::Daily, false, DEFAULT_WINDOW_FACTOR).unwrap();

        let local_ranges: Vec<_> = local.iter().filter_map(|(_, r)| r).collect();
        let utc_ranges: Vec<_> = utc.iter().filter_map(|(_, r)| r).collect();
        assert_eq!(local.periods()[0].label(), "2024-01-01");
        assert_eq!(local_ranges, vec![0..24, 24..48]);
        // 00:00-04:00 is 04:00 UTC, so the UTC day ends 20 samples in.
        assert_eq!(utc.periods()[0].label(), "2024-01-01");
        assert_eq!(utc_ranges, vec![0..20, 20..44, 44..48]);
    }

    #[test]
    fn unit_window_factor_keeps_31_day_months_whole() {
        let axis = regular(datetime!(2024-01-01 00:00:00 UTC), 60 * 24, Duration::hours(1));
        let map = resolve_boundaries(&axis, Granularity::Monthly, false, 1.0).unwrap();

        let periods = map.periods();
        assert_eq!(periods.len(), 2);
        assert_eq!(map.get(&periods[0]), Some(0..31 * 24));
        assert_eq!(map.get(&periods[1]), Some(31 * 24..60 * 24));
        for (period, range) in map.iter() {
            assert!(axis[range.unwrap()].iter().all(|ts| period.contains(*ts)));
        }
    }

    #[test]
    fn unit_window_factor_keeps_leap_years_whole() {
        let axis = regular(datetime!(2024-01-01 00:00:00 UTC), 400, Duration::days(1));
        let map = resolve_boundaries(&axis, Granularity::Yearly, false, 1.0).unwrap();

        let periods = map.periods();
        assert_eq!(map.get(&periods[0]), Some(0..366));
        assert_eq!(map.get(&periods[1]), Some(366..400));
    }

    #[test]
    fn window_factor_below_one_is_rejected() {
        let axis = regular(datetime!(2024-01-01 00:00:00 UTC), 10, Duration::minutes(1));
        let res = resolve_boundaries(&axis, Granularity::Hourly, false, 0.5);
        assert!(matches!(res, Err(StatsError::Configuration(_))));
    }

    #[test]
    fn short_window_leaves_dense_bursts_for_later_periods() {
        // One sample per hour is the mode, but the second hour holds a
        // burst far denser than the window allows.
        let start = datetime!(2024-01-01 00:00:00 UTC);
        let mut axis = regular(start, 10, Duration::hours(1));
        axis.insert(2, start + Duration::hours(1) + Duration::minutes(30));
        axis.insert(3, start + Duration::hours(1) + Duration::minutes(40));

        let map = resolve_boundaries(&axis, Granularity::Hourly, false, DEFAULT_WINDOW_FACTOR).unwrap();
        let periods = map.periods();
        assert_eq!(map.get(&periods[1]), Some(1..3));
        assert_eq!(map.get(&periods[2]), Some(3..5));
    }
}
