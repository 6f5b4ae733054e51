use std::ops::Range;

use time::{Duration, OffsetDateTime};

use crate::error::StatsError;

/// Time-ordered power readings for a single load.
///
/// Reading `i` is the power in watts observed at `timestamps[i]` and is taken
/// to hold until `timestamps[i + 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSeries {
    timestamps: Vec<OffsetDateTime>,
    watts: Vec<f64>,
}

impl PowerSeries {
    /// Builds a series from parallel timestamp and reading vectors.
    ///
    /// Rules:
    /// - both vectors have the same length;
    /// - at least two samples;
    /// - timestamps strictly increase.
    pub fn new(timestamps: Vec<OffsetDateTime>, watts: Vec<f64>) -> Result<Self, StatsError> {
        if timestamps.len() != watts.len() {
            return Err(StatsError::MalformedSeries(format!(
                "{} timestamps but {} readings",
                timestamps.len(),
                watts.len()
            )));
        }
        if timestamps.len() < 2 {
            return Err(StatsError::MalformedSeries(
                "at least two samples are required".to_string(),
            ));
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(StatsError::MalformedSeries(format!(
                "timestamps must strictly increase; sample {} ({}) does not follow sample {} ({})",
                i + 1,
                timestamps[i + 1],
                i,
                timestamps[i]
            )));
        }

        Ok(Self { timestamps, watts })
    }

    pub fn from_readings<I>(readings: I) -> Result<Self, StatsError>
    where
        I: IntoIterator<Item = (OffsetDateTime, f64)>,
    {
        let (timestamps, watts) = readings.into_iter().unzip();
        Self::new(timestamps, watts)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Always false for a constructed series.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[OffsetDateTime] {
        &self.timestamps
    }

    pub fn watts(&self) -> &[f64] {
        &self.watts
    }

    /// Borrowed view over the whole series.
    pub fn view(&self) -> SeriesView<'_> {
        SeriesView {
            timestamps: &self.timestamps,
            watts: &self.watts,
        }
    }

    /// Borrowed view over the half-open index range `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<SeriesView<'_>, StatsError> {
        match (self.timestamps.get(range.clone()), self.watts.get(range.clone())) {
            (Some(timestamps), Some(watts)) => Ok(SeriesView { timestamps, watts }),
            _ => Err(StatsError::Configuration(format!(
                "index range {}..{} outside series of length {}",
                range.start,
                range.end,
                self.len()
            ))),
        }
    }
}

/// A contiguous sub-range of a [`PowerSeries`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesView<'a> {
    timestamps: &'a [OffsetDateTime],
    watts: &'a [f64],
}

impl<'a> SeriesView<'a> {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &'a [OffsetDateTime] {
        self.timestamps
    }

    pub fn watts(&self) -> &'a [f64] {
        self.watts
    }

    pub fn first_timestamp(&self) -> Option<OffsetDateTime> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<OffsetDateTime> {
        self.timestamps.last().copied()
    }

    /// Time between the first and last sample; zero for fewer than two samples.
    pub fn duration(&self) -> Duration {
        match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => last - first,
            _ => Duration::ZERO,
        }
    }

    /// `(reading, seconds until the next sample)` for every sample except the last.
    pub fn held_readings(&self) -> impl Iterator<Item = (f64, f64)> + 'a {
        let (timestamps, watts) = (self.timestamps, self.watts);
        timestamps
            .windows(2)
            .zip(watts)
            .map(|(pair, &watts)| (watts, (pair[1] - pair[0]).as_seconds_f64()))
    }
}
