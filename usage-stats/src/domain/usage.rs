use time::OffsetDateTime;

use crate::stats::{periods::Period, single::EnergyUnit};

/// Why a row holds (or lacks) statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum RowStatus {
    Populated {
        n_samples: usize,
    },
    /// The period had no samples at all.
    NoData,
    /// Fewer samples than the sufficiency policy allows.
    InsufficientSamples {
        n_samples: usize,
        dropout_rate: f64,
        start: OffsetDateTime,
        end: OffsetDateTime,
    },
}

impl RowStatus {
    pub fn is_missing(&self) -> bool {
        !matches!(self, Self::Populated { .. })
    }

    /// Human-readable reason a period was excluded, `None` for populated rows.
    pub fn diagnostic(&self, label: &str) -> Option<String> {
        match self {
            Self::Populated { .. } => None,
            Self::NoData => Some(format!("No data available for {label}")),
            Self::InsufficientSamples {
                n_samples,
                dropout_rate,
                start,
                end,
            } => Some(format!(
                "Insufficient samples for {label}; n samples = {n_samples}; dropout_rate = {:.2}%; start = {start}; end = {end}",
                dropout_rate * 100.0
            )),
        }
    }
}

/// Usage statistics for one period. Missing values are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRow {
    pub period: Period,
    pub hours_on: Option<f64>,
    pub energy: Option<f64>,
    pub status: RowStatus,
}

impl UsageRow {
    pub fn missing(period: Period, status: RowStatus) -> Self {
        Self {
            period,
            hours_on: None,
            energy: None,
            status,
        }
    }

    pub fn label(&self) -> String {
        self.period.label()
    }
}

/// One row per period, in period order, covering every period of the series.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageTable {
    energy_unit: EnergyUnit,
    rows: Vec<UsageRow>,
}

impl UsageTable {
    pub fn new(energy_unit: EnergyUnit, rows: Vec<UsageRow>) -> Self {
        Self { energy_unit, rows }
    }

    pub fn energy_unit(&self) -> EnergyUnit {
        self.energy_unit
    }

    /// Name of the energy column (`kwh` or `joules`).
    pub fn energy_column(&self) -> &'static str {
        self.energy_unit.column_name()
    }

    pub fn rows(&self) -> &[UsageRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&UsageRow> {
        self.rows.iter().find(|row| row.label() == label)
    }

    pub fn populated(&self) -> impl Iterator<Item = &UsageRow> {
        self.rows.iter().filter(|row| !row.status.is_missing())
    }

    pub fn missing_count(&self) -> usize {
        self.rows.iter().filter(|row| row.status.is_missing()).count()
    }

    /// Energy summed over populated rows, in the table's unit.
    pub fn total_energy(&self) -> f64 {
        self.rows.iter().filter_map(|row| row.energy).sum()
    }

    pub fn total_hours_on(&self) -> f64 {
        self.rows.iter().filter_map(|row| row.hours_on).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::periods::Granularity;
    use time::macros::{datetime, offset};

    #[test]
    fn diagnostic_reports_dropout_percentage_and_bounds() {
        let status = RowStatus::InsufficientSamples {
            n_samples: 13652,
            dropout_rate: 0.526,
            start: datetime!(2011-04-18 09:22:13 -4),
            end: datetime!(2011-04-18 23:59:57 -4),
        };
        let text = status.diagnostic("2011-04-18").unwrap();
        assert!(text.starts_with("Insufficient samples for 2011-04-18; n samples = 13652"));
        assert!(text.contains("dropout_rate = 52.60%"));
    }

    #[test]
    fn populated_rows_have_no_diagnostic() {
        assert_eq!(RowStatus::Populated { n_samples: 3 }.diagnostic("x"), None);
        assert_eq!(
            RowStatus::NoData.diagnostic("2011-05-04").as_deref(),
            Some("No data available for 2011-05-04")
        );
    }

    #[test]
    fn totals_skip_missing_rows() {
        let day = |d: u8| {
            Period::containing(
                datetime!(2024-03-01 12:00:00 UTC).replace_day(d).unwrap(),
                Granularity::Daily,
                offset!(UTC),
            )
            .unwrap()
        };
        let table = UsageTable::new(
            EnergyUnit::KilowattHours,
            vec![
                UsageRow {
                    period: day(1),
                    hours_on: Some(2.0),
                    energy: Some(1.5),
                    status: RowStatus::Populated { n_samples: 10 },
                },
                UsageRow::missing(day(2), RowStatus::NoData),
                UsageRow {
                    period: day(3),
                    hours_on: Some(4.0),
                    energy: Some(0.5),
                    status: RowStatus::Populated { n_samples: 10 },
                },
            ],
        );

        assert_eq!(table.len(), 3);
        assert_eq!(table.missing_count(), 1);
        assert_eq!(table.populated().count(), 2);
        assert!((table.total_energy() - 2.0).abs() < 1e-12);
        assert!((table.total_hours_on() - 6.0).abs() < 1e-12);
        assert_eq!(table.energy_column(), "kwh");
        assert!(table.get("2024-03-02").unwrap().energy.is_none());
    }
}
