use std::{sync::Arc, time::SystemTime};

use usage_stats::{PowerSeries, StatsError, UsageTable};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }

    /// Replaces the payload, keeping when the input was received.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            payload: f(self.payload),
            received_at: self.received_at,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("transform error: {0}")]
    Transform(String),
    #[error("statistics error: {0}")]
    Stats(#[from] StatsError),
    #[error("sink error: {0}")]
    Sink(String),
}

pub trait Source<T> {
    fn load(&self) -> Result<Envelope<T>, PipelineError>;
}

pub trait Transform<I, O>: Send + Sync {
    fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

pub trait Sink<T> {
    fn run(&mut self, input: &Envelope<T>) -> Result<(), PipelineError>;
}

/// Load readings, run same-type transforms in order, aggregate, and write.
pub struct Pipeline<S, A, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<PowerSeries, PowerSeries>>>,
    pub aggregate: A,
    pub sink: K,
}

impl<S, A, K> Pipeline<S, A, K>
where
    S: Source<PowerSeries>,
    A: Transform<PowerSeries, UsageTable>,
    K: Sink<UsageTable>,
{
    pub fn run(mut self) -> Result<UsageTable, PipelineError> {
        let mut series = self.source.load()?;
        tracing::info!(samples = series.payload.len(), "loaded power series");

        for t in &self.transforms {
            series = t.apply(series)?;
        }

        let table = self.aggregate.apply(series)?;
        tracing::info!(
            periods = table.payload.len(),
            missing = table.payload.missing_count(),
            energy_unit = %table.payload.energy_unit(),
            "usage aggregated"
        );

        self.sink.run(&table)?;
        Ok(table.payload)
    }
}
