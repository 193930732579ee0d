//! Per-player summary statistics over a run's samples.

use std::collections::BTreeMap;

use crate::database::SampleStore;
use crate::errors::AggregateError;
use crate::models::{
    AggregateMetrics, ImpactSummary, PlayerId, RunId, TelemetrySample, roster, round_to,
};

/// Length of a full match in ticks; fixed denominator of the impact ratio.
pub const FULL_MATCH_TICKS: f64 = 80.0;

pub trait SampleMetric {
    type Score;
    fn next_sample(&mut self, sample: &TelemetrySample);
    fn finish(&mut self) -> Self::Score;
}

/// Summarizes one player's samples, given in ascending `elapsed_time` order.
///
/// An empty slice yields the all-zero record.
pub fn summarize(samples: &[TelemetrySample]) -> AggregateMetrics {
    let mut acc = Metrics::default();
    for sample in samples {
        acc.next_sample(sample);
    }
    acc.finish()
}

#[derive(Debug, Clone, Default)]
struct Metrics {
    velocity: VelocityMetric,
    impact_force: ImpactForceMetric,
    peak_heart_rate: PeakHeartRateMetric,
    latest: LatestSampleMetric,
}

impl SampleMetric for Metrics {
    type Score = AggregateMetrics;

    fn next_sample(&mut self, sample: &TelemetrySample) {
        self.velocity.next_sample(sample);
        self.impact_force.next_sample(sample);
        self.peak_heart_rate.next_sample(sample);
        self.latest.next_sample(sample);
    }

    fn finish(&mut self) -> AggregateMetrics {
        let Some(latest) = self.latest.finish() else {
            return AggregateMetrics::default();
        };
        let velocity = self.velocity.finish();
        let minutes = f64::from(latest.elapsed_time) / 60.0;
        let impact_count = latest.impacts.impact_count;

        AggregateMetrics {
            average_velocity: velocity.mean,
            distance_traveled_km: round_to(velocity.mean * minutes, 2),
            calories_consumed: latest.calories_consumed,
            heart_rate: latest.heart_rate,
            body_temperature: latest.body_temperature,
            blood_pressure: latest.blood_pressure,
            impacts: ImpactSummary {
                impact_count,
                average_impact_force: self.impact_force.finish(),
            },
            impact_to_play_ratio: f64::from(impact_count) / FULL_MATCH_TICKS,
            velocity_variability: round_to(velocity.mean_step_change, 2),
            max_heart_rate: self.peak_heart_rate.finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct VelocityScore {
    mean: f64,
    mean_step_change: f64,
}

/// Mean velocity and mean absolute tick-to-tick change.
#[derive(Debug, Clone, Default)]
struct VelocityMetric {
    total: f64,
    count: usize,
    step_total: f64,
    last_velocity: Option<f64>,
}

impl SampleMetric for VelocityMetric {
    type Score = VelocityScore;

    fn next_sample(&mut self, sample: &TelemetrySample) {
        let velocity = sample.gps.velocity;
        self.total += velocity;
        self.count += 1;
        if let Some(prev) = self.last_velocity {
            self.step_total += (velocity - prev).abs();
        }
        self.last_velocity = Some(velocity);
    }

    fn finish(&mut self) -> VelocityScore {
        if self.count == 0 {
            return VelocityScore::default();
        }
        let mean_step_change = if self.count < 2 {
            0.0
        } else {
            self.step_total / (self.count - 1) as f64
        };
        VelocityScore {
            mean: self.total / self.count as f64,
            mean_step_change,
        }
    }
}

/// Mean force over ticks that actually had an impact.
#[derive(Debug, Clone, Default)]
struct ImpactForceMetric {
    total: f64,
    count: usize,
}

impl SampleMetric for ImpactForceMetric {
    type Score = f64;

    fn next_sample(&mut self, sample: &TelemetrySample) {
        let force = sample.impacts.impact_force;
        if force != 0.0 {
            self.total += force;
            self.count += 1;
        }
    }

    fn finish(&mut self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PeakHeartRateMetric {
    peak: Option<i32>,
}

impl SampleMetric for PeakHeartRateMetric {
    type Score = i32;

    fn next_sample(&mut self, sample: &TelemetrySample) {
        self.peak = Some(self.peak.map_or(sample.heart_rate, |p| p.max(sample.heart_rate)));
    }

    fn finish(&mut self) -> i32 {
        self.peak.unwrap_or(0)
    }
}

/// The sample with the greatest `elapsed_time`; later samples win ties.
#[derive(Debug, Clone, Default)]
struct LatestSampleMetric {
    latest: Option<TelemetrySample>,
}

impl SampleMetric for LatestSampleMetric {
    type Score = Option<TelemetrySample>;

    fn next_sample(&mut self, sample: &TelemetrySample) {
        let newer = self
            .latest
            .as_ref()
            .is_none_or(|l| sample.elapsed_time >= l.elapsed_time);
        if newer {
            self.latest = Some(sample.clone());
        }
    }

    fn finish(&mut self) -> Option<TelemetrySample> {
        self.latest.take()
    }
}

/// Computes [`AggregateMetrics`] for every rostered player of a run.
///
/// Results are never cached; calling again recomputes from the store.
#[derive(Clone)]
pub struct MetricsAggregator<S> {
    store: S,
}

impl<S: SampleStore> MetricsAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Metrics for players 1..=15 in ascending order.
    ///
    /// Any store read failure fails the whole call.
    pub async fn aggregate(
        &self,
        run_id: &RunId,
    ) -> Result<BTreeMap<PlayerId, AggregateMetrics>, AggregateError> {
        let mut metrics = BTreeMap::new();

        for (player_id, _) in roster() {
            let mut samples = self
                .store
                .query(run_id, player_id)
                .await
                .map_err(|source| AggregateError::Read { player_id, source })?;
            samples.sort_by_key(|s| s.elapsed_time);

            if samples.is_empty() {
                tracing::debug!("No samples for player {player_id} in {run_id}");
            }
            metrics.insert(player_id, summarize(&samples));
        }

        tracing::info!("Aggregated metrics for {} players in {run_id}", metrics.len());
        Ok(metrics)
    }

    /// Aggregates the most recent run, or `None` when no run exists.
    pub async fn aggregate_latest(
        &self,
    ) -> Result<Option<(RunId, BTreeMap<PlayerId, AggregateMetrics>)>, AggregateError> {
        let Some(run_id) = self
            .store
            .latest_run()
            .await
            .map_err(AggregateError::ListRuns)?
        else {
            return Ok(None);
        };

        let metrics = self.aggregate(&run_id).await?;
        Ok(Some((run_id, metrics)))
    }
}
