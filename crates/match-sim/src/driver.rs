//! Drives one match: ticks, players, publish and persist.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use telemetry::config::MatchConfig;
use telemetry::database::SampleStore;
use telemetry::models::RunId;
use telemetry::transport::{Publisher, Transport};

use crate::generators::{StateTable, TelemetryGenerator, TickContext};
use crate::random::RandomSource;

/// Outcome of a run, complete or stopped early.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: RunId,
    pub ticks_completed: u32,
    pub samples_generated: usize,
    pub samples_persisted: usize,
    pub publish_failures: usize,
    pub alerts_raised: usize,
    /// Whether the run stopped before the final tick.
    pub cancelled: bool,
    /// Final accumulators, discarded by callers that only need the counts.
    pub states: StateTable,
    pub elapsed_ms: u64,
}

/// Runs matches against a store and a transport.
///
/// Ticks are processed strictly in order and players in ascending jersey
/// order. Each tick's velocity variability uses the squad's mean top speed
/// as it stood when the tick began.
pub struct RunDriver<S, T> {
    config: MatchConfig,
    generator: TelemetryGenerator,
    store: S,
    publisher: Publisher<T>,
    tick_interval: Option<Duration>,
}

impl<S: SampleStore, T: Transport> RunDriver<S, T> {
    pub fn new(config: MatchConfig, store: S, publisher: Publisher<T>) -> Self {
        Self {
            generator: TelemetryGenerator::new(&config),
            config,
            store,
            publisher,
            tick_interval: None,
        }
    }

    /// Sleeps this long between ticks, pacing the match in wall-clock time.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    /// Plays a full match.
    pub async fn run(&self, run_id: RunId, rng: &mut (impl RandomSource + Send)) -> RunSummary {
        let (_keep_open, stop) = watch::channel(false);
        self.run_until(run_id, rng, stop).await
    }

    /// Plays a match until it ends or `stop` becomes true.
    ///
    /// Stopping only prevents further ticks; samples already produced stay
    /// published and persisted.
    pub async fn run_until(
        &self,
        run_id: RunId,
        rng: &mut (impl RandomSource + Send),
        mut stop: watch::Receiver<bool>,
    ) -> RunSummary {
        let start = Instant::now();
        let threshold = self.config.impact_alert_threshold;
        let mut states = StateTable::kickoff();
        let mut summary = RunSummary {
            run_id: run_id.clone(),
            ticks_completed: 0,
            samples_generated: 0,
            samples_persisted: 0,
            publish_failures: 0,
            alerts_raised: 0,
            cancelled: false,
            states: StateTable::default(),
            elapsed_ms: 0,
        };

        info!(
            "Starting {run_id}: {} ticks, {} players",
            self.config.match_ticks,
            states.len()
        );

        for elapsed_time in 0..self.config.match_ticks {
            if *stop.borrow() {
                summary.cancelled = true;
                break;
            }

            let tick = TickContext::new(elapsed_time, states.mean_top_speed());

            for (player_id, role, state) in states.iter_mut() {
                let sample = self.generator.generate(player_id, role, &tick, state, rng);
                summary.samples_generated += 1;
                debug!(
                    "Generated tick {elapsed_time} for player {player_id} ({role}): {:.1} m/min, hr {}",
                    sample.gps.velocity, sample.heart_rate
                );

                if !self.publisher.publish_sample(&sample).await {
                    summary.publish_failures += 1;
                }
                if !self.publisher.publish_coordinates(&sample).await {
                    summary.publish_failures += 1;
                }
                if sample.impacts.impact_force > threshold {
                    summary.alerts_raised += 1;
                    if !self.publisher.publish_impact_alert(&sample).await {
                        summary.publish_failures += 1;
                    }
                }

                match self.store.append(&run_id, &sample).await {
                    Ok(()) => summary.samples_persisted += 1,
                    Err(e) => warn!(
                        "Failed to persist tick {elapsed_time} for player {player_id} in {run_id}: {e}"
                    ),
                }
            }

            summary.ticks_completed += 1;

            let last_tick = elapsed_time + 1 == self.config.match_ticks;
            if let Some(interval) = self.tick_interval.filter(|_| !last_tick) {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    Ok(_) = stop.wait_for(|stopped| *stopped) => {}
                }
            }
        }

        if summary.cancelled {
            info!(
                "Stopped {run_id} after {} of {} ticks",
                summary.ticks_completed, self.config.match_ticks
            );
        }

        summary.states = states;
        summary.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            "Finished {run_id}: {} samples generated, {} persisted, {} publish failures, {} impact alerts",
            summary.samples_generated,
            summary.samples_persisted,
            summary.publish_failures,
            summary.alerts_raised
        );

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeSet;
    use telemetry::errors::StoreError;
    use telemetry::memory_store::MemoryStore;
    use telemetry::models::{PlayerId, TelemetrySample};
    use telemetry::transport::{ChannelTransport, Topics};

    use crate::random::SequenceRandom;

    fn publisher(transport: ChannelTransport) -> Publisher<ChannelTransport> {
        Publisher::new(transport, Topics::new("rugby"))
    }

    #[tokio::test]
    async fn test_full_run_persists_every_sample() {
        let store = MemoryStore::new();
        let transport = ChannelTransport::new(4096);
        let _rx = transport.subscribe();
        let driver = RunDriver::new(MatchConfig::default(), store.clone(), publisher(transport));
        let run = RunId::new("simulations_20240501_100000");

        let summary = driver.run(run.clone(), &mut StdRng::seed_from_u64(1)).await;

        assert_eq!(summary.ticks_completed, 81);
        assert_eq!(summary.samples_generated, 81 * 15);
        assert_eq!(summary.samples_persisted, 81 * 15);
        assert_eq!(summary.publish_failures, 0);
        assert!(!summary.cancelled);
        assert_eq!(store.len(&run), 81 * 15);

        let samples = store.query(&run, 7).await.unwrap();
        let ticks: Vec<u32> = samples.iter().map(|s| s.elapsed_time).collect();
        assert_eq!(ticks, (0..=80).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_variability_uses_start_of_tick_snapshot() {
        let config = MatchConfig {
            match_ticks: 2,
            ..Default::default()
        };
        let store = MemoryStore::new();
        let transport = ChannelTransport::new(256);
        let _rx = transport.subscribe();
        let driver = RunDriver::new(config, store.clone(), publisher(transport));
        let run = RunId::new("simulations_20240501_100000");

        // Tick 0: every player runs at 6.0. Tick 1: every player runs at 3.0.
        let mut rng = SequenceRandom::new().with_floats(
            std::iter::repeat_n(6.0, 15).chain(std::iter::repeat_n(3.0, 15)),
        );
        driver.run(run.clone(), &mut rng).await;

        for player_id in 1..=15 {
            let samples = store.query(&run, player_id).await.unwrap();
            assert_eq!(samples[0].velocity_variability, 0.0);
            assert_eq!(samples[1].velocity_variability, 0.5);
        }
    }

    #[tokio::test]
    async fn test_publish_failures_do_not_stop_persistence() {
        let store = MemoryStore::new();
        // No subscriber: every publish fails.
        let driver = RunDriver::new(
            MatchConfig {
                match_ticks: 3,
                ..Default::default()
            },
            store.clone(),
            publisher(ChannelTransport::new(16)),
        );
        let run = RunId::new("simulations_20240501_100000");

        let summary = driver.run(run.clone(), &mut StdRng::seed_from_u64(2)).await;

        assert_eq!(summary.samples_persisted, 45);
        assert!(summary.publish_failures >= 90);
        assert_eq!(store.len(&run), 45);
    }

    #[tokio::test]
    async fn test_alerts_only_above_threshold() {
        let config = MatchConfig {
            match_ticks: 1,
            ..Default::default()
        };
        let transport = ChannelTransport::new(256);
        let mut rx = transport.subscribe();
        let driver = RunDriver::new(config, MemoryStore::new(), publisher(transport));

        // Player 1 hits at 5.0 (force 5.5, not above), player 2 at 6.0 (force 6.6).
        let mut rng = SequenceRandom::new()
            .with_chances([true, true])
            .with_floats([5.0, 6.0]);
        let summary = driver.run(RunId::new("r"), &mut rng).await;

        assert_eq!(summary.alerts_raised, 1);
        let mut alert_topics = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if message.topic.ends_with("/alerts/impact") {
                alert_topics.push(message.topic);
            }
        }
        assert_eq!(alert_topics, vec!["rugby/players/2/alerts/impact"]);
    }

    struct RejectingStore;

    #[async_trait]
    impl SampleStore for RejectingStore {
        async fn append(&self, _: &RunId, _: &TelemetrySample) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk full".into()))
        }

        async fn query(&self, _: &RunId, _: PlayerId) -> Result<Vec<TelemetrySample>, StoreError> {
            Ok(Vec::new())
        }

        async fn list_runs(&self) -> Result<BTreeSet<RunId>, StoreError> {
            Ok(BTreeSet::new())
        }
    }

    #[tokio::test]
    async fn test_store_failures_keep_state_advancing() {
        let transport = ChannelTransport::new(4096);
        let mut rx = transport.subscribe();
        let driver = RunDriver::new(
            MatchConfig {
                match_ticks: 5,
                ..Default::default()
            },
            RejectingStore,
            publisher(transport),
        );

        let summary = driver
            .run(RunId::new("r"), &mut StdRng::seed_from_u64(3))
            .await;

        assert_eq!(summary.samples_generated, 75);
        assert_eq!(summary.samples_persisted, 0);
        assert!(summary.states.iter().any(|(_, _, s)| s.calorie_total > 0.0));

        let mut sensor_messages = 0;
        while let Ok(message) = rx.try_recv() {
            if message.topic.ends_with("/sensors") {
                sensor_messages += 1;
            }
        }
        assert_eq!(sensor_messages, 75);
    }

    #[tokio::test]
    async fn test_stop_prevents_further_ticks() {
        let store = MemoryStore::new();
        let transport = ChannelTransport::new(4096);
        let _rx = transport.subscribe();
        let driver = RunDriver::new(MatchConfig::default(), store.clone(), publisher(transport))
            .with_tick_interval(Duration::from_millis(20));
        let run = RunId::new("simulations_20240501_100000");

        let (tx, stop) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let summary = driver
            .run_until(run.clone(), &mut StdRng::seed_from_u64(4), stop)
            .await;
        stopper.await.unwrap();

        assert!(summary.cancelled);
        assert!(summary.ticks_completed < 81);
        assert_eq!(
            store.len(&run),
            summary.ticks_completed as usize * 15,
            "only whole ticks are persisted"
        );
    }
}
