//! Integration tests for the PostgreSQL sample store.
//!
//! To run these tests, you need:
//! 1. A PostgreSQL database
//! 2. DATABASE_URL environment variable set
//!
//! Run with: `DATABASE_URL=postgres://... cargo nextest run -p telemetry pg_store`
//!
//! Migrations are applied on connect. Each test writes under its own run id
//! and deletes it afterwards, so they can safely run against a development
//! database.

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::env;
use telemetry::aggregator::MetricsAggregator;
use telemetry::database::{PgStore, SampleStore};
use telemetry::models::{BloodPressure, Gps, Impacts, PlayerId, Role, RunId, TelemetrySample};
use time::OffsetDateTime;

/// Get database pool, skipping tests if DATABASE_URL is not set.
async fn get_test_pool() -> Option<PgPool> {
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: DATABASE_URL not set");
            return None;
        }
    };

    match PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            eprintln!("Skipping test: Failed to connect to database: {e}");
            None
        }
    }
}

async fn test_store() -> Option<PgStore> {
    let store = PgStore::new(get_test_pool().await?);
    store.migrate().await.expect("Failed to run migrations");
    Some(store)
}

/// Run ids sort after any real run so `latest_run` picks them up.
fn unique_run_id(test_id: &str) -> RunId {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    RunId::new(format!("simulations_99999999_{test_id}_{nanos}"))
}

async fn cleanup_run(pool: &PgPool, run_id: &RunId) {
    let _ = sqlx::query("DELETE FROM telemetry_samples WHERE run_id = $1")
        .bind(run_id.as_str())
        .execute(pool)
        .await;
}

fn sample(player_id: PlayerId, elapsed_time: u32, velocity: f64) -> TelemetrySample {
    TelemetrySample {
        timestamp: OffsetDateTime::now_utc(),
        elapsed_time,
        player_id,
        role: Role::for_player(player_id).unwrap(),
        heart_rate: 100 + elapsed_time as i32,
        body_temperature: 36.8,
        blood_pressure: BloodPressure {
            systolic: 112,
            diastolic: 71,
        },
        calories_consumed: f64::from(elapsed_time) * 2.0,
        gps: Gps {
            x: 60,
            y: 25,
            velocity,
            top_speed: velocity,
        },
        impacts: Impacts::default(),
        impact_to_play_ratio: 0.0,
        velocity_variability: 0.0,
        max_heart_rate: 100 + elapsed_time as i32,
        impact_severity_index: 0.0,
    }
}

#[tokio::test]
async fn test_pg_store_query_returns_ascending_ticks() {
    let Some(store) = test_store().await else {
        return;
    };
    let run_id = unique_run_id("order");

    for tick in [2, 0, 1] {
        store
            .append(&run_id, &sample(4, tick, f64::from(tick) * 5.0))
            .await
            .unwrap();
    }
    store.append(&run_id, &sample(5, 0, 3.0)).await.unwrap();

    let samples = store.query(&run_id, 4).await.unwrap();
    let ticks: Vec<u32> = samples.iter().map(|s| s.elapsed_time).collect();
    assert_eq!(ticks, vec![0, 1, 2]);
    assert!(samples.iter().all(|s| s.player_id == 4 && s.role == Role::Lock));

    assert!(store.query(&run_id, 6).await.unwrap().is_empty());

    cleanup_run(store.pool(), &run_id).await;
}

#[tokio::test]
async fn test_pg_store_lists_runs_and_latest() {
    let Some(store) = test_store().await else {
        return;
    };
    let earlier = unique_run_id("zz_latest_a");
    let later = unique_run_id("zz_latest_b");

    store.append(&earlier, &sample(1, 0, 4.0)).await.unwrap();
    store.append(&later, &sample(1, 0, 4.0)).await.unwrap();

    let runs = store.list_runs().await.unwrap();
    assert!(runs.contains(&earlier));
    assert!(runs.contains(&later));
    assert_eq!(store.latest_run().await.unwrap(), Some(later.clone()));

    cleanup_run(store.pool(), &earlier).await;
    cleanup_run(store.pool(), &later).await;
}

#[tokio::test]
async fn test_pg_store_aggregates_run() {
    let Some(store) = test_store().await else {
        return;
    };
    let run_id = unique_run_id("aggregate");

    for (tick, velocity) in [10.0, 20.0, 15.0].into_iter().enumerate() {
        store
            .append(&run_id, &sample(11, tick as u32, velocity))
            .await
            .unwrap();
    }

    let pool = store.pool().clone();
    let aggregator = MetricsAggregator::new(store);
    let metrics = aggregator.aggregate(&run_id).await.unwrap();

    assert_eq!(metrics.len(), 15);
    let centre = &metrics[&11];
    assert_eq!(centre.average_velocity, 15.0);
    assert_eq!(centre.velocity_variability, 7.5);
    assert_eq!(centre.heart_rate, 102);
    assert_eq!(centre.max_heart_rate, 102);
    assert_eq!(centre.calories_consumed, 4.0);
    assert_eq!(metrics[&1].average_velocity, 0.0);

    cleanup_run(&pool, &run_id).await;
}
