use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use shared::utilities::errors::AppError;

use crate::drivers::SingleQuery;
use crate::metrics;

use super::query_project::DriverHandle;

const CREATE_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS activity_v1 (id bigserial primary key, nonce bigint not null, created_at timestamptz not null default now())";
const INSERT_SQL: &str = "INSERT INTO activity_v1 (nonce) VALUES ($1) RETURNING *";

/// A small state machine run against one project's driver. `exclusive`
/// reports whether the project lock must be a writer lock for the duration.
#[async_trait]
pub trait QueryScenario: Send + Sync {
    fn exclusive(&self) -> bool;

    async fn run(
        &self,
        driver: &mut DriverHandle,
        cancel: &CancellationToken,
        suspend_timeout: Duration,
        region: &str,
        driver_name: &str,
    ) -> Result<(), AppError>;
}

pub fn build(name: &str) -> Result<Box<dyn QueryScenario>, AppError> {
    match name {
        "activityV1" => Ok(Box::new(ActivityV1)),
        "alwaysOn" => Ok(Box::new(AlwaysOn)),
        "awaitShutdown" => Ok(Box::new(AwaitShutdown)),
        other => Err(AppError::UnknownScenario(other.to_string())),
    }
}

fn random_nonce() -> u64 {
    rand::rng().random::<u64>() & 0x7fff_ffff_ffff_ffff
}

/// Pure deadline check, factored out of `AlwaysOn::run` so it's testable
/// without a real driver or `tokio::time::pause()`. `Err` carries the pair
/// `(elapsed_secs, timeout_secs)` `AlwaysOn` turns into `ScenarioDeadlineMissed`.
fn check_deadline(elapsed: Duration, interval: Duration) -> Result<(), (f64, f64)> {
    if elapsed > interval {
        Err((elapsed.as_secs_f64(), interval.as_secs_f64()))
    } else {
        Ok(())
    }
}

/// Three-query sequence, run once: `SELECT 1`, create-if-missing the probe
/// table, then one tagged insert.
struct ActivityV1;

#[async_trait]
impl QueryScenario for ActivityV1 {
    fn exclusive(&self) -> bool {
        false
    }

    async fn run(
        &self,
        driver: &mut DriverHandle,
        _cancel: &CancellationToken,
        _suspend_timeout: Duration,
        _region: &str,
        _driver_name: &str,
    ) -> Result<(), AppError> {
        let reqs = vec![
            SingleQuery::new("SELECT 1"),
            SingleQuery::new(CREATE_TABLE_SQL),
            SingleQuery::with_params(INSERT_SQL, vec![serde_json::json!(random_nonce())]),
        ];
        driver.run_queries(reqs).await?;
        Ok(())
    }
}

/// Wakes the endpoint, then loops inserting one row every
/// `suspend_timeout / 4`, failing if any single insert takes longer than
/// that budget — a sign the endpoint suspended and had to cold-start.
struct AlwaysOn;

#[async_trait]
impl QueryScenario for AlwaysOn {
    fn exclusive(&self) -> bool {
        false
    }

    async fn run(
        &self,
        driver: &mut DriverHandle,
        cancel: &CancellationToken,
        suspend_timeout: Duration,
        region: &str,
        driver_name: &str,
    ) -> Result<(), AppError> {
        driver.query(SingleQuery::new("SELECT 1"), false).await?;
        driver.query(SingleQuery::new(CREATE_TABLE_SQL), true).await?;

        let interval = suspend_timeout / 4;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(interval) => {}
            }

            let started = tokio::time::Instant::now();
            driver
                .query(
                    SingleQuery::with_params(INSERT_SQL, vec![serde_json::json!(random_nonce())]),
                    true,
                )
                .await?;
            let elapsed = started.elapsed();
            metrics::observe_alwayson_query_seconds(region, driver_name, elapsed.as_secs_f64());

            if let Err((elapsed_secs, timeout_secs)) = check_deadline(elapsed, interval) {
                return Err(AppError::ScenarioDeadlineMissed {
                    elapsed_secs,
                    timeout_secs,
                });
            }
        }
    }
}

/// Wakes the endpoint, then sleeps past the suspend window before issuing
/// one final query, to verify the endpoint actually suspended and woke back
/// up cleanly. Requires the exclusive lock so no reader keeps it warm.
struct AwaitShutdown;

#[async_trait]
impl QueryScenario for AwaitShutdown {
    fn exclusive(&self) -> bool {
        true
    }

    async fn run(
        &self,
        driver: &mut DriverHandle,
        cancel: &CancellationToken,
        suspend_timeout: Duration,
        _region: &str,
        _driver_name: &str,
    ) -> Result<(), AppError> {
        driver.query(SingleQuery::new("SELECT 1"), false).await?;
        driver.query(SingleQuery::new(CREATE_TABLE_SQL), true).await?;

        let wait = suspend_timeout.mul_f64(1.1) + Duration::from_secs(10);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(wait) => {}
        }

        driver
            .query(
                SingleQuery::with_params(INSERT_SQL, vec![serde_json::json!(random_nonce())]),
                true,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_nonce_never_sets_the_sign_bit() {
        for _ in 0..100 {
            assert!((random_nonce() as i64) >= 0);
        }
    }

    #[test]
    fn deadline_ok_when_elapsed_within_interval() {
        assert!(check_deadline(Duration::from_millis(200), Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn deadline_exceeded_when_query_outlasts_interval() {
        let err = check_deadline(Duration::from_secs(2), Duration::from_secs(1)).unwrap_err();
        assert_eq!(err, (2.0, 1.0));
    }

    #[test]
    fn build_rejects_unknown_scenario_name() {
        assert!(build("not-a-scenario").is_err());
    }

    #[test]
    fn build_resolves_all_known_scenarios() {
        assert!(build("activityV1").is_ok());
        assert!(!build("activityV1").unwrap().exclusive());
        assert!(build("alwaysOn").is_ok());
        assert!(!build("alwaysOn").unwrap().exclusive());
        assert!(build("awaitShutdown").is_ok());
        assert!(build("awaitShutdown").unwrap().exclusive());
    }
}
