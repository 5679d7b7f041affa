use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shared::utilities::errors::AppError;

use super::executable::RuleImpl;
use super::executor::RunCtx;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct Args {
    #[serde(default, with = "humantime_serde")]
    sleep: Option<Duration>,
}

/// No-op rule used to exercise the executor and periodic loop in isolation,
/// without touching storage or the provider API.
#[derive(Clone)]
pub struct TestRule {
    sleep: Duration,
}

impl TestRule {
    pub fn from_args(raw: &serde_json::Value) -> Result<Self, AppError> {
        let args: Args = serde_json::from_value(raw.clone())?;
        Ok(TestRule {
            sleep: args.sleep.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl RuleImpl for TestRule {
    async fn execute(&self, ctx: &RunCtx) -> Result<(), AppError> {
        tracing::debug!("test rule executing");
        if !self.sleep.is_zero() {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {}
                _ = tokio::time::sleep(self.sleep) => {}
            }
        }
        Ok(())
    }
}
