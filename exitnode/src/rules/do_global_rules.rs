use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use shared::models::global_rule::GlobalRule;
use shared::utilities::errors::AppError;
use tokio::sync::Mutex;

use crate::rdesc;
use crate::repos::GlobalRuleRepository;

use super::executable::RuleImpl;
use super::executor::{Executor, RunCtx};
use super::rule::Rule;

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct Args {
    #[serde(default, with = "humantime_serde")]
    update_interval: Option<Duration>,
}

struct Cache {
    last_update: Instant,
    descriptors: Vec<GlobalRule>,
    rules: Vec<Rule>,
}

/// Polls storage for enabled rule descriptors and runs them all once per
/// tick. Descriptors are cached and only re-instantiated when the fetched
/// set genuinely differs from what's cached (a cheap full-list equality
/// check, not a partial diff) — any change re-instantiates everything.
#[derive(Clone)]
pub struct DoGlobalRules {
    executor: Executor,
    update_interval: Duration,
    cache: Arc<Mutex<Option<Cache>>>,
}

impl DoGlobalRules {
    pub fn from_args(executor: Executor, raw: &serde_json::Value) -> Result<Self, AppError> {
        let args: Args = serde_json::from_value(raw.clone())?;
        Ok(DoGlobalRules {
            executor,
            update_interval: args.update_interval.unwrap_or(DEFAULT_UPDATE_INTERVAL),
            cache: Arc::new(Mutex::new(None)),
        })
    }
}

#[async_trait]
impl RuleImpl for DoGlobalRules {
    async fn execute(&self, ctx: &RunCtx) -> Result<(), AppError> {
        let base = self.executor.base();
        let mut cache = self.cache.lock().await;

        let needs_reload = match &*cache {
            None => true,
            Some(c) => c.last_update.elapsed() >= self.update_interval,
        };

        if needs_reload {
            let fresh = GlobalRuleRepository::all_enabled(&base.db).await?;
            let changed = match &*cache {
                Some(c) => c.descriptors != fresh,
                None => true,
            };

            if changed {
                let mut rules = Vec::with_capacity(fresh.len());
                for gr in &fresh {
                    let desc: rdesc::Rule = serde_json::from_value(gr.desc.clone())?;
                    rules.push(self.executor.instantiate(&desc)?);
                }
                *cache = Some(Cache {
                    last_update: Instant::now(),
                    descriptors: fresh,
                    rules,
                });
            } else if let Some(c) = cache.as_mut() {
                c.last_update = Instant::now();
            }
        }

        let child_ctx = RunCtx {
            cancel: ctx.cancel.clone(),
            inside_periodic: true,
        };

        if let Some(c) = cache.as_ref() {
            for rule in &c.rules {
                if let Err(err) = self.executor.execute_once(&child_ctx, rule).await {
                    if !err.is_contention() {
                        tracing::error!(error = %err, act = ?rule.act, "global rule tick failed");
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gr(id: i64, priority: i32) -> GlobalRule {
        GlobalRule {
            id,
            enabled: true,
            priority,
            desc: serde_json::json!({"act": "test"}),
        }
    }

    #[test]
    fn identical_descriptor_lists_compare_equal() {
        let a = vec![gr(1, 0), gr(2, 1)];
        let b = vec![gr(1, 0), gr(2, 1)];
        assert_eq!(a, b);
    }

    #[test]
    fn a_changed_field_is_detected_as_different() {
        let cached = vec![gr(1, 0)];
        let fresh = vec![gr(1, 5)];
        assert_ne!(cached, fresh);
    }

    #[test]
    fn an_added_descriptor_is_detected_as_different() {
        let cached = vec![gr(1, 0)];
        let fresh = vec![gr(1, 0), gr(2, 0)];
        assert_ne!(cached, fresh);
    }
}
