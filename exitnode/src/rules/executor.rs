use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use shared::utilities::errors::AppError;

use crate::app::App;
use crate::rdesc;

use super::factory;
use super::rule::Rule;

/// Ambient state threaded through every rule invocation: the cancellation
/// token standing in for a request-scoped context, plus the one flag the
/// executor itself needs to gate nested periodic loops.
#[derive(Clone)]
pub struct RunCtx {
    pub cancel: CancellationToken,
    pub inside_periodic: bool,
}

impl RunCtx {
    pub fn root(cancel: CancellationToken) -> Self {
        RunCtx {
            cancel,
            inside_periodic: false,
        }
    }

    fn child_periodic(&self) -> Self {
        RunCtx {
            cancel: self.cancel.clone(),
            inside_periodic: true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Parses and instantiates rules, and drives the periodic-loop gate. Cheap
/// to clone: wraps a single `Arc<App>`.
#[derive(Clone)]
pub struct Executor {
    base: Arc<App>,
}

impl Executor {
    pub fn new(base: Arc<App>) -> Self {
        Executor { base }
    }

    pub fn base(&self) -> &Arc<App> {
        &self.base
    }

    pub fn parse_json(&self, raw: &str) -> Result<Rule, AppError> {
        let desc: rdesc::Rule = serde_json::from_str(raw)?;
        self.instantiate(&desc)
    }

    pub fn instantiate(&self, desc: &rdesc::Rule) -> Result<Rule, AppError> {
        let imp = factory::create(self.clone(), desc)?;
        Rule::new(desc, imp)
    }

    /// Runs `rule` once or enters its periodic loop, per the non-null-period
    /// and `inside_periodic` gate.
    pub async fn execute(&self, ctx: RunCtx, rule: Rule) -> Result<(), AppError> {
        if ctx.is_cancelled() {
            return Err(AppError::Other("context cancelled".to_string()));
        }

        if rule.period.is_some() && !ctx.inside_periodic {
            self.execute_periodic(ctx, rule).await
        } else {
            self.execute_once(&ctx, &rule).await
        }
    }

    /// Runs `rule` exactly once, regardless of its own period. Used directly
    /// by `do_global_rules` to run its cached children once per tick without
    /// re-parsing the periodic gate (their context already has
    /// `inside_periodic=true`, so `execute` would take this same branch).
    pub(crate) async fn execute_once(&self, ctx: &RunCtx, rule: &Rule) -> Result<(), AppError> {
        let span = tracing::info_span!("rule_execute", act = ?rule.act);
        rule.imp.execute(ctx).instrument(span).await
    }

    async fn execute_periodic(&self, ctx: RunCtx, rule: Rule) -> Result<(), AppError> {
        let child = ctx.child_periodic();

        loop {
            if child.is_cancelled() {
                return Ok(());
            }

            if let Err(err) = self.execute_once(&child, &rule).await {
                if !err.is_contention() {
                    tracing::error!(error = %err, act = ?rule.act, "periodic rule tick failed");
                }
            }

            let period = rule
                .period
                .as_ref()
                .expect("periodic rule always carries a period");
            period.sleep(&child.cancel).await;
        }
    }
}
