use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shared::models::project::Project;
use shared::utilities::errors::AppError;
use tokio_util::sync::CancellationToken;

use crate::rdesc::Wrand;
use crate::repos::{Filter, ProjectRepository};

use super::executable::RuleImpl;
use super::executor::{Executor, RunCtx};
use super::query_project::QueryProject;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct Args {
    mode: Option<Wrand<String>>,
    #[serde(default)]
    raw_project_filter: Option<String>,
    #[serde(default = "default_query_project_args")]
    query_project: serde_json::Value,
}

fn default_query_project_args() -> serde_json::Value {
    serde_json::json!({})
}

/// Picks one random project, warms it up with a `query_project` sub-rule,
/// then mutates its `current_mode` under the exclusive lock.
#[derive(Clone)]
pub struct ChangeMode {
    executor: Executor,
    mode: Wrand<String>,
    raw_project_filter: Option<String>,
    warm_up: QueryProject,
}

impl ChangeMode {
    pub fn from_args(executor: Executor, raw: &serde_json::Value) -> Result<Self, AppError> {
        let args: Args = serde_json::from_value(raw.clone())?;
        let mode = args.mode.ok_or_else(|| AppError::MissingArg("mode".to_string()))?;
        let warm_up = QueryProject::from_args(executor.clone(), &args.query_project)?;

        Ok(ChangeMode {
            executor,
            mode,
            raw_project_filter: args.raw_project_filter,
            warm_up,
        })
    }

    async fn run_project(&self, project: Project, cancel: CancellationToken) {
        if let Err(err) = self.try_run_project(&project, cancel).await {
            if !err.is_contention() {
                tracing::error!(error = %err, project_id = project.id, "change_mode tick failed");
            }
        }
    }

    async fn try_run_project(&self, project: &Project, cancel: CancellationToken) -> Result<(), AppError> {
        self.warm_up.run_against(project, cancel).await?;

        let base = self.executor.base();
        let lock = base.project_locker.get(project.id).await;
        let _guard = lock.try_exclusive_lock().ok_or(AppError::ProjectLocked)?;
        if lock.is_deleted() {
            return Err(AppError::ProjectLocked);
        }

        let new_mode = self.mode.pick();
        ProjectRepository::update_mode(&base.db, project.id, &new_mode).await?;

        // Known race-mitigation stub, not a correctness barrier: widens the
        // window before a concurrent reader could observe the pre-change
        // state, but does not close it.
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    }
}

#[async_trait]
impl RuleImpl for ChangeMode {
    async fn execute(&self, ctx: &RunCtx) -> Result<(), AppError> {
        let base = self.executor.base();

        let mut filters = base.region_filters.clone();
        if let Some(raw) = &self.raw_project_filter {
            filters.push(Filter::Raw(raw.clone()));
        }

        let mut candidates = ProjectRepository::find_random_projects(&base.db, &filters, 1).await?;
        let Some(project) = candidates.pop() else {
            return Ok(());
        };

        let this = self.clone();
        let cancel = ctx.cancel.clone();
        base.registry.go(async move { this.run_project(project, cancel).await }).await;
        Ok(())
    }
}
