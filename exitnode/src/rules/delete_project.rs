use async_trait::async_trait;
use serde::Deserialize;
use shared::models::project::{matrix_fields, Project, DEFAULT_MATRIX};
use shared::models::query::{Query, QueryDestination};
use shared::utilities::errors::AppError;

use crate::repos::{Filter, ProjectRepository, QuerySaver, QuerySaverArgs, QueryRepository};

use super::executable::RuleImpl;
use super::executor::{Executor, RunCtx};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct Args {
    projects_n: Option<i64>,
    #[serde(default)]
    skip_failed_queries: Option<SkipFailedQueries>,
    #[serde(default)]
    matrix: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
struct SkipFailedQueries {
    enabled: bool,
    queries_n: i64,
}

impl Default for SkipFailedQueries {
    fn default() -> Self {
        SkipFailedQueries {
            enabled: true,
            queries_n: 3,
        }
    }
}

/// Prunes a matrix of project attributes back down to `projects_n` members,
/// always keeping the median by creation time so freshly created or
/// soon-to-be-reaped projects are never the one picked.
#[derive(Clone)]
pub struct DeleteProject {
    executor: Executor,
    projects_n: i64,
    skip_failed_queries: SkipFailedQueries,
    matrix: Vec<String>,
}

impl DeleteProject {
    pub fn from_args(executor: Executor, raw: &serde_json::Value) -> Result<Self, AppError> {
        let args: Args = serde_json::from_value(raw.clone())?;
        let projects_n = args
            .projects_n
            .ok_or_else(|| AppError::MissingArg("projects_n".to_string()))?;
        if projects_n < 1 {
            return Err(AppError::MissingArg("projects_n".to_string()));
        }

        let matrix = args
            .matrix
            .unwrap_or_else(|| DEFAULT_MATRIX.iter().map(|s| s.to_string()).collect());

        Ok(DeleteProject {
            executor,
            projects_n,
            skip_failed_queries: args.skip_failed_queries.unwrap_or_default(),
            matrix,
        })
    }

    fn matrix_filters(&self, project: &Project) -> Vec<Filter> {
        let fields: Vec<&str> = self.matrix.iter().map(String::as_str).collect();
        matrix_fields(project, &fields)
            .into_iter()
            .map(|(field, value)| Filter::FieldEq(format!("projects.{field}"), value))
            .collect()
    }

    async fn run_tick(&self) {
        if let Err(err) = self.try_tick().await {
            if !err.is_contention() {
                tracing::error!(error = %err, "delete_project tick failed");
            }
        }
    }

    async fn try_tick(&self) -> Result<(), AppError> {
        let base = self.executor.base();

        let mut sample = ProjectRepository::find_random_projects(&base.db, &base.region_filters, 1).await?;
        let Some(key_project) = sample.pop() else {
            return Ok(());
        };

        let mut filters = base.region_filters.clone();
        filters.extend(self.matrix_filters(&key_project));

        let n_plus_one = self.projects_n + 1;
        let mut candidates = ProjectRepository::find_random_projects(&base.db, &filters, n_plus_one).await?;

        if candidates.len() as i64 <= self.projects_n {
            return Ok(());
        }

        candidates.truncate(self.projects_n as usize);
        candidates.sort_by_key(|p| p.created_at);
        let median_idx = (self.projects_n as usize) / 2;
        let target = &candidates[median_idx];

        let lock = base.project_locker.get(target.id).await;
        let Some(_guard) = lock.try_exclusive_lock() else {
            return Ok(());
        };

        if lock.is_deleted() {
            return Ok(());
        }

        if self.skip_failed_queries.enabled {
            let last = QueryRepository::fetch_last_queries(
                &base.db,
                target.id,
                self.skip_failed_queries.queries_n,
            )
            .await?;

            if let Some(bad) = last
                .iter()
                .find(|q| q.result.is_failed || !q.result.is_finished)
            {
                return Err(AppError::RecentQueryFailed {
                    project_id: target.id,
                    query_id: bad.id,
                });
            }
        }

        self.delete_target(target).await?;

        lock.mark_deleted();
        base.project_locker.delete(target.id);

        Ok(())
    }

    /// Local soft-delete precedes the remote call, so racing readers observe
    /// the intended state immediately; a remote failure becomes a permanent
    /// audit line on the query row but does not undo the local soft-delete.
    async fn delete_target(&self, target: &Project) -> Result<(), AppError> {
        let base = self.executor.base();

        let req = base.neon_client.prepare_delete_project(&target.provider_project_id);
        let mut query = Query::pending(
            QueryDestination::Api,
            req.url.clone(),
            req.label.to_string(),
            req.method.to_string(),
            req.body.clone(),
        );

        let saver = QuerySaver::new(
            base.db.clone(),
            QuerySaverArgs {
                project_id: Some(target.id),
                region_id: Some(target.region_id),
                exitnode: Some(base.exitnode.clone()),
            },
        );
        saver.save(&mut query).await?;

        ProjectRepository::delete(&base.db, target.id).await?;

        let send_result = base.neon_client.send(&req).await;
        let remote_err = match send_result {
            Ok(resp) if resp.is_success() => {
                query.finish(Some(resp.body), None);
                None
            }
            Ok(resp) => {
                let err = AppError::ProviderStatus {
                    status: resp.status,
                    body: resp.body.clone(),
                };
                query.finish(Some(resp.body), Some(&err.to_string()));
                Some(err)
            }
            Err(err) => {
                query.finish(None, Some(&err.to_string()));
                Some(err)
            }
        };

        let update_err = saver.finish_save_result(query.id, &query.result).await.err();

        if let Some(err) = AppError::combine(remote_err, update_err) {
            return Err(err);
        }

        Ok(())
    }
}

#[async_trait]
impl RuleImpl for DeleteProject {
    async fn execute(&self, _ctx: &RunCtx) -> Result<(), AppError> {
        let base = self.executor.base();
        let this = self.clone();
        base.registry.go(async move { this.run_tick().await }).await;
        Ok(())
    }
}
