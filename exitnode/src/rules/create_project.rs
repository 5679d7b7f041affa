use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shared::models::region::Region;
use shared::utilities::errors::AppError;

use crate::neonapi::models::{CreateProjectResponse, GetOperationsResponse};
use crate::rdesc::{Wrand, WrandItem};
use crate::repos::{NewProject, ProjectRepository, QuerySaver, QuerySaverArgs, RegionRepository};

use super::executable::RuleImpl;
use super::executor::{Executor, RunCtx};
use super::query_api;

const DEFAULT_PROVISIONER: &str = "k8s-pod";
const NEON_VM_PROVISIONER: &str = "k8s-neonvm";

const BACKOFF_INITIAL: Duration = Duration::from_secs(2);
const BACKOFF_FACTOR: f64 = 1.5;
const BACKOFF_CAP: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct Args {
    #[serde(default, with = "humantime_serde")]
    interval: Option<Duration>,
    #[serde(default)]
    pg_version: Option<Wrand<i32>>,
    #[serde(default)]
    provisioner: Option<Wrand<String>>,
    #[serde(default)]
    suspend_timeout: Option<Wrand<i32>>,
    #[serde(default)]
    mode: Option<Wrand<String>>,
}

fn default_pg_version() -> Wrand<i32> {
    Wrand::new(vec![
        WrandItem { weight: 1.0, item: 15 },
        WrandItem { weight: 1.0, item: 14 },
    ])
}

fn default_provisioner() -> Wrand<String> {
    Wrand::new(vec![
        WrandItem {
            weight: 1.0,
            item: DEFAULT_PROVISIONER.to_string(),
        },
        WrandItem {
            weight: 1.0,
            item: NEON_VM_PROVISIONER.to_string(),
        },
    ])
}

fn default_suspend_timeout() -> Wrand<i32> {
    Wrand::new(vec![
        WrandItem { weight: 20.0, item: 0 },
        WrandItem { weight: 1.0, item: 1 },
    ])
}

fn default_mode() -> Wrand<String> {
    Wrand::new(vec![WrandItem {
        weight: 1.0,
        item: String::new(),
    }])
}

/// Fans out to one task per region; each task creates a project in that
/// region if the last one created there (including soft-deleted ones) is
/// older than `interval`, or doesn't exist yet.
#[derive(Clone)]
pub struct CreateProject {
    executor: Executor,
    interval: Duration,
    pg_version: Wrand<i32>,
    provisioner: Wrand<String>,
    suspend_timeout: Wrand<i32>,
    mode: Wrand<String>,
}

impl CreateProject {
    pub fn from_args(executor: Executor, raw: &serde_json::Value) -> Result<Self, AppError> {
        let args: Args = serde_json::from_value(raw.clone())?;
        let interval = args
            .interval
            .ok_or_else(|| AppError::MissingArg("interval".to_string()))?;

        Ok(CreateProject {
            executor,
            interval,
            pg_version: args.pg_version.unwrap_or_else(default_pg_version),
            provisioner: args.provisioner.unwrap_or_else(default_provisioner),
            suspend_timeout: args.suspend_timeout.unwrap_or_else(default_suspend_timeout),
            mode: args.mode.unwrap_or_else(default_mode),
        })
    }

    async fn run_region(&self, region: Region) {
        if let Err(err) = self.maybe_create(&region).await {
            tracing::error!(error = %err, region_id = region.id, "create_project tick failed");
        }
    }

    async fn maybe_create(&self, region: &Region) -> Result<(), AppError> {
        let base = self.executor.base();
        let last = ProjectRepository::find_last_created_project(&base.db, region.id).await?;

        let interval = chrono::Duration::from_std(self.interval).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100));
        let should_create = match &last {
            None => true,
            Some(project) => chrono::Utc::now() - project.created_at > interval,
        };

        if !should_create {
            return Ok(());
        }

        self.create_one(region).await
    }

    async fn create_one(&self, region: &Region) -> Result<(), AppError> {
        let base = self.executor.base();

        let seq_key = format!("create_project/{}", base.exitnode);
        let handle = crate::repos::SequenceRepository::get(&base.db, &seq_key).await?;
        let seq = handle.next(&base.db).await?;
        let name = format!("test@{}-{}", base.exitnode, seq);

        let mut provisioner = self.provisioner.pick();
        if !region.supports_neon_vm {
            provisioner = DEFAULT_PROVISIONER.to_string();
        }
        let pg_version = self.pg_version.pick();
        let suspend_timeout = self.suspend_timeout.pick();
        let mode = self.mode.pick();

        let saver = QuerySaver::new(
            base.db.clone(),
            QuerySaverArgs {
                project_id: None,
                region_id: Some(region.id),
                exitnode: Some(base.exitnode.clone()),
            },
        );

        let req = base
            .neon_client
            .prepare_create_project(&name, &region.database_region, pg_version, &provisioner)?;
        let body = query_api::call(&base.neon_client, &saver, req).await?;
        let resp: CreateProjectResponse = serde_json::from_str(&body)?;

        self.post_process(&saver, &resp, suspend_timeout).await?;

        let connection_string = match resp.connection_uris.as_slice() {
            [one] => one.connection_uri.clone(),
            other => {
                tracing::warn!(
                    count = other.len(),
                    project = %resp.project.id,
                    "expected exactly one connection uri"
                );
                String::new()
            }
        };

        ProjectRepository::create(
            &base.db,
            NewProject {
                region_id: region.id,
                name,
                provider_project_id: resp.project.id,
                connection_string,
                created_by_exitnode: base.exitnode.clone(),
                pg_version,
                provisioner,
                suspend_timeout_seconds: suspend_timeout,
                current_mode: mode,
            },
        )
        .await?;

        Ok(())
    }

    async fn post_process(
        &self,
        saver: &QuerySaver,
        resp: &CreateProjectResponse,
        desired_suspend_timeout: i32,
    ) -> Result<(), AppError> {
        let base = self.executor.base();

        let Some(endpoint) = resp.endpoints.first() else {
            return Ok(());
        };
        if endpoint.suspend_timeout_seconds == desired_suspend_timeout {
            return Ok(());
        }

        self.wait_operations_finished(&resp.project.id).await?;

        let req = base
            .neon_client
            .prepare_update_endpoint(&resp.project.id, &endpoint.id, desired_suspend_timeout)?;
        query_api::call(&base.neon_client, saver, req).await?;
        Ok(())
    }

    async fn wait_operations_finished(&self, project_id: &str) -> Result<(), AppError> {
        let base = self.executor.base();
        let mut backoff = BACKOFF_INITIAL;

        loop {
            let req = base.neon_client.prepare_get_operations(project_id);
            let body = base.neon_client.send(&req).await?.into_result()?;
            let parsed: GetOperationsResponse = serde_json::from_str(&body)?;

            if parsed.operations.iter().all(|op| op.is_finished()) {
                return Ok(());
            }

            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(
                Duration::from_secs_f64(backoff.as_secs_f64() * BACKOFF_FACTOR),
                BACKOFF_CAP,
            );
        }
    }
}

#[async_trait]
impl RuleImpl for CreateProject {
    async fn execute(&self, _ctx: &RunCtx) -> Result<(), AppError> {
        let base = self.executor.base();
        let regions = RegionRepository::find(&base.db, &base.region_filters).await?;

        for region in regions {
            let this = self.clone();
            base.registry.go(async move { this.run_region(region).await }).await;
        }

        Ok(())
    }
}
