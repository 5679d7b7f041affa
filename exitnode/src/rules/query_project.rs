use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use shared::models::project::Project;
use shared::models::query::Query;
use shared::utilities::errors::AppError;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use crate::drivers::{CloseableDriver, Driver, ManyQueriesDriver, Name, PgxConnection, Serverless, SingleQuery, VercelSl};
use crate::rdesc::{Wrand, WrandItem};
use crate::repos::{Filter, ProjectRepository, QuerySaver, QuerySaverArgs};

use super::executable::RuleImpl;
use super::executor::{Executor, RunCtx};
use super::query_scenario;

static POOLER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([a-z0-9\-]+)\.").expect("valid regex"));

fn append_pooler_suffix(connstr: &str) -> Result<String, AppError> {
    if !POOLER_RE.is_match(connstr) {
        return Err(AppError::PoolerSuffix);
    }
    Ok(POOLER_RE.replace(connstr, "@$1-pooler.").to_string())
}

fn with_application_name(connstr: &str, driver: &str) -> Result<String, AppError> {
    let mut url = url::Url::parse(connstr)?;
    url.query_pairs_mut()
        .append_pair("application_name", &format!("testodrome/{driver}"));
    Ok(url.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
struct Args {
    #[serde(default)]
    use_pooler: Option<Wrand<bool>>,
    #[serde(default)]
    driver: Option<Wrand<Name>>,
    max_random_projects: Option<i64>,
    #[serde(default)]
    concurrency_limit: Option<i64>,
    scenario: Option<String>,
    #[serde(default)]
    raw_project_filter: Option<String>,
}

fn default_use_pooler() -> Wrand<bool> {
    Wrand::new(vec![
        WrandItem { weight: 1.0, item: true },
        WrandItem { weight: 1.0, item: false },
    ])
}

fn default_driver() -> Wrand<Name> {
    Wrand::new(vec![
        WrandItem {
            weight: 1.0,
            item: Name::PgxConn,
        },
        WrandItem {
            weight: 1.0,
            item: Name::GoServerless,
        },
        WrandItem {
            weight: 1.0,
            item: Name::VercelEdge,
        },
    ])
}

enum LockGuard {
    Write(OwnedRwLockWriteGuard<()>),
    Read(OwnedRwLockReadGuard<()>),
}

/// Dispatches to whichever driver a tick happened to pick. Lives here rather
/// than in `drivers` because only `QueryProject` needs to juggle the three
/// concrete types behind one handle.
pub enum DriverHandle {
    Pgx(PgxConnection),
    Serverless(Serverless),
    VercelSl(VercelSl),
}

impl DriverHandle {
    pub async fn query(&mut self, req: SingleQuery, not_cold: bool) -> Result<Query, AppError> {
        match self {
            DriverHandle::Pgx(d) => d.query(req, not_cold).await,
            DriverHandle::Serverless(d) => d.query(req, not_cold).await,
            DriverHandle::VercelSl(d) => d.query(req, not_cold).await,
        }
    }

    /// Prefers the driver's own many-query path when it has one (a single
    /// round trip); otherwise issues sequentially, carrying `not_cold`
    /// forward from the second query on, stopping at the first error.
    pub async fn run_queries(&mut self, reqs: Vec<SingleQuery>) -> Result<Vec<Query>, AppError> {
        match self {
            DriverHandle::VercelSl(d) => d.queries(reqs).await,
            DriverHandle::Pgx(d) => run_sequential(d, reqs).await,
            DriverHandle::Serverless(d) => run_sequential(d, reqs).await,
        }
    }

    pub async fn close(&mut self) -> Result<(), AppError> {
        if let DriverHandle::Pgx(d) = self {
            d.close().await?;
        }
        Ok(())
    }
}

async fn run_sequential<D: Driver + ?Sized>(driver: &mut D, reqs: Vec<SingleQuery>) -> Result<Vec<Query>, AppError> {
    let mut out = Vec::with_capacity(reqs.len());
    for (i, req) in reqs.into_iter().enumerate() {
        out.push(driver.query(req, i != 0).await?);
    }
    Ok(out)
}

async fn instantiate_driver(name: Name, connstr: &str, saver: QuerySaver) -> Result<DriverHandle, AppError> {
    match name {
        Name::PgxConn => Ok(DriverHandle::Pgx(PgxConnection::connect(connstr, saver).await?)),
        Name::GoServerless => Ok(DriverHandle::Serverless(Serverless::new(connstr, saver)?)),
        Name::VercelEdge => Ok(DriverHandle::VercelSl(VercelSl::new(connstr, saver))),
    }
}

/// Picks up to `max_random_projects` random projects and spawns one probing
/// task per project, each running the configured scenario against a fresh
/// driver instance.
#[derive(Clone)]
pub struct QueryProject {
    executor: Executor,
    use_pooler: Wrand<bool>,
    driver: Wrand<Name>,
    max_random_projects: i64,
    concurrency_limit: i64,
    scenario: String,
    raw_project_filter: Option<String>,
    now_running: Arc<AtomicI64>,
}

impl QueryProject {
    pub fn from_args(executor: Executor, raw: &serde_json::Value) -> Result<Self, AppError> {
        let args: Args = serde_json::from_value(raw.clone())?;
        let max_random_projects = args
            .max_random_projects
            .ok_or_else(|| AppError::MissingArg("max_random_projects".to_string()))?;
        if max_random_projects < 1 {
            return Err(AppError::MissingArg("max_random_projects".to_string()));
        }
        let scenario = args
            .scenario
            .ok_or_else(|| AppError::MissingArg("scenario".to_string()))?;
        // Validate eagerly so a bad scenario name fails at construction time.
        let _ = query_scenario::build(&scenario)?;

        Ok(QueryProject {
            executor,
            use_pooler: args.use_pooler.unwrap_or_else(default_use_pooler),
            driver: args.driver.unwrap_or_else(default_driver),
            max_random_projects,
            concurrency_limit: args.concurrency_limit.unwrap_or(0),
            scenario,
            raw_project_filter: args.raw_project_filter,
            now_running: Arc::new(AtomicI64::new(0)),
        })
    }

    fn try_acquire_concurrency(&self) -> Result<ConcurrencyGuard, AppError> {
        let now = self.now_running.fetch_add(1, Ordering::SeqCst) + 1;
        if self.concurrency_limit > 0 && now > self.concurrency_limit {
            self.now_running.fetch_sub(1, Ordering::SeqCst);
            return Err(AppError::ConcurrencyLimit);
        }
        Ok(ConcurrencyGuard(self.now_running.clone()))
    }

    async fn run_project(&self, project: Project, cancel: CancellationToken) {
        if let Err(err) = self.run_against(&project, cancel).await {
            if !err.is_contention() {
                tracing::error!(error = %err, project_id = project.id, "query_project tick failed");
            }
        }
    }

    /// Runs this rule's scenario against one already-selected project,
    /// synchronously. Used both for the rule's own random fan-out and by
    /// `change_mode` as a warm-up prerequisite against a specific project.
    pub async fn run_against(&self, project: &Project, cancel: CancellationToken) -> Result<(), AppError> {
        let base = self.executor.base();
        let scenario = query_scenario::build(&self.scenario)?;

        let lock = base.project_locker.get(project.id).await;
        let _guard = if scenario.exclusive() {
            lock.try_exclusive_lock().map(LockGuard::Write)
        } else {
            lock.try_shared_lock().map(LockGuard::Read)
        }
        .ok_or(AppError::ProjectLocked)?;

        if lock.is_deleted() {
            return Err(AppError::ProjectLocked);
        }

        let _concurrency = self.try_acquire_concurrency()?;

        let use_pooler = self.use_pooler.pick();
        let mut connstr = project.connection_string.clone();
        if use_pooler {
            connstr = append_pooler_suffix(&connstr)?;
        }

        let driver_name = self.driver.pick();
        connstr = with_application_name(&connstr, driver_name.as_str())?;

        let saver = QuerySaver::new(
            base.db.clone(),
            QuerySaverArgs {
                project_id: Some(project.id),
                region_id: Some(project.region_id),
                exitnode: Some(base.exitnode.clone()),
            },
        );

        let region = project.region_id.to_string();
        let mut driver = instantiate_driver(driver_name, &connstr, saver).await?;
        let result = scenario
            .run(
                &mut driver,
                &cancel,
                project.suspend_timeout(),
                &region,
                driver_name.as_str(),
            )
            .await;
        driver.close().await?;
        result
    }
}

struct ConcurrencyGuard(Arc<AtomicI64>);

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooler_suffix_rewrites_endpoint_host() {
        let connstr = "postgres://user:pw@ep-cool-forest-123.us-east-2.aws.neon.tech/db";
        let rewritten = append_pooler_suffix(connstr).unwrap();
        assert_eq!(
            rewritten,
            "postgres://user:pw@ep-cool-forest-123-pooler.us-east-2.aws.neon.tech/db"
        );
    }

    #[test]
    fn pooler_suffix_rejects_unmatched_host() {
        assert!(append_pooler_suffix("not-a-connection-string").is_err());
    }

    #[test]
    fn application_name_is_appended_as_query_param() {
        let connstr = "postgres://user:pw@ep-cool-forest-123-pooler.us-east-2.aws.neon.tech/db";
        let with_name = with_application_name(connstr, "pgx-conn").unwrap();
        assert!(with_name.contains("application_name=testodrome%2Fpgx-conn"));
    }
}

#[async_trait]
impl RuleImpl for QueryProject {
    async fn execute(&self, ctx: &RunCtx) -> Result<(), AppError> {
        let base = self.executor.base();

        let mut filters = base.region_filters.clone();
        if let Some(raw) = &self.raw_project_filter {
            filters.push(Filter::Raw(raw.clone()));
        }

        let projects =
            ProjectRepository::find_random_projects(&base.db, &filters, self.max_random_projects).await?;

        for project in projects {
            let this = self.clone();
            let cancel = ctx.cancel.clone();
            base.registry.go(async move { this.run_project(project, cancel).await }).await;
        }

        Ok(())
    }
}
