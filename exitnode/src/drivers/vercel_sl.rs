use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::models::query::{Query, QueryDestination, QueryResult};
use shared::utilities::errors::AppError;

use crate::repos::QuerySaver;

use super::driver::{Driver, ManyQueriesDriver};
use super::models::SingleQuery;

const DEFAULT_API_URL: &str = "https://sl-driver.vercel.app/api/query";

#[derive(Serialize)]
struct SlRequest<'a> {
    connstr: &'a str,
    queries: &'a [SingleQuery],
}

#[derive(Deserialize)]
struct SlResponse {
    queries: Vec<SlQueryResponse>,
}

#[derive(Deserialize)]
struct SlQueryResponse {
    exitnode: String,
    kind: String,
    addr: String,
    driver: String,
    method: String,
    request: String,
    response: String,
    error: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    is_failed: bool,
    duration_ns: Option<i64>,
}

/// `@neondatabase/serverless` exercised through a small hosted relay, run by
/// the same project that ships the driver. The relay executes every query
/// and reports back pre-formed `Query` records — this driver just maps them.
pub struct VercelSl {
    connstr: String,
    http: reqwest::Client,
    api_url: String,
    saver: QuerySaver,
}

impl VercelSl {
    pub fn new(connection_string: &str, saver: QuerySaver) -> Self {
        VercelSl {
            connstr: connection_string.to_string(),
            http: reqwest::Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            saver,
        }
    }

    fn convert(&self, resp: SlQueryResponse) -> Query {
        Query {
            id: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            project_id: None,
            region_id: None,
            exitnode: resp.exitnode,
            related_query_id: None,
            kind: if resp.kind == "api" {
                QueryDestination::Api
            } else {
                QueryDestination::Db
            },
            addr: resp.addr,
            driver: resp.driver,
            method: resp.method,
            request: resp.request,
            result: QueryResult {
                is_finished: true,
                response: resp.response,
                error: resp.error,
                started_at: resp.started_at,
                finished_at: resp.finished_at,
                is_failed: resp.is_failed,
                duration_ms: resp.duration_ns.map(|ns| ns / 1_000_000),
            },
            not_cold: false,
        }
    }
}

#[async_trait]
impl Driver for VercelSl {
    async fn query(&mut self, req: SingleQuery, not_cold: bool) -> Result<Query, AppError> {
        self.queries(vec![req])
            .await?
            .into_iter()
            .next()
            .map(|mut q| {
                q.not_cold = not_cold;
                q
            })
            .ok_or_else(|| AppError::Other("vercel-sl relay returned no queries".to_string()))
    }
}

#[async_trait]
impl ManyQueriesDriver for VercelSl {
    #[tracing::instrument(name = "vercel_sl.queries", skip(self, reqs), err)]
    async fn queries(&mut self, reqs: Vec<SingleQuery>) -> Result<Vec<Query>, AppError> {
        let request_body = serde_json::to_string(&SlRequest {
            connstr: &self.connstr,
            queries: &reqs,
        })?;

        let resp = self
            .http
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .body(request_body)
            .send()
            .await?
            .error_for_status()?;

        let sl_resp: SlResponse = resp.json().await?;

        let mut records: Vec<Query> = sl_resp.queries.into_iter().map(|q| self.convert(q)).collect();
        for record in &mut records {
            self.saver.save(record).await?;
        }

        Ok(records)
    }
}
