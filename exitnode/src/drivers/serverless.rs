use async_trait::async_trait;
use serde::Serialize;
use shared::models::query::{Query, QueryDestination};
use shared::utilities::errors::AppError;
use url::Url;

use crate::repos::QuerySaver;

use super::driver::Driver;
use super::models::SingleQuery;

const DRIVER_NAME: &str = "go-serverless";

#[derive(Serialize)]
struct HttpOverSqlRequest<'a> {
    query: &'a str,
    params: &'a [serde_json::Value],
}

/// SQL-over-HTTP driver: talks to a Neon-serverless-compatible `/sql`
/// endpoint derived from the connection string's host.
pub struct Serverless {
    connstr: Url,
    http: reqwest::Client,
    saver: QuerySaver,
}

impl Serverless {
    pub fn new(connection_string: &str, saver: QuerySaver) -> Result<Self, AppError> {
        Ok(Serverless {
            connstr: Url::parse(connection_string)?,
            http: reqwest::Client::new(),
            saver,
        })
    }

    fn http_url(&self) -> String {
        format!("https://{}/sql", self.connstr.host_str().unwrap_or_default())
    }
}

#[async_trait]
impl Driver for Serverless {
    #[tracing::instrument(name = "serverless.query", skip(self, req), err)]
    async fn query(&mut self, req: SingleQuery, not_cold: bool) -> Result<Query, AppError> {
        let request_body = serde_json::to_string(&HttpOverSqlRequest {
            query: &req.query,
            params: &req.params,
        })?;

        let mut query = Query::pending(
            QueryDestination::Db,
            self.connstr.to_string(),
            DRIVER_NAME.to_string(),
            "sql-over-http".to_string(),
            request_body.clone(),
        );
        query.not_cold = not_cold;

        let result = self
            .http
            .post(self.http_url())
            .header("Content-Type", "application/json")
            .header("Neon-Connection-String", self.connstr.to_string())
            .body(request_body)
            .send()
            .await;

        match result {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                if status.is_success() {
                    query.finish(Some(body), None);
                } else {
                    query.finish(Some(body.clone()), Some(&format!("bad status code {status}, body: {body}")));
                }
            }
            Err(err) => {
                query.finish(None, Some(&err.to_string()));
            }
        }

        self.saver.save(&mut query).await?;
        Ok(query)
    }
}
