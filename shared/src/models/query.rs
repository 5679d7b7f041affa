use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QueryDestination {
    /// Request to the provider's HTTP control-plane API.
    Api,
    /// SQL query against the data plane.
    Db,
}

/// A single outbound attempt: an API call or a SQL query.
///
/// Created before the attempt in pending form, updated once when the
/// attempt completes. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Query {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub project_id: Option<i64>,
    pub region_id: Option<i64>,
    pub exitnode: String,

    /// Usually refers to the connect query that preceded this one.
    pub related_query_id: Option<i64>,

    pub kind: QueryDestination,

    /// For API queries: the full URL. For DB queries: the connection string.
    pub addr: String,
    pub driver: String,
    pub method: String,
    pub request: String,

    #[sqlx(flatten)]
    pub result: QueryResult,

    /// True if this query is not the first in a chain, i.e. most likely not
    /// a cold start.
    pub not_cold: bool,
}

/// Result fields, populated only once the query is finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueryResult {
    pub is_finished: bool,
    pub response: String,
    pub error: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub is_failed: bool,
    pub duration_ms: Option<i64>,
}

impl Query {
    /// A brand-new, unfinished record; call sites fill `addr`/`driver`/...
    /// immediately after, then hand it to `QuerySaver::save`.
    pub fn pending(kind: QueryDestination, addr: String, driver: String, method: String, request: String) -> Self {
        Query {
            id: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            project_id: None,
            region_id: None,
            exitnode: String::new(),
            related_query_id: None,
            kind,
            addr,
            driver,
            method,
            request,
            result: QueryResult {
                started_at: Some(Utc::now()),
                ..Default::default()
            },
            not_cold: false,
        }
    }

    /// Marks the query finished, filling in duration and failure state. A
    /// response already set by the driver is never overwritten, and an
    /// error is only recorded if the query isn't already marked failed.
    pub fn finish(&mut self, response: Option<String>, err: Option<&str>) {
        if self.result.response.is_empty() {
            if let Some(r) = response {
                self.result.response = r;
            }
        }

        if let Some(e) = err {
            if !self.result.is_failed {
                self.result.is_failed = true;
                self.result.error = e.to_string();
            }
        }

        self.result.is_finished = true;
        if self.result.finished_at.is_none() && self.result.started_at.is_some() {
            self.result.finished_at = Some(Utc::now());
        }

        if self.result.duration_ms.is_none() {
            if let (Some(start), Some(finish)) = (self.result.started_at, self.result.finished_at) {
                self.result.duration_ms = Some((finish - start).num_milliseconds());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_is_idempotent_on_response_and_error() {
        let mut q = Query::pending(QueryDestination::Api, "url".into(), "d".into(), "POST".into(), "{}".into());
        q.finish(Some("first".to_string()), Some("boom"));
        q.finish(Some("second".to_string()), Some("different boom"));

        assert_eq!(q.result.response, "first");
        assert_eq!(q.result.error, "boom");
        assert!(q.result.is_failed);
        assert!(q.result.is_finished);
    }

    #[test]
    fn finish_without_error_leaves_query_unfailed() {
        let mut q = Query::pending(QueryDestination::Db, "conn".into(), "pgx-conn".into(), "query".into(), "SELECT 1".into());
        q.finish(Some("1".to_string()), None);

        assert!(!q.result.is_failed);
        assert!(q.result.error.is_empty());
        assert!(q.result.is_finished);
    }

    #[test]
    fn finish_computes_duration_from_start_and_finish() {
        let mut q = Query::pending(QueryDestination::Db, "conn".into(), "pgx-conn".into(), "query".into(), "SELECT 1".into());
        q.finish(None, None);
        assert!(q.result.duration_ms.is_some());
    }
}
