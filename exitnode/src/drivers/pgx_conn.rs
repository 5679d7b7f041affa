use async_trait::async_trait;
use shared::models::query::{Query, QueryDestination};
use shared::utilities::errors::AppError;
use sqlx::postgres::PgConnection;
use sqlx::{Column, Connection, Row, TypeInfo};

use crate::repos::QuerySaver;

use super::driver::{CloseableDriver, Driver};
use super::models::SingleQuery;

const DRIVER_NAME: &str = "go-pgx-conn";

/// A dedicated (non-pooled) Postgres connection, mirroring what a
/// connection-oriented driver like pgx does: one physical connection per
/// scenario run, persisted as a `connect` query, with every subsequent
/// query's record linked back to it via `related_query_id`.
pub struct PgxConnection {
    connstr: String,
    conn: Option<PgConnection>,
    connect_query_id: i64,
    saver: QuerySaver,
}

impl PgxConnection {
    #[tracing::instrument(name = "pgx_connection.connect", skip(connstr, saver), err)]
    pub async fn connect(connstr: &str, saver: QuerySaver) -> Result<Self, AppError> {
        let mut connect_query = Query::pending(
            QueryDestination::Db,
            connstr.to_string(),
            DRIVER_NAME.to_string(),
            "connect".to_string(),
            String::new(),
        );

        let conn_result = PgConnection::connect(connstr).await;
        let (finish_err, conn) = match conn_result {
            Ok(conn) => (None, Some(conn)),
            Err(err) => (Some(err.to_string()), None),
        };
        connect_query.finish(None, finish_err.as_deref());

        let save_err = saver.save(&mut connect_query).await.err();
        let conn_err = conn.is_none().then(|| AppError::Other(finish_err.unwrap_or_default()));
        if let Some(err) = AppError::combine(conn_err, save_err) {
            return Err(err);
        }

        Ok(PgxConnection {
            connstr: connstr.to_string(),
            conn: Some(conn.expect("checked above")),
            connect_query_id: connect_query.id,
            saver,
        })
    }
}

#[async_trait]
impl Driver for PgxConnection {
    #[tracing::instrument(name = "pgx_connection.query", skip(self, req), err)]
    async fn query(&mut self, req: SingleQuery, not_cold: bool) -> Result<Query, AppError> {
        let request_json = serde_json::to_string(&req)?;

        let mut query = Query::pending(
            QueryDestination::Db,
            self.connstr.clone(),
            DRIVER_NAME.to_string(),
            "query".to_string(),
            request_json,
        );
        query.related_query_id = Some(self.connect_query_id);
        query.not_cold = not_cold;

        let mut sql_query = sqlx::query(&req.query);
        for param in &req.params {
            sql_query = bind_json_value(sql_query, param);
        }

        let conn = self.conn.as_mut().ok_or(AppError::Other("connection already closed".to_string()))?;
        let result = sql_query.fetch_all(conn).await;
        match result {
            Ok(rows) => {
                let values: Vec<serde_json::Value> = rows.iter().map(row_to_json).collect();
                let response = serde_json::to_string(&values)?;
                query.finish(Some(response), None);
            }
            Err(err) => {
                query.finish(None, Some(&err.to_string()));
            }
        }

        self.saver.save(&mut query).await?;
        Ok(query)
    }
}

#[async_trait]
impl CloseableDriver for PgxConnection {
    async fn close(&mut self) -> Result<(), AppError> {
        // sqlx closes the connection on drop too; an explicit close lets the
        // server see a clean termination instead of a dropped socket.
        if let Some(conn) = self.conn.take() {
            conn.close().await?;
        }
        Ok(())
    }
}

fn bind_json_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: &'q serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        serde_json::Value::Null => query.bind(None::<i64>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        serde_json::Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Best-effort conversion of a result row to JSON, covering the scalar
/// types the probe scenarios actually select.
fn row_to_json(row: &sqlx::postgres::PgRow) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let name = col.name().to_string();
        let type_name = col.type_info().name();
        let value = match type_name {
            "INT2" | "INT4" => row
                .try_get::<i32, _>(i)
                .map(|v| serde_json::json!(v))
                .unwrap_or(serde_json::Value::Null),
            "INT8" => row
                .try_get::<i64, _>(i)
                .map(|v| serde_json::json!(v))
                .unwrap_or(serde_json::Value::Null),
            "FLOAT4" | "FLOAT8" | "NUMERIC" => row
                .try_get::<f64, _>(i)
                .map(|v| serde_json::json!(v))
                .unwrap_or(serde_json::Value::Null),
            "BOOL" => row
                .try_get::<bool, _>(i)
                .map(|v| serde_json::json!(v))
                .unwrap_or(serde_json::Value::Null),
            "TIMESTAMP" | "TIMESTAMPTZ" => row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(i)
                .map(|v| serde_json::json!(v.to_rfc3339()))
                .unwrap_or(serde_json::Value::Null),
            _ => row
                .try_get::<String, _>(i)
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        };
        obj.insert(name, value);
    }
    serde_json::Value::Object(obj)
}
