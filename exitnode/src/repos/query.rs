use shared::models::query::{Query, QueryResult};
use shared::utilities::errors::AppError;
use sqlx::PgPool;

pub struct QueryRepository;

impl QueryRepository {
    /// Inserts a pending query row, filling in the database-assigned id and
    /// timestamps on the passed-in record.
    #[tracing::instrument(name = "query_repository.save", skip(pool, query), err)]
    pub async fn save(pool: &PgPool, query: &mut Query) -> Result<(), AppError> {
        let row = sqlx::query_as::<_, Query>(
            r#"
            INSERT INTO queries (
                project_id, region_id, exitnode, related_query_id, kind, addr,
                driver, method, request, is_finished, response, error,
                started_at, finished_at, is_failed, duration_ms, not_cold
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(query.project_id)
        .bind(query.region_id)
        .bind(&query.exitnode)
        .bind(query.related_query_id)
        .bind(query.kind)
        .bind(&query.addr)
        .bind(&query.driver)
        .bind(&query.method)
        .bind(&query.request)
        .bind(query.result.is_finished)
        .bind(&query.result.response)
        .bind(&query.result.error)
        .bind(query.result.started_at)
        .bind(query.result.finished_at)
        .bind(query.result.is_failed)
        .bind(query.result.duration_ms)
        .bind(query.not_cold)
        .fetch_one(pool)
        .await?;

        *query = row;
        Ok(())
    }

    /// Updates only the result subset of a query row, the pattern every
    /// driver uses once an attempt finishes.
    #[tracing::instrument(name = "query_repository.finish_save_result", skip(pool, result), err)]
    pub async fn finish_save_result(
        pool: &PgPool,
        query_id: i64,
        result: &QueryResult,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE queries SET
                is_finished = $2,
                response = $3,
                error = $4,
                started_at = $5,
                finished_at = $6,
                is_failed = $7,
                duration_ms = $8,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(query_id)
        .bind(result.is_finished)
        .bind(&result.response)
        .bind(&result.error)
        .bind(result.started_at)
        .bind(result.finished_at)
        .bind(result.is_failed)
        .bind(result.duration_ms)
        .execute(pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(name = "query_repository.fetch_last_queries", skip(pool), err)]
    pub async fn fetch_last_queries(
        pool: &PgPool,
        project_id: i64,
        limit: i64,
    ) -> Result<Vec<Query>, AppError> {
        let queries = sqlx::query_as::<_, Query>(
            r#"
            SELECT * FROM queries
            WHERE project_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(project_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(queries)
    }
}
