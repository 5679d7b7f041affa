use shared::utilities::errors::AppError;
use sqlx::PgPool;

/// A handle to a named monotonic counter. `next` is the only operation
/// exposed; reading a value without advancing it has no use case here.
pub struct SequenceHandle {
    key: String,
}

pub struct SequenceRepository;

impl SequenceRepository {
    /// Returns a handle to the sequence `key`, creating it at zero if it
    /// does not exist yet.
    #[tracing::instrument(name = "sequence_repository.get", skip(pool), err)]
    pub async fn get(pool: &PgPool, key: &str) -> Result<SequenceHandle, AppError> {
        sqlx::query("INSERT INTO sequences (key, val) VALUES ($1, 0) ON CONFLICT (key) DO NOTHING")
            .bind(key)
            .execute(pool)
            .await?;

        Ok(SequenceHandle { key: key.to_string() })
    }
}

impl SequenceHandle {
    #[tracing::instrument(name = "sequence_handle.next", skip(self, pool), err)]
    pub async fn next(&self, pool: &PgPool) -> Result<i64, AppError> {
        let (val,): (i64,) =
            sqlx::query_as("UPDATE sequences SET val = val + 1 WHERE key = $1 RETURNING val")
                .bind(&self.key)
                .fetch_one(pool)
                .await?;

        Ok(val)
    }
}
