use async_trait::async_trait;
use shared::models::query::Query;
use shared::utilities::errors::AppError;

use super::models::SingleQuery;

/// Uniform capability every driver has: run one query and get back the
/// persisted record.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn query(&mut self, req: SingleQuery, not_cold: bool) -> Result<Query, AppError>;
}

/// Optional capability: drivers that can batch several statements in one
/// round trip implement this instead of being called in a loop.
#[async_trait]
pub trait ManyQueriesDriver: Driver {
    async fn queries(&mut self, reqs: Vec<SingleQuery>) -> Result<Vec<Query>, AppError>;
}

/// Optional capability: connection-backed drivers that must be explicitly
/// released.
#[async_trait]
pub trait CloseableDriver: Driver {
    async fn close(&mut self) -> Result<(), AppError>;
}
