use async_trait::async_trait;

use shared::utilities::errors::AppError;

use super::executor::RunCtx;

/// Single-method capability every rule implementation provides. The factory
/// builds one of these from a descriptor's `act` tag and args blob.
#[async_trait]
pub trait RuleImpl: Send + Sync {
    async fn execute(&self, ctx: &RunCtx) -> Result<(), AppError>;
}
