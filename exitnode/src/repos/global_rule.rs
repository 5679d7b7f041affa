use shared::models::global_rule::GlobalRule;
use shared::utilities::errors::AppError;
use sqlx::PgPool;

pub struct GlobalRuleRepository;

impl GlobalRuleRepository {
    #[tracing::instrument(name = "global_rule_repository.all_enabled", skip(pool), err)]
    pub async fn all_enabled(pool: &PgPool) -> Result<Vec<GlobalRule>, AppError> {
        let rules = sqlx::query_as::<_, GlobalRule>(
            r#"
            SELECT * FROM global_rules
            WHERE enabled = true
            ORDER BY priority ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rules)
    }
}
