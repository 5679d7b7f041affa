use shared::utilities::config::Config;
use shared::utilities::errors::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::bgjobs::{ProjectLocker, Registry};
use crate::neonapi::NeonClient;
use crate::repos::filters::Filter;

/// Wires together everything most rule implementations need: config, the
/// database pool, the provider API client, the background task registry and
/// the per-project locker.
pub struct App {
    pub config: Config,
    pub db: PgPool,
    pub neon_client: NeonClient,
    pub registry: Registry,
    pub project_locker: ProjectLocker,
    pub exitnode: String,
    pub region_filters: Vec<Filter>,
}

impl App {
    pub async fn from_env() -> Result<Self, AppError> {
        let config = Config::from_env()?;
        Self::new(config).await
    }

    pub async fn new(config: Config) -> Result<Self, AppError> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.postgres_dsn)
            .await?;

        let neon_client = NeonClient::new(config.api_base_url(), config.neon_api_key.clone());

        let mut region_filters = Vec::new();
        if let Some(raw) = &config.region_filters {
            if !raw.is_empty() {
                region_filters.push(Filter::Raw(raw.clone()));
            }
        }

        let exitnode = config.exitnode.clone();

        Ok(App {
            db,
            neon_client,
            registry: Registry::new(),
            project_locker: ProjectLocker::new(),
            exitnode,
            region_filters,
            config,
        })
    }
}
