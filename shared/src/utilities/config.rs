use crate::utilities::errors::AppError;

/// Process-wide configuration, read once from the environment at startup.
/// Two required variables, everything else defaulted.
#[derive(Clone, Debug)]
pub struct Config {
    pub postgres_dsn: String,
    pub neon_api_key: String,
    pub exitnode: String,
    pub provider: String,
    pub prometheus_bind: String,
    pub db_debug: bool,
    pub region_filters: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        // Best-effort; a missing .env is expected in production.
        let _ = dotenvy::dotenv();

        let postgres_dsn = required_env("POSTGRES_DSN")?;
        let neon_api_key = required_env("NEON_API_KEY")?;
        let exitnode = optional_env("EXITNODE").unwrap_or_else(|| "local-laptop".to_string());
        let provider = optional_env("PROVIDER").unwrap_or_else(|| "staging.neon.tech".to_string());
        let prometheus_bind = optional_env("PROMETHEUS_BIND").unwrap_or_else(|| ":2112".to_string());
        let db_debug = optional_env("DB_DEBUG")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let region_filters = optional_env("REGION_FILTERS");

        Ok(Config {
            postgres_dsn,
            neon_api_key,
            exitnode,
            provider,
            prometheus_bind,
            db_debug,
            region_filters,
        })
    }

    /// Base URL of the provider's control-plane API.
    pub fn api_base_url(&self) -> String {
        format!("https://console.{}/api/v2", self.provider)
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    std::env::var(name).map_err(|_| AppError::MissingEnv(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
