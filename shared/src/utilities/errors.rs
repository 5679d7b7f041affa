#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} environment variable not set")]
    MissingEnv(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown rule act: {0}")]
    UnknownRule(String),

    #[error("missing required arg: {0}")]
    MissingArg(String),

    #[error("failed to parse period: {0}")]
    InvalidPeriod(String),

    #[error("project is locked")]
    ProjectLocked,

    #[error("concurrency limit reached")]
    ConcurrencyLimit,

    #[error("recent query {query_id} on project {project_id} is failed or unfinished")]
    RecentQueryFailed { project_id: i64, query_id: i64 },

    #[error("provider returned status {status}, body: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("last query was too long ago: {elapsed_secs}s, suspend timeout is {timeout_secs}s")]
    ScenarioDeadlineMissed {
        elapsed_secs: f64,
        timeout_secs: f64,
    },

    #[error("failed to append pooler suffix to connection string")]
    PoolerSuffix,

    #[error("unknown driver: {0}")]
    UnknownDriver(String),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("{0}")]
    Other(String),

    #[error("{0}; also: {1}")]
    Combined(Box<AppError>, Box<AppError>),
}

impl AppError {
    /// Joins two fallible outcomes, keeping whichever side(s) are actually errors.
    pub fn combine(primary: Option<AppError>, secondary: Option<AppError>) -> Option<AppError> {
        match (primary, secondary) {
            (Some(a), Some(b)) => Some(AppError::Combined(Box::new(a), Box::new(b))),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    pub fn is_contention(&self) -> bool {
        matches!(self, AppError::ProjectLocked | AppError::ConcurrencyLimit)
    }
}
