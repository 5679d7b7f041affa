use serde::{Deserialize, Serialize};

/// A single SQL statement, issued to whichever driver is currently active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleQuery {
    pub query: String,
    #[serde(default)]
    pub params: Vec<serde_json::Value>,
}

impl SingleQuery {
    pub fn new(query: impl Into<String>) -> Self {
        SingleQuery {
            query: query.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(query: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
        SingleQuery {
            query: query.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Name {
    PgxConn,
    GoServerless,
    VercelEdge,
}

impl Name {
    pub fn as_str(&self) -> &'static str {
        match self {
            Name::PgxConn => "pgx-conn",
            Name::GoServerless => "go-serverless",
            Name::VercelEdge => "vercel-edge",
        }
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
