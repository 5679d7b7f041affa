use serde::{Deserialize, Serialize};

/// A rule descriptor curated externally (e.g. via an admin tool); the engine
/// is a read-only consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GlobalRule {
    pub id: i64,
    pub enabled: bool,
    pub priority: i32,
    /// Raw `rdesc::Rule` JSON, validated lazily by the rule factory.
    pub desc: serde_json::Value,
}
