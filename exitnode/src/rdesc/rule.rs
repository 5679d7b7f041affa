use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which rule implementation a descriptor instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Act {
    CreateProject,
    DeleteProject,
    DoGlobalRules,
    QueryProject,
    ChangeMode,
    Test,
}

/// On-disk/JSON description of a rule. Deserialized from the CLI argument
/// or a `GlobalRule.desc` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub act: Act,

    /// `"random(min,max)"`, or empty to run once.
    #[serde(default)]
    pub periodic: String,

    /// Raw args blob, validated by the matching rule constructor.
    #[serde(default = "default_args")]
    pub args: serde_json::Value,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(default, with = "humantime_serde")]
    pub min_interval: Option<Duration>,
}

fn default_args() -> serde_json::Value {
    serde_json::json!({})
}
