use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single Postgres-as-a-service project created in a region.
///
/// Created by the `create_project` rule, soft-deleted by `delete_project`,
/// mutated only by `change_mode` and deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,

    pub region_id: i64,
    pub name: String,

    /// Provider-assigned external id.
    pub provider_project_id: String,

    /// Full connection string to the main branch, password included.
    pub connection_string: String,

    /// Name of the exit node that created this project.
    pub created_by_exitnode: String,

    pub pg_version: i32,
    pub provisioner: String,
    pub suspend_timeout_seconds: i32,
    pub current_mode: String,
}

const DEFAULT_SUSPEND_TIMEOUT_SECS: u64 = 5 * 60;

impl Project {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Effective suspend timeout: the provider's own default (5 minutes)
    /// applies when the project was created with the server default (0).
    pub fn suspend_timeout(&self) -> Duration {
        if self.suspend_timeout_seconds <= 0 {
            Duration::from_secs(DEFAULT_SUSPEND_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.suspend_timeout_seconds as u64)
        }
    }
}

/// Fields of `Project` that the `delete_project` matrix may project on, in
/// the order the default matrix uses them.
pub const DEFAULT_MATRIX: &[&str] = &[
    "region_id",
    "pg_version",
    "provisioner",
    "suspend_timeout_seconds",
];

/// Serializes a project's matrix-eligible fields to a `field -> value` map,
/// restricted to a caller-supplied subset of field names.
pub fn matrix_fields(project: &Project, fields: &[&str]) -> Vec<(String, serde_json::Value)> {
    let as_json = serde_json::to_value(project).expect("Project always serializes");
    let obj = as_json.as_object().expect("Project serializes to an object");

    fields
        .iter()
        .filter_map(|f| obj.get(*f).map(|v| (f.to_string(), v.clone())))
        .collect()
}
