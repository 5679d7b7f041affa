use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A database region out of which projects are provisioned.
///
/// Read-mostly: created out of band, never written by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Region {
    pub id: i64,
    pub created_at: DateTime<Utc>,

    /// Name of the provider, e.g. "stage.neon.tech".
    pub provider: String,

    /// Provider's region code, e.g. "aws-eu-west-1".
    pub database_region: String,

    /// Whether this region's provisioner supports the NeonVM provisioner.
    pub supports_neon_vm: bool,
}
