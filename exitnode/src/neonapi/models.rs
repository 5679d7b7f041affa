use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectRequest {
    pub project: CreateProject,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateProject {
    pub name: String,
    pub region_id: String,
    pub pg_version: i32,
    pub provisioner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectResponse {
    pub project: Project,
    #[serde(default)]
    pub connection_uris: Vec<ConnectionUri>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub region_id: String,
    pub pg_version: i32,
    pub provisioner: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionUri {
    pub connection_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub id: String,
    pub project_id: String,
    pub action: String,
    pub status: String,
    #[serde(default)]
    pub endpoint_id: Option<String>,
}

impl Operation {
    pub fn is_finished(&self) -> bool {
        self.status == "finished"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub project_id: String,
    pub host: String,
    pub suspend_timeout_seconds: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateEndpointRequest {
    pub endpoint: UpdateEndpoint,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateEndpoint {
    pub suspend_timeout_seconds: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEndpointResponse {
    pub endpoint: Endpoint,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetOperationsResponse {
    #[serde(default)]
    pub operations: Vec<Operation>,
}
