use reqwest::Method;
use shared::utilities::errors::AppError;

/// A prepared, not-yet-sent provider API call: everything the query-API
/// helper needs to persist a pending `Query` row before dispatching it.
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub body: String,
    /// Short label used as the persisted query's `method` field, e.g.
    /// `"create_project"`.
    pub label: &'static str,
}

/// The outcome of actually sending a `PreparedRequest`: always populated on
/// a completed HTTP exchange, even for non-2xx responses — only transport
/// failures (DNS, TLS, timeout) surface as `AppError::Request`.
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn into_result(self) -> Result<String, AppError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(AppError::ProviderStatus {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// Thin wrapper over the provider's control-plane HTTP API. Does not persist
/// anything itself — that is the query-API helper's job — so every rule
/// that calls it goes through the same pending-row-then-update pattern.
#[derive(Clone)]
pub struct NeonClient {
    http: reqwest::Client,
    base_url: String,
    bearer: String,
}

impl NeonClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        NeonClient {
            http: reqwest::Client::new(),
            base_url,
            bearer: format!("Bearer {api_key}"),
        }
    }

    pub fn prepare_create_project(
        &self,
        name: &str,
        region_id: &str,
        pg_version: i32,
        provisioner: &str,
    ) -> Result<PreparedRequest, AppError> {
        let body = serde_json::to_string(&super::models::CreateProjectRequest {
            project: super::models::CreateProject {
                name: name.to_string(),
                region_id: region_id.to_string(),
                pg_version,
                provisioner: provisioner.to_string(),
            },
        })?;

        Ok(PreparedRequest {
            method: Method::POST,
            url: format!("{}/projects", self.base_url),
            body,
            label: "create_project",
        })
    }

    pub fn prepare_delete_project(&self, project_id: &str) -> PreparedRequest {
        PreparedRequest {
            method: Method::DELETE,
            url: format!("{}/projects/{}", self.base_url, project_id),
            body: String::new(),
            label: "delete_project",
        }
    }

    pub fn prepare_update_endpoint(
        &self,
        project_id: &str,
        endpoint_id: &str,
        suspend_timeout_seconds: i32,
    ) -> Result<PreparedRequest, AppError> {
        let body = serde_json::to_string(&super::models::UpdateEndpointRequest {
            endpoint: super::models::UpdateEndpoint {
                suspend_timeout_seconds,
            },
        })?;

        Ok(PreparedRequest {
            method: Method::PATCH,
            url: format!(
                "{}/projects/{}/endpoints/{}",
                self.base_url, project_id, endpoint_id
            ),
            body,
            label: "update_endpoint",
        })
    }

    pub fn prepare_get_operations(&self, project_id: &str) -> PreparedRequest {
        PreparedRequest {
            method: Method::GET,
            url: format!("{}/projects/{}/operations", self.base_url, project_id),
            body: String::new(),
            label: "get_operations",
        }
    }

    /// Sends a prepared request and returns the raw outcome, regardless of
    /// HTTP status. Transport-level failures are the only `Err` case.
    #[tracing::instrument(name = "neon_client.send", skip(self, req), fields(method = %req.method, url = %req.url), err)]
    pub async fn send(&self, req: &PreparedRequest) -> Result<RawResponse, AppError> {
        let mut builder = self
            .http
            .request(req.method.clone(), &req.url)
            .header("Authorization", &self.bearer)
            .header("Accept", "application/json");

        if !req.body.is_empty() {
            builder = builder
                .header("Content-Type", "application/json")
                .body(req.body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        Ok(RawResponse { status, body })
    }
}
