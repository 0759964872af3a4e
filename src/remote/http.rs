use log::{debug, warn};
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{AppConfig, Credentials, RetryConfig};
use crate::error::{Result, WorkflowError};
use crate::model::{
    CheckResult, EntityFilter, Estimation, Geometry, GeometryImport, GeometryImportRequest,
    GeometryPrimitive, Id, MeshOperation, MeshOperationRequest, NewProject, NewSimulationRun, Page,
    Project, RawEntity, Report, ReportRequest, ResultArtifact, Simulation, SimulationRun,
    SimulationSpec, StorageSlot,
};
use crate::remote::traits::{
    GeometryApi, MeshApi, ProjectApi, ReportApi, RunApi, SimulationApi, StorageApi,
};

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    credentials: Credentials,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSimulation {
    simulation_id: Id,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPrimitive {
    geometry_primitive_id: Id,
}

impl HttpRemote {
    /// Create a client for the service described by `config`
    pub fn new(config: &AppConfig) -> Result<Self> {
        let credentials = config.credentials()?;
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            credentials,
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.credentials.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.credentials.base_url, path)
    }

    fn api_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(self.credentials.key_header.as_str(), &self.credentials.api_key)
    }

    /// Delay before retry `attempt`. Saturates instead of overflowing; a
    /// negative or NaN factor means no delay.
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.retry.backoff_factor * 2f64.powi(exponent);
        if secs > 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    /// Send a request, retrying connection failures and gateway errors
    async fn send(&self, label: &str, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;

        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if is_retryable_status(status) && attempt < attempts {
                        warn!("{} returned {}, retrying ({}/{})", label, status, attempt, attempts);
                    } else if status.is_success() {
                        return Ok(response);
                    } else {
                        let body = response.text().await.unwrap_or_default();
                        let (method, path) = label.split_once(' ').unwrap_or((label, ""));
                        return Err(WorkflowError::Remote {
                            status: status.as_u16(),
                            method: method.to_string(),
                            path: path.to_string(),
                            body,
                        });
                    }
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < attempts => {
                    warn!("{} failed: {}, retrying ({}/{})", label, e, attempt, attempts);
                }
                Err(e) => return Err(WorkflowError::Transport(e)),
            }

            tokio::time::sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(String, String)]) -> Result<T> {
        let label = format!("GET {}", path);
        debug!("{}", label);
        let response = self
            .send(&label, || self.api_request(Method::GET, path).query(query))
            .await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&B>,
    ) -> Result<Response> {
        let label = format!("{} {}", method, path);
        debug!("{}", label);
        let body = body.map(serde_json::to_value).transpose()?;
        self.send(&label, || {
            let request = self.api_request(method.clone(), path).query(query);
            match &body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send_json(Method::POST, path, &[], Some(body)).await?;
        Ok(response.json::<T>().await?)
    }

    async fn post_empty(&self, path: &str, query: &[(String, String)]) -> Result<()> {
        self.send_json::<serde_json::Value>(Method::POST, path, query, None)
            .await?;
        Ok(())
    }

    async fn list<T: DeserializeOwned>(&self, path: &str, limit: usize) -> Result<Vec<T>> {
        let page: Page<T> = self.get_json(path, &paging(limit)).await?;
        Ok(page.embedded)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

fn paging(limit: usize) -> Vec<(String, String)> {
    vec![
        ("limit".to_string(), limit.to_string()),
        ("page".to_string(), "1".to_string()),
    ]
}

#[async_trait::async_trait]
impl ProjectApi for HttpRemote {
    async fn list_projects(&self, limit: usize) -> Result<Vec<Project>> {
        self.list("/projects", limit).await
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        self.post_json("/projects", &project).await
    }
}

#[async_trait::async_trait]
impl GeometryApi for HttpRemote {
    async fn list_geometries(&self, project_id: &Id, limit: usize) -> Result<Vec<Geometry>> {
        self.list(&format!("/projects/{}/geometries", project_id), limit)
            .await
    }

    async fn import_geometry(
        &self,
        project_id: &Id,
        request: GeometryImportRequest,
    ) -> Result<GeometryImport> {
        self.post_json(&format!("/projects/{}/geometryimports", project_id), &request)
            .await
    }

    async fn get_geometry_import(&self, project_id: &Id, import_id: &Id) -> Result<GeometryImport> {
        self.get_json(
            &format!("/projects/{}/geometryimports/{}", project_id, import_id),
            &[],
        )
        .await
    }

    async fn get_geometry_mappings(
        &self,
        project_id: &Id,
        geometry_id: &Id,
        filter: &EntityFilter,
        limit: usize,
    ) -> Result<Vec<RawEntity>> {
        let mut query = filter.query_pairs();
        query.extend(paging(limit));
        let page: Page<RawEntity> = self
            .get_json(
                &format!("/projects/{}/geometries/{}/mappings", project_id, geometry_id),
                &query,
            )
            .await?;
        Ok(page.embedded)
    }
}

#[async_trait::async_trait]
impl StorageApi for HttpRemote {
    async fn create_storage_slot(&self) -> Result<StorageSlot> {
        self.post_json("/storage", &serde_json::json!({})).await
    }

    async fn put_bytes(&self, url: &str, bytes: Vec<u8>) -> Result<()> {
        let label = "PUT storage".to_string();
        self.send(&label, || {
            self.client
                .put(url)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone())
        })
        .await?;
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let label = format!("GET {}", url);
        let response = self
            .send(&label, || {
                self.client
                    .get(url)
                    .header(self.credentials.key_header.as_str(), &self.credentials.api_key)
            })
            .await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait::async_trait]
impl MeshApi for HttpRemote {
    async fn create_mesh_operation(
        &self,
        project_id: &Id,
        request: MeshOperationRequest,
    ) -> Result<MeshOperation> {
        self.post_json(&format!("/projects/{}/meshoperations", project_id), &request)
            .await
    }

    async fn estimate_mesh_operation(&self, project_id: &Id, mesh_operation_id: &Id) -> Result<Estimation> {
        self.get_json(
            &format!(
                "/projects/{}/meshoperations/{}/estimate",
                project_id, mesh_operation_id
            ),
            &[],
        )
        .await
    }

    async fn check_mesh_operation_setup(
        &self,
        project_id: &Id,
        mesh_operation_id: &Id,
        simulation_id: &Id,
    ) -> Result<CheckResult> {
        self.get_json(
            &format!(
                "/projects/{}/meshoperations/{}/check",
                project_id, mesh_operation_id
            ),
            &[("simulationId".to_string(), simulation_id.clone())],
        )
        .await
    }

    async fn start_mesh_operation(
        &self,
        project_id: &Id,
        mesh_operation_id: &Id,
        simulation_id: Option<&Id>,
    ) -> Result<()> {
        let query: Vec<(String, String)> = simulation_id
            .map(|id| vec![("simulationId".to_string(), id.clone())])
            .unwrap_or_default();
        self.post_empty(
            &format!(
                "/projects/{}/meshoperations/{}/start",
                project_id, mesh_operation_id
            ),
            &query,
        )
        .await
    }

    async fn get_mesh_operation(&self, project_id: &Id, mesh_operation_id: &Id) -> Result<MeshOperation> {
        self.get_json(
            &format!("/projects/{}/meshoperations/{}", project_id, mesh_operation_id),
            &[],
        )
        .await
    }
}

#[async_trait::async_trait]
impl SimulationApi for HttpRemote {
    async fn list_simulations(&self, project_id: &Id, limit: usize) -> Result<Vec<Simulation>> {
        self.list(&format!("/projects/{}/simulations", project_id), limit)
            .await
    }

    async fn create_simulation(&self, project_id: &Id, spec: &SimulationSpec) -> Result<Simulation> {
        let created: CreatedSimulation = self
            .post_json(&format!("/projects/{}/simulations", project_id), spec)
            .await?;
        Ok(Simulation {
            simulation_id: created.simulation_id,
            name: spec.name.clone(),
        })
    }

    async fn get_simulation_spec(&self, project_id: &Id, simulation_id: &Id) -> Result<serde_json::Value> {
        self.get_json(
            &format!("/projects/{}/simulations/{}", project_id, simulation_id),
            &[],
        )
        .await
    }

    async fn update_simulation_spec(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        spec: &serde_json::Value,
    ) -> Result<()> {
        self.send_json(
            Method::PUT,
            &format!("/projects/{}/simulations/{}", project_id, simulation_id),
            &[],
            Some(spec),
        )
        .await?;
        Ok(())
    }

    async fn estimate_simulation_setup(&self, project_id: &Id, simulation_id: &Id) -> Result<Estimation> {
        self.get_json(
            &format!("/projects/{}/simulations/{}/estimate", project_id, simulation_id),
            &[],
        )
        .await
    }

    async fn check_simulation_setup(&self, project_id: &Id, simulation_id: &Id) -> Result<CheckResult> {
        self.get_json(
            &format!("/projects/{}/simulations/{}/check", project_id, simulation_id),
            &[],
        )
        .await
    }

    async fn create_geometry_primitive(
        &self,
        project_id: &Id,
        primitive: &GeometryPrimitive,
    ) -> Result<Id> {
        let created: CreatedPrimitive = self
            .post_json(&format!("/projects/{}/geometryprimitives", project_id), primitive)
            .await?;
        Ok(created.geometry_primitive_id)
    }
}

#[async_trait::async_trait]
impl RunApi for HttpRemote {
    async fn list_simulation_runs(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        limit: usize,
    ) -> Result<Vec<SimulationRun>> {
        self.list(
            &format!("/projects/{}/simulations/{}/runs", project_id, simulation_id),
            limit,
        )
        .await
    }

    async fn create_simulation_run(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        run: NewSimulationRun,
    ) -> Result<SimulationRun> {
        self.post_json(
            &format!("/projects/{}/simulations/{}/runs", project_id, simulation_id),
            &run,
        )
        .await
    }

    async fn start_simulation_run(&self, project_id: &Id, simulation_id: &Id, run_id: &Id) -> Result<()> {
        self.post_empty(
            &format!(
                "/projects/{}/simulations/{}/runs/{}/start",
                project_id, simulation_id, run_id
            ),
            &[],
        )
        .await
    }

    async fn get_simulation_run(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        run_id: &Id,
    ) -> Result<SimulationRun> {
        self.get_json(
            &format!(
                "/projects/{}/simulations/{}/runs/{}",
                project_id, simulation_id, run_id
            ),
            &[],
        )
        .await
    }

    async fn get_simulation_run_results(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        run_id: &Id,
        limit: usize,
    ) -> Result<Vec<ResultArtifact>> {
        self.list(
            &format!(
                "/projects/{}/simulations/{}/runs/{}/results",
                project_id, simulation_id, run_id
            ),
            limit,
        )
        .await
    }
}

#[async_trait::async_trait]
impl ReportApi for HttpRemote {
    async fn create_report(&self, project_id: &Id, request: ReportRequest) -> Result<Report> {
        self.post_json(&format!("/projects/{}/reports", project_id), &request)
            .await
    }

    async fn start_report_job(&self, project_id: &Id, report_id: &Id) -> Result<()> {
        self.post_empty(
            &format!("/projects/{}/reports/{}/start", project_id, report_id),
            &[],
        )
        .await
    }

    async fn get_report(&self, project_id: &Id, report_id: &Id) -> Result<Report> {
        self.get_json(&format!("/projects/{}/reports/{}", project_id, report_id), &[])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote_with_backoff(factor: f64) -> HttpRemote {
        let mut config = AppConfig::default();
        config.api.key = Some("key".to_string());
        config.api.url = Some("https://api.example.invalid".to_string());
        config.retry.backoff_factor = factor;
        HttpRemote::new(&config).unwrap()
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let remote = remote_with_backoff(0.2);
        assert_eq!(remote.backoff(1), Duration::from_secs_f64(0.2));
        assert_eq!(remote.backoff(2), Duration::from_secs_f64(0.4));
        assert_eq!(remote.backoff(3), Duration::from_secs_f64(0.8));
    }

    #[test]
    fn test_backoff_saturates_on_extreme_settings() {
        assert_eq!(remote_with_backoff(0.2).backoff(2000), Duration::MAX);
        assert_eq!(remote_with_backoff(0.2).backoff(u32::MAX), Duration::MAX);
        assert_eq!(remote_with_backoff(f64::INFINITY).backoff(1), Duration::MAX);
        assert_eq!(remote_with_backoff(1e300).backoff(1), Duration::MAX);
        assert_eq!(remote_with_backoff(f64::NAN).backoff(3), Duration::ZERO);
        assert_eq!(remote_with_backoff(-1.0).backoff(3), Duration::ZERO);
        assert_eq!(remote_with_backoff(0.0).backoff(3), Duration::ZERO);
    }

    #[test]
    fn test_only_gateway_errors_are_retried() {
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_urls_carry_api_version() {
        let remote = remote_with_backoff(0.2);
        assert_eq!(remote.base_url(), "https://api.example.invalid/v0");
        assert_eq!(
            remote.url("/projects"),
            "https://api.example.invalid/v0/projects"
        );
    }
}
