//! In-process fake of the simulation service for tests and offline runs.
//! It makes no network calls; job progress, estimates and downloads are
//! scripted by the caller.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use crate::error::{Result, WorkflowError};
use crate::model::{
    generate_id, CheckResult, DownloadInfo, EntityFilter, Estimation, Geometry, GeometryImport,
    GeometryImportRequest, GeometryPrimitive, Id, JobStatus, MeshOperation, MeshOperationRequest,
    NewProject, NewSimulationRun, Project, RawEntity, Report, ReportRequest, ResultArtifact,
    Simulation, SimulationRun, SimulationSpec, StorageSlot,
};
use crate::remote::traits::{
    GeometryApi, MeshApi, ProjectApi, ReportApi, RunApi, SimulationApi, StorageApi,
};

/// Scripted answer of an estimation endpoint of the fake service.
#[derive(Debug, Clone)]
pub enum EstimateResponse {
    Estimate(Estimation),
    /// HTTP 422, the estimate is not available for this setup.
    Unprocessable,
}

/// Placeholder PNG bytes the fake service serves for finished reports.
pub const REPORT_IMAGE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Status sequence replayed by successive polls; the last entry repeats.
#[derive(Debug, Clone)]
struct StatusScript(VecDeque<JobStatus>);

impl StatusScript {
    fn new(statuses: Vec<JobStatus>) -> Self {
        Self(statuses.into())
    }

    fn next(&mut self) -> JobStatus {
        if self.0.len() > 1 {
            self.0.pop_front().unwrap_or(JobStatus::Finished)
        } else {
            self.0.front().copied().unwrap_or(JobStatus::Finished)
        }
    }
}

#[derive(Debug)]
struct ImportJob {
    project_id: Id,
    name: String,
    geometry_id: Id,
    script: StatusScript,
    published: bool,
}

#[derive(Debug)]
struct MeshJob {
    operation: MeshOperation,
    script: StatusScript,
    started: bool,
}

#[derive(Debug)]
struct RunJob {
    simulation_id: Id,
    run: SimulationRun,
    script: StatusScript,
    started: bool,
}

#[derive(Debug)]
struct ReportJob {
    report: Report,
    script: StatusScript,
    started: bool,
}

#[derive(Debug)]
struct State {
    projects: Vec<Project>,
    geometries: HashMap<Id, Vec<Geometry>>,
    simulations: HashMap<Id, Vec<Simulation>>,
    simulation_specs: HashMap<Id, serde_json::Value>,
    mappings: HashMap<(Id, String), Vec<RawEntity>>,
    uploads: HashMap<String, Vec<u8>>,
    downloads: HashMap<String, Vec<u8>>,
    primitives: Vec<(Id, GeometryPrimitive)>,
    imports: HashMap<Id, ImportJob>,
    meshes: HashMap<Id, MeshJob>,
    runs: HashMap<Id, RunJob>,
    reports: HashMap<Id, ReportJob>,
    results: HashMap<Id, Vec<ResultArtifact>>,
    import_script: Vec<JobStatus>,
    mesh_script: Vec<JobStatus>,
    run_script: Vec<JobStatus>,
    report_script: Vec<JobStatus>,
    mesh_estimate: EstimateResponse,
    simulation_estimate: EstimateResponse,
    mesh_check: CheckResult,
    simulation_check: CheckResult,
    calls: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            geometries: HashMap::new(),
            simulations: HashMap::new(),
            simulation_specs: HashMap::new(),
            mappings: HashMap::new(),
            uploads: HashMap::new(),
            downloads: HashMap::new(),
            primitives: Vec::new(),
            imports: HashMap::new(),
            meshes: HashMap::new(),
            runs: HashMap::new(),
            reports: HashMap::new(),
            results: HashMap::new(),
            import_script: vec![JobStatus::Finished],
            mesh_script: vec![JobStatus::Finished],
            run_script: vec![JobStatus::Finished],
            report_script: vec![JobStatus::Finished],
            mesh_estimate: EstimateResponse::Estimate(Estimation::default()),
            simulation_estimate: EstimateResponse::Estimate(Estimation::default()),
            mesh_check: CheckResult::default(),
            simulation_check: CheckResult::default(),
            calls: Vec::new(),
        }
    }
}

/// Fake remote service with scripted job progress and a call journal.
/// Use `HttpRemote` to talk to the real service.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

fn not_found(what: &str, id: &str) -> WorkflowError {
    WorkflowError::Remote {
        status: 404,
        method: "GET".to_string(),
        path: format!("{}/{}", what, id),
        body: format!("{} {} does not exist", what, id),
    }
}

fn unprocessable(path: String) -> WorkflowError {
    WorkflowError::Remote {
        status: 422,
        method: "GET".to_string(),
        path,
        body: "estimation unavailable".to_string(),
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, state: &mut State, call: String) {
        log::debug!("memory remote: {}", call);
        state.calls.push(call);
    }

    // ------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------

    pub fn add_project(&self, name: &str) -> Id {
        let project_id = generate_id();
        self.state.lock().projects.push(Project {
            project_id: project_id.clone(),
            name: name.to_string(),
            description: None,
            measurement_system: Some("SI".to_string()),
        });
        project_id
    }

    pub fn add_geometry(&self, project_id: &Id, name: &str) -> Id {
        let geometry_id = generate_id();
        self.state
            .lock()
            .geometries
            .entry(project_id.clone())
            .or_default()
            .push(Geometry {
                geometry_id: geometry_id.clone(),
                name: name.to_string(),
            });
        geometry_id
    }

    pub fn add_simulation(&self, project_id: &Id, name: &str) -> Id {
        let simulation_id = generate_id();
        let mut state = self.state.lock();
        state
            .simulations
            .entry(project_id.clone())
            .or_default()
            .push(Simulation {
                simulation_id: simulation_id.clone(),
                name: name.to_string(),
            });
        state
            .simulation_specs
            .insert(simulation_id.clone(), serde_json::json!({ "name": name }));
        simulation_id
    }

    pub fn add_run(&self, simulation_id: &Id, name: &str, status: JobStatus) -> Id {
        let run_id = generate_id();
        self.state.lock().runs.insert(
            run_id.clone(),
            RunJob {
                simulation_id: simulation_id.clone(),
                run: SimulationRun {
                    run_id: run_id.clone(),
                    name: name.to_string(),
                    status,
                    progress: None,
                    failure_reason: None,
                },
                script: StatusScript::new(vec![status]),
                started: true,
            },
        );
        run_id
    }

    /// Entities returned for `filter` on `geometry_id`
    pub fn set_mappings(&self, geometry_id: &Id, filter: &EntityFilter, entities: Vec<RawEntity>) {
        self.state
            .lock()
            .mappings
            .insert((geometry_id.clone(), filter.to_string()), entities);
    }

    pub fn script_import(&self, statuses: Vec<JobStatus>) {
        self.state.lock().import_script = statuses;
    }

    pub fn script_mesh(&self, statuses: Vec<JobStatus>) {
        self.state.lock().mesh_script = statuses;
    }

    pub fn script_run(&self, statuses: Vec<JobStatus>) {
        self.state.lock().run_script = statuses;
    }

    pub fn script_report(&self, statuses: Vec<JobStatus>) {
        self.state.lock().report_script = statuses;
    }

    pub fn set_mesh_estimate(&self, response: EstimateResponse) {
        self.state.lock().mesh_estimate = response;
    }

    pub fn set_simulation_estimate(&self, response: EstimateResponse) {
        self.state.lock().simulation_estimate = response;
    }

    pub fn set_mesh_check(&self, check: CheckResult) {
        self.state.lock().mesh_check = check;
    }

    pub fn set_simulation_check(&self, check: CheckResult) {
        self.state.lock().simulation_check = check;
    }

    pub fn set_results(&self, run_id: &Id, artifacts: Vec<ResultArtifact>) {
        self.state.lock().results.insert(run_id.clone(), artifacts);
    }

    pub fn set_download(&self, url: &str, bytes: Vec<u8>) {
        self.state.lock().downloads.insert(url.to_string(), bytes);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of journal entries starting with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn simulation_spec(&self, simulation_id: &Id) -> Option<serde_json::Value> {
        self.state.lock().simulation_specs.get(simulation_id).cloned()
    }

    pub fn uploaded(&self, url: &str) -> Option<Vec<u8>> {
        self.state.lock().uploads.get(url).cloned()
    }

    pub fn primitives(&self) -> Vec<(Id, GeometryPrimitive)> {
        self.state.lock().primitives.clone()
    }
}

#[async_trait::async_trait]
impl ProjectApi for MemoryRemote {
    async fn list_projects(&self, limit: usize) -> Result<Vec<Project>> {
        let mut state = self.state.lock();
        self.record(&mut state, "list_projects".to_string());
        Ok(state.projects.iter().take(limit).cloned().collect())
    }

    async fn create_project(&self, project: NewProject) -> Result<Project> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("create_project {}", project.name));
        let created = Project {
            project_id: generate_id(),
            name: project.name,
            description: Some(project.description),
            measurement_system: Some(project.measurement_system),
        };
        state.projects.push(created.clone());
        Ok(created)
    }
}

#[async_trait::async_trait]
impl GeometryApi for MemoryRemote {
    async fn list_geometries(&self, project_id: &Id, limit: usize) -> Result<Vec<Geometry>> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("list_geometries {}", project_id));
        Ok(state
            .geometries
            .get(project_id)
            .map(|g| g.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn import_geometry(
        &self,
        project_id: &Id,
        request: GeometryImportRequest,
    ) -> Result<GeometryImport> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("import_geometry {}", request.name));
        if !state.uploads.keys().any(|url| url.ends_with(&request.location.storage_id)) {
            return Err(not_found("storage", &request.location.storage_id));
        }
        let import_id = generate_id();
        let script = StatusScript::new(state.import_script.clone());
        state.imports.insert(
            import_id.clone(),
            ImportJob {
                project_id: project_id.clone(),
                name: request.name,
                geometry_id: generate_id(),
                script,
                published: false,
            },
        );
        Ok(GeometryImport {
            geometry_import_id: import_id,
            status: JobStatus::Queued,
            geometry_id: None,
            failure_reason: None,
        })
    }

    async fn get_geometry_import(&self, _project_id: &Id, import_id: &Id) -> Result<GeometryImport> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("get_geometry_import {}", import_id));
        let job = state
            .imports
            .get_mut(import_id)
            .ok_or_else(|| not_found("geometryimports", import_id))?;
        let status = job.script.next();
        let mut import = GeometryImport {
            geometry_import_id: import_id.clone(),
            status,
            geometry_id: None,
            failure_reason: None,
        };
        let mut publish = None;
        match status {
            JobStatus::Finished => {
                import.geometry_id = Some(job.geometry_id.clone());
                if !job.published {
                    job.published = true;
                    publish = Some((
                        job.project_id.clone(),
                        Geometry {
                            geometry_id: job.geometry_id.clone(),
                            name: job.name.clone(),
                        },
                    ));
                }
            }
            JobStatus::Failed => import.failure_reason = Some("import failed".to_string()),
            _ => {}
        }
        if let Some((project_id, geometry)) = publish {
            state.geometries.entry(project_id).or_default().push(geometry);
        }
        Ok(import)
    }

    async fn get_geometry_mappings(
        &self,
        _project_id: &Id,
        geometry_id: &Id,
        filter: &EntityFilter,
        limit: usize,
    ) -> Result<Vec<RawEntity>> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("get_geometry_mappings {} {}", geometry_id, filter));
        Ok(state
            .mappings
            .get(&(geometry_id.clone(), filter.to_string()))
            .map(|e| e.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl StorageApi for MemoryRemote {
    async fn create_storage_slot(&self) -> Result<StorageSlot> {
        let mut state = self.state.lock();
        self.record(&mut state, "create_storage_slot".to_string());
        let storage_id = generate_id();
        Ok(StorageSlot {
            url: format!("memory://storage/{}", storage_id),
            storage_id,
        })
    }

    async fn put_bytes(&self, url: &str, bytes: Vec<u8>) -> Result<()> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("put_bytes {} ({} bytes)", url, bytes.len()));
        state.uploads.insert(url.to_string(), bytes);
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("download {}", url));
        state
            .downloads
            .get(url)
            .cloned()
            .ok_or_else(|| not_found("download", url))
    }
}

#[async_trait::async_trait]
impl MeshApi for MemoryRemote {
    async fn create_mesh_operation(
        &self,
        _project_id: &Id,
        request: MeshOperationRequest,
    ) -> Result<MeshOperation> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("create_mesh_operation {}", request.name));
        let operation = MeshOperation {
            mesh_operation_id: generate_id(),
            name: request.name,
            status: JobStatus::Ready,
            progress: None,
            mesh_id: None,
            failure_reason: None,
        };
        let script = StatusScript::new(state.mesh_script.clone());
        state.meshes.insert(
            operation.mesh_operation_id.clone(),
            MeshJob {
                operation: operation.clone(),
                script,
                started: false,
            },
        );
        Ok(operation)
    }

    async fn estimate_mesh_operation(&self, project_id: &Id, mesh_operation_id: &Id) -> Result<Estimation> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("estimate_mesh_operation {}", mesh_operation_id));
        match &state.mesh_estimate {
            EstimateResponse::Estimate(estimate) => Ok(estimate.clone()),
            EstimateResponse::Unprocessable => Err(unprocessable(format!(
                "/projects/{}/meshoperations/{}/estimate",
                project_id, mesh_operation_id
            ))),
        }
    }

    async fn check_mesh_operation_setup(
        &self,
        _project_id: &Id,
        mesh_operation_id: &Id,
        simulation_id: &Id,
    ) -> Result<CheckResult> {
        let mut state = self.state.lock();
        self.record(
            &mut state,
            format!("check_mesh_operation_setup {} {}", mesh_operation_id, simulation_id),
        );
        Ok(state.mesh_check.clone())
    }

    async fn start_mesh_operation(
        &self,
        _project_id: &Id,
        mesh_operation_id: &Id,
        _simulation_id: Option<&Id>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("start_mesh_operation {}", mesh_operation_id));
        let job = state
            .meshes
            .get_mut(mesh_operation_id)
            .ok_or_else(|| not_found("meshoperations", mesh_operation_id))?;
        job.started = true;
        Ok(())
    }

    async fn get_mesh_operation(&self, _project_id: &Id, mesh_operation_id: &Id) -> Result<MeshOperation> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("get_mesh_operation {}", mesh_operation_id));
        let job = state
            .meshes
            .get_mut(mesh_operation_id)
            .ok_or_else(|| not_found("meshoperations", mesh_operation_id))?;
        if job.started {
            job.operation.status = job.script.next();
            match job.operation.status {
                JobStatus::Finished if job.operation.mesh_id.is_none() => {
                    job.operation.mesh_id = Some(generate_id());
                    job.operation.progress = Some(1.0);
                }
                JobStatus::Failed => {
                    job.operation.failure_reason = Some("meshing failed".to_string())
                }
                _ => {}
            }
        }
        Ok(job.operation.clone())
    }
}

#[async_trait::async_trait]
impl SimulationApi for MemoryRemote {
    async fn list_simulations(&self, project_id: &Id, limit: usize) -> Result<Vec<Simulation>> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("list_simulations {}", project_id));
        Ok(state
            .simulations
            .get(project_id)
            .map(|s| s.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn create_simulation(&self, project_id: &Id, spec: &SimulationSpec) -> Result<Simulation> {
        let value = serde_json::to_value(spec)?;
        let mut state = self.state.lock();
        self.record(&mut state, format!("create_simulation {}", spec.name));
        let simulation = Simulation {
            simulation_id: generate_id(),
            name: spec.name.clone(),
        };
        state
            .simulations
            .entry(project_id.clone())
            .or_default()
            .push(simulation.clone());
        state
            .simulation_specs
            .insert(simulation.simulation_id.clone(), value);
        Ok(simulation)
    }

    async fn get_simulation_spec(&self, _project_id: &Id, simulation_id: &Id) -> Result<serde_json::Value> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("get_simulation_spec {}", simulation_id));
        state
            .simulation_specs
            .get(simulation_id)
            .cloned()
            .ok_or_else(|| not_found("simulations", simulation_id))
    }

    async fn update_simulation_spec(
        &self,
        _project_id: &Id,
        simulation_id: &Id,
        spec: &serde_json::Value,
    ) -> Result<()> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("update_simulation_spec {}", simulation_id));
        if !state.simulation_specs.contains_key(simulation_id) {
            return Err(not_found("simulations", simulation_id));
        }
        state
            .simulation_specs
            .insert(simulation_id.clone(), spec.clone());
        Ok(())
    }

    async fn estimate_simulation_setup(&self, project_id: &Id, simulation_id: &Id) -> Result<Estimation> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("estimate_simulation_setup {}", simulation_id));
        match &state.simulation_estimate {
            EstimateResponse::Estimate(estimate) => Ok(estimate.clone()),
            EstimateResponse::Unprocessable => Err(unprocessable(format!(
                "/projects/{}/simulations/{}/estimate",
                project_id, simulation_id
            ))),
        }
    }

    async fn check_simulation_setup(&self, _project_id: &Id, simulation_id: &Id) -> Result<CheckResult> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("check_simulation_setup {}", simulation_id));
        Ok(state.simulation_check.clone())
    }

    async fn create_geometry_primitive(
        &self,
        _project_id: &Id,
        primitive: &GeometryPrimitive,
    ) -> Result<Id> {
        let mut state = self.state.lock();
        self.record(&mut state, "create_geometry_primitive".to_string());
        let primitive_id = generate_id();
        state.primitives.push((primitive_id.clone(), primitive.clone()));
        Ok(primitive_id)
    }
}

#[async_trait::async_trait]
impl RunApi for MemoryRemote {
    async fn list_simulation_runs(
        &self,
        _project_id: &Id,
        simulation_id: &Id,
        limit: usize,
    ) -> Result<Vec<SimulationRun>> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("list_simulation_runs {}", simulation_id));
        let mut runs: Vec<SimulationRun> = state
            .runs
            .values()
            .filter(|job| &job.simulation_id == simulation_id)
            .map(|job| job.run.clone())
            .collect();
        runs.sort_by(|a, b| a.name.cmp(&b.name));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn create_simulation_run(
        &self,
        _project_id: &Id,
        simulation_id: &Id,
        run: NewSimulationRun,
    ) -> Result<SimulationRun> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("create_simulation_run {}", run.name));
        let created = SimulationRun {
            run_id: generate_id(),
            name: run.name,
            status: JobStatus::Ready,
            progress: None,
            failure_reason: None,
        };
        let script = StatusScript::new(state.run_script.clone());
        state.runs.insert(
            created.run_id.clone(),
            RunJob {
                simulation_id: simulation_id.clone(),
                run: created.clone(),
                script,
                started: false,
            },
        );
        Ok(created)
    }

    async fn start_simulation_run(&self, _project_id: &Id, _simulation_id: &Id, run_id: &Id) -> Result<()> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("start_simulation_run {}", run_id));
        let job = state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| not_found("runs", run_id))?;
        job.started = true;
        Ok(())
    }

    async fn get_simulation_run(
        &self,
        _project_id: &Id,
        _simulation_id: &Id,
        run_id: &Id,
    ) -> Result<SimulationRun> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("get_simulation_run {}", run_id));
        let job = state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| not_found("runs", run_id))?;
        if job.started {
            job.run.status = job.script.next();
            match job.run.status {
                JobStatus::Finished => job.run.progress = Some(1.0),
                JobStatus::Failed => job.run.failure_reason = Some("solver diverged".to_string()),
                _ => {}
            }
        }
        Ok(job.run.clone())
    }

    async fn get_simulation_run_results(
        &self,
        _project_id: &Id,
        _simulation_id: &Id,
        run_id: &Id,
        limit: usize,
    ) -> Result<Vec<ResultArtifact>> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("get_simulation_run_results {}", run_id));
        Ok(state
            .results
            .get(run_id)
            .map(|r| r.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ReportApi for MemoryRemote {
    async fn create_report(&self, _project_id: &Id, request: ReportRequest) -> Result<Report> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("create_report {}", request.name));
        let report = Report {
            report_id: generate_id(),
            status: JobStatus::Ready,
            download: None,
            failure_reason: None,
        };
        let script = StatusScript::new(state.report_script.clone());
        state.reports.insert(
            report.report_id.clone(),
            ReportJob {
                report: report.clone(),
                script,
                started: false,
            },
        );
        Ok(report)
    }

    async fn start_report_job(&self, _project_id: &Id, report_id: &Id) -> Result<()> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("start_report_job {}", report_id));
        let job = state
            .reports
            .get_mut(report_id)
            .ok_or_else(|| not_found("reports", report_id))?;
        job.started = true;
        Ok(())
    }

    async fn get_report(&self, _project_id: &Id, report_id: &Id) -> Result<Report> {
        let mut guard = self.state.lock();
        self.record(&mut guard, format!("get_report {}", report_id));
        let state = &mut *guard;
        let job = state
            .reports
            .get_mut(report_id)
            .ok_or_else(|| not_found("reports", report_id))?;
        if job.started {
            job.report.status = job.script.next();
            if job.report.status == JobStatus::Finished {
                let url = format!("memory://reports/{}", report_id);
                state
                    .downloads
                    .entry(url.clone())
                    .or_insert_with(|| REPORT_IMAGE.to_vec());
                job.report.download = Some(DownloadInfo {
                    url,
                    format: Some("PNG".to_string()),
                });
            }
        }
        Ok(job.report.clone())
    }
}
