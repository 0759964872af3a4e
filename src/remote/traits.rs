use crate::error::Result;
use crate::model::{
    CheckResult, EntityFilter, Estimation, Geometry, GeometryImport, GeometryImportRequest,
    GeometryPrimitive, Id, MeshOperation, MeshOperationRequest, NewProject, NewSimulationRun,
    Project, RawEntity, Report, ReportRequest, ResultArtifact, Simulation, SimulationRun,
    SimulationSpec, StorageSlot,
};

/// Upper bound on a single listing request; listings are fetched in one page.
pub const LISTING_LIMIT: usize = 1000;

#[async_trait::async_trait]
pub trait ProjectApi: Send + Sync {
    async fn list_projects(&self, limit: usize) -> Result<Vec<Project>>;
    async fn create_project(&self, project: NewProject) -> Result<Project>;
}

#[async_trait::async_trait]
pub trait GeometryApi: Send + Sync {
    async fn list_geometries(&self, project_id: &Id, limit: usize) -> Result<Vec<Geometry>>;
    /// Submit an import job for an uploaded storage object
    async fn import_geometry(
        &self,
        project_id: &Id,
        request: GeometryImportRequest,
    ) -> Result<GeometryImport>;
    async fn get_geometry_import(&self, project_id: &Id, import_id: &Id) -> Result<GeometryImport>;
    /// Query named sub-entities of a geometry by attribute filter
    async fn get_geometry_mappings(
        &self,
        project_id: &Id,
        geometry_id: &Id,
        filter: &EntityFilter,
        limit: usize,
    ) -> Result<Vec<RawEntity>>;
}

#[async_trait::async_trait]
pub trait StorageApi: Send + Sync {
    async fn create_storage_slot(&self) -> Result<StorageSlot>;
    /// Raw upload to a pre-signed URL
    async fn put_bytes(&self, url: &str, bytes: Vec<u8>) -> Result<()>;
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

#[async_trait::async_trait]
pub trait MeshApi: Send + Sync {
    async fn create_mesh_operation(
        &self,
        project_id: &Id,
        request: MeshOperationRequest,
    ) -> Result<MeshOperation>;
    async fn estimate_mesh_operation(&self, project_id: &Id, mesh_operation_id: &Id) -> Result<Estimation>;
    /// Pre-flight check of a mesh operation against the simulation it will serve
    async fn check_mesh_operation_setup(
        &self,
        project_id: &Id,
        mesh_operation_id: &Id,
        simulation_id: &Id,
    ) -> Result<CheckResult>;
    async fn start_mesh_operation(
        &self,
        project_id: &Id,
        mesh_operation_id: &Id,
        simulation_id: Option<&Id>,
    ) -> Result<()>;
    async fn get_mesh_operation(&self, project_id: &Id, mesh_operation_id: &Id) -> Result<MeshOperation>;
}

#[async_trait::async_trait]
pub trait SimulationApi: Send + Sync {
    async fn list_simulations(&self, project_id: &Id, limit: usize) -> Result<Vec<Simulation>>;
    async fn create_simulation(&self, project_id: &Id, spec: &SimulationSpec) -> Result<Simulation>;
    /// The stored specification as the service returns it, unknown fields included
    async fn get_simulation_spec(&self, project_id: &Id, simulation_id: &Id) -> Result<serde_json::Value>;
    async fn update_simulation_spec(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        spec: &serde_json::Value,
    ) -> Result<()>;
    async fn estimate_simulation_setup(&self, project_id: &Id, simulation_id: &Id) -> Result<Estimation>;
    async fn check_simulation_setup(&self, project_id: &Id, simulation_id: &Id) -> Result<CheckResult>;
    /// Create a geometry primitive and return its id
    async fn create_geometry_primitive(
        &self,
        project_id: &Id,
        primitive: &GeometryPrimitive,
    ) -> Result<Id>;
}

#[async_trait::async_trait]
pub trait RunApi: Send + Sync {
    async fn list_simulation_runs(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        limit: usize,
    ) -> Result<Vec<SimulationRun>>;
    async fn create_simulation_run(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        run: NewSimulationRun,
    ) -> Result<SimulationRun>;
    async fn start_simulation_run(&self, project_id: &Id, simulation_id: &Id, run_id: &Id) -> Result<()>;
    async fn get_simulation_run(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        run_id: &Id,
    ) -> Result<SimulationRun>;
    async fn get_simulation_run_results(
        &self,
        project_id: &Id,
        simulation_id: &Id,
        run_id: &Id,
        limit: usize,
    ) -> Result<Vec<ResultArtifact>>;
}

#[async_trait::async_trait]
pub trait ReportApi: Send + Sync {
    async fn create_report(&self, project_id: &Id, request: ReportRequest) -> Result<Report>;
    async fn start_report_job(&self, project_id: &Id, report_id: &Id) -> Result<()>;
    async fn get_report(&self, project_id: &Id, report_id: &Id) -> Result<Report>;
}

/// Combined trait for the full remote service
pub trait RemoteService:
    ProjectApi + GeometryApi + StorageApi + MeshApi + SimulationApi + RunApi + ReportApi
{
}

impl<T> RemoteService for T where
    T: ProjectApi + GeometryApi + StorageApi + MeshApi + SimulationApi + RunApi + ReportApi
{
}
