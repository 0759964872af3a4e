use log::{info, warn};
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::{Result, WorkflowError};
use crate::logic::estimate::{admit, enforce_setup_check, Admission};
use crate::logic::polling::{poll_until_terminal, CancelToken, JobPhase, PollPolicy};
use crate::model::{CheckEntry, Id, JobStatus, MeshOperation, MeshOperationRequest, ResourceKind};
use crate::remote::{MeshApi, SimulationApi};

/// Drives one mesh operation from creation to a terminal status.
///
/// Starting always passes admission control first: an estimate above the
/// mesh ceiling fails before the operation is started. When the operation
/// serves a simulation, the finished mesh id is written into that
/// simulation's specification.
pub struct MeshOperationController<'a, S: ?Sized> {
    remote: &'a S,
    project_id: Id,
    simulation_id: Option<Id>,
    operation: MeshOperation,
    phase: JobPhase,
    admission: Option<Admission>,
    config: AppConfig,
    ceiling: f64,
    interval: Duration,
    cancel: CancelToken,
}

impl<'a, S> MeshOperationController<'a, S>
where
    S: MeshApi + SimulationApi + ?Sized,
{
    /// Create the operation remotely.
    pub async fn create(
        remote: &'a S,
        project_id: &Id,
        request: MeshOperationRequest,
        config: &AppConfig,
        cancel: CancelToken,
    ) -> Result<Self> {
        let operation = remote.create_mesh_operation(project_id, request).await?;
        info!(
            "Created mesh operation '{}' ({})",
            operation.name, operation.mesh_operation_id
        );
        Ok(Self {
            remote,
            project_id: project_id.clone(),
            simulation_id: None,
            operation,
            phase: JobPhase::Configured,
            admission: None,
            config: config.clone(),
            ceiling: config.admission.mesh_ceiling,
            interval: Duration::from_secs(config.polling.mesh_interval_secs),
            cancel,
        })
    }

    /// Mesh for `simulation_id`: physics-based meshing uses its setup and the
    /// finished mesh is assigned to it.
    pub fn for_simulation(mut self, simulation_id: &Id) -> Self {
        self.simulation_id = Some(simulation_id.clone());
        self
    }

    pub fn with_ceiling(mut self, ceiling: f64) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    pub fn operation(&self) -> &MeshOperation {
        &self.operation
    }

    pub fn mesh_operation_id(&self) -> &Id {
        &self.operation.mesh_operation_id
    }

    pub fn admission(&self) -> Option<&Admission> {
        self.admission.as_ref()
    }

    /// Estimate the operation and admit it against the ceiling.
    pub async fn estimate(&mut self) -> Result<&Admission> {
        let result = self
            .remote
            .estimate_mesh_operation(&self.project_id, &self.operation.mesh_operation_id)
            .await;
        let admission = admit(
            result,
            self.ceiling,
            &self.config.polling,
            |value, ceiling, estimate| WorkflowError::EstimateExceeded {
                value,
                ceiling,
                estimate: Box::new(estimate),
            },
        )?;
        if let Some(cells) = admission.estimate.as_ref().and_then(|e| e.cell_count.as_ref()) {
            info!(
                "Cell count estimate: {} - {}, expected {}",
                cells.interval_min, cells.interval_max, cells.value
            );
        }
        self.phase = JobPhase::Estimated;
        Ok(&*self.admission.insert(admission))
    }

    /// Validate the operation against its simulation.
    pub async fn check_setup(&self) -> Result<Vec<CheckEntry>> {
        let simulation_id = self.simulation_id.as_ref().ok_or_else(|| {
            WorkflowError::InvalidState(format!(
                "mesh operation {} has no simulation to check against",
                self.operation.mesh_operation_id
            ))
        })?;
        let check = self
            .remote
            .check_mesh_operation_setup(&self.project_id, &self.operation.mesh_operation_id, simulation_id)
            .await?;
        enforce_setup_check(ResourceKind::MeshOperation, &self.operation.mesh_operation_id, check)
    }

    /// Start meshing; with `wait` also poll until the operation is terminal.
    pub async fn start(&mut self, wait: bool) -> Result<MeshOperation> {
        match self.phase {
            JobPhase::Configured => {
                self.estimate().await?;
            }
            JobPhase::Estimated => {}
            phase => {
                return Err(WorkflowError::InvalidState(format!(
                    "mesh operation {} cannot start while {:?}",
                    self.operation.mesh_operation_id, phase
                )))
            }
        }

        self.remote
            .start_mesh_operation(
                &self.project_id,
                &self.operation.mesh_operation_id,
                self.simulation_id.as_ref(),
            )
            .await?;
        self.phase = JobPhase::Running;
        info!("Started mesh operation {}", self.operation.mesh_operation_id);

        if wait {
            self.wait().await
        } else {
            Ok(self.operation.clone())
        }
    }

    /// Poll a running operation until it is terminal.
    pub async fn wait(&mut self) -> Result<MeshOperation> {
        if self.phase != JobPhase::Running {
            return Err(WorkflowError::InvalidState(format!(
                "mesh operation {} is not running",
                self.operation.mesh_operation_id
            )));
        }

        let max_runtime = match &self.admission {
            Some(admission) => admission.max_runtime,
            None => Admission::fallback(&self.config.polling).max_runtime,
        };
        let policy = PollPolicy::new(self.interval, max_runtime);

        let remote = self.remote;
        let project_id = &self.project_id;
        let id = &self.operation.mesh_operation_id;
        let finished = poll_until_terminal(
            ResourceKind::MeshOperation,
            id,
            policy,
            &self.cancel,
            move || remote.get_mesh_operation(project_id, id),
        )
        .await?;

        self.phase = JobPhase::after(finished.status);
        self.operation = finished.clone();

        match (finished.status, finished.mesh_id.clone()) {
            (JobStatus::Finished, Some(mesh_id)) => {
                info!(
                    "Mesh operation {} finished: mesh {}",
                    finished.mesh_operation_id, mesh_id
                );
                if let Some(simulation_id) = &self.simulation_id {
                    assign_mesh(self.remote, &self.project_id, simulation_id, &mesh_id).await?;
                }
                Ok(finished)
            }
            (JobStatus::Finished, None) => Err(WorkflowError::InvalidState(format!(
                "mesh operation {} finished without a mesh id",
                finished.mesh_operation_id
            ))),
            (status, _) => Err(WorkflowError::JobFailed {
                kind: ResourceKind::MeshOperation,
                id: finished.mesh_operation_id,
                status,
                reason: finished.failure_reason,
            }),
        }
    }
}

/// Point the stored specification of `simulation_id` at `mesh_id`.
pub async fn assign_mesh<S>(remote: &S, project_id: &Id, simulation_id: &Id, mesh_id: &Id) -> Result<()>
where
    S: SimulationApi + ?Sized,
{
    let mut spec = remote.get_simulation_spec(project_id, simulation_id).await?;
    match spec.as_object_mut() {
        Some(object) => {
            object.insert("meshId".to_string(), serde_json::Value::String(mesh_id.clone()));
        }
        None => {
            warn!("Specification of simulation {} is not an object", simulation_id);
            return Err(WorkflowError::InvalidState(format!(
                "cannot assign mesh to simulation {}",
                simulation_id
            )));
        }
    }
    remote.update_simulation_spec(project_id, simulation_id, &spec).await?;
    info!("Assigned mesh {} to simulation {}", mesh_id, simulation_id);
    Ok(())
}
