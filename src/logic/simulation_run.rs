use log::info;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::{Result, WorkflowError};
use crate::logic::estimate::{admit, enforce_setup_check, Admission};
use crate::logic::polling::{poll_until_terminal, CancelToken, JobPhase, PollPolicy};
use crate::model::{CheckEntry, Id, JobStatus, NewSimulationRun, ResourceKind, SimulationRun};
use crate::remote::{RunApi, SimulationApi};

/// Runs a submitted simulation: pre-flight check, admission, execution.
pub struct SimulationRunController<'a, S: ?Sized> {
    remote: &'a S,
    project_id: Id,
    simulation_id: Id,
    run: Option<SimulationRun>,
    phase: JobPhase,
    admission: Option<Admission>,
    config: AppConfig,
    ceiling: f64,
    interval: Duration,
    cancel: CancelToken,
}

impl<'a, S> SimulationRunController<'a, S>
where
    S: SimulationApi + RunApi + ?Sized,
{
    pub fn new(remote: &'a S, project_id: &Id, simulation_id: &Id, config: &AppConfig, cancel: CancelToken) -> Self {
        Self {
            remote,
            project_id: project_id.clone(),
            simulation_id: simulation_id.clone(),
            run: None,
            phase: JobPhase::Configured,
            admission: None,
            config: config.clone(),
            ceiling: config.admission.run_ceiling,
            interval: Duration::from_secs(config.polling.run_interval_secs),
            cancel,
        }
    }

    /// Compute-unit ceiling above which the run is refused.
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

    pub fn run(&self) -> Option<&SimulationRun> {
        self.run.as_ref()
    }

    pub fn admission(&self) -> Option<&Admission> {
        self.admission.as_ref()
    }

    /// Estimated maximum runtime of the run, used as the wait timeout.
    /// Before an estimate has been taken this is the fallback budget.
    pub fn max_runtime(&self) -> Duration {
        match &self.admission {
            Some(admission) => admission.max_runtime,
            None => Admission::fallback(&self.config.polling).max_runtime,
        }
    }

    /// Pre-flight validation; error entries fail, warnings are returned.
    pub async fn check_setup(&self) -> Result<Vec<CheckEntry>> {
        let check = self
            .remote
            .check_simulation_setup(&self.project_id, &self.simulation_id)
            .await?;
        enforce_setup_check(ResourceKind::Simulation, &self.simulation_id, check)
    }

    /// Estimate the simulation and admit it against the ceiling.
    pub async fn estimate(&mut self) -> Result<&Admission> {
        let result = self
            .remote
            .estimate_simulation_setup(&self.project_id, &self.simulation_id)
            .await;
        let admission = admit(
            result,
            self.ceiling,
            &self.config.polling,
            |value, ceiling, estimate| WorkflowError::TooExpensive {
                value,
                ceiling,
                estimate: Box::new(estimate),
            },
        )?;
        self.phase = JobPhase::Estimated;
        Ok(&*self.admission.insert(admission))
    }

    /// Create a run of the simulation.
    pub async fn create_run(&mut self, name: &str) -> Result<&SimulationRun> {
        if self.run.is_some() {
            return Err(WorkflowError::InvalidState(format!(
                "simulation {} already has a run in this controller",
                self.simulation_id
            )));
        }
        let run = self
            .remote
            .create_simulation_run(
                &self.project_id,
                &self.simulation_id,
                NewSimulationRun {
                    name: name.to_string(),
                },
            )
            .await?;
        info!("Created run '{}' ({})", run.name, run.run_id);
        Ok(&*self.run.insert(run))
    }

    /// Take over an existing run, e.g. one found by name.
    pub fn attach(&mut self, run: SimulationRun) {
        self.phase = match run.status {
            JobStatus::Ready => JobPhase::Configured,
            status => JobPhase::after(status),
        };
        self.run = Some(run);
    }

    /// Start the run; with `wait` also poll until it is terminal.
    pub async fn start(&mut self, wait: bool) -> Result<SimulationRun> {
        let run_id = match &self.run {
            Some(run) => run.run_id.clone(),
            None => {
                return Err(WorkflowError::InvalidState(
                    "create a run before starting it".to_string(),
                ))
            }
        };
        match self.phase {
            JobPhase::Configured => {
                self.estimate().await?;
            }
            JobPhase::Estimated => {}
            phase => {
                return Err(WorkflowError::InvalidState(format!(
                    "run {} cannot start while {:?}",
                    run_id, phase
                )))
            }
        }

        self.remote
            .start_simulation_run(&self.project_id, &self.simulation_id, &run_id)
            .await?;
        self.phase = JobPhase::Running;
        info!("Started run {} of simulation {}", run_id, self.simulation_id);

        if wait {
            self.wait().await
        } else {
            self.current()
        }
    }

    fn current(&self) -> Result<SimulationRun> {
        self.run
            .clone()
            .ok_or_else(|| WorkflowError::InvalidState("no run".to_string()))
    }

    /// Poll a running run until it is terminal.
    pub async fn wait(&mut self) -> Result<SimulationRun> {
        let run_id = self.current()?.run_id;
        if self.phase != JobPhase::Running {
            return Err(WorkflowError::InvalidState(format!("run {} is not running", run_id)));
        }

        let max_runtime = self.max_runtime();
        let remote = self.remote;
        let project_id = &self.project_id;
        let simulation_id = &self.simulation_id;
        let id = &run_id;
        let finished = poll_until_terminal(
            ResourceKind::Run,
            id,
            PollPolicy::new(self.interval, max_runtime),
            &self.cancel,
            move || remote.get_simulation_run(project_id, simulation_id, id),
        )
        .await?;

        self.phase = JobPhase::after(finished.status);
        self.run = Some(finished.clone());

        if finished.status.is_success() {
            info!("Run {} finished", run_id);
            Ok(finished)
        } else {
            Err(WorkflowError::JobFailed {
                kind: ResourceKind::Run,
                id: run_id,
                status: finished.status,
                reason: finished.failure_reason,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckResult, DurationEstimate, Estimation, NumericEstimate, Severity};
    use crate::remote::{EstimateResponse, MemoryRemote};

    fn setup() -> (MemoryRemote, Id, Id) {
        let remote = MemoryRemote::new();
        let project_id = remote.add_project("P");
        let simulation_id = remote.add_simulation(&project_id, "Sim");
        (remote, project_id, simulation_id)
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let (remote, project_id, simulation_id) = setup();
        remote.script_run(vec![JobStatus::Queued, JobStatus::Running, JobStatus::Finished]);
        remote.set_simulation_estimate(EstimateResponse::Estimate(Estimation {
            duration: Some(DurationEstimate {
                value: "PT1H".to_string(),
                interval_min: "PT30M".to_string(),
                interval_max: "PT3H".to_string(),
            }),
            compute_resource: Some(NumericEstimate {
                value: 20.0,
                interval_min: 15.0,
                interval_max: 30.0,
            }),
            cell_count: None,
        }));

        let mut controller = SimulationRunController::new(
            &remote,
            &project_id,
            &simulation_id,
            &AppConfig::default(),
            CancelToken::new(),
        )
        .with_poll_interval(Duration::from_millis(1));
        assert_eq!(controller.max_runtime(), Duration::from_secs(36000));

        assert!(controller.start(true).await.is_err());
        controller.create_run("Run 1").await.unwrap();
        let run = controller.start(true).await.unwrap();

        assert_eq!(run.status, JobStatus::Finished);
        assert_eq!(controller.phase(), JobPhase::Finished);
        assert_eq!(
            controller.admission().map(|a| a.max_runtime),
            Some(Duration::from_secs(6 * 3600))
        );
        assert_eq!(controller.max_runtime(), Duration::from_secs(6 * 3600));
        assert_eq!(remote.call_count("get_simulation_run"), 3);
    }

    #[tokio::test]
    async fn test_too_expensive_run_is_not_started() {
        let (remote, project_id, simulation_id) = setup();
        remote.set_simulation_estimate(EstimateResponse::Estimate(Estimation {
            duration: None,
            compute_resource: Some(NumericEstimate {
                value: 300.0,
                interval_min: 250.0,
                interval_max: 350.0,
            }),
            cell_count: None,
        }));

        let mut controller = SimulationRunController::new(
            &remote,
            &project_id,
            &simulation_id,
            &AppConfig::default(),
            CancelToken::new(),
        );
        controller.create_run("Run 1").await.unwrap();

        let err = controller.start(true).await.unwrap_err();
        assert!(matches!(err, WorkflowError::TooExpensive { value, .. } if value == 300.0));
        assert_eq!(remote.call_count("start_simulation_run"), 0);
    }

    #[tokio::test]
    async fn test_canceled_run_is_an_error() {
        let (remote, project_id, simulation_id) = setup();
        remote.script_run(vec![JobStatus::Running, JobStatus::Canceled]);

        let mut controller = SimulationRunController::new(
            &remote,
            &project_id,
            &simulation_id,
            &AppConfig::default(),
            CancelToken::new(),
        )
        .with_poll_interval(Duration::from_millis(1));
        controller.create_run("Run 1").await.unwrap();

        let err = controller.start(true).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::JobFailed {
                kind: ResourceKind::Run,
                status: JobStatus::Canceled,
                ..
            }
        ));
        assert_eq!(controller.phase(), JobPhase::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_token_interrupts_wait() {
        let (remote, project_id, simulation_id) = setup();
        remote.script_run(vec![JobStatus::Running]);
        let cancel = CancelToken::new();

        let mut controller = SimulationRunController::new(
            &remote,
            &project_id,
            &simulation_id,
            &AppConfig::default(),
            cancel.clone(),
        );
        controller.create_run("Run 1").await.unwrap();
        controller.start(false).await.unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = controller.wait().await.unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled { kind: ResourceKind::Run, .. }));
    }

    #[tokio::test]
    async fn test_setup_warnings_do_not_block() {
        let (remote, project_id, simulation_id) = setup();
        remote.set_simulation_check(CheckResult {
            entries: vec![CheckEntry {
                severity: Severity::Warning,
                code: None,
                message: "mesh is coarse".to_string(),
            }],
        });
        let controller = SimulationRunController::new(
            &remote,
            &project_id,
            &simulation_id,
            &AppConfig::default(),
            CancelToken::new(),
        );
        let entries = controller.check_setup().await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_attach_existing_run() {
        let (remote, project_id, simulation_id) = setup();
        let run_id = remote.add_run(&simulation_id, "Old run", JobStatus::Finished);
        let run = remote
            .get_simulation_run(&project_id, &simulation_id, &run_id)
            .await
            .unwrap();

        let mut controller = SimulationRunController::new(
            &remote,
            &project_id,
            &simulation_id,
            &AppConfig::default(),
            CancelToken::new(),
        );
        controller.attach(run);
        assert_eq!(controller.phase(), JobPhase::Finished);
        assert!(controller.start(false).await.is_err());
    }
}
