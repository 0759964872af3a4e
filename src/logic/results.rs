use log::info;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::{Result, WorkflowError};
use crate::files;
use crate::logic::polling::{poll_until_terminal, CancelToken, PollPolicy};
use crate::model::{Id, JobStatus, ReportRequest, ResourceKind, ResultArtifact, ResultCategory};
use crate::remote::{ReportApi, RunApi, StorageApi, LISTING_LIMIT};

/// The artifact of `category` named `name`, optionally with a given quantity.
///
/// Matching is exact and the first listed match wins.
pub fn find_artifact<'m>(
    manifest: &'m [ResultArtifact],
    category: ResultCategory,
    name: &str,
    quantity: Option<&str>,
) -> Result<&'m ResultArtifact> {
    manifest
        .iter()
        .find(|artifact| {
            artifact.category == category
                && artifact.name == name
                && quantity.map_or(true, |q| artifact.quantity.as_deref() == Some(q))
        })
        .ok_or_else(|| WorkflowError::ArtifactNotFound {
            category,
            name: name.to_string(),
            quantity: quantity.map(str::to_string),
        })
}

/// Fetches, downloads and stores the outputs of one finished run.
pub struct RunResults<'a, S: ?Sized> {
    remote: &'a S,
    project_id: Id,
    simulation_id: Id,
    run_id: Id,
    results_dir: PathBuf,
    report_policy: PollPolicy,
    cancel: CancelToken,
}

impl<'a, S> RunResults<'a, S>
where
    S: RunApi + ReportApi + StorageApi + ?Sized,
{
    pub fn new(
        remote: &'a S,
        project_id: &Id,
        simulation_id: &Id,
        run_id: &Id,
        config: &AppConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            remote,
            project_id: project_id.clone(),
            simulation_id: simulation_id.clone(),
            run_id: run_id.clone(),
            results_dir: config.output.results_dir.clone(),
            report_policy: PollPolicy::from_secs(
                config.polling.report_interval_secs,
                config.polling.report_timeout_secs,
            ),
            cancel,
        }
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn with_report_poll_interval(mut self, interval: Duration) -> Self {
        self.report_policy.interval = interval;
        self
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Every result artifact the run produced.
    pub async fn fetch_manifest(&self) -> Result<Vec<ResultArtifact>> {
        let manifest = self
            .remote
            .get_simulation_run_results(&self.project_id, &self.simulation_id, &self.run_id, LISTING_LIMIT)
            .await?;
        info!("Run {} has {} result artifacts", self.run_id, manifest.len());
        Ok(manifest)
    }

    pub async fn download(&self, artifact: &ResultArtifact) -> Result<Vec<u8>> {
        self.remote.download(&artifact.download.url).await
    }

    /// Download `artifact` into the results directory as `file_name`.
    pub async fn save(&self, artifact: &ResultArtifact, file_name: &str) -> Result<PathBuf> {
        let bytes = self.download(artifact).await?;
        let path = self.results_dir.join(file_name);
        files::write_bytes(&path, &bytes).await?;
        info!(
            "Saved {} '{}' ({} bytes) to {}",
            artifact.category,
            artifact.name,
            bytes.len(),
            path.display()
        );
        Ok(path)
    }

    /// Look up an artifact in `manifest` and save it as `file_name`.
    pub async fn save_matching(
        &self,
        manifest: &[ResultArtifact],
        category: ResultCategory,
        name: &str,
        quantity: Option<&str>,
        file_name: &str,
    ) -> Result<PathBuf> {
        let artifact = find_artifact(manifest, category, name, quantity)?;
        self.save(artifact, file_name).await
    }

    /// Entry names of the SOLUTION archive.
    pub async fn case_files(&self, manifest: &[ResultArtifact]) -> Result<Vec<String>> {
        let solution = solution_artifact(manifest)?;
        let bytes = self.download(solution).await?;
        files::list_zip_entries(&bytes)
    }

    /// Render a screenshot of `part_id` from the SOLUTION artifact and save
    /// it as `file_name`.
    pub async fn screenshot(&self, manifest: &[ResultArtifact], part_id: &str, file_name: &str) -> Result<PathBuf> {
        let solution = solution_artifact(manifest)?;
        let report = self
            .remote
            .create_report(
                &self.project_id,
                ReportRequest::screenshot(solution.result_id.clone(), part_id),
            )
            .await?;
        let report_id = report.report_id;
        self.remote.start_report_job(&self.project_id, &report_id).await?;
        info!("Report job {} started", report_id);

        let remote = self.remote;
        let project_id = &self.project_id;
        let id = &report_id;
        let finished = poll_until_terminal(
            ResourceKind::ReportJob,
            id,
            self.report_policy,
            &self.cancel,
            move || remote.get_report(project_id, id),
        )
        .await?;

        let download = match (finished.status, finished.download) {
            (JobStatus::Finished, Some(download)) => download,
            (JobStatus::Finished, None) => {
                return Err(WorkflowError::InvalidState(format!(
                    "report {} finished without a download",
                    report_id
                )))
            }
            (status, _) => {
                return Err(WorkflowError::JobFailed {
                    kind: ResourceKind::ReportJob,
                    id: report_id,
                    status,
                    reason: finished.failure_reason,
                })
            }
        };

        let bytes = self.remote.download(&download.url).await?;
        let path = self.results_dir.join(file_name);
        files::write_bytes(&path, &bytes).await?;
        info!("Saved report {} to {}", report_id, path.display());
        Ok(path)
    }
}

fn solution_artifact(manifest: &[ResultArtifact]) -> Result<&ResultArtifact> {
    manifest
        .iter()
        .find(|artifact| artifact.category == ResultCategory::Solution)
        .ok_or_else(|| WorkflowError::ArtifactNotFound {
            category: ResultCategory::Solution,
            name: "solution".to_string(),
            quantity: None,
        })
}
