use log::{info, warn};
use std::path::Path;

use crate::config::PollingConfig;
use crate::error::{Result, WorkflowError};
use crate::files;
use crate::logic::polling::{poll_until_terminal, CancelToken, PollPolicy};
use crate::model::{
    GeometryImportLocation, GeometryImportOptions, GeometryImportRequest, GeometryRef, JobStatus,
    RemoteResourceRef, ResourceKind,
};
use crate::remote::{GeometryApi, StorageApi, LISTING_LIMIT};

/// What to do when the project already holds a geometry with the requested name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnNameCollision {
    /// Return the existing geometry without uploading.
    #[default]
    Reuse,
    /// Append the lowest free numeric suffix and import anyway.
    SuffixAndReimport,
}

/// Uploads CAD files and drives the import job to a terminal state.
pub struct GeometryImportController<'a, S: ?Sized> {
    remote: &'a S,
    policy: PollPolicy,
    collision: OnNameCollision,
    options: GeometryImportOptions,
    cancel: CancelToken,
}

impl<'a, S> GeometryImportController<'a, S>
where
    S: GeometryApi + StorageApi + ?Sized,
{
    pub fn new(remote: &'a S, polling: &PollingConfig, cancel: CancelToken) -> Self {
        Self {
            remote,
            policy: PollPolicy::from_secs(polling.import_interval_secs, polling.import_timeout_secs),
            collision: OnNameCollision::default(),
            options: GeometryImportOptions::default(),
            cancel,
        }
    }

    pub fn on_name_collision(mut self, collision: OnNameCollision) -> Self {
        self.collision = collision;
        self
    }

    pub fn with_options(mut self, options: GeometryImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Upload `path` (a CAD file or a directory, which is zipped) and import it
    /// into `project` as `name`.
    pub async fn upload(
        &self,
        project: &RemoteResourceRef,
        path: &Path,
        name: &str,
        unit: &str,
        format: &str,
    ) -> Result<GeometryRef> {
        let project_id = &project.id;
        let existing = self.remote.list_geometries(project_id, LISTING_LIMIT).await?;
        let taken: Vec<&str> = existing.iter().map(|g| g.name.as_str()).collect();

        let import_name = match (taken.contains(&name), self.collision) {
            (false, _) => name.to_string(),
            (true, OnNameCollision::Reuse) => {
                // First match wins, as with every name lookup.
                let reused = existing
                    .iter()
                    .find(|g| g.name == name)
                    .ok_or_else(|| WorkflowError::not_found(ResourceKind::Geometry, name))?;
                info!("Geometry '{}' already exists ({}), reusing it", name, reused.geometry_id);
                return Ok(GeometryRef {
                    geometry_id: reused.geometry_id.clone(),
                    name: reused.name.clone(),
                    import_id: None,
                    sha256: None,
                    reused: true,
                });
            }
            (true, OnNameCollision::SuffixAndReimport) => {
                let renamed = disambiguate(name, &taken);
                warn!("Geometry '{}' already exists, importing as '{}'", name, renamed);
                renamed
            }
        };

        let payload = files::load_cad(path).await?;
        info!(
            "Uploading {} ({} bytes, sha256 {}){}",
            payload.file_name,
            payload.bytes.len(),
            payload.sha256,
            if payload.packaged { ", zipped from directory" } else { "" }
        );

        let slot = self.remote.create_storage_slot().await?;
        self.remote.put_bytes(&slot.url, payload.bytes).await?;

        let import = self
            .remote
            .import_geometry(
                project_id,
                GeometryImportRequest {
                    name: import_name.clone(),
                    location: GeometryImportLocation {
                        storage_id: slot.storage_id.clone(),
                    },
                    format: format.to_string(),
                    input_unit: unit.to_string(),
                    options: self.options.clone(),
                },
            )
            .await?;
        let import_id = import.geometry_import_id.clone();
        info!("Geometry import {} submitted for '{}'", import_id, import_name);

        let remote = self.remote;
        let id = &import_id;
        let finished = poll_until_terminal(
            ResourceKind::GeometryImport,
            &import_id,
            self.policy,
            &self.cancel,
            move || remote.get_geometry_import(project_id, id),
        )
        .await?;

        match (finished.status, finished.geometry_id) {
            (JobStatus::Finished, Some(geometry_id)) => {
                info!("Geometry import {} finished: geometry {}", import_id, geometry_id);
                Ok(GeometryRef {
                    geometry_id,
                    name: import_name,
                    import_id: Some(import_id),
                    sha256: Some(payload.sha256),
                    reused: false,
                })
            }
            (JobStatus::Finished, None) => Err(WorkflowError::InvalidState(format!(
                "geometry import {} finished without a geometry id",
                import_id
            ))),
            (status, _) => Err(WorkflowError::ImportFailed {
                import_id,
                status,
                reason: finished.failure_reason,
            }),
        }
    }
}

/// `name` followed by the lowest positive integer that makes it unique.
pub fn disambiguate(name: &str, taken: &[&str]) -> String {
    (1..)
        .map(|n| format!("{}{}", name, n))
        .find(|candidate| !taken.contains(&candidate.as_str()))
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use std::time::Duration;

    fn fast() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), Duration::from_secs(5))
    }

    fn cad_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("heat_sink.x_t");
        std::fs::write(&path, b"parasolid").unwrap();
        path
    }

    #[test]
    fn test_disambiguate_appends_lowest_free_suffix() {
        assert_eq!(disambiguate("part", &["part"]), "part1");
        assert_eq!(disambiguate("part", &["part", "part1"]), "part2");
    }

    #[tokio::test]
    async fn test_upload_imports_and_returns_geometry() {
        let remote = MemoryRemote::new();
        remote.script_import(vec![JobStatus::Queued, JobStatus::Running, JobStatus::Finished]);
        let project = RemoteResourceRef::new(ResourceKind::Project, remote.add_project("P"), "P");
        let dir = tempfile::tempdir().unwrap();

        let controller = GeometryImportController::new(&remote, &PollingConfig::default(), CancelToken::new())
            .with_poll_policy(fast());
        let geometry = controller
            .upload(&project, &cad_file(&dir), "Heat sink", "m", "PARASOLID")
            .await
            .unwrap();

        assert!(!geometry.reused);
        assert_eq!(geometry.name, "Heat sink");
        assert_eq!(geometry.sha256, Some(files::sha256_hex(b"parasolid")));
        assert_eq!(remote.call_count("get_geometry_import"), 3);
        assert_eq!(remote.call_count("put_bytes"), 1);
    }

    #[tokio::test]
    async fn test_failed_import_is_an_error() {
        let remote = MemoryRemote::new();
        remote.script_import(vec![JobStatus::Running, JobStatus::Failed]);
        let project = RemoteResourceRef::new(ResourceKind::Project, remote.add_project("P"), "P");
        let dir = tempfile::tempdir().unwrap();

        let controller = GeometryImportController::new(&remote, &PollingConfig::default(), CancelToken::new())
            .with_poll_policy(fast());
        let err = controller
            .upload(&project, &cad_file(&dir), "Heat sink", "m", "PARASOLID")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::ImportFailed {
                status: JobStatus::Failed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_name_collision_policies() {
        let remote = MemoryRemote::new();
        let project_id = remote.add_project("P");
        let existing = remote.add_geometry(&project_id, "Heat sink");
        let project = RemoteResourceRef::new(ResourceKind::Project, project_id, "P");
        let dir = tempfile::tempdir().unwrap();

        let reuse = GeometryImportController::new(&remote, &PollingConfig::default(), CancelToken::new())
            .with_poll_policy(fast());
        let geometry = reuse
            .upload(&project, &cad_file(&dir), "Heat sink", "m", "PARASOLID")
            .await
            .unwrap();
        assert!(geometry.reused);
        assert_eq!(geometry.geometry_id, existing);
        assert_eq!(remote.call_count("put_bytes"), 0);

        let reimport = GeometryImportController::new(&remote, &PollingConfig::default(), CancelToken::new())
            .with_poll_policy(fast())
            .on_name_collision(OnNameCollision::SuffixAndReimport);
        let geometry = reimport
            .upload(&project, &cad_file(&dir), "Heat sink", "m", "PARASOLID")
            .await
            .unwrap();
        assert!(!geometry.reused);
        assert_eq!(geometry.name, "Heat sink1");
        assert_ne!(geometry.geometry_id, existing);
    }

    #[tokio::test]
    async fn test_stuck_import_times_out() {
        let remote = MemoryRemote::new();
        remote.script_import(vec![JobStatus::Running]);
        let project = RemoteResourceRef::new(ResourceKind::Project, remote.add_project("P"), "P");
        let dir = tempfile::tempdir().unwrap();

        let controller = GeometryImportController::new(&remote, &PollingConfig::default(), CancelToken::new())
            .with_poll_policy(PollPolicy::new(Duration::from_millis(5), Duration::from_millis(30)));
        let err = controller
            .upload(&project, &cad_file(&dir), "Heat sink", "m", "PARASOLID")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Timeout {
                kind: ResourceKind::GeometryImport,
                ..
            }
        ));
    }
}
