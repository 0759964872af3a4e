use log::info;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::logic::entity_mapping::EntityMapper;
use crate::logic::geometry_import::GeometryImportController;
use crate::logic::locate::{self, ResolvePolicy};
use crate::logic::mesh_operation::MeshOperationController;
use crate::logic::polling::CancelToken;
use crate::logic::results::RunResults;
use crate::logic::simulation_run::SimulationRunController;
use crate::logic::spec_builder::SpecificationBuilder;
use crate::model::{AnalysisType, Id, MeshOperationRequest, RemoteResourceRef};
use crate::remote::{EntityMappingCache, HttpRemote, RemoteService};

/// One workflow invocation: a remote client, its configuration, the entity
/// mapping cache shared by mappers and builders, and a cancellation token
/// handed to every controller.
pub struct Session<S: RemoteService> {
    remote: Arc<S>,
    config: AppConfig,
    cache: Arc<EntityMappingCache>,
    cancel: CancelToken,
    policy: ResolvePolicy,
}

impl Session<HttpRemote> {
    /// Connect to the service named by `config`. Fails before any request
    /// when credentials are missing.
    pub fn connect(config: AppConfig) -> Result<Self> {
        let remote = HttpRemote::new(&config)?;
        info!("Connected to {}", remote.base_url());
        Ok(Self::with_remote(Arc::new(remote), config))
    }
}

impl<S: RemoteService> Session<S> {
    pub fn with_remote(remote: Arc<S>, config: AppConfig) -> Self {
        Self {
            remote,
            config,
            cache: Arc::new(EntityMappingCache::new()),
            cancel: CancelToken::new(),
            policy: ResolvePolicy::default(),
        }
    }

    pub fn with_resolve_policy(mut self, policy: ResolvePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<EntityMappingCache> {
        &self.cache
    }

    /// Token that aborts every poll loop started from this session.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub async fn project(&self, name: &str) -> Result<RemoteResourceRef> {
        locate::resolve_project(self.remote(), name, self.policy).await
    }

    pub async fn ensure_project(&self, name: &str, description: &str, measurement_system: &str) -> Result<RemoteResourceRef> {
        locate::ensure_project(self.remote(), name, description, measurement_system).await
    }

    pub async fn geometry(&self, project_id: &Id, name: &str) -> Result<RemoteResourceRef> {
        locate::resolve_geometry(self.remote(), project_id, name, self.policy).await
    }

    pub async fn simulation(&self, project_id: &Id, name: &str) -> Result<RemoteResourceRef> {
        locate::resolve_simulation(self.remote(), project_id, name, self.policy).await
    }

    pub async fn run(&self, project_id: &Id, simulation_id: &Id, name: &str) -> Result<RemoteResourceRef> {
        locate::resolve_run(self.remote(), project_id, simulation_id, name, self.policy).await
    }

    pub fn geometry_import(&self) -> GeometryImportController<'_, S> {
        GeometryImportController::new(self.remote(), &self.config.polling, self.cancel_token())
    }

    pub fn entity_mapper(&self, project_id: &Id, geometry_id: &Id) -> EntityMapper<'_, S> {
        EntityMapper::new(self.remote(), project_id, geometry_id, self.cache.clone())
    }

    pub fn specification_builder(&self, geometry_id: &Id, analysis: AnalysisType) -> SpecificationBuilder {
        SpecificationBuilder::new(geometry_id, analysis, self.cache.clone())
    }

    pub async fn mesh_operation(
        &self,
        project_id: &Id,
        request: MeshOperationRequest,
    ) -> Result<MeshOperationController<'_, S>> {
        MeshOperationController::create(self.remote(), project_id, request, &self.config, self.cancel_token()).await
    }

    pub fn simulation_run(&self, project_id: &Id, simulation_id: &Id) -> SimulationRunController<'_, S> {
        SimulationRunController::new(self.remote(), project_id, simulation_id, &self.config, self.cancel_token())
    }

    pub fn results(&self, project_id: &Id, simulation_id: &Id, run_id: &Id) -> RunResults<'_, S> {
        RunResults::new(
            self.remote(),
            project_id,
            simulation_id,
            run_id,
            &self.config,
            self.cancel_token(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use crate::remote::MemoryRemote;

    #[test]
    fn test_connect_without_credentials_fails_fast() {
        let mut config = AppConfig::default();
        config.api.key = Some(String::new());
        config.api.url = Some("https://api.example.com".to_string());
        let err = Session::connect(config).err();
        assert!(matches!(err, Some(WorkflowError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_session_resolves_and_provisions_projects() {
        let remote = Arc::new(MemoryRemote::new());
        let existing = remote.add_project("Heat sink study");
        let session = Session::with_remote(remote.clone(), AppConfig::default());

        assert_eq!(session.project("Heat sink study").await.unwrap().id, existing);
        assert!(session.project("Missing").await.unwrap_err().is_not_found());

        let created = session.ensure_project("Fresh", "new study", "SI").await.unwrap();
        assert_ne!(created.id, existing);
        assert_eq!(remote.call_count("create_project"), 1);
    }
}
