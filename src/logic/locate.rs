use log::{info, warn};

use crate::error::{Result, WorkflowError};
use crate::model::{Id, NamedResource, NewProject, RemoteResourceRef, ResourceKind};
use crate::remote::{GeometryApi, ProjectApi, RunApi, SimulationApi, LISTING_LIMIT};

/// How duplicate names in a listing are treated.
///
/// Names are not unique on the service. `FirstMatch` takes the first item in
/// listing order and logs a warning when more than one matches; `Unique`
/// rejects duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolvePolicy {
    #[default]
    FirstMatch,
    Unique,
}

/// Linear scan of a listing for an item named `name`.
pub fn resolve_by_name<T: NamedResource>(
    items: &[T],
    name: &str,
    policy: ResolvePolicy,
) -> Result<RemoteResourceRef> {
    let matches: Vec<&T> = items
        .iter()
        .filter(|item| item.resource_name() == name)
        .collect();

    match (matches.as_slice(), policy) {
        ([], _) => Err(WorkflowError::not_found(T::KIND, name)),
        ([only], _) => Ok(only.to_ref()),
        ([first, ..], ResolvePolicy::FirstMatch) => {
            warn!(
                "{} {} items named '{}', using the first ({})",
                matches.len(),
                T::KIND,
                name,
                first.resource_id()
            );
            Ok(first.to_ref())
        }
        (_, ResolvePolicy::Unique) => Err(WorkflowError::AmbiguousOrMissingEntity {
            query: format!("{} named '{}'", T::KIND, name),
            expected: "exactly one".to_string(),
            found: matches.len(),
        }),
    }
}

pub async fn resolve_project<S: ProjectApi + ?Sized>(
    remote: &S,
    name: &str,
    policy: ResolvePolicy,
) -> Result<RemoteResourceRef> {
    let projects = remote.list_projects(LISTING_LIMIT).await?;
    resolve_by_name(&projects, name, policy)
}

pub async fn resolve_geometry<S: GeometryApi + ?Sized>(
    remote: &S,
    project_id: &Id,
    name: &str,
    policy: ResolvePolicy,
) -> Result<RemoteResourceRef> {
    let geometries = remote.list_geometries(project_id, LISTING_LIMIT).await?;
    resolve_by_name(&geometries, name, policy)
}

pub async fn resolve_simulation<S: SimulationApi + ?Sized>(
    remote: &S,
    project_id: &Id,
    name: &str,
    policy: ResolvePolicy,
) -> Result<RemoteResourceRef> {
    let simulations = remote.list_simulations(project_id, LISTING_LIMIT).await?;
    resolve_by_name(&simulations, name, policy)
}

pub async fn resolve_run<S: RunApi + ?Sized>(
    remote: &S,
    project_id: &Id,
    simulation_id: &Id,
    name: &str,
    policy: ResolvePolicy,
) -> Result<RemoteResourceRef> {
    let runs = remote
        .list_simulation_runs(project_id, simulation_id, LISTING_LIMIT)
        .await?;
    resolve_by_name(&runs, name, policy)
}

/// Resolve a project by name, creating it when absent.
pub async fn ensure_project<S: ProjectApi + ?Sized>(
    remote: &S,
    name: &str,
    description: &str,
    measurement_system: &str,
) -> Result<RemoteResourceRef> {
    match resolve_project(remote, name, ResolvePolicy::FirstMatch).await {
        Ok(project) => Ok(project),
        Err(WorkflowError::NotFound { .. }) => {
            let created = remote
                .create_project(NewProject {
                    name: name.to_string(),
                    description: description.to_string(),
                    measurement_system: measurement_system.to_string(),
                })
                .await?;
            info!("Created project '{}' ({})", created.name, created.project_id);
            Ok(created.to_ref())
        }
        Err(e) => Err(e),
    }
}

fn names<T: NamedResource>(items: &[T]) -> Vec<String> {
    items
        .iter()
        .map(|item| item.resource_name().to_string())
        .collect()
}

pub async fn list_project_names<S: ProjectApi + ?Sized>(remote: &S) -> Result<Vec<String>> {
    Ok(names(&remote.list_projects(LISTING_LIMIT).await?))
}

pub async fn list_geometry_names<S: GeometryApi + ?Sized>(remote: &S, project_id: &Id) -> Result<Vec<String>> {
    Ok(names(&remote.list_geometries(project_id, LISTING_LIMIT).await?))
}

pub async fn list_simulation_names<S: SimulationApi + ?Sized>(
    remote: &S,
    project_id: &Id,
) -> Result<Vec<String>> {
    Ok(names(&remote.list_simulations(project_id, LISTING_LIMIT).await?))
}

pub async fn list_run_names<S: RunApi + ?Sized>(
    remote: &S,
    project_id: &Id,
    simulation_id: &Id,
) -> Result<Vec<String>> {
    Ok(names(
        &remote
            .list_simulation_runs(project_id, simulation_id, LISTING_LIMIT)
            .await?,
    ))
}

/// Kind-tagged lookup for callers that pick the collection at runtime.
pub async fn resolve<S>(
    remote: &S,
    kind: ResourceKind,
    scope: &[&Id],
    name: &str,
    policy: ResolvePolicy,
) -> Result<RemoteResourceRef>
where
    S: ProjectApi + GeometryApi + SimulationApi + RunApi + ?Sized,
{
    match (kind, scope) {
        (ResourceKind::Project, []) => resolve_project(remote, name, policy).await,
        (ResourceKind::Geometry, [project_id]) => resolve_geometry(remote, project_id, name, policy).await,
        (ResourceKind::Simulation, [project_id]) => {
            resolve_simulation(remote, project_id, name, policy).await
        }
        (ResourceKind::Run, [project_id, simulation_id]) => {
            resolve_run(remote, project_id, simulation_id, name, policy).await
        }
        _ => Err(WorkflowError::InvalidState(format!(
            "cannot resolve a {} by name with {} scope id(s)",
            kind,
            scope.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;
    use crate::remote::MemoryRemote;

    fn project(id: &str, name: &str) -> Project {
        Project {
            project_id: id.to_string(),
            name: name.to_string(),
            description: None,
            measurement_system: None,
        }
    }

    #[test]
    fn test_single_match_resolves() {
        let projects = vec![project("p-1", "Heat sink"), project("p-2", "Cold plate")];
        let found = resolve_by_name(&projects, "Cold plate", ResolvePolicy::Unique).unwrap();
        assert_eq!(found.id, "p-2");
        assert_eq!(found.kind, ResourceKind::Project);
    }

    #[test]
    fn test_no_match_is_not_found() {
        let projects = vec![project("p-1", "Heat sink")];
        let err = resolve_by_name(&projects, "Missing", ResolvePolicy::FirstMatch).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::NotFound {
                kind: ResourceKind::Project,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicates_follow_policy() {
        let projects = vec![
            project("p-1", "Heat sink"),
            project("p-2", "Heat sink"),
        ];
        let first = resolve_by_name(&projects, "Heat sink", ResolvePolicy::FirstMatch).unwrap();
        assert_eq!(first.id, "p-1");

        let err = resolve_by_name(&projects, "Heat sink", ResolvePolicy::Unique).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::AmbiguousOrMissingEntity { found: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_ensure_project_creates_once() {
        let remote = MemoryRemote::new();
        let created = ensure_project(&remote, "Heat sink", "fins", "SI").await.unwrap();
        let again = ensure_project(&remote, "Heat sink", "fins", "SI").await.unwrap();
        assert_eq!(created.id, again.id);
        assert_eq!(remote.call_count("create_project"), 1);
    }

    #[tokio::test]
    async fn test_resolve_rejects_wrong_scope() {
        let remote = MemoryRemote::new();
        let err = resolve(&remote, ResourceKind::Geometry, &[], "part", ResolvePolicy::FirstMatch)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidState(_)));
    }
}
