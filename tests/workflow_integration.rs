use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cht_runner::logic::entity_mapping::{group_by_attribute, PARASOLID_NAME_ATTRIBUTE};
use cht_runner::logic::results::find_artifact;
use cht_runner::logic::spec_builder::{ExternalHeatFluxParams, HeatFluxMethod, ProbeSource};
use cht_runner::logic::tabular;
use cht_runner::logic::{JobPhase, PollPolicy};
use cht_runner::model::{
    AnalysisType, DecimalVector, DownloadInfo, EntityAttribute, EntityClass, EntityFilter, EntityOrigin,
    Estimation, FluidPreset, JobStatus, MeshOperationRequest, NumericEstimate, RawEntity, ResultArtifact,
    ResultCategory, SurfaceAggregation,
};
use cht_runner::remote::EstimateResponse;
use cht_runner::{AppConfig, MemoryRemote, Session, WorkflowError};

const NAME_ATTRIBUTE: &str = "SDL/TYSA_NAME";

fn face(name: &str, attribute: &str, value: &str) -> RawEntity {
    RawEntity {
        name: name.to_string(),
        entity_class: Some(EntityClass::Face),
        originate_from: vec![EntityOrigin {
            attributes: vec![EntityAttribute {
                attribute: attribute.to_string(),
                value: value.to_string(),
            }],
        }],
    }
}

fn named(value: &str) -> EntityFilter {
    EntityFilter::new().class(EntityClass::Face).attribute_value(NAME_ATTRIBUTE, value)
}

fn artifact(category: ResultCategory, name: &str, quantity: Option<&str>, url: &str) -> ResultArtifact {
    ResultArtifact {
        result_id: format!("result-{}", url),
        category,
        name: name.to_string(),
        quantity: quantity.map(str::to_string),
        download: DownloadInfo {
            url: url.to_string(),
            format: Some("CSV".to_string()),
        },
    }
}

#[tokio::test]
async fn test_conjugate_heat_transfer_workflow() {
    let remote = Arc::new(MemoryRemote::new());
    remote.script_import(vec![JobStatus::Queued, JobStatus::Running, JobStatus::Finished]);
    remote.script_mesh(vec![JobStatus::Running, JobStatus::Finished]);
    remote.script_run(vec![JobStatus::Queued, JobStatus::Running, JobStatus::Finished]);

    let results_dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.output.results_dir = results_dir.path().to_path_buf();
    let session = Session::with_remote(remote.clone(), config);

    // 1. Project and geometry
    let project = session
        .ensure_project("Electronics box", "CHT study", "SI")
        .await
        .unwrap();
    println!("✓ Project '{}' provisioned", project.name);

    let cad_dir = tempfile::tempdir().unwrap();
    let cad_path = cad_dir.path().join("box.x_t");
    std::fs::write(&cad_path, b"parasolid body").unwrap();
    let geometry = session
        .geometry_import()
        .with_poll_policy(PollPolicy::new(Duration::from_millis(1), Duration::from_secs(5)))
        .upload(&project, &cad_path, "Box", "m", "PARASOLID")
        .await
        .unwrap();
    assert!(!geometry.reused);
    assert!(geometry.sha256.is_some());
    println!("✓ Geometry imported as {}", geometry.geometry_id);

    // 2. Entity mapping
    let geometry_id = geometry.geometry_id.clone();
    remote.set_mappings(&geometry_id, &named("Inlet"), vec![face("B1_TE5", NAME_ATTRIBUTE, "Inlet")]);
    remote.set_mappings(&geometry_id, &named("Outlet"), vec![face("B1_TE9", NAME_ATTRIBUTE, "Outlet")]);
    remote.set_mappings(
        &geometry_id,
        &named("Walls"),
        vec![face("B1_TE1", NAME_ATTRIBUTE, "Walls"), face("B1_TE2", NAME_ATTRIBUTE, "Walls")],
    );
    let bodies = EntityFilter::new().class(EntityClass::Body).attribute(PARASOLID_NAME_ATTRIBUTE);
    remote.set_mappings(
        &geometry_id,
        &bodies,
        vec![
            face("B2", PARASOLID_NAME_ATTRIBUTE, "Aluminium"),
            face("B3", PARASOLID_NAME_ATTRIBUTE, "Aluminium"),
            face("B4", PARASOLID_NAME_ATTRIBUTE, "FR4"),
        ],
    );

    let mapper = session.entity_mapper(&project.id, &geometry_id);
    mapper.map_single("inlet", named("Inlet")).await.unwrap();
    mapper.map_single("outlet", named("Outlet")).await.unwrap();
    mapper.map_many("walls", named("Walls"), Some(2)).await.unwrap();
    let solids = group_by_attribute(&mapper.resolve_raw(&bodies).await.unwrap(), PARASOLID_NAME_ATTRIBUTE);
    assert_eq!(solids["Aluminium"].len(), 2);
    assert_eq!(session.cache().len().await, 3);
    println!("✓ Entities mapped and cached");

    // 3. Specification
    let mut builder = session.specification_builder(&geometry_id, AnalysisType::ConjugateHeatTransfer);
    builder
        .velocity_inlet(
            "Inlet",
            DecimalVector::new(0.0, 0.0, 1.5),
            20.0,
            mapper.entity("inlet").await.unwrap(),
        )
        .unwrap();
    builder
        .pressure_outlet("Outlet", 0.0, "Pa", mapper.entity("outlet").await.unwrap())
        .unwrap();
    builder
        .external_wall_heat_flux(
            "Housing",
            HeatFluxMethod::Derived,
            ExternalHeatFluxParams {
                ambient_temperature: Some(25.0),
                heat_transfer_coefficient: Some(10.0),
                ..Default::default()
            },
            mapper.entity("walls").await.unwrap(),
        )
        .unwrap();
    builder.fluid_material(FluidPreset::Air, "Air", Vec::new()).unwrap();
    let conductivity = BTreeMap::from([("Aluminium".to_string(), 237.0), ("FR4".to_string(), 0.3)]);
    builder.solids_from_groups(&solids, &conductivity).unwrap();
    builder
        .surface_data(
            "inlet-outlet",
            SurfaceAggregation::AreaAverage,
            10,
            mapper.entities(&["inlet", "outlet"]).await.unwrap(),
        )
        .unwrap();
    let points = cht_runner::files::parse_point_table("Label X Y Z\nchip 0.01 0.02 0.0\nvent 0.1 0.0 0.05\n").unwrap();
    builder.probe_points("Probes", 10, ProbeSource::Table(points)).unwrap();
    builder.default_field_calculations().unwrap();

    let spec = builder.finalize("Box CHT").unwrap();
    assert_eq!(spec.boundary_conditions().len(), 3);
    assert!(matches!(
        builder.finalize("Box CHT"),
        Err(WorkflowError::ReuseWithoutReset(_))
    ));
    let simulation = builder.submit(session.remote(), &project.id).await.unwrap();
    assert_eq!(remote.primitives().len(), 2);
    println!("✓ Simulation '{}' created with {} probe points", simulation.name, remote.primitives().len());

    // 4. Mesh
    remote.set_mesh_estimate(EstimateResponse::Estimate(Estimation {
        duration: None,
        compute_resource: Some(NumericEstimate {
            value: 12.0,
            interval_min: 10.0,
            interval_max: 14.0,
        }),
        cell_count: None,
    }));
    let mut mesh = session
        .mesh_operation(&project.id, MeshOperationRequest::fluid("Box mesh", &geometry_id, 5.0))
        .await
        .unwrap()
        .for_simulation(&simulation.simulation_id)
        .with_poll_interval(Duration::from_millis(1));
    mesh.check_setup().await.unwrap();
    let operation = mesh.start(true).await.unwrap();
    assert_eq!(mesh.phase(), JobPhase::Finished);
    let stored = remote.simulation_spec(&simulation.simulation_id).unwrap();
    assert_eq!(stored["meshId"].as_str(), operation.mesh_id.as_deref());
    println!("✓ Mesh finished and assigned to the simulation");

    // 5. Run
    remote.set_simulation_estimate(EstimateResponse::Unprocessable);
    let mut run = session
        .simulation_run(&project.id, &simulation.simulation_id)
        .with_poll_interval(Duration::from_millis(1));
    run.check_setup().await.unwrap();
    run.create_run("Run 1").await.unwrap();
    let finished = run.start(true).await.unwrap();
    assert_eq!(finished.status, JobStatus::Finished);
    assert!(run.admission().map(|a| a.fallback).unwrap_or(false));
    println!("✓ Run finished on the fallback runtime budget");

    // 6. Results
    let run_id = finished.run_id.clone();
    remote.set_results(
        &run_id,
        vec![
            artifact(ResultCategory::AreaAverage, "inlet-outlet", Some("T"), "memory://t"),
            artifact(ResultCategory::AreaIntegral, "internal", None, "memory://internal"),
            artifact(ResultCategory::AreaIntegral, "external", None, "memory://external"),
        ],
    );
    remote.set_download("memory://t", b"Time,Inlet,Outlet\n0,20.0,24.5\n".to_vec());
    remote.set_download("memory://internal", b"Time,a,b\n0,1.0,2.0\n1,3.0,4.0\n".to_vec());
    remote.set_download("memory://external", b"Time,c\n0,-1.0\n1,-2.0\n".to_vec());

    let results = session.results(&project.id, &simulation.simulation_id, &run_id);
    let manifest = results.fetch_manifest().await.unwrap();
    let saved = results
        .save_matching(&manifest, ResultCategory::AreaAverage, "inlet-outlet", Some("T"), "temperature.csv")
        .await
        .unwrap();
    assert!(saved.starts_with(results_dir.path()));
    assert!(matches!(
        find_artifact(&manifest, ResultCategory::AreaAverage, "inlet-outlet", Some("p")),
        Err(WorkflowError::ArtifactNotFound { .. })
    ));

    let internal = results
        .download(find_artifact(&manifest, ResultCategory::AreaIntegral, "internal", None).unwrap())
        .await
        .unwrap();
    let external = results
        .download(find_artifact(&manifest, ResultCategory::AreaIntegral, "external", None).unwrap())
        .await
        .unwrap();
    let combined = tabular::write_heat_flow(
        &results_dir.path().join("heat_flow.csv"),
        &String::from_utf8(internal).unwrap(),
        &String::from_utf8(external).unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(combined.len(), 2);
    assert_eq!(combined[1].internal, 7.0);
    assert_eq!(combined[1].external, -2.0);
    println!("✓ Results downloaded and heat flow combined");
}

#[tokio::test]
async fn test_expensive_mesh_is_rejected_before_start() {
    let remote = Arc::new(MemoryRemote::new());
    let project_id = remote.add_project("P");
    let geometry_id = remote.add_geometry(&project_id, "G");
    remote.set_mesh_estimate(EstimateResponse::Estimate(Estimation {
        duration: None,
        compute_resource: Some(NumericEstimate {
            value: 300.0,
            interval_min: 280.0,
            interval_max: 320.0,
        }),
        cell_count: None,
    }));
    let session = Session::with_remote(remote.clone(), AppConfig::default());

    let mut mesh = session
        .mesh_operation(&project_id, MeshOperationRequest::solid("Mesh", &geometry_id, 3.0))
        .await
        .unwrap()
        .with_ceiling(200.0);
    let err = mesh.start(true).await.unwrap_err();

    assert!(matches!(err, WorkflowError::EstimateExceeded { .. }));
    assert_eq!(remote.call_count("start_mesh_operation"), 0);
    assert_eq!(remote.call_count("get_mesh_operation"), 0);
    println!("✓ Over-budget mesh rejected without starting");
}
