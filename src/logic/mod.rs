pub mod entity_mapping;
pub mod estimate;
pub mod geometry_import;
pub mod locate;
pub mod mesh_operation;
pub mod polling;
pub mod results;
pub mod simulation_run;
pub mod spec_builder;
pub mod tabular;

pub use entity_mapping::{group_by_attribute, group_by_palette, parse_rgb, EntityMapper};
pub use estimate::{admit, enforce_setup_check, parse_iso8601_duration, Admission};
pub use geometry_import::{GeometryImportController, OnNameCollision};
pub use locate::{ensure_project, resolve_by_name, ResolvePolicy};
pub use mesh_operation::{assign_mesh, MeshOperationController};
pub use polling::{poll_until_terminal, CancelToken, JobPhase, PollPolicy};
pub use results::{find_artifact, RunResults};
pub use simulation_run::SimulationRunController;
pub use spec_builder::{
    BuilderState, ExternalHeatFluxParams, HeatFluxMethod, PendingProbe, ProbeSource, SpecificationBuilder,
};
pub use tabular::{combine_series, process_data, read_csv, Table};
