pub mod config;
pub mod error;
pub mod files;
pub mod logic;
pub mod model;
pub mod remote;
pub mod session;

pub use config::AppConfig;
pub use error::{Result, WorkflowError};

// Export controllers and builders
pub use logic::{
    CancelToken, EntityMapper, GeometryImportController, JobPhase, MeshOperationController,
    OnNameCollision, ResolvePolicy, RunResults, SimulationRunController, SpecificationBuilder,
};

// Export all model types
pub use model::*;

// Export remote implementations; MemoryRemote is the in-process fake
pub use remote::{HttpRemote, MemoryRemote, RemoteService};

pub use session::Session;
