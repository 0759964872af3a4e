pub mod http;
pub mod mapping_cache;
pub mod memory;
pub mod traits;

pub use http::HttpRemote;
pub use mapping_cache::{EntityMappingCache, MappedEntities};
pub use memory::{EstimateResponse, MemoryRemote, REPORT_IMAGE};
pub use traits::*;
