pub mod common;
pub mod entity;
pub mod mesh;
pub mod resources;
pub mod spec;

pub use common::*;
pub use entity::*;
pub use mesh::*;
pub use resources::*;
pub use spec::*;
