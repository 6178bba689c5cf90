//! Engine data models: meshes, materials and GPU texture wrappers.

pub mod model;
pub mod texture;
