//! Build configuration: raw option schema, resolution, and file loading.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;
