//! Configuration schema and loading.

pub mod loader;
pub mod schema;
