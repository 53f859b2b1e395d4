//! Visual assets and their identities.
//!
//! Every [`AssetId`] names one model file and, through a fixed table, the
//! [`MaterialId`] its physical footprint is made of. Meshes are resolved through
//! the [`ModelStore`], which never fails: a missing or broken file resolves to a
//! purple unit cube so the object still shows up on screen.

mod ids;
mod loader;
mod mesh;
mod model_store;

pub use ids::*;
pub use loader::*;
pub use mesh::*;
pub use model_store::*;
