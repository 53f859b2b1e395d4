//! Entities and the bridge between their logical and simulated state.

mod actor;
mod entity;
mod transform;

pub use actor::*;
pub use entity::*;
pub use transform::*;
