#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
pub mod engine;
pub mod utils;

pub use engine::*;

pub use ::nalgebra;
pub use ::rapier3d;
pub use ::tracing;
pub use ::wgpu;
