//! Per-frame instance batching and the GPU side of drawing it.

mod batcher;
mod gpu;
mod pipeline;

pub use batcher::*;
pub use gpu::*;
pub use pipeline::*;
