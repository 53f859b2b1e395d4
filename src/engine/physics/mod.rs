mod resources;
mod workers;
mod world;

pub use resources::*;
pub use workers::*;
pub use world::*;
