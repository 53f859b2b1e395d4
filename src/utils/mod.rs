pub mod checks;
pub mod math;
pub mod timestep;

pub use checks::*;
pub use math::*;
pub use timestep::*;
