//! Scenes own a physics world and the entities living in it.
//!
//! A [`SimulationScope`] is one running scene. The [`SceneManager`] drives the
//! frame loop and swaps scopes when a scene asks for a replacement.

mod manager;
mod scope;

pub use manager::*;
pub use scope::*;
