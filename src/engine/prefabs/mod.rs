//! Prefabricated entities that can be easily spawned into a [`SceneWorld`](crate::scene::SceneWorld).

pub mod grid;
pub mod prefab;
pub mod prop;

pub use prefab::Prefab;

pub use grid::PropGrid;
pub use prop::{Hitbox, PropPrefab};
