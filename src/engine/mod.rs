pub mod assets;
pub mod config;
pub mod context;
pub mod core;
pub mod physics;
pub mod prefabs;
pub mod rendering;
pub mod scene;

pub use self::config::EngineConfig;
pub use self::context::{EngineContext, EngineError, PauseSignal};
pub use self::scene::{SceneManager, SimulationScope};
