//! The start-up context every subsystem is handed explicitly.

use crate::assets::{AssetLoader, ModelStore, ObjAssetLoader};
use crate::config::EngineConfig;
use crate::physics::{PhysicsEvent, ResourceCache, StepWorkers};
use crossbeam_channel::{Receiver, Sender};
use snafu::{ResultExt, Snafu};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub(crate)))]
pub enum EngineError {
    #[snafu(display("Invalid engine configuration: {reason}"))]
    InvalidConfig { reason: String },

    #[snafu(display("Could not spawn the physics workers: {source}"))]
    WorkerSpawn { source: std::io::Error },
}

/// Flag the window layer raises while the user drags or resizes the window.
///
/// The simulation only reads it. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct PauseSignal(Arc<AtomicBool>);

impl PauseSignal {
    pub fn set(&self, paused: bool) {
        self.0.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Shared systems, created once and passed by reference to whoever needs them.
pub struct EngineContext {
    pub config: EngineConfig,
    pub models: ModelStore,
    pub resources: ResourceCache,
    pub workers: Arc<StepWorkers>,
    pub pause: PauseSignal,
    physics_observer: Option<Sender<PhysicsEvent>>,
}

impl EngineContext {
    pub fn new(
        config: EngineConfig,
        loader: Box<dyn AssetLoader>,
    ) -> Result<Arc<Self>, EngineError> {
        Self::build(config, loader, None)
    }

    /// Loads models as OBJ files from the configured asset root.
    pub fn with_obj_assets(config: EngineConfig) -> Result<Arc<Self>, EngineError> {
        let loader = Box::new(ObjAssetLoader::new(config.asset_root.clone()));
        Self::new(config, loader)
    }

    /// Like [`EngineContext::new`], but every physics world created from this
    /// context reports its lifecycle on the returned channel.
    pub fn with_observer(
        config: EngineConfig,
        loader: Box<dyn AssetLoader>,
    ) -> Result<(Arc<Self>, Receiver<PhysicsEvent>), EngineError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let ctx = Self::build(config, loader, Some(tx))?;
        Ok((ctx, rx))
    }

    fn build(
        config: EngineConfig,
        loader: Box<dyn AssetLoader>,
        physics_observer: Option<Sender<PhysicsEvent>>,
    ) -> Result<Arc<Self>, EngineError> {
        config.validate()?;

        let workers = StepWorkers::spawn(config.worker_threads).context(WorkerSpawnErr)?;

        info!(
            "Engine context ready with {} physics workers",
            workers.thread_count()
        );

        Ok(Arc::new(EngineContext {
            models: ModelStore::new(loader),
            resources: ResourceCache::new(config.weld_tolerance),
            workers: Arc::new(workers),
            pause: PauseSignal::default(),
            physics_observer,
            config,
        }))
    }

    pub fn physics_observer(&self) -> Option<Sender<PhysicsEvent>> {
        self.physics_observer.clone()
    }
}
