use crate::context::EngineContext;
use crate::rendering::{InstanceBatcher, InstanceDrawer};
use crate::scene::{FrameReport, SceneLogic, SimulationScope};
use crate::utils::FrameClock;
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the running [`SimulationScope`] and replaces it on request.
///
/// A replacement always drops the old scope completely, releasing its
/// entities and physics world, before the new scope is created.
pub struct SceneManager {
    ctx: Arc<EngineContext>,
    current: Option<SimulationScope>,
    clock: FrameClock,
}

impl SceneManager {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        SceneManager {
            ctx,
            current: None,
            clock: FrameClock::default(),
        }
    }

    pub fn load_scene(&mut self, logic: impl SceneLogic + 'static) {
        self.load_scene_boxed(Box::new(logic));
    }

    pub fn load_scene_boxed(&mut self, logic: Box<dyn SceneLogic>) {
        self.unload_scene();
        self.current = Some(SimulationScope::new(self.ctx.clone(), logic));
        self.clock = FrameClock::default();
    }

    pub fn unload_scene(&mut self) {
        if let Some(old) = self.current.take() {
            debug!("Releasing scene \"{}\"", old.name());
            drop(old);
        }
    }

    #[inline]
    pub fn scope(&self) -> Option<&SimulationScope> {
        self.current.as_ref()
    }

    #[inline]
    pub fn scope_mut(&mut self) -> Option<&mut SimulationScope> {
        self.current.as_mut()
    }

    #[inline]
    pub fn ctx(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    /// Runs the update half of a frame and performs a requested scene change.
    pub fn update(&mut self) {
        let next = self.current.as_mut().and_then(SimulationScope::update_frame);

        if let Some(next) = next {
            info!("Switching to scene \"{}\"", next.name());
            self.load_scene_boxed(next);
        }
    }

    /// Renders with the wall time since the last render as frame time.
    pub fn render(
        &mut self,
        batcher: &mut InstanceBatcher,
        drawer: &mut dyn InstanceDrawer,
    ) -> Option<FrameReport> {
        let elapsed = self.clock.tick().as_secs_f32();
        self.render_with(elapsed, batcher, drawer)
    }

    pub fn render_with(
        &mut self,
        elapsed: f32,
        batcher: &mut InstanceBatcher,
        drawer: &mut dyn InstanceDrawer,
    ) -> Option<FrameReport> {
        let scope = self.current.as_mut()?;
        Some(scope.render_frame(elapsed, batcher, drawer))
    }

    /// One full frame: update, then render.
    pub fn frame(
        &mut self,
        batcher: &mut InstanceBatcher,
        drawer: &mut dyn InstanceDrawer,
    ) -> Option<FrameReport> {
        self.update();
        self.render(batcher, drawer)
    }
}
