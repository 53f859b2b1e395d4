use crate::context::EngineContext;
use crate::core::{Entity, EntityId, PhysicsEnv};
use crate::physics::{PhysicsWorld, SimulatedActor};
use crate::rendering::{InstanceBatcher, InstanceDrawer};
use crate::utils::{StepClamp, is_valid_pose};
use nalgebra::Vector3;
use rapier3d::prelude::RigidBodyHandle;
use slotmap::HopSlotMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScopeState {
    Uninitialized,
    Active,
    /// A replacement was requested. The scope takes no more frames.
    Retiring,
    Released,
}

/// Scene specific behavior of a scope.
pub trait SceneLogic {
    fn name(&self) -> &str {
        "Scene"
    }

    /// Runs once, right after the scope became active.
    fn init(&mut self, _world: &mut SceneWorld) {}

    /// Runs every frame after the physics results were fetched.
    fn tick(&mut self, _world: &mut SceneWorld) {}
}

/// Numbers of one rendered frame.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct FrameReport {
    /// Step that was handed to the solver for the next frame.
    pub step: f32,
    pub dispatched: bool,
    pub draw_calls: usize,
    pub instances: usize,
}

/// The data of a scope: its physics world, ground and entities.
///
/// Dropping it tears things down in dependency order. Entities release their
/// bodies first, then the ground is released and the world goes last.
pub struct SceneWorld {
    entities: HopSlotMap<EntityId, Entity>,
    order: Vec<EntityId>,
    ground: Option<SimulatedActor>,
    pending: Option<Box<dyn SceneLogic>>,
    state: ScopeState,
    // must stay below everything holding native handles
    physics: PhysicsWorld,
    ctx: Arc<EngineContext>,
}

impl SceneWorld {
    fn new(ctx: Arc<EngineContext>) -> Self {
        let physics = PhysicsWorld::new(&ctx.config, ctx.workers.clone(), ctx.physics_observer());

        let mut world = SceneWorld {
            entities: HopSlotMap::with_key(),
            order: Vec::new(),
            ground: None,
            pending: None,
            state: ScopeState::Uninitialized,
            physics,
            ctx,
        };

        let material = world.ctx.resources.material(world.ctx.config.ground_material);
        match world.physics.create_ground(&material) {
            Ok(ground) => world.ground = Some(ground),
            Err(e) => error!("Couldn't create the ground plane: {e}"),
        }

        world.state = ScopeState::Active;
        world
    }

    #[inline]
    pub fn ctx(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    #[inline]
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Adds an entity and runs its init hook.
    ///
    /// If the hook attached a body and the entity's pose is usable, the body is
    /// registered with the solver and gets the logical transform pushed into it.
    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = self.entities.insert(entity);
        self.order.push(id);

        let Some(entity) = self.entities.get_mut(id) else {
            return id;
        };

        entity.bridge.set_owner(Some(id));
        entity.init(&mut PhysicsEnv::new(&mut self.physics, &self.ctx));

        let Some(body) = entity.bridge.body() else {
            return id;
        };

        if !is_valid_pose(&entity.bridge.transform.pose()) {
            warn!("Entity {id:?} has an invalid pose. Its body {body:?} stays disabled");
            return id;
        }

        match self.physics.register_body(body) {
            Ok(()) => entity.bridge.push_logical_state(&mut self.physics),
            Err(e) => warn!("Couldn't register body of entity {id:?}: {e}"),
        }

        id
    }

    /// Detaches an entity. Its body stays in the world until the caller
    /// destroys the entity with [`Entity::destroy`].
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(id)?;
        self.order.retain(|other| *other != id);
        Some(entity)
    }

    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        match self.remove_entity(id) {
            Some(entity) => {
                entity.destroy(&mut self.physics);
                true
            }
            None => false,
        }
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.entities.get(*id).map(|e| (*id, e)))
    }

    pub fn entity_count(&self) -> usize {
        self.order.len()
    }

    pub fn entity_of_body(&self, body: RigidBodyHandle) -> Option<EntityId> {
        self.physics
            .owner_of(body)
            .filter(|id| self.entities.contains_key(*id))
    }

    /// Moves an entity by hand. Body and logical transform end up in the same place.
    pub fn teleport(&mut self, id: EntityId, position: Vector3<f32>) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };

        entity.bridge.transform.set_position_vec(position);
        if entity.bridge.is_attached() {
            entity.bridge.push_logical_state(&mut self.physics);
        }
        true
    }

    #[inline]
    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    #[inline]
    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    #[inline]
    pub fn ground(&self) -> Option<&SimulatedActor> {
        self.ground.as_ref()
    }

    /// Asks the manager to replace this scene at the end of the frame.
    pub fn load_scene(&mut self, next: impl SceneLogic + 'static) {
        self.load_scene_boxed(Box::new(next));
    }

    pub fn load_scene_boxed(&mut self, next: Box<dyn SceneLogic>) {
        if self.pending.is_some() {
            debug!("Replacing an already pending scene change");
        }
        self.pending = Some(next);
    }

    #[inline]
    pub fn has_pending_scene(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for SceneWorld {
    fn drop(&mut self) {
        for id in std::mem::take(&mut self.order) {
            if let Some(entity) = self.entities.remove(id) {
                entity.destroy(&mut self.physics);
            }
        }
        for (_, entity) in self.entities.drain() {
            entity.destroy(&mut self.physics);
        }

        if let Some(ground) = self.ground.take()
            && let Err(e) = self.physics.release_body(ground)
        {
            warn!("Releasing the ground failed: {e}");
        }

        self.state = ScopeState::Released;
        // the physics world is released by the field drop that follows
    }
}

/// One running scene: its logic and everything it simulates.
pub struct SimulationScope {
    logic: Box<dyn SceneLogic>,
    world: SceneWorld,
    clamp: StepClamp,
}

impl SimulationScope {
    pub fn new(ctx: Arc<EngineContext>, logic: Box<dyn SceneLogic>) -> Self {
        let clamp = StepClamp::new(ctx.config.fixed_step, ctx.config.max_frame_time);
        let mut scope = SimulationScope {
            logic,
            world: SceneWorld::new(ctx),
            clamp,
        };

        info!("Scene \"{}\" is active", scope.logic.name());
        scope.logic.init(&mut scope.world);

        scope
    }

    #[inline]
    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    #[inline]
    pub fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.world
    }

    #[inline]
    pub fn state(&self) -> ScopeState {
        self.world.state
    }

    pub fn name(&self) -> &str {
        self.logic.name()
    }

    /// Submits every entity, flushes the batch, then starts the next step.
    ///
    /// The step is `elapsed` unless the simulation is paused or `elapsed` is
    /// not a sane frame time, in which case the fixed step is used.
    pub fn render_frame(
        &mut self,
        elapsed: f32,
        batcher: &mut InstanceBatcher,
        drawer: &mut dyn InstanceDrawer,
    ) -> FrameReport {
        if self.world.state != ScopeState::Active {
            return FrameReport::default();
        }

        let world = &mut self.world;
        for id in &world.order {
            if let Some(entity) = world.entities.get(*id) {
                entity.bridge.submit_for_render(&world.physics, batcher);
            }
        }
        let flushed = batcher.flush(drawer);

        let step = self
            .clamp
            .resolve(elapsed, world.ctx.pause.is_paused());
        let dispatched = match world.physics.simulate(step) {
            Ok(()) => true,
            Err(e) => {
                warn!("Simulation step rejected: {e}");
                false
            }
        };

        FrameReport {
            step,
            dispatched,
            draw_calls: flushed.draw_calls,
            instances: flushed.instances,
        }
    }

    /// Waits for the step in flight, ticks the scene and updates every entity.
    ///
    /// Returns the replacement scene if one was requested during this frame.
    pub fn update_frame(&mut self) -> Option<Box<dyn SceneLogic>> {
        if self.world.state != ScopeState::Active {
            return None;
        }

        if let Err(e) = self.world.physics.fetch_results() {
            error!("Fetching simulation results failed: {e}");
        }

        self.logic.tick(&mut self.world);

        let world = &mut self.world;
        for i in 0..world.order.len() {
            let id = world.order[i];
            let Some(entity) = world.entities.get_mut(id) else {
                continue;
            };

            entity.bridge.pull_if_active(&world.physics);
            entity.update(&mut PhysicsEnv::new(&mut world.physics, &world.ctx));
        }

        let next = world.pending.take()?;
        world.state = ScopeState::Retiring;
        info!("Scene \"{}\" is retiring", self.logic.name());

        Some(next)
    }
}
