use crate::assets::AssetId;
use crate::context::EngineContext;
use crate::core::{ActorBridge, PhysicsEnv};
use crate::physics::PhysicsWorld;
use nalgebra::Vector3;
use slotmap::new_key_type;
use std::fmt::{Debug, Formatter};

new_key_type! {
    /// Identifies an entity within its scope.
    pub struct EntityId;
}

/// Per-entity behavior.
///
/// `init` runs once when the entity is added to a scope, before its body is
/// registered, which makes it the place to attach one. `update` runs every
/// frame after the entity pulled its pose.
pub trait EntityLogic {
    fn init(&mut self, _bridge: &mut ActorBridge, _env: &mut PhysicsEnv) {}
    fn update(&mut self, _bridge: &mut ActorBridge, _env: &mut PhysicsEnv) {}
}

/// Logic that does nothing.
#[derive(Debug, Default, Copy, Clone)]
pub struct Inert;

impl EntityLogic for Inert {}

pub struct Entity {
    pub bridge: ActorBridge,
    logic: Box<dyn EntityLogic>,
}

impl Entity {
    /// An inert entity with its model resolved and the configured entity mass.
    pub fn new(position: Vector3<f32>, asset: AssetId, ctx: &EngineContext) -> Self {
        Self::with_logic(position, asset, ctx, Inert)
    }

    pub fn with_logic(
        position: Vector3<f32>,
        asset: AssetId,
        ctx: &EngineContext,
        logic: impl EntityLogic + 'static,
    ) -> Self {
        let mut bridge = ActorBridge::new(position, asset, ctx.config.entity_mass);
        bridge.resolve_model(&ctx.models);

        Entity {
            bridge,
            logic: Box::new(logic),
        }
    }


    pub fn set_logic(&mut self, logic: impl EntityLogic + 'static) {
        self.logic = Box::new(logic);
    }

    pub(crate) fn init(&mut self, env: &mut PhysicsEnv) {
        self.logic.init(&mut self.bridge, env);
    }

    pub(crate) fn update(&mut self, env: &mut PhysicsEnv) {
        self.logic.update(&mut self.bridge, env);
    }

    /// Releases the native body, then the entity itself.
    pub fn destroy(mut self, world: &mut PhysicsWorld) {
        self.bridge.release(world);
    }
}

impl Debug for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}
