use crate::assets::AssetId;
use crate::context::EngineContext;
use crate::core::{ActorBridge, Entity, EntityLogic, PhysicsEnv};
use crate::prefabs::Prefab;
use nalgebra::Vector3;

/// Gives the entity a body shaped like its own model when it enters a scope.
#[derive(Debug, Copy, Clone)]
pub struct Hitbox {
    pub dynamic: bool,
}

impl EntityLogic for Hitbox {
    fn init(&mut self, bridge: &mut ActorBridge, env: &mut PhysicsEnv) {
        let geometry = env.cook(bridge.asset());
        bridge.attach_physical_body(geometry.as_ref(), self.dynamic, env);
    }
}

/// A model with a matching collision hull.
#[derive(Debug, Copy, Clone)]
pub struct PropPrefab {
    pub asset: AssetId,
    pub dynamic: bool,
    pub scale: f32,
}

impl PropPrefab {
    pub const fn new(asset: AssetId) -> Self {
        PropPrefab {
            asset,
            dynamic: true,
            scale: 1.0,
        }
    }

    pub const fn fixed(asset: AssetId) -> Self {
        PropPrefab {
            asset,
            dynamic: false,
            scale: 1.0,
        }
    }
}

impl Prefab for PropPrefab {
    #[inline]
    fn prefab_name(&self) -> &'static str {
        "Prop"
    }

    fn build(&self, ctx: &EngineContext, position: Vector3<f32>) -> Entity {
        let mut prop = Entity::with_logic(
            position,
            self.asset,
            ctx,
            Hitbox {
                dynamic: self.dynamic,
            },
        );
        prop.bridge.transform.set_uniform_scale(self.scale);
        prop
    }
}
