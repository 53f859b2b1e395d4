use crate::context::EngineContext;
use crate::core::{Entity, EntityId};
use crate::scene::SceneWorld;
use nalgebra::Vector3;

pub trait Prefab {
    fn prefab_name(&self) -> &'static str;
    fn build(&self, ctx: &EngineContext, position: Vector3<f32>) -> Entity;
    fn spawn(&self, world: &mut SceneWorld, position: Vector3<f32>) -> EntityId {
        let entity = self.build(world.ctx(), position);
        world.add_entity(entity)
    }
}
