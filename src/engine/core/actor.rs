use crate::assets::{AssetId, ModelStore, VisualMesh};
use crate::context::EngineContext;
use crate::core::{EntityId, EntityTransform};
use crate::physics::{
    CollisionGeometry, PhysicsError, PhysicsWorld, SimulatedActor, entity_user_data,
};
use crate::rendering::InstanceBatcher;
use crate::utils::{FiniteExt, compose_world_matrix, is_valid_pose};
use nalgebra::{Matrix4, Vector3};
use rapier3d::prelude::*;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)))]
pub enum BridgeError {
    #[snafu(display("{asset} has no collision geometry to attach"))]
    NoGeometry { asset: AssetId },

    #[snafu(display("No collision shape could be made for {asset}"))]
    NoShape { asset: AssetId },

    #[snafu(display("The entity has no physical body"))]
    NotAttached,

    #[snafu(display("Refusing to hand a non-finite transform to the solver"))]
    NonFinite,

    #[snafu(display("Physics world rejected the operation: {source}"))]
    Physics { source: PhysicsError },
}

/// What an entity hook gets to touch: the scope's world and the shared context.
pub struct PhysicsEnv<'a> {
    pub world: &'a mut PhysicsWorld,
    pub ctx: &'a EngineContext,
}

impl<'a> PhysicsEnv<'a> {
    pub fn new(world: &'a mut PhysicsWorld, ctx: &'a EngineContext) -> Self {
        PhysicsEnv { world, ctx }
    }

    /// Cooked collision geometry of `asset`, if it has any.
    pub fn cook(&self, asset: AssetId) -> Option<Arc<CollisionGeometry>> {
        self.ctx.resources.geometry(asset, &self.ctx.models).ok()
    }
}

/// Ties one simulated body to one renderable instance.
///
/// The bridge owns the logical transform and, once attached, the
/// [`SimulatedActor`]. State is copied between the two explicitly:
/// [`ActorBridge::pull_physics_state`] after a step and
/// [`ActorBridge::push_logical_state`] when the entity is placed by hand.
#[derive(Debug)]
pub struct ActorBridge {
    pub transform: EntityTransform,
    asset: AssetId,
    model: Option<Arc<VisualMesh>>,
    mass: f32,
    actor: Option<SimulatedActor>,
    owner: Option<EntityId>,
    // body was awake at the last pull
    was_awake: bool,
}

impl ActorBridge {
    pub fn new(position: Vector3<f32>, asset: AssetId, mass: f32) -> Self {
        ActorBridge {
            transform: EntityTransform::at(position),
            asset,
            model: None,
            mass,
            actor: None,
            owner: None,
            was_awake: false,
        }
    }

    pub fn resolve_model(&mut self, models: &ModelStore) {
        self.model = Some(models.get(self.asset));
    }


    #[inline]
    pub fn asset(&self) -> AssetId {
        self.asset
    }

    #[inline]
    pub fn model(&self) -> Option<&Arc<VisualMesh>> {
        self.model.as_ref()
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Only affects bodies attached afterwards.
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
    }

    #[inline]
    pub fn actor(&self) -> Option<&SimulatedActor> {
        self.actor.as_ref()
    }

    #[inline]
    pub fn body(&self) -> Option<RigidBodyHandle> {
        self.actor.as_ref().map(SimulatedActor::body)
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.actor.is_some()
    }

    #[inline]
    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Option<EntityId>) {
        self.owner = owner;
    }

    pub fn attach_physical_body(
        &mut self,
        geometry: Option<&Arc<CollisionGeometry>>,
        dynamic: bool,
        env: &mut PhysicsEnv,
    ) -> Option<RigidBodyHandle> {
        match self.try_attach_physical_body(geometry, dynamic, env) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Couldn't attach a physical body: {e}");
                None
            }
        }
    }

    /// Gives the entity a body at its current position with identity orientation.
    ///
    /// A second call on an attached entity returns the existing body. The body is
    /// created disabled; the owning scope enables it when the entity is added.
    pub fn try_attach_physical_body(
        &mut self,
        geometry: Option<&Arc<CollisionGeometry>>,
        dynamic: bool,
        env: &mut PhysicsEnv,
    ) -> Result<RigidBodyHandle, BridgeError> {
        if let Some(actor) = &self.actor {
            debug!("Entity already has body {:?}, keeping it", actor.body());
            return Ok(actor.body());
        }

        let asset = self.asset;
        let geometry = geometry.context(NoGeometryErr { asset })?;

        if !self.transform.position().all_finite() {
            warn!("Entity position is not finite, placing it at the origin");
            self.transform.set_position_vec(Vector3::zeros());
        }
        if !self.mass.is_finite() || self.mass <= 0.0 {
            warn!(
                "Entity mass {} is unusable, substituting {}",
                self.mass, env.ctx.config.default_mass
            );
            self.mass = env.ctx.config.default_mass;
        }

        let material = env.ctx.resources.material(asset.material());
        let shape = env
            .ctx
            .resources
            .scaled_shape(Some(geometry), Some(&material), self.transform.scale())
            .context(NoShapeErr { asset })?;

        let builder = if dynamic {
            RigidBodyBuilder::dynamic()
        } else {
            RigidBodyBuilder::fixed()
        };
        let mut body = builder
            .translation(self.transform.position())
            .linvel(Vector3::zeros())
            .angvel(Vector3::zeros())
            .enabled(false)
            .user_data(entity_user_data(self.owner))
            .build();
        if dynamic {
            body.activation_mut().normalized_linear_threshold = env.world.sleep_threshold();
        }

        let handle = env.world.create_body(body).context(PhysicsErr)?;
        let collider = shape.collider(self.mass, env.world.rest_offset());

        let collider = match env.world.attach_collider(collider, handle) {
            Ok(collider) => collider,
            Err(source) => {
                let orphan = env.world.adopt(handle, ColliderHandle::invalid());
                if let Err(e) = env.world.release_body(orphan) {
                    warn!("Couldn't roll back body {handle:?}: {e}");
                }
                return Err(BridgeError::Physics { source });
            }
        };

        self.transform.set_velocity(Vector3::zeros());
        self.actor = Some(env.world.adopt(handle, collider));

        trace!("Attached body {handle:?} for {asset}");

        Ok(handle)
    }

    /// Copies the body's pose and linear velocity into the logical transform.
    pub fn pull_physics_state(&mut self, world: &PhysicsWorld) {
        let Some(actor) = &self.actor else {
            return;
        };
        if world.is_stepping() {
            warn!("Pulling physics state while a step is in flight. Ignored");
            return;
        }
        let Some(body) = world.body(actor.body()) else {
            return;
        };

        self.transform.set_pose(body.position());
        self.transform.set_velocity(*body.linvel());
    }

    /// Pulls while the body moves, and once more on the frame it falls asleep
    /// so the logical state picks up the velocity the solver zeroed.
    ///
    /// Returns whether a pull happened.
    pub fn pull_if_active(&mut self, world: &PhysicsWorld) -> bool {
        let Some(body) = self.body() else {
            return false;
        };

        let awake = world.is_awake(body);
        let pull = awake || self.was_awake;
        if pull {
            self.pull_physics_state(world);
        }
        self.was_awake = awake;

        pull
    }

    pub fn push_logical_state(&mut self, world: &mut PhysicsWorld) {
        if let Err(e) = self.try_push_logical_state(world) {
            warn!("Couldn't push logical state: {e}");
        }
    }

    /// Writes the logical pose into the body and wakes it up. Dynamic bodies also
    /// take the logical velocity.
    pub fn try_push_logical_state(&mut self, world: &mut PhysicsWorld) -> Result<(), BridgeError> {
        let body = self.body().context(NotAttachedErr)?;
        let pose = self.transform.pose();
        let velocity = self.transform.velocity();

        ensure!(is_valid_pose(&pose) && velocity.all_finite(), NonFiniteErr);

        let body = world.try_body_mut(body).context(PhysicsErr)?;
        body.set_position(pose, true);
        if body.is_dynamic() {
            body.set_linvel(velocity, true);
        }

        Ok(())
    }

    /// Model matrix from the body pose if there is a body, else from the logical
    /// transform. Scale always comes from the logical transform.
    pub fn world_matrix(&self, world: &PhysicsWorld) -> Matrix4<f32> {
        let body = self.body().and_then(|h| world.try_body(h).ok());

        match body {
            Some(body) => compose_world_matrix(
                body.translation(),
                body.rotation(),
                &self.transform.scale(),
            ),
            None => self.transform.world_matrix(),
        }
    }

    pub fn submit_for_render(&self, world: &PhysicsWorld, batcher: &mut InstanceBatcher) {
        let Some(model) = &self.model else {
            return;
        };

        batcher.submit(self.asset, model, self.world_matrix(world));
    }

    /// Releases the native body. Does nothing when there is none.
    pub fn release(&mut self, world: &mut PhysicsWorld) {
        let Some(actor) = self.actor.take() else {
            return;
        };
        self.was_awake = false;

        if let Err(e) = world.release_body(actor) {
            warn!("Releasing a physical body failed: {e}");
        }
    }
}
