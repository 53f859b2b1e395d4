//! A rapier world that steps on the [`StepWorkers`] pool.
//!
//! The world's state is either resident or in flight. While a step runs on a
//! worker the state is not owned by the [`PhysicsWorld`] at all, so nothing can
//! read a pose that is still being written. [`PhysicsWorld::fetch_results`]
//! blocks until the state is back.

use crate::config::EngineConfig;
use crate::core::EntityId;
use crate::physics::{PhysicsMaterial, StepJob, StepWorkers};
use crossbeam_channel::{Receiver, Sender};
use nalgebra::Vector3;
use rapier3d::prelude::*;
use slotmap::{Key, KeyData};
use snafu::Snafu;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

const EARTH_GRAVITY: f32 = 9.81;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)))]
pub enum PhysicsError {
    #[snafu(display("A simulation step is still in flight"))]
    StepInFlight,

    #[snafu(display("The physics worker running the step was lost"))]
    WorkerLost,

    #[snafu(display("The rigid body {handle:?} does not exist in this world"))]
    UnknownBody { handle: RigidBodyHandle },

    #[snafu(display("The physics world is no longer available"))]
    WorldUnavailable,
}

/// Lifecycle notifications for whoever wants to observe native resource usage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PhysicsEvent {
    WorldCreated,
    BodyCreated(RigidBodyHandle),
    BodyRegistered(RigidBodyHandle),
    BodyReleased(RigidBodyHandle),
    WorldReleased,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PhysicsStats {
    pub bodies_created: usize,
    pub bodies_registered: usize,
    pub bodies_released: usize,
    pub steps_dispatched: usize,
    pub steps_completed: usize,
}

/// Everything rapier needs to advance one step.
pub struct PhysicsState {
    pub gravity: Vector3<f32>,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: BroadPhaseBvh,
    pub narrow_phase: NarrowPhase,
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
}

impl Default for PhysicsState {
    fn default() -> Self {
        PhysicsState {
            gravity: Vector3::new(0.0, -EARTH_GRAVITY, 0.0),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        }
    }
}

impl PhysicsState {
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut state = PhysicsState {
            gravity: config.gravity,
            ..PhysicsState::default()
        };
        state.integration_parameters.dt = config.fixed_step;
        // with the default length unit of 1 this is the contact offset in meters
        state.integration_parameters.normalized_prediction_distance = config.contact_offset;
        state
    }

    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    fn remove_body(&mut self, handle: RigidBodyHandle) -> Option<RigidBody> {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        )
    }
}

/// A native body owned by exactly one high level object.
///
/// There is no way to clone an actor, and the only way to get rid of one
/// cleanly is [`PhysicsWorld::release_body`], which consumes it. An actor that
/// is dropped without being released leaves its body in the world and says so.
#[derive(Debug)]
pub struct SimulatedActor {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    dynamic: bool,
    released: bool,
}

impl SimulatedActor {
    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }
}

impl Drop for SimulatedActor {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Simulated actor with body {:?} was dropped without being released. The native body leaks",
                self.body
            );
        }
    }
}

pub struct PhysicsWorld {
    state: Option<Box<PhysicsState>>,
    in_flight: Option<Receiver<Box<PhysicsState>>>,
    workers: Arc<StepWorkers>,
    observer: Option<Sender<PhysicsEvent>>,
    stats: PhysicsStats,
    last_step: Option<f32>,
    sleep_threshold: f32,
    rest_offset: f32,
}

impl PhysicsWorld {
    pub fn new(
        config: &EngineConfig,
        workers: Arc<StepWorkers>,
        observer: Option<Sender<PhysicsEvent>>,
    ) -> Self {
        let world = PhysicsWorld {
            state: Some(Box::new(PhysicsState::from_config(config))),
            in_flight: None,
            workers,
            observer,
            stats: PhysicsStats::default(),
            last_step: None,
            sleep_threshold: config.sleep_threshold,
            rest_offset: config.rest_offset,
        };

        debug!("Physics world created");
        world.emit(PhysicsEvent::WorldCreated);

        world
    }

    fn emit(&self, event: PhysicsEvent) {
        if let Some(observer) = &self.observer
            && observer.send(event).is_err()
        {
            trace!("Physics observer hung up, dropping {event:?}");
        }
    }

    /// Starts advancing the world by `dt` on a worker and returns immediately.
    pub fn simulate(&mut self, dt: f32) -> Result<(), PhysicsError> {
        if self.in_flight.is_some() {
            return StepInFlightErr.fail();
        }
        let Some(state) = self.state.take() else {
            return WorldUnavailableErr.fail();
        };

        let (reply, result) = crossbeam_channel::bounded(1);
        let job = StepJob { state, dt, reply };

        if let Err(job) = self.workers.dispatch(job) {
            self.state = Some(job.state);
            return WorkerLostErr.fail();
        }

        self.in_flight = Some(result);
        self.last_step = Some(dt);
        self.stats.steps_dispatched += 1;

        Ok(())
    }

    /// Blocks until the step in flight is done. Returns whether there was one.
    pub fn fetch_results(&mut self) -> Result<bool, PhysicsError> {
        let Some(result) = self.in_flight.take() else {
            return Ok(false);
        };

        match result.recv() {
            Ok(state) => {
                self.state = Some(state);
                self.stats.steps_completed += 1;
                Ok(true)
            }
            Err(_) => {
                error!("Physics step never came back. The world state is gone");
                WorkerLostErr.fail()
            }
        }
    }

    #[inline]
    pub fn is_stepping(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> Result<&PhysicsState, PhysicsError> {
        if self.is_stepping() {
            return StepInFlightErr.fail();
        }
        self.state.as_deref().ok_or(PhysicsError::WorldUnavailable)
    }

    pub fn state_mut(&mut self) -> Result<&mut PhysicsState, PhysicsError> {
        if self.is_stepping() {
            return StepInFlightErr.fail();
        }
        self.state.as_deref_mut().ok_or(PhysicsError::WorldUnavailable)
    }

    pub fn try_body(&self, handle: RigidBodyHandle) -> Result<&RigidBody, PhysicsError> {
        self.state()?
            .rigid_body_set
            .get(handle)
            .ok_or(PhysicsError::UnknownBody { handle })
    }

    pub fn try_body_mut(&mut self, handle: RigidBodyHandle) -> Result<&mut RigidBody, PhysicsError> {
        self.state_mut()?
            .rigid_body_set
            .get_mut(handle)
            .ok_or(PhysicsError::UnknownBody { handle })
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.try_body(handle)
            .inspect_err(|e| warn!("Cannot access body {handle:?}: {e}"))
            .ok()
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        match self.try_body_mut(handle) {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("Cannot access body {handle:?}: {e}");
                None
            }
        }
    }

    /// Inserts a body and returns its handle. The body stays as built; callers
    /// create it disabled and enable it through [`PhysicsWorld::register_body`].
    pub fn create_body(&mut self, body: RigidBody) -> Result<RigidBodyHandle, PhysicsError> {
        let handle = self.state_mut()?.rigid_body_set.insert(body);

        self.stats.bodies_created += 1;
        trace!("Created body {handle:?}");
        self.emit(PhysicsEvent::BodyCreated(handle));

        Ok(handle)
    }

    pub fn attach_collider(
        &mut self,
        collider: Collider,
        body: RigidBodyHandle,
    ) -> Result<ColliderHandle, PhysicsError> {
        let state = self.state_mut()?;
        if !state.rigid_body_set.contains(body) {
            return UnknownBodyErr { handle: body }.fail();
        }

        Ok(state
            .collider_set
            .insert_with_parent(collider, body, &mut state.rigid_body_set))
    }

    /// Wraps a body and its collider into an actor the caller owns.
    pub fn adopt(&self, body: RigidBodyHandle, collider: ColliderHandle) -> SimulatedActor {
        let dynamic = self
            .state
            .as_ref()
            .and_then(|s| s.rigid_body_set.get(body))
            .is_some_and(RigidBody::is_dynamic);

        SimulatedActor {
            body,
            collider,
            dynamic,
            released: false,
        }
    }

    /// Lets the solver see a body that was created disabled.
    pub fn register_body(&mut self, handle: RigidBodyHandle) -> Result<(), PhysicsError> {
        let body = self.try_body_mut(handle)?;
        body.set_enabled(true);
        body.wake_up(true);

        self.stats.bodies_registered += 1;
        self.emit(PhysicsEvent::BodyRegistered(handle));

        Ok(())
    }

    /// Removes the actor's body and collider from the world.
    ///
    /// Waits for a step in flight first. The actor counts as released even if the
    /// world is gone, since its body went with it.
    pub fn release_body(&mut self, mut actor: SimulatedActor) -> Result<(), PhysicsError> {
        actor.released = true;

        if self.is_stepping() {
            self.fetch_results()?;
        }

        let removed = self.state_mut()?.remove_body(actor.body);
        if removed.is_none() {
            return UnknownBodyErr { handle: actor.body }.fail();
        }

        self.stats.bodies_released += 1;
        trace!("Released body {:?}", actor.body);
        self.emit(PhysicsEvent::BodyReleased(actor.body));

        Ok(())
    }

    /// Enabled, dynamic and not asleep. Only those bodies move during a step.
    pub fn is_awake(&self, handle: RigidBodyHandle) -> bool {
        self.state
            .as_ref()
            .filter(|_| !self.is_stepping())
            .and_then(|s| s.rigid_body_set.get(handle))
            .is_some_and(|b| b.is_enabled() && b.is_dynamic() && !b.is_sleeping())
    }

    /// Resolves the entity a body was created for.
    pub fn owner_of(&self, handle: RigidBodyHandle) -> Option<EntityId> {
        let body = self.state.as_ref()?.rigid_body_set.get(handle)?;
        entity_from_user_data(body.user_data)
    }

    /// Adds the static ground: an infinite plane through the origin facing +y.
    pub fn create_ground(
        &mut self,
        material: &PhysicsMaterial,
    ) -> Result<SimulatedActor, PhysicsError> {
        let body = RigidBodyBuilder::fixed().build();
        let collider = ColliderBuilder::halfspace(Vector3::y_axis())
            .friction(material.friction)
            .restitution(material.restitution)
            .contact_skin(self.rest_offset)
            .build();

        let body = self.create_body(body)?;
        let collider = self.attach_collider(collider, body)?;
        self.register_body(body)?;

        Ok(self.adopt(body, collider))
    }

    pub fn sleep_threshold(&self) -> f32 {
        self.sleep_threshold
    }

    pub fn rest_offset(&self) -> f32 {
        self.rest_offset
    }

    pub fn stats(&self) -> PhysicsStats {
        self.stats
    }

    pub fn last_step(&self) -> Option<f32> {
        self.last_step
    }

    pub fn body_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.rigid_body_set.len())
    }
}

pub fn entity_user_data(owner: Option<EntityId>) -> u128 {
    owner.map_or(0, |id| id.data().as_ffi() as u128)
}

pub fn entity_from_user_data(user_data: u128) -> Option<EntityId> {
    // occupied slot map keys always have an odd version, so a valid key is never 0
    (user_data != 0).then(|| KeyData::from_ffi(user_data as u64).into())
}

impl Drop for PhysicsWorld {
    fn drop(&mut self) {
        if self.is_stepping()
            && let Err(e) = self.fetch_results()
        {
            warn!("Step in flight during world release failed: {e}");
        }

        let leftover = self.body_count();
        if leftover > 0 {
            warn!("Physics world released with {leftover} bodies still in it");
        }

        self.state = None;
        debug!("Physics world released");
        self.emit(PhysicsEvent::WorldReleased);
    }
}
