use crate::ecs::types::{BodyType, PhysicsBody, Transform};
use anyhow::{bail, Result};
use bevy_ecs::prelude::Entity;
use glam::Vec2;
use rapier2d::geometry::{CollisionEvent, CollisionEventFlags};
use rapier2d::math::Isometry;
use rapier2d::pipeline::{ActiveEvents, EventHandler};
use rapier2d::prelude::{
    CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet, ContactPair, DefaultBroadPhase,
    ImpulseJointSet, IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    QueryPipeline, Real, RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType, SharedShape, Vector,
};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug)]
pub struct PhysicsConfig {
    pub gravity: Vec2,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self { gravity: Vec2::new(0.0, -9.8), velocity_iterations: 8, position_iterations: 3 }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContactPhase {
    Started,
    Stopped,
}

struct ContactCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl ContactCollector {
    fn new() -> Self {
        Self { events: Mutex::new(Vec::new()) }
    }

    fn drain(&self) -> Vec<CollisionEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

struct SimulatorState {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    events: ContactCollector,
    collider_entities: HashMap<ColliderHandle, Entity>,
}

impl SimulatorState {
    fn new(config: &PhysicsConfig) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.num_solver_iterations =
            NonZeroUsize::new(config.velocity_iterations).unwrap_or(NonZeroUsize::MIN);
        integration_parameters.num_internal_pgs_iterations = config.position_iterations.max(1);
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector::new(config.gravity.x, config.gravity.y),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            events: ContactCollector::new(),
            collider_entities: HashMap::new(),
        }
    }

    fn insert_body(&mut self, entity: Entity, transform: &Transform, body: &PhysicsBody) -> RigidBodyHandle {
        let position = transform.translation + body.offset;
        let mut builder = match body.body_type {
            BodyType::Static => RigidBodyBuilder::fixed(),
            BodyType::Dynamic => RigidBodyBuilder::dynamic(),
            BodyType::Kinematic => RigidBodyBuilder::kinematic_position_based(),
        }
        .translation(Vector::new(position.x, position.y))
        .rotation(transform.rotation);
        if body.freeze_rotation {
            builder = builder.lock_rotations();
        }
        let body_handle = self.bodies.insert(builder.build());

        let half = collider_half(transform, body);
        let collider = ColliderBuilder::cuboid(half.x, half.y)
            .density(body.density)
            .friction(body.friction)
            .restitution(body.restitution)
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build();
        let collider_handle = self.colliders.insert_with_parent(collider, body_handle, &mut self.bodies);
        self.collider_entities.insert(collider_handle, entity);
        body_handle
    }

    fn remove_body(&mut self, handle: RigidBodyHandle) {
        let collider_handles: Vec<ColliderHandle> = self
            .bodies
            .get(handle)
            .map(|body| body.colliders().iter().copied().collect())
            .unwrap_or_default();
        for collider in collider_handles {
            self.collider_entities.remove(&collider);
        }
        let _ = self.bodies.remove(
            handle,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn reset_body(&mut self, handle: RigidBodyHandle, transform: &Transform, body: &PhysicsBody) {
        if let Some(rb) = self.bodies.get_mut(handle) {
            let position = transform.translation + body.offset;
            rb.set_position(Isometry::new(Vector::new(position.x, position.y), transform.rotation), true);
        }
    }

    fn update_body(&mut self, handle: RigidBodyHandle, transform: &mut Transform, body: &PhysicsBody) {
        let collider_handle = self.bodies.get(handle).and_then(|rb| rb.colliders().first().copied());
        if let Some(collider_handle) = collider_handle {
            if let Some(collider) = self.colliders.get_mut(collider_handle) {
                let half = collider_half(transform, body);
                collider.set_shape(SharedShape::cuboid(half.x, half.y));
                collider.set_density(body.density);
                collider.set_friction(body.friction);
                collider.set_restitution(body.restitution);
            }
        }
        if let Some(rb) = self.bodies.get_mut(handle) {
            rb.set_body_type(body_type_to_rapier(body.body_type), true);
            let translation = rb.translation();
            transform.translation = Vec2::new(translation.x, translation.y) - body.offset;
            transform.rotation = crate::wrap_angle(rb.rotation().angle());
        }
    }

    fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &self.events,
        );
        self.query_pipeline.update(&self.colliders);
    }
}

fn collider_half(transform: &Transform, body: &PhysicsBody) -> Vec2 {
    (transform.scale * body.size).abs().max(Vec2::splat(1e-4))
}

fn body_type_to_rapier(body_type: BodyType) -> RigidBodyType {
    match body_type {
        BodyType::Static => RigidBodyType::Fixed,
        BodyType::Dynamic => RigidBodyType::Dynamic,
        BodyType::Kinematic => RigidBodyType::KinematicPositionBased,
    }
}

/// Synchronization layer between component data and the rapier simulator.
///
/// State machine: NotStarted -> Running -> NotStarted, driven by the strict
/// [`begin_world`](Self::begin_world) / [`end_world`](Self::end_world) pair.
/// Structural changes raised mid-iteration go through the pending queues and
/// take effect at the next step boundary, before the solver advances; the
/// queues hold entity ids and body handles, never component addresses, since
/// storage may relocate components on structural change.
pub struct PhysicsWorld {
    config: PhysicsConfig,
    sim: Option<SimulatorState>,
    pending_add: Vec<Entity>,
    pending_remove: Vec<RigidBodyHandle>,
}

impl PhysicsWorld {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config, sim: None, pending_add: Vec::new(), pending_remove: Vec::new() }
    }

    pub fn world_exists(&self) -> bool {
        self.sim.is_some()
    }

    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.config.gravity = gravity;
        if let Some(sim) = self.sim.as_mut() {
            sim.gravity = Vector::new(gravity.x, gravity.y);
        }
    }

    pub fn begin_world(&mut self) -> Result<()> {
        if self.sim.is_some() {
            bail!("begin_world called while the physics world is already running");
        }
        self.sim = Some(SimulatorState::new(&self.config));
        Ok(())
    }

    /// Destroys the simulator world and every body in it. Handles still stored
    /// on components become stale and must not be used for simulator access.
    pub fn end_world(&mut self) -> Result<()> {
        if self.sim.is_none() {
            bail!("end_world called while the physics world is not running");
        }
        self.sim = None;
        self.pending_add.clear();
        self.pending_remove.clear();
        Ok(())
    }

    /// Immediately creates a simulator body for `entity` and stores the handle
    /// on the component. Callers iterating a view over physics components must
    /// use [`queue_registration`](Self::queue_registration) instead.
    pub fn register_body(
        &mut self,
        entity: Entity,
        transform: &Transform,
        body: &mut PhysicsBody,
    ) -> Result<()> {
        let Some(sim) = self.sim.as_mut() else {
            bail!("register_body called while the physics world is not running");
        };
        if body.handle.is_some() {
            bail!("physics body for {entity:?} is already registered");
        }
        body.handle = Some(sim.insert_body(entity, transform, body));
        Ok(())
    }

    /// Immediately destroys the simulator body and clears the handle. A body
    /// that is not registered (or whose world has already ended) is a no-op.
    pub fn unregister_body(&mut self, body: &mut PhysicsBody) -> Result<()> {
        let Some(handle) = body.handle.take() else {
            return Ok(());
        };
        if let Some(sim) = self.sim.as_mut() {
            sim.remove_body(handle);
        }
        Ok(())
    }

    /// Queues `entity` for registration at the next step boundary. Entities
    /// that die before the flush are skipped.
    pub fn queue_registration(&mut self, entity: Entity) {
        self.pending_add.push(entity);
    }

    /// Queues the body for removal at the next step boundary. The handle is
    /// taken off the component immediately; the simulator body survives until
    /// the flush.
    pub fn queue_removal(&mut self, body: &mut PhysicsBody) {
        if let Some(handle) = body.handle.take() {
            self.pending_remove.push(handle);
        }
    }

    pub fn take_pending_adds(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.pending_add)
    }

    pub fn take_pending_removes(&mut self) -> Vec<RigidBodyHandle> {
        std::mem::take(&mut self.pending_remove)
    }

    pub fn pending_registrations(&self) -> usize {
        self.pending_add.len()
    }

    pub fn remove_body_handle(&mut self, handle: RigidBodyHandle) {
        if let Some(sim) = self.sim.as_mut() {
            sim.remove_body(handle);
        }
    }

    /// Pushes the authored transform onto the simulator body, overriding
    /// solver-held state. Invoked before the step so that transform edits made
    /// since the last step are not lost.
    pub fn reset_body(&mut self, transform: &Transform, body: &PhysicsBody) {
        if let (Some(sim), Some(handle)) = (self.sim.as_mut(), body.handle) {
            sim.reset_body(handle, transform, body);
        }
    }

    /// Advances the simulator. Pending queues must have been flushed by the
    /// caller; a body queued after a step begins is not visible to contacts
    /// computed during that step.
    pub fn step(&mut self, dt: f32) -> Result<()> {
        let Some(sim) = self.sim.as_mut() else {
            bail!("step called while the physics world is not running");
        };
        if dt > 0.0 {
            sim.step(dt);
        }
        Ok(())
    }

    /// Pushes live data properties into the simulator body, then reads the
    /// resulting pose back into `transform`. The authoritative write path for
    /// transforms of physics-driven entities during run-mode.
    pub fn update_body(&mut self, transform: &mut Transform, body: &PhysicsBody) {
        if let (Some(sim), Some(handle)) = (self.sim.as_mut(), body.handle) {
            sim.update_body(handle, transform, body);
        }
    }

    /// Resolves buffered begin/end contact events to entity pairs through the
    /// collider lookup table. Events with either side unresolved are dropped:
    /// that side was destroyed during the same step.
    pub fn drain_contacts(&mut self) -> Vec<(ContactPhase, Entity, Entity)> {
        let Some(sim) = self.sim.as_mut() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for event in sim.events.drain() {
            let (a, b, flags, phase) = match event {
                CollisionEvent::Started(a, b, flags) => (a, b, flags, ContactPhase::Started),
                CollisionEvent::Stopped(a, b, flags) => (a, b, flags, ContactPhase::Stopped),
            };
            if flags.contains(CollisionEventFlags::SENSOR) {
                continue;
            }
            if let (Some(&entity_a), Some(&entity_b)) =
                (sim.collider_entities.get(&a), sim.collider_entities.get(&b))
            {
                out.push((phase, entity_a, entity_b));
            }
        }
        out
    }

    pub fn body_count(&self) -> usize {
        self.sim.as_ref().map_or(0, |sim| sim.bodies.len())
    }
}
