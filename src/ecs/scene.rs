use crate::ecs::physics::{ContactPhase, PhysicsConfig, PhysicsWorld};
use crate::ecs::systems::{sys_update_emitters, sys_update_particles, TimeDelta};
use crate::ecs::types::{
    Camera, CollisionCallback, Contact, Identity, Particle, ParticleEmitter, PhysicsBody, SceneUuid, Sprite,
    Transform,
};
use anyhow::{bail, Result};
use bevy_ecs::prelude::{Component, Entity, Schedule, With, World};
use bevy_ecs::schedule::IntoSystemConfigs;
use log::{debug, warn};
use smallvec::SmallVec;
use std::collections::HashMap;
use uuid::Uuid;

/// Capability table for per-type structural-change hooks. The defaults are
/// no-ops; only [`PhysicsBody`] overrides them to keep the simulator body list
/// in sync with component storage. `duplicated` produces the value copied into
/// a duplicate entity or scene copy.
pub trait SceneComponent: Component + Clone {
    fn on_add(_scene: &mut Scene, _entity: Entity) {}
    fn on_remove(_scene: &mut Scene, _entity: Entity) {}
    fn duplicated(&self) -> Self {
        self.clone()
    }
}

impl SceneComponent for SceneUuid {}
impl SceneComponent for Identity {}
impl SceneComponent for Transform {}
impl SceneComponent for Sprite {}
impl SceneComponent for Camera {}
impl SceneComponent for ParticleEmitter {}

impl SceneComponent for PhysicsBody {
    fn on_add(scene: &mut Scene, entity: Entity) {
        if !scene.physics.world_exists() {
            return;
        }
        let Some(transform) = scene.world.get::<Transform>(entity).copied() else {
            warn!("physics body added to {entity:?} without a transform; skipping registration");
            return;
        };
        let Some(mut body) = scene.world.get_mut::<PhysicsBody>(entity) else {
            return;
        };
        if let Err(err) = scene.physics.register_body(entity, &transform, &mut body) {
            warn!("failed to register physics body for {entity:?}: {err:#}");
        }
    }

    fn on_remove(scene: &mut Scene, entity: Entity) {
        let Some(mut body) = scene.world.get_mut::<PhysicsBody>(entity) else {
            return;
        };
        if let Err(err) = scene.physics.unregister_body(&mut body) {
            warn!("failed to unregister physics body for {entity:?}: {err:#}");
        }
    }

    fn duplicated(&self) -> Self {
        let mut copy = self.clone();
        copy.handle = None;
        copy
    }
}

/// A live scene: component storage, the uuid index over it, and one physics
/// synchronization layer. Entities are created and destroyed through the scene
/// for its whole lifetime so the three stay consistent.
pub struct Scene {
    pub name: String,
    pub world: World,
    uuid_index: HashMap<Uuid, Entity>,
    physics: PhysicsWorld,
    schedule: Schedule,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        let mut world = World::new();
        world.insert_resource(TimeDelta(0.0));
        let mut schedule = Schedule::default();
        schedule.add_systems((sys_update_emitters, sys_update_particles).chain());
        Self {
            name: name.into(),
            world,
            uuid_index: HashMap::new(),
            physics: PhysicsWorld::new(PhysicsConfig::default()),
            schedule,
        }
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn set_gravity(&mut self, gravity: glam::Vec2) {
        self.physics.set_gravity(gravity);
    }

    /// Number of live scene entities (transient particles excluded).
    pub fn entity_count(&self) -> usize {
        self.uuid_index.len()
    }

    pub fn uuid_of(&self, entity: Entity) -> Option<Uuid> {
        self.world.get::<SceneUuid>(entity).map(|uuid| uuid.0)
    }

    // ---------- Entity lifecycle ----------

    pub fn create_entity(&mut self) -> Entity {
        self.create_entity_named("Entity")
    }

    pub fn create_entity_named(&mut self, name: &str) -> Entity {
        // Mint the uuid first, then index it together with the fresh id.
        let uuid = Uuid::new_v4();
        let entity = self.world.spawn((SceneUuid(uuid), Identity::new(name), Transform::default())).id();
        self.uuid_index.insert(uuid, entity);
        entity
    }

    /// Persistence reconstruction primitive: spawn an entity under a known
    /// uuid. The index stays bijective, so a duplicate uuid is rejected.
    pub fn create_entity_with_uuid(&mut self, uuid: Uuid, name: &str) -> Result<Entity> {
        if self.uuid_index.contains_key(&uuid) {
            bail!("an entity with uuid {uuid} is already alive in this scene");
        }
        let entity = self.world.spawn((SceneUuid(uuid), Identity::new(name), Transform::default())).id();
        self.uuid_index.insert(uuid, entity);
        Ok(entity)
    }

    /// Destroys an entity and every component on it. The uuid leaves the index
    /// before anything else happens, and the physics body (if any) unregisters
    /// through its remove hook before the id is released. Destroying an entity
    /// that is not alive is a precondition violation, not a silent no-op.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        if self.world.get_entity(entity).is_err() {
            bail!("destroy_entity called on an entity that is not alive: {entity:?}");
        }
        if let Some(uuid) = self.uuid_of(entity) {
            self.uuid_index.remove(&uuid);
        }
        self.remove_if_present::<SceneUuid>(entity);
        self.remove_if_present::<Identity>(entity);
        self.remove_if_present::<Transform>(entity);
        self.remove_if_present::<Sprite>(entity);
        self.remove_if_present::<Camera>(entity);
        self.remove_if_present::<ParticleEmitter>(entity);
        self.remove_if_present::<PhysicsBody>(entity);
        self.world.despawn(entity);
        Ok(())
    }

    /// Creates an entity with a fresh uuid and a value copy of every other
    /// component present on `src`. A copied physics body arrives through the
    /// uniform add hook, so registration (when the world is running) follows
    /// the same path as any other add.
    pub fn duplicate_entity(&mut self, src: Entity) -> Result<Entity> {
        if self.world.get_entity(src).is_err() {
            bail!("duplicate_entity called on an entity that is not alive: {src:?}");
        }
        let dst = self.create_entity();
        self.copy_if_present::<Identity>(src, dst)?;
        self.copy_if_present::<Transform>(src, dst)?;
        self.copy_if_present::<Sprite>(src, dst)?;
        self.copy_if_present::<Camera>(src, dst)?;
        self.copy_if_present::<ParticleEmitter>(src, dst)?;
        self.copy_if_present::<PhysicsBody>(src, dst)?;
        Ok(dst)
    }

    /// Produces an independent deep copy of `source`: same name, fresh uuid
    /// per entity, value copy of every component. No physics registration
    /// happens; the copy's world does not exist until its runtime starts.
    /// Transient particles are not part of the copy.
    pub fn copy_scene(source: &Scene) -> Result<Scene> {
        let mut dest = Scene::new(source.name.clone());
        dest.physics.set_gravity(source.physics.gravity());
        for src in source.world.iter_entities() {
            if src.get::<SceneUuid>().is_none() {
                continue;
            }
            let name = src.get::<Identity>().map(|i| i.name.clone()).unwrap_or_else(|| "Entity".to_string());
            let dst = dest.create_entity_named(&name);
            if let Some(transform) = src.get::<Transform>() {
                if let Some(mut slot) = dest.world.get_mut::<Transform>(dst) {
                    *slot = *transform;
                }
            }
            if let Some(sprite) = src.get::<Sprite>() {
                dest.add_component(dst, sprite.duplicated())?;
            }
            if let Some(camera) = src.get::<Camera>() {
                dest.add_component(dst, camera.duplicated())?;
            }
            if let Some(emitter) = src.get::<ParticleEmitter>() {
                dest.add_component(dst, emitter.duplicated())?;
            }
            if let Some(body) = src.get::<PhysicsBody>() {
                dest.add_component(dst, body.duplicated())?;
            }
        }
        Ok(dest)
    }

    /// Index lookup. A miss is a recoverable condition for callers holding a
    /// possibly-stale reference; it is logged for diagnostics only.
    pub fn find_entity_with_uuid(&self, uuid: Uuid) -> Option<Entity> {
        match self.uuid_index.get(&uuid) {
            Some(&entity) => Some(entity),
            None => {
                debug!("no live entity with uuid {uuid} in scene '{}'", self.name);
                None
            }
        }
    }

    // ---------- Component add/remove ----------

    /// Adds a component, firing its structural-change hook exactly once,
    /// synchronously. Double-adding a component is rejected.
    pub fn add_component<T: SceneComponent>(&mut self, entity: Entity, component: T) -> Result<()> {
        if self.world.get_entity(entity).is_err() {
            bail!("add_component called on an entity that is not alive: {entity:?}");
        }
        if self.world.get::<T>(entity).is_some() {
            bail!("{} is already present on {entity:?}", std::any::type_name::<T>());
        }
        self.world.entity_mut(entity).insert(component);
        T::on_add(self, entity);
        Ok(())
    }

    /// Removes a component, firing its hook before the data leaves storage.
    pub fn remove_component<T: SceneComponent>(&mut self, entity: Entity) -> Result<()> {
        if self.world.get::<T>(entity).is_none() {
            bail!("{} is not present on {entity:?}", std::any::type_name::<T>());
        }
        T::on_remove(self, entity);
        self.world.entity_mut(entity).remove::<T>();
        Ok(())
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.world.get::<T>(entity).is_some()
    }

    fn copy_if_present<T: SceneComponent>(&mut self, src: Entity, dst: Entity) -> Result<()> {
        let Some(component) = self.world.get::<T>(src).map(SceneComponent::duplicated) else {
            return Ok(());
        };
        if let Some(mut slot) = self.world.get_mut::<T>(dst) {
            *slot = component;
            Ok(())
        } else {
            self.add_component(dst, component)
        }
    }

    fn remove_if_present<T: SceneComponent>(&mut self, entity: Entity) {
        if self.world.get::<T>(entity).is_none() {
            return;
        }
        T::on_remove(self, entity);
        self.world.entity_mut(entity).remove::<T>();
    }

    // ---------- Deferred physics registration ----------

    /// Queues `entity` for physics registration at the next step boundary.
    /// For callers that decide to add bodies while iterating a view over the
    /// physics components; the immediate path would mutate simulator state
    /// under the iteration.
    pub fn queue_physics_registration(&mut self, entity: Entity) {
        self.physics.queue_registration(entity);
    }

    /// Queues the entity's physics body for removal at the next step boundary.
    pub fn queue_physics_removal(&mut self, entity: Entity) {
        if let Some(mut body) = self.world.get_mut::<PhysicsBody>(entity) {
            self.physics.queue_removal(&mut body);
        }
    }

    fn flush_physics_queues(&mut self) {
        for entity in self.physics.take_pending_adds() {
            let Some(transform) = self.world.get::<Transform>(entity).copied() else {
                continue;
            };
            let Some(mut body) = self.world.get_mut::<PhysicsBody>(entity) else {
                continue;
            };
            if body.handle.is_some() {
                continue;
            }
            if let Err(err) = self.physics.register_body(entity, &transform, &mut body) {
                warn!("deferred registration for {entity:?} failed: {err:#}");
            }
        }
        for handle in self.physics.take_pending_removes() {
            self.physics.remove_body_handle(handle);
        }
    }

    // ---------- Runtime ----------

    /// Begins the physics world and registers every entity currently holding
    /// both a transform and a physics body, then arms play-on-awake emitters.
    pub fn start_runtime(&mut self) -> Result<()> {
        self.physics.begin_world()?;
        let mut bodies = self.world.query::<(Entity, &Transform, &mut PhysicsBody)>();
        for (entity, transform, mut body) in bodies.iter_mut(&mut self.world) {
            // Any handle still present belongs to a previous run's world and
            // is stale.
            body.handle = None;
            self.physics.register_body(entity, transform, &mut body)?;
        }
        let mut emitters = self.world.query::<&mut ParticleEmitter>();
        for mut emitter in emitters.iter_mut(&mut self.world) {
            emitter.playing = emitter.play_on_awake;
            emitter.accumulator = 0.0;
        }
        Ok(())
    }

    /// Ends the physics world, stops emitters and despawns live particles.
    pub fn stop_runtime(&mut self) -> Result<()> {
        self.physics.end_world()?;
        let mut emitters = self.world.query::<&mut ParticleEmitter>();
        for mut emitter in emitters.iter_mut(&mut self.world) {
            emitter.playing = false;
        }
        let particles: Vec<Entity> =
            self.world.query_filtered::<Entity, With<Particle>>().iter(&self.world).collect();
        for particle in particles {
            self.world.despawn(particle);
        }
        Ok(())
    }

    /// One simulated frame: flush queued structural changes, push authored
    /// transforms onto bodies, step the simulator, write resulting poses back,
    /// dispatch contacts, then run the particle systems against the
    /// now-current transforms.
    pub fn update_runtime(&mut self, dt: f32) -> Result<()> {
        if !self.physics.world_exists() {
            bail!("update_runtime called before start_runtime");
        }
        self.flush_physics_queues();
        let mut view = self.world.query::<(&Transform, &PhysicsBody)>();
        for (transform, body) in view.iter(&self.world) {
            self.physics.reset_body(transform, body);
        }
        self.physics.step(dt)?;
        let mut view = self.world.query::<(&mut Transform, &PhysicsBody)>();
        for (mut transform, body) in view.iter_mut(&mut self.world) {
            self.physics.update_body(&mut transform, body);
        }
        self.dispatch_contacts();
        self.run_peer_systems(dt);
        Ok(())
    }

    /// Edit-mode frame: peer systems only, physics untouched.
    pub fn update_editor(&mut self, dt: f32) {
        self.run_peer_systems(dt);
    }

    fn run_peer_systems(&mut self, dt: f32) {
        self.world.resource_mut::<TimeDelta>().0 = dt;
        self.schedule.run(&mut self.world);
    }

    fn dispatch_contacts(&mut self) {
        let contacts = self.physics.drain_contacts();
        if contacts.is_empty() {
            return;
        }
        // Collect callbacks first, invoke after all storage borrows end.
        let mut batch: SmallVec<[(CollisionCallback, Contact); 8]> = SmallVec::new();
        for (phase, a, b) in contacts {
            self.collect_listener(phase, a, b, &mut batch);
            self.collect_listener(phase, b, a, &mut batch);
        }
        for (callback, contact) in batch {
            callback(contact);
        }
    }

    fn collect_listener(
        &self,
        phase: ContactPhase,
        owner: Entity,
        other: Entity,
        batch: &mut SmallVec<[(CollisionCallback, Contact); 8]>,
    ) {
        // Owner destroyed during the same step: drop without dispatch.
        let Some(body) = self.world.get::<PhysicsBody>(owner) else {
            return;
        };
        let callback = match phase {
            ContactPhase::Started => body.on_collision_enter.clone(),
            ContactPhase::Stopped => body.on_collision_exit.clone(),
        };
        if let Some(callback) = callback {
            batch.push((callback, Contact { other }));
        }
    }
}
