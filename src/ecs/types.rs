use bevy_ecs::prelude::*;
use glam::{Vec2, Vec4};
use rapier2d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use uuid::Uuid;

/// Stable identity of an entity across frames and scene copies. Entity ids are
/// transient per-world handles; the uuid is what references and serialized data
/// hold on to.
#[derive(Component, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SceneUuid(pub Uuid);

impl SceneUuid {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SceneUuid {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Component, Clone, PartialEq, Eq, Debug)]
pub struct Identity {
    pub name: String,
}

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self { name: "Entity".to_string() }
    }
}

/// Source of truth for "where is this entity" outside of a physics step. During
/// a step, the physics layer is the writer of record for entities that also
/// carry a [`PhysicsBody`].
#[derive(Component, Clone, Copy, PartialEq, Debug)]
pub struct Transform {
    pub translation: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self { translation: Vec2::ZERO, rotation: 0.0, scale: Vec2::splat(1.0) }
    }
}

#[derive(Component, Clone, PartialEq, Debug)]
pub struct Sprite {
    pub atlas_key: Cow<'static, str>,
    pub region: Cow<'static, str>,
    pub tint: Vec4,
}

impl Default for Sprite {
    fn default() -> Self {
        Self { atlas_key: Cow::Borrowed("main"), region: Cow::Borrowed("default"), tint: Vec4::ONE }
    }
}

#[derive(Component, Clone, Copy, PartialEq, Debug)]
pub struct Camera {
    /// Orthographic half-height in world units.
    pub size: f32,
    pub primary: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self { size: 5.0, primary: false }
    }
}

#[derive(Component, Clone, PartialEq, Debug)]
pub struct ParticleEmitter {
    pub rate: f32,
    pub spread: f32,
    pub speed: f32,
    pub lifetime: f32,
    pub start_color: Vec4,
    pub end_color: Vec4,
    pub start_size: f32,
    pub end_size: f32,
    pub play_on_awake: bool,
    pub playing: bool,
    pub accumulator: f32,
}

impl Default for ParticleEmitter {
    fn default() -> Self {
        Self {
            rate: 10.0,
            spread: std::f32::consts::FRAC_PI_4,
            speed: 1.0,
            lifetime: 1.0,
            start_color: Vec4::ONE,
            end_color: Vec4::new(1.0, 1.0, 1.0, 0.0),
            start_size: 0.1,
            end_size: 0.02,
            play_on_awake: false,
            playing: false,
            accumulator: 0.0,
        }
    }
}

/// Transient particle spawned by an emitter. Particles have no [`SceneUuid`];
/// they are invisible to the uuid index, duplication and scene copies.
#[derive(Component, Clone, Copy, Debug)]
pub struct Particle {
    pub velocity: Vec2,
    pub lifetime: f32,
    pub max_lifetime: f32,
    pub start_color: Vec4,
    pub end_color: Vec4,
    pub start_size: f32,
    pub end_size: f32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum BodyType {
    Static,
    Dynamic,
    Kinematic,
}

/// Payload delivered to collision listeners: the entity owning the other body.
#[derive(Clone, Copy, Debug)]
pub struct Contact {
    pub other: Entity,
}

pub type CollisionCallback = Arc<dyn Fn(Contact) + Send + Sync>;

/// Rigid-body participation. `handle` is `Some` if and only if the component is
/// currently registered with a live simulator world; it is owned data on the
/// component but the body itself is owned by the scene's physics layer.
#[derive(Component, Clone)]
pub struct PhysicsBody {
    pub body_type: BodyType,
    /// Shape center relative to the entity transform.
    pub offset: Vec2,
    /// Half extents of the collision box, scaled by the transform.
    pub size: Vec2,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub restitution_threshold: f32,
    pub freeze_rotation: bool,
    pub on_collision_enter: Option<CollisionCallback>,
    pub on_collision_exit: Option<CollisionCallback>,
    pub handle: Option<RigidBodyHandle>,
}

impl Default for PhysicsBody {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            offset: Vec2::ZERO,
            size: Vec2::splat(0.5),
            density: 1.0,
            friction: 0.5,
            restitution: 0.0,
            restitution_threshold: 0.5,
            freeze_rotation: false,
            on_collision_enter: None,
            on_collision_exit: None,
            handle: None,
        }
    }
}
