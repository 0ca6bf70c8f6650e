//! Serialized record of a scene for the persistence layer: every entity and
//! the components present on it, captured and restored through the scene's own
//! lifecycle primitives. Runtime state (simulator handles, collision
//! listeners, live particles) is never part of the record.

use crate::ecs::scene::Scene;
use crate::ecs::types::{
    BodyType, Camera, Identity, ParticleEmitter, PhysicsBody, SceneUuid, Sprite, Transform,
};
use anyhow::{Context, Result};
use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
    pub transform: TransformData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite: Option<SpriteData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitter: Option<ParticleEmitterData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics_body: Option<PhysicsBodyData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformData {
    pub translation: Vec2Data,
    pub rotation: f32,
    pub scale: Vec2Data,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteData {
    pub atlas: String,
    pub region: String,
    pub tint: ColorData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraData {
    pub size: f32,
    #[serde(default)]
    pub primary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleEmitterData {
    pub rate: f32,
    pub spread: f32,
    pub speed: f32,
    pub lifetime: f32,
    pub start_color: ColorData,
    pub end_color: ColorData,
    pub start_size: f32,
    pub end_size: f32,
    #[serde(default)]
    pub play_on_awake: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsBodyData {
    pub body_type: BodyType,
    pub offset: Vec2Data,
    pub size: Vec2Data,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    pub restitution_threshold: f32,
    #[serde(default)]
    pub freeze_rotation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vec2Data {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorData {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl SceneSnapshot {
    /// Enumerates every uuid-bearing entity and its present components.
    /// Records are sorted by uuid so repeated captures of the same scene
    /// serialize identically.
    pub fn capture(scene: &Scene) -> Self {
        let mut entities = Vec::new();
        for entity in scene.world.iter_entities() {
            let Some(uuid) = entity.get::<SceneUuid>() else {
                continue;
            };
            entities.push(EntityRecord {
                uuid: uuid.0,
                name: entity
                    .get::<Identity>()
                    .map_or_else(|| "Entity".to_string(), |i| i.name.clone()),
                transform: entity.get::<Transform>().copied().unwrap_or_default().into(),
                sprite: entity.get::<Sprite>().map(SpriteData::from),
                camera: entity.get::<Camera>().map(CameraData::from),
                emitter: entity.get::<ParticleEmitter>().map(ParticleEmitterData::from),
                physics_body: entity.get::<PhysicsBody>().map(PhysicsBodyData::from),
            });
        }
        entities.sort_by_key(|record| record.uuid);
        Self { name: scene.name.clone(), entities }
    }

    /// Rebuilds a scene from the record using the same lifecycle primitives
    /// the rest of the engine uses. The restored scene starts with physics
    /// not running and every body handle clear.
    pub fn restore(&self) -> Result<Scene> {
        let mut scene = Scene::new(self.name.clone());
        for record in &self.entities {
            // Records from files without a name field fall back to the same
            // default every other creation path uses.
            let name = if record.name.is_empty() { "Entity" } else { record.name.as_str() };
            let entity = scene.create_entity_with_uuid(record.uuid, name)?;
            if let Some(mut transform) = scene.world.get_mut::<Transform>(entity) {
                *transform = record.transform.clone().into();
            }
            if let Some(sprite) = &record.sprite {
                scene.add_component(entity, Sprite::from(sprite.clone()))?;
            }
            if let Some(camera) = &record.camera {
                scene.add_component(entity, Camera::from(camera.clone()))?;
            }
            if let Some(emitter) = &record.emitter {
                scene.add_component(entity, ParticleEmitter::from(emitter.clone()))?;
            }
            if let Some(body) = &record.physics_body {
                scene.add_component(entity, PhysicsBody::from(body.clone()))?;
            }
        }
        Ok(scene)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading scene file {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("Parsing scene file {}", path.display()))
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating scene directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing scene file {}", path.display()))
    }
}

impl From<Vec2> for Vec2Data {
    fn from(value: Vec2) -> Self {
        Self { x: value.x, y: value.y }
    }
}

impl From<Vec2Data> for Vec2 {
    fn from(value: Vec2Data) -> Self {
        Vec2::new(value.x, value.y)
    }
}

impl From<Vec4> for ColorData {
    fn from(value: Vec4) -> Self {
        Self { r: value.x, g: value.y, b: value.z, a: value.w }
    }
}

impl From<ColorData> for Vec4 {
    fn from(value: ColorData) -> Self {
        Vec4::new(value.r, value.g, value.b, value.a)
    }
}

impl From<Transform> for TransformData {
    fn from(value: Transform) -> Self {
        Self { translation: value.translation.into(), rotation: value.rotation, scale: value.scale.into() }
    }
}

impl From<TransformData> for Transform {
    fn from(value: TransformData) -> Self {
        Self { translation: value.translation.into(), rotation: value.rotation, scale: value.scale.into() }
    }
}

impl From<&Sprite> for SpriteData {
    fn from(value: &Sprite) -> Self {
        Self { atlas: value.atlas_key.to_string(), region: value.region.to_string(), tint: value.tint.into() }
    }
}

impl From<SpriteData> for Sprite {
    fn from(value: SpriteData) -> Self {
        Self { atlas_key: Cow::Owned(value.atlas), region: Cow::Owned(value.region), tint: value.tint.into() }
    }
}

impl From<&Camera> for CameraData {
    fn from(value: &Camera) -> Self {
        Self { size: value.size, primary: value.primary }
    }
}

impl From<CameraData> for Camera {
    fn from(value: CameraData) -> Self {
        Self { size: value.size, primary: value.primary }
    }
}

impl From<&ParticleEmitter> for ParticleEmitterData {
    fn from(value: &ParticleEmitter) -> Self {
        Self {
            rate: value.rate,
            spread: value.spread,
            speed: value.speed,
            lifetime: value.lifetime,
            start_color: value.start_color.into(),
            end_color: value.end_color.into(),
            start_size: value.start_size,
            end_size: value.end_size,
            play_on_awake: value.play_on_awake,
        }
    }
}

impl From<ParticleEmitterData> for ParticleEmitter {
    fn from(value: ParticleEmitterData) -> Self {
        Self {
            rate: value.rate,
            spread: value.spread,
            speed: value.speed,
            lifetime: value.lifetime,
            start_color: value.start_color.into(),
            end_color: value.end_color.into(),
            start_size: value.start_size,
            end_size: value.end_size,
            play_on_awake: value.play_on_awake,
            playing: false,
            accumulator: 0.0,
        }
    }
}

impl From<&PhysicsBody> for PhysicsBodyData {
    fn from(value: &PhysicsBody) -> Self {
        Self {
            body_type: value.body_type,
            offset: value.offset.into(),
            size: value.size.into(),
            density: value.density,
            friction: value.friction,
            restitution: value.restitution,
            restitution_threshold: value.restitution_threshold,
            freeze_rotation: value.freeze_rotation,
        }
    }
}

impl From<PhysicsBodyData> for PhysicsBody {
    fn from(value: PhysicsBodyData) -> Self {
        Self {
            body_type: value.body_type,
            offset: value.offset.into(),
            size: value.size.into(),
            density: value.density,
            friction: value.friction,
            restitution: value.restitution,
            restitution_threshold: value.restitution_threshold,
            freeze_rotation: value.freeze_rotation,
            on_collision_enter: None,
            on_collision_exit: None,
            handle: None,
        }
    }
}
