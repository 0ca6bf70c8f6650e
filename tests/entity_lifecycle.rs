use glam::{Vec2, Vec4};
use plover_engine::ecs::{
    BodyType, Camera, Identity, ParticleEmitter, PhysicsBody, Scene, Sprite, Transform,
};
use std::borrow::Cow;

#[test]
fn uuid_index_tracks_creation_and_destruction() {
    let mut scene = Scene::new("lifecycle");
    let entity = scene.create_entity();
    let uuid = scene.uuid_of(entity).expect("fresh entity carries a uuid");

    assert_eq!(scene.find_entity_with_uuid(uuid), Some(entity));
    assert_eq!(scene.entity_count(), 1);

    scene.destroy_entity(entity).unwrap();
    assert_eq!(scene.find_entity_with_uuid(uuid), None);
    assert_eq!(scene.entity_count(), 0);

    // Destroying a dead entity is a precondition violation, not a no-op.
    assert!(scene.destroy_entity(entity).is_err());
}

#[test]
fn created_entities_carry_default_components() {
    let mut scene = Scene::new("defaults");
    let entity = scene.create_entity_named("player");
    assert_eq!(scene.world.get::<Identity>(entity).unwrap().name, "player");
    assert_eq!(*scene.world.get::<Transform>(entity).unwrap(), Transform::default());
}

#[test]
fn double_add_and_absent_remove_are_rejected() {
    let mut scene = Scene::new("policy");
    let entity = scene.create_entity();

    scene.add_component(entity, Sprite::default()).unwrap();
    assert!(scene.add_component(entity, Sprite::default()).is_err());

    scene.remove_component::<Sprite>(entity).unwrap();
    assert!(scene.remove_component::<Sprite>(entity).is_err());
}

#[test]
fn create_with_known_uuid_rejects_duplicates() {
    let mut scene = Scene::new("restore");
    let uuid = uuid::Uuid::new_v4();
    let entity = scene.create_entity_with_uuid(uuid, "saved").unwrap();
    assert_eq!(scene.find_entity_with_uuid(uuid), Some(entity));
    assert!(scene.create_entity_with_uuid(uuid, "saved again").is_err());
}

#[test]
fn duplicate_copies_components_but_not_identity_of_record() {
    let mut scene = Scene::new("duplicate");
    let src = scene.create_entity_named("emitter rig");
    {
        let mut transform = scene.world.get_mut::<Transform>(src).unwrap();
        transform.translation = Vec2::new(3.0, -1.0);
        transform.rotation = 0.4;
        transform.scale = Vec2::new(2.0, 0.5);
    }
    scene
        .add_component(
            src,
            Sprite {
                atlas_key: Cow::Borrowed("main"),
                region: Cow::Borrowed("redorb"),
                tint: Vec4::new(1.0, 0.5, 0.5, 1.0),
            },
        )
        .unwrap();
    scene.add_component(src, Camera { size: 7.5, primary: true }).unwrap();
    scene.add_component(src, ParticleEmitter { rate: 42.0, ..Default::default() }).unwrap();
    scene
        .add_component(
            src,
            PhysicsBody { body_type: BodyType::Dynamic, density: 2.5, ..Default::default() },
        )
        .unwrap();

    let dst = scene.duplicate_entity(src).unwrap();
    assert_ne!(scene.uuid_of(src), scene.uuid_of(dst));

    assert_eq!(scene.world.get::<Identity>(src), scene.world.get::<Identity>(dst));
    assert_eq!(scene.world.get::<Transform>(src), scene.world.get::<Transform>(dst));
    assert_eq!(scene.world.get::<Sprite>(src), scene.world.get::<Sprite>(dst));
    assert_eq!(scene.world.get::<Camera>(src), scene.world.get::<Camera>(dst));
    assert_eq!(scene.world.get::<ParticleEmitter>(src), scene.world.get::<ParticleEmitter>(dst));

    let src_body = scene.world.get::<PhysicsBody>(src).unwrap();
    let dst_body = scene.world.get::<PhysicsBody>(dst).unwrap();
    assert_eq!(src_body.body_type, dst_body.body_type);
    assert_eq!(src_body.density, dst_body.density);
    // The physics world is not running, so neither copy is registered.
    assert!(src_body.handle.is_none());
    assert!(dst_body.handle.is_none());

    // Both resolve independently through the index.
    let src_uuid = scene.uuid_of(src).unwrap();
    let dst_uuid = scene.uuid_of(dst).unwrap();
    assert_eq!(scene.find_entity_with_uuid(src_uuid), Some(src));
    assert_eq!(scene.find_entity_with_uuid(dst_uuid), Some(dst));
}

#[test]
fn duplicating_a_dead_entity_is_an_error() {
    let mut scene = Scene::new("duplicate-dead");
    let entity = scene.create_entity();
    scene.destroy_entity(entity).unwrap();
    assert!(scene.duplicate_entity(entity).is_err());
}
