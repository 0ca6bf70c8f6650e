use glam::Vec2;
use plover_engine::ecs::{
    BodyType, Camera, Identity, ParticleEmitter, PhysicsBody, Scene, SceneUuid, Sprite, Transform,
};
use std::collections::HashSet;

fn build_source_scene() -> Scene {
    let mut scene = Scene::new("arena");

    let ground = scene.create_entity_named("ground");
    scene.world.get_mut::<Transform>(ground).unwrap().scale = Vec2::new(20.0, 1.0);
    scene.add_component(ground, PhysicsBody::default()).unwrap();

    let crate_box = scene.create_entity_named("crate");
    scene.world.get_mut::<Transform>(crate_box).unwrap().translation = Vec2::new(0.0, 4.0);
    scene.add_component(crate_box, Sprite::default()).unwrap();
    scene
        .add_component(crate_box, PhysicsBody { body_type: BodyType::Dynamic, ..Default::default() })
        .unwrap();

    let rig = scene.create_entity_named("camera rig");
    scene.add_component(rig, Camera { size: 6.0, primary: true }).unwrap();
    scene.add_component(rig, ParticleEmitter { rate: 5.0, ..Default::default() }).unwrap();

    scene
}

fn component_count<T: bevy_ecs::prelude::Component>(scene: &mut Scene) -> usize {
    scene.world.query::<&T>().iter(&scene.world).count()
}

#[test]
fn copy_preserves_name_and_population_counts() {
    let source = build_source_scene();
    let mut copy = Scene::copy_scene(&source).unwrap();
    let mut source = source;

    assert_eq!(copy.name, source.name);
    assert_eq!(copy.entity_count(), source.entity_count());
    assert_eq!(component_count::<Identity>(&mut copy), component_count::<Identity>(&mut source));
    assert_eq!(component_count::<Transform>(&mut copy), component_count::<Transform>(&mut source));
    assert_eq!(component_count::<Sprite>(&mut copy), component_count::<Sprite>(&mut source));
    assert_eq!(component_count::<Camera>(&mut copy), component_count::<Camera>(&mut source));
    assert_eq!(
        component_count::<ParticleEmitter>(&mut copy),
        component_count::<ParticleEmitter>(&mut source)
    );
    assert_eq!(component_count::<PhysicsBody>(&mut copy), component_count::<PhysicsBody>(&mut source));
}

#[test]
fn copy_mints_fresh_uuids() {
    let mut source = build_source_scene();
    let mut copy = Scene::copy_scene(&source).unwrap();

    let source_uuids: HashSet<_> =
        source.world.query::<&SceneUuid>().iter(&source.world).map(|u| u.0).collect();
    let copy_uuids: HashSet<_> = copy.world.query::<&SceneUuid>().iter(&copy.world).map(|u| u.0).collect();

    assert_eq!(source_uuids.len(), copy_uuids.len());
    assert!(source_uuids.is_disjoint(&copy_uuids));

    // Every copied uuid resolves through the copy's own index.
    for uuid in copy_uuids {
        assert!(copy.find_entity_with_uuid(uuid).is_some());
    }
}

fn entity_named(scene: &mut Scene, name: &str) -> bevy_ecs::prelude::Entity {
    let mut query = scene.world.query::<(bevy_ecs::prelude::Entity, &Identity)>();
    query
        .iter(&scene.world)
        .find(|(_, identity)| identity.name == name)
        .map(|(entity, _)| entity)
        .expect("entity present")
}

#[test]
fn copy_is_independent_of_later_source_mutation() {
    let mut source = build_source_scene();
    let mut copy = Scene::copy_scene(&source).unwrap();

    let source_crate = entity_named(&mut source, "crate");
    source.world.get_mut::<Transform>(source_crate).unwrap().translation = Vec2::new(99.0, 99.0);
    let source_ground = entity_named(&mut source, "ground");
    source.destroy_entity(source_ground).unwrap();

    let copy_crate = entity_named(&mut copy, "crate");
    assert_eq!(copy.world.get::<Transform>(copy_crate).unwrap().translation, Vec2::new(0.0, 4.0));
    assert_eq!(copy.entity_count(), 3);
}

#[test]
fn copying_a_running_scene_leaves_the_copy_unregistered() {
    let mut source = build_source_scene();
    source.start_runtime().unwrap();
    assert!(source.physics().world_exists());

    let mut copy = Scene::copy_scene(&source).unwrap();
    assert!(!copy.physics().world_exists());

    let mut bodies = copy.world.query::<&PhysicsBody>();
    for body in bodies.iter(&copy.world) {
        assert!(body.handle.is_none());
    }

    // The copy can start its own runtime and registers everything then.
    copy.start_runtime().unwrap();
    assert_eq!(copy.physics().body_count(), 2);
}
