use bevy_ecs::prelude::{Entity, With};
use plover_engine::ecs::{Particle, ParticleEmitter, Scene};

fn particle_count(scene: &mut Scene) -> usize {
    scene.world.query_filtered::<Entity, With<Particle>>().iter(&scene.world).count()
}

#[test]
fn editor_update_drives_emitters_without_physics() {
    let mut scene = Scene::new("editor-particles");
    let emitter = scene.create_entity_named("emitter");
    scene
        .add_component(emitter, ParticleEmitter { rate: 60.0, lifetime: 0.5, spread: 0.0, ..Default::default() })
        .unwrap();
    scene.world.get_mut::<ParticleEmitter>(emitter).unwrap().playing = true;

    scene.update_editor(0.1);
    assert_eq!(particle_count(&mut scene), 6);
    // Particles are transient: they never enter the uuid index.
    assert_eq!(scene.entity_count(), 1);
    assert!(!scene.physics().world_exists());

    scene.world.get_mut::<ParticleEmitter>(emitter).unwrap().playing = false;
    for _ in 0..6 {
        scene.update_editor(0.1);
    }
    assert_eq!(particle_count(&mut scene), 0);
}

#[test]
fn stopping_the_runtime_despawns_live_particles() {
    let mut scene = Scene::new("runtime-particles");
    let emitter = scene.create_entity_named("emitter");
    scene
        .add_component(emitter, ParticleEmitter { rate: 60.0, play_on_awake: true, ..Default::default() })
        .unwrap();

    scene.start_runtime().unwrap();
    assert!(scene.world.get::<ParticleEmitter>(emitter).unwrap().playing);
    scene.update_runtime(0.1).unwrap();
    scene.update_runtime(0.1).unwrap();
    assert!(particle_count(&mut scene) > 0);

    scene.stop_runtime().unwrap();
    assert_eq!(particle_count(&mut scene), 0);
    assert!(!scene.world.get::<ParticleEmitter>(emitter).unwrap().playing);
}
