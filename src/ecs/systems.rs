use crate::ecs::types::{Particle, ParticleEmitter, Transform};
use bevy_ecs::prelude::*;
use bevy_ecs::system::{Commands, Res};
use glam::Vec2;
use rand::Rng;

#[derive(Resource, Clone, Copy)]
pub struct TimeDelta(pub f32);

pub fn sys_update_emitters(
    mut commands: Commands,
    mut emitters: Query<(&Transform, &mut ParticleEmitter)>,
    dt: Res<TimeDelta>,
) {
    let mut rng = rand::thread_rng();
    for (transform, mut emitter) in &mut emitters {
        if !emitter.playing || emitter.rate <= 0.0 {
            continue;
        }
        emitter.accumulator += emitter.rate * dt.0;
        let to_spawn = emitter.accumulator.floor() as i32;
        if to_spawn <= 0 {
            continue;
        }
        emitter.accumulator -= to_spawn as f32;
        let mut batch = Vec::with_capacity(to_spawn as usize);
        for _ in 0..to_spawn {
            let jitter = if emitter.spread > 0.0 {
                rng.gen_range(-emitter.spread..=emitter.spread)
            } else {
                0.0
            };
            let dir = Vec2::from_angle(transform.rotation + std::f32::consts::FRAC_PI_2 + jitter);
            batch.push((
                Transform {
                    translation: transform.translation,
                    rotation: 0.0,
                    scale: Vec2::splat(emitter.start_size.max(0.01)),
                },
                Particle {
                    velocity: dir * emitter.speed,
                    lifetime: emitter.lifetime,
                    max_lifetime: emitter.lifetime,
                    start_color: emitter.start_color,
                    end_color: emitter.end_color,
                    start_size: emitter.start_size,
                    end_size: emitter.end_size,
                },
            ));
        }
        commands.spawn_batch(batch);
    }
}

pub fn sys_update_particles(
    mut commands: Commands,
    mut particles: Query<(Entity, &mut Transform, &mut Particle)>,
    dt: Res<TimeDelta>,
) {
    for (entity, mut transform, mut particle) in &mut particles {
        particle.lifetime -= dt.0;
        if particle.lifetime <= 0.0 {
            commands.entity(entity).despawn();
            continue;
        }
        transform.translation += particle.velocity * dt.0;
        let progress = 1.0 - (particle.lifetime / particle.max_lifetime).clamp(0.0, 1.0);
        let size = particle.start_size + (particle.end_size - particle.start_size) * progress;
        transform.scale = Vec2::splat(size.max(0.01));
    }
}
