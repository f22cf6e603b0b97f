//! Basic simulation example
//!
//! A ball and a small box stack dropped onto a ground plane, with collision
//! and sleep events printed as they arrive. Run with `RUST_LOG=debug` to see
//! the engine's own lifecycle logging.

use impulse3d::prelude::*;

fn main() {
    env_logger::init();

    println!("impulse3d - Basic Simulation Example");
    println!("====================================\n");

    let config = WorldConfig::default()
        .with_allow_sleep(true)
        .with_broadphase(BroadphaseKind::SweepAndPrune);
    let mut world = match World::new(config) {
        Ok(world) => world,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return;
        }
    };

    world.add_body(RigidBody::new(0.0).with_shape(Shape::plane()));
    println!("Created ground plane at Y=0");

    let ball = world.add_body(
        RigidBody::new(1.0)
            .with_shape(Shape::sphere(0.5))
            .with_position(Vec3::new(-2.0, 5.0, 0.0)),
    );
    for i in 0..3 {
        world.add_body(
            RigidBody::new(1.0)
                .with_shape(Shape::cuboid(Vec3::splat(0.5)))
                .with_position(Vec3::new(2.0, 0.5 + 1.05 * i as f64, 0.0)),
        );
    }
    println!("Created a ball at Y=5 and a stack of 3 boxes\n");

    let dt = 1.0 / 60.0;
    let steps = (5.0 / dt) as usize;

    for i in 0..steps {
        world.step(dt);

        let time = world.time();
        for event in world.drain_events() {
            match event {
                WorldEvent::Collide {
                    body, impact_velocity, ..
                } if body == ball => {
                    println!("t={time:.2}s: ball hit at {:.3} m/s", impact_velocity.abs());
                }
                WorldEvent::Sleep { body } => println!("t={time:.2}s: {body:?} fell asleep"),
                WorldEvent::WakeUp { body } => println!("t={time:.2}s: {body:?} woke up"),
                _ => {}
            }
        }

        if i % 60 == 0 {
            if let Some(body) = world.body(ball) {
                let (p, v) = (body.position, body.linear_velocity);
                println!(
                    "t={:.2}s: ball position=({:.3}, {:.3}, {:.3}), velocity=({:.3}, {:.3}, {:.3})",
                    world.time(),
                    p.x, p.y, p.z,
                    v.x, v.y, v.z
                );
            }
        }

        if !world.has_active_bodies() {
            println!("\nEverything is asleep after {} steps", world.step_number());
            break;
        }
    }

    if let Some(hit) = world.raycast_closest(Vec3::new(2.0, 10.0, 0.0), Vec3::new(2.0, -1.0, 0.0), &RayOptions::default()) {
        println!("Top of the stack is at Y={:.3}", hit.hit_point.y);
    }
}
