use impulse3d::prelude::*;

const DT: f64 = 1.0 / 60.0;

fn weightless() -> World {
    World::new(WorldConfig::default().with_gravity(Vec3::ZERO)).unwrap()
}

#[test]
fn pendulum_keeps_its_length() {
    // A point bob pivoting far from its centre needs a converged solve
    let solver = SolverConfig {
        iterations: 50,
        ..SolverConfig::default()
    };
    let mut world = World::new(WorldConfig::default().with_solver(solver)).unwrap();
    let anchor = world.add_body(RigidBody::new(0.0).with_position(Vec3::new(0.0, 5.0, 0.0)));
    let bob = world.add_body(
        RigidBody::new(1.0)
            .with_shape(Shape::sphere(0.1))
            .with_position(Vec3::new(1.0, 5.0, 0.0)),
    );
    world
        .add_constraint(PointToPointConstraint::new(anchor, Vec3::ZERO, bob, Vec3::new(-1.0, 0.0, 0.0)))
        .unwrap();

    let mut lowest = f64::INFINITY;
    for _ in 0..120 {
        world.step(DT);
        let body = world.body(bob).unwrap();
        lowest = lowest.min(body.position.y);
        let length = body.position.distance(Vec3::new(0.0, 5.0, 0.0));
        assert!((length - 1.0).abs() < 0.05, "length {length}");
    }
    // It actually swung
    assert!(lowest < 4.2);
}

#[test]
fn distance_constraint_holds_orbit() {
    let mut world = weightless();
    let a = world.add_body(RigidBody::new(1.0).with_shape(Shape::sphere(0.2)));
    let b = world.add_body(
        RigidBody::new(1.0)
            .with_shape(Shape::sphere(0.2))
            .with_position(Vec3::new(2.0, 0.0, 0.0))
            .with_velocity(Vec3::new(0.0, 3.0, 0.0)),
    );
    let handle = world.add_constraint(DistanceConstraint::new(a, b, 2.0)).unwrap();

    for _ in 0..120 {
        world.step(DT);
        let d = world.body(a).unwrap().position.distance(world.body(b).unwrap().position);
        assert!((d - 2.0).abs() < 0.05, "distance {d}");
    }
    // The equation pulled: a started at rest
    assert!(world.body(a).unwrap().linear_velocity.length() > 0.1);
    assert!(world.constraint_mut::<DistanceConstraint>(handle).is_some());
    assert!(world.constraint_mut::<HingeConstraint>(handle).is_none());
}

#[test]
fn lock_constraint_holds_pose_under_gravity() {
    let mut world = World::default();
    let base = world.add_body(RigidBody::new(0.0));
    let arm = world.add_body(
        RigidBody::new(1.0)
            .with_shape(Shape::cuboid(Vec3::new(1.0, 0.1, 0.1)))
            .with_position(Vec3::new(1.0, 0.0, 0.0)),
    );
    let lock = LockConstraint::new(base, world.body(base).unwrap(), arm, world.body(arm).unwrap());
    world.add_constraint(lock).unwrap();

    for _ in 0..120 {
        world.step(DT);
    }
    let body = world.body(arm).unwrap();
    assert!(body.position.distance(Vec3::new(1.0, 0.0, 0.0)) < 0.05);
    assert!(body.rotation.dot(Quat::IDENTITY).abs() > 0.999);
}

#[test]
fn hinge_motor_spins_wheel() {
    let mut world = weightless();
    let axle = world.add_body(RigidBody::new(0.0));
    let wheel = world.add_body(RigidBody::new(1.0).with_shape(Shape::cylinder(0.5, 0.5, 0.2, 12).unwrap()));
    let handle = world
        .add_constraint(HingeConstraint::new(axle, Vec3::ZERO, Vec3::Z, wheel, Vec3::ZERO, Vec3::Z))
        .unwrap();

    {
        let hinge = world.constraint_mut::<HingeConstraint>(handle).unwrap();
        hinge.enable_motor();
        hinge.set_motor_speed(2.0);
    }
    for _ in 0..60 {
        world.step(DT);
    }

    let body = world.body(wheel).unwrap();
    // Relative speed of the axle over the wheel is the target
    assert!((body.angular_velocity.z + 2.0).abs() < 0.2, "{:?}", body.angular_velocity);
    assert!(body.angular_velocity.x.abs() < 0.05 && body.angular_velocity.y.abs() < 0.05);
    assert!(body.position.length() < 0.01);

    let hinge = world.constraint_mut::<HingeConstraint>(handle).unwrap();
    assert!(hinge.motor_equation().multiplier().is_finite());
    hinge.disable_motor();
}

#[test]
fn spring_pulls_bodies_to_rest_length() {
    let mut world = weightless();
    let a = world.add_body(RigidBody::new(0.0));
    let b = world.add_body(
        RigidBody::new(1.0)
            .with_shape(Shape::sphere(0.1))
            .with_position(Vec3::new(3.0, 0.0, 0.0))
            .with_linear_damping(0.5),
    );
    world
        .add_spring(Spring::new(a, b).with_rest_length(1.0).with_stiffness(50.0).with_damping(12.0))
        .unwrap();

    let mut nearest = f64::INFINITY;
    for _ in 0..600 {
        world.step(DT);
        nearest = nearest.min(world.body(b).unwrap().position.x);
    }
    // Damped enough not to swing through the anchor
    assert!(nearest > 0.5, "nearest x = {nearest}");
    let position = world.body(b).unwrap().position;
    assert!((position.length() - 1.0).abs() < 0.05, "at {position:?}");
    assert!(position.x > 0.0);
}

#[test]
fn constraints_need_live_bodies() {
    let mut world = World::default();
    let a = world.add_body(RigidBody::new(1.0));
    let b = world.add_body(RigidBody::new(1.0));
    world.remove_body(b);

    assert!(matches!(
        world.add_constraint(DistanceConstraint::new(a, b, 1.0)),
        Err(PhysicsError::UnknownBody(h)) if h == b
    ));
    assert!(world.add_spring(Spring::new(a, b)).is_err());

    let c = world.add_body(RigidBody::new(1.0));
    let handle = world.add_constraint(DistanceConstraint::new(a, c, 1.0)).unwrap();
    assert!(world.remove_constraint(handle).is_ok());
    assert!(matches!(
        world.remove_constraint(handle),
        Err(PhysicsError::UnknownConstraint(_))
    ));
}
