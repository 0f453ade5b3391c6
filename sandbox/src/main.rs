//! Headless sandbox: drops a few scripted balls onto the ground and logs what happens
//!
//! Usage: `sandbox [config.toml|config.ron] [seconds]`

use std::env;
use std::error::Error;

use rand::Rng;
use scene_engine::foundation::logging;
use scene_engine::prelude::*;

const BALL_SCRIPT: &str = r#"
    let bounces = 0;

    fn on_create() {
        log("ball " + this.id + " ready at height " + translation(this.id)[1]);
    }

    fn on_collision_enter(info, other) {
        this.bounces += 1;
        if entity_tag(other) == "Ground" && this.bounces >= 3 {
            log("ball " + this.id + " bounced " + this.bounces + " times, removing");
            destroy_entity(this.id);
        }
    }

    fn on_destroy() {
        log("ball " + this.id + " destroyed");
    }
"#;

const FRAME_TIME: f32 = 1.0 / 30.0;
const PHYSICS_STEP: f32 = 1.0 / 60.0;

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let config = match args.next() {
        Some(path) => SceneConfig::load_from_file(&path)?,
        None => SceneConfig::default(),
    };
    let seconds: f32 = args.next().map_or(Ok(5.0), |s| s.parse())?;
    logging::init_with_level(&config.log_level);
    config.validate()?;

    let mut host = RhaiHost::from_config(&config)?;
    host.register_class_source("Sandbox.Ball", BALL_SCRIPT)?;
    let mut scene = Scene::with_host("Sandbox", config, Box::new(host));
    populate(&mut scene)?;

    scene.start_runtime()?;
    let mut timestep = FixedTimestep::new(PHYSICS_STEP);
    let mut timer = Timer::new();
    let mut elapsed = 0.0;
    let mut frame = 0u64;
    while elapsed < seconds {
        for _ in 0..timestep.advance(FRAME_TIME) {
            scene.update_runtime(timestep.step())?;
        }
        timer.update();
        elapsed += FRAME_TIME;
        frame += 1;
        if frame % 30 == 0 {
            report(&scene, elapsed);
        }
    }
    scene.stop_runtime()?;

    log::info!(
        "Simulated {elapsed:.1}s in {:.3}s wall time ({:.0} frames/s), {} entities left",
        timer.total_time(),
        timer.average_fps(),
        scene.entity_count()
    );
    Ok(())
}

fn populate(scene: &mut Scene) -> Result<(), SceneError> {
    let ground = scene.create_entity("Ground");
    scene.add_component(ground, RigidBody2DComponent::new(BodyType::Static))?;
    scene.add_component(ground, BoxCollider2DComponent::new(8.0, 0.5))?;

    let camera = scene.create_entity("Camera");
    scene.add_component(camera, CameraComponent::default())?;
    scene.on_viewport_resize(1280, 720);

    let mut rng = rand::thread_rng();
    for i in 0..5 {
        let position = Vec3::new(rng.gen_range(-6.0..6.0), rng.gen_range(3.0..8.0), 0.0);
        let ball = scene.create_entity(&format!("Ball {i}"));
        if let Some(transform) = scene.get_component_mut::<TransformComponent>(ball) {
            transform.position = position;
        }
        scene.add_component(ball, RigidBody2DComponent::new(BodyType::Dynamic))?;
        scene.add_component(
            ball,
            CircleCollider2DComponent::new(0.5).with_restitution(rng.gen_range(0.4..0.9)),
        )?;
        scene.add_component(ball, ScriptComponent::new("Sandbox.Ball"))?;
    }
    log::info!("Populated scene with {} entities", scene.entity_count());
    Ok(())
}

fn report(scene: &Scene, elapsed: f32) {
    scene.each::<(TagComponent, TransformComponent, RigidBody2DComponent)>(|_, (tag, transform, body)| {
        if body.body_type == BodyType::Dynamic {
            log::info!(
                "t={elapsed:.1}s {}: ({:.2}, {:.2})",
                tag.tag,
                transform.position.x,
                transform.position.y
            );
        }
    });
}
