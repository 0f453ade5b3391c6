//! Entity lifecycle, component access and runtime state transitions

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::{spawn_ball, spawn_ground, RecordingHost, DT};
use crate::config::SceneConfig;
use crate::ecs::components::{
    BoxCollider2DComponent, CameraComponent, ComponentKind, IdComponent, NativeScriptComponent, RigidBody2DComponent,
    ScriptComponent, SpriteRendererComponent, TagComponent, TransformComponent, Uuid,
};
use crate::ecs::{EcsError, Entity};
use crate::foundation::math::{Vec3, Vec4};
use crate::scene::{NativeScript, Scene, SceneError, SceneState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entities_carry_core_components() {
        let mut scene = Scene::new("Test");
        let entities: Vec<Entity> = (0..100).map(|i| scene.create_entity(&format!("E{i}"))).collect();

        let mut ids = HashSet::new();
        for &entity in &entities {
            assert!(scene.has_component::<IdComponent>(entity));
            assert!(scene.has_component::<TagComponent>(entity));
            assert!(scene.has_component::<TransformComponent>(entity));
            let id = scene.uuid_of(entity).unwrap();
            assert!(ids.insert(id), "duplicate id {id}");
            assert_eq!(scene.entity_by_uuid(id), Some(entity));
        }
        assert_eq!(scene.entity_count(), 100);
    }

    #[test]
    fn test_empty_name_and_explicit_uuid() {
        let mut scene = Scene::new("Test");
        let id = Uuid::from_raw(42);
        let entity = scene.create_entity_with_uuid(id, "").unwrap();

        assert_eq!(scene.entity(entity).unwrap().tag(), "Entity 42");
        assert!(matches!(
            scene.create_entity_with_uuid(id, "Again"),
            Err(SceneError::DuplicateUuid(dup)) if dup == id
        ));
        assert_eq!(scene.find_entity_by_name("Entity 42"), Some(entity));
        assert_eq!(scene.find_entity_by_name("Nobody"), None);
    }

    #[test]
    fn test_duplicate_copies_values_but_not_handles() {
        let mut scene = Scene::new("Test");
        let source = spawn_ground(&mut scene);
        scene.get_component_mut::<TransformComponent>(source).unwrap().scale = Vec3::new(2.0, 1.0, 1.0);
        scene
            .add_component(source, SpriteRendererComponent::new(Vec4::new(1.0, 0.0, 0.0, 1.0)))
            .unwrap();
        scene.rebuild_physics().unwrap();

        let copy = scene.duplicate_entity(source).unwrap();

        assert_eq!(scene.entity(copy).unwrap().tag(), "Ground (2)");
        assert_ne!(scene.uuid_of(copy), scene.uuid_of(source));
        assert_eq!(
            scene.get_component::<TransformComponent>(copy),
            scene.get_component::<TransformComponent>(source)
        );
        assert_eq!(
            scene.get_component::<SpriteRendererComponent>(copy),
            scene.get_component::<SpriteRendererComponent>(source)
        );

        let source_collider = scene.get_component::<BoxCollider2DComponent>(source).unwrap();
        assert!(source_collider.runtime_fixture.is_some());
        let expected = BoxCollider2DComponent {
            runtime_fixture: None,
            ..source_collider.clone()
        };
        assert_eq!(scene.get_component::<BoxCollider2DComponent>(copy), Some(&expected));
        assert!(scene.get_component::<RigidBody2DComponent>(copy).unwrap().runtime_body.is_none());

        scene.rebuild_physics().unwrap();
        assert!(scene.get_component::<RigidBody2DComponent>(copy).unwrap().runtime_body.is_some());
    }

    #[test]
    fn test_destroy_removes_everything() {
        let mut scene = Scene::new("Test");
        let ground = spawn_ground(&mut scene);
        let ball = spawn_ball(&mut scene, "Ball", Vec3::new(0.0, 3.0, 0.0), 0.0);
        scene.rebuild_physics().unwrap();
        let id = scene.uuid_of(ball).unwrap();

        scene.destroy_entity(ball).unwrap();

        assert!(!scene.contains(ball));
        assert_eq!(scene.entity_by_uuid(id), None);
        assert!(scene.contains(ground));
        let world = scene.physics().world().unwrap();
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.fixture_count(), 1);
        assert!(matches!(scene.destroy_entity(ball), Err(SceneError::NoSuchEntity(_))));
    }

    #[test]
    fn test_destroy_while_locked_is_deferred() {
        let mut scene = Scene::new("Test");
        spawn_ground(&mut scene);
        let ball = spawn_ball(&mut scene, "Ball", Vec3::new(0.0, 3.0, 0.0), 0.0);
        scene.start_runtime().unwrap();

        scene.physics_mut().set_locked(true);
        scene.destroy_entity(ball).unwrap();
        assert!(scene.contains(ball));
        assert!(scene.has_component::<RigidBody2DComponent>(ball));
        assert_eq!(scene.deferred().len(), 1);
        assert_eq!(scene.physics().world().unwrap().body_count(), 2);

        scene.physics_mut().set_locked(false);
        scene.update_runtime(DT).unwrap();
        assert!(!scene.contains(ball));
        assert!(scene.deferred().is_empty());
        assert_eq!(scene.physics().world().unwrap().body_count(), 1);
    }

    #[test]
    fn test_core_components_cannot_be_removed() {
        let mut scene = Scene::new("Test");
        let entity = scene.create_entity("Core");

        assert!(matches!(
            scene.remove_component::<IdComponent>(entity),
            Err(SceneError::Ecs(EcsError::Unsupported(_)))
        ));
        assert!(scene.remove_component::<TagComponent>(entity).is_err());
        assert!(scene.remove_component::<TransformComponent>(entity).is_err());
        assert!(scene.remove_component_by_kind(entity, ComponentKind::Transform).is_err());
        assert!(scene.has_component::<IdComponent>(entity));
    }

    #[test]
    fn test_component_access_by_type_and_kind() {
        let mut scene = Scene::new("Test");
        let entity = scene.create_entity("Thing");

        scene.add_component_by_kind(entity, ComponentKind::SpriteRenderer).unwrap();
        assert!(scene.has_component_by_kind(entity, ComponentKind::SpriteRenderer));
        assert!(matches!(
            scene.add_component(entity, SpriteRendererComponent::default()),
            Err(SceneError::Ecs(EcsError::ComponentAlreadyPresent { .. }))
        ));
        assert!(scene.get_component::<CameraComponent>(entity).is_none());

        assert!(scene.remove_component_by_kind(entity, ComponentKind::SpriteRenderer).unwrap());
        assert!(!scene.remove_component_by_kind(entity, ComponentKind::SpriteRenderer).unwrap());
        assert_eq!(scene.remove_component::<CameraComponent>(entity).unwrap(), None);
    }

    #[test]
    fn test_removing_physics_components_frees_resources() {
        let mut scene = Scene::new("Test");
        let ground = spawn_ground(&mut scene);
        let ball = spawn_ball(&mut scene, "Ball", Vec3::new(0.0, 3.0, 0.0), 0.0);
        scene.rebuild_physics().unwrap();

        scene.remove_component_by_kind(ground, ComponentKind::BoxCollider2D).unwrap();
        assert_eq!(scene.physics().world().unwrap().fixture_count(), 1);
        assert_eq!(scene.physics().world().unwrap().body_count(), 2);

        let removed = scene.remove_component::<RigidBody2DComponent>(ball).unwrap().unwrap();
        assert!(removed.runtime_body.is_none());
        assert_eq!(scene.physics().world().unwrap().body_count(), 1);
        assert_eq!(scene.physics().world().unwrap().fixture_count(), 0);
    }

    #[test]
    fn test_entity_handles() {
        let mut scene = Scene::new("Test");
        let entity = scene.create_entity("Before");

        let mut handle = scene
            .entity_mut(entity)
            .unwrap()
            .with(CameraComponent::default())
            .unwrap();
        handle.set_tag("After");
        handle.transform_mut().unwrap().position = Vec3::new(1.0, 2.0, 3.0);
        assert!(handle.has::<CameraComponent>());
        assert_eq!(handle.as_entity_ref().tag(), "After");
        assert!(handle.remove::<CameraComponent>().unwrap().is_some());

        let view = scene.entity(entity).unwrap();
        assert_eq!(view.transform().unwrap().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(view.uuid(), scene.uuid_of(entity).unwrap());

        scene.entity_mut(entity).unwrap().destroy().unwrap();
        assert!(scene.entity(entity).is_none());
    }

    #[test]
    fn test_cameras_follow_viewport() {
        let mut scene = Scene::new("Test");
        let secondary = scene.create_entity("Secondary");
        scene
            .add_component(secondary, CameraComponent { primary: false, ..Default::default() })
            .unwrap();
        let fixed = scene.create_entity("Main");
        scene
            .add_component(
                fixed,
                CameraComponent {
                    fixed_aspect_ratio: true,
                    aspect_ratio: 1.0,
                    ..Default::default()
                },
            )
            .unwrap();

        scene.on_viewport_resize(800, 400);

        assert_eq!(scene.primary_camera_entity(), Some(fixed));
        assert_eq!(scene.viewport(), (800, 400));
        assert_eq!(scene.get_component::<CameraComponent>(secondary).unwrap().aspect_ratio, 2.0);
        assert_eq!(scene.get_component::<CameraComponent>(fixed).unwrap().aspect_ratio, 1.0);
    }

    #[test]
    fn test_state_transitions() {
        let (host, _) = RecordingHost::new(&[]);
        let mut scene = Scene::with_host("Test", SceneConfig::default(), Box::new(host));

        assert_eq!(scene.state(), SceneState::Editing);
        assert!(matches!(scene.update_runtime(DT), Err(SceneError::InvalidState(_))));
        assert!(matches!(scene.stop_runtime(), Err(SceneError::InvalidState(_))));

        scene.start_runtime().unwrap();
        assert!(scene.is_running());
        assert!(matches!(scene.start_runtime(), Err(SceneError::InvalidState(_))));

        scene.stop_runtime().unwrap();
        assert_eq!(scene.state(), SceneState::Editing);
        assert!(scene.physics().world().is_none());
    }

    #[test]
    fn test_invalid_gravity_keeps_scene_editing() {
        let config = SceneConfig::default().with_gravity(f32::NAN, 0.0);
        assert!(matches!(Scene::with_config("Test", config.clone()), Err(SceneError::Config(_))));

        let (host, _) = RecordingHost::new(&[]);
        let mut scene = Scene::with_host("Test", config, Box::new(host));
        assert!(matches!(scene.start_runtime(), Err(SceneError::Physics(_))));
        assert_eq!(scene.state(), SceneState::Editing);
    }

    #[derive(Clone)]
    struct Logger {
        log: Rc<RefCell<Vec<String>>>,
        destroy_self_on_update: bool,
    }

    impl NativeScript for Logger {
        fn on_create(&mut self, _scene: &mut Scene, _entity: Entity) {
            self.log.borrow_mut().push("create".to_string());
        }

        fn on_update(&mut self, scene: &mut Scene, entity: Entity, _dt: f32) {
            self.log.borrow_mut().push("update".to_string());
            if self.destroy_self_on_update {
                scene.destroy_entity(entity).unwrap();
            }
        }

        fn on_destroy(&mut self, _scene: &mut Scene, _entity: Entity) {
            self.log.borrow_mut().push("destroy".to_string());
        }
    }

    #[test]
    fn test_native_script_lifecycle() {
        let mut scene = Scene::new("Test");
        let log = Rc::new(RefCell::new(Vec::new()));
        let logger = Logger {
            log: Rc::clone(&log),
            destroy_self_on_update: false,
        };
        let entity = scene.create_entity("Native");
        scene
            .add_component(entity, NativeScriptComponent::from_factory(move || Box::new(logger.clone())))
            .unwrap();

        scene.start_runtime().unwrap();
        assert!(log.borrow().is_empty());
        scene.update_runtime(DT).unwrap();
        scene.update_runtime(DT).unwrap();
        assert!(scene.get_component::<NativeScriptComponent>(entity).unwrap().is_instantiated());
        scene.stop_runtime().unwrap();

        assert_eq!(*log.borrow(), vec!["create", "update", "update", "destroy"]);
        assert!(!scene.get_component::<NativeScriptComponent>(entity).unwrap().is_instantiated());
    }

    #[test]
    fn test_native_script_can_destroy_its_entity() {
        let mut scene = Scene::new("Test");
        let log = Rc::new(RefCell::new(Vec::new()));
        let logger = Logger {
            log: Rc::clone(&log),
            destroy_self_on_update: true,
        };
        let entity = scene.create_entity("Native");
        scene
            .add_component(entity, NativeScriptComponent::from_factory(move || Box::new(logger.clone())))
            .unwrap();

        scene.start_runtime().unwrap();
        scene.update_runtime(DT).unwrap();
        scene.update_runtime(DT).unwrap();
        scene.stop_runtime().unwrap();

        assert!(!scene.contains(entity));
        assert_eq!(*log.borrow(), vec!["create", "update"]);
    }

    #[test]
    fn test_copy_for_runtime_keeps_ids_and_drops_handles() {
        let mut scene = Scene::new("Editor");
        let ground = spawn_ground(&mut scene);
        let scripted = scene.create_entity("Scripted");
        scene
            .add_component(scripted, ScriptComponent::new("Game.Player"))
            .unwrap();
        scene.rebuild_physics().unwrap();

        let (host, _) = RecordingHost::new(&["Game.Player"]);
        let copy = scene.copy_for_runtime(Box::new(host)).unwrap();

        assert_eq!(copy.entity_count(), 2);
        let copied_ground = copy.entity_by_uuid(scene.uuid_of(ground).unwrap()).unwrap();
        assert_eq!(copy.entity(copied_ground).unwrap().tag(), "Ground");
        assert!(copy
            .get_component::<RigidBody2DComponent>(copied_ground)
            .unwrap()
            .runtime_body
            .is_none());
        let copied_script = copy.find_entity_by_name("Scripted").unwrap();
        assert_eq!(
            copy.get_component::<ScriptComponent>(copied_script).unwrap().class_name,
            "Game.Player"
        );
        assert_eq!(copy.state(), SceneState::Editing);
    }
}
