//! Scripting bridge
//!
//! Owns one host instance per script-bearing entity for the duration of a
//! run. Every hook is followed by a flush: commands the script queued on the
//! [`ScriptWorld`] are handed to the scene through [`SceneAccess::apply`].
//! Collision hooks are the exception; they run while physics is locked, so
//! their commands stay queued for the scene to defer.

use std::collections::BTreeMap;

use super::host::{hooks, CollisionInfo, FieldInfo, HookArg, InstanceHandle, ScriptHost};
use super::{EntitySnapshot, SceneCommand, ScriptError, ScriptValue, ScriptWorld};
use crate::ecs::components::{ComponentKind, IdComponent, ScriptComponent, Uuid};
use crate::ecs::{Entity, Registry};
use crate::physics::ContactEvent;

/// What the bridge needs from the scene while running hooks
pub trait SceneAccess {
    /// Component store
    fn registry(&self) -> &Registry;

    /// Component store, mutably
    fn registry_mut(&mut self) -> &mut Registry;

    /// Apply a script command; returns the id of an entity it destroyed
    fn apply(&mut self, command: SceneCommand) -> Option<Uuid>;

    /// Current view of every entity, in enumeration order
    fn snapshot(&self) -> Vec<(Uuid, EntitySnapshot)>;

    /// Touching contacts that ended outside a step since the last call
    ///
    /// Removing a body or collider ends its contacts immediately.
    fn take_ended_contacts(&mut self) -> Vec<ContactEvent> {
        Vec::new()
    }
}

/// Which collision hook to invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionPhase {
    /// Contact began
    Enter,
    /// Contact ended
    Leave,
}

impl CollisionPhase {
    /// Hook name on the script class
    pub const fn hook(self) -> &'static str {
        match self {
            Self::Enter => hooks::ON_COLLISION_ENTER,
            Self::Leave => hooks::ON_COLLISION_LEAVE,
        }
    }
}

/// Relays lifecycle and collision events to script instances
pub struct ScriptingBridge {
    host: Box<dyn ScriptHost>,
    world: ScriptWorld,
    instances: BTreeMap<Uuid, InstanceHandle>,
}

impl ScriptingBridge {
    /// Wrap a host and bind it to a fresh [`ScriptWorld`]
    pub fn new(mut host: Box<dyn ScriptHost>) -> Self {
        let world = ScriptWorld::new();
        host.bind_world(world.clone());
        Self {
            host,
            world,
            instances: BTreeMap::new(),
        }
    }

    /// The scripting host
    pub fn host(&self) -> &dyn ScriptHost {
        self.host.as_ref()
    }

    /// Shared world scripts talk to
    pub fn world(&self) -> &ScriptWorld {
        &self.world
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Live instance of an entity
    pub fn instance(&self, entity: Uuid) -> Option<InstanceHandle> {
        self.instances.get(&entity).copied()
    }

    /// Replace the snapshot scripts read, adding each live instance's fields
    pub fn refresh_world(&self, registry: &Registry, entities: Vec<(Uuid, EntitySnapshot)>) {
        self.world.refresh(entities);
        registry.each::<(IdComponent, ScriptComponent)>(|_, (id, script)| {
            let (Some(&instance), Some(fields)) = (self.instances.get(&id.id), self.host.fields(&script.class_name))
            else {
                return;
            };
            let values = fields
                .into_iter()
                .filter_map(|field| {
                    let value = self.host.get_field(instance, &field.name).ok()?;
                    Some((field.name, value))
                })
                .collect();
            self.world.set_script_fields(id.id, values);
        });
    }

    /// Load the module unless it already is
    pub fn ensure_loaded(&mut self) -> Result<(), ScriptError> {
        if self.host.is_loaded() {
            return Ok(());
        }
        self.host.load()
    }

    /// Reload unconditionally
    pub fn reload(&mut self) -> Result<(), ScriptError> {
        self.host.load()?;
        log::info!("Script module reloaded ({} classes)", self.host.class_names().len());
        Ok(())
    }

    /// Apply pending module changes reported by the host's watcher
    pub fn poll_reload(&mut self) -> Result<bool, ScriptError> {
        self.host.poll_reload()
    }

    /// Instantiate every resolvable script and run its `on_create`
    ///
    /// An unresolved class is logged and skipped; the other entities are still
    /// processed.
    pub fn on_runtime_start(&mut self, ctx: &mut dyn SceneAccess) {
        let mut created = Vec::new();
        for entity in ctx.registry().view::<(IdComponent, ScriptComponent)>() {
            let registry = ctx.registry();
            let (Some(id), Some(script)) = (
                registry.get_component::<IdComponent>(entity),
                registry.get_component::<ScriptComponent>(entity),
            ) else {
                continue;
            };
            let id = id.id;
            if !self.host.has_class(&script.class_name) {
                log::error!("Entity {id}: script class '{}' is not loaded", script.class_name);
                continue;
            }

            let instance = match self.host.instantiate(&script.class_name, id) {
                Ok(instance) => instance,
                Err(err) => {
                    log::error!("Entity {id}: {err}");
                    continue;
                }
            };
            for (name, value) in &script.fields {
                if let Err(err) = self.host.set_field(instance, name, value.clone()) {
                    log::warn!("Entity {id}: stored field not applied: {err}");
                }
            }
            if let Some(script) = ctx.registry_mut().get_component_mut::<ScriptComponent>(entity) {
                script.instance = Some(instance);
            }
            self.instances.insert(id, instance);
            created.push(id);
        }

        self.refresh_world(ctx.registry(), ctx.snapshot());
        for id in created {
            self.call(id, hooks::ON_CREATE, &[]);
            self.flush(ctx);
        }
    }

    /// Run `on_update(dt)` on every instance in enumeration order
    pub fn on_update(&mut self, ctx: &mut dyn SceneAccess, dt: f32) {
        self.refresh_world(ctx.registry(), ctx.snapshot());

        let order: Vec<Uuid> = ctx
            .registry()
            .view::<(IdComponent, ScriptComponent)>()
            .into_iter()
            .filter_map(|entity| ctx.registry().get_component::<IdComponent>(entity).map(|id| id.id))
            .collect();
        for id in order {
            // Destroyed by an earlier hook this pass
            if !self.instances.contains_key(&id) {
                continue;
            }
            self.call(id, hooks::ON_UPDATE, &[HookArg::Float(dt)]);
            self.flush(ctx);
        }
    }

    /// Run `on_destroy` on every instance, then release them all
    pub fn on_runtime_stop(&mut self, ctx: &mut dyn SceneAccess) {
        let ids: Vec<Uuid> = self.instances.keys().copied().collect();
        for id in ids {
            self.call(id, hooks::ON_DESTROY, &[]);
        }
        // The scene is shutting down; late writes are dropped
        let dropped = self.world.take_commands();
        if !dropped.is_empty() {
            log::debug!("Dropped {} script commands issued while stopping", dropped.len());
        }

        for (_, instance) in std::mem::take(&mut self.instances) {
            self.host.release(instance);
        }
        ctx.registry_mut().each_mut::<ScriptComponent>(|_, script| script.instance = None);
        log::debug!("Released script instances; host holds {}", self.host.instance_count());
    }

    /// Notify both sides of a contact change
    ///
    /// Each side that still owns an instance receives the same contact
    /// geometry plus the other side's id. Commands issued by the hooks are
    /// left queued on the world.
    pub fn dispatch_collision(&mut self, a: Uuid, b: Uuid, info: &CollisionInfo, phase: CollisionPhase) {
        for (this, other) in [(a, b), (b, a)] {
            if !self.instances.contains_key(&this) {
                continue;
            }
            let args = [HookArg::Collision(info.clone()), HookArg::Entity(other)];
            self.call(this, phase.hook(), &args);
        }
    }

    /// Forward a physics contact event to both sides
    pub fn dispatch_contact(&mut self, event: &ContactEvent, phase: CollisionPhase) {
        let a = Uuid::from_raw(event.user_data_a);
        let b = Uuid::from_raw(event.user_data_b);
        self.dispatch_collision(a, b, &CollisionInfo::from(&event.manifold), phase);
    }

    /// Report contacts ended by a body or collider removal, then apply what
    /// the leave hooks queued
    pub fn contacts_ended(&mut self, ctx: &mut dyn SceneAccess) {
        self.end_contacts(ctx);
        self.flush(ctx);
    }

    /// An entity was destroyed mid-run
    ///
    /// Its ended contacts are reported first, while the victim still has its
    /// instance and snapshot. Then it gets `on_destroy` and is released.
    pub fn entity_destroyed(&mut self, id: Uuid, ctx: &mut dyn SceneAccess) {
        self.end_contacts(ctx);
        self.retire(id);
        self.world.forget(id);
        self.flush(ctx);
    }

    /// An entity lost its script component mid-run
    pub fn detach(&mut self, id: Uuid, ctx: &mut dyn SceneAccess) {
        self.retire(id);
        self.flush(ctx);
    }

    /// Apply a command queued earlier, then anything its side effects queue
    pub fn apply(&mut self, command: SceneCommand, ctx: &mut dyn SceneAccess) {
        self.apply_one(command, ctx);
        self.flush(ctx);
    }

    /// Commands scripts queued that have not been applied yet
    pub fn take_commands(&self) -> Vec<SceneCommand> {
        self.world.take_commands()
    }

    /// Read a script field of an entity
    ///
    /// Goes to the live instance when there is one, otherwise to the value
    /// stored on the component, otherwise to the class default.
    pub fn get_field(&self, registry: &Registry, entity: Entity, name: &str) -> Result<ScriptValue, ScriptError> {
        let (id, script) = script_of(registry, entity)?;
        if let Some(&instance) = self.instances.get(&id) {
            return self.host.get_field(instance, name);
        }
        let field = self.declared_field(&script.class_name, name)?;
        Ok(script.fields.get(name).cloned().unwrap_or(field.default))
    }

    /// Write a script field of an entity
    ///
    /// Without a live instance the value is type-checked against the class and
    /// stored on the component until the next runtime start.
    pub fn set_field(
        &mut self,
        registry: &mut Registry,
        entity: Entity,
        name: &str,
        value: ScriptValue,
    ) -> Result<(), ScriptError> {
        let (id, script) = script_of(registry, entity)?;
        if let Some(&instance) = self.instances.get(&id) {
            return self.host.set_field(instance, name, value);
        }

        let field = self.declared_field(&script.class_name, name)?;
        let found = value.type_name();
        let value = field.default.coerce(value).ok_or_else(|| ScriptError::TypeMismatch {
            field: name.to_string(),
            expected: field.default.type_name(),
            found,
        })?;
        if let Some(script) = registry.get_component_mut::<ScriptComponent>(entity) {
            script.fields.insert(name.to_string(), value);
        }
        Ok(())
    }

    /// Every declared field of an entity's script with its current value
    pub fn field_values(&self, registry: &Registry, entity: Entity) -> Result<Vec<(String, ScriptValue)>, ScriptError> {
        let (_, script) = script_of(registry, entity)?;
        let fields = self
            .host
            .fields(&script.class_name)
            .ok_or_else(|| ScriptError::ClassNotFound(script.class_name.clone()))?;
        fields
            .into_iter()
            .map(|field| {
                let value = self.get_field(registry, entity, &field.name)?;
                Ok((field.name, value))
            })
            .collect()
    }

    fn declared_field(&self, class: &str, name: &str) -> Result<FieldInfo, ScriptError> {
        self.host
            .fields(class)
            .ok_or_else(|| ScriptError::ClassNotFound(class.to_string()))?
            .into_iter()
            .find(|field| field.name == name)
            .ok_or_else(|| ScriptError::FieldNotFound {
                class: class.to_string(),
                field: name.to_string(),
            })
    }

    fn call(&mut self, id: Uuid, hook: &str, args: &[HookArg]) {
        let Some(&instance) = self.instances.get(&id) else {
            return;
        };
        if !self.host.has_method(instance, hook, args.len()) {
            return;
        }
        if let Err(err) = self.host.invoke(instance, hook, args) {
            log::error!("Entity {id}: {err}");
        }
    }

    /// Run `on_destroy` and release the instance, if there is one
    fn retire(&mut self, id: Uuid) {
        if !self.instances.contains_key(&id) {
            return;
        }
        self.call(id, hooks::ON_DESTROY, &[]);
        if let Some(instance) = self.instances.remove(&id) {
            self.host.release(instance);
        }
    }

    /// Apply queued commands until none are left
    ///
    /// A destroy runs the victim's `on_destroy`, which may queue more.
    fn flush(&mut self, ctx: &mut dyn SceneAccess) {
        loop {
            let commands = self.world.take_commands();
            if commands.is_empty() {
                return;
            }
            for command in commands {
                self.apply_one(command, ctx);
            }
        }
    }

    fn write_instance_field(&mut self, id: Uuid, name: &str, value: ScriptValue) {
        let Some(&instance) = self.instances.get(&id) else {
            log::warn!("Entity {id} has no script instance; field '{name}' not written");
            return;
        };
        if let Err(err) = self.host.set_field(instance, name, value) {
            log::warn!("Entity {id}: {err}");
        }
    }

    /// `on_collision_leave` for every contact the scene ended since the last call
    fn end_contacts(&mut self, ctx: &mut dyn SceneAccess) {
        for event in ctx.take_ended_contacts() {
            self.dispatch_contact(&event, CollisionPhase::Leave);
        }
    }

    fn apply_one(&mut self, command: SceneCommand, ctx: &mut dyn SceneAccess) {
        if let SceneCommand::SetScriptField(id, name, value) = command {
            self.write_instance_field(id, &name, value);
            return;
        }
        let detached = match command {
            SceneCommand::RemoveComponent(id, ComponentKind::Script) => Some(id),
            _ => None,
        };
        let destroyed = ctx.apply(command);
        self.end_contacts(ctx);
        if let Some(destroyed) = destroyed {
            self.retire(destroyed);
            self.world.forget(destroyed);
        } else if let Some(id) = detached {
            self.retire(id);
        }
    }
}

fn script_of(registry: &Registry, entity: Entity) -> Result<(Uuid, &ScriptComponent), ScriptError> {
    let id = registry
        .get_component::<IdComponent>(entity)
        .ok_or(ScriptError::InvalidInstance)?
        .id;
    let script = registry
        .get_component::<ScriptComponent>(entity)
        .ok_or(ScriptError::InvalidInstance)?;
    Ok((id, script))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::TagComponent;
    use crate::script::RhaiHost;
    use std::collections::HashMap;

    /// Minimal scene: applies tag changes and destroys, nothing else
    #[derive(Default)]
    struct TestScene {
        registry: Registry,
        index: HashMap<Uuid, Entity>,
        applied: Vec<SceneCommand>,
    }

    impl TestScene {
        fn spawn(&mut self, raw: u64, tag: &str, script: Option<ScriptComponent>) -> Entity {
            let entity = self.registry.create();
            let id = Uuid::from_raw(raw);
            self.registry.add_component(entity, IdComponent { id }).unwrap();
            self.registry.add_component(entity, TagComponent::new(tag)).unwrap();
            if let Some(script) = script {
                self.registry.add_component(entity, script).unwrap();
            }
            self.index.insert(id, entity);
            entity
        }
    }

    impl SceneAccess for TestScene {
        fn registry(&self) -> &Registry {
            &self.registry
        }

        fn registry_mut(&mut self) -> &mut Registry {
            &mut self.registry
        }

        fn apply(&mut self, command: SceneCommand) -> Option<Uuid> {
            self.applied.push(command.clone());
            let entity = *self.index.get(&command.target())?;
            match command {
                SceneCommand::Destroy(id) => {
                    self.index.remove(&id);
                    self.registry.destroy(entity);
                    Some(id)
                }
                SceneCommand::SetTag(_, tag) => {
                    self.registry.get_component_mut::<TagComponent>(entity)?.tag = tag;
                    None
                }
                _ => None,
            }
        }

        fn snapshot(&self) -> Vec<(Uuid, EntitySnapshot)> {
            let mut entities = Vec::new();
            self.registry.each::<(IdComponent, TagComponent)>(|_, (id, tag)| {
                entities.push((
                    id.id,
                    EntitySnapshot {
                        tag: tag.tag.clone(),
                        ..Default::default()
                    },
                ));
            });
            entities
        }
    }

    const TRACKER: &str = r#"
        let created = 0;
        let updates = 0;
        let hits = 0;
        let last_other = 0;

        fn on_create() { this.created += 1; }
        fn on_update(dt) { this.updates += 1; }
        fn on_destroy() { log("destroyed " + this.id); }
        fn on_collision_enter(info, other) {
            this.hits += 1;
            this.last_other = other;
        }
    "#;

    const SELF_DESTRUCT: &str = r#"
        fn on_update(dt) {
            set_entity_tag(this.id, "doomed");
            destroy_entity(this.id);
        }
    "#;

    fn bridge() -> ScriptingBridge {
        let mut host = RhaiHost::new();
        host.register_class_source("Test.Tracker", TRACKER).unwrap();
        host.register_class_source("Test.SelfDestruct", SELF_DESTRUCT).unwrap();
        host.load().unwrap();
        ScriptingBridge::new(Box::new(host))
    }

    fn field(bridge: &ScriptingBridge, scene: &TestScene, entity: Entity, name: &str) -> ScriptValue {
        bridge.get_field(&scene.registry, entity, name).unwrap()
    }

    #[test]
    fn test_start_skips_unresolved_classes() {
        let mut scene = TestScene::default();
        let missing = scene.spawn(1, "Ghost", Some(ScriptComponent::new("Test.Missing")));
        let tracked = scene.spawn(2, "Tracked", Some(ScriptComponent::new("Test.Tracker")));
        let mut bridge = bridge();

        bridge.on_runtime_start(&mut scene);

        assert_eq!(bridge.instance_count(), 1);
        assert!(scene.registry.component::<ScriptComponent>(missing).unwrap().instance.is_none());
        assert!(scene.registry.component::<ScriptComponent>(tracked).unwrap().instance.is_some());
        assert_eq!(field(&bridge, &scene, tracked, "created"), ScriptValue::Int(1));
    }

    #[test]
    fn test_buffered_fields_are_pushed_on_start() {
        let mut scene = TestScene::default();
        let entity = scene.spawn(1, "Tracked", Some(ScriptComponent::new("Test.Tracker")));
        let mut bridge = bridge();

        bridge
            .set_field(&mut scene.registry, entity, "hits", ScriptValue::Int(5))
            .unwrap();
        assert!(matches!(
            bridge.set_field(&mut scene.registry, entity, "nope", ScriptValue::Int(1)),
            Err(ScriptError::FieldNotFound { .. })
        ));
        assert_eq!(field(&bridge, &scene, entity, "hits"), ScriptValue::Int(5));
        assert_eq!(field(&bridge, &scene, entity, "updates"), ScriptValue::Int(0));

        bridge.on_runtime_start(&mut scene);
        bridge.on_update(&mut scene, 0.5);
        assert_eq!(field(&bridge, &scene, entity, "hits"), ScriptValue::Int(5));
        assert_eq!(field(&bridge, &scene, entity, "updates"), ScriptValue::Int(1));

        let values = bridge.field_values(&scene.registry, entity).unwrap();
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_collision_reaches_both_sides_with_other_id() {
        let mut scene = TestScene::default();
        let a = scene.spawn(10, "A", Some(ScriptComponent::new("Test.Tracker")));
        let b = scene.spawn(20, "B", Some(ScriptComponent::new("Test.Tracker")));
        let mut bridge = bridge();
        bridge.on_runtime_start(&mut scene);

        let info = CollisionInfo::default();
        bridge.dispatch_collision(Uuid::from_raw(10), Uuid::from_raw(20), &info, CollisionPhase::Enter);
        bridge.dispatch_collision(Uuid::from_raw(10), Uuid::from_raw(20), &info, CollisionPhase::Leave);
        // Unknown ids are ignored
        bridge.dispatch_collision(Uuid::from_raw(10), Uuid::from_raw(99), &info, CollisionPhase::Enter);

        assert_eq!(field(&bridge, &scene, a, "hits"), ScriptValue::Int(2));
        assert_eq!(field(&bridge, &scene, b, "hits"), ScriptValue::Int(1));
        assert_eq!(field(&bridge, &scene, b, "last_other"), ScriptValue::Int(10));
        assert_eq!(field(&bridge, &scene, a, "last_other"), ScriptValue::Int(99));
    }

    #[test]
    fn test_destroy_from_update_releases_instance() {
        let mut scene = TestScene::default();
        scene.spawn(1, "Doomed", Some(ScriptComponent::new("Test.SelfDestruct")));
        let survivor = scene.spawn(2, "Tracked", Some(ScriptComponent::new("Test.Tracker")));
        let mut bridge = bridge();
        bridge.on_runtime_start(&mut scene);

        bridge.on_update(&mut scene, 0.1);

        assert_eq!(
            scene.applied,
            vec![
                SceneCommand::SetTag(Uuid::from_raw(1), "doomed".to_string()),
                SceneCommand::Destroy(Uuid::from_raw(1)),
            ]
        );
        assert_eq!(scene.registry.len(), 1);
        assert_eq!(bridge.instance_count(), 1);
        assert!(!bridge.world().exists(Uuid::from_raw(1)));
        assert_eq!(field(&bridge, &scene, survivor, "updates"), ScriptValue::Int(1));
    }

    #[test]
    fn test_stop_releases_everything() {
        let mut scene = TestScene::default();
        let entity = scene.spawn(1, "Tracked", Some(ScriptComponent::new("Test.Tracker")));
        let mut bridge = bridge();

        bridge.on_runtime_stop(&mut scene);
        bridge.on_runtime_start(&mut scene);
        bridge.on_runtime_stop(&mut scene);

        assert_eq!(bridge.instance_count(), 0);
        assert_eq!(bridge.host().instance_count(), 0);
        assert!(scene.registry.component::<ScriptComponent>(entity).unwrap().instance.is_none());
    }
}
