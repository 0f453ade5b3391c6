//! Scene: entity lifecycle and the runtime loop

use std::any::TypeId;
use std::collections::HashMap;

use super::context::{snapshot, CollisionDispatcher, DeferredAction, SceneContext};
use super::{EntityMut, EntityRef, SceneError};
use crate::config::SceneConfig;
use crate::ecs::components::{
    CameraComponent, ComponentBundle, ComponentKind, IdComponent, NativeScriptComponent, TagComponent,
    TransformComponent, Uuid,
};
use crate::ecs::{Component, EcsError, Entity, Query, Registry};
use crate::foundation::math::Vec2;
use crate::physics::{BodyType, PhysicsBridge};
use crate::script::{RhaiHost, ScriptHost, ScriptValue, ScriptingBridge};

/// Runtime state of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SceneState {
    /// Authoring; nothing simulates
    #[default]
    Editing,
    /// Physics and scripts advance every frame
    Running,
}

/// A set of entities with physics and scripting attached
pub struct Scene {
    name: String,
    config: SceneConfig,
    state: SceneState,
    registry: Registry,
    index: HashMap<Uuid, Entity>,
    physics: PhysicsBridge,
    scripting: ScriptingBridge,
    deferred: Vec<DeferredAction>,
    viewport: (u32, u32),
}

impl Scene {
    /// Create an empty scene with the default configuration and a rhai host
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_host(name, SceneConfig::default(), Box::new(RhaiHost::new()))
    }

    /// Create an empty scene whose rhai host follows `config`
    pub fn with_config(name: impl Into<String>, config: SceneConfig) -> Result<Self, SceneError> {
        config.validate()?;
        let host = RhaiHost::from_config(&config)?;
        Ok(Self::with_host(name, config, Box::new(host)))
    }

    /// Create an empty scene around an existing scripting host
    pub fn with_host(name: impl Into<String>, config: SceneConfig, host: Box<dyn ScriptHost>) -> Self {
        let physics = PhysicsBridge::new(&config);
        Self {
            name: name.into(),
            config,
            state: SceneState::Editing,
            registry: Registry::new(),
            index: HashMap::new(),
            physics,
            scripting: ScriptingBridge::new(host),
            deferred: Vec::new(),
            viewport: (0, 0),
        }
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the scene was built with
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Current runtime state
    pub fn state(&self) -> SceneState {
        self.state
    }

    /// Whether the runtime is started
    pub fn is_running(&self) -> bool {
        self.state == SceneState::Running
    }

    /// Component store, read-only
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Physics bridge
    pub fn physics(&self) -> &PhysicsBridge {
        &self.physics
    }

    #[cfg(test)]
    pub(crate) fn physics_mut(&mut self) -> &mut PhysicsBridge {
        &mut self.physics
    }

    /// Scripting bridge
    pub fn scripting(&self) -> &ScriptingBridge {
        &self.scripting
    }

    /// Work waiting for the physics world to unlock
    pub fn deferred(&self) -> &[DeferredAction] {
        &self.deferred
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.registry.len()
    }

    // ----- Entity lifecycle -----

    /// Create an entity with a fresh id
    ///
    /// An empty name becomes `"Entity <id>"`.
    pub fn create_entity(&mut self, name: &str) -> Entity {
        let mut id = Uuid::new();
        while id.is_nil() || self.index.contains_key(&id) {
            id = Uuid::new();
        }
        self.spawn(id, name)
    }

    /// Create an entity with a given id
    pub fn create_entity_with_uuid(&mut self, id: Uuid, name: &str) -> Result<Entity, SceneError> {
        if self.index.contains_key(&id) {
            return Err(SceneError::DuplicateUuid(id));
        }
        Ok(self.spawn(id, name))
    }

    fn spawn(&mut self, id: Uuid, name: &str) -> Entity {
        let entity = self.registry.create();
        let tag = if name.is_empty() {
            format!("Entity {id}")
        } else {
            name.to_string()
        };
        if let Err(err) = attach_core(&mut self.registry, entity, id, tag) {
            log::error!("Failed to attach core components to {entity:?}: {err}");
        }
        self.index.insert(id, entity);
        log::trace!("Created entity {id} as {entity:?}");
        entity
    }

    /// Copy an entity; the copy's tag gets a `" (2)"` suffix
    ///
    /// Every component except identity and tag is copied by value. Physics and
    /// script handles are not; the copy gets its own on the next rebuild or
    /// runtime start.
    pub fn duplicate_entity(&mut self, source: Entity) -> Result<Entity, SceneError> {
        if !self.registry.contains(source) {
            return Err(SceneError::NoSuchEntity(source));
        }
        let tag = self
            .registry
            .get_component::<TagComponent>(source)
            .map_or_else(String::new, |tag| format!("{} (2)", tag.tag));
        let bundle = ComponentBundle::capture(&self.registry, source);
        let copy = self.create_entity(&tag);
        bundle.apply(&mut self.registry, copy)?;
        Ok(copy)
    }

    /// Destroy an entity with all its components
    ///
    /// While the physics world is stepping the destruction is queued and runs
    /// once the step has returned, within the same frame. Contacts the entity
    /// was touching end with `on_collision_leave` on both sides before its
    /// `on_destroy` runs.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), SceneError> {
        if !self.registry.contains(entity) {
            return Err(SceneError::NoSuchEntity(entity));
        }
        let running = self.is_running();
        let (scripting, mut ctx) = self.split();
        if let Some(id) = ctx.destroy_entity(entity) {
            if running {
                scripting.entity_destroyed(id, &mut ctx);
            }
        }
        Ok(())
    }

    /// Whether the entity is alive
    pub fn contains(&self, entity: Entity) -> bool {
        self.registry.contains(entity)
    }

    /// Read-only handle to a live entity
    pub fn entity(&self, entity: Entity) -> Option<EntityRef<'_>> {
        self.contains(entity).then(|| EntityRef::new(self, entity))
    }

    /// Mutable handle to a live entity
    pub fn entity_mut(&mut self, entity: Entity) -> Option<EntityMut<'_>> {
        if !self.contains(entity) {
            return None;
        }
        Some(EntityMut::new(self, entity))
    }

    /// Entity carrying an id
    pub fn entity_by_uuid(&self, id: Uuid) -> Option<Entity> {
        self.index
            .get(&id)
            .copied()
            .filter(|&entity| self.registry.contains(entity))
    }

    /// Id of an entity
    pub fn uuid_of(&self, entity: Entity) -> Option<Uuid> {
        self.registry.get_component::<IdComponent>(entity).map(|id| id.id)
    }

    /// First entity whose tag equals `name`
    pub fn find_entity_by_name(&self, name: &str) -> Option<Entity> {
        self.registry.entities().find(|&entity| {
            self.registry
                .get_component::<TagComponent>(entity)
                .is_some_and(|tag| tag.tag == name)
        })
    }

    // ----- Components -----

    /// Attach a component; fails if one of this kind is present
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> Result<&mut T, SceneError> {
        Ok(self.registry.add_component(entity, component)?)
    }

    /// Component lookup tolerating absence
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.registry.get_component::<T>(entity)
    }

    /// Mutable component lookup tolerating absence
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.registry.get_component_mut::<T>(entity)
    }

    /// Direct getter; a missing component asserts in debug builds
    pub fn component<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.registry.component::<T>(entity)
    }

    /// Whether the entity owns a `T`
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.registry.has_component::<T>(entity)
    }

    /// Detach a component
    ///
    /// Identity, tag and transform are permanent. Physics-backed components
    /// release their body or fixture first.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<Option<T>, SceneError> {
        let permanent = [
            TypeId::of::<IdComponent>(),
            TypeId::of::<TagComponent>(),
            TypeId::of::<TransformComponent>(),
        ];
        if permanent.contains(&TypeId::of::<T>()) {
            return Err(EcsError::Unsupported(std::any::type_name::<T>().to_string()).into());
        }
        if !self.registry.contains(entity) {
            return Err(SceneError::NoSuchEntity(entity));
        }
        if let Some(kind) = ComponentKind::of::<T>() {
            self.release_component(entity, kind)?;
        }
        Ok(self.registry.remove_component::<T>(entity))
    }

    /// Attach a default component of a kind
    pub fn add_component_by_kind(&mut self, entity: Entity, kind: ComponentKind) -> Result<(), SceneError> {
        Ok(kind.add_default(&mut self.registry, entity)?)
    }

    /// Whether the entity owns a component of a kind
    pub fn has_component_by_kind(&self, entity: Entity, kind: ComponentKind) -> bool {
        kind.is_present(&self.registry, entity)
    }

    /// Detach a component by kind; returns whether one was present
    pub fn remove_component_by_kind(&mut self, entity: Entity, kind: ComponentKind) -> Result<bool, SceneError> {
        if !self.registry.contains(entity) {
            return Err(SceneError::NoSuchEntity(entity));
        }
        self.release_component(entity, kind)?;
        Ok(kind.remove(&mut self.registry, entity)?)
    }

    /// Free what a component owns outside the registry
    fn release_component(&mut self, entity: Entity, kind: ComponentKind) -> Result<(), SceneError> {
        let running = self.is_running();
        let id = self.uuid_of(entity);
        let (scripting, mut ctx) = self.split();
        ctx.release_physics(entity, kind)?;
        if !running {
            return Ok(());
        }
        scripting.contacts_ended(&mut ctx);
        if let (ComponentKind::Script, Some(id)) = (kind, id) {
            scripting.detach(id, &mut ctx);
        }
        Ok(())
    }

    /// Entities owning every component in `Q`
    pub fn view<Q: Query>(&self) -> Vec<Entity> {
        self.registry.view::<Q>()
    }

    /// Visit every entity owning the components in `Q`
    pub fn each<Q: Query>(&self, f: impl FnMut(Entity, Q::Item<'_>)) {
        self.registry.each::<Q>(f);
    }

    // ----- Camera -----

    /// First camera flagged primary
    pub fn primary_camera_entity(&self) -> Option<Entity> {
        self.registry
            .view::<(CameraComponent,)>()
            .into_iter()
            .find(|&entity| {
                self.registry
                    .get_component::<CameraComponent>(entity)
                    .is_some_and(|camera| camera.primary)
            })
    }

    /// Propagate a viewport size to every camera without a fixed aspect ratio
    pub fn on_viewport_resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.registry
            .each_mut::<CameraComponent>(|_, camera| camera.set_viewport_size(width, height));
    }

    /// Last viewport size
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    // ----- Runtime -----

    /// Enter the running state
    ///
    /// Loads the script module, builds the physics world, then creates script
    /// instances. A module or physics failure is fatal and leaves the scene
    /// editing.
    pub fn start_runtime(&mut self) -> Result<(), SceneError> {
        if self.is_running() {
            return Err(SceneError::InvalidState("runtime already started"));
        }
        self.scripting.ensure_loaded()?;
        self.physics.rebuild(&mut self.registry)?;

        self.state = SceneState::Running;
        let (scripting, mut ctx) = self.split();
        scripting.on_runtime_start(&mut ctx);
        log::info!(
            "Scene '{}' running: {} entities, {} script instances",
            self.name,
            self.registry.len(),
            self.scripting.instance_count()
        );
        Ok(())
    }

    /// Return to editing
    ///
    /// Native and script instances get `on_destroy` and are dropped, and the
    /// physics world is discarded.
    pub fn stop_runtime(&mut self) -> Result<(), SceneError> {
        if !self.is_running() {
            return Err(SceneError::InvalidState("runtime not started"));
        }

        for entity in self.registry.view::<(NativeScriptComponent,)>() {
            let instance = self
                .registry
                .get_component_mut::<NativeScriptComponent>(entity)
                .and_then(|component| component.instance.take());
            if let Some(mut instance) = instance {
                instance.on_destroy(self, entity);
            }
        }

        let (scripting, mut ctx) = self.split();
        scripting.on_runtime_stop(&mut ctx);
        self.physics.clear(&mut self.registry);
        if !self.deferred.is_empty() {
            log::warn!("Discarding {} deferred actions on stop", self.deferred.len());
            self.deferred.clear();
        }
        self.state = SceneState::Editing;
        log::info!("Scene '{}' stopped", self.name);
        Ok(())
    }

    /// Advance one running frame
    pub fn update_runtime(&mut self, dt: f32) -> Result<(), SceneError> {
        if !self.is_running() {
            return Err(SceneError::InvalidState("update_runtime while editing"));
        }
        self.poll_reload();

        self.update_native_scripts(dt);

        self.scripting
            .refresh_world(&self.registry, snapshot(&self.registry, &self.physics));
        let mut dispatcher = CollisionDispatcher {
            scripting: &mut self.scripting,
            deferred: &mut self.deferred,
        };
        self.physics.step(dt, &mut self.registry, &mut dispatcher);

        self.drain_deferred();

        let (scripting, mut ctx) = self.split();
        scripting.on_update(&mut ctx, dt);
        log::trace!("Frame done: dt {dt}, {} entities", self.registry.len());
        Ok(())
    }

    /// Editor frame: only picks up script module changes
    pub fn update_editor(&mut self) {
        self.poll_reload();
    }

    /// Rebuild the physics world from the components
    ///
    /// Allowed while editing to preview collider placement.
    pub fn rebuild_physics(&mut self) -> Result<(), SceneError> {
        Ok(self.physics.rebuild(&mut self.registry)?)
    }

    /// Load the script module if it is not loaded yet
    pub fn load_scripts(&mut self) -> Result<(), SceneError> {
        Ok(self.scripting.ensure_loaded()?)
    }

    /// Reload the script module now
    pub fn reload_scripts(&mut self) -> Result<(), SceneError> {
        Ok(self.scripting.reload()?)
    }

    fn poll_reload(&mut self) {
        if let Err(err) = self.scripting.poll_reload() {
            log::error!("Script reload failed: {err}");
        }
    }

    fn update_native_scripts(&mut self, dt: f32) {
        for entity in self.registry.view::<(NativeScriptComponent,)>() {
            let Some(component) = self.registry.get_component_mut::<NativeScriptComponent>(entity) else {
                continue;
            };
            let (mut instance, created) = match component.instance.take() {
                Some(instance) => (instance, false),
                None => (component.instantiate(), true),
            };
            if created {
                instance.on_create(self, entity);
            }
            if self.registry.contains(entity) {
                instance.on_update(self, entity, dt);
            }
            if let Some(component) = self.registry.get_component_mut::<NativeScriptComponent>(entity) {
                component.instance = Some(instance);
            }
        }
    }

    fn drain_deferred(&mut self) {
        while !self.deferred.is_empty() {
            for action in std::mem::take(&mut self.deferred) {
                match action {
                    DeferredAction::Destroy(entity) => {
                        if let Err(err) = self.destroy_entity(entity) {
                            log::debug!("Deferred destroy skipped: {err}");
                        }
                    }
                    DeferredAction::Command(command) => {
                        let (scripting, mut ctx) = self.split();
                        scripting.apply(command, &mut ctx);
                    }
                }
            }
        }
    }

    // ----- Scripts -----

    /// Read a script field; needs the script module loaded
    pub fn script_field(&self, entity: Entity, name: &str) -> Result<ScriptValue, SceneError> {
        Ok(self.scripting.get_field(&self.registry, entity, name)?)
    }

    /// Write a script field, live or stored for the next start
    pub fn set_script_field(&mut self, entity: Entity, name: &str, value: ScriptValue) -> Result<(), SceneError> {
        self.scripting.ensure_loaded()?;
        Ok(self.scripting.set_field(&mut self.registry, entity, name, value)?)
    }

    /// Every field of the entity's script with its current value
    pub fn script_fields(&self, entity: Entity) -> Result<Vec<(String, ScriptValue)>, SceneError> {
        Ok(self.scripting.field_values(&self.registry, entity)?)
    }

    // ----- Rigid bodies -----

    /// Apply an impulse at a world point
    pub fn apply_linear_impulse(&mut self, entity: Entity, impulse: Vec2, point: Vec2) -> Result<(), SceneError> {
        Ok(self.physics.apply_linear_impulse(&self.registry, entity, impulse, point)?)
    }

    /// Apply an impulse through the centre of mass
    pub fn apply_linear_impulse_to_center(&mut self, entity: Entity, impulse: Vec2) -> Result<(), SceneError> {
        Ok(self.physics.apply_linear_impulse_to_center(&self.registry, entity, impulse)?)
    }

    /// Linear velocity of the entity's live body
    pub fn linear_velocity(&self, entity: Entity) -> Result<Vec2, SceneError> {
        Ok(self.physics.linear_velocity(&self.registry, entity)?)
    }

    /// Change the body type on the component and any live body
    pub fn set_body_type(&mut self, entity: Entity, body_type: BodyType) -> Result<(), SceneError> {
        Ok(self.physics.set_body_type(&mut self.registry, entity, body_type)?)
    }

    // ----- Copies -----

    /// Copy this scene into a new editing scene using `host` for scripts
    ///
    /// Ids, tags and component values carry over; runtime handles do not.
    pub fn copy_for_runtime(&self, host: Box<dyn ScriptHost>) -> Result<Self, SceneError> {
        let mut copy = Self::with_host(self.name.clone(), self.config.clone(), host);
        copy.viewport = self.viewport;
        for entity in self.registry.entities() {
            let (Some(id), Some(tag)) = (
                self.registry.get_component::<IdComponent>(entity),
                self.registry.get_component::<TagComponent>(entity),
            ) else {
                continue;
            };
            let target = copy.create_entity_with_uuid(id.id, &tag.tag)?;
            ComponentBundle::capture(&self.registry, entity).apply(&mut copy.registry, target)?;
        }
        Ok(copy)
    }

    fn split(&mut self) -> (&mut ScriptingBridge, SceneContext<'_>) {
        (
            &mut self.scripting,
            SceneContext {
                registry: &mut self.registry,
                physics: &mut self.physics,
                index: &mut self.index,
                deferred: &mut self.deferred,
                ended: Vec::new(),
            },
        )
    }
}

fn attach_core(registry: &mut Registry, entity: Entity, id: Uuid, tag: String) -> Result<(), EcsError> {
    registry.add_component(entity, IdComponent { id })?;
    registry.add_component(entity, TagComponent::new(tag))?;
    registry.add_component(entity, TransformComponent::default())?;
    Ok(())
}
