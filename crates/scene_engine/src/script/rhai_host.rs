//! rhai-backed script host
//!
//! A class is one `.rhai` source. Its top-level `let` variables are the public
//! fields (names starting with `_` stay private) and its functions are the
//! hooks. Each instance is an object map bound as `this` when a hook runs, so
//! hooks read and write fields as `this.speed`; `this.id` holds the entity id.
//!
//! ```rhai
//! let speed = 2.0;
//!
//! fn on_update(dt) {
//!     let p = translation(this.id);
//!     set_translation(this.id, [p[0] + this.speed * dt, p[1], p[2]]);
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rhai::{CallFnOptions, Dynamic, Engine, ImmutableString, Map, Scope, AST, INT};
use slotmap::SlotMap;

use super::host::{FieldInfo, HookArg, InstanceHandle, ScriptHost};
use super::value::{entity_from_int, entity_to_int, float_array, number};
use super::watcher::{module_digest, module_sources, ModuleWatcher};
use super::{ColliderField, ScriptError, ScriptValue, ScriptWorld};
use crate::config::SceneConfig;
use crate::ecs::components::{ComponentKind, Uuid};
use crate::foundation::logging::SCRIPT_TARGET;
use crate::foundation::math::{Vec2, Vec3};
use crate::physics::BodyType;

/// Field holding the entity id on every instance
const ID_FIELD: &str = "id";

struct ClassDef {
    ast: AST,
    fields: Vec<FieldInfo>,
    methods: HashSet<(String, usize)>,
}

struct Instance {
    class_name: String,
    entity: Uuid,
    this: Dynamic,
}

/// Script host running rhai classes from a module directory and/or memory
pub struct RhaiHost {
    engine: Engine,
    module_dir: Option<PathBuf>,
    inline_sources: BTreeMap<String, String>,
    classes: BTreeMap<String, ClassDef>,
    instances: SlotMap<InstanceHandle, Instance>,
    watcher: Option<ModuleWatcher>,
    digest: Option<u64>,
    loaded: bool,
}

impl Default for RhaiHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiHost {
    /// Create a host with no module and no classes
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        Self {
            engine,
            module_dir: None,
            inline_sources: BTreeMap::new(),
            classes: BTreeMap::new(),
            instances: SlotMap::with_key(),
            watcher: None,
            digest: None,
            loaded: false,
        }
    }

    /// Build a host for the module named in the config, watching it if hot reload is on
    pub fn from_config(config: &SceneConfig) -> Result<Self, ScriptError> {
        let mut host = Self::new();
        if let Some(dir) = &config.script_module {
            host = host.with_module_dir(dir);
            if config.hot_reload {
                host.watch()?;
            }
        }
        Ok(host)
    }

    /// Builder pattern: Load classes from a directory of `.rhai` files
    pub fn with_module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = Some(dir.into());
        self
    }

    /// Module directory, if any
    pub fn module_dir(&self) -> Option<&Path> {
        self.module_dir.as_deref()
    }

    /// Start watching the module directory for changes
    pub fn watch(&mut self) -> Result<(), ScriptError> {
        let dir = self
            .module_dir
            .clone()
            .ok_or_else(|| ScriptError::ModuleUnavailable("no module directory set".to_string()))?;
        self.watcher = Some(ModuleWatcher::new(dir)?);
        Ok(())
    }

    /// Register a class from source text, replacing any class of that name
    ///
    /// Unlike module files, a compile error here is returned to the caller.
    pub fn register_class_source(&mut self, name: &str, source: &str) -> Result<(), ScriptError> {
        let class = self.compile_class(name, source)?;
        self.inline_sources.insert(name.to_string(), source.to_string());
        self.classes.insert(name.to_string(), class);
        self.rebind_instances();
        Ok(())
    }

    /// Reload only if the module content changed since the last load
    pub fn reload_if_changed(&mut self) -> Result<bool, ScriptError> {
        let Some(dir) = &self.module_dir else {
            return Ok(false);
        };
        let digest = module_digest(dir).map_err(|err| ScriptError::ModuleUnavailable(err.to_string()))?;
        if self.digest == Some(digest) {
            return Ok(false);
        }
        self.load()?;
        Ok(true)
    }

    fn compile_class(&self, name: &str, source: &str) -> Result<ClassDef, ScriptError> {
        let compile_error = |message: String| ScriptError::Compile {
            class: name.to_string(),
            message,
        };
        let ast = self.engine.compile(source).map_err(|err| compile_error(err.to_string()))?;

        let mut scope = Scope::new();
        self.engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|err| compile_error(err.to_string()))?;

        let mut fields = Vec::new();
        for (field, is_constant, value) in scope.iter() {
            if is_constant || field.starts_with('_') {
                continue;
            }
            if field == ID_FIELD {
                log::warn!("{name}: field '{ID_FIELD}' is reserved and ignored");
                continue;
            }
            match ScriptValue::from_dynamic(&value, None) {
                Some(default) => fields.push(FieldInfo {
                    name: field.to_string(),
                    default,
                }),
                None => log::warn!("{name}: field '{field}' has unsupported type {}", value.type_name()),
            }
        }

        let methods = ast
            .iter_functions()
            .map(|function| (function.name.to_string(), function.params.len()))
            .collect();
        Ok(ClassDef { ast, fields, methods })
    }

    /// Give surviving instances the fields their (possibly new) class declares
    fn rebind_instances(&mut self) {
        for instance in self.instances.values_mut() {
            let Some(class) = self.classes.get(&instance.class_name) else {
                log::warn!(
                    "Script class '{}' vanished; instance for entity {} is inert",
                    instance.class_name,
                    instance.entity
                );
                continue;
            };
            if let Some(mut this) = instance.this.write_lock::<Map>() {
                for field in &class.fields {
                    if !this.contains_key(field.name.as_str()) {
                        this.insert(field.name.as_str().into(), field.default.to_dynamic());
                    }
                }
            }
        }
    }

    fn instance(&self, handle: InstanceHandle) -> Result<&Instance, ScriptError> {
        self.instances.get(handle).ok_or(ScriptError::InvalidInstance)
    }

    fn declared_field(&self, instance: &Instance, name: &str) -> Result<&FieldInfo, ScriptError> {
        self.classes
            .get(&instance.class_name)
            .and_then(|class| class.fields.iter().find(|field| field.name == name))
            .ok_or_else(|| ScriptError::FieldNotFound {
                class: instance.class_name.clone(),
                field: name.to_string(),
            })
    }
}

impl ScriptHost for RhaiHost {
    fn bind_world(&mut self, world: ScriptWorld) {
        register_api(&mut self.engine, &world);
    }

    fn load(&mut self) -> Result<(), ScriptError> {
        let mut classes = BTreeMap::new();

        if let Some(dir) = &self.module_dir {
            let sources = module_sources(dir)
                .map_err(|err| ScriptError::ModuleUnavailable(format!("{}: {err}", dir.display())))?;
            for (name, path) in sources {
                let source = fs::read_to_string(&path)
                    .map_err(|err| ScriptError::ModuleUnavailable(format!("{}: {err}", path.display())))?;
                match self.compile_class(&name, &source) {
                    Ok(class) => {
                        classes.insert(name, class);
                    }
                    Err(err) => log::error!("{err}"),
                }
            }
            self.digest = module_digest(dir).ok();
        }

        for (name, source) in &self.inline_sources {
            match self.compile_class(name, source) {
                Ok(class) => {
                    classes.insert(name.clone(), class);
                }
                Err(err) => log::error!("{err}"),
            }
        }

        log::info!("Loaded {} script classes", classes.len());
        self.classes = classes;
        self.loaded = true;
        self.rebind_instances();
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    fn class_names(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    fn fields(&self, class: &str) -> Option<Vec<FieldInfo>> {
        self.classes.get(class).map(|class| class.fields.clone())
    }

    fn instantiate(&mut self, class: &str, entity: Uuid) -> Result<InstanceHandle, ScriptError> {
        let def = self
            .classes
            .get(class)
            .ok_or_else(|| ScriptError::ClassNotFound(class.to_string()))?;
        let mut this = Map::new();
        for field in &def.fields {
            this.insert(field.name.as_str().into(), field.default.to_dynamic());
        }
        this.insert(ID_FIELD.into(), Dynamic::from_int(entity_to_int(entity)));
        Ok(self.instances.insert(Instance {
            class_name: class.to_string(),
            entity,
            this: Dynamic::from_map(this),
        }))
    }

    fn has_method(&self, instance: InstanceHandle, name: &str, arity: usize) -> bool {
        self.instances
            .get(instance)
            .and_then(|instance| self.classes.get(&instance.class_name))
            .is_some_and(|class| class.methods.contains(&(name.to_string(), arity)))
    }

    fn invoke(&mut self, instance: InstanceHandle, name: &str, args: &[HookArg]) -> Result<(), ScriptError> {
        let instance = self.instances.get_mut(instance).ok_or(ScriptError::InvalidInstance)?;
        let Some(class) = self.classes.get(&instance.class_name) else {
            return Ok(());
        };
        if !class.methods.contains(&(name.to_string(), args.len())) {
            return Ok(());
        }

        let args: Vec<Dynamic> = args.iter().map(HookArg::to_dynamic).collect();
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut instance.this);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut Scope::new(), &class.ast, name, args)
            .map(|_| ())
            .map_err(|err| ScriptError::Runtime {
                class: instance.class_name.clone(),
                hook: name.to_string(),
                message: err.to_string(),
            })
    }

    fn get_field(&self, instance: InstanceHandle, name: &str) -> Result<ScriptValue, ScriptError> {
        let instance = self.instance(instance)?;
        let declared = self.declared_field(instance, name)?;
        let value = instance
            .this
            .read_lock::<Map>()
            .and_then(|this| this.get(name).cloned())
            .unwrap_or_else(|| declared.default.to_dynamic());
        ScriptValue::from_dynamic(&value, Some(&declared.default)).ok_or_else(|| ScriptError::TypeMismatch {
            field: name.to_string(),
            expected: declared.default.type_name(),
            found: "unsupported value",
        })
    }

    fn set_field(&mut self, handle: InstanceHandle, name: &str, value: ScriptValue) -> Result<(), ScriptError> {
        let instance = self.instance(handle)?;
        let declared = self.declared_field(instance, name)?;
        let found = value.type_name();
        let value = declared.default.coerce(value).ok_or_else(|| ScriptError::TypeMismatch {
            field: name.to_string(),
            expected: declared.default.type_name(),
            found,
        })?;

        let instance = self.instances.get_mut(handle).ok_or(ScriptError::InvalidInstance)?;
        if let Some(mut this) = instance.this.write_lock::<Map>() {
            this.insert(name.into(), value.to_dynamic());
        }
        Ok(())
    }

    fn release(&mut self, instance: InstanceHandle) {
        self.instances.remove(instance);
    }

    fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn poll_reload(&mut self) -> Result<bool, ScriptError> {
        let changed = self.watcher.as_ref().is_some_and(ModuleWatcher::poll);
        if !changed {
            return Ok(false);
        }
        let reloaded = self.reload_if_changed()?;
        if reloaded {
            log::info!("Script module reloaded");
        }
        Ok(reloaded)
    }
}

fn vec3_arg(value: &Dynamic) -> Option<Vec3> {
    match ScriptValue::from_dynamic(value, None)? {
        ScriptValue::Vec3(v) => Some(v),
        ScriptValue::Vec2(v) => Some(Vec3::new(v.x, v.y, 0.0)),
        _ => None,
    }
}

fn vec2_arg(value: &Dynamic) -> Option<Vec2> {
    let array = value.clone().into_array().ok()?;
    match array.as_slice() {
        [x, y, ..] => Some(Vec2::new(number(x)?, number(y)?)),
        _ => None,
    }
}

fn vec3_dynamic(value: Option<Vec3>) -> Dynamic {
    value.map_or(Dynamic::UNIT, |v| float_array(v.as_slice()))
}

/// Functions scripts use to reach the scene
fn register_api(engine: &mut Engine, world: &ScriptWorld) {
    engine.register_fn("log", |message: ImmutableString| {
        log::info!(target: SCRIPT_TARGET, "{message}");
    });
    engine.register_fn("log_warn", |message: ImmutableString| {
        log::warn!(target: SCRIPT_TARGET, "{message}");
    });
    engine.register_fn("log_error", |message: ImmutableString| {
        log::error!(target: SCRIPT_TARGET, "{message}");
    });

    let w = world.clone();
    engine.register_fn("entity_tag", move |id: INT| -> String {
        w.entity(entity_from_int(id)).map(|e| e.tag).unwrap_or_default()
    });
    let w = world.clone();
    engine.register_fn("set_entity_tag", move |id: INT, tag: ImmutableString| -> bool {
        w.set_tag(entity_from_int(id), tag.to_string())
    });

    let w = world.clone();
    engine.register_fn("translation", move |id: INT| -> Dynamic {
        vec3_dynamic(w.entity(entity_from_int(id)).map(|e| e.translation))
    });
    let w = world.clone();
    engine.register_fn("rotation", move |id: INT| -> Dynamic {
        vec3_dynamic(w.entity(entity_from_int(id)).map(|e| e.rotation))
    });
    let w = world.clone();
    engine.register_fn("scale", move |id: INT| -> Dynamic {
        vec3_dynamic(w.entity(entity_from_int(id)).map(|e| e.scale))
    });
    let w = world.clone();
    engine.register_fn("set_translation", move |id: INT, value: Dynamic| -> bool {
        vec3_arg(&value).is_some_and(|v| w.set_translation(entity_from_int(id), v))
    });
    let w = world.clone();
    engine.register_fn("set_rotation", move |id: INT, value: Dynamic| -> bool {
        vec3_arg(&value).is_some_and(|v| w.set_rotation(entity_from_int(id), v))
    });
    let w = world.clone();
    engine.register_fn("set_scale", move |id: INT, value: Dynamic| -> bool {
        vec3_arg(&value).is_some_and(|v| w.set_scale(entity_from_int(id), v))
    });

    let w = world.clone();
    engine.register_fn("has_component", move |id: INT, kind: ImmutableString| -> bool {
        let Ok(kind) = kind.parse::<ComponentKind>() else {
            return false;
        };
        w.entity(entity_from_int(id))
            .is_some_and(|e| e.components.contains(kind.mask()))
    });
    let w = world.clone();
    engine.register_fn("add_component", move |id: INT, kind: ImmutableString| -> bool {
        kind.parse::<ComponentKind>()
            .is_ok_and(|kind| w.add_component(entity_from_int(id), kind))
    });
    let w = world.clone();
    engine.register_fn("remove_component", move |id: INT, kind: ImmutableString| -> bool {
        kind.parse::<ComponentKind>()
            .is_ok_and(|kind| w.remove_component(entity_from_int(id), kind))
    });

    let w = world.clone();
    engine.register_fn("find_entity_by_name", move |name: ImmutableString| -> INT {
        w.find_by_name(name.as_str()).map_or(0, entity_to_int)
    });
    let w = world.clone();
    engine.register_fn("destroy_entity", move |id: INT| -> bool { w.destroy(entity_from_int(id)) });

    let w = world.clone();
    engine.register_fn("apply_linear_impulse", move |id: INT, impulse: Dynamic, point: Dynamic| -> bool {
        match (vec2_arg(&impulse), vec2_arg(&point)) {
            (Some(impulse), Some(point)) => w.apply_linear_impulse(entity_from_int(id), impulse, point),
            _ => false,
        }
    });
    let w = world.clone();
    engine.register_fn("apply_linear_impulse_to_center", move |id: INT, impulse: Dynamic| -> bool {
        vec2_arg(&impulse).is_some_and(|impulse| w.apply_linear_impulse_to_center(entity_from_int(id), impulse))
    });
    let w = world.clone();
    engine.register_fn("linear_velocity", move |id: INT| -> Dynamic {
        w.entity(entity_from_int(id))
            .map_or(Dynamic::UNIT, |e| float_array(e.linear_velocity.as_slice()))
    });
    let w = world.clone();
    engine.register_fn("set_body_type", move |id: INT, body_type: ImmutableString| -> bool {
        body_type
            .parse::<BodyType>()
            .is_ok_and(|body_type| w.set_body_type(entity_from_int(id), body_type))
    });
    let w = world.clone();
    engine.register_fn("body_type", move |id: INT| -> String {
        w.entity(entity_from_int(id))
            .and_then(|e| e.rigid_body)
            .map(|body| body.body_type.to_string())
            .unwrap_or_default()
    });
    let w = world.clone();
    engine.register_fn("fixed_rotation", move |id: INT| -> bool {
        w.entity(entity_from_int(id))
            .and_then(|e| e.rigid_body)
            .is_some_and(|body| body.fixed_rotation)
    });
    let w = world.clone();
    engine.register_fn("set_fixed_rotation", move |id: INT, fixed: bool| -> bool {
        w.set_fixed_rotation(entity_from_int(id), fixed)
    });

    let w = world.clone();
    engine.register_fn("box_collider", move |id: INT| -> Dynamic {
        w.entity(entity_from_int(id))
            .and_then(|e| e.box_collider)
            .map_or(Dynamic::UNIT, |collider| {
                let mut map = collider_map(
                    collider.offset,
                    collider.density,
                    collider.friction,
                    collider.restitution,
                    collider.restitution_threshold,
                );
                map.insert("size".into(), float_array(collider.size.as_slice()));
                Dynamic::from_map(map)
            })
    });
    let w = world.clone();
    engine.register_fn("circle_collider", move |id: INT| -> Dynamic {
        w.entity(entity_from_int(id))
            .and_then(|e| e.circle_collider)
            .map_or(Dynamic::UNIT, |collider| {
                let mut map = collider_map(
                    collider.offset,
                    collider.density,
                    collider.friction,
                    collider.restitution,
                    collider.restitution_threshold,
                );
                map.insert("radius".into(), Dynamic::from_float(collider.radius));
                Dynamic::from_map(map)
            })
    });
    let w = world.clone();
    engine.register_fn(
        "set_box_collider",
        move |id: INT, field: ImmutableString, value: Dynamic| -> bool {
            collider_field(&field, &value).is_some_and(|field| w.set_box_collider(entity_from_int(id), field))
        },
    );
    let w = world.clone();
    engine.register_fn(
        "set_circle_collider",
        move |id: INT, field: ImmutableString, value: Dynamic| -> bool {
            collider_field(&field, &value).is_some_and(|field| w.set_circle_collider(entity_from_int(id), field))
        },
    );

    let w = world.clone();
    engine.register_fn("sprite_color", move |id: INT| -> Dynamic {
        w.entity(entity_from_int(id))
            .and_then(|e| e.sprite)
            .map_or(Dynamic::UNIT, |sprite| float_array(sprite.color.as_slice()))
    });
    let w = world.clone();
    engine.register_fn("set_sprite_color", move |id: INT, color: Dynamic| -> bool {
        match ScriptValue::from_dynamic(&color, None) {
            Some(ScriptValue::Vec4(color)) => w.set_sprite_color(entity_from_int(id), color),
            _ => false,
        }
    });
    let w = world.clone();
    engine.register_fn("sprite_tiling_factor", move |id: INT| -> Dynamic {
        w.entity(entity_from_int(id))
            .and_then(|e| e.sprite)
            .map_or(Dynamic::UNIT, |sprite| Dynamic::from_float(sprite.tiling_factor))
    });
    let w = world.clone();
    engine.register_fn("set_sprite_tiling_factor", move |id: INT, factor: Dynamic| -> bool {
        number(&factor).is_some_and(|factor| w.set_sprite_tiling_factor(entity_from_int(id), factor))
    });

    let w = world.clone();
    engine.register_fn("camera_primary", move |id: INT| -> bool {
        w.entity(entity_from_int(id))
            .and_then(|e| e.camera)
            .is_some_and(|camera| camera.primary)
    });
    let w = world.clone();
    engine.register_fn("set_camera_primary", move |id: INT, primary: bool| -> bool {
        w.set_camera_primary(entity_from_int(id), primary)
    });

    // Another entity's script, as of the start of the pass
    let w = world.clone();
    engine.register_fn("script_instance", move |id: INT| -> Dynamic {
        let Some(fields) = w.entity(entity_from_int(id)).and_then(|e| e.script_fields) else {
            return Dynamic::UNIT;
        };
        let mut map: Map = fields
            .into_iter()
            .map(|(name, value)| (name.into(), value.to_dynamic()))
            .collect();
        map.insert(ID_FIELD.into(), Dynamic::from_int(id));
        Dynamic::from_map(map)
    });
    let w = world.clone();
    engine.register_fn(
        "set_script_field",
        move |id: INT, name: ImmutableString, value: Dynamic| -> bool {
            let id = entity_from_int(id);
            let declared = w.entity(id).and_then(|e| e.script_field(&name).cloned());
            ScriptValue::from_dynamic(&value, declared.as_ref())
                .is_some_and(|value| w.set_script_field(id, &name, value))
        },
    );
}

fn collider_map(offset: Vec2, density: f32, friction: f32, restitution: f32, threshold: f32) -> Map {
    let mut map = Map::new();
    map.insert("offset".into(), float_array(offset.as_slice()));
    map.insert("density".into(), Dynamic::from_float(density));
    map.insert("friction".into(), Dynamic::from_float(friction));
    map.insert("restitution".into(), Dynamic::from_float(restitution));
    map.insert("restitution_threshold".into(), Dynamic::from_float(threshold));
    map
}

fn collider_field(name: &str, value: &Dynamic) -> Option<ColliderField> {
    ColliderField::parse(name, &ScriptValue::from_dynamic(value, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{EntitySnapshot, SceneCommand};
    use crate::script::hooks;

    const COUNTER: &str = r#"
        let count = 0;
        let speed = 1.5;
        let _scratch = 7;

        fn on_create() {
            this.count = 100;
        }

        fn on_update(dt) {
            this.count += 1;
            set_entity_tag(this.id, "tick " + this.count);
        }
    "#;

    fn host_with_world(id: Uuid) -> (RhaiHost, ScriptWorld) {
        let world = ScriptWorld::new();
        world.refresh([(id, EntitySnapshot { tag: "Counter".into(), ..Default::default() })]);
        let mut host = RhaiHost::new();
        host.bind_world(world.clone());
        host.register_class_source("Test.Counter", COUNTER).unwrap();
        (host, world)
    }

    #[test]
    fn test_fields_exclude_private_names() {
        let (host, _) = host_with_world(Uuid::from_raw(1));
        let names: Vec<String> = host
            .fields("Test.Counter")
            .unwrap()
            .into_iter()
            .map(|field| field.name)
            .collect();
        assert_eq!(names, vec!["count".to_string(), "speed".to_string()]);
    }

    #[test]
    fn test_hooks_mutate_this_and_queue_commands() {
        let id = Uuid::from_raw(7);
        let (mut host, world) = host_with_world(id);
        let instance = host.instantiate("Test.Counter", id).unwrap();

        assert!(host.has_method(instance, hooks::ON_UPDATE, 1));
        assert!(!host.has_method(instance, hooks::ON_DESTROY, 0));

        host.invoke(instance, hooks::ON_CREATE, &[]).unwrap();
        host.invoke(instance, hooks::ON_UPDATE, &[HookArg::Float(0.016)]).unwrap();
        host.invoke(instance, hooks::ON_DESTROY, &[]).unwrap();

        assert_eq!(host.get_field(instance, "count").unwrap(), ScriptValue::Int(101));
        assert_eq!(world.take_commands(), vec![SceneCommand::SetTag(id, "tick 101".to_string())]);
    }

    #[test]
    fn test_field_access_is_checked() {
        let id = Uuid::from_raw(3);
        let (mut host, _) = host_with_world(id);
        let instance = host.instantiate("Test.Counter", id).unwrap();

        host.set_field(instance, "speed", ScriptValue::Int(4)).unwrap();
        assert_eq!(host.get_field(instance, "speed").unwrap(), ScriptValue::Float(4.0));
        assert!(matches!(
            host.get_field(instance, "_scratch"),
            Err(ScriptError::FieldNotFound { .. })
        ));
        assert!(matches!(
            host.set_field(instance, "count", ScriptValue::Bool(true)),
            Err(ScriptError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_class_and_released_instance() {
        let id = Uuid::from_raw(3);
        let (mut host, _) = host_with_world(id);
        assert_eq!(
            host.instantiate("Test.Missing", id),
            Err(ScriptError::ClassNotFound("Test.Missing".to_string()))
        );

        let instance = host.instantiate("Test.Counter", id).unwrap();
        host.release(instance);
        assert_eq!(host.instance_count(), 0);
        assert_eq!(host.invoke(instance, hooks::ON_CREATE, &[]), Err(ScriptError::InvalidInstance));
    }

    #[test]
    fn test_compile_errors_are_reported() {
        let mut host = RhaiHost::new();
        let err = host.register_class_source("Broken", "fn on_create( {").unwrap_err();
        assert!(matches!(err, ScriptError::Compile { .. }));
        assert!(!host.has_class("Broken"));
    }

    #[test]
    fn test_runtime_errors_are_reported() {
        let mut host = RhaiHost::new();
        host.register_class_source("Faulty", "fn on_create() { throw \"boom\"; }").unwrap();
        let instance = host.instantiate("Faulty", Uuid::from_raw(1)).unwrap();
        assert!(matches!(
            host.invoke(instance, hooks::ON_CREATE, &[]),
            Err(ScriptError::Runtime { .. })
        ));
    }

    #[test]
    fn test_module_directory_loading_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Game")).unwrap();
        fs::write(dir.path().join("Game/Mover.rhai"), "let speed = 1.0;").unwrap();
        fs::write(dir.path().join("Bad.rhai"), "let = ;").unwrap();

        let mut host = RhaiHost::new().with_module_dir(dir.path());
        host.load().unwrap();
        assert_eq!(host.class_names(), vec!["Game.Mover".to_string()]);
        let instance = host.instantiate("Game.Mover", Uuid::from_raw(1)).unwrap();
        host.set_field(instance, "speed", ScriptValue::Float(5.0)).unwrap();
        assert!(!host.reload_if_changed().unwrap());

        fs::write(dir.path().join("Game/Mover.rhai"), "let speed = 1.0;\nlet jump = true;").unwrap();
        assert!(host.reload_if_changed().unwrap());
        // State survives, new fields appear with their defaults
        assert_eq!(host.get_field(instance, "speed").unwrap(), ScriptValue::Float(5.0));
        assert_eq!(host.get_field(instance, "jump").unwrap(), ScriptValue::Bool(true));
    }

    #[test]
    fn test_missing_module_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = RhaiHost::new().with_module_dir(dir.path().join("nope"));
        assert!(matches!(host.load(), Err(ScriptError::ModuleUnavailable(_))));
        assert!(!host.is_loaded());
    }
}
