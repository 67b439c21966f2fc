//! Model plugins: per-model behavior driven by step and contact hooks.
//!
//! The engine accepts a single contact listener. [`ContactRelay`] is that
//! listener; it fans every callback out to the plugins held by a shared
//! [`PluginManager`], in load order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use glam::DVec2;
use planeworld_common::ModelId;
use planeworld_physics::{
    Body, BodyHandle, Contact, ContactImpulse, ContactListener, EngineStats, Manifold,
    PhysicsError, PhysicsWorld,
};
use serde_yaml::{Mapping, Value};

use crate::error::{DescriptionError, PluginError, WorldError};
use crate::model::Model;
use crate::timekeeper::Timekeeper;

/// What a plugin sees while it initializes.
pub struct PluginContext<'a> {
    pub plugin_type: &'a str,
    pub name: &'a str,
    pub model: &'a Model,
    pub physics: &'a PhysicsWorld,
}

/// Engine view handed to step hooks. Bodies can be read and pushed around,
/// but the engine cannot be stepped from here.
pub struct BodyAccess<'a> {
    physics: &'a mut PhysicsWorld,
}

impl BodyAccess<'_> {
    pub fn body(&self, body: BodyHandle) -> Option<Body<'_>> {
        self.physics.body(body)
    }

    pub fn set_linear_velocity(
        &mut self,
        body: BodyHandle,
        velocity: DVec2,
    ) -> Result<(), PhysicsError> {
        self.physics.set_linear_velocity(body, velocity)
    }

    pub fn set_angular_velocity(&mut self, body: BodyHandle, velocity: f64) -> Result<(), PhysicsError> {
        self.physics.set_angular_velocity(body, velocity)
    }

    pub fn set_transform(
        &mut self,
        body: BodyHandle,
        position: DVec2,
        angle: f64,
    ) -> Result<(), PhysicsError> {
        self.physics.set_transform(body, position, angle)
    }

    pub fn engine_stats(&self) -> EngineStats {
        self.physics.stats()
    }

    pub fn contact_count(&self) -> usize {
        self.physics.contact_count()
    }
}

/// Arguments of the before/after physics step hooks.
pub struct StepContext<'a> {
    pub timekeeper: &'a Timekeeper,
    pub bodies: BodyAccess<'a>,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(timekeeper: &'a Timekeeper, physics: &'a mut PhysicsWorld) -> Self {
        Self {
            timekeeper,
            bodies: BodyAccess { physics },
        }
    }
}

/// Behavior attached to a model by a `plugins` declaration.
///
/// Contact hooks run from inside the engine's step call and see every
/// contact in the world, not only those touching the plugin's model.
pub trait ModelPlugin {
    /// Called once, right after creation. `config` is the declaration minus
    /// its `type`, `name` and `enabled` keys.
    fn on_initialize(&mut self, ctx: &PluginContext<'_>, config: &Mapping) -> Result<(), PluginError>;

    fn before_physics_step(&mut self, _ctx: &mut StepContext<'_>) {}

    fn after_physics_step(&mut self, _ctx: &mut StepContext<'_>) {}

    fn begin_contact(&mut self, _contact: &Contact) {}

    fn end_contact(&mut self, _contact: &Contact) {}

    fn pre_solve(&mut self, _contact: &Contact, _old_manifold: &Manifold) {}

    fn post_solve(&mut self, _contact: &Contact, _impulse: &ContactImpulse) {}
}

type PluginFactory = Box<dyn Fn() -> Box<dyn ModelPlugin>>;

/// Plugin type names mapped to constructors.
#[derive(Default)]
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `plugin_type`, replacing any earlier entry.
    pub fn register<F>(&mut self, plugin_type: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ModelPlugin> + 'static,
    {
        self.factories.insert(plugin_type.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, plugin_type: &str) -> bool {
        self.factories.contains_key(plugin_type)
    }

    pub fn create(&self, plugin_type: &str) -> Option<Box<dyn ModelPlugin>> {
        self.factories.get(plugin_type).map(|factory| factory())
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

struct LoadedPlugin {
    model: ModelId,
    plugin_type: String,
    name: String,
    plugin: Box<dyn ModelPlugin>,
}

/// Owns every loaded plugin and dispatches hooks to them in load order.
pub struct PluginManager {
    registry: PluginRegistry,
    plugins: Vec<LoadedPlugin>,
}

impl PluginManager {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            plugins: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Names of the plugins loaded for `model`, in load order.
    pub fn plugin_names(&self, model: ModelId) -> Vec<&str> {
        self.plugins
            .iter()
            .filter(|p| p.model == model)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Create and initialize the plugin described by `declaration` for
    /// `model`. Returns `false` if the declaration is disabled.
    pub fn load_model_plugin(
        &mut self,
        model: &Model,
        physics: &PhysicsWorld,
        declaration: &Value,
    ) -> Result<bool, WorldError> {
        let path = model.path();
        let model_name = model.name();
        let Value::Mapping(fields) = declaration else {
            return Err(DescriptionError::invalid(
                path,
                format!("plugin declaration in {model_name} model must be a mapping"),
            )
            .into());
        };

        let plugin_type = fields.get("type").and_then(Value::as_str).ok_or_else(|| {
            DescriptionError::invalid(
                path,
                format!("missing/invalid plugin \"type\" in {model_name} model"),
            )
        })?;
        let name = fields.get("name").and_then(Value::as_str).ok_or_else(|| {
            DescriptionError::invalid(
                path,
                format!("missing/invalid \"name\" for {plugin_type} plugin in {model_name} model"),
            )
        })?;

        let enabled = match fields.get("enabled") {
            None => true,
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) if s == "true" => true,
            Some(Value::String(s)) if s == "false" => false,
            Some(_) => {
                return Err(DescriptionError::invalid(
                    path,
                    format!("invalid \"enabled\" in plugin \"{name}\" of {model_name} model"),
                )
                .into());
            }
        };
        if !enabled {
            tracing::debug!(model = model_name, plugin = name, "plugin disabled, skipped");
            return Ok(false);
        }

        if self
            .plugins
            .iter()
            .any(|p| p.model == model.id() && p.name == name)
        {
            return Err(DescriptionError::invalid(
                path,
                format!("duplicate plugin name \"{name}\" in {model_name} model"),
            )
            .into());
        }

        let mut plugin = self
            .registry
            .create(plugin_type)
            .ok_or_else(|| PluginError::UnknownType {
                model: model_name.to_string(),
                plugin_type: plugin_type.to_string(),
            })?;

        let mut config = fields.clone();
        for key in ["type", "name", "enabled"] {
            config.remove(key);
        }
        let ctx = PluginContext {
            plugin_type,
            name,
            model,
            physics,
        };
        plugin
            .on_initialize(&ctx, &config)
            .map_err(|source| PluginError::Initialize {
                model: model_name.to_string(),
                name: name.to_string(),
                source: Box::new(source),
            })?;

        tracing::info!(model = model_name, plugin = name, plugin_type, "plugin loaded");
        self.plugins.push(LoadedPlugin {
            model: model.id(),
            plugin_type: plugin_type.to_string(),
            name: name.to_string(),
            plugin,
        });
        Ok(true)
    }

    pub fn before_physics_step(&mut self, ctx: &mut StepContext<'_>) {
        for p in &mut self.plugins {
            p.plugin.before_physics_step(ctx);
        }
    }

    pub fn after_physics_step(&mut self, ctx: &mut StepContext<'_>) {
        for p in &mut self.plugins {
            p.plugin.after_physics_step(ctx);
        }
    }

    pub fn begin_contact(&mut self, contact: &Contact) {
        for p in &mut self.plugins {
            p.plugin.begin_contact(contact);
        }
    }

    pub fn end_contact(&mut self, contact: &Contact) {
        for p in &mut self.plugins {
            p.plugin.end_contact(contact);
        }
    }

    pub fn pre_solve(&mut self, contact: &Contact, old_manifold: &Manifold) {
        for p in &mut self.plugins {
            p.plugin.pre_solve(contact, old_manifold);
        }
    }

    pub fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {
        for p in &mut self.plugins {
            p.plugin.post_solve(contact, impulse);
        }
    }

    /// Drop every plugin, in load order. Returns how many were unloaded.
    pub fn unload_all(&mut self) -> usize {
        let count = self.plugins.len();
        for p in self.plugins.drain(..) {
            tracing::debug!(plugin = %p.name, plugin_type = %p.plugin_type, "plugin unloaded");
        }
        count
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("registry", &self.registry)
            .field(
                "plugins",
                &self.plugins.iter().map(|p| &p.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// The one contact listener registered with the engine.
pub struct ContactRelay {
    manager: Rc<RefCell<PluginManager>>,
}

impl ContactRelay {
    pub fn new(manager: Rc<RefCell<PluginManager>>) -> Self {
        Self { manager }
    }

    /// Step hooks get [`BodyAccess`], which cannot step the engine, so the
    /// manager is never borrowed when the engine raises a callback.
    fn with_manager(&self, f: impl FnOnce(&mut PluginManager)) {
        let manager = self.manager.try_borrow_mut();
        debug_assert!(manager.is_ok(), "contact callback raised while plugins are busy");
        if let Ok(mut manager) = manager {
            f(&mut manager);
        }
    }
}

impl ContactListener for ContactRelay {
    fn begin_contact(&mut self, contact: &Contact) {
        self.with_manager(|m| m.begin_contact(contact));
    }

    fn end_contact(&mut self, contact: &Contact) {
        self.with_manager(|m| m.end_contact(contact));
    }

    fn pre_solve(&mut self, contact: &Contact, old_manifold: &Manifold) {
        self.with_manager(|m| m.pre_solve(contact, old_manifold));
    }

    fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {
        self.with_manager(|m| m.post_solve(contact, impulse));
    }
}
