use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::DVec2;
use planeworld_common::{ModelId, Pose};
use planeworld_physics::{EngineStats, PhysicsWorld, ReleaseStats};
use serde::Serialize;
use serde_yaml::Value;

use crate::collision_filter::{CollisionFilterRegistry, MAX_LAYERS};
use crate::description;
use crate::error::{DescriptionError, WorldError};
use crate::layer::{Layer, LayerSource};
use crate::model::Model;
use crate::plugin::{ContactRelay, PluginManager, PluginRegistry, StepContext};
use crate::timekeeper::Timekeeper;

/// Solver velocity iterations per physics step.
pub const VELOCITY_ITERATIONS: u32 = 10;
/// Solver position iterations per physics step.
pub const POSITION_ITERATIONS: u32 = 10;

/// One stage of world teardown, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TeardownStep {
    ListenerDeregistered,
    LayersDestroyed,
    ModelsDestroyed,
    EngineReleased,
    PluginsUnloaded,
}

/// What tearing a world down did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
    pub layers: usize,
    /// Layer bodies whose back-reference was cleared before release.
    pub unlinked_layer_bodies: usize,
    pub models: usize,
    pub plugins: usize,
    pub released: ReleaseStats,
    /// Engine counters as of the bulk release.
    pub engine: EngineStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldSummary {
    pub path: PathBuf,
    pub gravity: [f64; 2],
    pub layers: Vec<LayerSummary>,
    pub models: Vec<ModelSummary>,
    pub bodies: usize,
    pub fixtures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerSummary {
    pub names: Vec<String>,
    pub category_bits: u16,
    pub segments: usize,
    pub map: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub namespace: String,
    pub name: String,
    pub path: PathBuf,
    pub bodies: Vec<BodySummary>,
    pub plugins: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BodySummary {
    pub name: String,
    pub pose: Pose,
}

/// One simulation instance: layers, models, the physics engine and the
/// plugins attached to models.
///
/// Built only by [`World::make_world`]. Tearing down (through
/// [`World::close`] or drop) deregisters the contact listener, unlinks and
/// drops layers, drops models, releases the engine in bulk, then unloads
/// plugins.
pub struct World {
    path: PathBuf,
    physics: PhysicsWorld,
    plugins: Rc<RefCell<PluginManager>>,
    collision_filters: CollisionFilterRegistry,
    layers: Vec<Layer>,
    models: Vec<Model>,
    torn_down: bool,
}

impl World {
    fn new(path: &Path, registry: PluginRegistry) -> Self {
        let plugins = Rc::new(RefCell::new(PluginManager::new(registry)));
        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        physics.set_contact_listener(Box::new(ContactRelay::new(plugins.clone())));
        Self {
            path: path.to_path_buf(),
            physics,
            plugins,
            collision_filters: CollisionFilterRegistry::new(),
            layers: Vec::new(),
            models: Vec::new(),
            torn_down: false,
        }
    }

    /// Build a world from the description at `path`.
    ///
    /// On failure everything built so far is torn down before the error is
    /// returned.
    pub fn make_world(
        path: impl AsRef<Path>,
        registry: PluginRegistry,
    ) -> Result<World, WorldError> {
        let path = path.as_ref();
        let result = Self::load(path, registry);
        if let Err(e) = &result {
            tracing::error!(path = %path.display(), "failed to load world: {e}");
        }
        result
    }

    fn load(path: &Path, registry: PluginRegistry) -> Result<World, WorldError> {
        let yaml = description::load_yaml(path)?;
        match yaml.get("properties") {
            Some(Value::Mapping(_)) => {}
            _ => {
                return Err(
                    DescriptionError::invalid(path, "missing/invalid world param \"properties\"")
                        .into(),
                );
            }
        }

        let mut world = World::new(path, registry);
        if let Err(e) = world
            .load_layers(&yaml)
            .and_then(|()| world.load_models(&yaml))
        {
            world.teardown();
            return Err(e);
        }
        Ok(world)
    }

    fn load_layers(&mut self, yaml: &Value) -> Result<(), WorldError> {
        let Some(Value::Sequence(entries)) = yaml.get("layers") else {
            return Err(DescriptionError::invalid(
                &self.path,
                "missing/invalid world param \"layers\", must be a list",
            )
            .into());
        };
        let base_dir = description::base_dir(&self.path);

        for (index, node) in entries.iter().enumerate() {
            if self.collision_filters.is_layers_full() {
                return Err(DescriptionError::LayerLimit {
                    path: self.path.clone(),
                    max: MAX_LAYERS,
                }
                .into());
            }
            let source = LayerSource {
                description: &self.path,
                base_dir: &base_dir,
                index,
                node,
            };
            let layer = Layer::make(&mut self.physics, &mut self.collision_filters, &source)?;
            tracing::info!(
                layer = layer.name(),
                segments = layer.segment_count(),
                "layer loaded"
            );
            self.layers.push(layer);
        }
        Ok(())
    }

    fn load_models(&mut self, yaml: &Value) -> Result<(), WorldError> {
        let entries = match yaml.get("models") {
            None => return Ok(()),
            Some(Value::Sequence(entries)) => entries,
            Some(_) => {
                return Err(DescriptionError::invalid(
                    &self.path,
                    "invalid world param \"models\", must be a list",
                )
                .into());
            }
        };
        let base_dir = description::base_dir(&self.path);

        for (index, node) in entries.iter().enumerate() {
            let name = node
                .get("name")
                .and_then(description::scalar_string)
                .ok_or_else(|| {
                    DescriptionError::invalid(
                        &self.path,
                        format!("missing model name in model index={index}"),
                    )
                })?;
            let namespace = match node.get("namespace") {
                None => String::new(),
                Some(v) => description::scalar_string(v).ok_or_else(|| {
                    DescriptionError::invalid(
                        &self.path,
                        format!("invalid \"namespace\" in {name} model"),
                    )
                })?,
            };
            let pose = node.get("pose").and_then(description::pose).ok_or_else(|| {
                DescriptionError::invalid(
                    &self.path,
                    format!("missing/invalid \"pose\" in {name} model"),
                )
            })?;
            let reference = node.get("model").and_then(Value::as_str).ok_or_else(|| {
                DescriptionError::invalid(&self.path, format!("missing \"model\" in {name} model"))
            })?;
            let model_path = description::resolve_path(&base_dir, reference);

            self.load_model(&model_path, &namespace, &name, pose)?;
        }
        Ok(())
    }

    fn load_model(
        &mut self,
        path: &Path,
        namespace: &str,
        name: &str,
        pose: Pose,
    ) -> Result<(), WorldError> {
        let index = self.models.len();
        let mut model = Model::make(
            &mut self.physics,
            &mut self.collision_filters,
            path,
            namespace,
            name,
            ModelId(index),
        )?;
        model.transform_all(&mut self.physics, pose)?;
        let declarations = model.take_plugin_declarations();
        self.models.push(model);

        let model = &self.models[index];
        match declarations {
            None => {}
            Some(Value::Sequence(list)) => {
                let mut plugins = self.plugins.borrow_mut();
                for declaration in &list {
                    plugins.load_model_plugin(model, &self.physics, declaration)?;
                }
            }
            Some(_) => {
                return Err(DescriptionError::invalid(
                    path,
                    format!("invalid \"plugins\" in {name} model, not a list"),
                )
                .into());
            }
        }

        tracing::info!(
            model = name,
            namespace,
            bodies = model.bodies().len(),
            "model loaded"
        );
        Ok(())
    }

    /// Advance the world by one fixed step of `timekeeper`.
    ///
    /// Pre-step hooks run first, then exactly one engine step (contact
    /// callbacks fire inside it), then the clock advances, then post-step
    /// hooks run.
    pub fn update(&mut self, timekeeper: &mut Timekeeper) {
        let _span = tracing::trace_span!("world_update", time = timekeeper.sim_time()).entered();

        self.plugins
            .borrow_mut()
            .before_physics_step(&mut StepContext::new(timekeeper, &mut self.physics));

        self.physics.step(
            timekeeper.step_size(),
            VELOCITY_ITERATIONS,
            POSITION_ITERATIONS,
        );
        timekeeper.step_time();

        self.plugins
            .borrow_mut()
            .after_physics_step(&mut StepContext::new(timekeeper, &mut self.physics));
    }

    /// Description file this world was built from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Layers in description order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Models in description order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn model(&self, namespace: &str, name: &str) -> Option<&Model> {
        self.models
            .iter()
            .find(|m| m.namespace() == namespace && m.name() == name)
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn collision_filters(&self) -> &CollisionFilterRegistry {
        &self.collision_filters
    }

    pub fn gravity(&self) -> DVec2 {
        self.physics.gravity()
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.borrow().len()
    }

    pub fn summary(&self) -> WorldSummary {
        let plugins = self.plugins.borrow();
        WorldSummary {
            path: self.path.clone(),
            gravity: self.gravity().to_array(),
            layers: self
                .layers
                .iter()
                .map(|l| LayerSummary {
                    names: l.names().to_vec(),
                    category_bits: l.category_bits(),
                    segments: l.segment_count(),
                    map: l.map().map(Path::to_path_buf),
                })
                .collect(),
            models: self
                .models
                .iter()
                .map(|m| ModelSummary {
                    namespace: m.namespace().to_string(),
                    name: m.name().to_string(),
                    path: m.path().to_path_buf(),
                    bodies: m
                        .bodies()
                        .iter()
                        .map(|b| BodySummary {
                            name: b.name().to_string(),
                            pose: self
                                .physics
                                .body(b.handle())
                                .map(|body| body.pose())
                                .unwrap_or_default(),
                        })
                        .collect(),
                    plugins: plugins
                        .plugin_names(m.id())
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                })
                .collect(),
            bodies: self.physics.body_count(),
            fixtures: self.physics.fixture_count(),
        }
    }

    /// Tear the world down now and report what happened.
    pub fn close(mut self) -> TeardownReport {
        self.teardown().unwrap_or_default()
    }

    /// Runs at most once; later calls return `None`.
    fn teardown(&mut self) -> Option<TeardownReport> {
        if self.torn_down {
            return None;
        }
        self.torn_down = true;
        tracing::info!(path = %self.path.display(), "destroying world");

        let mut report = TeardownReport::default();

        self.physics.clear_contact_listener();
        report.steps.push(TeardownStep::ListenerDeregistered);

        report.layers = self.layers.len();
        for layer in self.layers.drain(..) {
            if layer.unlink(&mut self.physics) {
                report.unlinked_layer_bodies += 1;
            }
        }
        report.steps.push(TeardownStep::LayersDestroyed);

        report.models = self.models.len();
        self.models.clear();
        report.steps.push(TeardownStep::ModelsDestroyed);

        report.released = self.physics.release_all();
        report.engine = self.physics.stats();
        report.steps.push(TeardownStep::EngineReleased);

        report.plugins = self.plugins.borrow_mut().unload_all();
        report.steps.push(TeardownStep::PluginsUnloaded);

        tracing::info!(
            layers = report.layers,
            models = report.models,
            bodies = report.released.bodies,
            fixtures = report.released.fixtures,
            "world destroyed"
        );
        Some(report)
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("path", &self.path)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.teardown();
    }
}
