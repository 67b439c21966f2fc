//! Dynamic models, each built from its own description file.
//!
//! ```yaml
//! bodies:
//!   - name: base
//!     type: dynamic          # static | kinematic | dynamic
//!     pose: [0, 0, 0]        # relative to the model origin
//!     footprints:
//!       - type: circle
//!         radius: 0.5
//!         layers: [all]
//!       - type: polygon
//!         points: [[-0.5, -0.2], [0.5, -0.2], [0.5, 0.2], [-0.5, 0.2]]
//!         collision: false   # sensor
//! plugins:
//!   - type: Bumper
//!     name: bumper
//! ```

use std::path::{Path, PathBuf};

use glam::DVec2;
use planeworld_common::{BodyOwner, Color, ModelId, Pose};
use planeworld_physics::{
    BodyDef, BodyHandle, BodyKind, Filter, FixtureDef, PhysicsError, PhysicsWorld, Shape,
};
use serde::Deserialize;
use serde_yaml::Value;

use crate::collision_filter::{ALL_LAYERS, CollisionFilterRegistry};
use crate::description;
use crate::error::DescriptionError;

/// One physics body of a model.
#[derive(Debug, Clone)]
pub struct ModelBody {
    name: String,
    handle: BodyHandle,
    kind: BodyKind,
    color: Color,
}

impl ModelBody {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

/// A named, namespaced dynamic entity.
#[derive(Debug, Clone)]
pub struct Model {
    id: ModelId,
    namespace: String,
    name: String,
    path: PathBuf,
    bodies: Vec<ModelBody>,
    no_collide_group: i16,
    plugins: Option<Value>,
}

impl Model {
    /// Build a model from the description at `path`, creating its bodies in
    /// `physics` at their model-relative poses.
    pub fn make(
        physics: &mut PhysicsWorld,
        cfr: &mut CollisionFilterRegistry,
        path: &Path,
        namespace: &str,
        name: &str,
        id: ModelId,
    ) -> Result<Model, DescriptionError> {
        let yaml = description::load_yaml(path)?;

        let Some(Value::Sequence(body_nodes)) = yaml.get("bodies") else {
            return Err(DescriptionError::invalid(
                path,
                format!("missing/invalid \"bodies\" in {name} model, must be a list"),
            ));
        };
        if body_nodes.is_empty() {
            return Err(DescriptionError::invalid(
                path,
                format!("{name} model has no bodies"),
            ));
        }

        let no_collide_group = cfr.register_no_collide();
        let mut bodies: Vec<ModelBody> = Vec::with_capacity(body_nodes.len());
        for (index, node) in body_nodes.iter().enumerate() {
            let body = make_body(physics, cfr, path, index, node, id, no_collide_group)?;
            if bodies.iter().any(|b| b.name == body.name) {
                return Err(DescriptionError::invalid(
                    path,
                    format!("duplicate body name \"{}\" in {name} model", body.name),
                ));
            }
            bodies.push(body);
        }

        Ok(Model {
            id,
            namespace: namespace.to_string(),
            name: name.to_string(),
            path: path.to_path_buf(),
            bodies,
            no_collide_group,
            plugins: yaml.get("plugins").cloned(),
        })
    }

    /// Move every body by `pose`. Called once, right after construction.
    pub fn transform_all(
        &self,
        physics: &mut PhysicsWorld,
        pose: Pose,
    ) -> Result<(), DescriptionError> {
        for body in &self.bodies {
            place(physics, body, pose).map_err(|e| {
                DescriptionError::invalid(
                    &self.path,
                    format!("cannot place body \"{}\" of {} model: {e}", body.name, self.name),
                )
            })?;
        }
        Ok(())
    }

    /// Hand over the `plugins` declaration. Yields it only the first time.
    pub fn take_plugin_declarations(&mut self) -> Option<Value> {
        self.plugins.take()
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description file the model was built from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bodies(&self) -> &[ModelBody] {
        &self.bodies
    }

    pub fn body(&self, name: &str) -> Option<&ModelBody> {
        self.bodies.iter().find(|b| b.name == name)
    }

    /// Group shared by all of this model's fixtures so they never collide
    /// with each other.
    pub fn no_collide_group(&self) -> i16 {
        self.no_collide_group
    }
}

/// One entry of a model's `bodies` list.
#[derive(Debug, Deserialize)]
struct BodyEntry {
    name: String,
    #[serde(default, rename = "type")]
    kind: BodyKindEntry,
    pose: Option<[f64; 3]>,
    color: Option<[f32; 4]>,
    #[serde(default)]
    linear_damping: f64,
    #[serde(default)]
    angular_damping: f64,
    #[serde(default)]
    footprints: Vec<FootprintEntry>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BodyKindEntry {
    Static,
    Kinematic,
    #[default]
    Dynamic,
}

impl From<BodyKindEntry> for BodyKind {
    fn from(kind: BodyKindEntry) -> Self {
        match kind {
            BodyKindEntry::Static => BodyKind::Static,
            BodyKindEntry::Kinematic => BodyKind::Kinematic,
            BodyKindEntry::Dynamic => BodyKind::Dynamic,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FootprintEntry {
    #[serde(flatten)]
    shape: FootprintShape,
    #[serde(default = "all_layers")]
    layers: Vec<String>,
    /// `false` makes the footprint a sensor.
    #[serde(default = "enabled")]
    collision: bool,
    #[serde(default = "unit_density")]
    density: f64,
    #[serde(default)]
    friction: f64,
    #[serde(default)]
    restitution: f64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum FootprintShape {
    Circle {
        #[serde(default)]
        center: [f64; 2],
        radius: f64,
    },
    Polygon {
        points: Vec<[f64; 2]>,
    },
}

fn all_layers() -> Vec<String> {
    vec![ALL_LAYERS.to_string()]
}

fn enabled() -> bool {
    true
}

fn unit_density() -> f64 {
    1.0
}

fn place(physics: &mut PhysicsWorld, body: &ModelBody, pose: Pose) -> Result<(), PhysicsError> {
    let current = physics
        .body(body.handle)
        .ok_or(PhysicsError::UnknownBody(body.handle))?
        .pose();
    let placed = pose.compose(current);
    physics.set_transform(body.handle, placed.position(), placed.theta)
}

fn make_body(
    physics: &mut PhysicsWorld,
    cfr: &CollisionFilterRegistry,
    path: &Path,
    index: usize,
    node: &Value,
    model: ModelId,
    group: i16,
) -> Result<ModelBody, DescriptionError> {
    let entry: BodyEntry = serde_yaml::from_value(node.clone()).map_err(|e| {
        DescriptionError::invalid(path, format!("invalid body index={index}: {e}"))
    })?;
    let kind = BodyKind::from(entry.kind);
    let pose = entry.pose.map(Pose::from).unwrap_or_default();

    let handle = physics.create_body(
        &BodyDef::new(kind)
            .with_pose(pose)
            .with_damping(entry.linear_damping, entry.angular_damping)
            .with_owner(BodyOwner::Model(model)),
    );
    for (i, footprint) in entry.footprints.into_iter().enumerate() {
        let context = format!("footprint index={i} in body \"{}\"", entry.name);
        let def = make_footprint(cfr, footprint, group)
            .map_err(|e| DescriptionError::invalid(path, format!("{e} in {context}")))?;
        physics
            .create_fixture(handle, def)
            .map_err(|e| DescriptionError::invalid(path, format!("bad {context}: {e}")))?;
    }

    Ok(ModelBody {
        name: entry.name,
        handle,
        kind,
        color: entry
            .color
            .map(|[r, g, b, a]| Color { r, g, b, a })
            .unwrap_or_default(),
    })
}

fn make_footprint(
    cfr: &CollisionFilterRegistry,
    entry: FootprintEntry,
    group: i16,
) -> Result<FixtureDef, String> {
    let shape = match entry.shape {
        FootprintShape::Circle { center, radius } => {
            Shape::circle(DVec2::from_array(center), radius)
        }
        FootprintShape::Polygon { points } => {
            Shape::polygon(points.into_iter().map(DVec2::from_array).collect())
        }
    };
    let category_bits = cfr
        .category_bits(entry.layers.as_slice())
        .map_err(|unknown| format!("unknown layer \"{unknown}\""))?;
    Ok(FixtureDef {
        shape,
        filter: Filter {
            category_bits,
            mask_bits: category_bits,
            group_index: group,
        },
        density: entry.density,
        friction: entry.friction,
        restitution: entry.restitution,
        is_sensor: !entry.collision,
    })
}
