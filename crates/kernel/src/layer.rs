//! Static collision layers built from `layers` entries of a world description.
//!
//! A layer entry looks like:
//! ```yaml
//! - name: walls            # or a list of names
//!   color: [0, 0, 1, 1]    # optional
//!   map: walls.yaml        # file with a `segments:` list, or:
//!   segments: [[0, 0, 10, 0], [10, 0, 10, 10]]
//! ```

use std::path::{Path, PathBuf};

use glam::DVec2;
use planeworld_common::{BodyOwner, Color, LayerId};
use planeworld_physics::{BodyDef, BodyHandle, BodyKind, Filter, FixtureDef, PhysicsWorld, Shape};
use serde_yaml::Value;

use crate::collision_filter::{CollisionFilterRegistry, MAX_LAYERS, RegisterLayerError};
use crate::description;
use crate::error::DescriptionError;

/// Where a layer entry came from.
pub struct LayerSource<'a> {
    /// World description the entry belongs to.
    pub description: &'a Path,
    /// Directory relative `map` paths resolve against.
    pub base_dir: &'a Path,
    /// Position of the entry in the `layers` sequence.
    pub index: usize,
    pub node: &'a Value,
}

/// A named static collision structure: one static body carrying one edge
/// fixture per segment.
#[derive(Debug, Clone)]
pub struct Layer {
    id: LayerId,
    names: Vec<String>,
    body: BodyHandle,
    color: Color,
    category_bits: u16,
    segment_count: usize,
    map: Option<PathBuf>,
}

impl Layer {
    pub fn make(
        physics: &mut PhysicsWorld,
        cfr: &mut CollisionFilterRegistry,
        source: &LayerSource<'_>,
    ) -> Result<Layer, DescriptionError> {
        let path = source.description;
        let index = source.index;
        let node = source.node;

        let names = parse_names(node).ok_or_else(|| {
            DescriptionError::invalid(
                path,
                format!("missing/invalid layer param \"name\" in layer index={index}"),
            )
        })?;
        let owner = format!("layer \"{}\"", names[0]);

        let color = match node.get("color") {
            None => Color::default(),
            Some(v) => description::color(v).ok_or_else(|| {
                DescriptionError::invalid(path, format!("invalid \"color\" in {owner}"))
            })?,
        };

        let (segments, map) = match (node.get("segments"), node.get("map")) {
            (Some(inline), None) => (parse_segments(inline, path, &owner)?, None),
            (None, Some(map)) => {
                let reference = map.as_str().ok_or_else(|| {
                    DescriptionError::invalid(path, format!("invalid \"map\" in {owner}"))
                })?;
                let map_path = description::resolve_path(source.base_dir, reference);
                let map_yaml = description::load_yaml(&map_path)?;
                let segments = map_yaml.get("segments").ok_or_else(|| {
                    DescriptionError::invalid(&map_path, "missing \"segments\" in layer map")
                })?;
                (parse_segments(segments, &map_path, &owner)?, Some(map_path))
            }
            _ => {
                return Err(DescriptionError::invalid(
                    path,
                    format!("{owner} needs exactly one of \"segments\" or \"map\""),
                ));
            }
        };

        let mut category_bits = 0u16;
        for name in &names {
            let bit = cfr.register_layer(name).map_err(|e| match e {
                RegisterLayerError::LayersFull => DescriptionError::LayerLimit {
                    path: path.to_path_buf(),
                    max: MAX_LAYERS,
                },
                RegisterLayerError::AlreadyExists(_) => {
                    DescriptionError::invalid(path, format!("{e}, in layer index={index}"))
                }
            })?;
            category_bits |= 1 << bit;
        }

        let id = LayerId(index);
        let body = physics.create_body(
            &BodyDef::new(BodyKind::Static).with_owner(BodyOwner::Layer(id)),
        );
        let filter = Filter {
            category_bits,
            mask_bits: category_bits,
            group_index: 0,
        };
        for (a, b) in &segments {
            physics
                .create_fixture(body, FixtureDef::new(Shape::edge(*a, *b)).with_filter(filter))
                .map_err(|e| {
                    DescriptionError::invalid(path, format!("bad segment in {owner}: {e}"))
                })?;
        }

        Ok(Layer {
            id,
            names,
            body,
            color,
            category_bits,
            segment_count: segments.len(),
            map,
        })
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Primary name: the first one given in the description.
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn category_bits(&self) -> u16 {
        self.category_bits
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Map file the geometry was read from, if any.
    pub fn map(&self) -> Option<&Path> {
        self.map.as_deref()
    }

    /// Clear the body's back-reference to this layer. The body itself stays
    /// in the engine until it is released in bulk.
    ///
    /// The contact listener must already be gone: no callback may observe a
    /// body whose owner has been torn down.
    pub(crate) fn unlink(&self, physics: &mut PhysicsWorld) -> bool {
        debug_assert!(
            !physics.has_contact_listener(),
            "layer \"{}\" unlinked while a contact listener is registered",
            self.name()
        );
        match physics.set_body_owner(self.body, None) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(layer = self.name(), "could not unlink layer body: {e}");
                false
            }
        }
    }
}

/// A single name or a non-empty list of names.
fn parse_names(node: &Value) -> Option<Vec<String>> {
    match node.get("name")? {
        Value::Sequence(seq) if !seq.is_empty() => seq.iter().map(description::scalar_string).collect(),
        Value::Sequence(_) => None,
        other => description::scalar_string(other).map(|n| vec![n]),
    }
}

fn parse_segments(
    value: &Value,
    path: &Path,
    owner: &str,
) -> Result<Vec<(DVec2, DVec2)>, DescriptionError> {
    let seq = value.as_sequence().ok_or_else(|| {
        DescriptionError::invalid(path, format!("invalid \"segments\" in {owner}, not a list"))
    })?;
    seq.iter()
        .enumerate()
        .map(|(i, s)| {
            description::numbers::<4>(s)
                .map(|[x1, y1, x2, y2]| (DVec2::new(x1, y1), DVec2::new(x2, y2)))
                .ok_or_else(|| {
                    DescriptionError::invalid(
                        path,
                        format!("invalid segment index={i} in {owner}, expected [x1, y1, x2, y2]"),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(
        physics: &mut PhysicsWorld,
        cfr: &mut CollisionFilterRegistry,
        base_dir: &Path,
        yaml: &str,
    ) -> Result<Layer, DescriptionError> {
        let node: Value = serde_yaml::from_str(yaml).unwrap();
        Layer::make(
            physics,
            cfr,
            &LayerSource {
                description: &base_dir.join("world.yaml"),
                base_dir,
                index: 0,
                node: &node,
            },
        )
    }

    #[test]
    fn inline_segments_become_edge_fixtures() {
        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        let mut cfr = CollisionFilterRegistry::new();
        let layer = build(
            &mut physics,
            &mut cfr,
            Path::new("/tmp"),
            "{name: walls, segments: [[0, 0, 1, 0], [1, 0, 1, 1]]}",
        )
        .unwrap();
        assert_eq!(layer.name(), "walls");
        assert_eq!(layer.segment_count(), 2);
        assert_eq!(layer.category_bits(), 0b1);
        let body = physics.body(layer.body()).unwrap();
        assert_eq!(body.fixtures().len(), 2);
        assert_eq!(body.owner(), Some(BodyOwner::Layer(LayerId(0))));
        assert_eq!(body.kind(), BodyKind::Static);
    }

    #[test]
    fn several_names_take_several_bits() {
        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        let mut cfr = CollisionFilterRegistry::new();
        let layer = build(
            &mut physics,
            &mut cfr,
            Path::new("/tmp"),
            "{name: [walls, doors], segments: []}",
        )
        .unwrap();
        assert_eq!(layer.names(), ["walls".to_string(), "doors".to_string()]);
        assert_eq!(layer.category_bits(), 0b11);
        assert_eq!(cfr.layer_count(), 2);
    }

    #[test]
    fn map_file_resolves_relative_to_world() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("walls.yaml"),
            "segments:\n  - [0, 0, 5, 0]\n  - [5, 0, 5, 5]\n  - [5, 5, 0, 5]\n",
        )
        .unwrap();
        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        let mut cfr = CollisionFilterRegistry::new();
        let layer = build(&mut physics, &mut cfr, dir.path(), "{name: walls, map: walls.yaml}").unwrap();
        assert_eq!(layer.segment_count(), 3);
        assert_eq!(layer.map(), Some(dir.path().join("walls.yaml").as_path()));
    }

    #[test]
    fn missing_map_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        let mut cfr = CollisionFilterRegistry::new();
        let err = build(&mut physics, &mut cfr, dir.path(), "{name: walls, map: nope.yaml}").unwrap_err();
        assert!(matches!(err, DescriptionError::Io { .. }));
    }

    #[test]
    fn entry_errors_are_descriptive() {
        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        let mut cfr = CollisionFilterRegistry::new();
        let base = Path::new("/tmp");

        let err = build(&mut physics, &mut cfr, base, "{segments: []}").unwrap_err();
        assert!(err.to_string().contains("\"name\""));

        let err = build(&mut physics, &mut cfr, base, "{name: a}").unwrap_err();
        assert!(err.to_string().contains("exactly one"));

        let err = build(&mut physics, &mut cfr, base, "{name: a, segments: [[0, 0, 1]]}").unwrap_err();
        assert!(err.to_string().contains("segment index=0"));

        let err = build(&mut physics, &mut cfr, base, "{name: a, segments: [[0, 0, 0, 0]]}").unwrap_err();
        assert!(err.to_string().contains("bad segment"));
    }

    #[test]
    fn duplicate_layer_name_fails() {
        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        let mut cfr = CollisionFilterRegistry::new();
        let base = Path::new("/tmp");
        build(&mut physics, &mut cfr, base, "{name: a, segments: []}").unwrap();
        let err = build(&mut physics, &mut cfr, base, "{name: a, segments: []}").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn unlink_clears_owner() {
        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        let mut cfr = CollisionFilterRegistry::new();
        let layer = build(
            &mut physics,
            &mut cfr,
            Path::new("/tmp"),
            "{name: a, segments: [[0, 0, 1, 0]]}",
        )
        .unwrap();
        assert!(layer.unlink(&mut physics));
        assert_eq!(physics.body(layer.body()).unwrap().owner(), None);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unlinked while a contact listener is registered")]
    fn unlink_requires_listener_cleared_first() {
        struct Silent;

        impl planeworld_physics::ContactListener for Silent {
            fn begin_contact(&mut self, _: &planeworld_physics::Contact) {}
            fn end_contact(&mut self, _: &planeworld_physics::Contact) {}
            fn pre_solve(&mut self, _: &planeworld_physics::Contact, _: &planeworld_physics::Manifold) {}
            fn post_solve(
                &mut self,
                _: &planeworld_physics::Contact,
                _: &planeworld_physics::ContactImpulse,
            ) {
            }
        }

        let mut physics = PhysicsWorld::new(DVec2::ZERO);
        let mut cfr = CollisionFilterRegistry::new();
        let layer = build(
            &mut physics,
            &mut cfr,
            Path::new("/tmp"),
            "{name: a, segments: [[0, 0, 1, 0]]}",
        )
        .unwrap();
        physics.set_contact_listener(Box::new(Silent));
        layer.unlink(&mut physics);
    }
}
