use glam::DVec2;
use planeworld_kernel::{ModelPlugin, PluginContext, PluginError, StepContext};
use planeworld_physics::BodyHandle;
use serde::Deserialize;
use serde_yaml::Mapping;

use crate::config;

/// Sets a body's velocity before every physics step.
///
/// ```yaml
/// - type: Drive
///   name: drive
///   body: base
///   linear: [0.5, 0]   # m/s, body frame
///   angular: 0.1       # rad/s
/// ```
#[derive(Debug, Default)]
pub struct Drive {
    body: Option<BodyHandle>,
    linear: DVec2,
    angular: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DriveConfig {
    body: Option<String>,
    linear: [f64; 2],
    angular: f64,
}

impl Drive {
    pub const TYPE: &'static str = "Drive";

    /// Commanded velocity, body frame.
    pub fn command(&self) -> (DVec2, f64) {
        (self.linear, self.angular)
    }

    pub fn set_command(&mut self, linear: DVec2, angular: f64) {
        self.linear = linear;
        self.angular = angular;
    }
}

impl ModelPlugin for Drive {
    fn on_initialize(&mut self, ctx: &PluginContext<'_>, config: &Mapping) -> Result<(), PluginError> {
        let config: DriveConfig = config::parse(config)?;
        let body_name = config
            .body
            .ok_or_else(|| PluginError::Config("missing \"body\"".into()))?;
        let body = ctx.model.body(&body_name).ok_or_else(|| {
            PluginError::Config(format!("body \"{body_name}\" does not exist"))
        })?;
        self.body = Some(body.handle());
        self.linear = DVec2::from_array(config.linear);
        self.angular = config.angular;
        Ok(())
    }

    fn before_physics_step(&mut self, ctx: &mut StepContext<'_>) {
        let Some(body) = self.body else {
            return;
        };
        let Some(angle) = ctx.bodies.body(body).map(|b| b.angle()) else {
            return;
        };
        let velocity = DVec2::from_angle(angle).rotate(self.linear);
        let result = ctx
            .bodies
            .set_linear_velocity(body, velocity)
            .and_then(|()| ctx.bodies.set_angular_velocity(body, self.angular));
        if let Err(e) = result {
            tracing::warn!("drive could not set velocity: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planeworld_kernel::{PluginRegistry, Timekeeper, World, WorldError};
    use std::f64::consts::FRAC_PI_2;
    use std::path::Path;

    use crate::builtin_registry;

    fn write_world(dir: &Path, theta: f64, drive: &str) -> std::path::PathBuf {
        std::fs::write(
            dir.join("cart.yaml"),
            format!(
                "bodies:\n  - name: base\n    footprints: [{{type: circle, radius: 0.3}}]\nplugins:\n  - {drive}\n"
            ),
        )
        .unwrap();
        let path = dir.join("world.yaml");
        std::fs::write(
            &path,
            format!(
                "properties: {{}}\nlayers: []\nmodels:\n  - {{name: cart, pose: [0, 0, {theta}], model: cart.yaml}}\n"
            ),
        )
        .unwrap();
        path
    }

    fn base_position(world: &World) -> DVec2 {
        let handle = world.model("", "cart").unwrap().body("base").unwrap().handle();
        world.physics().body(handle).unwrap().position()
    }

    #[test]
    fn drives_in_body_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_world(
            dir.path(),
            FRAC_PI_2,
            "{type: Drive, name: drive, body: base, linear: [1, 0]}",
        );
        let mut world = World::make_world(path, builtin_registry()).unwrap();
        let mut timekeeper = Timekeeper::new(0.1);
        for _ in 0..10 {
            world.update(&mut timekeeper);
        }
        let p = base_position(&world);
        assert!(p.x.abs() < 1e-9, "{p}");
        assert!((p.y - 1.0).abs() < 1e-9, "{p}");
    }

    #[test]
    fn spins_at_angular_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_world(dir.path(), 0.0, "{type: Drive, name: drive, body: base, angular: 0.5}");
        let mut world = World::make_world(path, builtin_registry()).unwrap();
        let mut timekeeper = Timekeeper::new(0.1);
        for _ in 0..4 {
            world.update(&mut timekeeper);
        }
        let handle = world.model("", "cart").unwrap().body("base").unwrap().handle();
        let angle = world.physics().body(handle).unwrap().angle();
        assert!((angle - 0.2).abs() < 1e-9, "{angle}");
    }

    #[test]
    fn unknown_body_fails_world_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_world(dir.path(), 0.0, "{type: Drive, name: drive, body: turret}");
        let err = World::make_world(&path, builtin_registry()).unwrap_err();
        assert!(err.to_string().contains("turret"));

        let err = World::make_world(&path, PluginRegistry::new()).unwrap_err();
        assert!(matches!(err, WorldError::Plugin(_)));
    }

    #[test]
    fn malformed_config_fails_world_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_world(dir.path(), 0.0, "{type: Drive, name: drive, linear: [1, 0]}");
        let err = World::make_world(&path, builtin_registry()).unwrap_err();
        assert!(err.to_string().contains("missing \"body\""), "{err}");

        let path = write_world(
            dir.path(),
            0.0,
            "{type: Drive, name: drive, body: base, linear: [1, 0, 0]}",
        );
        let err = World::make_world(&path, builtin_registry()).unwrap_err();
        assert!(matches!(err, WorldError::Plugin(_)), "{err}");
    }
}
