use std::collections::{BTreeMap, BTreeSet};

use planeworld_kernel::{ModelPlugin, PluginContext, PluginError, StepContext};
use planeworld_physics::{BodyHandle, Contact, ContactImpulse, FixtureHandle};
use serde::Deserialize;
use serde_yaml::Mapping;

use crate::config;

/// Tracks contacts between the model's bodies and anything else.
///
/// ```yaml
/// - type: Bumper
///   name: bumper
///   exclude: [wheel_left, wheel_right]   # bodies to ignore
/// ```
#[derive(Debug, Default)]
pub struct Bumper {
    name: String,
    bodies: BTreeSet<BodyHandle>,
    active: BTreeMap<(FixtureHandle, FixtureHandle), f64>,
    total: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BumperConfig {
    exclude: Vec<String>,
}

impl Bumper {
    pub const TYPE: &'static str = "Bumper";

    /// Contacts touching the model right now.
    pub fn active_contacts(&self) -> usize {
        self.active.len()
    }

    /// Contacts begun since initialization.
    pub fn total_contacts(&self) -> u64 {
        self.total
    }

    /// Largest normal impulse among active contacts during the last step.
    pub fn max_impulse(&self) -> f64 {
        self.active.values().copied().fold(0.0, f64::max)
    }

    pub fn is_watching(&self, body: BodyHandle) -> bool {
        self.bodies.contains(&body)
    }

    fn watches(&self, contact: &Contact) -> bool {
        self.bodies.contains(&contact.body_a) || self.bodies.contains(&contact.body_b)
    }
}

impl ModelPlugin for Bumper {
    fn on_initialize(&mut self, ctx: &PluginContext<'_>, config: &Mapping) -> Result<(), PluginError> {
        let BumperConfig { exclude } = config::parse(config)?;
        if let Some(unknown) = exclude.iter().find(|name| ctx.model.body(name).is_none()) {
            return Err(PluginError::Config(format!(
                "cannot exclude \"{unknown}\", no such body"
            )));
        }
        self.name = ctx.name.to_string();
        self.bodies = ctx
            .model
            .bodies()
            .iter()
            .filter(|b| !exclude.iter().any(|name| name == b.name()))
            .map(|b| b.handle())
            .collect();
        Ok(())
    }

    fn after_physics_step(&mut self, _ctx: &mut StepContext<'_>) {
        if !self.active.is_empty() {
            tracing::trace!(
                bumper = %self.name,
                contacts = self.active.len(),
                max_impulse = self.max_impulse(),
                "bumper state"
            );
        }
    }

    fn begin_contact(&mut self, contact: &Contact) {
        if !self.watches(contact) {
            return;
        }
        self.active.insert((contact.fixture_a, contact.fixture_b), 0.0);
        self.total += 1;
        tracing::debug!(
            bumper = %self.name,
            body_a = contact.body_a.0,
            body_b = contact.body_b.0,
            "collision"
        );
    }

    fn end_contact(&mut self, contact: &Contact) {
        if self
            .active
            .remove(&(contact.fixture_a, contact.fixture_b))
            .is_some()
        {
            tracing::debug!(bumper = %self.name, "collision ended");
        }
    }

    fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {
        if let Some(slot) = self.active.get_mut(&(contact.fixture_a, contact.fixture_b)) {
            *slot = impulse.normal_impulse;
        }
    }
}
