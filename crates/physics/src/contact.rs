use glam::DVec2;
use planeworld_common::BodyOwner;
use rapier2d::prelude::{Group, InteractionGroups};

use crate::body::{BodyHandle, FixtureHandle};

/// Collision filtering data carried by each fixture.
///
/// Two fixtures in the same nonzero group always collide when the group is
/// positive and never collide when it is negative. Otherwise each fixture's
/// category must appear in the other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    pub category_bits: u16,
    pub mask_bits: u16,
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }
        (self.category_bits & other.mask_bits) != 0 && (other.category_bits & self.mask_bits) != 0
    }

    /// Broad test handed to rapier. Exact for group zero; fixtures in a
    /// group are refined by the pair hook with [`Filter::should_collide`].
    pub(crate) fn interaction_groups(&self) -> InteractionGroups {
        if self.group_index > 0 {
            return InteractionGroups::all();
        }
        InteractionGroups::new(
            Group::from_bits_truncate(self.category_bits.into()),
            Group::from_bits_truncate(self.mask_bits.into()),
        )
    }

    pub(crate) fn needs_pair_hook(&self) -> bool {
        self.group_index != 0
    }
}

/// Contact geometry in world coordinates. `normal` points from A to B.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifold {
    pub normal: DVec2,
    pub points: Vec<DVec2>,
    pub depth: f64,
}

/// Impulse the solver applied along the contact normal during one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactImpulse {
    pub normal_impulse: f64,
}

/// A pair of touching fixtures, as reported to the contact listener.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub fixture_a: FixtureHandle,
    pub fixture_b: FixtureHandle,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Owner links at the time of the callback; `None` once unlinked.
    pub owner_a: Option<BodyOwner>,
    pub owner_b: Option<BodyOwner>,
    pub manifold: Manifold,
    pub is_sensor: bool,
}

impl Contact {
    pub fn involves(&self, body: BodyHandle) -> bool {
        self.body_a == body || self.body_b == body
    }

    /// The body on the other side of the contact from `body`.
    pub fn other_body(&self, body: BodyHandle) -> Option<BodyHandle> {
        if self.body_a == body {
            Some(self.body_b)
        } else if self.body_b == body {
            Some(self.body_a)
        } else {
            None
        }
    }
}

/// Receiver for contact events raised while the engine steps.
///
/// Callbacks run on the engine's call stack. Implementations must not try to
/// reach back into the engine.
pub trait ContactListener {
    fn begin_contact(&mut self, contact: &Contact);
    fn end_contact(&mut self, contact: &Contact);
    fn pre_solve(&mut self, contact: &Contact, old_manifold: &Manifold);
    fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse);
}
