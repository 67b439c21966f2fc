//! Bridges rapier's step callbacks into listener events.
//!
//! Rapier reports through `&self` trait objects that must be `Send + Sync`,
//! so events are buffered during `PhysicsPipeline::step` and handed to the
//! listener by [`crate::PhysicsWorld`] once the pipeline returns.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use glam::DVec2;
use rapier2d::prelude::{
    ColliderHandle, ColliderSet, CollisionEvent, ContactModificationContext, ContactPair,
    EventHandler, PairFilterContext, PhysicsHooks, Real, RigidBodySet, SolverContact,
    SolverFlags, Vector,
};

use crate::body::{FixtureHandle, FixtureRecord};
use crate::contact::Manifold;

/// Fixtures of one pair in the order rapier reported them.
pub(crate) type PairKey = (FixtureHandle, FixtureHandle);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawEvent {
    Begin(PairKey, Manifold),
    End(PairKey),
    PreSolve(PairKey, Manifold),
    PostSolve(PairKey, f64),
}

impl RawEvent {
    /// Begin/end precede pre-solve, which precedes post-solve.
    fn phase(&self) -> u8 {
        match self {
            RawEvent::Begin(..) | RawEvent::End(..) => 0,
            RawEvent::PreSolve(..) => 1,
            RawEvent::PostSolve(..) => 2,
        }
    }
}

pub(crate) fn fixture_of(colliders: &ColliderSet, collider: ColliderHandle) -> Option<FixtureHandle> {
    colliders.get(collider).map(|c| FixtureHandle(c.user_data as u32))
}

fn pair_key(colliders: &ColliderSet, a: ColliderHandle, b: ColliderHandle) -> Option<PairKey> {
    Some((fixture_of(colliders, a)?, fixture_of(colliders, b)?))
}

fn solver_manifold(normal: &Vector<Real>, contacts: &[SolverContact]) -> Manifold {
    Manifold {
        normal: DVec2::new(normal.x, normal.y),
        points: contacts.iter().map(|c| DVec2::new(c.point.x, c.point.y)).collect(),
        depth: contacts.iter().map(|c| -c.dist).fold(0.0, f64::max),
    }
}

/// World-space geometry of the first manifold that reached the solver.
pub(crate) fn manifold_of(pair: &ContactPair) -> Manifold {
    pair.manifolds
        .iter()
        .find(|m| !m.data.solver_contacts.is_empty())
        .map(|m| solver_manifold(&m.data.normal, &m.data.solver_contacts))
        .unwrap_or_default()
}

/// Buffers collision and contact-force events raised during one step.
#[derive(Default)]
pub(crate) struct EventCollector {
    events: Mutex<Vec<RawEvent>>,
}

impl EventCollector {
    fn push(&self, event: RawEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Events in listener order, one pre-solve per pair.
    pub(crate) fn into_events(self) -> Vec<RawEvent> {
        let mut events = self.events.into_inner().unwrap_or_else(PoisonError::into_inner);
        let mut presolved = BTreeSet::new();
        events.retain(|e| match e {
            RawEvent::PreSolve(key, _) => presolved.insert(*key),
            _ => true,
        });
        events.sort_by_key(RawEvent::phase);
        events
    }
}

impl EventHandler for EventCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        // Pairs dropped with a removed collider were already ended by destroy_body.
        if event.removed() {
            return;
        }
        let Some(key) = pair_key(colliders, event.collider1(), event.collider2()) else {
            return;
        };
        if event.started() {
            let manifold = match contact_pair {
                Some(pair) if pair.collider1 == event.collider1() => manifold_of(pair),
                Some(pair) => {
                    let mut m = manifold_of(pair);
                    m.normal = -m.normal;
                    m
                }
                None => Manifold::default(),
            };
            self.push(RawEvent::Begin(key, manifold));
        } else {
            self.push(RawEvent::End(key));
        }
    }

    fn handle_contact_force_event(
        &self,
        dt: Real,
        _bodies: &RigidBodySet,
        colliders: &ColliderSet,
        contact_pair: &ContactPair,
        total_force_magnitude: Real,
    ) {
        if let Some(key) = pair_key(colliders, contact_pair.collider1, contact_pair.collider2) {
            self.push(RawEvent::PostSolve(key, total_force_magnitude * dt));
        }
    }
}

/// Pair filtering by fixture [`crate::Filter`] groups, and pre-solve capture.
pub(crate) struct PairHooks<'a> {
    pub fixtures: &'a BTreeMap<FixtureHandle, FixtureRecord>,
    pub events: &'a EventCollector,
}

impl PairHooks<'_> {
    fn should_collide(&self, context: &PairFilterContext) -> bool {
        let filter = |collider| {
            fixture_of(context.colliders, collider)
                .and_then(|f| self.fixtures.get(&f))
                .map(|r| r.filter)
        };
        match (filter(context.collider1), filter(context.collider2)) {
            (Some(a), Some(b)) => a.should_collide(&b),
            _ => true,
        }
    }
}

impl PhysicsHooks for PairHooks<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        self.should_collide(context)
            .then_some(SolverFlags::COMPUTE_IMPULSES)
    }

    fn filter_intersection_pair(&self, context: &PairFilterContext) -> bool {
        self.should_collide(context)
    }

    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        if context.solver_contacts.is_empty() {
            return;
        }
        if let Some(key) = pair_key(context.colliders, context.collider1, context.collider2) {
            let manifold = solver_manifold(&*context.normal, &context.solver_contacts[..]);
            self.events.push(RawEvent::PreSolve(key, manifold));
        }
    }
}
