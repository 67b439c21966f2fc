use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use glam::DVec2;
use planeworld_common::BodyOwner;
use rapier2d::prelude::{
    ActiveEvents, ActiveHooks, CCDSolver, ColliderHandle, ColliderSet, DefaultBroadPhase,
    ImpulseJointSet, IntegrationParameters, IslandManager, Isometry, MultibodyJointSet,
    NarrowPhase, PhysicsPipeline, RigidBody, RigidBodyBuilder, RigidBodySet, vector,
};

use crate::PhysicsError;
use crate::body::{
    Body, BodyDef, BodyHandle, BodyRecord, Fixture, FixtureDef, FixtureHandle, FixtureRecord,
};
use crate::contact::{Contact, ContactImpulse, ContactListener, Manifold};
use crate::events::{EventCollector, PairHooks, PairKey, RawEvent, fixture_of};

/// Counters for engine-level operations, for instrumentation and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub steps: u64,
    /// Fixtures removed from the broad phase one at a time.
    pub proxy_removals: u64,
    /// Calls to [`PhysicsWorld::release_all`].
    pub bulk_releases: u64,
    pub last_velocity_iterations: u32,
    pub last_position_iterations: u32,
}

/// What a bulk release reclaimed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseStats {
    pub bodies: usize,
    pub fixtures: usize,
}

enum ContactEvent {
    Begin(Contact),
    End(Contact),
    PreSolve(Contact, Manifold),
    PostSolve(Contact, ContactImpulse),
}

/// The simulation space: a rapier pipeline plus the single contact listener.
///
/// Bodies and fixtures are addressed by stable [`BodyHandle`]/[`FixtureHandle`]
/// values; rapier handles never leave this crate.
pub struct PhysicsWorld {
    gravity: DVec2,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    bodies: BTreeMap<BodyHandle, BodyRecord>,
    fixtures: BTreeMap<FixtureHandle, FixtureRecord>,
    next_body: u32,
    next_fixture: u32,
    listener: Option<Box<dyn ContactListener>>,
    stats: EngineStats,
}

impl PhysicsWorld {
    pub fn new(gravity: DVec2) -> Self {
        Self {
            gravity,
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            bodies: BTreeMap::new(),
            fixtures: BTreeMap::new(),
            next_body: 0,
            next_fixture: 0,
            listener: None,
            stats: EngineStats::default(),
        }
    }

    pub fn gravity(&self) -> DVec2 {
        self.gravity
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Register the contact listener, returning the one it replaces.
    pub fn set_contact_listener(
        &mut self,
        listener: Box<dyn ContactListener>,
    ) -> Option<Box<dyn ContactListener>> {
        self.listener.replace(listener)
    }

    /// Deregister the contact listener. No callbacks fire afterwards.
    pub fn clear_contact_listener(&mut self) -> Option<Box<dyn ContactListener>> {
        self.listener.take()
    }

    pub fn has_contact_listener(&self) -> bool {
        self.listener.is_some()
    }

    pub fn create_body(&mut self, def: &BodyDef) -> BodyHandle {
        let handle = BodyHandle(self.next_body);
        self.next_body += 1;
        let rigid_body = RigidBodyBuilder::new(def.kind.rigid_body_type())
            .position(Isometry::new(vector![def.position.x, def.position.y], def.angle))
            .linear_damping(def.linear_damping)
            .angular_damping(def.angular_damping)
            .user_data(handle.0.into())
            .build();
        let rigid_body = self.rigid_bodies.insert(rigid_body);
        self.bodies.insert(
            handle,
            BodyRecord {
                rigid_body,
                kind: def.kind,
                owner: def.owner,
                fixtures: Vec::new(),
            },
        );
        handle
    }

    pub fn create_fixture(
        &mut self,
        body: BodyHandle,
        def: FixtureDef,
    ) -> Result<FixtureHandle, PhysicsError> {
        let shape = def.shape.validated()?;
        let record = self
            .bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        let handle = FixtureHandle(self.next_fixture);

        let mut hooks = ActiveHooks::empty();
        if def.filter.needs_pair_hook() {
            hooks |= ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR;
        }
        if !def.is_sensor {
            hooks |= ActiveHooks::MODIFY_SOLVER_CONTACTS;
        }
        let collider = shape
            .collider_builder()?
            .density(def.density)
            .friction(def.friction)
            .restitution(def.restitution)
            .sensor(def.is_sensor)
            .collision_groups(def.filter.interaction_groups())
            .active_hooks(hooks)
            .active_events(ActiveEvents::COLLISION_EVENTS | ActiveEvents::CONTACT_FORCE_EVENTS)
            .contact_force_event_threshold(0.0)
            .user_data(handle.0.into())
            .build();
        let collider =
            self.colliders
                .insert_with_parent(collider, record.rigid_body, &mut self.rigid_bodies);

        self.next_fixture += 1;
        record.fixtures.push(handle);
        self.fixtures.insert(
            handle,
            FixtureRecord {
                collider,
                body,
                shape,
                filter: def.filter,
                is_sensor: def.is_sensor,
            },
        );
        Ok(handle)
    }

    /// Destroy one body through `RigidBodySet::remove`, taking its colliders
    /// out of the broad phase one at a time.
    ///
    /// Touching contacts involving the body are ended through the listener.
    pub fn destroy_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError> {
        let record = self.bodies.get(&body).ok_or(PhysicsError::UnknownBody(body))?;
        let ended: Vec<RawEvent> = record
            .fixtures
            .iter()
            .filter_map(|f| self.fixtures.get(f))
            .flat_map(|f| self.touching_pairs(f.collider))
            .map(RawEvent::End)
            .collect();
        let events = self.resolve(ended);
        self.dispatch(events);

        let Some(record) = self.bodies.remove(&body) else {
            return Ok(());
        };
        for fixture in &record.fixtures {
            self.fixtures.remove(fixture);
            self.stats.proxy_removals += 1;
        }
        self.rigid_bodies.remove(
            record.rigid_body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        Ok(())
    }

    /// Reclaim every body, fixture and contact in one call.
    ///
    /// The rapier sets are dropped wholesale; no contact callbacks fire.
    pub fn release_all(&mut self) -> ReleaseStats {
        let released = ReleaseStats {
            bodies: self.body_count(),
            fixtures: self.fixture_count(),
        };
        self.rigid_bodies = RigidBodySet::new();
        self.colliders = ColliderSet::new();
        self.islands = IslandManager::new();
        self.broad_phase = DefaultBroadPhase::new();
        self.narrow_phase = NarrowPhase::new();
        self.impulse_joints = ImpulseJointSet::new();
        self.multibody_joints = MultibodyJointSet::new();
        self.ccd_solver = CCDSolver::new();
        self.bodies.clear();
        self.fixtures.clear();
        self.stats.bulk_releases += 1;
        tracing::debug!(
            bodies = released.bodies,
            fixtures = released.fixtures,
            "physics world released"
        );
        released
    }

    pub fn body(&self, body: BodyHandle) -> Option<Body<'_>> {
        let record = self.bodies.get(&body)?;
        Some(Body {
            record,
            rigid_body: self.rigid_bodies.get(record.rigid_body)?,
        })
    }

    pub fn fixture(&self, fixture: FixtureHandle) -> Option<Fixture<'_>> {
        let record = self.fixtures.get(&fixture)?;
        Some(Fixture {
            record,
            collider: self.colliders.get(record.collider)?,
        })
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, Body<'_>)> {
        self.bodies.iter().filter_map(move |(handle, record)| {
            let rigid_body = self.rigid_bodies.get(record.rigid_body)?;
            Some((*handle, Body { record, rigid_body }))
        })
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    /// Pairs whose bounding boxes overlap, touching or not.
    pub fn pair_count(&self) -> usize {
        self.narrow_phase.contact_pairs().count() + self.narrow_phase.intersection_pairs().count()
    }

    /// Number of fixture pairs touching as of the last step.
    pub fn contact_count(&self) -> usize {
        let live = |a, b| self.colliders.get(a).is_some() && self.colliders.get(b).is_some();
        let contacts = self
            .narrow_phase
            .contact_pairs()
            .filter(|p| p.has_any_active_contact && live(p.collider1, p.collider2))
            .count();
        let overlaps = self
            .narrow_phase
            .intersection_pairs()
            .filter(|&(a, b, touching)| touching && live(a, b))
            .count();
        contacts + overlaps
    }

    /// Set or clear the body's back-reference to its owning world object.
    pub fn set_body_owner(
        &mut self,
        body: BodyHandle,
        owner: Option<BodyOwner>,
    ) -> Result<(), PhysicsError> {
        self.bodies
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?
            .owner = owner;
        Ok(())
    }

    pub fn set_transform(
        &mut self,
        body: BodyHandle,
        position: DVec2,
        angle: f64,
    ) -> Result<(), PhysicsError> {
        self.rigid_body_mut(body)?
            .set_position(Isometry::new(vector![position.x, position.y], angle), true);
        Ok(())
    }

    pub fn set_linear_velocity(
        &mut self,
        body: BodyHandle,
        velocity: DVec2,
    ) -> Result<(), PhysicsError> {
        self.rigid_body_mut(body)?
            .set_linvel(vector![velocity.x, velocity.y], true);
        Ok(())
    }

    pub fn set_angular_velocity(
        &mut self,
        body: BodyHandle,
        velocity: f64,
    ) -> Result<(), PhysicsError> {
        self.rigid_body_mut(body)?.set_angvel(velocity, true);
        Ok(())
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Velocity iterations become rapier solver iterations. Rapier has no
    /// separate position pass, so position iterations are only recorded.
    ///
    /// Contact callbacks fire synchronously from inside this call, once the
    /// pipeline returns: begin and end first, then pre-solve, then post-solve.
    pub fn step(&mut self, dt: f64, velocity_iterations: u32, position_iterations: u32) {
        self.stats.steps += 1;
        self.stats.last_velocity_iterations = velocity_iterations;
        self.stats.last_position_iterations = position_iterations;

        self.params.dt = dt;
        self.params.num_solver_iterations =
            NonZeroUsize::new(velocity_iterations as usize).unwrap_or(NonZeroUsize::MIN);
        let collector = EventCollector::default();
        let hooks = PairHooks {
            fixtures: &self.fixtures,
            events: &collector,
        };
        self.pipeline.step(
            &vector![self.gravity.x, self.gravity.y],
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &hooks,
            &collector,
        );

        let events = self.resolve(collector.into_events());
        self.dispatch(events);
        tracing::trace!(
            step = self.stats.steps,
            contacts = self.contact_count(),
            "physics step"
        );
    }

    /// Fixture pairs currently touching `collider`.
    fn touching_pairs(&self, collider: ColliderHandle) -> impl Iterator<Item = PairKey> + '_ {
        let contacts = self
            .narrow_phase
            .contact_pairs_with(collider)
            .filter(|p| p.has_any_active_contact)
            .map(|p| (p.collider1, p.collider2));
        let overlaps = self
            .narrow_phase
            .intersection_pairs_with(collider)
            .filter(|&(_, _, touching)| touching)
            .map(|(a, b, _)| (a, b));
        contacts.chain(overlaps).filter_map(move |(a, b)| {
            Some((fixture_of(&self.colliders, a)?, fixture_of(&self.colliders, b)?))
        })
    }

    fn resolve(&self, events: Vec<RawEvent>) -> Vec<ContactEvent> {
        events
            .into_iter()
            .filter_map(|event| {
                Some(match event {
                    RawEvent::Begin(key, manifold) => {
                        ContactEvent::Begin(self.make_contact(key, manifold)?)
                    }
                    RawEvent::End(key) => {
                        ContactEvent::End(self.make_contact(key, Manifold::default())?)
                    }
                    RawEvent::PreSolve(key, manifold) => {
                        let contact = self.make_contact(key, manifold)?;
                        let old = contact.manifold.clone();
                        ContactEvent::PreSolve(contact, old)
                    }
                    RawEvent::PostSolve(key, normal_impulse) => ContactEvent::PostSolve(
                        self.make_contact(key, Manifold::default())?,
                        ContactImpulse { normal_impulse },
                    ),
                })
            })
            .collect()
    }

    /// Contact with the lower fixture handle as side A.
    fn make_contact(&self, (fa, fb): PairKey, mut manifold: Manifold) -> Option<Contact> {
        let (fa, fb) = if fb < fa {
            manifold.normal = -manifold.normal;
            (fb, fa)
        } else {
            (fa, fb)
        };
        let a = self.fixtures.get(&fa)?;
        let b = self.fixtures.get(&fb)?;
        Some(Contact {
            fixture_a: fa,
            fixture_b: fb,
            body_a: a.body,
            body_b: b.body,
            owner_a: self.bodies.get(&a.body).and_then(|r| r.owner),
            owner_b: self.bodies.get(&b.body).and_then(|r| r.owner),
            manifold,
            is_sensor: a.is_sensor || b.is_sensor,
        })
    }

    fn dispatch(&mut self, events: Vec<ContactEvent>) {
        let Some(listener) = self.listener.as_deref_mut() else {
            return;
        };
        for event in &events {
            match event {
                ContactEvent::Begin(c) => listener.begin_contact(c),
                ContactEvent::End(c) => listener.end_contact(c),
                ContactEvent::PreSolve(c, old) => listener.pre_solve(c, old),
                ContactEvent::PostSolve(c, impulse) => listener.post_solve(c, impulse),
            }
        }
    }

    fn rigid_body_mut(
        &mut self,
        body: BodyHandle,
    ) -> Result<&mut RigidBody, PhysicsError> {
        self.bodies
            .get(&body)
            .and_then(|r| self.rigid_bodies.get_mut(r.rigid_body))
            .ok_or(PhysicsError::UnknownBody(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyKind;
    use crate::contact::Filter;
    use crate::shape::Shape;
    use planeworld_common::LayerId;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
        contacts: Rc<RefCell<Vec<Contact>>>,
        presolved: Rc<RefCell<Vec<Contact>>>,
    }

    impl ContactListener for Recorder {
        fn begin_contact(&mut self, contact: &Contact) {
            self.log.borrow_mut().push("begin".into());
            self.contacts.borrow_mut().push(contact.clone());
        }
        fn end_contact(&mut self, _contact: &Contact) {
            self.log.borrow_mut().push("end".into());
        }
        fn pre_solve(&mut self, contact: &Contact, _old: &Manifold) {
            self.log.borrow_mut().push("pre".into());
            self.presolved.borrow_mut().push(contact.clone());
        }
        fn post_solve(&mut self, contact: &Contact, impulse: &ContactImpulse) {
            assert!(!contact.is_sensor);
            assert!(impulse.normal_impulse >= 0.0);
            self.log.borrow_mut().push("post".into());
        }
    }

    fn ground(world: &mut PhysicsWorld) -> BodyHandle {
        let body = world.create_body(&BodyDef::new(BodyKind::Static));
        world
            .create_fixture(
                body,
                FixtureDef::new(Shape::edge(DVec2::new(-10.0, 0.0), DVec2::new(10.0, 0.0))),
            )
            .unwrap();
        body
    }

    fn ball(world: &mut PhysicsWorld, at: DVec2) -> BodyHandle {
        let mut def = BodyDef::new(BodyKind::Dynamic);
        def.position = at;
        let body = world.create_body(&def);
        world
            .create_fixture(body, FixtureDef::new(Shape::circle(DVec2::ZERO, 0.5)))
            .unwrap();
        body
    }

    #[test]
    fn gravity_accelerates_dynamic_bodies_only() {
        let mut world = PhysicsWorld::new(DVec2::new(0.0, -10.0));
        let g = ground(&mut world);
        let b = ball(&mut world, DVec2::new(0.0, 5.0));
        world.step(0.1, 10, 10);
        let body = world.body(b).unwrap();
        assert!((body.linear_velocity().y + 1.0).abs() < 1e-9);
        assert!(body.position().y < 5.0 && body.position().y > 4.8);
        assert_eq!(world.body(g).unwrap().position(), DVec2::ZERO);
        assert_eq!(world.stats().steps, 1);
        assert_eq!(world.stats().last_velocity_iterations, 10);
    }

    #[test]
    fn set_velocity_moves_body_exactly() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let b = ball(&mut world, DVec2::ZERO);
        world.set_linear_velocity(b, DVec2::new(2.0, -1.0)).unwrap();
        world.set_angular_velocity(b, 0.5).unwrap();
        for _ in 0..10 {
            world.step(0.1, 10, 10);
        }
        let body = world.body(b).unwrap();
        assert!(body.position().distance(DVec2::new(2.0, -1.0)) < 1e-9);
        assert!((body.angle() - 0.5).abs() < 1e-9);
        assert!(body.mass() > 0.0);
    }

    #[test]
    fn contact_lifecycle_reaches_listener() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        ground(&mut world);
        let b = ball(&mut world, DVec2::new(0.0, 0.45));
        let log = Rc::new(RefCell::new(Vec::new()));
        world.set_contact_listener(Box::new(Recorder {
            log: log.clone(),
            ..Recorder::default()
        }));

        world.step(0.01, 10, 10);
        assert_eq!(log.borrow()[..2], ["begin", "pre"]);
        assert!(!log.borrow().contains(&"end".to_string()));
        assert_eq!(world.contact_count(), 1);
        log.borrow_mut().clear();

        world.set_transform(b, DVec2::new(0.0, 3.0), 0.0).unwrap();
        world.step(0.01, 10, 10);
        assert_eq!(*log.borrow(), vec!["end"]);
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn pressing_contact_reports_post_solve_impulse() {
        let mut world = PhysicsWorld::new(DVec2::new(0.0, -10.0));
        ground(&mut world);
        ball(&mut world, DVec2::new(0.0, 0.49));
        let log = Rc::new(RefCell::new(Vec::new()));
        world.set_contact_listener(Box::new(Recorder {
            log: log.clone(),
            ..Recorder::default()
        }));
        for _ in 0..5 {
            world.step(1.0 / 60.0, 10, 10);
        }
        let log = log.borrow();
        assert_eq!(log.iter().filter(|e| *e == "begin").count(), 1);
        assert!(log.iter().any(|e| e == "post"));
        let first_post = log.iter().position(|e| e == "post").unwrap();
        let first_pre = log.iter().position(|e| e == "pre").unwrap();
        assert!(first_pre < first_post);
    }

    #[test]
    fn cleared_listener_receives_nothing() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        ground(&mut world);
        ball(&mut world, DVec2::new(0.0, 0.45));
        let log = Rc::new(RefCell::new(Vec::new()));
        world.set_contact_listener(Box::new(Recorder {
            log: log.clone(),
            ..Recorder::default()
        }));
        assert!(world.clear_contact_listener().is_some());
        assert!(!world.has_contact_listener());
        world.step(0.01, 10, 10);
        assert_eq!(world.contact_count(), 1);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn falling_ball_comes_to_rest_on_ground() {
        let mut world = PhysicsWorld::new(DVec2::new(0.0, -10.0));
        ground(&mut world);
        let b = ball(&mut world, DVec2::new(0.0, 2.0));
        for _ in 0..300 {
            world.step(1.0 / 60.0, 10, 10);
        }
        let body = world.body(b).unwrap();
        assert!(body.position().y > 0.4, "sank to {}", body.position().y);
        assert!(body.position().y < 0.55, "floated at {}", body.position().y);
        assert!(body.linear_velocity().y.abs() < 0.5);
    }

    #[test]
    fn filters_suppress_contacts() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let g = world.create_body(&BodyDef::new(BodyKind::Static));
        world
            .create_fixture(
                g,
                FixtureDef::new(Shape::edge(DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0)))
                    .with_filter(Filter {
                        category_bits: 0b01,
                        mask_bits: 0b01,
                        group_index: 0,
                    }),
            )
            .unwrap();
        let b = world.create_body(&BodyDef::new(BodyKind::Dynamic));
        world
            .create_fixture(
                b,
                FixtureDef::new(Shape::circle(DVec2::ZERO, 0.5)).with_filter(Filter {
                    category_bits: 0b10,
                    mask_bits: 0b10,
                    group_index: 0,
                }),
            )
            .unwrap();
        world.step(0.01, 10, 10);
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn negative_group_keeps_siblings_apart() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let sibling = Filter {
            group_index: -1,
            ..Filter::default()
        };
        for x in [0.0, 0.3] {
            let body = world.create_body(&BodyDef {
                position: DVec2::new(x, 0.0),
                ..BodyDef::new(BodyKind::Dynamic)
            });
            world
                .create_fixture(
                    body,
                    FixtureDef::new(Shape::circle(DVec2::ZERO, 0.5)).with_filter(sibling),
                )
                .unwrap();
        }
        ball(&mut world, DVec2::new(-0.9, 0.0));
        world.step(0.01, 10, 10);
        assert_eq!(world.contact_count(), 1);
    }

    #[test]
    fn owner_link_is_reported_until_cleared() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let g = world.create_body(
            &BodyDef::new(BodyKind::Static).with_owner(BodyOwner::Layer(LayerId(0))),
        );
        let edge = world
            .create_fixture(
                g,
                FixtureDef::new(Shape::edge(DVec2::new(-1.0, 0.0), DVec2::new(1.0, 0.0))),
            )
            .unwrap();
        ball(&mut world, DVec2::new(0.0, 0.45));
        let contacts = Rc::new(RefCell::new(Vec::new()));
        let presolved = Rc::new(RefCell::new(Vec::new()));
        world.set_contact_listener(Box::new(Recorder {
            contacts: contacts.clone(),
            presolved: presolved.clone(),
            ..Recorder::default()
        }));
        world.step(0.01, 10, 10);
        let contact = contacts.borrow()[0].clone();
        assert_eq!(contact.fixture_a, edge);
        assert_eq!(contact.owner_a, Some(BodyOwner::Layer(LayerId(0))));
        assert_eq!(contact.owner_b, None);

        let solved = presolved.borrow()[0].clone();
        assert!(solved.manifold.normal.y > 0.9, "{:?}", solved.manifold);
        assert!(solved.manifold.depth > 0.0);
        assert!(!solved.manifold.points.is_empty());

        world.set_body_owner(g, None).unwrap();
        assert_eq!(world.body(g).unwrap().owner(), None);
    }

    #[test]
    fn destroy_body_removes_fixtures_one_by_one() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let g = world.create_body(&BodyDef::new(BodyKind::Static));
        for i in 0..5 {
            let x = i as f64;
            world
                .create_fixture(
                    g,
                    FixtureDef::new(Shape::edge(DVec2::new(x, 0.0), DVec2::new(x + 1.0, 0.0))),
                )
                .unwrap();
        }
        world.destroy_body(g).unwrap();
        assert_eq!(world.stats().proxy_removals, 5);
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.fixture_count(), 0);
        assert!(world.destroy_body(g).is_err());
    }

    #[test]
    fn destroy_body_ends_its_contacts_at_once() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let g = ground(&mut world);
        ball(&mut world, DVec2::new(0.0, 0.45));
        let log = Rc::new(RefCell::new(Vec::new()));
        world.set_contact_listener(Box::new(Recorder {
            log: log.clone(),
            ..Recorder::default()
        }));
        world.step(0.01, 10, 10);
        log.borrow_mut().clear();

        world.destroy_body(g).unwrap();
        assert_eq!(*log.borrow(), vec!["end"]);
        world.step(0.01, 10, 10);
        assert_eq!(*log.borrow(), vec!["end"]);
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn release_all_is_one_bulk_call() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let g = world.create_body(&BodyDef::new(BodyKind::Static));
        for i in 0..1000 {
            let x = i as f64;
            world
                .create_fixture(
                    g,
                    FixtureDef::new(Shape::edge(DVec2::new(x, 0.0), DVec2::new(x + 1.0, 0.0))),
                )
                .unwrap();
        }
        let b = ball(&mut world, DVec2::new(0.5, 3.0));
        let released = world.release_all();
        assert_eq!(
            released,
            ReleaseStats {
                bodies: 2,
                fixtures: 1001
            }
        );
        let stats = world.stats();
        assert_eq!(stats.bulk_releases, 1);
        assert_eq!(stats.proxy_removals, 0);
        assert_eq!(world.fixture_count(), 0);
        assert!(world.body(b).is_none());

        // Handles issued after a release never alias released ones.
        let fresh = world.create_body(&BodyDef::default());
        assert_ne!(fresh, b);
        world.step(0.01, 10, 10);
    }

    #[test]
    fn distant_static_edges_never_pair() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let wall = world.create_body(&BodyDef::new(BodyKind::Static));
        for i in 0..5_000 {
            let x = i as f64;
            world
                .create_fixture(
                    wall,
                    FixtureDef::new(Shape::edge(DVec2::new(x, 100.0), DVec2::new(x + 1.0, 100.0))),
                )
                .unwrap();
        }
        let balls: Vec<_> = (0..10)
            .map(|i| ball(&mut world, DVec2::new(i as f64 * 2.0, 0.0)))
            .collect();
        for b in &balls {
            world.set_linear_velocity(*b, DVec2::new(0.0, 1.0)).unwrap();
        }
        for _ in 0..50 {
            world.step(0.005, 10, 10);
        }
        assert_eq!(world.pair_count(), 0);
        assert_eq!(world.contact_count(), 0);
    }

    #[test]
    fn invalid_fixture_is_rejected() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let b = world.create_body(&BodyDef::default());
        assert!(matches!(
            world.create_fixture(b, FixtureDef::new(Shape::circle(DVec2::ZERO, -1.0))),
            Err(PhysicsError::InvalidShape(_))
        ));
        assert!(matches!(
            world.create_fixture(
                BodyHandle(42),
                FixtureDef::new(Shape::circle(DVec2::ZERO, 1.0))
            ),
            Err(PhysicsError::UnknownBody(_))
        ));
        assert_eq!(world.fixture_count(), 0);
    }

    #[test]
    fn fixture_view_reads_collider_material() {
        let mut world = PhysicsWorld::new(DVec2::ZERO);
        let b = world.create_body(&BodyDef::default());
        let mut def = FixtureDef::new(Shape::circle(DVec2::ZERO, 0.5));
        def.friction = 0.4;
        def.restitution = 0.25;
        def.is_sensor = true;
        let f = world.create_fixture(b, def).unwrap();
        let fixture = world.fixture(f).unwrap();
        assert_eq!(fixture.body(), b);
        assert_eq!(fixture.friction(), 0.4);
        assert_eq!(fixture.restitution(), 0.25);
        assert!(fixture.is_sensor());
        assert_eq!(world.body(b).unwrap().fixtures(), [f]);
    }
}
