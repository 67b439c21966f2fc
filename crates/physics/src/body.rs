use glam::DVec2;
use planeworld_common::{BodyOwner, Pose};
use rapier2d::prelude::{Collider, ColliderHandle, RigidBody, RigidBodyHandle, RigidBodyType};

use crate::contact::Filter;
use crate::shape::Shape;

/// Handle to a body owned by a [`crate::PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

/// Handle to a fixture owned by a [`crate::PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyKind {
    /// Never moves; infinite mass.
    Static,
    /// Moves with its set velocity; unaffected by forces and contacts.
    Kinematic,
    #[default]
    Dynamic,
}

impl BodyKind {
    pub(crate) fn rigid_body_type(self) -> RigidBodyType {
        match self {
            BodyKind::Static => RigidBodyType::Fixed,
            BodyKind::Kinematic => RigidBodyType::KinematicVelocityBased,
            BodyKind::Dynamic => RigidBodyType::Dynamic,
        }
    }
}

/// Parameters for [`crate::PhysicsWorld::create_body`].
#[derive(Debug, Clone, Default)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: DVec2,
    pub angle: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
    pub owner: Option<BodyOwner>,
}

impl BodyDef {
    pub fn new(kind: BodyKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.position = pose.position();
        self.angle = pose.theta;
        self
    }

    pub fn with_owner(mut self, owner: BodyOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }
}

/// Engine-side bookkeeping for one body.
#[derive(Debug, Clone)]
pub(crate) struct BodyRecord {
    pub rigid_body: RigidBodyHandle,
    pub kind: BodyKind,
    pub owner: Option<BodyOwner>,
    pub fixtures: Vec<FixtureHandle>,
}

/// Read-only view of a rigid body. Obtained from [`crate::PhysicsWorld::body`].
#[derive(Debug, Clone, Copy)]
pub struct Body<'a> {
    pub(crate) record: &'a BodyRecord,
    pub(crate) rigid_body: &'a RigidBody,
}

impl<'a> Body<'a> {
    pub fn kind(&self) -> BodyKind {
        self.record.kind
    }

    pub fn position(&self) -> DVec2 {
        let t = self.rigid_body.translation();
        DVec2::new(t.x, t.y)
    }

    pub fn angle(&self) -> f64 {
        self.rigid_body.rotation().angle()
    }

    pub fn pose(&self) -> Pose {
        let p = self.position();
        Pose::new(p.x, p.y, self.angle())
    }

    pub fn linear_velocity(&self) -> DVec2 {
        let v = self.rigid_body.linvel();
        DVec2::new(v.x, v.y)
    }

    pub fn angular_velocity(&self) -> f64 {
        self.rigid_body.angvel()
    }

    /// The world object this body belongs to, if still linked.
    pub fn owner(&self) -> Option<BodyOwner> {
        self.record.owner
    }

    pub fn fixtures(&self) -> &'a [FixtureHandle] {
        &self.record.fixtures
    }

    pub fn mass(&self) -> f64 {
        self.rigid_body.mass()
    }
}

/// Parameters for [`crate::PhysicsWorld::create_fixture`].
#[derive(Debug, Clone)]
pub struct FixtureDef {
    pub shape: Shape,
    pub filter: Filter,
    pub density: f64,
    pub friction: f64,
    pub restitution: f64,
    pub is_sensor: bool,
}

impl FixtureDef {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            filter: Filter::default(),
            density: 1.0,
            friction: 0.0,
            restitution: 0.0,
            is_sensor: false,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FixtureRecord {
    pub collider: ColliderHandle,
    pub body: BodyHandle,
    pub shape: Shape,
    pub filter: Filter,
    pub is_sensor: bool,
}

/// Read-only view of a shape attached to a body.
#[derive(Debug, Clone, Copy)]
pub struct Fixture<'a> {
    pub(crate) record: &'a FixtureRecord,
    pub(crate) collider: &'a Collider,
}

impl<'a> Fixture<'a> {
    pub fn body(&self) -> BodyHandle {
        self.record.body
    }

    pub fn shape(&self) -> &'a Shape {
        &self.record.shape
    }

    pub fn filter(&self) -> Filter {
        self.record.filter
    }

    pub fn friction(&self) -> f64 {
        self.collider.friction()
    }

    pub fn restitution(&self) -> f64 {
        self.collider.restitution()
    }

    pub fn is_sensor(&self) -> bool {
        self.record.is_sensor
    }
}
