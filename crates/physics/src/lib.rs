//! Physics engine: authoritative rigid body state for a planeworld simulation.
//!
//! [`PhysicsWorld`] wraps a `rapier2d` pipeline. It owns every body and
//! fixture it creates; collaborators refer to them through [`BodyHandle`] and
//! [`FixtureHandle`] and learn about contacts through the single
//! [`ContactListener`] slot.
//!
//! # Invariants
//! - At most one contact listener is registered at a time.
//! - Listener callbacks run synchronously inside [`PhysicsWorld::step`] and
//!   [`PhysicsWorld::destroy_body`], never anywhere else.
//! - [`PhysicsWorld::release_all`] reclaims everything in one call by dropping
//!   the rapier sets, without removing colliders one by one.

mod body;
mod contact;
mod events;
mod shape;
mod world;

pub use body::{Body, BodyDef, BodyHandle, BodyKind, Fixture, FixtureDef, FixtureHandle};
pub use contact::{Contact, ContactImpulse, ContactListener, Filter, Manifold};
pub use shape::{MAX_POLYGON_VERTICES, Shape};
pub use world::{EngineStats, PhysicsWorld, ReleaseStats};

/// Errors from physics engine operations.
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
}
