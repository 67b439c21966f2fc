//! Planeworld kernel: builds a world from its YAML description, steps it, and
//! tears it down.
//!
//! # Invariants
//! - Layers load before models; layer order fixes collision category bits.
//! - Exactly one contact listener is registered with the engine while a
//!   world is alive; plugins receive contact callbacks through it.
//! - Every world update performs exactly one fixed physics step.
//! - Teardown deregisters the listener before any layer or model is dropped
//!   and releases engine bodies in a single bulk call.
//! - A failed build tears down whatever was built; no partial world escapes.

pub mod collision_filter;
pub mod description;
pub mod error;
pub mod layer;
pub mod model;
pub mod plugin;
pub mod simulation;
pub mod timekeeper;
pub mod world;

pub use collision_filter::{CollisionFilterRegistry, MAX_LAYERS};
pub use error::{DescriptionError, PluginError, WorldError};
pub use layer::Layer;
pub use model::{Model, ModelBody};
pub use plugin::{
    BodyAccess, ContactRelay, ModelPlugin, PluginContext, PluginManager, PluginRegistry,
    StepContext,
};
pub use simulation::{RunStats, Simulation, SimulationConfig};
pub use timekeeper::Timekeeper;
pub use world::{
    POSITION_ITERATIONS, TeardownReport, TeardownStep, VELOCITY_ITERATIONS, World, WorldSummary,
};
