//! Shared value types used across the planeworld crates.

mod types;

pub use types::{BodyOwner, Color, LayerId, ModelId, Pose};
