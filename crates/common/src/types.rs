use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Index of a layer within its world, in description order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub usize);

/// Index of a model within its world, in description order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(pub usize);

/// Back-reference from a physics body to the world object that created it.
///
/// The physics engine stores this as opaque user data and hands it back in
/// contact callbacks. It is cleared before the owning object goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyOwner {
    Layer(LayerId),
    Model(ModelId),
}

/// Planar pose: translation plus heading in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        x: 0.0,
        y: 0.0,
        theta: 0.0,
    };

    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn position(&self) -> DVec2 {
        DVec2::new(self.x, self.y)
    }

    /// Express `local` (given in this pose's frame) in the parent frame.
    pub fn compose(&self, local: Pose) -> Pose {
        let p = self.transform_point(local.position());
        Pose {
            x: p.x,
            y: p.y,
            theta: self.theta + local.theta,
        }
    }

    /// Map a point from this pose's frame into the parent frame.
    pub fn transform_point(&self, point: DVec2) -> DVec2 {
        DVec2::from_angle(self.theta).rotate(point) + self.position()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f64; 3]> for Pose {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// RGBA color in the 0..=1 range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}
