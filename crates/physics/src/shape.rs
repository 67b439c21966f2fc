use glam::DVec2;
use rapier2d::prelude::{ColliderBuilder, point, vector};

use crate::PhysicsError;

/// Largest number of vertices a polygon fixture may have.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Collision geometry in body-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle { center: DVec2, radius: f64 },
    /// Convex polygon. Stored counter-clockwise once attached to a body.
    Polygon { points: Vec<DVec2> },
    /// Two-sided line segment, used for static layer geometry.
    Edge { a: DVec2, b: DVec2 },
}

impl Shape {
    pub fn circle(center: DVec2, radius: f64) -> Self {
        Self::Circle { center, radius }
    }

    pub fn polygon(points: Vec<DVec2>) -> Self {
        Self::Polygon { points }
    }

    pub fn edge(a: DVec2, b: DVec2) -> Self {
        Self::Edge { a, b }
    }

    /// Check the geometry and put polygons into counter-clockwise order.
    pub(crate) fn validated(self) -> Result<Self, PhysicsError> {
        match self {
            Shape::Circle { center, radius } => {
                if radius <= 0.0 || !radius.is_finite() {
                    return Err(PhysicsError::InvalidShape(format!(
                        "circle radius must be positive, got {radius}"
                    )));
                }
                Ok(Shape::Circle { center, radius })
            }
            Shape::Polygon { mut points } => {
                if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
                    return Err(PhysicsError::InvalidShape(format!(
                        "polygon needs 3 to {MAX_POLYGON_VERTICES} points, got {}",
                        points.len()
                    )));
                }
                let area = signed_area(&points);
                if area.abs() <= f64::EPSILON {
                    return Err(PhysicsError::InvalidShape(
                        "polygon has zero area".into(),
                    ));
                }
                if area < 0.0 {
                    points.reverse();
                }
                if !is_convex_ccw(&points) {
                    return Err(PhysicsError::InvalidShape("polygon is not convex".into()));
                }
                Ok(Shape::Polygon { points })
            }
            Shape::Edge { a, b } => {
                if a.distance_squared(b) <= f64::EPSILON {
                    return Err(PhysicsError::InvalidShape(
                        "edge endpoints coincide".into(),
                    ));
                }
                Ok(Shape::Edge { a, b })
            }
        }
    }

    /// Rapier collider for this geometry, placed relative to its parent body.
    pub(crate) fn collider_builder(&self) -> Result<ColliderBuilder, PhysicsError> {
        match self {
            Shape::Circle { center, radius } => {
                Ok(ColliderBuilder::ball(*radius).translation(vector![center.x, center.y]))
            }
            Shape::Polygon { points } => {
                ColliderBuilder::convex_polyline(points.iter().map(|p| point![p.x, p.y]).collect())
                    .ok_or_else(|| PhysicsError::InvalidShape("polygon has no convex hull".into()))
            }
            Shape::Edge { a, b } => Ok(ColliderBuilder::segment(point![a.x, a.y], point![b.x, b.y])),
        }
    }
}

fn signed_area(points: &[DVec2]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].perp_dot(points[(i + 1) % n]))
        .sum::<f64>()
        * 0.5
}

fn is_convex_ccw(points: &[DVec2]) -> bool {
    let n = points.len();
    (0..n).all(|i| {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        (b - a).perp_dot(c - b) >= 0.0
    })
}
