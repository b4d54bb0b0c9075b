//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Squared distance from a point to the box, zero if the point is inside
    pub fn distance_sq(&self, p: Vec3) -> f32 {
        let clamped = p.clamp(self.min, self.max);
        p.distance_squared(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_sq() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);

        // inside and on the surface
        assert_eq!(aabb.distance_sq(Vec3::splat(0.5)), 0.0);
        assert_eq!(aabb.distance_sq(Vec3::ONE), 0.0);

        // outside along one axis
        assert_eq!(aabb.distance_sq(Vec3::new(2.0, 0.5, 0.5)), 1.0);

        // outside along a corner
        assert_eq!(aabb.distance_sq(Vec3::splat(2.0)), 3.0);
    }
}
