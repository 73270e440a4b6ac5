//! Axis-aligned bounding boxes

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that unions correctly with the first point added
    pub fn empty() -> Self {
        Self {
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.expand(p);
        }
        aabb
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn translated(&self, offset: Vec3) -> Aabb {
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Box enclosing this box's eight corners under `matrix`
    pub fn transform(&self, matrix: &Mat4) -> Aabb {
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand(matrix.transform_point3(corner));
        }
        out
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Per-axis distance from `point` to the box; zero on axes where the
    /// point lies within the box's extent
    pub fn axis_distance(&self, point: Vec3) -> Vec3 {
        (self.min - point).max(point - self.max).max(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_encloses_all() {
        let aabb = Aabb::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-1.0, 4.0, 0.0),
            Vec3::ZERO,
        ]);
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 0.5));
    }

    #[test]
    fn axis_distance_is_zero_inside() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(aabb.axis_distance(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(
            aabb.axis_distance(Vec3::new(3.0, 0.0, -2.5)),
            Vec3::new(2.0, 0.0, 1.5)
        );
    }

    #[test]
    fn transform_rotates_corners() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0));
        let rotated = aabb.transform(&Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2));
        // A 90-degree yaw swaps the x and z extents.
        assert!((rotated.max.z - 0.0).abs() < 1e-6);
        assert!((rotated.min.z - -2.0).abs() < 1e-6);
        assert!((rotated.max.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn union_and_translate() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = a.translated(Vec3::new(5.0, 0.0, 0.0));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::ZERO);
        assert_eq!(u.max, Vec3::new(6.0, 1.0, 1.0));
    }
}
