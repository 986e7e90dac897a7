//! Bounding volumes and the object contract consumed by the broadphase.

use std::collections::HashMap;
use std::hash::Hash;

use glam::{Mat4, Vec3};

/// Axis-aligned bounding box for broadphase collision detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(min.is_finite() && max.is_finite(), "AABB must be finite");
        Self { min, max }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Smallest box containing all `points`. Returns `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let (min, max) = rest
            .iter()
            .fold((*first, *first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some(Self::new(min, max))
    }

    /// Test whether two AABBs overlap. Touching faces count as overlap.
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Per-axis span.
    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Anything the broadphase can collide: it reports its current world-space AABB.
pub trait Collidable {
    fn get_box(&self) -> Aabb;
}

impl Collidable for Aabb {
    fn get_box(&self) -> Aabb {
        *self
    }
}

impl<T: Collidable + ?Sized> Collidable for &T {
    fn get_box(&self) -> Aabb {
        (**self).get_box()
    }
}

impl<T: Collidable + ?Sized> Collidable for Box<T> {
    fn get_box(&self) -> Aabb {
        (**self).get_box()
    }
}

/// Resolves broadphase handles to the objects they stand for.
///
/// The collision system never owns objects; it stores handles and asks the
/// source for a bounding box once per object per query. A handle the source
/// no longer knows about yields `None` and is skipped.
pub trait ObjectSource<K> {
    fn get_box(&self, handle: K) -> Option<Aabb>;
}

impl<T: Collidable> ObjectSource<usize> for [T] {
    fn get_box(&self, handle: usize) -> Option<Aabb> {
        self.get(handle).map(Collidable::get_box)
    }
}

impl<T: Collidable> ObjectSource<usize> for Vec<T> {
    fn get_box(&self, handle: usize) -> Option<Aabb> {
        self.as_slice().get_box(handle)
    }
}

impl<K: Hash + Eq, T: Collidable> ObjectSource<K> for HashMap<K, T> {
    fn get_box(&self, handle: K) -> Option<Aabb> {
        self.get(&handle).map(Collidable::get_box)
    }
}

/// Compute world-space AABB from local half-extents and a transform matrix.
#[inline]
pub(crate) fn aabb_from_extents(half_extents: Vec3, mat: Mat4) -> Aabb {
    let center = mat.transform_point3(Vec3::ZERO);

    // For each world axis, compute the extent by projecting the local box axes
    let abs_col0 = mat.x_axis.truncate().abs();
    let abs_col1 = mat.y_axis.truncate().abs();
    let abs_col2 = mat.z_axis.truncate().abs();

    let extent = abs_col0 * half_extents.x + abs_col1 * half_extents.y + abs_col2 * half_extents.z;

    Aabb {
        min: center - extent,
        max: center + extent,
    }
}

#[cfg(feature = "ecs")]
mod shapes {
    use glam::Vec3;

    use super::{aabb_from_extents, Aabb, ObjectSource};
    use crate::ecs::components::physics::{Collider, ColliderShape};
    use crate::ecs::components::transform::GlobalTransform;

    /// Entities resolve to the world AABB of their collider. Despawned
    /// entities, sensors, and entities without a `GlobalTransform` yield `None`.
    impl ObjectSource<hecs::Entity> for hecs::World {
        fn get_box(&self, entity: hecs::Entity) -> Option<Aabb> {
            let collider = self.get::<&Collider>(entity).ok()?;
            if collider.is_sensor {
                return None;
            }
            let transform = self.get::<&GlobalTransform>(entity).ok()?;
            let matrix = collider.world_matrix(&transform);
            Some(collider.shape.compute_aabb(&GlobalTransform(matrix)))
        }
    }

    impl ColliderShape {
        /// Compute the world-space AABB for this shape.
        pub fn compute_aabb(&self, transform: &GlobalTransform) -> Aabb {
            let mat = transform.0;
            match self {
                ColliderShape::Box { half_extents } => aabb_from_extents(*half_extents, mat),
                ColliderShape::ConvexHull(hull) => {
                    let mut min = Vec3::splat(f32::MAX);
                    let mut max = Vec3::splat(f32::MIN);
                    for p in hull.points() {
                        let wp = mat.transform_point3(*p);
                        min = min.min(wp);
                        max = max.max(wp);
                    }
                    Aabb { min, max }
                }
            }
        }

        /// Local-space half-extents of the box that bounds this shape around
        /// the local origin.
        pub fn local_half_extents(&self) -> Vec3 {
            match self {
                ColliderShape::Box { half_extents } => *half_extents,
                ColliderShape::ConvexHull(hull) => hull
                    .points()
                    .iter()
                    .fold(Vec3::ZERO, |acc, p| acc.max(p.abs())),
            }
        }
    }
}
