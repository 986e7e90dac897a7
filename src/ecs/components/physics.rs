//! Collision components for ECS entities.

use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};

use crate::physics::error::CollisionError;
use crate::physics::gauss_map::GaussMap;

use super::transform::GlobalTransform;

/// Convex polyhedron in local space.
///
/// The topology is validated once on construction; the collision world
/// clones the local map per entity and moves it into world space.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    map: GaussMap,
}

impl ConvexHull {
    /// Hull from points, outward unit face normals and counter-clockwise
    /// face vertex lists.
    pub fn new<F>(points: &[Vec3], normals: &[Vec3], faces: &[F]) -> Result<Self, CollisionError>
    where
        F: AsRef<[usize]>,
    {
        Ok(Self {
            map: GaussMap::create(points, normals, faces)?,
        })
    }

    /// Box-shaped hull centered on the local origin.
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self {
            map: GaussMap::cuboid(Vec3::ZERO, Mat3::IDENTITY, half_extents),
        }
    }

    pub fn points(&self) -> &[Vec3] {
        self.map.points()
    }

    pub fn normals(&self) -> &[Vec3] {
        self.map.normals()
    }

    /// Local-space Gauss map.
    pub fn gauss_map(&self) -> &GaussMap {
        &self.map
    }
}

/// Collider shape.
#[derive(Debug, Clone)]
pub enum ColliderShape {
    Box { half_extents: Vec3 },
    ConvexHull(Arc<ConvexHull>),
}

/// Collision detection component.
#[derive(Debug, Clone)]
pub struct Collider {
    pub shape: ColliderShape,
    /// Offset from the entity's transform origin.
    pub offset: Vec3,
    /// Sensors are never registered with the broadphase.
    pub is_sensor: bool,
}

impl Collider {
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self {
            shape: ColliderShape::Box { half_extents },
            ..Default::default()
        }
    }

    pub fn convex_hull(hull: Arc<ConvexHull>) -> Self {
        Self {
            shape: ColliderShape::ConvexHull(hull),
            ..Default::default()
        }
    }

    /// World matrix of the shape, with the collider offset applied.
    pub fn world_matrix(&self, transform: &GlobalTransform) -> Mat4 {
        if self.offset == Vec3::ZERO {
            transform.0
        } else {
            transform.0 * Mat4::from_translation(self.offset)
        }
    }
}

impl Default for Collider {
    fn default() -> Self {
        Self {
            shape: ColliderShape::Box {
                half_extents: Vec3::splat(0.5),
            },
            offset: Vec3::ZERO,
            is_sensor: false,
        }
    }
}
