//! Rein collision detection
//!
//! Broadphase and narrowphase collision detection for rigid bodies, split
//! out of the rein engine's physics layer.
//!
//! # Architecture
//!
//! 1. **physics::broadphase** - Hashed uniform grid over non-owning handles
//! 2. **physics::narrowphase** - Oriented box separating-axis tests
//! 3. **physics::gauss_map** - Feature classification for convex polyhedra
//! 4. **ecs** - hecs components and the `CollisionWorld` pipeline (feature = "ecs")

pub mod physics;

#[cfg(feature = "ecs")]
pub mod ecs;

// Re-export commonly used types
pub use physics::{
    overlap_obb_obb, overlap_obb_obb_with_corners, Aabb, Collidable, CollisionConfig,
    CollisionError, ContactManifold, Feature, FeatureMatch, GaussMap, Obb, ObjectSource,
    OverlapAlgorithm, OverlapStats, System,
};

#[cfg(feature = "ecs")]
pub use physics::CollisionWorld;

#[cfg(feature = "ecs")]
pub use ecs::components::{Collider, ColliderShape, ConvexHull, GlobalTransform, Transform};

// Re-export math library
pub use glam;

#[cfg(feature = "ecs")]
pub use hecs;
