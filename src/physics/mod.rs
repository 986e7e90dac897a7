//! Collision detection for rigid bodies.
//!
//! # Architecture
//!
//! Detection runs in two stages:
//!
//! 1. Broadphase: [`broadphase::System`] narrows the scene to candidate pairs
//!    whose AABBs overlap, using a hashed uniform grid.
//! 2. Narrowphase: candidate boxes go through the separating-axis test in
//!    [`narrowphase`]; convex hulls are classified with their
//!    [`gauss_map::GaussMap`] to pick stable contact features.
//!
//! Contact resolution, integration and friction belong to the caller.

pub mod broadphase;
pub mod collider;
pub mod contact;
pub mod error;
pub mod gauss_map;
pub mod narrowphase;

#[cfg(feature = "ecs")]
mod world;

pub use self::broadphase::{OverlapAlgorithm, OverlapStats, System};
pub use self::collider::{Aabb, Collidable, ObjectSource};
pub use self::contact::ContactManifold;
pub use self::error::CollisionError;
pub use self::gauss_map::{Feature, FeatureMatch, GaussMap};
pub use self::narrowphase::{overlap_obb_obb, overlap_obb_obb_with_corners, Obb};
#[cfg(feature = "ecs")]
pub use self::world::CollisionWorld;

/// Configuration for collision detection.
#[derive(Debug, Clone)]
pub struct CollisionConfig {
    /// Broadphase algorithm. Default: grid.
    pub algorithm: OverlapAlgorithm,
    /// Grid spacing used before any object has been measured. Default: 1.0.
    pub initial_cell_spacing: f32,
    /// Upper bound on grid cells chosen by automatic sizing. Default: 2^21.
    pub max_grid_cells: usize,
    /// Gauss-map angular tolerance in degrees. Default: 4.
    pub feature_tolerance_degrees: f32,
    /// Recompute the grid spacing every N detections; 0 only sizes the grid
    /// once. Default: 60.
    pub refit_interval: u32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            algorithm: OverlapAlgorithm::Grid,
            initial_cell_spacing: 1.0,
            max_grid_cells: 1 << 21,
            feature_tolerance_degrees: gauss_map::DEFAULT_TOLERANCE_DEGREES,
            refit_interval: 60,
        }
    }
}
