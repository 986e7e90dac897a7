//! ECS components (transform, collision).

pub mod physics;
pub mod transform;

pub use physics::*;
pub use transform::*;
