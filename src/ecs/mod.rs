//! `hecs` integration: components read by [`crate::physics::CollisionWorld`].

pub mod components;
