//! Shared setup helpers for rein-collide benchmarks.
//!
//! ## Running
//!
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench collision
//!
//! Filter by group:
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench collision -- broadphase
//!   cargo bench --manifest-path benchmarks/Cargo.toml --bench collision -- gauss_map

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rein_collide::ecs::components::physics::{Collider, ConvexHull};
use rein_collide::ecs::components::transform::{GlobalTransform, Transform};
use rein_collide::physics::{Aabb, System};

// ---------------------------------------------------------------------------
// Bounding box scenes
// ---------------------------------------------------------------------------

/// `n` unit boxes on a square layout so that neighbours overlap.
pub fn uniform_boxes(n: usize) -> Vec<Aabb> {
    layout(n, 1.5)
        .map(|center| Aabb::from_center_half_extents(center, Vec3::splat(1.0)))
        .collect()
}

/// `n` unit boxes far apart; almost no pair overlaps.
pub fn sparse_boxes(n: usize) -> Vec<Aabb> {
    layout(n, 10.0)
        .map(|center| Aabb::from_center_half_extents(center, Vec3::splat(1.0)))
        .collect()
}

/// `n` boxes of varying size scattered in a cube, from a fixed seed.
pub fn scattered_boxes(n: usize, seed: u64) -> Vec<Aabb> {
    let mut rng = StdRng::seed_from_u64(seed);
    let side = (n as f32).cbrt() * 3.0;
    (0..n)
        .map(|_| {
            let center = Vec3::new(
                rng.gen_range(0.0..side),
                rng.gen_range(0.0..side),
                rng.gen_range(0.0..side),
            );
            let half = Vec3::new(
                rng.gen_range(0.25..1.75),
                rng.gen_range(0.25..1.75),
                rng.gen_range(0.25..1.75),
            );
            Aabb::from_center_half_extents(center, half)
        })
        .collect()
}

/// Broadphase with every box of `boxes` connected and the grid sized.
pub fn connected_system(boxes: &[Aabb]) -> System<usize> {
    let mut system = System::default();
    for (i, aabb) in boxes.iter().enumerate() {
        system
            .connect(i, aabb)
            .expect("benchmark handles are unique");
    }
    system.compute_optimal_cell_spacing(boxes);
    system
}

// ---------------------------------------------------------------------------
// ECS scenes
// ---------------------------------------------------------------------------

/// `n` slightly rotated box colliders, neighbours overlapping.
pub fn setup_box_world(n: usize) -> hecs::World {
    let mut world = hecs::World::new();
    for (i, pos) in layout(n, 0.9).enumerate() {
        let transform =
            Transform::from_position_rotation(pos, Quat::from_rotation_y(i as f32 * 0.05));
        world.spawn((
            transform,
            transform.to_global(),
            Collider::cuboid(Vec3::splat(0.5)),
        ));
    }
    world
}

/// `n` convex hull colliders sharing one octahedron.
pub fn setup_hull_world(n: usize) -> hecs::World {
    let mut world = hecs::World::new();
    let hull = Arc::new(octahedron(0.6));
    for pos in layout(n, 0.9) {
        world.spawn((
            Transform::from_position(pos),
            GlobalTransform(Mat4::from_translation(pos)),
            Collider::convex_hull(hull.clone()),
        ));
    }
    world
}

/// Regular octahedron with vertices on the axes at distance `r`.
pub fn octahedron(r: f32) -> ConvexHull {
    let points = [
        Vec3::X * r,
        -Vec3::X * r,
        Vec3::Y * r,
        -Vec3::Y * r,
        Vec3::Z * r,
        -Vec3::Z * r,
    ];
    let faces: [[usize; 3]; 8] = [
        [0, 2, 4],
        [2, 1, 4],
        [1, 3, 4],
        [3, 0, 4],
        [2, 0, 5],
        [1, 2, 5],
        [3, 1, 5],
        [0, 3, 5],
    ];
    let normals: Vec<Vec3> = faces
        .iter()
        .map(|[a, b, c]| {
            (points[*b] - points[*a])
                .cross(points[*c] - points[*a])
                .normalize()
        })
        .collect();
    ConvexHull::new(&points, &normals, &faces).expect("octahedron is a closed polyhedron")
}

/// Unit directions spread over the sphere (Fibonacci lattice).
pub fn sphere_directions(n: usize) -> Vec<Vec3> {
    let golden = std::f32::consts::PI * (3.0 - 5f32.sqrt());
    (0..n)
        .map(|i| {
            let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
            let r = (1.0 - y * y).sqrt();
            let theta = golden * i as f32;
            Vec3::new(r * theta.cos(), y, r * theta.sin())
        })
        .collect()
}

fn layout(n: usize, spacing: f32) -> impl Iterator<Item = Vec3> {
    let cols = (n as f32).sqrt().ceil().max(1.0) as usize;
    (0..n).map(move |i| {
        Vec3::new(
            (i % cols) as f32 * spacing,
            0.0,
            (i / cols) as f32 * spacing,
        )
    })
}
