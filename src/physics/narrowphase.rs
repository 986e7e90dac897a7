//! Narrowphase overlap tests for oriented bounding boxes (separating axes).
//!
//! Both forms test the same 15 candidate axes: the three face normals of
//! each box and the nine normalized cross products of their edge
//! directions. Near-parallel edge pairs give a degenerate cross product;
//! those fall back to the face normal of the first box, which is already
//! among the tested axes.
//!
//! Boxes that merely touch are reported as separated.

use glam::{Mat3, Mat4, Vec3};

use super::collider::{Aabb, Collidable};

/// Cross products shorter than this are treated as degenerate axes.
pub const AXIS_EPSILON: f32 = 1e-6;

/// Oriented bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: Vec3,
    /// Orthonormal basis; column `i` is the box's local axis `i`.
    pub orientation: Mat3,
    pub half_extents: Vec3,
}

impl Obb {
    pub fn new(center: Vec3, orientation: Mat3, half_extents: Vec3) -> Self {
        debug_assert!(center.is_finite() && half_extents.is_finite());
        debug_assert!(
            half_extents.min_element() >= 0.0,
            "half extents must be non-negative"
        );
        Self {
            center,
            orientation,
            half_extents,
        }
    }

    /// Axis-aligned box.
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center, Mat3::IDENTITY, half_extents)
    }

    /// Box with local `half_extents` placed by a rigid transform. Scale in
    /// `transform` is folded into the half-extents.
    pub fn from_transform(transform: Mat4, half_extents: Vec3) -> Self {
        let (scale, rotation, translation) = transform.to_scale_rotation_translation();
        Self::new(
            translation,
            Mat3::from_quat(rotation),
            half_extents * scale.abs(),
        )
    }

    /// Local axis `i` in world space.
    #[inline]
    pub fn axis(&self, i: usize) -> Vec3 {
        self.orientation.col(i)
    }

    #[inline]
    fn axes(&self) -> [Vec3; 3] {
        [self.axis(0), self.axis(1), self.axis(2)]
    }

    /// World-space corners.
    pub fn corners(&self) -> [Vec3; 8] {
        let [ax, ay, az] = self.axes();
        let (hx, hy, hz) = (
            ax * self.half_extents.x,
            ay * self.half_extents.y,
            az * self.half_extents.z,
        );
        const SIGNS: [(f32, f32, f32); 8] = [
            (-1.0, -1.0, -1.0),
            (1.0, -1.0, -1.0),
            (1.0, 1.0, -1.0),
            (-1.0, 1.0, -1.0),
            (-1.0, -1.0, 1.0),
            (1.0, -1.0, 1.0),
            (1.0, 1.0, 1.0),
            (-1.0, 1.0, 1.0),
        ];
        SIGNS.map(|(sx, sy, sz)| self.center + hx * sx + hy * sy + hz * sz)
    }

    /// Half-length of the box's projection onto `axis`.
    #[inline]
    fn projected_radius(&self, axis: Vec3) -> f32 {
        let [ax, ay, az] = self.axes();
        (self.half_extents.x * ax.dot(axis)).abs()
            + (self.half_extents.y * ay.dot(axis)).abs()
            + (self.half_extents.z * az.dot(axis)).abs()
    }

    pub fn aabb(&self) -> Aabb {
        let [ax, ay, az] = self.axes();
        let extent = ax.abs() * self.half_extents.x
            + ay.abs() * self.half_extents.y
            + az.abs() * self.half_extents.z;
        Aabb::new(self.center - extent, self.center + extent)
    }
}

impl Collidable for Obb {
    fn get_box(&self) -> Aabb {
        self.aabb()
    }
}

/// The 15 candidate separating axes of two boxes.
fn candidate_axes(a: &Obb, b: &Obb) -> [Vec3; 15] {
    let axes_a = a.axes();
    let axes_b = b.axes();
    let mut axes = [Vec3::ZERO; 15];
    axes[..3].copy_from_slice(&axes_a);
    axes[3..6].copy_from_slice(&axes_b);
    for i in 0..3 {
        for j in 0..3 {
            let axis = axes_a[i].cross(axes_b[j]);
            let len = axis.length();
            axes[6 + 3 * i + j] = if len < AXIS_EPSILON {
                axes_a[i]
            } else {
                axis / len
            };
        }
    }
    axes
}

/// Fast separating-axis test on two boxes.
///
/// Projects each box analytically onto the 15 candidate axes and rejects on
/// the first one that separates them. Produces no contact normal.
pub fn overlap_obb_obb(a: &Obb, b: &Obb) -> bool {
    for axis in candidate_axes(a, b) {
        let distance = (a.center.dot(axis) - b.center.dot(axis)).abs();
        if distance >= a.projected_radius(axis) + b.projected_radius(axis) {
            return false;
        }
    }
    true
}

/// Projection interval of `points` onto `axis`.
#[inline]
fn project(points: &[Vec3; 8], axis: Vec3) -> (f32, f32) {
    points.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), p| {
        let d = p.dot(axis);
        (lo.min(d), hi.max(d))
    })
}

/// Separating-axis test on two boxes and their world-space corners.
///
/// Returns `None` when some axis separates the corner sets. Otherwise returns
/// the axis of least penetration as a unit contact normal pointing from `b`
/// toward `a`.
pub fn overlap_obb_obb_with_corners(
    corners_a: &[Vec3; 8],
    a: &Obb,
    corners_b: &[Vec3; 8],
    b: &Obb,
) -> Option<Vec3> {
    let mut best_gap = f32::NEG_INFINITY;
    let mut best_axis = Vec3::ZERO;

    for axis in candidate_axes(a, b) {
        let (min_a, max_a) = project(corners_a, axis);
        let (min_b, max_b) = project(corners_b, axis);
        // Negative while the intervals overlap; its magnitude is the depth.
        let gap = min_a.max(min_b) - max_a.min(max_b);
        if gap >= 0.0 {
            return None;
        }
        if gap > best_gap {
            best_gap = gap;
            best_axis = axis;
        }
    }

    if (a.center - b.center).dot(best_axis) < 0.0 {
        best_axis = -best_axis;
    }
    tracing::trace!(depth = -best_gap, normal = ?best_axis, "obb pair overlaps");
    Some(best_axis)
}
