//! Error type for collision-detection contract violations.

use thiserror::Error;

/// Errors reported by the broadphase and the Gauss map.
///
/// These cover cheap-to-detect caller mistakes. Numeric preconditions
/// (finite coordinates, unit-length directions) are debug assertions only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollisionError {
    /// The handle is already registered with the broadphase.
    #[error("object is already connected to the broadphase")]
    AlreadyConnected,
    /// The handle is not registered with the broadphase.
    #[error("object is not connected to the broadphase")]
    NotConnected,
    /// A polyhedron needs at least four points.
    #[error("polyhedron needs at least 4 points, got {0}")]
    TooFewPoints(usize),
    /// A polyhedron needs at least three faces.
    #[error("polyhedron needs at least 3 faces, got {0}")]
    TooFewFaces(usize),
    /// Every face needs exactly one normal.
    #[error("expected {expected} face normals, got {got}")]
    NormalCountMismatch { expected: usize, got: usize },
    /// A face with fewer than three vertices.
    #[error("face {face} has {len} vertices")]
    DegenerateFace { face: usize, len: usize },
    /// A face refers to a point that does not exist.
    #[error("face {face} references vertex {index} but only {count} points exist")]
    VertexOutOfRange {
        face: usize,
        index: usize,
        count: usize,
    },
    /// An edge used by only one face: the polyhedron is not closed.
    #[error("edge {tail}-{head} borders only one face")]
    OpenEdge { tail: usize, head: usize },
    /// A geometry update changed the number of points or faces.
    #[error("geometry update would change topology ({what}: expected {expected}, got {got})")]
    TopologyChanged {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// Angular tolerances must be finite and non-negative.
    #[error("tolerance angle must be finite and non-negative, got {0}")]
    InvalidTolerance(f32),
}
