//! Gauss map of a convex polyhedron.
//!
//! The unit sphere of directions is partitioned into normal cones: a point
//! for every face (its normal), an arc for every edge (between the normals
//! of its two faces), and a spherical polygon for every vertex. Classifying
//! a direction tells which feature of the polyhedron is extremal along it,
//! which is what a contact generator needs to pick a stable contact normal.
//!
//! Exact cone membership is unstable for faces and edges (they have zero
//! area on the sphere), so faces and edges match within an angular
//! tolerance. Faces are tried first, then edges, then vertices.
//!
//! Topology is built once by [`GaussMap::create`]; [`GaussMap::update`]
//! swaps in new coordinates and normals when the shape moves without
//! changing its connectivity.

use glam::{Mat3, Vec3};

use super::error::CollisionError;

/// Default angular tolerance for face and edge matches.
pub const DEFAULT_TOLERANCE_DEGREES: f32 = 4.0;

/// Projections and cross products shorter than this are degenerate.
const DEGENERATE_EPSILON: f32 = 1e-6;

const NO_FACE: usize = usize::MAX;

/// Polygonal face; vertex indices are counter-clockwise seen from outside.
#[derive(Debug, Clone)]
pub struct Face {
    pub vertices: Vec<usize>,
}

/// Edge between two vertices.
///
/// Walking from `tail` to `head`, face `left` lists the edge in that
/// direction and face `right` lists it reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub tail: usize,
    pub head: usize,
    pub left: usize,
    pub right: usize,
}

/// Edges incident to a vertex.
#[derive(Debug, Clone, Default)]
pub struct Vertex {
    pub edges: Vec<usize>,
}

/// Feature of a polyhedron, by index into its faces, edges or vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Face(usize),
    Edge(usize),
    Vertex(usize),
}

/// Result of [`GaussMap::search_for_feature`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    pub feature: Feature,
    /// Face normal for face matches, the query direction otherwise.
    pub normal: Vec3,
}

/// Normal-cone partition of a convex polyhedron.
#[derive(Debug, Clone)]
pub struct GaussMap {
    points: Vec<Vec3>,
    normals: Vec<Vec3>,
    faces: Vec<Face>,
    edges: Vec<Edge>,
    vertices: Vec<Vertex>,
    /// Cosine of the allowed angular error.
    tolerance: f32,
}

impl GaussMap {
    /// Build the map of a closed convex polyhedron.
    ///
    /// `normals[f]` is the outward unit normal of face `f`, and `faces[f]`
    /// lists its vertex indices counter-clockwise seen from outside. Counts,
    /// index ranges and closedness are checked; convexity is not.
    pub fn create<F>(points: &[Vec3], normals: &[Vec3], faces: &[F]) -> Result<Self, CollisionError>
    where
        F: AsRef<[usize]>,
    {
        if points.len() < 4 {
            return Err(CollisionError::TooFewPoints(points.len()));
        }
        if faces.len() < 3 {
            return Err(CollisionError::TooFewFaces(faces.len()));
        }
        if normals.len() != faces.len() {
            return Err(CollisionError::NormalCountMismatch {
                expected: faces.len(),
                got: normals.len(),
            });
        }
        debug_assert!(
            normals.iter().all(|n| (n.length_squared() - 1.0).abs() < 1e-3),
            "face normals must be unit length"
        );

        for (f, face) in faces.iter().enumerate() {
            let face = face.as_ref();
            if face.len() < 3 {
                return Err(CollisionError::DegenerateFace {
                    face: f,
                    len: face.len(),
                });
            }
            if let Some(&index) = face.iter().find(|&&i| i >= points.len()) {
                return Err(CollisionError::VertexOutOfRange {
                    face: f,
                    index,
                    count: points.len(),
                });
            }
        }

        let map = Self::build(points, normals, faces);
        if let Some(edge) = map.edges.iter().find(|e| e.right == NO_FACE) {
            return Err(CollisionError::OpenEdge {
                tail: edge.tail,
                head: edge.head,
            });
        }
        Ok(map)
    }

    /// Map of a box with the given placement.
    pub fn cuboid(center: Vec3, orientation: Mat3, half_extents: Vec3) -> Self {
        let (points, normals) = cuboid_geometry(center, orientation, half_extents);
        Self::build(&points, &normals, &CUBOID_FACES)
    }

    /// Derive edges and vertex adjacency. Every face must have at least three
    /// in-range vertex indices; edges seen only once keep `right == NO_FACE`.
    fn build<F>(points: &[Vec3], normals: &[Vec3], faces: &[F]) -> Self
    where
        F: AsRef<[usize]>,
    {
        let mut vertices = vec![Vertex::default(); points.len()];
        let mut edges: Vec<Edge> = Vec::new();
        // Edge lookup keyed on the lower endpoint: (higher endpoint, edge).
        let mut lookup: Vec<Vec<(usize, usize)>> = vec![Vec::new(); points.len()];
        let mut built = Vec::with_capacity(faces.len());

        for (f, face) in faces.iter().enumerate() {
            let face = face.as_ref();
            for (k, &tail) in face.iter().enumerate() {
                let head = face[(k + 1) % face.len()];
                let (lo, hi) = (tail.min(head), tail.max(head));
                match lookup[lo].iter().find(|(other, _)| *other == hi) {
                    Some(&(_, e)) => edges[e].right = f,
                    None => {
                        let e = edges.len();
                        edges.push(Edge {
                            tail,
                            head,
                            left: f,
                            right: NO_FACE,
                        });
                        lookup[lo].push((hi, e));
                        vertices[tail].edges.push(e);
                        vertices[head].edges.push(e);
                    }
                }
            }
            built.push(Face {
                vertices: face.to_vec(),
            });
        }

        Self {
            points: points.to_vec(),
            normals: normals.to_vec(),
            faces: built,
            edges,
            vertices,
            tolerance: DEFAULT_TOLERANCE_DEGREES.to_radians().cos(),
        }
    }

    /// Replace coordinates and normals, keeping the topology.
    pub fn update(&mut self, points: &[Vec3], normals: &[Vec3]) -> Result<(), CollisionError> {
        if points.len() != self.points.len() {
            return Err(CollisionError::TopologyChanged {
                what: "points",
                expected: self.points.len(),
                got: points.len(),
            });
        }
        if normals.len() != self.normals.len() {
            return Err(CollisionError::TopologyChanged {
                what: "normals",
                expected: self.normals.len(),
                got: normals.len(),
            });
        }
        self.points.copy_from_slice(points);
        self.normals.copy_from_slice(normals);
        Ok(())
    }

    pub fn set_tolerance_in_radians(&mut self, angle: f32) -> Result<(), CollisionError> {
        if !angle.is_finite() || angle < 0.0 {
            return Err(CollisionError::InvalidTolerance(angle));
        }
        self.tolerance = angle.min(std::f32::consts::PI).cos();
        Ok(())
    }

    pub fn set_tolerance_in_degrees(&mut self, angle: f32) -> Result<(), CollisionError> {
        if !angle.is_finite() || angle < 0.0 {
            return Err(CollisionError::InvalidTolerance(angle));
        }
        self.set_tolerance_in_radians(angle.to_radians())
    }

    /// Cosine of the allowed angular error.
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Classify the unit `direction` into the feature whose normal cone
    /// contains it.
    ///
    /// On a match, `out_points` is refilled with the feature's points (all
    /// face vertices, both edge endpoints, or the single vertex).
    pub fn search_for_feature(
        &self,
        direction: Vec3,
        out_points: &mut Vec<Vec3>,
    ) -> Option<FeatureMatch> {
        debug_assert!(
            (direction.length_squared() - 1.0).abs() < 1e-3,
            "search direction must be unit length"
        );
        out_points.clear();

        let feature = self
            .find_face(direction)
            .or_else(|| self.find_edge(direction))
            .or_else(|| self.find_vertex(direction))?;

        let normal = match feature {
            Feature::Face(f) => {
                out_points.extend(self.faces[f].vertices.iter().map(|&v| self.points[v]));
                self.normals[f]
            }
            Feature::Edge(e) => {
                let edge = &self.edges[e];
                out_points.push(self.points[edge.tail]);
                out_points.push(self.points[edge.head]);
                direction
            }
            Feature::Vertex(v) => {
                out_points.push(self.points[v]);
                direction
            }
        };
        Some(FeatureMatch { feature, normal })
    }

    /// Best-aligned face within tolerance.
    fn find_face(&self, direction: Vec3) -> Option<Feature> {
        let (face, alignment) = self
            .normals
            .iter()
            .map(|n| n.dot(direction).clamp(-1.0, 1.0))
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        (alignment >= self.tolerance).then_some(Feature::Face(face))
    }

    /// Best-aligned edge whose arc, within tolerance, contains `direction`.
    fn find_edge(&self, direction: Vec3) -> Option<Feature> {
        let mut best: Option<(usize, f32)> = None;
        for (e, edge) in self.edges.iter().enumerate() {
            let Some(alignment) = self.edge_alignment(edge, direction) else {
                continue;
            };
            if best.map_or(true, |(_, a)| alignment > a) {
                best = Some((e, alignment));
            }
        }
        best.map(|(e, _)| Feature::Edge(e))
    }

    fn edge_alignment(&self, edge: &Edge, direction: Vec3) -> Option<f32> {
        let d = self.points[edge.head] - self.points[edge.tail];
        let d_len_sq = d.length_squared();
        if d_len_sq < DEGENERATE_EPSILON * DEGENERATE_EPSILON {
            return None;
        }

        let projected = direction - d * (direction.dot(d) / d_len_sq);
        let len = projected.length();
        if len < DEGENERATE_EPSILON {
            // Direction runs along the edge.
            return None;
        }
        let projected = projected / len;
        let alignment = projected.dot(direction).clamp(-1.0, 1.0);
        if alignment < self.tolerance {
            return None;
        }

        let left = self.normals[edge.left];
        let right = self.normals[edge.right];
        // Angles measured about `d`: `from_left` >= 0 when the projection is
        // counter-clockwise of the left normal, `to_right` >= 0 when the
        // right normal is counter-clockwise of the projection.
        let from_left = d.dot(left.cross(projected));
        let to_right = d.dot(projected.cross(right));
        let inside = if d.dot(left.cross(right)) >= 0.0 {
            from_left >= 0.0 && to_right >= 0.0
        } else {
            // Reflex about `d`: the cone is the arc the other way round, so
            // swapping `left` and `right` classifies the same directions.
            from_left <= 0.0 && to_right <= 0.0
        };
        // Rejects the antipodal arc when the two faces are (nearly) coplanar.
        (inside && projected.dot(left + right) > 0.0).then_some(alignment)
    }

    fn find_vertex(&self, direction: Vec3) -> Option<Feature> {
        (0..self.vertices.len())
            .find(|&v| self.vertex_contains(v, direction))
            .map(Feature::Vertex)
    }

    /// Whether `direction` lies in the cone of vertex `v`: on the inner side
    /// of the great circle of every incident edge.
    fn vertex_contains(&self, v: usize, direction: Vec3) -> bool {
        self.vertices[v].edges.iter().all(|&e| {
            let edge = &self.edges[e];
            // Orient the edge to start at `v`; reversing swaps its faces.
            let (d, left, right) = if edge.tail == v {
                (
                    self.points[edge.head] - self.points[v],
                    self.normals[edge.left],
                    self.normals[edge.right],
                )
            } else {
                (
                    self.points[edge.tail] - self.points[v],
                    self.normals[edge.right],
                    self.normals[edge.left],
                )
            };

            let axis = left.cross(right);
            if axis.length_squared() < DEGENERATE_EPSILON * DEGENERATE_EPSILON {
                return direction.dot(d) <= 0.0;
            }
            let side = direction.dot(axis);
            if d.dot(axis) >= 0.0 {
                side <= 0.0
            } else {
                side >= 0.0
            }
        })
    }
}

/// Faces of a box whose corner `i` has coordinate signs taken from the bits
/// of `i` (x = bit 0, y = bit 1, z = bit 2). Order: +x, -x, +y, -y, +z, -z.
pub(crate) const CUBOID_FACES: [[usize; 4]; 6] = [
    [1, 3, 7, 5],
    [0, 4, 6, 2],
    [2, 6, 7, 3],
    [0, 1, 5, 4],
    [4, 5, 7, 6],
    [0, 2, 3, 1],
];

/// Corner points and face normals of a placed box, matching `CUBOID_FACES`.
pub(crate) fn cuboid_geometry(
    center: Vec3,
    orientation: Mat3,
    half_extents: Vec3,
) -> (Vec<Vec3>, Vec<Vec3>) {
    let points = (0..8)
        .map(|i| {
            let sign = Vec3::new(
                if i & 1 != 0 { 1.0 } else { -1.0 },
                if i & 2 != 0 { 1.0 } else { -1.0 },
                if i & 4 != 0 { 1.0 } else { -1.0 },
            );
            center + orientation * (sign * half_extents)
        })
        .collect();
    let [x, y, z] = [orientation.col(0), orientation.col(1), orientation.col(2)];
    let normals = vec![x, -x, y, -y, z, -z];
    (points, normals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn unit_cube() -> GaussMap {
        GaussMap::cuboid(Vec3::ZERO, Mat3::IDENTITY, Vec3::splat(1.0))
    }

    /// Build a map from points and faces, deriving outward normals and
    /// fixing winding. The polyhedron must contain the origin.
    fn polyhedron(points: &[Vec3], faces: &[Vec<usize>]) -> GaussMap {
        let mut oriented = Vec::new();
        let mut normals = Vec::new();
        for face in faces {
            let [a, b, c] = [points[face[0]], points[face[1]], points[face[2]]];
            let mut normal = (b - a).cross(c - a).normalize();
            let mut face = face.clone();
            if normal.dot(a) < 0.0 {
                face.reverse();
                normal = -normal;
            }
            oriented.push(face);
            normals.push(normal);
        }
        GaussMap::create(points, &normals, &oriented).unwrap()
    }

    fn tetrahedron() -> GaussMap {
        polyhedron(
            &[
                Vec3::new(1.0, 1.0, 1.0),
                Vec3::new(1.0, -1.0, -1.0),
                Vec3::new(-1.0, 1.0, -1.0),
                Vec3::new(-1.0, -1.0, 1.0),
            ],
            &[vec![1, 2, 3], vec![0, 3, 2], vec![0, 1, 3], vec![0, 2, 1]],
        )
    }

    /// Triangular prism: exercises faces of different sizes.
    fn prism() -> GaussMap {
        let h = 0.75;
        let tri = [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-0.5, 0.866, 0.0),
            Vec3::new(-0.5, -0.866, 0.0),
        ];
        let mut points: Vec<Vec3> = tri.iter().map(|p| *p + Vec3::Z * h).collect();
        points.extend(tri.iter().map(|p| *p - Vec3::Z * h));
        polyhedron(
            &points,
            &[
                vec![0, 1, 2],
                vec![3, 5, 4],
                vec![0, 3, 4, 1],
                vec![1, 4, 5, 2],
                vec![2, 5, 3, 0],
            ],
        )
    }

    /// Roughly uniform unit directions (Fibonacci sphere).
    fn sphere_samples(n: usize) -> Vec<Vec3> {
        let golden = std::f32::consts::PI * (3.0 - 5.0f32.sqrt());
        (0..n)
            .map(|i| {
                let y = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
                let r = (1.0 - y * y).sqrt();
                let theta = golden * i as f32;
                Vec3::new(r * theta.cos(), y, r * theta.sin())
            })
            .collect()
    }

    fn support(map: &GaussMap, direction: Vec3) -> f32 {
        map.points()
            .iter()
            .map(|p| p.dot(direction))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    #[test]
    fn test_cube_topology() {
        let map = unit_cube();
        assert_eq!(map.points().len(), 8);
        assert_eq!(map.faces().len(), 6);
        assert_eq!(map.edges().len(), 12);
        assert!(map.vertices().iter().all(|v| v.edges.len() == 3));
        for edge in map.edges() {
            assert_ne!(edge.left, edge.right);
            assert!(map.faces()[edge.left].vertices.contains(&edge.tail));
            assert!(map.faces()[edge.right].vertices.contains(&edge.head));
        }
    }

    #[test]
    fn test_cuboid_normals_match_winding() {
        let map = GaussMap::cuboid(
            Vec3::new(1.0, 2.0, 3.0),
            Mat3::from_rotation_y(0.4),
            Vec3::new(0.5, 1.0, 2.0),
        );
        for (face, normal) in map.faces().iter().zip(map.normals()) {
            let v = &face.vertices;
            let [a, b, c] = [map.points()[v[0]], map.points()[v[1]], map.points()[v[2]]];
            let winding = (b - a).cross(c - b).normalize();
            assert!((winding - *normal).length() < 1e-5);
        }
    }

    #[test]
    fn test_face_normal_returns_face() {
        for map in [unit_cube(), tetrahedron(), prism()] {
            let mut points = Vec::new();
            for (f, normal) in map.normals().iter().enumerate() {
                let hit = map.search_for_feature(*normal, &mut points).unwrap();
                assert_eq!(hit.feature, Feature::Face(f));
                assert_eq!(hit.normal, *normal);
                let expected: Vec<Vec3> = map.faces()[f]
                    .vertices
                    .iter()
                    .map(|&v| map.points()[v])
                    .collect();
                assert_eq!(points, expected);
            }
        }
    }

    #[test]
    fn test_cube_edge_direction() {
        let map = unit_cube();
        let mut points = Vec::new();
        let direction = Vec3::new(1.0, 1.0, 0.0).normalize();
        let hit = map.search_for_feature(direction, &mut points).unwrap();
        assert!(matches!(hit.feature, Feature::Edge(_)));
        assert_eq!(hit.normal, direction);
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.x == 1.0 && p.y == 1.0));
    }

    #[test]
    fn test_cube_vertex_direction() {
        let map = unit_cube();
        let mut points = Vec::new();
        let direction = Vec3::new(-1.0, 1.0, -1.0).normalize();
        let hit = map.search_for_feature(direction, &mut points).unwrap();
        assert_eq!(hit.feature, Feature::Vertex(2));
        assert_eq!(points, vec![Vec3::new(-1.0, 1.0, -1.0)]);
    }

    #[test]
    fn test_tolerance_prefers_faces_then_edges() {
        let mut map = unit_cube();
        let mut points = Vec::new();

        // 3° off the +x normal: still the face.
        let near_face = Mat3::from_rotation_z(3f32.to_radians()) * Vec3::X;
        let hit = map.search_for_feature(near_face, &mut points).unwrap();
        assert_eq!(hit.feature, Feature::Face(0));

        // 10° off the +x normal toward +y lies on the arc of the z-edge.
        let on_arc = Mat3::from_rotation_z(10f32.to_radians()) * Vec3::X;
        let hit = map.search_for_feature(on_arc, &mut points).unwrap();
        assert!(matches!(hit.feature, Feature::Edge(_)));
        assert!(points.iter().all(|p| p.x == 1.0 && p.y == 1.0));

        // Lift it 2° off the arc: still that edge within 4°.
        let lifted = Mat3::from_rotation_y(-2f32.to_radians()) * on_arc;
        let hit = map.search_for_feature(lifted.normalize(), &mut points).unwrap();
        assert!(matches!(hit.feature, Feature::Edge(_)));

        // With a 1° tolerance the same direction falls through to a vertex.
        map.set_tolerance_in_degrees(1.0).unwrap();
        let hit = map.search_for_feature(lifted.normalize(), &mut points).unwrap();
        assert!(matches!(hit.feature, Feature::Vertex(_)));
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn test_set_tolerance() {
        let mut map = unit_cube();
        map.set_tolerance_in_radians(0.0).unwrap();
        assert_eq!(map.tolerance(), 1.0);
        map.set_tolerance_in_degrees(60.0).unwrap();
        assert!((map.tolerance() - 0.5).abs() < 1e-6);
        assert_eq!(
            map.set_tolerance_in_degrees(-1.0),
            Err(CollisionError::InvalidTolerance(-1.0))
        );
        assert!(map.set_tolerance_in_radians(f32::NAN).is_err());
        assert!((map.tolerance() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let (points, normals) = cuboid_geometry(Vec3::ZERO, Mat3::IDENTITY, Vec3::ONE);

        assert_eq!(
            GaussMap::create(&points[..3], &normals, &CUBOID_FACES).unwrap_err(),
            CollisionError::TooFewPoints(3)
        );
        assert_eq!(
            GaussMap::create(&points, &normals[..2], &CUBOID_FACES[..2]).unwrap_err(),
            CollisionError::TooFewFaces(2)
        );
        assert_eq!(
            GaussMap::create(&points, &normals[..5], &CUBOID_FACES).unwrap_err(),
            CollisionError::NormalCountMismatch {
                expected: 6,
                got: 5
            }
        );

        let mut faces: Vec<Vec<usize>> = CUBOID_FACES.iter().map(|f| f.to_vec()).collect();
        faces[2][1] = 8;
        assert_eq!(
            GaussMap::create(&points, &normals, &faces).unwrap_err(),
            CollisionError::VertexOutOfRange {
                face: 2,
                index: 8,
                count: 8
            }
        );

        faces[2] = vec![2, 6];
        assert_eq!(
            GaussMap::create(&points, &normals, &faces).unwrap_err(),
            CollisionError::DegenerateFace { face: 2, len: 2 }
        );

        assert!(matches!(
            GaussMap::create(&points, &normals[..5], &CUBOID_FACES[..5]).unwrap_err(),
            CollisionError::OpenEdge { .. }
        ));
    }

    #[test]
    fn test_cuboid_matches_create() {
        let orientation = Mat3::from_rotation_y(0.3);
        let half = Vec3::new(1.0, 2.0, 0.5);
        let (points, normals) = cuboid_geometry(Vec3::X, orientation, half);
        let created = GaussMap::create(&points, &normals, &CUBOID_FACES).unwrap();
        let cuboid = GaussMap::cuboid(Vec3::X, orientation, half);
        assert_eq!(cuboid.edges(), created.edges());
        assert_eq!(cuboid.points(), created.points());
        assert!(cuboid.edges().iter().all(|e| e.right != NO_FACE));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "face normals must be unit length")]
    fn test_create_panics_on_scaled_normals() {
        let (points, normals) = cuboid_geometry(Vec3::ZERO, Mat3::IDENTITY, Vec3::ONE);
        let scaled: Vec<Vec3> = normals.iter().map(|n| *n * 2.0).collect();
        let _ = GaussMap::create(&points, &scaled, &CUBOID_FACES);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "search direction must be unit length")]
    fn test_search_panics_on_non_unit_direction() {
        let mut out = Vec::new();
        unit_cube().search_for_feature(Vec3::new(2.0, 0.0, 0.0), &mut out);
    }

    #[test]
    fn test_edge_alignment_ignores_face_order() {
        let map = unit_cube();
        let directions = sphere_samples(500);
        let mut matched = 0;
        for edge in map.edges() {
            let swapped = Edge {
                left: edge.right,
                right: edge.left,
                ..*edge
            };
            for &d in &directions {
                let alignment = map.edge_alignment(edge, d);
                assert_eq!(alignment, map.edge_alignment(&swapped, d));
                matched += usize::from(alignment.is_some());
            }
        }
        assert!(matched > 0);

        // Edge between +x and +y: the diagonal lies in its arc either way.
        let e = map
            .edges()
            .iter()
            .position(|e| {
                let faces = [e.left.min(e.right), e.left.max(e.right)];
                faces == [0, 2]
            })
            .unwrap();
        let edge = map.edges()[e];
        let reversed = Edge {
            left: edge.right,
            right: edge.left,
            ..edge
        };
        let diagonal = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!(map.edge_alignment(&reversed, diagonal).is_some());
        assert!(map.edge_alignment(&reversed, -diagonal).is_none());
    }

    #[test]
    fn test_update_keeps_topology() {
        let mut map = unit_cube();
        let edges = map.edges().to_vec();
        let (points, normals) = cuboid_geometry(
            Vec3::new(5.0, 0.0, 0.0),
            Mat3::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Vec3::ONE,
        );
        map.update(&points, &normals).unwrap();
        assert_eq!(map.edges(), edges.as_slice());

        // The old +x face now faces +y.
        let mut out = Vec::new();
        let hit = map.search_for_feature(Vec3::Y, &mut out).unwrap();
        assert_eq!(hit.feature, Feature::Face(0));
        assert!(out.iter().all(|p| (p.y - 1.0).abs() < 1e-5));

        assert_eq!(
            map.update(&points[..7], &normals),
            Err(CollisionError::TopologyChanged {
                what: "points",
                expected: 8,
                got: 7
            })
        );
        assert!(map.update(&points, &normals[..4]).is_err());
    }

    #[test]
    fn test_sphere_is_covered() {
        for mut map in [unit_cube(), tetrahedron(), prism()] {
            for degrees in [DEFAULT_TOLERANCE_DEGREES, 0.5] {
                map.set_tolerance_in_degrees(degrees).unwrap();
                let mut points = Vec::new();
                for direction in sphere_samples(2000) {
                    assert!(
                        map.search_for_feature(direction, &mut points).is_some(),
                        "direction {direction:?} not classified"
                    );
                }
            }
        }
    }

    #[test]
    fn test_features_are_extremal() {
        for map in [unit_cube(), tetrahedron(), prism()] {
            let mut points = Vec::new();
            for direction in sphere_samples(500) {
                let hit = map.search_for_feature(direction, &mut points).unwrap();
                let best = support(&map, direction);
                // Within tolerance the feature is extremal up to the feature's size.
                let slack = match hit.feature {
                    Feature::Vertex(_) => 1e-4,
                    _ => 0.5,
                };
                for p in &points {
                    assert!(p.dot(direction) >= best - slack);
                }
            }
        }
    }

    fn unit_direction() -> impl Strategy<Value = Vec3> {
        prop::array::uniform3(-1.0f32..1.0)
            .prop_filter("non-degenerate", |v| Vec3::from(*v).length() > 0.1)
            .prop_map(|v| Vec3::from(v).normalize())
    }

    proptest! {
        #[test]
        fn prop_every_direction_classified(direction in unit_direction()) {
            let mut points = Vec::new();
            for map in [unit_cube(), tetrahedron(), prism()] {
                let hit = map.search_for_feature(direction, &mut points);
                prop_assert!(hit.is_some());
                let expected = match hit.map(|h| h.feature) {
                    Some(Feature::Face(f)) => map.faces()[f].vertices.len(),
                    Some(Feature::Edge(_)) => 2,
                    _ => 1,
                };
                prop_assert_eq!(points.len(), expected);
            }
        }

        #[test]
        fn prop_vertex_hits_are_support_points(direction in unit_direction()) {
            let map = tetrahedron();
            let mut points = Vec::new();
            if let Some(FeatureMatch { feature: Feature::Vertex(v), .. }) =
                map.search_for_feature(direction, &mut points)
            {
                prop_assert!(map.points()[v].dot(direction) >= support(&map, direction) - 1e-4);
            }
        }
    }
}
