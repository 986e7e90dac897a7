//! Collision pipeline over a `hecs::World`.

use std::collections::hash_map::{Entry, HashMap};
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};
use hecs::Entity;

use crate::ecs::components::physics::{Collider, ColliderShape, ConvexHull};
use crate::ecs::components::transform::GlobalTransform;

use super::broadphase::{OverlapStats, System};
use super::collider::ObjectSource;
use super::contact::ContactManifold;
use super::error::CollisionError;
use super::gauss_map::{cuboid_geometry, Feature, FeatureMatch, GaussMap};
use super::narrowphase::{overlap_obb_obb, overlap_obb_obb_with_corners, Obb};
use super::CollisionConfig;

/// World-space snapshot of one entity's collider.
struct Body {
    shape: ColliderShape,
    matrix: Mat4,
    obb: Obb,
}

impl Body {
    fn fetch(world: &hecs::World, entity: Entity) -> Option<Self> {
        let collider = world.get::<&Collider>(entity).ok()?;
        let transform = world.get::<&GlobalTransform>(entity).ok()?;
        let matrix = collider.world_matrix(&transform);
        let obb = Obb::from_transform(matrix, collider.shape.local_half_extents());
        Some(Self {
            shape: collider.shape.clone(),
            matrix,
            obb,
        })
    }

    /// Shared hull behind the shape; boxes have none.
    fn hull(&self) -> Option<&Arc<ConvexHull>> {
        match &self.shape {
            ColliderShape::Box { .. } => None,
            ColliderShape::ConvexHull(hull) => Some(hull),
        }
    }

    fn is_box(&self) -> bool {
        matches!(self.shape, ColliderShape::Box { .. })
    }

    /// Local Gauss map, before any placement.
    fn local_map(&self) -> GaussMap {
        match &self.shape {
            ColliderShape::Box { half_extents } => {
                GaussMap::cuboid(Vec3::ZERO, Mat3::IDENTITY, *half_extents)
            }
            ColliderShape::ConvexHull(hull) => hull.gauss_map().clone(),
        }
    }

    /// World-space points and face normals.
    fn world_geometry(&self) -> (Vec<Vec3>, Vec<Vec3>) {
        match &self.shape {
            ColliderShape::Box { .. } => {
                cuboid_geometry(self.obb.center, self.obb.orientation, self.obb.half_extents)
            }
            ColliderShape::ConvexHull(hull) => {
                let normal_matrix = Mat3::from_mat4(self.matrix).inverse().transpose();
                let points = hull
                    .points()
                    .iter()
                    .map(|p| self.matrix.transform_point3(*p))
                    .collect();
                let normals = hull
                    .normals()
                    .iter()
                    .map(|n| (normal_matrix * *n).normalize())
                    .collect();
                (points, normals)
            }
        }
    }
}

struct CachedMap {
    map: GaussMap,
    /// Hull whose topology `map` was built from, held so it cannot be freed
    /// and its address reused while cached.
    hull: Option<Arc<ConvexHull>>,
    /// Detection in which `map` was last moved to world space.
    stamp: u64,
}

/// Broadphase and narrowphase wired over ECS colliders.
///
/// Every non-sensor entity with a [`Collider`] and a [`GlobalTransform`] is
/// a collision object. Call [`CollisionWorld::sync`] after spawning or
/// despawning, then [`CollisionWorld::detect`] once per step.
pub struct CollisionWorld {
    config: CollisionConfig,
    broadphase: System<Entity>,
    pairs: Vec<(Entity, Entity)>,
    contacts: Vec<ContactManifold<Entity>>,
    maps: HashMap<Entity, CachedMap>,
    stats: OverlapStats,
    detections: u64,
}

impl CollisionWorld {
    /// Create a collision world. Fails if the feature tolerance is invalid.
    pub fn new(config: CollisionConfig) -> Result<Self, CollisionError> {
        let tolerance = config.feature_tolerance_degrees;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(CollisionError::InvalidTolerance(tolerance));
        }
        Ok(Self {
            broadphase: System::new(config.initial_cell_spacing, config.max_grid_cells),
            config,
            pairs: Vec::new(),
            contacts: Vec::new(),
            maps: HashMap::new(),
            stats: OverlapStats::default(),
            detections: 0,
        })
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    pub fn broadphase(&self) -> &System<Entity> {
        &self.broadphase
    }

    /// Candidate pairs of the last detection.
    pub fn pairs(&self) -> &[(Entity, Entity)] {
        &self.pairs
    }

    /// Contacts of the last detection.
    pub fn contacts(&self) -> &[ContactManifold<Entity>] {
        &self.contacts
    }

    /// Broadphase counters of the last detection.
    pub fn stats(&self) -> &OverlapStats {
        &self.stats
    }

    /// Register new collider entities and drop the ones that are gone.
    ///
    /// Returns the number of connected and disconnected entities.
    pub fn sync(&mut self, world: &hecs::World) -> Result<(usize, usize), CollisionError> {
        let mut connected = 0;
        for (entity, collider) in world.query::<&Collider>().iter() {
            if collider.is_sensor || self.broadphase.is_connected(entity) {
                continue;
            }
            if let Some(aabb) = world.get_box(entity) {
                self.broadphase.connect(entity, &aabb)?;
                connected += 1;
            }
        }

        let stale: Vec<Entity> = self
            .broadphase
            .objects()
            .iter()
            .copied()
            .filter(|entity| world.get_box(*entity).is_none())
            .collect();
        for entity in &stale {
            self.broadphase.disconnect(*entity)?;
            self.maps.remove(entity);
        }

        if connected > 0 || !stale.is_empty() {
            tracing::debug!(
                connected,
                disconnected = stale.len(),
                objects = self.broadphase.len(),
                "collision world synced"
            );
        }
        Ok((connected, stale.len()))
    }

    /// Run both phases and return the contacts found.
    pub fn detect(&mut self, world: &hecs::World) -> &[ContactManifold<Entity>] {
        let interval = u64::from(self.config.refit_interval);
        let refit = interval > 0 && self.detections % interval == 0;
        if refit || !self.broadphase.grid().is_ready() {
            self.broadphase.compute_optimal_cell_spacing(world);
        }
        self.detections += 1;

        let mut pairs = std::mem::take(&mut self.pairs);
        self.stats = self
            .broadphase
            .find_overlaps(world, self.config.algorithm, &mut pairs);

        self.contacts.clear();
        for &(a, b) in &pairs {
            match self.collide(world, a, b) {
                Ok(Some(manifold)) => self.contacts.push(manifold),
                Ok(None) => {}
                Err(err) => tracing::warn!(?a, ?b, %err, "narrowphase skipped pair"),
            }
        }
        self.pairs = pairs;

        tracing::debug!(
            pairs = self.pairs.len(),
            contacts = self.contacts.len(),
            "collision detection finished"
        );
        &self.contacts
    }

    fn collide(
        &mut self,
        world: &hecs::World,
        a: Entity,
        b: Entity,
    ) -> Result<Option<ContactManifold<Entity>>, CollisionError> {
        let (Some(body_a), Some(body_b)) = (Body::fetch(world, a), Body::fetch(world, b)) else {
            return Ok(None);
        };

        let sat_normal = if body_a.is_box() && body_b.is_box() {
            let corners_a = body_a.obb.corners();
            let corners_b = body_b.obb.corners();
            match overlap_obb_obb_with_corners(&corners_a, &body_a.obb, &corners_b, &body_b.obb) {
                Some(normal) => Some(normal),
                None => return Ok(None),
            }
        } else if overlap_obb_obb(&body_a.obb, &body_b.obb) {
            None
        } else {
            tracing::trace!(?a, ?b, "bounding boxes separated");
            return Ok(None);
        };

        self.refresh_map(a, &body_a)?;
        self.refresh_map(b, &body_b)?;
        let (Some(cached_a), Some(cached_b)) = (self.maps.get(&a), self.maps.get(&b)) else {
            return Ok(None);
        };
        let (map_a, map_b) = (&cached_a.map, &cached_b.map);

        let mut points_a = Vec::new();
        let mut points_b = Vec::new();
        let manifold = match sat_normal {
            Some(normal) => {
                let match_a = map_a.search_for_feature(-normal, &mut points_a);
                let match_b = map_b.search_for_feature(normal, &mut points_b);
                ContactManifold::new(a, b, normal).with_features(match_a, points_a, match_b, points_b)
            }
            None => {
                // Guess the separating direction from the centers.
                let guess = (body_b.obb.center - body_a.obb.center)
                    .try_normalize()
                    .unwrap_or(Vec3::Y);
                let match_a = map_a.search_for_feature(guess, &mut points_a);
                let match_b = map_b.search_for_feature(-guess, &mut points_b);
                let normal = contact_normal(match_a, match_b, guess);

                let lowest_a = map_a
                    .points()
                    .iter()
                    .map(|p| p.dot(normal))
                    .fold(f32::INFINITY, f32::min);
                let highest_b = map_b
                    .points()
                    .iter()
                    .map(|p| p.dot(normal))
                    .fold(f32::NEG_INFINITY, f32::max);
                if lowest_a >= highest_b {
                    tracing::trace!(?a, ?b, "hulls separated along contact normal");
                    return Ok(None);
                }
                ContactManifold::new(a, b, normal).with_features(match_a, points_a, match_b, points_b)
            }
        };
        tracing::trace!(?a, ?b, normal = ?manifold.normal, "contact");
        Ok(Some(manifold))
    }

    /// Move the entity's cached map to its current placement, once per
    /// detection.
    fn refresh_map(&mut self, entity: Entity, body: &Body) -> Result<(), CollisionError> {
        let stamp = self.detections;
        let tolerance = self.config.feature_tolerance_degrees;
        let hull = body.hull();
        let cached = match self.maps.entry(entity) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(CachedMap {
                map: body.local_map(),
                hull: hull.cloned(),
                stamp: 0,
            }),
        };
        if cached.stamp == stamp {
            return Ok(());
        }
        let same_topology = match (&cached.hull, hull) {
            (None, None) => true,
            (Some(old), Some(new)) => Arc::ptr_eq(old, new),
            _ => false,
        };
        if !same_topology {
            // The collider shape was replaced.
            cached.map = body.local_map();
            cached.hull = hull.cloned();
            cached.stamp = 0;
        }
        if cached.stamp == 0 {
            cached.map.set_tolerance_in_degrees(tolerance)?;
        }

        let (points, normals) = body.world_geometry();
        cached.map.update(&points, &normals)?;
        cached.stamp = stamp;
        Ok(())
    }
}

/// Contact normal from B toward A: a face normal when either side touches
/// with a face, the guessed direction otherwise.
fn contact_normal(a: Option<FeatureMatch>, b: Option<FeatureMatch>, guess: Vec3) -> Vec3 {
    let is_face = |m: &FeatureMatch| matches!(m.feature, Feature::Face(_));
    match (a, b) {
        (Some(m), _) if is_face(&m) => -m.normal,
        (_, Some(m)) if is_face(&m) => m.normal,
        _ => -guess,
    }
}
