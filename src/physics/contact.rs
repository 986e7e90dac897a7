//! Contact data handed to the external solver.

use glam::Vec3;

use super::gauss_map::{Feature, FeatureMatch};

/// Narrowphase result for one overlapping pair.
#[derive(Debug, Clone)]
pub struct ContactManifold<K> {
    pub entity_a: K,
    pub entity_b: K,
    /// Unit contact normal, pointing from B toward A.
    pub normal: Vec3,
    /// Feature of A extremal along `-normal`, if one was classified.
    pub feature_a: Option<Feature>,
    /// Feature of B extremal along `normal`, if one was classified.
    pub feature_b: Option<Feature>,
    /// World-space points of `feature_a`.
    pub points_a: Vec<Vec3>,
    /// World-space points of `feature_b`.
    pub points_b: Vec<Vec3>,
}

impl<K> ContactManifold<K> {
    pub fn new(entity_a: K, entity_b: K, normal: Vec3) -> Self {
        Self {
            entity_a,
            entity_b,
            normal,
            feature_a: None,
            feature_b: None,
            points_a: Vec::new(),
            points_b: Vec::new(),
        }
    }

    pub(crate) fn with_features(
        mut self,
        a: Option<FeatureMatch>,
        points_a: Vec<Vec3>,
        b: Option<FeatureMatch>,
        points_b: Vec<Vec3>,
    ) -> Self {
        self.feature_a = a.map(|m| m.feature);
        self.feature_b = b.map(|m| m.feature);
        self.points_a = points_a;
        self.points_b = points_b;
        self
    }

    /// Whether both sides touch with a face, the stable resting case.
    pub fn is_face_face(&self) -> bool {
        matches!(
            (self.feature_a, self.feature_b),
            (Some(Feature::Face(_)), Some(Feature::Face(_)))
        )
    }
}
