//! Broadphase collision detection using a hashed spatial grid.
//!
//! [`System`] keeps non-owning handles to the objects registered with it and
//! resolves them through an [`ObjectSource`] on every query. Two algorithms
//! are available: an exact all-pairs sweep used as ground truth, and the
//! grid, which visits only objects sharing a bucket.
//!
//! The grid is an approximation. Two lattice cells that alias the same bucket
//! are treated as one, and a bucket already claimed by the object being
//! inserted is skipped, so a real overlap can occasionally be missed. The
//! remedy is a larger table (see [`System::compute_optimal_cell_spacing`]),
//! never a retry.

pub mod grid;

use std::collections::HashMap;
use std::hash::Hash;

use glam::{IVec3, Vec3};

use super::collider::{Aabb, Collidable, ObjectSource};
use super::error::CollisionError;

pub use self::grid::{Cell, Grid};

/// Broadphase algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapAlgorithm {
    /// Exhaustive O(n²) AABB test over every unordered pair.
    AllPairs,
    /// Hashed grid; falls back to [`OverlapAlgorithm::AllPairs`] until the
    /// grid has cells.
    #[default]
    Grid,
}

/// Counters describing one [`System::find_overlaps`] query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OverlapStats {
    /// Algorithm that actually ran.
    pub algorithm: OverlapAlgorithm,
    /// Exact AABB tests performed.
    pub tests: usize,
    /// Overlapping pairs reported.
    pub overlaps: usize,
    /// Tests avoided because the pair was already tested in this pass.
    pub skipped_tests: usize,
    /// Buckets skipped because the inserting object already claimed them.
    pub hash_collisions: usize,
    /// Handles the source could not resolve.
    pub missing: usize,
}

impl OverlapStats {
    /// Whether any overlap was found.
    #[inline]
    pub fn found(&self) -> bool {
        self.overlaps > 0
    }

    /// Ratio of reported overlaps to AABB tests, or 0 when nothing was tested.
    pub fn efficiency(&self) -> f32 {
        if self.tests == 0 {
            0.0
        } else {
            self.overlaps as f32 / self.tests as f32
        }
    }
}

/// Broadphase system: registered handles plus the grid that indexes them.
pub struct System<K> {
    objects: Vec<K>,
    slots: HashMap<K, usize>,
    grid: Grid,
    min_span: Vec3,
    max_grid_cells: usize,
    // Per-query scratch, indexed by slot.
    boxes: Vec<Option<Aabb>>,
    seen_by: Vec<u64>,
    pass: u64,
}

impl<K> System<K>
where
    K: Copy + Ord + Hash,
{
    /// Create an empty system whose grid starts at `initial_spacing` and is
    /// capped at `max_grid_cells` cells by automatic sizing.
    pub fn new(initial_spacing: f32, max_grid_cells: usize) -> Self {
        Self {
            objects: Vec::new(),
            slots: HashMap::new(),
            grid: Grid::new(initial_spacing),
            min_span: Vec3::splat(f32::INFINITY),
            max_grid_cells: max_grid_cells.max(1),
            boxes: Vec::new(),
            seen_by: Vec::new(),
            pass: 0,
        }
    }

    /// Register `handle`, whose current bounds are taken from `object`.
    ///
    /// The grid spacing follows the running minimum span as
    /// `2 × max(min_span)`. The span only shrinks, so later objects can refine
    /// the spacing but never coarsen it. Point objects leave it unchanged.
    pub fn connect<O>(&mut self, handle: K, object: &O) -> Result<(), CollisionError>
    where
        O: Collidable + ?Sized,
    {
        if self.slots.contains_key(&handle) {
            return Err(CollisionError::AlreadyConnected);
        }
        self.slots.insert(handle, self.objects.len());
        self.objects.push(handle);

        let extent = object.get_box().extent();
        debug_assert!(extent.is_finite() && extent.min_element() >= 0.0);
        self.min_span = self.min_span.min(extent);
        let spacing = 2.0 * self.min_span.max_element();
        if spacing.is_finite() && spacing > f32::EPSILON {
            self.grid.set_spacing(spacing);
        }
        Ok(())
    }

    /// Unregister `handle`. Order of the remaining handles is not preserved.
    pub fn disconnect(&mut self, handle: K) -> Result<(), CollisionError> {
        let slot = self
            .slots
            .remove(&handle)
            .ok_or(CollisionError::NotConnected)?;
        self.objects.swap_remove(slot);
        if let Some(moved) = self.objects.get(slot) {
            self.slots.insert(*moved, slot);
        }
        Ok(())
    }

    pub fn is_connected(&self, handle: K) -> bool {
        self.slots.contains_key(&handle)
    }

    /// Registered handles, in slot order.
    pub fn objects(&self) -> &[K] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Size the grid from the median object footprint.
    ///
    /// Spacing becomes twice the largest per-axis median span, and the table
    /// gets enough cells to cover the scene's bounding extent at that
    /// spacing. Returns the new spacing, or `None` when no registered object
    /// could be resolved.
    pub fn compute_optimal_cell_spacing<S>(&mut self, source: &S) -> Option<f32>
    where
        S: ObjectSource<K> + ?Sized,
    {
        let boxes: Vec<Aabb> = self
            .objects
            .iter()
            .filter_map(|handle| source.get_box(*handle))
            .collect();
        let scene = boxes.iter().copied().reduce(|a, b| a.union(&b))?;

        let mut spans: [Vec<f32>; 3] = Default::default();
        for aabb in &boxes {
            let extent = aabb.extent();
            for (axis, span) in spans.iter_mut().enumerate() {
                span.push(extent[axis]);
            }
        }
        let median = |values: &mut Vec<f32>| {
            values.sort_unstable_by(f32::total_cmp);
            values[values.len() / 2]
        };
        let medians = Vec3::new(
            median(&mut spans[0]),
            median(&mut spans[1]),
            median(&mut spans[2]),
        );

        let mut spacing = 2.0 * medians.max_element();
        if !(spacing.is_finite() && spacing > f32::EPSILON) {
            // Point-like objects: fall back to the scene size.
            spacing = scene.extent().max_element().max(1.0);
        }

        let per_axis = (scene.extent().max_element() / spacing).ceil().max(1.0) as usize;
        let wanted = per_axis
            .saturating_mul(per_axis)
            .saturating_mul(per_axis)
            .max(boxes.len());
        let capacity = if wanted > self.max_grid_cells {
            tracing::warn!(
                wanted,
                max = self.max_grid_cells,
                "broadphase grid size clamped"
            );
            self.max_grid_cells
        } else {
            wanted
        };

        self.grid.set_spacing(spacing);
        self.grid.resize(capacity);
        tracing::debug!(
            spacing,
            cells = self.grid.cell_count(),
            objects = boxes.len(),
            "computed broadphase cell spacing"
        );
        Some(spacing)
    }

    /// Find all overlapping pairs.
    ///
    /// `out_pairs` is cleared and refilled with canonical `(low, high)` pairs
    /// sorted lexicographically and free of duplicates.
    pub fn find_overlaps<S>(
        &mut self,
        source: &S,
        algorithm: OverlapAlgorithm,
        out_pairs: &mut Vec<(K, K)>,
    ) -> OverlapStats
    where
        S: ObjectSource<K> + ?Sized,
    {
        out_pairs.clear();
        let mut stats = OverlapStats::default();

        self.boxes.clear();
        for handle in &self.objects {
            let aabb = source.get_box(*handle);
            if aabb.is_none() {
                stats.missing += 1;
            }
            self.boxes.push(aabb);
        }
        if stats.missing > 0 {
            tracing::warn!(
                missing = stats.missing,
                "broadphase skipped handles its source could not resolve"
            );
        }

        let algorithm = match algorithm {
            OverlapAlgorithm::Grid if !self.grid.is_ready() => OverlapAlgorithm::AllPairs,
            other => other,
        };
        stats.algorithm = algorithm;
        match algorithm {
            OverlapAlgorithm::AllPairs => self.all_pairs(out_pairs, &mut stats),
            OverlapAlgorithm::Grid => self.grid_pairs(out_pairs, &mut stats),
        }

        out_pairs.sort_unstable();
        out_pairs.dedup();
        stats.overlaps = out_pairs.len();

        tracing::debug!(
            algorithm = ?stats.algorithm,
            objects = self.objects.len(),
            tests = stats.tests,
            overlaps = stats.overlaps,
            skipped = stats.skipped_tests,
            collisions = stats.hash_collisions,
            "broadphase query"
        );
        stats
    }

    fn all_pairs(&self, out_pairs: &mut Vec<(K, K)>, stats: &mut OverlapStats) {
        for (i, aabb_a) in self.boxes.iter().enumerate() {
            let Some(aabb_a) = aabb_a else { continue };
            for (j, aabb_b) in self.boxes.iter().enumerate().skip(i + 1) {
                let Some(aabb_b) = aabb_b else { continue };
                stats.tests += 1;
                if aabb_a.overlaps(aabb_b) {
                    out_pairs.push(canonical(self.objects[i], self.objects[j]));
                }
            }
        }
    }

    fn grid_pairs(&mut self, out_pairs: &mut Vec<(K, K)>, stats: &mut OverlapStats) {
        self.grid.clear();
        let epoch = self.grid.epoch();
        self.seen_by.resize(self.objects.len(), 0);

        for a in 0..self.objects.len() {
            let Some(aabb_a) = self.boxes[a] else { continue };

            // Pass ids are unique across queries, so seen and touch stamps
            // from earlier passes can never match.
            self.pass += 1;
            let pass = self.pass;

            let (lo, hi) = self.grid.cell_range(aabb_a.min, aabb_a.max);

            for i in lo.x..=hi.x {
                for j in lo.y..=hi.y {
                    for k in lo.z..=hi.z {
                        let bucket = self.grid.bucket(IVec3::new(i, j, k));
                        let cell = self.grid.cell_mut(bucket);
                        if cell.touched(pass) {
                            stats.hash_collisions += 1;
                            continue;
                        }

                        for &b in cell.objects(epoch) {
                            let b = b as usize;
                            if self.seen_by[b] == pass {
                                stats.skipped_tests += 1;
                                continue;
                            }
                            self.seen_by[b] = pass;
                            stats.tests += 1;
                            if let Some(aabb_b) = &self.boxes[b] {
                                if aabb_a.overlaps(aabb_b) {
                                    out_pairs.push(canonical(self.objects[a], self.objects[b]));
                                }
                            }
                        }

                        cell.touch(pass);
                        cell.insert(epoch, a as u32);
                    }
                }
            }
        }
    }
}

impl<K> Default for System<K>
where
    K: Copy + Ord + Hash,
{
    fn default() -> Self {
        let config = super::CollisionConfig::default();
        Self::new(config.initial_cell_spacing, config.max_grid_cells)
    }
}

#[inline]
fn canonical<K: Ord>(a: K, b: K) -> (K, K) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
