//! Hashed uniform grid with epoch-based lazy clearing.
//!
//! The grid covers a virtual dense `N×N×N` lattice with a fixed table of
//! `N³` physical cells. Lattice coordinates wrap periodically into the dense
//! space, so arbitrarily large worlds map onto a bounded table; distinct
//! lattice cells may alias the same bucket.

use glam::{IVec3, Vec3};

/// Initial object capacity of every cell.
const CELL_RESERVE: usize = 8;

/// One bucket of the hashed grid.
///
/// Contents are valid only while `epoch` matches the grid's epoch; a stale
/// cell is logically empty and is truncated (not reallocated) on the next
/// insertion.
#[derive(Debug, Clone)]
pub struct Cell {
    objects: Vec<u32>,
    epoch: u64,
    touched: u64,
}

impl Cell {
    fn new() -> Self {
        Self {
            objects: Vec::with_capacity(CELL_RESERVE),
            epoch: 0,
            touched: 0,
        }
    }

    /// Number of objects stored for `epoch`.
    #[inline]
    pub fn len(&self, epoch: u64) -> usize {
        if self.epoch == epoch {
            self.objects.len()
        } else {
            0
        }
    }

    #[inline]
    pub fn is_empty(&self, epoch: u64) -> bool {
        self.len(epoch) == 0
    }

    /// Objects stored for `epoch`.
    #[inline]
    pub fn objects(&self, epoch: u64) -> &[u32] {
        if self.epoch == epoch {
            &self.objects
        } else {
            &[]
        }
    }

    /// Backing storage capacity, independent of the epoch.
    pub fn capacity(&self) -> usize {
        self.objects.capacity()
    }

    #[inline]
    pub(crate) fn insert(&mut self, epoch: u64, object: u32) {
        if self.epoch != epoch {
            self.objects.clear();
            self.epoch = epoch;
        }
        self.objects.push(object);
    }

    /// Whether the cell was already visited during insertion pass `pass`.
    #[inline]
    pub(crate) fn touched(&self, pass: u64) -> bool {
        self.touched == pass
    }

    #[inline]
    pub(crate) fn touch(&mut self, pass: u64) {
        self.touched = pass;
    }
}

/// Fixed-size hash table of cells over a periodic lattice.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Vec<Cell>,
    resolution: i32,
    spacing: f32,
    epoch: u64,
}

impl Grid {
    /// Create a grid with no cells yet. It must be resized before use.
    pub fn new(spacing: f32) -> Self {
        debug_assert!(spacing.is_finite() && spacing > 0.0);
        Self {
            cells: Vec::new(),
            resolution: 0,
            spacing,
            // Freshly created cells carry epoch 0, so start one ahead.
            epoch: 1,
        }
    }

    /// Create a grid sized for at least `capacity` cells.
    pub fn with_capacity(spacing: f32, capacity: usize) -> Self {
        let mut grid = Self::new(spacing);
        grid.resize(capacity);
        grid
    }

    /// Grow the table to `ceil(cbrt(capacity))³` cells.
    ///
    /// Never shrinks: requests smaller than the current size are no-ops.
    /// Returns `true` if the table grew.
    pub fn resize(&mut self, capacity: usize) -> bool {
        let resolution = cube_root_ceil(capacity);
        if resolution <= self.resolution as usize {
            return false;
        }
        let count = resolution * resolution * resolution;
        self.cells.resize_with(count, Cell::new);
        self.resolution = resolution as i32;
        tracing::info!(resolution, cells = count, "broadphase grid resized");
        true
    }

    /// Invalidate every cell in O(1) by advancing the epoch.
    #[inline]
    pub fn clear(&mut self) {
        self.epoch += 1;
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[inline]
    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn set_spacing(&mut self, spacing: f32) {
        debug_assert!(spacing.is_finite() && spacing > 0.0);
        self.spacing = spacing;
    }

    /// Cells per lattice axis (`N`).
    #[inline]
    pub fn resolution(&self) -> usize {
        self.resolution as usize
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// A grid is usable once it has cells and a positive spacing.
    pub fn is_ready(&self) -> bool {
        !self.cells.is_empty() && self.spacing > 0.0
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Lattice coordinates of the cell containing `point`.
    #[inline]
    pub fn cell_coords(&self, point: Vec3) -> IVec3 {
        let inv = 1.0 / self.spacing;
        (point * inv).floor().as_ivec3()
    }

    /// Inclusive lattice range covered by the box `[min, max]`, wrapped into
    /// the periodic lattice.
    ///
    /// The start of each axis is reduced modulo `N` before leaving floating
    /// point, so far-away boxes map to the same buckets as
    /// [`Grid::cell_coords`] would without overflowing `i32`. The span is
    /// capped at `N` steps: a box wider than the table wraps around once per
    /// axis and its revisited buckets show up as hash collisions. The grid
    /// must be ready.
    pub fn cell_range(&self, min: Vec3, max: Vec3) -> (IVec3, IVec3) {
        debug_assert!(self.is_ready());
        let n = f64::from(self.resolution);
        let inv = 1.0 / f64::from(self.spacing);
        let mut lo = IVec3::ZERO;
        let mut hi = IVec3::ZERO;
        for axis in 0..3 {
            let first = (f64::from(min[axis]) * inv).floor();
            let last = (f64::from(max[axis]) * inv).floor();
            let span = (last - first).clamp(0.0, n);
            let start = first.rem_euclid(n);
            lo[axis] = start as i32;
            hi[axis] = (start + span) as i32;
        }
        (lo, hi)
    }

    /// Physical bucket of a lattice cell.
    #[inline]
    pub fn bucket(&self, coords: IVec3) -> usize {
        let n = self.resolution;
        let i = coords.x.rem_euclid(n) as usize;
        let j = coords.y.rem_euclid(n) as usize;
        let k = coords.z.rem_euclid(n) as usize;
        let n = n as usize;
        ((i * n + j) * n + k) % self.cells.len()
    }

    #[inline]
    pub(crate) fn cell_mut(&mut self, bucket: usize) -> &mut Cell {
        &mut self.cells[bucket]
    }
}

fn cube_root_ceil(n: usize) -> usize {
    let mut r = (n as f64).cbrt().round() as usize;
    while r * r * r < n {
        r += 1;
    }
    while r > 0 && (r - 1) * (r - 1) * (r - 1) >= n {
        r -= 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_root_ceil() {
        assert_eq!(cube_root_ceil(0), 0);
        assert_eq!(cube_root_ceil(1), 1);
        assert_eq!(cube_root_ceil(8), 2);
        assert_eq!(cube_root_ceil(9), 3);
        assert_eq!(cube_root_ceil(27), 3);
        assert_eq!(cube_root_ceil(1000), 10);
        assert_eq!(cube_root_ceil(1001), 11);
    }

    #[test]
    fn test_resize_only_grows() {
        let mut grid = Grid::new(1.0);
        assert!(!grid.is_ready());

        assert!(grid.resize(100));
        assert_eq!(grid.resolution(), 5);
        assert_eq!(grid.cell_count(), 125);

        assert!(!grid.resize(10));
        assert!(!grid.resize(125));
        assert_eq!(grid.cell_count(), 125);

        assert!(grid.resize(126));
        assert_eq!(grid.cell_count(), 216);
        assert!(grid.is_ready());
    }

    #[test]
    fn test_cell_coords_floor_negative() {
        let grid = Grid::with_capacity(2.0, 8);
        assert_eq!(grid.cell_coords(Vec3::new(0.5, 2.0, 3.9)), IVec3::new(0, 1, 1));
        assert_eq!(grid.cell_coords(Vec3::new(-0.1, -2.0, -2.1)), IVec3::new(-1, -1, -2));
    }

    #[test]
    fn test_bucket_wraps_periodically() {
        let grid = Grid::with_capacity(1.0, 27);
        let n = grid.resolution() as i32;
        let base = grid.bucket(IVec3::new(1, 2, 0));
        assert_eq!(grid.bucket(IVec3::new(1 + n, 2, 0)), base);
        assert_eq!(grid.bucket(IVec3::new(1, 2 - n, 0)), base);
        assert_eq!(grid.bucket(IVec3::new(1, 2, 3 * n)), base);
        assert_eq!(grid.bucket(IVec3::new(0, 0, 0)), 0);
        assert_eq!(grid.bucket(IVec3::new(0, 0, 1)), 1);
        assert_eq!(grid.bucket(IVec3::new(1, 0, 0)), 9);
        assert!(grid.bucket(IVec3::new(-1, -1, -1)) < grid.cell_count());
    }

    #[test]
    fn test_cell_range_wraps_far_coordinates() {
        let grid = Grid::with_capacity(0.002, 64);
        let n = grid.resolution() as i32;

        let (lo, hi) = grid.cell_range(Vec3::new(2.0e7, 0.0, 0.0), Vec3::new(2.0e7 + 4.0, 0.0, 0.0));
        assert!(lo.cmpge(IVec3::ZERO).all() && lo.cmplt(IVec3::splat(n)).all());
        assert_eq!(hi.x - lo.x, n);
        assert_eq!(hi.y, lo.y);

        let (lo, hi) = grid.cell_range(Vec3::splat(-0.003), Vec3::splat(-0.001));
        let expected = grid.cell_coords(Vec3::splat(-0.003));
        assert_eq!(grid.bucket(lo), grid.bucket(expected));
        assert_eq!(hi - lo, IVec3::ONE);
    }

    #[test]
    fn test_lazy_clear_keeps_storage() {
        let mut grid = Grid::with_capacity(1.0, 8);
        let epoch = grid.epoch();
        for bucket in 0..grid.cell_count() {
            for object in 0..20 {
                grid.cell_mut(bucket).insert(epoch, object);
            }
        }
        let capacities: Vec<usize> = grid.cells().iter().map(Cell::capacity).collect();
        assert!(grid.cells().iter().all(|c| c.len(epoch) == 20));

        grid.clear();
        let epoch = grid.epoch();
        assert!(grid.cells().iter().all(|c| c.is_empty(epoch)));
        assert!(grid.cells().iter().all(|c| c.objects(epoch).is_empty()));
        let after: Vec<usize> = grid.cells().iter().map(Cell::capacity).collect();
        assert_eq!(capacities, after);
    }

    #[test]
    fn test_stale_cell_reused_on_insert() {
        let mut grid = Grid::with_capacity(1.0, 1);
        let first = grid.epoch();
        grid.cell_mut(0).insert(first, 3);
        grid.cell_mut(0).insert(first, 4);
        let capacity = grid.cells()[0].capacity();

        grid.clear();
        let second = grid.epoch();
        grid.cell_mut(0).insert(second, 7);
        assert_eq!(grid.cells()[0].objects(second), &[7]);
        assert_eq!(grid.cells()[0].len(first), 0);
        assert_eq!(grid.cells()[0].capacity(), capacity);
    }

    #[test]
    fn test_cell_reserve_doubles() {
        let mut cell = Cell::new();
        assert!(cell.capacity() >= CELL_RESERVE);
        for object in 0..=(CELL_RESERVE as u32) {
            cell.insert(1, object);
        }
        assert_eq!(cell.len(1), CELL_RESERVE + 1);
        assert!(cell.capacity() >= 2 * CELL_RESERVE);
    }

    #[test]
    fn test_touch_stamp() {
        let mut cell = Cell::new();
        assert!(!cell.touched(1));
        cell.touch(1);
        assert!(cell.touched(1));
        assert!(!cell.touched(2));
    }
}
