use super::core_points::FusedCorePoints;
use super::union_find::UnionFind;
use crate::bounds::BoundingBox;
use crate::error::{Result, try_with_capacity};
use crate::primitives::{Point, PrimitiveStore};
use rayon::prelude::*;
use tracing::trace;

const NOT_DENSE: usize = usize::MAX;

/// Largest cell coordinate along one axis that a grid key may hold.
const MAX_CELLS: f64 = (1u64 << 62) as f64;

/// Side of a grid cell whose diagonal is just below `eps`.
///
/// Any two points binned into the same cell are then strictly closer than `eps`.
pub(crate) fn cell_side<const D: usize>(eps: f64) -> f64 {
    eps / (D as f64).sqrt() * (1.0 - 1e-9)
}

/// `true` when every cell of the grid over `scene` has an exact `i64` coordinate.
///
/// Fails for a cell side that underflows to zero and for scenes spanning more
/// than `MAX_CELLS` cells along some axis.
pub(crate) fn grid_fits<const D: usize>(scene: &BoundingBox<D>, eps: f64) -> bool {
    let side = cell_side::<D>(eps);
    side > 0.0 && (0..D).all(|axis| scene.extent(axis) / side < MAX_CELLS)
}

/// Grid cells holding at least `min_pts` points.
///
/// Every point of such a cell has all the other points of the cell as neighbours,
/// so it is core and belongs to the same cluster as the rest of its cell.
#[derive(Debug)]
pub(crate) struct DenseBoxes {
    cell_of: Vec<usize>,
    representatives: Vec<usize>,
    num_dense_points: usize,
}

impl DenseBoxes {
    /// Bins `primitives` on a grid anchored at `scene.min` and keeps the dense cells.
    ///
    /// No cell is dense when the grid does not fit, see [`grid_fits`].
    pub(crate) fn build<const D: usize>(
        primitives: &PrimitiveStore<Point<D>>,
        scene: &BoundingBox<D>,
        eps: f64,
        min_pts: usize,
    ) -> Result<Self> {
        let n = primitives.len();
        let mut cell_of = try_with_capacity::<usize>("dense box membership", n)?;
        cell_of.resize(n, NOT_DENSE);
        let mut representatives = Vec::new();
        let mut num_dense_points = 0;
        if !grid_fits(scene, eps) {
            return Ok(Self {
                cell_of,
                representatives,
                num_dense_points,
            });
        }

        let side = cell_side::<D>(eps);

        let mut keys = try_with_capacity::<([i64; D], usize)>("grid cells", n)?;
        keys.par_extend(primitives.as_slice().par_iter().enumerate().map(|(i, p)| {
            let coords = p.coords();
            let mut cell = [0i64; D];
            for axis in 0..D {
                cell[axis] = ((coords[axis] - scene.min[axis]) / side).floor() as i64;
            }
            (cell, i)
        }));
        keys.par_sort_unstable();

        let mut start = 0;
        while start < n {
            let mut end = start + 1;
            while end < n && keys[end].0 == keys[start].0 {
                end += 1;
            }
            if end - start >= min_pts {
                let id = representatives.len();
                // Keys are sorted by index within a cell, so the first is the smallest.
                representatives.push(keys[start].1);
                for &(_, i) in &keys[start..end] {
                    cell_of[i] = id;
                }
                num_dense_points += end - start;
                trace!(cell = ?keys[start].0, points = end - start, "dense box");
            }
            start = end;
        }

        Ok(Self {
            cell_of,
            representatives,
            num_dense_points,
        })
    }

    pub(crate) fn num_boxes(&self) -> usize {
        self.representatives.len()
    }

    pub(crate) fn num_dense_points(&self) -> usize {
        self.num_dense_points
    }

    pub(crate) fn is_dense(&self, index: usize) -> bool {
        self.cell_of[index] != NOT_DENSE
    }

    /// `true` when both primitives lie in the same dense cell.
    #[inline]
    pub(crate) fn same_box(&self, a: usize, b: usize) -> bool {
        let cell = self.cell_of[a];
        cell != NOT_DENSE && cell == self.cell_of[b]
    }

    /// Unions every dense point with the smallest index of its cell.
    pub(crate) fn merge_into(&self, forest: &UnionFind) {
        self.cell_of.par_iter().enumerate().for_each(|(i, &cell)| {
            if cell != NOT_DENSE {
                forest.union(self.representatives[cell], i);
            }
        });
    }

    /// Raises the core flag of every dense point.
    pub(crate) fn mark_core(&self, core: &FusedCorePoints) {
        (0..self.cell_of.len())
            .into_par_iter()
            .filter(|&i| self.is_dense(i))
            .for_each(|i| core.mark(i));
    }
}
