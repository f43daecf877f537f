use super::labels::NOISE;
use super::union_find::UnionFind;
use crate::bvh::BoundingVolumeHierarchy;
use crate::error::{Error, Result, validate_radius};
use crate::execution::ExecutionSpace;
use crate::predicates::PrimitivesWithRadius;
use crate::primitives::{Point, PrimitiveStore};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Checks `labels` against the DBSCAN definition for `eps` and `min_pts`.
///
/// Neighbourhoods are recomputed with a fresh hierarchy. The labelling is accepted
/// when every core point is labelled, adjacent core points share a label, every
/// labelled non-core point has a core neighbour with its label, no noise point has a
/// core neighbour and the core points of each label are connected. Labels must be
/// [`NOISE`] or a primitive index; anything else is reported as a failed check.
pub fn verify_clusters<const D: usize>(
    space: &ExecutionSpace,
    primitives: &PrimitiveStore<Point<D>>,
    eps: f64,
    min_pts: usize,
    labels: &[i32],
) -> Result<bool> {
    if min_pts < 1 {
        return Err(Error::InvalidMinPts { got: min_pts });
    }
    validate_radius(eps)?;
    let n = primitives.len();
    if labels.len() != n {
        debug!(labels = labels.len(), primitives = n, "label count mismatch");
        return Ok(false);
    }

    let bvh = BoundingVolumeHierarchy::new(space, primitives)?;
    let predicates = PrimitivesWithRadius::new(primitives, eps)?;
    let neighbors = bvh.query_collect(space, &predicates);

    space.install(|| -> Result<bool> {
        if labels.par_iter().any(|&l| l != NOISE && (l < 0 || l as usize >= n)) {
            debug!("label out of range");
            return Ok(false);
        }

        let is_core: Vec<bool> = (0..n)
            .into_par_iter()
            .map(|i| neighbors.matches(i).len() >= min_pts)
            .collect();

        let first_violation = (0..n).into_par_iter().find_first(|&i| {
            let label = labels[i];
            let mut core_neighbors = neighbors.matches(i).iter().filter(|&&j| j != i && is_core[j]);
            if is_core[i] {
                label == NOISE || core_neighbors.any(|&j| labels[j] != label)
            } else if label == NOISE {
                core_neighbors.next().is_some()
            } else {
                !core_neighbors.any(|&j| labels[j] == label)
            }
        });
        if let Some(i) = first_violation {
            debug!(
                primitive = i,
                label = labels[i],
                core = is_core[i],
                "labelling violates cluster definition"
            );
            return Ok(false);
        }

        let forest = UnionFind::new(n)?;
        (0..n).into_par_iter().filter(|&i| is_core[i]).for_each(|i| {
            for &j in neighbors.matches(i) {
                if is_core[j] {
                    forest.union(i, j);
                }
            }
        });

        let representatives: Vec<AtomicUsize> = (0..n)
            .into_par_iter()
            .map(|_| AtomicUsize::new(usize::MAX))
            .collect();
        let split = (0..n).into_par_iter().filter(|&i| is_core[i]).any(|i| {
            let root = forest.find(i);
            match representatives[labels[i] as usize].compare_exchange(
                usize::MAX,
                root,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => false,
                Err(existing) => existing != root,
            }
        });
        if split {
            debug!("core points of one label are not connected");
        }
        Ok(!split)
    })
}
