use super::union_find::UnionFind;
use crate::error::{Error, Result};
use crate::execution::ExecutionSpace;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Label of primitives that belong to no cluster.
pub const NOISE: i32 = -1;

/// Labels for the connected-component special case (`min_pts <= 2`).
///
/// Every component is a cluster labelled by its root, except that singletons are
/// noise when `min_pts == 2`.
pub(crate) fn label_components(forest: &UnionFind, min_pts: usize) -> Vec<i32> {
    let roots = forest.roots();
    if min_pts < 2 {
        return roots.into_par_iter().map(|r| r as i32).collect();
    }
    let sizes: Vec<AtomicUsize> =
        (0..roots.len()).into_par_iter().map(|_| AtomicUsize::new(0)).collect();
    roots.par_iter().for_each(|&r| {
        sizes[r].fetch_add(1, Ordering::Relaxed);
    });
    roots
        .par_iter()
        .map(|&r| if sizes[r].load(Ordering::Relaxed) > 1 { r as i32 } else { NOISE })
        .collect()
}

/// Labels members with their root and everyone else with [`NOISE`].
pub(crate) fn label_members<F>(forest: &UnionFind, is_member: F) -> Vec<i32>
where
    F: Fn(usize) -> bool + Sync,
{
    forest
        .roots()
        .into_par_iter()
        .enumerate()
        .map(|(i, r)| if is_member(i) { r as i32 } else { NOISE })
        .collect()
}

/// Clusters grouped contiguously: cluster `k` is `indices[offsets[k]..offsets[k + 1]]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Clusters {
    pub offsets: Vec<usize>,
    pub indices: Vec<usize>,
}

impl Clusters {
    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cluster(&self, k: usize) -> &[usize] {
        &self.indices[self.offsets[k]..self.offsets[k + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.offsets.windows(2).map(|w| &self.indices[w[0]..w[1]])
    }

    /// Number of primitives over all clusters.
    pub fn num_points(&self) -> usize {
        self.indices.len()
    }
}

/// Groups labelled primitives by cluster, dropping clusters smaller than `cluster_min_size`.
///
/// Clusters come out in ascending label order with ascending indices inside each.
/// Labels must be [`NOISE`] or the index of a primitive.
pub fn sort_and_filter_clusters(
    space: &ExecutionSpace,
    labels: &[i32],
    cluster_min_size: usize,
) -> Result<Clusters> {
    if cluster_min_size < 1 {
        return Err(Error::InvalidClusterMinSize { got: cluster_min_size });
    }
    let n = labels.len();
    space.install(|| -> Result<Clusters> {
        if let Some(index) = labels
            .par_iter()
            .position_first(|&l| l != NOISE && (l < 0 || l as usize >= n))
        {
            return Err(Error::InvalidLabel {
                index,
                label: labels[index],
            });
        }

        let sizes: Vec<AtomicUsize> = (0..n).into_par_iter().map(|_| AtomicUsize::new(0)).collect();
        labels.par_iter().filter(|&&l| l != NOISE).for_each(|&l| {
            sizes[l as usize].fetch_add(1, Ordering::Relaxed);
        });

        let mut members: Vec<(usize, usize)> = labels
            .par_iter()
            .enumerate()
            .filter(|&(_, &l)| {
                l != NOISE && sizes[l as usize].load(Ordering::Relaxed) >= cluster_min_size
            })
            .map(|(i, &l)| (l as usize, i))
            .collect();
        members.par_sort_unstable();

        let mut offsets = vec![0];
        for k in 1..members.len() {
            if members[k].0 != members[k - 1].0 {
                offsets.push(k);
            }
        }
        if !members.is_empty() {
            offsets.push(members.len());
        }
        let indices = members.into_par_iter().map(|(_, i)| i).collect();
        Ok(Clusters { offsets, indices })
    })
}
