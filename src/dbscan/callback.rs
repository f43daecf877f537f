use super::core_points::{CorePoints, FusedCorePoints};
use super::dense_box::DenseBoxes;
use super::union_find::UnionFind;
use crate::bvh::QueryCallback;
use crate::error::{Result, try_with_capacity};
use std::sync::atomic::{AtomicBool, Ordering};

/// One claim slot per primitive: a border point joins the first cluster that claims it.
#[derive(Debug)]
pub(crate) struct BorderClaims {
    slots: Vec<AtomicBool>,
}

impl BorderClaims {
    pub(crate) fn new(len: usize) -> Result<Self> {
        let mut slots = try_with_capacity::<AtomicBool>("border claims", len)?;
        slots.extend((0..len).map(|_| AtomicBool::new(false)));
        Ok(Self { slots })
    }

    /// Returns `true` for exactly one caller per primitive.
    #[inline]
    pub(crate) fn claim(&self, index: usize) -> bool {
        self.slots[index]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn is_claimed(&self, index: usize) -> bool {
        self.slots[index].load(Ordering::Acquire)
    }
}

/// Applies the merge rule to events whose source is known to be core.
#[derive(Clone, Copy)]
pub(crate) struct ClusterMerger<'a> {
    forest: &'a UnionFind,
    claims: &'a BorderClaims,
    dense: Option<&'a DenseBoxes>,
}

impl<'a> ClusterMerger<'a> {
    pub(crate) fn new(
        forest: &'a UnionFind,
        claims: &'a BorderClaims,
        dense: Option<&'a DenseBoxes>,
    ) -> Self {
        Self { forest, claims, dense }
    }

    /// Events between two points of one dense box carry no new information.
    #[inline]
    fn redundant(&self, p: usize, q: usize) -> bool {
        p == q || self.dense.is_some_and(|dense| dense.same_box(p, q))
    }

    /// Joins `q` to the cluster of the core point `p`.
    ///
    /// A core `q` is always merged. Any other `q` is merged only by the single
    /// source that wins its claim, so a border point never bridges two clusters.
    #[inline]
    fn merge(&self, p: usize, q: usize, q_is_core: bool) {
        if q_is_core || self.claims.claim(q) {
            self.forest.union(p, q);
        }
    }
}

/// Clustering callback driven by a core-point oracle fixed before the traversal.
pub(crate) struct FdbscanCallback<'a, C> {
    core: &'a C,
    merger: ClusterMerger<'a>,
}

impl<'a, C: CorePoints> FdbscanCallback<'a, C> {
    pub(crate) fn new(core: &'a C, merger: ClusterMerger<'a>) -> Self {
        Self { core, merger }
    }
}

impl<C: CorePoints> QueryCallback for FdbscanCallback<'_, C> {
    type Scratch = ();

    #[inline]
    fn on_match(&self, p: usize, q: usize, _scratch: &mut ()) {
        if self.merger.redundant(p, q) || !self.core.is_core(p) {
            return;
        }
        self.merger.merge(p, q, self.core.is_core(q));
    }
}

/// Lane state of [`FusedFdbscanCallback`].
#[derive(Debug, Default)]
pub(crate) struct FusedScratch {
    count: usize,
    confirmed: bool,
    pending: Vec<usize>,
}

/// Clustering callback that counts neighbours and merges in the same traversal.
///
/// Matches of a predicate are buffered until its primitive is confirmed core,
/// then flushed; once confirmed, later matches are merged on arrival.
pub(crate) struct FusedFdbscanCallback<'a> {
    core: &'a FusedCorePoints,
    merger: ClusterMerger<'a>,
    min_pts: usize,
}

impl<'a> FusedFdbscanCallback<'a> {
    pub(crate) fn new(
        core: &'a FusedCorePoints,
        merger: ClusterMerger<'a>,
        min_pts: usize,
    ) -> Self {
        Self { core, merger, min_pts }
    }
}

impl QueryCallback for FusedFdbscanCallback<'_> {
    type Scratch = FusedScratch;

    fn begin(&self, p: usize, scratch: &mut FusedScratch) {
        scratch.count = 0;
        scratch.confirmed = self.core.is_core(p);
        scratch.pending.clear();
    }

    fn on_match(&self, p: usize, q: usize, scratch: &mut FusedScratch) {
        scratch.count += 1;
        if scratch.confirmed {
            if !self.merger.redundant(p, q) {
                self.merger.merge(p, q, self.core.is_core(q));
            }
            return;
        }
        if !self.merger.redundant(p, q) {
            scratch.pending.push(q);
        }
        if scratch.count >= self.min_pts {
            // Publish before reading any other flag.
            self.core.mark(p);
            scratch.confirmed = true;
            for q in scratch.pending.drain(..) {
                self.merger.merge(p, q, self.core.is_core(q));
            }
        }
    }

    fn end(&self, _p: usize, scratch: &mut FusedScratch) {
        scratch.pending.clear();
    }
}
