use crate::error::{Result, try_with_capacity};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free disjoint-set forest over the indices `0..len`.
///
/// Every non-root points at a strictly smaller index, so the root of a set is its
/// smallest member, parent chains always terminate and no cycle can ever form.
/// [`UnionFind::union`] links the larger of two roots under the smaller one with a
/// compare-and-swap that only succeeds while the larger is still a root, and
/// retries from the new roots otherwise. [`UnionFind::find`] halves paths as it
/// walks; it may observe a stale chain but always ends at the current root of a
/// set containing the index.
pub struct UnionFind {
    parents: Vec<AtomicUsize>,
}

impl UnionFind {
    /// A forest of `len` singletons.
    pub fn new(len: usize) -> Result<Self> {
        let mut parents = try_with_capacity::<AtomicUsize>("disjoint-set forest", len)?;
        parents.par_extend((0..len).into_par_iter().map(AtomicUsize::new));
        Ok(Self { parents })
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Current root of the set containing `index`.
    pub fn find(&self, index: usize) -> usize {
        let mut x = index;
        loop {
            let parent = self.parents[x].load(Ordering::Acquire);
            if parent == x {
                return x;
            }
            debug_assert!(parent < x, "disjoint-set link {x} -> {parent} does not decrease");
            let grandparent = self.parents[parent].load(Ordering::Acquire);
            if grandparent != parent {
                // Losing this race only means someone else compressed first.
                let _ = self.parents[x].compare_exchange(
                    parent,
                    grandparent,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            x = grandparent;
        }
    }

    /// Merges the sets of `a` and `b`. Returns `false` if they were already one set.
    pub fn union(&self, a: usize, b: usize) -> bool {
        let mut a = a;
        let mut b = b;
        loop {
            let ra = self.find(a);
            let rb = self.find(b);
            if ra == rb {
                return false;
            }
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            if self.parents[high]
                .compare_exchange(high, low, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
            a = ra;
            b = rb;
        }
    }

    pub fn same_set(&self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Root of every index, computed in parallel.
    ///
    /// Only meaningful once no more unions are in flight.
    pub fn roots(&self) -> Vec<usize> {
        (0..self.parents.len()).into_par_iter().map(|i| self.find(i)).collect()
    }
}

impl std::fmt::Debug for UnionFind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnionFind").field("len", &self.len()).finish()
    }
}
