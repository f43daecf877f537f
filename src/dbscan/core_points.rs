use crate::error::{Result, try_with_capacity};
use std::sync::atomic::{AtomicBool, Ordering};

/// Answers whether a primitive is a core point for the current clustering run.
///
/// A primitive is core when at least `min_pts` primitives, itself included, lie
/// within `eps` of it. Answers never change from `true` back to `false` during a run.
pub trait CorePoints: Sync {
    fn is_core(&self, index: usize) -> bool;
}

/// Core points of the connected-component special case (`min_pts <= 2`).
///
/// The only questions asked during clustering are about the two ends of a match
/// event between distinct primitives, and such an event alone proves that both
/// have two neighbours. Primitives that never take part in an event are resolved
/// by component size at labelling time.
#[derive(Clone, Copy, Debug, Default)]
pub struct CcsCorePoints;

impl CorePoints for CcsCorePoints {
    #[inline]
    fn is_core(&self, _index: usize) -> bool {
        true
    }
}

/// Core points from neighbour counts gathered before clustering.
#[derive(Clone, Debug)]
pub struct EagerCorePoints {
    counts: Vec<usize>,
    min_pts: usize,
}

impl EagerCorePoints {
    /// `counts[i]` is the number of primitives within `eps` of primitive `i`.
    pub fn new(counts: Vec<usize>, min_pts: usize) -> Self {
        Self { counts, min_pts }
    }

    pub fn neighbor_count(&self, index: usize) -> usize {
        self.counts[index]
    }

    pub fn num_core(&self) -> usize {
        self.counts.iter().filter(|&&c| c >= self.min_pts).count()
    }
}

impl CorePoints for EagerCorePoints {
    #[inline]
    fn is_core(&self, index: usize) -> bool {
        self.counts[index] >= self.min_pts
    }
}

/// Core flags raised during the clustering traversal itself.
///
/// Each flag is set by the lane that owns the primitive as soon as its running
/// neighbour count reaches `min_pts`. Flags use sequentially consistent accesses:
/// a lane publishes its own flag before it reads any other, so of two adjacent
/// core points at least one sees the other as core.
#[derive(Debug)]
pub struct FusedCorePoints {
    flags: Vec<AtomicBool>,
}

impl FusedCorePoints {
    pub fn new(len: usize) -> Result<Self> {
        let mut flags = try_with_capacity::<AtomicBool>("core flags", len)?;
        flags.extend((0..len).map(|_| AtomicBool::new(false)));
        Ok(Self { flags })
    }

    /// Marks `index` as core.
    pub fn mark(&self, index: usize) {
        self.flags[index].store(true, Ordering::SeqCst);
    }

    pub fn num_core(&self) -> usize {
        self.flags.iter().filter(|f| f.load(Ordering::Relaxed)).count()
    }
}

impl CorePoints for FusedCorePoints {
    #[inline]
    fn is_core(&self, index: usize) -> bool {
        self.flags[index].load(Ordering::SeqCst)
    }
}
