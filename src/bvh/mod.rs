//! Linear bounding volume hierarchy with data-parallel construction and queries.

mod construction;
pub(crate) mod morton;
mod traversal;

pub use traversal::QueryCallback;

use crate::bounds::BoundingBox;
use crate::error::{Result, try_with_capacity};
use crate::execution::{ExecutionSpace, TraversalPolicy};
use crate::predicates::Predicates;
use crate::primitives::{Primitive, PrimitiveStore};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::debug;
use traversal::{predicate_order, traverse};

pub(crate) const ROOT: usize = 0;

#[derive(Clone, Copy, Debug)]
pub(crate) enum NodeKind {
    Internal { left: usize, right: usize },
    Leaf { primitive: usize },
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Node<const D: usize> {
    pub(crate) bounds: BoundingBox<D>,
    pub(crate) kind: NodeKind,
}

/// A static binary tree over the bounding boxes of a primitive set.
///
/// Built once with [`BoundingVolumeHierarchy::new`], then queried any number of
/// times; the tree is immutable and can be shared by any number of concurrent
/// readers. It keeps only primitive indices and boxes, not the primitives.
#[derive(Clone, Debug)]
pub struct BoundingVolumeHierarchy<const D: usize> {
    nodes: Vec<Node<D>>,
    num_primitives: usize,
    bounds: BoundingBox<D>,
}

impl<const D: usize> BoundingVolumeHierarchy<D> {
    /// Builds the hierarchy over `primitives`.
    ///
    /// Fails with [`Error::EmptyPrimitives`](crate::Error::EmptyPrimitives) for an
    /// empty store and [`Error::NonFiniteCoordinate`](crate::Error::NonFiniteCoordinate)
    /// if any box has a NaN or infinite corner. Construction is all-or-nothing and
    /// deterministic for a given input order.
    pub fn new<P: Primitive<D>>(
        space: &ExecutionSpace,
        primitives: &PrimitiveStore<P>,
    ) -> Result<Self> {
        let n = primitives.len();
        let start = Instant::now();
        let (nodes, bounds) = space.install(|| -> Result<_> {
            let mut boxes = try_with_capacity::<BoundingBox<D>>("primitive boxes", n)?;
            boxes.par_extend(primitives.as_slice().par_iter().map(|p| p.bounding_box()));
            construction::build(&boxes)
        })?;
        debug!(
            primitives = n,
            nodes = nodes.len(),
            elapsed = ?start.elapsed(),
            "built bounding volume hierarchy"
        );
        Ok(Self {
            nodes,
            num_primitives: n,
            bounds,
        })
    }

    /// Number of indexed primitives.
    pub fn len(&self) -> usize {
        self.num_primitives
    }

    /// Always `false`: empty hierarchies cannot be built.
    pub fn is_empty(&self) -> bool {
        self.num_primitives == 0
    }

    /// Box of the whole scene.
    pub fn bounds(&self) -> BoundingBox<D> {
        self.bounds
    }

    /// Read-only view of the root node.
    pub fn root(&self) -> NodeRef<'_, D> {
        NodeRef {
            nodes: &self.nodes,
            index: ROOT,
        }
    }

    /// Traverses the tree once per predicate and reports every match to `callback`.
    ///
    /// Predicates are processed in parallel, one lane each, in an unspecified order.
    /// Returns once all predicates are done.
    pub fn query<Ps, C>(
        &self,
        space: &ExecutionSpace,
        predicates: &Ps,
        callback: &C,
        policy: &TraversalPolicy,
    ) where
        Ps: Predicates<D> + ?Sized,
        C: QueryCallback,
    {
        let n = predicates.len();
        if n == 0 {
            return;
        }
        space.install(|| {
            let sort = policy.sort_predicates && n > 1;
            let order = sort.then(|| predicate_order(predicates, &self.bounds));
            (0..n).into_par_iter().for_each_init(
                || (Vec::with_capacity(64), C::Scratch::default()),
                |(stack, scratch), k| {
                    let p = order.as_ref().map_or(k, |order| order[k]);
                    let predicate = predicates.get(p);
                    callback.begin(p, scratch);
                    traverse(&self.nodes, &predicate, stack, |primitive| {
                        callback.on_match(p, primitive, scratch)
                    });
                    callback.end(p, scratch);
                },
            );
        });
    }

    /// Number of matches of each predicate.
    pub fn count<Ps>(
        &self,
        space: &ExecutionSpace,
        predicates: &Ps,
        policy: &TraversalPolicy,
    ) -> Vec<usize>
    where
        Ps: Predicates<D> + ?Sized,
    {
        let counts: Vec<AtomicUsize> = (0..predicates.len()).map(|_| AtomicUsize::new(0)).collect();
        self.query(
            space,
            predicates,
            &|p: usize, _: usize| {
                counts[p].fetch_add(1, Ordering::Relaxed);
            },
            policy,
        );
        counts.into_iter().map(AtomicUsize::into_inner).collect()
    }

    /// All matches of every predicate, grouped by predicate and sorted by primitive index.
    pub fn query_collect<Ps>(&self, space: &ExecutionSpace, predicates: &Ps) -> QueryResults
    where
        Ps: Predicates<D> + ?Sized,
    {
        let per_predicate: Vec<Vec<usize>> = space.install(|| {
            (0..predicates.len())
                .into_par_iter()
                .map_init(Vec::new, |stack, p| {
                    let mut hits = Vec::new();
                    traverse(&self.nodes, &predicates.get(p), stack, |primitive| {
                        hits.push(primitive)
                    });
                    hits.sort_unstable();
                    hits
                })
                .collect()
        });

        let mut offsets = Vec::with_capacity(per_predicate.len() + 1);
        let mut total = 0;
        offsets.push(total);
        for hits in &per_predicate {
            total += hits.len();
            offsets.push(total);
        }
        let indices = per_predicate.into_iter().flatten().collect();
        QueryResults { offsets, indices }
    }
}

/// Borrowed view of one node of a [`BoundingVolumeHierarchy`].
#[derive(Clone, Copy, Debug)]
pub struct NodeRef<'a, const D: usize> {
    nodes: &'a [Node<D>],
    index: usize,
}

impl<'a, const D: usize> NodeRef<'a, D> {
    pub fn bounds(&self) -> BoundingBox<D> {
        self.nodes[self.index].bounds
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.nodes[self.index].kind, NodeKind::Leaf { .. })
    }

    /// Primitive index held by a leaf.
    pub fn primitive(&self) -> Option<usize> {
        match self.nodes[self.index].kind {
            NodeKind::Leaf { primitive } => Some(primitive),
            NodeKind::Internal { .. } => None,
        }
    }

    /// Left and right child of an internal node.
    pub fn children(&self) -> Option<(NodeRef<'a, D>, NodeRef<'a, D>)> {
        match self.nodes[self.index].kind {
            NodeKind::Internal { left, right } => Some((
                NodeRef { nodes: self.nodes, index: left },
                NodeRef { nodes: self.nodes, index: right },
            )),
            NodeKind::Leaf { .. } => None,
        }
    }
}

/// Matches of a batch of predicates in compressed form.
///
/// The matches of predicate `i` are `indices[offsets[i]..offsets[i + 1]]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryResults {
    pub offsets: Vec<usize>,
    pub indices: Vec<usize>,
}

impl QueryResults {
    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn matches(&self, predicate: usize) -> &[usize] {
        &self.indices[self.offsets[predicate]..self.offsets[predicate + 1]]
    }
}
