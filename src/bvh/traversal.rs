use super::morton::morton_code;
use super::{Node, NodeKind, ROOT};
use crate::bounds::BoundingBox;
use crate::predicates::{Predicate, Predicates};
use rayon::prelude::*;

/// Receives the matches of a query, one lane per predicate.
///
/// Every lane owns a `Scratch` value that is reset to its default only when a
/// worker thread starts, so implementations must clear what they need in
/// [`QueryCallback::begin`]. Lanes run concurrently and in no particular order;
/// any state shared between lanes has to be atomic.
pub trait QueryCallback: Sync {
    type Scratch: Default + Send;

    /// Called before predicate `predicate` starts its traversal.
    fn begin(&self, _predicate: usize, _scratch: &mut Self::Scratch) {}

    /// Called for every primitive that satisfies predicate `predicate`.
    fn on_match(&self, predicate: usize, primitive: usize, scratch: &mut Self::Scratch);

    /// Called once predicate `predicate` has visited the whole tree.
    fn end(&self, _predicate: usize, _scratch: &mut Self::Scratch) {}
}

impl<F> QueryCallback for F
where
    F: Fn(usize, usize) + Sync,
{
    type Scratch = ();

    #[inline]
    fn on_match(&self, predicate: usize, primitive: usize, _scratch: &mut ()) {
        self(predicate, primitive)
    }
}

/// Visits every leaf satisfying `predicate`, using `stack` as the explicit work list.
///
/// Internal nodes failing the broad phase are pruned together with their subtree.
#[inline]
pub(crate) fn traverse<const D: usize, Pr, F>(
    nodes: &[Node<D>],
    predicate: &Pr,
    stack: &mut Vec<usize>,
    mut on_leaf: F,
) where
    Pr: Predicate<D>,
    F: FnMut(usize),
{
    stack.clear();
    stack.push(ROOT);
    while let Some(index) = stack.pop() {
        let node = &nodes[index];
        match node.kind {
            NodeKind::Leaf { primitive } => {
                if predicate.matches(&node.bounds) {
                    on_leaf(primitive);
                }
            }
            NodeKind::Internal { left, right } => {
                if predicate.overlaps(&node.bounds) {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }
}

/// Order in which lanes pick up predicates: along the Morton curve of their boxes.
pub(crate) fn predicate_order<const D: usize, Ps>(
    predicates: &Ps,
    scene: &BoundingBox<D>,
) -> Vec<usize>
where
    Ps: Predicates<D> + ?Sized,
{
    let mut keys: Vec<(u64, usize)> = (0..predicates.len())
        .into_par_iter()
        .map(|i| {
            let centre = predicates.get(i).bounding_box().centroid();
            (morton_code(&centre, scene), i)
        })
        .collect();
    keys.par_sort_unstable();
    keys.into_par_iter().map(|(_, i)| i).collect()
}
