//! Linear BVH construction: Morton sort, binary radix tree, bottom-up bounds.
//!
//! Nodes live in one arena of `2 * n - 1` entries. The first `n - 1` are internal
//! nodes (root at 0), followed by the `n` leaves in Morton order. With a single
//! primitive there are no internal nodes and the root is that leaf.

use super::morton::morton_code;
use super::{Node, NodeKind, ROOT};
use crate::bounds::BoundingBox;
use crate::error::{Error, Result, try_with_capacity};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

const NO_PARENT: usize = usize::MAX;

/// Builds the node arena over `boxes` (one per primitive, indexed by primitive).
///
/// Must be called inside the execution space. Returns the arena and the scene box.
pub(crate) fn build<const D: usize>(
    boxes: &[BoundingBox<D>],
) -> Result<(Vec<Node<D>>, BoundingBox<D>)> {
    let n = boxes.len();
    if n == 0 {
        return Err(Error::EmptyPrimitives);
    }
    if let Some(index) = boxes.par_iter().position_first(|b| !b.is_finite()) {
        return Err(Error::NonFiniteCoordinate { index });
    }

    let scene = scene_bounds(boxes);

    let mut keys = try_with_capacity::<(u64, usize)>("morton codes", n)?;
    keys.par_extend(
        boxes
            .par_iter()
            .enumerate()
            .map(|(i, b)| (morton_code(&b.centroid(), &scene), i)),
    );
    // (code, index) pairs are unique, so the unstable sort is deterministic.
    keys.par_sort_unstable();

    let codes: Vec<u64> = keys.par_iter().map(|&(code, _)| code).collect();
    let num_internal = n - 1;

    let mut children = try_with_capacity::<(usize, usize)>("internal nodes", num_internal)?;
    children.par_extend((0..num_internal).into_par_iter().map(|i| split_node(&codes, i)));

    let mut parents = try_with_capacity::<AtomicUsize>("parent links", 2 * n - 1)?;
    parents.extend((0..2 * n - 1).map(|_| AtomicUsize::new(NO_PARENT)));
    children.par_iter().enumerate().for_each(|(i, &(left, right))| {
        parents[left].store(i, Ordering::Relaxed);
        parents[right].store(i, Ordering::Relaxed);
    });
    let parents: Vec<usize> = parents.into_par_iter().map(AtomicUsize::into_inner).collect();

    let internal_bounds = propagate_bounds(boxes, &keys, &children, &parents)?;

    let mut nodes = try_with_capacity::<Node<D>>("tree nodes", 2 * n - 1)?;
    nodes.par_extend(
        children
            .par_iter()
            .zip(internal_bounds.par_iter())
            .map(|(&(left, right), bounds)| Node {
                bounds: bounds.load(),
                kind: NodeKind::Internal { left, right },
            }),
    );
    nodes.par_extend(keys.par_iter().map(|&(_, primitive)| Node {
        bounds: boxes[primitive],
        kind: NodeKind::Leaf { primitive },
    }));

    debug_assert_eq!(nodes.len(), 2 * n - 1);
    debug_assert!(nodes[ROOT].bounds.contains(&scene) && scene.contains(&nodes[ROOT].bounds));
    Ok((nodes, scene))
}

fn scene_bounds<const D: usize>(boxes: &[BoundingBox<D>]) -> BoundingBox<D> {
    boxes
        .par_iter()
        .fold(BoundingBox::empty, |mut acc, b| {
            acc.expand(b);
            acc
        })
        .reduce(BoundingBox::empty, |a, b| a.union(&b))
}

/// Length of the common prefix of sorted keys `i` and `j`, or -1 when `j` is out of range.
///
/// Equal codes are told apart by their positions, which makes every key unique.
#[inline]
fn delta(codes: &[u64], i: usize, j: isize) -> i32 {
    if j < 0 || j as usize >= codes.len() {
        return -1;
    }
    let j = j as usize;
    let (a, b) = (codes[i], codes[j]);
    if a != b {
        (a ^ b).leading_zeros() as i32
    } else {
        64 + ((i as u64) ^ (j as u64)).leading_zeros() as i32
    }
}

/// Children of internal node `i` in the arena, found from the keys alone.
///
/// Node `i` covers the sorted range starting (or ending) at `i` whose keys share a
/// longer prefix than `i` shares with its neighbour on the other side; the split
/// is where that prefix grows by one bit.
fn split_node(codes: &[u64], i: usize) -> (usize, usize) {
    let num_internal = codes.len() - 1;
    let ii = i as isize;

    let d: isize = if delta(codes, i, ii + 1) > delta(codes, i, ii - 1) { 1 } else { -1 };
    let delta_min = delta(codes, i, ii - d);

    let mut l_max: isize = 2;
    while delta(codes, i, ii + l_max * d) > delta_min {
        l_max *= 2;
    }
    let mut l: isize = 0;
    let mut t = l_max / 2;
    while t >= 1 {
        if delta(codes, i, ii + (l + t) * d) > delta_min {
            l += t;
        }
        t /= 2;
    }
    let j = ii + l * d;

    let delta_node = delta(codes, i, j);
    let mut s: isize = 0;
    let mut step = l;
    loop {
        step = (step + 1) / 2;
        if delta(codes, i, ii + (s + step) * d) > delta_node {
            s += step;
        }
        if step <= 1 {
            break;
        }
    }
    let gamma = (ii + s * d + d.min(0)) as usize;

    let first = ii.min(j) as usize;
    let last = ii.max(j) as usize;
    let left = if first == gamma { num_internal + gamma } else { gamma };
    let right = if last == gamma + 1 { num_internal + gamma + 1 } else { gamma + 1 };
    (left, right)
}

/// Box stored as raw `f64` bits so lanes can publish it without locks.
struct AtomicBox<const D: usize> {
    min: [AtomicU64; D],
    max: [AtomicU64; D],
}

impl<const D: usize> AtomicBox<D> {
    fn new() -> Self {
        Self {
            min: std::array::from_fn(|_| AtomicU64::new(f64::INFINITY.to_bits())),
            max: std::array::from_fn(|_| AtomicU64::new(f64::NEG_INFINITY.to_bits())),
        }
    }

    fn store(&self, b: &BoundingBox<D>) {
        for axis in 0..D {
            self.min[axis].store(b.min[axis].to_bits(), Ordering::Relaxed);
            self.max[axis].store(b.max[axis].to_bits(), Ordering::Relaxed);
        }
    }

    fn load(&self) -> BoundingBox<D> {
        BoundingBox::new(
            std::array::from_fn(|axis| f64::from_bits(self.min[axis].load(Ordering::Relaxed))),
            std::array::from_fn(|axis| f64::from_bits(self.max[axis].load(Ordering::Relaxed))),
        )
    }
}

/// Computes every internal box exactly once, from the leaves up.
///
/// One lane per leaf climbs towards the root. At each internal node the first
/// arriving lane stops; the second one, which now knows both children are final,
/// writes the union and keeps climbing. The acquire-release counter orders the
/// child box writes before the parent's read of them.
fn propagate_bounds<const D: usize>(
    boxes: &[BoundingBox<D>],
    keys: &[(u64, usize)],
    children: &[(usize, usize)],
    parents: &[usize],
) -> Result<Vec<AtomicBox<D>>> {
    let num_internal = children.len();
    let mut internal = try_with_capacity::<AtomicBox<D>>("internal bounds", num_internal)?;
    internal.extend((0..num_internal).map(|_| AtomicBox::new()));
    let mut visits = try_with_capacity::<AtomicU8>("visit counters", num_internal)?;
    visits.extend((0..num_internal).map(|_| AtomicU8::new(0)));

    let node_bounds = |node: usize| -> BoundingBox<D> {
        if node < num_internal {
            internal[node].load()
        } else {
            boxes[keys[node - num_internal].1]
        }
    };

    (0..keys.len()).into_par_iter().for_each(|leaf| {
        let mut node = num_internal + leaf;
        loop {
            let parent = parents[node];
            if parent == NO_PARENT {
                return;
            }
            if visits[parent].fetch_add(1, Ordering::AcqRel) == 0 {
                return;
            }
            let (left, right) = children[parent];
            let merged = node_bounds(left).union(&node_bounds(right));
            internal[parent].store(&merged);
            node = parent;
        }
    });

    debug_assert!(visits.iter().all(|v| v.load(Ordering::Relaxed) == 2));
    Ok(internal)
}
