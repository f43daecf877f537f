//! Density-based clustering on top of the bounding volume hierarchy.
//!
//! Every primitive issues one sphere query of radius `eps`. Each match event is fed
//! to a clustering callback that merges the clusters of core points in a lock-free
//! disjoint-set forest; a final pass turns the forest into labels.

mod callback;
mod core_points;
mod dense_box;
mod labels;
mod union_find;
mod verify;

pub use core_points::{CcsCorePoints, CorePoints, EagerCorePoints, FusedCorePoints};
pub use labels::{Clusters, NOISE, sort_and_filter_clusters};
pub use union_find::UnionFind;
pub use verify::verify_clusters;

use crate::bvh::BoundingVolumeHierarchy;
use crate::error::{Error, Result, validate_radius};
use crate::execution::{ExecutionSpace, TraversalPolicy};
use crate::predicates::PrimitivesWithRadius;
use crate::primitives::{Point, PrimitiveStore};
use callback::{BorderClaims, ClusterMerger, FdbscanCallback, FusedFdbscanCallback};
use dense_box::DenseBoxes;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Clustering algorithm variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Implementation {
    /// One sphere query per primitive, nothing else.
    Fdbscan,
    /// Points of crowded grid cells are declared core and merged before the queries.
    #[default]
    FdbscanDenseBox,
}

/// How core points are determined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CorePointsStrategy {
    /// `Ccs` for `min_pts <= 2`, `Eager` otherwise.
    #[default]
    Auto,
    /// Connected components; only valid for `min_pts <= 2`.
    Ccs,
    /// A counting pass over all primitives before clustering.
    Eager,
    /// Counting and clustering in a single pass.
    Fused,
}

impl CorePointsStrategy {
    /// The concrete strategy used for `min_pts`.
    pub fn resolve(self, min_pts: usize) -> Result<Self> {
        match self {
            Self::Auto if min_pts <= 2 => Ok(Self::Ccs),
            Self::Auto => Ok(Self::Eager),
            Self::Ccs if min_pts > 2 => Err(Error::UnsupportedCorePoints { min_pts }),
            other => Ok(other),
        }
    }
}

/// Settings of [`dbscan`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Parameters {
    pub implementation: Implementation,
    pub core_points: CorePointsStrategy,
    /// Log stage timings at `info` level instead of `debug`.
    pub print_timers: bool,
    pub policy: TraversalPolicy,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_implementation(mut self, implementation: Implementation) -> Self {
        self.implementation = implementation;
        self
    }

    pub fn with_core_points(mut self, core_points: CorePointsStrategy) -> Self {
        self.core_points = core_points;
        self
    }

    pub fn with_print_timers(mut self, print_timers: bool) -> Self {
        self.print_timers = print_timers;
        self
    }

    pub fn with_policy(mut self, policy: TraversalPolicy) -> Self {
        self.policy = policy;
        self
    }
}

struct StageTimer {
    print: bool,
    start: Instant,
    last: Instant,
}

impl StageTimer {
    fn new(print: bool) -> Self {
        let now = Instant::now();
        Self {
            print,
            start: now,
            last: now,
        }
    }

    fn stage(&mut self, name: &'static str) {
        let now = Instant::now();
        self.report(name, now - self.last);
        self.last = now;
    }

    fn finish(self) {
        self.report("total", self.start.elapsed());
    }

    fn report(&self, stage: &'static str, elapsed: Duration) {
        if self.print {
            info!(stage, ?elapsed, "dbscan timer");
        } else {
            debug!(stage, ?elapsed, "dbscan timer");
        }
    }
}

/// Clusters `primitives` and returns one label per primitive.
///
/// Primitives within `eps` of each other are neighbours; a primitive with at least
/// `min_pts` neighbours, itself included, is core. Each cluster is labelled by the
/// smallest index of its core points and border points, everything else is
/// [`NOISE`]. The partition is deterministic for core points; a border point next to
/// several clusters joins one of them.
pub fn dbscan<const D: usize>(
    space: &ExecutionSpace,
    primitives: &PrimitiveStore<Point<D>>,
    eps: f64,
    min_pts: usize,
    parameters: &Parameters,
) -> Result<Vec<i32>> {
    if min_pts < 1 {
        return Err(Error::InvalidMinPts { got: min_pts });
    }
    validate_radius(eps)?;
    let n = primitives.len();
    if n == 0 {
        return Err(Error::EmptyPrimitives);
    }
    if n > i32::MAX as usize {
        return Err(Error::TooManyPrimitives { count: n });
    }
    let strategy = parameters.core_points.resolve(min_pts)?;
    debug!(
        primitives = n,
        eps,
        min_pts,
        ?strategy,
        implementation = ?parameters.implementation,
        "dbscan"
    );

    let mut timer = StageTimer::new(parameters.print_timers);
    let bvh = BoundingVolumeHierarchy::new(space, primitives)?;
    timer.stage("construction");

    let predicates = PrimitivesWithRadius::new(primitives, eps)?;
    let forest = UnionFind::new(n)?;
    let claims = BorderClaims::new(n)?;

    let scene = bvh.bounds();
    let use_dense = parameters.implementation == Implementation::FdbscanDenseBox
        && eps > 0.0
        && dense_box::grid_fits(&scene, eps);
    if parameters.implementation == Implementation::FdbscanDenseBox && !use_dense {
        debug!(eps, "no dense boxes, clustering with sphere queries only");
    }
    let dense = if use_dense {
        let dense = space.install(|| -> Result<DenseBoxes> {
            let dense = DenseBoxes::build(primitives, &scene, eps, min_pts)?;
            dense.merge_into(&forest);
            Ok(dense)
        })?;
        debug!(boxes = dense.num_boxes(), points = dense.num_dense_points(), "dense boxes");
        timer.stage("dense_boxes");
        Some(dense)
    } else {
        None
    };
    let merger = ClusterMerger::new(&forest, &claims, dense.as_ref());

    let labels = match strategy {
        CorePointsStrategy::Eager => {
            let counts = bvh.count(space, &predicates, &parameters.policy);
            let core = EagerCorePoints::new(counts, min_pts);
            debug!(core = core.num_core(), "core points");
            timer.stage("neighbors");
            let callback = FdbscanCallback::new(&core, merger);
            bvh.query(space, &predicates, &callback, &parameters.policy);
            timer.stage("clusters");
            space.install(|| {
                labels::label_members(&forest, |i| core.is_core(i) || claims.is_claimed(i))
            })
        }
        CorePointsStrategy::Fused => {
            let core = FusedCorePoints::new(n)?;
            if let Some(dense) = &dense {
                space.install(|| dense.mark_core(&core));
            }
            let callback = FusedFdbscanCallback::new(&core, merger, min_pts);
            bvh.query(space, &predicates, &callback, &parameters.policy);
            debug!(core = core.num_core(), "core points");
            timer.stage("clusters");
            space.install(|| {
                labels::label_members(&forest, |i| core.is_core(i) || claims.is_claimed(i))
            })
        }
        _ => {
            let callback = FdbscanCallback::new(&CcsCorePoints, merger);
            bvh.query(space, &predicates, &callback, &parameters.policy);
            timer.stage("clusters");
            space.install(|| labels::label_components(&forest, min_pts))
        }
    };
    timer.stage("labels");
    timer.finish();
    Ok(labels)
}
