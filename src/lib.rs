//! # bvhscan
//!
//! `bvhscan` is a Rust library for spatial queries over large point sets and for
//! density-based clustering on top of them. Every bulk stage runs as a data-parallel
//! loop on a [`rayon`] thread pool wrapped in an [`ExecutionSpace`].
//!
//! ## Features
//!
//! - **Linear BVH**: Morton codes, a parallel sort and a Karras binary radix tree, with
//!   bounds filled bottom-up.
//! - **Batched queries**: one traversal lane per predicate, matches streamed to a
//!   [`QueryCallback`].
//! - **FDBSCAN**: clusters merged during the neighbour queries in a lock-free [`UnionFind`].
//! - **Core-point strategies**: connected components, an eager counting pass, or counting
//!   fused into the clustering pass.
//! - **Dense boxes**: crowded grid cells are clustered before any query is issued.
//!
//! ## Example
//!
//! ```
//! use bvhscan::{ExecutionSpace, NOISE, Parameters, Point, PrimitiveStore, dbscan};
//!
//! let space = ExecutionSpace::new(2).unwrap();
//! let points =
//!     PrimitiveStore::new(vec![Point([0.0f32, 0.0]), Point([0.0, 0.5]), Point([0.0, 10.0])]);
//! let labels = dbscan(&space, &points, 1.0, 2, &Parameters::default()).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_eq!(labels[2], NOISE);
//! ```
//!
//! ## Main Interface
//!
//! The primary entry points are [`BoundingVolumeHierarchy`] for queries and [`dbscan`] for
//! clustering.

mod bounds;
pub mod bvh;
pub mod dbscan;
mod error;
mod execution;
pub mod predicates;
mod primitives;

pub use bounds::BoundingBox;
pub use bvh::{BoundingVolumeHierarchy, NodeRef, QueryCallback, QueryResults};
pub use dbscan::{
    Clusters, CorePointsStrategy, Implementation, NOISE, Parameters, UnionFind, dbscan,
    sort_and_filter_clusters, verify_clusters,
};
pub use error::{Error, Result};
pub use execution::{ExecutionSpace, TraversalPolicy};
pub use predicates::{Intersects, Predicate, Predicates, PrimitivesWithRadius, Sphere};
pub use primitives::{Point, Primitive, PrimitiveStore};
