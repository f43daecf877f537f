use bvhscan::{
    BoundingBox, CorePointsStrategy, Error, ExecutionSpace, Implementation, NOISE, Parameters,
    Point, PrimitiveStore, TraversalPolicy, dbscan, sort_and_filter_clusters, verify_clusters,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};

/// Clusters as a set of sets, independent of label values.
fn partition(labels: &[i32]) -> BTreeSet<BTreeSet<usize>> {
    let mut groups: BTreeMap<i32, BTreeSet<usize>> = BTreeMap::new();
    for (i, &l) in labels.iter().enumerate() {
        if l != NOISE {
            groups.entry(l).or_default().insert(i);
        }
    }
    groups.into_values().collect()
}

/// Same neighbour counts as the clustering itself, computed by brute force.
fn core_points(points: &PrimitiveStore<Point<2>>, eps: f64, min_pts: usize) -> Vec<bool> {
    let coords: Vec<[f64; 2]> = points.iter().map(|p| p.coords()).collect();
    coords
        .iter()
        .map(|a| {
            coords
                .iter()
                .filter(|b| {
                    let (dx, dy) = (a[0] - b[0], a[1] - b[1]);
                    dx * dx + dy * dy <= eps * eps
                })
                .count()
                >= min_pts
        })
        .collect()
}

/// Partition restricted to core points, which is unique for a given input.
fn core_partition(labels: &[i32], core: &[bool]) -> BTreeSet<BTreeSet<usize>> {
    let core_labels: Vec<i32> = labels
        .iter()
        .zip(core)
        .map(|(&l, &c)| if c { l } else { NOISE })
        .collect();
    partition(&core_labels)
}

fn blobs(seed: u64, size: usize) -> PrimitiveStore<Point<2>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let centres: Vec<[f32; 2]> =
        (0..6).map(|_| [rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0)]).collect();
    let points = (0..size)
        .map(|i| {
            if i % 5 == 0 {
                Point([rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0)])
            } else {
                let c = centres[i % centres.len()];
                Point([c[0] + rng.gen_range(-1.0..1.0), c[1] + rng.gen_range(-1.0..1.0)])
            }
        })
        .collect();
    PrimitiveStore::new(points)
}

fn all_parameters() -> Vec<Parameters> {
    let mut all = Vec::new();
    let strategies =
        [CorePointsStrategy::Auto, CorePointsStrategy::Eager, CorePointsStrategy::Fused];
    for implementation in [Implementation::Fdbscan, Implementation::FdbscanDenseBox] {
        for core_points in strategies {
            for sort in [true, false] {
                all.push(
                    Parameters::new()
                        .with_implementation(implementation)
                        .with_core_points(core_points)
                        .with_policy(TraversalPolicy::default().with_sort_predicates(sort)),
                );
            }
        }
    }
    all
}

#[test]
fn test_two_close_points_and_one_far() {
    let space = ExecutionSpace::new(2).unwrap();
    let points = PrimitiveStore::<Point<2>>::from_flat(&[0.0, 0.0, 0.0, 0.5, 0.0, 10.0]).unwrap();
    for parameters in all_parameters() {
        let labels = dbscan(&space, &points, 1.0, 2, &parameters).unwrap();
        assert_eq!(labels[0], labels[1], "{parameters:?}");
        assert_ne!(labels[0], NOISE);
        assert_eq!(labels[2], NOISE);
    }
}

#[test]
fn test_unit_cube_is_one_cluster() {
    let space = ExecutionSpace::new(4).unwrap();
    let bounds = BoundingBox::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
    let points = PrimitiveStore::random_with(&mut StdRng::seed_from_u64(1), 100, &bounds);
    for parameters in all_parameters() {
        let labels = dbscan(&space, &points, 2.0, 1, &parameters).unwrap();
        assert!(labels.iter().all(|&l| l == 0), "{parameters:?}");
    }
}

#[test]
fn test_min_pts_one_has_no_noise() {
    let space = ExecutionSpace::new(2).unwrap();
    let points = blobs(2, 500);
    let labels = dbscan(&space, &points, 0.05, 1, &Parameters::default()).unwrap();
    assert!(labels.iter().all(|&l| l != NOISE));
    // Every primitive labels with the smallest index of its cluster.
    for (i, &l) in labels.iter().enumerate() {
        assert!(l as usize <= i);
        assert_eq!(labels[l as usize], l);
    }
}

#[test]
fn test_isolated_points_are_noise() {
    let space = ExecutionSpace::new(2).unwrap();
    let points = PrimitiveStore::new((0..50).map(|i| Point([i as f32 * 3.0, 0.0])).collect());
    for min_pts in [2, 3, 5] {
        let labels = dbscan(&space, &points, 1.0, min_pts, &Parameters::default()).unwrap();
        assert!(labels.iter().all(|&l| l == NOISE));
    }
}

#[test]
fn test_clustering_is_idempotent() {
    let space = ExecutionSpace::new(4).unwrap();
    let points = blobs(3, 3000);
    for parameters in all_parameters() {
        let first = dbscan(&space, &points, 0.3, 5, &parameters).unwrap();
        let second = dbscan(&space, &points, 0.3, 5, &parameters).unwrap();
        let core = core_points(&points, 0.3, 5);
        assert_eq!(core_partition(&first, &core), core_partition(&second, &core));
        let noise_first: Vec<bool> = first.iter().map(|&l| l == NOISE).collect();
        let noise_second: Vec<bool> = second.iter().map(|&l| l == NOISE).collect();
        assert_eq!(noise_first, noise_second);
    }
}

#[test]
fn test_connected_components_are_deterministic() {
    let space = ExecutionSpace::new(4).unwrap();
    let points = blobs(4, 2000);
    let reference = dbscan(&space, &points, 0.2, 2, &Parameters::default()).unwrap();
    for _ in 0..3 {
        assert_eq!(dbscan(&space, &points, 0.2, 2, &Parameters::default()).unwrap(), reference);
    }
}

#[test]
fn test_strategies_agree_on_core_partition() {
    let space = ExecutionSpace::new(4).unwrap();
    let points = blobs(5, 4000);
    for (eps, min_pts) in [(0.1, 2), (0.25, 4), (0.4, 10)] {
        let core = core_points(&points, eps, min_pts);
        let reference = dbscan(
            &space,
            &points,
            eps,
            min_pts,
            &Parameters::new()
                .with_implementation(Implementation::Fdbscan)
                .with_core_points(CorePointsStrategy::Eager),
        )
        .unwrap();
        let expected = core_partition(&reference, &core);
        for parameters in all_parameters() {
            let labels = dbscan(&space, &points, eps, min_pts, &parameters).unwrap();
            assert_eq!(
                core_partition(&labels, &core),
                expected,
                "eps {eps} min_pts {min_pts} {parameters:?}"
            );
            for (i, &l) in labels.iter().enumerate() {
                if core[i] {
                    assert_ne!(l, NOISE);
                }
            }
        }
    }
}

#[test]
fn test_verification_accepts_produced_labels() {
    let space = ExecutionSpace::new(4).unwrap();
    let points = blobs(6, 2500);
    for (eps, min_pts) in [(0.15, 1), (0.15, 2), (0.3, 6)] {
        for parameters in all_parameters() {
            let labels = dbscan(&space, &points, eps, min_pts, &parameters).unwrap();
            assert!(
                verify_clusters(&space, &points, eps, min_pts, &labels).unwrap(),
                "eps {eps} min_pts {min_pts} {parameters:?}"
            );
        }
    }
}

#[test]
fn test_verification_rejects_corrupted_labels() {
    let space = ExecutionSpace::new(2).unwrap();
    let points = PrimitiveStore::<Point<2>>::from_flat(&[
        0.0, 0.0, 0.0, 0.5, 0.0, 1.0, 5.0, 5.0, 5.0, 5.5, 9.0, 9.0,
    ])
    .unwrap();
    let labels = dbscan(&space, &points, 0.6, 2, &Parameters::default()).unwrap();
    assert_eq!(labels, vec![0, 0, 0, 3, 3, NOISE]);
    assert!(verify_clusters(&space, &points, 0.6, 2, &labels).unwrap());

    // A core point marked as noise.
    assert!(!verify_clusters(&space, &points, 0.6, 2, &[0, NOISE, 0, 3, 3, NOISE]).unwrap());
    // Adjacent core points split.
    assert!(!verify_clusters(&space, &points, 0.6, 2, &[0, 0, 2, 3, 3, NOISE]).unwrap());
    // Two separate groups merged under one label.
    assert!(!verify_clusters(&space, &points, 0.6, 2, &[0, 0, 0, 0, 0, NOISE]).unwrap());
    // An isolated point given a cluster.
    assert!(!verify_clusters(&space, &points, 0.6, 2, &[0, 0, 0, 3, 3, 5]).unwrap());
    // Out of range labels and wrong lengths.
    assert!(!verify_clusters(&space, &points, 0.6, 2, &[0, 0, 0, 3, 3, 42]).unwrap());
    assert!(!verify_clusters(&space, &points, 0.6, 2, &[0, 0, 0]).unwrap());
}

#[test]
fn test_border_points_join_one_cluster() {
    // Two dense groups bridged by a single point that is not core itself.
    let space = ExecutionSpace::new(4).unwrap();
    let mut flat = Vec::new();
    for i in 0..5 {
        flat.extend_from_slice(&[0.0, i as f32 * 0.1]);
        flat.extend_from_slice(&[0.0, 2.0 + i as f32 * 0.1]);
    }
    flat.extend_from_slice(&[0.0, 1.2]);
    let points = PrimitiveStore::<Point<2>>::from_flat(&flat).unwrap();
    let bridge = points.len() - 1;
    for parameters in all_parameters() {
        let labels = dbscan(&space, &points, 0.81, 4, &parameters).unwrap();
        let clusters = partition(&labels);
        assert_eq!(clusters.len(), 2, "{parameters:?}");
        assert_ne!(labels[bridge], NOISE);
        assert!(verify_clusters(&space, &points, 0.81, 4, &labels).unwrap());
    }
}

#[test]
fn test_filtered_clusters() {
    let space = ExecutionSpace::new(4).unwrap();
    let points = blobs(7, 2000);
    let labels = dbscan(&space, &points, 0.2, 4, &Parameters::default()).unwrap();

    let all = sort_and_filter_clusters(&space, &labels, 1).unwrap();
    assert_eq!(all.len(), partition(&labels).len());
    assert_eq!(all.num_points(), labels.iter().filter(|&&l| l != NOISE).count());

    let large = sort_and_filter_clusters(&space, &labels, 50).unwrap();
    assert!(large.len() <= all.len());
    for cluster in large.iter() {
        assert!(cluster.len() >= 50);
        assert!(cluster.windows(2).all(|w| w[0] < w[1]));
        let label = labels[cluster[0]];
        assert!(cluster.iter().all(|&i| labels[i] == label));
    }
}

#[test]
fn test_invalid_inputs() {
    let space = ExecutionSpace::new(1).unwrap();
    let points = PrimitiveStore::new(vec![Point([0.0f32, 0.0])]);
    let empty = PrimitiveStore::<Point<2>>::new(Vec::new());
    let parameters = Parameters::default();

    assert!(matches!(
        dbscan(&space, &points, 1.0, 0, &parameters),
        Err(Error::InvalidMinPts { got: 0 })
    ));
    assert!(matches!(
        dbscan(&space, &points, -1.0, 2, &parameters),
        Err(Error::InvalidRadius { .. })
    ));
    assert!(matches!(
        dbscan(&space, &points, f64::NAN, 2, &parameters),
        Err(Error::InvalidRadius { .. })
    ));
    assert!(matches!(dbscan(&space, &empty, 1.0, 2, &parameters), Err(Error::EmptyPrimitives)));
    assert!(matches!(
        dbscan(&space, &points, 1.0, 3, &parameters.with_core_points(CorePointsStrategy::Ccs)),
        Err(Error::UnsupportedCorePoints { min_pts: 3 })
    ));
    assert!(matches!(
        PrimitiveStore::<Point<2>>::from_flat(&[0.0, 1.0, 2.0]),
        Err(Error::MisalignedCoordinates { len: 3, dim: 2 })
    ));
}

#[test]
fn test_zero_eps_clusters_duplicates() {
    let space = ExecutionSpace::new(2).unwrap();
    let points =
        PrimitiveStore::<Point<2>>::from_flat(&[1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
    for parameters in all_parameters() {
        let labels = dbscan(&space, &points, 0.0, 3, &parameters).unwrap();
        assert_eq!(labels, vec![0, NOISE, 0, 0], "{parameters:?}");
    }
}

#[test]
fn test_tiny_eps_on_a_large_scene() {
    // A grid of eps-sized cells over this scene has more cells than an i64 can count.
    let space = ExecutionSpace::new(2).unwrap();
    let points =
        PrimitiveStore::<Point<2>>::from_flat(&[0.0, 0.0, 1e7, 0.0, 2e7, 0.0, 2e7, 0.0]).unwrap();
    for parameters in all_parameters() {
        let labels = dbscan(&space, &points, 1e-12, 2, &parameters).unwrap();
        assert_eq!(labels, vec![NOISE, NOISE, 2, 2], "{parameters:?}");
        assert!(verify_clusters(&space, &points, 1e-12, 2, &labels).unwrap());
    }
}
