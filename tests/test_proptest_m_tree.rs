//! Property-based tests for the M-Tree.

use mtree::geometry::{DistanceMetric, EuclideanDistance, Point};
use mtree::heuristics::SplitPolicy;
use mtree::m_tree::MTree;
use proptest::prelude::*;
use std::collections::HashSet;

prop_compose! {
    fn arb_point_3d()(x in -100.0..100.0, y in -100.0..100.0, z in -100.0..100.0) -> (f64, f64, f64) {
        (x, y, z)
    }
}

fn arb_policy() -> impl Strategy<Value = SplitPolicy> {
    prop_oneof![
        Just(SplitPolicy::Random),
        Just(SplitPolicy::Perfect),
        Just(SplitPolicy::Smart),
    ]
}

fn points_from_coords(coords: &[(f64, f64, f64)]) -> Vec<Point<i32>> {
    coords
        .iter()
        .enumerate()
        .map(|(idx, (x, y, z))| Point::new(&[*x, *y, *z], Some(idx as i32)))
        .collect()
}

/// The points the tree should hold: input order, first occurrence wins.
fn dedup(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let mut seen = HashSet::new();
    points
        .iter()
        .filter(|p| seen.insert((*p).clone()))
        .cloned()
        .collect()
}

fn build_tree(points: &[Point<i32>], policy: SplitPolicy) -> MTree<Point<i32>> {
    let mut tree = MTree::with_split_policy(4, policy).unwrap();
    for point in points {
        tree.insert(point.clone()).unwrap();
    }
    tree
}

proptest! {
    #[test]
    fn test_knn_finds_inserted_point(
        coords in prop::collection::vec(arb_point_3d(), 1..40),
        policy in arb_policy()
    ) {
        let points = points_from_coords(&coords);
        let tree = build_tree(&points, policy);

        for point in &points {
            let results = tree.knn_query(point, 1).unwrap();
            prop_assert_eq!(results.len(), 1);
            prop_assert_eq!(results[0].point, point);
            prop_assert!(results[0].distance <= 1e-12);
        }
    }

    #[test]
    fn test_range_query_matches_brute_force(
        coords in prop::collection::vec(arb_point_3d(), 1..40),
        target in arb_point_3d(),
        radius in 0.0..150.0,
        policy in arb_policy()
    ) {
        let points = points_from_coords(&coords);
        let stored = dedup(&points);
        let tree = build_tree(&points, policy);
        let query = Point::new(&[target.0, target.1, target.2], Some(-1));

        let results = tree.range_query(&query, radius).unwrap();

        let expected: HashSet<Point<i32>> = stored
            .iter()
            .filter(|p| EuclideanDistance::distance(&query, p) <= radius)
            .cloned()
            .collect();
        let got: HashSet<Point<i32>> = results.iter().map(|n| n.point.clone()).collect();
        prop_assert_eq!(got, expected);

        let mut prev = 0.0;
        for neighbor in &results {
            let d = EuclideanDistance::distance(&query, neighbor.point);
            prop_assert!((neighbor.distance - d).abs() <= 1e-9);
            prop_assert!(neighbor.distance >= prev);
            prev = neighbor.distance;
        }
    }

    #[test]
    fn test_knn_matches_brute_force(
        coords in prop::collection::vec(arb_point_3d(), 1..40),
        target in arb_point_3d(),
        k in 1usize..20,
        policy in arb_policy()
    ) {
        let points = points_from_coords(&coords);
        let stored = dedup(&points);
        let tree = build_tree(&points, policy);
        let query = Point::new(&[target.0, target.1, target.2], Some(-1));

        let results = tree.knn_query(&query, k).unwrap();
        prop_assert_eq!(results.len(), k.min(stored.len()));

        let mut expected: Vec<f64> = stored
            .iter()
            .map(|p| EuclideanDistance::distance(&query, p))
            .collect();
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
        expected.truncate(k);

        for (neighbor, want) in results.iter().zip(expected.iter()) {
            prop_assert!((neighbor.distance - want).abs() <= 1e-9);
        }
    }

    #[test]
    fn test_insert_delete_roundtrip(
        coords in prop::collection::vec(arb_point_3d(), 1..30),
        policy in arb_policy()
    ) {
        let points = points_from_coords(&coords);
        let stored = dedup(&points);
        let mut tree = build_tree(&points, policy);
        prop_assert_eq!(tree.len(), stored.len());

        for point in &stored {
            prop_assert!(tree.delete(point).unwrap());
        }
        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.height(), 0);

        for point in &stored {
            prop_assert!(!tree.delete(point).unwrap());
        }
    }

    #[test]
    fn test_duplicate_inserts_are_noops(
        coords in prop::collection::vec(arb_point_3d(), 1..25),
        policy in arb_policy()
    ) {
        let points = points_from_coords(&coords);
        let stored = dedup(&points);
        let mut tree = build_tree(&points, policy);

        for point in &points {
            prop_assert!(!tree.insert(point.clone()).unwrap());
        }
        prop_assert_eq!(tree.len(), stored.len());
    }
}
