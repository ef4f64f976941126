//! ## Split Heuristics
//!
//! When a node overflows, its entries are partitioned into two covering
//! balls. This module implements the three partitioning strategies an M-Tree
//! can be configured with, trading partition quality against split cost:
//!
//! - [`SplitPolicy::Random`]: shuffle and halve, O(n). Cheapest, lowest
//!   quality.
//! - [`SplitPolicy::Perfect`]: enumerate every balanced 2-partition and keep
//!   the one whose covering balls overlap the least, O(2^n * n^2). Only
//!   viable for small node capacities.
//! - [`SplitPolicy::Smart`]: anchor two opposite entries and assign everything
//!   to the closer anchor, O(n). Middle ground; partitions may be uneven.
//!
//! Every heuristic recomputes the cached center distance of each entry
//! against its new partition center before returning.

use crate::entries::MTreeEntry;
use crate::geometry::{DistanceMetric, MetricPoint};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Selects the split heuristic an M-Tree uses on node overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SplitPolicy {
    /// Shuffle the entries and cut the sequence in half.
    #[default]
    Random,
    /// Exhaustively score all balanced partitions by ball overlap.
    Perfect,
    /// Assign each entry to the closer of two opposite anchors.
    Smart,
}

/// One half of a split: a new covering ball and the entries it owns.
#[derive(Debug)]
pub(crate) struct Partition<P: MetricPoint> {
    pub(crate) center: P,
    pub(crate) radius: f64,
    pub(crate) entries: IndexMap<P, MTreeEntry<P>>,
}

/// Splits an overflowed node's entry map into two partitions using the given
/// policy. Every input entry ends up in exactly one partition.
pub(crate) fn split_entries<P: MetricPoint, M: DistanceMetric<P>>(
    policy: SplitPolicy,
    entries: IndexMap<P, MTreeEntry<P>>,
) -> (Partition<P>, Partition<P>) {
    match policy {
        SplitPolicy::Random => split_random::<P, M>(entries),
        SplitPolicy::Perfect => split_perfect::<P, M>(entries),
        SplitPolicy::Smart => split_smart::<P, M>(entries),
    }
}

/// Finalizes a partition: recomputes each entry's distance to the new center
/// and derives the covering radius. Routing entries contribute their own
/// radius so the ball still encloses all their descendants.
fn build_partition<P: MetricPoint, M: DistanceMetric<P>>(
    center: P,
    mut entries: IndexMap<P, MTreeEntry<P>>,
) -> Partition<P> {
    let mut radius: f64 = 0.0;
    for (key, entry) in entries.iter_mut() {
        let d = M::distance(&center, key);
        entry.set_parent_dist(d);
        radius = radius.max(d + entry.radius());
    }
    Partition {
        center,
        radius,
        entries,
    }
}

fn split_random<P: MetricPoint, M: DistanceMetric<P>>(
    mut entries: IndexMap<P, MTreeEntry<P>>,
) -> (Partition<P>, Partition<P>) {
    debug_assert!(entries.len() >= 4, "a split needs at least four entries");
    let mut keys: Vec<P> = entries.keys().cloned().collect();
    keys.shuffle(&mut rand::thread_rng());
    let second_keys = keys.split_off(keys.len() / 2);

    let mut halves = Vec::with_capacity(2);
    for half_keys in [keys, second_keys] {
        let mut half = IndexMap::with_capacity(half_keys.len());
        for key in half_keys {
            if let Some(entry) = entries.shift_remove(&key) {
                half.insert(key, entry);
            }
        }
        let center = half
            .keys()
            .next()
            .cloned()
            .expect("shuffled halves are non-empty");
        halves.push(build_partition::<P, M>(center, half));
    }
    let second = halves.pop().expect("two halves were built");
    let first = halves.pop().expect("two halves were built");
    (first, second)
}

fn split_smart<P: MetricPoint, M: DistanceMetric<P>>(
    entries: IndexMap<P, MTreeEntry<P>>,
) -> (Partition<P>, Partition<P>) {
    debug_assert!(entries.len() >= 4, "a split needs at least four entries");
    let mut sum_min = f64::INFINITY;
    let mut sum_max = f64::NEG_INFINITY;
    let mut center_min: Option<P> = None;
    let mut center_max: Option<P> = None;
    for key in entries.keys() {
        let s = coordinate_sum(key);
        if s < sum_min {
            sum_min = s;
            center_min = Some(key.clone());
        }
        if s > sum_max {
            sum_max = s;
            center_max = Some(key.clone());
        }
    }
    let (center_min, center_max) = match (center_min, center_max) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => {
            debug_assert!(false, "anchor scan over a non-empty map found no anchors");
            return split_random::<P, M>(entries);
        }
    };
    if center_min == center_max {
        // Every coordinate sum ties, so there are no opposite anchors and
        // one side would end up empty.
        debug!("Smart split anchors coincide, falling back to random split");
        return split_random::<P, M>(entries);
    }

    // Assign entries before moving anything, so an underfull side can still
    // hand the untouched map to the fallback.
    let mut assignments = Vec::with_capacity(entries.len());
    let mut min_count = 0usize;
    for key in entries.keys() {
        let d_min = M::distance(&center_min, key);
        let d_max = M::distance(&center_max, key);
        let to_min = d_min < d_max;
        if to_min {
            min_count += 1;
        }
        assignments.push((to_min, if to_min { d_min } else { d_max }));
    }
    if min_count < 2 || entries.len() - min_count < 2 {
        // Every split must produce two sides of at least two entries.
        debug!("Smart split left one side underfull, falling back to random split");
        return split_random::<P, M>(entries);
    }

    let mut entries_min = IndexMap::new();
    let mut entries_max = IndexMap::new();
    let mut r_min: f64 = 0.0;
    let mut r_max: f64 = 0.0;
    for ((to_min, d), (key, mut entry)) in assignments.into_iter().zip(entries) {
        entry.set_parent_dist(d);
        if to_min {
            r_min = r_min.max(d + entry.radius());
            entries_min.insert(key, entry);
        } else {
            r_max = r_max.max(d + entry.radius());
            entries_max.insert(key, entry);
        }
    }
    (
        Partition {
            center: center_min,
            radius: r_min,
            entries: entries_min,
        },
        Partition {
            center: center_max,
            radius: r_max,
            entries: entries_max,
        },
    )
}

fn split_perfect<P: MetricPoint, M: DistanceMetric<P>>(
    mut entries: IndexMap<P, MTreeEntry<P>>,
) -> (Partition<P>, Partition<P>) {
    let n = entries.len();
    debug_assert!(n >= 4, "a split needs at least four entries");
    if n > 63 {
        // 2^(n-1) candidate partitions; beyond this the enumeration would
        // never terminate, let alone fit a bitmask.
        debug!("Perfect split infeasible for {} entries, using random split", n);
        return split_random::<P, M>(entries);
    }
    let keys: Vec<P> = entries.keys().cloned().collect();

    // Pairwise distances between all keys, computed once and reused by every
    // candidate partition.
    let mut table = vec![vec![0.0_f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = M::distance(&keys[i], &keys[j]);
            table[i][j] = d;
            table[j][i] = d;
        }
    }

    // Key 0 is pinned to side A, which enumerates each symmetric pair of
    // partitions exactly once.
    let mut best_score = f64::INFINITY;
    let mut best_split: Option<(u64, usize, usize)> = None;
    let mut side_a: Vec<usize> = Vec::with_capacity(n);
    let mut side_b: Vec<usize> = Vec::with_capacity(n);
    for mask in 0u64..(1u64 << (n - 1)) {
        side_a.clear();
        side_b.clear();
        side_a.push(0);
        for i in 1..n {
            if mask & (1 << (i - 1)) != 0 {
                side_a.push(i);
            } else {
                side_b.push(i);
            }
        }
        if side_a.len() < 2 || side_b.len() < 2 {
            continue;
        }
        if side_a.len().abs_diff(side_b.len()) > 1 {
            continue;
        }
        let (ca, ra) = one_center(&side_a, &table);
        let (cb, rb) = one_center(&side_b, &table);
        let score = intersection_area(ra, rb, table[ca][cb]);
        if score < best_score {
            best_score = score;
            best_split = Some((mask, ca, cb));
        }
    }

    let (mask, ca, cb) = best_split.expect("at least one balanced partition exists");
    let mut a_entries = IndexMap::new();
    let mut b_entries = IndexMap::new();
    for (i, key) in keys.iter().enumerate() {
        let entry = entries
            .shift_remove(key)
            .expect("key snapshot matches the entry map");
        let in_a = i == 0 || mask & (1 << (i - 1)) != 0;
        if in_a {
            a_entries.insert(key.clone(), entry);
        } else {
            b_entries.insert(key.clone(), entry);
        }
    }
    (
        build_partition::<P, M>(keys[ca].clone(), a_entries),
        build_partition::<P, M>(keys[cb].clone(), b_entries),
    )
}

/// Finds the 1-center of a side: the key minimising the maximum distance to
/// the side's other keys. Returns the key's index and that maximum distance.
fn one_center(side: &[usize], table: &[Vec<f64>]) -> (usize, f64) {
    let mut best = side[0];
    let mut r_min = f64::INFINITY;
    for &i in side {
        let mut r_curr: f64 = 0.0;
        for &j in side {
            if i != j {
                r_curr = r_curr.max(table[i][j]);
            }
        }
        if r_curr < r_min {
            r_min = r_curr;
            best = i;
        }
    }
    (best, r_min)
}

/// Area of intersection of two circles with radii `a` and `b` whose centers
/// are `d` apart. A planar approximation is used regardless of the point
/// dimensionality; it ranks candidate partitions just as well as a true
/// N-sphere overlap would.
fn intersection_area(a: f64, b: f64, d: f64) -> f64 {
    if d >= a + b || a == 0.0 || b == 0.0 {
        return 0.0;
    }
    let a_sq = a * a;
    let b_sq = b * b;
    if d <= (a - b).abs() {
        // One circle inside the other.
        return std::f64::consts::PI * a_sq.min(b_sq);
    }
    let x = (a_sq - b_sq + d * d) / (2.0 * d);
    let z = x * x;
    let y = (a_sq - z).abs().sqrt();
    let s = (z + b_sq - a_sq).abs().sqrt();
    a_sq * asin_clamped(y / a) + b_sq * asin_clamped(y / b) - y * (x + s)
}

/// Arc sine with the input clamped to `[-1, 1]`; rounding in the
/// intersection formula can push a ratio just past one.
fn asin_clamped(v: f64) -> f64 {
    v.clamp(-1.0, 1.0).asin()
}

/// Sum of a point's coordinates, used to pick opposite anchors.
fn coordinate_sum<P: MetricPoint>(p: &P) -> f64 {
    (0..p.dims()).filter_map(|axis| p.coord(axis).ok()).sum()
}
