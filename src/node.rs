//! ## M-Tree Nodes
//!
//! A node is a bounded map from point to entry plus the covering ball that
//! encloses everything stored beneath it. Leaves map points to ground
//! entries; routers map child centers to routing entries. The same struct
//! serves both, tagged by `is_leaf`, so insert, delete, and search dispatch
//! per variant without an inheritance hierarchy.

use crate::entries::MTreeEntry;
use crate::geometry::{DistanceMetric, MetricPoint, Neighbor};
use crate::heuristics::{self, Partition, SplitPolicy};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One M-Tree node. The map key of each entry is the entry's point (ground
/// entries) or the child's center (routing entries). Iteration order is the
/// insertion order, which keeps traversals deterministic.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct MTreeNode<P: MetricPoint> {
    pub(crate) center: P,
    pub(crate) radius: f64,
    pub(crate) is_leaf: bool,
    pub(crate) capacity: usize,
    pub(crate) entries: IndexMap<P, MTreeEntry<P>>,
}

impl<P: MetricPoint> MTreeNode<P> {
    /// Returns true when the node holds more entries than its capacity
    /// allows. The parent reacts by splitting the node.
    pub(crate) fn is_overflowed(&self) -> bool {
        self.entries.len() > self.capacity
    }

    /// Number of levels from this node down to its leaves.
    pub(crate) fn height(&self) -> usize {
        match self.entries.values().next() {
            Some(MTreeEntry::Routing { child, .. }) => 1 + child.height(),
            _ => 1,
        }
    }

    /// Inserts a point into the subtree rooted at this node.
    ///
    /// Leaves store the point directly and grow their radius. Routers pick
    /// the routing entry whose ball the point falls into (closest center
    /// wins); when no ball covers the point, the entry needing the least
    /// radius growth is chosen and grown. An overflowed child is split here,
    /// at the parent level.
    pub(crate) fn insert<M: DistanceMetric<P>>(&mut self, point: P, policy: SplitPolicy) -> bool {
        if self.is_leaf {
            return self.insert_ground::<M>(point);
        }

        let mut best_idx: Option<usize> = None;
        let mut best_fit = f64::INFINITY;
        let mut best_surplus = f64::INFINITY;
        let mut grow_to = 0.0;
        let mut have_fit = false;
        for (i, (key, entry)) in self.entries.iter().enumerate() {
            let d = M::distance(&point, key);
            let r = entry.radius();
            if d <= r {
                if !have_fit || d < best_fit {
                    have_fit = true;
                    best_fit = d;
                    best_idx = Some(i);
                }
            } else if !have_fit {
                let surplus = d - r;
                if surplus < best_surplus {
                    best_surplus = surplus;
                    grow_to = d;
                    best_idx = Some(i);
                }
            }
        }

        let idx = match best_idx {
            Some(idx) => idx,
            None => {
                debug_assert!(false, "router node has no routing entries");
                return false;
            }
        };

        let (split_key, success) = {
            let (key, entry) = self
                .entries
                .get_index_mut(idx)
                .expect("descent picked an existing entry");
            match entry {
                MTreeEntry::Routing { radius, child, .. } => {
                    if !have_fit {
                        // Grow the ball just enough for the point to fit.
                        *radius = grow_to;
                        child.radius = grow_to;
                    }
                    let success = child.insert::<M>(point, policy);
                    let overflowed = child.is_overflowed();
                    (overflowed.then(|| key.clone()), success)
                }
                MTreeEntry::Ground { .. } => {
                    debug_assert!(false, "ground entry in a router node");
                    return false;
                }
            }
        };

        if let Some(key) = split_key {
            self.split_child::<M>(&key, policy);
        }
        success
    }

    fn insert_ground<M: DistanceMetric<P>>(&mut self, point: P) -> bool {
        if self.entries.contains_key(&point) {
            debug!("Point {:?} already stored, skipping", point);
            return false;
        }
        let d = M::distance(&self.center, &point);
        self.entries
            .insert(point, MTreeEntry::Ground { parent_dist: d });
        if d > self.radius {
            self.radius = d;
        }
        true
    }

    /// Replaces the routing entry at `key` with two entries covering the
    /// split halves of its overflowed child.
    fn split_child<M: DistanceMetric<P>>(&mut self, key: &P, policy: SplitPolicy) {
        debug!("Splitting overflowed child at {:?}", key);
        let child = match self.entries.shift_remove(key) {
            Some(MTreeEntry::Routing { child, .. }) => *child,
            _ => {
                debug_assert!(false, "split target is not a routing entry");
                return;
            }
        };
        let MTreeNode {
            is_leaf,
            capacity,
            entries,
            ..
        } = child;
        let (first, second) = heuristics::split_entries::<P, M>(policy, entries);
        for partition in [first, second] {
            let Partition {
                center,
                radius,
                entries,
            } = partition;
            let parent_dist = M::distance(&self.center, &center);
            let node = MTreeNode {
                center: center.clone(),
                radius,
                is_leaf,
                capacity,
                entries,
            };
            self.entries.insert(
                center,
                MTreeEntry::Routing {
                    radius,
                    parent_dist,
                    child: Box::new(node),
                },
            );
        }
    }

    /// Collects every stored point within distance `r` of `query`, sorted by
    /// increasing distance and truncated to at most `k` results.
    ///
    /// `d_parent` is the caller-supplied distance between the query and this
    /// node's center. Comparing it against each entry's cached `parent_dist`
    /// bounds the entry's distance from below (triangle inequality), so
    /// entries whose ball cannot reach the query ball are skipped without a
    /// distance computation.
    pub(crate) fn search<'a, M: DistanceMetric<P>>(
        &'a self,
        query: &P,
        d_parent: f64,
        r: f64,
        k: usize,
    ) -> Vec<Neighbor<'a, P>> {
        if self.is_leaf {
            self.search_ground::<M>(query, d_parent, r, k)
        } else {
            self.search_routed::<M>(query, d_parent, r, k)
        }
    }

    fn search_ground<'a, M: DistanceMetric<P>>(
        &'a self,
        query: &P,
        d_parent: f64,
        r: f64,
        k: usize,
    ) -> Vec<Neighbor<'a, P>> {
        let mut in_range = Vec::new();
        for (key, entry) in &self.entries {
            if (d_parent - entry.parent_dist()).abs() <= r {
                let d = M::distance(query, key);
                if d <= r {
                    in_range.push(Neighbor {
                        point: key,
                        distance: d,
                    });
                }
            }
        }
        in_range.sort_by_key(|n| OrderedFloat(n.distance));
        in_range.truncate(k);
        in_range
    }

    fn search_routed<'a, M: DistanceMetric<P>>(
        &'a self,
        query: &P,
        d_parent: f64,
        r: f64,
        k: usize,
    ) -> Vec<Neighbor<'a, P>> {
        let mut in_range: Vec<Neighbor<'a, P>> = Vec::new();
        for (key, entry) in &self.entries {
            match entry {
                MTreeEntry::Routing {
                    radius,
                    parent_dist,
                    child,
                } => {
                    let r_sum = r + radius;
                    if (d_parent - parent_dist).abs() <= r_sum {
                        let d = M::distance(query, key);
                        if d <= r_sum {
                            let subtree = child.search::<M>(query, d, r, k);
                            in_range = merge_by_distance(in_range, subtree);
                            in_range.truncate(k);
                        }
                    }
                }
                MTreeEntry::Ground { .. } => {
                    debug_assert!(false, "ground entry in a router node");
                }
            }
        }
        in_range
    }

    /// Removes `point` from every subtree whose covering ball contains it.
    ///
    /// A point can only live under one ball while the invariants hold, but
    /// visiting every candidate keeps deletion correct even for balls that
    /// overlap. Children emptied by the removal are dropped from the entry
    /// map.
    pub(crate) fn delete<M: DistanceMetric<P>>(&mut self, point: &P, d_parent: f64) -> bool {
        if self.is_leaf {
            return self.entries.shift_remove(point).is_some();
        }
        let mut deleted = false;
        let mut emptied: Vec<P> = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            match entry {
                MTreeEntry::Routing {
                    radius,
                    parent_dist,
                    child,
                } => {
                    if (d_parent - *parent_dist).abs() <= *radius {
                        let d = M::distance(point, key);
                        if d <= *radius && child.delete::<M>(point, d) {
                            deleted = true;
                            if child.entries.is_empty() {
                                emptied.push(key.clone());
                            }
                        }
                    }
                }
                MTreeEntry::Ground { .. } => {
                    debug_assert!(false, "ground entry in a router node");
                }
            }
        }
        for key in &emptied {
            self.entries.shift_remove(key);
        }
        deleted
    }
}

/// Merges two distance-sorted result lists into one, preserving order.
fn merge_by_distance<'a, P>(
    a: Vec<Neighbor<'a, P>>,
    b: Vec<Neighbor<'a, P>>,
) -> Vec<Neighbor<'a, P>> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let mut left = a.into_iter().peekable();
    let mut right = b.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => OrderedFloat(l.distance) <= OrderedFloat(r.distance),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        if take_left {
            if let Some(n) = left.next() {
                merged.push(n);
            }
        } else if let Some(n) = right.next() {
            merged.push(n);
        }
    }
    merged
}
