//! ## M-Tree Implementation
//!
//! This module implements an M-Tree: a dynamic, balanced index over points in
//! a metric space. The tree is parameterised by a distance metric satisfying
//! the metric axioms and supports insertion, deletion, range queries, and
//! k-nearest neighbor queries. Subtrees are pruned through the triangle
//! inequality using distances cached at every entry, so a query computes far
//! fewer distances than a linear scan.
//!
//! ### Example
//!
//! ```
//! use mtree::geometry::Point;
//! use mtree::m_tree::MTree;
//!
//! let mut tree: MTree<Point<()>> = MTree::new(4).unwrap();
//! tree.insert(Point::new(&[0.0, 0.0], None)).unwrap();
//! tree.insert(Point::new(&[3.0, 4.0], None)).unwrap();
//!
//! let hits = tree.range_query(&Point::new(&[0.0, 0.0], None), 5.0).unwrap();
//! assert_eq!(hits.len(), 2);
//!
//! let nearest = tree.knn_query(&Point::new(&[3.0, 3.0], None), 1).unwrap();
//! assert_eq!(nearest[0].point, &Point::new(&[3.0, 4.0], None));
//! ```

use crate::entries::MTreeEntry;
use crate::errors::MTreeError;
use crate::geometry::{DistanceMetric, EuclideanDistance, MetricPoint, Neighbor};
use crate::heuristics::{self, Partition, SplitPolicy};
use crate::node::MTreeNode;
use indexmap::IndexMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::{debug, info};

/// Node capacity used by `Default`.
pub const DEFAULT_CAPACITY: usize = 9;

// A split distributes capacity + 1 entries into two halves of at least two.
const CAPACITY_MIN: usize = 3;

/// M-Tree for points implementing `MetricPoint`.
///
/// The tree stores each point once (equality decides identity) and keeps
/// every leaf at the same depth. A node overflowing its capacity is split in
/// two by the configured [`SplitPolicy`]; an overflowing root is split into a
/// new root, growing the tree by one level.
///
/// # Type Parameters
///
/// * `P`: The point type.
/// * `M`: The distance metric, Euclidean by default. All operations on one
///   tree must use the same metric, so it is fixed at the type level rather
///   than passed per call.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "P: serde::Serialize",
        deserialize = "P: serde::Deserialize<'de>"
    ))
)]
pub struct MTree<P: MetricPoint, M: DistanceMetric<P> = EuclideanDistance> {
    root: Option<Box<MTreeNode<P>>>,
    capacity_max: usize,
    split_policy: SplitPolicy,
    dims: Option<usize>,
    len: usize,
    _metric: PhantomData<M>,
}

impl<P: MetricPoint, M: DistanceMetric<P>> Default for MTree<P, M> {
    fn default() -> Self {
        MTree {
            root: None,
            capacity_max: DEFAULT_CAPACITY,
            split_policy: SplitPolicy::Random,
            dims: None,
            len: 0,
            _metric: PhantomData,
        }
    }
}

impl<P: MetricPoint, M: DistanceMetric<P>> MTree<P, M> {
    /// Creates a new, empty M-Tree using the random split policy.
    ///
    /// # Arguments
    ///
    /// * `capacity_max` - The maximum number of entries a node can hold.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::InvalidCapacity` if `capacity_max` is below
    /// three; a smaller node cannot be split into two valid halves.
    pub fn new(capacity_max: usize) -> Result<Self, MTreeError> {
        Self::with_split_policy(capacity_max, SplitPolicy::Random)
    }

    /// Creates a new, empty M-Tree with the given split policy.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::InvalidCapacity` if `capacity_max` is below three.
    pub fn with_split_policy(
        capacity_max: usize,
        split_policy: SplitPolicy,
    ) -> Result<Self, MTreeError> {
        if capacity_max < CAPACITY_MIN {
            return Err(MTreeError::InvalidCapacity {
                capacity: capacity_max,
            });
        }
        info!(
            "Creating new MTree with capacity_max: {} and split policy: {:?}",
            capacity_max, split_policy
        );
        Ok(MTree {
            capacity_max,
            split_policy,
            ..Self::default()
        })
    }

    /// Number of points stored in the tree.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the tree holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of node levels, 0 for an empty tree.
    pub fn height(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.height())
    }

    /// The maximum number of entries per node.
    pub fn capacity_max(&self) -> usize {
        self.capacity_max
    }

    /// The split policy applied on node overflow.
    pub fn split_policy(&self) -> SplitPolicy {
        self.split_policy
    }

    /// Inserts a point into the tree.
    ///
    /// The first inserted point fixes the tree's dimension.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when the point was added, `Ok(false)` when an equal point
    /// is already stored (the tree is left unchanged).
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::DimensionMismatch` if the point's dimension does
    /// not match the dimension of the tree.
    pub fn insert(&mut self, point: P) -> Result<bool, MTreeError> {
        self.check_dims(&point)?;
        if self.contains(&point)? {
            // A duplicate must not grow any covering ball, and splits may
            // have steered its descent away from the leaf holding the
            // original.
            debug!("Point {:?} already stored, skipping", point);
            return Ok(false);
        }
        info!("Inserting point into MTree: {:?}", point);
        let added = match &mut self.root {
            None => {
                self.init_root(point);
                true
            }
            Some(root) => root.insert::<M>(point, self.split_policy),
        };
        if self
            .root
            .as_ref()
            .is_some_and(|root| root.is_overflowed())
        {
            self.split_root();
        }
        if added {
            self.len += 1;
        }
        Ok(added)
    }

    /// Deletes a point from the tree.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when the point was found and removed, `Ok(false)` when no
    /// equal point is stored.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::DimensionMismatch` if the point's dimension does
    /// not match the dimension of the tree.
    pub fn delete(&mut self, point: &P) -> Result<bool, MTreeError> {
        if self.root.is_none() {
            return Ok(false);
        }
        self.check_dims(point)?;
        info!("Deleting point from MTree: {:?}", point);
        let (deleted, now_empty) = match self.root.as_mut() {
            Some(root) => {
                let d_root = M::distance(point, &root.center);
                let deleted = root.delete::<M>(point, d_root);
                (deleted, deleted && root.entries.is_empty())
            }
            None => (false, false),
        };
        if deleted {
            self.len -= 1;
        }
        if now_empty {
            debug!("Last point removed, clearing the root");
            self.root = None;
        }
        Ok(deleted)
    }

    /// Returns true when an equal point is stored in the tree.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::DimensionMismatch` if the point's dimension does
    /// not match the dimension of the tree.
    pub fn contains(&self, point: &P) -> Result<bool, MTreeError> {
        let root = match self.root.as_ref() {
            None => return Ok(false),
            Some(root) => root,
        };
        self.check_dims(point)?;
        let d_root = M::distance(point, &root.center);
        Ok(!root.search::<M>(point, d_root, 0.0, 1).is_empty())
    }

    /// Finds all stored points within distance `r` of `point`.
    ///
    /// # Returns
    ///
    /// The matching points with their distances, sorted by increasing
    /// distance. An empty tree yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::DimensionMismatch` if the query point's dimension
    /// does not match the dimension of the tree.
    pub fn range_query(&self, point: &P, r: f64) -> Result<Vec<Neighbor<'_, P>>, MTreeError> {
        let root = match self.root.as_ref() {
            None => return Ok(Vec::new()),
            Some(root) => root,
        };
        self.check_dims(point)?;
        info!("Range query around {:?} with radius {}", point, r);
        let d_root = M::distance(point, &root.center);
        Ok(root.search::<M>(point, d_root, r, usize::MAX))
    }

    /// Finds the `k` stored points closest to `point`.
    ///
    /// # Returns
    ///
    /// At most `k` points with their distances, sorted by increasing
    /// distance. Fewer are returned when the tree holds fewer points; `k = 0`
    /// and an empty tree yield an empty result.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::DimensionMismatch` if the query point's dimension
    /// does not match the dimension of the tree.
    pub fn knn_query(&self, point: &P, k: usize) -> Result<Vec<Neighbor<'_, P>>, MTreeError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let root = match self.root.as_ref() {
            None => return Ok(Vec::new()),
            Some(root) => root,
        };
        self.check_dims(point)?;
        info!("kNN query around {:?} with k: {}", point, k);
        let d_root = M::distance(point, &root.center);
        Ok(root.search::<M>(point, d_root, f64::INFINITY, k))
    }

    fn check_dims(&self, point: &P) -> Result<(), MTreeError> {
        match self.dims {
            Some(expected) if expected != point.dims() => Err(MTreeError::DimensionMismatch {
                expected,
                actual: point.dims(),
            }),
            _ => Ok(()),
        }
    }

    /// Builds the two-level initial tree: a leaf holding the first point,
    /// wrapped by a root with a single zero-radius routing entry. Both balls
    /// grow as further points arrive.
    fn init_root(&mut self, point: P) {
        debug!("Creating root for first point: {:?}", point);
        self.dims = Some(point.dims());
        let mut ground = IndexMap::new();
        ground.insert(point.clone(), MTreeEntry::Ground { parent_dist: 0.0 });
        let leaf = MTreeNode {
            center: point.clone(),
            radius: 0.0,
            is_leaf: true,
            capacity: self.capacity_max,
            entries: ground,
        };
        let mut routing = IndexMap::new();
        routing.insert(
            point.clone(),
            MTreeEntry::Routing {
                radius: 0.0,
                parent_dist: 0.0,
                child: Box::new(leaf),
            },
        );
        self.root = Some(Box::new(MTreeNode {
            center: point,
            radius: 0.0,
            is_leaf: false,
            capacity: self.capacity_max,
            entries: routing,
        }));
    }

    /// Splits the overflowed root into two routers under a fresh root whose
    /// center is the first partition's center. Tree height grows by one.
    fn split_root(&mut self) {
        info!("Root overflowed; growing the tree by one level");
        let old_root = match self.root.take() {
            Some(root) => root,
            None => {
                debug_assert!(false, "split of an absent root");
                return;
            }
        };
        let MTreeNode {
            is_leaf,
            capacity,
            entries,
            ..
        } = *old_root;
        let (first, second) = heuristics::split_entries::<P, M>(self.split_policy, entries);
        let d_centers = M::distance(&first.center, &second.center);
        let root_radius = first.radius.max(d_centers + second.radius);
        let root_center = first.center.clone();

        let mut routing = IndexMap::new();
        for (partition, parent_dist) in [(first, 0.0), (second, d_centers)] {
            let Partition {
                center,
                radius,
                entries,
            } = partition;
            let node = MTreeNode {
                center: center.clone(),
                radius,
                is_leaf,
                capacity,
                entries,
            };
            routing.insert(
                center,
                MTreeEntry::Routing {
                    radius,
                    parent_dist,
                    child: Box::new(node),
                },
            );
        }
        self.root = Some(Box::new(MTreeNode {
            center: root_center,
            radius: root_radius,
            is_leaf: false,
            capacity: self.capacity_max,
            entries: routing,
        }));
    }
}
