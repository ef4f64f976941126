//! ## M-Tree Entries
//!
//! An entry is one slot of a node's entry map. Leaves hold ground entries
//! (stored points), routers hold routing entries (a covering ball around a
//! child node). The point that identifies an entry is the key of the map that
//! owns it, so entries only carry the cached geometry.

use crate::geometry::MetricPoint;
use crate::node::MTreeNode;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An entry in an M-Tree node, keyed by its point in the owning node's map.
///
/// `parent_dist` caches the distance between the entry's point and the center
/// of the node holding the entry. Search compares it against the query's
/// distance to that same center, which by the triangle inequality can rule a
/// subtree out without computing any new distance.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) enum MTreeEntry<P: MetricPoint> {
    /// A stored point in a leaf.
    Ground { parent_dist: f64 },
    /// A covering ball of `radius` around the key, enclosing every point
    /// reachable through `child`.
    Routing {
        radius: f64,
        parent_dist: f64,
        child: Box<MTreeNode<P>>,
    },
}

impl<P: MetricPoint> MTreeEntry<P> {
    /// Returns the radius of the entry's covering ball. Ground entries are
    /// single points with radius zero.
    pub(crate) fn radius(&self) -> f64 {
        match self {
            MTreeEntry::Ground { .. } => 0.0,
            MTreeEntry::Routing { radius, .. } => *radius,
        }
    }

    /// Returns the cached distance to the owning node's center.
    pub(crate) fn parent_dist(&self) -> f64 {
        match self {
            MTreeEntry::Ground { parent_dist } => *parent_dist,
            MTreeEntry::Routing { parent_dist, .. } => *parent_dist,
        }
    }

    /// Replaces the cached distance to the owning node's center. Splits call
    /// this after moving an entry under a new center.
    pub(crate) fn set_parent_dist(&mut self, d: f64) {
        match self {
            MTreeEntry::Ground { parent_dist } => *parent_dist = d,
            MTreeEntry::Routing { parent_dist, .. } => *parent_dist = d,
        }
    }
}
