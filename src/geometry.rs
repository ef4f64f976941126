//! ## Metric Space Primitives
//!
//! This module defines the point type stored in an M-Tree together with the
//! traits that make the tree generic over point representation and distance
//! metric. Coordinates are kept as `OrderedFloat<f64>` so points can be used
//! as hash map keys; equality and hashing ignore the optional payload.

use crate::errors::MTreeError;
use ordered_float::OrderedFloat;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// An N-dimensional point with an optional payload.
///
/// Two points are equal when their coordinate sequences are equal; the
/// payload `data` never participates in identity. This keeps the metric
/// identity axiom intact: a distance of zero implies the same point.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point<T> {
    pub coords: Vec<OrderedFloat<f64>>,
    pub data: Option<T>,
}

impl<T> Point<T> {
    /// Creates a new point from a slice of coordinates.
    pub fn new(coords: &[f64], data: Option<T>) -> Self {
        Point {
            coords: coords.iter().copied().map(OrderedFloat).collect(),
            data,
        }
    }

    /// Creates a new point from a slice of integer coordinates.
    ///
    /// Dataset files store integer tuples (see the `dataset` module).
    pub fn from_ints(coords: &[i64], data: Option<T>) -> Self {
        Point {
            coords: coords.iter().map(|&c| OrderedFloat(c as f64)).collect(),
            data,
        }
    }
}

impl<T> PartialEq for Point<T> {
    fn eq(&self, other: &Self) -> bool {
        self.coords == other.coords
    }
}

impl<T> Eq for Point<T> {}

impl<T> Hash for Point<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.coords.hash(state);
    }
}

/// Trait representing a point that can be stored in an M-Tree.
///
/// A type implementing `MetricPoint` must report its number of dimensions and
/// expose individual coordinates. The tree uses `dims` to validate that all
/// stored and queried points live in the same space; the smart split
/// heuristic reads coordinates to pick its anchors.
pub trait MetricPoint: Clone + Eq + Hash + std::fmt::Debug {
    /// Returns the number of dimensions of the point.
    fn dims(&self) -> usize;
    /// Returns the coordinate along the specified axis.
    ///
    /// # Errors
    ///
    /// Returns `MTreeError::InvalidAxis` if the axis is out of range.
    fn coord(&self, axis: usize) -> Result<f64, MTreeError>;
}

impl<T> MetricPoint for Point<T>
where
    T: Clone + Eq + Hash + std::fmt::Debug,
{
    fn dims(&self) -> usize {
        self.coords.len()
    }

    fn coord(&self, axis: usize) -> Result<f64, MTreeError> {
        self.coords
            .get(axis)
            .map(|c| c.into_inner())
            .ok_or(MTreeError::InvalidAxis {
                axis,
                dims: self.coords.len(),
            })
    }
}

/// Trait for distance metrics usable by the M-Tree.
///
/// Implementations must satisfy the metric axioms (non-negativity, identity,
/// symmetry, triangle inequality); the pruning performed during search is
/// unsound otherwise. Points are validated to share the tree's dimension
/// before any distance call, so implementations may assume equal lengths.
pub trait DistanceMetric<P> {
    /// Returns the distance between two points.
    fn distance(a: &P, b: &P) -> f64;
}

/// The Euclidean (L2) distance metric.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanDistance;

impl<T> DistanceMetric<Point<T>> for EuclideanDistance {
    fn distance(a: &Point<T>, b: &Point<T>) -> f64 {
        a.coords
            .iter()
            .zip(b.coords.iter())
            .map(|(x, y)| (x.into_inner() - y.into_inner()).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// The Manhattan (L1) distance metric.
#[derive(Debug, Clone, Copy)]
pub struct ManhattanDistance;

impl<T> DistanceMetric<Point<T>> for ManhattanDistance {
    fn distance(a: &Point<T>, b: &Point<T>) -> f64 {
        a.coords
            .iter()
            .zip(b.coords.iter())
            .map(|(x, y)| (x.into_inner() - y.into_inner()).abs())
            .sum()
    }
}

/// A query result: a stored point together with its distance to the query.
///
/// Query methods return these sorted by increasing `distance`.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<'a, P> {
    pub point: &'a P,
    pub distance: f64,
}
