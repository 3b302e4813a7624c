//! Planar integer coordinates for waypoints.
//!
//! Waypoints sit on a 2D integer lattice. Distances are Euclidean and are
//! used both for default edge costs and for communication range checks.

use std::ops::{Add, Neg, Sub};

/// A position on the 2D waypoint plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// Horizontal coordinate
    pub x: i64,
    /// Vertical coordinate
    pub y: i64,
}

impl Point {
    /// Origin of the coordinate system.
    pub const ORIGIN: Self = Self { x: 0, y: 0 };

    /// Create a new point.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance (exact, no rounding).
    pub fn distance_squared(&self, other: &Self) -> u64 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Self) -> f64 {
        (self.distance_squared(other) as f64).sqrt()
    }

    /// Euclidean distance rounded to the nearest whole unit, never below 1.
    ///
    /// Used as the default cost of an edge between two distinct waypoints.
    pub fn edge_cost(&self, other: &Self) -> u64 {
        (self.distance(other).round() as u64).max(1)
    }

    /// Manhattan distance.
    pub fn manhattan(&self, other: &Self) -> u64 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Linear interpolation toward `other`, `fraction` in [0, 1].
    pub fn lerp(&self, other: &Self, fraction: f64) -> (f64, f64) {
        let t = fraction.clamp(0.0, 1.0);
        (
            self.x as f64 + (other.x - self.x) as f64 * t,
            self.y as f64 + (other.y - self.y) as f64 * t,
        )
    }
}

impl Add for Point {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl Sub for Point {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Neg for Point {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
