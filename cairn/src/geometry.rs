// Cairn: Adaptive Greedy Routing in Vector Space
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module containing the vector kernel. All routing scoring and all topology construction is
//! built on these primitives. Every operation is total over finite inputs: zero-magnitude
//! operands yield `0.0` (cosine) or the zero vector (normalize), and the cosine is clamped
//! before any arccos. Mixing dimensions is a programmer error and panics.

use std::fmt;
use std::ops::Index;

/// Comparison slack for distance improvements. Two distances closer than this are treated as
/// equal, so a hop must beat the current distance by more than the slack to count as progress.
pub(crate) const DISTANCE_EPSILON: f64 = 1e-10;

/// A point (or direction) in the routing vector space. Immutable after construction, with a
/// fixed dimension. Typically `D = 4`.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    coords: Vec<f64>,
}

impl Vector {
    /// Create a new vector from its coordinates.
    pub fn new(coords: Vec<f64>) -> Self {
        Self { coords }
    }

    /// The zero vector of the given dimension.
    pub fn zeros(dim: usize) -> Self {
        Self { coords: vec![0.0; dim] }
    }

    /// Number of coordinates.
    pub fn dim(&self) -> usize {
        self.coords.len()
    }

    /// The raw coordinate slice.
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Dot product of two vectors of the same dimension.
    pub fn dot(&self, other: &Self) -> f64 {
        self.check_dim(other);
        self.coords.iter().zip(other.coords.iter()).map(|(a, b)| a * b).sum()
    }

    /// L2 norm.
    pub fn magnitude(&self) -> f64 {
        self.coords.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Euclidean distance between two vectors of the same dimension.
    pub fn distance(&self, other: &Self) -> f64 {
        self.check_dim(other);
        self.coords
            .iter()
            .zip(other.coords.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Cosine similarity in `[-1, 1]`. Returns `0.0` if either operand has zero magnitude, so
    /// the result is always finite.
    pub fn cosine_similarity(&self, other: &Self) -> f64 {
        self.check_dim(other);
        let mag = self.magnitude() * other.magnitude();
        if mag == 0.0 {
            return 0.0;
        }
        let cos = self.dot(other) / mag;
        // rounding can push the quotient just outside the valid range
        cos.max(-1.0).min(1.0)
    }

    /// Element-wise sum.
    pub fn add(&self, other: &Self) -> Self {
        self.check_dim(other);
        Self::new(self.coords.iter().zip(other.coords.iter()).map(|(a, b)| a + b).collect())
    }

    /// Element-wise difference `self - other`.
    pub fn sub(&self, other: &Self) -> Self {
        self.check_dim(other);
        Self::new(self.coords.iter().zip(other.coords.iter()).map(|(a, b)| a - b).collect())
    }

    /// Unit vector in the same direction. The zero vector normalizes to itself.
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag == 0.0 {
            return Self::zeros(self.dim());
        }
        Self::new(self.coords.iter().map(|x| x / mag).collect())
    }

    /// Angle between two vectors in radians. Returns `0.0` when either vector is zero (the
    /// cosine is `0.0` in that case, so the result would otherwise be `π/2`, which is just as
    /// arbitrary; we keep the convention of the scoring kernel and clamp first).
    pub fn angle_between(&self, other: &Self) -> f64 {
        self.check_dim(other);
        if self.magnitude() == 0.0 || other.magnitude() == 0.0 {
            return 0.0;
        }
        self.cosine_similarity(other).acos()
    }

    /// Quantize the vector into a hashable cache key by rounding every coordinate to the given
    /// number of decimals. Two targets that agree up to the rounding produce the same key.
    pub fn key(&self, decimals: u32) -> VectorKey {
        let scale = 10f64.powi(decimals as i32);
        VectorKey(self.coords.iter().map(|x| (x * scale).round() as i64).collect())
    }

    fn check_dim(&self, other: &Self) {
        assert_eq!(
            self.dim(),
            other.dim(),
            "Vector dimension mismatch: {} vs {}",
            self.dim(),
            other.dim()
        );
    }
}

impl From<Vec<f64>> for Vector {
    fn from(coords: Vec<f64>) -> Self {
        Self::new(coords)
    }
}

impl From<&[f64]> for Vector {
    fn from(coords: &[f64]) -> Self {
        Self::new(coords.to_vec())
    }
}

impl Index<usize> for Vector {
    type Output = f64;
    fn index(&self, idx: usize) -> &f64 {
        &self.coords[idx]
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, x) in self.coords.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", x)?;
        }
        write!(f, "]")
    }
}

/// A rounded, hashable form of a target vector, used as the key of the per-node route cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VectorKey(Vec<i64>);

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_dot_and_magnitude() {
        let a = Vector::new(vec![1.0, 2.0, 3.0]);
        let b = Vector::new(vec![4.0, -5.0, 6.0]);
        assert_approx_eq!(a.dot(&b), 12.0);
        assert_approx_eq!(Vector::new(vec![3.0, 4.0]).magnitude(), 5.0);
        assert_approx_eq!(Vector::zeros(4).magnitude(), 0.0);
    }

    #[test]
    fn test_distance() {
        let a = Vector::new(vec![0.0, 0.0]);
        let b = Vector::new(vec![3.0, 4.0]);
        assert_approx_eq!(a.distance(&b), 5.0);
        assert_approx_eq!(b.distance(&b), 0.0);
    }

    #[test]
    fn test_cosine_range_and_totality() {
        let a = Vector::new(vec![1.0, 0.0]);
        let b = Vector::new(vec![0.0, 1.0]);
        assert_approx_eq!(a.cosine_similarity(&b), 0.0);
        assert_approx_eq!(a.cosine_similarity(&a), 1.0);
        assert_approx_eq!(
            a.cosine_similarity(&Vector::new(vec![-1.0, 0.0])),
            -1.0
        );
        // zero operands must not produce NaN
        let zero = Vector::zeros(2);
        assert_approx_eq!(zero.cosine_similarity(&a), 0.0);
        assert_approx_eq!(zero.cosine_similarity(&zero), 0.0);
    }

    #[test]
    fn test_cosine_always_in_bounds() {
        // nearly parallel vectors can push the raw quotient above 1.0
        let a = Vector::new(vec![0.1, 0.2, 0.3, 0.4]);
        let b = Vector::new(vec![0.1 * 3.0, 0.2 * 3.0, 0.3 * 3.0, 0.4 * 3.0]);
        let cos = a.cosine_similarity(&b);
        assert!(cos <= 1.0 && cos >= -1.0);
        assert_approx_eq!(cos, 1.0);
        assert_approx_eq!(a.angle_between(&b), 0.0);
    }

    #[test]
    fn test_add_sub_normalize() {
        let a = Vector::new(vec![1.0, 2.0]);
        let b = Vector::new(vec![3.0, 5.0]);
        assert_eq!(a.add(&b), Vector::new(vec![4.0, 7.0]));
        assert_eq!(b.sub(&a), Vector::new(vec![2.0, 3.0]));
        let n = Vector::new(vec![3.0, 4.0]).normalize();
        assert_approx_eq!(n.magnitude(), 1.0);
        assert_approx_eq!(n[0], 0.6);
        assert_eq!(Vector::zeros(3).normalize(), Vector::zeros(3));
    }

    #[test]
    fn test_cache_key_rounding() {
        let a = Vector::new(vec![0.12344, 0.5]);
        let b = Vector::new(vec![0.12341, 0.5]);
        let c = Vector::new(vec![0.12351, 0.5]);
        assert_eq!(a.key(4), b.key(4));
        assert_ne!(a.key(4), c.key(4));
        assert_eq!(a.key(2), c.key(2));
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn test_dimension_mismatch_panics() {
        Vector::new(vec![1.0, 2.0]).dot(&Vector::new(vec![1.0, 2.0, 3.0]));
    }
}
