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

//! d-dimensional Delaunay tessellation (Bowyer-Watson).
//!
//! The tessellation is what gives greedy routing its progress guarantee: in a Delaunay graph,
//! every node that is not the globally closest one to a target has at least one neighbor that
//! is strictly closer. The topology builder only needs the edge set, so this module exposes a
//! single function extracting every vertex pair of every simplex.
//!
//! Degenerate inputs (coincident points, affinely dependent configurations) surface as
//! [`TopologyError`], and the caller falls back to KNN construction.

use crate::geometry::Vector;
use crate::net::types::TopologyError;
use std::collections::{HashMap, HashSet};

/// Distance factor between the data centroid and the enclosing super-simplex. The super
/// vertices must lie outside the circumsphere of every true Delaunay simplex (including flat
/// hull slivers with very large circumspheres), otherwise hull simplices come out wrong. f64
/// keeps ample precision at this scale.
const SUPER_SCALE: f64 = 10_000.0;

/// Pivot threshold under which the circumsphere linear system is considered singular.
const PIVOT_EPSILON: f64 = 1e-12;

/// Compute the Delaunay edge set over the given points. Indices in the returned pairs refer
/// to positions in `points`, each pair is returned once with `a < b`, and the result is sorted
/// so that callers construct identical graphs for identical inputs.
pub(crate) fn delaunay_edges(points: &[Vector]) -> Result<Vec<(usize, usize)>, TopologyError> {
    let n = points.len();
    let dim = match points.first() {
        Some(p) => p.dim(),
        None => return Err(TopologyError::TooFewPoints { have: 0, need: 2 }),
    };
    if n < dim + 2 {
        return Err(TopologyError::TooFewPoints { have: n, need: dim + 2 });
    }

    // real points first, then the d+1 vertices of the enclosing super-simplex
    let mut pts: Vec<Vec<f64>> = points.iter().map(|p| p.coords().to_vec()).collect();
    check_not_degenerate(&pts, dim)?;
    let super_verts = super_simplex(&pts, dim);
    pts.extend(super_verts);

    let first = Simplex::new(&pts, (n..n + dim + 1).collect())?;
    let mut simplices: Vec<Simplex> = vec![first];

    for point in 0..n {
        simplices = insert_point(&pts, simplices, point)?;
    }

    // collect the unique edges between real points; simplices touching the super vertices are
    // hull artifacts and get dropped here
    let mut edges: HashSet<(usize, usize)> = HashSet::new();
    for simplex in &simplices {
        for (i, &a) in simplex.verts.iter().enumerate() {
            for &b in simplex.verts.iter().skip(i + 1) {
                if a < n && b < n {
                    edges.insert((a.min(b), a.max(b)));
                }
            }
        }
    }
    let mut edges: Vec<(usize, usize)> = edges.into_iter().collect();
    edges.sort_unstable();
    Ok(edges)
}

/// One insertion step of Bowyer-Watson: remove every simplex whose circumsphere contains the
/// new point, then re-triangulate the cavity boundary against the new point.
fn insert_point(
    pts: &[Vec<f64>],
    simplices: Vec<Simplex>,
    point: usize,
) -> Result<Vec<Simplex>, TopologyError> {
    let (bad, mut keep): (Vec<Simplex>, Vec<Simplex>) =
        simplices.into_iter().partition(|s| s.circumsphere_contains(&pts[point]));
    if bad.is_empty() {
        // the super-simplex encloses every point, so an empty cavity can only come from a
        // numerically broken circumsphere
        return Err(TopologyError::Degenerate("point outside every circumsphere"));
    }

    // boundary facets are those appearing in exactly one bad simplex
    let mut facet_count: HashMap<Vec<usize>, usize> = HashMap::new();
    for simplex in &bad {
        for skip in 0..simplex.verts.len() {
            let mut facet: Vec<usize> = simplex
                .verts
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, v)| *v)
                .collect();
            facet.sort_unstable();
            *facet_count.entry(facet).or_insert(0) += 1;
        }
    }

    for (facet, count) in facet_count {
        if count != 1 {
            continue;
        }
        let mut verts = facet;
        verts.push(point);
        keep.push(Simplex::new(pts, verts)?);
    }
    Ok(keep)
}

/// Reject point sets the tessellation cannot handle: coincident points, and configurations
/// that do not span the full space (for those, every simplex would be flat). Both cases make
/// the caller fall back to KNN.
fn check_not_degenerate(pts: &[Vec<f64>], dim: usize) -> Result<(), TopologyError> {
    for (i, p) in pts.iter().enumerate() {
        for q in pts.iter().skip(i + 1) {
            let d2: f64 = p.iter().zip(q.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
            if d2 < PIVOT_EPSILON {
                return Err(TopologyError::Degenerate("coincident points"));
            }
        }
    }

    // rank of the difference matrix must be the full dimension
    let mut rows: Vec<Vec<f64>> = pts
        .iter()
        .skip(1)
        .map(|p| p.iter().zip(pts[0].iter()).map(|(a, b)| a - b).collect())
        .collect();
    let scale = rows
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, x| acc.max(x.abs()))
        .max(1.0);
    let mut rank = 0;
    for col in 0..dim {
        let pivot = (rank..rows.len()).max_by(|&i, &j| {
            rows[i][col]
                .abs()
                .partial_cmp(&rows[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let pivot = match pivot {
            Some(p) if rows[p][col].abs() > PIVOT_EPSILON * scale => p,
            _ => continue,
        };
        rows.swap(rank, pivot);
        for row in (rank + 1)..rows.len() {
            let factor = rows[row][col] / rows[rank][col];
            for k in col..dim {
                rows[row][k] -= factor * rows[rank][k];
            }
        }
        rank += 1;
    }
    if rank < dim {
        return Err(TopologyError::Degenerate("points do not span the space"));
    }
    Ok(())
}

/// Vertices of a simplex that encloses all data points, placed far away from the data.
fn super_simplex(pts: &[Vec<f64>], dim: usize) -> Vec<Vec<f64>> {
    let n = pts.len() as f64;
    let mut centroid = vec![0.0; dim];
    for p in pts {
        for (c, x) in centroid.iter_mut().zip(p.iter()) {
            *c += x / n;
        }
    }
    let radius = pts
        .iter()
        .map(|p| {
            p.iter().zip(centroid.iter()).map(|(x, c)| (x - c) * (x - c)).sum::<f64>().sqrt()
        })
        .fold(0.0, f64::max);
    let m = SUPER_SCALE * (radius + 1.0);

    // base vertex below the data in every coordinate, the others far out along each axis; the
    // simplex {x_i >= base_i, sum(x_i - base_i) <= 3 m d} contains the data ball
    let base: Vec<f64> = centroid.iter().map(|c| c - m).collect();
    let mut verts = vec![base.clone()];
    for axis in 0..dim {
        let mut v = base.clone();
        v[axis] += 3.0 * m * dim as f64;
        verts.push(v);
    }
    verts
}

#[derive(Debug, Clone)]
struct Simplex {
    verts: Vec<usize>,
    center: Vec<f64>,
    radius_sq: f64,
}

impl Simplex {
    fn new(pts: &[Vec<f64>], verts: Vec<usize>) -> Result<Self, TopologyError> {
        let (center, radius_sq) = circumsphere(pts, &verts)?;
        Ok(Self { verts, center, radius_sq })
    }

    fn circumsphere_contains(&self, p: &[f64]) -> bool {
        let d2: f64 =
            p.iter().zip(self.center.iter()).map(|(x, c)| (x - c) * (x - c)).sum();
        d2 < self.radius_sq
    }
}

/// Circumcenter and squared circumradius of a d-simplex in d dimensions. The center `c` is
/// equidistant from all vertices, which reduces to the linear system
/// `2 (p_i - p_0) . c = |p_i|^2 - |p_0|^2` for `i = 1..d`.
fn circumsphere(pts: &[Vec<f64>], verts: &[usize]) -> Result<(Vec<f64>, f64), TopologyError> {
    let dim = pts[verts[0]].len();
    debug_assert_eq!(verts.len(), dim + 1);
    let p0 = &pts[verts[0]];
    let norm0: f64 = p0.iter().map(|x| x * x).sum();

    let mut matrix: Vec<Vec<f64>> = Vec::with_capacity(dim);
    let mut rhs: Vec<f64> = Vec::with_capacity(dim);
    for &v in verts.iter().skip(1) {
        let p = &pts[v];
        matrix.push(p.iter().zip(p0.iter()).map(|(a, b)| 2.0 * (a - b)).collect());
        rhs.push(p.iter().map(|x| x * x).sum::<f64>() - norm0);
    }

    let center = solve_linear(matrix, rhs)
        .ok_or(TopologyError::Degenerate("affinely dependent simplex vertices"))?;
    let radius_sq = center.iter().zip(p0.iter()).map(|(c, x)| (c - x) * (c - x)).sum();
    Ok((center, radius_sq))
}

/// Solve `A x = b` by Gaussian elimination with partial pivoting. Returns `None` when the
/// matrix is (numerically) singular.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    // the pivot threshold has to follow the magnitude of the matrix entries, since the super
    // simplex coordinates are orders of magnitude larger than the data
    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, x| acc.max(x.abs()))
        .max(1.0);

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&i, &j| {
            a[i][col].abs().partial_cmp(&a[j][col].abs()).unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot_row][col].abs() < PIVOT_EPSILON * scale {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for col in (row + 1)..n {
            acc -= a[row][col] * x[col];
        }
        x[row] = acc / a[row][row];
    }
    Some(x)
}
