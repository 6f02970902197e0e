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

//! Face routing: the escape hatch around local minima.
//!
//! When greedy selection stalls, we walk face boundaries with the right-hand rule until we
//! find a node strictly closer to the target than where we got stuck, then greedy resumes
//! from there. The walk operates on a projection onto the first two coordinates. In higher
//! dimensions this projection is generally not planar, so the walk is a heuristic rather than
//! a guarantee, and the step budget is the escape hatch for the escape hatch.

use crate::geometry::{Vector, DISTANCE_EPSILON};
use crate::net::{Network, NodeId};
use log::*;
use std::collections::HashSet;
use std::f64::consts::PI;

/// Outcome of one face-routing excursion.
#[derive(Debug, Clone)]
pub struct FaceWalk {
    /// The strictly-closer node the walk ended on, if it found one.
    pub landed: Option<NodeId>,
    /// Every node the walk traversed, starting with the stuck node.
    pub path: Vec<NodeId>,
    /// Whether the walk gave up because the step budget ran out.
    pub budget_exhausted: bool,
}

/// Walk face boundaries from `start` until reaching a node strictly closer to `target` than
/// `start` itself, the walk dead-ends, or `step_budget` steps were taken.
pub fn face_route(
    net: &Network,
    start: NodeId,
    target: &Vector,
    step_budget: usize,
) -> FaceWalk {
    let dist_start = match net.get(start) {
        Ok(node) => node.position().distance(target),
        Err(_) => return FaceWalk { landed: None, path: Vec::new(), budget_exhausted: false },
    };

    let mut visited: HashSet<NodeId> = maplit::hashset![start];
    let mut path = vec![start];
    let mut prev: Option<NodeId> = None;
    let mut current = start;

    for _ in 0..step_budget {
        let next = match prev {
            None => first_step(net, current, target, &visited),
            Some(p) => next_step(net, current, p, &visited),
        };
        let next = match next {
            Some(n) => n,
            None => {
                trace!("face routing dead-ended after {} nodes", path.len());
                return FaceWalk { landed: None, path, budget_exhausted: false };
            }
        };

        path.push(next);
        visited.insert(next);

        if net
            .get(next)
            .map(|n| n.position().distance(target) < dist_start - DISTANCE_EPSILON)
            .unwrap_or(false)
        {
            debug!("face routing found progress after {} steps", path.len() - 1);
            return FaceWalk { landed: Some(next), path, budget_exhausted: false };
        }

        prev = Some(current);
        current = next;
    }

    trace!("face routing exhausted its budget of {} steps", step_budget);
    FaceWalk { landed: None, path, budget_exhausted: true }
}

/// First step: the neighbor with the smallest counter-clockwise offset from the direction
/// toward the target.
fn first_step(
    net: &Network,
    current: NodeId,
    target: &Vector,
    visited: &HashSet<NodeId>,
) -> Option<NodeId> {
    let (cx, cy) = projected(net, current)?;
    let (tx, ty) = project(target);
    let target_angle = (ty - cy).atan2(tx - cx);
    candidate_angles(net, current, visited, None)
        .into_iter()
        .map(|(angle, id)| (ccw_offset(target_angle, angle), id))
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, id)| id)
}

/// Right-hand rule step: order the neighbors counter-clockwise from the arrival direction and
/// take the first that is neither the node we came from nor already part of this walk.
fn next_step(
    net: &Network,
    current: NodeId,
    prev: NodeId,
    visited: &HashSet<NodeId>,
) -> Option<NodeId> {
    let (cx, cy) = projected(net, current)?;
    let (px, py) = projected(net, prev)?;
    let arrival_angle = (py - cy).atan2(px - cx);
    candidate_angles(net, current, visited, Some(prev))
        .into_iter()
        .map(|(angle, id)| (ccw_offset(arrival_angle, angle), id))
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, id)| id)
}

/// Absolute projected angles of all traversable neighbors.
fn candidate_angles(
    net: &Network,
    current: NodeId,
    visited: &HashSet<NodeId>,
    exclude: Option<NodeId>,
) -> Vec<(f64, NodeId)> {
    let (cx, cy) = match projected(net, current) {
        Some(p) => p,
        None => return Vec::new(),
    };
    net.alive_neighbors(current)
        .into_iter()
        .filter(|id| Some(*id) != exclude && !visited.contains(id))
        .filter_map(|id| {
            let (nx, ny) = projected(net, id)?;
            Some(((ny - cy).atan2(nx - cx), id))
        })
        .collect()
}

/// Counter-clockwise offset from `from` to `to`, in `[0, 2π)`.
fn ccw_offset(from: f64, to: f64) -> f64 {
    (to - from).rem_euclid(2.0 * PI)
}

fn projected(net: &Network, id: NodeId) -> Option<(f64, f64)> {
    net.get(id).ok().map(|n| project(n.position()))
}

/// Project onto the first two coordinates. One-dimensional spaces degenerate to the x axis.
fn project(v: &Vector) -> (f64, f64) {
    let x = v[0];
    let y = if v.dim() > 1 { v[1] } else { 0.0 };
    (x, y)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::net::Role;

    /// An arc over a void. Greedy gets stuck at `A`, and every node on the arc stays farther
    /// from the target than `A` until `D`.
    ///
    /// ```text
    ///          C(1,2)
    ///   B(0,1)        D(2,1)
    ///   |              |
    ///   A(0,0) target E(2,0)
    /// ```
    fn arc() -> (Network, Vec<NodeId>) {
        let mut net = Network::new(2);
        let a = net.add_node("A", Vector::new(vec![0.0, 0.0]), Role::from("default"), 20.0);
        let b = net.add_node("B", Vector::new(vec![0.0, 1.0]), Role::from("default"), 20.0);
        let c = net.add_node("C", Vector::new(vec![1.0, 2.0]), Role::from("default"), 20.0);
        let d = net.add_node("D", Vector::new(vec![2.0, 1.0]), Role::from("default"), 20.0);
        let e = net.add_node("E", Vector::new(vec![2.0, 0.0]), Role::from("default"), 20.0);
        net.add_link(a, b);
        net.add_link(b, c);
        net.add_link(c, d);
        net.add_link(d, e);
        (net, vec![a, b, c, d, e])
    }

    #[test]
    fn test_walks_around_the_void() {
        let (net, ids) = arc();
        let target = Vector::new(vec![2.2, 0.0]);
        // B and C are farther from the target than A (2.42 and 2.33 vs 2.2); D at 1.02 is
        // the first node that beats A's distance
        let walk = face_route(&net, ids[0], &target, 30);
        assert_eq!(walk.landed, Some(ids[3]));
        assert_eq!(walk.path, vec![ids[0], ids[1], ids[2], ids[3]]);
        assert!(!walk.budget_exhausted);
    }

    #[test]
    fn test_budget_exhaustion() {
        let (net, ids) = arc();
        let target = Vector::new(vec![2.2, 0.0]);
        let walk = face_route(&net, ids[0], &target, 2);
        assert_eq!(walk.landed, None);
        assert!(walk.budget_exhausted);
        assert_eq!(walk.path.len(), 3);
    }

    #[test]
    fn test_dead_end() {
        let mut net = Network::new(2);
        let a = net.add_node("A", Vector::new(vec![0.0, 0.0]), Role::from("default"), 20.0);
        let b = net.add_node("B", Vector::new(vec![0.0, 1.0]), Role::from("default"), 20.0);
        net.add_link(a, b);
        // B is farther from the target than A and has no other neighbor to continue to
        let walk = face_route(&net, a, &Vector::new(vec![0.5, 0.0]), 30);
        assert_eq!(walk.landed, None);
        assert!(!walk.budget_exhausted);
        assert_eq!(walk.path, vec![a, b]);
    }

    #[test]
    fn test_dead_neighbors_are_ignored() {
        let (net, ids) = arc();
        net.fail(ids[1]).unwrap();
        let walk = face_route(&net, ids[0], &Vector::new(vec![2.2, 0.0]), 30);
        // the only neighbor of A is dead, so the walk cannot even start
        assert_eq!(walk.landed, None);
        assert_eq!(walk.path, vec![ids[0]]);
    }
}
