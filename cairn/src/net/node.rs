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

//! Module defining a single service node positioned in vector space.
//!
//! Identity, position and role are immutable after construction. The dynamic scalars (`load`,
//! `trust`, `latency`, `alive` and the probe-failure counter) are lock-free atomics, so route
//! executors, the trust controller and the health monitor can update them concurrently while
//! holding only a shared reference to the network. The route cache sits behind its own small
//! mutex; it is a hint only and every entry is re-validated on use.

use crate::geometry::{Vector, VectorKey};
use crate::net::types::{NodeId, Role};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

/// A service node in the routing network.
pub struct Node {
    /// Name of the node (unique within a network)
    name: String,
    /// ID of the node
    id: NodeId,
    /// Fixed coordinate in the routing vector space
    position: Vector,
    /// Semantic role (service section)
    role: Role,
    /// Maximum load before the node is excluded from selection
    capacity: f64,
    /// Dynamic workload counter, incremented by the executor on every hop
    load: AtomicF64,
    /// Reliability score in [0, 1], mutated only by the trust controller
    trust: AtomicF64,
    /// Slow moving latency estimate in milliseconds, refreshed by the health monitor
    latency_ms: AtomicF64,
    /// Whether the node participates in routing
    alive: AtomicBool,
    /// Consecutive probe misses, owned by the health monitor
    probe_failures: AtomicU32,
    /// Bounded mapping from rounded target keys to a next-hop hint
    cache: Mutex<RouteCache>,
}

impl Node {
    pub(crate) fn new(name: String, id: NodeId, position: Vector, role: Role, capacity: f64) -> Self {
        assert!(capacity > 0.0, "Node capacity must be positive: {}", capacity);
        Self {
            name,
            id,
            position,
            role,
            capacity,
            load: AtomicF64::new(0.0),
            trust: AtomicF64::new(1.0),
            latency_ms: AtomicF64::new(0.0),
            alive: AtomicBool::new(true),
            probe_failures: AtomicU32::new(0),
            cache: Mutex::new(RouteCache::new()),
        }
    }

    /// Return the name of the node
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Return the id of the node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Return the position of the node in the routing vector space
    pub fn position(&self) -> &Vector {
        &self.position
    }

    /// Return the semantic role of the node
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Return the capacity of the node
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Current workload counter
    pub fn load(&self) -> f64 {
        self.load.load()
    }

    /// Increase the workload counter. Load never decreases during a request; only
    /// [`Node::reset_load`] brings it back down.
    pub fn add_load(&self, amount: f64) {
        self.load.fetch_update(|x| x + amount);
    }

    /// Reset the workload counter to zero (operator command)
    pub fn reset_load(&self) {
        self.load.store(0.0);
    }

    /// Whether the load has reached the capacity. A node at capacity is excluded from
    /// selection.
    pub fn at_capacity(&self) -> bool {
        self.load() >= self.capacity
    }

    /// Current trust score in [0, 1]
    pub fn trust(&self) -> f64 {
        self.trust.load()
    }

    /// Set the trust score, clamped to [0, 1] (operator command)
    pub fn set_trust(&self, value: f64) {
        self.trust.store(value.max(0.0).min(1.0));
    }

    /// Apply a bounded trust delta and return `(old, new)`.
    pub(crate) fn adjust_trust(&self, delta: f64) -> (f64, f64) {
        self.trust.fetch_update(|x| (x + delta).max(0.0).min(1.0))
    }

    /// Current latency estimate in milliseconds
    pub fn latency_ms(&self) -> f64 {
        self.latency_ms.load()
    }

    /// Update the latency estimate (health monitor or operator)
    pub fn set_latency_ms(&self, value: f64) {
        self.latency_ms.store(value.max(0.0));
    }

    /// Whether the node is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_failed(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub(crate) fn mark_alive(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    /// Increment the consecutive probe miss counter, returning the new count.
    pub(crate) fn record_probe_failure(&self) -> u32 {
        self.probe_failures.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Clear the consecutive probe miss counter.
    pub(crate) fn clear_probe_failures(&self) {
        self.probe_failures.store(0, Ordering::SeqCst);
    }

    /// Current consecutive probe miss count.
    pub fn probe_failures(&self) -> u32 {
        self.probe_failures.load(Ordering::SeqCst)
    }

    /// Take a consistent view of the dynamic scalars for one selector step.
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            alive: self.is_alive(),
            load: self.load(),
            trust: self.trust(),
            latency_ms: self.latency_ms(),
        }
    }

    /// Store a next-hop hint for a rounded target key, evicting the oldest entry once
    /// `max_entries` is reached.
    pub fn cache_next_hop(&self, key: VectorKey, next_hop: NodeId, max_entries: usize) {
        self.cache.lock().unwrap().insert(key, next_hop, max_entries);
    }

    /// Look up a cached next-hop hint. The returned id is a hint only; callers must
    /// re-validate it against liveness, role, capacity and the visited set.
    pub fn cached_next_hop(&self, key: &VectorKey) -> Option<NodeId> {
        self.cache.lock().unwrap().get(key)
    }

    /// Drop all cached hints.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    /// Number of cached hints (mostly useful in tests).
    pub fn cache_len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node({} | role={} | pos={} | load={:.1}/{:.1} | trust={:.2} | {})",
            self.name,
            self.role,
            self.position,
            self.load(),
            self.capacity,
            self.trust(),
            if self.is_alive() { "ALIVE" } else { "DOWN" }
        )
    }
}

/// A consistent per-hop view of one node's dynamic scalars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSnapshot {
    /// Whether the node was alive at snapshot time
    pub alive: bool,
    /// Workload counter at snapshot time
    pub load: f64,
    /// Trust score at snapshot time
    pub trust: f64,
    /// Latency estimate at snapshot time
    pub latency_ms: f64,
}

/// `f64` behind an `AtomicU64`, using the bit representation. `std` has no atomic float, and
/// the per-node scalars must be updatable through a shared network reference.
struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self { bits: AtomicU64::new(value.to_bits()) }
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }

    fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::SeqCst);
    }

    /// Apply `f` atomically (compare-exchange loop) and return `(old, new)`.
    fn fetch_update<F: Fn(f64) -> f64>(&self, f: F) -> (f64, f64) {
        let mut old = self.bits.load(Ordering::SeqCst);
        loop {
            let new = f(f64::from_bits(old)).to_bits();
            match self.bits.compare_exchange(old, new, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return (f64::from_bits(old), f64::from_bits(new)),
                Err(current) => old = current,
            }
        }
    }
}

impl fmt::Debug for AtomicF64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.load())
    }
}

/// Bounded FIFO map from rounded target keys to next-hop hints.
#[derive(Debug)]
struct RouteCache {
    entries: HashMap<VectorKey, NodeId>,
    order: VecDeque<VectorKey>,
}

impl RouteCache {
    fn new() -> Self {
        Self { entries: HashMap::new(), order: VecDeque::new() }
    }

    fn insert(&mut self, key: VectorKey, next_hop: NodeId, max_entries: usize) {
        if max_entries == 0 {
            return;
        }
        if self.entries.insert(key.clone(), next_hop).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > max_entries {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn get(&self, key: &VectorKey) -> Option<NodeId> {
        self.entries.get(key).copied()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
