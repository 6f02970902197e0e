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

//! Module containing all error types

use crate::net::{NetError, TopologyError};
use thiserror::Error;

/// Main error type. Only programmer-class conditions end up here; every expected routing
/// condition is reported as a value on the route result instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Error propagated from the network layer
    #[error("Network Error: {0}")]
    NetError(#[from] NetError),
}

impl From<TopologyError> for Error {
    fn from(cause: TopologyError) -> Self {
        Self::NetError(NetError::Topology(cause))
    }
}
