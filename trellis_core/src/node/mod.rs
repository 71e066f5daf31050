// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The host node tree that layers and view nodes live in.
//!
//! [`NodeStore`] keeps every node in parallel arrays addressed by
//! generational [`NodeId`] handles. The surface owns one store: a single
//! [`NodeKind::Root`] node whose children are the layers, whose children in
//! turn are view nodes and, under approximate sorting, z-pivot markers.

mod id;
mod store;
mod traverse;

pub use id::{INVALID, NodeId, NodeKind};
pub use store::NodeStore;
pub use traverse::Children;
