// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration errors reported by the surface.
//!
//! Only structurally invalid configuration is reported through
//! [`SurfaceError`]. Misuse that indicates a caller bug (stale handles, use
//! after teardown) panics instead.

use alloc::string::String;
use core::fmt;

use crate::cell::CellId;
use crate::node::NodeId;

/// Errors from layer management and cell notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceError {
    /// A layer was added with an empty name.
    MissingLayerName,
    /// The node passed as a layer is not a detached, live layer node.
    InvalidLayerNode(NodeId),
    /// A layer with this name is already registered.
    DuplicateLayer(String),
    /// No layer with this name (or node) is registered.
    UnknownLayer(String),
    /// The layer still holds view nodes or has cells assigned to it.
    LayerNotEmpty {
        /// Name of the layer.
        name: String,
        /// Number of view nodes attached to the layer.
        views: usize,
        /// Number of live cells assigned to the layer.
        cells: usize,
    },
    /// A cell names a layer that does not exist.
    UnknownCellLayer {
        /// The offending cell.
        cell: CellId,
        /// The layer name it asked for.
        layer: String,
    },
    /// No view type is registered for the cell's kind and there is no
    /// fallback.
    UnknownViewKind {
        /// The offending cell.
        cell: CellId,
        /// Its kind.
        kind: String,
    },
    /// The cell is not known to the surface.
    UnknownCell(CellId),
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLayerName => write!(f, "a layer name is required"),
            Self::InvalidLayerNode(node) => {
                write!(f, "{node:?} is not a detached layer node")
            }
            Self::DuplicateLayer(name) => write!(f, "layer \"{name}\" already exists"),
            Self::UnknownLayer(name) => write!(f, "unknown layer \"{name}\""),
            Self::LayerNotEmpty { name, views, cells } => write!(
                f,
                "layer \"{name}\" is not empty ({views} view nodes, {cells} assigned cells)"
            ),
            Self::UnknownCellLayer { cell, layer } => {
                write!(f, "cell {cell} is assigned to unknown layer \"{layer}\"")
            }
            Self::UnknownViewKind { cell, kind } => {
                write!(f, "no view type registered for kind \"{kind}\" of cell {cell}")
            }
            Self::UnknownCell(cell) => write!(f, "unknown cell {cell}"),
        }
    }
}

impl core::error::Error for SurfaceError {}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let e = SurfaceError::LayerNotEmpty {
            name: "cells".into(),
            views: 2,
            cells: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("\"cells\""), "got: {msg}");
        assert!(msg.contains("2 view nodes"), "got: {msg}");

        let e = SurfaceError::UnknownCellLayer {
            cell: CellId(42),
            layer: "overlay".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("42") && msg.contains("overlay"), "got: {msg}");
    }
}
