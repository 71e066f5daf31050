// Copyright 2026 the Trellis Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostics tooling for trellis surfaces.
//!
//! - [`pretty::PrettyPrintSink`]: human-readable trace output.
//! - [`recorder::RecorderSink`]: compact binary event recording, read back
//!   with [`recorder::decode`].
//! - [`chrome::export`]: Chrome Trace Event Format export of a recording.

pub mod chrome;
pub mod pretty;
pub mod recorder;
