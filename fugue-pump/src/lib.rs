// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project Fugue streaming pump and synchronization layer.
//!
//! This crate drives codec and container engines that implement the `fugue-core` traits. It
//! provides per-stream packet buffering under a memory budget, a pull-based decode loop that
//! tolerates partial engine progress, keyframe resynchronization for random access, and the
//! timestamp discipline of the encode path.
//!
//! Most applications only use the two host surfaces, [`InputContainer`] and
//! [`OutputContainer`]. The building blocks they are composed of are public for applications that
//! need to assemble a custom pipeline.

pub mod buffer;
pub mod decode;
pub mod demux;
pub mod encode;
pub mod input;
pub mod options;
pub mod output;
pub mod seek;

#[cfg(test)]
mod mock;

pub use input::InputContainer;
pub use options::{PumpOptions, SeekThreshold};
pub use output::OutputContainer;
