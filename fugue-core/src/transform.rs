// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `transform` module defines the pixel and sample conversion hook applied to decoded frames.

use crate::errors::Result;
use crate::frame::Frame;

/// A `FrameTransform` converts a decoded frame into another layout (e.g., a different pixel
/// format or picture size).
///
/// Transforms are applied per stream after decoding. The destination frame is owned by the
/// caller and reused between calls, so implementations should resize it with
/// [`Frame::set_layout`] rather than reallocating.
pub trait FrameTransform: Send {
    /// Convert `src` into `dst`. Timing information is copied by the caller.
    fn apply(&mut self, src: &Frame, dst: &mut Frame) -> Result<()>;
}

impl<F> FrameTransform for F
where
    F: FnMut(&Frame, &mut Frame) -> Result<()> + Send,
{
    fn apply(&mut self, src: &Frame, dst: &mut Frame) -> Result<()> {
        self(src, dst)
    }
}
