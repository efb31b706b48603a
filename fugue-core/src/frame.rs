// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `frame` module defines the decoded frame structure.
//!
//! A `Frame` is a reusable buffer. Pumps allocate one frame per stream and overwrite it on each
//! decode, so references to a frame are only valid until the next call on the same stream.

use crate::formats::MediaKind;
use crate::units::{Duration, Timestamp};

/// The memory layout of a single video picture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit luma only.
    Gray8,
    /// Packed 8-bit red, green, blue.
    Rgb24,
    /// Packed 8-bit red, green, blue, alpha.
    Rgba32,
    /// Planar 8-bit Y'CbCr with 2x2 chroma subsampling.
    Yuv420p,
}

impl PixelFormat {
    /// Get the number of bytes required to store a picture of the given dimensions.
    pub fn picture_size(&self, width: u32, height: u32) -> usize {
        let luma = width as usize * height as usize;

        match self {
            PixelFormat::Gray8 => luma,
            PixelFormat::Rgb24 => 3 * luma,
            PixelFormat::Rgba32 => 4 * luma,
            PixelFormat::Yuv420p => {
                let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize;
                luma + 2 * chroma
            }
        }
    }
}

/// The format of a single audio sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    /// Get the size of one sample in bytes.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }
}

/// Describes how the payload of a `Frame` is to be interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FrameLayout {
    /// The frame has not been populated yet.
    #[default]
    Unset,
    /// A video picture.
    Video { width: u32, height: u32, format: PixelFormat },
    /// A block of interleaved audio samples.
    Audio { samples: u32, channels: u16, format: SampleFormat },
}

impl FrameLayout {
    /// Get the number of payload bytes a frame with this layout carries.
    pub fn data_len(&self) -> usize {
        match *self {
            FrameLayout::Unset => 0,
            FrameLayout::Video { width, height, format } => format.picture_size(width, height),
            FrameLayout::Audio { samples, channels, format } => {
                samples as usize * usize::from(channels) * format.bytes_per_sample()
            }
        }
    }

    /// Get the kind of media the layout describes.
    pub fn kind(&self) -> Option<MediaKind> {
        match self {
            FrameLayout::Unset => None,
            FrameLayout::Video { .. } => Some(MediaKind::Video),
            FrameLayout::Audio { .. } => Some(MediaKind::Audio),
        }
    }
}

/// A decoded video picture or block of audio samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    /// The presentation timestamp in the `TimeBase` of the stream the frame belongs to.
    pub pts: Option<Timestamp>,
    /// The decode timestamp of the packet the frame was decoded from.
    pub dts: Option<Timestamp>,
    /// The presentation duration of the frame.
    pub dur: Duration,
    /// `true` if the frame was decoded from a keyframe.
    pub keyframe: bool,
    layout: FrameLayout,
    data: Vec<u8>,
}

impl Frame {
    /// Allocate a zeroed frame with the given layout.
    pub fn new(layout: FrameLayout) -> Self {
        Frame { layout, data: vec![0; layout.data_len()], ..Default::default() }
    }

    /// Allocate a zeroed video frame.
    pub fn video(width: u32, height: u32, format: PixelFormat) -> Self {
        Frame::new(FrameLayout::Video { width, height, format })
    }

    /// Allocate a zeroed audio frame.
    pub fn audio(samples: u32, channels: u16, format: SampleFormat) -> Self {
        Frame::new(FrameLayout::Audio { samples, channels, format })
    }

    /// Get the frame layout.
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Change the layout of the frame, resizing the payload. Any existing payload bytes that fit
    /// are preserved. The allocation is reused when possible.
    pub fn set_layout(&mut self, layout: FrameLayout) {
        self.layout = layout;
        self.data.resize(layout.data_len(), 0);
    }

    /// Get the frame payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the frame payload mutably.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Replace the layout and payload of the frame in one step. The allocation is reused when
    /// possible.
    pub fn fill(&mut self, layout: FrameLayout, data: &[u8]) {
        self.layout = layout;
        self.data.clear();
        self.data.extend_from_slice(data);
    }

    /// Copy the timing information of another frame into this frame.
    pub fn copy_timing_from(&mut self, other: &Frame) {
        self.pts = other.pts;
        self.dts = other.dts;
        self.dur = other.dur;
        self.keyframe = other.keyframe;
    }

    /// Reset the frame for reuse. The payload allocation is retained.
    pub fn clear(&mut self) {
        self.pts = None;
        self.dts = None;
        self.dur = Duration::ZERO;
        self.keyframe = false;
        self.layout = FrameLayout::Unset;
        self.data.clear();
    }
}
