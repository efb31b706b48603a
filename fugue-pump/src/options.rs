// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use fugue_core::codecs::CodecParameters;
use fugue_core::formats::Stream;
use fugue_core::units::{rescale_duration, Duration, TimeBase};

/// The distance below which a forward seek decodes through the intervening frames instead of
/// repositioning the input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeekThreshold {
    /// A distance in ticks of the stream's time base.
    Ticks(u64),
    /// A distance in frames. Converted to ticks through the stream's frame rate (video) or packet
    /// size (audio). If neither is known, one frame is assumed to be one tick.
    Frames(u32),
}

impl SeekThreshold {
    /// Get the threshold in ticks of the given stream's time base.
    pub fn to_ticks(&self, stream: &Stream) -> u64 {
        match *self {
            SeekThreshold::Ticks(ticks) => ticks,
            SeekThreshold::Frames(frames) => {
                let frame_dur = frame_duration(stream).get().max(1);
                frame_dur.saturating_mul(u64::from(frames))
            }
        }
    }
}

impl Default for SeekThreshold {
    fn default() -> Self {
        SeekThreshold::Frames(12)
    }
}

/// The nominal duration of one frame of a stream in the stream's time base, or zero if unknown.
pub(crate) fn frame_duration(stream: &Stream) -> Duration {
    match &stream.codec_params {
        CodecParameters::Video(params) => params
            .frame_rate
            .map(|rate| rate.frame_duration(stream.time_base))
            .unwrap_or(Duration::ZERO),
        CodecParameters::Audio(params) => {
            match (params.sample_rate.and_then(TimeBase::try_from_recip), params.frames_per_packet)
            {
                (Some(sample_tb), Some(len)) => {
                    rescale_duration(Duration::from(len), sample_tb, stream.time_base)
                }
                _ => Duration::ZERO,
            }
        }
    }
}

/// `PumpOptions` is the set of options that govern the pumps of a container.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PumpOptions {
    /// The maximum number of payload bytes buffered per stream before the oldest packets are
    /// evicted. Default: 32 MiB.
    pub buffer_limit: usize,
    /// The forward seek distance below which frames are decoded through instead of seeking the
    /// input. Default: 12 frames.
    pub seek_threshold: SeekThreshold,
}

impl Default for PumpOptions {
    fn default() -> Self {
        PumpOptions { buffer_limit: 32 * 1024 * 1024, seek_threshold: Default::default() }
    }
}
