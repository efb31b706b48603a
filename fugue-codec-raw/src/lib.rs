// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Raw video and audio passthrough codec.
//!
//! The payload of a raw packet is the payload of exactly one frame. Although the codec performs
//! no compression, the decoder and encoder model the buffering behaviour of real engines: a
//! bounded input queue, an output delay, keyframe intervals, and an encoder time base that
//! differs from the container's.

use fugue_core::codecs::registry::SupportedCodec;
use fugue_core::codecs::well_known::{CODEC_ID_RAW_AUDIO, CODEC_ID_RAW_VIDEO};
use fugue_core::codecs::{CodecId, CodecInfo, CodecParameters};
use fugue_core::errors::{unsupported_error, Result};
use fugue_core::frame::{FrameLayout, PixelFormat, SampleFormat};
use fugue_core::support_codec;

mod decoder;
mod encoder;

pub use decoder::{RawDecoder, RawDecoderOptions};
pub use encoder::RawEncoder;

const SUPPORTED_CODECS: &[SupportedCodec] = &[
    support_codec!(CODEC_ID_RAW_VIDEO, "rawvideo", "Raw Video"),
    support_codec!(CODEC_ID_RAW_AUDIO, "rawaudio", "Raw Interleaved Audio"),
];

fn codec_info(id: CodecId) -> Result<CodecInfo> {
    match SUPPORTED_CODECS.iter().find(|codec| codec.id == id) {
        Some(codec) => Ok(codec.info),
        None => unsupported_error("raw: invalid codec"),
    }
}

/// The fixed picture or sample format of a raw stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RawFormat {
    Video { width: u32, height: u32, format: PixelFormat },
    Audio { channels: u16, format: SampleFormat },
}

impl RawFormat {
    fn try_from_params(params: &CodecParameters) -> Result<RawFormat> {
        match params {
            CodecParameters::Video(video) => match video.pixel_format {
                Some(format) if video.width > 0 && video.height > 0 => {
                    Ok(RawFormat::Video { width: video.width, height: video.height, format })
                }
                _ => unsupported_error("raw: picture dimensions and pixel format are required"),
            },
            CodecParameters::Audio(audio) => match audio.sample_format {
                Some(format) if audio.channels > 0 => {
                    Ok(RawFormat::Audio { channels: audio.channels, format })
                }
                _ => unsupported_error("raw: channel count and sample format are required"),
            },
        }
    }

    /// Get the layout of a frame carrying `len` payload bytes, or `None` if no frame of this
    /// format has that size.
    fn layout_for_len(&self, len: usize) -> Option<FrameLayout> {
        match *self {
            RawFormat::Video { width, height, format } => {
                let layout = FrameLayout::Video { width, height, format };
                if layout.data_len() == len {
                    Some(layout)
                }
                else {
                    None
                }
            }
            RawFormat::Audio { channels, format } => {
                let block = usize::from(channels) * format.bytes_per_sample();
                if len % block != 0 {
                    return None;
                }
                let samples = u32::try_from(len / block).ok()?;
                Some(FrameLayout::Audio { samples, channels, format })
            }
        }
    }

    /// Returns `true` if a frame with the given layout can be carried by a stream of this format.
    fn accepts(&self, layout: FrameLayout) -> bool {
        match (*self, layout) {
            (
                RawFormat::Video { width, height, format },
                FrameLayout::Video { width: w, height: h, format: f },
            ) => width == w && height == h && format == f,
            (
                RawFormat::Audio { channels, format },
                FrameLayout::Audio { channels: c, format: f, .. },
            ) => channels == c && format == f,
            _ => false,
        }
    }
}
