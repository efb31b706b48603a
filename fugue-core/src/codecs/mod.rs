// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `codecs` module provides the traits and support structures necessary to implement codec
//! engines, and the push/pull protocol pumps use to drive them.
//!
//! # Nomenclature
//!
//! * A codec ID refers to a unique identifier for a specific codec.
//! * Codec parameters refers to a set of parameters common to a particular kind of media (e.g.,
//!   audio sample rate).
//!
//! # Protocol
//!
//! Engines are fed and drained through separate calls. A decoder may refuse input
//! ([`Submit::Retry`]) until it has output pending, and may have no output ([`Receive::Retry`])
//! until it receives more input. Input is terminated by submitting `None`, after which the engine
//! emits any frames or packets it still holds.

use std::fmt;

use crate::errors::Result;
use crate::formats::MediaKind;
use crate::frame::{Frame, PixelFormat, SampleFormat};
use crate::packet::Packet;
use crate::units::{FrameRate, TimeBase};

pub mod registry;

/// A `CodecId` identifies a codec independently of the engine implementing it.
///
/// Containers store the raw code of the ID. Codes below `0x8000_0000` are reserved for the
/// [well-known](well_known) IDs; engines for private codecs pick codes at or above it.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodecId(u32);

/// Null codec ID.
pub const CODEC_ID_NULL: CodecId = CodecId(0x0);

impl Default for CodecId {
    fn default() -> Self {
        CODEC_ID_NULL
    }
}

impl CodecId {
    /// Get the raw codec code, as stored in containers.
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Create a codec ID from a raw codec code read from a container.
    pub const fn from_raw(code: u32) -> CodecId {
        Self(code)
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Codec IDs for well-known codecs.
pub mod well_known {
    use super::CodecId;

    /// Uncompressed video pictures.
    pub const CODEC_ID_RAW_VIDEO: CodecId = CodecId(0x100);
    /// Uncompressed interleaved audio samples.
    pub const CODEC_ID_RAW_AUDIO: CodecId = CodecId(0x101);
}

/// Basic information about a codec.
#[derive(Copy, Clone, Debug)]
pub struct CodecInfo {
    /// A short ASCII-only string identifying the codec.
    pub short_name: &'static str,
    /// A longer, more descriptive, string identifying the codec.
    pub long_name: &'static str,
}

/// Codec parameters for video codecs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoCodecParameters {
    /// The codec ID.
    pub codec: CodecId,
    /// Picture width.
    pub width: u32,
    /// Picture height.
    pub height: u32,
    /// Pixel format of decoded pictures.
    pub pixel_format: Option<PixelFormat>,
    /// Nominal frame rate.
    pub frame_rate: Option<FrameRate>,
    /// Extra data (defined by the codec).
    pub extra_data: Option<Box<[u8]>>,
}

impl VideoCodecParameters {
    /// Provide the `CodecId`.
    pub fn for_codec(&mut self, codec: CodecId) -> &mut Self {
        self.codec = codec;
        self
    }

    /// Provide picture dimensions.
    pub fn with_dimensions(&mut self, width: u32, height: u32) -> &mut Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Provide the pixel format.
    pub fn with_pixel_format(&mut self, format: PixelFormat) -> &mut Self {
        self.pixel_format = Some(format);
        self
    }

    /// Provide the nominal frame rate.
    pub fn with_frame_rate(&mut self, rate: FrameRate) -> &mut Self {
        self.frame_rate = Some(rate);
        self
    }

    /// Provide codec extra data.
    pub fn with_extra_data(&mut self, data: Box<[u8]>) -> &mut Self {
        self.extra_data = Some(data);
        self
    }
}

/// Codec parameters for audio codecs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioCodecParameters {
    /// The codec ID.
    pub codec: CodecId,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Format of decoded samples.
    pub sample_format: Option<SampleFormat>,
    /// Number of samples per channel in each packet, if constant.
    pub frames_per_packet: Option<u32>,
    /// Extra data (defined by the codec).
    pub extra_data: Option<Box<[u8]>>,
}

impl AudioCodecParameters {
    /// Provide the `CodecId`.
    pub fn for_codec(&mut self, codec: CodecId) -> &mut Self {
        self.codec = codec;
        self
    }

    /// Provide the sample rate.
    pub fn with_sample_rate(&mut self, rate: u32) -> &mut Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Provide the channel count.
    pub fn with_channels(&mut self, channels: u16) -> &mut Self {
        self.channels = channels;
        self
    }

    /// Provide the sample format.
    pub fn with_sample_format(&mut self, format: SampleFormat) -> &mut Self {
        self.sample_format = Some(format);
        self
    }

    /// Provide the number of samples per channel in each packet.
    pub fn with_frames_per_packet(&mut self, len: u32) -> &mut Self {
        self.frames_per_packet = Some(len);
        self
    }

    /// Provide codec extra data.
    pub fn with_extra_data(&mut self, data: Box<[u8]>) -> &mut Self {
        self.extra_data = Some(data);
        self
    }
}

/// Generic wrapper around kind-specific codec parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecParameters {
    /// Codec parameters for an audio codec.
    Audio(AudioCodecParameters),
    /// Codec parameters for a video codec.
    Video(VideoCodecParameters),
}

impl CodecParameters {
    /// Get the codec ID.
    pub fn codec(&self) -> CodecId {
        match self {
            CodecParameters::Audio(params) => params.codec,
            CodecParameters::Video(params) => params.codec,
        }
    }

    /// Get the kind of media the codec encodes.
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecParameters::Audio(_) => MediaKind::Audio,
            CodecParameters::Video(_) => MediaKind::Video,
        }
    }

    /// If the codec parameters are for an audio codec, returns an immutable reference to the
    /// contained audio codec parameters. Otherwise, returns `None`.
    pub fn audio(&self) -> Option<&AudioCodecParameters> {
        match self {
            CodecParameters::Audio(params) => Some(params),
            _ => None,
        }
    }

    /// If the codec parameters are for a video codec, returns an immutable reference to the
    /// contained video codec parameters. Otherwise, returns `None`.
    pub fn video(&self) -> Option<&VideoCodecParameters> {
        match self {
            CodecParameters::Video(params) => Some(params),
            _ => None,
        }
    }

    /// Derive the time base implied by the codec parameters: the reciprocal of the frame rate for
    /// video, or of the sample rate for audio.
    pub fn natural_time_base(&self) -> Option<TimeBase> {
        match self {
            CodecParameters::Audio(params) => params.sample_rate.and_then(TimeBase::try_from_recip),
            CodecParameters::Video(params) => {
                params.frame_rate.and_then(|rate| rate.frame_time_base())
            }
        }
    }
}

impl From<AudioCodecParameters> for CodecParameters {
    fn from(value: AudioCodecParameters) -> Self {
        CodecParameters::Audio(value)
    }
}

impl From<VideoCodecParameters> for CodecParameters {
    fn from(value: VideoCodecParameters) -> Self {
        CodecParameters::Video(value)
    }
}

/// The result of submitting input to a codec engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Submit {
    /// The input was consumed.
    Accepted,
    /// The engine cannot accept input until output is drained. The same input must be submitted
    /// again later.
    Retry,
}

/// The result of polling a decoder for output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Receive {
    /// A frame was written into the provided buffer.
    Frame,
    /// No output is available until more input is submitted.
    Retry,
    /// The engine was drained and will produce no more output.
    EndOfStream,
}

/// `DecoderOptions` is a common set of options that all decoders use.
#[derive(Copy, Clone, Debug, Default)]
pub struct DecoderOptions {
    /// Output each frame as soon as its packet is submitted instead of buffering for reordering.
    /// Default: `false`.
    pub low_delay: bool,
}

/// `EncoderOptions` is a common set of options that all encoders use.
#[derive(Copy, Clone, Debug)]
pub struct EncoderOptions {
    /// The time base of frames submitted to the encoder. If `None`, the encoder derives one from
    /// the codec parameters.
    pub time_base: Option<TimeBase>,
    /// The maximum number of frames between keyframes. Default: `12`.
    pub gop_size: u32,
    /// The number of frames the encoder may buffer before emitting a packet. Default: `2`.
    pub max_delay: u32,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions { time_base: None, gop_size: 12, max_delay: 2 }
    }
}

/// A `Decoder` implements a codec's decode algorithm. It consumes `Packet`s and produces
/// `Frame`s.
pub trait Decoder: Send {
    /// Get basic information about the codec.
    fn codec_info(&self) -> &CodecInfo;

    /// Gets a reference to the codec parameters the decoder was instantiated with.
    fn codec_params(&self) -> &CodecParameters;

    /// Submit a packet for decoding, or `None` to signal the end of input.
    ///
    /// If `Submit::Retry` is returned, the packet was not consumed and must be submitted again
    /// after at least one frame has been received.
    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<Submit>;

    /// Poll for a decoded frame. On `Receive::Frame`, the frame buffer has been overwritten.
    fn receive_frame(&mut self, frame: &mut Frame) -> Result<Receive>;

    /// Reset the decoder.
    ///
    /// A decoder must be reset when the next packet is discontinuous with respect to the last
    /// decoded packet. Most notably, this occurs after a seek. All buffered input and output is
    /// discarded, and the end-of-input state is cleared.
    fn reset(&mut self);
}

/// An `Encoder` implements a codec's encode algorithm. It consumes `Frame`s and produces
/// `Packet`s.
pub trait Encoder: Send {
    /// Get basic information about the codec.
    fn codec_info(&self) -> &CodecInfo;

    /// Gets a reference to the codec parameters the encoder was instantiated with.
    fn codec_params(&self) -> &CodecParameters;

    /// The time base of submitted frames and produced packets.
    fn time_base(&self) -> TimeBase;

    /// Submit a frame for encoding, or `None` to signal the end of input.
    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()>;

    /// Poll for an encoded packet. Returns `true` if the packet buffer was overwritten, or
    /// `false` if no packet is available.
    fn receive_packet(&mut self, packet: &mut Packet) -> Result<bool>;
}
