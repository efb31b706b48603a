// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use fugue_core::codecs::registry::{RegisterableEncoder, SupportedCodec};
use fugue_core::codecs::{CodecInfo, CodecParameters, Encoder, EncoderOptions};
use fugue_core::errors::{encode_error, unsupported_error, Result};
use fugue_core::frame::{Frame, FrameLayout};
use fugue_core::packet::{Packet, PacketBuilder};
use fugue_core::units::{rescale_duration, Duration, TimeBase};

use crate::{codec_info, RawFormat, SUPPORTED_CODECS};

/// Raw video and audio encoder.
///
/// Every `gop_size`-th video frame is marked as a keyframe. Raw audio has no inter-frame
/// dependencies, so every audio packet is a keyframe. Up to `max_delay` frames are held back
/// before a packet is emitted, and all held frames are released when the encoder is flushed.
pub struct RawEncoder {
    params: CodecParameters,
    info: CodecInfo,
    format: RawFormat,
    time_base: TimeBase,
    gop_size: u64,
    max_delay: usize,
    held: VecDeque<Packet>,
    ready: VecDeque<Packet>,
    frames: u64,
}

impl RawEncoder {
    pub fn try_new(params: &CodecParameters, opts: &EncoderOptions) -> Result<Self> {
        let info = codec_info(params.codec())?;
        let format = RawFormat::try_from_params(params)?;

        let time_base = match opts.time_base.or_else(|| params.natural_time_base()) {
            Some(time_base) => time_base,
            None => return unsupported_error("raw: a time base or frame rate is required"),
        };

        Ok(RawEncoder {
            params: params.clone(),
            info,
            format,
            time_base,
            gop_size: u64::from(opts.gop_size.max(1)),
            max_delay: opts.max_delay as usize,
            held: Default::default(),
            ready: Default::default(),
            frames: 0,
        })
    }

    /// The nominal duration of a frame in the encoder's time base, or zero if unknown.
    fn nominal_duration(&self, layout: FrameLayout) -> Duration {
        match (&self.params, layout) {
            (CodecParameters::Video(params), _) => params
                .frame_rate
                .map(|rate| rate.frame_duration(self.time_base))
                .unwrap_or(Duration::ZERO),
            (CodecParameters::Audio(params), FrameLayout::Audio { samples, .. }) => {
                match params.sample_rate.and_then(TimeBase::try_from_recip) {
                    Some(sample_tb) => {
                        rescale_duration(Duration::from(samples), sample_tb, self.time_base)
                    }
                    None => Duration::ZERO,
                }
            }
            _ => Duration::ZERO,
        }
    }
}

impl Encoder for RawEncoder {
    fn codec_info(&self) -> &CodecInfo {
        &self.info
    }

    fn codec_params(&self) -> &CodecParameters {
        &self.params
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }

    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()> {
        let frame = match frame {
            Some(frame) => frame,
            None => {
                self.ready.extend(self.held.drain(..));
                return Ok(());
            }
        };

        if !self.format.accepts(frame.layout()) || frame.data().len() != frame.layout().data_len()
        {
            return encode_error("raw: frame layout does not match stream format");
        }

        let dur =
            if frame.dur.is_zero() { self.nominal_duration(frame.layout()) } else { frame.dur };
        let keyframe = match self.params {
            CodecParameters::Audio(_) => true,
            _ => self.frames % self.gop_size == 0,
        };

        let mut builder = PacketBuilder::new()
            .stream_index(0)
            .dur(dur)
            .keyframe(keyframe)
            .data(frame.data());

        if let Some(pts) = frame.pts {
            builder = builder.pts(pts).dts(pts);
        }

        self.held.push_back(builder.build());
        self.frames += 1;

        while self.held.len() > self.max_delay {
            self.ready.extend(self.held.pop_front());
        }

        Ok(())
    }

    fn receive_packet(&mut self, packet: &mut Packet) -> Result<bool> {
        match self.ready.pop_front() {
            Some(ready) => {
                *packet = ready;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl RegisterableEncoder for RawEncoder {
    fn try_registry_new(
        params: &CodecParameters,
        opts: &EncoderOptions,
    ) -> Result<Box<dyn Encoder>>
    where
        Self: Sized,
    {
        Ok(Box::new(RawEncoder::try_new(params, opts)?))
    }

    fn supported_codecs() -> &'static [SupportedCodec] {
        SUPPORTED_CODECS
    }
}
