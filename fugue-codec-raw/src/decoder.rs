// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::VecDeque;

use fugue_core::codecs::registry::{RegisterableDecoder, SupportedCodec};
use fugue_core::codecs::{CodecInfo, CodecParameters, Decoder, DecoderOptions, Receive, Submit};
use fugue_core::errors::{decode_error, Result};
use fugue_core::frame::Frame;
use fugue_core::packet::{Packet, PacketFlags};

use log::{debug, warn};

use crate::{codec_info, RawFormat, SUPPORTED_CODECS};

/// Options specific to the raw decoder.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawDecoderOptions {
    /// The number of packets held before the first frame is output. Default: `1`.
    pub delay: usize,
    /// The maximum number of packets queued. Always at least `delay + 1`. Default: `2`.
    pub queue_len: usize,
}

impl Default for RawDecoderOptions {
    fn default() -> Self {
        RawDecoderOptions { delay: 1, queue_len: 2 }
    }
}

impl From<&DecoderOptions> for RawDecoderOptions {
    fn from(opts: &DecoderOptions) -> Self {
        if opts.low_delay {
            RawDecoderOptions { delay: 0, queue_len: 1 }
        }
        else {
            Default::default()
        }
    }
}

/// Raw video and audio decoder.
pub struct RawDecoder {
    params: CodecParameters,
    info: CodecInfo,
    format: RawFormat,
    queue: VecDeque<Packet>,
    queue_len: usize,
    delay: usize,
    draining: bool,
    awaiting_keyframe: bool,
    gated: u64,
}

impl RawDecoder {
    pub fn try_new(params: &CodecParameters, opts: &DecoderOptions) -> Result<Self> {
        RawDecoder::try_new_with(params, &RawDecoderOptions::from(opts))
    }

    pub fn try_new_with(params: &CodecParameters, opts: &RawDecoderOptions) -> Result<Self> {
        let info = codec_info(params.codec())?;
        let format = RawFormat::try_from_params(params)?;

        Ok(RawDecoder {
            params: params.clone(),
            info,
            format,
            queue: Default::default(),
            queue_len: opts.queue_len.max(opts.delay + 1),
            delay: opts.delay,
            draining: false,
            awaiting_keyframe: false,
            gated: 0,
        })
    }
}

impl Decoder for RawDecoder {
    fn codec_info(&self) -> &CodecInfo {
        &self.info
    }

    fn codec_params(&self) -> &CodecParameters {
        &self.params
    }

    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<Submit> {
        let packet = match packet {
            Some(packet) => packet,
            None => {
                self.draining = true;
                return Ok(Submit::Accepted);
            }
        };

        if self.queue.len() >= self.queue_len {
            return Ok(Submit::Retry);
        }

        // After a reset, decoding can only resume from a keyframe.
        if self.awaiting_keyframe {
            if !packet.is_keyframe() {
                if self.gated == 0 {
                    warn!("raw: dropping packets until the next keyframe");
                }
                self.gated += 1;
                return Ok(Submit::Accepted);
            }

            debug!("raw: resumed at keyframe after dropping {} packet(s)", self.gated);
            self.awaiting_keyframe = false;
            self.gated = 0;
        }

        if packet.flags.contains(PacketFlags::DISCARD) {
            return Ok(Submit::Accepted);
        }

        if self.format.layout_for_len(packet.len()).is_none() {
            return decode_error("raw: packet size does not match stream format");
        }

        self.queue.push_back(packet.clone());

        Ok(Submit::Accepted)
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> Result<Receive> {
        if self.queue.len() > self.delay || (self.draining && !self.queue.is_empty()) {
            if let Some(packet) = self.queue.pop_front() {
                let layout = match self.format.layout_for_len(packet.len()) {
                    Some(layout) => layout,
                    None => return decode_error("raw: packet size does not match stream format"),
                };

                frame.fill(layout, packet.buf());
                frame.pts = packet.pts();
                frame.dts = packet.dts();
                frame.dur = packet.dur();
                frame.keyframe = packet.is_keyframe();

                return Ok(Receive::Frame);
            }
        }

        if self.draining {
            Ok(Receive::EndOfStream)
        }
        else {
            Ok(Receive::Retry)
        }
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.draining = false;
        self.awaiting_keyframe = true;
        self.gated = 0;
    }
}

impl RegisterableDecoder for RawDecoder {
    fn try_registry_new(
        params: &CodecParameters,
        opts: &DecoderOptions,
    ) -> Result<Box<dyn Decoder>>
    where
        Self: Sized,
    {
        Ok(Box::new(RawDecoder::try_new(params, opts)?))
    }

    fn supported_codecs() -> &'static [SupportedCodec] {
        SUPPORTED_CODECS
    }
}
