// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use fugue_core::codecs::registry::CodecRegistry;
use fugue_core::codecs::{Decoder, DecoderOptions};
use fugue_core::errors::{usage_error, Result, UsageErrorKind};
use fugue_core::formats::{FormatReader, Stream};
use fugue_core::frame::Frame;
use fugue_core::transform::FrameTransform;
use fugue_core::units::{Time, Timestamp};

use log::{debug, info};

use crate::decode::{DecodePump, DecodeStats};
use crate::demux::DemuxRouter;
use crate::options::PumpOptions;
use crate::seek::SeekController;

/// A transform and the reusable frame it converts into.
struct Converter {
    transform: Box<dyn FrameTransform>,
    frame: Frame,
}

/// An `InputContainer` decodes frames from the open streams of a container.
///
/// Streams are decoded independently: reading frames from one stream buffers the packets of the
/// other open streams until they are requested. Frames returned by the container are owned by it
/// and remain valid until the next call on the same container.
pub struct InputContainer {
    router: DemuxRouter,
    pumps: BTreeMap<u32, DecodePump>,
    converters: BTreeMap<u32, Converter>,
    seeker: SeekController,
    options: PumpOptions,
}

impl InputContainer {
    /// Instantiate an `InputContainer` that reads from the given container reader.
    pub fn new(reader: Box<dyn FormatReader>, options: &PumpOptions) -> Self {
        info!("input has {} stream(s)", reader.streams().len());

        InputContainer {
            router: DemuxRouter::new(reader),
            pumps: Default::default(),
            converters: Default::default(),
            seeker: SeekController::new(options.seek_threshold),
            options: *options,
        }
    }

    /// Get all streams of the container, open or not.
    pub fn streams(&self) -> &[Stream] {
        self.router.streams()
    }

    /// Open a stream for decoding, instantiating a decoder for it from the registry.
    pub fn open_stream(
        &mut self,
        index: u32,
        registry: &CodecRegistry,
        opts: &DecoderOptions,
    ) -> Result<()> {
        let stream = match self.router.stream(index) {
            Some(stream) => stream,
            None => return usage_error(UsageErrorKind::InvalidStream(index)),
        };

        if self.pumps.contains_key(&index) {
            return usage_error(UsageErrorKind::StreamAlreadyOpen(index));
        }

        let decoder = registry.make_decoder(&stream.codec_params, opts)?;

        self.open_stream_with(index, decoder)
    }

    /// Open a stream for decoding with the provided decoder.
    pub fn open_stream_with(&mut self, index: u32, decoder: Box<dyn Decoder>) -> Result<()> {
        self.router.open(index, self.options.buffer_limit)?;

        let stream = match self.router.stream(index) {
            Some(stream) => stream,
            None => return usage_error(UsageErrorKind::InvalidStream(index)),
        };

        debug!("stream {}: opened with decoder '{}'", index, decoder.codec_info().short_name);

        self.pumps.insert(index, DecodePump::new(stream, decoder));
        Ok(())
    }

    /// Close a stream. Its buffered packets and decoder are released, and packets for it are
    /// dropped from now on. Returns `false` if the stream was not open.
    pub fn close_stream(&mut self, index: u32) -> bool {
        self.converters.remove(&index);

        let closed = self.pumps.remove(&index).is_some();
        self.router.close(index);

        if closed {
            debug!("stream {}: closed", index);
        }

        closed
    }

    /// Returns `true` if the stream is open for decoding.
    pub fn is_open(&self, index: u32) -> bool {
        self.pumps.contains_key(&index)
    }

    /// Convert every frame of an open stream with a transform before it is returned. Replaces
    /// any previous transform of the stream.
    pub fn set_transform(&mut self, index: u32, transform: Box<dyn FrameTransform>) -> Result<()> {
        if !self.pumps.contains_key(&index) {
            return usage_error(UsageErrorKind::StreamNotOpen(index));
        }

        self.converters.insert(index, Converter { transform, frame: Default::default() });
        Ok(())
    }

    /// Remove the transform of a stream.
    pub fn clear_transform(&mut self, index: u32) {
        self.converters.remove(&index);
    }

    /// Decode the next frame of an open stream. Returns `None` at the end of the stream.
    pub fn next_frame(&mut self, index: u32) -> Result<Option<&Frame>> {
        let pump = match self.pumps.get_mut(&index) {
            Some(pump) => pump,
            None => return usage_error(UsageErrorKind::StreamNotOpen(index)),
        };

        match pump.next_frame(&mut self.router)? {
            Some(frame) => convert(&mut self.converters, index, frame),
            None => Ok(None),
        }
    }

    /// Get the first frame of an open stream at or after a time. Returns `None` if there is no
    /// such frame.
    pub fn frame_at(&mut self, index: u32, time: Time) -> Result<Option<&Frame>> {
        match self.seeker.seek(&mut self.router, &mut self.pumps, index, time)? {
            Some(frame) => convert(&mut self.converters, index, frame),
            None => Ok(None),
        }
    }

    /// Get the first frame of an open stream at or after a timestamp in the stream's time base.
    pub fn frame_at_ts(&mut self, index: u32, ts: Timestamp) -> Result<Option<&Frame>> {
        match self.seeker.seek_ts(&mut self.router, &mut self.pumps, index, ts)? {
            Some(frame) => convert(&mut self.converters, index, frame),
            None => Ok(None),
        }
    }

    /// The presentation timestamp of the last frame decoded from a stream.
    pub fn position(&self, index: u32) -> Option<Timestamp> {
        self.pumps.get(&index).and_then(|pump| pump.position())
    }

    /// Get the decode counters of an open stream.
    pub fn stats(&self, index: u32) -> Option<DecodeStats> {
        self.pumps.get(&index).map(|pump| pump.stats())
    }

    /// The number of packets of an open stream that were evicted from its buffer before they
    /// could be decoded.
    pub fn packets_evicted(&self, index: u32) -> Option<u64> {
        self.router.buffer(index).map(|buffer| buffer.evicted())
    }

    /// The number of times the input was repositioned to satisfy a request.
    pub fn seek_count(&self) -> u64 {
        self.seeker.seeks()
    }

    /// The number of packets read from the container, and the number of those dropped because
    /// their stream was not open.
    pub fn packet_counts(&self) -> (u64, u64) {
        self.router.packet_counts()
    }

    /// Close every stream and return the container reader.
    pub fn into_inner(self) -> Box<dyn FormatReader> {
        self.router.into_inner()
    }
}

fn convert<'a>(
    converters: &'a mut BTreeMap<u32, Converter>,
    index: u32,
    frame: &'a Frame,
) -> Result<Option<&'a Frame>> {
    match converters.get_mut(&index) {
        Some(converter) => {
            converter.transform.apply(frame, &mut converter.frame)?;
            converter.frame.copy_timing_from(frame);
            Ok(Some(&converter.frame))
        }
        None => Ok(Some(frame)),
    }
}
