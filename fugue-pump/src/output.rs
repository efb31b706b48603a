// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;

use fugue_core::codecs::registry::CodecRegistry;
use fugue_core::codecs::{CodecParameters, Encoder, EncoderOptions};
use fugue_core::errors::{usage_error, Result, UsageErrorKind};
use fugue_core::formats::{FormatWriter, Stream};
use fugue_core::frame::Frame;
use fugue_core::units::TimeBase;

use log::{debug, info};

use crate::encode::{EncodePump, EncodeStats};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    /// Streams may be added.
    Configuring,
    /// The header was written.
    Writing,
    /// The trailer was written.
    Finalized,
}

/// An `OutputContainer` encodes frames into the streams of a container.
///
/// All streams must be added before the first frame. The container header is written when the
/// first frame is added, and the trailer when the container is finalized.
pub struct OutputContainer<W: FormatWriter> {
    writer: W,
    staged: Vec<(u32, Box<dyn Encoder>)>,
    pumps: BTreeMap<u32, EncodePump>,
    state: State,
}

impl<W: FormatWriter> OutputContainer<W> {
    /// Instantiate an `OutputContainer` that writes with the given container writer.
    pub fn new(writer: W) -> Self {
        OutputContainer {
            writer,
            staged: Default::default(),
            pumps: Default::default(),
            state: State::Configuring,
        }
    }

    /// Add a stream, instantiating an encoder for it from the registry. Returns the index of the
    /// new stream.
    ///
    /// `time_base` is the time base of the container stream. Frames are submitted in the time
    /// base of the encoder, which is selected by `opts`.
    pub fn add_stream(
        &mut self,
        params: &CodecParameters,
        time_base: TimeBase,
        registry: &CodecRegistry,
        opts: &EncoderOptions,
    ) -> Result<u32> {
        self.check_configuring()?;

        let encoder = registry.make_encoder(params, opts)?;

        self.add_stream_with(encoder, time_base)
    }

    /// Add a stream encoded by the provided encoder. Returns the index of the new stream.
    pub fn add_stream_with(
        &mut self,
        encoder: Box<dyn Encoder>,
        time_base: TimeBase,
    ) -> Result<u32> {
        self.check_configuring()?;

        let index = self.writer.add_stream(encoder.codec_params().clone(), time_base)?;

        debug!(
            "stream {}: added with encoder '{}', encoder time base {}, stream time base {}",
            index,
            encoder.codec_info().short_name,
            encoder.time_base(),
            time_base
        );

        self.staged.push((index, encoder));
        Ok(index)
    }

    /// Get the streams of the container.
    pub fn streams(&self) -> &[Stream] {
        self.writer.streams()
    }

    /// The time base frames of a stream are submitted in.
    pub fn frame_time_base(&self, index: u32) -> Option<TimeBase> {
        match self.pumps.get(&index) {
            Some(pump) => Some(pump.time_base()),
            None => self.staged.iter().find(|(i, _)| *i == index).map(|(_, enc)| enc.time_base()),
        }
    }

    /// Encode a frame into a stream.
    ///
    /// The frame timestamp is in the stream's encoder time base and must be greater than that of
    /// the previous frame. If the frame has no timestamp, one is assigned to it following the
    /// previous frame.
    pub fn add_frame(&mut self, index: u32, frame: &mut Frame) -> Result<()> {
        match self.state {
            State::Configuring => self.start()?,
            State::Writing => (),
            State::Finalized => return usage_error(UsageErrorKind::ContainerFinalized),
        }

        let pump = match self.pumps.get_mut(&index) {
            Some(pump) => pump,
            None => return usage_error(UsageErrorKind::InvalidStream(index)),
        };

        if frame.pts.is_none() {
            frame.pts = Some(pump.next_auto_pts(frame.dur));
        }

        pump.push(frame, &mut self.writer)
    }

    /// Flush every encoder and write the trailer. No frames may be added afterwards.
    ///
    /// The container is only finalized once every flush and the trailer succeeded. If an error
    /// is returned, `finalize` may be called again, though the writer may refuse a second
    /// trailer. Encoders flushed by the failed attempt are not flushed a second time.
    pub fn finalize(&mut self) -> Result<()> {
        match self.state {
            State::Configuring => self.start()?,
            State::Writing => (),
            State::Finalized => return usage_error(UsageErrorKind::ContainerFinalized),
        }

        for pump in self.pumps.values_mut().filter(|pump| !pump.is_flushed()) {
            pump.flush(&mut self.writer)?;
        }

        self.writer.write_trailer()?;

        self.state = State::Finalized;

        info!(
            "output finalized, {} packet(s) written",
            self.pumps.values().map(|pump| pump.stats().packets_written).sum::<u64>()
        );

        Ok(())
    }

    /// Returns `true` once the container was finalized.
    pub fn is_finalized(&self) -> bool {
        self.state == State::Finalized
    }

    /// Get the counters of a stream. Only available once frames are being added.
    pub fn stats(&self, index: u32) -> Option<EncodeStats> {
        self.pumps.get(&index).map(|pump| pump.stats())
    }

    /// Get the container writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Consume the container, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn check_configuring(&self) -> Result<()> {
        match self.state {
            State::Configuring => Ok(()),
            State::Writing => usage_error(UsageErrorKind::ContainerLocked),
            State::Finalized => usage_error(UsageErrorKind::ContainerFinalized),
        }
    }

    /// Write the header and start an encode pump per stream.
    fn start(&mut self) -> Result<()> {
        self.writer.write_header()?;

        for (index, encoder) in self.staged.drain(..) {
            let time_base = match self.writer.streams().iter().find(|s| s.index == index) {
                Some(stream) => stream.time_base,
                None => return usage_error(UsageErrorKind::InvalidStream(index)),
            };

            self.pumps.insert(index, EncodePump::new(index, encoder, time_base));
        }

        self.state = State::Writing;

        info!("output header written, {} stream(s)", self.pumps.len());
        Ok(())
    }
}
