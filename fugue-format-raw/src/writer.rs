// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::io::Write;

use fugue_core::codecs::CodecParameters;
use fugue_core::errors::{limit_error, usage_error, Result, UsageErrorKind};
use fugue_core::formats::{FormatWriter, Stream};
use fugue_core::packet::Packet;
use fugue_core::units::{compare_timestamps, Duration, TimeBase, Timestamp};

use log::{debug, trace};

use crate::chunks::{self, IndexEntry, Trailer};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Configuring,
    Writing,
    Finalized,
}

/// Raw container muxer.
///
/// Packets are interleaved by decode time. A packet is held until every stream has a packet
/// queued, so that the earliest packet across all streams can always be written first. Any
/// packets still queued are written before the trailer.
pub struct RawWriter<W: Write + Send> {
    writer: W,
    streams: Vec<Stream>,
    queues: Vec<VecDeque<Packet>>,
    /// The end of the last packet of each stream.
    ends: Vec<Option<Timestamp>>,
    index: Vec<IndexEntry>,
    /// The number of bytes written so far.
    pos: u64,
    state: State,
}

impl<W: Write + Send> RawWriter<W> {
    pub fn new(writer: W) -> Self {
        RawWriter {
            writer,
            streams: Default::default(),
            queues: Default::default(),
            ends: Default::default(),
            index: Default::default(),
            pos: 0,
            state: State::Configuring,
        }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Unwraps this `RawWriter`, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Pop the queued packet with the earliest decode time across all streams. Ties are broken
    /// in favour of the lowest stream.
    fn pop_earliest(&mut self) -> Option<Packet> {
        let mut earliest: Option<(usize, Timestamp, TimeBase)> = None;

        for (slot, (queue, stream)) in self.queues.iter().zip(&self.streams).enumerate() {
            let ts = match queue.front() {
                Some(packet) => packet.decode_ts().unwrap_or(stream.start_ts),
                None => continue,
            };

            let is_earlier = match earliest {
                Some((_, best_ts, best_tb)) => {
                    compare_timestamps(ts, stream.time_base, best_ts, best_tb) == Ordering::Less
                }
                None => true,
            };

            if is_earlier {
                earliest = Some((slot, ts, stream.time_base));
            }
        }

        let (slot, _, _) = earliest?;
        self.queues.get_mut(slot).and_then(|queue| queue.pop_front())
    }

    fn write_record(&mut self, packet: &Packet) -> Result<()> {
        let offset = self.pos;

        self.pos += chunks::write_packet(&mut self.writer, packet)?;

        let slot = packet.stream_index() as usize;
        let start_ts = self.streams.get(slot).map_or(Timestamp::ZERO, |stream| stream.start_ts);

        if packet.is_keyframe() {
            let ts = packet.pts.or(packet.dts).unwrap_or(start_ts);
            self.index.push(IndexEntry { stream_index: packet.stream_index(), ts, offset });
        }

        if let (Some(pts), Some(end)) = (packet.pts, self.ends.get_mut(slot)) {
            let packet_end = pts.saturating_add(packet.dur);
            *end = Some(end.map_or(packet_end, |end| end.max(packet_end)));
        }

        trace!(
            "raw: wrote packet for stream {} at offset {} (pts={:?}, len={})",
            packet.stream_index(),
            offset,
            packet.pts,
            packet.len()
        );

        Ok(())
    }
}

impl<W: Write + Send> FormatWriter for RawWriter<W> {
    fn add_stream(&mut self, codec_params: CodecParameters, time_base: TimeBase) -> Result<u32> {
        match self.state {
            State::Configuring => (),
            State::Writing => return usage_error(UsageErrorKind::ContainerLocked),
            State::Finalized => return usage_error(UsageErrorKind::ContainerFinalized),
        }

        let index = match u16::try_from(self.streams.len()) {
            Ok(index) => u32::from(index),
            Err(_) => return limit_error("raw: too many streams"),
        };

        self.streams.push(Stream::new(index, codec_params, time_base));
        self.queues.push(Default::default());
        self.ends.push(None);

        Ok(index)
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn write_header(&mut self) -> Result<()> {
        match self.state {
            State::Configuring => (),
            State::Writing => return usage_error(UsageErrorKind::ContainerLocked),
            State::Finalized => return usage_error(UsageErrorKind::ContainerFinalized),
        }

        let mut buf = Vec::new();
        chunks::write_header(&mut buf, &self.streams)?;

        self.writer.write_all(&buf)?;
        self.pos += buf.len() as u64;
        self.state = State::Writing;

        debug!("raw: wrote header with {} stream(s)", self.streams.len());
        Ok(())
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        match self.state {
            State::Configuring => self.write_header()?,
            State::Writing => (),
            State::Finalized => return usage_error(UsageErrorKind::ContainerFinalized),
        }

        let stream_index = packet.stream_index();

        match self.queues.get_mut(stream_index as usize) {
            Some(queue) => queue.push_back(packet.clone()),
            None => return usage_error(UsageErrorKind::InvalidStream(stream_index)),
        }

        while self.queues.iter().all(|queue| !queue.is_empty()) {
            match self.pop_earliest() {
                Some(earliest) => self.write_record(&earliest)?,
                None => break,
            }
        }

        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        match self.state {
            State::Configuring => self.write_header()?,
            State::Writing => (),
            State::Finalized => return usage_error(UsageErrorKind::ContainerFinalized),
        }

        self.state = State::Finalized;

        while let Some(earliest) = self.pop_earliest() {
            self.write_record(&earliest)?;
        }

        let mut durations = Vec::with_capacity(self.streams.len());

        for (stream, end) in self.streams.iter_mut().zip(&self.ends) {
            let duration =
                end.and_then(|end| stream.start_ts.duration_to(end)).unwrap_or(Duration::ZERO);

            stream.duration = Some(duration);
            durations.push((stream.index, duration));
        }

        let trailer = Trailer { durations, index: std::mem::take(&mut self.index) };

        trailer.write(&mut self.writer, self.pos)?;
        self.writer.flush()?;

        debug!(
            "raw: wrote trailer at offset {} with {} index entries",
            self.pos,
            trailer.index.len()
        );

        Ok(())
    }
}
