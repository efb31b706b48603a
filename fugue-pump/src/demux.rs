// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routing of packets from a container reader into per-stream buffers.

use std::collections::BTreeMap;

use fugue_core::errors::{usage_error, Result, UsageErrorKind};
use fugue_core::formats::{FormatReader, SeekedTo, Stream};
use fugue_core::packet::Packet;
use fugue_core::units::Timestamp;

use log::{debug, trace};

use crate::buffer::PacketBuffer;

/// The outcome of a pull.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pull {
    /// The predicate holds.
    Satisfied,
    /// The input is exhausted and the predicate does not hold.
    EndOfInput,
}

/// The `DemuxRouter` reads packets from a `FormatReader` in container order and routes each one
/// into the buffer of the stream it belongs to. Packets of streams that are not open are dropped.
pub struct DemuxRouter {
    reader: Box<dyn FormatReader>,
    buffers: BTreeMap<u32, PacketBuffer>,
    end_of_input: bool,
    packets_read: u64,
    packets_dropped: u64,
}

impl DemuxRouter {
    pub fn new(reader: Box<dyn FormatReader>) -> Self {
        DemuxRouter {
            reader,
            buffers: Default::default(),
            end_of_input: false,
            packets_read: 0,
            packets_dropped: 0,
        }
    }

    /// Get the streams of the underlying container.
    pub fn streams(&self) -> &[Stream] {
        self.reader.streams()
    }

    /// Get a stream of the underlying container.
    pub fn stream(&self, index: u32) -> Option<&Stream> {
        self.reader.stream(index)
    }

    /// Start buffering packets for a stream.
    pub fn open(&mut self, index: u32, limit: usize) -> Result<()> {
        if self.reader.stream(index).is_none() {
            return usage_error(UsageErrorKind::InvalidStream(index));
        }

        if self.buffers.contains_key(&index) {
            return usage_error(UsageErrorKind::StreamAlreadyOpen(index));
        }

        self.buffers.insert(index, PacketBuffer::new(index, limit));
        Ok(())
    }

    /// Stop buffering packets for a stream and release its buffered packets. Returns `false` if
    /// the stream was not open.
    pub fn close(&mut self, index: u32) -> bool {
        self.buffers.remove(&index).is_some()
    }

    /// Returns `true` if packets are being buffered for the stream.
    pub fn is_open(&self, index: u32) -> bool {
        self.buffers.contains_key(&index)
    }

    /// Get the buffer of an open stream.
    pub fn buffer(&self, index: u32) -> Option<&PacketBuffer> {
        self.buffers.get(&index)
    }

    /// Remove and return the oldest buffered packet of a stream.
    pub fn pop(&mut self, index: u32) -> Option<Packet> {
        self.buffers.get_mut(&index).and_then(|buffer| buffer.pop())
    }

    /// Returns `true` once the reader has reported the end of the container.
    pub fn is_end_of_input(&self) -> bool {
        self.end_of_input
    }

    /// The number of packets read from the container, and the number of those dropped because
    /// their stream was not open.
    pub fn packet_counts(&self) -> (u64, u64) {
        (self.packets_read, self.packets_dropped)
    }

    /// Read and route packets until the predicate holds or the input is exhausted.
    ///
    /// The predicate is evaluated before each read, so no packet is read if it already holds.
    pub fn pull_until<F>(&mut self, mut pred: F) -> Result<Pull>
    where
        F: FnMut(&DemuxRouter) -> bool,
    {
        loop {
            if pred(self) {
                return Ok(Pull::Satisfied);
            }

            if self.end_of_input {
                return Ok(Pull::EndOfInput);
            }

            match self.reader.next_packet()? {
                Some(packet) => self.route(packet),
                None => {
                    debug!("end of input after {} packets", self.packets_read);
                    self.end_of_input = true;
                }
            }
        }
    }

    /// Pull until the stream has at least one buffered packet.
    pub fn fill(&mut self, index: u32) -> Result<Pull> {
        if !self.is_open(index) {
            return usage_error(UsageErrorKind::StreamNotOpen(index));
        }

        self.pull_until(|router| router.buffer(index).map_or(true, |buffer| !buffer.is_empty()))
    }

    fn route(&mut self, packet: Packet) {
        self.packets_read += 1;

        let index = packet.stream_index();

        match self.buffers.get_mut(&index) {
            Some(buffer) => {
                trace!(
                    "route packet {{ stream: {}, pts: {:?}, len: {} }}",
                    index,
                    packet.pts(),
                    packet.len()
                );
                buffer.push(packet);
            }
            None => {
                trace!("drop packet {{ stream: {}, len: {} }}", index, packet.len());
                self.packets_dropped += 1;
            }
        }
    }

    /// Reposition the input at a keyframe at or before the timestamp of the given stream.
    ///
    /// Buffers are left untouched. If the reader fails, the router state is unchanged.
    pub fn seek_input(&mut self, index: u32, ts: Timestamp) -> Result<SeekedTo> {
        let seeked = self.reader.seek(index, ts)?;

        debug!(
            "input seeked {{ stream: {}, required_ts: {}, actual_ts: {} }}",
            seeked.stream_index, seeked.required_ts, seeked.actual_ts
        );

        self.end_of_input = false;
        Ok(seeked)
    }

    /// Release the buffered packets of every open stream.
    pub fn discard_all(&mut self) {
        for buffer in self.buffers.values_mut() {
            buffer.discard_all();
        }
    }

    /// Consume the router, returning the underlying reader.
    pub fn into_inner(self) -> Box<dyn FormatReader> {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReader, ReaderCounters};
    use fugue_core::errors::Error;

    fn interleaved() -> (MockReader, ReaderCounters) {
        // Two streams, 5 packets each, interleaved 0, 1, 0, 1, ...
        MockReader::interleaved(2, 5, 1)
    }

    #[test]
    fn verify_routing_preserves_per_stream_order() {
        let (reader, _) = interleaved();
        let mut router = DemuxRouter::new(Box::new(reader));

        router.open(0, 1024).unwrap();
        router.open(1, 1024).unwrap();

        assert_eq!(router.pull_until(|_| false).unwrap(), Pull::EndOfInput);

        for index in 0..2 {
            let pts: Vec<i64> = std::iter::from_fn(|| router.pop(index))
                .map(|p| p.pts().map_or(-1, |ts| ts.get()))
                .collect();
            assert_eq!(pts, [0, 1, 2, 3, 4]);
        }

        assert_eq!(router.packet_counts(), (10, 0));
    }

    #[test]
    fn verify_unopened_streams_are_dropped() {
        let (reader, _) = interleaved();
        let mut router = DemuxRouter::new(Box::new(reader));

        router.open(1, 1024).unwrap();

        assert_eq!(router.fill(1).unwrap(), Pull::Satisfied);
        // The packet of stream 0 that preceded it was read and dropped.
        assert_eq!(router.packet_counts(), (2, 1));
        assert_eq!(router.buffer(1).map(|b| b.len()), Some(1));
    }

    #[test]
    fn verify_pull_stops_when_satisfied() {
        let (reader, _) = interleaved();
        let mut router = DemuxRouter::new(Box::new(reader));

        router.open(0, 1024).unwrap();
        router.open(1, 1024).unwrap();

        assert_eq!(router.fill(0).unwrap(), Pull::Satisfied);
        assert_eq!(router.packet_counts(), (1, 0));

        // Already satisfied, nothing more is read.
        assert_eq!(router.fill(0).unwrap(), Pull::Satisfied);
        assert_eq!(router.packet_counts(), (1, 0));
    }

    #[test]
    fn verify_end_of_input_is_distinguished() {
        let (reader, _) = MockReader::interleaved(2, 1, 1);
        let mut router = DemuxRouter::new(Box::new(reader));

        router.open(0, 1024).unwrap();

        assert_eq!(router.fill(0).unwrap(), Pull::Satisfied);
        router.pop(0);
        assert_eq!(router.fill(0).unwrap(), Pull::EndOfInput);
        assert!(router.is_end_of_input());
    }

    #[test]
    fn verify_usage_errors() {
        let (reader, _) = interleaved();
        let mut router = DemuxRouter::new(Box::new(reader));

        assert!(matches!(
            router.open(9, 1024),
            Err(Error::UsageError(UsageErrorKind::InvalidStream(9)))
        ));
        assert!(matches!(
            router.fill(0),
            Err(Error::UsageError(UsageErrorKind::StreamNotOpen(0)))
        ));

        router.open(0, 1024).unwrap();
        assert!(matches!(
            router.open(0, 1024),
            Err(Error::UsageError(UsageErrorKind::StreamAlreadyOpen(0)))
        ));
    }

    #[test]
    fn verify_seek_resets_end_of_input() {
        let (reader, counters) = interleaved();
        let mut router = DemuxRouter::new(Box::new(reader));

        router.open(0, 1024).unwrap();
        router.pull_until(|_| false).unwrap();
        assert!(router.is_end_of_input());

        let seeked = router.seek_input(0, Timestamp::new(3)).unwrap();
        assert_eq!(seeked.actual_ts, Timestamp::new(3));
        assert!(!router.is_end_of_input());
        assert_eq!(counters.seeks(), 1);

        // Buffers survive a seek of the input until explicitly discarded.
        assert_eq!(router.buffer(0).map(|b| b.len()), Some(5));
        router.discard_all();
        assert_eq!(router.buffer(0).map(|b| b.len()), Some(0));
    }
}
