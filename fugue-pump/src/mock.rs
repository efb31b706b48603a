// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Instrumented engines for unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fugue_core::codecs::well_known::CODEC_ID_RAW_VIDEO;
use fugue_core::codecs::{
    CodecInfo, CodecParameters, Decoder, Encoder, Receive, Submit, VideoCodecParameters,
};
use fugue_core::errors::{engine_error, seek_error, Result, SeekErrorKind};
use fugue_core::formats::{FormatReader, FormatWriter, SeekedTo, Stream};
use fugue_core::frame::{Frame, FrameLayout, PixelFormat};
use fugue_core::packet::{Packet, PacketBuilder, PacketFlags};
use fugue_core::units::{Duration, FrameRate, TimeBase, Timestamp};

const INFO: CodecInfo = CodecInfo { short_name: "mock", long_name: "Mock" };

pub fn video_params() -> CodecParameters {
    let mut params = VideoCodecParameters::default();
    params
        .for_codec(CODEC_ID_RAW_VIDEO)
        .with_dimensions(1, 1)
        .with_pixel_format(PixelFormat::Gray8)
        .with_frame_rate(FrameRate::new(30, 1));
    params.into()
}

/// Shared call counters of a `MockReader`.
#[derive(Clone, Default)]
pub struct ReaderCounters {
    seeks: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl ReaderCounters {
    pub fn seeks(&self) -> usize {
        self.seeks.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// A container of video streams with a 1/30 time base and one frame per tick.
pub struct MockReader {
    streams: Vec<Stream>,
    packets: Vec<Packet>,
    pos: usize,
    seekable: bool,
    failing: bool,
    counters: ReaderCounters,
}

impl MockReader {
    /// Create a container of `streams` streams with `len` packets each, interleaved in
    /// presentation order. Every `gop`-th packet of a stream is a keyframe. The payload of each
    /// packet is its presentation timestamp.
    pub fn interleaved(streams: u32, len: i64, gop: i64) -> (MockReader, ReaderCounters) {
        let tb = TimeBase::new(1, 30);

        let streams: Vec<Stream> = (0..streams)
            .map(|index| {
                let mut stream = Stream::new(index, video_params(), tb);
                stream.with_duration(Duration::new(len as u64));
                stream
            })
            .collect();

        let mut packets = Vec::new();

        for pts in 0..len {
            for stream in &streams {
                packets.push(
                    PacketBuilder::new()
                        .stream_index(stream.index)
                        .pts(Timestamp::new(pts))
                        .dur(Duration::new(1))
                        .keyframe(pts % gop == 0)
                        .data(vec![pts as u8])
                        .build(),
                );
            }
        }

        let counters = ReaderCounters::default();
        let reader = MockReader {
            streams,
            packets,
            pos: 0,
            seekable: true,
            failing: false,
            counters: counters.clone(),
        };
        (reader, counters)
    }

    pub fn unseekable(mut self) -> Self {
        self.seekable = false;
        self
    }

    /// Fail every seek with an I/O error after the reader was moved to the start of the data.
    pub fn failing_seeks(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Replace the time base of every stream. Packet timestamps are kept as they are.
    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        for stream in self.streams.iter_mut() {
            stream.time_base = time_base;
        }
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        for packet in self.packets.iter_mut() {
            packet.pts = None;
        }
        self
    }
}

impl FormatReader for MockReader {
    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        let packet = self.packets.get(self.pos).cloned();

        if packet.is_some() {
            self.pos += 1;
            self.counters.reads.fetch_add(1, Ordering::SeqCst);
        }

        Ok(packet)
    }

    fn seek(&mut self, stream_index: u32, ts: Timestamp) -> Result<SeekedTo> {
        if !self.seekable {
            return seek_error(SeekErrorKind::Unseekable);
        }

        if self.stream(stream_index).is_none() {
            return seek_error(SeekErrorKind::InvalidStream);
        }

        if self.failing {
            self.pos = 0;
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "mock: seek failed").into());
        }

        self.counters.seeks.fetch_add(1, Ordering::SeqCst);

        let keyframe = self
            .packets
            .iter()
            .enumerate()
            .filter(|(_, p)| p.stream_index() == stream_index && p.is_keyframe())
            .take_while(|(_, p)| p.pts().map_or(true, |pts| pts <= ts))
            .last();

        let (pos, actual_ts) = match keyframe {
            Some((pos, packet)) => (pos, packet.pts().unwrap_or(Timestamp::ZERO)),
            None => (0, Timestamp::ZERO),
        };

        self.pos = pos;

        Ok(SeekedTo { stream_index, required_ts: ts, actual_ts })
    }
}

/// Shared call counters of a `MockDecoder`.
#[derive(Clone, Default)]
pub struct DecoderCounters {
    sends: Arc<AtomicUsize>,
    refusals: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
}

impl DecoderCounters {
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn refusals(&self) -> usize {
        self.refusals.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

/// A passthrough decoder with a bounded input queue and an output delay.
pub struct MockDecoder {
    params: CodecParameters,
    queue: VecDeque<Packet>,
    capacity: usize,
    delay: usize,
    draining: bool,
    stalled: bool,
    batched: bool,
    emitting: bool,
    counters: DecoderCounters,
}

impl MockDecoder {
    pub fn new(capacity: usize, delay: usize) -> (MockDecoder, DecoderCounters) {
        let counters = DecoderCounters::default();
        let decoder = MockDecoder {
            params: video_params(),
            queue: Default::default(),
            capacity,
            delay,
            draining: false,
            stalled: false,
            batched: false,
            emitting: false,
            counters: counters.clone(),
        };
        (decoder, counters)
    }

    /// A decoder that buffers `size` packets, then emits all of them while refusing input.
    pub fn batched(size: usize) -> (MockDecoder, DecoderCounters) {
        let (mut decoder, counters) = MockDecoder::new(size, 0);
        decoder.batched = true;
        (decoder, counters)
    }

    /// A decoder that refuses all input and never produces output.
    pub fn stalled() -> MockDecoder {
        let (mut decoder, _) = MockDecoder::new(0, 0);
        decoder.stalled = true;
        decoder
    }
}

impl Decoder for MockDecoder {
    fn codec_info(&self) -> &CodecInfo {
        &INFO
    }

    fn codec_params(&self) -> &CodecParameters {
        &self.params
    }

    fn send_packet(&mut self, packet: Option<&Packet>) -> Result<Submit> {
        self.counters.sends.fetch_add(1, Ordering::SeqCst);

        if self.stalled || self.emitting || self.queue.len() >= self.capacity {
            self.counters.refusals.fetch_add(1, Ordering::SeqCst);
            return Ok(Submit::Retry);
        }

        match packet {
            Some(packet) if packet.flags.contains(PacketFlags::CORRUPT) => {
                engine_error("mock: corrupt packet")
            }
            Some(packet) => {
                self.queue.push_back(packet.clone());
                if self.batched && self.queue.len() >= self.capacity {
                    self.emitting = true;
                }
                Ok(Submit::Accepted)
            }
            None => {
                self.draining = true;
                Ok(Submit::Accepted)
            }
        }
    }

    fn receive_frame(&mut self, frame: &mut Frame) -> Result<Receive> {
        if self.stalled {
            return Ok(Receive::Retry);
        }

        let ready = if self.batched { self.emitting } else { self.queue.len() > self.delay };

        if ready || (self.draining && !self.queue.is_empty()) {
            if let Some(packet) = self.queue.pop_front() {
                if self.queue.is_empty() {
                    self.emitting = false;
                }

                let layout = FrameLayout::Video { width: 1, height: 1, format: PixelFormat::Gray8 };
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
        self.counters.resets.fetch_add(1, Ordering::SeqCst);
        self.queue.clear();
        self.draining = false;
        self.emitting = false;
    }
}

/// A passthrough encoder that holds `delay` frames before emitting packets.
pub struct MockEncoder {
    params: CodecParameters,
    time_base: TimeBase,
    held: VecDeque<Packet>,
    ready: VecDeque<Packet>,
    delay: usize,
}

impl MockEncoder {
    pub fn new(time_base: TimeBase, delay: usize) -> MockEncoder {
        MockEncoder {
            params: video_params(),
            time_base,
            held: Default::default(),
            ready: Default::default(),
            delay,
        }
    }
}

impl Encoder for MockEncoder {
    fn codec_info(&self) -> &CodecInfo {
        &INFO
    }

    fn codec_params(&self) -> &CodecParameters {
        &self.params
    }

    fn time_base(&self) -> TimeBase {
        self.time_base
    }

    fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()> {
        match frame {
            Some(frame) => {
                let mut packet = Packet::new(0, frame.pts, frame.data());
                packet.dts = frame.pts;
                packet.dur = Duration::new(1);
                self.held.push_back(packet);

                while self.held.len() > self.delay {
                    self.ready.extend(self.held.pop_front());
                }
            }
            None => self.ready.extend(self.held.drain(..)),
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

/// A writer that records packets in memory.
#[derive(Default)]
pub struct MockWriter {
    pub streams: Vec<Stream>,
    pub packets: Vec<Packet>,
    pub header_written: bool,
    pub trailer_written: bool,
    /// Fail every attempt to write the trailer.
    pub fail_trailer: bool,
}

impl FormatWriter for MockWriter {
    fn add_stream(&mut self, codec_params: CodecParameters, time_base: TimeBase) -> Result<u32> {
        let index = self.streams.len() as u32;
        self.streams.push(Stream::new(index, codec_params, time_base));
        Ok(index)
    }

    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn write_header(&mut self) -> Result<()> {
        self.header_written = true;
        Ok(())
    }

    fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        self.packets.push(packet.clone());
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        if self.fail_trailer {
            return engine_error("mock: trailer write failed");
        }
        self.trailer_written = true;
        Ok(())
    }
}
