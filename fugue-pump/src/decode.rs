// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The pull-based decode loop of a single stream.

use fugue_core::codecs::{Decoder, Receive, Submit};
use fugue_core::errors::{engine_error, Result};
use fugue_core::formats::Stream;
use fugue_core::frame::Frame;
use fugue_core::packet::Packet;
use fugue_core::units::{Duration, Timestamp};

use log::{debug, error, warn};

use crate::demux::DemuxRouter;
use crate::options::frame_duration;

/// The state of a `DecodePump`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PumpState {
    /// The next input is taken from the stream's packet buffer.
    Normal,
    /// The decoder refused the last input. It is submitted again before anything else.
    AwaitingRetry,
    /// The decoder was drained. No more frames will be produced until the pump is reset.
    EndOfStream,
}

/// Counters of a `DecodePump`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Packets accepted by the decoder.
    pub packets_submitted: u64,
    /// Submissions the decoder refused.
    pub retries: u64,
    /// Frames produced by the decoder.
    pub frames_decoded: u64,
    /// Frames decoded and discarded while skipping forward to a seek target.
    pub frames_skipped: u64,
    /// The number of times the pump was reset.
    pub resets: u64,
}

/// An input for the decoder. `Flush` is the end-of-stream sentinel.
enum Input {
    Packet(Packet),
    Flush,
}

/// A `DecodePump` feeds the packets buffered for one stream into its decoder and pulls frames
/// out of it.
///
/// The decoder is never blocked on. A refused input is held and submitted again on the next
/// iteration, after the decoder has been polled for output. The end-of-stream sentinel is
/// submitted once, after the stream's buffer and the input are both exhausted.
pub struct DecodePump {
    stream_index: u32,
    decoder: Box<dyn Decoder>,
    state: PumpState,
    pending: Option<Input>,
    flushed: bool,
    frame: Frame,
    position: Option<Timestamp>,
    next_pts: Timestamp,
    frame_dur: Duration,
    warned_missing_pts: bool,
    stats: DecodeStats,
}

impl DecodePump {
    pub fn new(stream: &Stream, decoder: Box<dyn Decoder>) -> Self {
        DecodePump {
            stream_index: stream.index,
            decoder,
            state: PumpState::Normal,
            pending: None,
            flushed: false,
            frame: Default::default(),
            position: None,
            next_pts: stream.start_ts,
            frame_dur: frame_duration(stream),
            warned_missing_pts: false,
            stats: Default::default(),
        }
    }

    /// The index of the stream this pump decodes.
    pub fn stream_index(&self) -> u32 {
        self.stream_index
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Get the decoder.
    pub fn decoder(&self) -> &dyn Decoder {
        self.decoder.as_ref()
    }

    /// The presentation timestamp of the last frame produced, or `None` if no frame was produced
    /// since the pump was created or reset.
    pub fn position(&self) -> Option<Timestamp> {
        self.position
    }

    /// The timestamp the pump is positioned at: the position if a frame was produced, otherwise
    /// the timestamp decoding is expected to resume from.
    pub fn cursor(&self) -> Timestamp {
        self.position.unwrap_or(self.next_pts)
    }

    /// Get the last frame produced, if it is still valid.
    pub fn current_frame(&self) -> Option<&Frame> {
        match self.position {
            Some(pts) if self.frame.pts == Some(pts) => Some(&self.frame),
            _ => None,
        }
    }

    /// Produce the next frame of the stream, or `None` once the decoder has been drained.
    ///
    /// The returned frame is owned by the pump and is overwritten by the next call.
    pub fn next_frame(&mut self, router: &mut DemuxRouter) -> Result<Option<&Frame>> {
        loop {
            if self.state == PumpState::EndOfStream {
                return Ok(None);
            }

            let mut refused = false;

            if !self.flushed {
                let input = match self.pending.take() {
                    Some(input) => input,
                    None => self.next_input(router)?,
                };

                let packet = match &input {
                    Input::Packet(packet) => Some(packet),
                    Input::Flush => None,
                };

                match self.decoder.send_packet(packet)? {
                    Submit::Accepted => {
                        match input {
                            Input::Packet(_) => self.stats.packets_submitted += 1,
                            Input::Flush => {
                                debug!("stream {}: decoder flushed", self.stream_index);
                                self.flushed = true;
                            }
                        }
                        self.state = PumpState::Normal;
                    }
                    Submit::Retry => {
                        self.stats.retries += 1;
                        self.pending = Some(input);
                        self.state = PumpState::AwaitingRetry;
                        refused = true;
                    }
                }
            }

            match self.decoder.receive_frame(&mut self.frame)? {
                Receive::Frame => break,
                Receive::Retry if refused => {
                    // Neither side can make progress.
                    error!(
                        "stream {}: decoder '{}' refused input without producing output",
                        self.stream_index,
                        self.decoder.codec_info().short_name
                    );
                    return engine_error(format!(
                        "decoder '{}' refused input without producing output",
                        self.decoder.codec_info().short_name
                    ));
                }
                Receive::Retry if self.flushed => {
                    debug!("stream {}: decoder has no more output after flush", self.stream_index);
                    self.state = PumpState::EndOfStream;
                    return Ok(None);
                }
                Receive::Retry => continue,
                Receive::EndOfStream => {
                    debug!("stream {}: end of stream", self.stream_index);
                    self.state = PumpState::EndOfStream;
                    return Ok(None);
                }
            }
        }

        self.stamp_frame();

        Ok(Some(&self.frame))
    }

    /// Decode frames until one with a presentation timestamp at or after `target` is produced.
    /// Frames before the target are discarded. Returns `None` if the stream ends first.
    pub fn skip_forward(
        &mut self,
        router: &mut DemuxRouter,
        target: Timestamp,
    ) -> Result<Option<&Frame>> {
        loop {
            let reached = match self.next_frame(router)? {
                Some(frame) => frame.pts.map_or(false, |pts| pts >= target),
                None => return Ok(None),
            };

            if reached {
                break;
            }

            self.stats.frames_skipped += 1;
        }

        Ok(Some(&self.frame))
    }

    /// Return the pump to its initial state after the input was repositioned. `origin` is the
    /// timestamp, in the stream's time base, decoding is expected to resume from.
    pub fn reset(&mut self, origin: Timestamp) {
        self.decoder.reset();
        self.state = PumpState::Normal;
        self.pending = None;
        self.flushed = false;
        self.frame.clear();
        self.position = None;
        self.next_pts = origin;
        self.stats.resets += 1;
    }

    fn next_input(&mut self, router: &mut DemuxRouter) -> Result<Input> {
        if let Some(packet) = router.pop(self.stream_index) {
            return Ok(Input::Packet(packet));
        }

        router.fill(self.stream_index)?;

        Ok(match router.pop(self.stream_index) {
            Some(packet) => Input::Packet(packet),
            None => Input::Flush,
        })
    }

    /// Give the frame a best-effort presentation timestamp and advance the position.
    fn stamp_frame(&mut self) {
        let pts = match self.frame.pts {
            Some(pts) => pts,
            None => {
                if !self.warned_missing_pts {
                    warn!(
                        "stream {}: decoder produced frames without timestamps, extrapolating",
                        self.stream_index
                    );
                    self.warned_missing_pts = true;
                }
                self.frame.pts = Some(self.next_pts);
                self.next_pts
            }
        };

        let dur = if self.frame.dur.is_zero() { self.frame_dur } else { self.frame.dur };

        self.next_pts = pts.saturating_add(Duration::new(dur.get().max(1)));
        self.position = Some(pts);
        self.stats.frames_decoded += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{DecoderCounters, MockDecoder, MockReader};
    use fugue_core::errors::Error;

    fn pump_with(reader: MockReader, decoder: MockDecoder) -> (DemuxRouter, DecodePump) {
        let mut router = DemuxRouter::new(Box::new(reader));
        router.open(0, 1024).unwrap();

        let pump = DecodePump::new(&router.streams()[0], Box::new(decoder));

        (router, pump)
    }

    fn pump(
        reader: MockReader,
        capacity: usize,
        delay: usize,
    ) -> (DemuxRouter, DecodePump, DecoderCounters) {
        let (decoder, counters) = MockDecoder::new(capacity, delay);
        let (router, pump) = pump_with(reader, decoder);
        (router, pump, counters)
    }

    fn decode_all(router: &mut DemuxRouter, pump: &mut DecodePump) -> Vec<i64> {
        let mut out = Vec::new();

        while let Some(frame) = pump.next_frame(router).unwrap() {
            out.push(frame.pts.map_or(-1, |pts| pts.get()));
        }

        out
    }

    #[test]
    fn verify_decode_in_order_and_drained() {
        let (reader, _) = MockReader::interleaved(1, 20, 5);
        let (mut router, mut pump, _) = pump(reader, 4, 2);

        let pts = decode_all(&mut router, &mut pump);

        assert_eq!(pts, (0..20).collect::<Vec<_>>());
        assert_eq!(pump.state(), PumpState::EndOfStream);
        assert_eq!(pump.stats().packets_submitted, 20);
        assert_eq!(pump.stats().frames_decoded, 20);

        // A drained pump stays drained.
        assert!(pump.next_frame(&mut router).unwrap().is_none());
    }

    #[test]
    fn verify_refused_input_is_resubmitted() {
        // Refuses input while a batch of three frames is being emitted.
        let (reader, _) = MockReader::interleaved(1, 10, 1);
        let (decoder, counters) = MockDecoder::batched(3);
        let (mut router, mut pump) = pump_with(reader, decoder);

        let pts = decode_all(&mut router, &mut pump);

        assert_eq!(pts, (0..10).collect::<Vec<_>>());
        assert!(counters.refusals() > 0);
        assert_eq!(pump.stats().retries as usize, counters.refusals());
        // Nothing was lost or duplicated by the retries.
        assert_eq!(pump.stats().packets_submitted, 10);
    }

    #[test]
    fn verify_bounded_progress() {
        let (reader, _) = MockReader::interleaved(1, 50, 1);
        let (mut router, mut pump, counters) = pump(reader, 2, 1);

        let mut last = 0;

        while pump.next_frame(&mut router).unwrap().is_some() {
            let sends = counters.sends();
            assert!(sends - last <= 3, "{} submissions for one frame", sends - last);
            last = sends;
        }
    }

    #[test]
    fn verify_stalled_decoder_is_an_error() {
        let (reader, _) = MockReader::interleaved(1, 10, 1);
        let (mut router, mut pump) = pump_with(reader, MockDecoder::stalled());

        assert!(matches!(pump.next_frame(&mut router), Err(Error::EngineError(_))));
    }

    #[test]
    fn verify_missing_timestamps_are_extrapolated() {
        let (reader, _) = MockReader::interleaved(1, 5, 1);
        let (mut router, mut pump, _) = pump(reader.without_timestamps(), 2, 0);

        assert_eq!(decode_all(&mut router, &mut pump), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn verify_skip_forward() {
        let (reader, _) = MockReader::interleaved(1, 30, 10);
        let (mut router, mut pump, _) = pump(reader, 2, 1);

        let frame = pump.skip_forward(&mut router, Timestamp::new(7)).unwrap();
        assert_eq!(frame.and_then(|f| f.pts), Some(Timestamp::new(7)));
        assert_eq!(pump.stats().frames_skipped, 7);
        assert_eq!(pump.position(), Some(Timestamp::new(7)));

        assert!(pump.skip_forward(&mut router, Timestamp::new(100)).unwrap().is_none());
    }

    #[test]
    fn verify_reset() {
        let (reader, _) = MockReader::interleaved(1, 10, 1);
        let (mut router, mut pump, counters) = pump(reader, 2, 1);

        decode_all(&mut router, &mut pump);
        assert_eq!(pump.state(), PumpState::EndOfStream);

        pump.reset(Timestamp::new(4));

        assert_eq!(counters.resets(), 1);
        assert_eq!(pump.state(), PumpState::Normal);
        assert_eq!(pump.position(), None);
        assert_eq!(pump.cursor(), Timestamp::new(4));
        assert!(pump.current_frame().is_none());
    }
}
