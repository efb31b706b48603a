// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The encode loop of a single stream.

use fugue_core::codecs::Encoder;
use fugue_core::errors::{usage_error, Result, UsageErrorKind};
use fugue_core::formats::FormatWriter;
use fugue_core::frame::Frame;
use fugue_core::packet::Packet;
use fugue_core::units::{Duration, TimeBase, Timestamp};

use log::debug;

/// Counters of an `EncodePump`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// Frames submitted to the encoder.
    pub frames_submitted: u64,
    /// Packets handed to the container writer.
    pub packets_written: u64,
    /// The number of times the end-of-stream sentinel was submitted while flushing.
    pub flush_rounds: u64,
}

/// An `EncodePump` submits the frames of one stream to its encoder and hands every packet the
/// encoder produces to the container writer.
///
/// Frame timestamps are in the encoder's time base and must strictly increase. Packet timestamps
/// are rescaled into the time base of the container stream before they are written.
pub struct EncodePump {
    stream_index: u32,
    encoder: Box<dyn Encoder>,
    stream_time_base: TimeBase,
    last_pts: Option<Timestamp>,
    flushed: bool,
    packet: Packet,
    stats: EncodeStats,
}

impl EncodePump {
    pub fn new(stream_index: u32, encoder: Box<dyn Encoder>, stream_time_base: TimeBase) -> Self {
        EncodePump {
            stream_index,
            encoder,
            stream_time_base,
            last_pts: None,
            flushed: false,
            packet: Default::default(),
            stats: Default::default(),
        }
    }

    /// The index of the container stream this pump writes to.
    pub fn stream_index(&self) -> u32 {
        self.stream_index
    }

    /// The time base frame timestamps are expressed in.
    pub fn time_base(&self) -> TimeBase {
        self.encoder.time_base()
    }

    pub fn stats(&self) -> EncodeStats {
        self.stats
    }

    /// The timestamp of the last frame submitted.
    pub fn last_pts(&self) -> Option<Timestamp> {
        self.last_pts
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// The timestamp to assign to the next frame if the caller does not provide one: the last
    /// timestamp advanced by `dur` (at least one tick), or zero for the first frame.
    pub fn next_auto_pts(&self, dur: Duration) -> Timestamp {
        match self.last_pts {
            Some(last) => last.saturating_add(Duration::new(dur.get().max(1))),
            None => Timestamp::ZERO,
        }
    }

    /// Submit a frame and write any packets the encoder produces.
    pub fn push(&mut self, frame: &Frame, writer: &mut dyn FormatWriter) -> Result<()> {
        if self.flushed {
            return usage_error(UsageErrorKind::PushAfterFlush);
        }

        let pts = match frame.pts {
            Some(pts) => pts,
            None => return usage_error(UsageErrorKind::MissingTimestamp),
        };

        if let Some(previous) = self.last_pts {
            if pts <= previous {
                return usage_error(UsageErrorKind::NonMonotonicTimestamp { previous, next: pts });
            }
        }

        self.encoder.send_frame(Some(frame))?;

        self.last_pts = Some(pts);
        self.stats.frames_submitted += 1;

        self.drain(writer)?;
        Ok(())
    }

    /// Drain the encoder completely. May only be called once.
    pub fn flush(&mut self, writer: &mut dyn FormatWriter) -> Result<()> {
        if self.flushed {
            return usage_error(UsageErrorKind::AlreadyFlushed);
        }

        self.flushed = true;

        loop {
            self.encoder.send_frame(None)?;
            self.stats.flush_rounds += 1;

            if self.drain(writer)? == 0 {
                break;
            }
        }

        debug!(
            "stream {}: encoder flushed after {} round(s), {} packet(s) written",
            self.stream_index, self.stats.flush_rounds, self.stats.packets_written
        );

        Ok(())
    }

    fn drain(&mut self, writer: &mut dyn FormatWriter) -> Result<u64> {
        let time_base = self.encoder.time_base();
        let mut count = 0;

        while self.encoder.receive_packet(&mut self.packet)? {
            self.packet.rescale(time_base, self.stream_time_base);
            self.packet.set_stream_index(self.stream_index);

            writer.write_packet(&self.packet)?;

            self.packet.clear();
            count += 1;
        }

        self.stats.packets_written += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEncoder, MockWriter};
    use fugue_core::errors::Error;
    use fugue_core::frame::PixelFormat;

    fn frame(pts: i64) -> Frame {
        let mut frame = Frame::video(1, 1, PixelFormat::Gray8);
        frame.pts = Some(Timestamp::new(pts));
        frame.data_mut()[0] = pts as u8;
        frame
    }

    fn pump(delay: usize) -> EncodePump {
        let encoder = MockEncoder::new(TimeBase::new(1, 30), delay);
        EncodePump::new(2, Box::new(encoder), TimeBase::new(1, 90_000))
    }

    #[test]
    fn verify_timestamps_must_increase() {
        let mut writer = MockWriter::default();
        let mut pump = pump(0);

        pump.push(&frame(0), &mut writer).unwrap();
        pump.push(&frame(5), &mut writer).unwrap();

        match pump.push(&frame(3), &mut writer) {
            Err(Error::UsageError(UsageErrorKind::NonMonotonicTimestamp { previous, next })) => {
                assert_eq!(previous, Timestamp::new(5));
                assert_eq!(next, Timestamp::new(3));
            }
            other => panic!("unexpected result {:?}", other),
        }

        assert!(matches!(
            pump.push(&frame(5), &mut writer),
            Err(Error::UsageError(UsageErrorKind::NonMonotonicTimestamp { .. }))
        ));

        // The rejected frames never reached the encoder.
        assert_eq!(pump.stats().frames_submitted, 2);
        assert_eq!(writer.packets.len(), 2);
    }

    #[test]
    fn verify_missing_timestamp() {
        let mut writer = MockWriter::default();
        let mut pump = pump(0);

        let mut untimed = frame(0);
        untimed.pts = None;

        assert!(matches!(
            pump.push(&untimed, &mut writer),
            Err(Error::UsageError(UsageErrorKind::MissingTimestamp))
        ));
    }

    #[test]
    fn verify_flush_completeness() {
        let mut writer = MockWriter::default();
        let mut pump = pump(3);

        for pts in 0..10 {
            pump.push(&frame(pts), &mut writer).unwrap();
        }

        // Three frames are held back by the encoder.
        assert_eq!(writer.packets.len(), 7);

        pump.flush(&mut writer).unwrap();

        assert_eq!(writer.packets.len(), 10);
        assert_eq!(pump.stats().packets_written, 10);
        // One round drained the held packets, the next produced nothing.
        assert_eq!(pump.stats().flush_rounds, 2);

        for (i, packet) in writer.packets.iter().enumerate() {
            assert_eq!(packet.stream_index(), 2);
            assert_eq!(packet.pts(), Some(Timestamp::new(i as i64 * 3000)));
            assert_eq!(packet.dur(), Duration::new(3000));
            assert_eq!(packet.buf(), [i as u8]);
        }
    }

    #[test]
    fn verify_flush_is_final() {
        let mut writer = MockWriter::default();
        let mut pump = pump(1);

        pump.push(&frame(0), &mut writer).unwrap();
        pump.flush(&mut writer).unwrap();

        assert!(pump.is_flushed());
        assert!(matches!(
            pump.push(&frame(1), &mut writer),
            Err(Error::UsageError(UsageErrorKind::PushAfterFlush))
        ));
        assert!(matches!(
            pump.flush(&mut writer),
            Err(Error::UsageError(UsageErrorKind::AlreadyFlushed))
        ));
    }

    #[test]
    fn verify_next_auto_pts() {
        let mut writer = MockWriter::default();
        let mut pump = pump(0);

        assert_eq!(pump.next_auto_pts(Duration::new(1)), Timestamp::ZERO);

        pump.push(&frame(4), &mut writer).unwrap();

        assert_eq!(pump.next_auto_pts(Duration::new(2)), Timestamp::new(6));
        assert_eq!(pump.next_auto_pts(Duration::ZERO), Timestamp::new(5));
    }
}
