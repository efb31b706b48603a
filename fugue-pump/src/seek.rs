// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Random access on top of the sequential decode loop.

use std::collections::BTreeMap;

use fugue_core::errors::{usage_error, Error, Result, UsageErrorKind};
use fugue_core::frame::Frame;
use fugue_core::units::{rescale, Time, Timestamp};

use log::{debug, warn};

use crate::decode::DecodePump;
use crate::demux::DemuxRouter;
use crate::options::SeekThreshold;

/// The `SeekController` converts a request for the frame at a timestamp into either decoding
/// forward from the current position, or repositioning the input at a keyframe and decoding
/// forward from there.
pub struct SeekController {
    threshold: SeekThreshold,
    seeks: u64,
}

impl SeekController {
    pub fn new(threshold: SeekThreshold) -> Self {
        SeekController { threshold, seeks: 0 }
    }

    /// The number of times the input was repositioned.
    pub fn seeks(&self) -> u64 {
        self.seeks
    }

    /// Get the frame of a stream at or after a time.
    pub fn seek<'a>(
        &mut self,
        router: &mut DemuxRouter,
        pumps: &'a mut BTreeMap<u32, DecodePump>,
        index: u32,
        time: Time,
    ) -> Result<Option<&'a Frame>> {
        let target = match router.stream(index) {
            Some(stream) => stream.time_base.calc_timestamp_ceil(time),
            None => return usage_error(UsageErrorKind::InvalidStream(index)),
        };

        self.seek_ts(router, pumps, index, target)
    }

    /// Get the frame of a stream at or after a timestamp in the stream's time base.
    ///
    /// The target is clamped to the extent of the stream. Returns `None` if the stream has no
    /// frame at or after the target.
    ///
    /// If the input rejects the seek with a `SeekError`, the error is returned and the decode
    /// state is left as it was. If the input fails while repositioning, the buffered packets are
    /// discarded and every pump is reset, since the input position is no longer known. Decoding
    /// then resumes from wherever the input is, and another seek restores a known position.
    pub fn seek_ts<'a>(
        &mut self,
        router: &mut DemuxRouter,
        pumps: &'a mut BTreeMap<u32, DecodePump>,
        index: u32,
        target: Timestamp,
    ) -> Result<Option<&'a Frame>> {
        let (time_base, end_ts, threshold) = match router.stream(index) {
            Some(stream) => (stream.time_base, stream.end_ts(), self.threshold.to_ticks(stream)),
            None => return usage_error(UsageErrorKind::InvalidStream(index)),
        };

        let (cursor, has_frame) = match pumps.get(&index) {
            Some(pump) => (pump.cursor(), pump.current_frame().is_some()),
            None => return usage_error(UsageErrorKind::StreamNotOpen(index)),
        };

        let mut target = target.max(Timestamp::ZERO);

        if let Some(end_ts) = end_ts {
            target = target.min(end_ts);
        }

        let delta = i128::from(target.get()) - i128::from(cursor.get());

        if delta == 0 && has_frame {
            return Ok(pumps.get(&index).and_then(|pump| pump.current_frame()));
        }

        if 0 <= delta && delta < i128::from(threshold) {
            debug!("stream {}: skipping forward from {} to {}", index, cursor, target);

            return match pumps.get_mut(&index) {
                Some(pump) => pump.skip_forward(router, target),
                None => usage_error(UsageErrorKind::StreamNotOpen(index)),
            };
        }

        let seeked = match router.seek_input(index, target) {
            Ok(seeked) => seeked,
            // Rejected before the input was repositioned.
            Err(err @ Error::SeekError(_)) => return Err(err),
            Err(err) => {
                warn!("stream {}: seek to {} failed, input position lost: {}", index, target, err);

                router.discard_all();

                for pump in pumps.values_mut() {
                    let cursor = pump.cursor();
                    pump.reset(cursor);
                }

                return Err(err);
            }
        };

        self.seeks += 1;

        router.discard_all();

        for (other, pump) in pumps.iter_mut() {
            let origin = match router.stream(*other) {
                Some(stream) => rescale(seeked.actual_ts, time_base, stream.time_base),
                None => seeked.actual_ts,
            };
            pump.reset(origin);
        }

        debug!(
            "stream {}: resynchronized at {} for target {}, {} stream(s) reset",
            index,
            seeked.actual_ts,
            target,
            pumps.len()
        );

        router.fill(index)?;

        match pumps.get_mut(&index) {
            Some(pump) => pump.skip_forward(router, target),
            None => usage_error(UsageErrorKind::StreamNotOpen(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDecoder, MockReader, ReaderCounters};
    use fugue_core::units::TimeBase;
    use fugue_core::errors::SeekErrorKind;

    fn open(reader: MockReader, streams: u32) -> (DemuxRouter, BTreeMap<u32, DecodePump>) {
        let mut router = DemuxRouter::new(Box::new(reader));
        let mut pumps = BTreeMap::new();

        for index in 0..streams {
            router.open(index, 1 << 20).unwrap();
            let (decoder, _) = MockDecoder::new(4, 1);
            let stream = &router.streams()[index as usize];
            pumps.insert(index, DecodePump::new(stream, Box::new(decoder)));
        }

        (router, pumps)
    }

    fn pts_of(frame: Option<&Frame>) -> Option<i64> {
        frame.and_then(|frame| frame.pts).map(|pts| pts.get())
    }

    fn setup() -> (DemuxRouter, BTreeMap<u32, DecodePump>, ReaderCounters) {
        let (reader, counters) = MockReader::interleaved(1, 600, 12);
        let (router, pumps) = open(reader, 1);
        (router, pumps, counters)
    }

    #[test]
    fn verify_threshold_decides_between_skip_and_seek() {
        let (mut router, mut pumps, counters) = setup();
        let mut seeker = SeekController::new(SeekThreshold::Ticks(12));

        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(100)).unwrap();
        assert_eq!(pts_of(frame), Some(100));
        let seeks = counters.seeks();

        // Close ahead of the position: decode through.
        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(105)).unwrap();
        assert_eq!(pts_of(frame), Some(105));
        assert_eq!(counters.seeks(), seeks);

        // Far ahead of the position: exactly one seek of the input.
        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(500)).unwrap();
        assert_eq!(pts_of(frame), Some(500));
        assert_eq!(counters.seeks(), seeks + 1);
        assert_eq!(seeker.seeks(), counters.seeks() as u64);
    }

    #[test]
    fn verify_backward_seek_then_monotonic() {
        let (mut router, mut pumps, _) = setup();
        let mut seeker = SeekController::new(SeekThreshold::default());

        seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(300)).unwrap();

        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(50)).unwrap();
        assert_eq!(pts_of(frame), Some(50));

        let pump = pumps.get_mut(&0).unwrap();
        let mut last = 50;

        for _ in 0..30 {
            let pts = pts_of(pump.next_frame(&mut router).unwrap()).unwrap();
            assert!(pts > last);
            last = pts;
        }
    }

    #[test]
    fn verify_same_position_returns_current_frame() {
        let (mut router, mut pumps, counters) = setup();
        let mut seeker = SeekController::new(SeekThreshold::default());

        seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(20)).unwrap();
        let decoded = pumps[&0].stats().frames_decoded;
        let seeks = counters.seeks();

        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(20)).unwrap();
        assert_eq!(pts_of(frame), Some(20));
        assert_eq!(pumps[&0].stats().frames_decoded, decoded);
        assert_eq!(counters.seeks(), seeks);
    }

    #[test]
    fn verify_target_is_clamped() {
        let (mut router, mut pumps, _) = setup();
        let mut seeker = SeekController::new(SeekThreshold::default());

        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(-40)).unwrap();
        assert_eq!(pts_of(frame), Some(0));

        // The end of the stream is one tick past the last frame.
        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(10_000)).unwrap();
        assert!(frame.is_none());
    }

    #[test]
    fn verify_seek_resets_every_stream() {
        let (reader, _) = MockReader::interleaved(2, 100, 10);
        let (mut router, mut pumps) = open(reader, 2);
        let mut seeker = SeekController::new(SeekThreshold::default());

        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(75)).unwrap();
        assert_eq!(pts_of(frame), Some(75));

        assert_eq!(pumps[&1].stats().resets, 1);
        assert_eq!(pumps[&1].cursor(), Timestamp::new(70));

        // The other stream resumes from the keyframe the input was repositioned at.
        let pump = pumps.get_mut(&1).unwrap();
        assert_eq!(pts_of(pump.next_frame(&mut router).unwrap()), Some(70));
    }

    #[test]
    fn verify_unseekable_input_is_an_error() {
        let (reader, _) = MockReader::interleaved(1, 600, 12);
        let (mut router, mut pumps) = open(reader.unseekable(), 1);
        let mut seeker = SeekController::new(SeekThreshold::default());

        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(3)).unwrap();
        assert_eq!(pts_of(frame), Some(3));

        assert!(matches!(
            seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(400)),
            Err(Error::SeekError(SeekErrorKind::Unseekable))
        ));

        // The decode state is untouched.
        assert_eq!(pumps[&0].position(), Some(Timestamp::new(3)));
        assert_eq!(pumps[&0].stats().resets, 0);
    }

    #[test]
    fn verify_failed_repositioning_resets_decode_state() {
        let (reader, _) = MockReader::interleaved(2, 600, 12);
        let (mut router, mut pumps) = open(reader.failing_seeks(), 2);
        let mut seeker = SeekController::new(SeekThreshold::default());

        let frame = seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(3)).unwrap();
        assert_eq!(pts_of(frame), Some(3));

        assert!(matches!(
            seeker.seek_ts(&mut router, &mut pumps, 0, Timestamp::new(400)),
            Err(Error::IoError(_))
        ));

        // Nothing decoded before the failure is kept.
        for index in 0..2 {
            assert_eq!(pumps[&index].position(), None);
            assert_eq!(pumps[&index].stats().resets, 1);
            assert!(router.buffer(index).map_or(false, |buffer| buffer.is_empty()));
        }

        assert_eq!(seeker.seeks(), 0);
    }

    #[test]
    fn verify_fractional_time_targets() {
        let (reader, _) = MockReader::interleaved(1, 600, 12);
        let (mut router, mut pumps) = open(reader.with_time_base(TimeBase::new(1, 100)), 1);
        let mut seeker = SeekController::new(SeekThreshold::default());

        // One frame per hundredth of a second.
        for (secs, frac, pts) in [(0, 0.57, 57), (1, 0.29, 129), (2, 0.575, 258), (0, 0.001, 1)] {
            let frame = seeker.seek(&mut router, &mut pumps, 0, Time::new(secs, frac)).unwrap();
            assert_eq!(pts_of(frame), Some(pts), "{} s", secs as f64 + frac);
        }
    }

    #[test]
    fn verify_usage_errors() {
        let (mut router, mut pumps, _) = setup();
        let mut seeker = SeekController::new(SeekThreshold::default());

        assert!(matches!(
            seeker.seek(&mut router, &mut pumps, 7, Time::from(1u32)),
            Err(Error::UsageError(UsageErrorKind::InvalidStream(7)))
        ));

        pumps.clear();

        assert!(matches!(
            seeker.seek(&mut router, &mut pumps, 0, Time::from(1u32)),
            Err(Error::UsageError(UsageErrorKind::StreamNotOpen(0)))
        ));
    }
}
