// Fugue Check Tool
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decode and random access passes over the encoded clip.

use fugue::core::errors::Result;
use fugue::core::formats::MediaKind;
use fugue::core::frame::Frame;
use fugue::core::units::Timestamp;
use fugue::pump::InputContainer;

use log::{info, warn};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::clip::{has_pattern, ClipSpec};
use crate::report::{Report, SeekReport, StreamReport};

/// Tracks the frames of one stream during the sequential pass.
struct StreamCheck {
    report: StreamReport,
    /// Ticks per frame in the stream's time base.
    ticks: i64,
    prev_pts: Option<i64>,
}

impl StreamCheck {
    fn new(index: u32, kind: MediaKind, spec: &ClipSpec, ticks: i64) -> Self {
        let kind = match kind {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        };

        let report =
            StreamReport { index, kind, expected_frames: spec.frames, ..Default::default() };

        StreamCheck {
            report,
            ticks,
            prev_pts: None,
        }
    }

    fn check(&mut self, frame: &Frame, report: &mut Report) {
        let index = self.report.index;

        self.report.decoded_frames += 1;

        let pts = match frame.pts {
            Some(pts) => pts.get(),
            None => {
                self.report.failures += 1;
                report.fail(format!("stream {}: frame without a timestamp", index));
                return;
            }
        };

        if self.report.first_pts.is_none() {
            self.report.first_pts = Some(pts);
        }
        self.report.last_pts = Some(pts);

        if let Some(prev) = self.prev_pts.replace(pts) {
            if pts <= prev {
                self.report.failures += 1;
                report.fail(format!("stream {}: pts {} follows pts {}", index, pts, prev));
                return;
            }
        }

        if pts % self.ticks != 0 || !has_pattern(frame.data(), index, (pts / self.ticks) as u64) {
            self.report.failures += 1;
            report.fail(format!("stream {}: payload mismatch at pts {}", index, pts));
        }
    }
}

/// The duration of one clip frame in ticks of a stream's time base.
fn stream_frame_ticks(kind: MediaKind, spec: &ClipSpec) -> i64 {
    match kind {
        // The audio stream ticks at the sample rate.
        MediaKind::Audio => i64::from(spec.samples_per_frame()),
        MediaKind::Video => spec.frame_ticks(),
    }
}

/// Decode every stream from start to end. The video stream is drained first, so the packets of
/// the other streams are buffered by the pump meanwhile.
pub fn decode_pass(
    input: &mut InputContainer,
    spec: &ClipSpec,
    report: &mut Report,
) -> Result<()> {
    let registry = fugue::default::get_codecs();
    let config = fugue::default::config();

    let streams: Vec<(u32, MediaKind)> =
        input.streams().iter().map(|stream| (stream.index, stream.kind())).collect();

    for &(index, _) in &streams {
        input.open_stream(index, registry, &config.decoder)?;
    }

    for (index, kind) in streams {
        let ticks = stream_frame_ticks(kind, spec);
        let mut check = StreamCheck::new(index, kind, spec, ticks);

        while let Some(frame) = input.next_frame(index)? {
            check.check(frame, report);
        }

        if check.report.decoded_frames != spec.frames {
            report.fail(format!(
                "stream {}: decoded {} frame(s), expected {}",
                index, check.report.decoded_frames, spec.frames
            ));
        }

        if let Some(stats) = input.stats(index) {
            check.report.retries = stats.retries;
        }

        if let Some(evicted) = input.packets_evicted(index) {
            check.report.packets_evicted = evicted;

            if evicted > 0 {
                warn!("stream {}: {} packet(s) evicted", index, evicted);
            }
        }

        info!("stream {}: decoded {} frame(s)", index, check.report.decoded_frames);

        report.streams.push(check.report);
    }

    Ok(())
}

/// Request frames at random timestamps of the video stream, and verify that each returned frame
/// is the first frame at or after the target and that decoding continues from it.
pub fn seek_pass(
    input: &mut InputContainer,
    spec: &ClipSpec,
    rng: &mut SmallRng,
    count: usize,
    report: &mut Report,
) -> Result<()> {
    const VIDEO: u32 = 0;

    // Only the video stream is sought. Keep the other streams from buffering.
    let others: Vec<u32> =
        input.streams().iter().map(|stream| stream.index).filter(|&i| i != VIDEO).collect();

    for index in others {
        input.close_stream(index);
    }

    let ticks = spec.frame_ticks();
    let frames = spec.frames as i64;
    let end = frames * ticks;

    if frames == 0 {
        return Ok(());
    }

    for _ in 0..count {
        let target = rng.random_range(0..end);

        // The first frame at or after the target.
        let expected = (target + ticks - 1) / ticks;

        let (pts, payload_ok) = match input.frame_at_ts(VIDEO, Timestamp::new(target))? {
            Some(frame) => (
                frame.pts.map(|pts| pts.get()),
                has_pattern(frame.data(), VIDEO, expected as u64),
            ),
            None => (None, true),
        };

        let mut passed = if expected < frames {
            pts == Some(expected * ticks) && payload_ok
        }
        else {
            pts.is_none()
        };

        if !passed {
            report.fail(format!(
                "seek to {}: got pts {:?}, expected frame {} at pts {}",
                target,
                pts,
                expected,
                expected * ticks
            ));
        }

        // Decoding continues from the returned frame.
        if passed && expected + 1 < frames {
            let next = input.next_frame(VIDEO)?.and_then(|frame| frame.pts).map(|pts| pts.get());

            if next != Some((expected + 1) * ticks) {
                report.fail(format!("seek to {}: next frame has pts {:?}", target, next));
                passed = false;
            }
        }

        report.seeks.push(SeekReport { target, pts, passed });
    }

    report.input_seeks = input.seek_count();

    info!("{} random access(es), {} input seek(s)", count, report.input_seeks);

    Ok(())
}
