// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use std::io::Cursor;

use fugue_core::errors::{Error, SeekErrorKind};
use fugue_core::io::ReadOnlySource;
use fugue_core::units::{Time, Timestamp};
use fugue_pump::{InputContainer, PumpOptions, SeekThreshold};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use common::*;

const FRAMES: i64 = 120;

fn open(options: &PumpOptions) -> InputContainer {
    let mut input = open_input(Box::new(Cursor::new(encode_clip(FRAMES, 0, 10))), options);
    input.open_stream(0, &registry(), &Default::default()).unwrap();
    input
}

/// The presentation timestamp of the first frame at or after `target`.
fn expected_pts(target: i64) -> Option<i64> {
    let n = (target.max(0) + FRAME_TICKS - 1) / FRAME_TICKS;
    if n < FRAMES {
        Some(n * FRAME_TICKS)
    }
    else {
        None
    }
}

#[test]
fn verify_random_access() {
    let mut input = open(&Default::default());
    let mut rng = SmallRng::seed_from_u64(0x5eed);

    for _ in 0..200 {
        let target = rng.random_range(-FRAME_TICKS..(FRAMES + 2) * FRAME_TICKS);

        let pts = input
            .frame_at_ts(0, Timestamp::new(target))
            .unwrap()
            .and_then(|frame| frame.pts)
            .map(|pts| pts.get());

        assert_eq!(pts, expected_pts(target), "target {}", target);

        // Decoding continues monotonically from the returned frame.
        if let Some(pts) = pts {
            let next = input.next_frame(0).unwrap().and_then(|frame| frame.pts);

            match next {
                Some(next) => assert_eq!(next.get(), pts + FRAME_TICKS),
                None => assert_eq!(pts, (FRAMES - 1) * FRAME_TICKS),
            }
        }
    }

    assert!(input.seek_count() > 0);
}

#[test]
fn verify_frame_at_time() {
    let mut input = open(&Default::default());

    // 2.5 seconds at 30 frames per second.
    let frame = input.frame_at(0, Time::new(2, 0.5)).unwrap().unwrap();
    assert_eq!(frame.pts, Some(Timestamp::new(75 * FRAME_TICKS)));
    assert_eq!(frame.data()[0], 75);

    // Past the end of the stream.
    assert!(input.frame_at(0, Time::from(60u32)).unwrap().is_none());
}

#[test]
fn verify_short_skips_do_not_seek() {
    let options = PumpOptions { seek_threshold: SeekThreshold::Frames(30), ..Default::default() };
    let mut input = open(&options);

    for n in [3, 10, 25, 40] {
        let frame = input.frame_at_ts(0, Timestamp::new(n * FRAME_TICKS)).unwrap().unwrap();
        assert_eq!(frame.pts, Some(Timestamp::new(n * FRAME_TICKS)));
    }

    assert_eq!(input.seek_count(), 0);

    input.frame_at_ts(0, Timestamp::new(100 * FRAME_TICKS)).unwrap();
    assert_eq!(input.seek_count(), 1);

    input.frame_at_ts(0, Timestamp::new(50 * FRAME_TICKS)).unwrap();
    assert_eq!(input.seek_count(), 2);
}

#[test]
fn verify_unseekable_input() {
    let source = ReadOnlySource::new(Cursor::new(encode_clip(FRAMES, 0, 10)));
    let mut input = open_input(Box::new(source), &Default::default());
    input.open_stream(0, &registry(), &Default::default()).unwrap();

    // Forward skips within the threshold only decode.
    let frame = input.frame_at_ts(0, Timestamp::new(5 * FRAME_TICKS)).unwrap().unwrap();
    assert_eq!(frame.pts, Some(Timestamp::new(5 * FRAME_TICKS)));

    assert!(matches!(
        input.frame_at_ts(0, Timestamp::new(100 * FRAME_TICKS)),
        Err(Error::SeekError(SeekErrorKind::Unseekable))
    ));

    // The failed seek left the decode state intact.
    let frame = input.next_frame(0).unwrap().unwrap();
    assert_eq!(frame.pts, Some(Timestamp::new(6 * FRAME_TICKS)));
}

#[test]
fn verify_fractional_seconds() {
    let mut input = open(&Default::default());

    // Times on frame boundaries land exactly on the frame.
    for n in 0..FRAMES {
        let time = Time::new((n / 30) as u64, (n % 30) as f64 / 30.0);
        let frame = input.frame_at(0, time).unwrap().unwrap();
        assert_eq!(frame.pts, Some(Timestamp::new(n * FRAME_TICKS)), "{} / 30 s", n);
    }

    // Times between frames land on the next frame.
    let mut rng = SmallRng::seed_from_u64(0xf4ac);

    for _ in 0..200 {
        let secs = rng.random_range(0.0..(FRAMES - 1) as f64 / 30.0);
        let target = secs * 90_000.0;

        let pts = input
            .frame_at(0, Time::new(secs.trunc() as u64, secs.fract()))
            .unwrap()
            .and_then(|frame| frame.pts)
            .map(|pts| pts.get() as f64)
            .unwrap();

        assert!(pts >= target - 1e-3, "{} s returned {}", secs, pts);
        assert!(pts - target < FRAME_TICKS as f64, "{} s returned {}", secs, pts);
    }
}

#[test]
fn verify_audio_continues_after_video_seek() {
    let mut input = open_clip(encode_clip(FRAMES, 40, 10));
    input.open_stream(0, &registry(), &Default::default()).unwrap();
    input.open_stream(1, &registry(), &Default::default()).unwrap();

    let frame = input.frame_at_ts(0, Timestamp::new(50 * FRAME_TICKS)).unwrap().unwrap();
    assert_eq!(frame.pts, Some(Timestamp::new(50 * FRAME_TICKS)));

    let mut audio = Vec::new();

    while let Some(frame) = input.next_frame(1).unwrap() {
        audio.push(frame.pts.map(|pts| pts.get()).unwrap());
    }

    // Audio resumes no later than the packet covering the seek position, then has no gaps.
    let len = i64::from(AUDIO_FRAME_LEN);

    assert!(audio[0] <= 17 * len, "audio resumed at {}", audio[0]);
    assert_eq!(audio.last(), Some(&(39 * len)));

    for pair in audio.windows(2) {
        assert_eq!(pair[1], pair[0] + len);
    }
}
