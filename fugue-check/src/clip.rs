// Fugue Check Tool
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synthesis and encoding of the test clip.

use std::io::Write;

use fugue::core::codecs::well_known::{CODEC_ID_RAW_AUDIO, CODEC_ID_RAW_VIDEO};
use fugue::core::codecs::{AudioCodecParameters, CodecParameters, VideoCodecParameters};
use fugue::core::errors::{usage_error, Result, UsageErrorKind};
use fugue::core::frame::{Frame, PixelFormat, SampleFormat};
use fugue::core::units::{rescale, rescale_duration, Duration, FrameRate, TimeBase, Timestamp};
use fugue::default::formats::RawWriter;
use fugue::pump::OutputContainer;

use log::info;

/// The container time base of the video stream.
pub const VIDEO_TIME_BASE: TimeBase = TimeBase { numer: 1, denom: 90_000 };

/// The sample rate, and container time base, of the audio stream.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

pub const AUDIO_CHANNELS: u16 = 2;

/// The shape of the synthesized clip.
#[derive(Copy, Clone, Debug)]
pub struct ClipSpec {
    pub frames: u64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub audio: bool,
}

impl ClipSpec {
    pub fn video_params(&self) -> CodecParameters {
        let mut params = VideoCodecParameters::default();
        params
            .for_codec(CODEC_ID_RAW_VIDEO)
            .with_dimensions(self.width, self.height)
            .with_pixel_format(PixelFormat::Gray8)
            .with_frame_rate(FrameRate::new(self.fps, 1));
        params.into()
    }

    pub fn audio_params(&self) -> CodecParameters {
        let mut params = AudioCodecParameters::default();
        params
            .for_codec(CODEC_ID_RAW_AUDIO)
            .with_sample_rate(AUDIO_SAMPLE_RATE)
            .with_channels(AUDIO_CHANNELS)
            .with_sample_format(SampleFormat::S16)
            .with_frames_per_packet(self.samples_per_frame());
        params.into()
    }

    /// The number of audio samples accompanying each video frame.
    pub fn samples_per_frame(&self) -> u32 {
        AUDIO_SAMPLE_RATE / self.fps
    }

    /// The duration of a video frame in ticks of the video stream's time base.
    pub fn frame_ticks(&self) -> i64 {
        i64::from(VIDEO_TIME_BASE.denom / self.fps)
    }

    /// The time base in which one tick is one video frame.
    fn frame_time_base(&self) -> TimeBase {
        TimeBase::new(1, self.fps)
    }
}

/// Fill a buffer with the pattern of frame `n` of a stream.
pub fn fill_pattern(buf: &mut [u8], stream: u32, n: u64) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = pattern_byte(stream, n, i);
    }
}

/// Returns `true` if the buffer holds the pattern of frame `n` of a stream.
pub fn has_pattern(buf: &[u8], stream: u32, n: u64) -> bool {
    buf.iter().enumerate().all(|(i, &byte)| byte == pattern_byte(stream, n, i))
}

fn pattern_byte(stream: u32, n: u64, i: usize) -> u8 {
    (n.wrapping_mul(31).wrapping_add(i as u64).wrapping_add(u64::from(stream) * 101)) as u8
}

/// Counters of the encode pass.
#[derive(Copy, Clone, Debug, Default)]
pub struct EncodeSummary {
    pub video_frames: u64,
    pub audio_frames: u64,
    pub packets_written: u64,
}

/// Encode the clip into a raw container written to `writer`.
pub fn encode<W: Write + Send>(spec: &ClipSpec, writer: W) -> Result<(W, EncodeSummary)> {
    let config = fugue::default::config();
    let registry = fugue::default::get_codecs();

    let mut output = OutputContainer::new(RawWriter::new(writer));

    let video =
        output.add_stream(&spec.video_params(), VIDEO_TIME_BASE, registry, &config.encoder)?;

    let audio = if spec.audio {
        let time_base = TimeBase::new(1, AUDIO_SAMPLE_RATE);
        Some(output.add_stream(&spec.audio_params(), time_base, registry, &config.encoder)?)
    }
    else {
        None
    };

    let video_tb = match output.frame_time_base(video) {
        Some(time_base) => time_base,
        None => return usage_error(UsageErrorKind::InvalidStream(video)),
    };

    let mut summary = EncodeSummary::default();

    let mut frame = Frame::video(spec.width, spec.height, PixelFormat::Gray8);
    frame.dur = rescale_duration(Duration::new(1), spec.frame_time_base(), video_tb);

    let spf = spec.samples_per_frame();
    let sample_tb = TimeBase::new(1, AUDIO_SAMPLE_RATE);
    let mut samples = Frame::audio(spf, AUDIO_CHANNELS, SampleFormat::S16);

    for n in 0..spec.frames {
        let ts = Timestamp::new(n as i64);

        frame.pts = Some(rescale(ts, spec.frame_time_base(), video_tb));
        fill_pattern(frame.data_mut(), video, n);

        output.add_frame(video, &mut frame)?;
        summary.video_frames += 1;

        if let Some(audio) = audio {
            let audio_tb = match output.frame_time_base(audio) {
                Some(time_base) => time_base,
                None => return usage_error(UsageErrorKind::InvalidStream(audio)),
            };

            let first_sample = Timestamp::new(n as i64 * i64::from(spf));

            samples.pts = Some(rescale(first_sample, sample_tb, audio_tb));
            samples.dur = rescale_duration(Duration::from(spf), sample_tb, audio_tb);
            fill_pattern(samples.data_mut(), audio, n);

            output.add_frame(audio, &mut samples)?;
            summary.audio_frames += 1;
        }
    }

    output.finalize()?;

    for index in [Some(video), audio].into_iter().flatten() {
        summary.packets_written += output.stats(index).map_or(0, |stats| stats.packets_written);
    }

    info!(
        "encoded {} video frame(s) and {} audio frame(s) into {} packet(s)",
        summary.video_frames, summary.audio_frames, summary.packets_written
    );

    Ok((output.into_inner().into_inner(), summary))
}
