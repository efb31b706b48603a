// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use std::io::Cursor;

use fugue_codec_raw::{RawDecoder, RawEncoder};
use fugue_core::codecs::registry::CodecRegistry;
use fugue_core::codecs::well_known::{CODEC_ID_RAW_AUDIO, CODEC_ID_RAW_VIDEO};
use fugue_core::codecs::{
    AudioCodecParameters, CodecParameters, EncoderOptions, VideoCodecParameters,
};
use fugue_core::frame::{Frame, PixelFormat, SampleFormat};
use fugue_core::io::MediaSource;
use fugue_core::units::{Duration, FrameRate, TimeBase, Timestamp};
use fugue_format_raw::{RawReader, RawWriter};
use fugue_pump::{InputContainer, OutputContainer, PumpOptions};

/// The container time base of video streams.
pub const VIDEO_TB: TimeBase = TimeBase { numer: 1, denom: 90_000 };

/// Ticks of `VIDEO_TB` per frame at 30 frames per second.
pub const FRAME_TICKS: i64 = 3000;

/// Samples per audio frame.
pub const AUDIO_FRAME_LEN: u32 = 800;

pub fn registry() -> CodecRegistry {
    let mut registry = CodecRegistry::new();
    registry.register_decoder::<RawDecoder>();
    registry.register_encoder::<RawEncoder>();
    registry
}

pub fn video_params() -> CodecParameters {
    let mut params = VideoCodecParameters::default();
    params
        .for_codec(CODEC_ID_RAW_VIDEO)
        .with_dimensions(4, 2)
        .with_pixel_format(PixelFormat::Gray8)
        .with_frame_rate(FrameRate::new(30, 1));
    params.into()
}

pub fn audio_params() -> CodecParameters {
    let mut params = AudioCodecParameters::default();
    params
        .for_codec(CODEC_ID_RAW_AUDIO)
        .with_sample_rate(8000)
        .with_channels(1)
        .with_sample_format(SampleFormat::U8)
        .with_frames_per_packet(AUDIO_FRAME_LEN);
    params.into()
}

/// A video frame whose every byte is the low byte of its frame number.
pub fn video_frame(n: i64) -> Frame {
    let mut frame = Frame::video(4, 2, PixelFormat::Gray8);
    frame.pts = Some(Timestamp::new(n));
    frame.dur = Duration::new(1);
    frame.data_mut().fill(n as u8);
    frame
}

pub fn audio_frame(n: i64) -> Frame {
    let mut frame = Frame::audio(AUDIO_FRAME_LEN, 1, SampleFormat::U8);
    frame.pts = Some(Timestamp::new(n * i64::from(AUDIO_FRAME_LEN)));
    frame.data_mut().fill(n as u8);
    frame
}

/// Encode a clip of `video` video frames and `audio` audio frames, in a container with a video
/// stream followed by an audio stream if `audio` is not zero.
pub fn encode_clip(video: i64, audio: i64, gop_size: u32) -> Vec<u8> {
    let registry = registry();
    let opts = EncoderOptions { gop_size, max_delay: 2, ..Default::default() };

    let mut output = OutputContainer::new(RawWriter::new(Vec::new()));

    let video_index = output.add_stream(&video_params(), VIDEO_TB, &registry, &opts).unwrap();

    let audio_index = if audio > 0 {
        let tb = TimeBase::new(1, 8000);
        Some(output.add_stream(&audio_params(), tb, &registry, &opts).unwrap())
    }
    else {
        None
    };

    for n in 0..video.max(audio) {
        if n < video {
            output.add_frame(video_index, &mut video_frame(n)).unwrap();
        }
        if let (Some(index), true) = (audio_index, n < audio) {
            output.add_frame(index, &mut audio_frame(n)).unwrap();
        }
    }

    output.finalize().unwrap();
    output.into_inner().into_inner()
}

pub fn open_input(source: Box<dyn MediaSource>, options: &PumpOptions) -> InputContainer {
    let reader = RawReader::try_new(source, &Default::default()).unwrap();
    InputContainer::new(Box::new(reader), options)
}

pub fn open_clip(clip: Vec<u8>) -> InputContainer {
    open_input(Box::new(Cursor::new(clip)), &Default::default())
}
