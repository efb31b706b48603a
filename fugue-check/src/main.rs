// Fugue Check Tool
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]
// Justification: Fields on the option structs may change at any time, but fugue-check doesn't
// want to be updated every time those fields change, therefore always fill in the remaining
// fields with default values.
#![allow(clippy::needless_update)]

mod clip;
mod report;
mod verify;

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::PathBuf;

use fugue::core::codecs::{DecoderOptions, EncoderOptions};
use fugue::core::errors::Result;
use fugue::core::io::MediaSource;
use fugue::default::formats::RawReader;
use fugue::default::Config;
use fugue::pump::{InputContainer, PumpOptions, SeekThreshold};

use clap::{Parser, ValueEnum};
use log::info;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::clip::{ClipSpec, AUDIO_SAMPLE_RATE, VIDEO_TIME_BASE};
use crate::report::Report;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Check Fugue by encoding a synthesized clip, then decoding it sequentially and at random
/// positions.
#[derive(Parser, Debug)]
#[command(name = "Fugue Check", version, about)]
struct Cli {
    /// The number of video frames in the clip
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// The width of the video frames
    #[arg(long, default_value_t = 64)]
    width: u32,

    /// The height of the video frames
    #[arg(long, default_value_t = 36)]
    height: u32,

    /// The video frame rate, must divide 90000
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Add an audio stream to the clip
    #[arg(long)]
    audio: bool,

    /// The maximum number of frames between keyframes
    #[arg(long, default_value_t = 12)]
    gop: u32,

    /// The number of frames the encoder may hold back
    #[arg(long, default_value_t = 2)]
    delay: u32,

    /// The forward distance in frames below which frames are decoded through instead of seeking
    #[arg(long, default_value_t = 12)]
    threshold: u32,

    /// The number of random accesses to perform
    #[arg(long, default_value_t = 32)]
    seeks: usize,

    /// The seed of the random access positions
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Write the container to a file instead of memory
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,

    /// The format of the test results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Decode in low delay mode
    #[arg(long)]
    low_delay: bool,

    /// Only print test results
    #[arg(long, short = 'q')]
    quiet: bool,
}

impl Cli {
    fn clip(&self) -> ClipSpec {
        ClipSpec {
            frames: self.frames,
            width: self.width,
            height: self.height,
            fps: self.fps,
            audio: self.audio,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let video_rate = VIDEO_TIME_BASE.denom;

        if self.fps == 0 || video_rate % self.fps != 0 {
            return Err(format!("frame rate {} does not divide {}", self.fps, video_rate));
        }

        if self.audio && AUDIO_SAMPLE_RATE % self.fps != 0 {
            return Err(format!("frame rate {} does not divide {}", self.fps, AUDIO_SAMPLE_RATE));
        }

        if self.width == 0 || self.height == 0 {
            return Err("frame dimensions must be non-zero".to_string());
        }

        if self.gop == 0 {
            return Err("keyframe interval must be non-zero".to_string());
        }

        Ok(())
    }
}

fn run(cli: &Cli) -> Result<Report> {
    fugue::default::init(Config {
        pump: PumpOptions {
            seek_threshold: SeekThreshold::Frames(cli.threshold),
            ..Default::default()
        },
        decoder: DecoderOptions { low_delay: cli.low_delay, ..Default::default() },
        encoder: EncoderOptions { gop_size: cli.gop, max_delay: cli.delay, ..Default::default() },
        ..Default::default()
    })?;

    let config = fugue::default::config();
    let spec = cli.clip();

    let mut report = Report::default();

    let (source, summary): (Box<dyn MediaSource>, _) = match &cli.output {
        Some(path) => {
            let (writer, summary) = clip::encode(&spec, BufWriter::new(File::create(path)?))?;
            drop(writer);

            info!("wrote container to {}", path.display());
            (Box::new(File::open(path)?), summary)
        }
        None => {
            let (buf, summary) = clip::encode(&spec, Vec::new())?;
            (Box::new(Cursor::new(buf)), summary)
        }
    };

    report.container_bytes = source.byte_len().unwrap_or(0);
    report.packets_written = summary.packets_written;

    let reader = RawReader::try_new(source, &config.format)?;
    let mut input = InputContainer::new(Box::new(reader), &config.pump);

    verify::decode_pass(&mut input, &spec, &mut report)?;

    let mut rng = SmallRng::seed_from_u64(cli.seed);
    verify::seek_pass(&mut input, &spec, &mut rng, cli.seeks, &mut report)?;

    report.conclude();

    Ok(report)
}

fn main() {
    pretty_env_logger::init();

    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("fugue-check: {}", err);
        std::process::exit(2);
    }

    if !cli.quiet && cli.format == OutputFormat::Text {
        println!(
            "Clip: {} frame(s) of {}x{} at {} fps{}",
            cli.frames,
            cli.width,
            cli.height,
            cli.fps,
            if cli.audio { " with audio" } else { "" }
        );
        println!();
    }

    let code = match run(&cli) {
        Ok(report) => {
            let printed = match cli.format {
                OutputFormat::Text => {
                    report.print_text(cli.quiet);
                    Ok(())
                }
                OutputFormat::Json => report.print_json(),
            };

            match printed {
                Ok(()) if report.passed => 0,
                Ok(()) => 1,
                Err(err) => {
                    eprintln!("fugue-check: failed to print results: {}", err);
                    2
                }
            }
        }
        Err(err) => {
            eprintln!("Check interrupted by error: {}", err);
            2
        }
    };

    std::process::exit(code)
}
