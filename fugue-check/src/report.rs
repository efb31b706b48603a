// Fugue Check Tool
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::debug;
use serde::Serialize;

/// The result of decoding one stream from start to end.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StreamReport {
    pub index: u32,
    pub kind: &'static str,
    pub expected_frames: u64,
    pub decoded_frames: u64,
    pub first_pts: Option<i64>,
    pub last_pts: Option<i64>,
    pub retries: u64,
    pub packets_evicted: u64,
    pub failures: u64,
}

/// The result of a single random access.
#[derive(Clone, Debug, Serialize)]
pub struct SeekReport {
    pub target: i64,
    pub pts: Option<i64>,
    pub passed: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Report {
    pub container_bytes: u64,
    pub packets_written: u64,
    pub streams: Vec<StreamReport>,
    pub seeks: Vec<SeekReport>,
    pub input_seeks: u64,
    pub failures: Vec<String>,
    pub passed: bool,
}

impl Report {
    pub fn fail(&mut self, msg: String) {
        debug!("{}", msg);
        self.failures.push(msg);
    }

    /// Decide the verdict once every pass completed.
    pub fn conclude(&mut self) {
        self.passed = self.failures.is_empty()
            && self.streams.iter().all(|stream| stream.failures == 0)
            && self.seeks.iter().all(|seek| seek.passed);
    }

    pub fn print_text(&self, quiet: bool) {
        if !quiet {
            for failure in &self.failures {
                println!("[FAIL] {}", failure);
            }

            if !self.failures.is_empty() {
                println!();
            }
        }

        println!("Test Results");
        println!("=================================================");
        println!();
        println!("  Container Size:       {:>12} bytes", self.container_bytes);
        println!("  Packets Written:      {:>12}", self.packets_written);
        println!();

        for stream in &self.streams {
            println!("  Stream {} ({})", stream.index, stream.kind);
            println!(
                "    Decoded/Expected Frames: {:>8}/{:>8}",
                stream.decoded_frames, stream.expected_frames
            );
            println!("    Failed Frames:           {:>8}", stream.failures);
            println!("    Decoder Retries:         {:>8}", stream.retries);
            println!("    Evicted Packets:         {:>8}", stream.packets_evicted);
            println!();
        }

        let passed = self.seeks.iter().filter(|seek| seek.passed).count();

        println!("  Passed/Total Seeks:   {:>5}/{:>5}", passed, self.seeks.len());
        println!("  Input Seeks:          {:>12}", self.input_seeks);
        println!();

        println!("{}", if self.passed { "PASS" } else { "FAIL" });
        println!();
    }

    pub fn print_json(&self) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}
