// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A minimal self-describing reference container.
//!
//! All integers are little-endian. A container is laid out as follows:
//!
//! ```text
//! header   "FGRW" version:u8 stream_count:u16 stream_descriptor*
//! records  (0x01 stream:u32 flags:u8 pts:i64 dts:i64 dur:u64 len:u32 data)*
//! trailer  0x02 stream_count:u16 (stream:u32 duration:u64)*
//!          entry_count:u32 (stream:u32 pts:i64 offset:u64)*
//! footer   trailer_offset:u64 "FGRE"
//! ```
//!
//! The trailer carries the duration of every stream and an index of every keyframe record. A
//! reader on an unseekable source can still demux the records, but it cannot seek.

mod chunks;
mod reader;
mod writer;

pub use reader::RawReader;
pub use writer::RawWriter;
