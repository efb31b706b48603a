// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{self, BufReader, Read, Seek, SeekFrom};

use fugue_core::errors::{decode_error, seek_error, Result, SeekErrorKind};
use fugue_core::formats::{FormatOptions, FormatReader, SeekedTo, Stream};
use fugue_core::io::MediaSource;
use fugue_core::packet::Packet;
use fugue_core::units::Timestamp;

use log::{debug, trace, warn};

use crate::chunks::{self, IndexEntry, Trailer, FOOTER_LEN, TAG_PACKET, TAG_TRAILER};

/// A buffered media source that tracks its byte position without requiring it to be seekable.
struct SourceStream {
    inner: BufReader<Box<dyn MediaSource>>,
    pos: u64,
}

impl SourceStream {
    fn new(source: Box<dyn MediaSource>) -> Self {
        SourceStream { inner: BufReader::new(source), pos: 0 }
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<()> {
        self.pos = self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Read a single byte. Returns `None` if the end of the source was reached.
    fn read_tag(&mut self) -> io::Result<Option<u8>> {
        let mut tag = [0; 1];

        loop {
            match self.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(tag[0])),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }
}

impl Read for SourceStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.inner.read(buf)?;
        self.pos += len as u64;
        Ok(len)
    }
}

/// Raw container demuxer.
///
/// `RawReader` implements a demuxer for the raw reference container. Seeking requires a seekable
/// source and a finalized container.
pub struct RawReader {
    reader: SourceStream,
    opts: FormatOptions,
    streams: Vec<Stream>,
    /// The keyframe index, if the trailer could be read.
    index: Option<Vec<IndexEntry>>,
    data_start: u64,
    data_end: Option<u64>,
    ended: bool,
}

impl RawReader {
    pub fn try_new(source: Box<dyn MediaSource>, opts: &FormatOptions) -> Result<Self> {
        let is_seekable = source.is_seekable();
        let byte_len = source.byte_len();

        let mut reader = SourceStream::new(source);

        let mut streams = chunks::read_header(&mut reader, opts)?;
        let data_start = reader.pos;

        let mut index = None;
        let mut data_end = None;

        if is_seekable {
            match read_trailer(&mut reader, data_start, byte_len) {
                Ok((trailer_offset, trailer)) => {
                    for (stream_index, duration) in trailer.durations {
                        if let Some(stream) = streams.iter_mut().find(|s| s.index == stream_index)
                        {
                            stream.duration = Some(duration);
                        }
                    }

                    debug!(
                        "raw: trailer at offset {} with {} index entries",
                        trailer_offset,
                        trailer.index.len()
                    );

                    index = Some(trailer.index);
                    data_end = Some(trailer_offset);
                }
                Err(err) => {
                    warn!("raw: container has no usable trailer ({}), seeking disabled", err)
                }
            }

            reader.seek_to(data_start)?;
        }

        debug!("raw: {} stream(s), data starts at offset {}", streams.len(), data_start);

        Ok(RawReader {
            reader,
            opts: *opts,
            streams,
            index,
            data_start,
            data_end,
            ended: false,
        })
    }

    /// Unwraps this `RawReader`, returning the underlying media source.
    pub fn into_inner(self) -> Box<dyn MediaSource> {
        self.reader.inner.into_inner()
    }
}

/// Locate and read the trailer through the footer. Returns the offset of the trailer.
fn read_trailer(
    reader: &mut SourceStream,
    data_start: u64,
    byte_len: Option<u64>,
) -> Result<(u64, Trailer)> {
    let len = match byte_len {
        Some(len) => len,
        None => reader.inner.seek(SeekFrom::End(0))?,
    };

    if len < data_start + FOOTER_LEN {
        return decode_error("raw: container is too short for a footer");
    }

    reader.seek_to(len - FOOTER_LEN)?;

    let trailer_offset = chunks::read_footer(reader)?;

    if trailer_offset < data_start || trailer_offset >= len - FOOTER_LEN {
        return decode_error("raw: trailer offset out of bounds");
    }

    reader.seek_to(trailer_offset)?;

    Ok((trailer_offset, Trailer::read(reader)?))
}

impl FormatReader for RawReader {
    fn streams(&self) -> &[Stream] {
        &self.streams
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        if self.ended {
            return Ok(None);
        }

        if self.data_end.is_some_and(|end| self.reader.pos >= end) {
            self.ended = true;
            return Ok(None);
        }

        match self.reader.read_tag()? {
            Some(TAG_PACKET) => {
                let packet = chunks::read_packet(&mut self.reader, &self.opts)?;

                if !self.streams.iter().any(|stream| stream.index == packet.stream_index()) {
                    return decode_error("raw: packet for unknown stream");
                }

                trace!(
                    "raw: read packet for stream {} (pts={:?}, len={})",
                    packet.stream_index(),
                    packet.pts,
                    packet.len()
                );

                Ok(Some(packet))
            }
            Some(TAG_TRAILER) | None => {
                self.ended = true;
                Ok(None)
            }
            Some(_) => decode_error("raw: invalid record tag"),
        }
    }

    fn seek(&mut self, stream_index: u32, ts: Timestamp) -> Result<SeekedTo> {
        let index = match &self.index {
            Some(index) => index,
            None => return seek_error(SeekErrorKind::Unseekable),
        };

        let stream = match self.streams.iter().find(|stream| stream.index == stream_index) {
            Some(stream) => stream,
            None => return seek_error(SeekErrorKind::InvalidStream),
        };

        let entries = index.iter().filter(|entry| entry.stream_index == stream_index);

        // The latest keyframe at or before the timestamp. If the timestamp precedes every
        // keyframe, the first keyframe.
        let mut best: Option<&IndexEntry> = None;
        let mut first: Option<&IndexEntry> = None;

        for entry in entries {
            if first.map_or(true, |first| entry.ts < first.ts) {
                first = Some(entry);
            }

            if entry.ts <= ts && best.map_or(true, |best| entry.ts > best.ts) {
                best = Some(entry);
            }
        }

        let (offset, actual_ts) = match best.or(first) {
            Some(entry) => (entry.offset, entry.ts),
            None => (self.data_start, stream.start_ts),
        };

        debug!(
            "raw: seeking stream {} to ts={}, keyframe ts={} at offset {}",
            stream_index, ts, actual_ts, offset
        );

        self.reader.seek_to(offset)?;
        self.ended = false;

        Ok(SeekedTo { stream_index, required_ts: ts, actual_ts })
    }
}
