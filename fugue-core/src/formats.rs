// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `formats` module provides the traits and support structures necessary to implement
//! container engines (demuxers and muxers).

use bitflags::bitflags;

use crate::codecs::CodecParameters;
use crate::errors::Result;
use crate::packet::Packet;
use crate::units::{Duration, Time, TimeBase, Timestamp};

pub mod prelude {
    //! The `formats` module prelude for container engine implementers.

    pub use crate::packet::{Packet, PacketBuilder, PacketFlags};
    pub use crate::units::{Duration, TimeBase, Timestamp};

    pub use super::{
        FormatOptions, FormatReader, FormatWriter, MediaKind, SeekedTo, Stream, StreamFlags,
    };
}

/// The kind of media carried by a stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

bitflags! {
    /// Flags indicating certain attributes about a stream.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct StreamFlags: u32 {
        /// The stream is the default stream for its media kind.
        const DEFAULT = 1 << 0;
    }
}

/// A `Stream` is an independently coded media bitstream within a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stream {
    /// The zero-based index of the stream, assigned by the container. Stable for the lifetime of
    /// the container.
    pub index: u32,
    /// The codec parameters for the stream.
    pub codec_params: CodecParameters,
    /// The time base of all timestamps and durations of the stream.
    pub time_base: TimeBase,
    /// The duration of the stream in time base units, if known.
    pub duration: Option<Duration>,
    /// The timestamp of the first frame.
    pub start_ts: Timestamp,
    /// Flags indicating stream attributes.
    pub flags: StreamFlags,
}

impl Stream {
    /// Instantiate a new stream.
    pub fn new(index: u32, codec_params: CodecParameters, time_base: TimeBase) -> Self {
        Stream {
            index,
            codec_params,
            time_base,
            duration: None,
            start_ts: Timestamp::ZERO,
            flags: StreamFlags::empty(),
        }
    }

    /// Provide the duration in time base units.
    pub fn with_duration(&mut self, duration: Duration) -> &mut Self {
        self.duration = Some(duration);
        self
    }

    /// Provide the timestamp of the first frame.
    pub fn with_start_ts(&mut self, start_ts: Timestamp) -> &mut Self {
        self.start_ts = start_ts;
        self
    }

    /// Append provided stream flags.
    pub fn with_flags(&mut self, flags: StreamFlags) -> &mut Self {
        self.flags |= flags;
        self
    }

    /// Get the kind of media carried by the stream.
    pub fn kind(&self) -> MediaKind {
        self.codec_params.kind()
    }

    /// Get the timestamp one tick past the last frame of the stream, if the duration is known.
    pub fn end_ts(&self) -> Option<Timestamp> {
        self.duration.map(|dur| self.start_ts.saturating_add(dur))
    }

    /// Get the duration of the stream in seconds, if known.
    pub fn duration_time(&self) -> Option<Time> {
        self.duration.and_then(|dur| i64::try_from(dur.get()).ok()).map(|dur| {
            self.time_base.calc_time(Timestamp::new(dur))
        })
    }
}

/// `SeekedTo` is the result of a seek.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SeekedTo {
    /// The stream the seek was relative to.
    pub stream_index: u32,
    /// The `Timestamp` required for the requested seek.
    pub required_ts: Timestamp,
    /// The `Timestamp` that was seeked to.
    pub actual_ts: Timestamp,
}

/// `FormatOptions` is a common set of options that all container engines use.
#[derive(Copy, Clone, Debug)]
pub struct FormatOptions {
    /// The maximum size of a single packet payload a reader will accept. Default: 64 MiB.
    pub max_packet_len: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions { max_packet_len: 64 * 1024 * 1024 }
    }
}

/// A `FormatReader` is a container demuxer. It provides methods to access the streams
/// encapsulated in the container, and to read their packets in container order.
///
/// Packets of all streams are interleaved. A packet never contains data from two different
/// streams. Seeking invalidates the state of any `Decoder` processing packets from the
/// `FormatReader`, and they should be reset after a successful seek.
pub trait FormatReader: Send {
    /// Get a list of all streams in the container.
    fn streams(&self) -> &[Stream];

    /// Get the stream with the given index.
    fn stream(&self, index: u32) -> Option<&Stream> {
        self.streams().iter().find(|stream| stream.index == index)
    }

    /// Get the default stream of a given media kind. If no stream is flagged as the default, the
    /// first stream of that kind is returned.
    fn default_stream(&self, kind: MediaKind) -> Option<&Stream> {
        let mut candidates = self.streams().iter().filter(|stream| stream.kind() == kind);

        self.streams()
            .iter()
            .find(|stream| stream.kind() == kind && stream.flags.contains(StreamFlags::DEFAULT))
            .or_else(|| candidates.next())
    }

    /// Get the next packet from the container. Returns `Ok(None)` at the end of the container.
    fn next_packet(&mut self) -> Result<Option<Packet>>;

    /// Reposition the container so that the next packet read for the given stream is a keyframe
    /// at or before the timestamp, in that stream's time base.
    ///
    /// A reader that cannot seek, or is given an invalid stream, must return a `SeekError`
    /// before it repositions anything, so its position is unchanged. Any other error, such as an
    /// I/O error while repositioning, leaves the position unspecified, but the reader remains
    /// usable and may be seeked again.
    fn seek(&mut self, stream_index: u32, ts: Timestamp) -> Result<SeekedTo>;
}

/// A `FormatWriter` is a container muxer.
///
/// The life cycle of a writer is: add streams, write the header, write packets, write the
/// trailer. The header locks the stream list.
pub trait FormatWriter: Send {
    /// Add a stream to the container. Returns the index assigned to the stream.
    fn add_stream(&mut self, codec_params: CodecParameters, time_base: TimeBase) -> Result<u32>;

    /// Get a list of all streams in the container. A writer may adjust the time base of a stream
    /// when the header is written.
    fn streams(&self) -> &[Stream];

    /// Write the container header.
    fn write_header(&mut self) -> Result<()>;

    /// Write a packet. Timestamps must be in the time base of the packet's stream.
    fn write_packet(&mut self, packet: &Packet) -> Result<()>;

    /// Write any buffered packets and the container trailer.
    fn write_trailer(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::well_known::CODEC_ID_RAW_VIDEO;
    use crate::codecs::{AudioCodecParameters, VideoCodecParameters};

    #[test]
    fn verify_stream_timing() {
        let mut params = VideoCodecParameters::default();
        params.for_codec(CODEC_ID_RAW_VIDEO);

        let mut stream = Stream::new(0, params.into(), TimeBase::new(1, 30));
        assert_eq!(stream.end_ts(), None);

        stream.with_duration(Duration::new(45)).with_start_ts(Timestamp::new(3));

        assert_eq!(stream.kind(), MediaKind::Video);
        assert_eq!(stream.end_ts(), Some(Timestamp::new(48)));
        assert_eq!(stream.duration_time(), Some(Time::new(1, 0.5)));
    }

    struct Streams(Vec<Stream>);

    impl FormatReader for Streams {
        fn streams(&self) -> &[Stream] {
            &self.0
        }

        fn next_packet(&mut self) -> Result<Option<Packet>> {
            Ok(None)
        }

        fn seek(&mut self, _: u32, _: Timestamp) -> Result<SeekedTo> {
            crate::errors::seek_error(crate::errors::SeekErrorKind::Unseekable)
        }
    }

    #[test]
    fn verify_default_stream() {
        let tb = TimeBase::new(1, 48_000);
        let audio = || CodecParameters::from(AudioCodecParameters::default());

        let mut reader = Streams(vec![Stream::new(0, audio(), tb), Stream::new(1, audio(), tb)]);
        assert_eq!(reader.default_stream(MediaKind::Audio).map(|s| s.index), Some(0));
        assert!(reader.default_stream(MediaKind::Video).is_none());

        reader.0[1].with_flags(StreamFlags::DEFAULT);
        assert_eq!(reader.default_stream(MediaKind::Audio).map(|s| s.index), Some(1));
        assert_eq!(reader.stream(1).map(|s| s.index), Some(1));
        assert!(reader.stream(7).is_none());
    }
}
