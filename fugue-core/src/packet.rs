// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `packet` module defines the packet structure.

use bitflags::bitflags;

use crate::units::{rescale, rescale_duration, Duration, TimeBase, Timestamp};

bitflags! {
    /// Flags indicating certain attributes about a packet.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct PacketFlags: u8 {
        /// The packet can be decoded without reference to any prior packet.
        const KEYFRAME = 1 << 0;
        /// The decoded frame should not be presented.
        const DISCARD  = 1 << 1;
        /// The packet is known to be damaged.
        const CORRUPT  = 1 << 2;
    }
}

/// A `Packet` contains a discrete amount of encoded data for a single stream.
///
/// # Timing
///
/// * **Presentation Timestamp (PTS):** The time relative to the start of the stream that the
///   decoded packet should be presented. May be unknown.
///
/// * **Decode Timestamp (DTS):** The time relative to the start of the stream that the packet
///   should be decoded. Differs from the PTS when frames are reordered. May be unknown.
///
/// * **Duration:** The presentation duration of the packet. Zero if unknown.
///
/// All timestamps and durations are in the `TimeBase` of the stream that owns the packet, or the
/// `TimeBase` of the codec engine while the packet travels between an encoder and an encode pump.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    /// The index of the stream.
    stream_index: u32,
    /// The presentation timestamp (PTS) of the packet in `TimeBase` units.
    pub pts: Option<Timestamp>,
    /// The decode timestamp (DTS) of the packet in `TimeBase` units.
    pub dts: Option<Timestamp>,
    /// The duration of the packet in `TimeBase` units.
    pub dur: Duration,
    /// Packet attributes.
    pub flags: PacketFlags,
    /// The packet data buffer.
    pub data: Vec<u8>,
}

impl Packet {
    /// Create a new `Packet` with an unknown decode timestamp and duration.
    pub fn new(stream_index: u32, pts: Option<Timestamp>, data: impl Into<Vec<u8>>) -> Self {
        Packet {
            stream_index,
            pts,
            dts: None,
            dur: Duration::ZERO,
            flags: PacketFlags::empty(),
            data: data.into(),
        }
    }

    /// The index of the stream this packet belongs to.
    #[inline]
    pub const fn stream_index(&self) -> u32 {
        self.stream_index
    }

    /// Assign the packet to a stream.
    pub fn set_stream_index(&mut self, stream_index: u32) {
        self.stream_index = stream_index;
    }

    /// Get the presentation timestamp (PTS) of the packet, if known.
    #[inline]
    pub const fn pts(&self) -> Option<Timestamp> {
        self.pts
    }

    /// Get the decode timestamp (DTS) of the packet, if known.
    #[inline]
    pub const fn dts(&self) -> Option<Timestamp> {
        self.dts
    }

    /// Get the decode timestamp, falling back to the presentation timestamp.
    #[inline]
    pub fn decode_ts(&self) -> Option<Timestamp> {
        self.dts.or(self.pts)
    }

    /// Get the duration of the packet.
    #[inline]
    pub const fn dur(&self) -> Duration {
        self.dur
    }

    /// Returns `true` if the packet can be decoded independently.
    #[inline]
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(PacketFlags::KEYFRAME)
    }

    /// Get an immutable slice to the packet data buffer.
    #[inline]
    pub fn buf(&self) -> &[u8] {
        &self.data
    }

    /// The size of the packet payload in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the packet has no payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reset the packet for reuse. The payload allocation is retained.
    pub fn clear(&mut self) {
        self.stream_index = 0;
        self.pts = None;
        self.dts = None;
        self.dur = Duration::ZERO;
        self.flags = PacketFlags::empty();
        self.data.clear();
    }

    /// Convert the timestamps and duration of the packet from one time base into another.
    pub fn rescale(&mut self, from: TimeBase, to: TimeBase) {
        if from == to {
            return;
        }

        self.pts = self.pts.map(|pts| rescale(pts, from, to));
        self.dts = self.dts.map(|dts| rescale(dts, from, to));
        self.dur = rescale_duration(self.dur, from, to);
    }
}

mod builder {
    use crate::packet::{Packet, PacketFlags};
    use crate::units::{Duration, Timestamp};

    pub struct HasStreamIndex(u32);
    pub struct NoStreamIndex;

    pub struct HasBuf(Vec<u8>);
    pub struct NoBuf;

    /// A builder for creating packets.
    ///
    /// See [`Packet`] for a detailed description of all packet fields.
    ///
    /// The stream index and data fields are mandatory and must be provided before a packet can be
    /// built.
    pub struct PacketBuilder<S, B> {
        stream_index: S,
        buf: B,
        pts: Option<Timestamp>,
        dts: Option<Timestamp>,
        dur: Duration,
        flags: PacketFlags,
    }

    impl Default for PacketBuilder<NoStreamIndex, NoBuf> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PacketBuilder<NoStreamIndex, NoBuf> {
        /// Create the packet builder.
        pub fn new() -> Self {
            Self {
                stream_index: NoStreamIndex,
                buf: NoBuf,
                pts: None,
                dts: None,
                dur: Duration::ZERO,
                flags: PacketFlags::empty(),
            }
        }
    }

    impl PacketBuilder<HasStreamIndex, HasBuf> {
        /// Build the packet.
        pub fn build(self) -> Packet {
            Packet {
                stream_index: self.stream_index.0,
                pts: self.pts,
                dts: self.dts,
                dur: self.dur,
                flags: self.flags,
                data: self.buf.0,
            }
        }
    }

    impl<S, B> PacketBuilder<S, B> {
        /// Provide the stream index.
        pub fn stream_index(self, stream_index: u32) -> PacketBuilder<HasStreamIndex, B> {
            let Self { buf, pts, dts, dur, flags, .. } = self;
            PacketBuilder { stream_index: HasStreamIndex(stream_index), buf, pts, dts, dur, flags }
        }

        /// Provide the packet's data buffer.
        pub fn data(self, buf: impl Into<Vec<u8>>) -> PacketBuilder<S, HasBuf> {
            let Self { stream_index, pts, dts, dur, flags, .. } = self;
            PacketBuilder { stream_index, buf: HasBuf(buf.into()), pts, dts, dur, flags }
        }

        /// Provide the presentation timestamp (PTS).
        pub fn pts(mut self, pts: Timestamp) -> Self {
            self.pts = Some(pts);
            self
        }

        /// Provide the decode timestamp (DTS).
        pub fn dts(mut self, dts: Timestamp) -> Self {
            self.dts = Some(dts);
            self
        }

        /// Provide the packet's duration.
        pub fn dur(mut self, dur: Duration) -> Self {
            self.dur = dur;
            self
        }

        /// Mark the packet as a keyframe.
        pub fn keyframe(mut self, keyframe: bool) -> Self {
            self.flags.set(PacketFlags::KEYFRAME, keyframe);
            self
        }

        /// Append packet flags.
        pub fn flags(mut self, flags: PacketFlags) -> Self {
            self.flags |= flags;
            self
        }
    }
}

pub use builder::PacketBuilder;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_packet_builder() {
        let packet = PacketBuilder::new()
            .pts(Timestamp::new(3))
            .dur(Duration::new(1))
            .keyframe(true)
            .stream_index(2)
            .data(vec![1, 2, 3])
            .build();

        assert_eq!(packet.stream_index(), 2);
        assert_eq!(packet.pts(), Some(Timestamp::new(3)));
        assert_eq!(packet.dts(), None);
        assert_eq!(packet.decode_ts(), Some(Timestamp::new(3)));
        assert!(packet.is_keyframe());
        assert_eq!(packet.len(), 3);
    }

    #[test]
    fn verify_packet_rescale() {
        let mut packet = Packet::new(0, Some(Timestamp::new(2)), vec![0; 4]);
        packet.dts = Some(Timestamp::new(1));
        packet.dur = Duration::new(1);

        packet.rescale(TimeBase::new(1, 30), TimeBase::new(1, 90_000));

        assert_eq!(packet.pts, Some(Timestamp::new(6_000)));
        assert_eq!(packet.dts, Some(Timestamp::new(3_000)));
        assert_eq!(packet.dur, Duration::new(3_000));
    }

    #[test]
    fn verify_packet_clear_retains_capacity() {
        let mut packet = Packet::new(4, Some(Timestamp::new(9)), vec![0; 1024]);
        packet.flags = PacketFlags::KEYFRAME;

        packet.clear();

        assert_eq!(packet, Packet::default());
        assert!(packet.data.capacity() >= 1024);
    }
}
