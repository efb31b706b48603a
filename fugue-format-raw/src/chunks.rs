// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{Read, Write};

use fugue_core::codecs::{AudioCodecParameters, CodecId, CodecParameters, VideoCodecParameters};
use fugue_core::errors::{decode_error, limit_error, unsupported_error, Result};
use fugue_core::formats::{FormatOptions, Stream, StreamFlags};
use fugue_core::frame::{PixelFormat, SampleFormat};
use fugue_core::packet::{Packet, PacketFlags};
use fugue_core::units::{Duration, FrameRate, TimeBase, Timestamp};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

pub const CONTAINER_MARKER: [u8; 4] = *b"FGRW";
pub const FOOTER_MARKER: [u8; 4] = *b"FGRE";
pub const VERSION: u8 = 1;

pub const TAG_PACKET: u8 = 0x01;
pub const TAG_TRAILER: u8 = 0x02;

/// The length of the footer: the trailer offset and the footer marker.
pub const FOOTER_LEN: u64 = 12;

const KIND_VIDEO: u8 = 0;
const KIND_AUDIO: u8 = 1;

const NO_FORMAT: u8 = 0xff;

const RECORD_KEYFRAME: u8 = 1 << 0;
const RECORD_HAS_PTS: u8 = 1 << 1;
const RECORD_HAS_DTS: u8 = 1 << 2;
const RECORD_DISCARD: u8 = 1 << 3;
const RECORD_CORRUPT: u8 = 1 << 4;

fn pixel_format_code(format: Option<PixelFormat>) -> u8 {
    match format {
        Some(PixelFormat::Gray8) => 0,
        Some(PixelFormat::Rgb24) => 1,
        Some(PixelFormat::Rgba32) => 2,
        Some(PixelFormat::Yuv420p) => 3,
        None => NO_FORMAT,
    }
}

fn pixel_format_from_code(code: u8) -> Result<Option<PixelFormat>> {
    let format = match code {
        0 => PixelFormat::Gray8,
        1 => PixelFormat::Rgb24,
        2 => PixelFormat::Rgba32,
        3 => PixelFormat::Yuv420p,
        NO_FORMAT => return Ok(None),
        _ => return decode_error("raw: invalid pixel format"),
    };
    Ok(Some(format))
}

fn sample_format_code(format: Option<SampleFormat>) -> u8 {
    match format {
        Some(SampleFormat::U8) => 0,
        Some(SampleFormat::S16) => 1,
        Some(SampleFormat::S32) => 2,
        Some(SampleFormat::F32) => 3,
        Some(SampleFormat::F64) => 4,
        None => NO_FORMAT,
    }
}

fn sample_format_from_code(code: u8) -> Result<Option<SampleFormat>> {
    let format = match code {
        0 => SampleFormat::U8,
        1 => SampleFormat::S16,
        2 => SampleFormat::S32,
        3 => SampleFormat::F32,
        4 => SampleFormat::F64,
        NO_FORMAT => return Ok(None),
        _ => return decode_error("raw: invalid sample format"),
    };
    Ok(Some(format))
}

fn write_extra_data<W: Write>(writer: &mut W, extra_data: Option<&[u8]>) -> Result<()> {
    let extra_data = extra_data.unwrap_or_default();

    let len = match u32::try_from(extra_data.len()) {
        Ok(len) => len,
        Err(_) => return limit_error("raw: codec extra data is too large"),
    };

    writer.write_u32::<LittleEndian>(len)?;
    writer.write_all(extra_data)?;
    Ok(())
}

fn read_extra_data<R: Read>(reader: &mut R, opts: &FormatOptions) -> Result<Option<Box<[u8]>>> {
    let len = reader.read_u32::<LittleEndian>()? as usize;

    if len == 0 {
        return Ok(None);
    }

    if len > opts.max_packet_len {
        return limit_error("raw: codec extra data exceeds maximum length");
    }

    let mut buf = vec![0; len];
    reader.read_exact(&mut buf)?;
    Ok(Some(buf.into_boxed_slice()))
}

/// Write the container header describing the given streams.
pub fn write_header<W: Write>(writer: &mut W, streams: &[Stream]) -> Result<()> {
    let count = match u16::try_from(streams.len()) {
        Ok(count) => count,
        Err(_) => return limit_error("raw: too many streams"),
    };

    writer.write_all(&CONTAINER_MARKER)?;
    writer.write_u8(VERSION)?;
    writer.write_u16::<LittleEndian>(count)?;

    for stream in streams {
        write_stream(writer, stream)?;
    }

    Ok(())
}

fn write_stream<W: Write>(writer: &mut W, stream: &Stream) -> Result<()> {
    writer.write_u32::<LittleEndian>(stream.index)?;

    let kind = match stream.codec_params {
        CodecParameters::Video(_) => KIND_VIDEO,
        CodecParameters::Audio(_) => KIND_AUDIO,
    };

    writer.write_u8(kind)?;
    writer.write_u32::<LittleEndian>(stream.codec_params.codec().get())?;
    writer.write_u32::<LittleEndian>(stream.time_base.numer)?;
    writer.write_u32::<LittleEndian>(stream.time_base.denom)?;
    writer.write_i64::<LittleEndian>(stream.start_ts.get())?;
    writer.write_u32::<LittleEndian>(stream.flags.bits())?;

    match &stream.codec_params {
        CodecParameters::Video(params) => {
            let rate = params.frame_rate.unwrap_or(FrameRate::new(0, 0));

            writer.write_u32::<LittleEndian>(params.width)?;
            writer.write_u32::<LittleEndian>(params.height)?;
            writer.write_u8(pixel_format_code(params.pixel_format))?;
            writer.write_u32::<LittleEndian>(rate.numer)?;
            writer.write_u32::<LittleEndian>(rate.denom)?;
            write_extra_data(writer, params.extra_data.as_deref())?;
        }
        CodecParameters::Audio(params) => {
            writer.write_u32::<LittleEndian>(params.sample_rate.unwrap_or(0))?;
            writer.write_u16::<LittleEndian>(params.channels)?;
            writer.write_u8(sample_format_code(params.sample_format))?;
            writer.write_u32::<LittleEndian>(params.frames_per_packet.unwrap_or(0))?;
            write_extra_data(writer, params.extra_data.as_deref())?;
        }
    }

    Ok(())
}

/// Read the container header, returning the streams it describes.
pub fn read_header<R: Read>(reader: &mut R, opts: &FormatOptions) -> Result<Vec<Stream>> {
    let mut marker = [0; 4];
    reader.read_exact(&mut marker)?;

    if marker != CONTAINER_MARKER {
        return unsupported_error("raw: missing container marker");
    }

    if reader.read_u8()? != VERSION {
        return unsupported_error("raw: unsupported container version");
    }

    let count = reader.read_u16::<LittleEndian>()?;

    let mut streams: Vec<Stream> = Vec::with_capacity(usize::from(count));

    for _ in 0..count {
        let stream = read_stream(reader, opts)?;

        if streams.iter().any(|other| other.index == stream.index) {
            return decode_error("raw: duplicate stream index");
        }

        streams.push(stream);
    }

    Ok(streams)
}

fn read_stream<R: Read>(reader: &mut R, opts: &FormatOptions) -> Result<Stream> {
    let index = reader.read_u32::<LittleEndian>()?;
    let kind = reader.read_u8()?;
    let codec = CodecId::from_raw(reader.read_u32::<LittleEndian>()?);

    let numer = reader.read_u32::<LittleEndian>()?;
    let denom = reader.read_u32::<LittleEndian>()?;

    let time_base = match TimeBase::try_new(numer, denom) {
        Some(time_base) => time_base,
        None => return decode_error("raw: invalid stream time base"),
    };

    let start_ts = Timestamp::new(reader.read_i64::<LittleEndian>()?);
    let flags = StreamFlags::from_bits_truncate(reader.read_u32::<LittleEndian>()?);

    let codec_params = match kind {
        KIND_VIDEO => {
            let mut params = VideoCodecParameters::default();
            params.for_codec(codec);

            let width = reader.read_u32::<LittleEndian>()?;
            let height = reader.read_u32::<LittleEndian>()?;
            params.with_dimensions(width, height);

            if let Some(format) = pixel_format_from_code(reader.read_u8()?)? {
                params.with_pixel_format(format);
            }

            let rate = FrameRate::new(
                reader.read_u32::<LittleEndian>()?,
                reader.read_u32::<LittleEndian>()?,
            );

            if rate.is_valid() {
                params.with_frame_rate(rate);
            }

            if let Some(extra_data) = read_extra_data(reader, opts)? {
                params.with_extra_data(extra_data);
            }

            CodecParameters::Video(params)
        }
        KIND_AUDIO => {
            let mut params = AudioCodecParameters::default();
            params.for_codec(codec);

            let sample_rate = reader.read_u32::<LittleEndian>()?;
            if sample_rate > 0 {
                params.with_sample_rate(sample_rate);
            }

            params.with_channels(reader.read_u16::<LittleEndian>()?);

            if let Some(format) = sample_format_from_code(reader.read_u8()?)? {
                params.with_sample_format(format);
            }

            let frames_per_packet = reader.read_u32::<LittleEndian>()?;
            if frames_per_packet > 0 {
                params.with_frames_per_packet(frames_per_packet);
            }

            if let Some(extra_data) = read_extra_data(reader, opts)? {
                params.with_extra_data(extra_data);
            }

            CodecParameters::Audio(params)
        }
        _ => return decode_error("raw: invalid stream kind"),
    };

    let mut stream = Stream::new(index, codec_params, time_base);
    stream.with_start_ts(start_ts).with_flags(flags);

    Ok(stream)
}

/// Write a packet record, including its tag. Returns the number of bytes written.
pub fn write_packet<W: Write>(writer: &mut W, packet: &Packet) -> Result<u64> {
    let len = match u32::try_from(packet.len()) {
        Ok(len) => len,
        Err(_) => return limit_error("raw: packet is too large"),
    };

    let mut flags = 0;

    if packet.flags.contains(PacketFlags::KEYFRAME) {
        flags |= RECORD_KEYFRAME;
    }
    if packet.flags.contains(PacketFlags::DISCARD) {
        flags |= RECORD_DISCARD;
    }
    if packet.flags.contains(PacketFlags::CORRUPT) {
        flags |= RECORD_CORRUPT;
    }
    if packet.pts.is_some() {
        flags |= RECORD_HAS_PTS;
    }
    if packet.dts.is_some() {
        flags |= RECORD_HAS_DTS;
    }

    writer.write_u8(TAG_PACKET)?;
    writer.write_u32::<LittleEndian>(packet.stream_index())?;
    writer.write_u8(flags)?;
    writer.write_i64::<LittleEndian>(packet.pts.map_or(0, |ts| ts.get()))?;
    writer.write_i64::<LittleEndian>(packet.dts.map_or(0, |ts| ts.get()))?;
    writer.write_u64::<LittleEndian>(packet.dur.get())?;
    writer.write_u32::<LittleEndian>(len)?;
    writer.write_all(packet.buf())?;

    Ok(PACKET_RECORD_HEADER_LEN + u64::from(len))
}

/// The length of a packet record without its payload.
const PACKET_RECORD_HEADER_LEN: u64 = 1 + 4 + 1 + 8 + 8 + 8 + 4;

/// Read the body of a packet record. The tag must have been consumed.
pub fn read_packet<R: Read>(reader: &mut R, opts: &FormatOptions) -> Result<Packet> {
    let stream_index = reader.read_u32::<LittleEndian>()?;
    let flags = reader.read_u8()?;
    let pts = reader.read_i64::<LittleEndian>()?;
    let dts = reader.read_i64::<LittleEndian>()?;
    let dur = reader.read_u64::<LittleEndian>()?;
    let len = reader.read_u32::<LittleEndian>()? as usize;

    if len > opts.max_packet_len {
        return limit_error("raw: packet exceeds maximum length");
    }

    let mut data = vec![0; len];
    reader.read_exact(&mut data)?;

    let mut packet_flags = PacketFlags::empty();
    packet_flags.set(PacketFlags::KEYFRAME, flags & RECORD_KEYFRAME != 0);
    packet_flags.set(PacketFlags::DISCARD, flags & RECORD_DISCARD != 0);
    packet_flags.set(PacketFlags::CORRUPT, flags & RECORD_CORRUPT != 0);

    let mut packet = Packet::new(stream_index, None, data);

    packet.pts = if flags & RECORD_HAS_PTS != 0 { Some(Timestamp::new(pts)) } else { None };
    packet.dts = if flags & RECORD_HAS_DTS != 0 { Some(Timestamp::new(dts)) } else { None };
    packet.dur = Duration::new(dur);
    packet.flags = packet_flags;

    Ok(packet)
}

/// An entry of the keyframe index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub stream_index: u32,
    pub ts: Timestamp,
    /// The byte offset of the record's tag from the start of the container.
    pub offset: u64,
}

/// The trailer of a container.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trailer {
    pub durations: Vec<(u32, Duration)>,
    pub index: Vec<IndexEntry>,
}

impl Trailer {
    /// Write the trailer, including its tag, followed by the footer.
    pub fn write<W: Write>(&self, writer: &mut W, trailer_offset: u64) -> Result<()> {
        let (streams, entries) =
            match (u16::try_from(self.durations.len()), u32::try_from(self.index.len())) {
                (Ok(streams), Ok(entries)) => (streams, entries),
                _ => return limit_error("raw: trailer is too large"),
            };

        writer.write_u8(TAG_TRAILER)?;
        writer.write_u16::<LittleEndian>(streams)?;

        for &(stream_index, duration) in &self.durations {
            writer.write_u32::<LittleEndian>(stream_index)?;
            writer.write_u64::<LittleEndian>(duration.get())?;
        }

        writer.write_u32::<LittleEndian>(entries)?;

        for entry in &self.index {
            writer.write_u32::<LittleEndian>(entry.stream_index)?;
            writer.write_i64::<LittleEndian>(entry.ts.get())?;
            writer.write_u64::<LittleEndian>(entry.offset)?;
        }

        writer.write_u64::<LittleEndian>(trailer_offset)?;
        writer.write_all(&FOOTER_MARKER)?;

        Ok(())
    }

    /// Read the trailer, including its tag.
    pub fn read<R: Read>(reader: &mut R) -> Result<Trailer> {
        if reader.read_u8()? != TAG_TRAILER {
            return decode_error("raw: footer does not point at the trailer");
        }

        let streams = reader.read_u16::<LittleEndian>()?;

        let mut durations = Vec::with_capacity(usize::from(streams));

        for _ in 0..streams {
            let stream_index = reader.read_u32::<LittleEndian>()?;
            let duration = Duration::new(reader.read_u64::<LittleEndian>()?);
            durations.push((stream_index, duration));
        }

        let entries = reader.read_u32::<LittleEndian>()?;

        let mut index = Vec::new();

        for _ in 0..entries {
            index.push(IndexEntry {
                stream_index: reader.read_u32::<LittleEndian>()?,
                ts: Timestamp::new(reader.read_i64::<LittleEndian>()?),
                offset: reader.read_u64::<LittleEndian>()?,
            });
        }

        Ok(Trailer { durations, index })
    }
}

/// Read the footer, returning the offset of the trailer.
pub fn read_footer<R: Read>(reader: &mut R) -> Result<u64> {
    let trailer_offset = reader.read_u64::<LittleEndian>()?;

    let mut marker = [0; 4];
    reader.read_exact(&mut marker)?;

    if marker != FOOTER_MARKER {
        return decode_error("raw: missing footer marker");
    }

    Ok(trailer_offset)
}
