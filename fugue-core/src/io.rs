// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `io` module defines the byte sources container readers consume.

use std::io;

/// A byte source a container reader consumes.
///
/// Every source implements [`std::io::Seek`], but only some can honour it. Container readers
/// query [`MediaSource::is_seekable`] once and fall back to sequential reading if it is `false`.
pub trait MediaSource: io::Read + io::Seek + Send + Sync {
    /// Returns `true` if the source can be repositioned.
    fn is_seekable(&self) -> bool;

    /// The total length of the source in bytes, if known.
    fn byte_len(&self) -> Option<u64>;
}

impl MediaSource for std::fs::File {
    /// Only regular files are seekable. Pipes and character devices are read sequentially.
    fn is_seekable(&self) -> bool {
        self.metadata().map_or(false, |metadata| metadata.is_file())
    }

    fn byte_len(&self) -> Option<u64> {
        self.metadata().ok().map(|metadata| metadata.len())
    }
}

impl<T: std::convert::AsRef<[u8]> + Send + Sync> MediaSource for io::Cursor<T> {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.get_ref().as_ref().len() as u64)
    }
}

/// Adapts a plain reader, such as a socket or standard input, into a [`MediaSource`] that
/// cannot seek.
pub struct ReadOnlySource<R: io::Read> {
    inner: R,
}

impl<R: io::Read + Send> ReadOnlySource<R> {
    pub fn new(inner: R) -> Self {
        ReadOnlySource { inner }
    }

    /// Get the wrapped reader.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Consume the source, returning the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read + Send + Sync> MediaSource for ReadOnlySource<R> {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

impl<R: io::Read> io::Read for ReadOnlySource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: io::Read> io::Seek for ReadOnlySource<R> {
    fn seek(&mut self, _: io::SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "source does not support seeking"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek};

    #[test]
    fn verify_read_only_source() {
        let mut source = ReadOnlySource::new(io::Cursor::new(vec![1u8, 2, 3]));

        assert!(!source.is_seekable());
        assert!(source.byte_len().is_none());
        assert!(source.seek(io::SeekFrom::Start(0)).is_err());

        let mut buf = Vec::new();
        source.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn verify_cursor_source() {
        let source = io::Cursor::new(vec![0u8; 17]);
        assert!(source.is_seekable());
        assert_eq!(source.byte_len(), Some(17));
    }
}
