// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

use crate::units::Timestamp;

/// `SeekErrorKind` is a list of generic reasons why a seek may fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SeekErrorKind {
    /// The input is not seekable at all.
    Unseekable,
    /// The stream index provided is invalid.
    InvalidStream,
}

impl SeekErrorKind {
    fn as_str(&self) -> &'static str {
        match *self {
            SeekErrorKind::Unseekable => "input is not seekable",
            SeekErrorKind::InvalidStream => "invalid stream index",
        }
    }
}

/// `UsageErrorKind` is a list of ways a caller may misuse a container or pump.
///
/// A usage error never leaves the pump in an inconsistent state. The offending call is rejected
/// and the pump may continue to be used.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UsageErrorKind {
    /// A frame was submitted to an encoder with a timestamp that does not strictly increase.
    NonMonotonicTimestamp { previous: Timestamp, next: Timestamp },
    /// A frame was submitted to an encoder without a timestamp.
    MissingTimestamp,
    /// A frame was submitted to an encoder after it was flushed.
    PushAfterFlush,
    /// An encoder was flushed more than once.
    AlreadyFlushed,
    /// The stream has not been opened for decoding.
    StreamNotOpen(u32),
    /// The stream index does not exist in the container.
    InvalidStream(u32),
    /// The stream has already been opened.
    StreamAlreadyOpen(u32),
    /// Streams may no longer be added because the container header was written.
    ContainerLocked,
    /// The container has been finalized.
    ContainerFinalized,
    /// A one-time initialization was attempted a second time.
    AlreadyInitialized,
}

impl fmt::Display for UsageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            UsageErrorKind::NonMonotonicTimestamp { previous, next } => {
                write!(
                    f,
                    "frame timestamp {} does not follow previous timestamp {}",
                    next, previous
                )
            }
            UsageErrorKind::MissingTimestamp => write!(f, "frame has no timestamp"),
            UsageErrorKind::PushAfterFlush => write!(f, "frame submitted after flush"),
            UsageErrorKind::AlreadyFlushed => write!(f, "encoder already flushed"),
            UsageErrorKind::StreamNotOpen(index) => write!(f, "stream {} is not open", index),
            UsageErrorKind::InvalidStream(index) => write!(f, "stream {} does not exist", index),
            UsageErrorKind::StreamAlreadyOpen(index) => {
                write!(f, "stream {} is already open", index)
            }
            UsageErrorKind::ContainerLocked => write!(f, "container header already written"),
            UsageErrorKind::ContainerFinalized => write!(f, "container already finalized"),
            UsageErrorKind::AlreadyInitialized => write!(f, "already initialized"),
        }
    }
}

/// `Error` provides an enumeration of all possible errors reported by Fugue.
#[derive(Debug)]
pub enum Error {
    /// An IO error occured while reading, writing, or seeking the container.
    IoError(std::io::Error),
    /// The input contained malformed data and could not be decoded or demuxed.
    DecodeError(&'static str),
    /// The frame could not be encoded or the packet could not be muxed.
    EncodeError(&'static str),
    /// A codec or container engine failed or misbehaved.
    EngineError(String),
    /// The input could not be seeked.
    SeekError(SeekErrorKind),
    /// An unsupported container or codec feature was encounted.
    Unsupported(&'static str),
    /// A default or user-defined limit was reached while decoding or demuxing the input. Limits
    /// are used to prevent denial-of-service attacks from malicious inputs.
    LimitError(&'static str),
    /// The caller used a container or pump incorrectly.
    UsageError(UsageErrorKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::IoError(ref err) => err.fmt(f),
            Error::DecodeError(msg) => {
                write!(f, "malformed input: {}", msg)
            }
            Error::EncodeError(msg) => {
                write!(f, "encode failed: {}", msg)
            }
            Error::EngineError(ref msg) => {
                write!(f, "engine failure: {}", msg)
            }
            Error::SeekError(ref kind) => {
                write!(f, "seek error: {}", kind.as_str())
            }
            Error::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
            Error::LimitError(constraint) => {
                write!(f, "limit reached: {}", constraint)
            }
            Error::UsageError(ref kind) => {
                write!(f, "usage error: {}", kind)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::DecodeError(desc))
}

/// Convenience function to create an encode error.
pub fn encode_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::EncodeError(desc))
}

/// Convenience function to create an engine error.
pub fn engine_error<T>(desc: impl Into<String>) -> Result<T> {
    Err(Error::EngineError(desc.into()))
}

/// Convenience function to create a seek error.
pub fn seek_error<T>(kind: SeekErrorKind) -> Result<T> {
    Err(Error::SeekError(kind))
}

/// Convenience function to create an unsupport feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::LimitError(constraint))
}

/// Convenience function to create a usage error.
pub fn usage_error<T>(kind: UsageErrorKind) -> Result<T> {
    Err(Error::UsageError(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_usage_error_display() {
        let err = Error::UsageError(UsageErrorKind::NonMonotonicTimestamp {
            previous: Timestamp::new(5),
            next: Timestamp::new(3),
        });

        assert_eq!(
            err.to_string(),
            "usage error: frame timestamp 3 does not follow previous timestamp 5"
        );
    }

    #[test]
    fn verify_seek_error_display() {
        assert_eq!(
            Error::SeekError(SeekErrorKind::Unseekable).to_string(),
            "seek error: input is not seekable"
        );
        assert_eq!(
            Error::SeekError(SeekErrorKind::InvalidStream).to_string(),
            "seek error: invalid stream index"
        );
    }

    #[test]
    fn verify_io_error_source() {
        let err: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(error::Error::source(&err).is_some());
        assert!(error::Error::source(&Error::DecodeError("bad")).is_none());
    }
}
