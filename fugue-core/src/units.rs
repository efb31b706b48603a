// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `units` module provides definitions for common units and the conversions between them.
//!
//! Three coordinate systems are in use at any one time:
//!
//! * Wall-clock time, expressed as a [`Time`] or [`std::time::Duration`].
//! * Stream ticks, expressed as a [`Timestamp`] or [`Duration`] relative to a stream's
//!   [`TimeBase`].
//! * Codec ticks, expressed in the same types but relative to a codec engine's internal
//!   [`TimeBase`].
//!
//! None of the conversions in this module panic when given a degenerate (zero) time base or
//! frame rate. Instead, a zero value is returned.

use std::cmp::Ordering;
use std::fmt;

/// A `Timestamp` represents an instant in time since the start of a stream. One `Timestamp`
/// "tick" is equivalent to the stream's `TimeBase` in seconds.
///
/// Timestamps are signed since encoder delay frames may be presented before zero.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The timestamp of the origin of a stream.
    pub const ZERO: Timestamp = Timestamp(0);
    /// The smallest representable timestamp.
    pub const MIN: Timestamp = Timestamp(i64::MIN);
    /// The largest representable timestamp.
    pub const MAX: Timestamp = Timestamp(i64::MAX);

    /// Create a new timestamp from a tick count.
    pub const fn new(ts: i64) -> Self {
        Timestamp(ts)
    }

    /// Get the tick count.
    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Returns `true` if the timestamp is before the origin of the stream.
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Add a duration to the timestamp, returning `None` on overflow.
    pub fn checked_add(self, dur: Duration) -> Option<Timestamp> {
        i64::try_from(dur.0).ok().and_then(|dur| self.0.checked_add(dur)).map(Timestamp)
    }

    /// Add a duration to the timestamp, saturating at `Timestamp::MAX`.
    pub fn saturating_add(self, dur: Duration) -> Timestamp {
        self.checked_add(dur).unwrap_or(Timestamp::MAX)
    }

    /// Subtract a duration from the timestamp, saturating at `Timestamp::MIN`.
    pub fn saturating_sub(self, dur: Duration) -> Timestamp {
        let ts = i128::from(self.0) - i128::from(dur.0);
        Timestamp(ts.max(i128::from(i64::MIN)) as i64)
    }

    /// Get the duration from this timestamp until a later timestamp. Returns `None` if `other` is
    /// before this timestamp.
    pub fn duration_to(self, other: Timestamp) -> Option<Duration> {
        let delta = i128::from(other.0) - i128::from(self.0);

        if delta >= 0 {
            Some(Duration(delta as u64))
        }
        else {
            None
        }
    }

    /// Get the duration from an earlier timestamp until this timestamp. Returns `None` if `other`
    /// is after this timestamp.
    pub fn duration_from(self, other: Timestamp) -> Option<Duration> {
        other.duration_to(self)
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Timestamp(value)
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Timestamp(i64::from(value))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A `Duration` indicates a positive span of time in `TimeBase` ticks.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Duration = Duration(0);

    /// Create a new duration from a tick count.
    pub const fn new(dur: u64) -> Self {
        Duration(dur)
    }

    /// Get the tick count.
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns `true` if the duration is zero ticks long.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn saturating_add(self, other: Duration) -> Duration {
        Duration(self.0.saturating_add(other.0))
    }

    pub const fn saturating_sub(self, other: Duration) -> Duration {
        Duration(self.0.saturating_sub(other.0))
    }
}

impl From<u64> for Duration {
    fn from(value: u64) -> Self {
        Duration(value)
    }
}

impl From<u32> for Duration {
    fn from(value: u32) -> Self {
        Duration(u64::from(value))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `Time` represents a duration of time in seconds, or the number of seconds since an arbitrary
/// epoch. `Time` is stored as an integer number of seconds plus any remaining fraction of a second
/// as a floating point value.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd)]
pub struct Time {
    pub seconds: u64,
    pub frac: f64,
}

impl Time {
    const NANOSECONDS_PER_SECOND: f64 = 1_000_000_000.0;

    pub fn new(seconds: u64, frac: f64) -> Self {
        Time { seconds, frac }
    }

    /// Get the time as a floating point number of seconds. Precision is lost for very large
    /// times.
    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + self.frac
    }
}

impl From<u32> for Time {
    fn from(seconds: u32) -> Self {
        Time::new(u64::from(seconds), 0.0)
    }
}

impl From<u64> for Time {
    fn from(seconds: u64) -> Self {
        Time::new(seconds, 0.0)
    }
}

impl From<f64> for Time {
    fn from(seconds: f64) -> Self {
        if seconds >= 0.0 {
            Time::new(seconds.trunc() as u64, seconds.fract())
        }
        else {
            Time::new(0, 0.0)
        }
    }
}

impl From<std::time::Duration> for Time {
    fn from(duration: std::time::Duration) -> Self {
        Time::new(duration.as_secs(), f64::from(duration.subsec_nanos()) / 1_000_000_000.0)
    }
}

impl From<Time> for std::time::Duration {
    fn from(time: Time) -> Self {
        let frac = if time.frac >= 0.0 && time.frac < 1.0 { time.frac } else { 0.0 };
        let nanos = (Time::NANOSECONDS_PER_SECOND * frac).round() as u64;

        // Rounding may carry into the next second.
        let nanos = std::time::Duration::from_nanos(nanos);
        std::time::Duration::new(time.seconds, 0).saturating_add(nanos)
    }
}

/// A `TimeBase` is the conversion factor between time, expressed in seconds, and a `Timestamp` or
/// `Duration`.
///
/// In other words, a `TimeBase` is the length in seconds of one tick of a `Timestamp` or
/// `Duration`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBase {
    /// The numerator.
    pub numer: u32,
    /// The denominator.
    pub denom: u32,
}

impl TimeBase {
    /// Fractions of a tick below this are treated as rounding error of `Time::frac`.
    const TICK_EPSILON: f64 = 1e-6;

    /// Creates a new `TimeBase`. Panics if either the numerator or denominator is 0.
    pub fn new(numer: u32, denom: u32) -> Self {
        if numer == 0 || denom == 0 {
            panic!("TimeBase cannot have 0 numerator or denominator");
        }

        TimeBase { numer, denom }
    }

    /// Creates a new `TimeBase`, returning `None` if either the numerator or denominator is 0.
    pub fn try_new(numer: u32, denom: u32) -> Option<Self> {
        if numer == 0 || denom == 0 {
            return None;
        }

        Some(TimeBase { numer, denom })
    }

    /// Creates a `TimeBase` that is the reciprocal of a rate (e.g., a sample rate), returning
    /// `None` if the rate is 0.
    pub fn try_from_recip(rate: u32) -> Option<Self> {
        TimeBase::try_new(1, rate)
    }

    /// Returns `true` if neither the numerator nor the denominator is 0.
    pub fn is_valid(&self) -> bool {
        self.numer > 0 && self.denom > 0
    }

    /// Accurately calculates a `Time` using the `TimeBase` and the provided `Timestamp`.
    ///
    /// Negative timestamps, and any timestamp in a degenerate time base, map to zero time.
    pub fn calc_time(&self, ts: Timestamp) -> Time {
        if !self.is_valid() || ts.is_negative() {
            return Time::default();
        }

        // The dividend requires up-to 95-bits (32-bit timebase numerator * 63-bit timestamp).
        let dividend = (ts.0 as u128) * u128::from(self.numer);

        // For an accurate floating point division, both the dividend and divisor must have an
        // accurate floating point representation. A 64-bit floating point value has a mantissa of
        // 52 bits and can therefore accurately represent a 52-bit integer. The divisor (the
        // denominator of the timebase) is limited to 32-bits. Therefore, if the dividend
        // requires less than 52-bits, a straight-forward floating point division can be used to
        // calculate the time.
        if dividend < (1 << 52) {
            let seconds = (dividend as f64) / f64::from(self.denom);

            Time::new(seconds.trunc() as u64, seconds.fract())
        }
        else {
            // If the dividend requires more than 52 bits, calculate the integer portion using
            // integer arithmetic, then calculate the fractional part separately.
            let quotient = dividend / u128::from(self.denom);

            // The remainder never equals or exceeds the divisor, so it fits within a u32.
            let rem = (dividend - (quotient * u128::from(self.denom))) as u32;

            let frac = f64::from(rem) / f64::from(self.denom);

            Time::new(quotient as u64, frac)
        }
    }

    /// Accurately calculates a `Timestamp` from the given `Time` using the `TimeBase` as the
    /// conversion factor. The result is rounded to the nearest tick and saturates at
    /// `Timestamp::MAX`.
    ///
    /// A degenerate time base always yields `Timestamp::ZERO`.
    pub fn calc_timestamp(&self, time: Time) -> Timestamp {
        self.calc_ticks(time, false)
    }

    /// Like [`TimeBase::calc_timestamp`], but any partial tick is rounded up. The returned
    /// timestamp is the first tick at or after the time.
    pub fn calc_timestamp_ceil(&self, time: Time) -> Timestamp {
        self.calc_ticks(time, true)
    }

    fn calc_ticks(&self, time: Time, round_up: bool) -> Timestamp {
        if !self.is_valid() {
            return Timestamp::ZERO;
        }

        let frac = if time.frac >= 0.0 && time.frac < 1.0 { time.frac } else { 0.0 };

        // The fraction scaled by the denominator is below 2^32, so its integer part is exact.
        let scaled = frac * f64::from(self.denom);
        let mut whole = scaled.trunc();
        let mut part = scaled - whole;

        // Residue this small is floating point error in the fraction, not a partial tick.
        if part < Self::TICK_EPSILON {
            part = 0.0;
        }
        else if part > 1.0 - Self::TICK_EPSILON {
            whole += 1.0;
            part = 0.0;
        }

        // At most 64 + 32 bits, the dividend always fits within a u128.
        let dividend = u128::from(time.seconds) * u128::from(self.denom) + whole as u128;
        let quotient = dividend / u128::from(self.numer);

        // The remainder is below the numerator, so it is exact as a float.
        let rem = (dividend % u128::from(self.numer)) as f64 + part;

        let carry = if round_up { rem > 0.0 } else { 2.0 * rem >= f64::from(self.numer) };

        let ticks = quotient + u128::from(carry);

        Timestamp(ticks.min(i64::MAX as u128) as i64)
    }

    /// Rescale a timestamp from this time base into another time base, rounding to the nearest
    /// tick (halfway cases away from zero).
    pub fn rescale(&self, ts: Timestamp, to: TimeBase) -> Timestamp {
        rescale(ts, *self, to)
    }
}

impl From<TimeBase> for f64 {
    fn from(timebase: TimeBase) -> Self {
        if timebase.denom == 0 {
            return 0.0;
        }
        f64::from(timebase.numer) / f64::from(timebase.denom)
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

/// A `FrameRate` is the number of frames presented per second, expressed as a rational number.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameRate {
    /// The numerator.
    pub numer: u32,
    /// The denominator.
    pub denom: u32,
}

impl FrameRate {
    pub const fn new(numer: u32, denom: u32) -> Self {
        FrameRate { numer, denom }
    }

    /// Returns `true` if neither the numerator nor the denominator is 0.
    pub fn is_valid(&self) -> bool {
        self.numer > 0 && self.denom > 0
    }

    /// Get the time base in which one tick is exactly one frame, if the frame rate is valid.
    pub fn frame_time_base(&self) -> Option<TimeBase> {
        TimeBase::try_new(self.denom, self.numer)
    }

    /// Get the duration of a single frame in ticks of the given time base. Returns a zero duration
    /// if either the frame rate or the time base is degenerate.
    pub fn frame_duration(&self, time_base: TimeBase) -> Duration {
        match self.frame_time_base() {
            Some(frame_tb) if time_base.is_valid() => {
                let ticks = rescale(Timestamp(1), frame_tb, time_base);
                Duration(ticks.0.max(0) as u64)
            }
            _ => Duration::ZERO,
        }
    }
}

impl From<FrameRate> for f64 {
    fn from(rate: FrameRate) -> Self {
        if rate.denom == 0 {
            return 0.0;
        }
        f64::from(rate.numer) / f64::from(rate.denom)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numer, self.denom)
    }
}

/// Divide, rounding to the nearest integer with halfway cases rounded away from zero.
fn div_round(num: i128, den: i128) -> i128 {
    let half = den / 2;

    if num >= 0 {
        (num + half) / den
    }
    else {
        (num - half) / den
    }
}

/// Rescale a timestamp from one time base into another, rounding to the nearest tick (halfway
/// cases away from zero). The result saturates at the bounds of `Timestamp`.
///
/// If either time base is degenerate, `Timestamp::ZERO` is returned.
pub fn rescale(ts: Timestamp, from: TimeBase, to: TimeBase) -> Timestamp {
    if !from.is_valid() || !to.is_valid() {
        return Timestamp::ZERO;
    }

    if from == to {
        return ts;
    }

    // At most 63 + 32 + 32 bits, the product always fits within an i128.
    let num = i128::from(ts.0) * i128::from(from.numer) * i128::from(to.denom);
    let den = i128::from(from.denom) * i128::from(to.numer);

    let scaled = div_round(num, den).clamp(i128::from(i64::MIN), i128::from(i64::MAX));

    Timestamp(scaled as i64)
}

/// Rescale a duration from one time base into another, rounding to the nearest tick.
///
/// If either time base is degenerate, `Duration::ZERO` is returned.
pub fn rescale_duration(dur: Duration, from: TimeBase, to: TimeBase) -> Duration {
    if !from.is_valid() || !to.is_valid() {
        return Duration::ZERO;
    }

    let num = i128::from(dur.0) * i128::from(from.numer) * i128::from(to.denom);
    let den = i128::from(from.denom) * i128::from(to.numer);

    Duration(div_round(num, den).clamp(0, i128::from(u64::MAX)) as u64)
}

/// Compare two timestamps expressed in different time bases without loss of precision.
///
/// A timestamp in a degenerate time base compares as zero.
pub fn compare_timestamps(a: Timestamp, a_tb: TimeBase, b: Timestamp, b_tb: TimeBase) -> Ordering {
    let lhs = if a_tb.is_valid() {
        i128::from(a.0) * i128::from(a_tb.numer) * i128::from(b_tb.denom.max(1))
    }
    else {
        0
    };

    let rhs = if b_tb.is_valid() {
        i128::from(b.0) * i128::from(b_tb.numer) * i128::from(a_tb.denom.max(1))
    }
    else {
        0
    };

    lhs.cmp(&rhs)
}

/// Convert a tick count into a wall-clock duration. Negative tick counts, and any tick count in a
/// degenerate time base, yield a zero duration.
pub fn ticks_to_duration(ticks: Timestamp, time_base: TimeBase) -> std::time::Duration {
    std::time::Duration::from(time_base.calc_time(ticks))
}

/// Convert a wall-clock duration into a tick count, rounded to the nearest tick. A degenerate time
/// base yields `Timestamp::ZERO`.
pub fn duration_to_ticks(duration: std::time::Duration, time_base: TimeBase) -> Timestamp {
    time_base.calc_timestamp(Time::from(duration))
}

/// Estimate the number of frames presented within a wall-clock duration at the given frame rate,
/// rounded to the nearest frame. A degenerate frame rate yields zero frames.
pub fn estimate_frame_count(duration: std::time::Duration, frame_rate: FrameRate) -> u64 {
    if !frame_rate.is_valid() {
        return 0;
    }

    let nanos = duration.as_nanos();
    let num = nanos * u128::from(frame_rate.numer);
    let den = 1_000_000_000u128 * u128::from(frame_rate.denom);

    ((num + den / 2) / den).min(u128::from(u64::MAX)) as u64
}
