// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A per-stream FIFO of demuxed packets bounded by a byte budget.

use std::collections::VecDeque;

use fugue_core::packet::Packet;

use log::{debug, warn};

/// A FIFO queue of packets for a single stream.
///
/// The sum of the payload sizes of all queued packets never exceeds the limit, unless the most
/// recently pushed packet alone exceeds it. Pushing never blocks: when the limit is exceeded, the
/// oldest packets are evicted.
pub struct PacketBuffer {
    stream_index: u32,
    packets: VecDeque<Packet>,
    bytes: usize,
    limit: usize,
    evicted: u64,
}

impl PacketBuffer {
    pub fn new(stream_index: u32, limit: usize) -> Self {
        PacketBuffer { stream_index, packets: Default::default(), bytes: 0, limit, evicted: 0 }
    }

    /// Append a packet. If the byte limit is exceeded, the oldest packets are evicted until the
    /// total is within the limit again, which may take more than one eviction.
    pub fn push(&mut self, packet: Packet) {
        self.bytes += packet.len();
        self.packets.push_back(packet);

        if self.bytes <= self.limit {
            return;
        }

        let mut count = 0;

        // Evict from the front, but never the packet that was just pushed.
        while self.bytes > self.limit && self.packets.len() > 1 {
            if let Some(oldest) = self.packets.pop_front() {
                self.bytes -= oldest.len();
                count += 1;
            }
        }

        if count > 0 {
            self.evicted += count;

            warn!(
                "stream {}: buffer limit of {} bytes exceeded, evicted {} packet(s)",
                self.stream_index, self.limit, count
            );
        }
    }

    /// Remove and return the oldest packet. `None` means more input must be demuxed.
    pub fn pop(&mut self) -> Option<Packet> {
        let packet = self.packets.pop_front()?;
        self.bytes -= packet.len();
        Some(packet)
    }

    /// Get the oldest packet without removing it.
    pub fn peek(&self) -> Option<&Packet> {
        self.packets.front()
    }

    /// Release every packet.
    pub fn discard_all(&mut self) {
        if !self.packets.is_empty() {
            debug!(
                "stream {}: discarding {} buffered packet(s), {} bytes",
                self.stream_index,
                self.packets.len(),
                self.bytes
            );
        }

        self.packets.clear();
        self.bytes = 0;
    }

    /// The number of queued packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// The total payload size of all queued packets.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// The byte limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The number of packets evicted since the buffer was created.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
