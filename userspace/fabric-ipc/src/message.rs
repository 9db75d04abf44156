// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Messages handed from the receive handler to node tasks.

use fabric_wire::Packet;

use crate::NodeId;

/// Message payload: a sequence of 32-bit words with an explicit length.
///
/// The wire only ever carries one word; the type stays variable-length so
/// protocols are not tied to the single-word framing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload(Vec<u32>);

impl Payload {
    /// Payload holding exactly one word.
    pub fn single(word: u32) -> Self {
        Self(vec![word])
    }

    /// Payload built from an arbitrary word sequence.
    pub fn from_words(words: Vec<u32>) -> Self {
        Self(words)
    }

    /// Number of words carried.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no words are carried.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All payload words.
    pub fn words(&self) -> &[u32] {
        &self.0
    }

    /// First word, if any.
    pub fn first(&self) -> Option<u32> {
        self.0.first().copied()
    }
}

/// A received message. Owned by the inbox until popped, then by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sending node.
    pub source: NodeId,
    /// Raw opcode; protocols decode it into their own opcode set.
    pub opcode: u32,
    /// Message payload.
    pub payload: Payload,
}

impl Message {
    /// Builds a single-word message.
    pub fn new(source: NodeId, opcode: u32, word: u32) -> Self {
        Self { source, opcode, payload: Payload::single(word) }
    }

    /// Builds a message carrying a signed value.
    pub fn with_value(source: NodeId, opcode: u32, value: i32) -> Self {
        Self::new(source, opcode, value as u32)
    }

    /// Converts a decoded wire packet into a message.
    pub fn from_packet(packet: &Packet) -> Self {
        Self::new(NodeId::new(packet.header.src), packet.opcode, packet.payload)
    }

    /// First payload word, or zero for an empty payload.
    pub fn word(&self) -> u32 {
        self.payload.first().unwrap_or(0)
    }

    /// First payload word reinterpreted as a signed value.
    pub fn value(&self) -> i32 {
        self.word() as i32
    }
}
