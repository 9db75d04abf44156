// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Single-slot message buffer written field by field
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + `tests/slot_race.rs`
//!
//! The slot mirrors a bare-metal `msg_buf` record (`valid`, `src`, `type`,
//! `payload_len`, `payload`). Each field is an independent atomic, so a reader
//! can observe a mix of two deposits. With [`SlotDiscipline::Racy`] the
//! producer raises `valid` before filling the fields and every access is
//! relaxed, which is exactly the torn compound update the buffer is kept for.
//! [`SlotDiscipline::Published`] fills the fields first and releases `valid`
//! last.
//!
//! An empty slot carries [`UNWRITTEN_LEN`] in `payload_len`. A read that sees
//! `valid` raised next to that sentinel caught a deposit half-way and is
//! counted as torn; only the racy discipline can produce one.
//!
//! `deposit` spin-waits while the slot is occupied. That wait is the only
//! place the delivery context blocks; it gives up when the node shuts down.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::thread;

use crate::{InboxError, Message, NodeId, Payload, ShutdownSignal};

/// `payload_len` of a slot whose fields have not been written since the last release.
pub const UNWRITTEN_LEN: u32 = u32::MAX;

/// Store/load ordering used by [`SlotBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(rename_all = "kebab-case"))]
pub enum SlotDiscipline {
    /// `valid` first, then fields, all relaxed.
    #[default]
    Racy,
    /// Fields first, then `valid` with release ordering.
    Published,
}

/// Field-by-field snapshot of the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotView {
    /// Sender as read from `src`.
    pub src: NodeId,
    /// Raw opcode as read from `type`.
    pub opcode: u32,
    /// Declared payload length; [`UNWRITTEN_LEN`] for a torn read.
    pub payload_len: u32,
    /// Payload word.
    pub payload: u32,
}

impl SlotView {
    /// Converts the snapshot into an owned message.
    pub fn into_message(self) -> Message {
        Message { source: self.src, opcode: self.opcode, payload: Payload::single(self.payload) }
    }
}

/// Capacity-one shared buffer.
pub struct SlotBuffer {
    valid: AtomicU32,
    src: AtomicU32,
    ty: AtomicU32,
    payload_len: AtomicU32,
    payload: AtomicU32,
    discipline: SlotDiscipline,
    shutdown: ShutdownSignal,
    deposits: AtomicU64,
    torn_reads: AtomicU64,
}

impl SlotBuffer {
    /// Creates an empty slot that stops waiting once `shutdown` is raised.
    pub fn new(discipline: SlotDiscipline, shutdown: ShutdownSignal) -> Self {
        Self {
            valid: AtomicU32::new(0),
            src: AtomicU32::new(0),
            ty: AtomicU32::new(0),
            payload_len: AtomicU32::new(UNWRITTEN_LEN),
            payload: AtomicU32::new(0),
            discipline,
            shutdown,
            deposits: AtomicU64::new(0),
            torn_reads: AtomicU64::new(0),
        }
    }

    /// Ordering discipline in use.
    pub fn discipline(&self) -> SlotDiscipline {
        self.discipline
    }

    /// Writes `msg` into the slot, spinning while it is occupied.
    pub fn deposit(&self, msg: &Message) -> Result<(), InboxError> {
        while self.valid.load(Ordering::Acquire) == 1 {
            if self.shutdown.is_raised() {
                return Err(InboxError::Shutdown);
            }
            core::hint::spin_loop();
            thread::yield_now();
        }
        let payload = msg.payload.first().unwrap_or(0);
        let payload_len = msg.payload.len() as u32;
        match self.discipline {
            SlotDiscipline::Racy => {
                self.valid.store(1, Ordering::Relaxed);
                self.src.store(u32::from(msg.source.raw()), Ordering::Relaxed);
                self.ty.store(msg.opcode, Ordering::Relaxed);
                self.payload_len.store(payload_len, Ordering::Relaxed);
                self.payload.store(payload, Ordering::Relaxed);
            }
            SlotDiscipline::Published => {
                self.src.store(u32::from(msg.source.raw()), Ordering::Relaxed);
                self.ty.store(msg.opcode, Ordering::Relaxed);
                self.payload_len.store(payload_len, Ordering::Relaxed);
                self.payload.store(payload, Ordering::Relaxed);
                self.valid.store(1, Ordering::Release);
            }
        }
        self.deposits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Lookahead: is a message available?
    pub fn is_available(&self) -> bool {
        self.valid.load(self.load_order()) == 1
    }

    /// Reads the slot field by field without consuming it.
    pub fn read(&self) -> Option<SlotView> {
        let order = self.load_order();
        if self.valid.load(order) == 0 {
            return None;
        }
        let view = SlotView {
            src: NodeId::new(self.src.load(Ordering::Relaxed) as u8),
            opcode: self.ty.load(Ordering::Relaxed),
            payload_len: self.payload_len.load(Ordering::Relaxed),
            payload: self.payload.load(Ordering::Relaxed),
        };
        if view.payload_len == UNWRITTEN_LEN {
            self.torn_reads.fetch_add(1, Ordering::Relaxed);
        }
        Some(view)
    }

    /// Marks the slot free for the next deposit.
    pub fn release(&self) {
        self.payload_len.store(UNWRITTEN_LEN, Ordering::Relaxed);
        self.valid.store(0, Ordering::Release);
    }

    /// Reads and releases the slot in one step, if occupied.
    pub fn take(&self) -> Option<Message> {
        let view = self.read()?;
        self.release();
        Some(view.into_message())
    }

    /// Number of completed deposits.
    pub fn deposits(&self) -> u64 {
        self.deposits.load(Ordering::Relaxed)
    }

    /// Reads that observed `valid` before the deposit's fields.
    pub fn torn_reads(&self) -> u64 {
        self.torn_reads.load(Ordering::Relaxed)
    }

    fn load_order(&self) -> Ordering {
        match self.discipline {
            SlotDiscipline::Racy => Ordering::Relaxed,
            SlotDiscipline::Published => Ordering::Acquire,
        }
    }
}
