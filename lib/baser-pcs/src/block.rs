// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 66-bit transmission block.
//!
//! Everything the PCS puts on the wire is a block: a 2-bit sync header
//! followed by 64 payload bits. The raw wire image is a 66-bit value with
//! the header in bits `[1:0]` and the payload in bits `[65:2]`, transmitted
//! least significant bit first. The header is the only part of a block that
//! is never scrambled; its guaranteed 0/1 transition is what the receiver's
//! alignment search keys on.

use num_derive::FromPrimitive;

/// Two-bit sync header as it appears on the wire.
///
/// Only two of the four encodings are meaningful; `0b00` and `0b11` can only
/// be produced by bit errors or misalignment, which is exactly what the
/// block lock state machine counts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncHeader(u8);

impl SyncHeader {
    /// Header of a data block: all 64 payload bits are packet data.
    pub const DATA: Self = Self(0b01);
    /// Header of a control block: the payload begins with a block type tag.
    pub const CONTROL: Self = Self(0b10);

    /// Reconstitutes a header from its two wire bits. Out-of-range bits are
    /// preserved (masked to two bits) so that invalid headers survive to be
    /// counted by the alignment logic.
    pub fn from_raw(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    /// Returns the two wire bits.
    pub fn raw(self) -> u8 {
        self.0
    }

    /// A header is valid when exactly one of its two bits is set.
    pub fn is_valid(self) -> bool {
        matches!(self.0, 0b01 | 0b10)
    }
}

impl Default for SyncHeader {
    fn default() -> Self {
        Self::DATA
    }
}

/// One 66-bit block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub header: SyncHeader,
    pub payload: u64,
}

impl Block {
    /// Bits in a block's wire image.
    pub const BITS: u32 = 66;
    /// Bits in a block's payload.
    pub const PAYLOAD_BITS: u32 = 64;

    /// Reassembles a block from the low 66 bits of `raw`.
    pub fn from_raw(raw: u128) -> Self {
        Self {
            header: SyncHeader::from_raw(raw as u8),
            payload: (raw >> 2) as u64,
        }
    }

    /// Returns the 66-bit wire image.
    pub fn to_raw(self) -> u128 {
        ((self.payload as u128) << 2) | self.header.raw() as u128
    }
}

/// Block type tags: the first payload byte of a control block, selecting the
/// sub-field layout of the remaining 56 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum BlockType {
    /// Eight 7-bit control codes, no packet delimiters.
    Control = 0x1E,
    /// Ordered set in lane 0, start in lane 4.
    OsStart = 0x66,
    /// Ordered sets in lanes 0 and 4.
    TwoOs = 0x2D,
    /// Start in lane 0, data in lanes 1-7.
    Start0 = 0x33,
    /// Data in lanes 0-3, start in lane 4, data in lanes 5-7.
    Start4 = 0x78,
    /// Terminate in lane 0, control in lanes 1-7.
    Term0 = 0x87,
    /// Terminate in lane 1.
    Term1 = 0x99,
    /// Terminate in lane 2.
    Term2 = 0xAA,
    /// Terminate in lane 3.
    Term3 = 0xB4,
    /// Terminate in lane 4.
    Term4 = 0xCC,
    /// Terminate in lane 5.
    Term5 = 0xD2,
    /// Terminate in lane 6.
    Term6 = 0xE1,
    /// Terminate in lane 7.
    Term7 = 0xFF,
}

impl BlockType {
    /// The terminate tags indexed by the lane carrying `/T/`.
    pub const TERMINATE: [Self; 8] = [
        Self::Term0,
        Self::Term1,
        Self::Term2,
        Self::Term3,
        Self::Term4,
        Self::Term5,
        Self::Term6,
        Self::Term7,
    ];

    /// For terminate tags, the lane carrying `/T/`.
    pub fn terminate_lane(self) -> Option<usize> {
        Self::TERMINATE.iter().position(|&t| t == self)
    }
}
