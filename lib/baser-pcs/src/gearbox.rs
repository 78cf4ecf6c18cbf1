// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Width converters between 66-bit blocks and 16-bit serial words.
//!
//! A gearbox is a bit queue with an exact fill counter: bits go in at the
//! fill offset, come out at the bottom, and nothing about the arithmetic is
//! clever. The receive side additionally honors the one-bit slip command
//! from the block lock state machine, which is how the whole system hunts
//! for block alignment; the transmit side exposes the readiness signal that
//! is the system's only backpressure mechanism.
//!
//! Accumulation order is least-significant-bit-first throughout: the first
//! bit on the wire is bit 0 of the first word, and bit 0 of a 66-bit block
//! image is the first sync header bit.

use crate::block::{Block, SyncHeader};
use static_assertions::const_assert;

/// Width of one serial-domain word. The original serial domain runs 16-bit
/// words at 644 MHz to carry 10.3125 Gb/s.
pub const WORD_BITS: u32 = 16;

/// The accumulators must hold a full block plus one load: a word and, on
/// the receive side, a possible out-of-band header.
const_assert!(Block::BITS + WORD_BITS + 2 <= 128);

/// TX accumulator capacity: one word of slack beyond a full block.
const TX_CAPACITY: u32 = Block::BITS + WORD_BITS;

/// One word of the serial stream, paired with the out-of-band sync header
/// channel. The header is present exactly on words that begin a block; a
/// stream without out-of-band headers (all `None`) carries them in-band
/// inside the 66-bit cadence instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SerialWord {
    pub data: u16,
    pub header: Option<SyncHeader>,
}

/// Error returned when a block is pushed at the transmit gearbox while its
/// readiness signal is deasserted.
#[derive(Copy, Clone, Debug)]
pub struct GearboxFull;

/// Receive-side gearbox: words in, blocks out.
///
/// There is no backpressure here; every incoming word must be accepted.
/// Call [`RxGearbox::take_block`] after each load so the accumulator never
/// holds more than a block and a word.
#[derive(Clone, Debug)]
pub struct RxGearbox {
    acc: u128,
    fill: u32,
    /// Slips that arrived while the accumulator had nothing left to
    /// discard; honored out of subsequently loaded words.
    slip_owed: u32,
    slips: u32,
}

impl RxGearbox {
    pub fn new() -> Self {
        Self {
            acc: 0,
            fill: 0,
            slip_owed: 0,
            slips: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Loads one serial word at the current fill offset. A word carrying an
    /// out-of-band header contributes the header's two bits first, so the
    /// four-word-per-block transmit cadence reconstructs exact 66-bit
    /// blocks.
    pub fn load(&mut self, word: SerialWord) {
        debug_assert!(self.fill + WORD_BITS + 2 <= 128);
        if let Some(header) = word.header {
            self.acc |= (header.raw() as u128) << self.fill;
            self.fill += 2;
        }
        self.acc |= (word.data as u128) << self.fill;
        self.fill += WORD_BITS;
        let owed = self.slip_owed.min(self.fill);
        self.acc >>= owed;
        self.fill -= owed;
        self.slip_owed -= owed;
    }

    /// Discards one bit from the front of the accumulator, shifting the
    /// block boundary of everything behind it. If no bits are buffered the
    /// discard is applied to the next word instead.
    pub fn slip(&mut self) {
        self.slips = self.slips.wrapping_add(1);
        if self.fill > 0 {
            self.acc >>= 1;
            self.fill -= 1;
        } else {
            self.slip_owed += 1;
        }
    }

    /// Extracts one block once a full 66 bits have accumulated.
    pub fn take_block(&mut self) -> Option<Block> {
        if self.fill < Block::BITS {
            return None;
        }
        let raw = self.acc & ((1u128 << Block::BITS) - 1);
        self.acc >>= Block::BITS;
        self.fill -= Block::BITS;
        Some(Block::from_raw(raw))
    }

    /// Number of bits slipped since reset. Diagnostic only: block
    /// extraction never consults this.
    pub fn slips(&self) -> u32 {
        self.slips
    }
}

impl Default for RxGearbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Transmit-side gearbox: blocks in, words out.
#[derive(Clone, Debug)]
pub struct TxGearbox {
    acc: u128,
    fill: u32,
    /// Header of the most recently loaded block, not yet attached to an
    /// outgoing word. One slot is enough: readiness only admits a new block
    /// after the previous block's first word has gone out.
    pending_header: Option<SyncHeader>,
    /// Bit position of the next outgoing word within the current block's
    /// payload; 0 means the next word begins a block.
    block_bit: u32,
}

impl TxGearbox {
    pub fn new() -> Self {
        Self {
            acc: 0,
            fill: 0,
            pending_header: None,
            block_bit: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Whether there is room for one more payload. Judged from the fill
    /// level strictly before any update of the current step; this is the
    /// producer's only flow-control signal.
    pub fn ready(&self) -> bool {
        self.fill + Block::PAYLOAD_BITS <= TX_CAPACITY
    }

    /// Queues one block for serialization. The 64 payload bits enter the
    /// accumulator; the header is cached on the side and travels out-of-band
    /// with the block's first word.
    pub fn load(&mut self, block: Block) -> Result<(), GearboxFull> {
        if !self.ready() {
            return Err(GearboxFull);
        }
        self.pending_header = Some(block.header);
        self.acc |= (block.payload as u128) << self.fill;
        self.fill += Block::PAYLOAD_BITS;
        Ok(())
    }

    /// Emits the next serial word, if a full one is buffered. The word that
    /// begins a block carries the cached header, defaulting to the data
    /// header when nothing is pending.
    pub fn take_word(&mut self) -> Option<SerialWord> {
        if self.fill < WORD_BITS {
            return None;
        }
        let data = self.acc as u16;
        self.acc >>= WORD_BITS;
        self.fill -= WORD_BITS;

        let header = if self.block_bit == 0 {
            Some(self.pending_header.take().unwrap_or_default())
        } else {
            None
        };
        self.block_bit = (self.block_bit + WORD_BITS) % Block::PAYLOAD_BITS;

        Some(SerialWord { data, header })
    }
}

impl Default for TxGearbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(header: SyncHeader, payload: u64) -> Block {
        Block { header, payload }
    }

    /// Serializes blocks into an in-band bit stream (headers included in the
    /// 66-bit cadence) chopped into 16-bit words, optionally preceded by
    /// junk bits.
    fn in_band_words(blocks: &[Block], lead_bits: u32) -> Vec<u16> {
        let mut bits = Vec::new();
        for _ in 0..lead_bits {
            bits.push(false);
        }
        for b in blocks {
            let raw = b.to_raw();
            for i in 0..Block::BITS {
                bits.push(raw >> i & 1 != 0);
            }
        }
        bits.chunks(WORD_BITS as usize)
            .filter(|c| c.len() == WORD_BITS as usize)
            .map(|c| {
                let mut w = 0u16;
                for (i, bit) in c.iter().enumerate() {
                    w |= (*bit as u16) << i;
                }
                w
            })
            .collect()
    }

    #[test]
    fn tx_cadence() {
        let mut tx = TxGearbox::new();
        assert!(tx.ready());
        assert_eq!(tx.take_word(), None);

        tx.load(block(SyncHeader::CONTROL, 0xFEDC_BA98_7654_3210))
            .unwrap();
        assert!(!tx.ready());

        let w0 = tx.take_word().unwrap();
        assert_eq!(w0.data, 0x3210);
        assert_eq!(w0.header, Some(SyncHeader::CONTROL));
        assert!(!tx.ready());

        let w1 = tx.take_word().unwrap();
        assert_eq!(w1.data, 0x7654);
        assert_eq!(w1.header, None);

        let _ = tx.take_word().unwrap();
        // Three words out, 16 bits left: room for the next payload.
        assert!(tx.ready());

        let w3 = tx.take_word().unwrap();
        assert_eq!(w3.data, 0xFEDC);
        assert_eq!(w3.header, None);
        assert_eq!(tx.take_word(), None);
    }

    #[test]
    fn tx_overrun_is_rejected() {
        let mut tx = TxGearbox::new();
        tx.load(block(SyncHeader::DATA, 1)).unwrap();
        assert!(tx.load(block(SyncHeader::DATA, 2)).is_err());
    }

    #[test]
    fn tx_to_rx_round_trip() {
        let mut tx = TxGearbox::new();
        let mut rx = RxGearbox::new();

        let blocks: Vec<Block> = (0u64..32)
            .map(|i| {
                let header = if i % 3 == 0 {
                    SyncHeader::CONTROL
                } else {
                    SyncHeader::DATA
                };
                block(header, i.wrapping_mul(0x0123_4567_89AB_CDEF))
            })
            .collect();

        let mut out = Vec::new();
        for &b in &blocks {
            while !tx.ready() {
                rx.load(tx.take_word().unwrap());
                if let Some(got) = rx.take_block() {
                    out.push(got);
                }
            }
            tx.load(b).unwrap();
        }
        while let Some(w) = tx.take_word() {
            rx.load(w);
            if let Some(got) = rx.take_block() {
                out.push(got);
            }
        }

        assert_eq!(out, blocks);
    }

    #[test]
    fn rx_in_band_extraction() {
        let mut rx = RxGearbox::new();
        let blocks: Vec<Block> = (1u64..=8)
            .map(|i| block(SyncHeader::DATA, 0x1111_1111_1111_1111u64.wrapping_mul(i)))
            .collect();

        let mut out = Vec::new();
        for w in in_band_words(&blocks, 0) {
            rx.load(SerialWord {
                data: w,
                header: None,
            });
            if let Some(got) = rx.take_block() {
                out.push(got);
            }
        }
        // 8 blocks * 66 bits = exactly 33 words, so every block survives.
        assert_eq!(out, blocks);
    }

    #[test]
    fn slip_shifts_the_block_boundary_by_one_bit() {
        // A stream made of one repeating block is periodic in 66 bits, so a
        // single slip must hand back the same pattern rotated by one bit,
        // and 66 slips in total must restore it exactly.
        let pattern = block(SyncHeader::CONTROL, 0x1E);
        let stream: Vec<Block> = core::iter::repeat(pattern).take(40).collect();
        let raw = pattern.to_raw();
        let rotated = (raw >> 1 | (raw & 1) << (Block::BITS - 1)) & ((1u128 << Block::BITS) - 1);

        let mut rx = RxGearbox::new();
        let mut words = in_band_words(&stream, 0).into_iter();

        // Aligned at first.
        let mut first = None;
        for w in words.by_ref() {
            rx.load(SerialWord {
                data: w,
                header: None,
            });
            if let Some(b) = rx.take_block() {
                first = Some(b);
                break;
            }
        }
        assert_eq!(first.unwrap(), pattern);

        rx.slip();
        let mut shifted = None;
        for w in words.by_ref() {
            rx.load(SerialWord {
                data: w,
                header: None,
            });
            if let Some(b) = rx.take_block() {
                shifted = Some(b);
                break;
            }
        }
        assert_eq!(shifted.unwrap().to_raw(), rotated);

        for _ in 0..65 {
            rx.slip();
        }
        assert_eq!(rx.slips(), 66);
        let mut restored = None;
        for w in words {
            rx.load(SerialWord {
                data: w,
                header: None,
            });
            if let Some(b) = rx.take_block() {
                restored = Some(b);
                break;
            }
        }
        assert_eq!(restored.unwrap(), pattern);
    }

    #[test]
    fn slip_on_empty_accumulator_is_owed() {
        let mut rx = RxGearbox::new();
        rx.slip();
        rx.load(SerialWord {
            data: 0xFFFF,
            header: None,
        });
        // The owed slip consumed one bit of the word.
        assert_eq!(rx.take_block(), None);
        let mut total = 15;
        // 66 - 15 = 51 more bits before a block appears.
        while total < Block::BITS {
            rx.load(SerialWord {
                data: 0xFFFF,
                header: None,
            });
            total += WORD_BITS;
        }
        let got = rx.take_block().unwrap();
        assert_eq!(got.to_raw(), (1u128 << Block::BITS) - 1);
    }
}
