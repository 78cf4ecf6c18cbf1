// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Self-synchronizing payload scrambler.
//!
//! Both directions run the same 58-bit LFSR recurrence over the generator
//! polynomial `1 + x^39 + x^58`, whitening the 64 payload bits of each block
//! while leaving the sync header alone. The two sides differ in exactly one
//! place: the scrambler shifts its *output* bit back into the register, the
//! descrambler shifts the *received* bit. After 58 bits of genuine payload
//! the descrambler's register therefore equals the scrambler's history no
//! matter what state it started in, which is why no initialization
//! handshake exists anywhere in the protocol.

use crate::block::Block;

/// Register width in bits.
const STATE_BITS: u32 = 58;
/// Feedback taps: `x^39` and `x^58` read one shift position early.
const TAP_A: u32 = 38;
const TAP_B: u32 = 57;

const STATE_MASK: u64 = (1 << STATE_BITS) - 1;
/// Reset state, all-ones.
const STATE_RESET: u64 = STATE_MASK;

/// One 64-bit advance of the shared recurrence, payload bit 0 first.
/// `feed_input` selects which bit enters the register: the raw input
/// (descrambler) or the computed output (scrambler).
fn advance(state: &mut u64, payload: u64, feed_input: bool) -> u64 {
    let mut s = *state;
    let mut out = 0;
    for i in 0..Block::PAYLOAD_BITS {
        let in_bit = payload >> i & 1;
        let out_bit = in_bit ^ (s >> TAP_A & 1) ^ (s >> TAP_B & 1);
        out |= out_bit << i;
        let fb = if feed_input { in_bit } else { out_bit };
        s = (s << 1 | fb) & STATE_MASK;
    }
    *state = s;
    out
}

/// Transmit-side scrambler.
#[derive(Clone, Debug)]
pub struct Scrambler {
    state: u64,
}

impl Scrambler {
    pub fn new() -> Self {
        Self { state: STATE_RESET }
    }

    pub fn reset(&mut self) {
        self.state = STATE_RESET;
    }

    /// Scrambles one block's payload. Call exactly once per accepted block;
    /// the register must not advance on idle steps.
    pub fn step(&mut self, block: Block) -> Block {
        Block {
            header: block.header,
            payload: advance(&mut self.state, block.payload, false),
        }
    }
}

impl Default for Scrambler {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive-side descrambler.
#[derive(Clone, Debug)]
pub struct Descrambler {
    state: u64,
}

impl Descrambler {
    pub fn new() -> Self {
        Self { state: STATE_RESET }
    }

    pub fn reset(&mut self) {
        self.state = STATE_RESET;
    }

    /// Descrambles one block's payload. Call only for blocks received under
    /// block lock, so the register tracks the far scrambler's history.
    pub fn step(&mut self, block: Block) -> Block {
        Block {
            header: block.header,
            payload: advance(&mut self.state, block.payload, true),
        }
    }
}

impl Default for Descrambler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::SyncHeader;
    use proptest::prelude::*;

    fn data_block(payload: u64) -> Block {
        Block {
            header: SyncHeader::DATA,
            payload,
        }
    }

    #[test]
    fn matched_pair_is_identity() {
        let mut s = Scrambler::new();
        let mut d = Descrambler::new();
        for payload in [0u64, !0, 0xDEAD_BEEF_CAFE_BABE, 0x0123_4567_89AB_CDEF] {
            let scrambled = s.step(data_block(payload));
            let out = d.step(scrambled);
            assert_eq!(out.payload, payload);
            assert_eq!(out.header, SyncHeader::DATA);
        }
    }

    #[test]
    fn scrambler_whitens() {
        // From the all-ones reset state the register contribution is
        // nonzero, so an all-zero payload cannot pass through unchanged.
        let mut s = Scrambler::new();
        let scrambled = s.step(data_block(0));
        assert_ne!(scrambled.payload, 0);
    }

    #[test]
    fn header_is_never_touched() {
        let mut s = Scrambler::new();
        let block = Block {
            header: SyncHeader::CONTROL,
            payload: 0x1E,
        };
        assert_eq!(s.step(block).header, SyncHeader::CONTROL);
    }

    #[test]
    fn descrambler_self_synchronizes() {
        // Knock the descrambler's register out of step; one full block (64
        // bits > 58) of received payload must resynchronize it.
        let mut s = Scrambler::new();
        let mut d = Descrambler::new();
        s.step(data_block(0x5555_5555_5555_5555));
        s.step(data_block(0xAAAA_AAAA_AAAA_AAAA));

        let first = s.step(data_block(0x1111_2222_3333_4444));
        let _ = d.step(first); // warm-up block, output is garbage
        for payload in [0x9999_8888_7777_6666u64, 0, !0, 0x0F0F_F0F0_1234_5678] {
            let out = d.step(s.step(data_block(payload)));
            assert_eq!(out.payload, payload);
        }
    }

    proptest! {
        #[test]
        fn round_trips_after_warm_up(payloads in proptest::collection::vec(any::<u64>(), 2..32)) {
            let mut s = Scrambler::new();
            let mut d = Descrambler::new();
            // Arbitrary initial mismatch.
            s.step(data_block(0xFFFF_0000_FFFF_0000));

            let mut synced = false;
            for &payload in &payloads {
                let out = d.step(s.step(data_block(payload)));
                if synced {
                    prop_assert_eq!(out.payload, payload);
                }
                // One full block of history is enough from here on.
                synced = true;
            }
        }
    }
}
