// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 64B/66B block codec.
//!
//! `encode` classifies an XGMII transfer against the recognized lane
//! patterns and packs it into a 66-bit block; `decode` is the exact inverse.
//! Neither side ever fails: inputs that fit no pattern are absorbed into an
//! all-`/E/` sentinel and reported through a flag, so a stream of junk
//! degrades into a stream of error blocks rather than stopping the pipeline.
//!
//! Control block payloads are packed with the block type tag in bits
//! `[7:0]` and the per-lane fields above it in increasing lane order, so the
//! highest lane lands in the most significant bits; unused high bits are
//! zero. Ordered-set O-codes sit immediately above the data bytes of their
//! own half of the transfer.

use crate::block::{Block, BlockType, SyncHeader};
use crate::xgmii::{self, XgmiiFrame};
use num_traits::FromPrimitive;

/// 7-bit control code for `/I/`.
const CCODE_IDLE: u8 = 0x00;
/// 7-bit control code for `/E/`. Also the transmitted image of any control
/// character that has no 7-bit encoding of its own.
const CCODE_ERROR: u8 = 0x1E;

/// 4-bit O-code for the sequence ordered set.
const OCODE_SEQ: u8 = 0x0;
/// 4-bit O-code for the signal ordered set.
const OCODE_SIG: u8 = 0xF;

fn ccode(ch: u8) -> u8 {
    match ch {
        xgmii::IDLE => CCODE_IDLE,
        // Everything unrecognized (including /T/, /S/ and the ordered-set
        // characters, which are only representable positionally) transmits
        // as the error code.
        _ => CCODE_ERROR,
    }
}

fn ccode_char(code: u8) -> u8 {
    match code {
        CCODE_IDLE => xgmii::IDLE,
        // Lossy: any code that is not exactly /I/ decodes as /E/.
        _ => xgmii::ERROR,
    }
}

fn is_ordered_set(ch: u8) -> bool {
    ch == xgmii::SEQ_OS || ch == xgmii::SIG_OS
}

fn ocode(ch: u8) -> u8 {
    if ch == xgmii::SIG_OS {
        OCODE_SIG
    } else {
        OCODE_SEQ
    }
}

fn ocode_char(code: u8) -> u8 {
    match code {
        OCODE_SIG => xgmii::SIG_OS,
        // Lossy: any nibble that is not exactly the signal O-code decodes as
        // the sequence ordered set.
        _ => xgmii::SEQ_OS,
    }
}

/// Payload of the sentinel emitted for unclassifiable input: an all-control
/// block whose eight control fields all carry `/E/`.
fn error_payload() -> u64 {
    let mut p = BlockType::Control as u64;
    let mut pos = 8;
    for _ in 0..8 {
        p |= (CCODE_ERROR as u64) << pos;
        pos += 7;
    }
    p
}

/// Encodes one XGMII transfer into a block.
///
/// The returned flag is true when the transfer matched none of the
/// recognized lane patterns; the block is then the all-`/E/` sentinel.
pub fn encode(frame: XgmiiFrame) -> (Block, bool) {
    if frame.control == 0 {
        let block = Block {
            header: SyncHeader::DATA,
            payload: frame.data,
        };
        return (block, false);
    }

    match encode_control(frame) {
        Some(payload) => {
            let block = Block {
                header: SyncHeader::CONTROL,
                payload,
            };
            (block, false)
        }
        None => {
            let block = Block {
                header: SyncHeader::CONTROL,
                payload: error_payload(),
            };
            (block, true)
        }
    }
}

/// Classifies a control-bearing transfer. The order of the checks is
/// load-bearing: an all-control mask also matches the terminate-in-lane-0
/// pattern, so the more specific delimiter patterns must all be tried before
/// the plain all-control one.
fn encode_control(frame: XgmiiFrame) -> Option<u64> {
    let ctl = frame.control;

    // Start in lane 0.
    if ctl == 0x01 && frame.lane(0) == xgmii::START {
        let mut p = BlockType::Start0 as u64;
        for i in 1..8 {
            p |= (frame.lane(i) as u64) << (8 * i);
        }
        return Some(p);
    }

    // Start in lane 4 after four data bytes.
    if ctl == 0x10 && frame.lane(4) == xgmii::START {
        let mut p = BlockType::Start4 as u64;
        let mut pos = 8;
        for i in [0, 1, 2, 3, 5, 6, 7] {
            p |= (frame.lane(i) as u64) << pos;
            pos += 8;
        }
        return Some(p);
    }

    // Terminate in lane k: data below, control above.
    for k in 0..8 {
        if ctl == 0xFFu8 << k && frame.lane(k) == xgmii::TERMINATE {
            let mut p = BlockType::TERMINATE[k] as u64;
            let mut pos = 8;
            for i in 0..k {
                p |= (frame.lane(i) as u64) << pos;
                pos += 8;
            }
            for i in k + 1..8 {
                p |= (ccode(frame.lane(i)) as u64) << pos;
                pos += 7;
            }
            return Some(p);
        }
    }

    // Ordered sets in both halves.
    if ctl == 0x11 && is_ordered_set(frame.lane(0)) && is_ordered_set(frame.lane(4)) {
        let mut p = BlockType::TwoOs as u64;
        p |= (frame.lane(1) as u64) << 8;
        p |= (frame.lane(2) as u64) << 16;
        p |= (frame.lane(3) as u64) << 24;
        p |= (ocode(frame.lane(0)) as u64) << 32;
        p |= (ocode(frame.lane(4)) as u64) << 36;
        p |= (frame.lane(5) as u64) << 40;
        p |= (frame.lane(6) as u64) << 48;
        p |= (frame.lane(7) as u64) << 56;
        return Some(p);
    }

    // Ordered set in lane 0, start in lane 4.
    if ctl == 0x11 && is_ordered_set(frame.lane(0)) && frame.lane(4) == xgmii::START {
        let mut p = BlockType::OsStart as u64;
        p |= (frame.lane(1) as u64) << 8;
        p |= (frame.lane(2) as u64) << 16;
        p |= (frame.lane(3) as u64) << 24;
        p |= (ocode(frame.lane(0)) as u64) << 32;
        p |= (frame.lane(5) as u64) << 40;
        p |= (frame.lane(6) as u64) << 48;
        p |= (frame.lane(7) as u64) << 56;
        return Some(p);
    }

    // All control, no delimiters.
    if ctl == 0xFF {
        let mut p = BlockType::Control as u64;
        let mut pos = 8;
        for i in 0..8 {
            p |= (ccode(frame.lane(i)) as u64) << pos;
            pos += 7;
        }
        return Some(p);
    }

    None
}

/// Decodes one block back into an XGMII transfer.
///
/// The returned flag is true when the block could not be interpreted (bad
/// sync header or unrecognized block type); the frame is then all-`/E/`.
pub fn decode(block: Block) -> (XgmiiFrame, bool) {
    if !block.header.is_valid() {
        return (XgmiiFrame::ERROR, true);
    }

    if block.header == SyncHeader::DATA {
        let frame = XgmiiFrame {
            data: block.payload,
            control: 0,
        };
        return (frame, false);
    }

    let Some(bt) = BlockType::from_u8(block.payload as u8) else {
        return (XgmiiFrame::ERROR, true);
    };

    (decode_control(bt, block.payload), false)
}

fn decode_control(bt: BlockType, p: u64) -> XgmiiFrame {
    let mut data: u64;
    let control: u8;

    match bt {
        BlockType::Control => {
            data = 0;
            control = 0xFF;
            let mut pos = 8;
            for i in 0..8 {
                let code = (p >> pos) as u8 & 0x7F;
                data |= (ccode_char(code) as u64) << (8 * i);
                pos += 7;
            }
        }
        BlockType::Start0 => {
            data = xgmii::START as u64;
            control = 0x01;
            for i in 1..8 {
                data |= (p >> (8 * i) & 0xFF) << (8 * i);
            }
        }
        BlockType::Start4 => {
            data = (xgmii::START as u64) << 32;
            control = 0x10;
            let mut pos = 8;
            for i in [0, 1, 2, 3, 5, 6, 7] {
                data |= (p >> pos & 0xFF) << (8 * i);
                pos += 8;
            }
        }
        BlockType::TwoOs => {
            control = 0x11;
            data = unpack_os_halves(p);
            data |= (ocode_char((p >> 36) as u8 & 0xF) as u64) << 32;
        }
        BlockType::OsStart => {
            control = 0x11;
            data = unpack_os_halves(p);
            data |= (xgmii::START as u64) << 32;
        }
        t => {
            // One of the eight terminate layouts. terminate_lane covers
            // every remaining variant.
            let k = t.terminate_lane().unwrap_or(0);
            control = 0xFFu8 << k;
            data = (xgmii::TERMINATE as u64) << (8 * k);
            let mut pos = 8;
            for i in 0..k {
                data |= (p >> pos & 0xFF) << (8 * i);
                pos += 8;
            }
            for i in k + 1..8 {
                let code = (p >> pos) as u8 & 0x7F;
                data |= (ccode_char(code) as u64) << (8 * i);
                pos += 7;
            }
        }
    }

    XgmiiFrame { data, control }
}

/// Shared unpacking for the two ordered-set layouts: lane 0's O-code plus
/// the six data bytes. Lane 4 is filled in by the caller.
fn unpack_os_halves(p: u64) -> u64 {
    let mut data = ocode_char((p >> 32) as u8 & 0xF) as u64;
    data |= (p >> 8 & 0xFF) << 8;
    data |= (p >> 16 & 0xFF) << 16;
    data |= (p >> 24 & 0xFF) << 24;
    data |= (p >> 40 & 0xFF) << 40;
    data |= (p >> 48 & 0xFF) << 48;
    data |= (p >> 56 & 0xFF) << 56;
    data
}
