// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! XGMII interface types.
//!
//! The XGMII side of the PCS moves one 64-bit transfer per step: eight lanes
//! of eight bits plus a control mask with one bit per lane. A set mask bit
//! marks that lane as carrying a control character instead of a data byte.

/// Idle control character, `/I/`.
pub const IDLE: u8 = 0x07;
/// Start-of-packet control character, `/S/`.
pub const START: u8 = 0xFB;
/// End-of-packet control character, `/T/`.
pub const TERMINATE: u8 = 0xFD;
/// Error control character, `/E/`.
pub const ERROR: u8 = 0xFE;
/// Sequence ordered set control character, `/Q/`.
pub const SEQ_OS: u8 = 0x9C;
/// Signal ordered set control character.
pub const SIG_OS: u8 = 0x5C;

/// One XGMII transfer.
///
/// Lane 0 is the least significant byte of `data` and bit 0 of `control`.
/// Any control character outside the set of constants above is invalid on
/// the wire; the codec maps such lanes to `/E/`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct XgmiiFrame {
    pub data: u64,
    pub control: u8,
}

impl XgmiiFrame {
    /// Interframe idle: all eight lanes carry `/I/`.
    pub const IDLE: Self = Self {
        data: 0x0707_0707_0707_0707,
        control: 0xFF,
    };

    /// All eight lanes carry `/E/`. This is what the decoder substitutes for
    /// anything it cannot make sense of.
    pub const ERROR: Self = Self {
        data: 0xFEFE_FEFE_FEFE_FEFE,
        control: 0xFF,
    };

    /// Returns lane `i`'s byte.
    pub fn lane(&self, i: usize) -> u8 {
        (self.data >> (8 * i)) as u8
    }

    /// Checks whether lane `i` carries a control character.
    pub fn is_control(&self, i: usize) -> bool {
        self.control & (1 << i) != 0
    }
}
