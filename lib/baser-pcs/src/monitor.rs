// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Link status derivation and error accounting.
//!
//! The raw receive status is simply `lock && !hi_ber`; everything here is
//! about presenting that bit honestly to a hosting system that polls it:
//! debounce on the way up so a link that is still flapping never reports
//! up, an immediate drop on the way down, a latching-low view for
//! register-style readers that might poll slower than the link bounces, and
//! saturating counters for the error events worth totalling.

use bitfield::bitfield;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Default link-up debounce dwell, in serial-word ticks: about 1 ms of
/// 16-bit words at 10.3125 Gb/s.
pub const DEBOUNCE_TICKS: u32 = 644_531;

bitfield! {
    /// One-byte PCS status word: `block_lock` (alignment matches block
    /// boundaries), `hi_ber` (last surveillance window crossed the error
    /// threshold), `link_up` (debounced link indication), and
    /// `status_latch` (latching-low raw status, see
    /// [`LinkMonitor::read_status_latch`]).
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
    #[repr(C)]
    pub struct PcsStatus(u8);
    pub block_lock, set_block_lock: 0;
    pub hi_ber, set_hi_ber: 1;
    pub link_up, set_link_up: 2;
    pub status_latch, set_status_latch: 3;
}

/// Saturating event counters, cleared on loss of lock (and on reset). Plain
/// `repr(C)` words so the hosting system can expose them as a register
/// block.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct Counters {
    /// Serial-word ticks spent with `hi_ber` asserted while locked.
    pub ber_ticks: u32,
    /// Blocks that failed decode while locked.
    pub errored_blocks: u32,
    /// Sync headers rejected by the alignment state machine. Free-running:
    /// this one survives loss of lock.
    pub invalid_headers: u32,
}

/// Debounce and error bookkeeping over the block lock state machine's
/// outputs. Tick once per serial word.
#[derive(Clone, Debug)]
pub struct LinkMonitor {
    dwell: u32,
    up_ticks: u32,
    raw: bool,
    link_up: bool,
    status_latch: bool,
    ber_ticks: u32,
    errored_blocks: u32,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::with_dwell(DEBOUNCE_TICKS)
    }

    /// A monitor with an explicit debounce dwell, for serial geometries
    /// other than the default (and for tests, which cannot wait a
    /// millisecond of simulated words).
    pub fn with_dwell(dwell: u32) -> Self {
        Self {
            dwell,
            up_ticks: 0,
            raw: false,
            link_up: false,
            status_latch: false,
            ber_ticks: 0,
            errored_blocks: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::with_dwell(self.dwell);
    }

    /// Advances one serial-word tick.
    pub fn step(&mut self, lock: bool, hi_ber: bool) {
        self.raw = lock && !hi_ber;

        if self.raw {
            if !self.link_up {
                self.up_ticks = self.up_ticks.saturating_add(1);
                if self.up_ticks >= self.dwell {
                    self.link_up = true;
                }
            }
        } else {
            // Down is immediate; only up is debounced.
            self.up_ticks = 0;
            self.link_up = false;
            self.status_latch = false;
        }

        if lock && hi_ber {
            self.ber_ticks = self.ber_ticks.saturating_add(1);
        }
        if !lock {
            self.ber_ticks = 0;
            self.errored_blocks = 0;
        }
    }

    /// Records one block that failed decode. The caller gates this on lock;
    /// the count clears when lock is lost.
    pub fn count_errored_block(&mut self) {
        self.errored_blocks = self.errored_blocks.saturating_add(1);
    }

    /// Latching-low status read.
    ///
    /// Returns the latched value, then re-arms the latch to the current raw
    /// status. Any raw-status drop since the previous read therefore shows
    /// up as `false` exactly once, even if the link has since recovered.
    pub fn read_status_latch(&mut self) -> bool {
        let value = self.status_latch;
        self.status_latch = self.raw;
        value
    }

    pub fn link_up(&self) -> bool {
        self.link_up
    }

    pub fn status_latch(&self) -> bool {
        self.status_latch
    }

    pub fn ber_ticks(&self) -> u32 {
        self.ber_ticks
    }

    pub fn errored_blocks(&self) -> u32 {
        self.errored_blocks
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_up_waits_for_the_dwell() {
        let mut m = LinkMonitor::with_dwell(10);
        for i in 0..9 {
            m.step(true, false);
            assert!(!m.link_up(), "up early after {} ticks", i + 1);
        }
        m.step(true, false);
        assert!(m.link_up());
    }

    #[test]
    fn link_down_is_immediate_and_restarts_the_dwell() {
        let mut m = LinkMonitor::with_dwell(10);
        for _ in 0..10 {
            m.step(true, false);
        }
        assert!(m.link_up());

        m.step(false, false);
        assert!(!m.link_up());

        // A fresh full dwell is required.
        for _ in 0..9 {
            m.step(true, false);
        }
        assert!(!m.link_up());
        m.step(true, false);
        assert!(m.link_up());
    }

    #[test]
    fn hi_ber_counts_as_down() {
        let mut m = LinkMonitor::with_dwell(2);
        m.step(true, false);
        m.step(true, false);
        assert!(m.link_up());
        m.step(true, true);
        assert!(!m.link_up());
    }

    #[test]
    fn status_latch_reports_a_bounce_once() {
        let mut m = LinkMonitor::with_dwell(1);
        m.step(true, false);
        // First read after reset: latch armed low.
        assert!(!m.read_status_latch());
        assert!(m.read_status_latch());

        // Bounce, then recover before the next read.
        m.step(false, false);
        m.step(true, false);
        assert!(!m.read_status_latch());
        assert!(m.read_status_latch());
    }

    #[test]
    fn counters_clear_on_lock_loss() {
        let mut m = LinkMonitor::with_dwell(1);
        m.step(true, false);
        m.count_errored_block();
        m.count_errored_block();
        assert_eq!(m.errored_blocks(), 2);

        m.step(false, true);
        assert_eq!(m.errored_blocks(), 0);
        assert_eq!(m.ber_ticks(), 0);
    }
}
