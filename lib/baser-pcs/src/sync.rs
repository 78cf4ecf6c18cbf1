// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block lock acquisition and loss.
//!
//! The receiver has no framing reference other than the statistics of the
//! 2-bit sync headers: at the correct bit alignment every header is `01` or
//! `10`, at a wrong alignment a quarter of candidate headers look valid by
//! chance. The state machine therefore demands a long run of consecutive
//! valid headers before trusting an alignment, slipping the receive gearbox
//! one bit and restarting whenever the run breaks. Once locked it switches
//! to a windowed error-rate test, so isolated bit errors do not force the
//! expensive reacquisition but a sustained error rate does.

use crate::block::SyncHeader;

/// Consecutive valid headers required to declare lock.
pub const LOCK_THRESHOLD: u32 = 64;
/// Width of the error surveillance window, in blocks.
pub const BER_WINDOW: u32 = 8192;
/// Invalid headers within one window that force loss of lock.
pub const BER_THRESHOLD: u32 = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    /// No trusted alignment; every invalid header slips one bit.
    Searching,
    /// Transient counter-reset state. Entered and resolved within a single
    /// `step`, so it never rests between blocks; folding it in this way is
    /// what makes lock land on the 64th consecutive valid header.
    Counting,
    /// An alignment candidate is being tested against [`LOCK_THRESHOLD`].
    Testing,
    /// Alignment is trusted; headers feed the windowed error-rate test.
    Locked,
}

/// One-bit realignment command, produced by [`BlockSync::step`] and consumed
/// by the receive gearbox on the same step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Slip {
    /// Keep the current alignment.
    Hold,
    /// Discard one bit from the front of the receive buffer.
    Slip,
}

#[derive(Clone, Debug)]
pub struct BlockSync {
    state: State,
    valid_count: u32,
    window_pos: u32,
    window_invalid: u32,
    lock: bool,
    hi_ber: bool,
    invalid_headers: u32,
}

impl BlockSync {
    pub fn new() -> Self {
        Self {
            state: State::Searching,
            valid_count: 0,
            window_pos: 0,
            window_invalid: 0,
            lock: false,
            hi_ber: false,
            invalid_headers: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Whether block lock is currently held.
    pub fn locked(&self) -> bool {
        self.lock
    }

    /// Whether the last completed window crossed the error-rate threshold.
    pub fn hi_ber(&self) -> bool {
        self.hi_ber
    }

    /// Free-running saturating count of invalid headers, for external BER
    /// accounting. Never reset by the state machine itself.
    pub fn invalid_headers(&self) -> u32 {
        self.invalid_headers
    }

    /// Examines one received block's sync header.
    pub fn step(&mut self, header: SyncHeader) -> Slip {
        let valid = header.is_valid();
        if !valid {
            self.invalid_headers = self.invalid_headers.saturating_add(1);
        }

        match self.state {
            State::Searching => {
                if !valid {
                    return Slip::Slip;
                }
                self.state = State::Counting;
                self.begin_count();
                Slip::Hold
            }
            // A step never starts here; Counting resolves inside the step
            // that enters it (see the Searching arm).
            State::Counting => {
                self.begin_count();
                Slip::Hold
            }
            State::Testing => {
                if !valid {
                    self.state = State::Searching;
                    return Slip::Slip;
                }
                self.valid_count += 1;
                if self.valid_count == LOCK_THRESHOLD {
                    self.lock = true;
                    self.window_pos = 0;
                    self.window_invalid = 0;
                    self.state = State::Locked;
                }
                Slip::Hold
            }
            State::Locked => {
                self.window_pos += 1;
                if !valid {
                    self.window_invalid += 1;
                }
                if self.window_pos == BER_WINDOW {
                    if self.window_invalid >= BER_THRESHOLD {
                        self.lock = false;
                        self.hi_ber = true;
                        self.state = State::Searching;
                    } else {
                        self.hi_ber = false;
                    }
                    self.window_pos = 0;
                    self.window_invalid = 0;
                }
                Slip::Hold
            }
        }
    }

    /// The Counting state's work: restart the consecutive-valid count with
    /// the block that got us here as the first of the run.
    fn begin_count(&mut self) {
        self.valid_count = 1;
        self.window_invalid = 0;
        self.state = State::Testing;
    }
}

impl Default for BlockSync {
    fn default() -> Self {
        Self::new()
    }
}
