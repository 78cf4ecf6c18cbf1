// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 10GBASE-R physical coding sublayer (IEEE 802.3 Clause 49).
//!
//! This crate is the data-transformation and synchronization pipeline that
//! turns an XGMII word/control interface into a continuous scrambled serial
//! bit stream and back: the 64B/66B block codec, the self-synchronizing
//! scrambler pair, the block lock state machine with its one-bit slip
//! protocol, and the gearboxes that adapt 66-bit blocks to a 16-bit serial
//! word stream. The serial transceiver itself, and whatever register plane
//! reads the status bits out, live elsewhere.
//!
//! Everything is modeled as plain step functions over owned state: one call
//! per XGMII transfer on the transmit side, one call per serial word on the
//! receive side, no threads, no allocation, no blocking. The only feedback
//! edges in the whole system are explicit values: the slip command from
//! [`BlockSync`] into [`RxGearbox`], and the lock gate that keeps the
//! [`Descrambler`] from advancing on garbage.
//!
//! Transmit: [`codec::encode`] → [`Scrambler`] → [`TxGearbox`], driven by
//! [`TxPath::load`] and [`TxPath::take_word`], with [`TxPath::ready`] as the
//! sole backpressure signal.
//!
//! Receive: [`RxGearbox`] → [`BlockSync`] → [`Descrambler`] →
//! [`codec::decode`], driven by [`RxPath::step`]; there is no backpressure
//! on this side, every word must be accepted. Status comes out as a
//! [`PcsStatus`] byte and [`Counters`].
//!
//! None of the error conditions here are fatal: junk XGMII input becomes
//! error blocks, junk received blocks become all-`/E/` transfers, lost
//! alignment becomes a slip hunt. The pipeline is meant to run forever and
//! heal itself.

#![cfg_attr(not(test), no_std)]

pub mod block;
pub mod codec;
pub mod gearbox;
pub mod monitor;
pub mod scramble;
pub mod sync;
pub mod xgmii;

pub use block::{Block, BlockType, SyncHeader};
pub use gearbox::{GearboxFull, RxGearbox, SerialWord, TxGearbox, WORD_BITS};
pub use monitor::{Counters, LinkMonitor, PcsStatus, DEBOUNCE_TICKS};
pub use scramble::{Descrambler, Scrambler};
pub use sync::{BlockSync, Slip};
pub use xgmii::XgmiiFrame;

/// The transmit half: XGMII transfers in, serial words out.
#[derive(Clone, Debug, Default)]
pub struct TxPath {
    scrambler: Scrambler,
    gearbox: TxGearbox,
}

impl TxPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.scrambler.reset();
        self.gearbox.reset();
    }

    /// Whether the gearbox can take the next transfer. Check before every
    /// [`TxPath::load`]; there is no other flow control.
    pub fn ready(&self) -> bool {
        self.gearbox.ready()
    }

    /// Encodes, scrambles, and queues one XGMII transfer.
    ///
    /// `Ok(true)` means the transfer fit no recognized lane pattern and was
    /// sent as an all-`/E/` control block; the stream keeps flowing either
    /// way. The scrambler only advances on accepted transfers, so a
    /// rejected load perturbs nothing.
    pub fn load(&mut self, frame: XgmiiFrame) -> Result<bool, GearboxFull> {
        if !self.gearbox.ready() {
            return Err(GearboxFull);
        }
        let (block, bad) = codec::encode(frame);
        self.gearbox.load(self.scrambler.step(block))?;
        Ok(bad)
    }

    /// Emits the next serial word, if one is buffered.
    pub fn take_word(&mut self) -> Option<SerialWord> {
        self.gearbox.take_word()
    }
}

/// One decoded XGMII transfer out of the receive pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RxFrame {
    pub frame: XgmiiFrame,
    /// The block behind this transfer failed decode (bad sync header or
    /// unrecognized block type); `frame` is the all-`/E/` substitute.
    pub error: bool,
}

/// The receive half: serial words in, XGMII transfers out once locked.
#[derive(Clone, Debug)]
pub struct RxPath {
    gearbox: RxGearbox,
    sync: BlockSync,
    descrambler: Descrambler,
    monitor: LinkMonitor,
}

impl RxPath {
    pub fn new() -> Self {
        Self::with_dwell(DEBOUNCE_TICKS)
    }

    /// A receive path with an explicit link-up debounce dwell, in
    /// serial-word ticks.
    pub fn with_dwell(dwell: u32) -> Self {
        Self {
            gearbox: RxGearbox::new(),
            sync: BlockSync::new(),
            descrambler: Descrambler::new(),
            monitor: LinkMonitor::with_dwell(dwell),
        }
    }

    pub fn reset(&mut self) {
        self.gearbox.reset();
        self.sync.reset();
        self.descrambler.reset();
        self.monitor.reset();
    }

    /// Advances the receive pipeline by one serial word.
    ///
    /// Returns a transfer whenever a complete block came out of the gearbox
    /// under block lock. Before lock, blocks are consumed by the alignment
    /// search and nothing is produced; the descrambler does not advance, so
    /// its convergence starts from the first locked block.
    pub fn step(&mut self, word: SerialWord) -> Option<RxFrame> {
        self.gearbox.load(word);

        let mut out = None;
        if let Some(block) = self.gearbox.take_block() {
            match self.sync.step(block.header) {
                Slip::Slip => self.gearbox.slip(),
                Slip::Hold => {}
            }
            if self.sync.locked() {
                let block = self.descrambler.step(block);
                let (frame, error) = codec::decode(block);
                if error {
                    self.monitor.count_errored_block();
                }
                out = Some(RxFrame { frame, error });
            }
        }

        self.monitor.step(self.sync.locked(), self.sync.hi_ber());
        out
    }

    /// Current status word.
    pub fn status(&self) -> PcsStatus {
        let mut status = PcsStatus::default();
        status.set_block_lock(self.sync.locked());
        status.set_hi_ber(self.sync.hi_ber());
        status.set_link_up(self.monitor.link_up());
        status.set_status_latch(self.monitor.status_latch());
        status
    }

    /// Current counter snapshot.
    pub fn counters(&self) -> Counters {
        Counters {
            ber_ticks: self.monitor.ber_ticks(),
            errored_blocks: self.monitor.errored_blocks(),
            invalid_headers: self.sync.invalid_headers(),
        }
    }

    /// Latching-low status read; see [`LinkMonitor::read_status_latch`].
    pub fn read_status_latch(&mut self) -> bool {
        self.monitor.read_status_latch()
    }
}

impl Default for RxPath {
    fn default() -> Self {
        Self::new()
    }
}
