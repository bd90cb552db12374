//! Host-side IOS model
//!
//! [`SimState`] models the register file and LRAM of one IOS instance with
//! the side effects the driver depends on: write-one-to-clear/set interrupt
//! registers, FIFOSIZ counting of CPU writes into the FIFO window and host
//! reads draining it. [`SimIos`] exposes a shared `SimState` through
//! [`IosRegisterBlock`] so tests can drive the host side while the driver
//! holds the register block.
//!
//! [`MockPower`] stands in for the board power manager.

use core::cell::RefCell;

use crate::config::{LRAM_SIZE, NUM_MODULES};
use crate::error::PowerError;
use crate::power::{ClockId, ClockUser, Peripheral, PowerManager};
use crate::regs::{
    dmastat, dmatotcount, fifocfg, fifoctr, fifoptr, fifothr, fupd, genadd, iointctl, IntStatus,
    IosRegisterBlock, Reg,
};

/// Register file and LRAM of one simulated instance
#[derive(Debug, Clone)]
pub struct SimState {
    regs: [u32; Reg::COUNT],
    lram: [u8; LRAM_SIZE],
    fifo_update_brackets: usize,
}

impl Default for SimState {
    fn default() -> Self {
        Self::new()
    }
}

impl SimState {
    /// All registers and LRAM at reset (zero)
    pub const fn new() -> Self {
        Self {
            regs: [0; Reg::COUNT],
            lram: [0; LRAM_SIZE],
            fifo_update_brackets: 0,
        }
    }

    /// Current register value
    pub fn reg(&self, reg: Reg) -> u32 {
        self.regs.get(reg.index()).copied().unwrap_or(0)
    }

    /// Store a raw register value, bypassing write side effects
    pub fn set_reg(&mut self, reg: Reg, value: u32) {
        if let Some(slot) = self.regs.get_mut(reg.index()) {
            *slot = value;
        }
    }

    fn update(&mut self, reg: Reg, f: impl FnOnce(u32) -> u32) {
        let value = f(self.reg(reg));
        self.set_reg(reg, value);
    }

    /// Copy of the LRAM contents
    pub fn lram(&self) -> [u8; LRAM_SIZE] {
        self.lram
    }

    /// Completed FIFOUPD set/clear brackets
    pub fn fifo_update_brackets(&self) -> usize {
        self.fifo_update_brackets
    }

    /// FIFOPTR.FIFOSIZ
    pub fn fifo_occupancy(&self) -> usize {
        fifoptr::FIFOSIZ.get(self.reg(Reg::FifoPtr)) as usize
    }

    /// FIFO window `[base, end)` decoded from FIFOCFG
    #[allow(clippy::arithmetic_side_effects)] // Safety: 6-bit field shifted by 3 stays below 512
    fn fifo_window(&self) -> (usize, usize) {
        let cfg = self.reg(Reg::FifoCfg);
        let base = (fifocfg::FIFOBASE.get(cfg) as usize) << 3;
        let end = (fifocfg::FIFOMAX.get(cfg) as usize) << 3;
        (base, end)
    }

    /// Apply a CPU register write with its hardware side effects
    pub fn cpu_write(&mut self, reg: Reg, value: u32) {
        match reg {
            Reg::IntClr => self.update(Reg::IntStat, |v| v & !value),
            Reg::IntSet => self.update(Reg::IntStat, |v| v | value),
            Reg::RegAccIntClr => self.update(Reg::RegAccIntStat, |v| v & !value),
            Reg::RegAccIntSet => self.update(Reg::RegAccIntStat, |v| v | value),
            Reg::IoIntCtl => self.update(Reg::IoIntCtl, |v| {
                let mut pending = iointctl::IOINT.get(v) | iointctl::IOINTSET.get(value);
                if iointctl::IOINTCLR.get(value) != 0 {
                    pending = 0;
                }
                iointctl::IOINT.set(v, pending)
            }),
            Reg::Fupd => {
                let old = self.reg(Reg::Fupd);
                if old & fupd::FIFOUPD != 0 && value & fupd::FIFOUPD == 0 {
                    self.fifo_update_brackets = self.fifo_update_brackets.saturating_add(1);
                }
                // IOREAD is owned by the hardware.
                self.set_reg(Reg::Fupd, (value & fupd::FIFOUPD) | (old & fupd::IOREAD));
            }
            _ => self.set_reg(reg, value),
        }
    }

    /// Apply a CPU LRAM write; bytes landing in the FIFO window count into
    /// FIFOSIZ
    pub fn cpu_write_lram(&mut self, offset: usize, byte: u8) {
        let Some(slot) = self.lram.get_mut(offset) else {
            return;
        };
        *slot = byte;
        let (base, end) = self.fifo_window();
        if (base..end).contains(&offset) {
            let size = fifoptr::FIFOSIZ.get(self.reg(Reg::FifoPtr));
            let size = size.saturating_add(1).min(0xFF);
            self.update(Reg::FifoPtr, |v| fifoptr::FIFOSIZ.set(v, size));
        }
    }

    /// Host reads up to `out.len()` bytes from the FIFO at FIFOPTR.
    ///
    /// Advances FIFOPTR (wrapping at the window end), lowers FIFOSIZ and
    /// FIFOCTR, raises XCMPRF, and raises FSIZE once the occupancy is at or
    /// below FIFOTHR. Returns the number of bytes read.
    pub fn host_read_fifo(&mut self, out: &mut [u8]) -> usize {
        let (base, end) = self.fifo_window();
        let occupancy = self.fifo_occupancy();
        let count = out.len().min(occupancy);
        let mut ptr = fifoptr::FIFOPTR.get(self.reg(Reg::FifoPtr)) as usize;
        for byte in out.iter_mut().take(count) {
            *byte = self.lram.get(ptr).copied().unwrap_or_default();
            ptr = ptr.saturating_add(1);
            if ptr >= end {
                ptr = base;
            }
        }

        let remaining = occupancy.saturating_sub(count);
        #[allow(clippy::cast_possible_truncation)] // both bounded by LRAM_SIZE
        let (ptr, remaining_field) = (ptr as u32, remaining as u32);
        self.update(Reg::FifoPtr, |v| {
            fifoptr::FIFOSIZ.set(fifoptr::FIFOPTR.set(v, ptr), remaining_field)
        });
        #[allow(clippy::cast_possible_truncation)] // count <= LRAM_SIZE
        let consumed = count as u32;
        self.update(Reg::FifoCtr, |v| {
            fifoctr::FIFOCTR.set(v, fifoctr::FIFOCTR.get(v).saturating_sub(consumed))
        });

        if count > 0 {
            self.raise(IntStatus::XCMPRF);
        }
        if remaining <= fifothr::FIFOTHR.get(self.reg(Reg::FifoThr)) as usize {
            self.raise(IntStatus::FSIZE);
        }
        count
    }

    /// Latch interrupt sources in INTSTAT
    pub fn raise(&mut self, status: IntStatus) {
        self.update(Reg::IntStat, |v| v | status.bits());
    }

    /// Host-side write of the IOINTCTL enables
    pub fn set_host_interrupt_enable(&mut self, mask: u8) {
        self.update(Reg::IoIntCtl, |v| iointctl::IOINTEN.set(v, u32::from(mask)));
    }

    /// Host writes the general address data byte
    pub fn set_gadata(&mut self, data: u8) {
        self.update(Reg::GenAdd, |v| genadd::GADATA.set(v, u32::from(data)));
        self.raise(IntStatus::GENAD);
    }

    /// Host starts or finishes a FIFO read (FUPD.IOREAD)
    pub fn set_io_read_pending(&mut self, pending: bool) {
        self.update(Reg::Fupd, |v| {
            if pending {
                v | fupd::IOREAD
            } else {
                v & !fupd::IOREAD
            }
        });
    }

    /// DMA engine moved `bytes` and finished: lowers DMATOTCOUNT, sets
    /// DMACPL and raises DCMP
    pub fn finish_dma(&mut self, bytes: u32) {
        self.update(Reg::DmaTotCount, |v| {
            dmatotcount::TOTCOUNT.set(v, dmatotcount::TOTCOUNT.get(v).saturating_sub(bytes))
        });
        self.update(Reg::DmaStat, |v| (v & !dmastat::DMATIP) | dmastat::DMACPL);
        self.raise(IntStatus::DCMP);
    }

    /// DMA engine hit a bus error: sets DMAERR and raises DERR
    pub fn fail_dma(&mut self) {
        self.update(Reg::DmaStat, |v| (v & !dmastat::DMATIP) | dmastat::DMAERR);
        self.raise(IntStatus::DERR);
    }

    /// Power the instance off and on; registers and LRAM return to reset
    pub fn power_cycle(&mut self) {
        self.regs = [0; Reg::COUNT];
        self.lram = [0; LRAM_SIZE];
    }
}

/// [`IosRegisterBlock`] over a shared [`SimState`]
#[derive(Debug, Clone, Copy)]
pub struct SimIos<'a> {
    state: &'a RefCell<SimState>,
}

impl<'a> SimIos<'a> {
    /// Register block backed by `state`
    pub const fn new(state: &'a RefCell<SimState>) -> Self {
        Self { state }
    }
}

impl IosRegisterBlock for SimIos<'_> {
    fn read(&self, reg: Reg) -> u32 {
        self.state.borrow().reg(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.state.borrow_mut().cpu_write(reg, value);
    }

    fn write_lram(&mut self, offset: usize, byte: u8) {
        self.state.borrow_mut().cpu_write_lram(offset, byte);
    }
}

/// Reference-counting power manager with failure injection
#[derive(Debug, Default)]
pub struct MockPower {
    powered: [bool; NUM_MODULES],
    clock_refs: usize,
    fail_clock: bool,
    fail_peripheral: bool,
}

impl MockPower {
    /// Everything off, no failures armed
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next clock request fail
    pub fn fail_next_clock_request(&mut self) {
        self.fail_clock = true;
    }

    /// Make the next peripheral enable fail
    pub fn fail_next_peripheral_enable(&mut self) {
        self.fail_peripheral = true;
    }

    /// Outstanding clock references
    pub fn clock_refs(&self) -> usize {
        self.clock_refs
    }

    /// Whether the power domain of IOS `module` is up
    pub fn is_powered(&self, module: u8) -> bool {
        self.powered.get(usize::from(module)).copied().unwrap_or(false)
    }

    fn set_powered(&mut self, peripheral: Peripheral, on: bool) -> Result<(), PowerError> {
        let Peripheral::Ios(module) = peripheral;
        let slot = self
            .powered
            .get_mut(usize::from(module))
            .ok_or(PowerError::PeripheralFailed)?;
        *slot = on;
        Ok(())
    }
}

impl PowerManager for MockPower {
    fn enable_peripheral(&mut self, peripheral: Peripheral) -> Result<(), PowerError> {
        if core::mem::take(&mut self.fail_peripheral) {
            return Err(PowerError::PeripheralFailed);
        }
        self.set_powered(peripheral, true)
    }

    fn disable_peripheral(&mut self, peripheral: Peripheral) -> Result<(), PowerError> {
        self.set_powered(peripheral, false)
    }

    fn request_clock(&mut self, _clock: ClockId, _user: ClockUser) -> Result<(), PowerError> {
        if core::mem::take(&mut self.fail_clock) {
            return Err(PowerError::ClockFailed);
        }
        self.clock_refs = self.clock_refs.saturating_add(1);
        Ok(())
    }

    fn release_clock(&mut self, _clock: ClockId, _user: ClockUser) -> Result<(), PowerError> {
        self.clock_refs = self.clock_refs.saturating_sub(1);
        Ok(())
    }
}
