//! Hardware FIFO window
//!
//! The FIFO is the `[base, end)` slice of LRAM. The CPU writes bytes at a
//! software-tracked cursor; the hardware counts them into FIFOSIZ and the
//! host drains them from FIFOPTR. One byte of the window is never filled so
//! that a full FIFO can be told apart from an empty one.

use crate::error::IosError;
use crate::regs::{fifoptr, fupd, IosRegisterBlock, Reg};

/// Write-side view of the hardware FIFO
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HwFifo {
    base: usize,
    end: usize,
    cursor: usize,
}

impl HwFifo {
    /// FIFO covering LRAM offsets `base..end`, cursor at `base`
    pub const fn new(base: usize, end: usize) -> Self {
        Self {
            base,
            end,
            cursor: base,
        }
    }

    /// Window start (LRAM offset)
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Window end, exclusive (LRAM offset)
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Next LRAM offset the CPU will write
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Window size in bytes
    pub const fn size(&self) -> usize {
        self.end.saturating_sub(self.base)
    }

    /// Bytes the CPU may still push given the current occupancy
    pub const fn space_left(&self, occupancy: usize) -> usize {
        self.size().saturating_sub(occupancy).saturating_sub(1)
    }

    /// Current occupancy as counted by the hardware (FIFOPTR.FIFOSIZ)
    pub fn occupancy<R: IosRegisterBlock>(regs: &R) -> usize {
        fifoptr::FIFOSIZ.get(regs.read(Reg::FifoPtr)) as usize
    }

    /// Copy `bytes` into the window at the cursor, wrapping at `end`.
    ///
    /// Precondition: `bytes.len() <= space_left(occupancy)`. The length is
    /// not re-checked here; exceeding it overwrites bytes the host has not
    /// read yet.
    #[allow(clippy::arithmetic_side_effects)] // Safety: cursor < end <= LRAM_SIZE
    pub fn push<R: IosRegisterBlock>(&mut self, regs: &mut R, bytes: &[u8]) {
        for &byte in bytes {
            regs.write_lram(self.cursor, byte);
            self.cursor += 1;
            if self.cursor == self.end {
                self.cursor = self.base;
            }
        }
    }

    /// Reposition the FIFO pointer to LRAM `offset` inside the
    /// FIFOUPD bracket, and move the write cursor with it.
    pub fn set_pointer<R: IosRegisterBlock>(
        &mut self,
        regs: &mut R,
        offset: usize,
    ) -> Result<(), IosError> {
        if offset < self.base || offset >= self.end {
            return Err(IosError::InvalidArgument);
        }
        #[allow(clippy::cast_possible_truncation)] // offset < end <= LRAM_SIZE
        let ptr = offset as u32;
        regs.write(Reg::Fupd, fupd::FIFOUPD);
        regs.write(Reg::FifoPtr, fifoptr::FIFOPTR.val(ptr));
        regs.write(Reg::Fupd, 0);
        self.cursor = offset;
        Ok(())
    }
}
