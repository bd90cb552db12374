//! Host-register control requests
//!
//! Each [`Request`] touches exactly one register (or register pair) of the
//! instance. Requests that return a value yield `Some`.

use crate::error::IosError;
use crate::instance::Instance;
use crate::regs::{dmacfg, fifoctr, fifoptr, fupd, genadd, iointctl, IosRegisterBlock, Reg};

/// Control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Raise host interrupts (IOINTCTL.IOINTSET)
    HostIntSet(u8),
    /// Write IOINTCTL.IOINTCLR; bit 0 set clears every pending host interrupt
    HostIntClr(u8),
    /// Read pending host interrupts (IOINTCTL.IOINT)
    HostIntGet,
    /// Read host interrupt enables (IOINTCTL.IOINTEN)
    HostIntEnGet,
    /// Read the general address data byte (GENADD.GADATA)
    ReadGaData,
    /// OR bits into REGACCINTEN
    AccIntEnable(u32),
    /// Write REGACCINTSET
    AccIntSet(u32),
    /// Write REGACCINTCLR
    AccIntClr(u32),
    /// Read REGACCINTSTAT
    AccIntGet,
    /// Read REGACCINTEN
    AccIntEnGet,
    /// Clear bits in REGACCINTEN
    AccIntDisable(u32),
    /// Spin until the host finishes reading the FIFO (FUPD.IOREAD clear)
    ReadPoll,
    /// Load FIFOCTR with ring bytes plus FIFO occupancy
    FifoUpdateCtr,
    /// Empty the ring and zero FIFOCTR and FIFOSIZ
    FifoBufClr,
    /// Read DMACFG.DMADIR (0 read, 1 write)
    GetDmaDir,
    /// Move the FIFO pointer to an LRAM offset
    SetFifoPtr(u16),
}

/// True while the host is reading the FIFO
pub(crate) fn host_read_pending<R: IosRegisterBlock>(regs: &R) -> bool {
    regs.read(Reg::Fupd) & fupd::IOREAD != 0
}

/// Apply a non-blocking request.
///
/// [`Request::ReadPoll`] only samples the flag here; the manager does the
/// spinning outside the critical section.
pub(crate) fn apply<R: IosRegisterBlock>(
    regs: &mut R,
    instance: &mut Instance,
    request: Request,
) -> Result<Option<u32>, IosError> {
    let value = match request {
        Request::HostIntSet(mask) => {
            regs.write(Reg::IoIntCtl, iointctl::IOINTSET.val(u32::from(mask)));
            None
        }
        Request::HostIntClr(mask) => {
            regs.write(Reg::IoIntCtl, iointctl::IOINTCLR.val(u32::from(mask)));
            None
        }
        Request::HostIntGet => Some(iointctl::IOINT.get(regs.read(Reg::IoIntCtl))),
        Request::HostIntEnGet => Some(iointctl::IOINTEN.get(regs.read(Reg::IoIntCtl))),
        Request::ReadGaData => Some(genadd::GADATA.get(regs.read(Reg::GenAdd))),
        Request::AccIntEnable(mask) => {
            regs.modify(Reg::RegAccIntEn, |v| v | mask);
            None
        }
        Request::AccIntSet(mask) => {
            regs.write(Reg::RegAccIntSet, mask);
            None
        }
        Request::AccIntClr(mask) => {
            regs.write(Reg::RegAccIntClr, mask);
            None
        }
        Request::AccIntGet => Some(regs.read(Reg::RegAccIntStat)),
        Request::AccIntEnGet => Some(regs.read(Reg::RegAccIntEn)),
        Request::AccIntDisable(mask) => {
            regs.modify(Reg::RegAccIntEn, |v| v & !mask);
            None
        }
        Request::ReadPoll => Some(u32::from(host_read_pending(regs))),
        Request::FifoUpdateCtr => {
            let used = instance.space_used(regs);
            #[allow(clippy::cast_possible_truncation)] // ring + FIFO <= MAX_SW_FIFO_SIZE + 1
            let used = used as u32;
            regs.modify(Reg::FifoCtr, |v| fifoctr::FIFOCTR.set(v, used));
            None
        }
        Request::FifoBufClr => {
            instance.ring.clear();
            regs.modify(Reg::FifoCtr, |v| fifoctr::FIFOCTR.set(v, 0));
            regs.modify(Reg::FifoPtr, |v| fifoptr::FIFOSIZ.set(v, 0));
            None
        }
        Request::GetDmaDir => Some(u32::from(regs.read(Reg::DmaCfg) & dmacfg::DMADIR != 0)),
        Request::SetFifoPtr(offset) => {
            instance.fifo.set_pointer(regs, usize::from(offset))?;
            None
        }
    };
    trace!("ios{}: control {:?}", instance.module, request);
    Ok(value)
}
