//! FIFO flow control
//!
//! The producer ([`write`]) pushes straight into the hardware FIFO while the
//! ring is empty and queues the rest. The consumer ([`service`]) runs from
//! the interrupt and refills the FIFO from the ring whenever the occupancy
//! drops to the FSIZE threshold.
//!
//! A threshold crossing that happens while the producer is still queueing
//! raises no new FSIZE, so the producer raises it itself (INTSET) when the
//! FIFO is already at or below threshold after queueing.

use crate::dma::{DmaCallback, DmaCompletion};
use crate::error::IosError;
use crate::fifo::HwFifo;
use crate::instance::Instance;
use crate::regs::{fifothr, IntStatus, IosRegisterBlock, Reg};

fn threshold<R: IosRegisterBlock>(regs: &R) -> usize {
    fifothr::FIFOTHR.get(regs.read(Reg::FifoThr)) as usize
}

/// Queue `data` for the host; returns the number of bytes accepted.
///
/// Bytes that fit neither the FIFO nor the ring are not accepted.
pub(crate) fn write<R: IosRegisterBlock>(
    regs: &mut R,
    instance: &mut Instance,
    data: &[u8],
) -> Result<usize, IosError> {
    if !instance.ring.has_storage() {
        return Err(IosError::InvalidOperation);
    }
    let mut rest = data;

    if instance.ring.is_empty() {
        let space = instance.fifo.space_left(HwFifo::occupancy(regs));
        let (now, later) = rest.split_at(space.min(rest.len()));
        instance.fifo.push(regs, now);
        rest = later;
    }

    if !rest.is_empty() {
        let queued = instance.ring.write(rest);
        if queued < rest.len() {
            warn!(
                "ios{}: ring full, dropped {} bytes",
                instance.module,
                rest.len().saturating_sub(queued)
            );
        }
        rest = rest.get(queued..).unwrap_or_default();

        if HwFifo::occupancy(regs) <= threshold(regs) {
            regs.write(Reg::IntSet, IntStatus::FSIZE.bits());
        }
    }

    Ok(data.len().saturating_sub(rest.len()))
}

/// Interrupt service for one instance.
///
/// Returns a DMA completion whose callback must run once the caller has left
/// the critical section.
pub(crate) fn service<R: IosRegisterBlock>(
    regs: &mut R,
    instance: &mut Instance,
    status: IntStatus,
) -> Option<(DmaCallback, DmaCompletion)> {
    let completion = if instance.dma.is_busy() {
        instance.dma.on_interrupt(regs, instance.module, status)
    } else {
        if status.intersects(IntStatus::FOVFL | IntStatus::FUNDFL | IntStatus::FRDERR) {
            warn!("ios{}: fifo error, status {}", instance.module, status.bits());
        }
        None
    };

    if status.intersects(IntStatus::GENAD | IntStatus::IOINTW) {
        trace!("ios{}: host access, status {}", instance.module, status.bits());
    }

    if status.contains(IntStatus::FSIZE) {
        refill(regs, instance);
    }

    completion
}

/// Move ring bytes into the FIFO while it sits at or below threshold.
///
/// Above threshold another FSIZE is guaranteed once the host drains it.
fn refill<R: IosRegisterBlock>(regs: &mut R, instance: &mut Instance) {
    let thresh = threshold(regs);
    let Instance { ring, fifo, .. } = instance;
    while !ring.is_empty() {
        let used = HwFifo::occupancy(regs);
        if used > thresh {
            break;
        }
        let free = fifo.space_left(used);
        if free == 0 {
            break;
        }
        ring.drain_into(free, |chunk| fifo.push(regs, chunk));
        // Pushing may itself re-raise FSIZE; it is handled by this loop.
        regs.write(Reg::IntClr, IntStatus::FSIZE.bits());
    }
}
