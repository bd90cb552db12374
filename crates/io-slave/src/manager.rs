//! IOS driver manager
//!
//! [`IosManager`] owns every IOS instance: its register block and, once
//! initialized, its driver state. Each slot sits behind a
//! [`critical_section::Mutex`], so one manager is shared between foreground
//! code and the interrupt handlers. Every operation takes a single short
//! critical section; DMA completion callbacks run after it is released.
//!
//! Instances are addressed through [`IosHandle`]s. A handle carries the
//! epoch of the initialization that produced it and stops working once the
//! instance is uninitialized.
//!
//! ```no_run
//! use io_slave::{config::IOS0_BASE, IosError, IosHandle, IosManager, Mmio};
//! use static_cell::StaticCell;
//!
//! static IOS: StaticCell<IosManager<Mmio, 1>> = StaticCell::new();
//!
//! fn bring_up() -> Result<(&'static IosManager<Mmio, 1>, IosHandle), IosError> {
//!     // SAFETY: IOS0_BASE maps IOS instance 0 and nothing else wraps it.
//!     let ios: &'static IosManager<Mmio, 1> =
//!         IOS.init(IosManager::new([unsafe { Mmio::new(IOS0_BASE) }]));
//!     let handle = ios.initialize(0)?;
//!     Ok((ios, handle))
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::{IosConfig, IOSFD_RD, IOSFD_WR, NUM_MODULES};
use crate::control::{self, Request};
use crate::dma::{DmaCompletion, DmaState, Transfer, TransferBuffer, TransferDirection};
use crate::error::IosError;
use crate::instance::Instance;
use crate::power::{PowerManager, PowerState};
use crate::regs::{IntStatus, IosRegisterBlock, Reg};
use crate::service;

/// Reference to an initialized IOS instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IosHandle {
    module: u8,
    epoch: u32,
}

impl IosHandle {
    /// Module index of the instance
    pub const fn module(&self) -> u8 {
        self.module
    }
}

/// The full-duplex instance pair driven as one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FullDuplexHandle {
    tx: IosHandle,
    rx: IosHandle,
}

impl FullDuplexHandle {
    /// Pair the forced-write and forced-read instances.
    ///
    /// `tx` must be module [`IOSFD_WR`] and `rx` module [`IOSFD_RD`].
    pub fn new(tx: IosHandle, rx: IosHandle) -> Result<Self, IosError> {
        if tx.module != IOSFD_WR || rx.module != IOSFD_RD {
            return Err(IosError::InvalidOperation);
        }
        Ok(Self { tx, rx })
    }

    /// Transmit-side handle
    pub const fn tx(&self) -> IosHandle {
        self.tx
    }

    /// Receive-side handle
    pub const fn rx(&self) -> IosHandle {
        self.rx
    }
}

struct Slot<R> {
    regs: R,
    instance: Option<Instance>,
    epoch: u32,
}

impl<R> Slot<R> {
    /// Registers and state, if `handle` still refers to this slot's instance
    fn live(&mut self, handle: IosHandle) -> Option<(&mut R, &mut Instance)> {
        if self.epoch != handle.epoch {
            return None;
        }
        let instance = self.instance.as_mut()?;
        Some((&mut self.regs, instance))
    }
}

/// Registry of `N` IOS instances, indexed by module number
pub struct IosManager<R, const N: usize = NUM_MODULES> {
    slots: [Mutex<RefCell<Slot<R>>>; N],
}

impl<R: IosRegisterBlock, const N: usize> IosManager<R, N> {
    /// Take ownership of one register block per instance; `blocks[i]` is module `i`
    pub fn new(blocks: [R; N]) -> Self {
        Self {
            slots: blocks.map(|regs| {
                Mutex::new(RefCell::new(Slot {
                    regs,
                    instance: None,
                    epoch: 0,
                }))
            }),
        }
    }

    fn slot(&self, module: u8) -> Option<&Mutex<RefCell<Slot<R>>>> {
        self.slots.get(usize::from(module))
    }

    /// Run `f` on a live instance inside a critical section
    fn locked<T>(
        &self,
        handle: IosHandle,
        f: impl FnOnce(&mut R, &mut Instance) -> T,
    ) -> Result<T, IosError> {
        let slot = self.slot(handle.module).ok_or(IosError::InvalidHandle)?;
        critical_section::with(|cs| {
            let mut slot = slot.borrow_ref_mut(cs);
            let (regs, instance) = slot.live(handle).ok_or(IosError::InvalidHandle)?;
            Ok(f(regs, instance))
        })
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Claim instance `module`
    pub fn initialize(&self, module: u8) -> Result<IosHandle, IosError> {
        let slot = self.slot(module).ok_or(IosError::OutOfRange)?;
        critical_section::with(|cs| {
            let mut slot = slot.borrow_ref_mut(cs);
            if slot.instance.is_some() {
                return Err(IosError::InvalidOperation);
            }
            slot.epoch = slot.epoch.wrapping_add(1);
            slot.instance = Some(Instance::new(module));
            debug!("ios{}: initialized", module);
            Ok(IosHandle {
                module,
                epoch: slot.epoch,
            })
        })
    }

    /// Release the instance: stop any DMA, disable the interface, drop the
    /// driver state. `handle` is invalid afterwards.
    pub fn uninitialize(&self, handle: IosHandle) -> Result<(), IosError> {
        let slot = self.slot(handle.module).ok_or(IosError::InvalidHandle)?;
        critical_section::with(|cs| {
            let mut slot = slot.borrow_ref_mut(cs);
            let (regs, instance) = slot.live(handle).ok_or(IosError::InvalidHandle)?;
            if instance.dma.abort(regs).is_some() {
                warn!("ios{}: dma aborted by uninitialize", handle.module);
            }
            if instance.enabled {
                instance.disable(regs);
            }
            slot.instance = None;
            Ok(())
        })
    }

    /// Apply `config` and enable the interface; rejected while enabled
    pub fn configure(&self, handle: IosHandle, config: IosConfig) -> Result<(), IosError> {
        self.locked(handle, |regs, instance| instance.configure(regs, config))?
    }

    /// Set the interface enable bit
    pub fn enable(&self, handle: IosHandle) -> Result<(), IosError> {
        self.locked(handle, |regs, instance| instance.enable(regs))
    }

    /// Clear the interface enable bit; required before reconfiguring
    pub fn disable(&self, handle: IosHandle) -> Result<(), IosError> {
        self.locked(handle, |regs, instance| instance.disable(regs))
    }

    /// True while the interface is enabled
    pub fn is_enabled(&self, handle: IosHandle) -> Result<bool, IosError> {
        self.locked(handle, |_, instance| instance.enabled)
    }

    /// Switch power state through `power`, optionally retaining the
    /// configuration registers
    pub fn power_control<P: PowerManager>(
        &self,
        handle: IosHandle,
        state: PowerState,
        retain: bool,
        power: &mut P,
    ) -> Result<(), IosError> {
        self.locked(handle, |regs, instance| {
            instance.power_control(regs, state, retain, power)
        })?
    }

    /// Execute a host-register control request.
    ///
    /// [`Request::ReadPoll`] spins until the host read completes, re-entering
    /// the critical section for each sample.
    pub fn control(&self, handle: IosHandle, request: Request) -> Result<Option<u32>, IosError> {
        if request == Request::ReadPoll {
            while self.locked(handle, |regs, _| control::host_read_pending(regs))? {
                core::hint::spin_loop();
            }
            return Ok(None);
        }
        self.locked(handle, |regs, instance| {
            control::apply(regs, instance, request)
        })?
    }

    /// Wait for the host to finish reading the FIFO, yielding to the
    /// executor between samples
    pub async fn wait_host_read(&self, handle: IosHandle) -> Result<(), IosError> {
        while self.locked(handle, |regs, _| control::host_read_pending(regs))? {
            embassy_futures::yield_now().await;
        }
        Ok(())
    }

    // ── FIFO ────────────────────────────────────────────────────────────────

    /// Queue bytes for the host; returns how many were accepted
    pub fn fifo_write(&self, handle: IosHandle, data: &[u8]) -> Result<usize, IosError> {
        self.locked(handle, |regs, instance| service::write(regs, instance, data))?
    }

    /// Bytes waiting for the host (ring plus hardware FIFO)
    pub fn fifo_space_used(&self, handle: IosHandle) -> Result<usize, IosError> {
        self.locked(handle, |regs, instance| instance.space_used(regs))
    }

    /// Bytes that can still be queued
    pub fn fifo_space_left(&self, handle: IosHandle) -> Result<usize, IosError> {
        self.locked(handle, |regs, instance| instance.space_left(regs))
    }

    // ── Interrupts ──────────────────────────────────────────────────────────

    /// Enable interrupt sources
    pub fn interrupt_enable(&self, handle: IosHandle, mask: IntStatus) -> Result<(), IosError> {
        self.locked(handle, |regs, _| {
            regs.modify(Reg::IntEn, |v| v | mask.bits());
        })
    }

    /// Disable interrupt sources
    pub fn interrupt_disable(&self, handle: IosHandle, mask: IntStatus) -> Result<(), IosError> {
        self.locked(handle, |regs, _| {
            regs.modify(Reg::IntEn, |v| v & !mask.bits());
        })
    }

    /// Clear pending interrupt sources
    pub fn interrupt_clear(&self, handle: IosHandle, mask: IntStatus) -> Result<(), IosError> {
        self.locked(handle, |regs, _| regs.write(Reg::IntClr, mask.bits()))
    }

    /// Pending interrupt sources, optionally masked by the enables
    pub fn interrupt_status(
        &self,
        handle: IosHandle,
        enabled_only: bool,
    ) -> Result<IntStatus, IosError> {
        self.locked(handle, |regs, _| {
            let mut status = regs.read(Reg::IntStat);
            if enabled_only {
                status &= regs.read(Reg::IntEn);
            }
            IntStatus::from_bits_truncate(status)
        })
    }

    /// Service `status` for the instance: finish DMA, refill the FIFO
    pub fn interrupt_service(&self, handle: IosHandle, status: IntStatus) -> Result<(), IosError> {
        let completion =
            self.locked(handle, |regs, instance| service::service(regs, instance, status))?;
        if let Some((callback, completion)) = completion {
            callback(completion);
        }
        Ok(())
    }

    /// Interrupt trampoline: read and clear the enabled status, then service
    /// it. Returns the status that was handled.
    pub fn handle_interrupt(&self, handle: IosHandle) -> Result<IntStatus, IosError> {
        let (status, completion) = self.locked(handle, |regs, instance| {
            let status =
                IntStatus::from_bits_truncate(regs.read(Reg::IntStat) & regs.read(Reg::IntEn));
            regs.write(Reg::IntClr, status.bits());
            (status, service::service(regs, instance, status))
        })?;
        if let Some((callback, completion)) = completion {
            callback(completion);
        }
        Ok(status)
    }

    // ── DMA ─────────────────────────────────────────────────────────────────

    /// Start a half-duplex transfer.
    ///
    /// On rejection the descriptor comes back untouched together with the
    /// error; nothing is programmed.
    pub fn dma_transfer(
        &self,
        handle: IosHandle,
        transfer: Transfer,
    ) -> Result<(), (IosError, Transfer)> {
        let Some(slot) = self.slot(handle.module) else {
            return Err((IosError::InvalidHandle, transfer));
        };
        critical_section::with(|cs| {
            let mut slot = slot.borrow_ref_mut(cs);
            let Some((regs, instance)) = slot.live(handle) else {
                return Err((IosError::InvalidHandle, transfer));
            };
            if transfer.direction == TransferDirection::FullDuplex {
                return Err((IosError::InvalidArgument, transfer));
            }
            if let Err(err) = transfer.validate() {
                return Err((err, transfer));
            }
            if instance.dma.is_busy() {
                return Err((IosError::InUse, transfer));
            }

            let direction = transfer.direction;
            let num_bytes = match direction {
                TransferDirection::Write => transfer.write.num_bytes,
                TransferDirection::Read | TransferDirection::FullDuplex => transfer.read.num_bytes,
            };
            let (read, write) = transfer.into_flights();
            let flight = match direction {
                TransferDirection::Write => write,
                TransferDirection::Read | TransferDirection::FullDuplex => read,
            };
            instance.dma.arm(regs, flight);
            instance.dma.start(regs);
            debug!(
                "ios{}: dma {:?} started, {} bytes",
                handle.module,
                direction,
                num_bytes
            );
            Ok(())
        })
    }

    /// Start a full-duplex transfer on the [`IOSFD_WR`] / [`IOSFD_RD`] pair.
    ///
    /// Both engines are programmed before either is enabled.
    pub fn dma_fullduplex_transfer(
        &self,
        pair: FullDuplexHandle,
        transfer: Transfer,
    ) -> Result<(), (IosError, Transfer)> {
        let (Some(tx_slot), Some(rx_slot)) = (self.slot(pair.tx.module), self.slot(pair.rx.module))
        else {
            return Err((IosError::InvalidHandle, transfer));
        };
        critical_section::with(|cs| {
            let mut tx_slot = tx_slot.borrow_ref_mut(cs);
            let mut rx_slot = rx_slot.borrow_ref_mut(cs);
            let (Some((tx_regs, tx)), Some((rx_regs, rx))) =
                (tx_slot.live(pair.tx), rx_slot.live(pair.rx))
            else {
                return Err((IosError::InvalidHandle, transfer));
            };
            if transfer.direction != TransferDirection::FullDuplex {
                return Err((IosError::InvalidArgument, transfer));
            }
            if let Err(err) = transfer.validate() {
                return Err((err, transfer));
            }
            if tx.dma.is_busy() || rx.dma.is_busy() {
                return Err((IosError::InUse, transfer));
            }

            let (tx_bytes, rx_bytes) = (transfer.write.num_bytes, transfer.read.num_bytes);
            let (read, write) = transfer.into_flights();
            tx.dma.arm_forced(tx_regs, write);
            rx.dma.arm_forced(rx_regs, read);
            tx.dma.start(tx_regs);
            rx.dma.start(rx_regs);
            debug!(
                "ios{}+ios{}: full-duplex dma started, tx {} rx {} bytes",
                IOSFD_WR,
                IOSFD_RD,
                tx_bytes,
                rx_bytes
            );
            Ok(())
        })
    }

    /// Stop the in-flight transfer without a completion and hand its buffer
    /// back. `Ok(None)` when nothing was in flight.
    pub fn dma_abort(&self, handle: IosHandle) -> Result<Option<TransferBuffer>, IosError> {
        self.locked(handle, |regs, instance| {
            let buffer = instance.dma.abort(regs);
            if buffer.is_some() {
                debug!("ios{}: dma aborted", handle.module);
            }
            buffer
        })
    }

    /// Abort both halves of a full-duplex transfer; returns the
    /// (transmit, receive) buffers
    pub fn dma_fullduplex_abort(
        &self,
        pair: FullDuplexHandle,
    ) -> Result<(Option<TransferBuffer>, Option<TransferBuffer>), IosError> {
        let (Some(tx_slot), Some(rx_slot)) = (self.slot(pair.tx.module), self.slot(pair.rx.module))
        else {
            return Err(IosError::InvalidHandle);
        };
        critical_section::with(|cs| {
            let mut tx_slot = tx_slot.borrow_ref_mut(cs);
            let mut rx_slot = rx_slot.borrow_ref_mut(cs);
            let (Some((tx_regs, tx)), Some((rx_regs, rx))) =
                (tx_slot.live(pair.tx), rx_slot.live(pair.rx))
            else {
                return Err(IosError::InvalidHandle);
            };
            Ok((tx.dma.abort(tx_regs), rx.dma.abort(rx_regs)))
        })
    }

    /// Current DMA engine state
    pub fn dma_state(&self, handle: IosHandle) -> Result<DmaState, IosError> {
        self.locked(handle, |_, instance| instance.dma.state())
    }

    /// Oldest completion that finished without a callback
    pub fn take_completion(&self, handle: IosHandle) -> Result<Option<DmaCompletion>, IosError> {
        self.locked(handle, |_, instance| instance.dma.take_completion())
    }
}
