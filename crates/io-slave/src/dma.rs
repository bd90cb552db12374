//! DMA transfer engine
//!
//! Each IOS instance has one DMA engine moving bytes between a caller buffer
//! and the peripheral. Half-duplex transfers use one engine in the requested
//! direction. Full-duplex transfers drive the [`IOSFD_WR`] and [`IOSFD_RD`]
//! instances as one forced-write / forced-read pair.
//!
//! Buffers are `'static` and owned by the engine while a transfer is in
//! flight. They come back in the [`DmaCompletion`] (or from an abort).
//!
//! [`IOSFD_WR`]: crate::config::IOSFD_WR
//! [`IOSFD_RD`]: crate::config::IOSFD_RD

use heapless::Deque;

use crate::config::FD_PAD_BYTE;
use crate::error::{IosError, TransferError};
use crate::regs::{dmacfg, dmastat, dmatotcount, IntStatus, IosRegisterBlock, Reg};

/// Largest byte count DMATOTCOUNT can hold
pub const MAX_TRANSFER_BYTES: u32 = 0x000F_FFFF;

/// Completions kept per instance when no callback is registered
const PARKED_COMPLETIONS: usize = 2;

/// Requested transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferDirection {
    /// Host writes, device receives into the read buffer
    Read,
    /// Device transmits the write buffer to the host
    Write,
    /// Both at once on the full-duplex instance pair
    FullDuplex,
}

/// Direction of a single DMA engine (DMACFG.DMADIR)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaDirection {
    /// Peripheral to memory
    Read,
    /// Memory to peripheral
    Write,
}

impl DmaDirection {
    /// Decode DMACFG.DMADIR
    pub fn from_cfg(cfg: u32) -> Self {
        if cfg & dmacfg::DMADIR != 0 {
            Self::Write
        } else {
            Self::Read
        }
    }
}

/// DMA bus priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// Normal priority
    #[default]
    Low,
    /// High priority
    High,
}

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaState {
    /// No transfer
    #[default]
    Idle,
    /// Registers being programmed
    Configuring,
    /// Programmed, not yet enabled
    Armed,
    /// Enabled, hardware running autonomously
    Running,
}

/// Completion callback, invoked from the interrupt handler outside the
/// critical section
pub type DmaCallback = fn(DmaCompletion);

/// One direction of a transfer
#[derive(Debug)]
pub struct Leg<B> {
    /// Bytes to move
    pub num_bytes: u32,
    /// Source or destination buffer
    pub buffer: Option<B>,
    /// Completion callback; without one the completion is parked for
    /// [`IosManager::take_completion`](crate::IosManager::take_completion)
    pub callback: Option<DmaCallback>,
    /// Opaque value handed back in the completion
    pub context: usize,
}

impl<B> Default for Leg<B> {
    fn default() -> Self {
        Self {
            num_bytes: 0,
            buffer: None,
            callback: None,
            context: 0,
        }
    }
}

/// DMA transfer descriptor
#[derive(Debug)]
pub struct Transfer {
    /// Which legs are active
    pub direction: TransferDirection,
    /// Receive leg (host to device)
    pub read: Leg<&'static mut [u8]>,
    /// Transmit leg (device to host)
    pub write: Leg<&'static [u8]>,
    /// Bus priority for every engine involved
    pub priority: Priority,
}

#[allow(clippy::cast_possible_truncation)] // lengths above MAX_TRANSFER_BYTES are rejected by validate()
impl Transfer {
    /// Receive `buffer.len()` bytes from the host
    pub fn read(buffer: &'static mut [u8]) -> Self {
        Self {
            direction: TransferDirection::Read,
            read: Leg {
                num_bytes: buffer.len() as u32,
                buffer: Some(buffer),
                ..Leg::default()
            },
            write: Leg::default(),
            priority: Priority::Low,
        }
    }

    /// Transmit `buffer` to the host
    pub fn write(buffer: &'static [u8]) -> Self {
        Self {
            direction: TransferDirection::Write,
            read: Leg::default(),
            write: Leg {
                num_bytes: buffer.len() as u32,
                buffer: Some(buffer),
                ..Leg::default()
            },
            priority: Priority::Low,
        }
    }

    /// Transmit `tx` while receiving into `rx`
    pub fn full_duplex(tx: &'static [u8], rx: &'static mut [u8]) -> Self {
        Self {
            direction: TransferDirection::FullDuplex,
            read: Leg {
                num_bytes: rx.len() as u32,
                buffer: Some(rx),
                ..Leg::default()
            },
            write: Leg {
                num_bytes: tx.len() as u32,
                buffer: Some(tx),
                ..Leg::default()
            },
            priority: Priority::Low,
        }
    }

    /// Set the receive-leg callback
    #[must_use]
    pub fn with_read_callback(mut self, callback: DmaCallback, context: usize) -> Self {
        self.read.callback = Some(callback);
        self.read.context = context;
        self
    }

    /// Set the transmit-leg callback
    #[must_use]
    pub fn with_write_callback(mut self, callback: DmaCallback, context: usize) -> Self {
        self.write.callback = Some(callback);
        self.write.context = context;
        self
    }

    /// Set the bus priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Check every active leg: a non-zero count needs a buffer at least that
    /// long, and no count may exceed [`MAX_TRANSFER_BYTES`].
    pub fn validate(&self) -> Result<(), IosError> {
        let read = || check_leg(self.read.num_bytes, self.read.buffer.as_deref().map(<[u8]>::len));
        let write = || check_leg(self.write.num_bytes, self.write.buffer.map(<[u8]>::len));
        match self.direction {
            TransferDirection::Read => read(),
            TransferDirection::Write => write(),
            TransferDirection::FullDuplex => read().and_then(|()| write()),
        }
    }

    /// Split into (receive, transmit) engine programs
    pub(crate) fn into_flights(self) -> (InFlight, InFlight) {
        let read = InFlight {
            direction: DmaDirection::Read,
            requested: self.read.num_bytes,
            buffer: self.read.buffer.map_or(TransferBuffer::None, TransferBuffer::Rx),
            callback: self.read.callback,
            context: self.read.context,
            priority: self.priority,
        };
        let write = InFlight {
            direction: DmaDirection::Write,
            requested: self.write.num_bytes,
            buffer: self.write.buffer.map_or(TransferBuffer::None, TransferBuffer::Tx),
            callback: self.write.callback,
            context: self.write.context,
            priority: self.priority,
        };
        (read, write)
    }
}

fn check_leg(num_bytes: u32, buffer_len: Option<usize>) -> Result<(), IosError> {
    if num_bytes == 0 {
        return Ok(());
    }
    match buffer_len {
        Some(len) if len >= num_bytes as usize && num_bytes <= MAX_TRANSFER_BYTES => Ok(()),
        _ => Err(IosError::InvalidArgument),
    }
}

/// Buffer handed back when a transfer finishes or is aborted
#[derive(Debug, Default)]
pub enum TransferBuffer {
    /// Transmit buffer
    Tx(&'static [u8]),
    /// Receive buffer
    Rx(&'static mut [u8]),
    /// No buffer was attached
    #[default]
    None,
}

impl TransferBuffer {
    /// DMATARGADDR value for this buffer
    #[allow(clippy::cast_possible_truncation)] // target address space is 32-bit
    fn address(&self) -> u32 {
        match self {
            TransferBuffer::Tx(buf) => buf.as_ptr() as usize as u32,
            TransferBuffer::Rx(buf) => buf.as_ptr() as usize as u32,
            TransferBuffer::None => 0,
        }
    }
}

/// Result of a finished DMA leg
#[derive(Debug)]
pub struct DmaCompletion {
    /// Instance the engine belongs to
    pub module: u8,
    /// Engine direction
    pub direction: DmaDirection,
    /// Mapped hardware data error, if any
    pub result: Result<(), TransferError>,
    /// Requested count minus the count left in DMATOTCOUNT
    pub bytes_transferred: u32,
    /// The leg's buffer, returned to the caller
    pub buffer: TransferBuffer,
    /// Context value from the leg
    pub context: usize,
}

/// One programmed engine
#[derive(Debug)]
pub(crate) struct InFlight {
    direction: DmaDirection,
    requested: u32,
    buffer: TransferBuffer,
    callback: Option<DmaCallback>,
    context: usize,
    priority: Priority,
}

impl InFlight {
    /// Non-forced DMACFG value
    fn half_duplex_cfg(&self) -> u32 {
        let pri = match self.priority {
            Priority::High => dmacfg::DMAPRI,
            Priority::Low => 0,
        };
        let dir = match self.direction {
            DmaDirection::Write => dmacfg::DMADIR,
            DmaDirection::Read => 0,
        };
        dmacfg::DMAQUAD | pri | dir
    }

    /// Forced DMACFG value for the full-duplex pair; the write side pads
    /// with [`FD_PAD_BYTE`] once its buffer runs out.
    fn full_duplex_cfg(&self) -> u32 {
        let base = self.half_duplex_cfg() | dmacfg::FRCDMA;
        match self.direction {
            DmaDirection::Write => {
                base | dmacfg::FRCRDWRT
                    | dmacfg::PADBYTEEN
                    | dmacfg::PADBYTE.val(u32::from(FD_PAD_BYTE))
            }
            DmaDirection::Read => base,
        }
    }
}

/// Per-instance DMA engine state
#[derive(Debug)]
pub(crate) struct DmaEngine {
    state: DmaState,
    in_flight: Option<InFlight>,
    parked: Deque<DmaCompletion, PARKED_COMPLETIONS>,
}

impl DmaEngine {
    pub(crate) const fn new() -> Self {
        Self {
            state: DmaState::Idle,
            in_flight: None,
            parked: Deque::new(),
        }
    }

    pub(crate) fn state(&self) -> DmaState {
        self.state
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Program a non-forced transfer without enabling it
    pub(crate) fn arm<R: IosRegisterBlock>(&mut self, regs: &mut R, flight: InFlight) {
        let cfg = flight.half_duplex_cfg();
        self.program(regs, flight, cfg);
    }

    /// Program one half of a full-duplex transfer without enabling it
    pub(crate) fn arm_forced<R: IosRegisterBlock>(&mut self, regs: &mut R, flight: InFlight) {
        let cfg = flight.full_duplex_cfg();
        self.program(regs, flight, cfg);
    }

    fn program<R: IosRegisterBlock>(&mut self, regs: &mut R, flight: InFlight, cfg: u32) {
        self.state = DmaState::Configuring;
        // A DCMP or DERR left over from an earlier transfer must not finish this one.
        regs.write(Reg::IntClr, (IntStatus::DCMP | IntStatus::DERR).bits());
        // Never reprogram a live engine.
        regs.modify(Reg::DmaCfg, |v| v & !dmacfg::DMAEN);
        regs.write(Reg::DmaTotCount, dmatotcount::TOTCOUNT.val(flight.requested));
        regs.write(Reg::DmaTargAddr, flight.buffer.address());
        regs.write(Reg::DmaCfg, cfg);
        self.in_flight = Some(flight);
        self.state = DmaState::Armed;
    }

    /// Enable an armed engine
    pub(crate) fn start<R: IosRegisterBlock>(&mut self, regs: &mut R) {
        if self.state != DmaState::Armed {
            return;
        }
        regs.modify(Reg::DmaCfg, |v| v | dmacfg::DMAEN);
        self.state = DmaState::Running;
    }

    /// Fold interrupt status into the running transfer.
    ///
    /// Finishes the transfer on DMA error, on DCMP for a read, or on XCMPRF
    /// for a write. Returns the completion when it has a callback to run;
    /// otherwise the completion is parked.
    pub(crate) fn on_interrupt<R: IosRegisterBlock>(
        &mut self,
        regs: &mut R,
        module: u8,
        status: IntStatus,
    ) -> Option<(DmaCallback, DmaCompletion)> {
        let direction = self.in_flight.as_ref()?.direction;
        let txn = status | IntStatus::from_bits_truncate(regs.read(Reg::IntStat));
        let errored = txn.contains(IntStatus::DERR);
        let done = errored
            || match direction {
                DmaDirection::Read => txn.contains(IntStatus::DCMP),
                DmaDirection::Write => txn.contains(IntStatus::XCMPRF),
            };
        if !done {
            return None;
        }

        let flight = self.in_flight.take()?;
        let remaining = dmatotcount::TOTCOUNT.get(regs.read(Reg::DmaTotCount));
        let bytes_transferred = flight.requested.saturating_sub(remaining);
        let result = TransferError::from_status(txn).map_or(Ok(()), Err);
        if errored {
            clear_error(regs);
        }
        teardown(regs);
        self.state = DmaState::Idle;

        match result {
            Ok(()) => debug!("ios{}: dma {:?} done, {} bytes", module, direction, bytes_transferred),
            Err(err) => warn!("ios{}: dma {:?} failed: {:?}", module, direction, err),
        }

        let completion = DmaCompletion {
            module,
            direction,
            result,
            bytes_transferred,
            buffer: flight.buffer,
            context: flight.context,
        };
        match flight.callback {
            Some(callback) => Some((callback, completion)),
            None => {
                self.park(completion);
                None
            }
        }
    }

    /// Tear down an in-flight transfer without a completion.
    ///
    /// Returns the buffer, or `None` if nothing was in flight.
    pub(crate) fn abort<R: IosRegisterBlock>(&mut self, regs: &mut R) -> Option<TransferBuffer> {
        let flight = self.in_flight.take()?;
        teardown(regs);
        self.state = DmaState::Idle;
        Some(flight.buffer)
    }

    pub(crate) fn take_completion(&mut self) -> Option<DmaCompletion> {
        self.parked.pop_front()
    }

    fn park(&mut self, completion: DmaCompletion) {
        if self.parked.is_full() {
            warn!("ios{}: dropping unclaimed dma completion", completion.module);
            let _ = self.parked.pop_front();
        }
        let _ = self.parked.push_back(completion);
    }
}

/// Disable the engine and clear its error flags
fn clear_error<R: IosRegisterBlock>(regs: &mut R) {
    regs.write(Reg::DmaCfg, 0);
    regs.modify(Reg::DmaStat, |v| v & !(dmastat::DMAERR | dmastat::DMAUNDFL));
}

/// Return the engine to its reset configuration
fn teardown<R: IosRegisterBlock>(regs: &mut R) {
    regs.write(Reg::DmaCfg, 0);
    regs.write(Reg::DmaStat, 0);
    regs.write(Reg::DmaTotCount, 0);
    regs.write(Reg::DmaTargAddr, 0);
}
