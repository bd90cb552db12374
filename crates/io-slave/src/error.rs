//! Error types
//!
//! [`IosError`] is returned synchronously by driver entry points.
//! [`TransferError`] is delivered asynchronously in a [`DmaCompletion`]
//! when the interrupt handler finishes a transfer with a hardware data error.
//!
//! [`DmaCompletion`]: crate::dma::DmaCompletion

use crate::regs::IntStatus;

/// Driver operation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IosError {
    /// Handle does not refer to a live, initialized instance
    #[error("invalid or stale IOS handle")]
    InvalidHandle,
    /// Malformed argument (missing buffer, bad layout, unsupported mode)
    #[error("invalid argument")]
    InvalidArgument,
    /// Operation not allowed in the current state
    #[error("operation not allowed in current state")]
    InvalidOperation,
    /// A DMA transaction is already in flight
    #[error("DMA transaction already in flight")]
    InUse,
    /// Module index beyond the number of IOS instances
    #[error("module index out of range")]
    OutOfRange,
    /// Clock or power collaborator failed
    #[error("power manager: {0}")]
    Power(#[from] PowerError),
}

/// Hardware data error reported for a finished DMA transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// Host wrote into a full FIFO
    #[error("FIFO overflow")]
    FifoOverflow,
    /// Host read from an empty FIFO
    #[error("FIFO underflow")]
    FifoUnderflow,
    /// Host read from the FIFO region out of order
    #[error("FIFO read error")]
    FifoReadError,
    /// DMA engine error
    #[error("DMA error")]
    DmaError,
}

impl TransferError {
    /// Map accumulated interrupt status to the highest-priority data error.
    ///
    /// Priority order is overflow, underflow, read error, DMA error; the
    /// first matching condition wins.
    pub fn from_status(status: IntStatus) -> Option<Self> {
        if status.contains(IntStatus::FOVFL) {
            Some(Self::FifoOverflow)
        } else if status.contains(IntStatus::FUNDFL) {
            Some(Self::FifoUnderflow)
        } else if status.contains(IntStatus::FRDERR) {
            Some(Self::FifoReadError)
        } else if status.contains(IntStatus::DERR) {
            Some(Self::DmaError)
        } else {
            None
        }
    }
}

/// Clock/power collaborator error
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerError {
    /// Peripheral power domain could not be switched
    #[error("peripheral power switch failed")]
    PeripheralFailed,
    /// Clock source could not be requested or released
    #[error("clock request failed")]
    ClockFailed,
}
