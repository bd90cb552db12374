//! FIFO and DMA driver for the Apollo IO Slave (IOS) peripheral
//!
//! The IO Slave lets the MCU act as an SPI or I2C device to an external host.
//! The host addresses a 256-byte local RAM window (LRAM) that is split into a
//! direct-access region and a hardware FIFO. This crate keeps that FIFO fed
//! from a larger software ring buffer and drives the peripheral's DMA engine
//! for bulk transfers.
//!
//! # Architecture Layers
//!
//! ```text
//! IosManager (instance registry, public operations)
//!         ↓
//! service (ISR flow control)   dma (transfer engine)   control (host registers)
//!         ↓
//! ring (SRAM ring buffer)  →  fifo (LRAM FIFO window)
//!         ↓
//! IosRegisterBlock (Mmio on hardware, sim::SimIos on the host)
//! ```
//!
//! Foreground code and the peripheral interrupt share instance state through
//! [`critical_section::Mutex`]; no operation blocks except
//! [`Request::ReadPoll`], which spins on the host-read flag.
//! [`IosManager::wait_host_read`] is its async counterpart.
//!
//! # Features
//!
//! - `defmt`: defmt logging and `defmt::Format` derives (hardware builds)
//! - `tracing`: tracing logging (host builds)
//! - `std`: reserved for host tooling
//!
//! # Example
//!
//! ```no_run
//! use io_slave::{IosConfig, IosManager, IntStatus, Mmio};
//!
//! fn bring_up(manager: &IosManager<Mmio>) -> Result<(), io_slave::IosError> {
//!     let ios = manager.initialize(0)?;
//!     manager.configure(ios, IosConfig::default())?;
//!     manager.interrupt_enable(ios, IntStatus::FSIZE)?;
//!     manager.fifo_write(ios, b"hello host")?;
//!     Ok(())
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware driver crate:
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)] // register accessors; callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
mod log;

pub mod config;
pub mod control;
pub mod dma;
pub mod error;
pub mod fifo;
mod instance;
pub mod manager;
pub mod power;
pub mod regs;
pub mod ring;
mod service;
pub mod sim;

// Re-export the driver entry points
pub use manager::{FullDuplexHandle, IosHandle, IosManager};

// Re-export configuration types
pub use config::{BitOrder, Interface, IosConfig, SpiMode};

// Re-export error types
pub use error::{IosError, PowerError, TransferError};

// Re-export control types
pub use control::Request;

// Re-export DMA types
pub use dma::{
    DmaCallback, DmaCompletion, DmaDirection, DmaState, Leg, Priority, Transfer, TransferBuffer,
    TransferDirection,
};

// Re-export power types
pub use power::{ClockId, ClockUser, Peripheral, PowerManager, PowerState, RegisterSnapshot};

// Re-export register types
pub use regs::{IntStatus, IosRegisterBlock, Mmio, Reg};

// Re-export buffer types
pub use fifo::HwFifo;
pub use ring::RingBuffer;
