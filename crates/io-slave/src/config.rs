//! Configuration surface and memory-map constants
//!
//! The 256-byte LRAM window is split into four consecutive regions, each
//! starting on an 8-byte boundary:
//!
//! ```text
//! 0x00        ro_base        fifo_base        ram_base        0x100
//!  | direct R/W | host read-only | hardware FIFO  | direct R/W     |
//! ```

use crate::error::IosError;
use crate::regs::{cfg, fifocfg};

/// Largest software ring plus hardware FIFO the host-visible counter can address
pub const MAX_SW_FIFO_SIZE: usize = 1023;

/// LRAM window size in bytes
pub const LRAM_SIZE: usize = 0x100;

/// Granularity of the LRAM region offsets
pub const LRAM_ALIGN: usize = 8;

/// Pad byte the full-duplex write engine sends once its buffer is exhausted
pub const FD_PAD_BYTE: u8 = 0x5A;

/// Number of IOS instances
pub const NUM_MODULES: usize = 3;

/// Instance driven as the forced-write half of a full-duplex pair
pub const IOSFD_WR: u8 = 1;

/// Instance driven as the forced-read half of a full-duplex pair
pub const IOSFD_RD: u8 = 2;

/// Peripheral window of IOS instance 0 on Apollo3-class parts
pub const IOS0_BASE: usize = 0x5000_0000;

/// SPI modes (CPOL, CPHA)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

/// Bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// Host bus electrical interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interface {
    /// SPI slave
    Spi {
        /// Clock polarity / phase
        mode: SpiMode,
    },
    /// I2C slave (instance 0 only)
    I2c {
        /// 7-bit slave address
        address: u8,
    },
}

impl Interface {
    /// True for the I2C interface
    pub const fn is_i2c(&self) -> bool {
        matches!(self, Interface::I2c { .. })
    }

    /// CFG register bits selecting this interface
    #[allow(clippy::arithmetic_side_effects)] // Safety: 7-bit address shifted by one fits in u32
    pub fn cfg_bits(&self) -> u32 {
        match *self {
            Interface::Spi { mode } => {
                let spol = match mode {
                    SpiMode::Mode1 | SpiMode::Mode2 => cfg::SPOL,
                    SpiMode::Mode0 | SpiMode::Mode3 => 0,
                };
                cfg::IFCSEL | spol
            }
            Interface::I2c { address } => cfg::I2CADDR.val(u32::from(address) << 1),
        }
    }
}

/// Instance configuration applied by [`IosManager::configure`]
///
/// [`IosManager::configure`]: crate::IosManager::configure
#[derive(Debug)]
pub struct IosConfig {
    /// Electrical interface
    pub interface: Interface,
    /// Bit order on the wire
    pub bit_order: BitOrder,
    /// Start of the host read-only region
    pub ro_base: u8,
    /// Start of the hardware FIFO
    pub fifo_base: u8,
    /// End of the hardware FIFO, start of the RAM region
    pub ram_base: u16,
    /// FSIZE interrupt threshold in bytes
    pub fifo_threshold: u8,
    /// Wrap the host RAM pointer back into the FIFO
    pub wrap: bool,
    /// Software ring storage; clipped so ring plus FIFO stays addressable
    pub ring: Option<&'static mut [u8]>,
}

impl Default for IosConfig {
    /// SPI mode 0, read-only region at 0x78, FIFO `0x80..0x100`, threshold 32.
    fn default() -> Self {
        Self {
            interface: Interface::Spi {
                mode: SpiMode::Mode0,
            },
            bit_order: BitOrder::MsbFirst,
            ro_base: 0x78,
            fifo_base: 0x80,
            ram_base: 0x100,
            fifo_threshold: 0x20,
            wrap: false,
            ring: None,
        }
    }
}

impl IosConfig {
    /// Check the LRAM layout: `ro_base <= fifo_base < ram_base <= LRAM_SIZE`,
    /// every offset a multiple of [`LRAM_ALIGN`].
    #[allow(clippy::arithmetic_side_effects)] // Safety: % by a non-zero constant
    pub fn validate_layout(&self) -> Result<(), IosError> {
        let ro = usize::from(self.ro_base);
        let fifo = usize::from(self.fifo_base);
        let ram = usize::from(self.ram_base);
        let aligned = [ro, fifo, ram].iter().all(|off| off % LRAM_ALIGN == 0);
        if !aligned || ro > fifo || fifo >= ram || ram > LRAM_SIZE {
            return Err(IosError::InvalidArgument);
        }
        Ok(())
    }

    /// Hardware FIFO size in bytes
    pub fn fifo_size(&self) -> usize {
        usize::from(self.ram_base).saturating_sub(usize::from(self.fifo_base))
    }

    /// FIFOCFG register value for this layout
    #[allow(clippy::arithmetic_side_effects)] // Safety: right shifts of u8/u16 widened to u32
    pub fn fifocfg_bits(&self) -> u32 {
        fifocfg::ROBASE.val(u32::from(self.ro_base) >> 3)
            | fifocfg::FIFOBASE.val(u32::from(self.fifo_base) >> 3)
            | fifocfg::FIFOMAX.val(u32::from(self.ram_base) >> 3)
    }

    /// CFG register value (without the enable bit)
    pub fn cfg_bits(&self) -> u32 {
        let lsb = match self.bit_order {
            BitOrder::LsbFirst => cfg::LSB,
            BitOrder::MsbFirst => 0,
        };
        self.interface.cfg_bits() | lsb
    }
}

/// Largest ring capacity that keeps `ring + hw_fifo <= MAX_SW_FIFO_SIZE + 1`
pub fn clip_ring_capacity(requested: usize, hw_fifo_size: usize) -> usize {
    let limit = (MAX_SW_FIFO_SIZE.saturating_add(1)).saturating_sub(hw_fifo_size);
    requested.min(limit)
}
