//! IOS register map
//!
//! Offsets are relative to the start of the peripheral window. The first
//! 256 bytes of the window are the host-visible LRAM; the control registers
//! start at `0x100`.
//!
//! Register access goes through [`IosRegisterBlock`] so the driver logic runs
//! unchanged against real hardware ([`Mmio`]) and against the host simulator
//! ([`crate::sim::SimIos`]).

/// IOS control and status registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reg {
    /// Current host FIFO read pointer and FIFO occupancy
    FifoPtr,
    /// FIFO / read-only / RAM region layout
    FifoCfg,
    /// FIFO size interrupt threshold
    FifoThr,
    /// FIFO update bracket and host-read-in-progress flag
    Fupd,
    /// Overall FIFO byte counter presented to the host
    FifoCtr,
    /// FIFO counter increment
    FifoInc,
    /// Interface configuration and enable
    Cfg,
    /// I2C address match enable
    Prenc,
    /// Host interrupt control
    IoIntCtl,
    /// General address data
    GenAdd,
    /// Interrupt enable
    IntEn,
    /// Interrupt status
    IntStat,
    /// Interrupt clear (write one to clear)
    IntClr,
    /// Interrupt set (write one to set)
    IntSet,
    /// Register access interrupt enable
    RegAccIntEn,
    /// Register access interrupt status
    RegAccIntStat,
    /// Register access interrupt clear
    RegAccIntClr,
    /// Register access interrupt set
    RegAccIntSet,
    /// DMA target address
    DmaTargAddr,
    /// DMA total byte count (decrements while the transfer runs)
    DmaTotCount,
    /// DMA configuration
    DmaCfg,
    /// DMA status
    DmaStat,
}

impl Reg {
    /// Number of registers in the map
    pub const COUNT: usize = 22;

    /// Every register, in [`Reg::index`] order
    pub const ALL: [Reg; Reg::COUNT] = [
        Reg::FifoPtr,
        Reg::FifoCfg,
        Reg::FifoThr,
        Reg::Fupd,
        Reg::FifoCtr,
        Reg::FifoInc,
        Reg::Cfg,
        Reg::Prenc,
        Reg::IoIntCtl,
        Reg::GenAdd,
        Reg::IntEn,
        Reg::IntStat,
        Reg::IntClr,
        Reg::IntSet,
        Reg::RegAccIntEn,
        Reg::RegAccIntStat,
        Reg::RegAccIntClr,
        Reg::RegAccIntSet,
        Reg::DmaTargAddr,
        Reg::DmaTotCount,
        Reg::DmaCfg,
        Reg::DmaStat,
    ];

    /// Byte offset from the peripheral base
    pub const fn offset(self) -> usize {
        match self {
            Reg::FifoPtr => 0x100,
            Reg::FifoCfg => 0x104,
            Reg::FifoThr => 0x108,
            Reg::Fupd => 0x10C,
            Reg::FifoCtr => 0x110,
            Reg::FifoInc => 0x114,
            Reg::Cfg => 0x118,
            Reg::Prenc => 0x11C,
            Reg::IoIntCtl => 0x120,
            Reg::GenAdd => 0x124,
            Reg::IntEn => 0x200,
            Reg::IntStat => 0x204,
            Reg::IntClr => 0x208,
            Reg::IntSet => 0x20C,
            Reg::RegAccIntEn => 0x210,
            Reg::RegAccIntStat => 0x214,
            Reg::RegAccIntClr => 0x218,
            Reg::RegAccIntSet => 0x21C,
            Reg::DmaTargAddr => 0x220,
            Reg::DmaTotCount => 0x224,
            Reg::DmaCfg => 0x228,
            Reg::DmaStat => 0x22C,
        }
    }

    /// Dense index in `0..Reg::COUNT`
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Multi-bit register field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    shift: u32,
    width: u32,
}

#[allow(clippy::arithmetic_side_effects)] // Safety: fields are declared below with 1 <= width and shift + width <= 32
impl Field {
    /// Declare a field of `width` bits starting at bit `shift`
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// In-place mask of the field
    pub const fn mask(self) -> u32 {
        (u32::MAX >> (32 - self.width)) << self.shift
    }

    /// Extract the field from a register value
    pub const fn get(self, reg: u32) -> u32 {
        (reg & self.mask()) >> self.shift
    }

    /// Encode `value` into field position, truncating to the field width
    pub const fn val(self, value: u32) -> u32 {
        (value << self.shift) & self.mask()
    }

    /// Replace the field inside `reg` with `value`
    pub const fn set(self, reg: u32, value: u32) -> u32 {
        (reg & !self.mask()) | self.val(value)
    }
}

/// FIFOPTR fields
pub mod fifoptr {
    use super::Field;
    /// Host read pointer (LRAM offset)
    pub const FIFOPTR: Field = Field::new(0, 8);
    /// Bytes currently held in the hardware FIFO
    pub const FIFOSIZ: Field = Field::new(8, 8);
}

/// FIFOCFG fields (all values are LRAM offsets divided by 8)
pub mod fifocfg {
    use super::Field;
    /// FIFO region start
    pub const FIFOBASE: Field = Field::new(0, 5);
    /// FIFO region end, start of the RAM region
    pub const FIFOMAX: Field = Field::new(8, 6);
    /// Read-only region start
    pub const ROBASE: Field = Field::new(24, 6);
}

/// FIFOTHR fields
pub mod fifothr {
    use super::Field;
    /// FSIZE interrupt threshold
    pub const FIFOTHR: Field = Field::new(0, 8);
}

/// FUPD bits
pub mod fupd {
    /// FIFO pointer update in progress
    pub const FIFOUPD: u32 = 0x0000_0001;
    /// Host read of the FIFO in progress
    pub const IOREAD: u32 = 0x0000_0002;
}

/// FIFOCTR fields
pub mod fifoctr {
    use super::Field;
    /// Virtual FIFO byte count presented to the host
    pub const FIFOCTR: Field = Field::new(0, 10);
}

/// CFG fields
pub mod cfg {
    use super::Field;
    /// Interface select: set for SPI, clear for I2C
    pub const IFCSEL: u32 = 0x0000_0001;
    /// SPI polarity (modes 1 and 2)
    pub const SPOL: u32 = 0x0000_0002;
    /// Least significant bit first
    pub const LSB: u32 = 0x0000_0004;
    /// Wrap the RAM pointer back to the FIFO base
    pub const WRAPPTR: u32 = 0x0000_0008;
    /// Start the host read at the rising edge
    pub const STARTRD: u32 = 0x0000_0010;
    /// I2C slave address (8-bit form)
    pub const I2CADDR: Field = Field::new(8, 11);
    /// Interface enable
    pub const IFCEN: u32 = 0x8000_0000;
}

/// IOINTCTL fields
pub mod iointctl {
    use super::Field;
    /// Host-side interrupt enables
    pub const IOINTEN: Field = Field::new(0, 8);
    /// Pending host interrupts
    pub const IOINT: Field = Field::new(8, 8);
    /// Write 1 to clear all pending host interrupts
    pub const IOINTCLR: Field = Field::new(16, 1);
    /// Raise host interrupts
    pub const IOINTSET: Field = Field::new(24, 8);
}

/// GENADD fields
pub mod genadd {
    use super::Field;
    /// Last general-address data byte
    pub const GADATA: Field = Field::new(0, 8);
}

/// DMACFG fields
pub mod dmacfg {
    use super::Field;
    /// DMA enable
    pub const DMAEN: u32 = 0x0000_0001;
    /// Direction: set for memory to peripheral
    pub const DMADIR: u32 = 0x0000_0002;
    /// High priority
    pub const DMAPRI: u32 = 0x0000_0100;
    /// Quad-byte bus accesses
    pub const DMAQUAD: u32 = 0x0000_0200;
    /// Force DMA regardless of host direction
    pub const FRCDMA: u32 = 0x0001_0000;
    /// Forced direction: set for write, clear for read
    pub const FRCRDWRT: u32 = 0x0002_0000;
    /// Pad byte enable
    pub const PADBYTEEN: u32 = 0x0004_0000;
    /// Pad byte value
    pub const PADBYTE: Field = Field::new(24, 8);
}

/// DMATOTCOUNT fields
pub mod dmatotcount {
    use super::Field;
    /// Remaining byte count
    pub const TOTCOUNT: Field = Field::new(0, 20);
}

/// DMASTAT bits
pub mod dmastat {
    /// Transfer in progress
    pub const DMATIP: u32 = 0x0000_0001;
    /// Transfer complete
    pub const DMACPL: u32 = 0x0000_0002;
    /// DMA error
    pub const DMAERR: u32 = 0x0000_0004;
    /// DMA underflow
    pub const DMAUNDFL: u32 = 0x0000_0008;
}

bitflags::bitflags! {
    /// IOS interrupt sources (INTEN / INTSTAT / INTCLR / INTSET)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IntStatus: u32 {
        /// FIFO occupancy at or below threshold
        const FSIZE = 0x0001;
        /// FIFO overflow
        const FOVFL = 0x0002;
        /// FIFO underflow
        const FUNDFL = 0x0004;
        /// FIFO read error
        const FRDERR = 0x0008;
        /// General address data written
        const GENAD = 0x0010;
        /// Host wrote the IOINTCTL register
        const IOINTW = 0x0020;
        /// Host read of the FIFO region completed
        const XCMPRF = 0x0040;
        /// Host read of the register region completed
        const XCMPRR = 0x0080;
        /// Host write to the FIFO region completed
        const XCMPWF = 0x0100;
        /// Host write to the register region completed
        const XCMPWR = 0x0200;
        /// DMA transfer complete
        const DCMP = 0x0400;
        /// DMA error
        const DERR = 0x0800;
    }
}

/// Register-level access to one IOS instance
pub trait IosRegisterBlock {
    /// Read a control register
    fn read(&self, reg: Reg) -> u32;

    /// Write a control register
    fn write(&mut self, reg: Reg, value: u32);

    /// Write one byte of LRAM at `offset` (`0..LRAM_SIZE`)
    fn write_lram(&mut self, offset: usize, byte: u8);

    /// Read-modify-write a control register
    fn modify(&mut self, reg: Reg, f: impl FnOnce(u32) -> u32) {
        let value = f(self.read(reg));
        self.write(reg, value);
    }
}

/// Memory-mapped IOS instance
#[derive(Debug)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Wrap the peripheral window starting at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the LRAM start address of an IOS instance on the running
    /// device, and no other `Mmio` for the same instance may exist.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Peripheral base address
    pub const fn base(&self) -> usize {
        self.base
    }

    fn addr(&self, offset: usize) -> usize {
        self.base.wrapping_add(offset)
    }
}

impl IosRegisterBlock for Mmio {
    fn read(&self, reg: Reg) -> u32 {
        let ptr = self.addr(reg.offset()) as *const u32;
        // SAFETY: `Mmio::new` guarantees `base` maps an IOS instance; every
        // `Reg` offset is a word-aligned register inside that window.
        unsafe { core::ptr::read_volatile(ptr) }
    }

    fn write(&mut self, reg: Reg, value: u32) {
        let ptr = self.addr(reg.offset()) as *mut u32;
        // SAFETY: see `read`; `&mut self` serializes writers to this instance.
        unsafe { core::ptr::write_volatile(ptr, value) }
    }

    fn write_lram(&mut self, offset: usize, byte: u8) {
        if offset >= crate::config::LRAM_SIZE {
            return;
        }
        let ptr = self.addr(offset) as *mut u8;
        // SAFETY: `offset` is inside the 256-byte LRAM at the start of the window.
        unsafe { core::ptr::write_volatile(ptr, byte) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (i, reg) in Reg::ALL.iter().enumerate() {
            assert_eq!(reg.index(), i);
        }
    }

    #[test]
    fn test_offsets_are_word_aligned_and_above_lram() {
        for reg in Reg::ALL {
            assert_eq!(reg.offset() % 4, 0);
            assert!(reg.offset() >= crate::config::LRAM_SIZE);
        }
    }

    #[test]
    fn test_field_mask_and_extract() {
        assert_eq!(fifoptr::FIFOSIZ.mask(), 0x0000_FF00);
        assert_eq!(fifoptr::FIFOSIZ.get(0x0000_2A10), 0x2A);
        assert_eq!(fifocfg::ROBASE.val(0x78 >> 3), 0x0F00_0000);
        assert_eq!(dmatotcount::TOTCOUNT.mask(), 0x000F_FFFF);
    }

    #[test]
    fn test_field_val_truncates() {
        assert_eq!(fifocfg::FIFOBASE.val(0xFF), 0x1F);
    }

    #[test]
    fn test_field_set_preserves_other_bits() {
        let reg = 0xDEAD_0010;
        let updated = fifoptr::FIFOSIZ.set(reg, 0x42);
        assert_eq!(updated, 0xDEAD_4210);
    }
}
