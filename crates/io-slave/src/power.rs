//! Power management collaborator
//!
//! The IOS does not own its power domain or clock source. Both are switched
//! through a board-provided [`PowerManager`]; clock requests are reference
//! counted by the implementation and identified by a consumer id.

use crate::error::PowerError;
use crate::regs::{IosRegisterBlock, Reg};

/// Clock/power facility shared with the rest of the SoC
pub trait PowerManager {
    /// Power the peripheral domain up
    fn enable_peripheral(&mut self, peripheral: Peripheral) -> Result<(), PowerError>;

    /// Power the peripheral domain down
    fn disable_peripheral(&mut self, peripheral: Peripheral) -> Result<(), PowerError>;

    /// Take a reference on a clock source
    fn request_clock(&mut self, clock: ClockId, user: ClockUser) -> Result<(), PowerError>;

    /// Drop a reference on a clock source
    fn release_clock(&mut self, clock: ClockId, user: ClockUser) -> Result<(), PowerError>;
}

/// Requested power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    /// Powered and clocked
    Wake,
    /// Powered down, CPU in normal sleep
    NormalSleep,
    /// Powered down, CPU in deep sleep
    DeepSleep,
}

/// Peripheral power domains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    /// IOS instance by module index
    Ios(u8),
}

/// Clock sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockId {
    /// High frequency RC oscillator
    Hfrc,
}

/// Clock consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockUser {
    /// IOS instance by module index
    Ios(u8),
}

/// Configuration registers kept across a power-down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterSnapshot {
    /// FIFOCFG
    pub fifocfg: u32,
    /// FIFOTHR
    pub fifothr: u32,
    /// CFG
    pub cfg: u32,
    /// DMACFG
    pub dmacfg: u32,
    /// INTEN
    pub inten: u32,
    /// REGACCINTEN
    pub regaccinten: u32,
}

impl RegisterSnapshot {
    /// Read the retained registers
    pub fn capture<R: IosRegisterBlock>(regs: &R) -> Self {
        Self {
            fifocfg: regs.read(Reg::FifoCfg),
            fifothr: regs.read(Reg::FifoThr),
            cfg: regs.read(Reg::Cfg),
            dmacfg: regs.read(Reg::DmaCfg),
            inten: regs.read(Reg::IntEn),
            regaccinten: regs.read(Reg::RegAccIntEn),
        }
    }

    /// Write the retained registers back
    pub fn restore<R: IosRegisterBlock>(&self, regs: &mut R) {
        regs.write(Reg::FifoCfg, self.fifocfg);
        regs.write(Reg::FifoThr, self.fifothr);
        regs.write(Reg::Cfg, self.cfg);
        regs.write(Reg::DmaCfg, self.dmacfg);
        regs.write(Reg::IntEn, self.inten);
        regs.write(Reg::RegAccIntEn, self.regaccinten);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimIos, SimState};
    use core::cell::RefCell;

    #[test]
    fn test_snapshot_round_trips_through_power_cycle() {
        let state = RefCell::new(SimState::new());
        let mut regs = SimIos::new(&state);
        regs.write(Reg::FifoCfg, 0x0F00_2010);
        regs.write(Reg::FifoThr, 0x20);
        regs.write(Reg::Cfg, 0x8000_0001);
        regs.write(Reg::IntEn, 0x41);
        regs.write(Reg::RegAccIntEn, 0xF0);

        let snapshot = RegisterSnapshot::capture(&regs);
        state.borrow_mut().power_cycle();
        assert_eq!(state.borrow().reg(Reg::FifoThr), 0);

        snapshot.restore(&mut regs);
        assert_eq!(RegisterSnapshot::capture(&regs), snapshot);
    }
}
