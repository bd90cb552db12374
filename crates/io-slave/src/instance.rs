//! Per-instance driver state
//!
//! One [`Instance`] exists for every initialized IOS module. It is only ever
//! touched inside a critical section, from the foreground or from the ISR.

use crate::config::{clip_ring_capacity, IosConfig};
use crate::dma::DmaEngine;
use crate::error::IosError;
use crate::fifo::HwFifo;
use crate::power::{ClockId, ClockUser, Peripheral, PowerManager, PowerState, RegisterSnapshot};
use crate::regs::{cfg, fifoctr, fifoptr, fifothr, IosRegisterBlock, Reg};
use crate::ring::RingBuffer;

#[derive(Debug)]
pub(crate) struct Instance {
    pub(crate) module: u8,
    pub(crate) enabled: bool,
    pub(crate) ring: RingBuffer<'static>,
    pub(crate) fifo: HwFifo,
    pub(crate) snapshot: Option<RegisterSnapshot>,
    pub(crate) dma: DmaEngine,
}

impl Instance {
    pub(crate) const fn new(module: u8) -> Self {
        Self {
            module,
            enabled: false,
            ring: RingBuffer::empty(),
            fifo: HwFifo::new(0, 0),
            snapshot: None,
            dma: DmaEngine::new(),
        }
    }

    /// Apply `config` and enable the interface.
    ///
    /// Rejected while enabled. Secondary instances only support SPI. The ring
    /// storage is clipped so ring plus FIFO stays within what FIFOCTR can count.
    pub(crate) fn configure<R: IosRegisterBlock>(
        &mut self,
        regs: &mut R,
        config: IosConfig,
    ) -> Result<(), IosError> {
        if self.enabled {
            return Err(IosError::InvalidOperation);
        }
        if self.module > 0 && config.interface.is_i2c() {
            return Err(IosError::InvalidArgument);
        }
        config.validate_layout()?;

        let fifo_base = usize::from(config.fifo_base);
        let fifo_end = usize::from(config.ram_base);
        let fifocfg = config.fifocfg_bits();
        let cfg_bits = config.cfg_bits();
        let requested = config.ring.as_deref().map_or(0, <[u8]>::len);
        let capacity = clip_ring_capacity(requested, config.fifo_size());
        self.ring = RingBuffer::new(config.ring, capacity);
        self.fifo = HwFifo::new(fifo_base, fifo_end);

        self.disable(regs);
        regs.write(Reg::Cfg, cfg_bits);
        regs.write(Reg::FifoCfg, fifocfg);
        regs.modify(Reg::FifoCtr, |v| fifoctr::FIFOCTR.set(v, 0));
        regs.modify(Reg::FifoPtr, |v| fifoptr::FIFOSIZ.set(v, 0));
        self.fifo.set_pointer(regs, fifo_base)?;
        if config.wrap {
            regs.modify(Reg::Cfg, |v| v | cfg::WRAPPTR);
        }
        // FIFO pointer and threshold only take effect with the interface enabled.
        self.enable(regs);
        self.fifo.set_pointer(regs, fifo_base)?;
        regs.write(
            Reg::FifoThr,
            fifothr::FIFOTHR.val(u32::from(config.fifo_threshold)),
        );

        debug!(
            "ios{}: configured, fifo {} bytes, ring {} bytes",
            self.module,
            self.fifo.size(),
            self.ring.capacity()
        );
        Ok(())
    }

    pub(crate) fn enable<R: IosRegisterBlock>(&mut self, regs: &mut R) {
        regs.modify(Reg::Cfg, |v| v | cfg::IFCEN);
        self.enabled = true;
        debug!("ios{}: enabled", self.module);
    }

    pub(crate) fn disable<R: IosRegisterBlock>(&mut self, regs: &mut R) {
        regs.modify(Reg::Cfg, |v| v & !cfg::IFCEN);
        self.enabled = false;
        debug!("ios{}: disabled", self.module);
    }

    /// Ring bytes plus hardware FIFO occupancy
    #[allow(clippy::arithmetic_side_effects)] // Safety: both terms are bounded by MAX_SW_FIFO_SIZE
    pub(crate) fn space_used<R: IosRegisterBlock>(&self, regs: &R) -> usize {
        self.ring.len() + HwFifo::occupancy(regs)
    }

    /// Ring free space plus FIFO free space (one FIFO byte stays reserved)
    pub(crate) fn space_left<R: IosRegisterBlock>(&self, regs: &R) -> usize {
        self.ring
            .capacity()
            .saturating_add(self.fifo.size())
            .saturating_sub(1)
            .saturating_sub(self.space_used(regs))
    }

    /// Move between wake and sleep, optionally keeping the configuration
    /// registers across the power-down.
    ///
    /// Waking with `retain` requires a snapshot saved by an earlier
    /// sleep with `retain`.
    pub(crate) fn power_control<R: IosRegisterBlock, P: PowerManager>(
        &mut self,
        regs: &mut R,
        state: PowerState,
        retain: bool,
        power: &mut P,
    ) -> Result<(), IosError> {
        let peripheral = Peripheral::Ios(self.module);
        let user = ClockUser::Ios(self.module);
        match state {
            PowerState::Wake => {
                if retain && self.snapshot.is_none() {
                    return Err(IosError::InvalidOperation);
                }
                power.enable_peripheral(peripheral)?;
                if retain {
                    if let Some(snapshot) = self.snapshot.take() {
                        snapshot.restore(regs);
                    }
                }
                power.request_clock(ClockId::Hfrc, user)?;
            }
            PowerState::NormalSleep | PowerState::DeepSleep => {
                if retain {
                    self.snapshot = Some(RegisterSnapshot::capture(regs));
                }
                power.disable_peripheral(peripheral)?;
                power.release_clock(ClockId::Hfrc, user)?;
            }
        }
        debug!("ios{}: power {:?}, retain {:?}", self.module, state, retain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Interface, SpiMode};
    use crate::sim::{MockPower, SimIos, SimState};
    use core::cell::RefCell;

    #[test]
    fn test_configure_programs_layout_and_enables() {
        let state = RefCell::new(SimState::new());
        let mut regs = SimIos::new(&state);
        let mut inst = Instance::new(0);
        assert!(inst.configure(&mut regs, IosConfig::default()).is_ok());
        let state = state.borrow();
        assert_eq!(state.reg(Reg::FifoCfg), 0x0F00_2010);
        assert_eq!(state.reg(Reg::FifoThr), 0x20);
        assert_ne!(state.reg(Reg::Cfg) & cfg::IFCEN, 0);
        assert_ne!(state.reg(Reg::Cfg) & cfg::IFCSEL, 0);
        assert_eq!(fifoptr::FIFOPTR.get(state.reg(Reg::FifoPtr)), 0x80);
        assert!(inst.enabled);
    }

    #[test]
    fn test_configure_sets_wrap_bit() {
        let state = RefCell::new(SimState::new());
        let mut regs = SimIos::new(&state);
        let mut inst = Instance::new(0);
        let config = IosConfig {
            wrap: true,
            ..IosConfig::default()
        };
        assert!(inst.configure(&mut regs, config).is_ok());
        assert_ne!(state.borrow().reg(Reg::Cfg) & cfg::WRAPPTR, 0);
    }

    #[test]
    fn test_configure_clips_ring() {
        let state = RefCell::new(SimState::new());
        let mut regs = SimIos::new(&state);
        let mut inst = Instance::new(0);
        let storage: &'static mut [u8] = Box::leak(vec![0u8; 2048].into_boxed_slice());
        let config = IosConfig {
            ring: Some(storage),
            ..IosConfig::default()
        };
        assert!(inst.configure(&mut regs, config).is_ok());
        assert_eq!(inst.ring.capacity() + inst.fifo.size(), 1024);
    }

    #[test]
    fn test_secondary_instance_rejects_i2c_before_touching_registers() {
        let state = RefCell::new(SimState::new());
        let mut regs = SimIos::new(&state);
        let mut inst = Instance::new(1);
        let config = IosConfig {
            interface: Interface::I2c { address: 0x20 },
            ..IosConfig::default()
        };
        assert_eq!(
            inst.configure(&mut regs, config),
            Err(IosError::InvalidArgument)
        );
        assert_eq!(state.borrow().reg(Reg::Cfg), 0);
    }

    #[test]
    fn test_secondary_instance_accepts_spi() {
        let state = RefCell::new(SimState::new());
        let mut regs = SimIos::new(&state);
        let mut inst = Instance::new(2);
        let config = IosConfig {
            interface: Interface::Spi {
                mode: SpiMode::Mode3,
            },
            ..IosConfig::default()
        };
        assert!(inst.configure(&mut regs, config).is_ok());
    }

    #[test]
    fn test_space_left_accounts_reserved_byte() {
        let state = RefCell::new(SimState::new());
        let mut regs = SimIos::new(&state);
        let mut inst = Instance::new(0);
        let storage: &'static mut [u8] = Box::leak(vec![0u8; 100].into_boxed_slice());
        let config = IosConfig {
            ring: Some(storage),
            ..IosConfig::default()
        };
        assert!(inst.configure(&mut regs, config).is_ok());
        assert_eq!(inst.space_left(&regs), 100 + 0x80 - 1);
        inst.fifo.push(&mut regs, &[0; 10]);
        inst.ring.write(&[0; 5]);
        assert_eq!(inst.space_used(&regs), 15);
        assert_eq!(inst.space_left(&regs), 100 + 0x80 - 1 - 15);
    }

    #[test]
    fn test_wake_releases_nothing_on_power_failure() {
        let state = RefCell::new(SimState::new());
        let mut regs = SimIos::new(&state);
        let mut inst = Instance::new(0);
        let mut power = MockPower::new();
        power.fail_next_clock_request();
        assert!(matches!(
            inst.power_control(&mut regs, PowerState::Wake, false, &mut power),
            Err(IosError::Power(_))
        ));
        assert_eq!(power.clock_refs(), 0);
    }
}
