//! DMA transfer tests against the simulated peripheral.
//!
//! Covers the busy check, completion reporting on DCMP / XCMPRF / DERR, the
//! full-duplex instance pair and aborts.

// Test files legitimately use arithmetic for verification; allow at file level.
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use io_slave::regs::dmacfg;
use io_slave::sim::{SimIos, SimState};
use io_slave::{
    DmaCompletion, DmaDirection, DmaState, FullDuplexHandle, IntStatus, IosError, IosManager,
    Priority, Reg, Transfer, TransferBuffer, TransferDirection, TransferError,
};
use static_cell::StaticCell;

fn leak(len: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; len].into_boxed_slice())
}

fn states() -> [RefCell<SimState>; 3] {
    [
        RefCell::new(SimState::new()),
        RefCell::new(SimState::new()),
        RefCell::new(SimState::new()),
    ]
}

fn manager(states: &[RefCell<SimState>; 3]) -> IosManager<SimIos<'_>> {
    IosManager::new([
        SimIos::new(&states[0]),
        SimIos::new(&states[1]),
        SimIos::new(&states[2]),
    ])
}

#[test]
fn busy_engine_returns_descriptor_untouched() {
    static RX: StaticCell<[u8; 16]> = StaticCell::new();
    let states = states();
    let ios = manager(&states);
    let handle = ios.initialize(0).unwrap();

    assert!(ios.dma_transfer(handle, Transfer::read(RX.init([0; 16]))).is_ok());
    assert_eq!(ios.dma_state(handle), Ok(DmaState::Running));

    let second = Transfer::write(b"pending").with_priority(Priority::High);
    let Err((err, back)) = ios.dma_transfer(handle, second) else {
        panic!("second transfer must be rejected while the first runs");
    };
    assert_eq!(err, IosError::InUse);
    assert_eq!(back.direction, TransferDirection::Write);
    assert_eq!(back.write.num_bytes, 7);
    assert_eq!(back.write.buffer, Some(&b"pending"[..]));
    assert_eq!(back.priority, Priority::High);

    // The first transfer is still the one programmed.
    let state = states[0].borrow();
    assert_eq!(state.reg(Reg::DmaTotCount), 16);
    assert_eq!(state.reg(Reg::DmaCfg) & dmacfg::DMADIR, 0);
}

#[test]
fn invalid_descriptors_are_rejected_before_programming() {
    let states = states();
    let ios = manager(&states);
    let handle = ios.initialize(0).unwrap();

    let mut short = Transfer::read(leak(4));
    short.read.num_bytes = 8;
    assert!(matches!(
        ios.dma_transfer(handle, short),
        Err((IosError::InvalidArgument, _))
    ));

    let duplex = Transfer::full_duplex(leak(4), leak(4));
    assert!(matches!(
        ios.dma_transfer(handle, duplex),
        Err((IosError::InvalidArgument, _))
    ));

    assert_eq!(states[0].borrow().reg(Reg::DmaCfg), 0);
    assert_eq!(ios.dma_state(handle), Ok(DmaState::Idle));
}

#[test]
fn read_completes_on_dcmp_with_byte_count() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    static BYTES: AtomicU32 = AtomicU32::new(0);
    fn on_done(done: DmaCompletion) {
        assert_eq!(done.direction, DmaDirection::Read);
        assert_eq!(done.result, Ok(()));
        assert_eq!(done.context, 0x55);
        assert!(matches!(done.buffer, TransferBuffer::Rx(buf) if buf.len() == 16));
        BYTES.store(done.bytes_transferred, Ordering::SeqCst);
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let states = states();
    let ios = manager(&states);
    let handle = ios.initialize(0).unwrap();
    ios.interrupt_enable(handle, IntStatus::DCMP | IntStatus::DERR)
        .unwrap();

    let transfer = Transfer::read(leak(16)).with_read_callback(on_done, 0x55);
    assert!(ios.dma_transfer(handle, transfer).is_ok());

    states[0].borrow_mut().finish_dma(10);
    assert_eq!(ios.handle_interrupt(handle), Ok(IntStatus::DCMP));

    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(BYTES.load(Ordering::SeqCst), 10);
    assert_eq!(ios.dma_state(handle), Ok(DmaState::Idle));
    assert!(ios.take_completion(handle).unwrap().is_none());
}

#[test]
fn write_without_callback_is_parked_until_taken() {
    let states = states();
    let ios = manager(&states);
    let handle = ios.initialize(0).unwrap();
    ios.interrupt_enable(handle, IntStatus::XCMPRF).unwrap();

    assert!(ios.dma_transfer(handle, Transfer::write(b"hello")).is_ok());
    assert_ne!(states[0].borrow().reg(Reg::DmaCfg) & dmacfg::DMADIR, 0);

    states[0].borrow_mut().set_reg(Reg::DmaTotCount, 0);
    states[0].borrow_mut().raise(IntStatus::XCMPRF);
    ios.handle_interrupt(handle).unwrap();

    let done = ios.take_completion(handle).unwrap().unwrap();
    assert_eq!(done.direction, DmaDirection::Write);
    assert_eq!(done.bytes_transferred, 5);
    assert!(matches!(done.buffer, TransferBuffer::Tx(b"hello")));
    assert!(ios.take_completion(handle).unwrap().is_none());
}

#[test]
fn dma_error_tears_down_and_reports_once() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    fn on_done(done: DmaCompletion) {
        assert_eq!(done.result, Err(TransferError::DmaError));
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let states = states();
    let ios = manager(&states);
    let handle = ios.initialize(0).unwrap();
    ios.interrupt_enable(handle, IntStatus::DCMP | IntStatus::DERR)
        .unwrap();

    let transfer = Transfer::read(leak(32)).with_read_callback(on_done, 0);
    assert!(ios.dma_transfer(handle, transfer).is_ok());

    states[0].borrow_mut().fail_dma();
    ios.handle_interrupt(handle).unwrap();
    // A late DCMP for the same transfer finds nothing in flight.
    states[0].borrow_mut().raise(IntStatus::DCMP);
    ios.handle_interrupt(handle).unwrap();

    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(ios.dma_state(handle), Ok(DmaState::Idle));
    let state = states[0].borrow();
    assert_eq!(state.reg(Reg::DmaCfg), 0);
    assert_eq!(state.reg(Reg::DmaStat), 0);
    assert_eq!(state.reg(Reg::DmaTotCount), 0);
    assert_eq!(state.reg(Reg::DmaTargAddr), 0);
}

#[test]
fn full_duplex_programs_forced_pair() {
    let states = states();
    let ios = manager(&states);
    let tx = ios.initialize(1).unwrap();
    let rx = ios.initialize(2).unwrap();
    let pair = FullDuplexHandle::new(tx, rx).unwrap();

    let transfer = Transfer::full_duplex(b"ping", leak(4));
    assert!(ios.dma_fullduplex_transfer(pair, transfer).is_ok());
    assert_eq!(ios.dma_state(tx), Ok(DmaState::Running));
    assert_eq!(ios.dma_state(rx), Ok(DmaState::Running));

    let tx_cfg = states[1].borrow().reg(Reg::DmaCfg);
    assert_ne!(tx_cfg & dmacfg::DMAEN, 0);
    assert_ne!(tx_cfg & dmacfg::FRCDMA, 0);
    assert_ne!(tx_cfg & dmacfg::FRCRDWRT, 0);
    assert_ne!(tx_cfg & dmacfg::PADBYTEEN, 0);
    assert_eq!(dmacfg::PADBYTE.get(tx_cfg), 0x5A);

    let rx_cfg = states[2].borrow().reg(Reg::DmaCfg);
    assert_ne!(rx_cfg & dmacfg::DMAEN, 0);
    assert_ne!(rx_cfg & dmacfg::FRCDMA, 0);
    assert_eq!(rx_cfg & (dmacfg::FRCRDWRT | dmacfg::DMADIR), 0);

    let again = Transfer::full_duplex(b"pong", leak(4));
    assert!(matches!(
        ios.dma_fullduplex_transfer(pair, again),
        Err((IosError::InUse, _))
    ));
}

#[test]
fn full_duplex_legs_finish_through_interrupts() {
    let states = states();
    let ios = manager(&states);
    let tx = ios.initialize(1).unwrap();
    let rx = ios.initialize(2).unwrap();
    let pair = FullDuplexHandle::new(tx, rx).unwrap();
    ios.interrupt_enable(tx, IntStatus::XCMPRF | IntStatus::DERR)
        .unwrap();
    ios.interrupt_enable(rx, IntStatus::DCMP | IntStatus::DERR)
        .unwrap();

    assert!(ios
        .dma_fullduplex_transfer(pair, Transfer::full_duplex(b"ping", leak(4)))
        .is_ok());

    states[2].borrow_mut().finish_dma(4);
    assert_eq!(ios.handle_interrupt(rx), Ok(IntStatus::DCMP));
    let read = ios.take_completion(rx).unwrap().unwrap();
    assert_eq!(read.module, 2);
    assert_eq!(read.direction, DmaDirection::Read);
    assert_eq!(read.result, Ok(()));
    assert_eq!(read.bytes_transferred, 4);
    assert!(matches!(read.buffer, TransferBuffer::Rx(buf) if buf.len() == 4));
    assert_eq!(ios.dma_state(rx), Ok(DmaState::Idle));
    // The write leg is still clocking out bytes.
    assert_eq!(ios.dma_state(tx), Ok(DmaState::Running));

    // DCMP alone does not finish the forced write leg.
    states[1].borrow_mut().finish_dma(4);
    assert_eq!(ios.handle_interrupt(tx), Ok(IntStatus::empty()));
    assert_eq!(ios.dma_state(tx), Ok(DmaState::Running));

    states[1].borrow_mut().raise(IntStatus::XCMPRF);
    assert_eq!(ios.handle_interrupt(tx), Ok(IntStatus::XCMPRF));
    let write = ios.take_completion(tx).unwrap().unwrap();
    assert_eq!(write.module, 1);
    assert_eq!(write.direction, DmaDirection::Write);
    assert_eq!(write.result, Ok(()));
    assert_eq!(write.bytes_transferred, 4);
    assert!(matches!(write.buffer, TransferBuffer::Tx(b"ping")));
    assert_eq!(ios.dma_state(tx), Ok(DmaState::Idle));

    assert_eq!(states[1].borrow().reg(Reg::DmaCfg), 0);
    assert_eq!(states[2].borrow().reg(Reg::DmaCfg), 0);
    assert!(ios
        .dma_fullduplex_transfer(pair, Transfer::full_duplex(b"pong", leak(4)))
        .is_ok());
}

#[test]
fn full_duplex_rejects_half_duplex_descriptor() {
    let states = states();
    let ios = manager(&states);
    let pair = FullDuplexHandle::new(ios.initialize(1).unwrap(), ios.initialize(2).unwrap())
        .unwrap();
    assert!(matches!(
        ios.dma_fullduplex_transfer(pair, Transfer::write(b"x")),
        Err((IosError::InvalidArgument, _))
    ));
}

#[test]
fn full_duplex_abort_returns_both_buffers() {
    let states = states();
    let ios = manager(&states);
    let tx = ios.initialize(1).unwrap();
    let rx = ios.initialize(2).unwrap();
    let pair = FullDuplexHandle::new(tx, rx).unwrap();

    assert!(ios
        .dma_fullduplex_transfer(pair, Transfer::full_duplex(b"abcd", leak(8)))
        .is_ok());
    let (tx_buf, rx_buf) = ios.dma_fullduplex_abort(pair).unwrap();
    assert!(matches!(tx_buf, Some(TransferBuffer::Tx(b"abcd"))));
    assert!(matches!(rx_buf, Some(TransferBuffer::Rx(buf)) if buf.len() == 8));

    assert_eq!(ios.dma_state(tx), Ok(DmaState::Idle));
    assert_eq!(ios.dma_state(rx), Ok(DmaState::Idle));
    assert_eq!(states[1].borrow().reg(Reg::DmaCfg), 0);
    assert_eq!(states[2].borrow().reg(Reg::DmaCfg), 0);

    // Nothing left to abort.
    assert!(matches!(ios.dma_fullduplex_abort(pair), Ok((None, None))));
}

#[test]
fn abort_frees_engine_for_next_transfer() {
    let states = states();
    let ios = manager(&states);
    let handle = ios.initialize(0).unwrap();

    assert!(ios.dma_transfer(handle, Transfer::write(b"first")).is_ok());
    assert!(matches!(
        ios.dma_abort(handle),
        Ok(Some(TransferBuffer::Tx(b"first")))
    ));
    assert!(ios.dma_transfer(handle, Transfer::write(b"second")).is_ok());
    assert_eq!(states[0].borrow().reg(Reg::DmaTotCount), 6);
}

#[test]
fn leftover_dcmp_does_not_finish_next_read() {
    let states = states();
    let ios = manager(&states);
    let handle = ios.initialize(0).unwrap();
    ios.interrupt_enable(handle, IntStatus::XCMPRF).unwrap();

    // A write raises DCMP too but finishes on XCMPRF; DCMP stays pending.
    assert!(ios.dma_transfer(handle, Transfer::write(b"hello")).is_ok());
    states[0].borrow_mut().finish_dma(5);
    states[0].borrow_mut().raise(IntStatus::XCMPRF);
    ios.handle_interrupt(handle).unwrap();
    let write = ios.take_completion(handle).unwrap().unwrap();
    assert_eq!(write.direction, DmaDirection::Write);
    assert_eq!(write.bytes_transferred, 5);
    assert!(IntStatus::from_bits_truncate(states[0].borrow().reg(Reg::IntStat))
        .contains(IntStatus::DCMP));

    assert!(ios.dma_transfer(handle, Transfer::read(leak(16))).is_ok());
    assert!(!IntStatus::from_bits_truncate(states[0].borrow().reg(Reg::IntStat))
        .contains(IntStatus::DCMP));

    states[0].borrow_mut().raise(IntStatus::XCMPRF);
    ios.handle_interrupt(handle).unwrap();
    assert_eq!(ios.dma_state(handle), Ok(DmaState::Running));
    assert!(ios.take_completion(handle).unwrap().is_none());

    states[0].borrow_mut().finish_dma(16);
    ios.handle_interrupt(handle).unwrap();
    let read = ios.take_completion(handle).unwrap().unwrap();
    assert_eq!(read.direction, DmaDirection::Read);
    assert_eq!(read.result, Ok(()));
    assert_eq!(read.bytes_transferred, 16);
    assert_eq!(ios.dma_state(handle), Ok(DmaState::Idle));
}

#[test]
fn leftover_derr_does_not_fail_next_transfer() {
    let states = states();
    let ios = manager(&states);
    let handle = ios.initialize(0).unwrap();

    states[0].borrow_mut().raise(IntStatus::DERR);
    assert!(ios.dma_transfer(handle, Transfer::read(leak(16))).is_ok());

    ios.interrupt_service(handle, IntStatus::FSIZE).unwrap();
    assert_eq!(ios.dma_state(handle), Ok(DmaState::Running));
    assert!(ios.take_completion(handle).unwrap().is_none());
    assert_eq!(states[0].borrow().reg(Reg::DmaTotCount), 16);
}
