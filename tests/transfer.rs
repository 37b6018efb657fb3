mod common;

use common::{calls, memcpy, powered, record, take_ops, Op, DESTINATION, IRQ_BASE, SOURCE};
use pl330_dma::{
    Command, Config, Control, Direction, EndianSwap, Error, Event, Handle, ThreadStatus,
    TransferParams, MICROCODE_SIZE,
};

fn other(_: Event, _: i8) {
    panic!("replaced callback must not run");
}

#[test]
fn memcpy_completes() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    let channel = handle.channel();
    let event = dma.event(handle).unwrap();

    unsafe { dma.start(handle, &memcpy(256)) }.unwrap();
    assert_eq!(dma.thread_status(handle), Ok(ThreadStatus::Running));

    dma.engine()
        .progress(channel, SOURCE as u32 + 64, DESTINATION as u32 + 64);
    let transferred = dma.status(handle).unwrap();
    assert!(transferred < 256);
    assert_eq!(transferred, 64);

    dma.engine()
        .progress(channel, SOURCE as u32 + 256, DESTINATION as u32 + 256);
    dma.engine().finish(channel);
    take_ops(&dma);
    dma.on_interrupt(event);

    assert_eq!(calls(), [(Event::Complete, -1)]);
    assert_eq!(dma.status(handle), Ok(256));
    assert_eq!(take_ops(&dma), [Op::Invalidate(DESTINATION, 256)]);
    assert!(dma.engine().sim.borrow().cleared.contains(&event));

    // Unbound events are acknowledged, and nothing else.
    dma.on_interrupt(event + 1);
    assert!(calls().is_empty());
}

#[test]
fn start_programs_cache_then_interrupts_then_go() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    let event = dma.event(handle).unwrap();
    let irq = IRQ_BASE + event as u16;

    let mut params = memcpy(256);
    params.irq_priority = 5;
    unsafe { dma.start(handle, &params) }.unwrap();

    let ops = take_ops(&dma);
    assert_eq!(ops.len(), 7);
    assert!(matches!(ops[0], Op::Clean(_, len) if len == MICROCODE_SIZE));
    assert_eq!(
        ops[1..],
        [
            Op::Clean(SOURCE, 256),
            Op::Invalidate(DESTINATION, 256),
            Op::DisableIrq(irq),
            Op::ClearPending(irq),
            Op::SetPriority(irq, 5),
            Op::EnableIrq(irq),
        ]
    );

    assert_ne!(dma.engine().inten() & (1 << event), 0);
    let Op::Clean(program, _) = ops[0] else {
        unreachable!()
    };
    assert_eq!(
        dma.engine().commands(),
        [Command::Go {
            channel: handle.channel(),
            program: program as u32,
            nonsecure: false,
        }]
    );
}

#[test]
fn nonsecure_transfers_start_nonsecure() {
    let mut config = common::config();
    config.nonsecure = true;
    let dma = common::driver(config);
    dma.initialize().unwrap();
    dma.power_control(pl330_dma::PowerState::Full).unwrap();

    let handle = dma.allocate().unwrap();
    unsafe { dma.start(handle, &memcpy(16)) }.unwrap();
    assert!(matches!(
        dma.engine().commands()[..],
        [Command::Go {
            nonsecure: true,
            ..
        }]
    ));
    assert!(!dma.capabilities().secure_mode);
}

#[test]
fn busy_channels_reject_transfers() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    let event = dma.event(handle).unwrap();
    unsafe { dma.start(handle, &memcpy(64)) }.unwrap();
    take_ops(&dma);

    let mut params = memcpy(64);
    params.callback = Some(other);
    assert_eq!(unsafe { dma.start(handle, &params) }, Err(Error::Busy));
    assert_eq!(dma.engine().gos(), 1);
    assert!(take_ops(&dma).is_empty());

    dma.engine().finish(handle.channel());
    dma.on_interrupt(event);
    assert_eq!(calls(), [(Event::Complete, -1)]);
}

#[test]
fn busy_debug_interface_rejects_transfers() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    dma.engine().set_debug_busy(true);

    let result = unsafe { dma.start(handle, &memcpy(64)) };
    assert_eq!(result, Err(Error::ControllerBusy));
    assert!(result.unwrap_err().is_busy());
    assert_eq!(dma.engine().gos(), 0);
}

#[test]
fn start_rejects_bad_handles() {
    let dma = powered();
    assert_eq!(
        unsafe { dma.start(Handle::new(1), &memcpy(64)) },
        Err(Error::Handle)
    );
    assert_eq!(
        unsafe { dma.start(Handle::new(8), &memcpy(64)) },
        Err(Error::Handle)
    );
}

#[test]
fn start_requires_power() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    dma.power_control(pl330_dma::PowerState::Off).unwrap();
    assert_eq!(
        unsafe { dma.start(handle, &memcpy(64)) },
        Err(Error::Driver)
    );
}

#[test]
fn invalid_parameters_touch_nothing() {
    let dma = powered();
    let handle = dma.allocate().unwrap();

    let mut params = memcpy(64);
    params.callback = None;
    assert_eq!(unsafe { dma.start(handle, &params) }, Err(Error::Parameter));

    let mut params = memcpy(64);
    params.burst_len = 0;
    assert_eq!(unsafe { dma.start(handle, &params) }, Err(Error::Parameter));

    let mut params = memcpy(64);
    params.burst_size = 4;
    assert_eq!(unsafe { dma.start(handle, &params) }, Err(Error::Parameter));

    assert_eq!(
        unsafe { dma.start(handle, &memcpy(0)) },
        Err(Error::Parameter)
    );

    let mut params = TransferParams::new(Direction::MemToDev, SOURCE, 0x4000_0000, 64, record);
    params.peripheral = 40;
    assert_eq!(unsafe { dma.start(handle, &params) }, Err(Error::Parameter));

    assert!(take_ops(&dma).is_empty());
    assert_eq!(dma.engine().gos(), 0);
}

#[test]
fn unaligned_peripheral_transfers_fail() {
    let dma = powered();
    let handle = dma.allocate().unwrap();

    let mut params =
        TransferParams::new(Direction::MemToDev, SOURCE + 1, 0x4000_0000, 64, record);
    params.peripheral = 3;
    params.burst_size = 2;
    assert_eq!(unsafe { dma.start(handle, &params) }, Err(Error::Unaligned));

    let mut params = TransferParams::new(Direction::DevToMem, 0x4000_0000, DESTINATION, 62, record);
    params.peripheral = 3;
    params.burst_size = 2;
    assert_eq!(unsafe { dma.start(handle, &params) }, Err(Error::Unaligned));

    assert!(take_ops(&dma).is_empty());
    assert_eq!(dma.engine().gos(), 0);
}

#[test]
fn unaligned_memcpy_shrinks_its_bursts() {
    let dma = powered();
    let handle = dma.allocate().unwrap();

    let mut params = memcpy(254);
    params.source = SOURCE + 2;
    unsafe { dma.start(handle, &params) }.unwrap();

    let descriptor = dma.descriptor(handle).unwrap();
    assert_eq!(descriptor.src_burst_size, 1);
    assert_eq!(descriptor.dst_burst_size, 1);
}

#[test]
fn oversized_programs_fail() {
    let dma = powered();
    let handle = dma.allocate().unwrap();

    let mut params = memcpy(1 << 20);
    params.burst_size = 0;
    params.burst_len = 1;
    assert_eq!(unsafe { dma.start(handle, &params) }, Err(Error::Buffer));
    assert!(take_ops(&dma).is_empty());
    assert_eq!(dma.engine().gos(), 0);
    assert_eq!(dma.engine().inten(), 0);
}

#[test]
fn stop_is_idempotent() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    let event = dma.event(handle).unwrap();

    dma.stop(handle).unwrap();
    assert_eq!(dma.engine().kills(), 0);

    unsafe { dma.start(handle, &memcpy(256)) }.unwrap();
    take_ops(&dma);

    dma.stop(handle).unwrap();
    assert_eq!(dma.thread_status(handle), Ok(ThreadStatus::Stopped));
    assert_eq!(dma.engine().inten() & (1 << event), 0);
    let irq = IRQ_BASE + event as u16;
    assert_eq!(
        take_ops(&dma),
        [
            Op::DisableIrq(irq),
            Op::ClearPending(irq),
            Op::Invalidate(DESTINATION, 256),
        ]
    );

    dma.stop(handle).unwrap();
    assert_eq!(dma.thread_status(handle), Ok(ThreadStatus::Stopped));
    assert_eq!(dma.engine().kills(), 1);
    assert!(calls().is_empty());
}

#[test]
fn stop_gives_up_on_wedged_channels() {
    let mut config = common::config();
    config.stop_timeout = Some(16);
    let dma = common::driver(config);
    dma.initialize().unwrap();
    dma.power_control(pl330_dma::PowerState::Full).unwrap();

    let handle = dma.allocate().unwrap();
    unsafe { dma.start(handle, &memcpy(256)) }.unwrap();
    dma.engine().set_kill_latency(None);

    assert_eq!(dma.stop(handle), Err(Error::Timeout));
    assert_eq!(dma.thread_status(handle), Ok(ThreadStatus::Running));
}

#[test]
fn stop_waits_for_the_debug_interface() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    unsafe { dma.start(handle, &memcpy(256)) }.unwrap();
    dma.engine().set_debug_busy(true);
    assert_eq!(dma.stop(handle), Err(Error::ControllerBusy));
    assert_eq!(dma.engine().kills(), 0);
}

#[test]
fn status_reports_faults() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    unsafe { dma.start(handle, &memcpy(256)) }.unwrap();
    dma.engine().fault(handle.channel(), 1 << 30);

    let Err(Error::Fault(fault)) = dma.status(handle) else {
        panic!("expected a fault");
    };
    assert_eq!(fault.raw(), 1 << 30);
    assert_eq!(dma.thread_status(handle), Ok(ThreadStatus::Faulting));
    assert_eq!(dma.engine().kills(), 0);
}

#[test]
fn peripheral_transfers_count_at_the_source() {
    let dma = powered();
    let handle = dma.allocate().unwrap();

    let mut params = TransferParams::new(Direction::MemToDev, SOURCE, 0x4000_0000, 64, record);
    params.peripheral = 7;
    params.burst_size = 2;
    unsafe { dma.start(handle, &params) }.unwrap();
    assert_eq!(
        take_ops(&dma)[1..3],
        [Op::Clean(SOURCE, 64), Op::DisableIrq(IRQ_BASE)]
    );

    dma.engine()
        .progress(handle.channel(), SOURCE as u32 + 12, 0x4000_0000);
    assert_eq!(dma.status(handle), Ok(12));

    dma.engine().finish(handle.channel());
    dma.on_interrupt(dma.event(handle).unwrap());
    assert_eq!(calls(), [(Event::Complete, 7)]);
    assert!(take_ops(&dma).is_empty());
}

#[test]
fn channels_restart_after_completion() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    unsafe { dma.start(handle, &memcpy(64)) }.unwrap();
    dma.engine().finish(handle.channel());
    dma.on_interrupt(dma.event(handle).unwrap());
    unsafe { dma.start(handle, &memcpy(128)) }.unwrap();
    assert_eq!(dma.engine().gos(), 2);
    assert_eq!(dma.descriptor(handle).unwrap().length, 128);
    calls();
}

#[test]
fn control_validates_endian_swaps() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    assert_eq!(
        dma.control(handle, Control::EndianSwap(12)),
        Err(Error::Parameter)
    );
    dma.control(handle, Control::EndianSwap(32)).unwrap();
    unsafe { dma.start(handle, &memcpy(64)) }.unwrap();
    assert_eq!(
        dma.descriptor(handle).unwrap().endian_swap,
        EndianSwap::Bits32
    );
    assert_eq!(
        dma.control(Handle::new(5), Control::CrcMode),
        Err(Error::Handle)
    );
}

#[test]
fn control_requires_initialization() {
    let dma = common::driver(Config::new(IRQ_BASE, common::ABORT_IRQ));
    assert_eq!(
        dma.control(Handle::new(0), Control::I2sMonoMode),
        Err(Error::Driver)
    );
}

static PROGRAM: [u8; 4] = [0x34, 0x00, 0x00, 0x00];

#[test]
fn user_programs_run_as_is() {
    let dma = powered();
    let handle = dma.allocate().unwrap();
    dma.control(handle, Control::UserMicrocode(&PROGRAM)).unwrap();
    assert_eq!(
        dma.control(handle, Control::UserMicrocode(&[])),
        Err(Error::Parameter)
    );

    // Lengths that couldn't fit a generated program are fine.
    let mut params = memcpy(1 << 20);
    params.burst_size = 0;
    params.burst_len = 1;
    unsafe { dma.start(handle, &params) }.unwrap();

    let ops = take_ops(&dma);
    let address = PROGRAM.as_ptr() as usize;
    assert_eq!(ops[0], Op::Clean(address, PROGRAM.len()));
    assert_eq!(
        dma.engine().commands(),
        [Command::Go {
            channel: handle.channel(),
            program: address as u32,
            nonsecure: false,
        }]
    );
}
