//! A simulated controller and platform for driving the DMA driver on a host

#![allow(dead_code)]

use std::cell::RefCell;

use pl330_dma::{
    Command, Config, DebugInstruction, Direction, Dma, Engine, Event, Fault, Irq,
    Platform, PowerState, ThreadStatus, TransferParams,
};

pub const CHANNELS: usize = 8;
pub const EVENTS: usize = 32;
pub const IRQ_BASE: u16 = 32;
pub const ABORT_IRQ: u16 = 64;

pub type TestDma = Dma<SimEngine, SimPlatform, CHANNELS, EVENTS>;

/// Simulated controller state
pub struct Sim {
    pub debug_busy: bool,
    pub threads: [ThreadStatus; CHANNELS],
    pub sar: [u32; CHANNELS],
    pub dar: [u32; CHANNELS],
    pub manager_fault: Option<Fault>,
    pub channel_faults: [Option<Fault>; CHANNELS],
    pub inten: u32,
    pub cleared: Vec<usize>,
    pub commands: Vec<Command>,
    /// Status reads before a killed channel stops. `None` never stops.
    pub kill_latency: Option<u32>,
    killing: [Option<u32>; CHANNELS],
}

/// An engine that records debug commands, and lets tests drive the threads
pub struct SimEngine {
    pub sim: RefCell<Sim>,
}

impl SimEngine {
    pub fn new() -> Self {
        SimEngine {
            sim: RefCell::new(Sim {
                debug_busy: false,
                threads: [ThreadStatus::Stopped; CHANNELS],
                sar: [0; CHANNELS],
                dar: [0; CHANNELS],
                manager_fault: None,
                channel_faults: [None; CHANNELS],
                inten: 0,
                cleared: Vec::new(),
                commands: Vec::new(),
                kill_latency: Some(2),
                killing: [None; CHANNELS],
            }),
        }
    }

    pub fn commands(&self) -> Vec<Command> {
        self.sim.borrow().commands.clone()
    }

    pub fn gos(&self) -> usize {
        self.commands()
            .iter()
            .filter(|cmd| matches!(cmd, Command::Go { .. }))
            .count()
    }

    pub fn kills(&self) -> usize {
        self.commands()
            .iter()
            .filter(|cmd| matches!(cmd, Command::Kill { .. }))
            .count()
    }

    /// Pretend the channel moved its pointers
    pub fn progress(&self, channel: usize, sar: u32, dar: u32) {
        let mut sim = self.sim.borrow_mut();
        sim.sar[channel] = sar;
        sim.dar[channel] = dar;
    }

    /// Pretend the channel finished its program
    pub fn finish(&self, channel: usize) {
        self.sim.borrow_mut().threads[channel] = ThreadStatus::Stopped;
    }

    /// Pretend the channel faulted
    pub fn fault(&self, channel: usize, ftr: u32) {
        let mut sim = self.sim.borrow_mut();
        sim.threads[channel] = ThreadStatus::Faulting;
        sim.channel_faults[channel] = Some(Fault::new(ftr));
    }

    pub fn set_thread(&self, channel: usize, status: ThreadStatus) {
        self.sim.borrow_mut().threads[channel] = status;
    }

    pub fn set_debug_busy(&self, busy: bool) {
        self.sim.borrow_mut().debug_busy = busy;
    }

    pub fn set_kill_latency(&self, latency: Option<u32>) {
        self.sim.borrow_mut().kill_latency = latency;
    }

    pub fn set_manager_fault(&self, ftr: u32) {
        self.sim.borrow_mut().manager_fault = Some(Fault::new(ftr));
    }

    pub fn inten(&self) -> u32 {
        self.sim.borrow().inten
    }
}

impl Engine for SimEngine {
    fn is_debug_busy(&self) -> bool {
        self.sim.borrow().debug_busy
    }

    fn execute(&self, instruction: DebugInstruction) {
        let mut sim = self.sim.borrow_mut();
        let command = instruction.command();
        match command {
            Command::Go { channel, .. } => sim.threads[channel] = ThreadStatus::Running,
            Command::Kill { channel } => {
                let latency = sim.kill_latency;
                sim.killing[channel] = latency;
                if latency.is_some() {
                    sim.channel_faults[channel] = None;
                }
            }
            Command::Other => {}
        }
        sim.commands.push(command);
    }

    fn thread_status(&self, channel: usize) -> ThreadStatus {
        let mut sim = self.sim.borrow_mut();
        match sim.killing[channel] {
            Some(0) => {
                sim.killing[channel] = None;
                sim.threads[channel] = ThreadStatus::Stopped;
            }
            Some(polls) => sim.killing[channel] = Some(polls - 1),
            None => {}
        }
        sim.threads[channel]
    }

    fn source_address(&self, channel: usize) -> u32 {
        self.sim.borrow().sar[channel]
    }

    fn destination_address(&self, channel: usize) -> u32 {
        self.sim.borrow().dar[channel]
    }

    fn manager_fault(&self) -> Option<Fault> {
        self.sim.borrow().manager_fault
    }

    fn channel_fault(&self, channel: usize) -> Option<Fault> {
        self.sim.borrow().channel_faults[channel]
    }

    fn set_event_interrupt(&self, event: usize, enable: bool) {
        let mut sim = self.sim.borrow_mut();
        if enable {
            sim.inten |= 1 << event;
        } else {
            sim.inten &= !(1 << event);
        }
    }

    fn clear_event_interrupt(&self, event: usize) {
        self.sim.borrow_mut().cleared.push(event);
    }
}

/// A platform call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    PowerUp,
    PowerDown,
    Reset,
    Security(bool),
    DisableIrq(u16),
    ClearPending(u16),
    SetPriority(u16, u8),
    EnableIrq(u16),
    Clean(usize, usize),
    Invalidate(usize, usize),
}

/// A platform that records every call
#[derive(Default)]
pub struct SimPlatform {
    pub ops: Vec<Op>,
}

impl Platform for SimPlatform {
    fn power_up(&mut self) {
        self.ops.push(Op::PowerUp);
    }
    fn power_down(&mut self) {
        self.ops.push(Op::PowerDown);
    }
    fn reset(&mut self) {
        self.ops.push(Op::Reset);
    }
    fn configure_security(&mut self, nonsecure: bool) {
        self.ops.push(Op::Security(nonsecure));
    }
    fn disable_irq(&mut self, irq: Irq) {
        self.ops.push(Op::DisableIrq(irq.0));
    }
    fn clear_pending(&mut self, irq: Irq) {
        self.ops.push(Op::ClearPending(irq.0));
    }
    fn set_priority(&mut self, irq: Irq, priority: u8) {
        self.ops.push(Op::SetPriority(irq.0, priority));
    }
    fn enable_irq(&mut self, irq: Irq) {
        self.ops.push(Op::EnableIrq(irq.0));
    }
    fn clean_dcache(&mut self, address: usize, len: usize) {
        self.ops.push(Op::Clean(address, len));
    }
    fn invalidate_dcache(&mut self, address: usize, len: usize) {
        self.ops.push(Op::Invalidate(address, len));
    }
}

pub fn config() -> Config {
    Config::new(IRQ_BASE, ABORT_IRQ)
}

/// An unpowered, uninitialized driver
pub fn driver(config: Config) -> TestDma {
    Dma::new(SimEngine::new(), SimPlatform::default(), config)
}

/// An initialized, powered driver
pub fn powered() -> TestDma {
    let dma = driver(config());
    dma.initialize().unwrap();
    dma.power_control(PowerState::Full).unwrap();
    take_ops(&dma);
    dma
}

/// Returns, and forgets, the platform calls so far
pub fn take_ops(dma: &TestDma) -> Vec<Op> {
    dma.with_platform(|platform| std::mem::take(&mut platform.ops))
}

pub const SOURCE: usize = 0x2000_0000;
pub const DESTINATION: usize = 0x2001_0000;

/// A word aligned memory to memory copy
pub fn memcpy(num_bytes: u32) -> TransferParams {
    let mut params = TransferParams::new(
        Direction::MemToMem,
        SOURCE,
        DESTINATION,
        num_bytes,
        record,
    );
    params.burst_size = 2;
    params.burst_len = 4;
    params
}

thread_local! {
    static CALLS: RefCell<Vec<(Event, i8)>> = const { RefCell::new(Vec::new()) };
}

/// A callback that remembers its calls
pub fn record(event: Event, peripheral: i8) {
    CALLS.with(|calls| calls.borrow_mut().push((event, peripheral)));
}

/// Returns, and forgets, the recorded callbacks
pub fn calls() -> Vec<(Event, i8)> {
    CALLS.with(|calls| std::mem::take(&mut *calls.borrow_mut()))
}

