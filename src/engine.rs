//! The DMA engine interface

use crate::{
    microcode,
    ral::{self, dmac, Static},
    Fault,
};

/// A channel thread's execution state
///
/// Several hardware states collapse into [`Running`](ThreadStatus::Running).
/// The driver only needs to know if a thread is stopped, busy, or faulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    /// The thread is stopped, and may be started
    Stopped,
    /// The thread is executing, waiting, or being killed
    Running,
    /// The thread is finishing its outstanding transactions
    Completing,
    /// The thread is faulting
    Faulting,
    /// The thread is faulting, and finishing its outstanding transactions
    FaultingCompleting,
}

impl ThreadStatus {
    /// Decode the channel status field of a channel status register
    pub const fn from_raw(channel_status: u32) -> Self {
        use ral::thread::CSR::CHANNEL_STATUS::R::*;
        match channel_status {
            STOPPED => ThreadStatus::Stopped,
            COMPLETING => ThreadStatus::Completing,
            FAULTING => ThreadStatus::Faulting,
            FAULTING_COMPLETING => ThreadStatus::FaultingCompleting,
            _ => ThreadStatus::Running,
        }
    }

    /// Returns `true` if the thread is in either faulting state
    pub const fn is_faulting(self) -> bool {
        matches!(
            self,
            ThreadStatus::Faulting | ThreadStatus::FaultingCompleting
        )
    }
}

/// An instruction for the controller's debug interface
///
/// The debug interface is the only way for software to start or kill a
/// channel thread. There's one interface for the whole controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugInstruction {
    inst0: u32,
    inst1: u32,
}

/// A decoded [`DebugInstruction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// The manager starts `channel` at `program`
    Go {
        channel: usize,
        program: u32,
        nonsecure: bool,
    },
    /// `channel` terminates
    Kill { channel: usize },
    /// Anything this driver doesn't issue
    Other,
}

/// Selects the channel thread, rather than the manager thread.
const DEBUG_THREAD_CHANNEL: u32 = 1;

impl DebugInstruction {
    /// Have the manager thread start `channel` at the `program` address
    pub const fn go(channel: usize, program: u32, nonsecure: bool) -> Self {
        let opcode = (microcode::DMAGO | ((nonsecure as u8) << 1)) as u32;
        DebugInstruction {
            inst0: ((channel as u32 & 0x7) << 24) | (opcode << 16),
            inst1: program,
        }
    }

    /// Have `channel` kill itself
    pub const fn kill(channel: usize) -> Self {
        DebugInstruction {
            inst0: ((microcode::DMAKILL as u32) << 16)
                | ((channel as u32 & 0x7) << 8)
                | DEBUG_THREAD_CHANNEL,
            inst1: 0,
        }
    }

    /// The value for the debug instruction-0 register
    pub const fn inst0(self) -> u32 {
        self.inst0
    }

    /// The value for the debug instruction-1 register
    pub const fn inst1(self) -> u32 {
        self.inst1
    }

    /// Decode the instruction
    pub const fn command(self) -> Command {
        let opcode = (self.inst0 >> 16) as u8;
        if opcode & !0x2 == microcode::DMAGO && self.inst0 & DEBUG_THREAD_CHANNEL == 0 {
            Command::Go {
                channel: ((self.inst0 >> 24) & 0x7) as usize,
                program: self.inst1,
                nonsecure: opcode & 0x2 != 0,
            }
        } else if opcode == microcode::DMAKILL && self.inst0 & DEBUG_THREAD_CHANNEL != 0 {
            Command::Kill {
                channel: ((self.inst0 >> 8) & 0x7) as usize,
            }
        } else {
            Command::Other
        }
    }
}

/// The hardware side of a micro-coded DMA controller
///
/// [`Pl330`] implements this with real registers. Implement it yourself
/// to drive a controller model, or to add tracing.
///
/// Callers hold the critical section while using an `Engine`.
pub trait Engine {
    /// Returns `true` while the debug interface executes an instruction
    fn is_debug_busy(&self) -> bool;
    /// Execute an instruction through the debug interface
    fn execute(&self, instruction: DebugInstruction);
    /// Returns the execution state of `channel`'s thread
    fn thread_status(&self, channel: usize) -> ThreadStatus;
    /// Returns `channel`'s current source address
    fn source_address(&self, channel: usize) -> u32;
    /// Returns `channel`'s current destination address
    fn destination_address(&self, channel: usize) -> u32;
    /// Returns the manager thread's fault, if it's faulting
    fn manager_fault(&self) -> Option<Fault>;
    /// Returns `channel`'s fault, if it's faulting
    fn channel_fault(&self, channel: usize) -> Option<Fault>;
    /// Route `event` to its interrupt line (`true`) or back to an event (`false`)
    fn set_event_interrupt(&self, event: usize, enable: bool);
    /// Clear the interrupt flag for `event`
    fn clear_event_interrupt(&self, event: usize);
}

/// A DMA-330 register block
pub struct Pl330 {
    registers: Static<dmac::RegisterBlock>,
}

// Safety: the registers are fixed peripheral memory. Each debug command is
// a sequence of register writes that the driver only issues inside its
// critical section.
unsafe impl Send for Pl330 {}
unsafe impl Sync for Pl330 {}

impl Pl330 {
    /// Create the engine over the controller registers
    ///
    /// # Safety
    ///
    /// `registers` must point at the start of the controller's register
    /// block. Only the DMA driver that owns this engine may access those
    /// registers.
    pub const unsafe fn new(registers: *const ()) -> Self {
        Pl330 {
            registers: Static(registers.cast()),
        }
    }

    /// Returns the number of channels the controller implements
    pub fn channels(&self) -> usize {
        let cr0 = self.registers.CR[0].read();
        (((cr0 & dmac::CR0::NUM_CHNLS::mask) >> dmac::CR0::NUM_CHNLS::offset) + 1) as usize
    }

    /// Returns the number of events the controller implements
    pub fn events(&self) -> usize {
        let cr0 = self.registers.CR[0].read();
        (((cr0 & dmac::CR0::NUM_EVENTS::mask) >> dmac::CR0::NUM_EVENTS::offset) + 1) as usize
    }
}

impl Engine for Pl330 {
    fn is_debug_busy(&self) -> bool {
        ral::read_reg!(crate::ral::dmac, self.registers, DBGSTATUS, DBGSTATUS == BUSY)
    }

    fn execute(&self, instruction: DebugInstruction) {
        self.registers.DBGINST0.write(instruction.inst0());
        self.registers.DBGINST1.write(instruction.inst1());
        // Any write to DBGCMD executes DBGINST0 and DBGINST1.
        self.registers.DBGCMD.write(0);
    }

    fn thread_status(&self, channel: usize) -> ThreadStatus {
        let status = &self.registers.THREAD[channel];
        ThreadStatus::from_raw(ral::read_reg!(crate::ral::thread, status, CSR, CHANNEL_STATUS))
    }

    fn source_address(&self, channel: usize) -> u32 {
        self.registers.CHANNEL[channel].SAR.read()
    }

    fn destination_address(&self, channel: usize) -> u32 {
        self.registers.CHANNEL[channel].DAR.read()
    }

    fn manager_fault(&self) -> Option<Fault> {
        if ral::read_reg!(crate::ral::dmac, self.registers, FSRD, FS_MGR == 1) {
            Some(Fault::new(self.registers.FTRD.read()))
        } else {
            None
        }
    }

    fn channel_fault(&self, channel: usize) -> Option<Fault> {
        if self.registers.FSRC.read() & (1 << channel) != 0 {
            Some(Fault::new(self.registers.FTR[channel].read()))
        } else {
            None
        }
    }

    fn set_event_interrupt(&self, event: usize, enable: bool) {
        let inten = self.registers.INTEN.read();
        if enable {
            self.registers.INTEN.write(inten | (1 << event));
        } else {
            self.registers.INTEN.write(inten & !(1 << event));
        }
    }

    fn clear_event_interrupt(&self, event: usize) {
        self.registers.INTCLR.write(1 << event);
    }
}
