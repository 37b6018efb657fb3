//! DMA controller register block and fields

use super::{thread, RORegister, RWRegister, WORegister};

/// DMA controller registers
///
/// Supports controllers with up to eight channels.
#[repr(C)]
pub struct RegisterBlock {
    /// DMA Manager Status Register
    pub DSR: RORegister<u32>,
    /// DMA Program Counter Register
    pub DPC: RORegister<u32>,
    _reserved0: [u32; 6],
    /// Interrupt Enable Register
    pub INTEN: RWRegister<u32>,
    /// Event-Interrupt Raw Status Register
    pub INT_EVENT_RIS: RORegister<u32>,
    /// Interrupt Status Register
    pub INTMIS: RORegister<u32>,
    /// Interrupt Clear Register
    pub INTCLR: WORegister<u32>,
    /// Fault Status DMA Manager Register
    pub FSRD: RORegister<u32>,
    /// Fault Status DMA Channel Register
    pub FSRC: RORegister<u32>,
    /// Fault Type DMA Manager Register
    pub FTRD: RORegister<u32>,
    _reserved1: [u32; 1],
    /// Fault Type DMA Channel Registers
    pub FTR: [RORegister<u32>; 8],
    _reserved2: [u32; 40],
    /// Channel thread status registers
    pub THREAD: [thread::Status; 8],
    _reserved3: [u32; 176],
    /// Channel pointer and control registers
    pub CHANNEL: [thread::RegisterBlock; 8],
    _reserved4: [u32; 512],
    /// Debug Status Register
    pub DBGSTATUS: RORegister<u32>,
    /// Debug Command Register
    pub DBGCMD: WORegister<u32>,
    /// Debug Instruction-0 Register
    pub DBGINST0: WORegister<u32>,
    /// Debug Instruction-1 Register
    pub DBGINST1: WORegister<u32>,
    _reserved5: [u32; 60],
    /// Configuration Registers 0 through 4
    pub CR: [RORegister<u32>; 5],
    /// DMA Configuration Register
    pub CRD: RORegister<u32>,
    _reserved6: [u32; 26],
    /// Watchdog Register
    pub WD: RWRegister<u32>,
}

// Did I calculate my reservations correctly?
const _: () = assert!(core::mem::offset_of!(RegisterBlock, INTEN) == 0x020);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, FTR) == 0x040);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, THREAD) == 0x100);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, CHANNEL) == 0x400);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, DBGSTATUS) == 0xD00);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, CR) == 0xE00);
const _: () = assert!(core::mem::offset_of!(RegisterBlock, WD) == 0xE80);

pub mod DSR {
    /// Set if the manager thread operates in the non-secure state
    pub mod DNS {
        pub const offset: u32 = 9;
        pub const mask: u32 = 1 << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}

pub mod FSRD {
    /// Set if the manager thread is faulting
    pub mod FS_MGR {
        pub const offset: u32 = 0;
        pub const mask: u32 = 1 << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}

pub mod DBGSTATUS {
    /// Set while the debug interface executes an instruction
    pub mod DBGSTATUS {
        pub const offset: u32 = 0;
        pub const mask: u32 = 1 << offset;
        pub mod R {
            pub const IDLE: u32 = 0;
            pub const BUSY: u32 = 1;
        }
        pub mod W {}
        pub mod RW {}
    }
}

pub mod CR0 {
    /// Number of channels, minus one
    pub mod NUM_CHNLS {
        pub const offset: u32 = 4;
        pub const mask: u32 = 0x7 << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
    /// Number of events, minus one
    pub mod NUM_EVENTS {
        pub const offset: u32 = 17;
        pub const mask: u32 = 0x1F << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}
