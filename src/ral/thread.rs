//! Channel thread registers

use super::{RORegister, RWRegister};

/// Channel thread status registers
///
/// One pair for each channel, starting at offset `0x100`.
#[repr(C)]
pub struct Status {
    /// Channel Status Register
    pub CSR: RORegister<u32>,
    /// Channel Program Counter
    pub CPC: RORegister<u32>,
}

/// Channel thread pointer and control registers
///
/// One block for each channel, starting at offset `0x400`.
#[repr(C)]
pub struct RegisterBlock {
    /// Source Address Register
    pub SAR: RORegister<u32>,
    /// Destination Address Register
    pub DAR: RORegister<u32>,
    /// Channel Control Register
    pub CCR: RORegister<u32>,
    /// Loop Counter 0
    pub LC0: RORegister<u32>,
    /// Loop Counter 1
    pub LC1: RORegister<u32>,
    _reserved: [u32; 3],
}

const _: () = assert!(core::mem::size_of::<Status>() == 0x8);
const _: () = assert!(core::mem::size_of::<RegisterBlock>() == 0x20);

pub mod CSR {
    /// The channel's execution state
    pub mod CHANNEL_STATUS {
        pub const offset: u32 = 0;
        pub const mask: u32 = 0xF << offset;
        pub mod R {
            pub const STOPPED: u32 = 0b0000;
            pub const EXECUTING: u32 = 0b0001;
            pub const CACHE_MISS: u32 = 0b0010;
            pub const UPDATING_PC: u32 = 0b0011;
            pub const WAITING_FOR_EVENT: u32 = 0b0100;
            pub const AT_BARRIER: u32 = 0b0101;
            pub const WAITING_FOR_PERIPHERAL: u32 = 0b0111;
            pub const KILLING: u32 = 0b1000;
            pub const COMPLETING: u32 = 0b1001;
            pub const FAULTING_COMPLETING: u32 = 0b1110;
            pub const FAULTING: u32 = 0b1111;
        }
        pub mod W {}
        pub mod RW {}
    }
    /// Set if the channel thread operates in the non-secure state
    pub mod CNS {
        pub const offset: u32 = 21;
        pub const mask: u32 = 1 << offset;
        pub mod R {}
        pub mod W {}
        pub mod RW {}
    }
}
