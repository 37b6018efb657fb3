//! Transfer descriptors
//!
//! A [`Descriptor`] is the validated, channel-owned copy of a caller's
//! [`TransferParams`]. It's rebuilt for every transfer.

use crate::{Callback, Error, Result};

/// Largest beat, in bytes, supported by the controller's 64-bit data bus
pub const MAX_BURST_SIZE: u32 = 8;
/// Most beats in a burst
pub const MAX_BURST_LEN: u8 = 16;
/// Number of peripheral request interfaces
pub const MAX_PERIPH_REQ: i8 = 32;

/// AXI protection: privileged access
const PROTECTION_PRIVILEGED: u8 = 1 << 0;
/// AXI protection: non-secure access
const PROTECTION_NONSECURE: u8 = 1 << 1;
/// AXI cache control: non-cacheable, non-bufferable
const CACHE_CONTROL_DEFAULT: u8 = 0b000;

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    /// Memory to memory
    MemToMem = 0,
    /// Memory to a peripheral
    MemToDev = 1,
    /// A peripheral to memory
    DevToMem = 2,
}

impl Direction {
    /// Returns `true` if a peripheral takes part in the transfer
    pub const fn involves_device(self) -> bool {
        !matches!(self, Direction::MemToMem)
    }
}

impl TryFrom<u8> for Direction {
    type Error = Error;
    fn try_from(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Direction::MemToMem),
            1 => Ok(Direction::MemToDev),
            2 => Ok(Direction::DevToMem),
            _ => Err(Error::Parameter),
        }
    }
}

/// Byte swapping applied to each beat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndianSwap {
    /// No swapping
    None,
    /// Swap bytes within 16-bit data
    Bits16,
    /// Swap bytes within 32-bit data
    Bits32,
    /// Swap bytes within 64-bit data
    Bits64,
    /// Swap bytes within 128-bit data
    Bits128,
}

impl EndianSwap {
    /// Returns the channel control register encoding
    pub(crate) const fn raw(self) -> u32 {
        match self {
            EndianSwap::None => 0,
            EndianSwap::Bits16 => 1,
            EndianSwap::Bits32 => 2,
            EndianSwap::Bits64 => 3,
            EndianSwap::Bits128 => 4,
        }
    }
}

/// Converts a swap size, in bits. `8` means no swapping.
impl TryFrom<u32> for EndianSwap {
    type Error = Error;
    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(EndianSwap::None),
            16 => Ok(EndianSwap::Bits16),
            32 => Ok(EndianSwap::Bits32),
            64 => Ok(EndianSwap::Bits64),
            128 => Ok(EndianSwap::Bits128),
            _ => Err(Error::Parameter),
        }
    }
}

/// Parameters for one DMA transfer
#[derive(Debug, Clone, Copy)]
pub struct TransferParams {
    /// Peripheral request number
    ///
    /// Required for peripheral transfers. Passed back through the callback
    /// for all transfers.
    pub peripheral: i8,
    /// Beats per burst, `1..=MAX_BURST_LEN`
    pub burst_len: u8,
    /// Beat size, as a power of two (`0` is one byte)
    ///
    /// Memory to memory transfers reduce this until the addresses and length
    /// are aligned. Peripheral transfers must already be aligned.
    pub burst_size: u8,
    /// Transfer direction
    pub direction: Direction,
    /// Source address, in the CPU's address map
    pub source: usize,
    /// Destination address, in the CPU's address map
    pub destination: usize,
    /// Bytes to transfer
    pub num_bytes: u32,
    /// Priority of the completion interrupt
    pub irq_priority: u8,
    /// Called when the transfer completes or aborts
    pub callback: Option<Callback>,
}

impl TransferParams {
    /// Describe a transfer of single-byte beats, one beat per burst
    ///
    /// Adjust the public fields for larger bursts or peripheral transfers.
    pub const fn new(
        direction: Direction,
        source: usize,
        destination: usize,
        num_bytes: u32,
        callback: Callback,
    ) -> Self {
        TransferParams {
            peripheral: -1,
            burst_len: 1,
            burst_size: 0,
            direction,
            source,
            destination,
            num_bytes,
            irq_priority: 0,
            callback: Some(callback),
        }
    }
}

/// A channel's transfer descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub direction: Direction,
    /// Source address, CPU view
    pub source: usize,
    /// Destination address, CPU view
    pub destination: usize,
    /// Source address, controller view
    pub source_global: u32,
    /// Destination address, controller view
    pub destination_global: u32,
    pub length: u32,
    pub burst_len: u8,
    pub src_burst_size: u8,
    pub dst_burst_size: u8,
    pub peripheral: i8,
    pub secure: bool,
    pub cache_control: u8,
    pub protection: u8,
    pub endian_swap: EndianSwap,
}

impl Descriptor {
    pub(crate) const EMPTY: Self = Descriptor {
        direction: Direction::MemToMem,
        source: 0,
        destination: 0,
        source_global: 0,
        destination_global: 0,
        length: 0,
        burst_len: 1,
        src_burst_size: 0,
        dst_burst_size: 0,
        peripheral: -1,
        secure: true,
        cache_control: CACHE_CONTROL_DEFAULT,
        protection: PROTECTION_PRIVILEGED,
        endian_swap: EndianSwap::None,
    };

    /// Seed the channel-wide settings for a newly allocated channel
    pub(crate) fn set_defaults(&mut self, nonsecure: bool) {
        *self = Self::EMPTY;
        self.secure = !nonsecure;
        self.cache_control = CACHE_CONTROL_DEFAULT;
        self.protection = if nonsecure {
            PROTECTION_PRIVILEGED | PROTECTION_NONSECURE
        } else {
            PROTECTION_PRIVILEGED
        };
        self.endian_swap = EndianSwap::None;
    }

    /// Validate `params`, and return the descriptor for the transfer
    ///
    /// Channel-wide settings carry over from `self`.
    pub(crate) fn copy(&self, params: &TransferParams) -> Result<Self> {
        let mut burst_size = params.burst_size;
        match 1u32.checked_shl(burst_size as u32) {
            Some(beat) if beat <= MAX_BURST_SIZE => {}
            _ => return Err(Error::Parameter),
        }
        if params.burst_len == 0 || params.burst_len > MAX_BURST_LEN {
            return Err(Error::Parameter);
        }
        if params.callback.is_none() || params.num_bytes == 0 {
            return Err(Error::Parameter);
        }
        if params.direction.involves_device()
            && !(0..MAX_PERIPH_REQ).contains(&params.peripheral)
        {
            return Err(Error::Parameter);
        }

        let bits = params.destination | params.source | params.num_bytes as usize;
        let misaligned = |burst_size: u8| bits & ((1usize << burst_size) - 1) != 0;
        if params.direction.involves_device() {
            if misaligned(burst_size) {
                return Err(Error::Unaligned);
            }
        } else {
            while burst_size > 0 && misaligned(burst_size) {
                burst_size -= 1;
            }
        }

        Ok(Descriptor {
            direction: params.direction,
            source: params.source,
            destination: params.destination,
            source_global: 0,
            destination_global: 0,
            length: params.num_bytes,
            burst_len: params.burst_len,
            src_burst_size: burst_size,
            dst_burst_size: burst_size,
            peripheral: params.peripheral,
            ..*self
        })
    }

    /// Return the descriptor for a transfer that runs the caller's microcode
    ///
    /// Nothing is validated beyond the callback. The program decides what
    /// actually moves.
    pub(crate) fn for_user_program(&self, params: &TransferParams) -> Result<Self> {
        if params.callback.is_none() {
            return Err(Error::Parameter);
        }
        Ok(Descriptor {
            direction: params.direction,
            source: params.source,
            destination: params.destination,
            source_global: 0,
            destination_global: 0,
            length: params.num_bytes,
            peripheral: params.peripheral,
            ..*self
        })
    }

    /// Compute the controller's view of the addresses
    pub(crate) fn translate(&mut self, to_global: impl Fn(usize) -> u32) {
        self.source_global = to_global(self.source);
        self.destination_global = to_global(self.destination);
    }

    /// Returns the channel control register value for bursts of `burst_len` beats
    pub(crate) fn ccr(&self, burst_len: u8) -> u32 {
        let (src_inc, dst_inc) = match self.direction {
            Direction::MemToMem => (1, 1),
            Direction::MemToDev => (1, 0),
            Direction::DevToMem => (0, 1),
        };
        let len = (burst_len.saturating_sub(1) & 0xF) as u32;
        let protection = (self.protection & 0x7) as u32;
        let cache = (self.cache_control & 0x7) as u32;

        src_inc
            | ((self.src_burst_size as u32 & 0x7) << 1)
            | (len << 4)
            | (protection << 8)
            | (cache << 11)
            | (dst_inc << 14)
            | ((self.dst_burst_size as u32 & 0x7) << 15)
            | (len << 18)
            | (protection << 22)
            | (cache << 25)
            | (self.endian_swap.raw() << 28)
    }
}
