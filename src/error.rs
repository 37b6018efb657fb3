//! DMA errors

use core::fmt::{self, Debug, Display};

/// Errors returned by the DMA driver
///
/// Busy conditions come in two flavors. [`Busy`](Error::Busy) means the
/// channel itself is still executing. [`ControllerBusy`](Error::ControllerBusy)
/// means the controller's debug interface, shared by every channel, is
/// processing another command. Both are transient; see [`is_busy`](Error::is_busy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The driver is not initialized or not powered, or the controller
    /// needs a power cycle after a manager fault
    Driver,
    /// An argument is out of range
    Parameter,
    /// The channel handle is out of range, or the channel isn't allocated
    Handle,
    /// There's no free event line
    Event,
    /// The transfer doesn't fit in the channel's microcode buffer
    Buffer,
    /// The channel is not stopped
    Busy,
    /// The controller's debug interface is busy
    ControllerBusy,
    /// The channel is faulting
    Fault(Fault),
    /// A peripheral transfer isn't aligned to its burst size
    Unaligned,
    /// The request isn't supported
    Unsupported,
    /// The channel didn't stop in time
    Timeout,
}

impl Error {
    /// Returns `true` if the caller may retry the request later
    pub const fn is_busy(&self) -> bool {
        matches!(self, Error::Busy | Error::ControllerBusy)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Driver => f.write_str("DMA driver not ready"),
            Error::Parameter => f.write_str("invalid DMA parameter"),
            Error::Handle => f.write_str("invalid DMA channel handle"),
            Error::Event => f.write_str("no free DMA event"),
            Error::Buffer => f.write_str("DMA microcode buffer overflow"),
            Error::Busy => f.write_str("DMA channel busy"),
            Error::ControllerBusy => f.write_str("DMA debug interface busy"),
            Error::Fault(fault) => write!(f, "DMA channel fault: {fault}"),
            Error::Unaligned => f.write_str("DMA peripheral transfer not aligned"),
            Error::Unsupported => f.write_str("unsupported DMA request"),
            Error::Timeout => f.write_str("DMA channel did not stop"),
        }
    }
}

/// A wrapper around a fault type register value
///
/// The wrapper contains a copy of a channel's (or the manager's)
/// fault type register at the point of the fault. Print it to
/// understand why the thread faulted.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// The raw fault type
    ftr: u32,
}

impl Fault {
    /// Wrap a raw fault type register value
    pub const fn new(ftr: u32) -> Self {
        Fault { ftr }
    }
    /// Returns the raw fault type value
    pub const fn raw(self) -> u32 {
        self.ftr
    }
}

impl Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DMA_FTR({:#010X})", self.ftr)
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
             "DMA_FTR: LOCKUP {lockup} DBG {dbg} DREAD {dread} DWRITE {dwrite} IFETCH {ifetch} STDATA {stdata} MFIFO {mfifo} RDWR {rdwr} PERIPH {periph} EVNT {evnt} OPERAND {operand} UNDEF {undef}",
             lockup = (self.ftr >> 31) & 0x1,
             dbg = (self.ftr >> 30) & 0x1,
             dread = (self.ftr >> 18) & 0x1,
             dwrite = (self.ftr >> 17) & 0x1,
             ifetch = (self.ftr >> 16) & 0x1,
             stdata = (self.ftr >> 13) & 0x1,
             mfifo = (self.ftr >> 12) & 0x1,
             rdwr = (self.ftr >> 7) & 0x1,
             periph = (self.ftr >> 6) & 0x1,
             evnt = (self.ftr >> 5) & 0x1,
             operand = (self.ftr >> 1) & 0x1,
             undef = self.ftr & 0x1
         )
    }
}
