//! Channel manager for micro-coded DMA controllers
//!
//! `pl330-dma` turns one shared DMA-330 style controller into independent,
//! dynamically allocated channels. It provides
//!
//! - channel and event allocation.
//! - microcode generation for memory-to-memory, memory-to-peripheral, and
//!   peripheral-to-memory transfers.
//! - data cache maintenance around every transfer.
//! - completion and abort callbacks, driven from your interrupt handlers.
//! - reference counted power management for multiple consumers.
//!
//! # Getting started
//!
//! To create a [`Dma`] driver, you'll need
//!
//! 1. an [`Engine`]. For real hardware, that's a [`Pl330`] pointing at the
//!    controller's registers.
//! 2. a [`Platform`] that provides clocks, resets, interrupt control, and
//!    cache maintenance. On Cortex-M cores, consider [`cortex::CortexM`].
//! 3. a [`Config`] describing the controller's interrupt lines.
//!
//! Assign the `Dma` to a static. The controller fetches each channel's
//! program from memory owned by the driver, so the driver must not move
//! while transfers are in flight.
//!
//! ```no_run
//! use pl330_dma::{Config, Direction, Dma, Event, Pl330, PowerState, TransferParams};
//! # struct Board;
//! # impl pl330_dma::Platform for Board {
//! #   fn power_up(&mut self) {}
//! #   fn power_down(&mut self) {}
//! #   fn reset(&mut self) {}
//! #   fn configure_security(&mut self, _: bool) {}
//! #   fn disable_irq(&mut self, _: pl330_dma::Irq) {}
//! #   fn clear_pending(&mut self, _: pl330_dma::Irq) {}
//! #   fn set_priority(&mut self, _: pl330_dma::Irq, _: u8) {}
//! #   fn enable_irq(&mut self, _: pl330_dma::Irq) {}
//! #   fn clean_dcache(&mut self, _: usize, _: usize) {}
//! #   fn invalidate_dcache(&mut self, _: usize, _: usize) {}
//! # }
//! # const DMA_PTR: *const () = core::ptr::null();
//!
//! // Safety: the controller registers live at DMA_PTR.
//! static DMA: Dma<Pl330, Board, 8, 32> =
//!     Dma::new(unsafe { Pl330::new(DMA_PTR) }, Board, Config::new(32, 64));
//!
//! fn on_done(event: Event, _peripheral: i8) {
//!     // Runs in interrupt context.
//! }
//!
//! // #[interrupt]
//! fn DMA_IRQ0() {
//!     DMA.on_interrupt(0);
//! }
//!
//! # fn main() -> pl330_dma::Result<()> {
//! DMA.initialize()?;
//! DMA.power_control(PowerState::Full)?;
//!
//! let channel = DMA.allocate()?;
//! let source = [1u32; 64];
//! let mut destination = [0u32; 64];
//! let params = TransferParams::new(
//!     Direction::MemToMem,
//!     source.as_ptr() as usize,
//!     destination.as_mut_ptr() as usize,
//!     256,
//!     on_done,
//! );
//! // Safety: buffers outlive the transfer.
//! unsafe { DMA.start(channel, &params)? };
//! # Ok(()) }
//! ```
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![no_std]

mod allocator;
mod cache;
mod channel;
pub mod cortex;
mod descriptor;
mod engine;
mod error;
mod interrupt;
mod microcode;
pub mod platform;
mod power;
mod ral;

pub use descriptor::{
    Descriptor, Direction, EndianSwap, TransferParams, MAX_BURST_LEN, MAX_BURST_SIZE,
    MAX_PERIPH_REQ,
};
pub use engine::{Command, DebugInstruction, Engine, Pl330, ThreadStatus};
pub use error::{Error, Fault};
pub use microcode::{Microcode, MICROCODE_SIZE};
pub use platform::{Irq, Platform};
pub use power::{Capabilities, PowerState, Version};

use core::cell::RefCell;
use critical_section::Mutex;

/// A DMA result
pub type Result<T> = core::result::Result<T, Error>;

/// Most channels supported by the controller
pub const MAX_CHANNELS: usize = 8;
/// Most events supported by the controller
pub const MAX_EVENTS: usize = 32;

/// Polls of a killed channel before [`stop`](Dma::stop) gives up
pub const DEFAULT_STOP_TIMEOUT: u32 = 100_000;

/// What happened to a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The transfer finished
    Complete,
    /// The transfer was stopped by a fault
    Abort,
}

/// A transfer callback
///
/// Receives the [`Event`] and the transfer's peripheral request number.
///
/// Callbacks run in interrupt context. They must not block. They may call
/// back into the driver, for instance to start the next transfer.
pub type Callback = fn(Event, i8);

/// A channel allocated by [`Dma::allocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

impl Handle {
    /// Create a handle for `channel`
    ///
    /// The driver rejects handles for channels that aren't allocated.
    pub const fn new(channel: usize) -> Self {
        Handle(channel)
    }

    /// Returns the channel number
    pub const fn channel(self) -> usize {
        self.0
    }
}

/// Out-of-band channel configuration for [`Dma::control`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Run this program instead of generating one
    ///
    /// The program must signal the channel's event (see [`Dma::event`])
    /// and end with `DMAEND`.
    UserMicrocode(&'static [u8]),
    /// Service the peripheral one beat per request
    ///
    /// Use this for audio interfaces that carry a single channel in a
    /// stereo frame, and never raise burst requests.
    I2sMonoMode,
    /// Send data to a peripheral without handshaking
    ///
    /// Use this for peripherals that always accept data, like a CRC engine.
    CrcMode,
    /// Swap bytes within each beat. The size is in bits, one of 8 (no
    /// swapping), 16, 32, 64, or 128.
    EndianSwap(u32),
}

/// Driver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Interrupt number for event 0. Event `n` interrupts on `irq_base + n`.
    pub irq_base: u16,
    /// Interrupt number for the controller's abort interrupt
    pub abort_irq: u16,
    /// Priority of the abort interrupt
    pub abort_priority: u8,
    /// Run the manager and all channels in the non-secure state
    pub nonsecure: bool,
    /// Polls of a killed channel before giving up
    ///
    /// `None` waits forever.
    pub stop_timeout: Option<u32>,
}

impl Config {
    /// A secure configuration with the default stop timeout
    pub const fn new(irq_base: u16, abort_irq: u16) -> Self {
        Config {
            irq_base,
            abort_irq,
            abort_priority: 0,
            nonsecure: false,
            stop_timeout: Some(DEFAULT_STOP_TIMEOUT),
        }
    }

    /// Returns the interrupt for `event`
    ///
    /// [`Dma::new`] checks that every event's interrupt fits.
    pub(crate) const fn event_irq(&self, event: usize) -> Irq {
        Irq(self.irq_base + event as u16)
    }
}

/// Per-channel state
#[derive(Clone, Copy)]
pub(crate) struct ChannelState {
    pub(crate) event: Option<usize>,
    pub(crate) descriptor: Descriptor,
    pub(crate) mode: microcode::Mode,
    pub(crate) user_program: Option<&'static [u8]>,
    pub(crate) microcode: Microcode,
}

impl ChannelState {
    const FREE: Self = ChannelState {
        event: None,
        descriptor: Descriptor::EMPTY,
        mode: microcode::Mode {
            mono: false,
            crc: false,
        },
        user_program: None,
        microcode: Microcode::EMPTY,
    };
}

/// Everything guarded by the critical section
pub(crate) struct State<P, const CHANNELS: usize, const EVENTS: usize> {
    pub(crate) platform: P,
    pub(crate) initialized: bool,
    pub(crate) powered: bool,
    /// The manager faulted. Only a power cycle recovers.
    pub(crate) faulted: bool,
    pub(crate) consumers: u32,
    pub(crate) resources: allocator::Resources<CHANNELS, EVENTS>,
    pub(crate) channels: [ChannelState; CHANNELS],
}

impl<P, const CHANNELS: usize, const EVENTS: usize> State<P, CHANNELS, EVENTS> {
    /// Returns the channel behind `handle`, if it's allocated
    pub(crate) fn channel(&self, handle: Handle) -> Result<usize> {
        if handle.0 < CHANNELS && self.resources.is_allocated(handle.0) {
            Ok(handle.0)
        } else {
            Err(Error::Handle)
        }
    }

    /// Returns the channel behind `handle`, if the driver is powered
    pub(crate) fn powered_channel(&self, handle: Handle) -> Result<usize> {
        if !self.powered {
            return Err(Error::Driver);
        }
        self.channel(handle)
    }
}

/// A DMA driver
///
/// `Dma` owns the controller. It allocates channels, and schedules
/// transfers on them. All of its bookkeeping happens inside a critical
/// section, so you may share a `Dma` between thread mode and interrupt
/// handlers.
///
/// `CHANNELS` is the number of channels the controller implements, up to
/// [`MAX_CHANNELS`]. `EVENTS` is the number of event lines, up to
/// [`MAX_EVENTS`]. Every allocated channel needs one event.
///
/// A `Dma` may be shared only if its engine may be shared.
///
/// ```compile_fail
/// use core::cell::RefCell;
/// fn is_sync<T: Sync>() {}
/// is_sync::<pl330_dma::Dma<RefCell<u32>, (), 8, 32>>();
/// ```
pub struct Dma<E, P, const CHANNELS: usize, const EVENTS: usize> {
    engine: E,
    config: Config,
    state: Mutex<RefCell<State<P, CHANNELS, EVENTS>>>,
}

// Safety: OK to allocate a DMA driver in a static context. The platform is
// only used inside the critical section. The engine is shared through
// `engine()`, so it must be Sync itself.
unsafe impl<E: Sync, P: Send, const CHANNELS: usize, const EVENTS: usize> Sync
    for Dma<E, P, CHANNELS, EVENTS>
{
}

impl<E, P, const CHANNELS: usize, const EVENTS: usize> Dma<E, P, CHANNELS, EVENTS> {
    /// Create the DMA driver
    ///
    /// Note that this can evaluate at compile time. The driver starts
    /// uninitialized and unpowered.
    ///
    /// # Panics
    ///
    /// Panics if `CHANNELS` or `EVENTS` exceed what the controller supports,
    /// or if an event's interrupt number, `irq_base + event`, doesn't fit
    /// in a `u16`.
    pub const fn new(engine: E, platform: P, config: Config) -> Self {
        assert!(CHANNELS <= MAX_CHANNELS, "too many DMA channels");
        assert!(EVENTS <= MAX_EVENTS, "too many DMA events");
        assert!(
            config.irq_base as usize + EVENTS <= u16::MAX as usize + 1,
            "DMA event interrupts exceed u16::MAX"
        );
        Dma {
            engine,
            config,
            state: Mutex::new(RefCell::new(State {
                platform,
                initialized: false,
                powered: false,
                faulted: false,
                consumers: 0,
                resources: allocator::Resources::new(),
                channels: [ChannelState::FREE; CHANNELS],
            })),
        }
    }

    /// Returns the engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the driver configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run `f` with the platform
    pub fn with_platform<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs).platform))
    }
}
