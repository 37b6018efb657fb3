//! Cortex-M platform support
//!
//! [`CortexM`] drives the DMA interrupts through the NVIC, and maintains
//! the data cache through the SCB. The SoC-specific parts (clocks, resets,
//! security configuration, address map) come from a [`Board`].
//!
//! Data cache maintenance operates on whole cache lines. Keep DMA buffers
//! cache line aligned, or an invalidation may discard neighboring data.

use cortex_m::{
    interrupt::InterruptNumber,
    peripheral::{NVIC, SCB},
};

use crate::platform::{Irq, Platform};

// Safety: the board describes valid interrupt numbers for its NVIC.
unsafe impl InterruptNumber for Irq {
    fn number(self) -> u16 {
        self.0
    }
}

/// The SoC-specific parts of a [`Platform`]
pub trait Board {
    /// Enable the controller's clock and power domain
    fn power_up(&mut self);
    /// Disable the controller's clock and power domain
    fn power_down(&mut self);
    /// Reset the controller
    fn reset(&mut self);
    /// Set the boot security state of the controller
    fn configure_security(&mut self, nonsecure: bool);
    /// Translate a CPU address into the controller's address map
    fn to_global(&self, address: usize) -> u32 {
        address as u32
    }
}

/// A Cortex-M platform
pub struct CortexM<B> {
    nvic: NVIC,
    scb: SCB,
    board: B,
}

impl<B: Board> CortexM<B> {
    /// Create the platform from the core peripherals, and the board
    pub fn new(nvic: NVIC, scb: SCB, board: B) -> Self {
        CortexM { nvic, scb, board }
    }

    /// Returns a reference to the board
    pub fn board(&self) -> &B {
        &self.board
    }

    /// Returns a mutable reference to the board
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }
}

impl<B: Board> Platform for CortexM<B> {
    fn power_up(&mut self) {
        self.board.power_up();
    }

    fn power_down(&mut self) {
        self.board.power_down();
    }

    fn reset(&mut self) {
        self.board.reset();
    }

    fn configure_security(&mut self, nonsecure: bool) {
        self.board.configure_security(nonsecure);
    }

    fn disable_irq(&mut self, irq: Irq) {
        NVIC::mask(irq);
    }

    fn clear_pending(&mut self, irq: Irq) {
        NVIC::unpend(irq);
    }

    fn set_priority(&mut self, irq: Irq, priority: u8) {
        // Safety: the driver only raises priorities of its own interrupts,
        // and it does so with the interrupt masked.
        unsafe { self.nvic.set_priority(irq, priority) };
    }

    fn enable_irq(&mut self, irq: Irq) {
        // Safety: the driver unmasks its interrupts inside a critical section,
        // after registering the handler's state.
        unsafe { NVIC::unmask(irq) };
    }

    fn clean_dcache(&mut self, address: usize, len: usize) {
        self.scb.clean_dcache_by_address(address, len);
    }

    fn invalidate_dcache(&mut self, address: usize, len: usize) {
        // Safety: the driver only invalidates memory that the DMA controller
        // writes. See the module documentation on alignment.
        unsafe { self.scb.invalidate_dcache_by_address(address, len) };
    }

    fn to_global(&self, address: usize) -> u32 {
        self.board.to_global(address)
    }
}
