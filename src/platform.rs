//! Platform services used by the DMA driver
//!
//! The controller IP doesn't own its clock, reset, interrupt lines, or the
//! CPU's data cache. A [`Platform`] supplies them. See
//! [`CortexM`](crate::cortex::CortexM) for an implementation on Cortex-M
//! cores.

/// An interrupt number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Irq(pub u16);

/// Clock, reset, interrupt, and cache services for a DMA controller
pub trait Platform {
    /// Enable the controller's clock and power domain
    fn power_up(&mut self);
    /// Disable the controller's clock and power domain
    fn power_down(&mut self);
    /// Reset the controller
    fn reset(&mut self);
    /// Set the boot security state of the manager thread and the
    /// controller's interrupt lines
    fn configure_security(&mut self, nonsecure: bool);

    /// Mask `irq`
    fn disable_irq(&mut self, irq: Irq);
    /// Clear any pending `irq`
    fn clear_pending(&mut self, irq: Irq);
    /// Set the priority of `irq`
    fn set_priority(&mut self, irq: Irq, priority: u8);
    /// Unmask `irq`
    fn enable_irq(&mut self, irq: Irq);

    /// Write back any dirty cache lines covering `[address, address + len)`
    fn clean_dcache(&mut self, address: usize, len: usize);
    /// Discard any cache lines covering `[address, address + len)`
    fn invalidate_dcache(&mut self, address: usize, len: usize);

    /// Translate a CPU address into the address the controller uses
    /// for the same memory
    ///
    /// The default implementation assumes both share one address map.
    fn to_global(&self, address: usize) -> u32 {
        address as u32
    }
}
