//! Driver lifecycle and power management

use crate::{allocator::Resources, ChannelState, Engine, Error, Irq, Platform, Result};

/// Requested power state for [`power_control`](crate::Dma::power_control)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Release one consumer's claim on the controller
    Off,
    /// Not supported by this driver
    Low,
    /// Claim the controller for one consumer
    Full,
}

/// Driver version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    /// Version of the driver interface, as `major << 8 | minor`
    pub api: u16,
    /// Version of this implementation, as `major << 8 | minor`
    pub driver: u16,
}

/// What the driver can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub mem_to_mem: bool,
    pub mem_to_periph: bool,
    pub periph_to_mem: bool,
    /// Always `false`. Each transfer runs one descriptor.
    pub scatter_gather: bool,
    /// `true` if transfers run in the secure state
    pub secure_mode: bool,
}

const API_VERSION: u16 = 0x0100;
const DRIVER_VERSION: u16 = 0x0100;

impl<E: Engine, P: Platform, const CHANNELS: usize, const EVENTS: usize>
    crate::Dma<E, P, CHANNELS, EVENTS>
{
    /// Returns the driver version
    pub const fn version(&self) -> Version {
        Version {
            api: API_VERSION,
            driver: DRIVER_VERSION,
        }
    }

    /// Returns the driver capabilities
    pub const fn capabilities(&self) -> Capabilities {
        Capabilities {
            mem_to_mem: true,
            mem_to_periph: true,
            periph_to_mem: true,
            scatter_gather: false,
            secure_mode: !self.config.nonsecure,
        }
    }

    /// Prepare the driver for use
    ///
    /// The first call frees all channels and events, and forgets all
    /// callbacks. Later calls do nothing.
    pub fn initialize(&self) -> Result<()> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.initialized {
                return Ok(());
            }
            state.resources = Resources::new();
            state.channels = [ChannelState::FREE; CHANNELS];
            state.initialized = true;
            log::debug!("Initialized DMA driver");
            Ok(())
        })
    }

    /// Undo [`initialize`](Self::initialize)
    ///
    /// While the driver is powered, this does nothing, since other consumers
    /// may still use the controller.
    pub fn uninitialize(&self) -> Result<()> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if !state.powered {
                state.initialized = false;
            }
            Ok(())
        })
    }

    /// Power the controller on or off
    ///
    /// Each [`PowerState::Full`] must be balanced by a [`PowerState::Off`].
    /// The first `Full` powers and resets the controller, and enables the
    /// abort interrupt. The matching last `Off` disables every interrupt, and
    /// powers the controller down.
    ///
    /// Powering on also recovers from a manager fault, provided that every
    /// consumer powered off first.
    pub fn power_control(&self, power: PowerState) -> Result<()> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            match power {
                PowerState::Low => Err(Error::Unsupported),
                PowerState::Full => {
                    if !state.initialized {
                        return Err(Error::Driver);
                    }
                    state.consumers += 1;
                    if state.consumers > 1 {
                        return Ok(());
                    }

                    let abort = Irq(self.config.abort_irq);
                    let platform = &mut state.platform;
                    platform.power_up();
                    platform.reset();
                    platform.configure_security(self.config.nonsecure);
                    platform.disable_irq(abort);
                    platform.clear_pending(abort);
                    platform.set_priority(abort, self.config.abort_priority);
                    platform.enable_irq(abort);

                    state.powered = true;
                    state.faulted = false;
                    log::debug!("Powered on DMA controller");
                    Ok(())
                }
                PowerState::Off => {
                    if state.consumers == 0 {
                        return Ok(());
                    }
                    state.consumers -= 1;
                    if state.consumers > 0 {
                        return Ok(());
                    }

                    let platform = &mut state.platform;
                    platform.disable_irq(Irq(self.config.abort_irq));
                    for event in 0..EVENTS {
                        let irq = self.config.event_irq(event);
                        platform.disable_irq(irq);
                        platform.clear_pending(irq);
                    }
                    platform.power_down();

                    state.powered = false;
                    log::debug!("Powered off DMA controller");
                    Ok(())
                }
            }
        })
    }

    /// Returns `true` if the controller is powered
    pub fn is_powered(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).powered)
    }

    /// Returns `true` if the manager faulted since the controller powered on
    pub fn is_faulted(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).faulted)
    }
}
