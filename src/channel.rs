//! DMA channels
//!
//! A channel is one thread of the controller. Allocate a channel, optionally
//! [`control`](crate::Dma::control) it, then [`start`](crate::Dma::start)
//! transfers on it. Each allocated channel owns one event, which the
//! channel's program signals when the transfer completes.

use crate::{
    cache,
    descriptor::EndianSwap,
    microcode::{self, Microcode},
    ChannelState, Control, Descriptor, DebugInstruction, Engine, Error, Fault, Handle, Platform,
    Result, State, ThreadStatus, TransferParams,
};

impl<E: Engine, P: Platform, const CHANNELS: usize, const EVENTS: usize>
    crate::Dma<E, P, CHANNELS, EVENTS>
{
    /// Allocate a channel, and an event for that channel
    ///
    /// Returns [`Error::Handle`] when all channels are taken, or
    /// [`Error::Event`] when all events are taken.
    pub fn allocate(&self) -> Result<Handle> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if !state.powered {
                return Err(Error::Driver);
            }
            let channel = state.resources.allocate_channel()?;
            let event = match state.resources.allocate_event(channel) {
                Ok(event) => event,
                Err(err) => {
                    state.resources.release_channel(channel);
                    return Err(err);
                }
            };

            let slot = &mut state.channels[channel];
            *slot = ChannelState::FREE;
            slot.event = Some(event);
            slot.descriptor.set_defaults(self.config.nonsecure);

            log::debug!("Allocated DMA channel {channel} with event {event}");
            Ok(Handle(channel))
        })
    }

    /// Release a channel, and its event
    ///
    /// The channel must be stopped. Otherwise, this returns [`Error::Busy`].
    pub fn deallocate(&self, handle: Handle) -> Result<()> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let channel = state.powered_channel(handle)?;
            if self.engine.thread_status(channel) != ThreadStatus::Stopped {
                return Err(Error::Busy);
            }
            if let Some(event) = state.channels[channel].event {
                state.resources.release_event(event);
            }
            state.resources.release_channel(channel);
            state.channels[channel] = ChannelState::FREE;

            log::debug!("Released DMA channel {channel}");
            Ok(())
        })
    }

    /// Change how the channel performs its transfers
    ///
    /// Settings apply to every later [`start`](Self::start), and remain until
    /// the channel is released.
    pub fn control(&self, handle: Handle, control: Control) -> Result<()> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if !state.initialized {
                return Err(Error::Driver);
            }
            let channel = state.channel(handle)?;
            let slot = &mut state.channels[channel];
            match control {
                Control::UserMicrocode(program) => {
                    if program.is_empty() {
                        return Err(Error::Parameter);
                    }
                    slot.user_program = Some(program);
                }
                Control::I2sMonoMode => slot.mode.mono = true,
                Control::CrcMode => slot.mode.crc = true,
                Control::EndianSwap(bits) => {
                    slot.descriptor.endian_swap = EndianSwap::try_from(bits)?;
                }
            }
            Ok(())
        })
    }

    /// Start a transfer
    ///
    /// On success, the channel is running, and `params.callback` runs once the
    /// transfer completes or aborts. If this returns an error, the controller
    /// is untouched.
    ///
    /// # Safety
    ///
    /// The controller reads and writes the memory described by `params`
    /// without the compiler's knowledge. Both buffers must be valid, and must
    /// not be otherwise accessed, until the transfer completes or you
    /// [`stop`](Self::stop) it.
    pub unsafe fn start(&self, handle: Handle, params: &TransferParams) -> Result<()> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if !state.powered || state.faulted {
                return Err(Error::Driver);
            }
            let channel = state.channel(handle)?;
            if self.engine.is_debug_busy() {
                return Err(Error::ControllerBusy);
            }
            if self.engine.thread_status(channel) != ThreadStatus::Stopped {
                return Err(Error::Busy);
            }

            let State {
                platform,
                resources,
                channels,
                ..
            } = &mut *state;
            let slot = &mut channels[channel];
            let event = slot.event.ok_or(Error::Event)?;
            let callback = params.callback.ok_or(Error::Parameter)?;

            let mut descriptor = match slot.user_program {
                Some(_) => slot.descriptor.for_user_program(params)?,
                None => slot.descriptor.copy(params)?,
            };
            descriptor.translate(|address| platform.to_global(address));

            if slot.user_program.is_none() {
                let mut program = Microcode::EMPTY;
                let len = microcode::generate(&mut program, &descriptor, slot.mode, event)?;
                log::debug!("DMA channel {channel} program is {len} bytes");
                slot.microcode = program;
            }
            slot.descriptor = descriptor;

            // Nothing fails after this point.
            let program = match slot.user_program {
                Some(program) => {
                    cache::clean_user_program(platform, program);
                    program.as_ptr() as usize
                }
                None => {
                    cache::clean_program(platform, &slot.microcode);
                    slot.microcode.as_bytes().as_ptr() as usize
                }
            };
            cache::clean_source(platform, &descriptor);
            cache::invalidate_destination(platform, &descriptor);

            resources.set_callback(event, callback);

            let irq = self.config.event_irq(event);
            platform.disable_irq(irq);
            platform.clear_pending(irq);
            platform.set_priority(irq, params.irq_priority);
            platform.enable_irq(irq);

            self.engine.clear_event_interrupt(event);
            self.engine.set_event_interrupt(event, true);

            let program = platform.to_global(program);
            self.engine.execute(DebugInstruction::go(
                channel,
                program,
                !descriptor.secure,
            ));

            log::debug!(
                "Started DMA channel {channel}: {:?} {} bytes, {:#010X} -> {:#010X}",
                descriptor.direction,
                descriptor.length,
                descriptor.source_global,
                descriptor.destination_global
            );
            Ok(())
        })
    }

    /// Stop a transfer
    ///
    /// Returns once the channel is stopped. Stopping a stopped channel does
    /// nothing. If the channel doesn't stop within the configured
    /// [`stop_timeout`](crate::Config::stop_timeout), this returns
    /// [`Error::Timeout`].
    pub fn stop(&self, handle: Handle) -> Result<()> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let channel = state.powered_channel(handle)?;
            if self.engine.thread_status(channel) == ThreadStatus::Stopped {
                return Ok(());
            }
            if self.engine.is_debug_busy() {
                return Err(Error::ControllerBusy);
            }

            kill(&self.engine, channel, self.config.stop_timeout)?;

            let State {
                platform, channels, ..
            } = &mut *state;
            self.quiesce(platform, &channels[channel]);

            log::debug!("Stopped DMA channel {channel}");
            Ok(())
        })
    }

    /// Silence a stopped channel's completion interrupt, and drop its
    /// destination from the cache
    pub(crate) fn quiesce(&self, platform: &mut P, slot: &ChannelState) {
        if let Some(event) = slot.event {
            let irq = self.config.event_irq(event);
            platform.disable_irq(irq);
            platform.clear_pending(irq);
            self.engine.set_event_interrupt(event, false);
            self.engine.clear_event_interrupt(event);
        }
        cache::invalidate_destination(platform, &slot.descriptor);
    }

    /// Returns the number of bytes transferred by the channel
    ///
    /// The count comes from the controller's address registers, so it's only
    /// meaningful for the current transfer. Memory to peripheral transfers
    /// count from the source. Other transfers count at the destination.
    ///
    /// If the channel faulted, this returns [`Error::Fault`]. The channel
    /// stays faulted.
    pub fn status(&self, handle: Handle) -> Result<u32> {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            let channel = state.powered_channel(handle)?;
            if self.engine.thread_status(channel).is_faulting() {
                let fault = self.engine.channel_fault(channel);
                return Err(Error::Fault(fault.unwrap_or(Fault::new(0))));
            }
            Ok(transferred(&self.engine, channel, &state.channels[channel].descriptor))
        })
    }

    /// Returns the event used by the channel
    ///
    /// Programs supplied with [`Control::UserMicrocode`] signal this event
    /// when they're done.
    pub fn event(&self, handle: Handle) -> Result<usize> {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            let channel = state.channel(handle)?;
            state.channels[channel].event.ok_or(Error::Handle)
        })
    }

    /// Returns the descriptor of the channel's most recent transfer
    pub fn descriptor(&self, handle: Handle) -> Result<Descriptor> {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            let channel = state.channel(handle)?;
            Ok(state.channels[channel].descriptor)
        })
    }

    /// Returns the channel's thread status
    pub fn thread_status(&self, handle: Handle) -> Result<ThreadStatus> {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            let channel = state.powered_channel(handle)?;
            Ok(self.engine.thread_status(channel))
        })
    }
}

fn transferred<E: Engine>(engine: &E, channel: usize, descriptor: &Descriptor) -> u32 {
    match descriptor.direction {
        crate::Direction::MemToDev => engine
            .source_address(channel)
            .wrapping_sub(descriptor.source_global),
        _ => engine
            .destination_address(channel)
            .wrapping_sub(descriptor.destination_global),
    }
}

/// Kill `channel`, and wait for it to stop
pub(crate) fn kill<E: Engine>(engine: &E, channel: usize, timeout: Option<u32>) -> Result<()> {
    engine.execute(DebugInstruction::kill(channel));
    let stopped = wait(timeout, || {
        engine.thread_status(channel) == ThreadStatus::Stopped
    });
    if stopped.is_err() {
        log::warn!("DMA channel {channel} didn't stop after a kill");
    }
    stopped
}

/// Poll `done` until it's true, at most `timeout` times
pub(crate) fn wait(timeout: Option<u32>, mut done: impl FnMut() -> bool) -> Result<()> {
    match timeout {
        None => {
            while !done() {
                core::hint::spin_loop();
            }
            Ok(())
        }
        Some(polls) => {
            for _ in 0..polls {
                if done() {
                    return Ok(());
                }
                core::hint::spin_loop();
            }
            if done() {
                Ok(())
            } else {
                Err(Error::Timeout)
            }
        }
    }
}
