//! Channel and event allocation
//!
//! The tables here are only touched inside the driver's critical section.

use crate::{Callback, Error, Result};

/// Free sets for channels and events, plus each event's callback
#[derive(Clone, Copy)]
pub(crate) struct Resources<const CHANNELS: usize, const EVENTS: usize> {
    /// `true` if the channel is allocated
    channels: [bool; CHANNELS],
    /// The channel bound to each event
    events: [Option<usize>; EVENTS],
    callbacks: [Option<Callback>; EVENTS],
}

impl<const CHANNELS: usize, const EVENTS: usize> Resources<CHANNELS, EVENTS> {
    pub(crate) const fn new() -> Self {
        Resources {
            channels: [false; CHANNELS],
            events: [None; EVENTS],
            callbacks: [None; EVENTS],
        }
    }

    /// Take the first free channel
    pub(crate) fn allocate_channel(&mut self) -> Result<usize> {
        let channel = self
            .channels
            .iter()
            .position(|allocated| !allocated)
            .ok_or(Error::Handle)?;
        self.channels[channel] = true;
        Ok(channel)
    }

    /// Take the first free event, and bind it to `channel`
    pub(crate) fn allocate_event(&mut self, channel: usize) -> Result<usize> {
        let event = self
            .events
            .iter()
            .position(Option::is_none)
            .ok_or(Error::Event)?;
        self.events[event] = Some(channel);
        Ok(event)
    }

    pub(crate) fn release_channel(&mut self, channel: usize) {
        self.channels[channel] = false;
    }

    /// Free `event`, and forget its callback
    pub(crate) fn release_event(&mut self, event: usize) {
        self.events[event] = None;
        self.callbacks[event] = None;
    }

    pub(crate) fn is_allocated(&self, channel: usize) -> bool {
        self.channels.get(channel).copied().unwrap_or(false)
    }

    /// Returns the channel bound to `event`
    pub(crate) fn channel_of(&self, event: usize) -> Option<usize> {
        self.events.get(event).copied().flatten()
    }

    pub(crate) fn set_callback(&mut self, event: usize, callback: Callback) {
        self.callbacks[event] = Some(callback);
    }

    pub(crate) fn callback(&self, event: usize) -> Option<Callback> {
        self.callbacks.get(event).copied().flatten()
    }
}
