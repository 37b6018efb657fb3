//! DMA interrupt support

use crate::{cache, channel, Callback, Engine, Event, Platform, State};

/// A callback to run once the driver's state is released
type Notify = Option<(Callback, i8)>;

impl<E: Engine, P: Platform, const CHANNELS: usize, const EVENTS: usize>
    crate::Dma<E, P, CHANNELS, EVENTS>
{
    /// Handle an event interrupt
    ///
    /// Acknowledges `event`, and completes the transfer on the event's
    /// channel. The transfer's callback runs before this returns.
    ///
    /// Call `on_interrupt` from the interrupt handler for `event`, which is
    /// interrupt number [`irq_base`](crate::Config::irq_base) + `event`.
    ///
    /// ```no_run
    /// # use pl330_dma::{Dma, Engine, Platform};
    /// # fn handler<E: Engine, P: Platform>(dma: &Dma<E, P, 8, 32>) {
    /// // #[interrupt]
    /// // fn DMA_IRQ3() {
    /// dma.on_interrupt(3);
    /// // }
    /// # }
    /// ```
    pub fn on_interrupt(&self, event: usize) {
        if event >= EVENTS {
            return;
        }
        let notify: Notify = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            self.engine.clear_event_interrupt(event);

            let channel = state.resources.channel_of(event)?;
            let State {
                platform,
                resources,
                channels,
                ..
            } = &mut *state;
            let descriptor = &channels[channel].descriptor;
            cache::invalidate_destination(platform, descriptor);

            log::debug!("DMA channel {channel} completed");
            resources
                .callback(event)
                .map(|callback| (callback, descriptor.peripheral))
        });

        if let Some((callback, peripheral)) = notify {
            callback(Event::Complete, peripheral);
        }
    }

    /// Handle the controller's abort interrupt
    ///
    /// If the manager faulted, every allocated channel aborts, and the
    /// driver refuses new transfers until it's powered off and on again.
    /// Then, every faulted channel is killed, and its transfer aborts.
    /// Aborted transfers receive [`Event::Abort`]. A killed channel may be
    /// started again from its callback.
    ///
    /// Call `on_abort` from the interrupt handler for
    /// [`abort_irq`](crate::Config::abort_irq).
    pub fn on_abort(&self) {
        let mut manager: [Notify; CHANNELS] = [None; CHANNELS];
        let mut faulted: [Notify; CHANNELS] = [None; CHANNELS];

        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            self.abort_manager(&mut state, &mut manager);
            self.abort_channels(&mut state, &mut faulted);
        });

        for (callback, peripheral) in manager.into_iter().chain(faulted).flatten() {
            callback(Event::Abort, peripheral);
        }
    }

    /// Abort every allocated channel if the manager faulted
    fn abort_manager(
        &self,
        state: &mut State<P, CHANNELS, EVENTS>,
        notify: &mut [Notify; CHANNELS],
    ) {
        let Some(fault) = self.engine.manager_fault() else {
            return;
        };
        log::error!("DMA manager fault: {fault}");
        state.faulted = true;

        let State {
            platform,
            resources,
            channels,
            ..
        } = state;
        for (channel, slot) in channels.iter().enumerate() {
            if !resources.is_allocated(channel) {
                continue;
            }
            cache::invalidate_destination(platform, &slot.descriptor);
            notify[channel] = slot
                .event
                .and_then(|event| resources.callback(event))
                .map(|callback| (callback, slot.descriptor.peripheral));
        }
    }

    /// Kill and abort every faulted channel
    fn abort_channels(
        &self,
        state: &mut State<P, CHANNELS, EVENTS>,
        notify: &mut [Notify; CHANNELS],
    ) {
        let State {
            platform,
            resources,
            channels,
            ..
        } = state;
        for (channel, slot) in channels.iter().enumerate() {
            let Some(fault) = self.engine.channel_fault(channel) else {
                continue;
            };
            log::warn!("DMA channel {channel} fault: {fault}");

            let timeout = self.config.stop_timeout;
            let idle = channel::wait(timeout, || !self.engine.is_debug_busy());
            if idle.is_err() || channel::kill(&self.engine, channel, timeout).is_err() {
                log::error!("Couldn't kill faulted DMA channel {channel}");
            }

            if !resources.is_allocated(channel) {
                continue;
            }
            self.quiesce(platform, slot);
            notify[channel] = slot
                .event
                .and_then(|event| resources.callback(event))
                .map(|callback| (callback, slot.descriptor.peripheral));
        }
    }
}
