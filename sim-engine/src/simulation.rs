use std::fmt;
use std::time::Duration;

use crate::{Component, ComponentId, Components, QueueId, Scheduler, State};

/// The main simulation object: owns the state, the scheduler, and all components.
#[derive(Default)]
pub struct Simulation {
    /// Current state of the simulation meant to be mutated by the components.
    pub state: State,
    /// Schedules events and maintains the clock.
    pub scheduler: Scheduler,
    components: Components,
}

impl Simulation {
    /// Adds a new component.
    #[must_use]
    pub fn add_component<E, C>(&mut self, component: C) -> ComponentId<E>
    where
        E: fmt::Debug + 'static,
        C: Component<Event = E> + 'static,
    {
        self.components.add_component(component)
    }

    /// Returns a reference to a previously added component of type `C`.
    #[must_use]
    pub fn component<C>(&self, id: ComponentId<C::Event>) -> Option<&C>
    where
        C: Component + 'static,
    {
        self.components.get(id)
    }

    /// Adds a new unbounded queue.
    #[must_use]
    pub fn add_queue<V: 'static>(&mut self) -> QueueId<V> {
        self.state.new_queue()
    }

    /// Schedules `event` for `component`, to be delivered `delay` after the current time.
    pub fn schedule<E: fmt::Debug + 'static>(
        &mut self,
        delay: Duration,
        component: ComponentId<E>,
        event: E,
    ) {
        self.scheduler.schedule(delay, component, event);
    }

    /// Performs one step of the simulation. Returns `true` if there was in fact an event
    /// available to process, and `false` instead, which signifies that the simulation
    /// ended.
    pub fn step(&mut self) -> bool {
        if let Some(event) = self.scheduler.pop() {
            self.components
                .process_event_entry(&event, &mut self.scheduler, &mut self.state);
            true
        } else {
            false
        }
    }

    /// Runs until the horizon `time`, processing every event scheduled at or before it.
    /// Events scheduled after the horizon stay in the scheduler unprocessed. Afterwards, the
    /// clock shows `time`, even if the last event happened earlier.
    ///
    /// Returns the number of processed events.
    pub fn run_until(&mut self, time: Duration) -> usize {
        self.run_until_with(time, |_| {})
    }

    /// Same as [`Simulation::run_until`] but calls `after_step` after each processed event.
    pub fn run_until_with<F>(&mut self, time: Duration, mut after_step: F) -> usize
    where
        F: FnMut(&Self),
    {
        let mut processed = 0;
        while self.scheduler.peek_time().map_or(false, |next| next <= time) {
            self.step();
            processed += 1;
            after_step(self);
        }
        self.scheduler.advance_to(time);
        processed
    }
}
