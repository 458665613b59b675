use std::any::Any;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::{Clock, ComponentId};

/// An event waiting in the [`Scheduler`] together with its recipient and delivery time.
///
/// Entries compare by time first. Entries with equal times compare by the order in which
/// they were scheduled, so that the earlier one is smaller.
#[derive(Debug)]
pub struct EventEntry {
    time: Duration,
    sequence: u64,
    component: usize,
    event: Box<dyn Any>,
}

impl EventEntry {
    /// Returns a typed view of the entry if it holds an event of type `E`.
    #[must_use]
    pub fn downcast<E: fmt::Debug + 'static>(&self) -> Option<EventEntryTyped<'_, E>> {
        self.event.downcast_ref::<E>().map(|event| EventEntryTyped {
            time: self.time,
            component_id: ComponentId::new(self.component),
            event,
        })
    }

    /// Delivery time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.time
    }

    pub(crate) fn component_idx(&self) -> usize {
        self.component
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Borrowed contents of an [`EventEntry`] holding an event of type `E`.
#[derive(Debug)]
pub struct EventEntryTyped<'e, E: fmt::Debug> {
    /// Delivery time.
    pub time: Duration,
    /// Recipient.
    pub component_id: ComponentId<E>,
    /// The event itself.
    pub event: &'e E,
}

/// Read-only handle to the simulation clock.
///
/// Components that need the current time outside of event processing keep one of these.
#[derive(Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

impl ClockRef {
    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.clock.get()
    }
}

/// Pending events ordered by delivery time, and the clock.
///
/// The clock only moves when an event is popped, or through [`Simulation::run_until`],
/// and it never moves backwards.
///
/// [`Simulation::run_until`]: crate::Simulation::run_until
#[derive(Default)]
pub struct Scheduler {
    pending: BinaryHeap<Reverse<EventEntry>>,
    clock: Clock,
    scheduled: u64,
}

impl Scheduler {
    /// Schedules `event` for `component`, to be delivered `delay` after the current time.
    /// Delivery times beyond the range of [`Duration`] saturate at [`Duration::MAX`].
    pub fn schedule<E: fmt::Debug + 'static>(
        &mut self,
        delay: Duration,
        component: ComponentId<E>,
        event: E,
    ) {
        let entry = EventEntry {
            time: self.time().saturating_add(delay),
            sequence: self.scheduled,
            component: component.id(),
            event: Box::new(event),
        };
        self.scheduled += 1;
        self.pending.push(Reverse(entry));
    }

    /// Schedules `event` for `component` at the current time. It is delivered after all
    /// events already scheduled for this instant.
    pub fn schedule_immediately<E: fmt::Debug + 'static>(
        &mut self,
        component: ComponentId<E>,
        event: E,
    ) {
        self.schedule(Duration::ZERO, component, event);
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> Duration {
        self.clock.get()
    }

    /// Read-only handle to the clock that stays up to date as the simulation progresses.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef::from(Rc::clone(&self.clock))
    }

    /// Delivery time of the next event, if any.
    #[must_use]
    pub fn peek_time(&self) -> Option<Duration> {
        self.pending.peek().map(|Reverse(entry)| entry.time)
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Checks if no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Takes the next event and moves the clock to its time.
    pub fn pop(&mut self) -> Option<EventEntry> {
        let Reverse(entry) = self.pending.pop()?;
        self.clock.set(entry.time);
        Some(entry)
    }

    pub(crate) fn advance_to(&mut self, time: Duration) {
        if time > self.clock.get() {
            self.clock.set(time);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Visit {
        Start,
        Done(u32),
    }

    #[derive(Debug, PartialEq)]
    struct Tick;

    fn entry(secs: u64, sequence: u64) -> EventEntry {
        EventEntry {
            time: Duration::from_secs(secs),
            sequence,
            component: 3,
            event: Box::new(Visit::Done(7)),
        }
    }

    fn secs(time: u64) -> Duration {
        Duration::from_secs(time)
    }

    #[test]
    fn test_downcast() {
        let entry = entry(4, 0);
        let typed = entry.downcast::<Visit>().unwrap();
        assert_eq!(typed.time, secs(4));
        assert_eq!(typed.component_id, ComponentId::new(3));
        assert_eq!(typed.event, &Visit::Done(7));
        assert!(entry.downcast::<Tick>().is_none());
    }

    #[test]
    fn test_entry_order() {
        assert_eq!(entry(2, 9), entry(2, 9));
        assert!(entry(1, 5) < entry(2, 0));
        assert!(entry(2, 0) < entry(2, 1));
        assert!(entry(3, 0) > entry(2, 8));
    }

    #[test]
    fn test_pop_moves_clock() {
        let mut scheduler = Scheduler::default();
        let visits = ComponentId::<Visit>::new(0);
        let ticks = ComponentId::<Tick>::new(1);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.peek_time(), None);

        scheduler.schedule(secs(2), visits, Visit::Done(1));
        scheduler.schedule(secs(1), ticks, Tick);
        scheduler.schedule_immediately(visits, Visit::Start);
        assert_eq!(scheduler.len(), 3);
        assert_eq!(scheduler.peek_time(), Some(secs(0)));

        let clock = scheduler.clock();
        let mut delivered = Vec::new();
        while let Some(entry) = scheduler.pop() {
            assert_eq!(clock.time(), entry.time());
            delivered.push((entry.time(), entry.downcast::<Visit>().is_some()));
        }
        assert_eq!(
            delivered,
            vec![(secs(0), true), (secs(1), false), (secs(2), true)]
        );
        assert_eq!(scheduler.time(), secs(2));
        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_same_time_in_scheduling_order() {
        let mut scheduler = Scheduler::default();
        let visits = ComponentId::<Visit>::new(0);
        let ticks = ComponentId::<Tick>::new(1);
        scheduler.schedule(secs(5), visits, Visit::Done(0));
        scheduler.schedule(secs(5), ticks, Tick);
        for n in 1..=15 {
            scheduler.schedule(secs(5), visits, Visit::Done(n));
        }
        let first = scheduler.pop().unwrap();
        assert_eq!(first.downcast::<Visit>().unwrap().event, &Visit::Done(0));
        assert!(scheduler.pop().unwrap().downcast::<Tick>().is_some());
        let rest: Vec<u32> = std::iter::from_fn(|| scheduler.pop())
            .filter_map(|entry| match entry.downcast::<Visit>()?.event {
                Visit::Done(n) => Some(*n),
                Visit::Start => None,
            })
            .collect();
        assert_eq!(rest, (1..=15).collect::<Vec<_>>());
    }

    #[test]
    fn test_delay_counts_from_current_time() {
        let mut scheduler = Scheduler::default();
        let ticks = ComponentId::<Tick>::new(0);
        scheduler.schedule(secs(5), ticks, Tick);
        let _ = scheduler.pop();
        scheduler.schedule(secs(2), ticks, Tick);
        assert_eq!(scheduler.peek_time(), Some(secs(7)));
        scheduler.advance_to(secs(1));
        assert_eq!(scheduler.time(), secs(5));
        scheduler.advance_to(secs(6));
        assert_eq!(scheduler.time(), secs(6));
    }

    #[test]
    fn test_delivery_time_saturates() {
        let mut scheduler = Scheduler::default();
        let ticks = ComponentId::<Tick>::new(0);
        scheduler.schedule(secs(3), ticks, Tick);
        let _ = scheduler.pop();
        scheduler.schedule(Duration::MAX, ticks, Tick);
        assert_eq!(scheduler.peek_time(), Some(Duration::MAX));
        assert_eq!(scheduler.pop().map(|entry| entry.time()), Some(Duration::MAX));
    }
}
