use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::{EventEntry, Scheduler, State};

/// Identifies a simulation component.
///
/// The ID is generic over the type of events the component accepts, so it is impossible to
/// schedule an event for a component that does not know how to process it.
pub struct ComponentId<E> {
    id: usize,
    _marker: PhantomData<E>,
}

impl<E> ComponentId<E> {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub(crate) fn id(self) -> usize {
        self.id
    }
}

impl<E> Clone for ComponentId<E> {
    fn clone(&self) -> Self {
        Self::new(self.id)
    }
}
impl<E> Copy for ComponentId<E> {}

impl<E> PartialEq for ComponentId<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<E> Eq for ComponentId<E> {}

impl<E> Hash for ComponentId<E> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<E> fmt::Debug for ComponentId<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.id)
    }
}

/// A simulation component: an object that reacts to events of one type.
pub trait Component {
    /// Type of events this component processes.
    type Event: fmt::Debug + 'static;

    /// Processes a single event. The component can schedule new events and mutate the state.
    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    );
}

trait ProcessEventEntry {
    fn process_event_entry(
        &mut self,
        entry: &EventEntry,
        scheduler: &mut Scheduler,
        state: &mut State,
    );
    fn as_any(&self) -> &dyn Any;
}

impl<C> ProcessEventEntry for C
where
    C: Component + 'static,
{
    fn process_event_entry(
        &mut self,
        entry: &EventEntry,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let entry = entry
            .downcast::<C::Event>()
            .expect("Event type does not match the component it was scheduled for");
        log::trace!("[{:?}] [event] {:?}", scheduler.time(), entry.event);
        self.process_event(entry.component_id, entry.event, scheduler, state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Container holding all components of a simulation.
#[derive(Default)]
pub struct Components {
    components: Vec<Box<dyn ProcessEventEntry>>,
}

impl Components {
    /// Registers a new component and returns its ID.
    #[must_use]
    pub fn add_component<E, C>(&mut self, component: C) -> ComponentId<E>
    where
        E: fmt::Debug + 'static,
        C: Component<Event = E> + 'static,
    {
        let id = self.components.len();
        self.components.push(Box::new(component));
        ComponentId::new(id)
    }

    /// Returns an immutable reference to a component, or `None` if `C` is not the type of the
    /// component registered under `id`.
    #[must_use]
    pub fn get<C>(&self, id: ComponentId<C::Event>) -> Option<&C>
    where
        C: Component + 'static,
    {
        self.components
            .get(id.id())
            .and_then(|c| c.as_any().downcast_ref::<C>())
    }

    /// Delivers the event to the component it was scheduled for.
    ///
    /// # Panics
    ///
    /// Panics if the entry points to a component that was never registered in this container.
    pub fn process_event_entry(
        &mut self,
        entry: &EventEntry,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        self.components
            .get_mut(entry.component_idx())
            .expect("Event scheduled for an unknown component")
            .process_event_entry(entry, scheduler, state);
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no components are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
