use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;

use rand::RngCore;

use crate::Queue;

/// Numerical ID of a stored object together with the ID of the state that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Handle {
    id: usize,
    owner: u64,
}

/// Typed handle to a value kept in a [`State`].
///
/// Keys are issued by [`State::insert`] and stay valid until the value is removed, either with
/// [`State::remove`] or together with all other values of its type by [`State::drain`].
///
/// The value type is part of the key, so a key cannot fetch a value of another type:
///
/// ```compile_fail
/// # use sim_engine::State;
/// let mut state = State::default();
/// let key = state.insert(String::from("patient"));
/// let _: Option<u32> = state.remove(key);
/// ```
///
/// A key is also bound to the state that issued it. Using it with any other state panics:
///
/// ```should_panic
/// # use sim_engine::State;
/// let mut first = State::default();
/// let mut second = State::default();
/// let key = first.insert(7_u32);
/// let _ = second.get(key);
/// ```
pub struct Key<V> {
    handle: Handle,
    _marker: PhantomData<V>,
}

/// Typed handle to a FIFO queue kept in a [`State`]. Same rules apply as for [`Key`].
pub struct QueueId<V> {
    handle: Handle,
    _marker: PhantomData<V>,
}

macro_rules! impl_handle_traits {
    ($name:ident) => {
        impl<V> $name<V> {
            fn new(handle: Handle) -> Self {
                Self {
                    handle,
                    _marker: PhantomData,
                }
            }
        }

        impl<V> Clone for $name<V> {
            fn clone(&self) -> Self {
                Self::new(self.handle)
            }
        }

        impl<V> Copy for $name<V> {}

        impl<V> PartialEq for $name<V> {
            fn eq(&self, other: &Self) -> bool {
                self.handle == other.handle
            }
        }

        impl<V> Eq for $name<V> {}

        impl<V> std::hash::Hash for $name<V> {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.handle.hash(state);
            }
        }

        impl<V> fmt::Debug for $name<V> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.handle.id)
            }
        }
    };
}

impl_handle_traits!(Key);
impl_handle_traits!(QueueId);

/// Data shared by the components of a simulation: values of arbitrary types, and queues.
///
/// Values of each type are kept ordered by the order of insertion.
pub struct State {
    values: HashMap<TypeId, BTreeMap<usize, Box<dyn Any>>>,
    queues: Vec<Box<dyn Any>>,
    next_id: usize,
    owner: u64,
}

impl Default for State {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            queues: Vec::new(),
            next_id: 0,
            owner: rand::thread_rng().next_u64(),
        }
    }
}

impl State {
    fn check_owner(&self, handle: Handle) {
        assert_eq!(
            handle.owner, self.owner,
            "Handle {} was issued by a different state",
            handle.id
        );
    }

    fn issue(&mut self) -> Handle {
        let id = self.next_id;
        self.next_id += 1;
        Handle {
            id,
            owner: self.owner,
        }
    }

    fn values_of<V: 'static>(&self) -> Option<&BTreeMap<usize, Box<dyn Any>>> {
        self.values.get(&TypeId::of::<V>())
    }

    fn values_of_mut<V: 'static>(&mut self) -> Option<&mut BTreeMap<usize, Box<dyn Any>>> {
        self.values.get_mut(&TypeId::of::<V>())
    }

    fn queue<V: 'static>(&self, queue: QueueId<V>) -> &Queue<V> {
        self.check_owner(queue.handle);
        self.queues[queue.handle.id]
            .downcast_ref()
            .expect("Queue stored under a mismatched type")
    }

    fn queue_mut<V: 'static>(&mut self, queue: QueueId<V>) -> &mut Queue<V> {
        self.check_owner(queue.handle);
        self.queues[queue.handle.id]
            .downcast_mut()
            .expect("Queue stored under a mismatched type")
    }

    /// Stores `value` and returns the key to access it.
    #[must_use = "the value cannot be reached without its key"]
    pub fn insert<V: 'static>(&mut self, value: V) -> Key<V> {
        let handle = self.issue();
        self.values
            .entry(TypeId::of::<V>())
            .or_default()
            .insert(handle.id, Box::new(value));
        Key::new(handle)
    }

    /// Takes the value out of the state. Returns `None` if it has already been removed.
    pub fn remove<V: 'static>(&mut self, key: Key<V>) -> Option<V> {
        self.check_owner(key.handle);
        self.values_of_mut::<V>()?
            .remove(&key.handle.id)
            .and_then(|value| value.downcast().ok())
            .map(|value| *value)
    }

    /// Returns a reference to the value, or `None` if it has been removed.
    #[must_use]
    pub fn get<V: 'static>(&self, key: Key<V>) -> Option<&V> {
        self.check_owner(key.handle);
        self.values_of::<V>()?.get(&key.handle.id)?.downcast_ref()
    }

    /// Returns a mutable reference to the value, or `None` if it has been removed.
    #[must_use]
    pub fn get_mut<V: 'static>(&mut self, key: Key<V>) -> Option<&mut V> {
        self.check_owner(key.handle);
        self.values_of_mut::<V>()?
            .get_mut(&key.handle.id)?
            .downcast_mut()
    }

    /// Removes all values of type `V` and returns them in the order of insertion.
    pub fn drain<V: 'static>(&mut self) -> Vec<V> {
        self.values
            .remove(&TypeId::of::<V>())
            .into_iter()
            .flat_map(BTreeMap::into_iter)
            .filter_map(|(_, value)| value.downcast::<V>().ok().map(|value| *value))
            .collect()
    }

    /// Creates an empty unbounded queue.
    pub fn new_queue<V: 'static>(&mut self) -> QueueId<V> {
        let handle = Handle {
            id: self.queues.len(),
            owner: self.owner,
        };
        self.queues.push(Box::new(Queue::<V>::default()));
        QueueId::new(handle)
    }

    /// Appends `value` to the back of the queue.
    pub fn send<V: 'static>(&mut self, queue: QueueId<V>, value: V) {
        self.queue_mut(queue).push_back(value);
    }

    /// Takes the value at the front of the queue, if any.
    pub fn recv<V: 'static>(&mut self, queue: QueueId<V>) -> Option<V> {
        self.queue_mut(queue).pop_front()
    }

    /// Number of values waiting in the queue.
    #[must_use]
    pub fn len<V: 'static>(&self, queue: QueueId<V>) -> usize {
        self.queue(queue).len()
    }

    /// The largest number of values the queue has held at once.
    #[must_use]
    pub fn max_len<V: 'static>(&self, queue: QueueId<V>) -> usize {
        self.queue(queue).max_len()
    }
}
