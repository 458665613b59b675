#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

//! Discrete-event simulation mechanisms: scheduler, state, queues, and components.
//!
//! A simulation is a set of components exchanging typed events through the [`Scheduler`].
//! Every event is delivered at its scheduled time; events scheduled for the same instant are
//! delivered in the order they were scheduled. Components share data through the [`State`],
//! which stores arbitrary values under type-safe keys and holds FIFO queues.
//!
//! ```
//! # use std::time::Duration;
//! # use sim_engine::{Component, ComponentId, Key, Scheduler, Simulation, State};
//! #[derive(Debug)]
//! struct Tick;
//!
//! struct Ticker {
//!     counter: Key<usize>,
//! }
//!
//! impl Component for Ticker {
//!     type Event = Tick;
//!
//!     fn process_event(
//!         &mut self,
//!         self_id: ComponentId<Tick>,
//!         _event: &Tick,
//!         scheduler: &mut Scheduler,
//!         state: &mut State,
//!     ) {
//!         *state.get_mut(self.counter).unwrap() += 1;
//!         scheduler.schedule(Duration::from_secs(1), self_id, Tick);
//!     }
//! }
//!
//! let mut sim = Simulation::default();
//! let counter = sim.state.insert(0_usize);
//! let ticker = sim.add_component(Ticker { counter });
//! sim.schedule(Duration::default(), ticker, Tick);
//! sim.run_until(Duration::from_secs(4));
//! assert_eq!(sim.state.get(counter), Some(&5));
//! assert_eq!(sim.scheduler.time(), Duration::from_secs(4));
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Simulation clock.
pub type Clock = Rc<Cell<Duration>>;

pub use component::{Component, ComponentId, Components};
pub use scheduler::{ClockRef, EventEntry, EventEntryTyped, Scheduler};
pub use simulation::Simulation;
pub use state::{Key, QueueId, State};

use queue::Queue;

mod component;
mod queue;
mod scheduler;
mod simulation;
mod state;
