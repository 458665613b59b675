use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Exp};
use sim_engine::{Component, ComponentId, Key, Scheduler, State};

use crate::{to_duration, NodeEvent, Patient, PatientId, PatientLog, PathwayEvent};

/// A single patient arrival: who and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    /// ID of the arriving patient.
    pub id: PatientId,
    /// Simulated time of the arrival.
    pub time: Duration,
}

/// Lazy sequence of arrivals of a homogeneous Poisson process.
///
/// Inter-arrival gaps are independent draws from the exponential distribution with the given
/// rate, and the first arrival happens after the first gap. IDs start at 1.
/// The sequence is infinite unless `max_arrivals` is set, and empty if the rate is not positive.
pub struct PoissonArrivals<R> {
    rng: R,
    gaps: Option<Exp<f64>>,
    time: Duration,
    generated: usize,
    max_arrivals: Option<usize>,
}

impl<R: Rng> PoissonArrivals<R> {
    /// Constructs the arrival sequence starting at time zero.
    pub fn new(rng: R, rate: f64, max_arrivals: Option<usize>) -> Self {
        let gaps = if rate > 0.0 { Exp::new(rate).ok() } else { None };
        Self {
            rng,
            gaps,
            time: Duration::default(),
            generated: 0,
            max_arrivals,
        }
    }

    /// Number of arrivals generated so far.
    #[must_use]
    pub fn generated(&self) -> usize {
        self.generated
    }
}

impl<R: Rng> Iterator for PoissonArrivals<R> {
    type Item = Arrival;

    fn next(&mut self) -> Option<Arrival> {
        if self.max_arrivals.map_or(false, |max| self.generated >= max) {
            return None;
        }
        let gaps = self.gaps.as_ref()?;
        self.time = self.time.saturating_add(to_duration(gaps.sample(&mut self.rng)));
        self.generated += 1;
        Some(Arrival {
            id: PatientId::from(self.generated),
            time: self.time,
        })
    }
}

/// Arrival generator events.
#[derive(Debug, Copy, Clone)]
pub enum Event {
    /// Starts the process: schedules the first arrival.
    Start,
    /// The pending arrival happens now. The generator creates the patient, sends it to
    /// registration, and schedules the next arrival.
    Arrive,
}

/// Creates patients and sends them to the registration node.
///
/// Every created patient is registered in the patient log right away, so patients that never
/// finish are still accounted for. The generator never waits for a patient: the patient's walk
/// through the clinic continues through events of the nodes and the pathway.
pub struct ArrivalGenerator<R> {
    arrivals: PoissonArrivals<R>,
    pending: Option<Arrival>,
    registration: ComponentId<NodeEvent>,
    pathway: ComponentId<PathwayEvent>,
    patient_log: Key<PatientLog>,
}

impl<R: Rng> ArrivalGenerator<R> {
    /// Creates a generator drawing arrivals from `arrivals`.
    pub fn new(
        arrivals: PoissonArrivals<R>,
        registration: ComponentId<NodeEvent>,
        pathway: ComponentId<PathwayEvent>,
        patient_log: Key<PatientLog>,
    ) -> Self {
        Self {
            arrivals,
            pending: None,
            registration,
            pathway,
            patient_log,
        }
    }

    fn schedule_next(&mut self, self_id: ComponentId<Event>, scheduler: &mut Scheduler) {
        if let Some(arrival) = self.arrivals.next() {
            let delay = arrival.time.saturating_sub(scheduler.time());
            self.pending = Some(arrival);
            scheduler.schedule(delay, self_id, Event::Arrive);
        } else {
            log::info!(
                "[{:?}] Arrivals stopped after {} patients",
                scheduler.time(),
                self.arrivals.generated()
            );
        }
    }
}

impl<R: Rng> Component for ArrivalGenerator<R> {
    type Event = Event;

    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        match event {
            Event::Start => self.schedule_next(self_id, scheduler),
            Event::Arrive => {
                let arrival = self
                    .pending
                    .take()
                    .expect("Arrival event without a pending arrival");
                let patient = Patient::new(arrival.id, arrival.time);
                log::debug!("[{:?}] Patient {} arrived", arrival.time, arrival.id);
                state
                    .get_mut(self.patient_log)
                    .expect("Patient log not found in state")
                    .register(&patient);
                let patient = state.insert(patient);
                scheduler.schedule_immediately(
                    self.registration,
                    NodeEvent::Arrival {
                        patient,
                        pathway: self.pathway,
                    },
                );
                self.schedule_next(self_id, scheduler);
            }
        }
    }
}
