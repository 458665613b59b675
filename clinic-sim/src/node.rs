use crate::{to_duration, Patient, PathwayEvent, Phase, Stage};

use std::time::Duration;

use rand::Rng;
use rand_distr::Distribution;
use sim_engine::{Component, ComponentId, Key, QueueId, Scheduler, State};

/// Service node events.
#[derive(Debug, Copy, Clone)]
pub enum Event {
    /// A patient joins the node's queue. When served, the node reports back to `pathway`.
    Arrival {
        /// Where the patient is stored in the state.
        patient: Key<Patient>,
        /// Where to report the end of service.
        pathway: ComponentId<PathwayEvent>,
    },
    /// A server has been released and can pick up the next patient.
    Idle,
    /// Service of the patient has finished.
    ServiceFinished {
        /// Where the patient is stored in the state.
        patient: Key<Patient>,
        /// Where to report the end of service.
        pathway: ComponentId<PathwayEvent>,
    },
}

/// Queue entry: a patient waiting for service and the pathway to notify afterwards.
pub type QueueEntry = (Key<Patient>, ComponentId<PathwayEvent>);

/// A stage of the clinic with a number of identical servers and one FIFO queue.
///
/// If all servers are busy at the arrival of a patient, then the patient waits in the queue.
/// Each visit records three timestamps in the patient's log: arrival to the queue, start of
/// service, and end of service. No patient is ever dropped; the queue is unbounded.
pub struct ServiceNode<R, D> {
    stage: Stage,
    rng: R,
    service_time: D,
    incoming: QueueId<QueueEntry>,
    servers: usize,
    idle_servers: usize,
}

impl<R, D> ServiceNode<R, D>
where
    R: Rng,
    D: Distribution<f64>,
{
    /// Constructs a node for `stage` with `servers` servers, taking patients from `incoming`.
    /// Service times, in simulated time units, are drawn from `service_time`.
    #[must_use]
    pub fn new(
        stage: Stage,
        servers: usize,
        service_time: D,
        rng: R,
        incoming: QueueId<QueueEntry>,
    ) -> Self {
        Self {
            stage,
            rng,
            service_time,
            incoming,
            servers,
            idle_servers: servers,
        }
    }

    /// The stage this node serves.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The queue of waiting patients.
    #[must_use]
    pub fn queue(&self) -> QueueId<QueueEntry> {
        self.incoming
    }

    /// Total number of servers.
    #[must_use]
    pub fn servers(&self) -> usize {
        self.servers
    }

    /// Number of servers currently serving a patient.
    #[must_use]
    pub fn busy_servers(&self) -> usize {
        self.servers - self.idle_servers
    }

    fn record(&self, state: &mut State, patient: Key<Patient>, phase: Phase, time: Duration) {
        state
            .get_mut(patient)
            .expect("Cannot find patient")
            .record(self.stage, phase, time)
            .expect("Patient visited the same node twice");
    }

    fn start_services(
        &mut self,
        self_id: ComponentId<Event>,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        while self.idle_servers > 0 {
            if let Some((patient, pathway)) = state.recv(self.incoming) {
                self.idle_servers -= 1;
                self.record(state, patient, Phase::ServiceStart, scheduler.time());
                let service_time = to_duration(self.service_time.sample(&mut self.rng));
                log::trace!(
                    "[{:?}] [{}] service started, will take {:?}",
                    scheduler.time(),
                    self.stage,
                    service_time
                );
                scheduler.schedule(
                    service_time,
                    self_id,
                    Event::ServiceFinished { patient, pathway },
                );
            } else {
                break;
            }
        }
    }
}

impl<R, D> Component for ServiceNode<R, D>
where
    R: Rng,
    D: Distribution<f64>,
{
    type Event = Event;

    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        match event {
            Event::Arrival { patient, pathway } => {
                self.record(state, *patient, Phase::Arrival, scheduler.time());
                state.send(self.incoming, (*patient, *pathway));
                self.start_services(self_id, scheduler, state);
            }
            Event::Idle => {
                log::trace!("[{}] Node is idle", self.stage);
                self.start_services(self_id, scheduler, state);
            }
            Event::ServiceFinished { patient, pathway } => {
                self.record(state, *patient, Phase::ServiceEnd, scheduler.time());
                self.idle_servers += 1;
                scheduler.schedule_immediately(
                    *pathway,
                    PathwayEvent::StageFinished {
                        patient: *patient,
                        stage: self.stage,
                    },
                );
                scheduler.schedule_immediately(self_id, Event::Idle);
            }
        }
    }
}
