use crate::{LabRouter, NodeEvent, Patient, PatientLog, Route, Stage};

use rand::Rng;
use sim_engine::{Component, ComponentId, Key, Scheduler, State};

/// Pathway events.
#[derive(Debug, Copy, Clone)]
pub enum Event {
    /// A node has finished serving the patient at `stage`.
    StageFinished {
        /// Where the patient is stored in the state.
        patient: Key<Patient>,
        /// The stage that has just finished.
        stage: Stage,
    },
}

/// Moves patients between stages: registration, doctor, then either lab and pharmacy or
/// pharmacy alone. The lab decision is made once per patient, right after the doctor.
///
/// After the pharmacy, the patient leaves the simulation state and is handed over to the patient
/// log.
pub struct Pathway<R> {
    router: LabRouter<R>,
    doctor: ComponentId<NodeEvent>,
    lab: ComponentId<NodeEvent>,
    pharmacy: ComponentId<NodeEvent>,
    patient_log: Key<PatientLog>,
}

impl<R: Rng> Pathway<R> {
    /// Constructs a pathway through the given nodes.
    pub fn new(
        router: LabRouter<R>,
        doctor: ComponentId<NodeEvent>,
        lab: ComponentId<NodeEvent>,
        pharmacy: ComponentId<NodeEvent>,
        patient_log: Key<PatientLog>,
    ) -> Self {
        Self {
            router,
            doctor,
            lab,
            pharmacy,
            patient_log,
        }
    }
}

impl<R: Rng> Component for Pathway<R> {
    type Event = Event;

    fn process_event(
        &mut self,
        self_id: ComponentId<Self::Event>,
        event: &Self::Event,
        scheduler: &mut Scheduler,
        state: &mut State,
    ) {
        let Event::StageFinished { patient, stage } = *event;
        let next = match stage {
            Stage::Registration => Some(self.doctor),
            Stage::Doctor => match self.router.route() {
                Route::Lab => Some(self.lab),
                Route::Pharmacy => Some(self.pharmacy),
            },
            Stage::Lab => Some(self.pharmacy),
            Stage::Pharmacy => None,
        };
        if let Some(node) = next {
            scheduler.schedule_immediately(
                node,
                NodeEvent::Arrival {
                    patient,
                    pathway: self_id,
                },
            );
        } else {
            let patient = state.remove(patient).expect("Cannot find patient");
            log::debug!(
                "[{:?}] Patient {} discharged",
                scheduler.time(),
                patient.id()
            );
            state
                .get_mut(self.patient_log)
                .expect("Patient log not found in state")
                .discharge(patient);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{LabProbability, PatientId, Phase};

    use std::time::Duration;

    use rand::rngs::mock::StepRng;
    use sim_engine::Simulation;

    /// Serves instantly, only recording the three timestamps.
    struct InstantNode {
        stage: Stage,
    }

    impl Component for InstantNode {
        type Event = NodeEvent;

        fn process_event(
            &mut self,
            _: ComponentId<NodeEvent>,
            event: &NodeEvent,
            scheduler: &mut Scheduler,
            state: &mut State,
        ) {
            if let NodeEvent::Arrival { patient, pathway } = *event {
                let now = scheduler.time();
                let record = state.get_mut(patient).unwrap();
                record.record(self.stage, Phase::Arrival, now).unwrap();
                record.record(self.stage, Phase::ServiceStart, now).unwrap();
                record.record(self.stage, Phase::ServiceEnd, now).unwrap();
                scheduler.schedule_immediately(
                    pathway,
                    Event::StageFinished {
                        patient,
                        stage: self.stage,
                    },
                );
            }
        }
    }

    /// `StepRng` with increment 0 always yields the same value; `u64::MAX` maps to a uniform
    /// float just below 1, and 0 maps to 0.
    fn run(rng: StepRng, probability: f64) -> Vec<Patient> {
        let mut sim = Simulation::default();
        let log = sim.state.insert(PatientLog::new(sim.scheduler.clock()));
        let registration = sim.add_component(InstantNode {
            stage: Stage::Registration,
        });
        let doctor = sim.add_component(InstantNode {
            stage: Stage::Doctor,
        });
        let lab = sim.add_component(InstantNode { stage: Stage::Lab });
        let pharmacy = sim.add_component(InstantNode {
            stage: Stage::Pharmacy,
        });
        let router = LabRouter::new(LabProbability::new(probability).unwrap(), rng);
        let pathway = sim.add_component(Pathway::new(router, doctor, lab, pharmacy, log));
        for id in 1..=3 {
            let patient = Patient::new(PatientId::from(id), Duration::from_secs(1));
            sim.state.get_mut(log).unwrap().register(&patient);
            let patient = sim.state.insert(patient);
            sim.schedule(
                Duration::from_secs(1),
                registration,
                NodeEvent::Arrival { patient, pathway },
            );
        }
        sim.run_until(Duration::from_secs(2));
        let in_flight = sim.state.drain::<Patient>();
        assert!(in_flight.is_empty());
        sim.state.remove(log).unwrap().into_patients(in_flight)
    }

    #[test]
    fn test_skip_lab() {
        let patients = run(StepRng::new(u64::MAX, 0), 0.5);
        assert_eq!(patients.len(), 3);
        for patient in patients {
            assert!(patient.is_discharged());
            assert!(patient.visited(Stage::Doctor));
            assert!(!patient.visited(Stage::Lab));
        }
    }

    #[test]
    fn test_through_lab() {
        let patients = run(StepRng::new(0, 0), 0.5);
        assert_eq!(patients.len(), 3);
        for patient in patients {
            assert!(patient.is_discharged());
            assert!(patient.visited(Stage::Lab));
            assert_eq!(
                patient.get(Stage::Lab, Phase::ServiceEnd),
                Some(Duration::from_secs(1))
            );
        }
    }

    #[test]
    fn test_probability_one_with_highest_draw() {
        let patients = run(StepRng::new(u64::MAX, 0), 1.0);
        assert!(patients.iter().all(|p| p.visited(Stage::Lab)));
    }
}
