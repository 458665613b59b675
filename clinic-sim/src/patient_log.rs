use std::collections::BTreeMap;
use std::time::Duration;

use sim_engine::ClockRef;

use crate::{Patient, PatientId};

/// Stores every patient created during a simulation.
///
/// Patients are registered at creation, in arrival order, and their final records are stored
/// once they are discharged after the pharmacy. Patients that are still in the clinic when the
/// simulation ends are merged in with [`PatientLog::into_patients`].
pub struct PatientLog {
    patients: BTreeMap<PatientId, Patient>,
    discharged: usize,
    clock: ClockRef,
}

impl PatientLog {
    /// Constructs a new patient log. `clock` is the reference to the simulation clock.
    #[must_use]
    pub fn new(clock: ClockRef) -> Self {
        Self {
            patients: BTreeMap::new(),
            discharged: 0,
            clock,
        }
    }

    /// Registers a newly created patient.
    ///
    /// # Panics
    ///
    /// Panics if a patient with the same ID has already been registered.
    pub fn register(&mut self, patient: &Patient) {
        if self.patients.insert(patient.id(), patient.clone()).is_some() {
            panic!("Patient {} registered twice", patient.id());
        }
    }

    /// Stores the final record of a patient who has left the clinic.
    ///
    /// # Panics
    ///
    /// Panics if the patient has never been registered.
    pub fn discharge(&mut self, patient: Patient) {
        match self.patients.get_mut(&patient.id()) {
            Some(entry) => *entry = patient,
            None => panic!("Tried to discharge unknown patient {}", patient.id()),
        }
        self.discharged += 1;
    }

    /// Number of patients created so far.
    #[must_use]
    pub fn registered_patients(&self) -> usize {
        self.patients.len()
    }

    /// Number of patients who have left the clinic.
    #[must_use]
    pub fn discharged_patients(&self) -> usize {
        self.discharged
    }

    /// Number of patients currently in the clinic, either waiting or being served.
    #[must_use]
    pub fn active_patients(&self) -> usize {
        self.patients.len() - self.discharged
    }

    /// The average number of discharged patients per time unit since the start of the simulation.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn total_throughput(&self) -> f64 {
        if self.discharged == 0 || self.clock.time() == Duration::default() {
            0.0
        } else {
            self.discharged as f64 / self.clock.time().as_secs_f64()
        }
    }

    /// Consumes the log and returns all patients sorted by ID. Records of patients in `in_flight`
    /// replace the ones stored at registration.
    #[must_use]
    pub fn into_patients<I>(mut self, in_flight: I) -> Vec<Patient>
    where
        I: IntoIterator<Item = Patient>,
    {
        for patient in in_flight {
            self.patients.insert(patient.id(), patient);
        }
        self.patients.into_iter().map(|(_, p)| p).collect()
    }
}
