use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use strum::IntoEnumIterator;

use crate::{ParseTimestampKeyError, PatientId, Phase, Stage, TimestampAlreadySet};

/// Identifies one entry in a patient's timestamp log, displayed as `{stage}_{phase}`,
/// e.g., `lab_service_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampKey {
    /// Stage at which the event happened.
    pub stage: Stage,
    /// What happened.
    pub phase: Phase,
}

impl TimestampKey {
    /// Constructs a new key.
    #[must_use]
    pub fn new(stage: Stage, phase: Phase) -> Self {
        Self { stage, phase }
    }

    /// All possible keys, in path order.
    pub fn all() -> impl Iterator<Item = TimestampKey> {
        Stage::iter().flat_map(|stage| Phase::iter().map(move |phase| Self::new(stage, phase)))
    }
}

impl fmt::Display for TimestampKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.stage, self.phase)
    }
}

impl FromStr for TimestampKey {
    type Err = ParseTimestampKeyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|key| key.to_string() == s)
            .ok_or_else(|| ParseTimestampKeyError(s.to_string()))
    }
}

/// A patient walking through the clinic.
///
/// The ID and arrival time never change. The timestamp log only grows: once a timestamp is
/// recorded it can be neither removed nor overwritten. A missing entry means that the phase
/// never happened, e.g., `lab_*` entries are missing for patients not sent to the lab, and any
/// later entries are missing for patients still in the clinic when the simulation ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    id: PatientId,
    arrival_time: Duration,
    timestamps: BTreeMap<TimestampKey, Duration>,
}

impl Patient {
    /// Creates a patient that arrived at the clinic at `arrival_time`.
    #[must_use]
    pub fn new(id: PatientId, arrival_time: Duration) -> Self {
        Self {
            id,
            arrival_time,
            timestamps: BTreeMap::new(),
        }
    }

    /// The ID of the patient.
    #[must_use]
    pub fn id(&self) -> PatientId {
        self.id
    }

    /// The time the patient entered the clinic.
    #[must_use]
    pub fn arrival_time(&self) -> Duration {
        self.arrival_time
    }

    /// Records the time of `phase` at `stage`.
    ///
    /// # Errors
    ///
    /// Returns an error if this timestamp has already been recorded; the log is left untouched.
    pub fn record(
        &mut self,
        stage: Stage,
        phase: Phase,
        time: Duration,
    ) -> Result<(), TimestampAlreadySet> {
        let key = TimestampKey::new(stage, phase);
        if self.timestamps.contains_key(&key) {
            return Err(TimestampAlreadySet {
                patient: self.id,
                key,
            });
        }
        self.timestamps.insert(key, time);
        Ok(())
    }

    /// Returns the recorded time of `phase` at `stage`, if any.
    #[must_use]
    pub fn get(&self, stage: Stage, phase: Phase) -> Option<Duration> {
        self.timestamps
            .get(&TimestampKey::new(stage, phase))
            .copied()
    }

    /// Looks up a timestamp by its textual key, e.g., `doctor_service_end`.
    /// Unknown keys are treated as missing.
    #[must_use]
    pub fn get_by_name(&self, key: &str) -> Option<Duration> {
        key.parse::<TimestampKey>()
            .ok()
            .and_then(|key| self.timestamps.get(&key).copied())
    }

    /// Iterates over all recorded timestamps, ordered by stage and then phase.
    pub fn timestamps(&self) -> impl Iterator<Item = (TimestampKey, Duration)> + '_ {
        self.timestamps.iter().map(|(k, v)| (*k, *v))
    }

    /// Whether the patient ever joined the queue of `stage`.
    #[must_use]
    pub fn visited(&self, stage: Stage) -> bool {
        self.get(stage, Phase::Arrival).is_some()
    }

    /// The time the patient left the clinic: the end of pharmacy service, or the end of doctor
    /// service if the pharmacy was not reached. `None` means that the patient never finished any
    /// terminal stage before the simulation ended.
    #[must_use]
    pub fn exit_time(&self) -> Option<Duration> {
        self.get(Stage::Pharmacy, Phase::ServiceEnd)
            .or_else(|| self.get(Stage::Doctor, Phase::ServiceEnd))
    }

    /// Whether the patient finished the whole path, i.e., was served at the pharmacy.
    #[must_use]
    pub fn is_discharged(&self) -> bool {
        self.get(Stage::Pharmacy, Phase::ServiceEnd).is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_key_names() {
        let key = TimestampKey::new(Stage::Registration, Phase::Arrival);
        assert_eq!(key.to_string(), "registration_arrival");
        assert_eq!(
            "lab_service_start".parse(),
            Ok(TimestampKey::new(Stage::Lab, Phase::ServiceStart))
        );
        assert_eq!(
            "lab_finish".parse::<TimestampKey>(),
            Err(ParseTimestampKeyError(String::from("lab_finish")))
        );
        assert_eq!(TimestampKey::all().count(), 12);
    }

    #[test]
    fn test_record_is_append_only() {
        let mut patient = Patient::new(PatientId::from(1), secs(1));
        assert!(patient.record(Stage::Doctor, Phase::Arrival, secs(2)).is_ok());
        assert_eq!(
            patient.record(Stage::Doctor, Phase::Arrival, secs(3)),
            Err(TimestampAlreadySet {
                patient: PatientId::from(1),
                key: TimestampKey::new(Stage::Doctor, Phase::Arrival),
            })
        );
        assert_eq!(patient.get(Stage::Doctor, Phase::Arrival), Some(secs(2)));
        assert_eq!(patient.get_by_name("doctor_arrival"), Some(secs(2)));
        assert_eq!(patient.get_by_name("doctor_service_start"), None);
        assert_eq!(patient.get_by_name("nonsense"), None);
        assert!(patient.visited(Stage::Doctor));
        assert!(!patient.visited(Stage::Lab));
    }

    #[test]
    fn test_exit_time() {
        let mut patient = Patient::new(PatientId::from(1), secs(0));
        assert_eq!(patient.exit_time(), None);
        patient
            .record(Stage::Registration, Phase::ServiceEnd, secs(1))
            .unwrap();
        assert_eq!(patient.exit_time(), None);
        patient
            .record(Stage::Doctor, Phase::ServiceEnd, secs(4))
            .unwrap();
        assert_eq!(patient.exit_time(), Some(secs(4)));
        assert!(!patient.is_discharged());
        patient
            .record(Stage::Pharmacy, Phase::ServiceEnd, secs(9))
            .unwrap();
        assert_eq!(patient.exit_time(), Some(secs(9)));
        assert!(patient.is_discharged());
    }

    #[test]
    fn test_exit_time_prefers_pharmacy() {
        let mut patient = Patient::new(PatientId::from(2), secs(0));
        patient
            .record(Stage::Pharmacy, Phase::ServiceEnd, secs(7))
            .unwrap();
        patient
            .record(Stage::Doctor, Phase::ServiceEnd, secs(5))
            .unwrap();
        assert_eq!(patient.exit_time(), Some(secs(7)));
    }

    #[quickcheck]
    fn first_write_wins(writes: Vec<(u8, u8, u32)>) -> bool {
        let stages: Vec<Stage> = Stage::iter().collect();
        let phases: Vec<Phase> = Phase::iter().collect();
        let mut patient = Patient::new(PatientId::from(1), Duration::default());
        let mut expected = BTreeMap::new();
        for (stage, phase, time) in writes {
            let stage = stages[usize::from(stage) % stages.len()];
            let phase = phases[usize::from(phase) % phases.len()];
            let time = Duration::from_millis(u64::from(time));
            let result = patient.record(stage, phase, time);
            let key = TimestampKey::new(stage, phase);
            if expected.contains_key(&key) {
                if result.is_ok() {
                    return false;
                }
            } else {
                expected.insert(key, time);
            }
        }
        patient.timestamps().eq(expected.into_iter())
    }
}
