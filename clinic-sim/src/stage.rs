use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// A service stage of the clinic.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Entry desk, visited by every patient first.
    Registration,
    /// Consultation, visited by every patient after registration.
    Doctor,
    /// Optional laboratory tests, decided after the doctor.
    Lab,
    /// Final stage for every patient.
    Pharmacy,
}

/// Phase of a patient's visit at a stage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Patient joined the stage's queue.
    Arrival,
    /// A server picked the patient up.
    ServiceStart,
    /// The server released the patient.
    ServiceEnd,
}

/// One value per stage, indexed by [`Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerStage<T>([T; 4]);

impl<T> PerStage<T> {
    /// Builds the values by calling `f` for each stage in path order.
    pub fn from_fn<F: FnMut(Stage) -> T>(mut f: F) -> Self {
        Self([
            f(Stage::Registration),
            f(Stage::Doctor),
            f(Stage::Lab),
            f(Stage::Pharmacy),
        ])
    }

    /// Same as [`PerStage::from_fn`] but stops at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error returned by `f`.
    pub fn try_from_fn<E, F: FnMut(Stage) -> Result<T, E>>(mut f: F) -> Result<Self, E> {
        Ok(Self([
            f(Stage::Registration)?,
            f(Stage::Doctor)?,
            f(Stage::Lab)?,
            f(Stage::Pharmacy)?,
        ]))
    }

    /// Iterates over stages and their values in path order.
    pub fn iter(&self) -> impl Iterator<Item = (Stage, &T)> {
        Stage::iter().zip(self.0.iter())
    }

    /// Maps each value, keeping the stage association.
    pub fn map<U, F: FnMut(Stage, &T) -> U>(&self, mut f: F) -> PerStage<U> {
        PerStage::from_fn(|stage| f(stage, &self[stage]))
    }
}

impl<T> Index<Stage> for PerStage<T> {
    type Output = T;
    fn index(&self, stage: Stage) -> &T {
        &self.0[stage as usize]
    }
}

impl<T> IndexMut<Stage> for PerStage<T> {
    fn index_mut(&mut self, stage: Stage) -> &mut T {
        &mut self.0[stage as usize]
    }
}
