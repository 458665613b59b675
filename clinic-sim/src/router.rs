use std::convert::TryFrom;

use rand::Rng;

use crate::ConfigError;

/// Probability of sending a patient to the lab after the doctor; always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LabProbability(f64);

impl LabProbability {
    /// Validates the probability.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLabProbability`] if `probability` is NaN or outside of
    /// `[0, 1]`.
    pub fn new(probability: f64) -> Result<Self, ConfigError> {
        if (0.0..=1.0).contains(&probability) {
            Ok(Self(probability))
        } else {
            Err(ConfigError::InvalidLabProbability(probability))
        }
    }

    /// The probability value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for LabProbability {
    type Error = ConfigError;
    fn try_from(probability: f64) -> Result<Self, Self::Error> {
        Self::new(probability)
    }
}

/// Where a patient goes after the doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Lab first, then pharmacy.
    Lab,
    /// Straight to the pharmacy.
    Pharmacy,
}

/// Makes the post-doctor routing decision.
///
/// Each call to [`LabRouter::route`] draws exactly one uniform value `u` from `[0, 1)` and sends
/// the patient to the lab iff `u < p`. Thus, `p = 0` never routes to the lab and `p = 1`
/// always does.
pub struct LabRouter<R> {
    probability: LabProbability,
    rng: R,
}

impl<R: Rng> LabRouter<R> {
    /// Creates a router drawing from `rng`.
    pub fn new(probability: LabProbability, rng: R) -> Self {
        Self { probability, rng }
    }

    /// Decides the route of one patient.
    pub fn route(&mut self) -> Route {
        if self.rng.gen::<f64>() < self.probability.value() {
            Route::Lab
        } else {
            Route::Pharmacy
        }
    }
}
