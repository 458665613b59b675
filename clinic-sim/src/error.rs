use thiserror::Error;

use crate::{PatientId, Stage, TimestampKey};

/// Invalid simulation configuration, detected before anything is simulated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Lab routing probability outside of `[0, 1]` or NaN.
    #[error("lab routing probability must be within [0, 1], got {0}")]
    InvalidLabProbability(f64),
    /// Arrival rate is infinite. Non-positive and NaN rates are valid and mean no arrivals.
    #[error("arrival rate must be finite, got {0}")]
    InvalidArrivalRate(f64),
    /// Run time is not a positive finite number.
    #[error("run time must be positive and finite, got {0}")]
    InvalidRunTime(f64),
    /// Warmup is negative, not finite, or does not end before the run does.
    #[error("warmup time must be within [0, {run_time}), got {warmup}")]
    InvalidWarmup {
        /// Configured warmup time.
        warmup: f64,
        /// Configured run time.
        run_time: f64,
    },
    /// Zero replications requested.
    #[error("at least one replication is required")]
    NoReplications,
    /// A stage has no servers.
    #[error("stage {0} must have at least one server")]
    NoServers(Stage),
    /// A stage's service time distribution cannot be constructed.
    #[error("invalid service time for stage {stage}: {reason}")]
    InvalidServiceTime {
        /// Affected stage.
        stage: Stage,
        /// What is wrong with the parameters.
        reason: &'static str,
    },
}

/// Attempt to overwrite a timestamp already present in a patient's log.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("timestamp {key} already recorded for patient {patient}")]
pub struct TimestampAlreadySet {
    /// Patient whose log was written to.
    pub patient: PatientId,
    /// The timestamp that was already set.
    pub key: TimestampKey,
}

/// Returned when a string is not of the form `{stage}_{phase}`.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid timestamp key: {0}")]
pub struct ParseTimestampKeyError(pub String);
