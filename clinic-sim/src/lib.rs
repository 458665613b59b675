//! Clinic patient flow simulation.
//!
//! Patients arrive as a homogeneous Poisson process and walk through a network of service
//! nodes: registration, doctor, optionally the lab, and finally the pharmacy. Each node is a
//! multi-server FIFO queue with a stochastic service time. Every patient carries a log of
//! timestamps (arrival to a node's queue, start and end of service) from which waiting times,
//! sojourn times, throughput, and utilization are derived after the run.
//!
//! Simulated time is unitless. One unit is represented by one second of [`Duration`], so an
//! arrival rate of `5.0` means five patients per second of simulated time on average.

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::inline_always
)]

use std::time::Duration;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

mod arrival;
pub use arrival::{Arrival, ArrivalGenerator, Event as ArrivalEvent, PoissonArrivals};

mod config;
pub use config::{ServiceTime, ServiceTimeSampler, SimulationConfig, StageConfig, StagesConfig};

mod error;
pub use error::{ConfigError, ParseTimestampKeyError, TimestampAlreadySet};

mod experiment;
pub use experiment::{run_experiment, run_sweep, ExperimentOutput};

mod node;
pub use node::{Event as NodeEvent, QueueEntry, ServiceNode};

mod pathway;
pub use pathway::{Event as PathwayEvent, Pathway};

mod patient;
pub use patient::{Patient, TimestampKey};

mod patient_log;
pub use patient_log::PatientLog;

mod replication;
pub use replication::{run_replication, Clinic, ReplicationResult};

mod router;
pub use router::{LabProbability, LabRouter, Route};

mod stage;
pub use stage::{PerStage, Phase, Stage};

mod summary;
pub use summary::{AggregateSummary, ReplicationSummary, StageSummary, Window};

/// Patient ID, assigned sequentially in arrival order starting at 1.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct PatientId(usize);

/// Converts a number of simulated time units to the clock representation.
///
/// Negative and NaN values map to zero, values too large to represent saturate.
#[must_use]
pub fn to_duration(units: f64) -> Duration {
    if units.is_nan() || units <= 0.0 {
        Duration::default()
    } else {
        Duration::try_from_secs_f64(units).unwrap_or(Duration::MAX)
    }
}

/// Converts a clock value back to simulated time units.
#[must_use]
pub fn to_units(time: Duration) -> f64 {
    time.as_secs_f64()
}
