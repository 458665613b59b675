use std::time::Duration;

use itertools::Itertools;

use crate::{to_units, Patient, PerStage, Phase, Stage};

/// The observation window of a replication: from the end of the warmup to the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Start of the window; patients arriving earlier are not observed.
    pub warmup: Duration,
    /// End of the simulation.
    pub horizon: Duration,
}

impl Window {
    /// Constructs a window, clamping `warmup` to the horizon.
    #[must_use]
    pub fn new(warmup: Duration, horizon: Duration) -> Self {
        Self {
            warmup: warmup.min(horizon),
            horizon,
        }
    }

    /// Length of the window in time units.
    #[must_use]
    pub fn length(&self) -> f64 {
        to_units(self.horizon - self.warmup)
    }

    /// Whether a patient that arrived at `time` is observed.
    #[must_use]
    pub fn observes(&self, time: Duration) -> bool {
        time >= self.warmup
    }

    /// Part of `[start, end]` that lies inside the window, in time units.
    #[must_use]
    pub fn overlap(&self, start: Duration, end: Duration) -> f64 {
        let start = start.max(self.warmup);
        let end = end.min(self.horizon);
        if end > start {
            to_units(end - start)
        } else {
            0.0
        }
    }
}

/// Arithmetic mean, or NaN if there are no values.
#[allow(clippy::cast_precision_loss)]
fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Statistics of one stage in one replication.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageSummary {
    /// Observed patients whose service at this stage ended.
    pub served: usize,
    /// Mean time between joining the queue and the start of service.
    pub mean_wait: f64,
    /// Mean service duration.
    pub mean_service: f64,
    /// Mean time between joining the queue and the end of service.
    pub mean_time_in_node: f64,
    /// Fraction of server capacity used inside the observation window.
    pub utilization: f64,
    /// Longest queue seen during the whole run.
    pub max_queue_len: usize,
}

impl StageSummary {
    fn new(
        stage: Stage,
        patients: &[Patient],
        servers: usize,
        max_queue_len: usize,
        window: Window,
    ) -> Self {
        let observed = || {
            patients
                .iter()
                .filter(move |p| window.observes(p.arrival_time()))
        };
        let span = |patient: &Patient, from: Phase, to: Phase| {
            Some(to_units(patient.get(stage, to)? - patient.get(stage, from)?))
        };
        let busy: f64 = patients
            .iter()
            .filter_map(|p| {
                let start = p.get(stage, Phase::ServiceStart)?;
                let end = p.get(stage, Phase::ServiceEnd).unwrap_or(window.horizon);
                Some(window.overlap(start, end))
            })
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let capacity = servers as f64 * window.length();
        Self {
            served: observed()
                .filter(|p| p.get(stage, Phase::ServiceEnd).is_some())
                .count(),
            mean_wait: mean(
                observed().filter_map(|p| span(p, Phase::Arrival, Phase::ServiceStart)),
            ),
            mean_service: mean(
                observed().filter_map(|p| span(p, Phase::ServiceStart, Phase::ServiceEnd)),
            ),
            mean_time_in_node: mean(
                observed().filter_map(|p| span(p, Phase::Arrival, Phase::ServiceEnd)),
            ),
            utilization: if capacity > 0.0 { busy / capacity } else { f64::NAN },
            max_queue_len,
        }
    }
}

/// Statistics of a single replication.
///
/// Only patients arriving inside the observation window are counted. Patients that had not left
/// the clinic by the horizon are counted as incomplete and excluded from all means; their partial
/// visits still count towards the stage statistics and utilization.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationSummary {
    /// Observed patients.
    pub generated: usize,
    /// Observed patients that left the clinic through the pharmacy.
    pub completed: usize,
    /// Observed patients still in the clinic at the horizon.
    pub incomplete: usize,
    /// Mean time from arrival to exit over completed patients.
    pub mean_sojourn: f64,
    /// Completed patients per time unit of the window.
    pub throughput: f64,
    /// Fraction of patients sent to the lab among those who finished seeing a doctor.
    pub lab_fraction: f64,
    /// Per-stage statistics.
    pub stages: PerStage<StageSummary>,
}

impl ReplicationSummary {
    /// Computes the summary from all patients of a replication.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(
        patients: &[Patient],
        servers: &PerStage<usize>,
        max_queue_len: &PerStage<usize>,
        window: Window,
    ) -> Self {
        let observed = patients
            .iter()
            .filter(|p| window.observes(p.arrival_time()))
            .collect_vec();
        let (completed, incomplete): (Vec<&Patient>, Vec<&Patient>) =
            observed.iter().copied().partition(|p| p.is_discharged());
        let saw_doctor = observed
            .iter()
            .filter(|p| p.get(Stage::Doctor, Phase::ServiceEnd).is_some())
            .collect_vec();
        let lab_fraction = if saw_doctor.is_empty() {
            f64::NAN
        } else {
            saw_doctor.iter().filter(|p| p.visited(Stage::Lab)).count() as f64
                / saw_doctor.len() as f64
        };
        let window_length = window.length();
        Self {
            generated: observed.len(),
            completed: completed.len(),
            incomplete: incomplete.len(),
            mean_sojourn: mean(
                completed
                    .iter()
                    .filter_map(|p| Some(to_units(p.exit_time()? - p.arrival_time()))),
            ),
            throughput: if window_length > 0.0 {
                completed.len() as f64 / window_length
            } else {
                f64::NAN
            },
            lab_fraction,
            stages: PerStage::from_fn(|stage| {
                StageSummary::new(
                    stage,
                    patients,
                    servers[stage],
                    max_queue_len[stage],
                    window,
                )
            }),
        }
    }

    /// Flattens the summary into named scalar metrics, in a fixed order.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn metrics(&self) -> Vec<(String, f64)> {
        let overall = vec![
            (String::from("generated"), self.generated as f64),
            (String::from("completed"), self.completed as f64),
            (String::from("incomplete"), self.incomplete as f64),
            (String::from("mean_sojourn"), self.mean_sojourn),
            (String::from("throughput"), self.throughput),
            (String::from("lab_fraction"), self.lab_fraction),
        ];
        let per_stage = self.stages.iter().flat_map(|(stage, s)| {
            vec![
                (format!("{}_served", stage), s.served as f64),
                (format!("{}_mean_wait", stage), s.mean_wait),
                (format!("{}_mean_service", stage), s.mean_service),
                (format!("{}_mean_time_in_node", stage), s.mean_time_in_node),
                (format!("{}_utilization", stage), s.utilization),
                (format!("{}_max_queue_len", stage), s.max_queue_len as f64),
            ]
        });
        overall.into_iter().chain(per_stage).collect()
    }
}

/// Mean and sample standard deviation of each metric across replications.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSummary {
    /// Metric names, in the order of [`ReplicationSummary::metrics`].
    pub names: Vec<String>,
    /// Means across replications.
    pub mean: Vec<f64>,
    /// Sample standard deviations; NaN if there is only one replication.
    pub std: Vec<f64>,
}

impl AggregateSummary {
    /// Aggregates replication summaries.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(replications: &[ReplicationSummary]) -> Self {
        let metrics = replications.iter().map(ReplicationSummary::metrics).collect_vec();
        let names = metrics
            .first()
            .map(|m| m.iter().map(|(name, _)| name.clone()).collect_vec())
            .unwrap_or_default();
        let columns = (0..names.len())
            .map(|idx| metrics.iter().map(|m| m[idx].1).collect_vec())
            .collect_vec();
        let mean = columns.iter().map(|c| self::mean(c.iter().copied())).collect_vec();
        let std = columns
            .iter()
            .zip(&mean)
            .map(|(column, mean)| {
                if column.len() < 2 {
                    f64::NAN
                } else {
                    let squares: f64 = column.iter().map(|v| (v - mean).powi(2)).sum();
                    (squares / (column.len() - 1) as f64).sqrt()
                }
            })
            .collect_vec();
        Self { names, mean, std }
    }

    /// Looks up the mean of the named metric.
    #[must_use]
    pub fn mean_of(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.mean[idx])
    }
}
