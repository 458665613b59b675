use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sim_engine::{ComponentId, Key, Simulation};

use crate::{
    ArrivalEvent, ArrivalGenerator, ConfigError, LabRouter, NodeEvent, Pathway, Patient,
    PatientLog, PerStage, PoissonArrivals, ReplicationSummary, ServiceNode, ServiceTimeSampler,
    SimulationConfig, Stage, Window,
};

type Node = ServiceNode<ChaCha8Rng, ServiceTimeSampler>;

const ARRIVAL_STREAM: u64 = 0;
const ROUTING_STREAM: u64 = 1;
const FIRST_NODE_STREAM: u64 = 2;

/// Each component gets its own stream of the replication's generator, so that changing one
/// stage's parameters does not shift the random numbers seen by the others.
fn rng(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Everything produced by a single replication.
#[derive(Debug, Clone)]
pub struct ReplicationResult {
    /// Seed of the replication.
    pub seed: u64,
    /// All patients created, sorted by ID, including those still in the clinic at the horizon.
    pub patients: Vec<Patient>,
    /// Summary statistics.
    pub summary: ReplicationSummary,
}

/// A fully wired clinic, ready to be simulated up to the horizon.
pub struct Clinic {
    simulation: Simulation,
    patient_log: Key<PatientLog>,
    nodes: PerStage<ComponentId<NodeEvent>>,
    servers: PerStage<usize>,
    window: Window,
    seed: u64,
}

impl Clinic {
    /// Validates the configuration and builds the network of components for the replication
    /// seeded with `seed`. The first arrival is scheduled, but no event is processed yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid. See [`SimulationConfig::validate`].
    pub fn build(config: &SimulationConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let probability = config.routing_probability()?;
        let samplers = config.samplers()?;
        if config.arrival_rate.is_nan() || config.arrival_rate <= 0.0 {
            log::warn!(
                "Arrival rate is {}: no patients will arrive",
                config.arrival_rate
            );
        }

        let mut simulation = Simulation::default();
        let patient_log = simulation
            .state
            .insert(PatientLog::new(simulation.scheduler.clock()));
        let nodes = PerStage::from_fn(|stage| {
            let queue = simulation.add_queue();
            simulation.add_component(Node::new(
                stage,
                config.stages.get(stage).servers,
                samplers[stage].clone(),
                rng(seed, FIRST_NODE_STREAM + stage as u64),
                queue,
            ))
        });
        let pathway = simulation.add_component(Pathway::new(
            LabRouter::new(probability, rng(seed, ROUTING_STREAM)),
            nodes[Stage::Doctor],
            nodes[Stage::Lab],
            nodes[Stage::Pharmacy],
            patient_log,
        ));
        let generator = simulation.add_component(ArrivalGenerator::new(
            PoissonArrivals::new(
                rng(seed, ARRIVAL_STREAM),
                config.arrival_rate,
                config.max_arrivals,
            ),
            nodes[Stage::Registration],
            pathway,
            patient_log,
        ));
        simulation.schedule(Duration::default(), generator, ArrivalEvent::Start);

        Ok(Self {
            simulation,
            patient_log,
            nodes,
            servers: config.servers(),
            window: Window::new(config.warmup(), config.horizon()),
            seed,
        })
    }

    /// The service node of `stage`.
    ///
    /// # Panics
    ///
    /// Panics if the node has been removed from the simulation, which cannot happen through the
    /// public API.
    #[must_use]
    pub fn node(&self, stage: Stage) -> &ServiceNode<ChaCha8Rng, ServiceTimeSampler> {
        self.simulation
            .component::<Node>(self.nodes[stage])
            .expect("Service node not found")
    }

    /// The patient log, with live counters.
    ///
    /// # Panics
    ///
    /// Panics if the log is missing from the state, which cannot happen before [`Clinic::run`].
    #[must_use]
    pub fn patient_log(&self) -> &PatientLog {
        self.simulation
            .state
            .get(self.patient_log)
            .expect("Patient log not found in state")
    }

    /// Runs the simulation up to the horizon and collects the results.
    ///
    /// Patients still waiting or being served at the horizon are included with the timestamps
    /// recorded so far. If `progress` is set, a progress bar with live patient counters is shown.
    #[must_use]
    pub fn run(mut self, progress: bool) -> ReplicationResult {
        let horizon = self.window.horizon;
        log::info!(
            "Starting replication with seed {} until {:?}",
            self.seed,
            horizon
        );
        let pb = if progress {
            ProgressBar::new(horizon.as_secs())
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(ProgressStyle::default_bar().template("{msg} {wide_bar} {percent}%"));
        let log_key = self.patient_log;
        let processed = self.simulation.run_until_with(horizon, |sim| {
            let time = sim.scheduler.time();
            let secs = time.as_secs();
            if pb.position() < secs {
                let patient_log = sim.state.get(log_key).expect("Missing patient log in state");
                pb.set_position(secs);
                pb.set_message(&format!(
                    "[{time}] [A={active}] [D={discharged}] [TT={total:.2}]",
                    time = secs,
                    active = patient_log.active_patients(),
                    discharged = patient_log.discharged_patients(),
                    total = patient_log.total_throughput(),
                ));
            }
        });
        pb.finish_and_clear();

        let max_queue_len = PerStage::from_fn(|stage| {
            self.simulation
                .state
                .max_len(self.node(stage).queue())
        });
        let in_flight = self.simulation.state.drain::<Patient>();
        let patient_log = self
            .simulation
            .state
            .remove(self.patient_log)
            .expect("Patient log not found in state");
        log::info!(
            "Replication with seed {} finished after {} events: {} patients, {} discharged, {} in the clinic",
            self.seed,
            processed,
            patient_log.registered_patients(),
            patient_log.discharged_patients(),
            in_flight.len(),
        );
        let patients = patient_log.into_patients(in_flight);
        let summary =
            ReplicationSummary::new(&patients, &self.servers, &max_queue_len, self.window);
        ReplicationResult {
            seed: self.seed,
            patients,
            summary,
        }
    }
}

/// Runs a single replication seeded with `seed`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid; nothing is simulated in that case.
pub fn run_replication(
    config: &SimulationConfig,
    seed: u64,
    progress: bool,
) -> Result<ReplicationResult, ConfigError> {
    Ok(Clinic::build(config, seed)?.run(progress))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Phase, ServiceTime, StageConfig};

    fn constant(servers: usize, value: f64) -> StageConfig {
        StageConfig {
            servers,
            service_time: ServiceTime::Constant { value },
        }
    }

    fn config() -> SimulationConfig {
        let mut config = SimulationConfig {
            arrival_rate: 1.0,
            lab_probability: 0.5,
            run_time: 200.0,
            warmup_time: 0.0,
            max_arrivals: Some(20),
            ..SimulationConfig::default()
        };
        config.stages.registration = constant(1, 0.5);
        config.stages.doctor = constant(2, 1.0);
        config.stages.lab = constant(1, 2.0);
        config.stages.pharmacy = constant(1, 0.25);
        config
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = SimulationConfig {
            lab_probability: -0.5,
            ..config()
        };
        assert_eq!(
            Clinic::build(&config, 1).err(),
            Some(ConfigError::InvalidLabProbability(-0.5))
        );
    }

    #[test]
    fn test_wiring() {
        let clinic = Clinic::build(&config(), 1).unwrap();
        assert_eq!(clinic.node(Stage::Doctor).servers(), 2);
        assert_eq!(clinic.node(Stage::Lab).stage(), Stage::Lab);
        assert_eq!(clinic.patient_log().registered_patients(), 0);
    }

    #[test]
    fn test_constant_service_times() {
        let result = run_replication(&config(), 7, false).unwrap();
        assert_eq!(result.seed, 7);
        assert_eq!(result.patients.len(), 20);
        assert_eq!(result.summary.completed, 20);
        for patient in &result.patients {
            let service = |stage| {
                Some(
                    patient.get(stage, Phase::ServiceEnd)?
                        - patient.get(stage, Phase::ServiceStart)?,
                )
            };
            assert_eq!(service(Stage::Registration), Some(Duration::from_millis(500)));
            assert_eq!(service(Stage::Doctor), Some(Duration::from_secs(1)));
            assert_eq!(service(Stage::Pharmacy), Some(Duration::from_millis(250)));
            if patient.visited(Stage::Lab) {
                assert_eq!(service(Stage::Lab), Some(Duration::from_secs(2)));
            }
        }
        let summary = &result.summary;
        assert!(float_cmp::approx_eq!(
            f64,
            summary.stages[Stage::Doctor].mean_service,
            1.0
        ));
    }

    #[test]
    fn test_service_beyond_clock_range() {
        let mut config = config();
        config.stages.registration = constant(1, 1e30);
        assert!(config.validate().is_ok());
        let result = run_replication(&config, 4, false).unwrap();
        assert_eq!(result.summary.completed, 0);
        let first = &result.patients[0];
        assert!(first.get(Stage::Registration, Phase::ServiceStart).is_some());
        assert_eq!(first.get(Stage::Registration, Phase::ServiceEnd), None);
        assert!(result.patients[1..]
            .iter()
            .all(|p| p.get(Stage::Registration, Phase::ServiceStart).is_none()));
    }

    #[test]
    fn test_arrival_gap_beyond_clock_range() {
        let config = SimulationConfig {
            arrival_rate: 1e-300,
            ..config()
        };
        let result = run_replication(&config, 4, false).unwrap();
        assert!(result.patients.is_empty());
    }

    #[test]
    fn test_horizon_censors_patients() {
        let config = SimulationConfig {
            run_time: 5.0,
            max_arrivals: None,
            arrival_rate: 10.0,
            ..config()
        };
        let result = run_replication(&config, 3, false).unwrap();
        assert!(result.summary.incomplete > 0);
        assert!(result
            .patients
            .iter()
            .all(|p| p.arrival_time() <= Duration::from_secs(5)));
        assert_eq!(
            result.summary.generated,
            result.summary.completed + result.summary.incomplete
        );
    }
}
