use std::time::Duration;

use rand::Rng;
use rand_distr::{Distribution, Exp, Triangular, Uniform};
use serde::{Deserialize, Serialize};

use crate::{to_duration, ConfigError, LabProbability, PerStage, Stage};

/// Service time distribution of a stage, in simulated time units.
///
/// In a configuration file, the variant is selected by the `distribution` field, e.g.,
/// `{"distribution": "exponential", "mean": 0.8}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum ServiceTime {
    /// Exponential distribution with the given mean.
    Exponential {
        /// Mean service time; must be positive and finite.
        mean: f64,
    },
    /// Uniform distribution over `[min, max]`.
    Uniform {
        /// Lower bound.
        min: f64,
        /// Upper bound, not less than `min`.
        max: f64,
    },
    /// Triangular distribution over `[min, max]` peaking at `mode`.
    Triangular {
        /// Lower bound.
        min: f64,
        /// The most likely value.
        mode: f64,
        /// Upper bound.
        max: f64,
    },
    /// Every service takes exactly `value`.
    Constant {
        /// Service time; must be non-negative.
        value: f64,
    },
}

impl ServiceTime {
    /// Constructs the sampler for these parameters.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the parameters do not define a distribution.
    pub fn sampler(&self) -> Result<ServiceTimeSampler, &'static str> {
        match *self {
            Self::Exponential { mean } => {
                if !(mean.is_finite() && mean > 0.0) {
                    return Err("exponential mean must be positive and finite");
                }
                Exp::new(mean.recip())
                    .map(ServiceTimeSampler::Exponential)
                    .map_err(|_| "exponential mean must be positive and finite")
            }
            Self::Uniform { min, max } => {
                if !(min.is_finite() && max.is_finite()) {
                    Err("uniform bounds must be finite")
                } else if !(max - min).is_finite() {
                    Err("uniform range must be finite")
                } else if min > max {
                    Err("uniform lower bound must not exceed the upper bound")
                } else {
                    Ok(ServiceTimeSampler::Uniform(Uniform::new_inclusive(min, max)))
                }
            }
            Self::Triangular { min, mode, max } => {
                if !(min.is_finite() && mode.is_finite() && max.is_finite()) {
                    return Err("triangular parameters must be finite");
                }
                Triangular::new(min, max, mode)
                    .map(ServiceTimeSampler::Triangular)
                    .map_err(|_| "triangular parameters must satisfy min <= mode <= max")
            }
            Self::Constant { value } => {
                if value.is_finite() && value >= 0.0 {
                    Ok(ServiceTimeSampler::Constant(value))
                } else {
                    Err("constant service time must be non-negative and finite")
                }
            }
        }
    }
}

/// Validated, ready-to-sample service time distribution. See [`ServiceTime`].
///
/// Negative samples are clamped to zero.
#[derive(Debug, Clone)]
pub enum ServiceTimeSampler {
    /// Exponential distribution.
    Exponential(Exp<f64>),
    /// Uniform distribution.
    Uniform(Uniform<f64>),
    /// Triangular distribution.
    Triangular(Triangular<f64>),
    /// Constant value.
    Constant(f64),
}

impl Distribution<f64> for ServiceTimeSampler {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let value = match self {
            Self::Exponential(dist) => dist.sample(rng),
            Self::Uniform(dist) => dist.sample(rng),
            Self::Triangular(dist) => dist.sample(rng),
            Self::Constant(value) => *value,
        };
        value.max(0.0)
    }
}

/// Configuration of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Number of parallel servers.
    pub servers: usize,
    /// Service time distribution.
    pub service_time: ServiceTime,
}

impl StageConfig {
    fn exponential(servers: usize, mean: f64) -> Self {
        Self {
            servers,
            service_time: ServiceTime::Exponential { mean },
        }
    }
}

/// Configuration of all four stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    /// Registration desk.
    pub registration: StageConfig,
    /// Doctors.
    pub doctor: StageConfig,
    /// Laboratory.
    pub lab: StageConfig,
    /// Pharmacy.
    pub pharmacy: StageConfig,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            registration: StageConfig::exponential(2, 0.25),
            doctor: StageConfig::exponential(5, 0.8),
            lab: StageConfig::exponential(2, 0.5),
            pharmacy: StageConfig::exponential(3, 0.35),
        }
    }
}

impl StagesConfig {
    /// Returns the configuration of `stage`.
    #[must_use]
    pub fn get(&self, stage: Stage) -> &StageConfig {
        match stage {
            Stage::Registration => &self.registration,
            Stage::Doctor => &self.doctor,
            Stage::Lab => &self.lab,
            Stage::Pharmacy => &self.pharmacy,
        }
    }
}

/// Parameters of an experiment: the clinic, the workload, and the replication plan.
///
/// Every field has a default, so a configuration file only needs to list what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Patients per time unit. Non-positive values produce no patients.
    pub arrival_rate: f64,
    /// Probability of visiting the lab after the doctor.
    pub lab_probability: f64,
    /// Simulation horizon.
    pub run_time: f64,
    /// Patients arriving before this time are excluded from the statistics.
    pub warmup_time: f64,
    /// Number of independent replications.
    pub replications: usize,
    /// Replication `i` is seeded with `base_seed + i`.
    pub base_seed: u64,
    /// Stop generating patients after this many.
    pub max_arrivals: Option<usize>,
    /// Stage capacities and service times.
    pub stages: StagesConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            arrival_rate: 5.0,
            lab_probability: 0.3,
            run_time: 2000.0,
            warmup_time: 200.0,
            replications: 3,
            base_seed: 1000,
            max_arrivals: None,
            stages: StagesConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Returns a copy of this configuration with a different arrival rate.
    #[must_use]
    pub fn with_arrival_rate(&self, arrival_rate: f64) -> Self {
        Self {
            arrival_rate,
            ..self.clone()
        }
    }

    /// Checks every parameter. Called before anything is simulated.
    ///
    /// # Errors
    ///
    /// Returns the first problem found. See [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.routing_probability()?;
        if self.arrival_rate.is_infinite() && self.arrival_rate > 0.0 {
            return Err(ConfigError::InvalidArrivalRate(self.arrival_rate));
        }
        if !(self.run_time.is_finite() && self.run_time > 0.0) {
            return Err(ConfigError::InvalidRunTime(self.run_time));
        }
        if !(self.warmup_time >= 0.0 && self.warmup_time < self.run_time) {
            return Err(ConfigError::InvalidWarmup {
                warmup: self.warmup_time,
                run_time: self.run_time,
            });
        }
        if self.replications == 0 {
            return Err(ConfigError::NoReplications);
        }
        self.samplers()?;
        Ok(())
    }

    /// Validated lab routing probability.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLabProbability`] if the probability is not within `[0, 1]`.
    pub fn routing_probability(&self) -> Result<LabProbability, ConfigError> {
        LabProbability::new(self.lab_probability)
    }

    /// Number of servers at each stage.
    #[must_use]
    pub fn servers(&self) -> PerStage<usize> {
        PerStage::from_fn(|stage| self.stages.get(stage).servers)
    }

    /// Service time samplers of all stages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoServers`] or [`ConfigError::InvalidServiceTime`] for the first
    /// misconfigured stage.
    pub fn samplers(&self) -> Result<PerStage<ServiceTimeSampler>, ConfigError> {
        PerStage::try_from_fn(|stage| {
            let config = self.stages.get(stage);
            if config.servers == 0 {
                return Err(ConfigError::NoServers(stage));
            }
            config
                .service_time
                .sampler()
                .map_err(|reason| ConfigError::InvalidServiceTime { stage, reason })
        })
    }

    /// The simulation horizon.
    #[must_use]
    pub fn horizon(&self) -> Duration {
        to_duration(self.run_time)
    }

    /// The end of the warmup period.
    #[must_use]
    pub fn warmup(&self) -> Duration {
        to_duration(self.warmup_time)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.servers()[Stage::Doctor], 5);
        assert_eq!(config.horizon(), Duration::from_secs(2000));
        assert_eq!(config.warmup(), Duration::from_secs(200));
    }

    #[test]
    fn test_parse_partial_config() {
        let config: SimulationConfig = serde_json::from_str(
            r#"{
                "arrival_rate": 7.0,
                "max_arrivals": 100,
                "stages": {
                    "lab": {
                        "servers": 1,
                        "service_time": {"distribution": "triangular", "min": 0.1, "mode": 0.2, "max": 0.6}
                    }
                }
            }"#,
        )
        .unwrap();
        assert!(float_cmp::approx_eq!(f64, config.arrival_rate, 7.0));
        assert_eq!(config.max_arrivals, Some(100));
        assert_eq!(config.replications, 3);
        assert_eq!(
            config.stages.lab,
            StageConfig {
                servers: 1,
                service_time: ServiceTime::Triangular {
                    min: 0.1,
                    mode: 0.2,
                    max: 0.6
                }
            }
        );
        assert_eq!(config.stages.doctor, StagesConfig::default().doctor);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<SimulationConfig>(r#"{"arival_rate": 1.0}"#).is_err());
    }

    #[rstest(
        config,
        expected,
        case(
            SimulationConfig { lab_probability: 1.5, ..SimulationConfig::default() },
            ConfigError::InvalidLabProbability(1.5)
        ),
        case(
            SimulationConfig { arrival_rate: f64::INFINITY, ..SimulationConfig::default() },
            ConfigError::InvalidArrivalRate(f64::INFINITY)
        ),
        case(
            SimulationConfig { run_time: 0.0, ..SimulationConfig::default() },
            ConfigError::InvalidRunTime(0.0)
        ),
        case(
            SimulationConfig { warmup_time: 2000.0, ..SimulationConfig::default() },
            ConfigError::InvalidWarmup { warmup: 2000.0, run_time: 2000.0 }
        ),
        case(
            SimulationConfig { replications: 0, ..SimulationConfig::default() },
            ConfigError::NoReplications
        )
    )]
    fn test_validation(config: SimulationConfig, expected: ConfigError) {
        assert_eq!(config.validate(), Err(expected));
    }

    #[test]
    fn test_stage_validation() {
        let mut config = SimulationConfig::default();
        config.stages.pharmacy.servers = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NoServers(Stage::Pharmacy))
        );
        let mut config = SimulationConfig::default();
        config.stages.lab.service_time = ServiceTime::Uniform { min: 2.0, max: 1.0 };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidServiceTime {
                stage: Stage::Lab,
                ..
            })
        ));
    }

    #[test]
    fn test_non_positive_rate_is_valid() {
        let config = SimulationConfig::default().with_arrival_rate(0.0);
        assert!(config.validate().is_ok());
        let config = SimulationConfig::default().with_arrival_rate(-1.0);
        assert!(config.validate().is_ok());
    }

    #[rstest(
        service_time,
        valid,
        case(ServiceTime::Exponential { mean: 1.0 }, true),
        case(ServiceTime::Exponential { mean: 0.0 }, false),
        case(ServiceTime::Exponential { mean: f64::NAN }, false),
        case(ServiceTime::Uniform { min: 1.0, max: 1.0 }, true),
        case(ServiceTime::Uniform { min: 1.0, max: f64::INFINITY }, false),
        case(ServiceTime::Uniform { min: -1e308, max: 1e308 }, false),
        case(ServiceTime::Uniform { min: 0.0, max: 1e308 }, true),
        case(ServiceTime::Constant { value: 1e30 }, true),
        case(ServiceTime::Triangular { min: 0.0, mode: 1.0, max: 2.0 }, true),
        case(ServiceTime::Triangular { min: 0.0, mode: 3.0, max: 2.0 }, false),
        case(ServiceTime::Constant { value: 0.0 }, true),
        case(ServiceTime::Constant { value: -1.0 }, false)
    )]
    fn test_sampler_construction(service_time: ServiceTime, valid: bool) {
        assert_eq!(service_time.sampler().is_ok(), valid);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_sampled_values() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let constant = ServiceTime::Constant { value: 2.5 }.sampler().unwrap();
        assert!(float_cmp::approx_eq!(f64, constant.sample(&mut rng), 2.5));

        let uniform = ServiceTime::Uniform { min: -1.0, max: 1.0 }
            .sampler()
            .unwrap();
        assert!((0..1000).all(|_| (0.0..=1.0).contains(&uniform.sample(&mut rng))));

        let n = 20_000;
        let exponential = ServiceTime::Exponential { mean: 0.5 }.sampler().unwrap();
        let mean = (0..n).map(|_| exponential.sample(&mut rng)).sum::<f64>() / n as f64;
        assert!((mean - 0.5).abs() < 5.0 * 0.5 / (n as f64).sqrt(), "mean = {}", mean);
    }

    #[test]
    fn test_serialize_service_time() {
        assert_eq!(
            serde_json::to_string(&ServiceTime::Constant { value: 1.0 }).unwrap(),
            r#"{"distribution":"constant","value":1.0}"#
        );
    }
}
