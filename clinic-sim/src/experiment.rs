use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::WrapErr;
use itertools::Itertools;

use crate::{run_replication, to_units, AggregateSummary, Patient, SimulationConfig, TimestampKey};

/// Files written by [`run_experiment`], and the aggregated statistics.
#[derive(Debug, Clone)]
pub struct ExperimentOutput {
    /// Patient records of each replication, in replication order.
    pub patient_files: Vec<PathBuf>,
    /// Per-replication and aggregate summary.
    pub summary_file: PathBuf,
    /// Mean and standard deviation of each metric.
    pub aggregate: AggregateSummary,
}

fn format_time(time: Option<Duration>) -> String {
    time.map(|t| to_units(t).to_string()).unwrap_or_default()
}

/// Writes one row per patient: ID, arrival time, all timestamps, and the exit time.
/// Missing timestamps are left empty.
fn write_patients(path: &Path, patients: &[Patient]) -> eyre::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("unable to create file: {}", path.display()))?;
    let header = ["patient_id", "arrival_time"]
        .iter()
        .map(|s| (*s).to_string())
        .chain(TimestampKey::all().map(|key| key.to_string()))
        .chain(std::iter::once(String::from("exit_time")))
        .collect_vec();
    writer.write_record(&header)?;
    for patient in patients {
        let row = std::iter::once(patient.id().to_string())
            .chain(std::iter::once(format_time(Some(patient.arrival_time()))))
            .chain(TimestampKey::all().map(|key| format_time(patient.get(key.stage, key.phase))))
            .chain(std::iter::once(format_time(patient.exit_time())))
            .collect_vec();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one row per replication, followed by `mean` and `std` rows.
fn write_summary(
    path: &Path,
    replications: &[(u64, Vec<(String, f64)>)],
    aggregate: &AggregateSummary,
) -> eyre::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("unable to create file: {}", path.display()))?;
    let header = ["replication", "seed"]
        .iter()
        .map(|s| (*s).to_string())
        .chain(aggregate.names.iter().cloned())
        .collect_vec();
    writer.write_record(&header)?;
    for (idx, (seed, metrics)) in replications.iter().enumerate() {
        let row = vec![idx.to_string(), seed.to_string()]
            .into_iter()
            .chain(metrics.iter().map(|(_, value)| value.to_string()))
            .collect_vec();
        writer.write_record(&row)?;
    }
    for (label, values) in &[("mean", &aggregate.mean), ("std", &aggregate.std)] {
        let row = vec![(*label).to_string(), String::new()]
            .into_iter()
            .chain(values.iter().map(ToString::to_string))
            .collect_vec();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Runs all replications of `config` and writes the results to `output_dir`.
///
/// Replication `i` is seeded with `base_seed + i` and its patients are written to
/// `patients_rep{i}.csv`. The summary of all replications goes to `summary_{workload_name}.csv`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, in which case nothing is simulated, or if
/// any of the output files cannot be written.
pub fn run_experiment(
    config: &SimulationConfig,
    output_dir: &Path,
    workload_name: &str,
    progress: bool,
) -> eyre::Result<ExperimentOutput> {
    config
        .validate()
        .wrap_err("invalid simulation configuration")?;
    fs::create_dir_all(output_dir).wrap_err_with(|| {
        format!(
            "unable to create output directory: {}",
            output_dir.display()
        )
    })?;
    let mut patient_files = Vec::with_capacity(config.replications);
    let mut summaries = Vec::with_capacity(config.replications);
    for replication in 0..config.replications {
        let seed = config.base_seed.wrapping_add(replication as u64);
        log::info!(
            "[{}] Replication {}/{} (seed {})",
            workload_name,
            replication + 1,
            config.replications,
            seed
        );
        let result = run_replication(config, seed, progress)?;
        let path = output_dir.join(format!("patients_rep{}.csv", replication));
        write_patients(&path, &result.patients)?;
        patient_files.push(path);
        summaries.push(result.summary);
    }
    let aggregate = AggregateSummary::new(&summaries);
    let rows = summaries
        .iter()
        .enumerate()
        .map(|(replication, summary)| {
            (
                config.base_seed.wrapping_add(replication as u64),
                summary.metrics(),
            )
        })
        .collect_vec();
    let summary_file = output_dir.join(format!("summary_{}.csv", workload_name));
    write_summary(&summary_file, &rows, &aggregate)?;
    log::info!("[{}] Summary written to {}", workload_name, summary_file.display());
    Ok(ExperimentOutput {
        patient_files,
        summary_file,
        aggregate,
    })
}

/// Runs [`run_experiment`] once per arrival rate.
///
/// The results for rate `λ` are written to `{output_dir}/workload_lambda_{λ}` under the workload
/// name `lam_{λ}`. Rates are formatted with a decimal point, e.g., `workload_lambda_3.0`.
///
/// # Errors
///
/// Stops at the first failed experiment and returns its error.
pub fn run_sweep(
    config: &SimulationConfig,
    arrival_rates: &[f64],
    output_dir: &Path,
    progress: bool,
) -> eyre::Result<Vec<ExperimentOutput>> {
    arrival_rates
        .iter()
        .map(|&rate| {
            let workload_dir = output_dir.join(format!("workload_lambda_{:?}", rate));
            let workload_name = format!("lam_{:?}", rate);
            run_experiment(
                &config.with_arrival_rate(rate),
                &workload_dir,
                &workload_name,
                progress,
            )
            .wrap_err_with(|| format!("experiment failed for arrival rate {}", rate))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ConfigError;

    fn config() -> SimulationConfig {
        SimulationConfig {
            arrival_rate: 2.0,
            run_time: 60.0,
            warmup_time: 10.0,
            replications: 2,
            base_seed: 11,
            ..SimulationConfig::default()
        }
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let header = reader
            .headers()
            .unwrap()
            .iter()
            .map(String::from)
            .collect_vec();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect_vec())
            .collect_vec();
        (header, rows)
    }

    #[test]
    fn test_experiment_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_experiment(&config(), dir.path(), "test", false).unwrap();

        assert_eq!(
            output.patient_files,
            vec![
                dir.path().join("patients_rep0.csv"),
                dir.path().join("patients_rep1.csv")
            ]
        );
        assert_eq!(output.summary_file, dir.path().join("summary_test.csv"));

        let (header, rows) = read_rows(&output.patient_files[0]);
        assert_eq!(header.len(), 2 + 12 + 1);
        assert_eq!(header[2], "registration_arrival");
        assert_eq!(header[14], "exit_time");
        assert!(!rows.is_empty());
        let ids: Vec<usize> = rows.iter().map(|r| r[0].parse().unwrap()).collect();
        assert_eq!(ids, (1..=rows.len()).collect_vec());

        let (header, rows) = read_rows(&output.summary_file);
        assert_eq!(&header[..3], &["replication", "seed", "generated"]);
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[0][..2], &["0", "11"]);
        assert_eq!(&rows[1][..2], &["1", "12"]);
        assert_eq!(rows[2][0], "mean");
        assert_eq!(rows[3][0], "std");
        assert_eq!(output.aggregate.names.len() + 2, header.len());
    }

    #[test]
    fn test_invalid_config_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulationConfig {
            lab_probability: 2.0,
            ..config()
        };
        let err = run_experiment(&config, &dir.path().join("out"), "test", false).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::InvalidLabProbability(2.0))
        );
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_sweep_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulationConfig {
            replications: 1,
            ..config()
        };
        let outputs = run_sweep(&config, &[1.0, 2.5], dir.path(), false).unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(
            outputs[0].summary_file,
            dir.path().join("workload_lambda_1.0").join("summary_lam_1.0.csv")
        );
        assert_eq!(
            outputs[1].summary_file,
            dir.path().join("workload_lambda_2.5").join("summary_lam_2.5.csv")
        );
        assert!(outputs.iter().all(|o| o.summary_file.exists()));
    }
}
