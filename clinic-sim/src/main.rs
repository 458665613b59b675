//! Clinic patient flow simulation application.
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

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::Parser;
use eyre::WrapErr;

use clinic_sim::{run_sweep, SimulationConfig};

/// Runs the clinic simulation for a range of arrival rates.
#[derive(Parser)]
#[clap(version, author)]
struct Opt {
    /// Path to a JSON file with the simulation configuration.
    /// Missing fields, or the entire file, fall back to the defaults.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Comma-separated arrival rates; one experiment is run for each.
    #[clap(long, use_value_delimiter = true, default_value = "3.0,5.0,7.0")]
    arrival_rates: Vec<f64>,

    /// Directory where the results are written, one subdirectory per arrival rate.
    #[clap(long, default_value = "outputs/results_csv")]
    output_dir: PathBuf,

    /// Verbosity.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[clap(long)]
    no_stderr: bool,

    /// Show a progress bar for each replication.
    #[clap(long)]
    progress: bool,
}

/// Loads the configuration file, or the default configuration if no file is given.
fn load_config(path: Option<&Path>) -> eyre::Result<SimulationConfig> {
    let config = if let Some(path) = path {
        let file = File::open(path)
            .wrap_err_with(|| format!("unable to open config file: {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .wrap_err_with(|| format!("unable to parse config file: {}", path.display()))?
    } else {
        SimulationConfig::default()
    };
    config.validate().wrap_err("invalid simulation configuration")?;
    Ok(config)
}

/// Set up a logger based on the given user options.
fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let log_level = match opt.verbose {
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        3 => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    };
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(log_level);
    let dispatch = if let Some(path) = &opt.log_output {
        let _ = std::fs::remove_file(path);
        dispatch.chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .append(false)
                .open(path)?,
        )
    } else {
        dispatch
    };
    let dispatch = if opt.no_stderr {
        dispatch
    } else {
        dispatch.chain(std::io::stderr())
    };
    dispatch.apply()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;
    let config = load_config(opt.config.as_deref())?;
    log::info!(
        "Running {} replication(s) for arrival rates {:?}",
        config.replications,
        opt.arrival_rates
    );
    for output in run_sweep(&config, &opt.arrival_rates, &opt.output_dir, opt.progress)? {
        println!("Saved summary: {}", output.summary_file.display());
    }
    Ok(())
}
