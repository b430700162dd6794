//! CLI glue: a scenario TOML config plus a CSV data file, stepped through
//! one `Prognoser` instance. The out-of-scope `ProgManager` loop reduced to
//! the straightforward driver a competent engineer writes around the core.

use std::env::{set_var, var};
use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use prognoser_rs::config::{build_prognoser, load_config_map};
use prognoser_rs::playback::PlaybackCommunicator;

const LOG_VAR: &str = "PROGNOSER_LOG";

#[derive(Parser)]
#[command(name = "prognoser", about = "Model-based prognostics runner")]
struct Cli {
    /// Path to the scenario TOML config (model/observer/predictor/load-estimator).
    scenario: PathBuf,

    /// Path to the CSV data file to replay (header: time,<input/output names>...).
    data: PathBuf,
}

fn main() {
    if var(LOG_VAR).is_err() {
        set_var(LOG_VAR, "info");
    }
    if pretty_env_logger::try_init_custom_env(LOG_VAR).is_err() {
        println!("could not init logger");
    }

    let cli = Cli::parse();

    let cfg = match load_config_map(&cli.scenario) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load scenario {}: {e}", cli.scenario.display());
            std::process::exit(1);
        }
    };

    let mut prognoser = match build_prognoser(&cfg) {
        Ok(p) => p,
        Err(e) => {
            error!("failed to build prognoser: {e}");
            std::process::exit(1);
        }
    };

    let mut playback = match PlaybackCommunicator::open(&cli.data) {
        Ok(p) => p,
        Err(e) => {
            error!("failed to open data file {}: {e}", cli.data.display());
            std::process::exit(1);
        }
    };

    info!("loaded scenario `{}`", cli.scenario.display());

    let mut steps = 0usize;
    loop {
        let row = match playback.next() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => {
                error!("data file read failed: {e}");
                break;
            }
        };
        let prediction = match prognoser.step(&row) {
            Ok(prediction) => prediction,
            Err(e) => {
                error!("prognoser step failed: {e}");
                break;
            }
        };
        steps += 1;
        if !prediction.is_empty() {
            for event in &prediction.events {
                if let Ok(mean) = event.time_of_event.mean() {
                    info!("t={}: {} mean time-of-event {:.3}", prognoser.last_time(), event.name, mean);
                }
            }
        }
    }
    info!("processed {steps} rows");
}
