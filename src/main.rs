// src/main.rs
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use cb_adf_lib::{
    config::{self, EstimatorMode, ReductionConfig},
    driver::{self, DriverConfig},
    CbAdf, OnlineRegressor, OutputSinks,
};

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    info!("Starting contextual bandit ADF run");

    match config::load_first_env_file() {
        Some(path) => info!("Environment seeded from {}", path),
        None => debug!("No env file found"),
    }

    let reduction_config = ReductionConfig::from_env().context("Invalid reduction configuration")?;
    let driver_config = DriverConfig::from_env();

    let mut sinks = OutputSinks::new().with_final_prediction(Box::new(io::stdout()));
    if reduction_config.raw_predictions {
        match &driver_config.raw_output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create raw prediction file {}", path))?;
                sinks = sinks.with_raw_prediction(Box::new(BufWriter::new(file)));
            }
            None => warn!("Raw predictions requested but no raw output file configured"),
        }
    }

    let base = OnlineRegressor::default();
    let mut reduction = match reduction_config.cb_type {
        EstimatorMode::Dr => CbAdf::with_scorer(
            reduction_config.clone(),
            base,
            Box::new(OnlineRegressor::default()),
        ),
        EstimatorMode::Ips => CbAdf::new(reduction_config.clone(), base),
    }
    .context("Failed to set up cb_adf reduction")?
    .with_sinks(sinks);

    let description = Some(format!(
        "{} run over {}",
        driver_config.operation(),
        driver_config.input.as_deref().unwrap_or("stdin")
    ));
    let stats = match &driver_config.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open input {}", path))?;
            driver::run(&mut reduction, BufReader::new(file), driver_config.operation(), description)?
        }
        None => {
            let stdin = io::stdin();
            driver::run(&mut reduction, stdin.lock(), driver_config.operation(), description)?
        }
    };

    let sd = reduction.finish();
    io::stdout().flush().context("Failed to flush stdout")?;

    info!(
        "finished run: weighted examples = {}, average loss = {:.6}, total features = {}",
        sd.weighted_examples,
        sd.average_loss(),
        sd.total_features
    );
    stats.log_report();

    Ok(())
}
