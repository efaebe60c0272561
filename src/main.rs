mod chart;
mod config;
mod dataset;
mod error;
mod fetcher;
mod logger;
mod metrics;
mod report;
mod stats;

use std::io;

use anyhow::{Context, Result};
use chrono::Local;
use config::{Args, Config, Input, OutputFormat};
use dataset::{Dataset, Entity};
use fetcher::{HttpSource, Memoized};
use log::{info, warn};

fn load_dataset(config: &Config) -> Result<Dataset> {
    match &config.input {
        Input::File(path) => Dataset::from_path(path),
        Input::Download(template) => {
            let today = config.date.unwrap_or_else(|| Local::now().date_naive());
            info!("fetching {} for {}", template, today);
            let source = Memoized::new(HttpSource::new(template.clone()));
            let (date, body) = fetcher::load_latest(&source, today)
                .context("Failed to download the daily export")?;
            info!("using the export of {}", date);
            Dataset::from_reader(body.as_slice()).context("Failed to parse the daily export")
        }
    }
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = Config::from(args);
    logger::init_logger(config.log_level)?;

    let dataset = load_dataset(&config)?;
    if dataset.is_empty() {
        warn!("the export contains no records");
    }
    info!(
        "loaded {} records covering {} days",
        dataset.len(),
        dataset.days_count()
    );

    if config.list_countries {
        for country in dataset.countries() {
            println!("{}", country);
        }
        return Ok(());
    }

    let entities: Vec<Entity> = config
        .entities
        .iter()
        .filter(|entity| {
            let known = dataset.contains(entity);
            if !known {
                warn!("{} not found in the export, skipping", entity);
            }
            known
        })
        .cloned()
        .collect();

    let mut reports = Vec::with_capacity(entities.len());
    for (entity, result) in report::build_all(&dataset, &entities) {
        match result {
            Ok(report) => reports.push(report.last_days(config.last_days)),
            Err(e) => warn!("skipping {}: {}", entity, e),
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match config.format {
        OutputFormat::Table => report::write_table(&mut out, &reports)?,
        OutputFormat::Json => report::write_json(&mut out, &reports)?,
        OutputFormat::Csv => report::write_csv(&mut out, &reports)?,
    }

    if let Some(dir) = &config.chart_dir {
        let charts = chart::render_all(dir, &reports, config.trend_days)?;
        info!("{} charts written", charts.len());
    }

    Ok(())
}
