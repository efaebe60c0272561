use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    dataset::{Dataset, Entity},
    error::MetricsError,
    metrics::{self, DailyRecord, GrowthRate},
    stats::Stats,
};

/// Growth rate at which the number of new cases stops increasing.
pub const INFLEXION_POINT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub date: NaiveDate,
    pub entity: String,
    pub new_cases: f64,
    pub total_confirmed: f64,
    pub growth_rate: GrowthRate,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub entity: String,
    /// World, EU or Non-EU rather than a single country.
    #[serde(skip)]
    pub aggregate: bool,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub days: usize,
    pub latest_growth_rate: f64,
    pub growth_rate: Stats,
}

impl EntityReport {
    pub fn build(entity: &Entity, series: &[DailyRecord]) -> Result<EntityReport, MetricsError> {
        let derived = metrics::derive(series)?;
        let name = entity.to_string();
        let rows = series
            .iter()
            .zip(derived.total)
            .zip(derived.growth)
            .map(|((record, total_confirmed), growth_rate)| ReportRow {
                date: record.date,
                entity: name.clone(),
                // derive rejects missing values
                new_cases: record.new_cases.unwrap_or_default(),
                total_confirmed,
                growth_rate,
            })
            .collect();
        Ok(EntityReport {
            entity: name,
            aggregate: !matches!(entity, Entity::Country(_)),
            rows,
        })
    }

    /// Keep only the trailing `days` rows, all of them when `None`.
    pub fn last_days(mut self, days: Option<usize>) -> EntityReport {
        if let Some(days) = days {
            let skip = self.rows.len().saturating_sub(days);
            self.rows = self.rows.split_off(skip);
        }
        self
    }

    pub fn summary(&self) -> Option<Summary> {
        let growth: Vec<f64> = self.rows.iter().map(|row| row.growth_rate.value()).collect();
        Some(Summary {
            days: growth.len(),
            latest_growth_rate: *growth.last()?,
            growth_rate: Stats::compute(&growth)?,
        })
    }
}

/// Derive the reports of all `entities`, in parallel, keeping their order.
pub fn build_all(
    dataset: &Dataset,
    entities: &[Entity],
) -> Vec<(Entity, Result<EntityReport, MetricsError>)> {
    entities
        .par_iter()
        .map(|entity| {
            let series = dataset.series(entity);
            (entity.clone(), EntityReport::build(entity, &series))
        })
        .collect()
}

fn format_growth(rate: &GrowthRate) -> String {
    match rate {
        GrowthRate::Count(count) => count.to_string(),
        GrowthRate::Ratio(ratio) => format!("{:.3}", ratio),
    }
}

pub fn write_table<W: Write>(writer: &mut W, reports: &[EntityReport]) -> Result<()> {
    for report in reports {
        writeln!(writer, "{}", report.entity)?;
        writeln!(
            writer,
            "{:<10}  {:>10}  {:>15}  {:>11}",
            "date", "new_cases", "total_confirmed", "growth_rate"
        )?;
        for row in &report.rows {
            writeln!(
                writer,
                "{:<10}  {:>10}  {:>15}  {:>11}",
                row.date.format("%Y-%m-%d").to_string(),
                row.new_cases,
                row.total_confirmed,
                format_growth(&row.growth_rate)
            )?;
        }
        match report.summary() {
            Some(summary) => writeln!(
                writer,
                "{} days, growth rate min {:.3} / mean {:.3} / max {:.3}, latest {:.3} ({} inflexion point)\n",
                summary.days,
                summary.growth_rate.min,
                summary.growth_rate.mean,
                summary.growth_rate.max,
                summary.latest_growth_rate,
                if summary.latest_growth_rate > INFLEXION_POINT {
                    "above"
                } else {
                    "at or below"
                }
            )?,
            None => writeln!(writer, "no data\n")?,
        }
    }
    Ok(())
}

pub fn write_json<W: Write>(writer: &mut W, reports: &[EntityReport]) -> Result<()> {
    #[derive(Serialize)]
    struct WithSummary<'a> {
        #[serde(flatten)]
        report: &'a EntityReport,
        summary: Option<Summary>,
    }

    let reports: Vec<WithSummary> = reports
        .iter()
        .map(|report| WithSummary {
            report,
            summary: report.summary(),
        })
        .collect();
    serde_json::to_writer_pretty(&mut *writer, &reports).context("unable to write json")?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_csv<W: Write>(writer: W, reports: &[EntityReport]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in reports.iter().flat_map(|report| report.rows.iter()) {
        csv.serialize(row).context("unable to write csv record")?;
    }
    csv.flush()?;
    Ok(())
}
