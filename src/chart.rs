use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use plotters::prelude::*;
use plotters::style::full_palette::*;
use plotters::style::{BLACK, WHITE};

use crate::report::{EntityReport, ReportRow, INFLEXION_POINT};

struct Chart {
    file_name: &'static str,
    title: &'static str,
    y_label: &'static str,
    value: fn(&ReportRow) -> f64,
    inflexion_point: bool,
}

const CHARTS: [Chart; 3] = [
    Chart {
        file_name: "new_cases.png",
        title: "New cases",
        y_label: "New cases",
        value: new_cases,
        inflexion_point: false,
    },
    Chart {
        file_name: "total_cases.png",
        title: "Total cases",
        y_label: "Total confirmed",
        value: total_confirmed,
        inflexion_point: false,
    },
    Chart {
        file_name: "growth_rate.png",
        title: "Growth rate",
        y_label: "Growth rate",
        value: growth_rate,
        inflexion_point: true,
    },
];

fn new_cases(row: &ReportRow) -> f64 {
    row.new_cases
}

fn total_confirmed(row: &ReportRow) -> f64 {
    row.total_confirmed
}

fn growth_rate(row: &ReportRow) -> f64 {
    row.growth_rate.value()
}

const COLORS: [RGBColor; 8] = [
    BLUE_800, RED_A400, GREEN_700, ORANGE_A200, PURPLE_A400, TEAL_700, BROWN_700, PINK_600,
];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    first: NaiveDate,
    last: NaiveDate,
    min_y: f64,
    max_y: f64,
}

fn bounds(
    reports: &[&EntityReport],
    value: fn(&ReportRow) -> f64,
    include_y: Option<f64>,
) -> Option<Bounds> {
    let mut rows = reports.iter().flat_map(|report| report.rows.iter());
    let first_row = rows.next()?;
    let mut bounds = Bounds {
        first: first_row.date,
        last: first_row.date,
        min_y: value(first_row),
        max_y: value(first_row),
    };
    for row in rows {
        bounds.first = bounds.first.min(row.date);
        bounds.last = bounds.last.max(row.date);
        bounds.min_y = bounds.min_y.min(value(row));
        bounds.max_y = bounds.max_y.max(value(row));
    }
    if let Some(y) = include_y {
        bounds.min_y = bounds.min_y.min(y);
        bounds.max_y = bounds.max_y.max(y);
    }
    // plotters needs non-empty ranges
    if bounds.last == bounds.first {
        bounds.last = bounds.first.succ_opt().unwrap_or(bounds.first);
    }
    if bounds.max_y == bounds.min_y {
        bounds.max_y = bounds.min_y + 1.0;
    }
    Some(bounds)
}

fn draw(path: &Path, chart: &Chart, reports: &[&EntityReport], bounds: Bounds) -> Result<()> {
    let root = BitMapBackend::new(path, (2048, 1024)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("Failed to fill drawing area with white: {}", e))?;
    let mut ctx = ChartBuilder::on(&root)
        .margin_top(20)
        .margin_bottom(20)
        .margin_left(30)
        .margin_right(30)
        .set_all_label_area_size(120)
        .caption(chart.title, ("sans-serif", 40.0).into_font())
        .build_cartesian_2d(bounds.first..bounds.last, bounds.min_y..bounds.max_y)
        .map_err(|e| anyhow!("Failed to build cartesian 2d: {}", e))?;
    ctx.configure_mesh()
        .light_line_style(WHITE)
        .label_style(("sans-serif", 30, &BLACK).into_text_style(&root))
        .x_desc("Date")
        .y_desc(chart.y_label)
        .draw()
        .map_err(|e| anyhow!("Failed to draw mesh: {}", e))?;

    for (i, report) in reports.iter().enumerate() {
        let color = COLORS[i % COLORS.len()];
        ctx.draw_series(
            LineSeries::new(
                report.rows.iter().map(|row| (row.date, (chart.value)(row))),
                ShapeStyle {
                    color: color.to_rgba(),
                    filled: true,
                    stroke_width: 2,
                },
            )
            .point_size(3),
        )
        .map_err(|e| anyhow!("Failed to draw series: {}", e))?
        .label(report.entity.as_str())
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if chart.inflexion_point {
        ctx.draw_series(LineSeries::new(
            vec![(bounds.first, INFLEXION_POINT), (bounds.last, INFLEXION_POINT)],
            RED_A700.stroke_width(2),
        ))
        .map_err(|e| anyhow!("Failed to draw inflexion point: {}", e))?
        .label("Inflexion point")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED_A700.stroke_width(2)));
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .label_font(("sans-serif", 30))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| anyhow!("Failed to draw legend: {}", e))?;

    root.present()
        .map_err(|e| anyhow!("Failed to present root: {}", e))?;
    Ok(())
}

/// Split reports into countries and aggregates, which are charted apart so
/// that a worldwide total does not flatten the country lines.
fn split_sets(reports: &[EntityReport]) -> (Vec<&EntityReport>, Vec<&EntityReport>) {
    reports.iter().partition(|report| !report.aggregate)
}

fn growth_window(reports: &[&EntityReport], days: usize) -> Vec<EntityReport> {
    reports
        .iter()
        .map(|report| (*report).clone().last_days(Some(days)))
        .collect()
}

fn render_set(
    dir: &Path,
    prefix: &str,
    reports: &[&EntityReport],
    growth_days: Option<usize>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for chart in CHARTS.iter() {
        let windowed;
        let plotted: Vec<&EntityReport> = match (chart.inflexion_point, growth_days) {
            (true, Some(days)) => {
                windowed = growth_window(reports, days);
                windowed.iter().collect()
            }
            _ => reports.to_vec(),
        };
        let include_y = if chart.inflexion_point {
            Some(INFLEXION_POINT)
        } else {
            None
        };
        let bounds = match bounds(&plotted, chart.value, include_y) {
            Some(bounds) => bounds,
            None => {
                warn!("nothing to plot in {}", chart.title);
                continue;
            }
        };
        let path = dir.join(format!("{}{}", prefix, chart.file_name));
        draw(&path, chart, &plotted, bounds)?;
        info!("{} chart written to {}", chart.title, path.display());
        written.push(path);
    }
    Ok(written)
}

/// Render the new cases, total cases and growth rate charts into `dir`.
///
/// Countries go to `new_cases.png` and friends, the World/EU/Non-EU
/// aggregates to `overall_*.png` with their growth rate limited to the last
/// `trend_days` days.
pub fn render_all(dir: &Path, reports: &[EntityReport], trend_days: usize) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("unable to create {}", dir.display()))?;

    let (countries, aggregates) = split_sets(reports);
    let mut written = Vec::new();
    if !countries.is_empty() {
        written.extend(render_set(dir, "", &countries, None)?);
    }
    if !aggregates.is_empty() {
        written.extend(render_set(dir, "overall_", &aggregates, Some(trend_days))?);
    }
    Ok(written)
}
