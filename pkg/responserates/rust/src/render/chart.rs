// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Line charts of one metric over time, one line per requested geography.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{info, warn};
use plotters::prelude::*;
use plotters::style::{FontStyle, register_font};
use time::{Date, Duration};

use crate::columns::{Column, Granularity};
use crate::dates::format_date;
use crate::errors::RenderError;
use crate::store::{ResultSet, Value};
use crate::validate::ValidatedRequest;

const FONT_FAMILY: &str = "sans-serif";

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// Headroom added above the highest plotted value.
const Y_HEADROOM: f64 = 5.0;

/// One line: a value (or a gap) for every date on the x axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Distinct dates of the result, ascending.
    pub dates: Vec<Date>,
    pub series: Vec<Series>,
    /// Upper y bound; the lower bound is always 0.
    pub y_max: f64,
}

impl LineChart {
    /// Days between the first and last date.
    pub fn day_span(&self) -> i64 {
        match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => (*last - *first).whole_days(),
            _ => 0,
        }
    }

    /// Contiguous runs of `(day offset, value)`; a missing value breaks the line.
    pub fn segments(&self, series: &Series) -> Vec<Vec<(f64, f64)>> {
        let Some(first) = self.dates.first().copied() else {
            return Vec::new();
        };

        let mut runs = Vec::new();
        let mut current = Vec::new();
        for (date, value) in self.dates.iter().zip(&series.values) {
            match value {
                Some(value) => current.push(((*date - first).whole_days() as f64, *value)),
                None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }
}

enum Entity {
    Code(String),
    Id(i64),
}

impl Entity {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Entity::Code(code) => value.as_text() == Some(code.as_str()),
            Entity::Id(id) => value.as_i64() == Some(*id),
        }
    }
}

/// Builds one series per requested entity of `granularity`, each reindexed
/// onto the sorted union of dates present in `rows`.
pub fn build_line_chart(
    granularity: Granularity,
    request: &ValidatedRequest,
    rows: &ResultSet,
) -> Result<LineChart, RenderError> {
    let metric = request.chart_metric().ok_or(RenderError::ChartSelection)?;

    let entities: Vec<(String, Entity)> = match granularity {
        Granularity::State => request
            .states
            .iter()
            .flatten()
            .map(|code| (code.clone(), Entity::Code(code.clone())))
            .collect(),
        Granularity::County => labelled_ids(
            granularity,
            request.counties.as_deref(),
            request.county_tokens.as_deref(),
        ),
        Granularity::Tract => labelled_ids(
            granularity,
            request.tracts.as_deref(),
            request.tract_tokens.as_deref(),
        ),
    };
    if entities.is_empty() {
        return Err(RenderError::ChartSelection);
    }

    let date_idx = column(rows, Column::RespDate)?;
    let entity_idx = column(rows, granularity.entity_column())?;
    let metric_idx = column(rows, Column::Metric(metric))?;

    let mut dates: Vec<Date> = rows
        .rows
        .iter()
        .filter_map(|row| row.get(date_idx).and_then(Value::as_date))
        .collect();
    dates.sort_unstable();
    dates.dedup();
    let positions: BTreeMap<Date, usize> = dates
        .iter()
        .enumerate()
        .map(|(pos, date)| (*date, pos))
        .collect();

    let mut series = Vec::with_capacity(entities.len());
    let mut peak: f64 = 0.0;
    for (label, entity) in entities {
        let mut values = vec![None; dates.len()];
        for row in &rows.rows {
            if !row.get(entity_idx).is_some_and(|value| entity.matches(value)) {
                continue;
            }
            let Some(pos) = row
                .get(date_idx)
                .and_then(Value::as_date)
                .and_then(|date| positions.get(&date))
            else {
                continue;
            };
            if let Some(slot) = values.get_mut(*pos)
                && slot.is_none()
            {
                *slot = row.get(metric_idx).and_then(Value::as_f64);
            }
        }
        peak = values.iter().flatten().copied().fold(peak, f64::max);
        series.push(Series { label, values });
    }

    Ok(LineChart {
        title: format!("{} response rates", granularity.title()),
        x_label: "Date".to_string(),
        y_label: metric.to_string(),
        dates,
        series,
        y_max: peak + Y_HEADROOM,
    })
}

/// Legends repeat the id as the client wrote it (`County 001`), falling back to the number.
fn labelled_ids(
    granularity: Granularity,
    ids: Option<&[i64]>,
    tokens: Option<&[String]>,
) -> Vec<(String, Entity)> {
    let tokens = tokens.unwrap_or_default();
    ids.unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let label = match tokens.get(idx) {
                Some(token) => format!("{} {token}", granularity.title()),
                None => format!("{} {id}", granularity.title()),
            };
            (label, Entity::Id(*id))
        })
        .collect()
}

fn column(rows: &ResultSet, column: Column) -> Result<usize, RenderError> {
    rows.column_index(column.name())
        .ok_or(RenderError::MissingColumn(column.name()))
}

pub trait ChartRenderer: Send + Sync {
    /// Encodes `chart` as a PNG image.
    fn render(&self, chart: &LineChart) -> Result<Vec<u8>, RenderError>;
}

/// Draws charts with plotters into an in-memory RGB buffer.
pub struct PlottersRenderer {
    width: u32,
    height: u32,
    labels: bool,
}

impl PlottersRenderer {
    pub fn new(width: u32, height: u32, font: Option<&Path>) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            labels: ensure_font(font),
        }
    }
}

static FONT_LOADED: OnceLock<bool> = OnceLock::new();

/// Registers the first readable font, once per process.
fn ensure_font(configured: Option<&Path>) -> bool {
    *FONT_LOADED.get_or_init(|| {
        let candidates = configured
            .map(Path::to_path_buf)
            .into_iter()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from));
        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            // plotters keeps registered fonts for the life of the process.
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            if register_font(FONT_FAMILY, FontStyle::Normal, bytes).is_ok() {
                info!("using chart font {}", path.display());
                return true;
            }
            warn!("could not load chart font {}", path.display());
        }
        warn!("no usable chart font found, charts will be drawn without labels");
        false
    })
}

fn chart_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Chart(e.to_string())
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, chart: &LineChart) -> Result<Vec<u8>, RenderError> {
        let (width, height) = (self.width, self.height);
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        let first = chart.dates.first().copied();
        let format_x = |x: &f64| {
            first
                .and_then(|first| first.checked_add(Duration::days(x.round() as i64)))
                .map(format_date)
                .unwrap_or_default()
        };

        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(chart_error)?;

            let mut builder = ChartBuilder::on(&root);
            builder.margin(20);
            if self.labels {
                builder
                    .caption(&chart.title, (FONT_FAMILY, 24))
                    .x_label_area_size(50)
                    .y_label_area_size(60);
            }
            let span = chart.day_span() as f64;
            let mut ctx = builder
                .build_cartesian_2d(-0.5..span + 0.5, 0.0..chart.y_max)
                .map_err(chart_error)?;

            if self.labels {
                ctx.configure_mesh()
                    .x_desc(chart.x_label.as_str())
                    .y_desc(chart.y_label.as_str())
                    .x_label_formatter(&format_x)
                    .label_style((FONT_FAMILY, 14))
                    .draw()
                    .map_err(chart_error)?;
            }

            for (idx, series) in chart.series.iter().enumerate() {
                let color = Palette99::pick(idx).to_rgba();
                ctx.draw_series(LineSeries::new(
                    Vec::<(f64, f64)>::new(),
                    color.stroke_width(2),
                ))
                .map_err(chart_error)?
                .label(series.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

                for run in chart.segments(series) {
                    ctx.draw_series(LineSeries::new(run.iter().copied(), color.stroke_width(2)))
                        .map_err(chart_error)?;
                    ctx.draw_series(run.iter().map(|point| Circle::new(*point, 4, color.filled())))
                        .map_err(chart_error)?;
                }
            }

            if self.labels {
                ctx.configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(&BLACK)
                    .label_font((FONT_FAMILY, 14))
                    .draw()
                    .map_err(chart_error)?;
            }

            root.present().map_err(chart_error)?;
        }

        encode_png(&buffer, width, height)
    }
}

fn encode_png(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(rgb)?;
    writer.finish()?;
    Ok(out)
}
