//! SVG charts rendered from the derived tables.
//!
//! Charts are plain SVG documents built with `maud`, written into the graphs
//! directory under fixed names so the API can serve them.

use maud::{html, Markup, PreEscaped};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::Span;

use crate::errors::AppError;
use crate::models::{HighestTemperatureRecord, LowestHumidityRecord, ProcessedObservation};
use crate::services::processor::{read_table, OutputPaths};

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 540.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 160.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 110.0;
/// Maximum number of labelled ticks on a categorical time axis.
const MAX_X_LABELS: usize = 10;

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// The charts produced by a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    TemperatureByCity,
    WindSpeedByCity,
    TemperatureVsWindSpeed,
    HighestTemperatureOverTime,
    LowestHumidityOverTime,
    CityTemperatureOverTime,
}

impl ChartKind {
    pub const ALL: [ChartKind; 6] = [
        ChartKind::CityTemperatureOverTime,
        ChartKind::HighestTemperatureOverTime,
        ChartKind::LowestHumidityOverTime,
        ChartKind::TemperatureByCity,
        ChartKind::TemperatureVsWindSpeed,
        ChartKind::WindSpeedByCity,
    ];

    /// Identifier used in the `type` query parameter.
    pub fn key(&self) -> &'static str {
        match self {
            ChartKind::TemperatureByCity => "temperature_city",
            ChartKind::WindSpeedByCity => "wind_speed_city",
            ChartKind::TemperatureVsWindSpeed => "temperature_wind_speed",
            ChartKind::HighestTemperatureOverTime => "highest_temperature_time",
            ChartKind::LowestHumidityOverTime => "lowest_humidity_time",
            ChartKind::CityTemperatureOverTime => "city_temperature_time",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ChartKind::TemperatureByCity => "temperature_by_city.svg",
            ChartKind::WindSpeedByCity => "wind_speed_by_city.svg",
            ChartKind::TemperatureVsWindSpeed => "temperature_vs_wind_speed.svg",
            ChartKind::HighestTemperatureOverTime => "highest_temperature_over_time.svg",
            ChartKind::LowestHumidityOverTime => "lowest_humidity_over_time.svg",
            ChartKind::CityTemperatureOverTime => "city_temperature_vs_time_all.svg",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

/// A named line on a chart. `x` is an index into the shared category axis.
struct Series {
    label: String,
    color: &'static str,
    points: Vec<(usize, f64)>,
}

/// Linear mapping from a data range onto a pixel range.
#[derive(Debug, Clone, Copy)]
struct Scale {
    min: f64,
    max: f64,
    from: f64,
    to: f64,
}

impl Scale {
    /// Build a scale over `values`, padded so points never touch the frame.
    fn fit<I: IntoIterator<Item = f64>>(values: I, from: f64, to: f64, include_zero: bool) -> Self {
        let (mut min, mut max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() {
            min = 0.0;
            max = 1.0;
        }
        if include_zero {
            min = min.min(0.0);
            max = max.max(0.0);
        }
        if (max - min).abs() < f64::EPSILON {
            min -= 1.0;
            max += 1.0;
        }
        let pad = (max - min) * 0.05;
        if !(include_zero && min == 0.0) {
            min -= pad;
        }
        max += pad;
        Self { min, max, from, to }
    }

    fn map(&self, v: f64) -> f64 {
        self.from + (v - self.min) / (self.max - self.min) * (self.to - self.from)
    }

    /// Five evenly spaced tick values.
    fn ticks(&self) -> Vec<f64> {
        (0..=4)
            .map(|i| self.min + (self.max - self.min) * i as f64 / 4.0)
            .collect()
    }
}

fn plot_bottom() -> f64 {
    HEIGHT - MARGIN_BOTTOM
}

fn plot_right() -> f64 {
    WIDTH - MARGIN_RIGHT
}

/// Frame, title, axis labels and y ticks shared by every chart.
fn frame(title: &str, x_label: &str, y_label: &str, y: &Scale, body: Markup) -> Markup {
    html! {
        (PreEscaped(r#"<?xml version="1.0" encoding="UTF-8"?>"#))
        svg xmlns="http://www.w3.org/2000/svg"
            width=(WIDTH) height=(HEIGHT)
            viewBox=(format!("0 0 {} {}", WIDTH, HEIGHT))
            font-family="sans-serif" font-size="12" {
            rect width="100%" height="100%" fill="white" {}
            text x=(WIDTH / 2.0) y="28" text-anchor="middle" font-size="18" { (title) }
            @for tick in y.ticks() {
                @let py = format!("{:.1}", y.map(tick));
                line x1=(MARGIN_LEFT) x2=(plot_right()) y1=(py) y2=(py)
                    stroke="#000" stroke-opacity="0.1" {}
                text x=(MARGIN_LEFT - 8.0) y=(py) text-anchor="end" dominant-baseline="middle" {
                    (format!("{:.1}", tick))
                }
            }
            line x1=(MARGIN_LEFT) x2=(MARGIN_LEFT) y1=(MARGIN_TOP) y2=(plot_bottom()) stroke="#000" {}
            line x1=(MARGIN_LEFT) x2=(plot_right()) y1=(plot_bottom()) y2=(plot_bottom()) stroke="#000" {}
            text x=((MARGIN_LEFT + plot_right()) / 2.0) y=(HEIGHT - 12.0) text-anchor="middle" { (x_label) }
            text x="20" y=((MARGIN_TOP + plot_bottom()) / 2.0) text-anchor="middle"
                transform=(format!("rotate(-90 20 {:.1})", (MARGIN_TOP + plot_bottom()) / 2.0)) { (y_label) }
            (body)
        }
    }
}

/// Rotated category labels under the x axis.
fn category_labels(labels: &[String], x_of: impl Fn(usize) -> f64) -> Markup {
    let step = labels.len().div_ceil(MAX_X_LABELS).max(1);
    html! {
        @for (i, label) in labels.iter().enumerate().step_by(step) {
            @let px = format!("{:.1}", x_of(i));
            @let py = plot_bottom() + 14.0;
            text x=(px) y=(py) text-anchor="end"
                transform=(format!("rotate(-45 {} {:.1})", px, py)) { (label) }
        }
    }
}

fn legend(entries: &[(String, &'static str)]) -> Markup {
    html! {
        @for (i, (label, color)) in entries.iter().enumerate() {
            @let y = MARGIN_TOP + 10.0 + i as f64 * 18.0;
            rect x=(plot_right() + 16.0) y=(y - 8.0) width="12" height="12" fill=(color) {}
            text x=(plot_right() + 34.0) y=(y + 2.0) { (label) }
        }
    }
}

fn bar_chart(title: &str, y_label: &str, bars: &[(String, f64)], color: &str) -> Markup {
    let y = Scale::fit(bars.iter().map(|(_, v)| *v), plot_bottom(), MARGIN_TOP, true);
    let slot = (plot_right() - MARGIN_LEFT) / bars.len().max(1) as f64;
    let x_of = |i: usize| MARGIN_LEFT + slot * (i as f64 + 0.5);
    let labels: Vec<String> = bars.iter().map(|(l, _)| l.clone()).collect();
    let zero = y.map(0.0);

    let body = html! {
        @for (i, (_, value)) in bars.iter().enumerate() {
            @let top = y.map(*value).min(zero);
            rect x=(format!("{:.1}", x_of(i) - slot * 0.35)) y=(format!("{:.1}", top))
                width=(format!("{:.1}", slot * 0.7))
                height=(format!("{:.1}", (y.map(*value) - zero).abs()))
                fill=(color) {}
        }
        (category_labels(&labels, x_of))
        (legend(&[(y_label.to_string(), "#555")]))
    };
    frame(title, "City", y_label, &y, body)
}

fn scatter_chart(title: &str, x_label: &str, y_label: &str, points: &[(f64, f64)]) -> Markup {
    let x = Scale::fit(points.iter().map(|p| p.0), MARGIN_LEFT, plot_right(), false);
    let y = Scale::fit(points.iter().map(|p| p.1), plot_bottom(), MARGIN_TOP, false);

    let body = html! {
        @for (px, py) in points {
            circle cx=(format!("{:.1}", x.map(*px))) cy=(format!("{:.1}", y.map(*py))) r="3"
                fill="green" fill-opacity="0.7" {}
        }
        @for tick in x.ticks() {
            text x=(format!("{:.1}", x.map(tick))) y=(plot_bottom() + 18.0) text-anchor="middle" {
                (format!("{:.1}", tick))
            }
        }
        (legend(&[("Data Points".to_string(), "green")]))
    };
    frame(title, x_label, y_label, &y, body)
}

fn line_chart(title: &str, x_label: &str, y_label: &str, categories: &[String], series: &[Series]) -> Markup {
    let y = Scale::fit(
        series.iter().flat_map(|s| s.points.iter().map(|p| p.1)),
        plot_bottom(),
        MARGIN_TOP,
        false,
    );
    let span = categories.len().saturating_sub(1).max(1) as f64;
    let x_of = |i: usize| MARGIN_LEFT + (plot_right() - MARGIN_LEFT) * i as f64 / span;
    let entries: Vec<(String, &'static str)> = series.iter().map(|s| (s.label.clone(), s.color)).collect();

    let body = html! {
        @for s in series {
            @let points = s.points.iter()
                .map(|(i, v)| format!("{:.1},{:.1}", x_of(*i), y.map(*v)))
                .collect::<Vec<_>>()
                .join(" ");
            polyline points=(points) fill="none" stroke=(s.color) stroke-width="1.5" {}
            @for (i, v) in &s.points {
                circle cx=(format!("{:.1}", x_of(*i))) cy=(format!("{:.1}", y.map(*v))) r="2.5" fill=(s.color) {}
            }
        }
        (category_labels(categories, x_of))
        (legend(&entries))
    };
    frame(title, x_label, y_label, &y, body)
}

/// Mean of the present values per city, cities in first-appearance order.
fn mean_by_city<F>(rows: &[ProcessedObservation], metric: F) -> Vec<(String, f64)>
where
    F: Fn(&ProcessedObservation) -> Option<f64>,
{
    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for row in rows {
        if !sums.contains_key(row.city.as_str()) {
            order.push(row.city.clone());
        }
        let entry = sums.entry(row.city.as_str()).or_insert((0.0, 0));
        if let Some(v) = metric(row).filter(|v| v.is_finite()) {
            entry.0 += v;
            entry.1 += 1;
        }
    }
    order
        .into_iter()
        .filter_map(|city| {
            let (sum, n) = sums.get(city.as_str()).copied()?;
            (n > 0).then(|| (city, sum / n as f64))
        })
        .collect()
}

/// Distinct values of `keys` in first-appearance order, with their indexes.
fn categories<'a>(keys: impl Iterator<Item = &'a str>) -> (Vec<String>, HashMap<String, usize>) {
    let mut labels = Vec::new();
    let mut index = HashMap::new();
    for key in keys {
        if !index.contains_key(key) {
            index.insert(key.to_string(), labels.len());
            labels.push(key.to_string());
        }
    }
    (labels, index)
}

/// Build one chart document from the derived tables.
pub fn render_chart(
    kind: ChartKind,
    processed: &[ProcessedObservation],
    highest: &[HighestTemperatureRecord],
    lowest: &[LowestHumidityRecord],
) -> Markup {
    match kind {
        ChartKind::TemperatureByCity => bar_chart(
            "Temperature (°C) by City",
            "Temperature (°C)",
            &mean_by_city(processed, |r| r.temperature_c),
            "skyblue",
        ),
        ChartKind::WindSpeedByCity => bar_chart(
            "Wind Speed (m/s) by City",
            "Wind Speed (m/s)",
            &mean_by_city(processed, |r| r.wind_speed_ms),
            "orange",
        ),
        ChartKind::TemperatureVsWindSpeed => {
            let points: Vec<(f64, f64)> = processed
                .iter()
                .filter_map(|r| Some((r.temperature_c?, r.wind_speed_ms?)))
                .collect();
            scatter_chart(
                "Temperature vs. Wind Speed",
                "Temperature (°C)",
                "Wind Speed (m/s)",
                &points,
            )
        }
        ChartKind::HighestTemperatureOverTime => {
            let (labels, _) = categories(highest.iter().map(|r| r.hour.as_str()));
            let series = Series {
                label: "Highest Temp (°C)".to_string(),
                color: "red",
                points: highest
                    .iter()
                    .enumerate()
                    .filter_map(|(i, r)| r.temperature_c.map(|v| (i, v)))
                    .collect(),
            };
            line_chart(
                "Highest Temperature Over Time",
                "Hour",
                "Temperature (°C)",
                &labels,
                &[series],
            )
        }
        ChartKind::LowestHumidityOverTime => {
            let (labels, _) = categories(lowest.iter().map(|r| r.hour.as_str()));
            let series = Series {
                label: "Lowest Humidity (%)".to_string(),
                color: "blue",
                points: lowest
                    .iter()
                    .enumerate()
                    .filter_map(|(i, r)| r.relative_humidity_pct.map(|v| (i, v)))
                    .collect(),
            };
            line_chart(
                "Lowest Humidity Over Time",
                "Hour",
                "Relative Humidity (%)",
                &labels,
                &[series],
            )
        }
        ChartKind::CityTemperatureOverTime => {
            let (labels, index) = categories(processed.iter().map(|r| r.time.as_str()));
            let (cities, _) = categories(processed.iter().map(|r| r.city.as_str()));
            let series: Vec<Series> = cities
                .iter()
                .enumerate()
                .map(|(n, city)| Series {
                    label: city.clone(),
                    color: PALETTE[n % PALETTE.len()],
                    points: processed
                        .iter()
                        .filter(|r| &r.city == city)
                        .filter_map(|r| Some((*index.get(&r.time)?, r.temperature_c?)))
                        .collect(),
                })
                .collect();
            line_chart(
                "City Temperature vs. Time",
                "Time",
                "Temperature (°C)",
                &labels,
                &series,
            )
        }
    }
}

/// Writes every chart into the graphs directory.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    dir: PathBuf,
    span: Span,
}

impl ChartRenderer {
    pub fn new(dir: &Path, parent: &Span) -> Self {
        Self {
            dir: dir.to_path_buf(),
            span: tracing::info_span!(parent: parent, "charts"),
        }
    }

    pub fn path_for(&self, kind: ChartKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Read the derived tables and render all charts from them.
    pub fn render_all(&self, tables: &OutputPaths) -> Result<Vec<PathBuf>, AppError> {
        let _entered = self.span.enter();

        let processed: Vec<ProcessedObservation> = read_table(&tables.processed)?;
        let highest: Vec<HighestTemperatureRecord> = read_table(&tables.highest_temperature)?;
        let lowest: Vec<LowestHumidityRecord> = read_table(&tables.lowest_humidity)?;

        std::fs::create_dir_all(&self.dir)?;
        let mut written = Vec::with_capacity(ChartKind::ALL.len());
        for kind in ChartKind::ALL {
            let path = self.path_for(kind);
            let svg = render_chart(kind, &processed, &highest, &lowest);
            std::fs::write(&path, svg.into_string())?;
            tracing::debug!("Rendered {}", path.display());
            written.push(path);
        }
        tracing::info!("Rendered {} charts into {}", written.len(), self.dir.display());
        Ok(written)
    }
}
