//! Chart descriptions for the dashboard.
//!
//! These are plain data: a renderer (web canvas, terminal, image) consumes
//! them and decides how to draw. Serialized field names follow the usual
//! chart-library vocabulary (`labels`, `datasets`, `borderColor`, ...).

use serde::Serialize;

use crate::types::{Reading, WeatherData};

pub const HUMIDITY_CHART_ID: &str = "humidityChart";
pub const TEMPERATURE_CHART_ID: &str = "temperatureChart";
pub const RADIATION_CHART_ID: &str = "radiationChart";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_string()
    }
}

const BLUE: Rgba = Rgba::new(54, 162, 235, 1.0);
const BLUE_FILL: Rgba = Rgba::new(54, 162, 235, 0.6);
const RED: Rgba = Rgba::new(255, 99, 132, 1.0);
const YELLOW: Rgba = Rgba::new(255, 206, 86, 1.0);
const YELLOW_FILL: Rgba = Rgba::new(255, 206, 86, 0.5);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    /// Missing readings serialize as `null` and are drawn as gaps.
    pub data: Vec<Reading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Rgba>,
    pub border_color: Rgba,
    pub border_width: u32,
    /// Fill the area under the line
    pub fill: bool,
}

impl Dataset {
    /// Number of points that carry a reading.
    pub fn present(&self) -> usize {
        self.data.iter().flatten().count()
    }

    /// Smallest and largest reading, skipping gaps and NaN. `None` if there are none.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .flatten()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub id: &'static str,
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    /// Whether the y axis starts at zero
    pub begin_at_zero: bool,
}

impl ChartSpec {
    /// One line per dataset: label, point count, gaps and value range.
    pub fn summary(&self) -> String {
        self.datasets
            .iter()
            .map(|ds| {
                let gaps = ds.data.len() - ds.present();
                match ds.range() {
                    Some((lo, hi)) if gaps > 0 => format!(
                        "{}: {} points ({} missing), min {:.1}, max {:.1}",
                        ds.label,
                        ds.data.len(),
                        gaps,
                        lo,
                        hi
                    ),
                    Some((lo, hi)) => format!(
                        "{}: {} points, min {:.1}, max {:.1}",
                        ds.label,
                        ds.data.len(),
                        lo,
                        hi
                    ),
                    None => format!("{}: no data", ds.label),
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Column chart of hourly relative humidity.
pub fn humidity_chart(data: &WeatherData) -> ChartSpec {
    ChartSpec {
        id: HUMIDITY_CHART_ID,
        kind: ChartKind::Bar,
        labels: data.hourly.time.clone(),
        datasets: vec![Dataset {
            label: "Relative Humidity (%)".to_string(),
            data: data.hourly.relativehumidity_2m.clone(),
            background_color: Some(BLUE_FILL),
            border_color: BLUE,
            border_width: 1,
            fill: false,
        }],
        begin_at_zero: true,
    }
}

/// Line chart of daily maximum and minimum temperature.
pub fn temperature_chart(data: &WeatherData) -> ChartSpec {
    ChartSpec {
        id: TEMPERATURE_CHART_ID,
        kind: ChartKind::Line,
        labels: data.daily.time.clone(),
        datasets: vec![
            Dataset {
                label: "Max Temperature (°C)".to_string(),
                data: data.daily.temperature_2m_max.clone(),
                background_color: None,
                border_color: RED,
                border_width: 2,
                fill: false,
            },
            Dataset {
                label: "Min Temperature (°C)".to_string(),
                data: data.daily.temperature_2m_min.clone(),
                background_color: None,
                border_color: BLUE,
                border_width: 2,
                fill: false,
            },
        ],
        begin_at_zero: false,
    }
}

/// Area chart of hourly direct radiation.
pub fn radiation_chart(data: &WeatherData) -> ChartSpec {
    ChartSpec {
        id: RADIATION_CHART_ID,
        kind: ChartKind::Line,
        labels: data.hourly.time.clone(),
        datasets: vec![Dataset {
            label: "Direct Radiation (W/m²)".to_string(),
            data: data.hourly.direct_radiation.clone(),
            background_color: Some(YELLOW_FILL),
            border_color: YELLOW,
            border_width: 1,
            fill: true,
        }],
        begin_at_zero: true,
    }
}

/// The three dashboard charts, in display order.
pub fn dashboard_charts(data: &WeatherData) -> Vec<ChartSpec> {
    vec![
        humidity_chart(data),
        temperature_chart(data),
        radiation_chart(data),
    ]
}
