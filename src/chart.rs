//! Detection chart adapter.
//!
//! Converts a [`DetectionSeries`] into plottable points for the chart
//! collaborator, maps clicked points back into date-field text, and
//! serializes the plotted series to CSV for download.

use chrono::NaiveDateTime;
use egui::Color32;
use tracing::warn;

use crate::models::{CURSOR_DATE_FORMAT, DetectionSeries};

/// Fixed y-axis range for the stack-amplitude scatter.
pub const Y_AXIS_RANGE: (f64, f64) = (0.75, 1.075);

/// Time format the backend emits for detection times.
pub const DETECTION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// CSV header row for exported detection data.
pub const CSV_HEADER: &str = "Date,Stack Amplitude,Distance (M)";

/// One plottable detection event.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    /// Backend time string, `YYYY-MM-DD HH:MM:SS` UTC
    pub time: String,
    /// Same instant as seconds since the epoch (plot x)
    pub epoch: f64,
    /// Stack amplitude (plot y)
    pub value: f64,
    /// Distance to grid center in meters (color)
    pub distance: f64,
}

impl ChartPoint {
    /// The clicked point's time rendered in the date field's `m/d/Y H:i`
    /// format, so the click feeds the same pipeline as typed input.
    #[must_use]
    pub fn picker_text(&self) -> String {
        NaiveDateTime::parse_from_str(&self.time, DETECTION_TIME_FORMAT).map_or_else(
            |_| self.time.clone(),
            |dt| dt.format(CURSOR_DATE_FORMAT).to_string(),
        )
    }
}

/// Convert a series into plottable points.
///
/// Times that do not parse are skipped with a warning; the rest of the
/// series still plots.
#[must_use]
pub fn chart_points(series: &DetectionSeries) -> Vec<ChartPoint> {
    let columns = &series.detections;
    let mut points = Vec::with_capacity(columns.times.len());
    for ((time, value), distance) in columns
        .times
        .iter()
        .zip(&columns.values)
        .zip(&columns.distances)
    {
        match NaiveDateTime::parse_from_str(time, DETECTION_TIME_FORMAT) {
            Ok(parsed) => points.push(ChartPoint {
                time: time.clone(),
                epoch: parsed.and_utc().timestamp() as f64,
                value: *value,
                distance: *distance,
            }),
            Err(err) => warn!("skipping unplottable detection time '{time}': {err}"),
        }
    }
    points
}

/// Marker color for a detection.
///
/// Fixed scale: distance 0 maps to red, `max_dist` to blue, linear in
/// between. A degenerate scale pins everything to red.
#[must_use]
pub fn distance_color(distance: f64, max_dist: f64) -> Color32 {
    if !max_dist.is_finite() || max_dist <= 0.0 {
        return Color32::RED;
    }
    let t = (distance / max_dist).clamp(0.0, 1.0);
    let red = ((1.0 - t) * 255.0).round() as u8;
    let blue = (t * 255.0).round() as u8;
    Color32::from_rgb(red, 0, blue)
}

/// Find the plotted point nearest to a click, within tolerance.
///
/// Distances are normalized per axis so the hit radius is elliptical in
/// plot space; a click farther than one tolerance unit from every point
/// selects nothing.
#[must_use]
pub fn nearest_point<'a>(
    points: &'a [ChartPoint],
    x: f64,
    y: f64,
    x_tolerance: f64,
    y_tolerance: f64,
) -> Option<&'a ChartPoint> {
    if x_tolerance <= 0.0 || y_tolerance <= 0.0 {
        return None;
    }

    let mut best: Option<(&ChartPoint, f64)> = None;
    for point in points {
        let dx = (point.epoch - x) / x_tolerance;
        let dy = (point.value - y) / y_tolerance;
        let dist = dx * dx + dy * dy;
        if dist <= 1.0 && best.is_none_or(|(_, best_dist)| dist < best_dist) {
            best = Some((point, dist));
        }
    }
    best.map(|(point, _)| point)
}

/// Serialize the plotted series to CSV (three columns, CRLF rows).
#[must_use]
pub fn to_csv(series: &DetectionSeries) -> String {
    let columns = &series.detections;
    let mut csv = String::with_capacity(64 + columns.times.len() * 48);
    csv.push_str(CSV_HEADER);
    csv.push_str("\r\n");
    for ((time, value), distance) in columns
        .times
        .iter()
        .zip(&columns.values)
        .zip(&columns.distances)
    {
        csv.push_str(&format!("{time},{value},{distance}\r\n"));
    }
    csv
}

/// Suggested download name: `{volc} events {first} to {last}.csv`.
#[must_use]
pub fn csv_file_name(volcano: &str, series: &DetectionSeries) -> String {
    let times = &series.detections.times;
    match (times.first(), times.last()) {
        (Some(first), Some(last)) => format!("{volcano} events {first} to {last}.csv"),
        _ => format!("{volcano} events.csv"),
    }
}
