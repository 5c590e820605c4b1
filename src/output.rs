//! Output formatters for one-shot fetches.
//!
//! Supports human-readable (with colors), JSON, and CSV formats for the
//! `images` and `detections` subcommands.

use std::io::{self, Write};

use serde::Serialize;

use crate::chart;
use crate::models::{Cursor, DetectionSeries, ImagePage};
use crate::render::{self, RenderPlan};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[96m";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON object
    Json,
    /// CSV (detections only)
    Csv,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("unknown format: {s} (expected: human, json, csv)")),
        }
    }
}

/// Serialized page listing for JSON output.
#[derive(Debug, Serialize)]
struct PageListing<'a> {
    volcano: &'a str,
    groups: Vec<GroupListing>,
    prev: Option<&'a Cursor>,
    next: Option<&'a Cursor>,
}

#[derive(Debug, Serialize)]
struct GroupListing {
    images: Vec<ImageListing>,
}

#[derive(Debug, Serialize)]
struct ImageListing {
    role: &'static str,
    filename: String,
    path: String,
}

fn page_listing<'a>(volcano: &'a str, page: &'a ImagePage) -> PageListing<'a> {
    let groups = match render::plan(page) {
        RenderPlan::Empty => Vec::new(),
        RenderPlan::Groups(groups) => groups
            .into_iter()
            .map(|group| GroupListing {
                images: group
                    .images
                    .into_iter()
                    .map(|image| ImageListing {
                        role: image.role.tag(),
                        filename: image.filename,
                        path: image.path,
                    })
                    .collect(),
            })
            .collect(),
    };

    PageListing {
        volcano,
        groups,
        prev: page.prev.as_ref(),
        next: page.next.as_ref(),
    }
}

/// Write an image page in the specified format.
///
/// Groups print oldest-to-newest, matching the dashboard's display
/// order.
///
/// # Errors
///
/// Returns an error if writing fails or the format does not apply to
/// pages (CSV).
pub fn write_page<W: Write>(
    writer: &mut W,
    volcano: &str,
    page: &ImagePage,
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Human => write_page_human(writer, volcano, page),
        Format::Json => {
            let json = serde_json::to_string_pretty(&page_listing(volcano, page))
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(writer, "{json}")
        }
        Format::Csv => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "csv output is only available for detections",
        )),
    }
}

fn write_page_human<W: Write>(writer: &mut W, volcano: &str, page: &ImagePage) -> io::Result<()> {
    match render::plan(page) {
        RenderPlan::Empty => {
            writeln!(writer, "{DIM}{}{RESET}", render::EMPTY_MESSAGE)
        }
        RenderPlan::Groups(groups) => {
            writeln!(
                writer,
                "{BOLD}{volcano}{RESET} {DIM}({} image groups, oldest first){RESET}",
                groups.len()
            )?;
            for group in &groups {
                writeln!(writer)?;
                for image in &group.images {
                    writeln!(
                        writer,
                        "  {CYAN}{:8}{RESET} getImage/{}",
                        image.role.tag(),
                        image.path
                    )?;
                }
            }
            writeln!(writer)?;
            writeln!(
                writer,
                "{DIM}prev: {}  next: {}{RESET}",
                cursor_label(page.prev.as_ref()),
                cursor_label(page.next.as_ref())
            )
        }
    }
}

fn cursor_label(cursor: Option<&Cursor>) -> String {
    cursor.map_or_else(|| "none".to_string(), ToString::to_string)
}

/// Serialized detection listing for JSON output.
#[derive(Debug, Serialize)]
struct DetectionListing<'a> {
    volcano: &'a str,
    max_dist: f64,
    events: Vec<DetectionEvent>,
}

#[derive(Debug, Serialize)]
struct DetectionEvent {
    time: String,
    value: f64,
    distance: f64,
}

/// Write a detection series in the specified format.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_detections<W: Write>(
    writer: &mut W,
    volcano: &str,
    series: &DetectionSeries,
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Human => write_detections_human(writer, volcano, series),
        Format::Json => {
            let columns = &series.detections;
            let events = columns
                .times
                .iter()
                .zip(&columns.values)
                .zip(&columns.distances)
                .map(|((time, value), distance)| DetectionEvent {
                    time: time.clone(),
                    value: *value,
                    distance: *distance,
                })
                .collect();
            let listing = DetectionListing {
                volcano,
                max_dist: series.max_dist,
                events,
            };
            let json = serde_json::to_string_pretty(&listing)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            writeln!(writer, "{json}")
        }
        Format::Csv => write!(writer, "{}", chart::to_csv(series)),
    }
}

fn write_detections_human<W: Write>(
    writer: &mut W,
    volcano: &str,
    series: &DetectionSeries,
) -> io::Result<()> {
    writeln!(
        writer,
        "{BOLD}{volcano}{RESET} {DIM}({} detections, max_dist {:.1} m){RESET}",
        series.len(),
        series.max_dist
    )?;

    let columns = &series.detections;
    for ((time, value), distance) in columns
        .times
        .iter()
        .zip(&columns.values)
        .zip(&columns.distances)
    {
        writeln!(
            writer,
            "{time} UTC │ {CYAN}{value:>6.3}{RESET} │ {DIM}{distance:>8.1} m{RESET}"
        )?;
    }
    Ok(())
}
