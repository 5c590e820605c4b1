//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Parser, Subcommand};

use crate::client::DEFAULT_BASE_URL;
use crate::output::Format;

/// Volcano infrasound image browser and detection viewer.
#[derive(Parser, Debug)]
#[command(name = "infraview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Backend base URL
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub server: String,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List one page of images (one-shot fetch and exit)
    Images(ImagesArgs),

    /// List the detection series for a volcano
    Detections(DetectionsArgs),

    /// Open the dashboard window
    Ui(UiArgs),
}

/// Arguments for the `images` command.
#[derive(Parser, Debug)]
pub struct ImagesArgs {
    /// Volcano to list images for
    #[arg(default_value = "pavlof")]
    pub volcano: String,

    /// Number of image groups to fetch
    #[arg(long, short = 'n', default_value = "4")]
    pub count: usize,

    /// Browse backward from this time instead of the newest images
    /// (epoch seconds or `m/d/Y H:i`)
    #[arg(long)]
    pub stop: Option<String>,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `detections` command.
#[derive(Parser, Debug)]
pub struct DetectionsArgs {
    /// Volcano to list detections for
    #[arg(default_value = "pavlof")]
    pub volcano: String,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `ui` command.
#[derive(Parser, Debug)]
pub struct UiArgs {
    /// Volcano tabs, in display order (repeat for more than one)
    #[arg(long = "volcano", default_values_t = [String::from("pavlof"), String::from("semi")])]
    pub volcanoes: Vec<String>,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}
