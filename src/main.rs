//! Infraview - volcano infrasound image and detection dashboard.
//!
//! A desktop viewer for the infrasound monitoring backend: browse
//! generated image groups by time, watch the detection scatter, and
//! export detections to CSV.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

mod app;
mod chart;
mod cli;
mod client;
mod errors;
mod layout;
mod models;
mod output;
mod picker;
mod render;
mod view;

use cli::{Cli, Command};
use client::DashboardClient;
use models::Cursor;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let server = cli.server;
    match cli.command {
        Command::Images(args) => cmd_images(&server, args),
        Command::Detections(args) => cmd_detections(&server, args),
        Command::Ui(args) => cmd_ui(server, args),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the `images` command - one-shot page fetch.
fn cmd_images(server: &str, args: cli::ImagesArgs) -> Result<()> {
    let client = DashboardClient::new(server).context("failed to create dashboard client")?;

    let cursor = args.stop.as_deref().map(Cursor::from);
    let page = client
        .fetch_page(&args.volcano, args.count, cursor.as_ref())
        .context("failed to fetch image page")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_page(&mut handle, &args.volcano, &page, args.format)?;

    Ok(())
}

/// Execute the `detections` command - one-shot series fetch.
fn cmd_detections(server: &str, args: cli::DetectionsArgs) -> Result<()> {
    let client = DashboardClient::new(server).context("failed to create dashboard client")?;

    let series = client
        .fetch_detections(&args.volcano)
        .context("failed to fetch detections")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_detections(&mut handle, &args.volcano, &series, args.format)?;

    Ok(())
}

/// Execute the `ui` command - open the dashboard window.
fn cmd_ui(server: String, args: cli::UiArgs) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1480.0, 900.0])
            .with_min_inner_size([760.0, 600.0])
            .with_title("Infraview"),
        ..Default::default()
    };

    eframe::run_native(
        "infraview",
        options,
        Box::new(move |_cc| Ok(Box::new(app::DashboardApp::new(&server, args.volcanoes)?))),
    )
    .map_err(|e| anyhow::anyhow!("failed to run dashboard: {e}"))
}
