use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pagesurf::engines::MupdfEngine;
use pagesurf::panic_handler::initialize_panic_handler;
use pagesurf::render::resources::encode_png;
use pagesurf::settings::{self, Settings};
use pagesurf::{
    DocumentSource, JsonProgressStore, ScrollBehavior, ScrollHost, Viewer, ViewerEvent,
};

const SETTLE_CEILING: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "pagesurf")]
#[command(about = "Render the pages around a reading position and dump them as PNG")]
struct Cli {
    /// PDF path or http(s) URL
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Page to open at (1-based); defaults to the saved position
    #[arg(long)]
    page: Option<usize>,

    /// Zoom percent, 50 to 200
    #[arg(long)]
    zoom: Option<i64>,

    /// Directory the rendered pages are written to
    #[arg(long, default_value = "pagesurf-out")]
    out: PathBuf,

    /// Render every page up front
    #[arg(long)]
    eager: bool,

    /// High-res pages kept at once (3 to 6)
    #[arg(long)]
    lru: Option<usize>,

    /// Settings file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "pagesurf.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

/// A scroll container with no window behind it
struct HeadlessHost {
    viewport_height: f32,
    scroll_top: f32,
}

impl ScrollHost for HeadlessHost {
    fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    fn scroll_to(&mut self, top: f32, _behavior: ScrollBehavior) {
        self.scroll_top = top;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("creating log file {}", cli.log_file.display()))?,
    )?;
    initialize_panic_handler();

    info!("Starting pagesurf");

    let res = run(&cli);
    if let Err(err) = &res {
        error!("Application error: {err:?}");
    }

    info!("Shutting down pagesurf");
    res
}

fn run(cli: &Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(path),
        None => Settings::load(),
    };

    let mut options = settings.viewer_options().eager(cli.eager || settings.eager_mode);
    if let Some(lru) = cli.lru {
        options = options.resident_set_bound(lru);
    }
    if let Some(page) = cli.page {
        options = options.initial_page(page);
    }

    let progress_path = settings::config_path()
        .and_then(|p| p.parent().map(|dir| dir.join("progress.json")));
    let progress = JsonProgressStore::load_or_ephemeral(progress_path.as_deref());

    let host = HeadlessHost {
        viewport_height: settings.placeholder_min_height,
        scroll_top: 0.0,
    };
    let mut viewer = Viewer::new(host, Arc::new(MupdfEngine::new()))
        .with_progress_store(Box::new(progress));

    let info = viewer.load_document(DocumentSource::from(cli.source.as_str()), options)?;
    println!(
        "{}: {} pages, opened at page {}",
        info.fingerprint, info.page_count, info.initial_page
    );

    if let Some(zoom) = cli.zoom {
        viewer.set_zoom(zoom);
    }
    if !viewer.settle(SETTLE_CEILING) {
        eprintln!("rendering did not settle within {SETTLE_CEILING:?}");
    }

    for event in viewer.drain_events() {
        if let ViewerEvent::RenderFailed(failure) = event {
            eprintln!("{failure}");
        }
    }

    let written = write_pages(&viewer, &cli.out)?;
    println!(
        "wrote {written} page(s) at {}% to {}",
        viewer.zoom(),
        cli.out.display()
    );

    viewer.close();
    Ok(())
}

fn write_pages(viewer: &Viewer<HeadlessHost>, out: &Path) -> Result<usize> {
    fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    let mut written = 0;
    for page in viewer.visible_pages() {
        let Some(surface) = viewer.surface(page) else {
            continue;
        };
        let png = encode_png(&surface.high_res.bitmap)?;
        let path = out.join(format!("page-{page:04}.png"));
        fs::write(&path, png).with_context(|| format!("writing {}", path.display()))?;
        written += 1;
    }
    Ok(written)
}
