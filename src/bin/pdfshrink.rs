//! CLI binary for pdfshrink.
//!
//! A thin shim over the library crate: `run` maps flags to an
//! `OptimizeConfig` and optimises one file, `serve` starts the upload service.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfshrink::{
    convert_file, ConversionProgressCallback, OptimizeConfig, OptimizeStats, Pipeline,
    ProgressCallback, Server, ServerConfig,
};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar plus one log line per page. Pages arrive strictly in order,
/// so a single start timestamp is enough.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
        })
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rasterising");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rasterising {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, image_bytes: usize) {
        let secs = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:>10}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&human_bytes(image_bytes as u64)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_skipped(&self, page_num: usize, total_pages: usize) {
        let secs = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            yellow("–"),
            page_num,
            total_pages,
            yellow("no image, left out"),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, _total_pages: usize, _rendered_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Rasterise a PDF into output-from-images.pdf
  pdfshrink run document.pdf

  # Choose the output path and a smaller page size
  pdfshrink run scan.pdf small.pdf --width 600 --height 800 --quality 60

  # Keep the intermediate page.<n>.jpeg files
  pdfshrink run document.pdf --artifact-dir ./pages --keep-artifacts

  # Machine-readable statistics
  pdfshrink run document.pdf --json > stats.json

  # Start the upload service on port 3000
  pdfshrink serve
  curl -F "file=@document.pdf;type=application/pdf" \
       http://localhost:3000/optimize -o optimized.pdf

ENVIRONMENT VARIABLES:
  PDFSHRINK_*        Every flag can be set as PDFSHRINK_<FLAG> (e.g. PDFSHRINK_DPI)
  PDFIUM_LIB_PATH    Path to libpdfium, or the directory that contains it
  PDFIUM_AUTO_CACHE_DIR
                     Where the downloaded pdfium is cached
  RUST_LOG           Overrides the log filter (e.g. RUST_LOG=pdfshrink=debug)
"#;

/// Shrink PDFs by rasterising every page to JPEG.
#[derive(Parser, Debug)]
#[command(
    name = "pdfshrink",
    version,
    about = "Shrink PDFs by rasterising every page to JPEG and re-assembling them",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFSHRINK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFSHRINK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Optimise one PDF file.
    Run(RunArgs),
    /// Serve `POST /optimize` over HTTP.
    Serve(ServeArgs),
}

/// Rendering knobs shared by both subcommands.
#[derive(Args, Debug)]
struct RasterArgs {
    /// Rendering DPI (36–600), used with --preserve-aspect-ratio.
    #[arg(long, env = "PDFSHRINK_DPI", default_value_t = pdfshrink::config::DEFAULT_DPI,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    dpi: u32,

    /// Page width in pixels.
    #[arg(long, env = "PDFSHRINK_WIDTH", default_value_t = pdfshrink::config::DEFAULT_TARGET_WIDTH,
          value_parser = clap::value_parser!(u32).range(1..))]
    width: u32,

    /// Page height in pixels.
    #[arg(long, env = "PDFSHRINK_HEIGHT", default_value_t = pdfshrink::config::DEFAULT_TARGET_HEIGHT,
          value_parser = clap::value_parser!(u32).range(1..))]
    height: u32,

    /// Keep each page's proportions: render at --dpi and only cap to
    /// --width × --height instead of stretching to exactly that size.
    #[arg(long, env = "PDFSHRINK_PRESERVE_ASPECT_RATIO")]
    preserve_aspect_ratio: bool,

    /// JPEG quality (0–100).
    #[arg(long, env = "PDFSHRINK_QUALITY", default_value_t = pdfshrink::config::DEFAULT_QUALITY,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// PDF to optimise.
    input: PathBuf,

    /// Where to write the optimised PDF.
    #[arg(default_value = "output-from-images.pdf")]
    output: PathBuf,

    #[command(flatten)]
    raster: RasterArgs,

    /// Directory for the temporary page.<n>.jpeg files.
    #[arg(long, env = "PDFSHRINK_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,

    /// Leave the page images in --artifact-dir after the run.
    #[arg(long, env = "PDFSHRINK_KEEP_ARTIFACTS", requires = "artifact_dir")]
    keep_artifacts: bool,

    /// Print run statistics as JSON on stdout.
    #[arg(long, env = "PDFSHRINK_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFSHRINK_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PDFSHRINK_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PDFSHRINK_PORT", default_value_t = 3000)]
    port: u16,

    /// Largest accepted upload, in MiB.
    #[arg(long, env = "PDFSHRINK_MAX_UPLOAD_MB", default_value_t = 64,
          value_parser = clap::value_parser!(u64).range(1..=4096))]
    max_upload_mb: u64,

    #[command(flatten)]
    raster: RasterArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Usage errors exit with 1 like every other failure; --help and
    // --version still exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    match cli.command {
        Command::Run(ref args) => {
            let show_progress = !cli.quiet && !args.no_progress && !args.json;
            init_logging(cli.verbose, cli.quiet || show_progress);
            run(args, cli.quiet, show_progress).await
        }
        Command::Serve(ref args) => {
            init_logging(cli.verbose, cli.quiet);
            serve(args, cli.quiet).await
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
fn init_logging(verbose: bool, errors_only: bool) {
    let filter = if verbose {
        "debug"
    } else if errors_only {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();
}

async fn run(args: &RunArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let mut builder = raster_config(&args.raster).cleanup_artifacts(!args.keep_artifacts);
    if let Some(ref dir) = args.artifact_dir {
        builder = builder.artifact_dir(dir);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    ensure_engine(quiet || args.json);
    let pipeline = Arc::new(Pipeline::new(config).context("Failed to load the PDF renderer")?);
    let stats = convert_file(pipeline, args.input.clone(), args.output.clone())
        .await
        .with_context(|| format!("Failed to optimise {}", args.input.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?;
        println!("{json}");
    } else if !quiet {
        print_summary(&stats, args);
    }

    Ok(())
}

fn print_summary(stats: &OptimizeStats, args: &RunArgs) {
    let ratio = stats
        .size_ratio()
        .map(|r| format!(" ({:.0}%)", r * 100.0))
        .unwrap_or_default();

    eprintln!(
        "{}  {}/{} pages  {} → {}{}  {}ms  →  {}",
        if stats.is_partial() {
            yellow("⚠")
        } else {
            green("✔")
        },
        stats.rendered_pages,
        stats.total_pages,
        human_bytes(stats.input_bytes as u64),
        human_bytes(stats.output_bytes as u64),
        ratio,
        stats.total_duration_ms,
        bold(&args.output.display().to_string()),
    );

    if stats.is_partial() {
        let pages = stats
            .skipped_pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!("   {} {}", yellow("left out (no image):"), pages);
    }
    if stats.artifacts_not_removed > 0 {
        eprintln!(
            "   {} {} temporary page image(s) could not be removed",
            yellow("⚠"),
            stats.artifacts_not_removed
        );
    }
    if args.keep_artifacts {
        if let Some(ref dir) = args.artifact_dir {
            eprintln!("   {} {}", dim("page images kept in"), dir.display());
        }
    }
}

async fn serve(args: &ServeArgs, quiet: bool) -> Result<()> {
    let config = raster_config(&args.raster)
        .build()
        .context("Invalid configuration")?;
    ensure_engine(quiet);
    let pipeline = Arc::new(Pipeline::new(config).context("Failed to load the PDF renderer")?);

    let server_config = ServerConfig {
        bind: SocketAddr::new(args.host, args.port),
        max_upload_bytes: (args.max_upload_mb * 1024 * 1024) as usize,
    };

    let server = Server::bind(&server_config, pipeline)
        .await
        .context("Failed to start server")?;
    server.run().await.context("Server error")?;
    Ok(())
}

/// Make sure pdfium is on disk before the pipeline binds it.
///
/// On the very first run this downloads the library (~30 MB) into the
/// per-user cache; later runs only check the path. A failed download is not
/// fatal here: binding still falls back to a system-wide pdfium and reports
/// the combined error if that is missing too.
fn ensure_engine(quiet: bool) {
    if pdfium_auto::is_pdfium_cached() {
        if let Err(e) = tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None)) {
            tracing::warn!("PDF engine unavailable: {e}");
        }
        return;
    }

    let result = if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
    } else {
        let dl_bar = ProgressBar::new(0);
        dl_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(SPINNER),
        );
        dl_bar.set_prefix("PDF engine");
        dl_bar.set_message("Connecting…");
        dl_bar.enable_steady_tick(Duration::from_millis(80));

        let bar = dl_bar.clone();
        let result = tokio::task::block_in_place(|| {
            pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                if let Some(t) = total {
                    if bar.length().unwrap_or(0) != t {
                        bar.set_length(t);
                    }
                }
                bar.set_position(downloaded);
            }))
        });
        match result {
            Ok(_) => dl_bar.finish_with_message("ready ✓"),
            Err(_) => dl_bar.abandon_with_message("download failed"),
        }
        result
    };

    if let Err(e) = result {
        tracing::warn!("Could not fetch the PDF engine ({e}); trying a system-wide pdfium");
    }
}

fn raster_config(raster: &RasterArgs) -> pdfshrink::OptimizeConfigBuilder {
    OptimizeConfig::builder()
        .dpi(raster.dpi)
        .target_width(raster.width)
        .target_height(raster.height)
        .preserve_aspect_ratio(raster.preserve_aspect_ratio)
        .quality(raster.quality)
}

/// `1536` → `1.5 KB`.
fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
