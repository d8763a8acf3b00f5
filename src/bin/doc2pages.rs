//! CLI binary for doc2pages.
//!
//! `doc2pages serve` (the default) runs the HTTP service;
//! `doc2pages convert <file>` runs one conversion locally against the same
//! upload root and prints the page-image URLs.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use doc2pages::{serve, ConversionJob, Converter, RenderProgress, ServerConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── Terminal progress for `convert` ──────────────────────────────────────────

/// Spinner while the PDF is produced, then a page bar once rasterising starts.
struct CliProgress {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgress {
    fn new(name: &str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER),
        );
        bar.set_prefix("Preparing");
        bar.set_message(format!("Producing PDF for {name}…"));
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }

    fn abandon(&self) {
        self.bar.finish_and_clear();
    }
}

impl RenderProgress for CliProgress {
    fn on_render_start(&self, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(SPINNER),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix("Rendering");
    }

    fn on_page_rendered(&self, _page_num: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_page_failed(&self, page_num: usize, total_pages: usize, error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(error)
        ));
    }

    fn on_render_complete(&self, total_pages: usize, rendered: usize) {
        self.bar.finish_and_clear();
        if self.failed.load(Ordering::SeqCst) == 0 {
            eprintln!("{} {} pages rendered", green("✔"), bold(&rendered.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages rendered, partial output removed",
                red("✘"),
                rendered,
                total_pages
            );
        }
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on the default port (5152)
  doc2pages

  # Run on another port with a custom upload root
  doc2pages serve --port 8080 --upload-root /srv/uploads

  # Convert one file locally and print the page URLs
  doc2pages convert report.xlsx

  # Same, as JSON
  doc2pages convert memo.docx --json

SUPPORTED INPUTS:
  .doc .docx   converted by LibreOffice (soffice)
  .xlsx .xls   rendered to HTML tables, printed by headless Chromium
  .pdf         rasterised directly

ENVIRONMENT VARIABLES:
  PORT                          Listen port
  DOC2PAGES_*                   See the flags below
  PDFIUM_LIB_PATH               Directory containing libpdfium
  RUST_LOG                      Log filter, overrides -v
"#;

/// Convert Word, Excel and PDF documents into per-page PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "doc2pages",
    version,
    about = "Convert Word, Excel and PDF documents into per-page PNG images",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    opts: CommonOpts,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2PAGES_VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default).
    Serve,
    /// Convert one local file.
    Convert {
        /// Path to a .doc, .docx, .xlsx, .xls or .pdf file.
        file: PathBuf,

        /// Print the job as JSON instead of one URL per line.
        #[arg(long)]
        json: bool,

        /// Disable the progress bar.
        #[arg(long, env = "DOC2PAGES_NO_PROGRESS")]
        no_progress: bool,
    },
}

#[derive(Args, Debug)]
struct CommonOpts {
    /// Address to bind.
    #[arg(long, global = true, env = "DOC2PAGES_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(long, global = true, env = "PORT", default_value_t = 5152)]
    port: u16,

    /// Root directory for uploads and generated files.
    #[arg(long, global = true, env = "DOC2PAGES_UPLOAD_ROOT", default_value = "uploads")]
    upload_root: PathBuf,

    /// Render scale relative to the page's point size (0.25–8.0).
    #[arg(long, global = true, env = "DOC2PAGES_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// LibreOffice executable.
    #[arg(long, global = true, env = "DOC2PAGES_SOFFICE", default_value = "soffice")]
    soffice: String,

    /// Chromium executable.
    #[arg(long, global = true, env = "DOC2PAGES_CHROME", default_value = "chromium")]
    chrome: String,

    /// Maximum concurrent engine processes.
    #[arg(long, global = true, env = "DOC2PAGES_ENGINE_CONCURRENCY", default_value_t = 2)]
    engine_concurrency: usize,

    /// Seconds before an engine process is killed.
    #[arg(long, global = true, env = "DOC2PAGES_ENGINE_TIMEOUT", default_value_t = 120)]
    engine_timeout: u64,

    /// Maximum upload size in MiB.
    #[arg(long, global = true, env = "DOC2PAGES_MAX_UPLOAD_MB", default_value_t = 100)]
    max_upload_mb: usize,

    /// Directory containing libpdfium.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // The progress bar replaces INFO logs for a local conversion.
    let quiet_logs = matches!(
        cli.command,
        Some(Command::Convert {
            no_progress: false,
            json: false,
            ..
        })
    );
    let filter = if cli.verbose {
        "debug"
    } else if quiet_logs {
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

    let config = build_config(&cli.opts)?;
    let converter = Converter::new(config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(converter).await.context("Server failed"),
        Command::Convert {
            file,
            json,
            no_progress,
        } => run_convert(&converter, file, json, no_progress).await,
    }
}

async fn run_convert(
    converter: &Converter,
    file: PathBuf,
    json: bool,
    no_progress: bool,
) -> Result<()> {
    let name = file.display().to_string();
    let bar = (!no_progress && !json).then(|| CliProgress::new(&name));
    let progress = bar.clone().map(|b| b as Arc<dyn RenderProgress>);

    let result = converter.convert_path(&file, progress).await;
    if let Some(bar) = &bar {
        bar.abandon();
    }
    let job = result.with_context(|| format!("Failed to convert {name}"))?;

    if json {
        println!("{}", job_json(&job)?);
    } else {
        for url in job.images() {
            println!("{url}");
        }
        if !no_progress {
            eprintln!(
                "{} job {}  PDF {}",
                cyan("◆"),
                job.job_id,
                bold(&job.pdf.path.display().to_string())
            );
        }
    }
    Ok(())
}

fn job_json(job: &ConversionJob) -> Result<String> {
    let value = serde_json::json!({
        "jobId": job.job_id,
        "originalFileName": job.source.original_name,
        "pdf": job.pdf,
        "images": job.images(),
        "pages": job.pages,
    });
    serde_json::to_string_pretty(&value).context("Failed to serialise job")
}

/// Map CLI args to `ServerConfig`.
fn build_config(opts: &CommonOpts) -> Result<ServerConfig> {
    let mut builder = ServerConfig::builder()
        .bind(&opts.bind)
        .port(opts.port)
        .upload_root(&opts.upload_root)
        .render_scale(opts.scale)
        .soffice_bin(&opts.soffice)
        .chrome_bin(&opts.chrome)
        .engine_concurrency(opts.engine_concurrency)
        .engine_timeout_secs(opts.engine_timeout)
        .max_upload_bytes(opts.max_upload_mb.saturating_mul(1024 * 1024));
    if let Some(dir) = &opts.pdfium_lib {
        builder = builder.pdfium_lib_dir(dir);
    }
    builder.build().context("Invalid configuration")
}
